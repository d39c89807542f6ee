//! Monetary coercion and formatting.
//!
//! Spreadsheet cells are lenient: anything that does not read as a number
//! becomes zero instead of failing the row.

use calamine::Data;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use std::str::FromStr;

/// Round to cents, half away from zero.
pub fn round_cents(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Coerce a spreadsheet cell into a 2-decimal amount; invalid values become 0.00.
pub fn coerce_amount(cell: &Data) -> Decimal {
    let raw = match cell {
        Data::Int(value) => Decimal::from(*value),
        Data::Float(value) => Decimal::from_f64(*value).unwrap_or(Decimal::ZERO),
        Data::String(value) => parse_amount(value),
        _ => Decimal::ZERO,
    };
    round_cents(raw)
}

/// Parse a textual amount, tolerating thousands separators and a currency sign.
pub fn parse_amount(text: &str) -> Decimal {
    let cleaned: String = text
        .trim()
        .chars()
        .filter(|c| !matches!(c, ',' | ' ' | '¥' | '$' | '￥'))
        .collect();
    if cleaned.is_empty() {
        return Decimal::ZERO;
    }
    Decimal::from_str(&cleaned)
        .or_else(|_| Decimal::from_scientific(&cleaned))
        .unwrap_or(Decimal::ZERO)
}

/// Plain two-decimal rendering used in email placeholders, e.g. `1234.50`.
pub fn format_plain(amount: Decimal) -> String {
    format!("{:.2}", round_cents(amount))
}

/// Currency rendering with thousands separators, e.g. `¥12,345.60`.
pub fn format_currency(amount: Decimal, symbol: &str) -> String {
    let plain = format_plain(amount.abs());
    let (integer, fraction) = plain.split_once('.').unwrap_or((plain.as_str(), "00"));

    let mut grouped = String::with_capacity(integer.len() + integer.len() / 3);
    for (i, digit) in integer.chars().enumerate() {
        if i > 0 && (integer.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    let sign = if amount.is_sign_negative() && !round_cents(amount).is_zero() {
        "-"
    } else {
        ""
    };
    format!("{sign}{symbol}{grouped}.{fraction}")
}
