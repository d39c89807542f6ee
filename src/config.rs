//! Environment-driven service configuration.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use chrono::NaiveDate;

use crate::payroll::{Locale, PasswordPolicy, PeriodLabel, SmtpSettings, TlsMode};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{key} must be set")]
    Missing { key: &'static str },
    #[error("invalid value '{value}' for {key}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct MailerConfig {
    pub smtp: SmtpSettings,
    pub sender_email: String,
    pub template_path: PathBuf,
    pub logo_path: Option<PathBuf>,
    pub password_policy: PasswordPolicy,
    pub subject_format: String,
    pub locale: Locale,
    pub currency_symbol: String,
    pub statement_font: String,
    pub font_dir: PathBuf,
    pub typst_bin: String,
    pub qpdf_bin: String,
    pub bind_addr: String,
    pub port: u16,
    pub log_dir: Option<PathBuf>,
}

impl MailerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let required = |key: &'static str| get(key).ok_or(ConfigError::Missing { key });

        let sender_email = required("SENDER_EMAIL")?;
        let sender_password = required("SENDER_PASSWORD")?;

        let tls = match get("SMTP_TLS") {
            Some(value) => value.parse::<TlsMode>().map_err(|_| ConfigError::Invalid {
                key: "SMTP_TLS",
                value,
            })?,
            None => TlsMode::default(),
        };
        let locale = match get("STATEMENT_LOCALE") {
            Some(value) => value.parse::<Locale>().map_err(|_| ConfigError::Invalid {
                key: "STATEMENT_LOCALE",
                value,
            })?,
            None => Locale::default(),
        };

        let smtp = SmtpSettings {
            server: get("SMTP_SERVER").unwrap_or_else(|| "smtp.163.com".to_string()),
            port: parse_number(get("SMTP_PORT"), "SMTP_PORT", 465)?,
            tls,
            username: sender_email.clone(),
            password: sender_password,
            timeout: Duration::from_secs(parse_number(
                get("SMTP_TIMEOUT_SECS"),
                "SMTP_TIMEOUT_SECS",
                30,
            )?),
        };

        let template_path = get("TEMPLATE_FILE").map(PathBuf::from).unwrap_or_else(|| {
            env::current_dir()
                .unwrap_or_default()
                .join("utils")
                .join("salary_email.html")
        });

        let password_policy = match get("PDF_PASSWORD") {
            Some(password) => PasswordPolicy::Fixed(password),
            None => PasswordPolicy::PerRecipient,
        };

        let subject_format = match get("SUBJECT_FORMAT") {
            Some(value) if !formats_a_date(&value) => {
                return Err(ConfigError::Invalid {
                    key: "SUBJECT_FORMAT",
                    value,
                })
            }
            Some(value) => value,
            None => locale.labels().default_subject_format.to_string(),
        };

        Ok(Self {
            smtp,
            sender_email,
            template_path,
            logo_path: get("LOGO_PATH").map(PathBuf::from),
            password_policy,
            subject_format,
            locale,
            currency_symbol: get("CURRENCY_SYMBOL").unwrap_or_else(|| "¥".to_string()),
            statement_font: get("STATEMENT_FONT").unwrap_or_else(|| "Noto Sans CJK SC".to_string()),
            font_dir: get("FONT_DIR").map(PathBuf::from).unwrap_or_else(|| {
                PathBuf::from(env!("CARGO_MANIFEST_DIR"))
                    .join("static")
                    .join("fonts")
            }),
            typst_bin: get("TYPST_BIN").unwrap_or_else(|| "typst".to_string()),
            qpdf_bin: get("QPDF_BIN").unwrap_or_else(|| "qpdf".to_string()),
            bind_addr: get("BIND_ADDR").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parse_number(get("PORT"), "PORT", 5000)?,
            log_dir: get("LOG_DIR").map(PathBuf::from),
        })
    }
}

/// A subject format may only use date fields; time or unknown specifiers fail to format.
fn formats_a_date(format: &str) -> bool {
    NaiveDate::from_ymd_opt(2000, 1, 31)
        .map(PeriodLabel::from_date)
        .and_then(|period| period.try_subject(format))
        .is_some()
}

fn parse_number<T: std::str::FromStr>(
    value: Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match value {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value }),
        None => Ok(default),
    }
}
