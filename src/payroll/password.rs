//! Per-document open passwords.

use rand::rngs::OsRng;
use rand::Rng;

pub const PASSWORD_LENGTH: usize = 10;
pub const MIN_DIGITS: usize = 3;

const ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Generate a random 10-character password from letters and digits.
///
/// Candidates are drawn from the OS random source and redrawn until they hold
/// at least one lowercase letter, one uppercase letter and three digits. The
/// loop has no upper bound; about a third of candidates pass, so it ends
/// after a handful of draws in practice.
pub fn generate_password() -> String {
    let mut rng = OsRng;
    loop {
        let candidate: String = (0..PASSWORD_LENGTH)
            .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
            .collect();
        if meets_policy(&candidate) {
            return candidate;
        }
    }
}

/// Check a password against the strength policy.
pub fn meets_policy(password: &str) -> bool {
    password.chars().count() == PASSWORD_LENGTH
        && password.chars().all(|c| c.is_ascii_alphanumeric())
        && password.chars().any(|c| c.is_ascii_lowercase())
        && password.chars().any(|c| c.is_ascii_uppercase())
        && password.chars().filter(|c| c.is_ascii_digit()).count() >= MIN_DIGITS
}
