/// Heuristic check that a display name belongs to an email address.
///
/// Case-insensitive substring match of the name inside the address. This is
/// advisory only: a `false` routes the row to manual review, never to an error.
pub fn check_email_name(name: &str, email: &str) -> bool {
    email.to_lowercase().contains(&name.to_lowercase())
}
