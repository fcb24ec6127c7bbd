//! Signup field validation.

use thiserror::Error;

/// Inclusive bounds on name length, in UTF-16 code units.
pub const NAME_MIN_CHARS: usize = 2;
pub const NAME_MAX_CHARS: usize = 100;

/// A signup field that failed validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FieldError {
    #[error("Name must be between 2 and 100 characters.")]
    Name,

    #[error("Please enter a valid email address.")]
    Email,
}

/// Validate a submitted name.
///
/// Length is measured the way browsers measure `string.length`, so an
/// emoji outside the BMP counts as two.
pub fn validate_name(name: Option<&str>) -> Result<&str, FieldError> {
    let name = name.ok_or(FieldError::Name)?;
    let len = name.encode_utf16().count();

    if !(NAME_MIN_CHARS..=NAME_MAX_CHARS).contains(&len) {
        return Err(FieldError::Name);
    }
    Ok(name)
}

/// Validate a submitted email address.
pub fn validate_email(email: Option<&str>) -> Result<&str, FieldError> {
    email
        .filter(|e| is_valid_email(e))
        .ok_or(FieldError::Email)
}

/// Check an address has the shape `local@domain.tld`.
///
/// Accepts exactly what the ECMAScript pattern `^[^\s@]+@[^\s@]+\.[^\s@]+$`
/// accepts: one `@`, no whitespace, a non-empty local part, and a domain
/// with a dot that is neither its first nor its last character.
pub fn is_valid_email(email: &str) -> bool {
    if email.chars().any(is_ecma_whitespace) {
        return false;
    }

    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };

    if local.is_empty() || domain.contains('@') {
        return false;
    }

    domain
        .char_indices()
        .any(|(i, c)| c == '.' && i > 0 && i + 1 < domain.len())
}

/// Membership in the ECMAScript `\s` class.
///
/// Differs from `char::is_whitespace` in including U+FEFF and excluding
/// U+0085.
fn is_ecma_whitespace(c: char) -> bool {
    c == '\u{FEFF}' || (c.is_whitespace() && c != '\u{85}')
}
