//! Identifier validation applied before any file or store is touched.
//!
//! Column names and the output file name arrive from the command line wrapped
//! in an outer pair of double quotes (`'"region"'` in a shell), which keeps the
//! shell from interpreting them. The quotes are required and are stripped
//! here; the column names themselves do not need quotes in the CSV header.
//!
//! Every supplied name is checked. A failure names the offending token.

use crate::error::{Error, Result};
use std::path::PathBuf;

/// Names may not begin with this character; the store reserves it for operators.
pub const RESERVED_PREFIX: char = '$';
/// Stored fields named with this prefix belong to the store, not to the data.
pub const PRIVATE_PREFIX: char = '_';

/// Strip one pair of wrapping double quotes, or `None` if they are absent.
#[must_use]
pub fn unwrap_quoted(token: &str) -> Option<&str> {
    if token.len() >= 2 && token.starts_with('"') && token.ends_with('"') {
        Some(&token[1..token.len() - 1])
    } else {
        None
    }
}

fn unwrap_required<'a>(token: &'a str, what: &str) -> Result<&'a str> {
    unwrap_quoted(token).ok_or_else(|| {
        Error::malformed(
            token,
            format!("{what} must be wrapped in 2 levels of quotes, '\"<NAME>\"'"),
        )
    })
}

/// Validate a single, already unwrapped, field name.
///
/// # Errors
/// Returns [`Error::MalformedIdentifier`] for an empty name, a NUL character,
/// or a leading [`RESERVED_PREFIX`] or [`PRIVATE_PREFIX`].
pub fn check_field_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::malformed(name, "field name cannot be empty"));
    }
    if name.contains('\0') {
        return Err(Error::malformed(name, "field name cannot contain the NULL character"));
    }
    if name.starts_with(RESERVED_PREFIX) {
        return Err(Error::malformed(
            name,
            format!("field name cannot start with '{RESERVED_PREFIX}'"),
        ));
    }
    if name.starts_with(PRIVATE_PREFIX) {
        return Err(Error::malformed(
            name,
            format!("field name cannot start with '{PRIVATE_PREFIX}', it is reserved for store fields"),
        ));
    }
    Ok(())
}

/// Unwrap and validate every quoted field-name token.
///
/// ```
/// use shardstash::validation::check_valid_field_names;
/// assert_eq!(check_valid_field_names(&["\"A\"", "\"B\""]).unwrap(), vec!["A", "B"]);
/// assert!(check_valid_field_names(&["A"]).is_err());
/// ```
///
/// # Errors
/// Returns [`Error::MalformedIdentifier`] for the first invalid token.
pub fn check_valid_field_names<S: AsRef<str>>(tokens: &[S]) -> Result<Vec<String>> {
    tokens
        .iter()
        .map(|token| {
            let name = unwrap_required(token.as_ref(), "each field name")?;
            check_field_name(name)?;
            Ok(name.to_string())
        })
        .collect()
}

/// Unwrap and validate the quoted output file name.
///
/// The name must not start with a digit and must not contain `/` or NUL, so the
/// output always lands in the working directory.
///
/// # Errors
/// Returns [`Error::MalformedIdentifier`] when any rule is broken.
pub fn check_valid_output_file_name(token: &str) -> Result<PathBuf> {
    let name = unwrap_required(token, "output file name")?;
    if name.is_empty() {
        return Err(Error::malformed(token, "output file name cannot be empty"));
    }
    if name.starts_with(|c: char| c.is_ascii_digit()) {
        return Err(Error::malformed(token, "output file name cannot start with a digit"));
    }
    if name.contains('/') {
        return Err(Error::malformed(token, "output file name contains illegal character '/'"));
    }
    if name.contains('\0') {
        return Err(Error::malformed(token, "output file name contains the NULL character"));
    }
    Ok(PathBuf::from(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unwrap_needs_both_quotes() {
        assert_eq!(unwrap_quoted("\"x\""), Some("x"));
        assert_eq!(unwrap_quoted("\"\""), Some(""));
        assert_eq!(unwrap_quoted("\""), None);
        assert_eq!(unwrap_quoted("\"x"), None);
        assert_eq!(unwrap_quoted("x\""), None);
    }
}
