use crate::error::{LlmassError, Result};

pub const MAX_SESSION_NAME_LEN: usize = 128;

/// Reject session names that are empty, too long, or could escape the sessions root.
pub fn validate_session_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(LlmassError::Validation(
            "Invalid or missing 'session' parameter".to_string(),
        ));
    }
    if name.len() > MAX_SESSION_NAME_LEN {
        return Err(LlmassError::Validation(format!(
            "session name too long: {} > {MAX_SESSION_NAME_LEN}",
            name.len()
        )));
    }
    if name == "." || name == ".." {
        return Err(LlmassError::Validation(format!(
            "invalid session name: {name}"
        )));
    }
    if let Some(bad) = name
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-')))
    {
        return Err(LlmassError::Validation(format!(
            "invalid character {bad:?} in session name"
        )));
    }
    Ok(())
}
