//! Validation helpers for DTOs.

use validator::ValidationError;

/// Longest accepted race name, in characters.
pub const MAX_RACE_NAME_LENGTH: usize = 100;

/// Validates a race display name: bounded length, no control characters.
///
/// Blank names are accepted; they are replaced by the "-" placeholder on creation.
///
/// # Examples
///
/// ```ignore
/// validate_race_name("Sunday showdown") // Ok
/// validate_race_name("")                // Ok
/// validate_race_name("tab\there")       // Err - control character
/// ```
pub fn validate_race_name(name: &str) -> Result<(), ValidationError> {
    let length = name.chars().count();
    if length > MAX_RACE_NAME_LENGTH {
        let mut err = ValidationError::new("race_name_length");
        err.message = Some(
            format!("Race name must be at most {MAX_RACE_NAME_LENGTH} characters (got {length})")
                .into(),
        );
        return Err(err);
    }

    if name.chars().any(char::is_control) {
        let mut err = ValidationError::new("race_name_format");
        err.message = Some("Race name must not contain control characters".into());
        return Err(err);
    }

    Ok(())
}
