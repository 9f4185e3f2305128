//! Validation helpers for DTOs.

use validator::ValidationError;

/// Validates that a display name (game, team, player) is not blank.
///
/// # Examples
///
/// ```ignore
/// validate_display_name("Owls")  // Ok
/// validate_display_name("   ")   // Err - blank
/// ```
pub fn validate_display_name(name: &str) -> Result<(), ValidationError> {
    if name.trim().is_empty() {
        let mut err = ValidationError::new("name_blank");
        err.message = Some("Name must contain at least one visible character".into());
        return Err(err);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_display_name() {
        assert!(validate_display_name("Owls").is_ok());
        assert!(validate_display_name(" a ").is_ok());
        assert!(validate_display_name("").is_err());
        assert!(validate_display_name(" \t").is_err());
    }
}
