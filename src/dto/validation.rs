//! Validation helpers for DTOs.

use validator::ValidationError;

const PLAYER_ID_MAX_LEN: usize = 64;

/// Validates that a player ID is 1 to 64 characters of ASCII letters, digits, `-` or `_`.
///
/// # Examples
///
/// ```ignore
/// validate_player_id("headset-01") // Ok
/// validate_player_id("")           // Err - empty
/// validate_player_id("player 1")   // Err - space
/// ```
pub fn validate_player_id(id: &str) -> Result<(), ValidationError> {
    if id.is_empty() || id.len() > PLAYER_ID_MAX_LEN {
        let mut err = ValidationError::new("player_id_length");
        err.message = Some(
            format!(
                "Player ID must be between 1 and {PLAYER_ID_MAX_LEN} characters (got {})",
                id.len()
            )
            .into(),
        );
        return Err(err);
    }

    if !id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        let mut err = ValidationError::new("player_id_format");
        err.message =
            Some("Player ID may only contain ASCII letters, digits, '-' and '_'".into());
        return Err(err);
    }

    Ok(())
}
