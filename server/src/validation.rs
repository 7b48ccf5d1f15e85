use crate::error::ApiError;

/// Maximum description length for generation requests
const MAX_DESCRIPTION_LENGTH: usize = 2000;

/// Validate a lyrics or music description.
///
/// Numeric generation parameters are clamped downstream, never rejected here.
pub fn validate_description(description: &str) -> Result<(), ApiError> {
    if description.trim().is_empty() {
        return Err(ApiError::InvalidInput(
            "Description cannot be empty".to_string(),
        ));
    }
    if description.chars().count() > MAX_DESCRIPTION_LENGTH {
        return Err(ApiError::InvalidInput(format!(
            "Description too long (max {} characters)",
            MAX_DESCRIPTION_LENGTH
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_description_valid() {
        assert!(validate_description("chill lo-fi hip hop with warm piano").is_ok());
        assert!(validate_description(&"a".repeat(MAX_DESCRIPTION_LENGTH)).is_ok());
    }

    #[test]
    fn test_validate_description_empty() {
        for text in ["", "   \n\t"] {
            let result = validate_description(text);
            assert!(result.is_err());
            if let Err(ApiError::InvalidInput(msg)) = result {
                assert!(msg.contains("empty"));
            }
        }
    }

    #[test]
    fn test_validate_description_too_long() {
        let long_text = "a".repeat(MAX_DESCRIPTION_LENGTH + 1);
        let result = validate_description(&long_text);
        assert!(result.is_err());
        if let Err(ApiError::InvalidInput(msg)) = result {
            assert!(msg.contains("too long"));
        }
    }

    #[test]
    fn test_validate_description_counts_chars_not_bytes() {
        let text = "é".repeat(MAX_DESCRIPTION_LENGTH);
        assert!(validate_description(&text).is_ok());
    }
}
