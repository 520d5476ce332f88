// Validation helpers for request fields

/// Trim a string field, rejecting empty values when the field is required
pub fn trim_and_validate_field(field: &str, required: bool) -> Result<String, String> {
    let trimmed = field.trim().to_string();
    if trimmed.is_empty() && required {
        return Err("Field cannot be empty".to_string());
    }
    Ok(trimmed)
}

/// Trim an optional field, collapsing whitespace-only values to None
pub fn trim_optional_field(field: Option<&String>) -> Option<String> {
    field.and_then(|s| {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

/// Contact and user emails are matched case-insensitively; normalize on write
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trim_required_field() {
        assert_eq!(trim_and_validate_field("  ana  ", true).unwrap(), "ana");
        assert!(trim_and_validate_field("   ", true).is_err());
        assert_eq!(trim_and_validate_field("   ", false).unwrap(), "");
    }

    #[test]
    fn test_trim_optional_field() {
        assert_eq!(trim_optional_field(Some(&"  x ".to_string())), Some("x".to_string()));
        assert_eq!(trim_optional_field(Some(&"   ".to_string())), None);
        assert_eq!(trim_optional_field(None), None);
    }

    #[test]
    fn test_normalize_email() {
        assert_eq!(normalize_email(" Ana@Example.COM "), "ana@example.com");
    }
}
