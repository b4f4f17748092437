use crate::utils::error::{EquipmentError, Result};
use std::collections::HashSet;
use url::Url;

pub trait Validate {
    fn validate(&self) -> Result<()>;
}

pub fn validate_url(field_name: &str, url_str: &str) -> Result<()> {
    if url_str.is_empty() {
        return Err(EquipmentError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: url_str.to_string(),
            reason: "URL cannot be empty".to_string(),
        });
    }

    match Url::parse(url_str) {
        Ok(url) => match url.scheme() {
            "http" | "https" => Ok(()),
            scheme => Err(EquipmentError::InvalidConfigValueError {
                field: field_name.to_string(),
                value: url_str.to_string(),
                reason: format!("Unsupported URL scheme: {}", scheme),
            }),
        },
        Err(e) => Err(EquipmentError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: url_str.to_string(),
            reason: format!("Invalid URL format: {}", e),
        }),
    }
}

pub fn validate_path(field_name: &str, path: &str) -> Result<()> {
    if path.is_empty() {
        return Err(EquipmentError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: path.to_string(),
            reason: "Path cannot be empty".to_string(),
        });
    }

    if path.contains('\0') {
        return Err(EquipmentError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: path.to_string(),
            reason: "Path contains null bytes".to_string(),
        });
    }

    Ok(())
}

pub fn validate_positive_number(field_name: &str, value: usize, min_value: usize) -> Result<()> {
    if value < min_value {
        return Err(EquipmentError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: format!("Value must be at least {}", min_value),
        });
    }
    Ok(())
}

pub fn validate_non_empty_string(field_name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(EquipmentError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: "Value cannot be empty or whitespace-only".to_string(),
        });
    }
    Ok(())
}

/// Category and product code lists: no blank entries, no duplicates.
pub fn validate_code_list(field_name: &str, codes: &[String]) -> Result<()> {
    let mut seen = HashSet::new();
    for code in codes {
        if code.trim().is_empty() || code.chars().any(char::is_whitespace) {
            return Err(EquipmentError::InvalidConfigValueError {
                field: field_name.to_string(),
                value: code.clone(),
                reason: "Codes cannot be blank or contain whitespace".to_string(),
            });
        }
        if !seen.insert(code.as_str()) {
            return Err(EquipmentError::InvalidConfigValueError {
                field: field_name.to_string(),
                value: code.clone(),
                reason: "Duplicate code".to_string(),
            });
        }
    }
    Ok(())
}

pub fn validate_range<T: PartialOrd + std::fmt::Display + Copy>(
    field_name: &str,
    value: T,
    min: T,
    max: T,
) -> Result<()> {
    if value < min || value > max {
        return Err(EquipmentError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: format!("Value must be between {} and {}", min, max),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_url() {
        assert!(validate_url("backend.base_url", "https://example.com").is_ok());
        assert!(validate_url("backend.base_url", "http://example.com").is_ok());
        assert!(validate_url("backend.base_url", "").is_err());
        assert!(validate_url("backend.base_url", "invalid-url").is_err());
        assert!(validate_url("backend.base_url", "ftp://example.com").is_err());
    }

    #[test]
    fn test_validate_positive_number() {
        assert!(validate_positive_number("rules.default_cap", 1, 1).is_ok());
        assert!(validate_positive_number("rules.default_cap", 0, 1).is_err());
    }

    #[test]
    fn test_validate_code_list() {
        let codes = vec!["09".to_string(), "10".to_string()];
        assert!(validate_code_list("rules.bulk_categories", &codes).is_ok());

        let duplicated = vec!["10".to_string(), "10".to_string()];
        assert!(validate_code_list("rules.bulk_categories", &duplicated).is_err());

        let blank = vec![" ".to_string()];
        assert!(validate_code_list("rules.bulk_categories", &blank).is_err());
    }

    #[test]
    fn test_validate_range() {
        assert!(validate_range("backend.timeout_seconds", 30u64, 1, 300).is_ok());
        assert!(validate_range("backend.timeout_seconds", 0u64, 1, 300).is_err());
    }
}
