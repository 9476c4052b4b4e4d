use crate::utils::error::{KepcoError, Result};
use url::Url;

pub trait Validate {
    fn validate(&self) -> Result<()>;
}

fn invalid(field_name: &str, value: impl ToString, reason: impl Into<String>) -> KepcoError {
    KepcoError::InvalidConfigValue {
        field: field_name.to_string(),
        value: value.to_string(),
        reason: reason.into(),
    }
}

pub fn validate_url(field_name: &str, url_str: &str) -> Result<()> {
    if url_str.is_empty() {
        return Err(invalid(field_name, url_str, "URL cannot be empty"));
    }

    match Url::parse(url_str) {
        Ok(url) => match url.scheme() {
            "http" | "https" => Ok(()),
            scheme => Err(invalid(
                field_name,
                url_str,
                format!("Unsupported URL scheme: {}", scheme),
            )),
        },
        Err(e) => Err(invalid(field_name, url_str, format!("Invalid URL format: {}", e))),
    }
}

pub fn validate_path(field_name: &str, path: &str) -> Result<()> {
    if path.is_empty() {
        return Err(invalid(field_name, path, "Path cannot be empty"));
    }

    if path.contains('\0') {
        return Err(invalid(field_name, path, "Path contains null bytes"));
    }

    Ok(())
}

pub fn validate_positive_number(field_name: &str, value: u64, min_value: u64) -> Result<()> {
    if value < min_value {
        return Err(invalid(
            field_name,
            value,
            format!("Value must be at least {}", min_value),
        ));
    }
    Ok(())
}

pub fn validate_non_empty_string(field_name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(invalid(
            field_name,
            value,
            "Value cannot be empty or whitespace-only",
        ));
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
        return Err(invalid(
            field_name,
            value,
            format!("Value must be between {} and {}", min, max),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_url() {
        assert!(validate_url("kepco_api.base_url", "https://bigdata.kepco.co.kr/openapi").is_ok());
        assert!(validate_url("kepco_api.base_url", "http://localhost:8080").is_ok());
        assert!(validate_url("kepco_api.base_url", "").is_err());
        assert!(validate_url("kepco_api.base_url", "bigdata.kepco.co.kr").is_err());
        assert!(validate_url("kepco_api.base_url", "ftp://kepco.co.kr").is_err());
    }

    #[test]
    fn test_validate_positive_number() {
        assert!(validate_positive_number("kepco_api.timeout_seconds", 15, 1).is_ok());
        assert!(validate_positive_number("kepco_api.timeout_seconds", 0, 1).is_err());
    }

    #[test]
    fn test_validate_range_and_strings() {
        assert!(validate_range("retry.max_retries", 2u32, 0, 10).is_ok());
        assert!(validate_range("retry.max_retries", 11u32, 0, 10).is_err());
        assert!(validate_non_empty_string("address.code_table_path", "  ").is_err());
        assert!(validate_path("history.dir", "a\0b").is_err());
    }
}
