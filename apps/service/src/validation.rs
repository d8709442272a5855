use thiserror::Error;
use url::Url;

pub const MIN_INTERVAL_SECONDS: u64 = 1;
pub const MAX_INTERVAL_SECONDS: u64 = 86_400;
const MAX_NAME_LENGTH: usize = 100;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Name cannot be empty")]
    EmptyName,
    #[error("Name too long (max 100 characters)")]
    NameTooLong,
    #[error("URL cannot be empty")]
    EmptyUrl,
    #[error("URL must include scheme (http:// or https://)")]
    MissingScheme,
    #[error("Invalid scheme '{0}'. Must be http or https")]
    UnsupportedScheme(String),
    #[error("URL must have a valid host")]
    MissingHost,
    #[error("Invalid URL: {0}")]
    Malformed(String),
    #[error("Interval must be between 1 and 86400 seconds, got {0}")]
    IntervalOutOfRange(u64),
}

pub fn validate_service_name(name: &str) -> Result<(), ValidationError> {
    let trimmed = name.trim();

    if trimmed.is_empty() {
        return Err(ValidationError::EmptyName);
    }
    if trimmed.chars().count() > MAX_NAME_LENGTH {
        return Err(ValidationError::NameTooLong);
    }

    Ok(())
}

/// Only http and https targets can be probed
pub fn validate_service_url(target: &str) -> Result<(), ValidationError> {
    if target.trim().is_empty() {
        return Err(ValidationError::EmptyUrl);
    }

    match Url::parse(target) {
        Ok(url) => {
            let scheme = url.scheme();
            if scheme != "http" && scheme != "https" {
                return Err(ValidationError::UnsupportedScheme(scheme.to_string()));
            }
            if url.host_str().is_none_or(str::is_empty) {
                return Err(ValidationError::MissingHost);
            }
            Ok(())
        }
        Err(_) if !target.contains("://") => Err(ValidationError::MissingScheme),
        Err(e) => Err(ValidationError::Malformed(e.to_string())),
    }
}

pub fn validate_interval(interval_seconds: u64) -> Result<(), ValidationError> {
    if !(MIN_INTERVAL_SECONDS..=MAX_INTERVAL_SECONDS).contains(&interval_seconds) {
        return Err(ValidationError::IntervalOutOfRange(interval_seconds));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_validation() {
        assert!(validate_service_url("http://example.com").is_ok());
        assert!(validate_service_url("https://example.com/health").is_ok());
        assert!(validate_service_url("http://192.168.1.1:8080/path").is_ok());

        assert_eq!(validate_service_url(""), Err(ValidationError::EmptyUrl));
        assert_eq!(validate_service_url("example.com"), Err(ValidationError::MissingScheme));
        assert_eq!(
            validate_service_url("ftp://example.com"),
            Err(ValidationError::UnsupportedScheme("ftp".to_string()))
        );
        assert!(validate_service_url("http://").is_err());
    }

    #[test]
    fn test_name_validation() {
        assert!(validate_service_name("Billing API").is_ok());
        assert_eq!(validate_service_name("   "), Err(ValidationError::EmptyName));
        assert_eq!(validate_service_name(&"x".repeat(101)), Err(ValidationError::NameTooLong));
    }

    #[test]
    fn test_interval_validation() {
        assert!(validate_interval(1).is_ok());
        assert!(validate_interval(86_400).is_ok());

        assert_eq!(validate_interval(0), Err(ValidationError::IntervalOutOfRange(0)));
        assert!(validate_interval(86_401).is_err());
    }
}
