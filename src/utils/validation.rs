use crate::utils::error::{BotError, Result};
use url::Url;

pub trait Validate {
    fn validate(&self) -> Result<()>;
}

pub fn validate_url(field_name: &str, url_str: &str) -> Result<()> {
    if url_str.is_empty() {
        return Err(BotError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: url_str.to_string(),
            reason: "URL cannot be empty".to_string(),
        });
    }

    match Url::parse(url_str) {
        Ok(url) => match url.scheme() {
            "http" | "https" => Ok(()),
            scheme => Err(BotError::InvalidConfigValueError {
                field: field_name.to_string(),
                value: url_str.to_string(),
                reason: format!("Unsupported URL scheme: {}", scheme),
            }),
        },
        Err(e) => Err(BotError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: url_str.to_string(),
            reason: format!("Invalid URL format: {}", e),
        }),
    }
}

pub fn validate_positive_number(field_name: &str, value: u64, min_value: u64) -> Result<()> {
    if value < min_value {
        return Err(BotError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: format!("Value must be at least {}", min_value),
        });
    }
    Ok(())
}

pub fn validate_non_empty_string(field_name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(BotError::MissingConfigError {
            field: field_name.to_string(),
        });
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
        return Err(BotError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: format!("Value must be between {} and {}", min, max),
        });
    }
    Ok(())
}

/// 檢查上傳檔名的副檔名，回傳小寫的副檔名
pub fn validate_file_extension(file_name: &str, allowed_extensions: &[&str]) -> Result<String> {
    let extension = std::path::Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .ok_or_else(|| BotError::UnsupportedFormat {
            file_name: file_name.to_string(),
        })?;

    if !allowed_extensions.contains(&extension.as_str()) {
        return Err(BotError::UnsupportedFormat {
            file_name: file_name.to_string(),
        });
    }

    Ok(extension)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_url() {
        assert!(validate_url("pricing.api_base", "https://lk.top-ex.ru/api").is_ok());
        assert!(validate_url("pricing.api_base", "http://127.0.0.1:8080").is_ok());
        assert!(validate_url("pricing.api_base", "").is_err());
        assert!(validate_url("pricing.api_base", "invalid-url").is_err());
        assert!(validate_url("pricing.api_base", "ftp://example.com").is_err());
    }

    #[test]
    fn test_validate_positive_number() {
        assert!(validate_positive_number("timeout", 5, 1).is_ok());
        assert!(validate_positive_number("timeout", 0, 1).is_err());
    }

    #[test]
    fn test_validate_non_empty_string() {
        assert!(validate_non_empty_string("TOPEX_EMAIL", "user@example.com").is_ok());
        assert!(matches!(
            validate_non_empty_string("TOPEX_EMAIL", "   "),
            Err(BotError::MissingConfigError { .. })
        ));
    }

    #[test]
    fn test_validate_file_extension() {
        let allowed = ["xlsx", "xls", "csv"];
        assert_eq!(validate_file_extension("routes.XLSX", &allowed).unwrap(), "xlsx");
        assert_eq!(validate_file_extension("routes.csv", &allowed).unwrap(), "csv");
        assert!(validate_file_extension("routes.txt", &allowed).is_err());
        assert!(validate_file_extension("routes", &allowed).is_err());
    }
}
