use crate::domain::model::{WeightTier, DEFAULT_WEIGHT_TIERS};
use crate::utils::error::{BotError, Result};
use crate::utils::validation::{
    validate_non_empty_string, validate_positive_number, validate_range, validate_url, Validate,
};
use regex::Regex;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_API_BASE: &str = "https://lk.top-ex.ru/api";
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 30;
pub const DEFAULT_RATE_LIMIT_DELAY_MS: u64 = 1_000;
pub const DEFAULT_TOKEN_REFRESH_BUFFER_SECONDS: u64 = 300;
pub const DEFAULT_MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;
pub const DEFAULT_CURRENCY: &str = "RUB";

/// TOML 設定檔內容，所有欄位皆可省略
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileConfig {
    pub pricing: Option<PricingSection>,
    pub quotes: Option<QuotesSection>,
    pub limits: Option<LimitsSection>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PricingSection {
    pub api_base: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub timeout_seconds: Option<u64>,
    pub rate_limit_delay_ms: Option<u64>,
    pub token_refresh_buffer_seconds: Option<u64>,
    pub currency: Option<String>,
    /// Extra query parameters sent with every cost-calculation call.
    pub params: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QuotesSection {
    pub weight_tiers_kg: Option<Vec<f64>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LimitsSection {
    pub max_file_size: Option<u64>,
}

impl FileConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(BotError::IoError)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = substitute_env_vars(content);

        toml::from_str(&processed_content).map_err(|e| BotError::ConfigError {
            message: format!("TOML parsing error: {}", e),
        })
    }
}

/// 替換 `${VAR}` 形式的環境變數；未設定的變數保持原樣
fn substitute_env_vars(content: &str) -> String {
    let re = Regex::new(r"\$\{([^}]+)\}").expect("valid env var pattern");

    re.replace_all(content, |caps: &regex::Captures| {
        let var_name = &caps[1];
        std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
    })
    .into_owned()
}

/// Command-line / environment overrides. `None` falls back to the file, then defaults.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub api_base: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub timeout_seconds: Option<u64>,
    pub rate_limit_delay_ms: Option<u64>,
    pub max_file_size: Option<u64>,
    pub weight_tiers_kg: Vec<f64>,
}

#[derive(Debug, Clone)]
pub struct PricingSettings {
    pub api_base: String,
    pub email: String,
    pub password: SecretString,
    pub request_timeout: Duration,
    pub rate_limit_delay: Duration,
    pub token_refresh_buffer: Duration,
    pub currency: String,
    pub extra_params: BTreeMap<String, String>,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub pricing: PricingSettings,
    pub max_file_size: u64,
    pub weight_tiers: Vec<WeightTier>,
}

impl Settings {
    pub fn resolve(overrides: Overrides, file: FileConfig) -> Result<Self> {
        let pricing = file.pricing.unwrap_or_default();
        let quotes = file.quotes.unwrap_or_default();
        let limits = file.limits.unwrap_or_default();

        let tiers_kg = if !overrides.weight_tiers_kg.is_empty() {
            Some(overrides.weight_tiers_kg)
        } else {
            quotes.weight_tiers_kg
        };
        let weight_tiers = match tiers_kg {
            Some(values) => parse_weight_tiers(&values)?,
            None => DEFAULT_WEIGHT_TIERS.to_vec(),
        };

        let password = overrides.password.or(pricing.password).unwrap_or_default();

        Ok(Self {
            pricing: PricingSettings {
                api_base: overrides
                    .api_base
                    .or(pricing.api_base)
                    .unwrap_or_else(|| DEFAULT_API_BASE.to_string())
                    .trim_end_matches('/')
                    .to_string(),
                email: overrides.email.or(pricing.email).unwrap_or_default(),
                password: SecretString::from(password),
                request_timeout: Duration::from_secs(
                    overrides
                        .timeout_seconds
                        .or(pricing.timeout_seconds)
                        .unwrap_or(DEFAULT_TIMEOUT_SECONDS),
                ),
                rate_limit_delay: Duration::from_millis(
                    overrides
                        .rate_limit_delay_ms
                        .or(pricing.rate_limit_delay_ms)
                        .unwrap_or(DEFAULT_RATE_LIMIT_DELAY_MS),
                ),
                token_refresh_buffer: Duration::from_secs(
                    pricing
                        .token_refresh_buffer_seconds
                        .unwrap_or(DEFAULT_TOKEN_REFRESH_BUFFER_SECONDS),
                ),
                currency: pricing
                    .currency
                    .unwrap_or_else(|| DEFAULT_CURRENCY.to_string()),
                extra_params: pricing.params.unwrap_or_default(),
            },
            max_file_size: overrides
                .max_file_size
                .or(limits.max_file_size)
                .unwrap_or(DEFAULT_MAX_FILE_SIZE),
            weight_tiers,
        })
    }
}

pub fn parse_weight_tiers(values: &[f64]) -> Result<Vec<WeightTier>> {
    let mut tiers: Vec<WeightTier> = Vec::with_capacity(values.len());
    for value in values {
        let tier = WeightTier::from_kg(*value).ok_or_else(|| BotError::InvalidConfigValueError {
            field: "quotes.weight_tiers_kg".to_string(),
            value: value.to_string(),
            reason: "Weight must be a positive number of kilograms".to_string(),
        })?;
        if tiers.contains(&tier) {
            return Err(BotError::InvalidConfigValueError {
                field: "quotes.weight_tiers_kg".to_string(),
                value: value.to_string(),
                reason: "Duplicate weight tier".to_string(),
            });
        }
        tiers.push(tier);
    }
    Ok(tiers)
}

impl Validate for Settings {
    fn validate(&self) -> Result<()> {
        validate_url("pricing.api_base", &self.pricing.api_base)?;
        validate_non_empty_string("TOPEX_EMAIL", &self.pricing.email)?;
        validate_non_empty_string("TOPEX_PASSWORD", self.pricing.password.expose_secret())?;
        validate_range(
            "pricing.timeout_seconds",
            self.pricing.request_timeout.as_secs(),
            1,
            600,
        )?;
        validate_range(
            "pricing.rate_limit_delay_ms",
            self.pricing.rate_limit_delay.as_millis() as u64,
            0,
            60_000,
        )?;
        validate_positive_number("limits.max_file_size", self.max_file_size, 1)?;
        validate_non_empty_string("pricing.currency", &self.pricing.currency)?;

        if self.weight_tiers.is_empty() {
            return Err(BotError::InvalidConfigValueError {
                field: "quotes.weight_tiers_kg".to_string(),
                value: "[]".to_string(),
                reason: "At least one weight tier is required".to_string(),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn credentials() -> Overrides {
        Overrides {
            email: Some("ops@example.com".to_string()),
            password: Some("secret".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::resolve(credentials(), FileConfig::default()).unwrap();

        assert_eq!(settings.pricing.api_base, DEFAULT_API_BASE);
        assert_eq!(settings.pricing.request_timeout, Duration::from_secs(30));
        assert_eq!(settings.pricing.rate_limit_delay, Duration::from_secs(1));
        assert_eq!(settings.max_file_size, 10 * 1024 * 1024);
        assert_eq!(settings.weight_tiers, DEFAULT_WEIGHT_TIERS.to_vec());
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_parse_toml_config() {
        let toml_content = r#"
[pricing]
api_base = "https://pricing.example.com/api/"
timeout_seconds = 15
rate_limit_delay_ms = 250
currency = "KZT"

[pricing.params]
userId = "14"
cargoSeatsNumber = "1"

[quotes]
weight_tiers_kg = [0.5, 1, 20]

[limits]
max_file_size = 1048576
"#;

        let file = FileConfig::from_toml_str(toml_content).unwrap();
        let settings = Settings::resolve(credentials(), file).unwrap();

        assert_eq!(settings.pricing.api_base, "https://pricing.example.com/api");
        assert_eq!(settings.pricing.request_timeout, Duration::from_secs(15));
        assert_eq!(settings.pricing.rate_limit_delay, Duration::from_millis(250));
        assert_eq!(settings.pricing.currency, "KZT");
        assert_eq!(settings.pricing.extra_params.get("userId").unwrap(), "14");
        assert_eq!(
            settings.weight_tiers,
            vec![
                WeightTier::from_grams(500),
                WeightTier::from_grams(1_000),
                WeightTier::from_grams(20_000)
            ]
        );
        assert_eq!(settings.max_file_size, 1_048_576);
    }

    #[test]
    fn test_overrides_win_over_file() {
        let file = FileConfig::from_toml_str(
            r#"
[pricing]
timeout_seconds = 15
email = "file@example.com"
"#,
        )
        .unwrap();
        let overrides = Overrides {
            timeout_seconds: Some(5),
            weight_tiers_kg: vec![3.0],
            ..credentials()
        };

        let settings = Settings::resolve(overrides, file).unwrap();
        assert_eq!(settings.pricing.request_timeout, Duration::from_secs(5));
        assert_eq!(settings.pricing.email, "ops@example.com");
        assert_eq!(settings.weight_tiers, vec![WeightTier::from_grams(3_000)]);
    }

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("SHIPQUOTE_TEST_EMAIL", "env@example.com");

        let file = FileConfig::from_toml_str(
            r#"
[pricing]
email = "${SHIPQUOTE_TEST_EMAIL}"
password = "${SHIPQUOTE_TEST_UNSET_VAR}"
"#,
        )
        .unwrap();
        let pricing = file.pricing.unwrap();
        assert_eq!(pricing.email.as_deref(), Some("env@example.com"));
        assert_eq!(pricing.password.as_deref(), Some("${SHIPQUOTE_TEST_UNSET_VAR}"));

        std::env::remove_var("SHIPQUOTE_TEST_EMAIL");
    }

    #[test]
    fn test_missing_credentials_fail_validation() {
        let settings = Settings::resolve(Overrides::default(), FileConfig::default()).unwrap();
        assert!(matches!(
            settings.validate(),
            Err(BotError::MissingConfigError { .. })
        ));
    }

    #[test]
    fn test_invalid_weight_tiers() {
        assert!(parse_weight_tiers(&[0.5, -1.0]).is_err());
        assert!(parse_weight_tiers(&[1.0, 1.0]).is_err());
        assert!(parse_weight_tiers(&[0.5, 1.0]).is_ok());
    }

    #[test]
    fn test_invalid_api_base_fails_validation() {
        let overrides = Overrides {
            api_base: Some("not a url".to_string()),
            ..credentials()
        };
        let settings = Settings::resolve(overrides, FileConfig::default()).unwrap();
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file
            .write_all(b"[limits]\nmax_file_size = 2048\n")
            .unwrap();

        let file = FileConfig::from_file(temp_file.path()).unwrap();
        assert_eq!(file.limits.unwrap().max_file_size, Some(2048));
    }
}
