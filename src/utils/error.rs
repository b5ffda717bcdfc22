use thiserror::Error;

#[derive(Error, Debug)]
pub enum BotError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("Spreadsheet read error: {0}")]
    SpreadsheetReadError(#[from] calamine::Error),

    #[error("Spreadsheet write error: {0}")]
    SpreadsheetWriteError(#[from] rust_xlsxwriter::XlsxError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Invalid value for {field} ('{value}'): {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Validation error: {message}")]
    ValidationError { message: String },

    #[error("File too large: {size} bytes (limit {limit} bytes)")]
    FileTooLarge { size: u64, limit: u64 },

    #[error("Unsupported file format: {file_name}")]
    UnsupportedFormat { file_name: String },

    #[error("Authentication failed: {message}")]
    AuthError { message: String },

    #[error("Pricing request failed: {message}")]
    TransientPricingError { message: String },

    #[error("Failed to deliver result: {message}")]
    DeliveryError { message: String },

    #[error("Chat transport error: {message}")]
    TransportError { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Input,
    Authentication,
    Network,
    Processing,
    Delivery,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl BotError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::ValidationError {
            message: message.into(),
        }
    }

    pub fn auth(message: impl Into<String>) -> Self {
        Self::AuthError {
            message: message.into(),
        }
    }

    pub fn transient(message: impl Into<String>) -> Self {
        Self::TransientPricingError {
            message: message.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::ConfigError { .. }
            | Self::MissingConfigError { .. }
            | Self::InvalidConfigValueError { .. } => ErrorCategory::Configuration,
            Self::ValidationError { .. }
            | Self::FileTooLarge { .. }
            | Self::UnsupportedFormat { .. }
            | Self::CsvError(_)
            | Self::SpreadsheetReadError(_) => ErrorCategory::Input,
            Self::AuthError { .. } => ErrorCategory::Authentication,
            Self::HttpError(_)
            | Self::TransientPricingError { .. }
            | Self::TransportError { .. } => ErrorCategory::Network,
            Self::SpreadsheetWriteError(_) => ErrorCategory::Processing,
            Self::DeliveryError { .. } => ErrorCategory::Delivery,
            Self::IoError(_) => ErrorCategory::System,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Input => ErrorSeverity::Low,
            ErrorCategory::Network => ErrorSeverity::Medium,
            ErrorCategory::Authentication
            | ErrorCategory::Processing
            | ErrorCategory::Delivery => ErrorSeverity::High,
            ErrorCategory::Configuration | ErrorCategory::System => ErrorSeverity::Critical,
        }
    }

    /// 給聊天使用者看的訊息，不含內部細節
    pub fn user_friendly_message(&self) -> String {
        match self {
            Self::ValidationError { message } => {
                format!("❌ The file could not be read: {}", message)
            }
            Self::FileTooLarge { limit, .. } => {
                format!("❌ The file is too large. Maximum size: {}", format_size(*limit))
            }
            Self::UnsupportedFormat { .. } => {
                "❌ Only spreadsheet files are supported (.xlsx, .xls, .csv)".to_string()
            }
            Self::CsvError(_) | Self::SpreadsheetReadError(_) => {
                "❌ The file is not a readable spreadsheet".to_string()
            }
            Self::AuthError { .. } => {
                "❌ Could not sign in to the pricing service. Please try again later"
                    .to_string()
            }
            Self::DeliveryError { .. } => {
                "❌ The results were calculated but could not be sent. Please try again"
                    .to_string()
            }
            _ => "❌ Something went wrong while processing the file".to_string(),
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self.category() {
            ErrorCategory::Configuration => "Check the environment variables and the config file",
            ErrorCategory::Input => {
                "Make sure the first row has 'From'/'To' (or 'Откуда'/'Куда') headers"
            }
            ErrorCategory::Authentication => "Verify TOPEX_EMAIL and TOPEX_PASSWORD",
            ErrorCategory::Network => "Check network connectivity and the service status",
            ErrorCategory::Processing => "Retry the request; report it if it keeps failing",
            ErrorCategory::Delivery => "Check the chat transport token and connectivity",
            ErrorCategory::System => "Check file permissions and free disk space",
        }
    }
}

pub type Result<T> = std::result::Result<T, BotError>;

/// 人看得懂的檔案大小：MB / KB 取一位小數，整數時省略小數
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = 1024 * 1024;

    let (value, unit) = match bytes {
        b if b >= MB => (b as f64 / MB as f64, "MB"),
        b if b >= KB => (b as f64 / KB as f64, "KB"),
        b => return format!("{} bytes", b),
    };
    let rounded = (value * 10.0).round() / 10.0;
    if rounded.fract() == 0.0 {
        format!("{} {}", rounded as u64, unit)
    } else {
        format!("{:.1} {}", rounded, unit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_and_severity() {
        let err = BotError::validation("no origin column");
        assert_eq!(err.category(), ErrorCategory::Input);
        assert_eq!(err.severity(), ErrorSeverity::Low);

        let err = BotError::auth("bad password");
        assert_eq!(err.category(), ErrorCategory::Authentication);
        assert_eq!(err.severity(), ErrorSeverity::High);

        let err = BotError::MissingConfigError {
            field: "TOPEX_EMAIL".to_string(),
        };
        assert_eq!(err.severity(), ErrorSeverity::Critical);
    }

    #[test]
    fn test_user_messages_are_distinct() {
        let parse = BotError::validation("x").user_friendly_message();
        let auth = BotError::auth("x").user_friendly_message();
        let size = BotError::FileTooLarge {
            size: 20 * 1024 * 1024,
            limit: 10 * 1024 * 1024,
        }
        .user_friendly_message();
        let delivery = BotError::DeliveryError {
            message: "x".to_string(),
        }
        .user_friendly_message();

        assert!(size.contains("10 MB"));
        assert_ne!(parse, auth);
        assert_ne!(auth, size);
        assert_ne!(size, delivery);
    }

    #[test]
    fn test_format_size_below_one_megabyte() {
        assert_eq!(format_size(10 * 1024 * 1024), "10 MB");
        assert_eq!(format_size(1536 * 1024), "1.5 MB");
        assert_eq!(format_size(512 * 1024), "512 KB");
        assert_eq!(format_size(100), "100 bytes");

        let message = BotError::FileTooLarge {
            size: 4096,
            limit: 1024,
        }
        .user_friendly_message();
        assert!(message.contains("Maximum size: 1 KB"));
        assert!(!message.contains("0 MB"));
    }
}
