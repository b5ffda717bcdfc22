pub mod settings;

use crate::config::settings::{FileConfig, Overrides, Settings};
use crate::utils::error::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Clone, Parser)]
#[command(name = "shipquote")]
#[command(
    about = "Prices shipping routes from a spreadsheet and returns the cheapest offer per weight tier"
)]
pub struct CliConfig {
    /// Optional TOML configuration file
    #[arg(long, global = true, env = "SHIPQUOTE_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(flatten)]
    pub pricing: PricingArgs,

    #[arg(long, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, global = true, help = "Emit logs as JSON")]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Args)]
pub struct PricingArgs {
    #[arg(long, env = "TOPEX_API_BASE")]
    pub api_base: Option<String>,

    #[arg(long, env = "TOPEX_EMAIL")]
    pub email: Option<String>,

    #[arg(long, env = "TOPEX_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Per-call timeout for the pricing service
    #[arg(long, env = "API_TIMEOUT")]
    pub timeout_seconds: Option<u64>,

    /// Minimum delay between consecutive pricing calls
    #[arg(long, env = "RATE_LIMIT_DELAY_MS")]
    pub rate_limit_delay_ms: Option<u64>,

    /// Maximum accepted input file size in bytes
    #[arg(long, env = "MAX_FILE_SIZE")]
    pub max_file_size: Option<u64>,

    /// Weight tiers in kilograms, e.g. 0.5,1,2,5,10
    #[arg(long, env = "WEIGHT_TIERS_KG", value_delimiter = ',')]
    pub weight_tiers: Vec<f64>,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Run the Telegram bot (long polling)
    Serve {
        #[arg(long, env = "TELEGRAM_BOT_TOKEN", hide_env_values = true)]
        telegram_token: String,

        #[arg(long, env = "TELEGRAM_API_BASE", default_value = "https://api.telegram.org")]
        telegram_api_base: String,

        #[arg(long, default_value = "30")]
        poll_timeout_seconds: u64,

        /// Keep a copy of every result file in this directory
        #[arg(long)]
        archive_dir: Option<String>,
    },

    /// Price a local spreadsheet once and write the result file
    Quote {
        #[arg(long)]
        input: PathBuf,

        #[arg(long, default_value = "./output")]
        output_dir: String,
    },
}

impl CliConfig {
    /// 合併設定檔與命令列/環境變數
    pub fn settings(&self) -> Result<Settings> {
        let file = match &self.config {
            Some(path) => {
                tracing::info!("📁 Loading configuration from: {}", path.display());
                FileConfig::from_file(path)?
            }
            None => FileConfig::default(),
        };

        let overrides = Overrides {
            api_base: self.pricing.api_base.clone(),
            email: self.pricing.email.clone(),
            password: self.pricing.password.clone(),
            timeout_seconds: self.pricing.timeout_seconds,
            rate_limit_delay_ms: self.pricing.rate_limit_delay_ms,
            max_file_size: self.pricing.max_file_size,
            weight_tiers_kg: self.pricing.weight_tiers.clone(),
        };

        Settings::resolve(overrides, file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_quote_command() {
        let cli = CliConfig::try_parse_from([
            "shipquote",
            "--email",
            "ops@example.com",
            "--password",
            "secret",
            "--weight-tiers",
            "1,2.5",
            "quote",
            "--input",
            "routes.xlsx",
        ])
        .unwrap();

        match &cli.command {
            Command::Quote { input, output_dir } => {
                assert_eq!(input, &PathBuf::from("routes.xlsx"));
                assert_eq!(output_dir, "./output");
            }
            other => panic!("unexpected command: {:?}", other),
        }

        let settings = cli.settings().unwrap();
        assert_eq!(settings.weight_tiers.len(), 2);
        assert_eq!(settings.weight_tiers[1].grams(), 2_500);
    }

    #[test]
    fn test_parse_serve_command() {
        let cli = CliConfig::try_parse_from([
            "shipquote",
            "serve",
            "--telegram-token",
            "123:abc",
            "--archive-dir",
            "/tmp/results",
            "--verbose",
        ])
        .unwrap();

        assert!(cli.verbose);
        assert!(matches!(
            cli.command,
            Command::Serve { ref archive_dir, .. } if archive_dir.as_deref() == Some("/tmp/results")
        ));
    }
}
