use anyhow::Context;
use clap::Parser;
use secrecy::SecretString;
use shipquote::app::bot::run_polling;
use shipquote::app::local::run_local_quote;
use shipquote::config::Command;
use shipquote::core::PricingApi;
use shipquote::utils::error::{BotError, ErrorSeverity};
use shipquote::utils::validation::{validate_non_empty_string, validate_url, Validate};
use shipquote::utils::logger;
use shipquote::{
    BotHandler, CliConfig, LocalStorage, PricingClient, QuoteService, TelegramTransport,
};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

fn exit_with(e: &BotError) -> ! {
    tracing::error!(
        "❌ {} (Category: {:?}, Severity: {:?})",
        e,
        e.category(),
        e.severity()
    );
    tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

    eprintln!("❌ {}", e.user_friendly_message());
    eprintln!("💡 建議: {}", e.recovery_suggestion());

    // 根據錯誤嚴重程度決定退出碼
    let exit_code = match e.severity() {
        ErrorSeverity::Low | ErrorSeverity::High => 1,
        ErrorSeverity::Medium => 2,
        ErrorSeverity::Critical => 3,
    };
    std::process::exit(exit_code);
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = CliConfig::parse();

    logger::init_logger(cli.verbose, cli.log_json);
    tracing::info!("Starting shipquote");

    // 驗證配置
    let settings = match cli.settings().and_then(|s| s.validate().map(|_| s)) {
        Ok(settings) => settings,
        Err(e) => {
            tracing::error!("❌ Configuration validation failed: {}", e);
            exit_with(&e);
        }
    };
    tracing::debug!(
        "Pricing API: {}, tiers: {:?}, rate delay: {:?}",
        settings.pricing.api_base,
        settings.weight_tiers,
        settings.pricing.rate_limit_delay
    );

    let pricing = Arc::new(
        PricingClient::new(settings.pricing.clone()).context("failed to build the pricing client")?,
    );
    let service = QuoteService::new(Arc::clone(&pricing), &settings);

    match cli.command {
        Command::Serve {
            telegram_token,
            telegram_api_base,
            poll_timeout_seconds,
            archive_dir,
        } => {
            if let Err(e) = validate_non_empty_string("TELEGRAM_BOT_TOKEN", &telegram_token)
                .and_then(|_| validate_url("telegram_api_base", &telegram_api_base))
            {
                exit_with(&e);
            }

            // 先登入一次，帳密錯誤可以在啟動時就看到
            if let Err(e) = pricing.authenticate().await {
                tracing::warn!(
                    "⚠️ Initial pricing login failed: {} (will retry per upload)",
                    e
                );
            }

            let transport = Arc::new(
                TelegramTransport::new(
                    &telegram_api_base,
                    SecretString::from(telegram_token),
                    Duration::from_secs(poll_timeout_seconds),
                )
                .context("failed to build the Telegram client")?,
            );
            let archive = archive_dir.map(LocalStorage::new);
            let handler = Arc::new(BotHandler::new(service, transport, archive));

            if let Err(e) = run_polling(handler, poll_timeout_seconds).await {
                exit_with(&e);
            }
        }
        Command::Quote { input, output_dir } => {
            let Some(file_name) = input.file_name().map(|n| n.to_string_lossy().into_owned())
            else {
                exit_with(&BotError::validation(format!(
                    "not a file: {}",
                    input.display()
                )));
            };
            let source_dir = input
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or(Path::new("."));
            let source = LocalStorage::new(source_dir);
            let storage = LocalStorage::new(output_dir);
            match run_local_quote(&service, &source, &file_name, &storage).await {
                Ok(output) => {
                    let path = storage.full_path(&output.file_name);
                    tracing::info!("✅ Quote run completed: {:?}", output.summary);
                    println!(
                        "✅ Priced {} of {} cells ({}%) for {} routes",
                        output.summary.priced,
                        output.summary.cells,
                        output.summary.success_rate(),
                        output.summary.routes
                    );
                    if output.summary.format_fallback {
                        println!("📄 Spreadsheet output failed, wrote CSV instead");
                    }
                    println!("📁 Output saved to: {}", path.display());
                }
                Err(e) => exit_with(&e),
            }
        }
    }

    Ok(())
}
