pub mod adapters;
pub mod app;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

pub use crate::adapters::{
    pricing::PricingClient, storage::LocalStorage, telegram::TelegramTransport,
};
pub use crate::app::bot::BotHandler;
pub use crate::config::CliConfig;
pub use crate::core::orchestrator::QuoteService;
pub use crate::utils::error::{BotError, Result};
