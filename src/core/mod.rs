pub mod aggregator;
pub mod extractor;
pub mod orchestrator;
pub mod rate_limit;
pub mod renderer;

pub use crate::domain::model::{
    AggregatedResult, ChatEvent, ChatId, InputDocument, Offer, QuoteOutcome, ReportFile, Route,
    RunStage, RunSummary, Table, TableFormat, TierResult, WeightTier, DEFAULT_WEIGHT_TIERS,
};
pub use crate::domain::ports::{ChatTransport, PricingApi, Storage};
pub use crate::utils::error::Result;
