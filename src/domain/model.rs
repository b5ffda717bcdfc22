use serde::{Deserialize, Serialize};
use std::fmt;

pub type ChatId = i64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
    pub origin: String,
    pub destination: String,
}

impl Route {
    pub fn new(origin: impl Into<String>, destination: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
            destination: destination.into(),
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} → {}", self.origin, self.destination)
    }
}

/// 重量級距，以公克儲存避免浮點比較
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WeightTier {
    grams: u32,
}

pub const DEFAULT_WEIGHT_TIERS: [WeightTier; 5] = [
    WeightTier::from_grams(500),
    WeightTier::from_grams(1_000),
    WeightTier::from_grams(2_000),
    WeightTier::from_grams(5_000),
    WeightTier::from_grams(10_000),
];

impl WeightTier {
    pub const fn from_grams(grams: u32) -> Self {
        Self { grams }
    }

    /// Returns `None` for non-positive or non-finite input.
    pub fn from_kg(kg: f64) -> Option<Self> {
        if !kg.is_finite() || kg <= 0.0 {
            return None;
        }
        let grams = (kg * 1000.0).round();
        if grams < 1.0 || grams > u32::MAX as f64 {
            return None;
        }
        Some(Self::from_grams(grams as u32))
    }

    pub fn grams(&self) -> u32 {
        self.grams
    }

    pub fn kg(&self) -> f64 {
        self.grams as f64 / 1000.0
    }
}

impl fmt::Display for WeightTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} kg", self.kg())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Offer {
    pub carrier: String,
    pub tariff: Option<String>,
    pub price: f64,
    pub currency: String,
    pub delivery_days: Option<u32>,
    pub tier: WeightTier,
    pub route: Route,
}

/// 單次報價呼叫的結果；非授權類的失敗都落在 `Unavailable`
#[derive(Debug, Clone, PartialEq)]
pub enum QuoteOutcome {
    Offers(Vec<Offer>),
    Unavailable { reason: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum TierResult {
    Cheapest(Offer),
    Unavailable { reason: String },
}

impl TierResult {
    pub fn offer(&self) -> Option<&Offer> {
        match self {
            Self::Cheapest(offer) => Some(offer),
            Self::Unavailable { .. } => None,
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, Self::Cheapest(_))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AggregatedResult {
    pub route: Route,
    /// One entry per requested tier, in configuration order.
    pub tiers: Vec<(WeightTier, TierResult)>,
}

impl AggregatedResult {
    pub fn get(&self, tier: WeightTier) -> Option<&TierResult> {
        self.tiers
            .iter()
            .find(|(candidate, _)| *candidate == tier)
            .map(|(_, result)| result)
    }

    pub fn available_count(&self) -> usize {
        self.tiers.iter().filter(|(_, r)| r.is_available()).count()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableFormat {
    Xlsx,
    Xls,
    Csv,
}

impl TableFormat {
    pub const ALLOWED_EXTENSIONS: [&'static str; 3] = ["xlsx", "xls", "csv"];

    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension.to_ascii_lowercase().as_str() {
            "xlsx" => Some(Self::Xlsx),
            "xls" => Some(Self::Xls),
            "csv" => Some(Self::Csv),
            _ => None,
        }
    }

    /// 輸出格式：試算表一律寫成 xlsx
    pub fn output_format(self) -> Self {
        match self {
            Self::Xlsx | Self::Xls => Self::Xlsx,
            Self::Csv => Self::Csv,
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Xlsx => "xlsx",
            Self::Xls => "xls",
            Self::Csv => "csv",
        }
    }
}

/// Header row plus data rows, all cells stringified.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

#[derive(Debug, Clone)]
pub struct InputDocument {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct ReportFile {
    pub file_name: String,
    pub format: TableFormat,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentRef {
    pub file_id: String,
    pub file_name: String,
    pub file_size: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BotCommand {
    Start,
    Help,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatEvent {
    Command {
        chat_id: ChatId,
        command: BotCommand,
    },
    Text {
        chat_id: ChatId,
        text: String,
    },
    Document {
        chat_id: ChatId,
        document: DocumentRef,
    },
}

impl ChatEvent {
    pub fn chat_id(&self) -> ChatId {
        match self {
            Self::Command { chat_id, .. }
            | Self::Text { chat_id, .. }
            | Self::Document { chat_id, .. } => *chat_id,
        }
    }
}

/// 每個上傳檔案的處理階段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStage {
    Received,
    Parsed,
    Authenticated,
    Pricing,
    Aggregated,
    Rendered,
    Delivered,
}

impl fmt::Display for RunStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Received => "received",
            Self::Parsed => "parsed",
            Self::Authenticated => "authenticated",
            Self::Pricing => "pricing",
            Self::Aggregated => "aggregated",
            Self::Rendered => "rendered",
            Self::Delivered => "delivered",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub routes: usize,
    pub cells: usize,
    pub priced: usize,
    pub unavailable: usize,
    /// 每個級距有報價的路線數，依設定順序
    pub per_tier: Vec<(WeightTier, usize)>,
    /// 1-based spreadsheet row numbers that were skipped as blank.
    pub skipped_rows: Vec<usize>,
    /// 試算表輸出失敗，改送 CSV
    pub format_fallback: bool,
}

impl RunSummary {
    pub fn is_partial(&self) -> bool {
        self.unavailable > 0
    }

    /// 成功率（百分比，四捨五入）；沒有任何格子時為 0
    pub fn success_rate(&self) -> u32 {
        if self.cells == 0 {
            return 0;
        }
        ((self.priced as f64 / self.cells as f64) * 100.0).round() as u32
    }
}
