use crate::adapters::tabular::read_table;
use crate::config::settings::Settings;
use crate::core::aggregator::{OfferAggregator, RouteQuotes};
use crate::core::extractor::RouteExtractor;
use crate::core::renderer::ResultRenderer;
use crate::core::{
    AggregatedResult, InputDocument, PricingApi, ReportFile, RunStage, RunSummary, TableFormat,
    WeightTier,
};
use crate::utils::error::{format_size, BotError, Result};
use crate::utils::validation::validate_file_extension;
use std::fmt;
use std::sync::Arc;

/// 摘要中最多列出的略過列數
const MAX_LISTED_SKIPPED_ROWS: usize = 20;

/// 在某個階段中止的執行，帶著給使用者看的原因
#[derive(Debug)]
pub struct RunFailure {
    pub stage: RunStage,
    pub error: BotError,
}

impl fmt::Display for RunFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed after stage '{}': {}", self.stage, self.error)
    }
}

impl std::error::Error for RunFailure {}

impl RunFailure {
    pub fn user_message(&self) -> String {
        self.error.user_friendly_message()
    }
}

#[derive(Debug)]
pub struct CompletedRun {
    pub report: ReportFile,
    pub results: Vec<AggregatedResult>,
    pub summary: RunSummary,
}

/// Tracks the current stage so a failure can report where it happened.
struct RunTracker<'a> {
    file_name: &'a str,
    stage: RunStage,
}

impl<'a> RunTracker<'a> {
    fn new(file_name: &'a str) -> Self {
        tracing::info!("📥 [{}] stage: {}", file_name, RunStage::Received);
        Self {
            file_name,
            stage: RunStage::Received,
        }
    }

    fn advance(&mut self, stage: RunStage) {
        tracing::info!("➡️ [{}] stage: {} → {}", self.file_name, self.stage, stage);
        self.stage = stage;
    }

    fn fail(&self, error: BotError) -> RunFailure {
        tracing::error!(
            "❌ [{}] failed after stage '{}': {} (Category: {:?})",
            self.file_name,
            self.stage,
            error,
            error.category()
        );
        RunFailure {
            stage: self.stage,
            error,
        }
    }
}

pub struct QuoteService<P: PricingApi + ?Sized> {
    pricing: Arc<P>,
    extractor: RouteExtractor,
    aggregator: OfferAggregator,
    renderer: ResultRenderer,
    tiers: Vec<WeightTier>,
    max_file_size: u64,
}

impl<P: PricingApi + ?Sized> QuoteService<P> {
    pub fn new(pricing: Arc<P>, settings: &Settings) -> Self {
        Self::with_limits(pricing, settings.weight_tiers.clone(), settings.max_file_size)
    }

    pub fn with_limits(pricing: Arc<P>, tiers: Vec<WeightTier>, max_file_size: u64) -> Self {
        Self {
            pricing,
            extractor: RouteExtractor::default(),
            aggregator: OfferAggregator::new(tiers.clone()),
            renderer: ResultRenderer::new(tiers.clone()),
            tiers,
            max_file_size,
        }
    }

    pub fn tiers(&self) -> &[WeightTier] {
        &self.tiers
    }

    pub fn max_file_size(&self) -> u64 {
        self.max_file_size
    }

    pub fn check_size(&self, size: u64) -> Result<()> {
        if size > self.max_file_size {
            return Err(BotError::FileTooLarge {
                size,
                limit: self.max_file_size,
            });
        }
        Ok(())
    }

    pub fn input_format(file_name: &str) -> Result<TableFormat> {
        let extension = validate_file_extension(file_name, &TableFormat::ALLOWED_EXTENSIONS)?;
        TableFormat::from_extension(&extension).ok_or_else(|| BotError::UnsupportedFormat {
            file_name: file_name.to_string(),
        })
    }

    /// Received → Parsed → Authenticated → Pricing → Aggregated → Rendered.
    ///
    /// 單一路線/級距的失敗不會中止流程，只會在結果中標記為 unavailable；
    /// 只有授權失敗（重試一次後）會在 Pricing 階段中止。
    pub async fn process(
        &self,
        document: &InputDocument,
    ) -> std::result::Result<CompletedRun, RunFailure> {
        let mut run = RunTracker::new(&document.file_name);

        // 大小與格式檢查在解析之前
        self.check_size(document.bytes.len() as u64)
            .map_err(|e| run.fail(e))?;
        let format = Self::input_format(&document.file_name).map_err(|e| run.fail(e))?;

        let table = read_table(&document.bytes, format).map_err(|e| run.fail(e))?;
        let extracted = self.extractor.extract(&table).map_err(|e| run.fail(e))?;
        run.advance(RunStage::Parsed);

        self.pricing
            .ensure_authenticated()
            .await
            .map_err(|e| run.fail(e))?;
        run.advance(RunStage::Authenticated);

        run.advance(RunStage::Pricing);
        let total = extracted.routes.len() * self.tiers.len();
        let mut quotes = Vec::with_capacity(extracted.routes.len());
        for (index, route) in extracted.routes.iter().enumerate() {
            let mut route_quotes = RouteQuotes::new(route.clone());
            for (tier_index, &tier) in self.tiers.iter().enumerate() {
                tracing::info!(
                    "💰 [{}/{}] {} ({})",
                    index * self.tiers.len() + tier_index + 1,
                    total,
                    route,
                    tier
                );
                let outcome = self
                    .pricing
                    .quote(route, tier)
                    .await
                    .map_err(|e| run.fail(e))?;
                route_quotes.record(tier, outcome);
            }
            quotes.push(route_quotes);
        }

        let results = self.aggregator.aggregate_all(&quotes);
        run.advance(RunStage::Aggregated);

        let mut summary = summarize(&results, &self.tiers, extracted.skipped_rows);
        if summary.is_partial() {
            tracing::warn!(
                "⚠️ [{}] {} of {} results unavailable",
                document.file_name,
                summary.unavailable,
                summary.cells
            );
        }

        let stem = format!("shipping_results_{}", chrono::Utc::now().format("%Y%m%d_%H%M%S"));
        let report = match self.renderer.render(&results, format, &stem) {
            Ok(report) => report,
            Err(e) if format.output_format() != TableFormat::Csv => {
                tracing::warn!(
                    "⚠️ [{}] {} output failed ({}), falling back to CSV",
                    document.file_name,
                    format.output_format().extension(),
                    e
                );
                summary.format_fallback = true;
                self.renderer
                    .render(&results, TableFormat::Csv, &stem)
                    .map_err(|e| run.fail(e))?
            }
            Err(e) => return Err(run.fail(e)),
        };
        run.advance(RunStage::Rendered);

        Ok(CompletedRun {
            report,
            results,
            summary,
        })
    }
}

fn summarize(
    results: &[AggregatedResult],
    tiers: &[WeightTier],
    skipped_rows: Vec<usize>,
) -> RunSummary {
    let cells: usize = results.iter().map(|r| r.tiers.len()).sum();
    let priced: usize = results.iter().map(|r| r.available_count()).sum();
    let per_tier = tiers
        .iter()
        .map(|&tier| {
            let available = results
                .iter()
                .filter(|r| r.get(tier).is_some_and(|t| t.is_available()))
                .count();
            (tier, available)
        })
        .collect();
    RunSummary {
        routes: results.len(),
        cells,
        priced,
        unavailable: cells - priced,
        per_tier,
        skipped_rows,
        format_fallback: false,
    }
}

pub fn welcome_message(tiers: &[WeightTier]) -> String {
    format!(
        "🚚 Welcome to the shipping cost bot!\n\n\
         Send a spreadsheet (.xlsx, .xls or .csv) with 'From' and 'To' columns \
         (or 'Откуда' and 'Куда'). For every route I will check these weight tiers: {}, \
         and send back a file with the cheapest offer in each tier.\n\n\
         Use /help for details on the file format.",
        format_tiers(tiers)
    )
}

pub fn help_message(tiers: &[WeightTier], max_file_size: u64) -> String {
    format!(
        "📋 File format\n\
         • First row holds the column headers\n\
         • Origin column: 'From', 'Origin', 'Sender', 'Откуда', 'Отправитель', \
         'Город отправления'\n\
         • Destination column: 'To', 'Destination', 'Recipient', 'Куда', 'Получатель', \
         'Город назначения'\n\
         • No weight column is needed\n\n\
         Weight tiers: {}\n\
         Maximum file size: {}\n\
         Formats: .xlsx, .xls, .csv",
        format_tiers(tiers),
        format_size(max_file_size)
    )
}

pub fn usage_hint() -> &'static str {
    "📄 Please send a spreadsheet with 'From' and 'To' columns. Use /help for the file format."
}

pub fn summary_message(summary: &RunSummary) -> String {
    let mut message = format!(
        "📊 Routes processed: {}\n✅ Priced: {} of {} ({}%)",
        summary.routes,
        summary.priced,
        summary.cells,
        summary.success_rate()
    );
    for (tier, available) in &summary.per_tier {
        message.push_str(&format!("\n• {}: {}/{}", tier, available, summary.routes));
    }
    if summary.is_partial() {
        message.push_str(&format!(
            "\n⚠️ {} results are unavailable (marked in the file)",
            summary.unavailable
        ));
    }
    if !summary.skipped_rows.is_empty() {
        let rows: Vec<String> = summary
            .skipped_rows
            .iter()
            .take(MAX_LISTED_SKIPPED_ROWS)
            .map(|r| r.to_string())
            .collect();
        message.push_str(&format!("\n↪️ Skipped blank rows: {}", rows.join(", ")));
        let hidden = summary.skipped_rows.len().saturating_sub(MAX_LISTED_SKIPPED_ROWS);
        if hidden > 0 {
            message.push_str(&format!(" and {} more", hidden));
        }
    }
    if summary.format_fallback {
        message.push_str("\n📄 The Excel file could not be created, the results are sent as CSV");
    }
    message
}

fn format_tiers(tiers: &[WeightTier]) -> String {
    tiers
        .iter()
        .map(|t| t.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
