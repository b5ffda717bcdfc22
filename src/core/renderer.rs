use crate::adapters::tabular::{write_sheet, Cell, Sheet};
use crate::core::{AggregatedResult, ReportFile, TableFormat, TierResult, WeightTier};
use crate::utils::error::Result;

pub const UNAVAILABLE_MARKER: &str = "unavailable";

const TIER_COLUMNS: [&str; 5] = ["carrier", "tariff", "price", "currency", "days"];

#[derive(Debug, Clone)]
pub struct ResultRenderer {
    tiers: Vec<WeightTier>,
    sheet_name: String,
}

impl ResultRenderer {
    pub fn new(tiers: Vec<WeightTier>) -> Self {
        Self {
            tiers,
            sheet_name: "Results".to_string(),
        }
    }

    pub fn with_sheet_name(mut self, name: impl Into<String>) -> Self {
        self.sheet_name = name.into();
        self
    }

    pub fn headers(&self) -> Vec<String> {
        let mut headers = vec!["#".to_string(), "From".to_string(), "To".to_string()];
        for tier in &self.tiers {
            headers.extend(TIER_COLUMNS.iter().map(|column| format!("{} {}", tier, column)));
        }
        headers
    }

    /// 一條路線一列，依輸入順序；每個級距一組欄位
    pub fn build_sheet(&self, results: &[AggregatedResult]) -> Sheet {
        let rows = results
            .iter()
            .enumerate()
            .map(|(index, result)| {
                let mut row = vec![
                    Cell::Number((index + 1) as f64),
                    Cell::Text(result.route.origin.clone()),
                    Cell::Text(result.route.destination.clone()),
                ];
                for tier in &self.tiers {
                    row.extend(tier_cells(result.get(*tier)));
                }
                row
            })
            .collect();

        Sheet {
            name: self.sheet_name.clone(),
            headers: self.headers(),
            rows,
        }
    }

    pub fn render(
        &self,
        results: &[AggregatedResult],
        input_format: TableFormat,
        file_stem: &str,
    ) -> Result<ReportFile> {
        let sheet = self.build_sheet(results);
        let format = input_format.output_format();
        let bytes = write_sheet(&sheet, format)?;

        tracing::debug!(
            "📄 Rendered {} rows into {} bytes ({})",
            sheet.rows.len(),
            bytes.len(),
            format.extension()
        );

        Ok(ReportFile {
            file_name: format!("{}.{}", file_stem, format.extension()),
            format,
            bytes,
        })
    }
}

fn tier_cells(result: Option<&TierResult>) -> Vec<Cell> {
    match result {
        Some(TierResult::Cheapest(offer)) => vec![
            Cell::Text(offer.carrier.clone()),
            offer.tariff.clone().map(Cell::Text).unwrap_or(Cell::Empty),
            Cell::Number(offer.price),
            Cell::Text(offer.currency.clone()),
            offer
                .delivery_days
                .map(|d| Cell::Number(d as f64))
                .unwrap_or(Cell::Empty),
        ],
        Some(TierResult::Unavailable { reason }) => vec![
            Cell::Text(UNAVAILABLE_MARKER.to_string()),
            Cell::Text(reason.clone()),
            Cell::Empty,
            Cell::Empty,
            Cell::Empty,
        ],
        None => vec![
            Cell::Text(UNAVAILABLE_MARKER.to_string()),
            Cell::Empty,
            Cell::Empty,
            Cell::Empty,
            Cell::Empty,
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Offer, Route};

    const HALF: WeightTier = WeightTier::from_grams(500);
    const ONE: WeightTier = WeightTier::from_grams(1_000);

    fn priced(
        route: &Route,
        tier: WeightTier,
        carrier: &str,
        price: f64,
    ) -> (WeightTier, TierResult) {
        (
            tier,
            TierResult::Cheapest(Offer {
                carrier: carrier.to_string(),
                tariff: Some("Express".to_string()),
                price,
                currency: "RUB".to_string(),
                delivery_days: Some(3),
                tier,
                route: route.clone(),
            }),
        )
    }

    #[test]
    fn test_headers_group_by_tier() {
        let renderer = ResultRenderer::new(vec![HALF, ONE]);
        let headers = renderer.headers();

        assert_eq!(headers.len(), 3 + 2 * TIER_COLUMNS.len());
        assert_eq!(headers[3], "0.5 kg carrier");
        assert_eq!(headers[5], "0.5 kg price");
        assert_eq!(headers[8], "1 kg carrier");
    }

    #[test]
    fn test_sheet_rows_follow_input_order() {
        let kazan = Route::new("Moscow", "Kazan");
        let omsk = Route::new("Moscow", "Omsk");
        let results = vec![
            AggregatedResult {
                route: omsk.clone(),
                tiers: vec![priced(&omsk, HALF, "CDEK", 410.0)],
            },
            AggregatedResult {
                route: kazan.clone(),
                tiers: vec![(
                    HALF,
                    TierResult::Unavailable {
                        reason: "timeout".to_string(),
                    },
                )],
            },
        ];

        let sheet = ResultRenderer::new(vec![HALF]).build_sheet(&results);

        assert_eq!(sheet.rows.len(), 2);
        assert_eq!(sheet.rows[0][2], Cell::Text("Omsk".to_string()));
        assert_eq!(sheet.rows[0][3], Cell::Text("CDEK".to_string()));
        assert_eq!(sheet.rows[0][5], Cell::Number(410.0));
        assert_eq!(sheet.rows[1][2], Cell::Text("Kazan".to_string()));
        assert_eq!(sheet.rows[1][3], Cell::Text(UNAVAILABLE_MARKER.to_string()));
        assert_eq!(sheet.rows[1][4], Cell::Text("timeout".to_string()));
    }

    #[test]
    fn test_tier_missing_from_result_is_marked() {
        let route = Route::new("Moscow", "Kazan");
        let results = vec![AggregatedResult {
            route: route.clone(),
            tiers: vec![priced(&route, HALF, "DPD", 200.0)],
        }];

        let sheet = ResultRenderer::new(vec![HALF, ONE]).build_sheet(&results);
        let one_kg_carrier = 3 + TIER_COLUMNS.len();
        assert_eq!(
            sheet.rows[0][one_kg_carrier],
            Cell::Text(UNAVAILABLE_MARKER.to_string())
        );
    }

    #[test]
    fn test_render_csv_file_name() {
        let route = Route::new("Moscow", "Kazan");
        let results = vec![AggregatedResult {
            route: route.clone(),
            tiers: vec![priced(&route, HALF, "DPD", 200.0)],
        }];

        let report = ResultRenderer::new(vec![HALF])
            .render(&results, TableFormat::Csv, "shipping_results_1")
            .unwrap();

        assert_eq!(report.file_name, "shipping_results_1.csv");
        let text = String::from_utf8(report.bytes).unwrap();
        assert!(text.starts_with("#,From,To,0.5 kg carrier"));
        assert!(text.contains("DPD,Express,200,RUB,3"));
    }

    #[test]
    fn test_invalid_sheet_name_fails_xlsx_only() {
        let route = Route::new("Moscow", "Kazan");
        let results = vec![AggregatedResult {
            route: route.clone(),
            tiers: vec![priced(&route, HALF, "DPD", 200.0)],
        }];
        let renderer = ResultRenderer::new(vec![HALF]).with_sheet_name("Results: [1/2]");

        assert!(renderer.render(&results, TableFormat::Xlsx, "out").is_err());
        let report = renderer.render(&results, TableFormat::Csv, "out").unwrap();
        assert_eq!(report.format, TableFormat::Csv);
    }
}
