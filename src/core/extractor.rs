use crate::core::{Route, Table};
use crate::utils::error::{BotError, Result};
use regex::Regex;
use std::sync::LazyLock;

/// 一個邏輯欄位（起點/終點）的別名集合，依優先順序排列。
///
/// Matching is two-pass and deterministic: every alias set is first tried for an
/// exact header match, then for a whole-word match inside the header. Within a
/// pass, alias sets are tried in order and columns left to right.
#[derive(Debug, Clone)]
pub struct ColumnAliases {
    pub field: &'static str,
    pub sets: Vec<Vec<&'static str>>,
}

impl ColumnAliases {
    pub fn origin() -> Self {
        Self {
            field: "origin",
            sets: vec![
                vec![
                    "откуда",
                    "from",
                    "origin",
                    "отправитель",
                    "sender",
                    "город отправления",
                    "пункт отправления",
                    "отправление",
                ],
                vec!["город 1", "city 1", "начальный", "start"],
            ],
        }
    }

    pub fn destination() -> Self {
        Self {
            field: "destination",
            sets: vec![
                vec![
                    "куда",
                    "to",
                    "destination",
                    "получатель",
                    "recipient",
                    "город получения",
                    "город назначения",
                    "пункт назначения",
                    "назначение",
                ],
                vec!["город 2", "city 2", "конечный", "end"],
            ],
        }
    }

    /// Index of the first matching column, skipping `exclude`.
    pub fn find_column(&self, headers: &[String], exclude: Option<usize>) -> Option<usize> {
        let normalized: Vec<Vec<String>> = headers.iter().map(|h| header_words(h)).collect();
        let candidates = || {
            normalized
                .iter()
                .enumerate()
                .filter(move |(index, _)| Some(*index) != exclude)
        };

        for set in &self.sets {
            for (index, words) in candidates() {
                if set.iter().any(|alias| words.join(" ") == *alias) {
                    return Some(index);
                }
            }
        }

        for set in &self.sets {
            for (index, words) in candidates() {
                if set.iter().any(|alias| contains_words(words, alias)) {
                    return Some(index);
                }
            }
        }

        None
    }
}

fn header_words(header: &str) -> Vec<String> {
    header
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_string)
        .collect()
}

fn contains_words(words: &[String], alias: &str) -> bool {
    let alias_words: Vec<&str> = alias.split_whitespace().collect();
    if alias_words.is_empty() || alias_words.len() > words.len() {
        return false;
    }
    words
        .windows(alias_words.len())
        .any(|window| window.iter().zip(&alias_words).all(|(w, a)| w == a))
}

static CITY_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(г\.\s*|г\s+|город\s+|city\s+)").expect("valid city prefix pattern")
});

static POSTAL_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{5,6}\s*,?\s*").expect("valid postal code pattern"));

/// 清理城市名稱：去除前後空白、「г.」等前綴與開頭郵遞區號
pub fn clean_city_name(raw: &str) -> String {
    let trimmed = raw.trim();
    let without_postal = POSTAL_CODE.replace(trimmed, "");
    let without_prefix = CITY_PREFIX.replace(without_postal.trim(), "");
    without_prefix.trim().to_string()
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedRoutes {
    pub routes: Vec<Route>,
    pub origin_column: String,
    pub destination_column: String,
    /// 1-based spreadsheet row numbers (header is row 1).
    pub skipped_rows: Vec<usize>,
}

#[derive(Debug, Clone)]
pub struct RouteExtractor {
    origin: ColumnAliases,
    destination: ColumnAliases,
}

impl Default for RouteExtractor {
    fn default() -> Self {
        Self::new(ColumnAliases::origin(), ColumnAliases::destination())
    }
}

impl RouteExtractor {
    pub fn new(origin: ColumnAliases, destination: ColumnAliases) -> Self {
        Self {
            origin,
            destination,
        }
    }

    pub fn extract(&self, table: &Table) -> Result<ExtractedRoutes> {
        if table.headers.is_empty() {
            return Err(BotError::validation("the file is empty"));
        }

        let origin_index = self.origin.find_column(&table.headers, None);
        let destination_index = self.destination.find_column(&table.headers, origin_index);

        let (origin_index, destination_index) = match (origin_index, destination_index) {
            (Some(o), Some(d)) => (o, d),
            (None, None) => {
                return Err(BotError::validation(
                    "no origin or destination column found \
                     (expected headers like 'From'/'To' or 'Откуда'/'Куда')",
                ))
            }
            (None, Some(_)) => {
                return Err(BotError::validation(
                    "no origin column found (expected a header like 'From' or 'Откуда')",
                ))
            }
            (Some(_), None) => {
                return Err(BotError::validation(
                    "no destination column found (expected a header like 'To' or 'Куда')",
                ))
            }
        };

        tracing::info!(
            "📋 Found columns - origin: '{}', destination: '{}'",
            table.headers[origin_index],
            table.headers[destination_index]
        );

        let mut routes = Vec::new();
        let mut skipped_rows = Vec::new();

        for (index, row) in table.rows.iter().enumerate() {
            let cell = |i: usize| row.get(i).map(|v| clean_city_name(v)).unwrap_or_default();
            let origin = cell(origin_index);
            let destination = cell(destination_index);

            if origin.is_empty() || destination.is_empty() {
                let row_number = index + 2;
                tracing::warn!("Skipping row {}: missing origin or destination", row_number);
                skipped_rows.push(row_number);
                continue;
            }

            routes.push(Route::new(origin, destination));
        }

        if routes.is_empty() {
            return Err(BotError::validation("no valid routes found in the file"));
        }

        tracing::info!(
            "✅ Extracted {} routes ({} rows skipped)",
            routes.len(),
            skipped_rows.len()
        );

        Ok(ExtractedRoutes {
            routes,
            origin_column: table.headers[origin_index].clone(),
            destination_column: table.headers[destination_index].clone(),
            skipped_rows,
        })
    }
}
