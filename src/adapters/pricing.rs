use crate::config::settings::PricingSettings;
use crate::core::rate_limit::FixedIntervalGate;
use crate::domain::model::{Offer, QuoteOutcome, Route, WeightTier};
use crate::domain::ports::PricingApi;
use crate::utils::error::{BotError, Result};
use reqwest::{Client, StatusCode};
use secrecy::ExposeSecret;
use serde::Deserialize;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;

const DEFAULT_TOKEN_TTL_SECONDS: u64 = 3600;
const MAX_TOKEN_TTL_SECONDS: u64 = 86_400;

/// 報價服務的登入狀態，只由 `PricingClient` 持有
#[derive(Debug, Clone)]
pub struct Session {
    token: String,
    refresh_at: Instant,
}

impl Session {
    /// The refresh point is `ttl - buffer`, with the buffer capped at half the ttl
    /// so short-lived tokens are still used at least once.
    pub fn new(token: String, ttl: Duration, refresh_buffer: Duration) -> Self {
        let ttl = ttl.min(Duration::from_secs(MAX_TOKEN_TTL_SECONDS));
        let buffer = refresh_buffer.min(ttl / 2);
        let now = Instant::now();
        Self {
            token,
            refresh_at: now.checked_add(ttl - buffer).unwrap_or(now),
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn is_fresh(&self) -> bool {
        Instant::now() < self.refresh_at
    }
}

#[derive(Debug, Deserialize)]
struct AuthResponse {
    #[serde(default)]
    status: serde_json::Value,
    #[serde(rename = "authToken")]
    auth_token: Option<String>,
    expire: Option<serde_json::Value>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CalcResponse {
    #[serde(default)]
    status: serde_json::Value,
    #[serde(default)]
    data: Vec<serde_json::Value>,
    error: Option<String>,
}

enum CallError {
    Unauthorized,
    Transient(String),
}

pub struct PricingClient {
    settings: PricingSettings,
    client: Client,
    gate: FixedIntervalGate,
    session: RwLock<Option<Session>>,
}

impl PricingClient {
    pub fn new(settings: PricingSettings) -> Result<Self> {
        let client = Client::builder()
            .timeout(settings.request_timeout)
            .build()?;

        tracing::info!(
            "PricingClient initialized for {} (timeout {:?}, delay {:?})",
            settings.api_base,
            settings.request_timeout,
            settings.rate_limit_delay
        );

        Ok(Self {
            gate: FixedIntervalGate::new(settings.rate_limit_delay),
            settings,
            client,
            session: RwLock::new(None),
        })
    }

    fn auth_url(&self) -> String {
        format!("{}/auth", self.settings.api_base)
    }

    fn calc_url(&self) -> String {
        format!("{}/cse/calc", self.settings.api_base)
    }

    /// 取得目前 token；過期或不存在就重新登入
    async fn current_token(&self) -> Result<String> {
        {
            let guard = self.session.read().await;
            if let Some(session) = guard.as_ref().filter(|s| s.is_fresh()) {
                return Ok(session.token().to_string());
            }
        }
        self.refresh_session().await
    }

    /// Drops the session only if it still holds `stale`; another run may already have replaced it.
    async fn invalidate(&self, stale: &str) {
        let mut guard = self.session.write().await;
        if guard.as_ref().is_some_and(|s| s.token() == stale) {
            *guard = None;
        }
    }

    async fn refresh_session(&self) -> Result<String> {
        self.gate.acquire().await;
        tracing::info!("🔑 Authenticating with pricing service...");

        let response = self
            .client
            .get(self.auth_url())
            .query(&[
                ("email", self.settings.email.as_str()),
                ("password", self.settings.password.expose_secret()),
            ])
            .send()
            .await
            .map_err(|e| BotError::auth(format!("pricing service unreachable: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(BotError::auth(format!("auth request returned HTTP {}", status)));
        }

        let body: AuthResponse = response
            .json()
            .await
            .map_err(|e| BotError::auth(format!("malformed auth response: {}", e)))?;

        if !is_truthy(&body.status) {
            return Err(BotError::auth(
                body.error.unwrap_or_else(|| "invalid credentials".to_string()),
            ));
        }

        let token = body
            .auth_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| BotError::auth("auth response carried no token"))?;

        let ttl = token_ttl(body.expire.as_ref().and_then(as_u64));

        *self.session.write().await = Some(Session::new(
            token.clone(),
            ttl,
            self.settings.token_refresh_buffer,
        ));

        tracing::info!("✅ Authenticated, token valid for {:?}", ttl);
        Ok(token)
    }

    async fn call_calc(
        &self,
        token: &str,
        route: &Route,
        tier: WeightTier,
    ) -> std::result::Result<Vec<Offer>, CallError> {
        self.gate.acquire().await;

        let mut query: Vec<(&str, String)> = vec![
            ("authToken", token.to_string()),
            ("from", route.origin.clone()),
            ("to", route.destination.clone()),
            ("weight", tier.grams().to_string()),
        ];
        for (key, value) in &self.settings.extra_params {
            query.push((key.as_str(), value.clone()));
        }

        tracing::debug!("📡 Quote request: {} ({})", route, tier);

        let response = self
            .client
            .get(self.calc_url())
            .query(&query)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    CallError::Transient("request timed out".to_string())
                } else {
                    CallError::Transient(format!("request failed: {}", e))
                }
            })?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(CallError::Unauthorized);
        }
        if !status.is_success() {
            return Err(CallError::Transient(format!("HTTP {}", status)));
        }

        let body: CalcResponse = response
            .json()
            .await
            .map_err(|e| CallError::Transient(format!("malformed response: {}", e)))?;

        if !is_truthy(&body.status) {
            return Err(CallError::Transient(
                body.error
                    .unwrap_or_else(|| "service reported a failed calculation".to_string()),
            ));
        }

        let offers: Vec<Offer> = body
            .data
            .iter()
            .filter_map(|item| self.parse_offer(item, route, tier))
            .collect();

        tracing::debug!(
            "Parsed {} offers from {} items for {} ({})",
            offers.len(),
            body.data.len(),
            route,
            tier
        );
        Ok(offers)
    }

    fn parse_offer(
        &self,
        item: &serde_json::Value,
        route: &Route,
        tier: WeightTier,
    ) -> Option<Offer> {
        let price = match item.get("price").and_then(as_f64) {
            Some(price) if price.is_finite() && price >= 0.0 => price,
            _ => {
                tracing::warn!("Skipping offer with unparseable price: {}", item);
                return None;
            }
        };

        let text = |key: &str| {
            item.get(key)
                .and_then(|v| v.as_str())
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };

        Some(Offer {
            carrier: text("deliveryCompany").unwrap_or_else(|| "Unknown carrier".to_string()),
            tariff: text("tariffName"),
            price,
            currency: text("currency").unwrap_or_else(|| self.settings.currency.clone()),
            delivery_days: item
                .get("deliveryTime")
                .and_then(as_u64)
                .and_then(|d| u32::try_from(d).ok()),
            tier,
            route: route.clone(),
        })
    }

    fn outcome(
        result: std::result::Result<Vec<Offer>, CallError>,
        route: &Route,
        tier: WeightTier,
    ) -> Option<QuoteOutcome> {
        match result {
            Ok(offers) => Some(QuoteOutcome::Offers(offers)),
            Err(CallError::Transient(reason)) => {
                let error = BotError::transient(reason.clone());
                tracing::warn!(
                    "⚠️ No quote for {} ({}): {} (Category: {:?})",
                    route,
                    tier,
                    error,
                    error.category()
                );
                Some(QuoteOutcome::Unavailable { reason })
            }
            Err(CallError::Unauthorized) => None,
        }
    }
}

#[async_trait::async_trait]
impl PricingApi for PricingClient {
    async fn authenticate(&self) -> Result<()> {
        self.refresh_session().await.map(|_| ())
    }

    async fn ensure_authenticated(&self) -> Result<()> {
        self.current_token().await.map(|_| ())
    }

    async fn quote(&self, route: &Route, tier: WeightTier) -> Result<QuoteOutcome> {
        let token = self.current_token().await?;

        let first = self.call_calc(&token, route, tier).await;
        if let Some(outcome) = Self::outcome(first, route, tier) {
            return Ok(outcome);
        }

        // 只有授權失敗會走到這裡：重新登入一次並重試同一筆
        tracing::warn!(
            "🔑 Session rejected while quoting {} ({}), re-authenticating",
            route,
            tier
        );
        self.invalidate(&token).await;
        let token = self.refresh_session().await?;

        let retry = self.call_calc(&token, route, tier).await;
        Self::outcome(retry, route, tier).ok_or_else(|| {
            BotError::auth("pricing service rejected a freshly issued session token")
        })
    }
}

/// `expire` 缺少或超出 1 秒到 1 天的範圍時使用預設值
fn token_ttl(expire: Option<u64>) -> Duration {
    match expire {
        Some(seconds) if (1..=MAX_TOKEN_TTL_SECONDS).contains(&seconds) => {
            Duration::from_secs(seconds)
        }
        Some(seconds) => {
            tracing::warn!(
                "Ignoring out-of-range token expiry {}s, using {}s",
                seconds,
                DEFAULT_TOKEN_TTL_SECONDS
            );
            Duration::from_secs(DEFAULT_TOKEN_TTL_SECONDS)
        }
        None => Duration::from_secs(DEFAULT_TOKEN_TTL_SECONDS),
    }
}

fn is_truthy(value: &serde_json::Value) -> bool {
    match value {
        serde_json::Value::Bool(b) => *b,
        serde_json::Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        serde_json::Value::String(s) => matches!(s.trim(), "1" | "true" | "ok" | "success"),
        _ => false,
    }
}

/// 價格可能是數字或字串（"1 250,50"）
fn as_f64(value: &serde_json::Value) -> Option<f64> {
    match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s
            .trim()
            .replace([' ', '\u{a0}'], "")
            .replace(',', ".")
            .parse()
            .ok(),
        _ => None,
    }
}

/// Accepts integers, integral strings, and ranges like "3-5" (takes the lower bound).
fn as_u64(value: &serde_json::Value) -> Option<u64> {
    match value {
        serde_json::Value::Number(n) => n.as_u64().or_else(|| n.as_f64().map(|f| f as u64)),
        serde_json::Value::String(s) => {
            let digits: String = s.trim().chars().take_while(|c| c.is_ascii_digit()).collect();
            digits.parse().ok()
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_is_truthy() {
        assert!(is_truthy(&json!(true)));
        assert!(is_truthy(&json!(1)));
        assert!(is_truthy(&json!("true")));
        assert!(!is_truthy(&json!(false)));
        assert!(!is_truthy(&json!(0)));
        assert!(!is_truthy(&json!(null)));
    }

    #[test]
    fn test_as_f64() {
        assert_eq!(as_f64(&json!(350)), Some(350.0));
        assert_eq!(as_f64(&json!("1 250,50")), Some(1250.5));
        assert_eq!(as_f64(&json!("n/a")), None);
        assert_eq!(as_f64(&json!(null)), None);
    }

    #[test]
    fn test_as_u64() {
        assert_eq!(as_u64(&json!(3)), Some(3));
        assert_eq!(as_u64(&json!("3-5")), Some(3));
        assert_eq!(as_u64(&json!("soon")), None);
    }

    #[test]
    fn test_token_ttl_bounds() {
        let default = Duration::from_secs(DEFAULT_TOKEN_TTL_SECONDS);
        assert_eq!(token_ttl(Some(1800)), Duration::from_secs(1800));
        assert_eq!(token_ttl(Some(MAX_TOKEN_TTL_SECONDS)), Duration::from_secs(86_400));
        assert_eq!(token_ttl(None), default);
        assert_eq!(token_ttl(Some(0)), default);
        assert_eq!(token_ttl(Some(MAX_TOKEN_TTL_SECONDS + 1)), default);
        // 1e30 與負數經 as_u64 後分別成為 u64::MAX 與 0
        assert_eq!(token_ttl(as_u64(&json!(1e30))), default);
        assert_eq!(token_ttl(as_u64(&json!(-5))), default);
    }

    #[tokio::test(start_paused = true)]
    async fn test_session_with_huge_ttl_does_not_overflow() {
        let session = Session::new("t".to_string(), Duration::MAX, Duration::from_secs(300));
        assert!(session.is_fresh());

        tokio::time::advance(Duration::from_secs(86_400)).await;
        assert!(!session.is_fresh());
    }

    #[tokio::test(start_paused = true)]
    async fn test_session_refresh_point() {
        let session = Session::new(
            "t".to_string(),
            Duration::from_secs(3600),
            Duration::from_secs(300),
        );
        assert!(session.is_fresh());

        tokio::time::advance(Duration::from_secs(3299)).await;
        assert!(session.is_fresh());

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(!session.is_fresh());
    }

    #[tokio::test(start_paused = true)]
    async fn test_short_lived_session_buffer_is_capped() {
        let session = Session::new(
            "t".to_string(),
            Duration::from_secs(60),
            Duration::from_secs(300),
        );
        assert!(session.is_fresh());

        tokio::time::advance(Duration::from_secs(30)).await;
        assert!(!session.is_fresh());
    }
}
