use crate::domain::model::{ChatId, DocumentRef, QuoteOutcome, ReportFile, Route, WeightTier};
use crate::utils::error::Result;
use async_trait::async_trait;

pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}

/// 外部報價服務。端點格式只存在於實作內
#[async_trait]
pub trait PricingApi: Send + Sync {
    /// Always exchanges credentials for a fresh session token.
    async fn authenticate(&self) -> Result<()>;

    /// Reuses the cached session while it is valid, authenticates otherwise.
    async fn ensure_authenticated(&self) -> Result<()>;

    /// One cost lookup. Only authorization failures surface as `Err`.
    async fn quote(&self, route: &Route, tier: WeightTier) -> Result<QuoteOutcome>;
}

#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn send_text(&self, chat_id: ChatId, text: &str) -> Result<()>;

    async fn send_document(&self, chat_id: ChatId, file: &ReportFile, caption: &str) -> Result<()>;

    async fn download(&self, document: &DocumentRef) -> Result<Vec<u8>>;
}
