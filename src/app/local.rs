use crate::core::orchestrator::QuoteService;
use crate::core::{InputDocument, PricingApi, RunSummary, Storage};
use crate::utils::error::Result;

#[derive(Debug)]
pub struct LocalRunOutput {
    pub file_name: String,
    pub summary: RunSummary,
}

/// 不經聊天介面，從 `source` 讀入檔案處理後寫到 `output`
pub async fn run_local_quote<P, I, S>(
    service: &QuoteService<P>,
    source: &I,
    file_name: &str,
    output: &S,
) -> Result<LocalRunOutput>
where
    P: PricingApi + ?Sized,
    I: Storage,
    S: Storage,
{
    // 格式不對就不必讀檔
    QuoteService::<P>::input_format(file_name)?;

    let bytes = source.read_file(file_name).await?;
    tracing::info!("📂 Read {} ({} bytes)", file_name, bytes.len());

    let run = service
        .process(&InputDocument {
            file_name: file_name.to_string(),
            bytes,
        })
        .await
        .map_err(|failure| failure.error)?;

    output
        .write_file(&run.report.file_name, &run.report.bytes)
        .await?;

    Ok(LocalRunOutput {
        file_name: run.report.file_name,
        summary: run.summary,
    })
}
