use crate::adapters::telegram::TelegramTransport;
use crate::core::orchestrator::{
    help_message, summary_message, usage_hint, welcome_message, QuoteService,
};
use crate::core::{
    ChatEvent, ChatId, ChatTransport, InputDocument, PricingApi, ReportFile, RunStage, Storage,
};
use crate::domain::model::{BotCommand, DocumentRef};
use crate::utils::error::{BotError, Result};
use std::sync::Arc;
use std::time::Duration;

const POLL_ERROR_DELAY: Duration = Duration::from_secs(5);
const DELIVERY_CAPTION: &str = "📋 Done! The cheapest offer for every route and weight tier";

/// 把聊天事件接到報價流程，並把結果/錯誤回報給使用者
pub struct BotHandler<P: PricingApi + ?Sized, T: ChatTransport + ?Sized, S: Storage> {
    service: QuoteService<P>,
    transport: Arc<T>,
    archive: Option<S>,
}

impl<P: PricingApi + ?Sized, T: ChatTransport + ?Sized, S: Storage> BotHandler<P, T, S> {
    pub fn new(service: QuoteService<P>, transport: Arc<T>, archive: Option<S>) -> Self {
        Self {
            service,
            transport,
            archive,
        }
    }

    pub fn transport(&self) -> &Arc<T> {
        &self.transport
    }

    pub async fn handle_event(&self, event: ChatEvent) {
        let chat_id = event.chat_id();
        match event {
            ChatEvent::Command {
                command: BotCommand::Start,
                ..
            } => {
                self.reply(chat_id, &welcome_message(self.service.tiers()))
                    .await
            }
            ChatEvent::Command {
                command: BotCommand::Help,
                ..
            } => {
                let message = help_message(self.service.tiers(), self.service.max_file_size());
                self.reply(chat_id, &message).await
            }
            ChatEvent::Text { .. } => self.reply(chat_id, usage_hint()).await,
            ChatEvent::Document { document, .. } => self.handle_document(chat_id, document).await,
        }
    }

    async fn reply(&self, chat_id: ChatId, text: &str) {
        if let Err(e) = self.transport.send_text(chat_id, text).await {
            tracing::error!("Failed to send message to chat {}: {}", chat_id, e);
        }
    }

    async fn handle_document(&self, chat_id: ChatId, document: DocumentRef) {
        tracing::info!(
            "📥 Chat {} uploaded '{}' ({:?} bytes)",
            chat_id,
            document.file_name,
            document.file_size
        );

        // 依 metadata 先擋掉過大或格式不符的檔案，不必下載
        let precheck = document
            .file_size
            .map_or(Ok(()), |size| self.service.check_size(size))
            .and_then(|_| QuoteService::<P>::input_format(&document.file_name).map(|_| ()));
        if let Err(e) = precheck {
            tracing::warn!("Rejected upload from chat {}: {}", chat_id, e);
            self.reply(chat_id, &e.user_friendly_message()).await;
            return;
        }

        self.reply(chat_id, "📊 Processing the file, this can take a few minutes...")
            .await;

        let bytes = match self.transport.download(&document).await {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::error!("❌ Download of '{}' failed: {}", document.file_name, e);
                self.reply(chat_id, "❌ Could not download the file. Please send it again")
                    .await;
                return;
            }
        };

        let input = InputDocument {
            file_name: document.file_name,
            bytes,
        };

        let run = match self.service.process(&input).await {
            Ok(run) => run,
            Err(failure) => {
                self.reply(chat_id, &failure.user_message()).await;
                return;
            }
        };

        self.archive(chat_id, &run.report).await;
        self.reply(chat_id, &summary_message(&run.summary)).await;

        match self
            .transport
            .send_document(chat_id, &run.report, DELIVERY_CAPTION)
            .await
        {
            Ok(()) => {
                tracing::info!("✅ [{}] stage: {}", input.file_name, RunStage::Delivered);
            }
            Err(e) => {
                let error = BotError::DeliveryError {
                    message: e.to_string(),
                };
                tracing::error!(
                    "❌ [{}] {} (Category: {:?})",
                    input.file_name,
                    error,
                    error.category()
                );
                self.reply(chat_id, &error.user_friendly_message()).await;
            }
        }
    }

    async fn archive(&self, chat_id: ChatId, report: &ReportFile) {
        if let Some(storage) = &self.archive {
            let path = format!("{}_{}", chat_id, report.file_name);
            match storage.write_file(&path, &report.bytes).await {
                Ok(()) => tracing::debug!("🗄️ Archived result as {}", path),
                Err(e) => tracing::warn!("Failed to archive {}: {}", path, e),
            }
        }
    }
}

/// Long-polls Telegram and handles every event on its own task until Ctrl+C.
pub async fn run_polling<P, S>(
    handler: Arc<BotHandler<P, TelegramTransport, S>>,
    poll_timeout_seconds: u64,
) -> Result<()>
where
    P: PricingApi + ?Sized + 'static,
    S: Storage + 'static,
{
    let mut offset: Option<i64> = None;
    tracing::info!("🤖 Bot started, waiting for messages");

    loop {
        let updates = tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Bot stopped by user");
                return Ok(());
            }
            updates = handler.transport().get_updates(offset, poll_timeout_seconds) => updates,
        };

        let updates = match updates {
            Ok(updates) => updates,
            Err(e) => {
                tracing::error!("Polling failed: {}; retrying in {:?}", e, POLL_ERROR_DELAY);
                tokio::time::sleep(POLL_ERROR_DELAY).await;
                continue;
            }
        };

        for update in updates {
            offset = Some(update.update_id + 1);
            if let Some(event) = update.into_event() {
                let handler = Arc::clone(&handler);
                // 每個事件一個 task，單一使用者的錯誤不影響其他人
                tokio::spawn(async move {
                    handler.handle_event(event).await;
                });
            }
        }
    }
}
