use crate::domain::model::{BotCommand, ChatEvent, ChatId, DocumentRef, ReportFile};
use crate::domain::ports::ChatTransport;
use crate::utils::error::{BotError, Result};
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<Message>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub chat: Chat,
    pub text: Option<String>,
    pub document: Option<Document>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: ChatId,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Document {
    pub file_id: String,
    pub file_name: Option<String>,
    pub file_size: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct File {
    file_path: Option<String>,
}

impl Update {
    /// 轉成與傳輸無關的事件；不支援的更新回傳 `None`
    pub fn into_event(self) -> Option<ChatEvent> {
        let message = self.message?;
        let chat_id = message.chat.id;

        if let Some(document) = message.document {
            return Some(ChatEvent::Document {
                chat_id,
                document: DocumentRef {
                    file_id: document.file_id,
                    file_name: document.file_name.unwrap_or_else(|| "upload".to_string()),
                    file_size: document.file_size,
                },
            });
        }

        let text = message.text?;
        let trimmed = text.trim();
        if let Some(command) = trimmed.strip_prefix('/') {
            // "/start@my_bot payload" → "start"
            let name = command
                .split(|c: char| c == '@' || c.is_whitespace())
                .next()
                .unwrap_or_default();
            let command = match name {
                "start" => Some(BotCommand::Start),
                "help" => Some(BotCommand::Help),
                _ => None,
            };
            if let Some(command) = command {
                return Some(ChatEvent::Command { chat_id, command });
            }
        }

        Some(ChatEvent::Text { chat_id, text })
    }
}

/// Telegram Bot API 的最小客戶端：long polling、下載檔案、回傳訊息與文件
pub struct TelegramTransport {
    client: Client,
    api_base: String,
    token: SecretString,
}

impl TelegramTransport {
    pub fn new(api_base: &str, token: SecretString, poll_timeout: Duration) -> Result<Self> {
        // long polling 需要比 getUpdates 的 timeout 更長的 HTTP timeout
        let client = Client::builder()
            .timeout(poll_timeout + Duration::from_secs(15))
            .build()?;

        Ok(Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            token,
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_base, self.token.expose_secret(), method)
    }

    fn file_url(&self, file_path: &str) -> String {
        format!(
            "{}/file/bot{}/{}",
            self.api_base,
            self.token.expose_secret(),
            file_path
        )
    }

    async fn parse<T: DeserializeOwned>(method: &str, response: reqwest::Response) -> Result<T> {
        let status = response.status();
        let body: ApiResponse<T> = response.json().await.map_err(|e| BotError::TransportError {
            message: format!("{}: malformed response (HTTP {}): {}", method, status, e),
        })?;

        if !body.ok {
            return Err(BotError::TransportError {
                message: format!(
                    "{}: {}",
                    method,
                    body.description.unwrap_or_else(|| format!("HTTP {}", status))
                ),
            });
        }

        body.result.ok_or_else(|| BotError::TransportError {
            message: format!("{}: response carried no result", method),
        })
    }

    pub async fn get_updates(
        &self,
        offset: Option<i64>,
        timeout_seconds: u64,
    ) -> Result<Vec<Update>> {
        let mut query = vec![
            ("timeout", timeout_seconds.to_string()),
            ("allowed_updates", r#"["message"]"#.to_string()),
        ];
        if let Some(offset) = offset {
            query.push(("offset", offset.to_string()));
        }

        let response = self
            .client
            .get(self.method_url("getUpdates"))
            .query(&query)
            .send()
            .await?;

        Self::parse("getUpdates", response).await
    }
}

#[async_trait::async_trait]
impl ChatTransport for TelegramTransport {
    async fn send_text(&self, chat_id: ChatId, text: &str) -> Result<()> {
        let response = self
            .client
            .post(self.method_url("sendMessage"))
            .json(&serde_json::json!({ "chat_id": chat_id, "text": text }))
            .send()
            .await?;

        Self::parse::<serde_json::Value>("sendMessage", response).await?;
        Ok(())
    }

    async fn send_document(&self, chat_id: ChatId, file: &ReportFile, caption: &str) -> Result<()> {
        let part = Part::bytes(file.bytes.clone()).file_name(file.file_name.clone());
        let form = Form::new()
            .text("chat_id", chat_id.to_string())
            .text("caption", caption.to_string())
            .part("document", part);

        let response = self
            .client
            .post(self.method_url("sendDocument"))
            .multipart(form)
            .send()
            .await?;

        Self::parse::<serde_json::Value>("sendDocument", response).await?;
        tracing::debug!(
            "📤 Sent {} ({} bytes) to chat {}",
            file.file_name,
            file.bytes.len(),
            chat_id
        );
        Ok(())
    }

    async fn download(&self, document: &DocumentRef) -> Result<Vec<u8>> {
        let response = self
            .client
            .get(self.method_url("getFile"))
            .query(&[("file_id", document.file_id.as_str())])
            .send()
            .await?;
        let file: File = Self::parse("getFile", response).await?;

        let file_path = file.file_path.ok_or_else(|| BotError::TransportError {
            message: format!("getFile: no download path for {}", document.file_name),
        })?;

        let response = self.client.get(self.file_url(&file_path)).send().await?;
        if !response.status().is_success() {
            return Err(BotError::TransportError {
                message: format!("file download returned HTTP {}", response.status()),
            });
        }

        Ok(response.bytes().await?.to_vec())
    }
}
