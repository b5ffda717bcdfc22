use anyhow::Result;
use httpmock::prelude::*;
use secrecy::SecretString;
use serde_json::json;
use shipquote::core::{ChatEvent, ChatTransport, ReportFile, TableFormat};
use shipquote::domain::model::{BotCommand, DocumentRef};
use shipquote::{BotError, TelegramTransport};
use std::time::Duration;

const TOKEN: &str = "123456:TEST";

fn transport(server: &MockServer) -> Result<TelegramTransport> {
    Ok(TelegramTransport::new(
        &server.base_url(),
        SecretString::from(TOKEN),
        Duration::from_secs(1),
    )?)
}

fn bot_path(method: &str) -> String {
    format!("/bot{}/{}", TOKEN, method)
}

#[tokio::test]
async fn test_get_updates_yields_events() -> Result<()> {
    let server = MockServer::start_async().await;
    let updates_mock = server
        .mock_async(|when, then| {
            when.method(GET)
                .path(bot_path("getUpdates"))
                .query_param("offset", "41")
                .query_param("timeout", "1");
            then.status(200).json_body(json!({
                "ok": true,
                "result": [
                    {
                        "update_id": 41,
                        "message": { "message_id": 1, "chat": { "id": 7 }, "text": "/start" }
                    },
                    { "update_id": 42, "message": {
                        "message_id": 2,
                        "chat": { "id": 7 },
                        "document": {
                            "file_id": "DOC",
                            "file_name": "routes.xlsx",
                            "file_size": 5120
                        }
                    } },
                    { "update_id": 43, "edited_message": { "message_id": 1 } }
                ]
            }));
        })
        .await;

    let transport = transport(&server)?;
    let updates = transport.get_updates(Some(41), 1).await?;

    updates_mock.assert_async().await;
    assert_eq!(updates.len(), 3);
    let events: Vec<ChatEvent> = updates.into_iter().filter_map(|u| u.into_event()).collect();
    assert_eq!(
        events,
        vec![
            ChatEvent::Command {
                chat_id: 7,
                command: BotCommand::Start
            },
            ChatEvent::Document {
                chat_id: 7,
                document: DocumentRef {
                    file_id: "DOC".to_string(),
                    file_name: "routes.xlsx".to_string(),
                    file_size: Some(5120),
                },
            },
        ]
    );
    Ok(())
}

#[tokio::test]
async fn test_api_error_is_transport_error() -> Result<()> {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path(bot_path("getUpdates"));
            then.status(409).json_body(json!({
                "ok": false,
                "error_code": 409,
                "description": "Conflict: terminated by other getUpdates request"
            }));
        })
        .await;

    let transport = transport(&server)?;
    match transport.get_updates(None, 1).await {
        Err(BotError::TransportError { message }) => assert!(message.contains("Conflict")),
        other => panic!("expected transport error, got {:?}", other.map(|u| u.len())),
    }
    Ok(())
}

#[tokio::test]
async fn test_download_resolves_file_path() -> Result<()> {
    let server = MockServer::start_async().await;
    let get_file = server
        .mock_async(|when, then| {
            when.method(GET)
                .path(bot_path("getFile"))
                .query_param("file_id", "DOC");
            then.status(200).json_body(json!({
                "ok": true,
                "result": { "file_id": "DOC", "file_path": "documents/file_3.csv" }
            }));
        })
        .await;
    let content = server
        .mock_async(|when, then| {
            when.method(GET)
                .path(format!("/file/bot{}/documents/file_3.csv", TOKEN));
            then.status(200).body("From,To\nMoscow,Kazan\n");
        })
        .await;

    let transport = transport(&server)?;
    let bytes = transport
        .download(&DocumentRef {
            file_id: "DOC".to_string(),
            file_name: "routes.csv".to_string(),
            file_size: Some(21),
        })
        .await?;

    get_file.assert_async().await;
    content.assert_async().await;
    assert_eq!(bytes, b"From,To\nMoscow,Kazan\n");
    Ok(())
}

#[tokio::test]
async fn test_send_text_and_document() -> Result<()> {
    let server = MockServer::start_async().await;
    let message_mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path(bot_path("sendMessage"))
                .json_body(json!({ "chat_id": 7, "text": "📊 Processing" }));
            then.status(200)
                .json_body(json!({ "ok": true, "result": { "message_id": 10 } }));
        })
        .await;
    let document_mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path(bot_path("sendDocument"))
                .body_contains("shipping_results_20260101_120000.csv")
                .body_contains("From,To");
            then.status(200)
                .json_body(json!({ "ok": true, "result": { "message_id": 11 } }));
        })
        .await;

    let transport = transport(&server)?;
    transport.send_text(7, "📊 Processing").await?;
    transport
        .send_document(
            7,
            &ReportFile {
                file_name: "shipping_results_20260101_120000.csv".to_string(),
                format: TableFormat::Csv,
                bytes: b"#,From,To\n1,Moscow,Kazan\n".to_vec(),
            },
            "📋 Done",
        )
        .await?;

    message_mock.assert_async().await;
    document_mock.assert_async().await;
    Ok(())
}
