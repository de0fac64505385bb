//! Telegram Bot API client.
//!
//! Implements [`Platform`] over plain HTTPS calls: `getFile` plus the file
//! endpoint for downloads, `sendMessage`/`sendDocument`/`sendAudio` for
//! replies, and `getUpdates` long polling for inbound messages.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::channels::{BotCommand, FileKind, Inbound, LimitedSink, Platform, ReplyAction};
use crate::error::ChannelError;
use crate::media::{ContentHandle, MediaEvent, MediaKind, ReplyTarget};

const DEFAULT_API_BASE: &str = "https://api.telegram.org";

/// Envelope of every Bot API response.
#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

/// One entry from `getUpdates`.
#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<Message>,
}

/// Result of `getMe`.
#[derive(Debug, Clone, Deserialize)]
pub struct BotUser {
    pub id: i64,
    pub username: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PhotoSize {
    pub file_id: String,
    pub width: u32,
    pub height: u32,
    pub file_size: Option<u64>,
}

/// Video, voice or document attachment.
#[derive(Debug, Clone, Deserialize)]
pub struct Attachment {
    pub file_id: String,
    pub file_size: Option<u64>,
    pub mime_type: Option<String>,
    pub file_name: Option<String>,
}

impl Attachment {
    fn handle(&self) -> ContentHandle {
        ContentHandle {
            file_id: self.file_id.clone(),
            declared_size: self.file_size,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub chat: Chat,
    pub text: Option<String>,
    pub photo: Option<Vec<PhotoSize>>,
    pub video: Option<Attachment>,
    pub voice: Option<Attachment>,
    pub document: Option<Attachment>,
}

#[derive(Debug, Deserialize)]
struct TelegramFile {
    file_path: Option<String>,
    file_size: Option<u64>,
}

impl Message {
    fn target(&self) -> ReplyTarget {
        ReplyTarget {
            chat_id: self.chat.id,
            reply_to_message_id: Some(self.message_id),
        }
    }

    /// Decide what the bot should do with this message.
    pub fn classify(&self) -> Inbound {
        let target = self.target();
        let event = |kind, content| {
            Inbound::Media(MediaEvent {
                kind,
                content,
                reply_to: target,
            })
        };

        // Telegram sends several sizes of one photo; the last is the largest.
        if let Some(largest) = self.photo.as_ref().and_then(|sizes| {
            sizes
                .iter()
                .max_by_key(|p| u64::from(p.width) * u64::from(p.height))
        }) {
            return event(
                MediaKind::Image,
                ContentHandle {
                    file_id: largest.file_id.clone(),
                    declared_size: largest.file_size,
                },
            );
        }
        if let Some(video) = &self.video {
            return event(MediaKind::Video, video.handle());
        }
        if let Some(voice) = &self.voice {
            return event(MediaKind::Voice, voice.handle());
        }
        if let Some(doc) = &self.document {
            let mime = doc.mime_type.clone().unwrap_or_else(|| {
                doc.file_name
                    .as_deref()
                    .and_then(|n| mime_guess::from_path(n).first_raw())
                    .unwrap_or("application/octet-stream")
                    .to_string()
            });
            return match MediaKind::from_mime(&mime) {
                Ok(kind) => event(kind, doc.handle()),
                Err(e) => Inbound::Rejected(target, e),
            };
        }
        if let Some(cmd) = self.text.as_deref().and_then(BotCommand::parse) {
            return Inbound::Command(cmd, target);
        }
        Inbound::Ignored
    }
}

/// HTTP client for one bot token.
pub struct TelegramClient {
    token: SecretString,
    api_base: String,
    client: reqwest::Client,
}

impl TelegramClient {
    /// Create a client for the given bot token.
    pub fn new(token: SecretString) -> Self {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();
        Self {
            token,
            api_base: DEFAULT_API_BASE.to_string(),
            client,
        }
    }

    /// Point the client at a different Bot API server (e.g. a local one).
    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into().trim_end_matches('/').to_string();
        self
    }

    fn method_url(&self, method: &str) -> String {
        format!(
            "{}/bot{}/{}",
            self.api_base,
            self.token.expose_secret(),
            method
        )
    }

    fn file_url(&self, file_path: &str) -> String {
        format!(
            "{}/file/bot{}/{}",
            self.api_base,
            self.token.expose_secret(),
            file_path
        )
    }

    // reqwest errors embed the request URL, which contains the token.
    fn request_failed(method: &str, e: reqwest::Error) -> ChannelError {
        ChannelError::RequestFailed {
            method: method.to_string(),
            reason: e.without_url().to_string(),
        }
    }

    async fn decode<T: DeserializeOwned>(
        method: &str,
        response: reqwest::Response,
    ) -> Result<T, ChannelError> {
        let body: ApiResponse<T> = response
            .json()
            .await
            .map_err(|e| Self::request_failed(method, e))?;
        match (body.ok, body.result) {
            (true, Some(result)) => Ok(result),
            _ => Err(ChannelError::Rejected {
                method: method.to_string(),
                description: body
                    .description
                    .unwrap_or_else(|| "no description".to_string()),
            }),
        }
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: &serde_json::Value,
        timeout: Duration,
    ) -> Result<T, ChannelError> {
        let response = self
            .client
            .post(self.method_url(method))
            .timeout(timeout)
            .json(params)
            .send()
            .await
            .map_err(|e| Self::request_failed(method, e))?;
        Self::decode(method, response).await
    }

    /// Identify the bot behind the token.
    pub async fn get_me(&self) -> Result<BotUser, ChannelError> {
        self.call("getMe", &serde_json::json!({}), Duration::from_secs(30))
            .await
    }

    /// Long-poll for new updates after `offset`.
    pub async fn get_updates(
        &self,
        offset: i64,
        timeout_secs: u64,
    ) -> Result<Vec<Update>, ChannelError> {
        let params = serde_json::json!({
            "offset": offset,
            "timeout": timeout_secs,
            "allowed_updates": ["message"],
        });
        // Leave headroom over the server-side poll timeout.
        self.call(
            "getUpdates",
            &params,
            Duration::from_secs(timeout_secs + 10),
        )
        .await
    }

    async fn send_file(
        &self,
        target: &ReplyTarget,
        file: &crate::media::TempResource,
        filename: &str,
        kind: FileKind,
    ) -> Result<(), ChannelError> {
        let (method, field) = match kind {
            FileKind::Document => ("sendDocument", "document"),
            FileKind::Audio => ("sendAudio", "audio"),
        };

        let data = tokio::fs::read(file.path())
            .await
            .map_err(|e| ChannelError::SendFailed {
                reason: format!("cannot read {}: {}", file.path().display(), e),
            })?;
        let mime = mime_guess::from_path(filename).first_or_octet_stream();
        let part = reqwest::multipart::Part::bytes(data)
            .file_name(filename.to_string())
            .mime_str(mime.essence_str())
            .map_err(|e| Self::request_failed(method, e))?;

        let mut form = reqwest::multipart::Form::new()
            .text("chat_id", target.chat_id.to_string())
            .part(field, part);
        if let Some(id) = target.reply_to_message_id {
            form = form.text("reply_to_message_id", id.to_string());
        }

        let response = self
            .client
            .post(self.method_url(method))
            .timeout(Duration::from_secs(120))
            .multipart(form)
            .send()
            .await
            .map_err(|e| Self::request_failed(method, e))?;
        Self::decode::<serde_json::Value>(method, response).await?;
        Ok(())
    }

    async fn send_text(&self, target: &ReplyTarget, text: &str) -> Result<(), ChannelError> {
        let mut params = serde_json::json!({
            "chat_id": target.chat_id,
            "text": text,
        });
        if let Some(id) = target.reply_to_message_id {
            params["reply_to_message_id"] = serde_json::json!(id);
        }
        self.call::<serde_json::Value>("sendMessage", &params, Duration::from_secs(30))
            .await?;
        Ok(())
    }
}

/// Reject a download up front when the server already announced its size.
fn check_announced_size(size: Option<u64>, max: u64) -> Result<(), ChannelError> {
    match size {
        Some(size) if size > max => Err(ChannelError::TooLarge { size, max }),
        _ => Ok(()),
    }
}

#[async_trait]
impl Platform for TelegramClient {
    async fn download(
        &self,
        content: &ContentHandle,
        dest: &Path,
        max_bytes: u64,
    ) -> Result<u64, ChannelError> {
        let download_failed = |reason: String| ChannelError::DownloadFailed {
            file_id: content.file_id.clone(),
            reason,
        };

        let file: TelegramFile = self
            .call(
                "getFile",
                &serde_json::json!({ "file_id": content.file_id }),
                Duration::from_secs(30),
            )
            .await
            .map_err(|e| download_failed(e.to_string()))?;
        check_announced_size(file.file_size, max_bytes)?;
        let file_path = file
            .file_path
            .ok_or_else(|| download_failed("getFile returned no file_path".to_string()))?;

        let mut response = self
            .client
            .get(self.file_url(&file_path))
            .timeout(Duration::from_secs(120))
            .send()
            .await
            .map_err(|e| download_failed(e.without_url().to_string()))?;
        if !response.status().is_success() {
            return Err(download_failed(format!("HTTP {}", response.status())));
        }
        check_announced_size(response.content_length(), max_bytes)?;

        let mut sink = LimitedSink::create(dest, max_bytes).await?;
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| download_failed(e.without_url().to_string()))?
        {
            sink.write_chunk(&chunk).await?;
        }
        sink.finish().await
    }

    async fn send(&self, target: &ReplyTarget, reply: &ReplyAction) -> Result<(), ChannelError> {
        match reply {
            ReplyAction::SendFile {
                file,
                filename,
                kind,
            } => self.send_file(target, file, filename, *kind).await,
            ReplyAction::SendText(text) => self.send_text(target, text).await,
        }
    }

    fn name(&self) -> &str {
        "telegram"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn message(json: serde_json::Value) -> Message {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn test_announced_size_over_limit_rejected() {
        assert!(check_announced_size(None, 10).is_ok());
        assert!(check_announced_size(Some(10), 10).is_ok());
        let err = check_announced_size(Some(11), 10).unwrap_err();
        assert!(matches!(err, ChannelError::TooLarge { size: 11, max: 10 }));
    }

    #[test]
    fn test_photo_picks_largest_size() {
        let msg = message(serde_json::json!({
            "message_id": 7,
            "chat": { "id": 42 },
            "photo": [
                { "file_id": "small", "width": 90, "height": 60, "file_size": 1000 },
                { "file_id": "large", "width": 1280, "height": 853, "file_size": 90000 },
                { "file_id": "medium", "width": 320, "height": 213 }
            ]
        }));
        match msg.classify() {
            Inbound::Media(event) => {
                assert_eq!(event.kind, MediaKind::Image);
                assert_eq!(event.content.file_id, "large");
                assert_eq!(event.content.declared_size, Some(90000));
                assert_eq!(event.reply_to.chat_id, 42);
                assert_eq!(event.reply_to.reply_to_message_id, Some(7));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_voice_and_video() {
        let voice = message(serde_json::json!({
            "message_id": 1,
            "chat": { "id": 5 },
            "voice": { "file_id": "v1", "mime_type": "audio/ogg", "file_size": 3000 }
        }));
        assert!(matches!(voice.classify(), Inbound::Media(e) if e.kind == MediaKind::Voice));

        let video = message(serde_json::json!({
            "message_id": 2,
            "chat": { "id": 5 },
            "video": { "file_id": "m1", "mime_type": "video/mp4" }
        }));
        assert!(matches!(video.classify(), Inbound::Media(e) if e.kind == MediaKind::Video));
    }

    #[test]
    fn test_document_classified_by_mime() {
        let doc = message(serde_json::json!({
            "message_id": 3,
            "chat": { "id": 5 },
            "document": { "file_id": "d1", "file_name": "scan.png" }
        }));
        assert!(matches!(doc.classify(), Inbound::Media(e) if e.kind == MediaKind::Image));

        let zip = message(serde_json::json!({
            "message_id": 4,
            "chat": { "id": 5 },
            "document": { "file_id": "d2", "mime_type": "application/zip", "file_name": "a.zip" }
        }));
        match zip.classify() {
            Inbound::Rejected(target, err) => {
                assert_eq!(target.chat_id, 5);
                assert_eq!(err.kind(), ErrorKind::UnsupportedKind);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_commands_and_plain_text() {
        let start = message(serde_json::json!({
            "message_id": 9,
            "chat": { "id": 1 },
            "text": "/start"
        }));
        assert!(matches!(
            start.classify(),
            Inbound::Command(BotCommand::Start, _)
        ));

        let chatter = message(serde_json::json!({
            "message_id": 10,
            "chat": { "id": 1 },
            "text": "hello bot"
        }));
        assert!(matches!(chatter.classify(), Inbound::Ignored));
    }

    #[test]
    fn test_updates_deserialize() {
        let body = serde_json::json!({
            "ok": true,
            "result": [
                { "update_id": 100, "message": { "message_id": 1, "chat": { "id": 2 }, "text": "/status" } },
                { "update_id": 101 }
            ]
        });
        let parsed: ApiResponse<Vec<Update>> = serde_json::from_value(body).unwrap();
        let updates = parsed.result.unwrap();
        assert_eq!(updates.len(), 2);
        assert!(updates[1].message.is_none());
    }

    #[test]
    fn test_urls_embed_token() {
        let client = TelegramClient::new(SecretString::from("123:abc".to_string()))
            .with_api_base("http://localhost:8081/");
        assert_eq!(
            client.method_url("getMe"),
            "http://localhost:8081/bot123:abc/getMe"
        );
        assert_eq!(
            client.file_url("voice/file_1.oga"),
            "http://localhost:8081/file/bot123:abc/voice/file_1.oga"
        );
    }
}
