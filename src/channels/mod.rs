//! Chat platform integration.
//!
//! The conversion core only talks to the platform through [`Platform`]:
//! download an attachment into a file, send one reply. Everything
//! Telegram-specific (polling, message classification, multipart uploads)
//! lives in [`telegram`].

pub mod telegram;

use std::path::Path;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;

use crate::error::{ChannelError, MediaError};
use crate::media::{ContentHandle, MediaEvent, ReplyTarget, TempResource};

pub use telegram::TelegramClient;

/// How a file reply should be presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Document,
    Audio,
}

/// The single reply a job produces.
///
/// A file reply owns its [`TempResource`]; the file disappears once the
/// action is dropped after sending.
#[derive(Debug)]
pub enum ReplyAction {
    SendFile {
        file: TempResource,
        filename: String,
        kind: FileKind,
    },
    SendText(String),
}

impl ReplyAction {
    pub fn text(text: impl Into<String>) -> Self {
        Self::SendText(text.into())
    }

    /// Short label for logs.
    pub fn label(&self) -> &'static str {
        match self {
            Self::SendFile {
                kind: FileKind::Document,
                ..
            } => "document",
            Self::SendFile {
                kind: FileKind::Audio,
                ..
            } => "audio",
            Self::SendText(_) => "text",
        }
    }
}

/// Chat-platform capabilities the pipeline depends on.
#[async_trait]
pub trait Platform: Send + Sync {
    /// Write the bytes behind a content handle to `dest`, returning the size.
    ///
    /// Fails with [`ChannelError::TooLarge`] as soon as more than `max_bytes`
    /// would be written; `dest` may then hold a partial file.
    async fn download(
        &self,
        content: &ContentHandle,
        dest: &Path,
        max_bytes: u64,
    ) -> Result<u64, ChannelError>;

    /// Deliver a reply to a conversation.
    async fn send(&self, target: &ReplyTarget, reply: &ReplyAction) -> Result<(), ChannelError>;

    /// Get the platform name.
    fn name(&self) -> &str;
}

/// Download destination that refuses to grow past a byte limit.
pub struct LimitedSink {
    file: tokio::fs::File,
    written: u64,
    max: u64,
}

impl LimitedSink {
    pub async fn create(path: &Path, max: u64) -> Result<Self, ChannelError> {
        Ok(Self {
            file: tokio::fs::File::create(path).await?,
            written: 0,
            max,
        })
    }

    /// Append a chunk, or fail without writing it if the limit would be passed.
    pub async fn write_chunk(&mut self, chunk: &[u8]) -> Result<(), ChannelError> {
        let size = self.written + chunk.len() as u64;
        if size > self.max {
            return Err(ChannelError::TooLarge {
                size,
                max: self.max,
            });
        }
        self.file.write_all(chunk).await?;
        self.written = size;
        Ok(())
    }

    /// Flush and return the number of bytes written.
    pub async fn finish(mut self) -> Result<u64, ChannelError> {
        self.file.flush().await?;
        Ok(self.written)
    }
}

/// Bot commands understood outside the media pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BotCommand {
    Start,
    Status,
}

impl BotCommand {
    /// Parse `/start`, `/status@SomeBot` and friends; anything else is `None`.
    pub fn parse(text: &str) -> Option<Self> {
        let first = text.split_whitespace().next()?;
        let name = first.strip_prefix('/')?;
        let name = name.split('@').next().unwrap_or(name);
        match name.to_ascii_lowercase().as_str() {
            "start" | "help" => Some(Self::Start),
            "status" => Some(Self::Status),
            _ => None,
        }
    }
}

/// What an inbound platform message means to the bot.
#[derive(Debug)]
pub enum Inbound {
    /// A convertible attachment.
    Media(MediaEvent),
    /// A bot command.
    Command(BotCommand, ReplyTarget),
    /// An attachment the bot cannot convert.
    Rejected(ReplyTarget, MediaError),
    /// Nothing to do.
    Ignored,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        assert_eq!(BotCommand::parse("/start"), Some(BotCommand::Start));
        assert_eq!(BotCommand::parse("/status"), Some(BotCommand::Status));
        assert_eq!(
            BotCommand::parse("/status@ConvertBot extra"),
            Some(BotCommand::Status)
        );
        assert_eq!(BotCommand::parse("/help"), Some(BotCommand::Start));
    }

    #[test]
    fn test_parse_non_commands() {
        assert_eq!(BotCommand::parse("start"), None);
        assert_eq!(BotCommand::parse("/unknown"), None);
        assert_eq!(BotCommand::parse(""), None);
    }

    #[test]
    fn test_reply_labels() {
        assert_eq!(ReplyAction::text("hi").label(), "text");
    }

    #[tokio::test]
    async fn test_sink_stops_at_limit() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("source.mp4");
        let mut sink = LimitedSink::create(&path, 10).await.unwrap();

        sink.write_chunk(b"012345").await.unwrap();
        let err = sink.write_chunk(b"6789ab").await.unwrap_err();
        assert!(matches!(err, ChannelError::TooLarge { size: 12, max: 10 }));
        assert_eq!(sink.finish().await.unwrap(), 6);

        assert_eq!(std::fs::metadata(&path).unwrap().len(), 6);
    }

    #[tokio::test]
    async fn test_sink_accepts_exact_limit() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("voice.ogg");
        let mut sink = LimitedSink::create(&path, 8).await.unwrap();

        sink.write_chunk(b"OggS").await.unwrap();
        sink.write_chunk(b"1234").await.unwrap();
        assert_eq!(sink.finish().await.unwrap(), 8);
        assert_eq!(std::fs::read(&path).unwrap(), b"OggS1234");
    }
}
