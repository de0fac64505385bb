//! Media conversion.
//!
//! Provides one converter per supported media kind:
//! - Image → single-page PDF document
//! - Video → MP3 audio track (via ffmpeg)
//! - Voice → transcribed text (via ffmpeg and a speech recognizer)
//!
//! plus the scoped temp files and external-process plumbing they share.

pub mod invoker;
pub mod pdf;
mod photo;
pub mod recognizer;
pub mod temp;
mod video;
mod voice;

#[cfg(test)]
pub(crate) mod testing;

use std::path::Path;
use std::sync::Arc;

pub use invoker::{FfmpegInvoker, ProcessInvoker, TranscodeOp};
pub use photo::{DEFAULT_DPI, ImageToDocument, image_to_pdf};
pub use recognizer::{Recognition, SpeechRecognizer, WhisperRecognizer};
pub use temp::{TempResource, TempStats, TempStore};
pub use video::VideoToAudio;
pub use voice::{NOT_UNDERSTOOD_REPLY, VoiceToText, transcript_reply};

use crate::config::MediaConfig;
use crate::error::{ErrorKind, MediaError, ToolFailure};

/// Kind of an inbound attachment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    Image,
    Video,
    Voice,
}

impl MediaKind {
    /// Classify a generic file attachment by its MIME type.
    pub fn from_mime(mime: &str) -> Result<Self, MediaError> {
        let essence = mime
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        match essence.as_str() {
            m if m.starts_with("image/") => Ok(Self::Image),
            m if m.starts_with("video/") => Ok(Self::Video),
            "audio/ogg" | "audio/opus" | "audio/x-opus+ogg" => Ok(Self::Voice),
            _ => Err(MediaError::UnsupportedKind {
                mime_type: mime.to_string(),
            }),
        }
    }

    /// Extension used for the materialized source file.
    pub fn source_extension(&self) -> &'static str {
        match self {
            Self::Image => "jpg",
            Self::Video => "mp4",
            Self::Voice => "ogg",
        }
    }
}

impl std::fmt::Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Image => write!(f, "image"),
            Self::Video => write!(f, "video"),
            Self::Voice => write!(f, "voice"),
        }
    }
}

/// Platform-side reference to the attachment bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentHandle {
    /// Platform file identifier.
    pub file_id: String,
    /// Size announced by the platform, if any.
    pub declared_size: Option<u64>,
}

/// Conversation a reply goes back to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ReplyTarget {
    pub chat_id: i64,
    /// Message the reply should quote.
    pub reply_to_message_id: Option<i64>,
}

/// One inbound attachment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaEvent {
    pub kind: MediaKind,
    pub content: ContentHandle,
    pub reply_to: ReplyTarget,
}

/// Result of running a converter.
///
/// File artifacts travel as [`TempResource`]s: whoever holds the result owns
/// the file and releases it by dropping.
#[derive(Debug)]
pub enum ConversionResult {
    Document(TempResource),
    Audio(TempResource),
    Text(String),
    Failure(ErrorKind, String),
}

impl ConversionResult {
    pub fn from_error(err: &MediaError) -> Self {
        Self::Failure(err.kind(), err.to_string())
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failure(..))
    }
}

/// The converter selected for a media kind.
pub enum Converter<'a> {
    Image(&'a ImageToDocument),
    Video(&'a VideoToAudio),
    Voice(&'a VoiceToText),
}

impl Converter<'_> {
    pub async fn convert(&self, source: &Path) -> ConversionResult {
        match self {
            Self::Image(c) => c.convert(source).await,
            Self::Video(c) => c.convert(source).await,
            Self::Voice(c) => c.convert(source).await,
        }
    }
}

/// One converter per [`MediaKind`].
pub struct Converters {
    pub image: ImageToDocument,
    pub video: VideoToAudio,
    pub voice: VoiceToText,
}

impl Converters {
    /// Build the standard set on a shared store, invoker and recognizer.
    pub fn new(
        temp: TempStore,
        invoker: Arc<dyn ProcessInvoker>,
        recognizer: Arc<dyn SpeechRecognizer>,
    ) -> Self {
        Self {
            image: ImageToDocument::new(temp.clone()),
            video: VideoToAudio::new(temp.clone(), invoker.clone()),
            voice: VoiceToText::new(temp, invoker, recognizer),
        }
    }

    /// Build the production set: ffmpeg plus a Whisper-compatible recognizer.
    pub fn from_config(media: &MediaConfig, temp: TempStore) -> Self {
        let invoker = FfmpegInvoker::new(&media.ffmpeg_path).with_timeout(media.tool_timeout);
        let rec = &media.recognizer;
        let recognizer = WhisperRecognizer::new()
            .with_api_key(rec.api_key.clone())
            .with_base_url(&rec.base_url)
            .with_model(&rec.model)
            .with_language(rec.language.clone());
        Self::new(temp, Arc::new(invoker), Arc::new(recognizer))
    }

    pub fn select(&self, kind: MediaKind) -> Converter<'_> {
        match kind {
            MediaKind::Image => Converter::Image(&self.image),
            MediaKind::Video => Converter::Video(&self.video),
            MediaKind::Voice => Converter::Voice(&self.voice),
        }
    }
}

/// Treat an unsuccessful tool exit as a transcoding failure.
///
/// A tool that could not start or hit its deadline is an infrastructure
/// problem and keeps its [`MediaError::ExternalTool`] classification.
pub(crate) fn tool_to_transcode(err: MediaError) -> MediaError {
    match err {
        MediaError::ExternalTool {
            tool,
            failure: ToolFailure::ExitStatus,
            detail,
        } => MediaError::Transcode {
            reason: format!("{}: {}", tool, detail),
        },
        other => other,
    }
}

/// A transform that "succeeded" without producing bytes did not succeed.
pub(crate) async fn ensure_non_empty(path: &Path) -> Result<(), MediaError> {
    match tokio::fs::metadata(path).await {
        Ok(meta) if meta.len() > 0 => Ok(()),
        Ok(_) => Err(MediaError::Transcode {
            reason: "tool produced an empty output".to_string(),
        }),
        Err(e) => Err(MediaError::Transcode {
            reason: format!("tool produced no output: {}", e),
        }),
    }
}
