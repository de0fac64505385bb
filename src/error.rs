//! Error types for convertbot.

use std::time::Duration;

/// Top-level error type for the bot process.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    #[error("Media error: {0}")]
    Media(#[from] MediaError),
}

/// Configuration-related errors.
///
/// These are startup conditions: they abort the process before any job runs.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Chat platform errors (downloads, uploads, polling).
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("Request to {method} failed: {reason}")]
    RequestFailed { method: String, reason: String },

    #[error("Platform rejected {method}: {description}")]
    Rejected { method: String, description: String },

    #[error("Download failed for file {file_id}: {reason}")]
    DownloadFailed { file_id: String, reason: String },

    #[error("Send failed: {reason}")]
    SendFailed { reason: String },

    #[error("Attachment too large: more than {max} bytes (at least {size})")]
    TooLarge { size: u64, max: u64 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Why an external tool invocation failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolFailure {
    /// The process could not be started at all.
    Spawn,
    /// The process ran and exited unsuccessfully.
    ExitStatus,
    /// The process exceeded its deadline and was killed.
    TimedOut,
}

impl std::fmt::Display for ToolFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Spawn => write!(f, "spawn failed"),
            Self::ExitStatus => write!(f, "non-zero exit"),
            Self::TimedOut => write!(f, "timed out"),
        }
    }
}

/// Media conversion errors.
///
/// Every variant maps onto an [`ErrorKind`]; the kind decides what the user
/// sees, the variant payload is for operators only.
#[derive(Debug, thiserror::Error)]
pub enum MediaError {
    #[error("Unsupported media kind: {mime_type}")]
    UnsupportedKind { mime_type: String },

    #[error("Could not decode image: {reason}")]
    Decode { reason: String },

    #[error("Transcoding failed: {reason}")]
    Transcode { reason: String },

    #[error("External tool {tool} failed ({failure}): {detail}")]
    ExternalTool {
        tool: String,
        failure: ToolFailure,
        detail: String,
    },

    #[error("Speech recognition failed: {reason}")]
    Recognition { reason: String },

    #[error("Media download failed: {reason}")]
    DownloadFailed { reason: String },

    #[error("Media file too large: {size} bytes exceeds {max} byte limit")]
    TooLarge { size: u64, max: u64 },

    #[error("Job timed out after {0:?}")]
    Timeout(Duration),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl MediaError {
    /// Classify this error for the user-facing reply.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UnsupportedKind { .. } => ErrorKind::UnsupportedKind,
            Self::Decode { .. } => ErrorKind::DecodeError,
            Self::Transcode { .. } => ErrorKind::TranscodeError,
            Self::ExternalTool { .. } => ErrorKind::ExternalToolError,
            Self::Recognition { .. } => ErrorKind::RecognitionError,
            Self::DownloadFailed { .. } => ErrorKind::DownloadError,
            Self::TooLarge { .. } => ErrorKind::TooLarge,
            Self::Timeout(_) => ErrorKind::Timeout,
            Self::Io(_) => ErrorKind::Io,
        }
    }
}

impl From<ChannelError> for MediaError {
    fn from(e: ChannelError) -> Self {
        match e {
            ChannelError::TooLarge { size, max } => Self::TooLarge { size, max },
            ChannelError::Io(e) => Self::Io(e),
            other => Self::DownloadFailed {
                reason: other.to_string(),
            },
        }
    }
}

/// Failure taxonomy of a conversion job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    UnsupportedKind,
    DecodeError,
    TranscodeError,
    ExternalToolError,
    RecognitionError,
    DownloadError,
    TooLarge,
    Timeout,
    Io,
}

impl ErrorKind {
    /// Fixed apology text shown to the user for this kind of failure.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::UnsupportedKind => {
                "Sorry 😔 I can only convert images, videos and voice messages."
            }
            Self::DecodeError => "Sorry 😔 I couldn't read that image. Is it a valid picture?",
            Self::TranscodeError => "Sorry 😔 I couldn't extract the audio from that video.",
            Self::ExternalToolError => {
                "Sorry 😔 my converter is not working right now. Please try again later."
            }
            Self::RecognitionError => {
                "Sorry 😔 the speech recognition service is unavailable right now."
            }
            Self::DownloadError => "Sorry 😔 I couldn't download your file. Please send it again.",
            Self::TooLarge => "Sorry 😔 that file is too large for me to convert.",
            Self::Timeout => "Sorry 😔 that took too long to convert. Try a shorter file.",
            Self::Io => "Sorry 😔 something went wrong while converting your file.",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::UnsupportedKind => "unsupported_kind",
            Self::DecodeError => "decode_error",
            Self::TranscodeError => "transcode_error",
            Self::ExternalToolError => "external_tool_error",
            Self::RecognitionError => "recognition_error",
            Self::DownloadError => "download_error",
            Self::TooLarge => "too_large",
            Self::Timeout => "timeout",
            Self::Io => "io",
        };
        write!(f, "{}", s)
    }
}

/// Result type alias for the bot.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_media_error_kinds() {
        let cases = [
            (
                MediaError::UnsupportedKind {
                    mime_type: "application/zip".to_string(),
                },
                ErrorKind::UnsupportedKind,
            ),
            (
                MediaError::Decode {
                    reason: "bad header".to_string(),
                },
                ErrorKind::DecodeError,
            ),
            (
                MediaError::Transcode {
                    reason: "no audio stream".to_string(),
                },
                ErrorKind::TranscodeError,
            ),
            (
                MediaError::ExternalTool {
                    tool: "ffmpeg".to_string(),
                    failure: ToolFailure::Spawn,
                    detail: "not found".to_string(),
                },
                ErrorKind::ExternalToolError,
            ),
            (
                MediaError::Recognition {
                    reason: "503".to_string(),
                },
                ErrorKind::RecognitionError,
            ),
            (
                MediaError::Timeout(Duration::from_secs(1)),
                ErrorKind::Timeout,
            ),
        ];
        for (err, kind) in cases {
            assert_eq!(err.kind(), kind, "{}", err);
        }
    }

    #[test]
    fn test_user_messages_do_not_leak_detail() {
        let err = MediaError::ExternalTool {
            tool: "ffmpeg".to_string(),
            failure: ToolFailure::ExitStatus,
            detail: "/tmp/secret/path.mp4: Invalid data".to_string(),
        };
        let message = err.kind().user_message();
        assert!(!message.contains("/tmp"));
        assert!(!message.contains("ffmpeg"));
    }

    #[test]
    fn test_user_messages_are_distinct() {
        let kinds = [
            ErrorKind::UnsupportedKind,
            ErrorKind::DecodeError,
            ErrorKind::TranscodeError,
            ErrorKind::ExternalToolError,
            ErrorKind::RecognitionError,
            ErrorKind::DownloadError,
            ErrorKind::TooLarge,
            ErrorKind::Timeout,
            ErrorKind::Io,
        ];
        let unique: std::collections::HashSet<_> =
            kinds.iter().map(|k| k.user_message()).collect();
        assert_eq!(unique.len(), kinds.len());
    }

    #[test]
    fn test_channel_error_becomes_download_failure() {
        let err: MediaError = ChannelError::DownloadFailed {
            file_id: "abc".to_string(),
            reason: "HTTP 404".to_string(),
        }
        .into();
        assert_eq!(err.kind(), ErrorKind::DownloadError);
        assert!(err.to_string().contains("HTTP 404"));
    }

    #[test]
    fn test_oversized_download_keeps_its_kind() {
        let err: MediaError = ChannelError::TooLarge { size: 30, max: 20 }.into();
        assert_eq!(err.kind(), ErrorKind::TooLarge);

        let err: MediaError =
            ChannelError::Io(std::io::Error::other("disk full")).into();
        assert_eq!(err.kind(), ErrorKind::Io);
    }

    #[test]
    fn test_error_from_config_error() {
        let inner = ConfigError::MissingEnvVar("TG_BOT_TOKEN".to_string());
        let err = Error::from(inner);
        assert!(err.to_string().contains("Configuration error"));
        assert!(err.to_string().contains("TG_BOT_TOKEN"));
    }

    #[test]
    fn test_error_kind_display() {
        assert_eq!(ErrorKind::TranscodeError.to_string(), "transcode_error");
        assert_eq!(ErrorKind::RecognitionError.to_string(), "recognition_error");
    }
}
