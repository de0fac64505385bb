//! External codec invocation.
//!
//! Converters never spawn processes themselves; they go through a
//! [`ProcessInvoker`], which runs the operation and folds every way it can go
//! wrong (missing binary, non-zero exit, deadline) into
//! [`MediaError::ExternalTool`].

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;

use crate::error::{MediaError, ToolFailure};

/// Longest stderr excerpt kept in an error detail.
const MAX_STDERR_DETAIL: usize = 2048;

/// A transcoding operation understood by the invoker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranscodeOp {
    /// Drop the video stream and encode the audio track as MP3.
    ExtractMp3,
    /// Decode any audio into 16 kHz mono 16-bit PCM WAV.
    DecodeToWav,
}

impl TranscodeOp {
    /// Extension of the file this operation produces.
    pub fn output_extension(&self) -> &'static str {
        match self {
            Self::ExtractMp3 => "mp3",
            Self::DecodeToWav => "wav",
        }
    }

    fn codec_args(&self) -> &'static [&'static str] {
        match self {
            Self::ExtractMp3 => &["-vn", "-acodec", "libmp3lame", "-f", "mp3"],
            Self::DecodeToWav => &[
                "-vn", "-acodec", "pcm_s16le", "-ar", "16000", "-ac", "1", "-f", "wav",
            ],
        }
    }
}

impl std::fmt::Display for TranscodeOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ExtractMp3 => write!(f, "extract_mp3"),
            Self::DecodeToWav => write!(f, "decode_to_wav"),
        }
    }
}

/// Runs an external transform from `input` into `output`.
#[async_trait]
pub trait ProcessInvoker: Send + Sync {
    /// Run `op`, returning the output path on success.
    ///
    /// On failure no partial file is left at `output`. A successful return
    /// does not promise a non-empty file; callers check that themselves.
    async fn run(
        &self,
        op: TranscodeOp,
        input: &Path,
        output: &Path,
    ) -> Result<PathBuf, MediaError>;
}

/// [`ProcessInvoker`] backed by the `ffmpeg` executable.
pub struct FfmpegInvoker {
    ffmpeg_path: PathBuf,
    timeout: Duration,
}

impl FfmpegInvoker {
    pub fn new(ffmpeg_path: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
            timeout: Duration::from_secs(60),
        }
    }

    /// Set the per-invocation deadline.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn tool_name(&self) -> String {
        self.ffmpeg_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "ffmpeg".to_string())
    }

    fn failure(&self, failure: ToolFailure, detail: impl Into<String>) -> MediaError {
        MediaError::ExternalTool {
            tool: self.tool_name(),
            failure,
            detail: detail.into(),
        }
    }
}

#[async_trait]
impl ProcessInvoker for FfmpegInvoker {
    async fn run(
        &self,
        op: TranscodeOp,
        input: &Path,
        output: &Path,
    ) -> Result<PathBuf, MediaError> {
        let mut cmd = Command::new(&self.ffmpeg_path);
        cmd.arg("-hide_banner")
            .args(["-loglevel", "error"])
            .arg("-i")
            .arg(input)
            .args(op.codec_args())
            .arg("-y")
            .arg(output)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        tracing::debug!(
            tool = %self.ffmpeg_path.display(),
            op = %op,
            input = %input.display(),
            "Running external transcode"
        );

        let child = cmd
            .spawn()
            .map_err(|e| self.failure(ToolFailure::Spawn, e.to_string()))?;

        let result = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Err(_) => Err(self.failure(
                ToolFailure::TimedOut,
                format!("{} exceeded {:?}", op, self.timeout),
            )),
            Ok(Err(e)) => Err(self.failure(ToolFailure::Spawn, e.to_string())),
            Ok(Ok(out)) if !out.status.success() => {
                let stderr = String::from_utf8_lossy(&out.stderr);
                Err(self.failure(
                    ToolFailure::ExitStatus,
                    format!("{}: {}", out.status, truncate(stderr.trim(), MAX_STDERR_DETAIL)),
                ))
            }
            Ok(Ok(_)) => Ok(output.to_path_buf()),
        };

        if result.is_err() {
            discard_partial(output).await;
        }
        result
    }
}

async fn discard_partial(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => tracing::debug!(path = %path.display(), "Removed partial tool output"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(path = %path.display(), error = %e, "Failed to remove partial output"),
    }
}

fn truncate(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}
