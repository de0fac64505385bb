//! Test doubles for the external collaborators.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{MediaError, ToolFailure};
use crate::media::invoker::{ProcessInvoker, TranscodeOp};
use crate::media::recognizer::{Recognition, SpeechRecognizer};

/// What a [`FakeInvoker`] does when run.
#[derive(Debug, Clone)]
pub enum FakeOutcome {
    /// Write these bytes to the output and succeed.
    Write(Vec<u8>),
    /// Behave like a tool that exited non-zero.
    ExitFailure,
    /// Behave like a missing binary.
    SpawnFailure,
    /// Write partial output, then never finish.
    Hang,
}

pub struct FakeInvoker {
    outcome: FakeOutcome,
    calls: Arc<AtomicUsize>,
}

impl FakeInvoker {
    pub fn new(outcome: FakeOutcome) -> Self {
        Self {
            outcome,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn calls(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }
}

#[async_trait]
impl ProcessInvoker for FakeInvoker {
    async fn run(
        &self,
        _op: TranscodeOp,
        _input: &Path,
        output: &Path,
    ) -> Result<PathBuf, MediaError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.outcome {
            FakeOutcome::Write(bytes) => {
                tokio::fs::write(output, bytes).await?;
                Ok(output.to_path_buf())
            }
            FakeOutcome::ExitFailure => Err(MediaError::ExternalTool {
                tool: "fake-ffmpeg".to_string(),
                failure: ToolFailure::ExitStatus,
                detail: "exit status: 1: Invalid data found".to_string(),
            }),
            FakeOutcome::SpawnFailure => Err(MediaError::ExternalTool {
                tool: "fake-ffmpeg".to_string(),
                failure: ToolFailure::Spawn,
                detail: "No such file or directory".to_string(),
            }),
            FakeOutcome::Hang => {
                tokio::fs::write(output, b"partial").await?;
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(output.to_path_buf())
            }
        }
    }
}

enum Scripted {
    Speech(String),
    NotUnderstood,
    Fail(String),
}

pub struct FakeRecognizer {
    script: Scripted,
    calls: Arc<AtomicUsize>,
}

impl FakeRecognizer {
    fn with(script: Scripted) -> Self {
        Self {
            script,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn speech(text: &str) -> Self {
        Self::with(Scripted::Speech(text.to_string()))
    }

    pub fn not_understood() -> Self {
        Self::with(Scripted::NotUnderstood)
    }

    pub fn failing(reason: &str) -> Self {
        Self::with(Scripted::Fail(reason.to_string()))
    }

    pub fn calls(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }
}

#[async_trait]
impl SpeechRecognizer for FakeRecognizer {
    async fn recognize(&self, wav_path: &Path) -> Result<Recognition, MediaError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        assert!(wav_path.exists(), "recognizer must see the intermediate WAV");
        match &self.script {
            Scripted::Speech(text) => Ok(Recognition::Speech(text.clone())),
            Scripted::NotUnderstood => Ok(Recognition::NotUnderstood),
            Scripted::Fail(reason) => Err(MediaError::Recognition {
                reason: reason.clone(),
            }),
        }
    }

    fn name(&self) -> &str {
        "fake"
    }
}
