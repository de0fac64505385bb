//! Voice message transcription.
//!
//! The recognizer only accepts uncompressed audio, so the clip is first
//! decoded to a WAV intermediate. That intermediate belongs to this converter
//! and is gone before [`VoiceToText::convert`] returns.

use std::path::Path;
use std::sync::Arc;

use crate::error::MediaError;
use crate::media::invoker::{ProcessInvoker, TranscodeOp};
use crate::media::recognizer::{Recognition, SpeechRecognizer};
use crate::media::temp::TempStore;
use crate::media::{ConversionResult, ensure_non_empty, tool_to_transcode};

/// Reply sent when the recognizer heard no intelligible speech.
pub const NOT_UNDERSTOOD_REPLY: &str = "Sorry 😔 I couldn't understand that voice message.";

/// Reply text for a successful transcription.
pub fn transcript_reply(text: &str) -> String {
    format!("🗣️ Transcribed text:\n\n{}", text)
}

/// Transcribes voice clips to text.
pub struct VoiceToText {
    temp: TempStore,
    invoker: Arc<dyn ProcessInvoker>,
    recognizer: Arc<dyn SpeechRecognizer>,
}

impl VoiceToText {
    pub fn new(
        temp: TempStore,
        invoker: Arc<dyn ProcessInvoker>,
        recognizer: Arc<dyn SpeechRecognizer>,
    ) -> Self {
        Self {
            temp,
            invoker,
            recognizer,
        }
    }

    pub async fn convert(&self, source: &Path) -> ConversionResult {
        match self.transcribe(source).await {
            Ok(Recognition::Speech(text)) => ConversionResult::Text(transcript_reply(&text)),
            Ok(Recognition::NotUnderstood) => {
                tracing::info!("Recognizer could not understand voice message");
                ConversionResult::Text(NOT_UNDERSTOOD_REPLY.to_string())
            }
            Err(e) => ConversionResult::from_error(&e),
        }
    }

    async fn transcribe(&self, source: &Path) -> Result<Recognition, MediaError> {
        let op = TranscodeOp::DecodeToWav;
        let mut wav = self.temp.acquire(op.output_extension())?;

        let outcome = async {
            self.invoker
                .run(op, source, wav.path())
                .await
                .map_err(tool_to_transcode)?;
            ensure_non_empty(wav.path()).await?;

            self.recognizer
                .recognize(wav.path())
                .await
                .map_err(|e| match e {
                    MediaError::Recognition { .. } => e,
                    other => MediaError::Recognition {
                        reason: other.to_string(),
                    },
                })
        }
        .await;

        wav.release();
        if let Ok(Recognition::Speech(_)) = &outcome {
            tracing::debug!(recognizer = self.recognizer.name(), "Voice message transcribed");
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;
    use crate::error::ErrorKind;
    use crate::media::testing::{FakeInvoker, FakeOutcome, FakeRecognizer};

    struct Fixture {
        _dir: TempDir,
        store: TempStore,
        source: std::path::PathBuf,
    }

    fn fixture() -> Fixture {
        let dir = TempDir::new().unwrap();
        let store = TempStore::new(dir.path().join("store"));
        let source = dir.path().join("voice.ogg");
        std::fs::write(&source, b"OggS\x00\x02").unwrap();
        Fixture {
            _dir: dir,
            store,
            source,
        }
    }

    fn converter(fx: &Fixture, outcome: FakeOutcome, recognizer: FakeRecognizer) -> VoiceToText {
        VoiceToText::new(
            fx.store.clone(),
            Arc::new(FakeInvoker::new(outcome)),
            Arc::new(recognizer),
        )
    }

    fn wav() -> FakeOutcome {
        FakeOutcome::Write(b"RIFF\x24\x00\x00\x00WAVEfmt ".to_vec())
    }

    #[tokio::test]
    async fn test_speech_becomes_text() {
        let fx = fixture();
        let c = converter(&fx, wav(), FakeRecognizer::speech("hello there"));

        let result = c.convert(&fx.source).await;
        assert!(
            matches!(result, ConversionResult::Text(ref t) if t == "🗣️ Transcribed text:\n\nhello there")
        );
        assert_eq!(fx.store.stats().outstanding(), 0);
        assert_eq!(fx.store.stats().acquired, 1);
    }

    #[tokio::test]
    async fn test_not_understood_is_apology_text_not_failure() {
        let fx = fixture();
        let c = converter(&fx, wav(), FakeRecognizer::not_understood());

        let result = c.convert(&fx.source).await;
        assert!(matches!(result, ConversionResult::Text(ref t) if t == NOT_UNDERSTOOD_REPLY));
        assert_eq!(fx.store.stats().outstanding(), 0);
    }

    #[tokio::test]
    async fn test_recognizer_fault_is_recognition_error() {
        let fx = fixture();
        let c = converter(&fx, wav(), FakeRecognizer::failing("503 Service Unavailable"));

        let result = c.convert(&fx.source).await;
        assert!(matches!(
            result,
            ConversionResult::Failure(ErrorKind::RecognitionError, ref detail) if detail.contains("503")
        ));
        assert_eq!(fx.store.stats().outstanding(), 0);
    }

    #[tokio::test]
    async fn test_decode_failure_skips_recognizer() {
        let fx = fixture();
        let recognizer = FakeRecognizer::speech("unused");
        let calls = recognizer.calls();
        let c = converter(&fx, FakeOutcome::ExitFailure, recognizer);

        let result = c.convert(&fx.source).await;
        assert!(matches!(
            result,
            ConversionResult::Failure(ErrorKind::TranscodeError, _)
        ));
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 0);
        assert_eq!(fx.store.stats().outstanding(), 0);
    }

    #[tokio::test]
    async fn test_intermediate_removed_from_disk() {
        let fx = fixture();
        let c = converter(&fx, wav(), FakeRecognizer::speech("ok"));

        let _ = c.convert(&fx.source).await;
        assert_eq!(std::fs::read_dir(fx.store.root()).unwrap().count(), 0);
    }
}
