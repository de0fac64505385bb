//! Video to audio extraction.

use std::path::Path;
use std::sync::Arc;

use crate::error::MediaError;
use crate::media::invoker::{ProcessInvoker, TranscodeOp};
use crate::media::temp::{TempResource, TempStore};
use crate::media::{ConversionResult, ensure_non_empty, tool_to_transcode};

/// Extracts a video's audio track as a standalone MP3.
pub struct VideoToAudio {
    temp: TempStore,
    invoker: Arc<dyn ProcessInvoker>,
}

impl VideoToAudio {
    pub fn new(temp: TempStore, invoker: Arc<dyn ProcessInvoker>) -> Self {
        Self { temp, invoker }
    }

    pub async fn convert(&self, source: &Path) -> ConversionResult {
        match self.extract(source).await {
            Ok(audio) => ConversionResult::Audio(audio),
            Err(e) => ConversionResult::from_error(&e),
        }
    }

    async fn extract(&self, source: &Path) -> Result<TempResource, MediaError> {
        let op = TranscodeOp::ExtractMp3;
        let output = self.temp.acquire(op.output_extension())?;

        self.invoker
            .run(op, source, output.path())
            .await
            .map_err(tool_to_transcode)?;
        ensure_non_empty(output.path()).await?;

        Ok(output)
    }
}
