//! Media job dispatch.
//!
//! One [`MediaEvent`] becomes one job: download the attachment into a temp
//! file, run the converter for its kind, turn the outcome into exactly one
//! [`ReplyAction`] and deliver it. Every temp file the job touches is owned
//! by a [`TempResource`] living on this call's stack (or inside the reply),
//! so each exit path, including a timeout or a dropped task, releases them.

use std::sync::Arc;

use tracing::Instrument;

use crate::channels::{FileKind, Platform, ReplyAction};
use crate::config::JobLimits;
use crate::context::state::{Job, JobState};
use crate::error::{ErrorKind, MediaError};
use crate::media::{ConversionResult, Converters, MediaEvent, TempResource, TempStore};

/// Suggested file name for PDF replies.
pub const DOCUMENT_FILENAME: &str = "converted.pdf";
/// Suggested file name for audio replies.
pub const AUDIO_FILENAME: &str = "converted.mp3";

/// Routes media events to converters and replies through the platform.
pub struct MediaJobDispatcher {
    temp: TempStore,
    platform: Arc<dyn Platform>,
    converters: Converters,
    limits: JobLimits,
}

impl MediaJobDispatcher {
    pub fn new(
        temp: TempStore,
        platform: Arc<dyn Platform>,
        converters: Converters,
        limits: JobLimits,
    ) -> Self {
        Self {
            temp,
            platform,
            converters,
            limits,
        }
    }

    pub fn temp_store(&self) -> &TempStore {
        &self.temp
    }

    pub fn limits(&self) -> JobLimits {
        self.limits
    }

    /// Turn an event into its reply without sending it.
    ///
    /// The source file is gone when this returns; a file reply owns its
    /// artifact until the caller drops it.
    pub async fn handle(&self, event: &MediaEvent) -> ReplyAction {
        let mut job = Job::new(event.kind);
        self.handle_job(&mut job, event).await
    }

    /// Run a full job: handle, reply, release. Never fails; the returned
    /// job records how it ended.
    pub async fn run(&self, event: MediaEvent) -> Job {
        let mut job = Job::new(event.kind);
        let span = tracing::info_span!(
            "job",
            job_id = %job.id(),
            kind = %event.kind,
            chat_id = event.reply_to.chat_id
        );

        async {
            tracing::info!(file_id = %event.content.file_id, "Job started");

            let deadline = self.limits.job_timeout;
            let outcome = tokio::time::timeout(deadline, self.handle_job(&mut job, &event)).await;
            let reply = match outcome {
                Ok(reply) => reply,
                Err(_) => self.apology(&mut job, &MediaError::Timeout(deadline)),
            };

            job.advance(JobState::Replying);
            match self.platform.send(&event.reply_to, &reply).await {
                Ok(()) => job.finish(),
                Err(e) => {
                    tracing::warn!(error = %e, reply = reply.label(), "Failed to deliver reply");
                    job.advance(JobState::Failed);
                }
            }
            drop(reply);

            tracing::info!(
                state = %job.state(),
                failure = ?job.failure(),
                outstanding = self.temp.stats().outstanding(),
                "Job finished"
            );
        }
        .instrument(span)
        .await;

        job
    }

    async fn handle_job(&self, job: &mut Job, event: &MediaEvent) -> ReplyAction {
        job.advance(JobState::Downloading);
        let source = match self.download(event).await {
            Ok(source) => source,
            Err(e) => return self.apology(job, &e),
        };

        job.advance(JobState::Converting);
        let result = self
            .converters
            .select(event.kind)
            .convert(source.path())
            .await;
        drop(source);

        match result {
            ConversionResult::Document(file) => ReplyAction::SendFile {
                file,
                filename: DOCUMENT_FILENAME.to_string(),
                kind: FileKind::Document,
            },
            ConversionResult::Audio(file) => ReplyAction::SendFile {
                file,
                filename: AUDIO_FILENAME.to_string(),
                kind: FileKind::Audio,
            },
            ConversionResult::Text(text) => ReplyAction::SendText(text),
            ConversionResult::Failure(kind, detail) => {
                self.apology_for(job, kind, &detail)
            }
        }
    }

    /// Stream the attachment into a fresh source file.
    async fn download(&self, event: &MediaEvent) -> Result<TempResource, MediaError> {
        let max = self.limits.max_attachment_bytes;
        if let Some(size) = event.content.declared_size
            && size > max
        {
            return Err(MediaError::TooLarge { size, max });
        }

        let source = self.temp.acquire(event.kind.source_extension())?;
        let size = self
            .platform
            .download(&event.content, source.path(), max)
            .await?;
        tracing::debug!(bytes = size, path = %source.path().display(), "Downloaded attachment");
        Ok(source)
    }

    fn apology(&self, job: &mut Job, err: &MediaError) -> ReplyAction {
        self.apology_for(job, err.kind(), &err.to_string())
    }

    fn apology_for(&self, job: &mut Job, kind: ErrorKind, detail: &str) -> ReplyAction {
        tracing::warn!(error_kind = %kind, detail, "Conversion job failed");
        job.record_failure(kind);
        ReplyAction::text(kind.user_message())
    }
}
