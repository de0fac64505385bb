//! convertbot: a chat bot that converts media attachments.
//!
//! Photos become single-page PDFs, videos become MP3 audio and voice notes
//! become text. Each attachment is one job run by the
//! [`dispatcher::MediaJobDispatcher`]; every intermediate file a job creates
//! is a scoped [`media::TempResource`] that is gone when the job ends.

pub mod bot;
pub mod channels;
pub mod cli;
pub mod config;
pub mod context;
pub mod dispatcher;
pub mod error;
pub mod media;

pub use error::{Error, Result};
