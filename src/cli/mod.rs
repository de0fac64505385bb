//! CLI command handling.
//!
//! Provides subcommands for:
//! - Running the bot (`run`, the default)
//! - Converting a local file without the chat platform (`convert`)
//! - Checking the environment (`doctor`)

mod convert;
mod doctor;

pub use convert::run_convert_command;
pub use doctor::run_doctor_command;

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use crate::media::MediaKind;

#[derive(Parser, Debug)]
#[command(name = "convertbot")]
#[command(about = "Chat bot that converts images to PDF, videos to MP3 and voice notes to text")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Telegram bot token
    #[arg(long, env = "TG_BOT_TOKEN", hide_env_values = true, global = true)]
    pub bot_token: Option<String>,

    /// Bot API server base URL
    #[arg(
        long,
        env = "TELEGRAM_API_BASE",
        default_value = "https://api.telegram.org",
        global = true
    )]
    pub telegram_api_base: String,

    /// Directory for transient job files (defaults to the system temp dir)
    #[arg(long, env = "CONVERTER_TEMP_DIR", global = true)]
    pub temp_dir: Option<PathBuf>,

    /// Path to the ffmpeg executable
    #[arg(long, env = "FFMPEG_PATH", default_value = "ffmpeg", global = true)]
    pub ffmpeg_path: PathBuf,

    /// Deadline for one whole conversion job, in seconds
    #[arg(long, env = "CONVERTER_JOB_TIMEOUT_SECS", default_value_t = 120, global = true)]
    pub job_timeout_secs: u64,

    /// Deadline for one ffmpeg invocation, in seconds
    #[arg(long, env = "CONVERTER_TOOL_TIMEOUT_SECS", default_value_t = 60, global = true)]
    pub tool_timeout_secs: u64,

    /// Largest attachment accepted, in bytes
    #[arg(long, env = "CONVERTER_MAX_BYTES", default_value_t = 20 * 1024 * 1024, global = true)]
    pub max_bytes: u64,

    /// Long-poll timeout for getUpdates, in seconds
    #[arg(long, env = "TELEGRAM_POLL_TIMEOUT_SECS", default_value_t = 30, global = true)]
    pub poll_timeout_secs: u64,

    /// API key for the speech recognizer
    #[arg(long, env = "WHISPER_API_KEY", hide_env_values = true, global = true)]
    pub whisper_api_key: Option<String>,

    /// Base URL of a Whisper-compatible transcription API
    #[arg(
        long,
        env = "WHISPER_BASE_URL",
        default_value = "https://api.openai.com/v1",
        global = true
    )]
    pub whisper_base_url: String,

    /// Transcription model name
    #[arg(long, env = "WHISPER_MODEL", default_value = "whisper-1", global = true)]
    pub whisper_model: String,

    /// Language hint for transcription (ISO 639-1)
    #[arg(long, env = "WHISPER_LANGUAGE", global = true)]
    pub whisper_language: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long, env = "LOG_JSON", global = true)]
    pub log_json: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the bot (default if no subcommand given)
    Run,

    /// Convert a local file and write the result next to it (or to --output)
    Convert {
        /// What kind of media the input is
        #[arg(long, value_enum)]
        kind: KindArg,

        /// Input file
        input: PathBuf,

        /// Where to write a file result
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Check ffmpeg, the temp directory and required settings
    Doctor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum KindArg {
    Image,
    Video,
    Voice,
}

impl From<KindArg> for MediaKind {
    fn from(k: KindArg) -> Self {
        match k {
            KindArg::Image => MediaKind::Image,
            KindArg::Video => MediaKind::Video,
            KindArg::Voice => MediaKind::Voice,
        }
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_convert() {
        let cli = Cli::try_parse_from([
            "convertbot",
            "convert",
            "--kind",
            "video",
            "clip.mp4",
            "-o",
            "out.mp3",
        ])
        .unwrap();
        match cli.command {
            Some(Command::Convert {
                kind,
                input,
                output,
            }) => {
                assert_eq!(MediaKind::from(kind), MediaKind::Video);
                assert_eq!(input, PathBuf::from("clip.mp4"));
                assert_eq!(output, Some(PathBuf::from("out.mp3")));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["convertbot", "--bot-token", "1:x"]).unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.ffmpeg_path, PathBuf::from("ffmpeg"));
        assert_eq!(cli.job_timeout_secs, 120);
        assert_eq!(cli.max_bytes, 20 * 1024 * 1024);
    }
}
