//! Runtime configuration.
//!
//! Built once at startup from the parsed [`Cli`] (which already folded in
//! environment variables and `.env`). Nothing here changes after startup.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

use crate::cli::Cli;
use crate::error::ConfigError;

const TOKEN_VAR: &str = "TG_BOT_TOKEN";

/// Speech recognizer settings.
#[derive(Debug, Clone)]
pub struct RecognizerConfig {
    pub api_key: Option<SecretString>,
    pub base_url: String,
    pub model: String,
    pub language: Option<String>,
}

/// Limits applied to every conversion job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobLimits {
    /// Deadline for download, conversion and reply together.
    pub job_timeout: Duration,
    /// Largest attachment accepted.
    pub max_attachment_bytes: u64,
}

impl Default for JobLimits {
    fn default() -> Self {
        Self {
            job_timeout: Duration::from_secs(120),
            max_attachment_bytes: 20 * 1024 * 1024,
        }
    }
}

/// Media pipeline settings; needed by every subcommand.
#[derive(Debug, Clone)]
pub struct MediaConfig {
    pub temp_dir: PathBuf,
    pub ffmpeg_path: PathBuf,
    pub tool_timeout: Duration,
    pub limits: JobLimits,
    pub recognizer: RecognizerConfig,
}

/// Full bot configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub bot_token: SecretString,
    pub telegram_api_base: String,
    pub poll_timeout_secs: u64,
    pub media: MediaConfig,
}

fn non_zero(key: &str, value: u64) -> Result<u64, ConfigError> {
    if value == 0 {
        return Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: "must be greater than zero".to_string(),
        });
    }
    Ok(value)
}

impl MediaConfig {
    pub fn from_cli(cli: &Cli) -> Result<Self, ConfigError> {
        let job_timeout = non_zero("job_timeout_secs", cli.job_timeout_secs)?;
        let tool_timeout = non_zero("tool_timeout_secs", cli.tool_timeout_secs)?;
        let max_bytes = non_zero("max_bytes", cli.max_bytes)?;

        if tool_timeout > job_timeout {
            tracing::warn!(
                tool_timeout,
                job_timeout,
                "Tool timeout exceeds job timeout; the job deadline will win"
            );
        }

        let temp_dir = cli
            .temp_dir
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("convertbot"));

        Ok(Self {
            temp_dir,
            ffmpeg_path: cli.ffmpeg_path.clone(),
            tool_timeout: Duration::from_secs(tool_timeout),
            limits: JobLimits {
                job_timeout: Duration::from_secs(job_timeout),
                max_attachment_bytes: max_bytes,
            },
            recognizer: RecognizerConfig {
                api_key: cli
                    .whisper_api_key
                    .clone()
                    .filter(|k| !k.trim().is_empty())
                    .map(SecretString::from),
                base_url: cli.whisper_base_url.clone(),
                model: cli.whisper_model.clone(),
                language: cli.whisper_language.clone(),
            },
        })
    }
}

impl Config {
    /// Validate settings for running the bot. A missing token is fatal.
    pub fn from_cli(cli: &Cli) -> Result<Self, ConfigError> {
        let token = cli
            .bot_token
            .clone()
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingEnvVar(TOKEN_VAR.to_string()))?;

        Ok(Self {
            bot_token: SecretString::from(token),
            telegram_api_base: cli.telegram_api_base.clone(),
            poll_timeout_secs: cli.poll_timeout_secs,
            media: MediaConfig::from_cli(cli)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    fn parse(args: &[&str]) -> Cli {
        let mut argv = vec!["convertbot"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_missing_token_is_fatal() {
        let mut cli = parse(&[]);
        cli.bot_token = None;
        let err = Config::from_cli(&cli).unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar(ref v) if v == "TG_BOT_TOKEN"));
    }

    #[test]
    fn test_blank_token_is_fatal() {
        let cli = parse(&["--bot-token", "   "]);
        assert!(Config::from_cli(&cli).is_err());
    }

    #[test]
    fn test_valid_config() {
        let cli = parse(&[
            "--bot-token",
            "123:abc",
            "--temp-dir",
            "/var/tmp/cb",
            "--job-timeout-secs",
            "30",
            "--max-bytes",
            "1024",
        ]);
        let config = Config::from_cli(&cli).unwrap();
        assert_eq!(config.media.temp_dir, PathBuf::from("/var/tmp/cb"));
        assert_eq!(config.media.limits.job_timeout, Duration::from_secs(30));
        assert_eq!(config.media.limits.max_attachment_bytes, 1024);
    }

    #[test]
    fn test_zero_limits_rejected() {
        let cli = parse(&["--bot-token", "1:x", "--max-bytes", "0"]);
        let err = Config::from_cli(&cli).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "max_bytes"));
    }

    #[test]
    fn test_media_config_without_token() {
        let mut cli = parse(&[]);
        cli.bot_token = None;
        cli.whisper_api_key = Some(String::new());
        let media = MediaConfig::from_cli(&cli).unwrap();
        assert!(media.recognizer.api_key.is_none());
    }
}
