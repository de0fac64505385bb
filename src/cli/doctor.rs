//! Doctor diagnostics CLI command.
//!
//! Checks what the bot needs at runtime and reports actionable fixes.

use std::time::Duration;

use crate::cli::Cli;
use crate::config::MediaConfig;
use crate::media::TempStore;

/// Diagnostic check result.
struct Check {
    name: &'static str,
    status: CheckStatus,
    message: String,
    fix: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CheckStatus {
    Ok,
    Warning,
    Error,
}

impl Check {
    fn ok(name: &'static str, message: impl Into<String>) -> Self {
        Self {
            name,
            status: CheckStatus::Ok,
            message: message.into(),
            fix: None,
        }
    }

    fn warn(name: &'static str, message: impl Into<String>, fix: impl Into<String>) -> Self {
        Self {
            name,
            status: CheckStatus::Warning,
            message: message.into(),
            fix: Some(fix.into()),
        }
    }

    fn error(name: &'static str, message: impl Into<String>, fix: impl Into<String>) -> Self {
        Self {
            name,
            status: CheckStatus::Error,
            message: message.into(),
            fix: Some(fix.into()),
        }
    }

    fn icon(&self) -> &'static str {
        match self.status {
            CheckStatus::Ok => "[OK]",
            CheckStatus::Warning => "[WARN]",
            CheckStatus::Error => "[ERR]",
        }
    }
}

/// Run diagnostics. Fails only if the configuration itself is invalid.
pub async fn run_doctor_command(cli: &Cli) -> anyhow::Result<()> {
    println!("convertbot doctor");
    println!("=================\n");

    let media = MediaConfig::from_cli(cli)?;

    let checks = vec![
        Check::ok("Version", format!("convertbot v{}", env!("CARGO_PKG_VERSION"))),
        check_token(cli),
        check_ffmpeg(&media).await,
        check_temp_dir(&media).await,
        check_recognizer(&media),
    ];

    let mut errors = 0;
    let mut warnings = 0;

    for check in &checks {
        println!("  {} {}: {}", check.icon(), check.name, check.message);
        if let Some(ref fix) = check.fix {
            println!("       Fix: {}", fix);
        }

        match check.status {
            CheckStatus::Error => errors += 1,
            CheckStatus::Warning => warnings += 1,
            CheckStatus::Ok => {}
        }
    }

    println!();
    println!(
        "Summary: {} checks, {} passed, {} warnings, {} errors",
        checks.len(),
        checks.len() - errors - warnings,
        warnings,
        errors
    );

    if errors > 0 {
        println!("\nFix the errors above before running the bot.");
    } else if warnings > 0 {
        println!("\nThe bot will run, but some conversions may fail.");
    } else {
        println!("\nAll checks passed.");
    }

    Ok(())
}

fn check_token(cli: &Cli) -> Check {
    match cli.bot_token.as_deref().map(str::trim) {
        Some(t) if !t.is_empty() => Check::ok("Bot token", "set"),
        _ => Check::error(
            "Bot token",
            "TG_BOT_TOKEN is not set",
            "Export TG_BOT_TOKEN or add it to .env",
        ),
    }
}

async fn check_ffmpeg(media: &MediaConfig) -> Check {
    let run = tokio::process::Command::new(&media.ffmpeg_path)
        .arg("-version")
        .kill_on_drop(true)
        .output();

    match tokio::time::timeout(Duration::from_secs(10), run).await {
        Ok(Ok(out)) if out.status.success() => {
            let stdout = String::from_utf8_lossy(&out.stdout);
            let first = stdout.lines().next().unwrap_or("ffmpeg").to_string();
            Check::ok("ffmpeg", first)
        }
        Ok(Ok(out)) => Check::error(
            "ffmpeg",
            format!("{} exited with {}", media.ffmpeg_path.display(), out.status),
            "Check the FFMPEG_PATH installation",
        ),
        Ok(Err(e)) => Check::error(
            "ffmpeg",
            format!("cannot run {}: {}", media.ffmpeg_path.display(), e),
            "Install ffmpeg or point FFMPEG_PATH at it",
        ),
        Err(_) => Check::error(
            "ffmpeg",
            "`ffmpeg -version` did not finish",
            "Check the FFMPEG_PATH installation",
        ),
    }
}

async fn check_temp_dir(media: &MediaConfig) -> Check {
    let store = TempStore::new(&media.temp_dir);
    let scratch = match store.acquire("check") {
        Ok(scratch) => scratch,
        Err(e) => {
            return Check::error(
                "Temp dir",
                format!("{}: {}", media.temp_dir.display(), e),
                "Set CONVERTER_TEMP_DIR to a writable directory",
            );
        }
    };

    match tokio::fs::write(scratch.path(), b"ok").await {
        Ok(()) => Check::ok("Temp dir", format!("{} (writable)", media.temp_dir.display())),
        Err(e) => Check::error(
            "Temp dir",
            format!("{} is not writable: {}", media.temp_dir.display(), e),
            "Set CONVERTER_TEMP_DIR to a writable directory",
        ),
    }
}

fn check_recognizer(media: &MediaConfig) -> Check {
    let rec = &media.recognizer;
    if rec.api_key.is_some() {
        Check::ok("Recognizer", format!("{} at {}", rec.model, rec.base_url))
    } else {
        Check::warn(
            "Recognizer",
            format!("no API key for {}", rec.base_url),
            "Set WHISPER_API_KEY unless the endpoint needs no auth",
        )
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    fn cli(args: &[&str]) -> Cli {
        let mut argv = vec!["convertbot"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_token_check() {
        let mut c = cli(&["--bot-token", "1:x"]);
        assert_eq!(check_token(&c).status, CheckStatus::Ok);
        c.bot_token = None;
        assert_eq!(check_token(&c).status, CheckStatus::Error);
    }

    #[tokio::test]
    async fn test_missing_ffmpeg_is_error() {
        let c = cli(&["--ffmpeg-path", "/nonexistent/ffmpeg-binary"]);
        let media = MediaConfig::from_cli(&c).unwrap();
        let check = check_ffmpeg(&media).await;
        assert_eq!(check.status, CheckStatus::Error);
        assert!(check.fix.is_some());
    }

    #[tokio::test]
    async fn test_temp_dir_check_cleans_up() {
        let dir = tempfile::TempDir::new().unwrap();
        let root = dir.path().join("work");
        let c = cli(&["--temp-dir", root.to_str().unwrap()]);
        let media = MediaConfig::from_cli(&c).unwrap();

        let check = check_temp_dir(&media).await;

        assert_eq!(check.status, CheckStatus::Ok);
        assert_eq!(std::fs::read_dir(&root).unwrap().count(), 0);
    }
}
