//! Polling loop: receive updates, classify them, spawn one job per attachment.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::Result;
use crate::channels::telegram::Update;
use crate::channels::{BotCommand, Inbound, Platform, ReplyAction};
use crate::cli::Cli;
use crate::config::Config;
use crate::context::BotContext;
use crate::media::{ReplyTarget, TempStats};

const START_TEXT: &str = "Hi! Send me a photo and I'll turn it into a PDF, \
a video and I'll extract its audio as MP3, or a voice message and I'll \
write down what was said.";

const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// Validate settings, prepare the temp directory and check the token.
///
/// Any failure here is fatal: no job runs on a half-configured bot.
pub async fn start(cli: &Cli) -> Result<BotContext> {
    let config = Config::from_cli(cli)?;
    let ctx = BotContext::new(config);
    ctx.dispatcher.temp_store().ensure_root()?;

    let me = ctx.telegram.get_me().await?;
    tracing::info!(
        bot_id = me.id,
        username = me.username.as_deref().unwrap_or("unknown"),
        "Authenticated with Telegram"
    );
    Ok(ctx)
}

/// Reply text for a bot command.
pub fn command_reply(cmd: BotCommand, started_at: DateTime<Utc>, temp: TempStats) -> String {
    match cmd {
        BotCommand::Start => START_TEXT.to_string(),
        BotCommand::Status => {
            let uptime = Utc::now().signed_duration_since(started_at);
            format!(
                "convertbot v{}\nUp for {}h {}m\nTemp files held: {}\nTemp files released: {}",
                env!("CARGO_PKG_VERSION"),
                uptime.num_hours(),
                uptime.num_minutes() % 60,
                temp.outstanding(),
                temp.released,
            )
        }
    }
}

/// Route one update. Media jobs are spawned and not awaited.
pub async fn handle_update(ctx: &BotContext, platform: &Arc<dyn Platform>, update: Update) {
    let Some(message) = update.message else {
        return;
    };

    match message.classify() {
        Inbound::Media(event) => {
            let dispatcher = Arc::clone(&ctx.dispatcher);
            tokio::spawn(async move {
                dispatcher.run(event).await;
            });
        }
        Inbound::Command(cmd, target) => {
            let text = command_reply(cmd, ctx.started_at, ctx.dispatcher.temp_store().stats());
            reply_text(platform.as_ref(), &target, text).await;
        }
        Inbound::Rejected(target, err) => {
            tracing::info!(chat_id = target.chat_id, error = %err, "Rejected attachment");
            reply_text(platform.as_ref(), &target, err.kind().user_message()).await;
        }
        Inbound::Ignored => {}
    }
}

async fn reply_text(platform: &dyn Platform, target: &ReplyTarget, text: impl Into<String>) {
    if let Err(e) = platform.send(target, &ReplyAction::text(text)).await {
        tracing::warn!(chat_id = target.chat_id, error = %e, "Failed to send reply");
    }
}

/// Long-poll until the process is stopped. Errors back off and retry.
pub async fn run_polling(ctx: BotContext) {
    let platform = ctx.platform();
    let poll_timeout = ctx.config.poll_timeout_secs;
    let mut offset: i64 = 0;
    let mut backoff = Duration::from_secs(1);

    tracing::info!(
        temp_dir = %ctx.config.media.temp_dir.display(),
        job_timeout_secs = ctx.config.media.limits.job_timeout.as_secs(),
        "Polling for updates"
    );

    loop {
        let updates = match ctx.telegram.get_updates(offset, poll_timeout).await {
            Ok(updates) => {
                backoff = Duration::from_secs(1);
                updates
            }
            Err(e) => {
                tracing::warn!(error = %e, retry_in = ?backoff, "getUpdates failed");
                tokio::time::sleep(backoff).await;
                backoff = (backoff * 2).min(MAX_BACKOFF);
                continue;
            }
        };

        for update in updates {
            offset = offset.max(update.update_id + 1);
            handle_update(&ctx, &platform, update).await;
        }
    }
}
