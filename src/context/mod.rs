//! Shared runtime context for the running bot.

pub mod state;

pub use state::{Job, JobState, StateTransition};

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::channels::{Platform, TelegramClient};
use crate::config::Config;
use crate::dispatcher::MediaJobDispatcher;
use crate::media::{Converters, TempStore};

/// Everything the polling loop and spawned jobs share.
#[derive(Clone)]
pub struct BotContext {
    pub config: Arc<Config>,
    pub telegram: Arc<TelegramClient>,
    pub dispatcher: Arc<MediaJobDispatcher>,
    pub started_at: DateTime<Utc>,
}

impl BotContext {
    pub fn new(config: Config) -> Self {
        let telegram = Arc::new(
            TelegramClient::new(config.bot_token.clone())
                .with_api_base(&config.telegram_api_base),
        );
        let platform: Arc<dyn Platform> = telegram.clone();
        let temp = TempStore::new(&config.media.temp_dir);
        let converters = Converters::from_config(&config.media, temp.clone());
        let dispatcher = Arc::new(MediaJobDispatcher::new(
            temp,
            platform,
            converters,
            config.media.limits,
        ));

        Self {
            config: Arc::new(config),
            telegram,
            dispatcher,
            started_at: Utc::now(),
        }
    }

    pub fn platform(&self) -> Arc<dyn Platform> {
        self.telegram.clone()
    }
}
