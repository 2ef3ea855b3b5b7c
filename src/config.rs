use std::env;
use std::path::PathBuf;

use chrono_tz::Tz;
use rand::seq::SliceRandom;
use rand::Rng;

/// Telegram delivery configuration.
#[derive(Debug, Clone)]
pub struct TelegramConfig {
    /// Bot API token.
    pub bot_token: String,
    /// Destination chat/group ID.
    pub chat_id: String,
    /// Optional sticker file_ids sent alongside results.
    pub stickers: StickerConfig,
}

/// Sticker file_ids for result notifications. Unset stickers are skipped.
#[derive(Debug, Clone, Default)]
pub struct StickerConfig {
    /// Win on the first entry.
    pub win: Option<String>,
    /// Win on a martingale re-entry.
    pub win_gale: Option<String>,
    /// Loss after the final attempt.
    pub loss: Option<String>,
    /// Doji (neutral) candle.
    pub doji: Option<String>,
}

/// Catalogation profile for one signal cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleSettings {
    /// Candle timeframe in minutes (1, 5 or 15).
    pub interval_minutes: u32,
    /// How many distinct calendar dates of history to aggregate.
    pub lookback_days: u32,
    /// Martingale re-entries evaluated after the base entry (0-2).
    pub martingale_levels: u8,
    /// Minimum percentages per attempt level: [base, gale 1, gale 2].
    pub min_percent: [u8; 3],
}

impl CycleSettings {
    /// Load a fixed profile from environment variables.
    pub fn from_env() -> Self {
        Self {
            interval_minutes: env::var("CYCLE_INTERVAL_MINUTES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(1),
            lookback_days: env::var("CYCLE_LOOKBACK_DAYS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(7),
            martingale_levels: env::var("CYCLE_MARTINGALE_LEVELS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(|l: u8| l.min(2))
                .unwrap_or(1),
            min_percent: [
                env::var("CYCLE_MIN_PERCENT")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(80),
                env::var("CYCLE_MIN_PERCENT_GALE1")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(70),
                env::var("CYCLE_MIN_PERCENT_GALE2")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(70),
            ],
        }
    }

    /// Roll an aggressive profile for the next cycle: short timeframes,
    /// a medium lookback and one martingale re-entry.
    pub fn randomized<R: Rng>(rng: &mut R) -> Self {
        let interval = *[1u32, 5, 15].choose(rng).unwrap_or(&1);
        let base = *[78u8, 80].choose(rng).unwrap_or(&80);
        let gale = *[60u8, 70].choose(rng).unwrap_or(&70);

        Self {
            interval_minutes: interval,
            lookback_days: rng.gen_range(5..=10),
            martingale_levels: 1,
            min_percent: [base, gale, gale],
        }
    }

    /// Candle timeframe in seconds.
    pub fn interval_secs(&self) -> i64 {
        self.interval_minutes as i64 * 60
    }

    /// Minimum percentage required at the given attempt level.
    pub fn threshold(&self, level: u8) -> u8 {
        self.min_percent[level.min(2) as usize]
    }
}

impl Default for CycleSettings {
    fn default() -> Self {
        Self {
            interval_minutes: 1,
            lookback_days: 7,
            martingale_levels: 1,
            min_percent: [80, 70, 70],
        }
    }
}

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Market gateway base URL.
    pub gateway_url: String,
    /// Market gateway account email.
    pub gateway_email: String,
    /// Market gateway account password.
    pub gateway_password: String,
    /// Telegram delivery settings.
    pub telegram: TelegramConfig,
    /// Market timezone used for slot labels and scheduling.
    pub timezone: Tz,
    /// Title line stamped on every outgoing message.
    pub brand: String,
    /// Directory for transient chart images.
    pub chart_dir: PathBuf,
    /// Minimum signals required before a list is announced.
    pub min_signals: usize,
    /// Re-roll the catalogation profile every cycle.
    pub randomize_cycle: bool,
    /// Fixed profile used when randomization is off.
    pub cycle: CycleSettings,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Self {
            gateway_url: env::var("IQOPTION_API_URL")
                .unwrap_or_else(|_| "http://127.0.0.1:8210".to_string()),
            gateway_email: env::var("IQOPTION_EMAIL").unwrap_or_default(),
            gateway_password: env::var("IQOPTION_PASSWORD").unwrap_or_default(),
            telegram: TelegramConfig {
                bot_token: env::var("TELEGRAM_BOT_TOKEN").unwrap_or_default(),
                chat_id: env::var("TELEGRAM_CHAT_ID").unwrap_or_default(),
                stickers: StickerConfig {
                    win: env::var("STICKER_WIN").ok(),
                    win_gale: env::var("STICKER_WIN_GALE").ok(),
                    loss: env::var("STICKER_LOSS").ok(),
                    doji: env::var("STICKER_DOJI").ok(),
                },
            },
            timezone: env::var("MARKET_TIMEZONE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(chrono_tz::America::Sao_Paulo),
            brand: env::var("BRAND_NAME").unwrap_or_else(|_| "AUGURY SIGNALS".to_string()),
            chart_dir: env::var("CHART_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| env::temp_dir().join("augury-charts")),
            min_signals: env::var("MIN_SIGNALS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3),
            randomize_cycle: env::var("RANDOMIZE_CYCLE")
                .ok()
                .map(|v| v == "true" || v == "1")
                .unwrap_or(true),
            cycle: CycleSettings::from_env(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}
