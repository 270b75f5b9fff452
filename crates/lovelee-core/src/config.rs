//! Configuration model.
//!
//! Every section and field has a default, so an empty or missing
//! `config.toml` yields a fully usable configuration.

use serde::{Deserialize, Serialize};

/// Root of `config.toml`.
#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct LoveleeConfig {
    pub economy: EconomyConfig,
    pub invites: InviteConfig,
    pub feeds: FeedConfig,
    pub concurrency: ConcurrencyConfig,
    pub pet: PetConfig,
    pub gifts: GiftConfig,
    pub logging: LoggingConfig,
    pub storage: StorageConfig,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct EconomyConfig {
    /// Hearts granted to a freshly created profile.
    pub starting_hearts: i64,
    /// Share of a gift's cost credited to the receiver, rounded down.
    pub gift_bonus_ratio: f64,
}

impl Default for EconomyConfig {
    fn default() -> Self {
        Self {
            starting_hearts: 100,
            gift_bonus_ratio: 0.5,
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct InviteConfig {
    pub code_length: usize,
    /// Fresh codes tried before profile creation gives up.
    pub max_attempts: u32,
}

impl Default for InviteConfig {
    fn default() -> Self {
        Self {
            code_length: 6,
            max_attempts: 8,
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct FeedConfig {
    /// Cap on every list/subscribe query that does not pass its own limit.
    pub page_size: usize,
    pub mood_history_default: usize,
    pub mood_history_max: usize,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            page_size: 50,
            mood_history_default: 30,
            mood_history_max: 100,
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ConcurrencyConfig {
    /// Attempts for a version-guarded read-compute-commit before giving up.
    pub max_retries: u32,
}

impl Default for ConcurrencyConfig {
    fn default() -> Self {
        Self { max_retries: 8 }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct PetConfig {
    pub default_name: String,
    pub default_skin: String,
    pub initial_happiness: u8,
    pub initial_hunger: u8,
    /// Happiness lost per decay tick.
    pub tick_happiness_decay: u8,
    /// Hunger lost per decay tick.
    pub tick_hunger_decay: u8,
}

impl Default for PetConfig {
    fn default() -> Self {
        Self {
            default_name: "Mochi".to_string(),
            default_skin: "default".to_string(),
            initial_happiness: 80,
            initial_hunger: 50,
            tick_happiness_decay: 3,
            tick_hunger_decay: 5,
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct GiftConfig {
    /// Pending gift transactions older than this are rolled back by recovery.
    pub pending_timeout_secs: i64,
}

impl Default for GiftConfig {
    fn default() -> Self {
        Self {
            pending_timeout_secs: 300,
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive; `RUST_LOG` wins when set.
    pub level: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct StorageConfig {
    /// JSON snapshot of the document store. In-memory only when unset.
    pub snapshot_path: Option<String>,
}
