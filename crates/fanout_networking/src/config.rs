//! # Broadcast Configuration
//!
//! Loaded once at startup from TOML. Every field has a default, so an empty
//! file yields [`BroadcastConfig::default`].
//!
//! ```toml
//! multiplayer = true
//! max_temp_entities = 32
//! max_sounds = 20
//! sound_policy = "carry_forward"
//! retry_on_overflow = true
//! ```

use std::path::Path;

use serde::Deserialize;

use crate::error::{ConfigError, ConfigResult};
use crate::events::DiscardPolicy;

/// Temp entity and sound cap when running single player.
pub const SINGLE_PLAYER_EVENT_LIMIT: usize = 255;

/// Default scratch buffer size in bytes.
pub const DEFAULT_SCRATCH_CAPACITY: usize = 160_000;

/// Pipeline settings.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BroadcastConfig {
    /// Selects the multiplayer caps below instead of the single player ones.
    pub multiplayer: bool,
    /// Temp entity cap per packet in multiplayer.
    pub max_temp_entities: u8,
    /// Sound event cap per packet in multiplayer.
    pub max_sounds: u8,
    /// What happens to sounds beyond the cap.
    pub sound_policy: DiscardPolicy,
    /// Rebuild an overflowing full update once with tracing before giving up.
    pub retry_on_overflow: bool,
    /// Scratch buffer size in bytes.
    pub scratch_capacity: usize,
    /// Skip the table update record; tables are synced out of band.
    pub table_sync_bypass: bool,
    /// Route bot packets through a loopback transport.
    pub simulate_bot_traffic: bool,
    /// Log every send call at debug level.
    pub log_debug: bool,
    /// Worker threads for parallel broadcast.
    pub worker_threads: usize,
    /// Snapshots retained by the store's history.
    pub history_window: usize,
    /// Sounds a session may queue between packets.
    pub max_pending_sounds: usize,
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            multiplayer: true,
            max_temp_entities: 32,
            max_sounds: 20,
            sound_policy: DiscardPolicy::DiscardOverflow,
            retry_on_overflow: false,
            scratch_capacity: DEFAULT_SCRATCH_CAPACITY,
            table_sync_bypass: false,
            simulate_bot_traffic: false,
            log_debug: false,
            worker_threads: 4,
            history_window: 64,
            max_pending_sounds: 1024,
        }
    }
}

impl BroadcastConfig {
    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed TOML or unknown keys, and
    /// [`ConfigError::Invalid`] for out-of-range values.
    pub fn from_toml_str(text: &str) -> ConfigResult<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, otherwise as
    /// [`BroadcastConfig::from_toml_str`].
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Checks value ranges.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first bad field.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.scratch_capacity == 0 {
            return Err(ConfigError::Invalid("scratch_capacity must be > 0".into()));
        }
        if self.worker_threads == 0 {
            return Err(ConfigError::Invalid("worker_threads must be > 0".into()));
        }
        if self.max_pending_sounds < usize::from(self.max_sounds) {
            return Err(ConfigError::Invalid(format!(
                "max_pending_sounds ({}) must be >= max_sounds ({})",
                self.max_pending_sounds, self.max_sounds
            )));
        }
        Ok(())
    }

    /// Temp entity cap for the current mode.
    #[inline]
    #[must_use]
    pub fn temp_entity_limit(&self) -> usize {
        if self.multiplayer {
            usize::from(self.max_temp_entities)
        } else {
            SINGLE_PLAYER_EVENT_LIMIT
        }
    }

    /// Sound cap for the current mode.
    #[inline]
    #[must_use]
    pub fn sound_limit(&self) -> usize {
        if self.multiplayer {
            usize::from(self.max_sounds)
        } else {
            SINGLE_PLAYER_EVENT_LIMIT
        }
    }
}
