//! # Broadcast Error Types

use std::path::PathBuf;

use thiserror::Error;

/// Why a session was dropped by the broadcast pipeline.
///
/// The display strings are what the client is told.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectReason {
    /// The tick record did not fit the scratch buffer.
    #[error("ERROR! Couldnt write snapshot to buffer")]
    TickRecordFailed,

    /// A full update did not fit the scratch buffer.
    #[error("ERROR! Reliable snapshot overflow.")]
    ReliableOverflow,

    /// The transport refused the packet.
    #[error("ERROR! Couldn't send snapshot.")]
    SendFailed,

    /// The channel reported itself unhealthy before sending.
    #[error("ERROR! Snapshot channel unhealthy.")]
    ChannelUnhealthy,
}

/// Errors raised while loading a [`crate::BroadcastConfig`].
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("failed to read config {path}: {source}")]
    Io {
        /// File that was read.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid TOML for this config.
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value is out of range.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Result type for configuration loading.
pub type ConfigResult<T> = Result<T, ConfigError>;
