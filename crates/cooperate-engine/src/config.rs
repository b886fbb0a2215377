//! Engine configuration loaded from TOML.

use std::time::Duration;

use cooperate_types::DisplayGeometry;
use serde::{Deserialize, Serialize};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub identity: IdentityConfig,
    #[serde(default)]
    pub timing: TimingConfig,
    #[serde(default)]
    pub display: DisplayConfig,
}

/// Worker and channel settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Capacity of the event channel.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
    /// How many times a producer retries a full channel before giving up.
    #[serde(default = "default_send_retries")]
    pub send_retries: u32,
    /// Local pointer speed announced to peers.
    #[serde(default = "default_speed")]
    pub pointer_speed: i32,
    /// Local touchpad speed announced to peers.
    #[serde(default = "default_speed")]
    pub touchpad_speed: i32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            channel_capacity: default_channel_capacity(),
            send_retries: default_send_retries(),
            pointer_speed: default_speed(),
            touchpad_speed: default_speed(),
        }
    }
}

/// Device identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityConfig {
    #[serde(default = "default_name")]
    pub name: String,
    /// Network id announced to peers. Generated and persisted when absent.
    #[serde(default)]
    pub network_id: Option<String>,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            network_id: None,
        }
    }
}

/// Protocol timeouts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingConfig {
    /// How long a relay waits for the peer's answer.
    #[serde(default = "default_relay_timeout_ms")]
    pub relay_timeout_ms: u64,
    /// Delay before re-examining a remote start that raced an in-flight relay.
    #[serde(default = "default_cooling_time_ms")]
    pub cooling_time_ms: u64,
}

impl TimingConfig {
    #[must_use]
    pub fn relay_timeout(&self) -> Duration {
        Duration::from_millis(self.relay_timeout_ms)
    }

    #[must_use]
    pub fn cooling_time(&self) -> Duration {
        Duration::from_millis(self.cooling_time_ms)
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            relay_timeout_ms: default_relay_timeout_ms(),
            cooling_time_ms: default_cooling_time_ms(),
        }
    }
}

/// Local display used when no input backend reports one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplayConfig {
    #[serde(default = "default_display_width")]
    pub width: u32,
    #[serde(default = "default_display_height")]
    pub height: u32,
}

impl DisplayConfig {
    #[must_use]
    pub fn geometry(&self) -> DisplayGeometry {
        DisplayGeometry::new(self.width, self.height)
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            width: default_display_width(),
            height: default_display_height(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_channel_capacity() -> usize {
    1024
}

fn default_send_retries() -> u32 {
    8
}

fn default_speed() -> i32 {
    10
}

fn default_name() -> String {
    hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "cooperate".to_string())
}

fn default_relay_timeout_ms() -> u64 {
    2000
}

fn default_cooling_time_ms() -> u64 {
    10
}

fn default_display_width() -> u32 {
    1920
}

fn default_display_height() -> u32 {
    1080
}
