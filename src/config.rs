//! Tracker configuration parameters
//!
//! One struct parametrizes every board variant: which bearers are in use,
//! how hard the AT engine retries, how long each lifecycle phase may last,
//! and what the cloud side expects. Values can be overridden via NVS.

use heapless::String;
use serde::{Deserialize, Serialize};

use crate::app::ports::ConfigError;
use crate::credentials::WifiCredential;

/// Which transports the node may use for telemetry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BearerMode {
    WifiOnly,
    BleOnly,
    Both,
}

impl BearerMode {
    pub fn uses_wifi(self) -> bool {
        matches!(self, Self::WifiOnly | Self::Both)
    }

    pub fn uses_ble(self) -> bool {
        matches!(self, Self::BleOnly | Self::Both)
    }
}

/// Core tracker configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackerConfig {
    // --- Bearers ---
    pub bearer_mode: BearerMode,

    // --- AT engine ---
    /// Per-attempt response window (milliseconds)
    pub at_timeout_ms: u32,
    /// Extra attempts after the first one fails
    pub at_max_retries: u8,
    /// Fixed pause between attempts (milliseconds)
    pub at_retry_delay_ms: u32,
    /// Sleep granularity while waiting for a response line (milliseconds)
    pub at_poll_step_ms: u32,
    /// Response window for the access-point join command (milliseconds)
    pub join_timeout_ms: u32,

    // --- Lifecycle ---
    /// Configuration attempts before falling back to Idle
    pub configure_attempts: u8,
    /// Pause in Idle before the next configuration attempt (seconds)
    pub idle_holdoff_secs: u16,
    /// Window for the peer or the access point to confirm (seconds)
    pub peer_connect_window_secs: u16,
    /// Association status poll period while awaiting a connection (milliseconds)
    pub status_poll_interval_ms: u32,
    /// Connectivity probe period while Wi-Fi is active (seconds)
    pub link_check_interval_secs: u16,
    /// Failed out-of-band credential changes before forcing Idle
    pub reconfigure_failure_limit: u8,

    // --- Timing ---
    /// Telemetry publish period (seconds)
    pub telemetry_interval_secs: u32,
    /// Foreground loop sleep between ticks (milliseconds)
    pub loop_interval_ms: u32,

    // --- Cloud ---
    /// MQTT topic the modem publishes to
    pub aws_topic: String<64>,
    /// Modem-side data configuration slot
    pub shadow_cfg_num: u8,
    /// Modem-side data configuration name
    pub shadow_cfg_name: String<16>,

    // --- Fallback ---
    /// Used when the credential store has nothing to offer
    pub default_credentials: Option<WifiCredential>,
}

fn fixed<const N: usize>(s: &str) -> String<N> {
    let mut out = String::new();
    out.push_str(s).ok();
    out
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            bearer_mode: BearerMode::Both,

            // AT engine
            at_timeout_ms: 1000,
            at_max_retries: 2,
            at_retry_delay_ms: 500,
            at_poll_step_ms: 10,
            join_timeout_ms: 15_000,

            // Lifecycle
            configure_attempts: 3,
            idle_holdoff_secs: 15,
            peer_connect_window_secs: 30,
            status_poll_interval_ms: 2000,
            link_check_interval_secs: 10,
            reconfigure_failure_limit: 3,

            // Timing
            telemetry_interval_secs: 30,
            loop_interval_ms: 100,

            // Cloud
            aws_topic: fixed("pettracker/location"),
            shadow_cfg_num: 1,
            shadow_cfg_name: fixed("latlong"),

            default_credentials: None,
        }
    }
}

impl TrackerConfig {
    /// Range-check every field. Used before persisting and before a live update.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(50..=60_000).contains(&self.at_timeout_ms) {
            return Err(ConfigError::ValidationFailed(
                "at_timeout_ms must be 50-60000",
            ));
        }
        if self.at_max_retries > 10 {
            return Err(ConfigError::ValidationFailed("at_max_retries must be 0-10"));
        }
        if self.at_poll_step_ms == 0 || self.at_poll_step_ms >= self.at_timeout_ms {
            return Err(ConfigError::ValidationFailed(
                "at_poll_step_ms must be nonzero and below at_timeout_ms",
            ));
        }
        if self.join_timeout_ms < self.at_timeout_ms {
            return Err(ConfigError::ValidationFailed(
                "join_timeout_ms must be >= at_timeout_ms",
            ));
        }
        if !(1..=10).contains(&self.configure_attempts) {
            return Err(ConfigError::ValidationFailed(
                "configure_attempts must be 1-10",
            ));
        }
        if self.reconfigure_failure_limit == 0 {
            return Err(ConfigError::ValidationFailed(
                "reconfigure_failure_limit must be nonzero",
            ));
        }
        if self.peer_connect_window_secs == 0 {
            return Err(ConfigError::ValidationFailed(
                "peer_connect_window_secs must be nonzero",
            ));
        }
        if !(5..=3600).contains(&self.telemetry_interval_secs) {
            return Err(ConfigError::ValidationFailed(
                "telemetry_interval_secs must be 5-3600",
            ));
        }
        if !(10..=5000).contains(&self.loop_interval_ms) {
            return Err(ConfigError::ValidationFailed(
                "loop_interval_ms must be 10-5000",
            ));
        }
        if self.aws_topic.is_empty() || self.shadow_cfg_name.is_empty() {
            return Err(ConfigError::ValidationFailed(
                "aws_topic and shadow_cfg_name must be set",
            ));
        }
        Ok(())
    }
}
