use beacon_telemetry::TelemetryConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main Beacon configuration
///
/// Configuration is loaded from (in priority order):
/// 1. `beacon.jsonc` - JSON with comments
/// 2. `beacon.json` - Standard JSON
/// 3. `beacon.yml` / `beacon.yaml` - YAML format
///
/// Also checks hidden variants (`.beacon.*`) and `~/.config/beacon/` for global config.
/// Every section is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BeaconConfig {
    /// Log level and output format
    #[serde(default)]
    pub telemetry: TelemetryConfig,

    /// Backend event routing
    #[serde(default)]
    pub bridge: BridgeSettings,

    /// Status view ticker
    #[serde(default)]
    pub view: ViewSettings,

    /// Cancellation requests
    #[serde(default)]
    pub cancel: CancelSettings,
}

// ============================================================================
// Bridge
// ============================================================================

/// What to do with a `chat-loading` payload that is a bare boolean and
/// therefore names no session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LegacyLoadingPolicy {
    /// Apply it to the session focused at the moment the event is handled.
    #[default]
    ActiveOnly,
    /// Drop it.
    Ignore,
}

/// # Example
///
/// ```yaml
/// bridge:
///   legacy_policy: active_only
///   channel_capacity: 256
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeSettings {
    #[serde(default)]
    pub legacy_policy: LegacyLoadingPolicy,

    /// Buffer of the backend broadcast channel (default: 256)
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

impl Default for BridgeSettings {
    fn default() -> Self {
        Self {
            legacy_policy: LegacyLoadingPolicy::default(),
            channel_capacity: default_channel_capacity(),
        }
    }
}

fn default_channel_capacity() -> usize {
    256
}

// ============================================================================
// View
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewSettings {
    /// Elapsed-time refresh period while loading, in milliseconds (default: 1000)
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
}

impl Default for ViewSettings {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
        }
    }
}

impl ViewSettings {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(1))
    }
}

fn default_tick_interval_ms() -> u64 {
    1000
}

// ============================================================================
// Cancellation
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelSettings {
    /// Upper bound on a single cancellation RPC, in seconds (default: 5)
    #[serde(default = "default_rpc_timeout_secs")]
    pub rpc_timeout_secs: u64,
}

impl Default for CancelSettings {
    fn default() -> Self {
        Self {
            rpc_timeout_secs: default_rpc_timeout_secs(),
        }
    }
}

impl CancelSettings {
    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_secs(self.rpc_timeout_secs)
    }
}

fn default_rpc_timeout_secs() -> u64 {
    5
}
