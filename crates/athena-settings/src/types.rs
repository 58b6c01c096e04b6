//! Settings types for the gateway.
//!
//! Every struct uses `#[serde(default)]` so a partial JSON file only needs the
//! keys it changes.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::{Result, SettingsError};

/// Root settings object.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GatewaySettings {
    /// Listener settings.
    pub server: ServerSettings,
    /// Per-connection outbound channel settings.
    pub channel: ChannelSettings,
    /// Heartbeat-based eviction settings.
    pub liveness: LivenessSettings,
    /// Telemetry cache settings.
    pub telemetry: TelemetrySettings,
    /// Log output settings.
    pub logging: LoggingSettings,
}

/// Upper bound for `channel.writeTimeoutMs`.
pub const MAX_WRITE_TIMEOUT_MS: u64 = 600_000;
/// Upper bound for `channel.pingIntervalSecs` and `liveness.checkIntervalSecs`.
pub const MAX_INTERVAL_SECS: u64 = 3_600;
/// Upper bound for `liveness.graceSecs` and `telemetry.ttlSecs`.
pub const MAX_RETENTION_SECS: u64 = 86_400;

impl GatewaySettings {
    /// Reject values that would make the gateway misbehave at runtime.
    pub fn validate(&self) -> Result<()> {
        if self.server.max_message_size == 0 {
            return Err(SettingsError::InvalidValue(
                "server.maxMessageSize must be > 0".into(),
            ));
        }
        if self.channel.send_queue == 0 {
            return Err(SettingsError::InvalidValue(
                "channel.sendQueue must be > 0".into(),
            ));
        }
        check_range(
            "channel.writeTimeoutMs",
            self.channel.write_timeout_ms,
            1,
            MAX_WRITE_TIMEOUT_MS,
        )?;
        check_range(
            "channel.pingIntervalSecs",
            self.channel.ping_interval_secs,
            1,
            MAX_INTERVAL_SECS,
        )?;
        check_range(
            "liveness.checkIntervalSecs",
            self.liveness.check_interval_secs,
            1,
            MAX_INTERVAL_SECS,
        )?;
        check_range(
            "liveness.graceSecs",
            self.liveness.grace_secs,
            0,
            MAX_RETENTION_SECS,
        )?;
        check_range(
            "telemetry.ttlSecs",
            self.telemetry.ttl_secs,
            1,
            MAX_RETENTION_SECS,
        )?;
        Ok(())
    }
}

fn check_range(key: &str, value: u64, min: u64, max: u64) -> Result<()> {
    if value < min || value > max {
        return Err(SettingsError::InvalidValue(format!(
            "{key} must be between {min} and {max}, got {value}"
        )));
    }
    Ok(())
}

/// Listener settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// Bind address.
    pub host: String,
    /// Bind port.
    pub port: u16,
    /// Largest accepted inbound frame, in bytes.
    pub max_message_size: usize,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8001,
            max_message_size: 1024 * 1024,
        }
    }
}

/// Per-connection outbound channel settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChannelSettings {
    /// Capacity of the bounded outbound queue.
    pub send_queue: usize,
    /// Upper bound for enqueueing and for each socket write.
    pub write_timeout_ms: u64,
    /// Interval between transport-level Ping frames.
    pub ping_interval_secs: u64,
}

impl ChannelSettings {
    /// Write timeout as a `Duration`.
    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }

    /// Ping interval as a `Duration`.
    pub fn ping_interval(&self) -> Duration {
        Duration::from_secs(self.ping_interval_secs)
    }
}

impl Default for ChannelSettings {
    fn default() -> Self {
        Self {
            send_queue: 256,
            write_timeout_ms: 5_000,
            ping_interval_secs: 30,
        }
    }
}

/// Heartbeat-based eviction settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LivenessSettings {
    /// When false, silent devices are never disconnected.
    pub enabled: bool,
    /// Sweep period.
    pub check_interval_secs: u64,
    /// Maximum age of the last heartbeat before eviction.
    pub grace_secs: u64,
}

impl LivenessSettings {
    /// Sweep period as a `Duration`.
    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_secs)
    }

    /// Grace window as a `Duration`.
    pub fn grace(&self) -> Duration {
        Duration::from_secs(self.grace_secs)
    }
}

impl Default for LivenessSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            check_interval_secs: 30,
            grace_secs: 90,
        }
    }
}

/// Telemetry cache settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TelemetrySettings {
    /// Lifetime of a snapshot that is not refreshed.
    pub ttl_secs: u64,
}

impl TelemetrySettings {
    /// TTL as a `Duration`.
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        Self { ttl_secs: 60 }
    }
}

/// Log output settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub level: String,
    /// Emit JSON lines instead of compact text.
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}
