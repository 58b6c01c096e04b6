//! Runtime configuration for the gateway server.

use std::time::Duration;

use athena_settings::GatewaySettings;

/// Configuration for the gateway server.
#[derive(Clone, Debug, PartialEq)]
pub struct ServerConfig {
    /// Host to bind.
    pub host: String,
    /// Port to bind (`0` auto-assigns).
    pub port: u16,
    /// Largest accepted inbound frame, in bytes.
    pub max_message_size: usize,
    /// Outbound channel behaviour.
    pub channel: ChannelConfig,
    /// Heartbeat-based eviction.
    pub liveness: LivenessConfig,
    /// Lifetime of a telemetry snapshot.
    pub telemetry_ttl: Duration,
}

/// Per-connection outbound channel behaviour.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChannelConfig {
    /// Capacity of the outbound queue.
    pub send_queue: usize,
    /// Bound on enqueueing a message and on each socket write.
    pub write_timeout: Duration,
    /// Interval between transport Ping frames.
    pub ping_interval: Duration,
}

/// Liveness supervisor behaviour.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LivenessConfig {
    /// Whether silent connections are evicted.
    pub enabled: bool,
    /// Sweep period.
    pub check_interval: Duration,
    /// Maximum heartbeat age before eviction.
    pub grace: Duration,
}

impl ServerConfig {
    /// Derive the runtime config from loaded settings.
    pub fn from_settings(settings: &GatewaySettings) -> Self {
        Self {
            host: settings.server.host.clone(),
            port: settings.server.port,
            max_message_size: settings.server.max_message_size,
            channel: ChannelConfig {
                send_queue: settings.channel.send_queue,
                write_timeout: settings.channel.write_timeout(),
                ping_interval: settings.channel.ping_interval(),
            },
            liveness: LivenessConfig {
                enabled: settings.liveness.enabled,
                check_interval: settings.liveness.check_interval(),
                grace: settings.liveness.grace(),
            },
            telemetry_ttl: settings.telemetry.ttl(),
        }
    }

    /// `host:port` bind address.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerConfig {
    /// Loopback on an auto-assigned port; otherwise the settings defaults.
    fn default() -> Self {
        let mut config = Self::from_settings(&GatewaySettings::default());
        config.host = "127.0.0.1".into();
        config.port = 0;
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_binds_loopback_auto_port() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.bind_addr(), "127.0.0.1:0");
    }

    #[test]
    fn from_settings_copies_every_section() {
        let mut settings = GatewaySettings::default();
        settings.server.port = 8001;
        settings.channel.send_queue = 8;
        settings.channel.write_timeout_ms = 250;
        settings.liveness.enabled = false;
        settings.liveness.grace_secs = 15;
        settings.telemetry.ttl_secs = 120;

        let cfg = ServerConfig::from_settings(&settings);
        assert_eq!(cfg.bind_addr(), "0.0.0.0:8001");
        assert_eq!(cfg.channel.send_queue, 8);
        assert_eq!(cfg.channel.write_timeout, Duration::from_millis(250));
        assert_eq!(cfg.channel.ping_interval, Duration::from_secs(30));
        assert!(!cfg.liveness.enabled);
        assert_eq!(cfg.liveness.grace, Duration::from_secs(15));
        assert_eq!(cfg.liveness.check_interval, Duration::from_secs(30));
        assert_eq!(cfg.telemetry_ttl, Duration::from_secs(120));
        assert_eq!(cfg.max_message_size, 1024 * 1024);
    }
}
