use clap::Parser;
use std::net::SocketAddr;

/// CLI arguments for the relay server.
#[derive(Parser, Debug, Clone)]
#[command(name = "relay-server")]
#[command(about = "E2EE signaling and relay server")]
#[command(version)]
pub struct Args {
    /// Socket address the WebSocket endpoint listens on.
    #[arg(long, default_value = "0.0.0.0:8000", env = "RELAY_LISTEN")]
    pub listen: SocketAddr,
    /// Socket address for the metrics and info/health probes.
    #[arg(long, default_value = "127.0.0.1:9090", env = "RELAY_PROBE")]
    pub probe_addr: SocketAddr,
    /// Maximum total concurrent connections.
    #[arg(long, default_value = "100000", env = "RELAY_MAX_CONNS")]
    pub max_conns: usize,
    /// Maximum WebSocket message size in bytes.
    #[arg(long, default_value = "16777216", env = "RELAY_MAX_MESSAGE_SIZE")]
    pub max_message_size: usize,
    /// Interval between WebSocket keepalive pings in seconds.
    #[arg(long, default_value = "30", env = "RELAY_PING_INTERVAL")]
    pub ping_interval: u64,
}

/// Runtime configuration derived from [`Args`].
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Socket address the WebSocket endpoint listens on.
    pub listen: SocketAddr,
    /// Socket address for the metrics and info/health probes.
    pub probe_addr: SocketAddr,
    /// Maximum total concurrent connections.
    pub max_conns: usize,
    /// Maximum WebSocket message size in bytes.
    pub max_message_size: usize,
    /// Interval between WebSocket keepalive pings in seconds.
    pub ping_interval: u64,
}

impl ServerConfig {
    /// Validates the configuration values are within acceptable bounds.
    /// Returns Ok(()) if valid, Err with description otherwise.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_conns == 0 {
            return Err("max_conns must be greater than 0".to_string());
        }
        if self.max_conns > 1_000_000 {
            return Err("max_conns exceeds reasonable limit (1,000,000)".to_string());
        }

        const MAX_ALLOWED_MESSAGE_SIZE: usize = 67_108_864;
        if self.max_message_size == 0 {
            return Err("max_message_size must be greater than 0".to_string());
        }
        if self.max_message_size > MAX_ALLOWED_MESSAGE_SIZE {
            return Err(format!(
                "max_message_size exceeds maximum allowed ({} bytes)",
                MAX_ALLOWED_MESSAGE_SIZE
            ));
        }

        if self.ping_interval == 0 {
            return Err("ping_interval must be greater than 0".to_string());
        }
        if self.ping_interval > 3600 {
            return Err("ping_interval exceeds reasonable limit (3600 seconds)".to_string());
        }
        Ok(())
    }
}

impl From<Args> for ServerConfig {
    fn from(args: Args) -> Self {
        Self {
            listen: args.listen,
            probe_addr: args.probe_addr,
            max_conns: args.max_conns,
            max_message_size: args.max_message_size,
            ping_interval: args.ping_interval,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> ServerConfig {
        ServerConfig {
            listen: "127.0.0.1:8000".parse().unwrap(),
            probe_addr: "127.0.0.1:9090".parse().unwrap(),
            max_conns: 1000,
            max_message_size: 1 << 20,
            ping_interval: 30,
        }
    }

    #[test]
    fn valid_config_passes() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn max_conns_zero() {
        let mut c = valid_config();
        c.max_conns = 0;
        assert!(c.validate().unwrap_err().contains("max_conns"));
    }

    #[test]
    fn max_conns_too_large() {
        let mut c = valid_config();
        c.max_conns = 1_000_001;
        assert!(c.validate().unwrap_err().contains("max_conns"));
    }

    #[test]
    fn max_message_size_zero() {
        let mut c = valid_config();
        c.max_message_size = 0;
        assert!(c.validate().unwrap_err().contains("max_message_size"));
    }

    #[test]
    fn max_message_size_too_large() {
        let mut c = valid_config();
        c.max_message_size = 67_108_865;
        assert!(c.validate().unwrap_err().contains("max_message_size"));
    }

    #[test]
    fn ping_interval_zero() {
        let mut c = valid_config();
        c.ping_interval = 0;
        assert!(c.validate().unwrap_err().contains("ping_interval"));
    }

    #[test]
    fn ping_interval_too_large() {
        let mut c = valid_config();
        c.ping_interval = 3601;
        assert!(c.validate().unwrap_err().contains("ping_interval"));
    }

    #[test]
    fn boundary_values_valid() {
        let mut c = valid_config();
        c.max_conns = 1;
        c.max_message_size = 1;
        c.ping_interval = 1;
        assert!(c.validate().is_ok());

        c.max_conns = 1_000_000;
        c.max_message_size = 67_108_864;
        c.ping_interval = 3600;
        assert!(c.validate().is_ok());
    }
}
