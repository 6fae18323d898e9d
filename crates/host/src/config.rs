use fieldlock_discovery::DEFAULT_DISCOVERY_PORT;

/// Host configuration loaded from environment variables.
///
/// All fields have defaults suitable for hosting on a LAN; override via
/// environment variables (or construct directly when embedding the host in
/// the desktop application).
#[derive(Debug, Clone)]
pub struct HostConfig {
    /// Interface to bind (default: `0.0.0.0`).
    pub bind_ip: String,
    /// Bind port (default: `9400`; `0` picks an ephemeral port).
    pub port: u16,
    /// Display name for the host's own presence entry (default: `Host`).
    pub display_name: String,
    /// Seconds between heartbeat pings (default: `30`).
    pub heartbeat_interval_secs: u64,
    /// Whether to broadcast discovery beacons (default: `true`).
    pub advertise: bool,
    /// UDP port for discovery beacons.
    pub discovery_port: u16,
}

impl HostConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                       | Default   |
    /// |-------------------------------|-----------|
    /// | `FIELDLOCK_BIND_IP`           | `0.0.0.0` |
    /// | `FIELDLOCK_PORT`              | `9400`    |
    /// | `FIELDLOCK_DISPLAY_NAME`      | `Host`    |
    /// | `FIELDLOCK_HEARTBEAT_SECS`    | `30`      |
    /// | `FIELDLOCK_ADVERTISE`         | `true`    |
    /// | `FIELDLOCK_DISCOVERY_PORT`    | `47800`   |
    pub fn from_env() -> Self {
        let bind_ip = std::env::var("FIELDLOCK_BIND_IP").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("FIELDLOCK_PORT")
            .unwrap_or_else(|_| "9400".into())
            .parse()
            .expect("FIELDLOCK_PORT must be a valid u16");

        let display_name =
            std::env::var("FIELDLOCK_DISPLAY_NAME").unwrap_or_else(|_| "Host".into());

        let heartbeat_interval_secs: u64 = std::env::var("FIELDLOCK_HEARTBEAT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("FIELDLOCK_HEARTBEAT_SECS must be a valid u64");

        let advertise = std::env::var("FIELDLOCK_ADVERTISE")
            .map(|v| v != "false" && v != "0")
            .unwrap_or(true);

        let discovery_port: u16 = std::env::var("FIELDLOCK_DISCOVERY_PORT")
            .unwrap_or_else(|_| DEFAULT_DISCOVERY_PORT.to_string())
            .parse()
            .expect("FIELDLOCK_DISCOVERY_PORT must be a valid u16");

        Self {
            bind_ip,
            port,
            display_name,
            heartbeat_interval_secs,
            advertise,
            discovery_port,
        }
    }
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            bind_ip: "0.0.0.0".into(),
            port: 9400,
            display_name: "Host".into(),
            heartbeat_interval_secs: 30,
            advertise: true,
            discovery_port: DEFAULT_DISCOVERY_PORT,
        }
    }
}
