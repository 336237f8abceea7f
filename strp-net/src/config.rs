//! Config-file parser for STRP nodes.
//!
//! Sectioned format with `[section]` headers, `[[name]]` interface
//! subsections under `[interfaces]`, `key = value` pairs, `#` comments and
//! `Yes`/`No`/`True`/`False` booleans:
//!
//! ```text
//! [node]
//! role = sink
//! server_address = 10.2.0.20
//! sink_gateway = 10.2.0.1
//! uplink_device = eth0
//! routing_mode = 3
//!
//! [logging]
//! loglevel = 4
//!
//! [interfaces]
//!   [[mesh0]]
//!     device = wlan0
//!     address = 10.1.0.5
//!     netmask = 255.255.255.0
//! ```

use std::fmt;
use std::io;
use std::net::Ipv4Addr;
use std::path::Path;

use strp_core::constants;
use strp_core::tables::SelectionPolicy;

/// Parsed node configuration.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    pub role: RoleConfig,
    pub server_addr: Ipv4Addr,
    pub policy: SelectionPolicy,
    pub active_route_timeout: f64,
    pub hello_interval: f64,
    pub advertise_interval: f64,
    pub max_hello_hops: u16,
    pub max_advertise_hops: u16,
    pub enable_broadcast: bool,
    /// Initial energy budget, joules.
    pub initial_energy: f32,
    /// Linear drain, joules per second. Zero means mains powered.
    pub energy_drain: f32,
    pub loglevel: u8,
    pub interfaces: Vec<InterfaceConfig>,
}

impl Default for NodeConfig {
    fn default() -> Self {
        NodeConfig {
            role: RoleConfig::Plain,
            server_addr: Ipv4Addr::UNSPECIFIED,
            policy: SelectionPolicy::Basic,
            active_route_timeout: constants::ACTIVE_ROUTE_TIMEOUT,
            hello_interval: constants::HELLO_INTERVAL,
            advertise_interval: constants::ADVERTISE_INTERVAL,
            max_hello_hops: constants::MAX_HELLO_HOPS,
            max_advertise_hops: constants::MAX_ADVERTISE_HOPS,
            enable_broadcast: true,
            initial_energy: 100.0,
            energy_drain: 0.0,
            loglevel: 4,
            interfaces: Vec::new(),
        }
    }
}

/// Node role as configured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoleConfig {
    Server,
    Sink {
        /// Device name of the interface facing the server.
        uplink_device: String,
        gateway: Ipv4Addr,
    },
    Plain,
}

/// One `[[name]]` subsection under `[interfaces]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceConfig {
    pub name: String,
    pub device: String,
    pub address: Ipv4Addr,
    pub netmask: Ipv4Addr,
    pub port: u16,
    pub forwarding: bool,
}

/// Configuration parse error.
#[derive(Debug, Clone)]
pub enum ConfigError {
    Io(String),
    Parse(String),
    InvalidValue { key: String, value: String },
    Missing(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(msg) => write!(f, "config I/O error: {}", msg),
            ConfigError::Parse(msg) => write!(f, "config parse error: {}", msg),
            ConfigError::InvalidValue { key, value } => {
                write!(f, "invalid value for '{}': '{}'", key, value)
            }
            ConfigError::Missing(key) => write!(f, "missing required key '{}'", key),
        }
    }
}

impl From<io::Error> for ConfigError {
    fn from(e: io::Error) -> Self {
        ConfigError::Io(e.to_string())
    }
}

fn parse_bool(v: &str) -> Option<bool> {
    match v.trim().to_lowercase().as_str() {
        "yes" | "true" | "1" | "on" => Some(true),
        "no" | "false" | "0" | "off" => Some(false),
        _ => None,
    }
}

fn invalid(key: &str, value: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.into(),
        value: value.into(),
    }
}

fn parse_addr(key: &str, value: &str) -> Result<Ipv4Addr, ConfigError> {
    value.parse().map_err(|_| invalid(key, value))
}

/// Parse a config file from disk.
pub fn parse_file(path: &Path) -> Result<NodeConfig, ConfigError> {
    let input = std::fs::read_to_string(path)?;
    parse(&input)
}

/// Parse a config string into a [`NodeConfig`].
pub fn parse(input: &str) -> Result<NodeConfig, ConfigError> {
    let mut config = NodeConfig::default();

    let mut section: Option<String> = None;
    let mut iface: Option<InterfaceConfig> = None;

    // Role parts arrive as separate keys and are assembled at the end.
    let mut role_name = String::from("plain");
    let mut uplink_device: Option<String> = None;
    let mut sink_gateway: Option<Ipv4Addr> = None;

    for (lineno, raw_line) in input.lines().enumerate() {
        let line = match raw_line.find('#') {
            Some(pos) => &raw_line[..pos],
            None => raw_line,
        }
        .trim();
        if line.is_empty() {
            continue;
        }

        if let Some(name) = line.strip_prefix("[[").and_then(|s| s.strip_suffix("]]")) {
            if section.as_deref() != Some("interfaces") {
                return Err(ConfigError::Parse(format!(
                    "line {}: interface subsection outside [interfaces]",
                    lineno + 1
                )));
            }
            if let Some(done) = iface.take() {
                config.interfaces.push(done);
            }
            iface = Some(InterfaceConfig {
                name: name.trim().to_string(),
                device: String::new(),
                address: Ipv4Addr::UNSPECIFIED,
                netmask: Ipv4Addr::new(255, 255, 255, 0),
                port: constants::STRP_PORT,
                forwarding: true,
            });
            continue;
        }

        if let Some(name) = line.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
            if let Some(done) = iface.take() {
                config.interfaces.push(done);
            }
            section = Some(name.trim().to_lowercase());
            continue;
        }

        let (key, value) = match line.split_once('=') {
            Some((k, v)) => (k.trim().to_lowercase(), v.trim().to_string()),
            None => {
                return Err(ConfigError::Parse(format!(
                    "line {}: expected 'key = value'",
                    lineno + 1
                )))
            }
        };

        if let Some(ref mut cur) = iface {
            match key.as_str() {
                "device" => cur.device = value,
                "address" => cur.address = parse_addr(&key, &value)?,
                "netmask" => cur.netmask = parse_addr(&key, &value)?,
                "port" => cur.port = value.parse().map_err(|_| invalid(&key, &value))?,
                "forwarding" => {
                    cur.forwarding = parse_bool(&value).ok_or_else(|| invalid(&key, &value))?
                }
                _ => log::warn!("unknown interface key '{}' ignored", key),
            }
            continue;
        }

        match section.as_deref() {
            Some("node") => match key.as_str() {
                "role" => role_name = value.to_lowercase(),
                "server_address" => config.server_addr = parse_addr(&key, &value)?,
                "sink_gateway" => sink_gateway = Some(parse_addr(&key, &value)?),
                "uplink_device" => uplink_device = Some(value),
                "routing_mode" => {
                    let mode: u8 = value.parse().map_err(|_| invalid(&key, &value))?;
                    config.policy =
                        SelectionPolicy::from_u8(mode).ok_or_else(|| invalid(&key, &value))?;
                }
                "active_route_timeout" => {
                    config.active_route_timeout =
                        value.parse().map_err(|_| invalid(&key, &value))?
                }
                "hello_interval" => {
                    config.hello_interval = value.parse().map_err(|_| invalid(&key, &value))?
                }
                "advertise_interval" => {
                    config.advertise_interval = value.parse().map_err(|_| invalid(&key, &value))?
                }
                "max_hello_hops" => {
                    config.max_hello_hops = value.parse().map_err(|_| invalid(&key, &value))?
                }
                "max_advertise_hops" => {
                    config.max_advertise_hops = value.parse().map_err(|_| invalid(&key, &value))?
                }
                "enable_broadcast" => {
                    config.enable_broadcast =
                        parse_bool(&value).ok_or_else(|| invalid(&key, &value))?
                }
                "initial_energy" => {
                    config.initial_energy = value.parse().map_err(|_| invalid(&key, &value))?
                }
                "energy_drain" => {
                    config.energy_drain = value.parse().map_err(|_| invalid(&key, &value))?
                }
                _ => log::warn!("unknown [node] key '{}' ignored", key),
            },
            Some("logging") => match key.as_str() {
                "loglevel" => config.loglevel = value.parse().map_err(|_| invalid(&key, &value))?,
                _ => log::warn!("unknown [logging] key '{}' ignored", key),
            },
            Some("interfaces") => {
                return Err(ConfigError::Parse(format!(
                    "line {}: keys under [interfaces] must live in a [[name]] subsection",
                    lineno + 1
                )))
            }
            Some(other) => {
                log::warn!("unknown section [{}] ignored", other);
            }
            None => {
                return Err(ConfigError::Parse(format!(
                    "line {}: key before any section header",
                    lineno + 1
                )))
            }
        }
    }

    if let Some(done) = iface.take() {
        config.interfaces.push(done);
    }

    config.role = match role_name.as_str() {
        "server" => RoleConfig::Server,
        "plain" | "node" => RoleConfig::Plain,
        "sink" => RoleConfig::Sink {
            uplink_device: uplink_device.ok_or(ConfigError::Missing("uplink_device".into()))?,
            gateway: sink_gateway.ok_or(ConfigError::Missing("sink_gateway".into()))?,
        },
        other => return Err(invalid("role", other)),
    };

    for ifc in &config.interfaces {
        if ifc.device.is_empty() {
            return Err(ConfigError::Missing(format!("device for [[{}]]", ifc.name)));
        }
        if ifc.address == Ipv4Addr::UNSPECIFIED {
            return Err(ConfigError::Missing(format!("address for [[{}]]", ifc.name)));
        }
    }

    Ok(config)
}
