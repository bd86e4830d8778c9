//! Configuration types for the routedns system
//!
//! Configuration is read from environment variables once at startup. The
//! variable names are kept compatible with existing deployments:
//!
//! | Variable | Default |
//! |---|---|
//! | `DB_PATH` | `dns.json` |
//! | `TRAEFIK_HOST` | `localhost` |
//! | `TRAEFIK_PORT` | `8080` |
//! | `TRAEFIK_ENTRYPOINTS` | `web,websecure` |
//! | `DNS_SERVER` | `192.168.178.1` |
//! | `DNS_DOMAIN` | `fritz.box` |
//! | `TARGET_IP` | `192.168.178.2` |
//! | `DNS_TTL` | `3600` |
//! | `LOG_LEVEL` | `info` |
//! | `UPDATE_INTERVAL` | `60` |
//! | `REQUEST_TIMEOUT` | `10` |

use crate::error::{Error, Result};
use crate::hostname::DomainSuffix;
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

/// Default DNS port used when `DNS_SERVER` carries no port
pub const DEFAULT_DNS_PORT: u16 = 53;

/// State file used when `DB_PATH` is unset
pub const DEFAULT_DB_PATH: &str = "dns.json";

/// Main routedns configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteDnsConfig {
    /// Reverse-proxy API configuration
    pub proxy: ProxyConfig,

    /// DNS server and zone configuration
    pub dns: DnsConfig,

    /// State store configuration
    #[serde(default)]
    pub state_store: StoreConfig,

    /// Scheduler settings
    #[serde(default)]
    pub engine: EngineConfig,

    /// Log verbosity (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl RouteDnsConfig {
    /// Load configuration from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    ///
    /// Unset variables take their defaults; set but invalid variables are
    /// errors. The result is validated before it is returned.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str, default: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        let timeout_secs = parse_number::<u64>("REQUEST_TIMEOUT", &var("REQUEST_TIMEOUT", "10"))?;

        let config = Self {
            proxy: ProxyConfig {
                host: var("TRAEFIK_HOST", "localhost"),
                port: parse_number("TRAEFIK_PORT", &var("TRAEFIK_PORT", "8080"))?,
                entry_points: var("TRAEFIK_ENTRYPOINTS", "web,websecure")
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect(),
                timeout_secs,
            },
            dns: DnsConfig {
                server: parse_server(&var("DNS_SERVER", "192.168.178.1"))?,
                domain: DomainSuffix::new(&var("DNS_DOMAIN", "fritz.box"))?,
                target_ip: var("TARGET_IP", "192.168.178.2").parse().map_err(|_| {
                    Error::config(format!(
                        "TARGET_IP is not a valid IP address: {}",
                        var("TARGET_IP", "")
                    ))
                })?,
                ttl: parse_number("DNS_TTL", &var("DNS_TTL", "3600"))?,
                timeout_secs,
            },
            state_store: StoreConfig::File {
                path: var("DB_PATH", DEFAULT_DB_PATH),
            },
            engine: EngineConfig {
                interval_secs: parse_number("UPDATE_INTERVAL", &var("UPDATE_INTERVAL", "60"))?,
                ..EngineConfig::default()
            },
            log_level: var("LOG_LEVEL", "info").to_lowercase(),
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.proxy.validate()?;
        self.dns.validate()?;
        self.state_store.validate()?;
        self.engine.validate()?;

        match self.log_level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
            other => Err(Error::config(format!(
                "LOG_LEVEL '{}' is not valid. Valid levels: trace, debug, info, warn, error",
                other
            ))),
        }
    }
}

/// Reverse-proxy (Traefik) API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyConfig {
    /// API host
    pub host: String,

    /// API port
    pub port: u16,

    /// Entry points whose routers are considered
    pub entry_points: Vec<String>,

    /// Per-request timeout in seconds
    pub timeout_secs: u64,
}

impl ProxyConfig {
    /// URL of the HTTP routers listing
    pub fn routers_url(&self) -> String {
        format!("http://{}:{}/api/http/routers", self.host, self.port)
    }

    /// Per-request timeout
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Validate the proxy configuration
    pub fn validate(&self) -> Result<()> {
        if self.host.is_empty() {
            return Err(Error::config("TRAEFIK_HOST cannot be empty"));
        }
        if self.entry_points.is_empty() {
            return Err(Error::config(
                "TRAEFIK_ENTRYPOINTS must name at least one entry point",
            ));
        }
        if self.timeout_secs == 0 {
            return Err(Error::config("REQUEST_TIMEOUT must be > 0"));
        }
        Ok(())
    }
}

/// DNS server, zone and record configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DnsConfig {
    /// Server that accepts dynamic updates
    pub server: SocketAddr,

    /// Zone to update; also the suffix every managed hostname must carry
    pub domain: DomainSuffix,

    /// Address every managed record points to
    pub target_ip: IpAddr,

    /// TTL of created records
    pub ttl: u32,

    /// Per-transaction timeout in seconds
    pub timeout_secs: u64,
}

impl DnsConfig {
    /// Per-transaction timeout
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Validate the DNS configuration
    pub fn validate(&self) -> Result<()> {
        if self.timeout_secs == 0 {
            return Err(Error::config("REQUEST_TIMEOUT must be > 0"));
        }
        if self.target_ip.is_unspecified() {
            return Err(Error::config(format!(
                "TARGET_IP cannot be the unspecified address {}",
                self.target_ip
            )));
        }
        Ok(())
    }
}

/// State store configuration
///
/// Defaults to the file store at [`DEFAULT_DB_PATH`]. The memory store
/// forgets ownership on restart and must be chosen explicitly.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StoreConfig {
    /// File-based state store
    File {
        /// Path to the state file
        path: String,
    },

    /// In-memory state store (not persistent)
    Memory,
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig::File {
            path: DEFAULT_DB_PATH.to_string(),
        }
    }
}

impl StoreConfig {
    /// Validate the store configuration
    pub fn validate(&self) -> Result<()> {
        match self {
            StoreConfig::File { path } if path.is_empty() => {
                Err(Error::config("DB_PATH cannot be empty"))
            }
            _ => Ok(()),
        }
    }
}

/// Engine (scheduler) configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Seconds from the start of one pass to the start of the next
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    /// Capacity of the engine event channel
    ///
    /// When full, new events are dropped with a warning.
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

impl EngineConfig {
    /// Interval between pass starts
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    /// Validate the engine configuration
    pub fn validate(&self) -> Result<()> {
        if self.interval_secs == 0 {
            return Err(Error::config("UPDATE_INTERVAL must be > 0"));
        }
        if self.event_channel_capacity == 0 {
            return Err(Error::config("Event channel capacity must be > 0"));
        }
        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            event_channel_capacity: default_event_channel_capacity(),
        }
    }
}

fn default_interval_secs() -> u64 {
    60
}

fn default_event_channel_capacity() -> usize {
    1000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn parse_number<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| Error::config(format!("{} must be a number. Got: {}", key, value)))
}

/// Parse `ip`, `ip:port` or `[ipv6]:port`
fn parse_server(value: &str) -> Result<SocketAddr> {
    if let Ok(addr) = value.parse::<SocketAddr>() {
        return Ok(addr);
    }
    value
        .parse::<IpAddr>()
        .map(|ip| SocketAddr::new(ip, DEFAULT_DNS_PORT))
        .map_err(|_| {
            Error::config(format!(
                "DNS_SERVER must be an IP address with optional port. Got: {}",
                value
            ))
        })
}
