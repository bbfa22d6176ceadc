//! Configuration loading and validation.
//!
//! Values arrive from a TOML file and are validated once at load time. The
//! resulting [`IrcConfig`] is immutable; the backend re-checks the host on
//! construction but otherwise trusts what it is handed.

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Default nick announced during the handshake.
pub const DEFAULT_NICK: &str = "skald";

const DEFAULT_TLS_PORT: u16 = 6697;
const DEFAULT_PLAIN_PORT: u16 = 6667;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Top-level bot configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// IRC backend configuration.
    pub irc: IrcConfig,
}

impl Config {
    /// Load configuration from a TOML file and validate it.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.irc.validate()?;
        Ok(config)
    }
}

/// IRC connection configuration. Immutable after construction.
#[derive(Debug, Clone, Deserialize)]
pub struct IrcConfig {
    /// Server host name. Required.
    pub host: String,
    /// Server port. Defaults to 6697 with TLS, 6667 without.
    pub port: Option<u16>,
    /// Nick to register with.
    #[serde(default = "default_nick")]
    pub nick: String,
    /// Channels joined once registration completes, in order.
    #[serde(default)]
    pub channels: Vec<String>,
    /// Dial timeout in seconds. Also bounds the wait for the first
    /// inbound line.
    #[serde(default = "default_dial_timeout")]
    pub dial_timeout_secs: f64,
    /// TCP keepalive probe interval in seconds.
    #[serde(default = "default_keepalive")]
    pub keepalive_secs: u64,
    /// Delay between the first inbound line and the identity
    /// announcement. Servers of this family tend to reject registration
    /// sent immediately on connect.
    #[serde(default = "default_settle_delay")]
    pub settle_delay_secs: f64,
    /// Capacity of the inbound line queue.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// Authentication settings. Parsed and validated, not yet executed by
    /// the login sequence.
    #[serde(default)]
    pub auth: AuthConfig,
    /// Transport encryption settings.
    #[serde(default)]
    pub tls: TlsConfig,
}

impl IrcConfig {
    /// The configured port, or the default for the transport.
    pub fn effective_port(&self) -> u16 {
        self.port.unwrap_or(if self.tls.enabled {
            DEFAULT_TLS_PORT
        } else {
            DEFAULT_PLAIN_PORT
        })
    }

    /// Dial timeout as a [`Duration`].
    pub fn dial_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.dial_timeout_secs)
    }

    /// Settle delay as a [`Duration`].
    pub fn settle_delay(&self) -> Duration {
        Duration::from_secs_f64(self.settle_delay_secs)
    }

    /// Keepalive interval as a [`Duration`].
    pub fn keepalive(&self) -> Duration {
        Duration::from_secs(self.keepalive_secs)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.is_empty() {
            return Err(ConfigError::Invalid("no server host specified".to_string()));
        }
        if self.queue_capacity == 0 {
            return Err(ConfigError::Invalid(
                "queue_capacity must be at least 1".to_string(),
            ));
        }
        if !self.dial_timeout_secs.is_finite() || self.dial_timeout_secs <= 0.0 {
            return Err(ConfigError::Invalid(
                "dial_timeout_secs must be positive".to_string(),
            ));
        }
        if !self.settle_delay_secs.is_finite() || self.settle_delay_secs < 0.0 {
            return Err(ConfigError::Invalid(
                "settle_delay_secs must not be negative".to_string(),
            ));
        }
        match (&self.tls.client_cert, &self.tls.client_key) {
            (Some(_), None) | (None, Some(_)) => {
                return Err(ConfigError::Invalid(
                    "client_cert and client_key must be given together".to_string(),
                ));
            }
            _ => {}
        }
        match self.auth.method {
            AuthMethod::NickServ | AuthMethod::Sasl if self.auth.password.is_none() => {
                Err(ConfigError::Invalid(format!(
                    "auth method {:?} requires a password",
                    self.auth.method
                )))
            }
            AuthMethod::CertFp if self.tls.client_cert.is_none() => Err(ConfigError::Invalid(
                "auth method certfp requires a client certificate".to_string(),
            )),
            _ => Ok(()),
        }
    }
}

/// How the bot authenticates after connecting.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AuthMethod {
    /// No authentication.
    #[default]
    None,
    /// Identify to the nickname service after registration.
    NickServ,
    /// SASL PLAIN during registration.
    Sasl,
    /// Client certificate fingerprint.
    CertFp,
}

/// Authentication configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthConfig {
    /// Authentication method.
    #[serde(default)]
    pub method: AuthMethod,
    /// Password, required for the nickserv and sasl methods.
    pub password: Option<String>,
}

/// Transport encryption configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct TlsConfig {
    /// Encrypt the connection (default true).
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// CA certificate files (PEM). The system root store is used when
    /// empty.
    #[serde(default)]
    pub ca_certs: Vec<String>,
    /// Client certificate file (PEM) for mutual authentication.
    pub client_cert: Option<String>,
    /// Client key file (PEM) for mutual authentication.
    pub client_key: Option<String>,
    /// Skip server certificate verification. Self-signed test servers
    /// only.
    #[serde(default)]
    pub insecure_skip_verify: bool,
}

impl Default for TlsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ca_certs: Vec::new(),
            client_cert: None,
            client_key: None,
            insecure_skip_verify: false,
        }
    }
}

fn default_nick() -> String {
    DEFAULT_NICK.to_string()
}

fn default_dial_timeout() -> f64 {
    10.0
}

fn default_keepalive() -> u64 {
    60
}

fn default_settle_delay() -> f64 {
    5.0
}

fn default_queue_capacity() -> usize {
    100
}

fn default_true() -> bool {
    true
}
