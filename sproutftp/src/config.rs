//! # Config
//!
//! Connection settings shared by [`crate::Session`] and [`crate::FileManager`].
//!
//! A [`Config`] can be built in code, starting from [`Config::default`], or read from the
//! `SPROUTFTP_*` environment variables with [`Config::from_env`].

use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

/// Default FTP control port
pub const DEFAULT_PORT: u16 = 21;
/// Default connect timeout, in milliseconds
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 10_000;

pub const ENV_HOST: &str = "SPROUTFTP_HOST";
pub const ENV_PORT: &str = "SPROUTFTP_PORT";
pub const ENV_USER: &str = "SPROUTFTP_USER";
pub const ENV_PASSWORD: &str = "SPROUTFTP_PASSWORD";
pub const ENV_ENCRYPTION: &str = "SPROUTFTP_ENCRYPTION";
pub const ENV_IP_VERSION: &str = "SPROUTFTP_IP_VERSION";
pub const ENV_CONNECT_TIMEOUT_MS: &str = "SPROUTFTP_CONNECT_TIMEOUT_MS";
pub const ENV_NAT_WORKAROUND: &str = "SPROUTFTP_PASSIVE_NAT_WORKAROUND";
pub const ENV_ACCEPT_INVALID_CERTS: &str = "SPROUTFTP_ACCEPT_INVALID_CERTS";
pub const ENV_DEFAULT_PATH: &str = "SPROUTFTP_DEFAULT_PATH";

/// Result of config operations
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Reasons a [`Config`] can be rejected
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("host is empty")]
    EmptyHost,
    #[error("port must be greater than 0")]
    ZeroPort,
    #[error("connect timeout must be greater than 0")]
    ZeroTimeout,
    #[error("default path must be absolute: {0}")]
    RelativeDefaultPath(String),
    #[error("TLS was requested but the crate was built without the native-tls feature")]
    TlsNotSupported,
    #[error("invalid value for {key}: {value:?}")]
    InvalidValue { key: &'static str, value: String },
}

/// How the control and data channels are protected
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum EncryptionMode {
    /// Plain FTP
    #[default]
    None,
    /// Plain connection upgraded with `AUTH TLS` after the greeting
    Explicit,
    /// TLS from the first byte, usually on port 990
    Implicit,
}

impl EncryptionMode {
    /// Whether TLS is used at all
    pub fn is_secure(&self) -> bool {
        !matches!(self, Self::None)
    }
}

impl FromStr for EncryptionMode {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" | "plain" => Ok(Self::None),
            "explicit" => Ok(Self::Explicit),
            "implicit" => Ok(Self::Implicit),
            _ => Err(()),
        }
    }
}

impl fmt::Display for EncryptionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::None => "none",
            Self::Explicit => "explicit",
            Self::Implicit => "implicit",
        })
    }
}

/// Which address family to use when the host resolves to several addresses
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum IpVersion {
    /// First address that accepts the connection
    #[default]
    Auto,
    V4,
    V6,
}

impl IpVersion {
    /// Whether `addr` may be used under this setting
    pub fn accepts(&self, addr: &SocketAddr) -> bool {
        match self {
            Self::Auto => true,
            Self::V4 => addr.is_ipv4(),
            Self::V6 => addr.is_ipv6(),
        }
    }
}

impl FromStr for IpVersion {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "auto" | "any" => Ok(Self::Auto),
            "4" | "v4" | "ipv4" => Ok(Self::V4),
            "6" | "v6" | "ipv6" => Ok(Self::V6),
            _ => Err(()),
        }
    }
}

impl fmt::Display for IpVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Auto => "auto",
            Self::V4 => "ipv4",
            Self::V6 => "ipv6",
        })
    }
}

/// Connection settings
#[derive(Clone, PartialEq, Eq)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub encryption: EncryptionMode,
    pub ip_version: IpVersion,
    /// Bounds TCP connect, greeting and login. Later commands block until the server answers
    pub connect_timeout: Duration,
    /// Always connect the data channel to the control peer, ignoring the PASV address
    pub passive_nat_workaround: bool,
    /// Skip certificate and host name verification on TLS connections
    pub accept_invalid_certs: bool,
    /// Directory listed when no path is given
    pub default_path: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: String::from("localhost"),
            port: DEFAULT_PORT,
            username: String::from("anonymous"),
            password: String::new(),
            encryption: EncryptionMode::None,
            ip_version: IpVersion::Auto,
            connect_timeout: Duration::from_millis(DEFAULT_CONNECT_TIMEOUT_MS),
            passive_nat_workaround: false,
            accept_invalid_certs: false,
            default_path: String::from("/"),
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"******")
            .field("encryption", &self.encryption)
            .field("ip_version", &self.ip_version)
            .field("connect_timeout", &self.connect_timeout)
            .field("passive_nat_workaround", &self.passive_nat_workaround)
            .field("accept_invalid_certs", &self.accept_invalid_certs)
            .field("default_path", &self.default_path)
            .finish()
    }
}

impl Config {
    /// Default settings for `host`
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            ..Default::default()
        }
    }

    /// Set login credentials
    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = username.into();
        self.password = password.into();
        self
    }

    /// Set control port
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set connect timeout
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set encryption mode
    pub fn encryption(mut self, encryption: EncryptionMode) -> Self {
        self.encryption = encryption;
        self
    }

    /// Read the settings from the `SPROUTFTP_*` environment variables.
    /// Unset variables keep their default value; the result is validated
    pub fn from_env() -> ConfigResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the settings from `lookup`, which maps a variable name to its value
    pub(crate) fn from_lookup<F>(lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(host) = lookup(ENV_HOST) {
            config.host = host;
        }
        if let Some(port) = lookup(ENV_PORT) {
            config.port = parse_value(ENV_PORT, &port)?;
        }
        if let Some(username) = lookup(ENV_USER) {
            config.username = username;
        }
        if let Some(password) = lookup(ENV_PASSWORD) {
            config.password = password;
        }
        if let Some(encryption) = lookup(ENV_ENCRYPTION) {
            config.encryption = parse_value(ENV_ENCRYPTION, &encryption)?;
        }
        if let Some(ip_version) = lookup(ENV_IP_VERSION) {
            config.ip_version = parse_value(ENV_IP_VERSION, &ip_version)?;
        }
        if let Some(timeout) = lookup(ENV_CONNECT_TIMEOUT_MS) {
            config.connect_timeout =
                Duration::from_millis(parse_value(ENV_CONNECT_TIMEOUT_MS, &timeout)?);
        }
        if let Some(flag) = lookup(ENV_NAT_WORKAROUND) {
            config.passive_nat_workaround = parse_flag(ENV_NAT_WORKAROUND, &flag)?;
        }
        if let Some(flag) = lookup(ENV_ACCEPT_INVALID_CERTS) {
            config.accept_invalid_certs = parse_flag(ENV_ACCEPT_INVALID_CERTS, &flag)?;
        }
        if let Some(path) = lookup(ENV_DEFAULT_PATH) {
            config.default_path = path;
        }
        config.validate()?;
        Ok(config)
    }

    /// Check the settings are usable
    pub fn validate(&self) -> ConfigResult<()> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::EmptyHost);
        }
        if self.port == 0 {
            return Err(ConfigError::ZeroPort);
        }
        if self.connect_timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout);
        }
        if !self.default_path.starts_with('/') {
            return Err(ConfigError::RelativeDefaultPath(self.default_path.clone()));
        }
        if cfg!(not(feature = "native-tls")) && self.encryption.is_secure() {
            return Err(ConfigError::TlsNotSupported);
        }
        Ok(())
    }
}

fn parse_value<T: FromStr>(key: &'static str, value: &str) -> ConfigResult<T> {
    value
        .trim()
        .parse::<T>()
        .map_err(|_| ConfigError::InvalidValue {
            key,
            value: value.to_string(),
        })
}

fn parse_flag(key: &'static str, value: &str) -> ConfigResult<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key,
            value: value.to_string(),
        }),
    }
}

#[cfg(test)]
mod test {

    use std::collections::HashMap;

    use pretty_assertions::assert_eq;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| vars.get(key).cloned()
    }

    #[test]
    fn should_build_default_config() {
        let config = Config::default();
        assert_eq!(config.port, 21);
        assert_eq!(config.username.as_str(), "anonymous");
        assert_eq!(config.password.as_str(), "");
        assert_eq!(config.encryption, EncryptionMode::None);
        assert_eq!(config.ip_version, IpVersion::Auto);
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
        assert!(!config.passive_nat_workaround);
        assert_eq!(config.default_path.as_str(), "/");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn should_build_config_with_setters() {
        let config = Config::new("ftp.example.com")
            .credentials("omar", "qwerty123")
            .port(2121)
            .connect_timeout(Duration::from_secs(3));
        assert_eq!(config.host.as_str(), "ftp.example.com");
        assert_eq!(config.username.as_str(), "omar");
        assert_eq!(config.password.as_str(), "qwerty123");
        assert_eq!(config.port, 2121);
        assert_eq!(config.connect_timeout, Duration::from_secs(3));
    }

    #[test]
    fn should_read_config_from_lookup() {
        let config = Config::from_lookup(lookup(&[
            (ENV_HOST, "ftp.example.com"),
            (ENV_PORT, "2121"),
            (ENV_USER, "omar"),
            (ENV_PASSWORD, "qwerty123"),
            (ENV_IP_VERSION, "v6"),
            (ENV_CONNECT_TIMEOUT_MS, "2500"),
            (ENV_NAT_WORKAROUND, "yes"),
            (ENV_DEFAULT_PATH, "/pub"),
        ]))
        .unwrap();
        assert_eq!(config.host.as_str(), "ftp.example.com");
        assert_eq!(config.port, 2121);
        assert_eq!(config.username.as_str(), "omar");
        assert_eq!(config.password.as_str(), "qwerty123");
        assert_eq!(config.ip_version, IpVersion::V6);
        assert_eq!(config.connect_timeout, Duration::from_millis(2500));
        assert!(config.passive_nat_workaround);
        assert_eq!(config.default_path.as_str(), "/pub");
    }

    #[test]
    fn should_keep_defaults_for_unset_variables() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn should_reject_bad_values() {
        assert_eq!(
            Config::from_lookup(lookup(&[(ENV_PORT, "ftp")])).unwrap_err(),
            ConfigError::InvalidValue {
                key: ENV_PORT,
                value: "ftp".to_string()
            }
        );
        assert_eq!(
            Config::from_lookup(lookup(&[(ENV_PORT, "0")])).unwrap_err(),
            ConfigError::ZeroPort
        );
        assert_eq!(
            Config::from_lookup(lookup(&[(ENV_CONNECT_TIMEOUT_MS, "0")])).unwrap_err(),
            ConfigError::ZeroTimeout
        );
        assert_eq!(
            Config::from_lookup(lookup(&[(ENV_HOST, "  ")])).unwrap_err(),
            ConfigError::EmptyHost
        );
        assert_eq!(
            Config::from_lookup(lookup(&[(ENV_DEFAULT_PATH, "pub")])).unwrap_err(),
            ConfigError::RelativeDefaultPath("pub".to_string())
        );
        assert!(Config::from_lookup(lookup(&[(ENV_ENCRYPTION, "ssl3")])).is_err());
        assert!(Config::from_lookup(lookup(&[(ENV_NAT_WORKAROUND, "maybe")])).is_err());
    }

    #[cfg(not(feature = "native-tls"))]
    #[test]
    fn should_reject_tls_without_feature() {
        assert_eq!(
            Config::default()
                .encryption(EncryptionMode::Explicit)
                .validate()
                .unwrap_err(),
            ConfigError::TlsNotSupported
        );
    }

    #[cfg(feature = "native-tls")]
    #[test]
    fn should_accept_tls_with_feature() {
        let config = Config::from_lookup(lookup(&[(ENV_ENCRYPTION, "Implicit")])).unwrap();
        assert_eq!(config.encryption, EncryptionMode::Implicit);
    }

    #[test]
    fn should_parse_and_display_modes() {
        assert_eq!(
            EncryptionMode::from_str("EXPLICIT").unwrap(),
            EncryptionMode::Explicit
        );
        assert_eq!(EncryptionMode::from_str("plain").unwrap(), EncryptionMode::None);
        assert!(EncryptionMode::from_str("tls").is_err());
        assert_eq!(EncryptionMode::Implicit.to_string().as_str(), "implicit");
        assert_eq!(IpVersion::from_str("4").unwrap(), IpVersion::V4);
        assert_eq!(IpVersion::from_str("IPv6").unwrap(), IpVersion::V6);
        assert!(IpVersion::from_str("ipv5").is_err());
        assert_eq!(IpVersion::Auto.to_string().as_str(), "auto");
    }

    #[test]
    fn should_filter_addresses_by_ip_version() {
        let v4: SocketAddr = "127.0.0.1:21".parse().unwrap();
        let v6: SocketAddr = "[::1]:21".parse().unwrap();
        assert!(IpVersion::Auto.accepts(&v4));
        assert!(IpVersion::Auto.accepts(&v6));
        assert!(IpVersion::V4.accepts(&v4));
        assert!(!IpVersion::V4.accepts(&v6));
        assert!(IpVersion::V6.accepts(&v6));
        assert!(!IpVersion::V6.accepts(&v4));
    }

    #[test]
    fn should_mask_password_in_debug() {
        let config = Config::default().credentials("omar", "qwerty123");
        let debug = format!("{config:?}");
        assert!(!debug.contains("qwerty123"));
        assert!(debug.contains("omar"));
    }
}
