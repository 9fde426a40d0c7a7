//! Connection settings for directory queries.
//!
//! The embedding host supplies these settings at call time; the query client
//! performs no configuration discovery or persistence of its own.

use crate::Error;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use validator::Validate;

/// Fixed file name of the CA certificate expected inside [`LdapSettings::ca_dir`].
pub const CA_FILE_NAME: &str = "ldap_ca.pem";

/// Settings for connecting to a set of directory servers.
///
/// Hosts are tried in the order they appear in `servers`; the first
/// successful bind wins. All fields are treated as opaque inputs; how they
/// are sourced is the embedding host's concern.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct LdapSettings {
    /// Comma-separated list of candidate directory servers, in failover order
    pub servers: String,

    /// Directory server port, shared by all candidate servers
    #[validate(required, range(min = 1))]
    pub port: Option<u16>,

    /// Account name or DN for simple bind authentication
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    /// Password for simple bind authentication
    #[serde(skip_serializing, default)]
    pub password: Option<SecretString>,

    /// Whether to negotiate TLS with the directory servers
    #[serde(default)]
    pub tls_enabled: bool,

    /// TLS negotiation override: `start_tls` or `implicit_tls`
    ///
    /// When absent, the method is inferred from the port (389 upgrades
    /// in-band, 636 establishes TLS first).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tls_method: Option<String>,

    /// Default base DN applied when a request does not carry one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base: Option<String>,

    /// Directory containing the `ldap_ca.pem` CA certificate
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ca_dir: Option<PathBuf>,

    /// Transport connect and bind timeout per host, in seconds
    #[validate(range(min = 1, max = 300))]
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    /// Client-side bound on a single search call, in seconds
    #[validate(range(min = 1, max = 300))]
    #[serde(default = "default_operation_timeout_secs")]
    pub operation_timeout_secs: u64,
}

const fn default_connect_timeout_secs() -> u64 {
    10
}

const fn default_operation_timeout_secs() -> u64 {
    10
}

impl LdapSettings {
    /// Create settings with the required parameters.
    ///
    /// # Arguments
    ///
    /// * `servers` - Comma-separated server list, e.g. `"ldap1,ldap2"`
    /// * `port` - Directory server port
    ///
    /// # Errors
    ///
    /// Returns an error if validation fails.
    pub fn new(servers: impl Into<String>, port: u16) -> Result<Self, Error> {
        let settings = Self {
            servers: servers.into(),
            port: Some(port),
            username: None,
            password: None,
            tls_enabled: false,
            tls_method: None,
            base: None,
            ca_dir: None,
            connect_timeout_secs: default_connect_timeout_secs(),
            operation_timeout_secs: default_operation_timeout_secs(),
        };

        settings.ensure_valid()?;

        Ok(settings)
    }

    /// Set simple bind credentials.
    #[must_use]
    pub fn with_credentials(mut self, username: impl Into<String>, password: SecretString) -> Self {
        self.username = Some(username.into());
        self.password = Some(password);
        self
    }

    /// Enable TLS with the given CA certificate directory.
    #[must_use]
    pub fn with_tls(mut self, ca_dir: impl Into<PathBuf>) -> Self {
        self.tls_enabled = true;
        self.ca_dir = Some(ca_dir.into());
        self
    }

    /// Set the TLS negotiation method override.
    #[must_use]
    pub fn with_tls_method(mut self, method: impl Into<String>) -> Self {
        self.tls_method = Some(method.into());
        self
    }

    /// Set the default base DN.
    #[must_use]
    pub fn with_base(mut self, base: impl Into<String>) -> Self {
        self.base = Some(base.into());
        self
    }

    /// Set the per-host connect and bind timeout in seconds.
    #[must_use]
    pub const fn with_connect_timeout(mut self, seconds: u64) -> Self {
        self.connect_timeout_secs = seconds;
        self
    }

    /// Set the search operation timeout in seconds.
    #[must_use]
    pub const fn with_operation_timeout(mut self, seconds: u64) -> Self {
        self.operation_timeout_secs = seconds;
        self
    }

    /// Candidate hosts in failover order.
    ///
    /// Splits `servers` on commas, trims surrounding whitespace and drops
    /// empty segments.
    #[must_use]
    pub fn hosts(&self) -> Vec<String> {
        self.servers
            .split(',')
            .map(str::trim)
            .filter(|host| !host.is_empty())
            .map(ToString::to_string)
            .collect()
    }

    /// Simple bind credentials, present only when both username and password
    /// are configured and non-empty.
    #[must_use]
    pub fn bind_credentials(&self) -> Option<(&str, &SecretString)> {
        match (&self.username, &self.password) {
            (Some(username), Some(password))
                if !username.is_empty() && !password.expose_secret().is_empty() =>
            {
                Some((username.as_str(), password))
            }
            _ => None,
        }
    }

    /// Path of the CA certificate file, if a CA directory is configured.
    #[must_use]
    pub fn ca_file(&self) -> Option<PathBuf> {
        self.ca_dir.as_ref().map(|dir| dir.join(CA_FILE_NAME))
    }

    /// Get the per-host connect timeout as a Duration.
    #[must_use]
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Get the search operation timeout as a Duration.
    #[must_use]
    pub const fn operation_timeout(&self) -> Duration {
        Duration::from_secs(self.operation_timeout_secs)
    }

    /// Validate the settings once at the boundary.
    ///
    /// Runs the declarative field checks plus the cross-field rules that
    /// cannot be expressed per field.
    ///
    /// # Errors
    ///
    /// Returns an error if any required setting is missing or out of range.
    pub fn ensure_valid(&self) -> Result<(), Error> {
        self.validate()?;

        if self.hosts().is_empty() {
            return Err(Error::ConfigError(
                "Setting `servers` must name at least one host".to_string(),
            ));
        }

        if self.tls_enabled && self.ca_dir.is_none() {
            return Err(Error::ConfigError(
                "TLS is enabled but setting `ca_dir` is not set".to_string(),
            ));
        }

        Ok(())
    }
}

impl Default for LdapSettings {
    fn default() -> Self {
        Self {
            servers: "localhost".to_string(),
            port: Some(389),
            username: None,
            password: None,
            tls_enabled: false,
            tls_method: None,
            base: None,
            ca_dir: None,
            connect_timeout_secs: default_connect_timeout_secs(),
            operation_timeout_secs: default_operation_timeout_secs(),
        }
    }
}
