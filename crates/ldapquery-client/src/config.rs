//! Per-host connection configuration.
//!
//! [`ConnectionConfig::resolve`] turns the shared [`LdapSettings`] plus one
//! host name into everything a single connection attempt needs. Resolution
//! failures are configuration errors and abort the query before any network
//! traffic.

use std::path::{Path, PathBuf};

use ldapquery_core::{Error, LdapSettings, Result};
use secrecy::SecretString;
use url::Url;

/// How a connection is secured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TlsMethod {
    /// Plain connection upgraded with the StartTLS extended operation.
    StartTls,
    /// TLS from the first byte (`ldaps://`).
    ImplicitTls,
}

impl TlsMethod {
    /// Settings token for this method.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::StartTls => "start_tls",
            Self::ImplicitTls => "implicit_tls",
        }
    }

    fn from_override(token: &str) -> Result<Self> {
        match token {
            "start_tls" => Ok(Self::StartTls),
            "implicit_tls" => Ok(Self::ImplicitTls),
            other => Err(Error::ConfigError(format!(
                "unrecognized TLS method `{other}` (expected `start_tls` or `implicit_tls`)"
            ))),
        }
    }

    fn from_port(port: u16) -> Result<Self> {
        match port {
            389 => Ok(Self::StartTls),
            636 => Ok(Self::ImplicitTls),
            other => Err(Error::ConfigError(format!(
                "cannot infer TLS method for port {other}; set `tls_method` explicitly"
            ))),
        }
    }
}

impl std::fmt::Display for TlsMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Credentials for the initial simple bind.
#[derive(Debug, Clone)]
pub struct BindCredentials {
    username: String,
    password: SecretString,
}

impl BindCredentials {
    /// Bind DN or account name.
    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Bind password.
    #[must_use]
    pub const fn password(&self) -> &SecretString {
        &self.password
    }
}

/// TLS parameters for one connection.
#[derive(Debug, Clone)]
pub struct TlsConfig {
    method: TlsMethod,
    ca_file: PathBuf,
}

impl TlsConfig {
    /// Negotiation method.
    #[must_use]
    pub const fn method(&self) -> TlsMethod {
        self.method
    }

    /// CA certificate bundle used to verify the server.
    #[must_use]
    pub fn ca_file(&self) -> &Path {
        &self.ca_file
    }
}

/// Everything one connection attempt needs.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    host: String,
    port: u16,
    auth: Option<BindCredentials>,
    tls: Option<TlsConfig>,
}

impl ConnectionConfig {
    /// Resolves the configuration for connecting to `host`.
    ///
    /// The TLS method comes from the `tls_method` override when set, or is
    /// inferred from the port (389 means StartTLS, 636 means implicit TLS).
    /// Any other port without an override is an error, as is a missing or
    /// unreadable CA certificate when TLS is enabled.
    pub fn resolve(host: &str, settings: &LdapSettings) -> Result<Self> {
        let port = settings
            .port
            .ok_or_else(|| Error::ConfigError("missing required setting `port`".to_string()))?;

        let auth = settings
            .bind_credentials()
            .map(|(username, password)| BindCredentials {
                username: username.to_string(),
                password: password.clone(),
            });

        let tls = if settings.tls_enabled {
            let method = match settings.tls_method.as_deref() {
                Some(token) => TlsMethod::from_override(token)?,
                None => TlsMethod::from_port(port)?,
            };
            let ca_file = settings.ca_file().ok_or_else(|| {
                Error::ConfigError("TLS is enabled but setting `ca_dir` is not set".to_string())
            })?;
            if !ca_file.is_file() {
                return Err(Error::ConfigError(format!(
                    "CA certificate {} does not exist",
                    ca_file.display()
                )));
            }
            Some(TlsConfig { method, ca_file })
        } else {
            None
        };

        let config = Self {
            host: host.to_string(),
            port,
            auth,
            tls,
        };
        Url::parse(&config.url())?;
        Ok(config)
    }

    /// Host this configuration connects to.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Port this configuration connects to.
    #[must_use]
    pub const fn port(&self) -> u16 {
        self.port
    }

    /// Bind credentials, if the settings carry any.
    #[must_use]
    pub const fn auth(&self) -> Option<&BindCredentials> {
        self.auth.as_ref()
    }

    /// TLS parameters, if TLS is enabled.
    #[must_use]
    pub const fn tls(&self) -> Option<&TlsConfig> {
        self.tls.as_ref()
    }

    /// Connection URL, `ldaps://` for implicit TLS and `ldap://` otherwise.
    #[must_use]
    pub fn url(&self) -> String {
        let scheme = match &self.tls {
            Some(tls) if tls.method() == TlsMethod::ImplicitTls => "ldaps",
            _ => "ldap",
        };
        format!("{scheme}://{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use std::fs;
    use std::path::Path;

    fn write_ca(dir: &Path) {
        fs::write(
            dir.join(ldapquery_core::settings::CA_FILE_NAME),
            "-----BEGIN CERTIFICATE-----\n-----END CERTIFICATE-----\n",
        )
        .unwrap();
    }

    #[test]
    fn test_resolve_defaults() {
        let settings = LdapSettings::new("ldap.example.com".to_string(), 389).unwrap();
        let config = ConnectionConfig::resolve("ldap.example.com", &settings).unwrap();
        assert_eq!(config.host(), "ldap.example.com");
        assert_eq!(config.port(), 389);
        assert!(config.auth().is_none());
        assert!(config.tls().is_none());
        assert_eq!(config.url(), "ldap://ldap.example.com:389");
    }

    #[test]
    fn test_resolve_carries_credentials() {
        let settings = LdapSettings::new("a".to_string(), 389)
            .unwrap()
            .with_credentials(
                "cn=reader,dc=example,dc=com".to_string(),
                "hunter2".to_string().into(),
            );
        let config = ConnectionConfig::resolve("a", &settings).unwrap();
        let auth = config.auth().unwrap();
        assert_eq!(auth.username(), "cn=reader,dc=example,dc=com");
        assert_eq!(auth.password().expose_secret(), "hunter2");
    }

    #[test]
    fn test_resolve_infers_start_tls_from_port() {
        let dir = tempfile::tempdir().unwrap();
        write_ca(dir.path());
        let settings = LdapSettings::new("a".to_string(), 389)
            .unwrap()
            .with_tls(dir.path().to_path_buf());
        let config = ConnectionConfig::resolve("a", &settings).unwrap();
        let tls = config.tls().unwrap();
        assert_eq!(tls.method(), TlsMethod::StartTls);
        assert!(tls.ca_file().ends_with("ldap_ca.pem"));
        assert_eq!(config.url(), "ldap://a:389");
    }

    #[test]
    fn test_resolve_infers_implicit_tls_from_port() {
        let dir = tempfile::tempdir().unwrap();
        write_ca(dir.path());
        let settings = LdapSettings::new("a".to_string(), 636)
            .unwrap()
            .with_tls(dir.path().to_path_buf());
        let config = ConnectionConfig::resolve("a", &settings).unwrap();
        assert_eq!(config.tls().unwrap().method(), TlsMethod::ImplicitTls);
        assert_eq!(config.url(), "ldaps://a:636");
    }

    #[test]
    fn test_resolve_honors_tls_method_override() {
        let dir = tempfile::tempdir().unwrap();
        write_ca(dir.path());
        let settings = LdapSettings::new("a".to_string(), 10636)
            .unwrap()
            .with_tls(dir.path().to_path_buf())
            .with_tls_method("implicit_tls".to_string());
        let config = ConnectionConfig::resolve("a", &settings).unwrap();
        assert_eq!(config.tls().unwrap().method(), TlsMethod::ImplicitTls);
        assert_eq!(config.url(), "ldaps://a:10636");
    }

    #[test]
    fn test_resolve_rejects_unknown_tls_method() {
        let dir = tempfile::tempdir().unwrap();
        write_ca(dir.path());
        let settings = LdapSettings::new("a".to_string(), 389)
            .unwrap()
            .with_tls(dir.path().to_path_buf())
            .with_tls_method("opportunistic".to_string());
        let err = ConnectionConfig::resolve("a", &settings).unwrap_err();
        assert!(matches!(err, Error::ConfigError(_)));
        assert!(err.to_string().contains("opportunistic"));
    }

    #[test]
    fn test_resolve_rejects_ambiguous_port() {
        let dir = tempfile::tempdir().unwrap();
        write_ca(dir.path());
        let settings = LdapSettings::new("a".to_string(), 1389)
            .unwrap()
            .with_tls(dir.path().to_path_buf());
        let err = ConnectionConfig::resolve("a", &settings).unwrap_err();
        assert!(err.to_string().contains("cannot infer TLS method"));
    }

    #[test]
    fn test_resolve_requires_existing_ca_file() {
        let dir = tempfile::tempdir().unwrap();
        let settings = LdapSettings::new("a".to_string(), 389)
            .unwrap()
            .with_tls(dir.path().to_path_buf());
        let err = ConnectionConfig::resolve("a", &settings).unwrap_err();
        assert!(matches!(err, Error::ConfigError(_)));
        assert!(err.to_string().contains("does not exist"));
    }

    #[test]
    fn test_resolve_requires_port() {
        let settings = LdapSettings {
            port: None,
            ..LdapSettings::default()
        };
        let err = ConnectionConfig::resolve("a", &settings).unwrap_err();
        assert!(err.to_string().contains("missing required setting `port`"));
    }

    #[test]
    fn test_resolve_rejects_unparseable_host() {
        let settings = LdapSettings::new("bad host".to_string(), 389).unwrap();
        let err = ConnectionConfig::resolve("bad host", &settings).unwrap_err();
        assert!(matches!(err, Error::ConfigError(_)));
    }

    #[test]
    fn test_tls_method_tokens() {
        assert_eq!(TlsMethod::StartTls.as_str(), "start_tls");
        assert_eq!(TlsMethod::ImplicitTls.to_string(), "implicit_tls");
    }
}
