//! Native LDAP transport backed by `ldap3`.
//!
//! [`NativeConnector`] opens one connection per attempt, drives it on the
//! tokio runtime and performs the initial simple bind before handing the
//! session to the caller. Sessions without configured credentials bind
//! anonymously.

use crate::config::{ConnectionConfig, TlsMethod};
use crate::entry::RawEntry;
use crate::request::SearchScope;
use crate::Result;
use async_trait::async_trait;
use ldap3::{LdapConnAsync, LdapConnSettings, SearchEntry, SearchOptions};
use ldapquery_core::{Error, LdapSettings};
use native_tls::{Certificate, TlsConnector};
use secrecy::ExposeSecret;
use std::fs;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

/// Server-side time limit attached to every search, in seconds.
pub(crate) const SEARCH_TIME_LIMIT_SECS: i32 = 10;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub(crate) trait DirectorySession: Send {
    async fn search(
        &mut self,
        base: &str,
        scope: SearchScope,
        filter: &str,
        attributes: &[String],
    ) -> Result<Vec<RawEntry>>;
    async fn unbind(&mut self) -> Result<()>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub(crate) trait DirectoryConnector: Send + Sync {
    async fn open(&self, config: &ConnectionConfig) -> Result<Box<dyn DirectorySession>>;
}

/// Connector that opens real directory connections.
pub(crate) struct NativeConnector {
    settings: Arc<LdapSettings>,
}

impl NativeConnector {
    #[must_use]
    pub(crate) fn new(settings: Arc<LdapSettings>) -> Self {
        Self { settings }
    }
}

#[async_trait]
impl DirectoryConnector for NativeConnector {
    async fn open(&self, config: &ConnectionConfig) -> Result<Box<dyn DirectorySession>> {
        let conn_settings = build_conn_settings(config, self.settings.connect_timeout())?;
        let url = config.url();
        let (conn, mut ldap) = timeout(
            self.settings.connect_timeout(),
            LdapConnAsync::with_settings(conn_settings, &url),
        )
        .await
        .map_err(|_| Error::Timeout(format!("connection to {url} timed out")))?
        .map_err(map_connect_error)?;
        ldap3::drive!(conn);

        let (username, password) = match config.auth() {
            Some(auth) => (
                auth.username().to_string(),
                auth.password().expose_secret().to_string(),
            ),
            None => (String::new(), String::new()),
        };
        let bind = timeout(
            self.settings.connect_timeout(),
            ldap.simple_bind(&username, &password),
        )
        .await
        .map_err(|_| Error::Timeout(format!("bind to {} timed out", config.host())))?
        .map_err(map_connect_error)?;
        if bind.rc != 0 {
            return Err(Error::BindFailed {
                host: config.host().to_string(),
                code: bind.rc,
                message: bind.text,
            });
        }

        Ok(Box::new(NativeSession {
            inner: ldap,
            operation_timeout: self.settings.operation_timeout(),
        }))
    }
}

struct NativeSession {
    inner: ldap3::Ldap,
    operation_timeout: Duration,
}

#[async_trait]
impl DirectorySession for NativeSession {
    async fn search(
        &mut self,
        base: &str,
        scope: SearchScope,
        filter: &str,
        attributes: &[String],
    ) -> Result<Vec<RawEntry>> {
        let result = timeout(
            self.operation_timeout,
            self.inner
                .with_search_options(SearchOptions::new().timelimit(SEARCH_TIME_LIMIT_SECS))
                .search(base, scope.into(), filter, attributes.to_vec()),
        )
        .await
        .map_err(|_| Error::Timeout("LDAP search timed out".to_string()))?
        .map_err(map_search_error)?;
        let (entries, _) = result.success().map_err(map_search_error)?;
        Ok(entries
            .into_iter()
            .map(SearchEntry::construct)
            .map(raw_entry_from)
            .collect())
    }

    async fn unbind(&mut self) -> Result<()> {
        timeout(self.operation_timeout, self.inner.unbind())
            .await
            .map_err(|_| Error::Timeout("LDAP unbind timed out".to_string()))?
            .map_err(map_connect_error)?;
        Ok(())
    }
}

fn build_conn_settings(
    config: &ConnectionConfig,
    connect_timeout: Duration,
) -> Result<LdapConnSettings> {
    let mut settings = LdapConnSettings::new().set_conn_timeout(connect_timeout);

    if let Some(tls) = config.tls() {
        let pem = fs::read(tls.ca_file()).map_err(|err| {
            Error::ConfigError(format!(
                "failed to read CA certificate {}: {err}",
                tls.ca_file().display()
            ))
        })?;
        let certificate = Certificate::from_pem(&pem)
            .map_err(|err| Error::ConfigError(format!("invalid CA certificate: {err}")))?;
        let connector = TlsConnector::builder()
            .add_root_certificate(certificate)
            .build()
            .map_err(|err| {
                Error::ConfigError(format!("failed to construct TLS connector: {err}"))
            })?;
        settings = settings.set_connector(connector);
        if tls.method() == TlsMethod::StartTls {
            settings = settings.set_starttls(true);
        }
    }

    Ok(settings)
}

fn map_connect_error(err: ldap3::LdapError) -> Error {
    Error::ConnectionFailed(err.to_string())
}

fn map_search_error(err: ldap3::LdapError) -> Error {
    Error::SearchFailed(err.to_string())
}

/// Folds binary attribute values into the string map, lossily decoded.
fn raw_entry_from(entry: SearchEntry) -> RawEntry {
    let SearchEntry {
        dn,
        mut attrs,
        bin_attrs,
        ..
    } = entry;
    for (name, values) in bin_attrs {
        attrs.entry(name).or_default().extend(
            values
                .into_iter()
                .map(|value| String::from_utf8_lossy(&value).into_owned()),
        );
    }
    RawEntry {
        dn,
        attributes: attrs,
    }
}
