//! Failover query client.

#[cfg(feature = "netldap")]
use crate::config::ConnectionConfig;
#[cfg(feature = "netldap")]
use crate::conn::{DirectoryConnector, DirectorySession, NativeConnector};
#[cfg(feature = "netldap")]
use crate::entry::{normalize_entries, DirectoryEntry};
use crate::request::SearchRequest;
use crate::result::QueryResult;
use crate::Result;
#[cfg(feature = "netldap")]
use ldapquery_core::Error;
use ldapquery_core::LdapSettings;
use std::sync::Arc;
#[cfg(feature = "netldap")]
use std::time::Instant;
#[cfg(feature = "netldap")]
use tokio::time::timeout;
#[cfg(feature = "netldap")]
use tracing::{debug, info};
use tracing::warn;

/// Client that runs searches against a set of directory servers.
///
/// Hosts listed in [`LdapSettings::servers`] are tried in order and the
/// first server that accepts the bind serves the search. One client can run
/// any number of queries; every query opens and closes its own connection.
pub struct LdapQueryClient {
    settings: Arc<LdapSettings>,
    #[cfg(feature = "netldap")]
    connector: Box<dyn DirectoryConnector>,
}

impl std::fmt::Debug for LdapQueryClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LdapQueryClient")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl LdapQueryClient {
    /// Creates a client for the given settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the settings fail validation.
    pub fn new(settings: LdapSettings) -> Result<Self> {
        settings.ensure_valid()?;
        let settings = Arc::new(settings);
        #[cfg(feature = "netldap")]
        {
            let connector: Box<dyn DirectoryConnector> =
                Box::new(NativeConnector::new(Arc::clone(&settings)));
            Ok(Self {
                settings,
                connector,
            })
        }
        #[cfg(not(feature = "netldap"))]
        {
            Ok(Self { settings })
        }
    }

    #[cfg(all(test, feature = "netldap"))]
    #[must_use]
    pub(crate) fn with_connector(
        settings: LdapSettings,
        connector: Box<dyn DirectoryConnector>,
    ) -> Self {
        Self {
            settings: Arc::new(settings),
            connector,
        }
    }

    /// Runs one search and reports the outcome.
    ///
    /// Transport-level trouble is part of the result, not an error: when no
    /// server accepts a connection the result carries the
    /// [`connection_error`](crate::QueryStatus::ConnectionError) status, and
    /// a search that fails after a successful bind comes back unsuccessful
    /// with the [`connected`](crate::QueryStatus::Connected) status.
    ///
    /// # Errors
    ///
    /// Returns an error for invalid requests or unusable settings: a filter
    /// that does not parse, a missing port, an unrecognized TLS method or a
    /// missing CA certificate. These abort before any network traffic.
    pub async fn query(&self, request: SearchRequest) -> Result<QueryResult> {
        #[cfg(feature = "netldap")]
        {
            request.ensure_valid_filter()?;

            let mut session = match self.connect_any().await {
                Ok(session) => session,
                Err(err) if err.is_configuration() => return Err(err),
                Err(err) => {
                    warn!(error = %err, "exhausted all directory servers");
                    return Ok(QueryResult::connection_error());
                }
            };

            let outcome = self.execute_search(&mut *session, &request).await;
            if let Err(err) = session.unbind().await {
                debug!(error = %err, "failed to unbind LDAP session");
            }

            match outcome {
                Ok(entries) => Ok(QueryResult::connected(entries)),
                Err(err) => {
                    warn!(error = %err, "there was an error searching LDAP");
                    Ok(QueryResult::search_failed())
                }
            }
        }
        #[cfg(not(feature = "netldap"))]
        {
            let _ = &request;
            warn!("LDAP support is not compiled in; reporting the stub status");
            Ok(QueryResult::module_unavailable())
        }
    }

    /// Settings this client was created with.
    #[must_use]
    pub fn settings(&self) -> &LdapSettings {
        &self.settings
    }

    #[cfg(feature = "netldap")]
    async fn connect_any(&self) -> Result<Box<dyn DirectorySession>> {
        for host in self.settings.hosts() {
            let config = ConnectionConfig::resolve(&host, &self.settings)?;
            debug!(host = %host, "attempting LDAP connection");
            match self.connector.open(&config).await {
                Ok(session) => {
                    debug!(host = %host, "LDAP connection established");
                    return Ok(session);
                }
                Err(err) => {
                    info!(host = %host, error = %err, "LDAP connection attempt failed");
                }
            }
        }
        Err(Error::ConnectionFailed(format!(
            "no directory server reachable among `{}`",
            self.settings.servers
        )))
    }

    #[cfg(feature = "netldap")]
    async fn execute_search(
        &self,
        session: &mut dyn DirectorySession,
        request: &SearchRequest,
    ) -> Result<Vec<DirectoryEntry>> {
        let base = request
            .base()
            .or(self.settings.base.as_deref())
            .unwrap_or("");
        let started = Instant::now();
        let raw = self
            .execute_with_timeout(session.search(
                base,
                request.scope(),
                request.effective_filter(),
                request.attributes(),
            ))
            .await?;
        debug!(
            base = %base,
            filter = %request.effective_filter(),
            attributes = ?request.attributes(),
            elapsed_secs = %format!("{:.3}", started.elapsed().as_secs_f64()),
            results = raw.len(),
            "LDAP search completed"
        );
        Ok(normalize_entries(raw, request.attributes()))
    }

    #[cfg(feature = "netldap")]
    async fn execute_with_timeout<F, T>(&self, fut: F) -> Result<T>
    where
        F: std::future::Future<Output = Result<T>>,
    {
        timeout(self.settings.operation_timeout(), fut)
            .await
            .map_err(|_| Error::Timeout("LDAP operation timed out".to_string()))?
    }
}

#[cfg(all(test, feature = "netldap"))]
mod tests {
    use super::*;
    use crate::conn::{MockDirectoryConnector, MockDirectorySession};
    use crate::entry::RawEntry;
    use crate::request::SearchScope;
    use crate::result::QueryStatus;
    use std::collections::HashMap;

    fn sample_settings() -> LdapSettings {
        LdapSettings::new("ldap1.example.com", 389).unwrap()
    }

    fn directory_entry(dn: &str, pairs: &[(&str, &[&str])]) -> RawEntry {
        let mut attributes = HashMap::new();
        for (name, values) in pairs {
            attributes.insert(
                (*name).to_string(),
                values.iter().map(ToString::to_string).collect(),
            );
        }
        RawEntry {
            dn: dn.to_string(),
            attributes,
        }
    }

    #[tokio::test]
    async fn failover_tries_hosts_in_order() {
        let settings = LdapSettings::new("a,b,c", 389).unwrap();
        let mut connector = MockDirectoryConnector::new();
        let mut sequence = mockall::Sequence::new();
        for host in ["a", "b"] {
            connector
                .expect_open()
                .withf(move |config| config.host() == host)
                .times(1)
                .in_sequence(&mut sequence)
                .returning(|_| Err(Error::ConnectionFailed("connection refused".to_string())));
        }

        let mut session = MockDirectorySession::new();
        session.expect_search().returning(|_, _, _, _| {
            Ok(vec![
                directory_entry("uid=jdoe,dc=example,dc=com", &[("uid", &["jdoe"])]),
                directory_entry("uid=asmith,dc=example,dc=com", &[("uid", &["asmith"])]),
            ])
        });
        session.expect_unbind().times(1).returning(|| Ok(()));
        connector
            .expect_open()
            .withf(|config| config.host() == "c")
            .times(1)
            .in_sequence(&mut sequence)
            .return_once(move |_| Ok(Box::new(session)));

        let client = LdapQueryClient::with_connector(settings, Box::new(connector));
        let result = client
            .query(SearchRequest::new("(objectClass=posixAccount)"))
            .await
            .unwrap();

        assert!(result.success);
        assert_eq!(result.status, QueryStatus::Connected);
        let data = result.data.unwrap();
        assert_eq!(data.len(), 2);
        assert_eq!(data[0].dn(), Some("uid=jdoe,dc=example,dc=com"));
        assert_eq!(data[0].values("uid").unwrap(), ["jdoe"]);
        assert_eq!(data[1].dn(), Some("uid=asmith,dc=example,dc=com"));
    }

    #[tokio::test]
    async fn first_reachable_host_wins() {
        let mut connector = MockDirectoryConnector::new();
        let mut session = MockDirectorySession::new();
        session
            .expect_search()
            .returning(|_, _, _, _| Ok(Vec::new()));
        session.expect_unbind().returning(|| Ok(()));
        connector
            .expect_open()
            .withf(|config| config.host() == "a")
            .times(1)
            .return_once(move |_| Ok(Box::new(session)));

        let settings = LdapSettings::new("a,b", 389).unwrap();
        let client = LdapQueryClient::with_connector(settings, Box::new(connector));
        let result = client.query(SearchRequest::new("")).await.unwrap();
        assert!(result.success);
    }

    #[tokio::test]
    async fn exhausted_servers_report_connection_error() {
        let mut connector = MockDirectoryConnector::new();
        connector
            .expect_open()
            .times(2)
            .returning(|_| Err(Error::ConnectionFailed("connection refused".to_string())));

        let settings = LdapSettings::new("a,b", 389).unwrap();
        let client = LdapQueryClient::with_connector(settings, Box::new(connector));
        let result = client.query(SearchRequest::new("")).await.unwrap();

        assert!(!result.success);
        assert_eq!(result.status, QueryStatus::ConnectionError);
        assert!(result.data.is_none());
    }

    #[tokio::test]
    async fn bind_rejection_counts_as_unreachable() {
        let mut connector = MockDirectoryConnector::new();
        connector.expect_open().times(1).returning(|_| {
            Err(Error::BindFailed {
                host: "a".to_string(),
                code: 49,
                message: "invalid credentials".to_string(),
            })
        });

        let settings = LdapSettings::new("a", 389).unwrap();
        let client = LdapQueryClient::with_connector(settings, Box::new(connector));
        let result = client.query(SearchRequest::new("")).await.unwrap();
        assert_eq!(result.status, QueryStatus::ConnectionError);
    }

    #[tokio::test]
    async fn search_failure_reports_connected_without_data() {
        let mut connector = MockDirectoryConnector::new();
        let mut session = MockDirectorySession::new();
        session
            .expect_search()
            .returning(|_, _, _, _| Err(Error::SearchFailed("sizeLimitExceeded".to_string())));
        session.expect_unbind().times(1).returning(|| Ok(()));
        connector
            .expect_open()
            .return_once(move |_| Ok(Box::new(session)));

        let client = LdapQueryClient::with_connector(sample_settings(), Box::new(connector));
        let result = client.query(SearchRequest::new("")).await.unwrap();

        assert!(!result.success);
        assert_eq!(result.status, QueryStatus::Connected);
        assert!(result.data.is_none());
    }

    #[tokio::test]
    async fn zero_matches_still_succeed() {
        let mut connector = MockDirectoryConnector::new();
        let mut session = MockDirectorySession::new();
        session
            .expect_search()
            .returning(|_, _, _, _| Ok(Vec::new()));
        session.expect_unbind().returning(|| Ok(()));
        connector
            .expect_open()
            .return_once(move |_| Ok(Box::new(session)));

        let client = LdapQueryClient::with_connector(sample_settings(), Box::new(connector));
        let result = client
            .query(SearchRequest::new("(uid=nobody)"))
            .await
            .unwrap();

        assert!(result.success);
        assert_eq!(result.status, QueryStatus::Connected);
        assert_eq!(result.data, Some(Vec::new()));
    }

    #[tokio::test]
    async fn invalid_filter_rejected_before_connecting() {
        let mut connector = MockDirectoryConnector::new();
        connector.expect_open().never();

        let client = LdapQueryClient::with_connector(sample_settings(), Box::new(connector));
        let err = client
            .query(SearchRequest::new("(uid=jdoe"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidFilter(_)));
    }

    #[tokio::test]
    async fn tls_misconfiguration_is_fatal() {
        // Port 389 selects the StartTLS upgrade, which still needs the CA
        // certificate before any connection is attempted.
        let dir = tempfile::tempdir().unwrap();
        let settings = LdapSettings::new("a,b", 389)
            .unwrap()
            .with_tls(dir.path());
        let mut connector = MockDirectoryConnector::new();
        connector.expect_open().never();

        let client = LdapQueryClient::with_connector(settings, Box::new(connector));
        let err = client.query(SearchRequest::new("")).await.unwrap_err();
        assert!(matches!(err, Error::ConfigError(_)));
        assert!(err.to_string().contains("ldap_ca.pem"));
    }

    #[tokio::test]
    async fn search_parameters_are_forwarded() {
        let mut connector = MockDirectoryConnector::new();
        let mut session = MockDirectorySession::new();
        session
            .expect_search()
            .withf(|base, scope, filter, attributes| {
                base == "dc=example,dc=com"
                    && *scope == SearchScope::OneLevel
                    && filter == "(uid=jdoe)"
                    && attributes == ["uid", "cn"]
            })
            .times(1)
            .returning(|_, _, _, _| Ok(Vec::new()));
        session.expect_unbind().returning(|| Ok(()));
        connector
            .expect_open()
            .return_once(move |_| Ok(Box::new(session)));

        let settings = LdapSettings::new("ldap1", 389)
            .unwrap()
            .with_base("dc=example,dc=com");
        let client = LdapQueryClient::with_connector(settings, Box::new(connector));
        let request = SearchRequest::new("(uid=jdoe)")
            .with_attributes(["uid", "cn"])
            .with_scope(SearchScope::OneLevel);
        assert!(client.query(request).await.unwrap().success);
    }

    #[tokio::test]
    async fn request_base_overrides_settings_base() {
        let mut connector = MockDirectoryConnector::new();
        let mut session = MockDirectorySession::new();
        session
            .expect_search()
            .withf(|base, _, _, _| base == "ou=people,dc=example,dc=com")
            .returning(|_, _, _, _| Ok(Vec::new()));
        session.expect_unbind().returning(|| Ok(()));
        connector
            .expect_open()
            .return_once(move |_| Ok(Box::new(session)));

        let settings = LdapSettings::new("ldap1", 389)
            .unwrap()
            .with_base("dc=example,dc=com");
        let client = LdapQueryClient::with_connector(settings, Box::new(connector));
        let request = SearchRequest::new("").with_base("ou=people,dc=example,dc=com");
        assert!(client.query(request).await.unwrap().success);
    }

    #[tokio::test]
    async fn empty_filter_searches_for_everything() {
        let mut connector = MockDirectoryConnector::new();
        let mut session = MockDirectorySession::new();
        session
            .expect_search()
            .withf(|base, _, filter, _| base.is_empty() && filter == "(objectClass=*)")
            .returning(|_, _, _, _| Ok(Vec::new()));
        session.expect_unbind().returning(|| Ok(()));
        connector
            .expect_open()
            .return_once(move |_| Ok(Box::new(session)));

        let client = LdapQueryClient::with_connector(sample_settings(), Box::new(connector));
        assert!(client.query(SearchRequest::default()).await.unwrap().success);
    }

    #[tokio::test]
    async fn repeated_queries_return_equal_results() {
        let mut connector = MockDirectoryConnector::new();
        for _ in 0..2 {
            let mut session = MockDirectorySession::new();
            session.expect_search().returning(|_, _, _, _| {
                Ok(vec![directory_entry(
                    "uid=jdoe,dc=example,dc=com",
                    &[("uid", &["jdoe"]), ("cn", &["Jane Doe"])],
                )])
            });
            session.expect_unbind().returning(|| Ok(()));
            connector
                .expect_open()
                .times(1)
                .return_once(move |_| Ok(Box::new(session)));
        }

        let client = LdapQueryClient::with_connector(sample_settings(), Box::new(connector));
        let request = SearchRequest::new("(uid=jdoe)").with_attributes(["uid", "cn"]);
        let first = client.query(request.clone()).await.unwrap();
        let second = client.query(request).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn unbind_failure_does_not_change_the_outcome() {
        let mut connector = MockDirectoryConnector::new();
        let mut session = MockDirectorySession::new();
        session
            .expect_search()
            .returning(|_, _, _, _| Ok(vec![directory_entry("uid=j", &[("uid", &["j"])])]));
        session
            .expect_unbind()
            .returning(|| Err(Error::ConnectionFailed("broken pipe".to_string())));
        connector
            .expect_open()
            .return_once(move |_| Ok(Box::new(session)));

        let client = LdapQueryClient::with_connector(sample_settings(), Box::new(connector));
        let result = client.query(SearchRequest::new("")).await.unwrap();
        assert!(result.success);
        assert_eq!(result.data.unwrap().len(), 1);
    }
}
