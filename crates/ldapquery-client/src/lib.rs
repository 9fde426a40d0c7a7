//! Failover LDAP query client.
//!
//! This crate runs single-shot searches against a list of directory servers,
//! trying each server in order until one accepts the bind, and returns the
//! matching entries as ordered attribute maps. Callers supply the connection
//! settings and one [`SearchRequest`] per query; every query opens, drives
//! and closes its own connection.
//!
//! ```no_run
//! use ldapquery_client::{LdapQueryClient, SearchRequest, SearchScope};
//! use ldapquery_core::LdapSettings;
//!
//! # async fn run() -> ldapquery_client::Result<()> {
//! let settings = LdapSettings::new("ldap1.example.com,ldap2.example.com", 389)?
//!     .with_base("dc=example,dc=com");
//! let client = LdapQueryClient::new(settings)?;
//!
//! let request = SearchRequest::new("(objectClass=posixAccount)")
//!     .with_attributes(["uid", "cn"])
//!     .with_scope(SearchScope::Subtree);
//! let result = client.query(request).await?;
//! for entry in result.data.unwrap_or_default() {
//!     println!("{:?} {:?}", entry.dn(), entry.values("uid"));
//! }
//! # Ok(())
//! # }
//! ```
//!
//! The `netldap` cargo feature (enabled by default) pulls in the native
//! `ldap3` backend. Without it the crate still compiles and every query
//! reports the `no_netldap_module` status instead of touching the network.

#![deny(missing_docs)]

mod client;
mod config;
#[cfg(feature = "netldap")]
mod conn;
mod entry;
mod request;
mod result;

pub use client::LdapQueryClient;
pub use config::{BindCredentials, ConnectionConfig, TlsConfig, TlsMethod};
pub use entry::{DirectoryEntry, DN_ATTRIBUTE};
pub use ldapquery_core::{Error, LdapSettings};
pub use request::{SearchRequest, SearchScope, MATCH_ALL_FILTER};
pub use result::{QueryResult, QueryStatus};

/// Convenient result alias that reuses the core error type.
pub type Result<T> = ldapquery_core::Result<T>;
