//! Query result types returned to the embedding host.

use crate::entry::DirectoryEntry;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Terminal status of a query attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QueryStatus {
    /// A server accepted the bind; the search ran, successfully or not.
    #[serde(rename = "connected")]
    Connected,
    /// Every candidate server refused the connection or bind.
    #[serde(rename = "connection_error")]
    ConnectionError,
    /// The LDAP client backend is not available in this build.
    #[serde(rename = "no_netldap_module")]
    ModuleUnavailable,
}

impl QueryStatus {
    /// String form used in the serialized result.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Connected => "connected",
            Self::ConnectionError => "connection_error",
            Self::ModuleUnavailable => "no_netldap_module",
        }
    }
}

impl fmt::Display for QueryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a directory query.
///
/// Constructed once per call and immutable after it returns. `data` is
/// present only when the search succeeded; a search that matched nothing
/// yields an empty sequence, not an absent one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    /// Whether the query produced data.
    pub success: bool,
    /// Terminal status of the attempt.
    pub status: QueryStatus,
    /// Normalized entries in server-delivered order, present on success.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub data: Option<Vec<DirectoryEntry>>,
}

impl QueryResult {
    /// Result for a successful search over a live connection.
    #[must_use]
    pub fn connected(entries: Vec<DirectoryEntry>) -> Self {
        Self {
            success: true,
            status: QueryStatus::Connected,
            data: Some(entries),
        }
    }

    /// Result for a search that failed after a successful bind.
    #[must_use]
    pub const fn search_failed() -> Self {
        Self {
            success: false,
            status: QueryStatus::Connected,
            data: None,
        }
    }

    /// Result for exhausting every candidate server without a bind.
    #[must_use]
    pub const fn connection_error() -> Self {
        Self {
            success: false,
            status: QueryStatus::ConnectionError,
            data: None,
        }
    }

    /// Result for a build without the LDAP client backend.
    #[must_use]
    pub const fn module_unavailable() -> Self {
        Self {
            success: false,
            status: QueryStatus::ModuleUnavailable,
            data: None,
        }
    }
}
