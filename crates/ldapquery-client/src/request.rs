//! Search request construction and validation.

use crate::Result;
use ldapquery_core::Error;
use std::fmt;
use std::str::FromStr;

/// Filter sent on the wire when a request carries an empty filter.
///
/// An empty filter means "match all objects within base and scope".
pub const MATCH_ALL_FILTER: &str = "(objectClass=*)";

/// Search breadth relative to the base DN.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchScope {
    /// Base object only.
    Base,
    /// One level below the base.
    OneLevel,
    /// Entire subtree.
    Subtree,
}

impl SearchScope {
    /// Token form accepted by [`FromStr`] and produced by [`fmt::Display`].
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Base => "base",
            Self::OneLevel => "one",
            Self::Subtree => "sub",
        }
    }
}

impl FromStr for SearchScope {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        match value {
            "base" => Ok(Self::Base),
            "one" => Ok(Self::OneLevel),
            "sub" => Ok(Self::Subtree),
            other => Err(Error::InvalidScope(other.to_string())),
        }
    }
}

impl fmt::Display for SearchScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Default for SearchScope {
    fn default() -> Self {
        Self::Subtree
    }
}

#[cfg(feature = "netldap")]
impl From<SearchScope> for ldap3::Scope {
    fn from(scope: SearchScope) -> Self {
        match scope {
            SearchScope::Base => Self::Base,
            SearchScope::OneLevel => Self::OneLevel,
            SearchScope::Subtree => Self::Subtree,
        }
    }
}

/// A single directory search.
///
/// `filter` uses RFC 4515 syntax; an empty filter selects every object under
/// `base`. An empty attribute list requests all attributes. A request without
/// a base falls back to the default base DN from the settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchRequest {
    filter: String,
    attributes: Vec<String>,
    base: Option<String>,
    scope: SearchScope,
}

impl SearchRequest {
    /// Creates a request for the given filter with subtree scope, no
    /// requested attributes and no explicit base.
    #[must_use]
    pub fn new(filter: impl Into<String>) -> Self {
        Self {
            filter: filter.into(),
            attributes: Vec::new(),
            base: None,
            scope: SearchScope::default(),
        }
    }

    /// Set the attributes to request, in the order they should appear in
    /// result entries.
    #[must_use]
    pub fn with_attributes<I, S>(mut self, attributes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.attributes = attributes.into_iter().map(Into::into).collect();
        self
    }

    /// Set the base DN for this request.
    #[must_use]
    pub fn with_base(mut self, base: impl Into<String>) -> Self {
        self.base = Some(base.into());
        self
    }

    /// Set the search scope.
    #[must_use]
    pub const fn with_scope(mut self, scope: SearchScope) -> Self {
        self.scope = scope;
        self
    }

    /// Parse and set the search scope from its token form.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidScope`] unless the token is one of `base`,
    /// `one` or `sub`.
    pub fn with_scope_str(self, scope: &str) -> Result<Self> {
        Ok(self.with_scope(scope.parse()?))
    }

    /// The textual filter as supplied by the caller.
    #[must_use]
    pub fn filter(&self) -> &str {
        &self.filter
    }

    /// The filter actually sent on the wire.
    #[must_use]
    pub fn effective_filter(&self) -> &str {
        if self.filter.is_empty() {
            MATCH_ALL_FILTER
        } else {
            &self.filter
        }
    }

    /// Requested attributes, in request order.
    #[must_use]
    pub fn attributes(&self) -> &[String] {
        &self.attributes
    }

    /// Base DN for this request, when set.
    #[must_use]
    pub fn base(&self) -> Option<&str> {
        self.base.as_deref()
    }

    /// Search scope.
    #[must_use]
    pub const fn scope(&self) -> SearchScope {
        self.scope
    }

    /// Check the filter syntax without touching the network.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidFilter`] if the filter is not a valid RFC 4515
    /// expression. An empty filter is valid and selects everything.
    #[cfg(feature = "netldap")]
    pub fn ensure_valid_filter(&self) -> Result<()> {
        if self.filter.is_empty() {
            return Ok(());
        }
        ldap3::parse_filter(&self.filter)
            .map(|_| ())
            .map_err(|_| Error::InvalidFilter(self.filter.clone()))
    }
}
