//! # ldapquery-core
//!
//! Core types for querying LDAP directory servers.
//!
//! This crate provides the settings and error types shared by the query
//! client, kept free of any protocol dependency so embedding hosts can
//! construct and validate configuration without pulling in an LDAP stack.
//!
//! ## Modules
//!
//! - [`error`] - Error types, stable error codes and serializable responses
//! - [`settings`] - Connection settings supplied by the embedding host

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod settings;

// Re-export commonly used types
pub use error::{Error, Result};
pub use settings::LdapSettings;
