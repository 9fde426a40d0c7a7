//! Normalized directory entries.
//!
//! Entries are ordered mappings from attribute name to a list of string
//! values. Order is part of the contract: identical queries against an
//! unchanged directory produce structurally identical entries.

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
#[cfg(feature = "netldap")]
use std::collections::HashMap;
use std::fmt;

/// Attribute name under which an entry's DN is reported.
pub const DN_ATTRIBUTE: &str = "dn";

/// Wire-level entry as returned by the directory server.
#[cfg(feature = "netldap")]
#[derive(Debug, Clone)]
pub(crate) struct RawEntry {
    pub(crate) dn: String,
    pub(crate) attributes: HashMap<String, Vec<String>>,
}

/// A directory entry normalized into an ordered attribute mapping.
///
/// The entry DN appears as a regular `dn` attribute, first in every entry.
/// Attribute lookup matches names case-insensitively, as the protocol does,
/// while stored names keep the case the server returned. Serializes as a
/// JSON object in stored order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DirectoryEntry {
    attributes: Vec<(String, Vec<String>)>,
}

impl DirectoryEntry {
    fn push(&mut self, name: String, values: Vec<String>) {
        self.attributes.push((name, values));
    }

    /// Attribute names in stored order.
    pub fn attribute_names(&self) -> impl Iterator<Item = &str> {
        self.attributes.iter().map(|(name, _)| name.as_str())
    }

    /// Attributes and their values in stored order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.attributes
            .iter()
            .map(|(name, values)| (name.as_str(), values.as_slice()))
    }

    /// All values of the attribute, matched case-insensitively.
    #[must_use]
    pub fn values(&self, attribute: &str) -> Option<&[String]> {
        self.attributes
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(attribute))
            .map(|(_, values)| values.as_slice())
    }

    /// First value of the attribute, matched case-insensitively.
    #[must_use]
    pub fn first(&self, attribute: &str) -> Option<&str> {
        self.values(attribute)
            .and_then(|values| values.first().map(String::as_str))
    }

    /// The entry DN, when present.
    #[must_use]
    pub fn dn(&self) -> Option<&str> {
        self.first(DN_ATTRIBUTE)
    }

    /// Number of attributes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    /// Whether the entry carries no attributes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }
}

impl Serialize for DirectoryEntry {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.attributes.len()))?;
        for (name, values) in &self.attributes {
            map.serialize_entry(name, values)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for DirectoryEntry {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct EntryVisitor;

        impl<'de> Visitor<'de> for EntryVisitor {
            type Value = DirectoryEntry;

            fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
                formatter.write_str("a map of attribute names to lists of values")
            }

            fn visit_map<A>(self, mut access: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut attributes = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some(entry) = access.next_entry::<String, Vec<String>>()? {
                    attributes.push(entry);
                }
                Ok(DirectoryEntry { attributes })
            }
        }

        deserializer.deserialize_map(EntryVisitor)
    }
}

/// Normalizes raw entries in server-delivered order.
///
/// Within each entry, attributes are ordered deterministically: `dn` first,
/// then the requested attributes in request order, then anything else the
/// server returned in lexicographic order.
#[cfg(feature = "netldap")]
pub(crate) fn normalize_entries(raw: Vec<RawEntry>, requested: &[String]) -> Vec<DirectoryEntry> {
    raw.into_iter()
        .map(|entry| normalize_entry(entry, requested))
        .collect()
}

#[cfg(feature = "netldap")]
fn normalize_entry(raw: RawEntry, requested: &[String]) -> DirectoryEntry {
    let mut entry = DirectoryEntry::default();
    entry.push(
        DN_ATTRIBUTE.to_string(),
        vec![strip_line_terminator(&raw.dn).to_string()],
    );

    let mut remaining: Vec<(String, Vec<String>)> = raw
        .attributes
        .into_iter()
        .filter(|(name, _)| !name.eq_ignore_ascii_case(DN_ATTRIBUTE))
        .collect();

    for wanted in requested {
        if wanted.eq_ignore_ascii_case(DN_ATTRIBUTE) {
            continue;
        }
        if let Some(position) = remaining
            .iter()
            .position(|(name, _)| name.eq_ignore_ascii_case(wanted))
        {
            let (name, values) = remaining.swap_remove(position);
            entry.push(name, clean_values(values));
        }
    }

    remaining.sort_by(|(left, _), (right, _)| left.cmp(right));
    for (name, values) in remaining {
        entry.push(name, clean_values(values));
    }

    entry
}

#[cfg(feature = "netldap")]
fn clean_values(values: Vec<String>) -> Vec<String> {
    values
        .into_iter()
        .map(|value| strip_line_terminator(&value).to_string())
        .collect()
}

/// Strips one trailing line terminator (`\r\n`, `\n` or `\r`).
#[cfg(feature = "netldap")]
fn strip_line_terminator(value: &str) -> &str {
    if let Some(stripped) = value.strip_suffix("\r\n") {
        stripped
    } else if let Some(stripped) = value.strip_suffix('\n') {
        stripped
    } else if let Some(stripped) = value.strip_suffix('\r') {
        stripped
    } else {
        value
    }
}
