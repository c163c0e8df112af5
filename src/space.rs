use std::collections::HashMap;

use serde::{Deserialize, Serialize};

pub const SPACE_PREFIX: &str = "space:";
pub const EXCLUDE_MARKER: &str = "!";
pub const WILDCARD_MARKER: &str = "*";

/// What to do with a `space:<id>` resource when copying it to the destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Directive<'a> {
    /// Drop the whole application grant containing the resource.
    Exclude,
    Wildcard,
    RenameTo(&'a str),
    Passthrough,
}

impl<'a> Directive<'a> {
    /// Destination resource for a source `space:<id>` resource, or None for Exclude.
    pub fn rewrite(&self, resource: &str) -> Option<String> {
        match self {
            Directive::Exclude => None,
            Directive::Wildcard => Some(format!("{}{}", SPACE_PREFIX, WILDCARD_MARKER)),
            Directive::RenameTo(dest) => Some(format!("{}{}", SPACE_PREFIX, dest)),
            Directive::Passthrough => Some(resource.to_string()),
        }
    }
}

/// Source space id -> directive string ("!", "*", or a destination space id).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct SpaceMappingTable {
    entries: HashMap<String, String>,
}

impl SpaceMappingTable {

    pub fn get(&self, source_space_id: &str) -> Option<&str> {
        self.entries.get(source_space_id).map(|s| s.as_str())
    }

    pub fn len(&self) -> usize { self.entries.len() }

    pub fn is_empty(&self) -> bool { self.entries.is_empty() }

    /// Parse a JSON object of string values, e.g. `{"marketing": "mkt", "legacy": "!"}`.
    pub fn from_json_str(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for SpaceMappingTable {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self { entries: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect() }
    }
}

/// Decide how a source space id is carried over. Total: absence is Passthrough.
/// An empty mapping value is treated the same as a missing one.
pub fn decide<'t>(source_space_id: &str, table: &'t SpaceMappingTable) -> Directive<'t> {
    match table.get(source_space_id) {
        Some(EXCLUDE_MARKER) => Directive::Exclude,
        Some(WILDCARD_MARKER) => Directive::Wildcard,
        Some(dest) if !dest.is_empty() => Directive::RenameTo(dest),
        _ => Directive::Passthrough,
    }
}

/// Space id of a `space:<id>` resource, None for any other resource string.
#[inline]
pub fn space_id(resource: &str) -> Option<&str> { resource.strip_prefix(SPACE_PREFIX) }

#[cfg(test)]
#[path = "space_tests.rs"]
mod tests;
