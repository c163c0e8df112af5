use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::TransformPrecondition;

pub const APPLICATIONS_FIELD: &str = "applications";
pub const KIBANA_APPLICATION_PREFIX: &str = "kibana";

/// Fields the destination cluster assigns itself; never copied across.
pub const CLUSTER_MANAGED_FIELDS: [&str; 3] = ["metadata", "transient_metadata", "_status"];

/// A role definition as returned by the security API. Field order is preserved and
/// everything except `applications` is carried as opaque JSON.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct RoleDocument(Map<String, Value>);

impl RoleDocument {
    pub fn from_value(v: Value) -> Result<Self, TransformPrecondition> {
        match v {
            Value::Object(m) => Ok(Self(m)),
            _ => Err(TransformPrecondition::NotAnObject),
        }
    }

    pub fn get(&self, field: &str) -> Option<&Value> { self.0.get(field) }

    pub fn field_names(&self) -> impl Iterator<Item = &str> { self.0.keys().map(|k| k.as_str()) }

    pub(crate) fn applications_mut(&mut self) -> Option<&mut Value> { self.0.get_mut(APPLICATIONS_FIELD) }

    /// Drop `metadata`, `transient_metadata` and `_status` keeping the order of the rest.
    pub fn strip_cluster_managed(mut self) -> Self {
        for f in CLUSTER_MANAGED_FIELDS {
            self.0.shift_remove(f);
        }
        self
    }

    pub fn as_map(&self) -> &Map<String, Value> { &self.0 }

    pub fn into_value(self) -> Value { Value::Object(self.0) }
}

impl From<RoleDocument> for Value {
    fn from(doc: RoleDocument) -> Self { doc.into_value() }
}

/// Borrowed view of one entry of a role's `applications` list.
#[derive(Debug)]
pub struct ApplicationGrant<'a> {
    fields: &'a mut Map<String, Value>,
}

impl<'a> ApplicationGrant<'a> {
    pub fn new(index: usize, v: &'a mut Value) -> Result<Self, TransformPrecondition> {
        match v {
            Value::Object(fields) => Ok(Self { fields }),
            _ => Err(TransformPrecondition::GrantNotObject { index }),
        }
    }

    /// Empty when the grant carries no string `application`.
    pub fn application(&self) -> &str {
        self.fields.get("application").and_then(|v| v.as_str()).unwrap_or("")
    }

    pub fn is_kibana(&self) -> bool { self.application().starts_with(KIBANA_APPLICATION_PREFIX) }

    /// Raw `resources` entries in order. A grant without `resources` has none.
    /// Entries are left unchecked so callers can stop before reaching a malformed one.
    pub fn resources(&self) -> Result<&[Value], TransformPrecondition> {
        match self.fields.get("resources") {
            None => Ok(&[]),
            Some(Value::Array(items)) => Ok(items.as_slice()),
            Some(_) => Err(TransformPrecondition::ResourcesNotArray { application: self.application().to_string() }),
        }
    }

    pub fn set_resources(&mut self, resources: Vec<String>) {
        let arr = resources.into_iter().map(Value::String).collect();
        self.fields.insert("resources".to_string(), Value::Array(arr));
    }
}

#[cfg(test)]
#[path = "role_tests.rs"]
mod tests;
