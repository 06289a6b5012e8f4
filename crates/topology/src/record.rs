//! The record view shared by every config kind

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Role name used by client records. Service-only steps skip it.
pub const CLIENT_ROLE: &str = "client";

/// Which parser produced a record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConfigKind {
    Deploy,
    Client,
    Monitor,
    Generic,
}

impl ConfigKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Deploy => "deploy",
            Self::Client => "client",
            Self::Monitor => "monitor",
            Self::Generic => "generic",
        }
    }
}

impl fmt::Display for ConfigKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fields every config record exposes, whatever parser produced it
pub trait ConfigRecord {
    /// Stable service id
    fn id(&self) -> &str;

    /// Id of the record this one is an instance of (itself when standalone)
    fn parent_id(&self) -> &str;

    /// Host name as listed in the host directory
    fn host(&self) -> &str;

    /// Role name (e.g. "mds", "client", "prometheus")
    fn role(&self) -> &str;

    /// Attribute lookup
    fn attribute(&self, key: &str) -> Option<&str>;

    fn kind(&self) -> ConfigKind;
}

/// An opaque record with only the common fields
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenericConfig {
    pub id: String,
    pub host: String,
    pub role: String,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

impl GenericConfig {
    pub fn new(host: impl Into<String>, role: impl Into<String>) -> Self {
        let host = host.into();
        let role = role.into();
        let id = service_id(&[&role, &host]);
        Self {
            id,
            host,
            role,
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }
}

impl ConfigRecord for GenericConfig {
    fn id(&self) -> &str {
        &self.id
    }

    fn parent_id(&self) -> &str {
        &self.id
    }

    fn host(&self) -> &str {
        &self.host
    }

    fn role(&self) -> &str {
        &self.role
    }

    fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    fn kind(&self) -> ConfigKind {
        ConfigKind::Generic
    }
}

/// Derive a 12 hex char service id from its identifying parts
pub fn service_id(parts: &[&str]) -> String {
    let joined = parts.join("_");
    let digest = blake3::hash(joined.as_bytes());
    digest.to_hex()[..12].to_string()
}

/// Render a YAML scalar as the string the services expect in their config
pub(crate) fn scalar_to_string(value: &serde_yaml::Value) -> Option<String> {
    match value {
        serde_yaml::Value::String(s) => Some(s.clone()),
        serde_yaml::Value::Number(n) => Some(n.to_string()),
        serde_yaml::Value::Bool(b) => Some(b.to_string()),
        serde_yaml::Value::Null => Some(String::new()),
        _ => None,
    }
}
