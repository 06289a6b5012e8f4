//! Client mounts (`client.yaml`)

use crate::error::{Error, Result};
use crate::record::{CLIENT_ROLE, ConfigKind, ConfigRecord, scalar_to_string, service_id};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// One filesystem mount on one host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    pub id: String,
    pub host: String,
    pub fs_name: String,
    pub mount_point: String,
    pub image: String,
    /// Metadata service addresses, comma separated
    pub mds_addrs: String,
    pub config: BTreeMap<String, String>,
}

impl ClientConfig {
    pub fn container_name(&self) -> String {
        format!("curvefs-client-{}", self.id)
    }
}

impl ConfigRecord for ClientConfig {
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
        CLIENT_ROLE
    }

    fn attribute(&self, key: &str) -> Option<&str> {
        match key {
            "fs_name" => Some(&self.fs_name),
            "mount_point" => Some(&self.mount_point),
            "container_image" => Some(&self.image),
            "mds_addrs" => Some(&self.mds_addrs),
            _ => self.config.get(key).map(String::as_str),
        }
    }

    fn kind(&self) -> ConfigKind {
        ConfigKind::Client
    }
}

#[derive(Debug, Deserialize)]
struct RawClients {
    container_image: String,
    mds_addrs: String,
    #[serde(default)]
    config: serde_yaml::Mapping,
    #[serde(default)]
    mounts: Vec<RawMount>,
}

#[derive(Debug, Deserialize)]
struct RawMount {
    host: String,
    fs_name: String,
    mount_point: String,
}

/// Parse `client.yaml` content into one record per mount
pub fn parse_clients(content: &str) -> Result<Vec<ClientConfig>> {
    let raw: RawClients = serde_yaml::from_str(content)?;
    if raw.mds_addrs.trim().is_empty() {
        return Err(Error::MissingField {
            field: "mds_addrs".to_string(),
            context: "client.yaml".to_string(),
        });
    }

    let mut config = BTreeMap::new();
    for (key, value) in &raw.config {
        let (Some(k), Some(v)) = (scalar_to_string(key), scalar_to_string(value)) else {
            return Err(Error::InvalidValue {
                field: "config".to_string(),
                value: format!("{key:?}"),
            });
        };
        config.insert(k, v);
    }

    raw.mounts
        .into_iter()
        .map(|m| {
            if !m.mount_point.starts_with('/') {
                return Err(Error::InvalidValue {
                    field: "mount_point".to_string(),
                    value: m.mount_point,
                });
            }
            Ok(ClientConfig {
                id: service_id(&[CLIENT_ROLE, &m.host, &m.mount_point]),
                host: m.host,
                fs_name: m.fs_name,
                mount_point: m.mount_point,
                image: raw.container_image.clone(),
                mds_addrs: raw.mds_addrs.clone(),
                config: config.clone(),
            })
        })
        .collect()
}

/// Load and parse `client.yaml`
pub fn load_clients(path: &Path) -> Result<Vec<ClientConfig>> {
    if !path.exists() {
        return Err(Error::FileNotFound(path.to_path_buf()));
    }
    parse_clients(&std::fs::read_to_string(path)?)
}
