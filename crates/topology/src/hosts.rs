//! Host directory (`hosts.yaml`): host name -> SSH parameters

use crate::error::{Error, Result};
use crate::record::GenericConfig;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// How to reach one host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostConfig {
    pub host: String,
    pub hostname: String,
    pub user: String,
    pub ssh_port: u16,
    pub private_key_file: Option<String>,
    pub forward_agent: bool,
    /// Run remote commands as this user via `sudo -iu`
    pub become_user: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawGlobal {
    user: Option<String>,
    ssh_port: Option<u16>,
    private_key_file: Option<String>,
    forward_agent: Option<bool>,
    become_user: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawHost {
    host: String,
    hostname: String,
    user: Option<String>,
    ssh_port: Option<u16>,
    private_key_file: Option<String>,
    forward_agent: Option<bool>,
    become_user: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawHosts {
    #[serde(default)]
    global: RawGlobal,
    hosts: Vec<RawHost>,
}

/// All known hosts, keyed by name
#[derive(Debug, Clone, Default)]
pub struct HostDirectory {
    hosts: BTreeMap<String, HostConfig>,
    order: Vec<String>,
}

impl HostDirectory {
    pub fn parse(content: &str) -> Result<Self> {
        let raw: RawHosts = serde_yaml::from_str(content)?;
        let mut directory = Self::default();

        for item in raw.hosts {
            if directory.hosts.contains_key(&item.host) {
                return Err(Error::InvalidValue {
                    field: "host".to_string(),
                    value: format!("{} (duplicate)", item.host),
                });
            }
            let user = item
                .user
                .or_else(|| raw.global.user.clone())
                .ok_or_else(|| Error::MissingField {
                    field: "user".to_string(),
                    context: format!("host {}", item.host),
                })?;

            let cfg = HostConfig {
                host: item.host.clone(),
                hostname: item.hostname,
                user,
                ssh_port: item.ssh_port.or(raw.global.ssh_port).unwrap_or(22),
                private_key_file: item
                    .private_key_file
                    .or_else(|| raw.global.private_key_file.clone()),
                forward_agent: item
                    .forward_agent
                    .or(raw.global.forward_agent)
                    .unwrap_or(false),
                become_user: item.become_user.or_else(|| raw.global.become_user.clone()),
            };
            directory.order.push(item.host.clone());
            directory.hosts.insert(item.host, cfg);
        }

        Ok(directory)
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::FileNotFound(path.to_path_buf()));
        }
        Self::parse(&std::fs::read_to_string(path)?)
    }

    /// Resolve a host name to its SSH parameters
    pub fn resolve(&self, host: &str) -> Result<&HostConfig> {
        self.hosts
            .get(host)
            .ok_or_else(|| Error::HostNotFound(host.to_string()))
    }

    /// Hosts in file order
    pub fn iter(&self) -> impl Iterator<Item = &HostConfig> {
        self.order.iter().filter_map(|h| self.hosts.get(h))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Project each host as a generic record, e.g. for reachability checks
    pub fn as_generic_configs(&self) -> Vec<GenericConfig> {
        self.iter()
            .map(|h| {
                GenericConfig::new(&h.host, "host")
                    .with_attribute("hostname", &h.hostname)
                    .with_attribute("user", &h.user)
            })
            .collect()
    }
}
