//! Cluster topology: one `DeployConfig` per service instance

use crate::error::{Error, Result};
use crate::record::{ConfigKind, ConfigRecord, scalar_to_string, service_id};
use crate::vars;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

pub const KEY_IMAGE: &str = "container_image";
pub const KEY_DATA_DIR: &str = "data_dir";
pub const KEY_LOG_DIR: &str = "log_dir";
pub const KEY_LISTEN_PORT: &str = "listen.port";

/// Flavour of the cluster; decides which roles may appear
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ClusterKind {
    /// Block storage: etcd, mds, chunkserver, snapshotclone
    CurveBs,
    /// Filesystem: etcd, mds, metaserver
    CurveFs,
}

impl ClusterKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CurveBs => "curvebs",
            Self::CurveFs => "curvefs",
        }
    }

    /// Roles in the order services must be brought up
    pub fn roles(&self) -> &'static [Role] {
        match self {
            Self::CurveBs => &[Role::Etcd, Role::Mds, Role::Chunkserver, Role::Snapshotclone],
            Self::CurveFs => &[Role::Etcd, Role::Mds, Role::Metaserver],
        }
    }

    pub fn allows(&self, role: Role) -> bool {
        self.roles().contains(&role)
    }
}

impl FromStr for ClusterKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "curvebs" => Ok(Self::CurveBs),
            "curvefs" => Ok(Self::CurveFs),
            other => Err(Error::UnsupportedKind(other.to_string())),
        }
    }
}

impl fmt::Display for ClusterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Long-running service role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Role {
    Etcd,
    Mds,
    Chunkserver,
    Snapshotclone,
    Metaserver,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Etcd => "etcd",
            Self::Mds => "mds",
            Self::Chunkserver => "chunkserver",
            Self::Snapshotclone => "snapshotclone",
            Self::Metaserver => "metaserver",
        }
    }

    /// Port used when the topology does not set `listen.port`
    pub fn default_port(&self) -> u16 {
        match self {
            Self::Etcd => 2380,
            Self::Mds => 6700,
            Self::Chunkserver => 8200,
            Self::Snapshotclone => 5555,
            Self::Metaserver => 6800,
        }
    }

    fn section(&self) -> &'static str {
        match self {
            Self::Etcd => "etcd_services",
            Self::Mds => "mds_services",
            Self::Chunkserver => "chunkserver_services",
            Self::Snapshotclone => "snapshotclone_services",
            Self::Metaserver => "metaserver_services",
        }
    }
}

impl FromStr for Role {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "etcd" => Ok(Self::Etcd),
            "mds" => Ok(Self::Mds),
            "chunkserver" => Ok(Self::Chunkserver),
            "snapshotclone" => Ok(Self::Snapshotclone),
            "metaserver" => Ok(Self::Metaserver),
            other => Err(Error::UnknownRole(other.to_string())),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One service instance on one host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployConfig {
    pub kind: ClusterKind,
    pub role: Role,
    pub host: String,
    /// Position of this host among the role's deploy entries
    pub host_sequence: usize,
    /// Position of this instance on its host
    pub instance: usize,
    /// Instances declared for this host
    pub instances: usize,
    pub id: String,
    pub parent_id: String,
    /// Rendered service config (global < role < host entry)
    pub config: BTreeMap<String, String>,
}

impl DeployConfig {
    pub fn image(&self) -> Option<&str> {
        self.get(KEY_IMAGE)
    }

    pub fn data_dir(&self) -> Option<&str> {
        self.get(KEY_DATA_DIR)
    }

    pub fn log_dir(&self) -> Option<&str> {
        self.get(KEY_LOG_DIR)
    }

    pub fn listen_port(&self) -> u16 {
        self.get(KEY_LISTEN_PORT)
            .and_then(|p| p.parse().ok())
            .unwrap_or_else(|| self.role.default_port() + self.instance as u16)
    }

    /// Name of the container running this instance
    pub fn container_name(&self) -> String {
        format!("{}-{}-{}", self.kind, self.role, self.id)
    }

    /// Short human name, e.g. `mds_host1_0_1`
    pub fn name(&self) -> String {
        format!(
            "{}_{}_{}_{}",
            self.role, self.host, self.host_sequence, self.instance
        )
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.config.get(key).map(String::as_str).filter(|v| !v.is_empty())
    }
}

impl ConfigRecord for DeployConfig {
    fn id(&self) -> &str {
        &self.id
    }

    fn parent_id(&self) -> &str {
        &self.parent_id
    }

    fn host(&self) -> &str {
        &self.host
    }

    fn role(&self) -> &str {
        self.role.as_str()
    }

    fn attribute(&self, key: &str) -> Option<&str> {
        self.get(key)
    }

    fn kind(&self) -> ConfigKind {
        ConfigKind::Deploy
    }
}

// ============================================================================
// Parsing
// ============================================================================

#[derive(Debug, Deserialize)]
struct RawTopology {
    kind: String,
    #[serde(default)]
    global: serde_yaml::Mapping,
    #[serde(flatten)]
    sections: BTreeMap<String, RawServices>,
}

#[derive(Debug, Deserialize)]
struct RawServices {
    #[serde(default)]
    config: serde_yaml::Mapping,
    #[serde(default)]
    deploy: Vec<RawDeploy>,
}

#[derive(Debug, Deserialize)]
struct RawDeploy {
    host: String,
    #[serde(default = "default_instances")]
    instances: usize,
    #[serde(default)]
    config: serde_yaml::Mapping,
}

fn default_instances() -> usize {
    1
}

/// Parsed cluster topology
#[derive(Debug, Clone)]
pub struct Topology {
    pub kind: ClusterKind,
    configs: Vec<DeployConfig>,
}

impl Topology {
    /// Load a topology file
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::FileNotFound(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse topology YAML
    pub fn parse(content: &str) -> Result<Self> {
        let raw: RawTopology = serde_yaml::from_str(content)?;
        let kind: ClusterKind = raw.kind.parse()?;

        let mut global_vars = BTreeMap::new();
        let mut global_config = BTreeMap::new();
        for (key, value) in &raw.global {
            let key = mapping_key(key)?;
            if key == "variable" {
                let serde_yaml::Value::Mapping(variables) = value else {
                    return Err(Error::InvalidValue {
                        field: "global.variable".to_string(),
                        value: format!("{value:?}"),
                    });
                };
                global_vars = to_string_map(variables, "global.variable")?;
            } else {
                let rendered = scalar_to_string(value).ok_or_else(|| Error::InvalidValue {
                    field: format!("global.{key}"),
                    value: format!("{value:?}"),
                })?;
                global_config.insert(key, rendered);
            }
        }

        for section in raw.sections.keys() {
            let known = kind.roles().iter().any(|r| r.section() == section);
            if !known {
                let role = section.trim_end_matches("_services");
                return Err(Error::RoleNotAllowed {
                    kind: kind.to_string(),
                    role: role.to_string(),
                });
            }
        }

        let mut configs = Vec::new();
        for role in kind.roles() {
            let Some(services) = raw.sections.get(role.section()) else {
                continue;
            };
            let role_config = to_string_map(&services.config, role.section())?;

            for (host_sequence, item) in services.deploy.iter().enumerate() {
                let host = vars::render(item.host.trim(), &global_vars)?;
                if host.is_empty() {
                    return Err(Error::MissingField {
                        field: "host".to_string(),
                        context: format!("{}[{host_sequence}]", role.section()),
                    });
                }
                if item.instances == 0 {
                    return Err(Error::InvalidValue {
                        field: format!("{}[{host_sequence}].instances", role.section()),
                        value: "0".to_string(),
                    });
                }
                let host_config = to_string_map(&item.config, role.section())?;
                let parent_id = instance_id(*role, &host, host_sequence, 0);

                for instance in 0..item.instances {
                    let mut scope = global_vars.clone();
                    scope.insert("service_role".to_string(), role.to_string());
                    scope.insert("service_host".to_string(), host.clone());
                    scope.insert(
                        "service_host_sequence".to_string(),
                        host_sequence.to_string(),
                    );
                    scope.insert(
                        "service_instances_sequence".to_string(),
                        instance.to_string(),
                    );

                    let mut config = BTreeMap::new();
                    for (key, value) in global_config
                        .iter()
                        .chain(role_config.iter())
                        .chain(host_config.iter())
                    {
                        config.insert(key.clone(), vars::render(value, &scope)?);
                    }

                    configs.push(DeployConfig {
                        kind,
                        role: *role,
                        host: host.clone(),
                        host_sequence,
                        instance,
                        instances: item.instances,
                        id: instance_id(*role, &host, host_sequence, instance),
                        parent_id: parent_id.clone(),
                        config,
                    });
                }
            }
        }

        if configs.is_empty() {
            return Err(Error::EmptyTopology);
        }

        Ok(Self { kind, configs })
    }

    /// Every service instance, in bring-up order
    pub fn deploy_configs(&self) -> &[DeployConfig] {
        &self.configs
    }

    /// Instances of one role
    pub fn by_role(&self, role: Role) -> Vec<DeployConfig> {
        self.configs
            .iter()
            .filter(|c| c.role == role)
            .cloned()
            .collect()
    }

    /// Distinct hosts, in first-appearance order
    pub fn hosts(&self) -> Vec<String> {
        let mut hosts: Vec<String> = Vec::new();
        for cfg in &self.configs {
            if !hosts.contains(&cfg.host) {
                hosts.push(cfg.host.clone());
            }
        }
        hosts
    }
}

fn instance_id(role: Role, host: &str, host_sequence: usize, instance: usize) -> String {
    service_id(&[
        role.as_str(),
        host,
        &host_sequence.to_string(),
        &instance.to_string(),
    ])
}

fn mapping_key(key: &serde_yaml::Value) -> Result<String> {
    scalar_to_string(key).ok_or_else(|| Error::InvalidValue {
        field: "key".to_string(),
        value: format!("{key:?}"),
    })
}

fn to_string_map(mapping: &serde_yaml::Mapping, context: &str) -> Result<BTreeMap<String, String>> {
    let mut out = BTreeMap::new();
    for (key, value) in mapping {
        let key = mapping_key(key)?;
        let value = scalar_to_string(value).ok_or_else(|| Error::InvalidValue {
            field: format!("{context}.{key}"),
            value: format!("{value:?}"),
        })?;
        out.insert(key, value);
    }
    Ok(out)
}
