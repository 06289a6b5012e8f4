//! Monitoring services (`monitor.yaml`)

use crate::error::{Error, Result};
use crate::record::{ConfigKind, ConfigRecord, scalar_to_string, service_id};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// One monitoring component on one host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorConfig {
    pub id: String,
    pub host: String,
    /// prometheus, grafana or node_exporter
    pub role: String,
    pub image: String,
    pub listen_port: u16,
    pub config: BTreeMap<String, String>,
}

impl MonitorConfig {
    pub fn container_name(&self) -> String {
        format!("curve-monitor-{}-{}", self.role, self.id)
    }
}

impl ConfigRecord for MonitorConfig {
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
        match key {
            "container_image" => Some(&self.image),
            _ => self.config.get(key).map(String::as_str),
        }
    }

    fn kind(&self) -> ConfigKind {
        ConfigKind::Monitor
    }
}

const MONITOR_ROLES: [&str; 3] = ["prometheus", "grafana", "node_exporter"];

#[derive(Debug, Deserialize)]
struct RawMonitors {
    monitors: Vec<RawMonitor>,
}

#[derive(Debug, Deserialize)]
struct RawMonitor {
    role: String,
    host: String,
    container_image: String,
    listen_port: u16,
    #[serde(default)]
    config: serde_yaml::Mapping,
}

/// Parse `monitor.yaml` content
pub fn parse_monitors(content: &str) -> Result<Vec<MonitorConfig>> {
    let raw: RawMonitors = serde_yaml::from_str(content)?;
    raw.monitors
        .into_iter()
        .map(|m| {
            if !MONITOR_ROLES.contains(&m.role.as_str()) {
                return Err(Error::UnknownRole(m.role));
            }
            let mut config = BTreeMap::new();
            for (key, value) in &m.config {
                if let (Some(k), Some(v)) = (scalar_to_string(key), scalar_to_string(value)) {
                    config.insert(k, v);
                }
            }
            Ok(MonitorConfig {
                id: service_id(&[&m.role, &m.host, &m.listen_port.to_string()]),
                host: m.host,
                role: m.role,
                image: m.container_image,
                listen_port: m.listen_port,
                config,
            })
        })
        .collect()
}

/// Load and parse `monitor.yaml`
pub fn load_monitors(path: &Path) -> Result<Vec<MonitorConfig>> {
    if !path.exists() {
        return Err(Error::FileNotFound(path.to_path_buf()));
    }
    parse_monitors(&std::fs::read_to_string(path)?)
}
