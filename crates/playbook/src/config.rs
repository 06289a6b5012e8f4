//! Uniform, positionally indexed view over one homogeneous config list.
//!
//! Upper layers iterate a [`ConfigList`] through [`ConfigRef`] without caring
//! which parser produced it; a task constructor that needs the concrete
//! record asks for it with the kind-specific accessor. Asking for the wrong
//! kind is a step-authoring mistake and is reported as [`Error::KindMismatch`].

use crate::error::{Error, Result};
use topology::{ClientConfig, ConfigKind, ConfigRecord, DeployConfig, GenericConfig, MonitorConfig};

/// A single record of any kind
#[derive(Debug, Clone)]
pub enum ConfigEntry {
    Deploy(DeployConfig),
    Client(ClientConfig),
    Monitor(MonitorConfig),
    Generic(GenericConfig),
}

impl ConfigEntry {
    pub fn kind(&self) -> ConfigKind {
        match self {
            Self::Deploy(_) => ConfigKind::Deploy,
            Self::Client(_) => ConfigKind::Client,
            Self::Monitor(_) => ConfigKind::Monitor,
            Self::Generic(_) => ConfigKind::Generic,
        }
    }
}

/// A homogeneous list of records
#[derive(Debug, Clone)]
pub enum ConfigList {
    Deploy(Vec<DeployConfig>),
    Client(Vec<ClientConfig>),
    Monitor(Vec<MonitorConfig>),
    Generic(Vec<GenericConfig>),
}

/// Borrowed view of one entry of a [`ConfigList`]
#[derive(Debug, Clone, Copy)]
pub enum ConfigRef<'a> {
    Deploy(&'a DeployConfig),
    Client(&'a ClientConfig),
    Monitor(&'a MonitorConfig),
    Generic(&'a GenericConfig),
}

impl ConfigList {
    /// Build a projection from records that must all share one kind.
    ///
    /// An empty input yields an empty generic list.
    pub fn from_entries(entries: Vec<ConfigEntry>) -> Result<Self> {
        let Some(first) = entries.first().map(ConfigEntry::kind) else {
            return Ok(Self::Generic(Vec::new()));
        };
        if let Some(other) = entries.iter().map(ConfigEntry::kind).find(|k| *k != first) {
            return Err(Error::MixedKinds { first, other });
        }

        let list = match first {
            ConfigKind::Deploy => Self::Deploy(
                entries
                    .into_iter()
                    .filter_map(|e| match e {
                        ConfigEntry::Deploy(c) => Some(c),
                        _ => None,
                    })
                    .collect(),
            ),
            ConfigKind::Client => Self::Client(
                entries
                    .into_iter()
                    .filter_map(|e| match e {
                        ConfigEntry::Client(c) => Some(c),
                        _ => None,
                    })
                    .collect(),
            ),
            ConfigKind::Monitor => Self::Monitor(
                entries
                    .into_iter()
                    .filter_map(|e| match e {
                        ConfigEntry::Monitor(c) => Some(c),
                        _ => None,
                    })
                    .collect(),
            ),
            ConfigKind::Generic => Self::Generic(
                entries
                    .into_iter()
                    .filter_map(|e| match e {
                        ConfigEntry::Generic(c) => Some(c),
                        _ => None,
                    })
                    .collect(),
            ),
        };
        Ok(list)
    }

    pub fn kind(&self) -> ConfigKind {
        match self {
            Self::Deploy(_) => ConfigKind::Deploy,
            Self::Client(_) => ConfigKind::Client,
            Self::Monitor(_) => ConfigKind::Monitor,
            Self::Generic(_) => ConfigKind::Generic,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Deploy(v) => v.len(),
            Self::Client(v) => v.len(),
            Self::Monitor(v) => v.len(),
            Self::Generic(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Kind-agnostic access
    pub fn get(&self, index: usize) -> Result<ConfigRef<'_>> {
        let entry = match self {
            Self::Deploy(v) => v.get(index).map(ConfigRef::Deploy),
            Self::Client(v) => v.get(index).map(ConfigRef::Client),
            Self::Monitor(v) => v.get(index).map(ConfigRef::Monitor),
            Self::Generic(v) => v.get(index).map(ConfigRef::Generic),
        };
        entry.ok_or(Error::IndexOutOfRange {
            index,
            len: self.len(),
        })
    }

    pub fn get_deploy(&self, index: usize) -> Result<&DeployConfig> {
        match self {
            Self::Deploy(v) => v.get(index).ok_or(Error::IndexOutOfRange {
                index,
                len: v.len(),
            }),
            _ => Err(self.mismatch(ConfigKind::Deploy)),
        }
    }

    pub fn get_client(&self, index: usize) -> Result<&ClientConfig> {
        match self {
            Self::Client(v) => v.get(index).ok_or(Error::IndexOutOfRange {
                index,
                len: v.len(),
            }),
            _ => Err(self.mismatch(ConfigKind::Client)),
        }
    }

    pub fn get_monitor(&self, index: usize) -> Result<&MonitorConfig> {
        match self {
            Self::Monitor(v) => v.get(index).ok_or(Error::IndexOutOfRange {
                index,
                len: v.len(),
            }),
            _ => Err(self.mismatch(ConfigKind::Monitor)),
        }
    }

    pub fn get_generic(&self, index: usize) -> Result<&GenericConfig> {
        match self {
            Self::Generic(v) => v.get(index).ok_or(Error::IndexOutOfRange {
                index,
                len: v.len(),
            }),
            _ => Err(self.mismatch(ConfigKind::Generic)),
        }
    }

    /// Iterate entries in list order
    pub fn iter(&self) -> impl Iterator<Item = ConfigRef<'_>> {
        (0..self.len()).filter_map(move |i| self.get(i).ok())
    }

    fn mismatch(&self, expected: ConfigKind) -> Error {
        Error::KindMismatch {
            expected,
            actual: self.kind(),
        }
    }
}

impl From<Vec<DeployConfig>> for ConfigList {
    fn from(v: Vec<DeployConfig>) -> Self {
        Self::Deploy(v)
    }
}

impl From<Vec<ClientConfig>> for ConfigList {
    fn from(v: Vec<ClientConfig>) -> Self {
        Self::Client(v)
    }
}

impl From<Vec<MonitorConfig>> for ConfigList {
    fn from(v: Vec<MonitorConfig>) -> Self {
        Self::Monitor(v)
    }
}

impl From<Vec<GenericConfig>> for ConfigList {
    fn from(v: Vec<GenericConfig>) -> Self {
        Self::Generic(v)
    }
}

impl<'a> ConfigRef<'a> {
    fn record(&self) -> &'a dyn ConfigRecord {
        match *self {
            Self::Deploy(c) => c,
            Self::Client(c) => c,
            Self::Monitor(c) => c,
            Self::Generic(c) => c,
        }
    }

    pub fn as_deploy(&self) -> Result<&'a DeployConfig> {
        match *self {
            Self::Deploy(c) => Ok(c),
            _ => Err(Error::KindMismatch {
                expected: ConfigKind::Deploy,
                actual: self.kind(),
            }),
        }
    }

    pub fn as_client(&self) -> Result<&'a ClientConfig> {
        match *self {
            Self::Client(c) => Ok(c),
            _ => Err(Error::KindMismatch {
                expected: ConfigKind::Client,
                actual: self.kind(),
            }),
        }
    }

    pub fn as_monitor(&self) -> Result<&'a MonitorConfig> {
        match *self {
            Self::Monitor(c) => Ok(c),
            _ => Err(Error::KindMismatch {
                expected: ConfigKind::Monitor,
                actual: self.kind(),
            }),
        }
    }

    pub fn as_generic(&self) -> Result<&'a GenericConfig> {
        match *self {
            Self::Generic(c) => Ok(c),
            _ => Err(Error::KindMismatch {
                expected: ConfigKind::Generic,
                actual: self.kind(),
            }),
        }
    }
}

impl ConfigRecord for ConfigRef<'_> {
    fn id(&self) -> &str {
        self.record().id()
    }

    fn parent_id(&self) -> &str {
        self.record().parent_id()
    }

    fn host(&self) -> &str {
        self.record().host()
    }

    fn role(&self) -> &str {
        self.record().role()
    }

    fn attribute(&self, key: &str) -> Option<&str> {
        self.record().attribute(key)
    }

    fn kind(&self) -> ConfigKind {
        self.record().kind()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn generic(host: &str) -> GenericConfig {
        GenericConfig::new(host, "host")
    }

    #[test]
    fn test_len_and_uniform_access() {
        let list = ConfigList::from(vec![generic("a"), generic("b")]);
        assert_eq!(list.len(), 2);
        assert_eq!(list.kind(), ConfigKind::Generic);
        assert_eq!(list.get(1).unwrap().host(), "b");
        let hosts: Vec<&str> = list.iter().map(|c| c.record().host()).collect();
        assert_eq!(hosts, vec!["a", "b"]);
    }

    #[test]
    fn test_kind_specific_accessor_mismatch() {
        let list = ConfigList::from(vec![generic("a")]);
        assert!(list.get_generic(0).is_ok());
        let err = list.get_deploy(0).unwrap_err();
        assert!(matches!(
            err,
            Error::KindMismatch {
                expected: ConfigKind::Deploy,
                actual: ConfigKind::Generic
            }
        ));
        assert!(err.is_construction());
    }

    #[test]
    fn test_out_of_range() {
        let list = ConfigList::from(vec![generic("a")]);
        assert!(matches!(
            list.get(3).unwrap_err(),
            Error::IndexOutOfRange { index: 3, len: 1 }
        ));
        assert!(matches!(
            list.get_generic(1).unwrap_err(),
            Error::IndexOutOfRange { .. }
        ));
    }

    #[test]
    fn test_from_entries_requires_single_kind() {
        let homogeneous = ConfigList::from_entries(vec![
            ConfigEntry::Generic(generic("a")),
            ConfigEntry::Generic(generic("b")),
        ])
        .unwrap();
        assert_eq!(homogeneous.len(), 2);

        let clients = topology::parse_clients(
            "container_image: x\nmds_addrs: a:1\nmounts:\n  - host: h\n    fs_name: f\n    mount_point: /mnt\n",
        )
        .unwrap();
        let mixed = ConfigList::from_entries(vec![
            ConfigEntry::Generic(generic("a")),
            ConfigEntry::Client(clients[0].clone()),
        ]);
        assert!(matches!(mixed.unwrap_err(), Error::MixedKinds { .. }));
    }

    #[test]
    fn test_config_ref_downcast() {
        let list = ConfigList::from(vec![generic("a")]);
        let entry = list.get(0).unwrap();
        assert!(entry.as_generic().is_ok());
        assert!(entry.as_client().is_err());
        assert_eq!(entry.parent_id(), entry.id());
    }
}
