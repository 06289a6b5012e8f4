//! # Topology
//!
//! Config records for a storage cluster and the parsers that produce them.
//!
//! - **Deploy**: one [`DeployConfig`] per service instance, expanded from
//!   `topology.yaml`
//! - **Client**: one [`ClientConfig`] per filesystem mount (`client.yaml`)
//! - **Monitor**: one [`MonitorConfig`] per monitoring component (`monitor.yaml`)
//! - **Generic**: [`GenericConfig`], an opaque record with only the common fields
//!
//! Every record implements [`ConfigRecord`], the view the orchestration
//! engine works against. [`HostDirectory`] resolves host names to SSH
//! parameters and [`filter_configs`] selects services by id, role and host.
//!
//! ## Example
//!
//! ```no_run
//! use topology::{FilterOptions, Topology, filter_configs};
//! use std::path::Path;
//!
//! let topology = Topology::load(Path::new("topology.yaml"))?;
//! let mds = filter_configs(topology.deploy_configs(), &FilterOptions::default().role("mds"));
//! for cfg in &mds {
//!     println!("{} on {}", cfg.id, cfg.host);
//! }
//! # Ok::<(), topology::Error>(())
//! ```

mod client;
mod deploy;
mod error;
mod filter;
mod hosts;
mod monitor;
mod record;
mod vars;

pub use client::{ClientConfig, load_clients, parse_clients};
pub use deploy::{
    ClusterKind, DeployConfig, KEY_DATA_DIR, KEY_IMAGE, KEY_LISTEN_PORT, KEY_LOG_DIR, Role,
    Topology,
};
pub use error::{Error, Result};
pub use filter::{FilterOptions, WILDCARD, filter_configs};
pub use hosts::{HostConfig, HostDirectory};
pub use monitor::{MonitorConfig, load_monitors, parse_monitors};
pub use record::{CLIENT_ROLE, ConfigKind, ConfigRecord, GenericConfig, service_id};
