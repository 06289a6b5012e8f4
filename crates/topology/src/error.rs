//! Error types for the topology crate

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while loading or querying cluster configuration
#[derive(Error, Debug)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML syntax or shape error
    #[error("invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Config file does not exist
    #[error("config file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    /// Unknown cluster kind
    #[error("unsupported cluster kind '{0}' (expected curvebs or curvefs)")]
    UnsupportedKind(String),

    /// Role is not valid for the cluster kind
    #[error("role '{role}' is not part of a {kind} cluster")]
    RoleNotAllowed { kind: String, role: String },

    /// Unknown role name
    #[error("unknown role '{0}'")]
    UnknownRole(String),

    /// `${name}` referenced but never defined
    #[error("undefined variable '{name}' in '{value}'")]
    UndefinedVariable { name: String, value: String },

    /// A required field is missing or empty
    #[error("{field} is required ({context})")]
    MissingField { field: String, context: String },

    /// A field holds a value that cannot be used
    #[error("invalid value for {field}: {value}")]
    InvalidValue { field: String, value: String },

    /// Host not present in the host directory
    #[error("host '{0}' not found in hosts config")]
    HostNotFound(String),

    /// Topology declares no services at all
    #[error("topology declares no services")]
    EmptyTopology,
}

/// Result type for topology operations
pub type Result<T> = std::result::Result<T, Error>;
