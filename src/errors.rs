// src/errors.rs

//! Crate-wide error aliases and helpers.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StatecraftError {
    #[error("could not determine if materialization should be skipped for {resource}: {source:#}")]
    SkipCheck {
        resource: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("could not materialize resource {resource}: {source:#}")]
    Materialize {
        resource: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("resource {resource} panicked during evaluation")]
    Panicked { resource: String },

    #[error("materialization canceled")]
    Cancelled,

    #[error("Duplicate resource name: {0}")]
    DuplicateName(String),

    #[error("Unknown resource: {0}")]
    UnknownResource(String),

    #[error("Cycle detected in resource graph: {0}")]
    DagCycle(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),
}

impl StatecraftError {
    /// Name of the resource a run-time failure is attributed to, if any.
    pub fn resource(&self) -> Option<&str> {
        match self {
            StatecraftError::SkipCheck { resource, .. }
            | StatecraftError::Materialize { resource, .. }
            | StatecraftError::Panicked { resource } => Some(resource),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, StatecraftError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_run_failures_name_a_resource() {
        let io: StatecraftError = std::io::Error::other("disk gone").into();
        assert!(matches!(io, StatecraftError::IoError(_)));
        assert_eq!(io.resource(), None);
        assert_eq!(StatecraftError::Cancelled.resource(), None);

        let failed = StatecraftError::Materialize {
            resource: "web·config".to_string(),
            source: anyhow::anyhow!("permission denied"),
        };
        assert_eq!(failed.resource(), Some("web·config"));
        assert_eq!(
            failed.to_string(),
            "could not materialize resource web·config: permission denied"
        );
    }
}
