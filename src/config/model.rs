// src/config/model.rs

use std::time::Duration;

use serde::Deserialize;

use crate::dag::MaterializeOptions;

/// Runtime configuration as read from a TOML file.
///
/// ```toml
/// [materialize]
/// timeout = "30s"
/// reject_duplicate_names = true
/// detect_cycles = true
///
/// [logging]
/// level = "info"
/// ```
///
/// All sections are optional. Deserialize into this, then convert with
/// `ConfigFile::try_from` to get validated values.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawConfigFile {
    #[serde(default)]
    pub materialize: RawMaterializeSection,

    #[serde(default)]
    pub logging: RawLoggingSection,
}

/// `[materialize]` section, unvalidated.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawMaterializeSection {
    /// Duration string such as `"500ms"`, `"30s"`, `"5m"` or `"1h"`.
    #[serde(default)]
    pub timeout: Option<String>,

    #[serde(default = "default_true")]
    pub reject_duplicate_names: bool,

    #[serde(default = "default_true")]
    pub detect_cycles: bool,
}

impl Default for RawMaterializeSection {
    fn default() -> Self {
        Self {
            timeout: None,
            reject_duplicate_names: true,
            detect_cycles: true,
        }
    }
}

/// `[logging]` section, unvalidated.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawLoggingSection {
    /// `error`, `warn`, `info`, `debug` or `trace`.
    #[serde(default)]
    pub level: Option<String>,
}

fn default_true() -> bool {
    true
}

/// Validated configuration. Only constructed through
/// `TryFrom<RawConfigFile>` or [`ConfigFile::default`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigFile {
    pub materialize: MaterializeSection,
    pub logging: LoggingSection,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaterializeSection {
    pub timeout: Option<Duration>,
    pub reject_duplicate_names: bool,
    pub detect_cycles: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoggingSection {
    pub level: Option<tracing::Level>,
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self::new_unchecked(
            MaterializeSection {
                timeout: None,
                reject_duplicate_names: true,
                detect_cycles: true,
            },
            LoggingSection::default(),
        )
    }
}

impl ConfigFile {
    pub(crate) fn new_unchecked(materialize: MaterializeSection, logging: LoggingSection) -> Self {
        Self {
            materialize,
            logging,
        }
    }

    /// Options for [`ResourceGraph::materialize_with`](crate::ResourceGraph::materialize_with).
    pub fn materialize_options(&self) -> MaterializeOptions {
        MaterializeOptions {
            reject_duplicate_names: self.materialize.reject_duplicate_names,
            detect_cycles: self.materialize.detect_cycles,
            timeout: self.materialize.timeout,
        }
    }
}
