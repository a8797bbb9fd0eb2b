#![allow(dead_code)]

use statecraft::config::model::{RawLoggingSection, RawMaterializeSection};
use statecraft::config::{ConfigFile, RawConfigFile};

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile {
                materialize: RawMaterializeSection::default(),
                logging: RawLoggingSection::default(),
            },
        }
    }

    pub fn timeout(mut self, timeout: &str) -> Self {
        self.config.materialize.timeout = Some(timeout.to_string());
        self
    }

    pub fn reject_duplicate_names(mut self, val: bool) -> Self {
        self.config.materialize.reject_duplicate_names = val;
        self
    }

    pub fn detect_cycles(mut self, val: bool) -> Self {
        self.config.materialize.detect_cycles = val;
        self
    }

    pub fn log_level(mut self, level: &str) -> Self {
        self.config.logging.level = Some(level.to_string());
        self
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}
