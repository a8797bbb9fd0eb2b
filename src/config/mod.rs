// src/config/mod.rs

//! Runtime configuration (`Statecraft.toml`).
//!
//! - `model.rs`: raw TOML shapes and the validated [`ConfigFile`].
//! - `loader.rs`: reading files from disk.
//! - `validate.rs`: `RawConfigFile` -> `ConfigFile` conversion.

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{default_config_path, load_and_validate, load_from_path, load_or_default};
pub use model::{ConfigFile, LoggingSection, MaterializeSection, RawConfigFile};
pub use validate::parse_duration;
