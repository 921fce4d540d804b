// src/config/mod.rs

//! Configuration: TOML model, loading, and validation into engine types.
//!
//! [`model`] mirrors the file; [`validate`] turns it into a [`ConfigFile`]
//! holding ready-to-register [`Rule`](crate::rule::Rule)s, so nothing
//! invalid ever reaches the dispatcher.

pub mod duration;
pub mod loader;
pub mod model;
pub mod validate;

pub use duration::parse_duration;
pub use loader::{DEFAULT_CONFIG_PATH, load_and_validate, load_from_path};
pub use model::{ConfigFile, EngineSettings, RawConfigFile, Schedule};
