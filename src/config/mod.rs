//! Config module.
//! Provides configuration types, default paths and XML loading for the
//! `atomic_replace` binary. The writer itself takes no configuration.

pub mod paths;
pub mod types;
pub mod xml;

pub use paths::{CONFIG_ENV_VAR, default_config_path, default_log_path, path_has_symlink_ancestor};
pub use types::{Config, LogLevel};
pub use xml::{load_config, load_config_from_xml_path};
