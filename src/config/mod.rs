//! Configuration module for Adwatch
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use adwatch::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("adwatch.toml")).unwrap();
//! println!("Watching for: {:?}", config.search.keywords);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    Config, NotifyConfig, PermutationMode, ScheduleConfig, SearchConfig, StorageConfig,
    TransportConfig,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash};
