//! Configuration module for linkcheck
//!
//! The crawler is driven by a [`Config`] value that callers can construct
//! programmatically. The CLI builds one from a TOML file; see
//! [`load_config`] for the file format.

mod parser;
mod types;
mod validation;

pub use parser::load_config;
pub use types::{Config, FileConfig, ProgressFn};
pub use validation::validate;
