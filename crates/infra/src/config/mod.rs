//! Configuration loading and validation
//!
//! Environment variables first, then a JSON or TOML file.

pub mod loader;

pub use loader::{load, load_dotenv, load_from_env, load_from_file, probe_config_paths, validate};
