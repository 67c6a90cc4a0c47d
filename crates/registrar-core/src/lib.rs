pub mod config;
pub mod parse;
pub mod types;

pub use config::{ConfigError, RegistrarConfig};
pub use parse::{parse_bool, parse_duration};
pub use types::*;
