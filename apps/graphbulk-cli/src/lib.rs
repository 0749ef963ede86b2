//! graphbulk CLI library
//!
//! Exposes the command tree and helpers so integration tests can drive
//! commands without spawning the binary.

pub mod cli;
pub mod commands;
pub mod credentials;
pub mod error;
pub mod input;
pub mod output;
pub mod progress;

pub use cli::{Cli, Commands};
pub use error::{CliError, CliResult};
