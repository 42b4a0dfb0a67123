//! Grok CLI — run processing profiles against transcripts from the command line.
//!
//! The binary in `main.rs` only parses arguments and sets up logging; the
//! command implementations live here so integration tests can drive them.

pub mod cli;
pub mod commands;

pub use cli::{Cli, Commands, ProfileAction, ProviderAction};
