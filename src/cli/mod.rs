//! CLI module for the catalog migration tool.
//!
//! This module provides the command-line interface for migrating and
//! removing catalog objects.

mod commands;
mod output;

pub use commands::{Cli, Commands, LogFormatArg, OutputFormat};
pub use output::OutputFormatter;
