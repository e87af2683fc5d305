//! Command-line front end
//!
//! Runs uploads against a JSON snapshot store so spreadsheets can be
//! checked and applied outside the web console.

pub mod commands;
pub mod error;

pub use error::CliError;
