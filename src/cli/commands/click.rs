//! Click CLI command

use std::path::PathBuf;

use super::runtime;
use crate::cli::error::CliError;
use crate::database::{InMemoryStore, record_click};

#[derive(Debug, Clone)]
pub struct ClickArgs {
    pub game_id: String,
    pub store: PathBuf,
    pub by: u32,
}

/// Increment a game's click counter in a snapshot and print the new total
pub fn handle_click(args: &ClickArgs) -> Result<(), CliError> {
    if !args.store.exists() {
        return Err(CliError::FileNotFound(args.store.clone()));
    }
    let store = InMemoryStore::load_json(&args.store)?;
    let total = runtime()?.block_on(record_click(&store, &args.game_id, args.by))?;
    store
        .save_json(&args.store)
        .map_err(|e| CliError::FileWriteError(args.store.clone(), e.to_string()))?;
    println!("{} {}", args.game_id.trim(), total);
    Ok(())
}
