//! Upload CLI command
//!
//! Reads a worksheet file, applies it to a snapshot store and prints the
//! upload report as JSON.

use std::path::PathBuf;

use tracing::info;

use super::{load_config, runtime};
use crate::cli::error::CliError;
use crate::database::InMemoryStore;
use crate::import::{UploadEngine, UploadReport};
use crate::models::EntityKind;

/// Upload command arguments
#[derive(Debug, Clone)]
pub struct UploadArgs {
    pub kind: EntityKind,
    /// Worksheet file (.csv, or a workbook when a parser is registered)
    pub file: PathBuf,
    /// JSON snapshot to read and update; in-memory only when absent
    pub store: Option<PathBuf>,
    /// Directory holding `.tabular-upsert.toml`
    pub config_dir: Option<PathBuf>,
    /// Validate and report without saving the snapshot
    pub dry_run: bool,
    pub pretty: bool,
}

/// Run an upload and print its report
pub fn handle_upload(args: &UploadArgs) -> Result<(), CliError> {
    if !args.file.exists() {
        return Err(CliError::FileNotFound(args.file.clone()));
    }
    let bytes = std::fs::read(&args.file)
        .map_err(|e| CliError::FileReadError(args.file.clone(), e.to_string()))?;

    let config = load_config(args.config_dir.as_deref())?;
    let store = match &args.store {
        Some(path) => InMemoryStore::load_json(path)?,
        None => InMemoryStore::new(),
    };
    let engine = UploadEngine::new(store, config);
    let file_name = args.file.file_name().and_then(|n| n.to_str());

    let report = runtime()?.block_on(async {
        UploadReport::from_result(engine.upload_file(args.kind, &bytes, file_name).await)
    });

    let json = if args.pretty {
        serde_json::to_string_pretty(&report)
    } else {
        serde_json::to_string(&report)
    }
    .map_err(|e| CliError::IoError(format!("Failed to serialize report: {}", e)))?;
    println!("{}", json);

    if !report.success {
        return Err(CliError::UploadRejected(report.message));
    }

    if let Some(path) = &args.store
        && !args.dry_run
    {
        engine
            .store()
            .save_json(path)
            .map_err(|e| CliError::FileWriteError(path.clone(), e.to_string()))?;
        info!(path = %path.display(), "Saved store snapshot");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_upload_updates_snapshot() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("games.csv");
        let store = dir.path().join("store.json");
        std::fs::write(
            &file,
            "game_id,game_name,scratch_api\nG1,Maze,https://scratch.mit.edu/projects/G1\n",
        )
        .unwrap();

        let args = UploadArgs {
            kind: EntityKind::Game,
            file,
            store: Some(store.clone()),
            config_dir: Some(dir.path().to_path_buf()),
            dry_run: false,
            pretty: false,
        };
        handle_upload(&args).unwrap();

        let saved = InMemoryStore::load_json(&store).unwrap();
        assert_eq!(
            saved.get(EntityKind::Game, "G1").unwrap().get_str("game_name"),
            Some("Maze")
        );
    }

    #[test]
    fn test_dry_run_leaves_snapshot_alone() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("students.csv");
        let store = dir.path().join("store.json");
        std::fs::write(&file, "student_id,name\nS1,Ann\n").unwrap();

        let args = UploadArgs {
            kind: EntityKind::Student,
            file,
            store: Some(store.clone()),
            config_dir: Some(dir.path().to_path_buf()),
            dry_run: true,
            pretty: true,
        };
        handle_upload(&args).unwrap();
        assert!(!store.exists());
    }

    #[test]
    fn test_rejected_upload_is_an_error() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("students.csv");
        std::fs::write(&file, "name\nAnn\n").unwrap();

        let args = UploadArgs {
            kind: EntityKind::Student,
            file,
            store: None,
            config_dir: Some(dir.path().to_path_buf()),
            dry_run: false,
            pretty: false,
        };
        assert!(matches!(
            handle_upload(&args),
            Err(CliError::UploadRejected(msg)) if msg == "Missing required headers: student_id"
        ));
    }
}
