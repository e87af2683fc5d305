//! Upload engine tests

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Duration, TimeZone, Utc};
use tabular_upsert_sdk::database::config::RetrySection;
use tabular_upsert_sdk::import::{UploadEngine, UploadError, UploadReport, Worksheet};
use tabular_upsert_sdk::models::{CellValue, EntityKind, Record};
use tabular_upsert_sdk::schema::{ACCUMULATED_CLICK, CREATED_AT, LAST_UPDATE, UPDATED_AT};
use tabular_upsert_sdk::{InMemoryStore, UploadConfig, record_click};

fn config() -> UploadConfig {
    let mut config = UploadConfig::new();
    config.retry = RetrySection {
        max_retries: 2,
        initial_backoff_ms: 0,
        max_backoff_ms: 0,
    };
    config
}

fn engine() -> UploadEngine<InMemoryStore> {
    UploadEngine::new(InMemoryStore::new(), config())
}

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 9, 2, 8, 0, 0).unwrap()
}

fn sheet(rows: &[&[&str]]) -> Worksheet {
    Worksheet::new(
        rows.iter()
            .map(|row| {
                row.iter()
                    .map(|cell| {
                        if cell.is_empty() {
                            CellValue::Null
                        } else {
                            CellValue::from(*cell)
                        }
                    })
                    .collect()
            })
            .collect(),
    )
}

fn game_url(id: &str) -> String {
    format!("https://scratch.mit.edu/projects/{}", id)
}

fn stored_game(id: &str, name: &str, clicks: f64) -> Record {
    let stamp = "2024-01-01T00:00:00.000Z";
    Record::new()
        .with("game_id", id)
        .with("game_name", name)
        .with("scratch_api", game_url(id))
        .with(ACCUMULATED_CLICK, clicks)
        .with(CREATED_AT, stamp)
        .with(UPDATED_AT, stamp)
        .with(LAST_UPDATE, stamp)
}

fn student_sheet(n: usize) -> Worksheet {
    let mut rows = vec![vec![CellValue::from("student_id"), CellValue::from("name")]];
    for i in 0..n {
        rows.push(vec![
            CellValue::from(format!("S{:05}", i)),
            CellValue::from(format!("Student {}", i)),
        ]);
    }
    Worksheet::new(rows)
}

mod insert_tests {
    use super::*;

    #[tokio::test]
    async fn test_new_game_is_inserted_with_fresh_timestamps() {
        let engine = engine();
        let url = game_url("G1");
        let report = engine
            .upload_worksheet_at(
                EntityKind::Game,
                &sheet(&[
                    &["game_id", "game_name", "scratch_api"],
                    &["G1", "Maze", url.as_str()],
                ]),
                t0(),
            )
            .await
            .unwrap();

        assert!(report.success);
        assert_eq!((report.processed, report.inserted, report.updated), (1, 1, 0));
        assert!(report.errors.is_empty());
        assert_eq!(
            report.message,
            "Upload complete: 1 processed, 1 inserted, 0 updated, 0 errors"
        );

        let game = engine.store().get(EntityKind::Game, "G1").unwrap();
        let stamp = "2024-09-02T08:00:00.000Z";
        assert_eq!(game.get_str(CREATED_AT), Some(stamp));
        assert_eq!(game.get_str(UPDATED_AT), Some(stamp));
        assert_eq!(game.get_str(LAST_UPDATE), Some(stamp));
        assert_eq!(game.get_number(ACCUMULATED_CLICK), Some(0.0));
    }

    #[tokio::test]
    async fn test_insert_takes_clicks_from_upload() {
        let engine = engine();
        let url = game_url("G1");
        let _ = engine
            .upload_worksheet_at(
                EntityKind::Game,
                &sheet(&[
                    &["game_id", "game_name", "scratch_api", "accumulated_click"],
                    &["G1", "Maze", url.as_str(), "17"],
                ]),
                t0(),
            )
            .await
            .unwrap();
        let game = engine.store().get(EntityKind::Game, "G1").unwrap();
        assert_eq!(game.get_number(ACCUMULATED_CLICK), Some(17.0));
    }

    #[tokio::test]
    async fn test_upload_base64_csv() {
        let engine = engine();
        let csv = "teacher_id,name,email,class_names\nT1,Tess,t@school.test,\"[\"\"5A\"\",\"\"5B\"\"]\"\n";
        let payload = STANDARD.encode(csv);
        let report = engine
            .upload_base64(EntityKind::Teacher, &payload, Some("teachers.csv"))
            .await
            .unwrap();
        assert_eq!(report.inserted, 1);

        let teacher = engine.store().get(EntityKind::Teacher, "T1").unwrap();
        assert_eq!(
            teacher.get("class_names").and_then(|v| v.as_string_array()),
            Some(&["5A".to_string(), "5B".to_string()][..])
        );
        assert_eq!(teacher.get("is_admin").and_then(|v| v.as_bool()), Some(false));
    }
}

mod update_tests {
    use super::*;

    #[tokio::test]
    async fn test_update_preserves_clicks_and_created_at() {
        let engine = engine();
        engine
            .store()
            .put(EntityKind::Game, stored_game("G1", "Old name", 42.0))
            .unwrap();
        let url = game_url("G1");

        let report = engine
            .upload_worksheet_at(
                EntityKind::Game,
                &sheet(&[
                    &["game_id", "game_name", "scratch_api", "accumulated_click"],
                    &["G1", "New name", url.as_str(), "0"],
                ]),
                t0(),
            )
            .await
            .unwrap();
        assert_eq!((report.inserted, report.updated), (0, 1));

        let game = engine.store().get(EntityKind::Game, "G1").unwrap();
        assert_eq!(game.get_str("game_name"), Some("New name"));
        assert_eq!(game.get_number(ACCUMULATED_CLICK), Some(42.0));
        assert_eq!(game.get_str(CREATED_AT), Some("2024-01-01T00:00:00.000Z"));
        assert_eq!(game.get_str(UPDATED_AT), Some("2024-09-02T08:00:00.000Z"));
        assert_eq!(game.get_str(LAST_UPDATE), Some("2024-09-02T08:00:00.000Z"));
    }

    #[tokio::test]
    async fn test_reupload_is_idempotent() {
        let engine = engine();
        let data = student_sheet(30);

        let first = engine
            .upload_worksheet_at(EntityKind::Student, &data, t0())
            .await
            .unwrap();
        assert_eq!((first.inserted, first.updated), (30, 0));
        let after_first = engine.store().snapshot().unwrap();

        let second = engine
            .upload_worksheet_at(EntityKind::Student, &data, t0() + Duration::days(3))
            .await
            .unwrap();
        assert_eq!((second.processed, second.inserted, second.updated), (30, 0, 30));
        assert!(second.errors.is_empty());
        assert_eq!(engine.store().snapshot().unwrap(), after_first);
    }

    #[tokio::test]
    async fn test_mixed_insert_and_update() {
        let engine = engine();
        let (u1, u2, u3) = (game_url("G1"), game_url("G2"), game_url("G3"));
        let earlier = t0() - Duration::days(7);
        let seeded = engine
            .upload_worksheet_at(
                EntityKind::Game,
                &sheet(&[
                    &["game_id", "game_name", "scratch_api"],
                    &["G1", "One", u1.as_str()],
                    &["G2", "Two", u2.as_str()],
                ]),
                earlier,
            )
            .await
            .unwrap();
        assert_eq!(seeded.inserted, 2);
        record_click(engine.store(), "G2", 9).await.unwrap();

        let report = engine
            .upload_worksheet_at(
                EntityKind::Game,
                &sheet(&[
                    &["game_id", "game_name", "scratch_api"],
                    &["G1", "One", u1.as_str()],
                    &["G2", "Two renamed", u2.as_str()],
                    &["G3", "Three", u3.as_str()],
                ]),
                t0(),
            )
            .await
            .unwrap();

        assert_eq!(
            report.message,
            "Upload complete: 3 processed, 1 inserted, 2 updated, 0 errors"
        );
        let g1 = engine.store().get(EntityKind::Game, "G1").unwrap();
        assert_eq!(g1.get_str(UPDATED_AT), Some("2024-08-26T08:00:00.000Z"));
        let g2 = engine.store().get(EntityKind::Game, "G2").unwrap();
        assert_eq!(g2.get_number(ACCUMULATED_CLICK), Some(9.0));
        assert_eq!(g2.get_str(CREATED_AT), Some("2024-08-26T08:00:00.000Z"));
        assert_eq!(g2.get_str(UPDATED_AT), Some("2024-09-02T08:00:00.000Z"));
    }

    #[tokio::test]
    async fn test_unknown_stored_attributes_survive() {
        let engine = engine();
        engine
            .store()
            .put(
                EntityKind::Student,
                Record::new()
                    .with("student_id", "S1")
                    .with("name", "Ann")
                    .with("avatar", "fox.png"),
            )
            .unwrap();

        let _ = engine
            .upload_worksheet_at(
                EntityKind::Student,
                &sheet(&[&["student_id", "name", "shoe_size"], &["S1", "Anne", "40"]]),
                t0(),
            )
            .await
            .unwrap();
        let student = engine.store().get(EntityKind::Student, "S1").unwrap();
        assert_eq!(student.get_str("avatar"), Some("fox.png"));
        assert_eq!(student.get_str("name"), Some("Anne"));
        assert!(!student.contains("shoe_size"));
    }
}

mod row_error_tests {
    use super::*;

    #[tokio::test]
    async fn test_scratch_api_mismatch() {
        let engine = engine();
        let url = game_url("G2");
        let report = engine
            .upload_worksheet_at(
                EntityKind::Game,
                &sheet(&[
                    &["game_id", "game_name", "scratch_api"],
                    &["G1", "Maze", url.as_str()],
                ]),
                t0(),
            )
            .await
            .unwrap();

        assert!(report.success);
        assert_eq!((report.processed, report.inserted, report.updated), (1, 0, 0));
        assert_eq!(report.errors, vec!["Row 1: scratch_api must end with game_id G1"]);
        assert!(engine.store().get(EntityKind::Game, "G1").is_none());
        assert_eq!(engine.store().write_calls(), 0);
    }

    #[tokio::test]
    async fn test_missing_key_skips_only_that_row() {
        let engine = engine();
        let report = engine
            .upload_worksheet_at(
                EntityKind::Student,
                &sheet(&[
                    &["student_id", "name"],
                    &["S1", "Ann"],
                    &["", "Nobody"],
                    &["S3", "Cat"],
                ]),
                t0(),
            )
            .await
            .unwrap();

        assert!(report.success);
        assert_eq!((report.processed, report.inserted, report.updated), (2, 2, 0));
        assert_eq!(report.errors, vec!["Row 2: Missing student_id"]);
        assert_eq!(engine.store().len(EntityKind::Student), 2);
    }

    #[tokio::test]
    async fn test_invalid_row_does_not_block_valid_duplicate() {
        let engine = engine();
        let url = game_url("G1");
        let report = engine
            .upload_worksheet_at(
                EntityKind::Game,
                &sheet(&[
                    &["game_id", "game_name", "scratch_api"],
                    &["G1", "", url.as_str()],
                    &["G1", "Maze", url.as_str()],
                ]),
                t0(),
            )
            .await
            .unwrap();

        assert_eq!((report.processed, report.inserted, report.updated), (2, 1, 0));
        assert_eq!(report.errors, vec!["Row 1: Missing game_name"]);
        let game = engine.store().get(EntityKind::Game, "G1").unwrap();
        assert_eq!(game.get_str("game_name"), Some("Maze"));
    }

    #[tokio::test]
    async fn test_errors_are_sorted_by_row() {
        let engine = engine();
        engine.store().reject_key("S1");
        let report = engine
            .upload_worksheet_at(
                EntityKind::Student,
                &sheet(&[
                    &["student_id", "name"],
                    &["S1", "Ann"],
                    &["S2", ""],
                    &["S1", "Ann again"],
                ]),
                t0(),
            )
            .await
            .unwrap();

        assert_eq!(report.processed, 3);
        assert_eq!(report.inserted, 0);
        assert_eq!(report.errors.len(), 3);
        assert!(report.errors[0].starts_with("Row 1: Failed to write record:"));
        assert_eq!(report.errors[1], "Row 2: Missing name");
        assert_eq!(report.errors[2], "Row 3: Duplicate student_id S1 (first seen in row 1)");
    }

    #[tokio::test]
    async fn test_failed_read_does_not_reset_existing_record() {
        let store = InMemoryStore::new();
        store.put(EntityKind::Game, stored_game("G1", "One", 99.0)).unwrap();
        store.fail_next_gets(10);
        let engine = UploadEngine::new(store, config());
        let url = game_url("G1");

        let report = engine
            .upload_worksheet_at(
                EntityKind::Game,
                &sheet(&[
                    &["game_id", "game_name", "scratch_api"],
                    &["G1", "Reset?", url.as_str()],
                ]),
                t0(),
            )
            .await
            .unwrap();

        assert_eq!((report.inserted, report.updated), (0, 0));
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].starts_with("Row 1: Failed to read existing record:"));
        let game = engine.store().get(EntityKind::Game, "G1").unwrap();
        assert_eq!(game.get_number(ACCUMULATED_CLICK), Some(99.0));
        assert_eq!(game.get_str("game_name"), Some("One"));
    }
}

mod structural_tests {
    use super::*;

    #[tokio::test]
    async fn test_too_many_records_touches_nothing() {
        let engine = engine();
        let max = engine.config().batch.max_records;
        let result = engine
            .upload_worksheet_at(EntityKind::Student, &student_sheet(max + 1), t0())
            .await;

        assert_eq!(
            result.clone().unwrap_err(),
            UploadError::TooManyRecords {
                count: max + 1,
                max
            }
        );
        let report = UploadReport::from_result(result);
        assert!(!report.success);
        assert_eq!((report.processed, report.inserted, report.updated), (0, 0, 0));
        assert_eq!(report.errors, vec![report.message.clone()]);
        assert_eq!(engine.store().get_calls(), 0);
        assert_eq!(engine.store().write_calls(), 0);
    }

    #[tokio::test]
    async fn test_exactly_max_records_is_accepted() {
        let mut config = config();
        config.batch.max_records = 40;
        let engine = UploadEngine::new(InMemoryStore::new(), config);
        let report = engine
            .upload_worksheet_at(EntityKind::Student, &student_sheet(40), t0())
            .await
            .unwrap();
        assert_eq!(report.inserted, 40);
    }

    #[tokio::test]
    async fn test_missing_headers() {
        let engine = engine();
        let result = engine
            .upload_worksheet_at(
                EntityKind::Game,
                &sheet(&[&["game_id", "game_name"], &["G1", "Maze"]]),
                t0(),
            )
            .await;
        assert_eq!(
            result.unwrap_err(),
            UploadError::MissingHeaders(vec!["scratch_api".to_string()])
        );
        assert_eq!(engine.store().get_calls(), 0);
    }

    #[tokio::test]
    async fn test_bad_payload() {
        let engine = engine();
        let report = UploadReport::from_result(
            engine
                .upload_base64(EntityKind::Student, "not base64!", None)
                .await,
        );
        assert!(!report.success);
        assert!(report.message.starts_with("Invalid payload"));
    }

    #[tokio::test]
    async fn test_unsupported_extension() {
        let engine = engine();
        let result = engine
            .upload_file(EntityKind::Student, b"%PDF-1.7", Some("roster.pdf"))
            .await;
        assert!(matches!(result, Err(UploadError::UnsupportedFormat(_))));
    }
}
