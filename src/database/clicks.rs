//! Click tracking
//!
//! The only writer of `accumulated_click`. It relies on the store's atomic
//! increment, so it never conflicts with other clicks. An upload that read the
//! same game before an increment and writes after it will carry the older
//! count back; uploads are rare admin operations and that window is accepted.

use tracing::debug;

use super::{RecordStore, StoreError, StoreResult};
use crate::models::EntityKind;
use crate::schema::ACCUMULATED_CLICK;

/// Add `clicks` to a game's click counter
///
/// # Returns
/// The counter value after the increment
pub async fn record_click<S: RecordStore + ?Sized>(
    store: &S,
    game_id: &str,
    clicks: u32,
) -> StoreResult<f64> {
    let game_id = game_id.trim();
    if game_id.is_empty() {
        return Err(StoreError::InvalidInput("game_id cannot be empty".to_string()));
    }
    if clicks == 0 {
        return Err(StoreError::InvalidInput(
            "click increment must be positive".to_string(),
        ));
    }

    let total = store
        .increment_counter(EntityKind::Game, game_id, ACCUMULATED_CLICK, f64::from(clicks))
        .await?;
    debug!(game_id, total, "Recorded click");
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::InMemoryStore;
    use crate::models::Record;

    #[tokio::test]
    async fn test_record_click() {
        let store = InMemoryStore::new();
        store
            .put(
                EntityKind::Game,
                Record::new().with("game_id", "G1").with(ACCUMULATED_CLICK, 10.0),
            )
            .unwrap();

        assert_eq!(record_click(&store, " G1 ", 1).await.unwrap(), 11.0);
        assert_eq!(record_click(&store, "G1", 4).await.unwrap(), 15.0);
        assert_eq!(
            store.get(EntityKind::Game, "G1").unwrap().get_number(ACCUMULATED_CLICK),
            Some(15.0)
        );
    }

    #[tokio::test]
    async fn test_record_click_rejects_bad_input() {
        let store = InMemoryStore::new();
        assert!(matches!(
            record_click(&store, "  ", 1).await,
            Err(StoreError::InvalidInput(_))
        ));
        assert!(matches!(
            record_click(&store, "G1", 0).await,
            Err(StoreError::InvalidInput(_))
        ));
        assert!(matches!(
            record_click(&store, "G404", 1).await,
            Err(StoreError::NotFound(_))
        ));
    }
}
