//! Integration test: dataset manager end-to-end on local storage.
//!
//! append → load → update/delete boundaries → round-trip → corrupt object.

use bytes::Bytes;

use effitrack_core::config::StoreConfig;
use effitrack_core::schema::is_canonical;
use effitrack_core::storage::DATASET_KEY;
use effitrack_core::{Column, EfficiencyRecord, FieldUpdates, TrackerError, Value};
use effitrack_runtime::{stats, TrackerStore};
use effitrack_storage::table_codec::decode_table;

async fn open_store(dir: &std::path::Path) -> TrackerStore {
    TrackerStore::open(StoreConfig::local(dir))
        .await
        .expect("Store should open")
}

fn record(story: &str, team: &str) -> EfficiencyRecord {
    EfficiencyRecord::new()
        .with(Column::WeekStart, "2024-01-15")
        .with(Column::WeekEnd, "2024-01-21")
        .with(Column::StoryId, story)
        .with(Column::DeveloperName, "Alice Johnson")
        .with(Column::TeamName, team)
        .with(Column::OriginalEstimateHours, 8.0)
        .with(Column::EfficiencyGainedHours, 2.0)
        .with(Column::CopilotUsed, "Yes")
}

#[tokio::test]
async fn test_three_appends_load_in_order() {
    let tmp = tempfile::TempDir::new().unwrap();
    let store = open_store(tmp.path()).await;

    let teams = ["Platform Team", "QA Team", "Data Team"];
    for (i, team) in teams.iter().enumerate() {
        store
            .dataset()
            .append(record(&format!("ENG-{i}"), team))
            .await
            .unwrap();
    }

    let dataset = store.dataset().load().await.unwrap();
    let loaded_teams: Vec<String> = dataset.iter().map(|r| r.text(Column::TeamName)).collect();
    assert_eq!(loaded_teams, teams);

    // The stored object carries the canonical header.
    let raw = store.storage().get(DATASET_KEY).await.unwrap();
    assert!(is_canonical(&decode_table(DATASET_KEY, raw).unwrap()));

    let summary = stats::summarize(&dataset);
    assert_eq!(summary.entries, 3);
    assert_eq!(summary.total_hours_saved, 6.0);
    assert_eq!(summary.tool_usage_pct, 100.0);
}

#[tokio::test]
async fn test_index_boundaries() {
    let tmp = tempfile::TempDir::new().unwrap();
    let store = open_store(tmp.path()).await;
    let dataset = store.dataset();

    let mut fields = FieldUpdates::new();
    fields.insert(Column::NotesObservations, Value::from("edited"));

    for story in ["ENG-1", "ENG-2"] {
        dataset.append(record(story, "QA Team")).await.unwrap();
    }
    // Size 2: index 2 is one past the end.
    assert!(matches!(
        dataset.update_at(2, &fields).await,
        Err(TrackerError::OutOfRange { index: 2, len: 2 })
    ));
    assert!(matches!(
        dataset.delete_at(2).await,
        Err(TrackerError::OutOfRange { index: 2, len: 2 })
    ));

    // Size 3: index 2 is the last record.
    dataset.append(record("ENG-3", "QA Team")).await.unwrap();
    let updated = dataset.update_at(2, &fields).await.unwrap();
    assert_eq!(updated.text(Column::NotesObservations), "edited");
    let removed = dataset.delete_at(2).await.unwrap();
    assert_eq!(removed.text(Column::StoryId), "ENG-3");
    assert_eq!(dataset.len().await.unwrap(), 2);
}

#[tokio::test]
async fn test_save_load_round_trip() {
    let tmp = tempfile::TempDir::new().unwrap();
    let store = open_store(tmp.path()).await;
    let dataset = store.dataset();

    dataset.append(record("ENG-1", "QA Team")).await.unwrap();
    dataset
        .append(record("ENG-2", "Data Team").with(Column::LinesOfCodeSaved, 42.0))
        .await
        .unwrap();

    let first = dataset.load().await.unwrap();
    let first_bytes = store.storage().get(DATASET_KEY).await.unwrap();
    dataset.replace_all(first.clone()).await.unwrap();
    let second = dataset.load().await.unwrap();
    assert_eq!(first, second);

    let second_bytes = store.storage().get(DATASET_KEY).await.unwrap();
    assert_eq!(
        decode_table(DATASET_KEY, first_bytes).unwrap(),
        decode_table(DATASET_KEY, second_bytes).unwrap()
    );
}

#[tokio::test]
async fn test_corrupt_dataset_is_surfaced() {
    let tmp = tempfile::TempDir::new().unwrap();
    let store = open_store(tmp.path()).await;
    store
        .storage()
        .put(DATASET_KEY, Bytes::from_static(b"PAR1 but not really"))
        .await
        .unwrap();

    assert!(matches!(
        store.dataset().load().await,
        Err(TrackerError::CorruptData { .. })
    ));
    // A failed append leaves the object as it was.
    assert!(store.dataset().append(record("ENG-1", "QA")).await.is_err());
    assert_eq!(
        store.storage().get(DATASET_KEY).await.unwrap(),
        Bytes::from_static(b"PAR1 but not really")
    );
}
