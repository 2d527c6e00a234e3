//! The session-owned record list and the store operations that mutate it.
//!
//! The list only ever changes after the store has confirmed the matching
//! write or delete, so it never shows a reading the store does not hold.

use crate::errors::SessionError;
use crate::kv::KvClient;
use crate::models::{A1cOutcome, ChartResponse, LevelInput, Record, SortOrder};
use crate::stats;
use crate::storage::{record_key, RecordStore, StoredRecord, RECORD_PREFIX};
use chrono::{DateTime, SubsecRound, Utc};
use tracing::{error, info, warn};

/// Attempts at writing the replacement entry during an edit that moves a record.
const RECREATE_ATTEMPTS: usize = 2;

pub struct Session<C> {
    store: RecordStore<C>,
    entries: Vec<StoredRecord>,
}

impl<C: KvClient> Session<C> {
    pub fn new(store: RecordStore<C>) -> Self {
        Self {
            store,
            entries: Vec::new(),
        }
    }

    pub fn store(&self) -> &RecordStore<C> {
        &self.store
    }

    /// Records in the order they were loaded or added.
    pub fn records(&self) -> Vec<Record> {
        self.entries.iter().map(|entry| entry.record.clone()).collect()
    }

    /// The key the record dated `date` is actually stored under.
    pub fn key_for(&self, date: &DateTime<Utc>) -> Option<&str> {
        let date = date.trunc_subsecs(3);
        self.entries
            .iter()
            .find(|entry| entry.record.date == date)
            .map(|entry| entry.key.as_str())
    }

    pub async fn load(&mut self) -> Result<usize, SessionError> {
        let entries = self.store.fetch_entries(RECORD_PREFIX).await?;
        info!(count = entries.len(), "records loaded");
        self.entries = entries;
        Ok(self.entries.len())
    }

    pub async fn add(&mut self, level: Option<&LevelInput>, now: DateTime<Utc>) -> Result<Record, SessionError> {
        let blood_sugar = parse_level(level)?;
        let record = Record::new(blood_sugar, now);
        let key = record_key(&record.date);
        self.store.create(&key, &record).await?;
        // Same key means the store overwrote the earlier value.
        match self.entries.iter_mut().find(|entry| entry.key == key) {
            Some(existing) => existing.record = record.clone(),
            None => self.entries.push(StoredRecord {
                key,
                record: record.clone(),
            }),
        }
        Ok(record)
    }

    /// Deletes every record dated `date`, each under the key it is stored at.
    pub async fn delete(&mut self, date: &DateTime<Utc>) -> Result<(), SessionError> {
        let date = date.trunc_subsecs(3);
        let keys: Vec<String> = self
            .entries
            .iter()
            .filter(|entry| entry.record.date == date)
            .map(|entry| entry.key.clone())
            .collect();
        if keys.is_empty() {
            return Err(SessionError::NotFound(record_key(&date)));
        }

        for key in keys {
            self.store.remove(&key).await?;
            self.entries.retain(|entry| entry.key != key);
        }
        Ok(())
    }

    /// Changes a record's level and optionally its date.
    ///
    /// Moving a record to a new date deletes the old key before writing the
    /// new one. If the new key cannot be written the original is put back; a
    /// record that can be neither recreated nor restored is dropped from the
    /// list and reported as a reconciliation failure.
    pub async fn edit(
        &mut self,
        original: &DateTime<Utc>,
        level: Option<&LevelInput>,
        new_date: Option<DateTime<Utc>>,
    ) -> Result<Record, SessionError> {
        let blood_sugar = parse_level(level)?;
        let original = original.trunc_subsecs(3);
        let position = self
            .entries
            .iter()
            .position(|entry| entry.record.date == original)
            .ok_or_else(|| SessionError::NotFound(record_key(&original)))?;

        let StoredRecord {
            key: old_key,
            record: previous,
        } = self.entries[position].clone();
        let updated = Record::new(blood_sugar, new_date.unwrap_or(previous.date));
        let new_key = record_key(&updated.date);

        if old_key == new_key {
            self.store.create(&new_key, &updated).await?;
            self.entries[position].record = updated.clone();
            return Ok(updated);
        }

        self.store.remove(&old_key).await?;

        let mut attempt = 1;
        let err = loop {
            match self.store.create(&new_key, &updated).await {
                Ok(()) => {
                    self.entries
                        .retain(|entry| entry.key != old_key && entry.key != new_key);
                    self.entries.insert(
                        position.min(self.entries.len()),
                        StoredRecord {
                            key: new_key,
                            record: updated.clone(),
                        },
                    );
                    return Ok(updated);
                }
                Err(err) => {
                    warn!(%new_key, attempt, "recreate after move failed: {err}");
                    if attempt >= RECREATE_ATTEMPTS {
                        break err;
                    }
                    attempt += 1;
                }
            }
        };

        match self.store.create(&old_key, &previous).await {
            Ok(()) => Err(err.into()),
            Err(restore_err) => {
                error!(%old_key, "could not restore record after failed move: {restore_err}");
                self.entries.retain(|entry| entry.key != old_key);
                Err(SessionError::Reconciliation {
                    lost: previous,
                    reason: err.to_string(),
                })
            }
        }
    }

    pub fn sorted(&self, order: SortOrder) -> Vec<Record> {
        stats::sort_records(&self.records(), order)
    }

    pub fn a1c(&self, months: f64, now: DateTime<Utc>) -> Result<A1cOutcome, SessionError> {
        Ok(stats::estimate_a1c(&self.records(), months, now)?)
    }

    pub fn chart(&self) -> ChartResponse {
        stats::chart_series(&self.records())
    }
}

fn parse_level(level: Option<&LevelInput>) -> Result<f64, SessionError> {
    match level {
        None => Err(SessionError::validation("Please enter a blood sugar level.")),
        Some(LevelInput::Text(text)) if text.trim().is_empty() => {
            Err(SessionError::validation("Please enter a blood sugar level."))
        }
        Some(input) => input
            .parse()
            .ok_or_else(|| SessionError::validation("Blood sugar level must be a number.")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::MemoryKv;
    use crate::models::parse_date;
    use chrono::{Duration, TimeZone};
    use serde_json::json;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap()
    }

    fn level(value: f64) -> LevelInput {
        LevelInput::Number(value)
    }

    fn session() -> Session<MemoryKv> {
        Session::new(RecordStore::new(MemoryKv::new()))
    }

    #[tokio::test]
    async fn add_then_reload_round_trips() {
        let mut session = session();
        let record = session.add(Some(&level(120.0)), t0()).await.unwrap();
        assert_eq!(session.records(), vec![record.clone()]);

        session.entries.clear();
        assert_eq!(session.load().await.unwrap(), 1);
        assert_eq!(session.records(), vec![record]);
    }

    #[tokio::test]
    async fn add_at_an_existing_date_replaces_it() {
        let mut session = session();
        session.add(Some(&level(120.0)), t0()).await.unwrap();
        session.add(Some(&level(125.0)), t0()).await.unwrap();
        assert_eq!(session.records(), vec![Record::new(125.0, t0())]);
        assert_eq!(session.store().client().len(), 1);
    }

    #[tokio::test]
    async fn add_rejects_missing_or_blank_input_without_store_call() {
        let mut session = session();
        session.store().client().set_unavailable(true);

        for input in [None, Some(LevelInput::Text("  ".into())), Some(LevelInput::Text("abc".into()))] {
            let err = session.add(input.as_ref(), t0()).await.unwrap_err();
            assert!(matches!(err, SessionError::Validation(_)), "{err:?}");
        }
        assert!(session.records().is_empty());
    }

    #[tokio::test]
    async fn failed_create_leaves_list_untouched() {
        let mut session = session();
        session.store().client().reject_next_sets(1);
        let err = session.add(Some(&level(99.0)), t0()).await.unwrap_err();
        assert!(matches!(err, SessionError::Store(_)));
        assert!(session.records().is_empty());
    }

    #[tokio::test]
    async fn failed_delete_keeps_record_in_memory() {
        let mut session = session();
        session.add(Some(&level(100.0)), t0()).await.unwrap();
        session.store().client().reject_deletes(true);

        let err = session.delete(&t0()).await.unwrap_err();
        assert!(matches!(err, SessionError::Store(_)));
        assert_eq!(session.records().len(), 1);
        assert_eq!(session.records()[0].date, t0());
    }

    #[tokio::test]
    async fn delete_removes_from_store_and_memory() {
        let mut session = session();
        session.add(Some(&level(100.0)), t0()).await.unwrap();
        session.delete(&t0()).await.unwrap();
        assert!(session.records().is_empty());
        assert!(session.store().client().is_empty());

        let err = session.delete(&t0()).await.unwrap_err();
        assert!(matches!(err, SessionError::NotFound(_)));
    }

    #[tokio::test]
    async fn failed_load_keeps_previous_list() {
        let mut session = session();
        session.add(Some(&level(100.0)), t0()).await.unwrap();
        session.store().client().set_unavailable(true);
        assert!(session.load().await.is_err());
        assert_eq!(session.records().len(), 1);
    }

    #[tokio::test]
    async fn edit_in_place_overwrites_the_same_key() {
        let mut session = session();
        session.add(Some(&level(100.0)), t0()).await.unwrap();
        let edited = session
            .edit(&t0(), Some(&LevelInput::Text("140".into())), None)
            .await
            .unwrap();

        assert_eq!(edited, Record::new(140.0, t0()));
        assert_eq!(session.records(), vec![edited.clone()]);
        let stored = session.store().fetch(&record_key(&t0())).await.unwrap();
        assert_eq!(stored, Some(edited));
    }

    #[tokio::test]
    async fn edit_with_new_date_rekeys_the_record() {
        let mut session = session();
        session.add(Some(&level(100.0)), t0()).await.unwrap();
        let moved_to = t0() - Duration::hours(3);

        let edited = session.edit(&t0(), Some(&level(105.0)), Some(moved_to)).await.unwrap();

        assert_eq!(edited.date, moved_to);
        assert_eq!(session.records(), vec![edited.clone()]);
        let store = session.store();
        assert_eq!(store.fetch(&record_key(&t0())).await.unwrap(), None);
        assert_eq!(store.fetch(&record_key(&moved_to)).await.unwrap(), Some(edited));
    }

    #[tokio::test]
    async fn edit_retries_the_recreate_once() {
        let mut session = session();
        session.add(Some(&level(100.0)), t0()).await.unwrap();
        session.store().client().reject_next_sets(1);
        let moved_to = t0() + Duration::minutes(5);

        let edited = session.edit(&t0(), Some(&level(100.0)), Some(moved_to)).await.unwrap();
        assert_eq!(session.records(), vec![edited]);
    }

    #[tokio::test]
    async fn edit_restores_original_when_recreate_keeps_failing() {
        let mut session = session();
        let original = session.add(Some(&level(100.0)), t0()).await.unwrap();
        session.store().client().reject_next_sets(RECREATE_ATTEMPTS);

        let err = session
            .edit(&t0(), Some(&level(180.0)), Some(t0() + Duration::days(1)))
            .await
            .unwrap_err();

        assert!(matches!(err, SessionError::Store(_)));
        assert_eq!(session.records(), vec![original.clone()]);
        assert_eq!(session.store().fetch(&record_key(&t0())).await.unwrap(), Some(original));
    }

    #[tokio::test]
    async fn edit_reports_reconciliation_when_restore_fails() {
        let mut session = session();
        let original = session.add(Some(&level(100.0)), t0()).await.unwrap();
        session.store().client().reject_next_sets(RECREATE_ATTEMPTS + 1);

        let err = session
            .edit(&t0(), Some(&level(180.0)), Some(t0() + Duration::days(1)))
            .await
            .unwrap_err();

        match err {
            SessionError::Reconciliation { lost, .. } => assert_eq!(lost, original),
            other => panic!("expected reconciliation error, got {other:?}"),
        }
        assert!(session.records().is_empty());
        assert!(session.store().client().is_empty());
    }

    #[tokio::test]
    async fn failed_delete_during_edit_changes_nothing() {
        let mut session = session();
        let original = session.add(Some(&level(100.0)), t0()).await.unwrap();
        session.store().client().reject_deletes(true);

        let err = session
            .edit(&t0(), Some(&level(180.0)), Some(t0() + Duration::days(1)))
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::Store(_)));
        assert_eq!(session.records(), vec![original]);
    }

    #[tokio::test]
    async fn edit_onto_an_occupied_date_replaces_the_occupant() {
        let mut session = session();
        let occupied = t0() + Duration::hours(1);
        session.add(Some(&level(100.0)), t0()).await.unwrap();
        session.add(Some(&level(150.0)), occupied).await.unwrap();

        let edited = session.edit(&t0(), Some(&level(120.0)), Some(occupied)).await.unwrap();

        assert_eq!(edited, Record::new(120.0, occupied));
        assert_eq!(session.records(), vec![edited.clone()]);
        assert_eq!(session.store().client().len(), 1);
        assert_eq!(session.store().fetch(&record_key(&occupied)).await.unwrap(), Some(edited));
    }

    async fn seeded(key: &str, raw_date: &str) -> Session<MemoryKv> {
        let kv = MemoryKv::new();
        kv.set(key, json!({ "bloodSugar": 110, "date": raw_date }))
            .await
            .unwrap();
        let mut session = Session::new(RecordStore::new(kv));
        assert_eq!(session.load().await.unwrap(), 1);
        session
    }

    #[tokio::test]
    async fn delete_uses_the_key_a_record_was_loaded_from() {
        let key = "record:2026-01-05T10:30:00.000+02:00";
        let mut session = seeded(key, "2026-01-05T10:30:00.000+02:00").await;
        let date = Utc.with_ymd_and_hms(2026, 1, 5, 8, 30, 0).unwrap();
        assert_eq!(session.key_for(&date), Some(key));

        session.delete(&date).await.unwrap();

        assert!(session.records().is_empty());
        assert!(session.store().client().is_empty());
    }

    #[tokio::test]
    async fn sub_millisecond_key_is_deleted_by_its_wire_date() {
        let mut session = seeded(
            "record:2026-01-05T08:30:00.123456Z",
            "2026-01-05T08:30:00.123456Z",
        )
        .await;
        let wire = session.records()[0].date;
        assert_eq!(wire, parse_date("2026-01-05T08:30:00.123Z").unwrap());

        session.delete(&wire).await.unwrap();

        assert!(session.store().client().is_empty());
        assert_eq!(session.load().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn edit_moves_a_record_off_its_loaded_key() {
        let key = "record:2026-01-05T10:30:00.000+02:00";
        let mut session = seeded(key, "2026-01-05T10:30:00.000+02:00").await;
        let date = Utc.with_ymd_and_hms(2026, 1, 5, 8, 30, 0).unwrap();

        let edited = session.edit(&date, Some(&level(115.0)), None).await.unwrap();

        assert_eq!(edited, Record::new(115.0, date));
        assert_eq!(session.key_for(&date), Some(record_key(&date).as_str()));
        let store = session.store();
        assert_eq!(store.client().len(), 1);
        assert_eq!(store.client().get(key).await.unwrap(), None);
        assert_eq!(store.fetch(&record_key(&date)).await.unwrap(), Some(edited));
    }

    #[tokio::test]
    async fn a1c_and_sorting_read_the_live_list() {
        let mut session = session();
        for (offset, value) in [(0, 100.0), (31, 200.0), (59, 300.0)] {
            session
                .add(Some(&level(value)), t0() + Duration::days(offset))
                .await
                .unwrap();
        }

        let now = t0() + Duration::days(59);
        match session.a1c(3.0, now).unwrap() {
            A1cOutcome::Estimate { display, .. } => assert_eq!(display, "8.60"),
            other => panic!("expected estimate, got {other:?}"),
        }
        assert!(matches!(
            session.a1c(-2.0, now),
            Err(SessionError::Validation(_))
        ));

        let desc = session.sorted(SortOrder::Desc);
        assert_eq!(desc[0].blood_sugar, 300.0);
        assert_eq!(session.records()[0].blood_sugar, 100.0);
    }
}
