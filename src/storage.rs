use crate::errors::StoreError;
use crate::kv::KvClient;
use crate::models::{format_date, Record};
use chrono::{DateTime, Utc};
use tracing::{info, warn};

pub const RECORD_PREFIX: &str = "record:";

pub fn record_key(date: &DateTime<Utc>) -> String {
    format!("{RECORD_PREFIX}{}", format_date(date))
}

/// A record together with the key it lives under in the store.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRecord {
    pub key: String,
    pub record: Record,
}

/// Thin record-typed facade over a [`KvClient`].
pub struct RecordStore<C> {
    client: C,
}

impl<C: KvClient> RecordStore<C> {
    pub fn new(client: C) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub async fn fetch_all(&self, prefix: &str) -> Result<Vec<Record>, StoreError> {
        let entries = self.fetch_entries(prefix).await?;
        Ok(entries.into_iter().map(|entry| entry.record).collect())
    }

    /// Like [`fetch_all`](Self::fetch_all) but keeps the key each record is
    /// stored under, which need not be the canonical [`record_key`] of its date.
    /// Dates are truncated to the millisecond precision records travel with.
    pub async fn fetch_entries(&self, prefix: &str) -> Result<Vec<StoredRecord>, StoreError> {
        let entries = self
            .client
            .get_with_prefix(prefix)
            .await
            .map_err(|err| StoreError::Fetch {
                prefix: prefix.to_string(),
                reason: err.to_string(),
            })?;

        let mut records = Vec::with_capacity(entries.len());
        for entry in entries {
            match serde_json::from_value::<Record>(entry.value) {
                Ok(record) => {
                    let record = Record::new(record.blood_sugar, record.date);
                    if entry.key != record_key(&record.date) {
                        warn!(key = %entry.key, "record stored under a non-canonical key");
                    }
                    records.push(StoredRecord {
                        key: entry.key,
                        record,
                    });
                }
                Err(err) => warn!(key = %entry.key, "skipping undecodable record: {err}"),
            }
        }
        Ok(records)
    }

    pub async fn fetch(&self, key: &str) -> Result<Option<Record>, StoreError> {
        let value = self.client.get(key).await.map_err(|err| StoreError::Fetch {
            prefix: key.to_string(),
            reason: err.to_string(),
        })?;

        Ok(value.and_then(|value| match serde_json::from_value(value) {
            Ok(Record { blood_sugar, date }) => Some(Record::new(blood_sugar, date)),
            Err(err) => {
                warn!(%key, "stored value is not a record: {err}");
                None
            }
        }))
    }

    pub async fn create(&self, key: &str, record: &Record) -> Result<(), StoreError> {
        let value = serde_json::to_value(record)?;
        match self.client.set(key, value).await {
            Ok(true) => {
                info!(%key, "record stored");
                Ok(())
            }
            Ok(false) => Err(StoreError::Write {
                key: key.to_string(),
                reason: "store rejected the write".into(),
            }),
            Err(err) => Err(StoreError::Write {
                key: key.to_string(),
                reason: err.to_string(),
            }),
        }
    }

    pub async fn remove(&self, key: &str) -> Result<(), StoreError> {
        match self.client.delete(key).await {
            Ok(true) => {
                info!(%key, "record deleted");
                Ok(())
            }
            Ok(false) => Err(StoreError::Delete {
                key: key.to_string(),
                reason: "store rejected the delete".into(),
            }),
            Err(err) => Err(StoreError::Delete {
                key: key.to_string(),
                reason: err.to_string(),
            }),
        }
    }
}
