//! Prefix-addressable key-value stores the record store talks to.

use crate::errors::KvError;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc, Mutex, PoisonError,
    },
};
use tokio::{fs, sync::Mutex as AsyncMutex};
use tracing::{error, info};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KvEntry {
    pub key: String,
    pub value: Value,
}

#[async_trait]
pub trait KvClient: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Value>, KvError>;

    /// Every entry whose key starts with `prefix`, in no particular order.
    async fn get_with_prefix(&self, prefix: &str) -> Result<Vec<KvEntry>, KvError>;

    /// Returns `false` when the store refused the write.
    async fn set(&self, key: &str, value: Value) -> Result<bool, KvError>;

    /// Deleting an absent key counts as success.
    async fn delete(&self, key: &str) -> Result<bool, KvError>;
}

#[async_trait]
impl<T: KvClient + ?Sized> KvClient for Arc<T> {
    async fn get(&self, key: &str) -> Result<Option<Value>, KvError> {
        (**self).get(key).await
    }

    async fn get_with_prefix(&self, prefix: &str) -> Result<Vec<KvEntry>, KvError> {
        (**self).get_with_prefix(prefix).await
    }

    async fn set(&self, key: &str, value: Value) -> Result<bool, KvError> {
        (**self).set(key, value).await
    }

    async fn delete(&self, key: &str) -> Result<bool, KvError> {
        (**self).delete(key).await
    }
}

fn scan(map: &BTreeMap<String, Value>, prefix: &str) -> Vec<KvEntry> {
    map.range(prefix.to_string()..)
        .take_while(|(key, _)| key.starts_with(prefix))
        .map(|(key, value)| KvEntry {
            key: key.clone(),
            value: value.clone(),
        })
        .collect()
}

/// In-process store. The failure switches let callers rehearse a flaky backend.
#[derive(Debug, Default)]
pub struct MemoryKv {
    map: Mutex<BTreeMap<String, Value>>,
    rejected_sets: AtomicUsize,
    reject_deletes: AtomicBool,
    unavailable: AtomicBool,
}

impl MemoryKv {
    pub fn new() -> Self {
        Self::default()
    }

    /// The next `count` calls to `set` report failure.
    pub fn reject_next_sets(&self, count: usize) {
        self.rejected_sets.store(count, Ordering::SeqCst);
    }

    pub fn reject_deletes(&self, reject: bool) {
        self.reject_deletes.store(reject, Ordering::SeqCst);
    }

    /// Every call errors as if the transport were down.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, Value>> {
        self.map.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check_available(&self) -> Result<(), KvError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(KvError::Unavailable("memory store switched off".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl KvClient for MemoryKv {
    async fn get(&self, key: &str) -> Result<Option<Value>, KvError> {
        self.check_available()?;
        Ok(self.lock().get(key).cloned())
    }

    async fn get_with_prefix(&self, prefix: &str) -> Result<Vec<KvEntry>, KvError> {
        self.check_available()?;
        Ok(scan(&self.lock(), prefix))
    }

    async fn set(&self, key: &str, value: Value) -> Result<bool, KvError> {
        self.check_available()?;
        let rejected = self
            .rejected_sets
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if rejected {
            return Ok(false);
        }
        self.lock().insert(key.to_string(), value);
        Ok(true)
    }

    async fn delete(&self, key: &str) -> Result<bool, KvError> {
        self.check_available()?;
        if self.reject_deletes.load(Ordering::SeqCst) {
            return Ok(false);
        }
        self.lock().remove(key);
        Ok(true)
    }
}

/// Store persisted as one JSON object on disk, rewritten after every mutation.
#[derive(Debug)]
pub struct JsonFileKv {
    path: PathBuf,
    map: AsyncMutex<BTreeMap<String, Value>>,
}

impl JsonFileKv {
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, KvError> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }

        let map = load_map(&path).await;
        info!(path = %path.display(), entries = map.len(), "opened json store");
        Ok(Self {
            path,
            map: AsyncMutex::new(map),
        })
    }

    async fn persist(&self, map: &BTreeMap<String, Value>) -> Result<(), KvError> {
        let payload = serde_json::to_vec_pretty(map)?;
        fs::write(&self.path, payload).await?;
        Ok(())
    }
}

async fn load_map(path: &Path) -> BTreeMap<String, Value> {
    match fs::read(path).await {
        Ok(bytes) => match serde_json::from_slice(&bytes) {
            Ok(map) => map,
            Err(err) => {
                error!("failed to parse store file: {err}");
                BTreeMap::new()
            }
        },
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
        Err(err) => {
            error!("failed to read store file: {err}");
            BTreeMap::new()
        }
    }
}

#[async_trait]
impl KvClient for JsonFileKv {
    async fn get(&self, key: &str) -> Result<Option<Value>, KvError> {
        Ok(self.map.lock().await.get(key).cloned())
    }

    async fn get_with_prefix(&self, prefix: &str) -> Result<Vec<KvEntry>, KvError> {
        Ok(scan(&*self.map.lock().await, prefix))
    }

    async fn set(&self, key: &str, value: Value) -> Result<bool, KvError> {
        let mut map = self.map.lock().await;
        let previous = map.insert(key.to_string(), value);
        if let Err(err) = self.persist(&map).await {
            match previous {
                Some(previous) => map.insert(key.to_string(), previous),
                None => map.remove(key),
            };
            return Err(err);
        }
        Ok(true)
    }

    async fn delete(&self, key: &str) -> Result<bool, KvError> {
        let mut map = self.map.lock().await;
        let Some(previous) = map.remove(key) else {
            return Ok(true);
        };
        if let Err(err) = self.persist(&map).await {
            map.insert(key.to_string(), previous);
            return Err(err);
        }
        Ok(true)
    }
}
