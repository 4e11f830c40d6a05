//! Asset repository trait and JSON implementation

use crate::error::Result;
use crate::models::{AssetRecord, Locator, StoredAsset};
use crate::store::JsonFileStore;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tokio::sync::Mutex;
use tracing::debug;

type AssetMap = BTreeMap<Locator, StoredAsset>;

/// Durable locator → asset record mapping.
///
/// Pure data access; validity of the referenced files is the download
/// cache's concern.
#[async_trait]
pub trait AssetRepository: Send + Sync {
    /// Find the record stored for `locator`
    async fn find(&self, locator: &Locator) -> Result<Option<AssetRecord>>;

    /// Insert or replace the record keyed by `record.locator`
    async fn upsert(&self, record: &AssetRecord) -> Result<()>;

    /// Delete a record
    ///
    /// # Returns
    /// - `Ok(true)` if a record was removed
    /// - `Ok(false)` if nothing was stored for `locator`
    async fn delete(&self, locator: &Locator) -> Result<bool>;

    /// All records, ordered by locator
    async fn list(&self) -> Result<Vec<AssetRecord>>;

    async fn count(&self) -> Result<usize>;
}

/// [`AssetRepository`] persisted as a single JSON object.
pub struct JsonAssetRepository {
    store: JsonFileStore<AssetMap>,
    records: Mutex<AssetMap>,
}

impl JsonAssetRepository {
    /// Open (or create) the library file at `path`.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let store: JsonFileStore<AssetMap> = JsonFileStore::new(path);
        let records = store.load().await?;
        debug!(
            path = %store.path().display(),
            records = records.len(),
            "asset store loaded"
        );

        Ok(Self {
            store,
            records: Mutex::new(records),
        })
    }

    /// Apply `mutate` to a copy, persist it, then publish it in memory.
    ///
    /// The lock is held across the write so mutations are serialized and a
    /// failed write leaves the in-memory view untouched.
    async fn mutate<R>(&self, mutate: impl FnOnce(&mut AssetMap) -> R) -> Result<R> {
        let mut records = self.records.lock().await;
        let mut next = records.clone();
        let outcome = mutate(&mut next);
        self.store.save(&next).await?;
        *records = next;
        Ok(outcome)
    }
}

#[async_trait]
impl AssetRepository for JsonAssetRepository {
    async fn find(&self, locator: &Locator) -> Result<Option<AssetRecord>> {
        let records = self.records.lock().await;
        Ok(records
            .get(locator)
            .cloned()
            .map(|stored| stored.into_record(locator.clone())))
    }

    async fn upsert(&self, record: &AssetRecord) -> Result<()> {
        let stored = StoredAsset::from(record);
        self.mutate(|records| {
            records.insert(record.locator.clone(), stored);
        })
        .await
    }

    async fn delete(&self, locator: &Locator) -> Result<bool> {
        if !self.records.lock().await.contains_key(locator) {
            return Ok(false);
        }
        self.mutate(|records| records.remove(locator).is_some()).await
    }

    async fn list(&self) -> Result<Vec<AssetRecord>> {
        let records = self.records.lock().await;
        Ok(records
            .iter()
            .map(|(locator, stored)| stored.clone().into_record(locator.clone()))
            .collect())
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.records.lock().await.len())
    }
}
