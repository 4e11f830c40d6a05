//! Durable FIFO of pending playback entries.

use crate::error::Result;
use crate::models::QueueEntry;
use crate::store::JsonFileStore;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Ordered queue persisted after every mutation.
///
/// Mutations take `&mut self`: the queue has exactly one owner (the playback
/// driver), which serializes access. Each mutation is applied to a copy,
/// written to disk, and only then made visible, so the file always matches
/// what [`entries`](Self::entries) reports.
#[derive(Debug)]
pub struct QueueStore {
    store: JsonFileStore<VecDeque<QueueEntry>>,
    entries: VecDeque<QueueEntry>,
}

impl QueueStore {
    /// Open (or create) the queue file at `path`.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let store: JsonFileStore<VecDeque<QueueEntry>> = JsonFileStore::new(path);
        let entries = store.load().await?;
        debug!(
            path = %store.path().display(),
            entries = entries.len(),
            "queue store loaded"
        );

        Ok(Self { store, entries })
    }

    pub fn path(&self) -> &Path {
        self.store.path()
    }

    pub fn entries(&self) -> &VecDeque<QueueEntry> {
        &self.entries
    }

    pub fn snapshot(&self) -> Vec<QueueEntry> {
        self.entries.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn front(&self) -> Option<&QueueEntry> {
        self.entries.front()
    }

    /// Append and persist. Returns the entry's 1-based position.
    pub async fn append(&mut self, entry: QueueEntry) -> Result<usize> {
        let mut next = self.entries.clone();
        next.push_back(entry);
        self.commit(next).await?;
        Ok(self.entries.len())
    }

    /// Remove the head entry and persist the shortened queue.
    pub async fn pop_front(&mut self) -> Result<Option<QueueEntry>> {
        let mut next = self.entries.clone();
        let Some(head) = next.pop_front() else {
            return Ok(None);
        };
        self.commit(next).await?;
        Ok(Some(head))
    }

    /// Drop every entry. Returns how many were removed.
    pub async fn clear(&mut self) -> Result<usize> {
        let removed = self.entries.len();
        self.commit(VecDeque::new()).await?;
        Ok(removed)
    }

    async fn commit(&mut self, next: VecDeque<QueueEntry>) -> Result<()> {
        self.store.save(&next).await?;
        self.entries = next;
        Ok(())
    }
}
