//! In-memory admission log.

use std::collections::{BTreeMap, HashMap, VecDeque};

use async_trait::async_trait;
use cadence_protocols::{AdmissionLog, BufferEntry, BufferError, EntryId};
use chrono::Utc;
use parking_lot::Mutex;

#[derive(Default)]
struct Inner {
    logs: HashMap<String, VecDeque<BufferEntry>>,
    last: Option<EntryId>,
}

impl Inner {
    /// Ids keep increasing even if the wall clock steps back.
    fn next_id(&mut self) -> EntryId {
        let millis = u64::try_from(Utc::now().timestamp_millis()).unwrap_or(0);
        let id = match self.last {
            Some(last) if millis <= last.millis => EntryId {
                millis: last.millis,
                seq: last.seq + 1,
            },
            _ => EntryId { millis, seq: 0 },
        };
        self.last = Some(id);
        id
    }
}

/// Ordered append/trim logs keyed by name.
#[derive(Default)]
pub struct MemoryAdmissionLog {
    inner: Mutex<Inner>,
}

impl MemoryAdmissionLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self, key: &str) -> usize {
        self.inner.lock().logs.get(key).map_or(0, VecDeque::len)
    }

    pub fn is_empty(&self, key: &str) -> bool {
        self.len(key) == 0
    }
}

#[async_trait]
impl AdmissionLog for MemoryAdmissionLog {
    async fn append(&self, key: &str, fields: BTreeMap<String, String>) -> Result<EntryId, BufferError> {
        let mut inner = self.inner.lock();
        let id = inner.next_id();
        inner
            .logs
            .entry(key.to_string())
            .or_default()
            .push_back(BufferEntry { id, fields });
        Ok(id)
    }

    async fn read_batch(&self, key: &str, max_count: usize) -> Result<Vec<BufferEntry>, BufferError> {
        let inner = self.inner.lock();
        Ok(inner
            .logs
            .get(key)
            .map(|log| log.iter().take(max_count).cloned().collect())
            .unwrap_or_default())
    }

    async fn trim_max_len(&self, key: &str, max_len: usize) -> Result<usize, BufferError> {
        let mut inner = self.inner.lock();
        let Some(log) = inner.logs.get_mut(key) else {
            return Ok(0);
        };
        let excess = log.len().saturating_sub(max_len);
        log.drain(..excess);
        Ok(excess)
    }

    async fn trim_up_to(&self, key: &str, id: &EntryId) -> Result<usize, BufferError> {
        let mut inner = self.inner.lock();
        let Some(log) = inner.logs.get_mut(key) else {
            return Ok(0);
        };
        let mut removed = 0;
        while log.front().is_some_and(|entry| entry.id <= *id) {
            log.pop_front();
            removed += 1;
        }
        Ok(removed)
    }
}
