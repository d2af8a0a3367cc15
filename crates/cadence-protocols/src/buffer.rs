//! Admission log protocol: an ordered append/trim log of field maps.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;

use crate::error::BufferError;

/// Position of an entry in the log, ordered by time then sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntryId {
    pub millis: u64,
    pub seq: u64,
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.millis, self.seq)
    }
}

impl FromStr for EntryId {
    type Err = BufferError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (millis, seq) = s
            .split_once('-')
            .ok_or_else(|| BufferError::InvalidEntryId(s.to_string()))?;
        let parse = |v: &str| v.parse::<u64>().map_err(|_| BufferError::InvalidEntryId(s.to_string()));
        Ok(Self {
            millis: parse(millis)?,
            seq: parse(seq)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferEntry {
    pub id: EntryId,
    pub fields: BTreeMap<String, String>,
}

#[async_trait]
pub trait AdmissionLog: Send + Sync {
    /// Append an entry, returning its id.
    async fn append(&self, key: &str, fields: BTreeMap<String, String>) -> Result<EntryId, BufferError>;

    /// Read up to `max_count` of the oldest entries without removing them.
    async fn read_batch(&self, key: &str, max_count: usize) -> Result<Vec<BufferEntry>, BufferError>;

    /// Keep only the newest `max_len` entries. Returns how many were dropped.
    async fn trim_max_len(&self, key: &str, max_len: usize) -> Result<usize, BufferError>;

    /// Drop every entry with an id `<= id`. Idempotent.
    async fn trim_up_to(&self, key: &str, id: &EntryId) -> Result<usize, BufferError>;
}
