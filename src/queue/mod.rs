// Pending queue - finalized records waiting to be submitted, oldest first

use crate::track::TrackRecord;
use std::collections::VecDeque;
use thiserror::Error;
use tracing::error;
use uuid::Uuid;

pub const DEFAULT_CAPACITY: usize = 200;

#[derive(Debug, Error)]
pub enum QueueError {
    /// The queue is at capacity; the rejected record is handed back
    #[error("pending queue is full ({capacity} entries)")]
    Full {
        capacity: usize,
        record: Box<TrackRecord>,
    },
}

#[derive(Debug, Clone)]
pub struct PendingQueue {
    entries: VecDeque<TrackRecord>,
    capacity: usize,
}

impl PendingQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    /// Rebuild from persisted records. Anything past capacity is logged and left out.
    pub fn restore(records: Vec<TrackRecord>, capacity: usize) -> Self {
        let mut queue = Self::new(capacity);
        for record in records {
            if let Err(QueueError::Full { record, .. }) = queue.push(record) {
                error!(
                    artist = %record.artist,
                    title = %record.title,
                    start_time = record.start_time(),
                    "Dropping restored scrobble, queue over capacity"
                );
            }
        }
        queue
    }

    pub fn push(&mut self, record: TrackRecord) -> Result<(), QueueError> {
        if self.entries.len() >= self.capacity {
            return Err(QueueError::Full {
                capacity: self.capacity,
                record: Box::new(record),
            });
        }
        self.entries.push_back(record);
        Ok(())
    }

    /// Remove a submitted entry. Submissions come back in order, so this is almost always the head.
    pub fn remove(&mut self, id: Uuid) -> Option<TrackRecord> {
        if self.entries.front().map(|e| e.id) == Some(id) {
            return self.entries.pop_front();
        }
        let pos = self.entries.iter().position(|e| e.id == id)?;
        self.entries.remove(pos)
    }

    pub fn front(&self) -> Option<&TrackRecord> {
        self.entries.front()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TrackRecord> {
        self.entries.iter()
    }

    /// Copy of the entries in submission order
    pub fn to_vec(&self) -> Vec<TrackRecord> {
        self.entries.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

}

impl Default for PendingQueue {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
