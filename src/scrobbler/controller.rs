use crate::queue::{PendingQueue, QueueError};
use crate::store::RestoredState;
use crate::track::{Rating, TrackInfo, TrackRecord, TrackSnapshot};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// What happened to the current track when it was finalized
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Finalized {
    NoTrack,
    Queued(Rating),
    Discarded,
    /// Queue was full; the record was logged and dropped
    Dropped,
}

/// Owns the current-track slot and the pending queue.
/// Purely synchronous; the service decides when to talk to the network.
#[derive(Debug)]
pub struct Controller {
    current: Option<TrackRecord>,
    queue: PendingQueue,
    dropped_on_overflow: u64,
}

impl Controller {
    pub fn new(capacity: usize) -> Self {
        Self {
            current: None,
            queue: PendingQueue::new(capacity),
            dropped_on_overflow: 0,
        }
    }

    pub fn restore(state: RestoredState, capacity: usize) -> Self {
        Self {
            current: state.current,
            queue: PendingQueue::restore(state.queue, capacity),
            dropped_on_overflow: 0,
        }
    }

    pub fn current(&self) -> Option<&TrackRecord> {
        self.current.as_ref()
    }

    pub fn queue(&self) -> &PendingQueue {
        &self.queue
    }

    pub fn dropped_on_overflow(&self) -> u64 {
        self.dropped_on_overflow
    }

    /// Finalize whatever was playing, then make the new track current.
    /// Returns the snapshot to announce as now playing.
    pub fn start_track(&mut self, info: TrackInfo, position_ms: u64, now: i64) -> TrackSnapshot {
        if self.current.is_some() {
            self.finish_current(now);
        }

        let record = TrackRecord::started(info, now, position_ms);
        info!(
            artist = %record.artist,
            title = %record.title,
            start_time = record.start_time(),
            "Track started"
        );
        let snapshot = record.snapshot();
        self.current = Some(record);
        snapshot
    }

    /// Classify the current track and queue it if it counts. The slot is empty afterwards.
    pub fn finish_current(&mut self, now: i64) -> Finalized {
        let Some(mut record) = self.current.take() else {
            debug!("Playback finished with no current track");
            return Finalized::NoTrack;
        };

        if !record.finalize(now) {
            debug!(
                artist = %record.artist,
                title = %record.title,
                "Short unrated play without track-auth, not queued"
            );
            return Finalized::Discarded;
        }

        let rating = record.rating;
        match self.queue.push(record) {
            Ok(()) => {
                info!("Enqueuing track (Rating:{})", rating.code());
                Finalized::Queued(rating)
            }
            Err(QueueError::Full { capacity, record }) => {
                self.dropped_on_overflow += 1;
                error!(
                    artist = %record.artist,
                    title = %record.title,
                    start_time = record.start_time(),
                    rating = record.rating.code(),
                    capacity,
                    "Scrobble queue full, dropping track"
                );
                Finalized::Dropped
            }
        }
    }

    /// Love or ban the current track. No current track is a no-op.
    pub fn rate_current(&mut self, rating: Rating) -> bool {
        match self.current.as_mut() {
            Some(record) => {
                record.rating = rating;
                info!(artist = %record.artist, title = %record.title, rating = rating.code(), "Rated current track");
                true
            }
            None => {
                warn!(rating = rating.code(), "Rating ignored, nothing is playing");
                false
            }
        }
    }

    /// Forget the current track without classifying it (player paused, or scrobbling disabled)
    pub fn discard_current(&mut self) -> Option<TrackRecord> {
        let discarded = self.current.take();
        if let Some(record) = &discarded {
            debug!(artist = %record.artist, title = %record.title, "Discarded current track");
        }
        discarded
    }

    /// Record a now-playing result. Ignored if the track it was for is no longer current.
    pub fn record_now_playing(&mut self, track_id: Uuid, success: bool) -> bool {
        match self.current.as_mut() {
            Some(record) if record.id == track_id => {
                record.posted_now_playing = success;
                true
            }
            _ => false,
        }
    }

    /// Snapshot of the current track if its now-playing still needs to go out
    pub fn pending_now_playing(&self) -> Option<TrackSnapshot> {
        self.current
            .as_ref()
            .filter(|record| !record.posted_now_playing)
            .map(TrackRecord::snapshot)
    }

    /// Drop a queued entry once it has been submitted
    pub fn acknowledge_submitted(&mut self, entry_id: Uuid) -> bool {
        self.queue.remove(entry_id).is_some()
    }
}
