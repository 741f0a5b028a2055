// Durable queue store - keeps the current track and unsent scrobbles across restarts
// Two JSON documents in the state directory; a missing file just means "nothing saved"

use crate::track::TrackRecord;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

pub const CURRENT_TRACK_FILE: &str = "current_track.json";
pub const QUEUE_FILE: &str = "queue.json";
const QUEUE_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("state file I/O failed: {0}")]
    Io(#[from] io::Error),

    #[error("state file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unsupported queue format version {0}")]
    UnsupportedVersion(u32),
}

/// On-disk layout of the pending queue, independent of how the queue is held in memory
#[derive(Debug, Serialize, Deserialize)]
struct PersistedQueue {
    version: u32,
    entries: Vec<TrackRecord>,
}

/// Everything restored at startup
#[derive(Debug, Default)]
pub struct RestoredState {
    pub current: Option<TrackRecord>,
    pub queue: Vec<TrackRecord>,
}

#[derive(Debug, Clone)]
pub struct QueueStore {
    state_dir: PathBuf,
}

impl QueueStore {
    pub fn new<P: AsRef<Path>>(state_dir: P) -> Result<Self, StoreError> {
        let state_dir = state_dir.as_ref().to_path_buf();
        if !state_dir.exists() {
            fs::create_dir_all(&state_dir)?;
            info!("Created state directory: {}", state_dir.display());
        }
        Ok(Self { state_dir })
    }

    /// Load both slots. Corrupt or unreadable files fall back to empty, never fail startup.
    pub fn restore(&self) -> RestoredState {
        let current = match self.load_current() {
            Ok(current) => current,
            Err(e) => {
                warn!("Discarding saved current track: {}", e);
                None
            }
        };

        let queue = match self.load_queue() {
            Ok(queue) => queue,
            Err(e) => {
                warn!("Discarding saved scrobble queue: {}", e);
                Vec::new()
            }
        };

        debug!(
            has_current = current.is_some(),
            queued = queue.len(),
            "Restored scrobbler state"
        );
        RestoredState { current, queue }
    }

    pub fn load_current(&self) -> Result<Option<TrackRecord>, StoreError> {
        let Some(content) = self.read(CURRENT_TRACK_FILE)? else {
            return Ok(None);
        };
        Ok(Some(serde_json::from_str(&content)?))
    }

    pub fn load_queue(&self) -> Result<Vec<TrackRecord>, StoreError> {
        let Some(content) = self.read(QUEUE_FILE)? else {
            return Ok(Vec::new());
        };
        let persisted: PersistedQueue = serde_json::from_str(&content)?;
        if persisted.version != QUEUE_FORMAT_VERSION {
            return Err(StoreError::UnsupportedVersion(persisted.version));
        }
        Ok(persisted.entries)
    }

    /// Save both slots. Failures are logged and the half-written temp file removed;
    /// the last complete copy stays in place until a new one is renamed over it.
    pub fn persist<'a, I>(&self, current: Option<&TrackRecord>, queue: I)
    where
        I: IntoIterator<Item = &'a TrackRecord>,
    {
        if let Err(e) = self.save_current(current) {
            warn!("Unable to save current track state: {}", e);
            self.discard_partial(CURRENT_TRACK_FILE);
        }

        let entries: Vec<TrackRecord> = queue.into_iter().cloned().collect();
        if let Err(e) = self.save_queue(entries) {
            warn!("Unable to save queue state: {}", e);
            self.discard_partial(QUEUE_FILE);
        }
    }

    pub fn save_current(&self, current: Option<&TrackRecord>) -> Result<(), StoreError> {
        match current {
            Some(track) => {
                let json = serde_json::to_string_pretty(track)?;
                self.write(CURRENT_TRACK_FILE, &json)
            }
            None => self.remove_if_exists(CURRENT_TRACK_FILE),
        }
    }

    pub fn save_queue(&self, entries: Vec<TrackRecord>) -> Result<(), StoreError> {
        if entries.is_empty() {
            return self.remove_if_exists(QUEUE_FILE);
        }

        let count = entries.len();
        let json = serde_json::to_string_pretty(&PersistedQueue {
            version: QUEUE_FORMAT_VERSION,
            entries,
        })?;
        self.write(QUEUE_FILE, &json)?;
        debug!("Saved {} queued scrobbles", count);
        Ok(())
    }

    fn path(&self, name: &str) -> PathBuf {
        self.state_dir.join(name)
    }

    fn tmp_path(&self, name: &str) -> PathBuf {
        self.state_dir.join(format!("{}.tmp", name))
    }

    fn read(&self, name: &str) -> Result<Option<String>, StoreError> {
        match fs::read_to_string(self.path(name)) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    // write-then-rename: the rename replaces the old copy in one step, so a crash
    // leaves either the old file or the new one, never neither
    fn write(&self, name: &str, content: &str) -> Result<(), StoreError> {
        let tmp = self.tmp_path(name);
        fs::write(&tmp, content)?;
        fs::rename(&tmp, self.path(name))?;
        Ok(())
    }

    fn remove_if_exists(&self, name: &str) -> Result<(), StoreError> {
        match fs::remove_file(self.path(name)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn discard_partial(&self, name: &str) {
        let tmp = self.tmp_path(name);
        if tmp.exists() {
            if let Err(e) = fs::remove_file(&tmp) {
                warn!("Failed to remove partial state file {}: {}", tmp.display(), e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::track::{Rating, TrackInfo};
    use tempfile::tempdir;

    fn record(title: &str, rating: Rating) -> TrackRecord {
        let mut record = TrackRecord::started(
            TrackInfo {
                title: title.to_string(),
                artist: "Linkin Park".to_string(),
                album: "From Zero".to_string(),
                duration_ms: 167_000,
                track_auth: "auth".to_string(),
            },
            1_700_000_000,
            12_000,
        );
        record.rating = rating;
        record
    }

    #[test]
    fn test_round_trip() {
        let dir = tempdir().unwrap();
        let store = QueueStore::new(dir.path()).unwrap();

        let mut current = record("Current", Rating::Loved);
        current.posted_now_playing = true;
        let queue = vec![
            record("A", Rating::None),
            record("B", Rating::Skipped),
            record("C", Rating::Banned),
        ];

        store.persist(Some(&current), queue.iter());

        let restored = QueueStore::new(dir.path()).unwrap().restore();
        assert_eq!(restored.current, Some(current));
        assert_eq!(restored.queue, queue);
    }

    #[test]
    fn test_empty_state_leaves_no_files() {
        let dir = tempdir().unwrap();
        let store = QueueStore::new(dir.path()).unwrap();

        store.persist(Some(&record("Stale", Rating::None)), [record("Old", Rating::None)].iter());
        assert!(dir.path().join(CURRENT_TRACK_FILE).exists());
        assert!(dir.path().join(QUEUE_FILE).exists());

        store.persist(None, std::iter::empty());
        assert!(!dir.path().join(CURRENT_TRACK_FILE).exists());
        assert!(!dir.path().join(QUEUE_FILE).exists());

        let restored = store.restore();
        assert!(restored.current.is_none());
        assert!(restored.queue.is_empty());
    }

    #[test]
    fn test_missing_files_restore_empty() {
        let dir = tempdir().unwrap();
        let restored = QueueStore::new(dir.path().join("fresh")).unwrap().restore();
        assert!(restored.current.is_none());
        assert!(restored.queue.is_empty());
    }

    #[test]
    fn test_corrupt_files_fall_back_independently() {
        let dir = tempdir().unwrap();
        let store = QueueStore::new(dir.path()).unwrap();
        store.persist(None, [record("Kept", Rating::None)].iter());

        fs::write(dir.path().join(CURRENT_TRACK_FILE), "{ not json").unwrap();
        let restored = store.restore();
        assert!(restored.current.is_none());
        assert_eq!(restored.queue.len(), 1);

        fs::write(dir.path().join(QUEUE_FILE), "[1, 2,").unwrap();
        let restored = store.restore();
        assert!(restored.queue.is_empty());
    }

    #[test]
    fn test_unknown_queue_version_is_discarded() {
        let dir = tempdir().unwrap();
        let store = QueueStore::new(dir.path()).unwrap();
        fs::write(dir.path().join(QUEUE_FILE), r#"{"version": 99, "entries": []}"#).unwrap();

        assert!(matches!(store.load_queue(), Err(StoreError::UnsupportedVersion(99))));
        assert!(store.restore().queue.is_empty());
    }

    #[test]
    fn test_failed_save_keeps_previous_copy() {
        let dir = tempdir().unwrap();
        let store = QueueStore::new(dir.path()).unwrap();
        let old = vec![record("A", Rating::None), record("B", Rating::Loved)];
        store.persist(None, old.iter());

        // a directory where the temp file should go makes the write fail before the rename
        fs::create_dir(dir.path().join(format!("{}.tmp", QUEUE_FILE))).unwrap();
        store.persist(None, [record("New", Rating::None)].iter());

        assert_eq!(store.restore().queue, old);
    }

    #[test]
    fn test_save_replaces_previous_copy() {
        let dir = tempdir().unwrap();
        let store = QueueStore::new(dir.path()).unwrap();
        store.persist(None, [record("A", Rating::None), record("B", Rating::None)].iter());

        let newer = vec![record("B", Rating::None)];
        store.persist(None, newer.iter());

        assert_eq!(store.restore().queue, newer);
        assert!(!dir.path().join(format!("{}.tmp", QUEUE_FILE)).exists());
    }

    #[test]
    fn test_leftover_temp_file_is_ignored_and_replaced() {
        let dir = tempdir().unwrap();
        let store = QueueStore::new(dir.path()).unwrap();
        // what a crash mid-write leaves behind
        fs::write(dir.path().join(format!("{}.tmp", QUEUE_FILE)), "{\"version\": 1, \"ent").unwrap();
        assert!(store.restore().queue.is_empty());

        let queue = vec![record("A", Rating::None)];
        store.persist(None, queue.iter());
        assert_eq!(store.restore().queue, queue);
    }
}
