use super::{RemoteClient, RemoteError, Session};
use crate::track::{Rating, TrackSnapshot};
use async_trait::async_trait;
use serde::Serialize;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::info;

pub const JOURNAL_FILE: &str = "submissions.jsonl";

/// One line of the journal
#[derive(Debug, Serialize)]
#[serde(tag = "call", rename_all = "snake_case")]
enum JournalEntry<'a> {
    NowPlaying {
        user: Option<&'a str>,
        track: &'a TrackSnapshot,
    },
    Submit {
        user: Option<&'a str>,
        track: &'a TrackSnapshot,
        start_time: i64,
        rating: &'static str,
    },
    Love {
        artist: &'a str,
        title: &'a str,
    },
    Ban {
        artist: &'a str,
        title: &'a str,
    },
}

/// Appends every call to a JSON-lines file instead of talking to a server.
/// Handy for running the daemon offline and for checking what would have been sent.
pub struct JournalClient {
    path: PathBuf,
    write_lock: Arc<Mutex<()>>,
}

impl JournalClient {
    pub fn new<P: AsRef<Path>>(state_dir: P) -> Self {
        Self {
            path: state_dir.as_ref().join(JOURNAL_FILE),
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File I/O runs on the blocking pool, off the runtime's worker threads
    async fn append(&self, entry: &JournalEntry<'_>) -> Result<(), RemoteError> {
        let line = serde_json::to_string(entry)
            .map_err(|e| RemoteError::Rejected(format!("unserializable entry: {}", e)))?;
        let path = self.path.clone();
        let write_lock = Arc::clone(&self.write_lock);

        tokio::task::spawn_blocking(move || -> Result<(), RemoteError> {
            let _guard = write_lock
                .lock()
                .map_err(|_| RemoteError::Rejected("journal lock poisoned".to_string()))?;
            let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
            writeln!(file, "{}", line)?;
            Ok(())
        })
        .await
        .map_err(|e| RemoteError::Rejected(format!("journal writer stopped: {}", e)))?
    }
}

#[async_trait]
impl RemoteClient for JournalClient {
    async fn now_playing(&self, session: &Session, track: &TrackSnapshot) -> Result<(), RemoteError> {
        info!(artist = %track.artist, title = %track.title, "Now playing");
        self.append(&JournalEntry::NowPlaying {
            user: session.username(),
            track,
        })
        .await
    }

    async fn submit(
        &self,
        session: &Session,
        track: &TrackSnapshot,
        start_time: i64,
        rating: Rating,
    ) -> Result<(), RemoteError> {
        info!(artist = %track.artist, title = %track.title, rating = rating.code(), "Scrobbled");
        self.append(&JournalEntry::Submit {
            user: session.username(),
            track,
            start_time,
            rating: rating.code(),
        })
        .await
    }

    async fn love_track(&self, artist: &str, title: &str, _session_key: &str) -> Result<(), RemoteError> {
        self.append(&JournalEntry::Love { artist, title }).await
    }

    async fn ban_track(&self, artist: &str, title: &str, _session_key: &str) -> Result<(), RemoteError> {
        self.append(&JournalEntry::Ban { artist, title }).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::track::{TrackInfo, TrackRecord};
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_journal_appends_lines() {
        let dir = tempdir().unwrap();
        let client = JournalClient::new(dir.path());
        let session = Session::new("key", Some("himokai".to_string()));
        let record = TrackRecord::started(
            TrackInfo {
                title: "TAKE ME IN".to_string(),
                artist: "blink-182".to_string(),
                ..Default::default()
            },
            1_000,
            0,
        );
        let track = record.snapshot();

        client.now_playing(&session, &track).await.unwrap();
        client.love_track("blink-182", "TAKE ME IN", session.key()).await.unwrap();
        client.submit(&session, &track, 1_000, Rating::Loved).await.unwrap();

        let content = std::fs::read_to_string(client.path()).unwrap();
        let lines: Vec<serde_json::Value> = content
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0]["call"], "now_playing");
        assert_eq!(lines[0]["user"], "himokai");
        assert_eq!(lines[1]["call"], "love");
        assert_eq!(lines[2]["call"], "submit");
        assert_eq!(lines[2]["rating"], "L");
        assert_eq!(lines[2]["start_time"], 1_000);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_concurrent_appends_stay_whole_lines() {
        let dir = tempdir().unwrap();
        let client = Arc::new(JournalClient::new(dir.path()));

        let mut handles = Vec::new();
        for i in 0..16 {
            let client = client.clone();
            handles.push(tokio::spawn(async move {
                let title = format!("Track {}", i);
                client.love_track("Sleep Token", &title, "key").await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let content = std::fs::read_to_string(client.path()).unwrap();
        let lines: Vec<serde_json::Value> = content
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 16);
        assert!(lines.iter().all(|l| l["call"] == "love"));
    }
}
