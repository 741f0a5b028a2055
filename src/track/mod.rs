// Track records - one entry per playback instance
// A record is "current" while it plays, then frozen and handed to the queue

pub mod classify;

pub use classify::{classify, Classification, PLAYED_FLOOR_SECONDS};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Rating attached to a record when it gets submitted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Rating {
    #[default]
    None,
    Loved,
    Banned,
    Skipped,
}

impl Rating {
    /// Single-letter code the listening-history protocol expects
    pub fn code(&self) -> &'static str {
        match self {
            Rating::None => "",
            Rating::Loved => "L",
            Rating::Banned => "B",
            Rating::Skipped => "S",
        }
    }

    pub fn is_set(&self) -> bool {
        !matches!(self, Rating::None)
    }
}

/// Metadata a player reports when a new track starts
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackInfo {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub artist: String,
    #[serde(default)]
    pub album: String,
    #[serde(default)]
    pub duration_ms: u64,
    #[serde(default)]
    pub track_auth: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackRecord {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    pub title: String,
    pub artist: String,
    pub album: String,
    pub duration_ms: u64, // 0 when the player didn't know
    start_time: i64,      // epoch seconds, fixed at creation
    #[serde(default)]
    pub track_auth: String,
    #[serde(default)]
    pub rating: Rating,
    #[serde(default)]
    pub posted_now_playing: bool,
}

impl TrackRecord {
    /// Start a record at `now`, back-dated by how far into the track playback already is
    pub fn started(info: TrackInfo, now: i64, position_ms: u64) -> Self {
        let position = (position_ms / 1000) as i64;
        let start_time = now.saturating_sub(position);

        Self {
            id: Uuid::new_v4(),
            title: info.title,
            artist: info.artist,
            album: info.album,
            duration_ms: info.duration_ms,
            start_time,
            track_auth: info.track_auth,
            rating: Rating::None,
            posted_now_playing: false,
        }
    }

    pub fn start_time(&self) -> i64 {
        self.start_time
    }

    pub fn has_track_auth(&self) -> bool {
        !self.track_auth.is_empty()
    }

    pub fn snapshot(&self) -> TrackSnapshot {
        TrackSnapshot {
            id: self.id,
            title: self.title.clone(),
            artist: self.artist.clone(),
            album: self.album.clone(),
            duration_ms: self.duration_ms,
            track_auth: self.track_auth.clone(),
        }
    }
}

/// Read-only copy of a record's public fields, safe to hand to a background job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackSnapshot {
    pub id: Uuid,
    pub title: String,
    pub artist: String,
    pub album: String,
    pub duration_ms: u64,
    pub track_auth: String,
}
