// Remote listening-history service - the calls the scrobbler makes, not how they go over the wire

pub mod journal;

pub use journal::JournalClient;

use crate::track::{Rating, TrackSnapshot};
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("network error: {0}")]
    Network(String),

    #[error("rejected by service: {0}")]
    Rejected(String),

    #[error("request timed out")]
    Timeout,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Authenticated session handed over by whatever did the login
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    key: String,
    username: Option<String>,
}

impl Session {
    pub fn new(key: impl Into<String>, username: Option<String>) -> Self {
        Self {
            key: key.into(),
            username,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }
}

/// Client for the listening-history service.
///
/// Every method is a single attempt. Timeouts and retries at the transport level are the
/// implementation's business; the scrobbler treats any `Err` as "try again on the next trigger".
#[async_trait]
pub trait RemoteClient: Send + Sync {
    /// Announce the track that just started
    async fn now_playing(&self, session: &Session, track: &TrackSnapshot) -> Result<(), RemoteError>;

    /// Submit a finished (or rated) play
    async fn submit(
        &self,
        session: &Session,
        track: &TrackSnapshot,
        start_time: i64,
        rating: Rating,
    ) -> Result<(), RemoteError>;

    async fn love_track(&self, artist: &str, title: &str, session_key: &str) -> Result<(), RemoteError>;

    async fn ban_track(&self, artist: &str, title: &str, session_key: &str) -> Result<(), RemoteError>;
}
