use crate::track::TrackInfo;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Everything the outside world can tell the scrobbler.
/// Serialized with a `type` tag so players can feed it JSON lines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ScrobblerEvent {
    // Playback Events
    TrackChanged {
        #[serde(default)]
        title: String,
        #[serde(default)]
        artist: String,
        #[serde(default)]
        album: String,
        #[serde(default)]
        duration_ms: u64,
        #[serde(default)]
        position_ms: u64,
        #[serde(default)]
        track_auth: String,
    },
    PlaybackFinished,

    // Rating Events
    Love,
    Ban,

    // Network Events
    ConnectivityChanged {
        connected: bool,
    },

    /// Answer to "is the player already playing?", asked when the player
    /// doesn't announce the first track itself
    PlayerState {
        is_playing: bool,
        #[serde(default)]
        position_ms: u64,
        #[serde(default)]
        duration_ms: u64,
        #[serde(default)]
        title: String,
        #[serde(default)]
        artist: String,
        #[serde(default)]
        album: String,
        #[serde(default)]
        track_auth: String,
    },
}

impl ScrobblerEvent {
    pub fn track_changed(info: TrackInfo, position_ms: u64) -> Self {
        ScrobblerEvent::TrackChanged {
            title: info.title,
            artist: info.artist,
            album: info.album,
            duration_ms: info.duration_ms,
            position_ms,
            track_auth: info.track_auth,
        }
    }

    /// Short name for logging
    pub fn kind(&self) -> &'static str {
        match self {
            ScrobblerEvent::TrackChanged { .. } => "track_changed",
            ScrobblerEvent::PlaybackFinished => "playback_finished",
            ScrobblerEvent::Love => "love",
            ScrobblerEvent::Ban => "ban",
            ScrobblerEvent::ConnectivityChanged { .. } => "connectivity_changed",
            ScrobblerEvent::PlayerState { .. } => "player_state",
        }
    }
}

pub struct EventHandler {
    event_sender: mpsc::UnboundedSender<ScrobblerEvent>,
    event_receiver: mpsc::UnboundedReceiver<ScrobblerEvent>,
}

impl EventHandler {
    pub fn new() -> Self {
        let (event_sender, event_receiver) = mpsc::unbounded_channel();

        Self {
            event_sender,
            event_receiver,
        }
    }

    /// Split into the sending half and the receiver the service consumes.
    /// Once every sender is gone the service sees end of input.
    pub fn into_parts(
        self,
    ) -> (
        mpsc::UnboundedSender<ScrobblerEvent>,
        mpsc::UnboundedReceiver<ScrobblerEvent>,
    ) {
        (self.event_sender, self.event_receiver)
    }
}

impl Default for EventHandler {
    fn default() -> Self {
        Self::new()
    }
}

/// Forward JSON-lines events until the reader hits EOF. Bad lines are logged and skipped.
pub async fn forward_json_lines<R>(reader: R, sender: mpsc::UnboundedSender<ScrobblerEvent>) -> Result<usize>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    let mut forwarded = 0;

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        match serde_json::from_str::<ScrobblerEvent>(line) {
            Ok(event) => {
                debug!(event = event.kind(), "Received event");
                if sender.send(event).is_err() {
                    // service is gone, nobody left to listen
                    break;
                }
                forwarded += 1;
            }
            Err(e) => warn!("Ignoring malformed event line: {} ({})", line, e),
        }
    }

    Ok(forwarded)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_track_changed_with_defaults() {
        let event: ScrobblerEvent =
            serde_json::from_str(r#"{"type":"track_changed","title":"X","artist":"Y","duration_ms":180000}"#)
                .unwrap();
        assert_eq!(
            event,
            ScrobblerEvent::TrackChanged {
                title: "X".to_string(),
                artist: "Y".to_string(),
                album: String::new(),
                duration_ms: 180_000,
                position_ms: 0,
                track_auth: String::new(),
            }
        );
    }

    #[test]
    fn test_parse_unit_events() {
        let event: ScrobblerEvent = serde_json::from_str(r#"{"type":"love"}"#).unwrap();
        assert_eq!(event, ScrobblerEvent::Love);
        let event: ScrobblerEvent =
            serde_json::from_str(r#"{"type":"connectivity_changed","connected":false}"#).unwrap();
        assert_eq!(event, ScrobblerEvent::ConnectivityChanged { connected: false });
    }

    #[tokio::test]
    async fn test_forward_json_lines_skips_garbage() {
        let input = b"{\"type\":\"love\"}\n\nnot json\n# comment\n{\"type\":\"playback_finished\"}\n";
        let (tx, mut rx) = EventHandler::new().into_parts();

        let forwarded = forward_json_lines(&input[..], tx).await.unwrap();
        assert_eq!(forwarded, 2);
        assert_eq!(rx.recv().await, Some(ScrobblerEvent::Love));
        assert_eq!(rx.recv().await, Some(ScrobblerEvent::PlaybackFinished));
        assert_eq!(rx.recv().await, None);
    }
}
