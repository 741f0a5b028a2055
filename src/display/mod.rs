// Now-playing display - whatever shows the user what's on (widget, notification, log line)
// The scrobbler only ever tells it "this is the track now"; rendering is not our problem

use tracing::info;

pub trait TrackDisplay: Send + Sync {
    /// Empty title and artist mean nothing is playing
    fn on_track_changed(&self, title: &str, artist: &str, artwork: Option<Vec<u8>>);
}

/// Writes track changes to the log
#[derive(Debug, Default)]
pub struct LogDisplay;

impl TrackDisplay for LogDisplay {
    fn on_track_changed(&self, title: &str, artist: &str, _artwork: Option<Vec<u8>>) {
        if title.is_empty() && artist.is_empty() {
            info!("Display: nothing playing");
        } else {
            info!("Display: {} - {}", title, artist);
        }
    }
}

#[cfg(feature = "notify")]
pub use desktop::NotifyDisplay;

#[cfg(feature = "notify")]
mod desktop {
    use super::TrackDisplay;
    use notify_rust::Notification;
    use std::sync::Mutex;
    use tracing::warn;

    /// Desktop notification per new track. Repeats of the same track are skipped.
    pub struct NotifyDisplay {
        timeout_ms: u32,
        last_shown: Mutex<Option<(String, String)>>,
    }

    impl NotifyDisplay {
        pub fn new(timeout_ms: u32) -> Self {
            Self {
                timeout_ms,
                last_shown: Mutex::new(None),
            }
        }
    }

    impl TrackDisplay for NotifyDisplay {
        fn on_track_changed(&self, title: &str, artist: &str, _artwork: Option<Vec<u8>>) {
            let Ok(mut last) = self.last_shown.lock() else {
                return;
            };
            let key = (title.to_string(), artist.to_string());
            if last.as_ref() == Some(&key) {
                return;
            }
            *last = Some(key);

            if title.is_empty() && artist.is_empty() {
                return;
            }

            if let Err(e) = Notification::new()
                .summary(title)
                .body(artist)
                .timeout(notify_rust::Timeout::Milliseconds(self.timeout_ms))
                .show()
            {
                warn!("Failed to show track notification: {}", e);
            }
        }
    }
}
