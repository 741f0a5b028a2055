// Scrobbler Library - play tracking and durable listening-history submission
// Modular design makes it easy to swap the remote client or the display

pub mod config;    // settings and preferences
pub mod display;   // now-playing display sinks
pub mod queue;     // pending scrobbles, oldest first
pub mod remote;    // listening-history service client
pub mod scrobbler; // lifecycle controller + submission service
pub mod store;     // survives restarts
pub mod track;     // track records and play/skip rules

// Export the stuff other modules actually use
pub use config::Config;
pub use remote::{RemoteClient, RemoteError, Session};
pub use scrobbler::{ScrobblerEvent, ScrobblerService, ServiceMode, ServiceOptions};
pub use store::QueueStore;
pub use track::{Rating, TrackRecord, TrackSnapshot};
