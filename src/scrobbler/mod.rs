// Scrobbler core - turns playback events into scrobbles and gets them to the server
// The controller decides what counts, the service decides when to send

pub mod clock;      // wall clock, swappable in tests
pub mod controller; // current-track slot + pending queue
pub mod events;     // inbound events and the JSON-lines feed
pub mod lifetime;   // when the host may shut us down
pub mod service;    // the actor loop and background jobs

pub use clock::{Clock, ManualClock, SystemClock};
pub use controller::{Controller, Finalized};
pub use events::{forward_json_lines, EventHandler, ScrobblerEvent};
pub use lifetime::{JobStatus, Lifetime};
pub use service::{JobKind, ScrobblerService, ServiceMode, ServiceOptions, ServiceSummary, SubmitError};
