use super::clock::{Clock, SystemClock};
use super::controller::Controller;
use super::events::ScrobblerEvent;
use super::lifetime::{JobStatus, Lifetime};
use crate::display::TrackDisplay;
use crate::queue::DEFAULT_CAPACITY;
use crate::remote::{RemoteClient, Session};
use crate::store::QueueStore;
use crate::track::{Rating, TrackInfo, TrackRecord, TrackSnapshot};
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::{AbortHandle, JoinHandle};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SubmitError {
    #[error("no session, sign in before scrobbling")]
    NoSession,

    #[error("{0} already in flight")]
    AlreadyRunning(JobKind),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobKind {
    NowPlaying,
    Flush,
}

impl std::fmt::Display for JobKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobKind::NowPlaying => write!(f, "now playing"),
            JobKind::Flush => write!(f, "flush"),
        }
    }
}

/// Sent from background jobs back into the service loop
#[derive(Debug)]
enum JobMessage {
    FlushProgress { entry_id: Uuid },
    Finished { job_id: u64, outcome: JobOutcome },
}

#[derive(Debug)]
enum JobOutcome {
    NowPlaying { track_id: Uuid, success: bool },
    Flush { submitted: usize, failed: bool },
    Crashed { kind: JobKind, error: String },
}

impl JobOutcome {
    fn kind(&self) -> JobKind {
        match self {
            JobOutcome::NowPlaying { .. } => JobKind::NowPlaying,
            JobOutcome::Flush { .. } => JobKind::Flush,
            JobOutcome::Crashed { kind, .. } => *kind,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceMode {
    /// Long-running: save state whenever idle, stop at end of input
    Daemon,
    /// Handle what arrives, stop as soon as nothing is in flight
    OneShot,
}

#[derive(Debug, Clone)]
pub struct ServiceOptions {
    pub mode: ServiceMode,
    pub scrobble_media_player: bool,
    pub queue_capacity: usize,
}

impl Default for ServiceOptions {
    fn default() -> Self {
        Self {
            mode: ServiceMode::Daemon,
            scrobble_media_player: true,
            queue_capacity: DEFAULT_CAPACITY,
        }
    }
}

/// State left behind when the service stops
#[derive(Debug, Clone)]
pub struct ServiceSummary {
    pub current: Option<TrackRecord>,
    pub queued: usize,
    pub dropped_on_overflow: u64,
}

struct RunningJob {
    id: u64,
    supervisor: JoinHandle<()>,
    job: AbortHandle,
}

impl RunningJob {
    fn abort(self) {
        // supervisor first, so it can't report the cancelled job
        self.supervisor.abort();
        self.job.abort();
    }
}

/// The scrobbler actor.
///
/// Events and job completions are handled one at a time on the task that drives `run`.
/// Network calls happen in spawned jobs that only see snapshots and report back over a channel,
/// so controller state is never touched concurrently and never held across I/O.
pub struct ScrobblerService {
    controller: Controller,
    store: QueueStore,
    client: Arc<dyn RemoteClient>,
    session: Option<Session>,
    display: Arc<dyn TrackDisplay>,
    clock: Arc<dyn Clock>,
    options: ServiceOptions,
    now_playing_job: Option<RunningJob>,
    flush_job: Option<RunningJob>,
    connectivity_lost: bool,
    next_job_id: u64,
    job_tx: mpsc::UnboundedSender<JobMessage>,
    job_rx: mpsc::UnboundedReceiver<JobMessage>,
}

impl ScrobblerService {
    /// Build the service, restoring whatever the last run left in the store
    pub fn new(
        store: QueueStore,
        client: Arc<dyn RemoteClient>,
        display: Arc<dyn TrackDisplay>,
        options: ServiceOptions,
    ) -> Self {
        let controller = Controller::restore(store.restore(), options.queue_capacity);
        let (job_tx, job_rx) = mpsc::unbounded_channel();

        Self {
            controller,
            store,
            client,
            session: None,
            display,
            clock: Arc::new(SystemClock),
            options,
            now_playing_job: None,
            flush_job: None,
            connectivity_lost: false,
            next_job_id: 0,
            job_tx,
            job_rx,
        }
    }

    pub fn with_session(mut self, session: Option<Session>) -> Self {
        self.session = session;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn controller(&self) -> &Controller {
        &self.controller
    }

    pub fn job_status(&self) -> JobStatus {
        JobStatus {
            now_playing_in_flight: self.now_playing_job.is_some(),
            flush_in_flight: self.flush_job.is_some(),
            connectivity_lost: self.connectivity_lost,
        }
    }

    /// Drive the service until the lifetime policy lets it stop, then save state
    pub async fn run(mut self, mut events: mpsc::UnboundedReceiver<ScrobblerEvent>) -> ServiceSummary {
        let mut input_open = true;
        info!(
            mode = ?self.options.mode,
            queued = self.controller.queue().len(),
            has_current = self.controller.current().is_some(),
            "Scrobbler service started"
        );

        loop {
            tokio::select! {
                event = events.recv(), if input_open => match event {
                    Some(event) => self.handle_event(event),
                    None => {
                        debug!("Event stream closed");
                        input_open = false;
                    }
                },
                Some(message) = self.job_rx.recv() => self.handle_job_message(message),
            }

            match self.job_status().lifetime() {
                Lifetime::KeepAlive => {}
                Lifetime::MayTerminate => {
                    if self.options.mode == ServiceMode::OneShot || !input_open {
                        break;
                    }
                    self.checkpoint();
                }
                Lifetime::ShutdownNow => {
                    self.abort_jobs();
                    self.connectivity_lost = false;
                    if self.options.mode == ServiceMode::OneShot || !input_open {
                        break;
                    }
                    self.checkpoint();
                }
            }
        }

        self.shutdown()
    }

    /// Apply one external event. Synchronous; may start background jobs.
    pub fn handle_event(&mut self, event: ScrobblerEvent) {
        let now = self.clock.now();
        debug!(event = event.kind(), now, "Handling event");

        match event {
            ScrobblerEvent::TrackChanged {
                title,
                artist,
                album,
                duration_ms,
                position_ms,
                track_auth,
            } => {
                let info = TrackInfo {
                    title,
                    artist,
                    album,
                    duration_ms,
                    track_auth,
                };
                self.track_changed(info, position_ms, now);
            }
            ScrobblerEvent::PlaybackFinished => {
                self.controller.finish_current(now);
            }
            ScrobblerEvent::Love => {
                self.controller.rate_current(Rating::Loved);
            }
            ScrobblerEvent::Ban => {
                self.controller.rate_current(Rating::Banned);
            }
            ScrobblerEvent::ConnectivityChanged { connected } => {
                if connected {
                    self.connectivity_restored();
                } else {
                    info!("Connectivity lost");
                    self.connectivity_lost = true;
                }
            }
            ScrobblerEvent::PlayerState {
                is_playing,
                position_ms,
                duration_ms,
                title,
                artist,
                album,
                track_auth,
            } => {
                if !self.options.scrobble_media_player {
                    // user may have turned this off mid-track
                    self.controller.discard_current();
                } else if is_playing {
                    let info = TrackInfo {
                        title,
                        artist,
                        album,
                        duration_ms,
                        track_auth,
                    };
                    self.track_changed(info, position_ms, now);
                } else {
                    debug!("Player paused, dropping current track");
                    self.controller.discard_current();
                }
            }
        }

        self.refresh_display();
    }

    fn track_changed(&mut self, info: TrackInfo, position_ms: u64, now: i64) {
        let snapshot = self.controller.start_track(info, position_ms, now);
        log_start(JobKind::NowPlaying, self.start_now_playing(snapshot));
    }

    fn connectivity_restored(&mut self) {
        info!("Connectivity restored");
        self.connectivity_lost = false;

        if let Some(snapshot) = self.controller.pending_now_playing() {
            if self.now_playing_job.is_none() {
                log_start(JobKind::NowPlaying, self.start_now_playing(snapshot));
            }
        }
        if !self.controller.queue().is_empty() && self.flush_job.is_none() {
            log_start(JobKind::Flush, self.start_flush());
        }
    }

    fn handle_job_message(&mut self, message: JobMessage) {
        let (job_id, outcome) = match message {
            JobMessage::FlushProgress { entry_id } => {
                if !self.controller.acknowledge_submitted(entry_id) {
                    warn!(%entry_id, "Submitted entry was no longer queued");
                }
                return;
            }
            JobMessage::Finished { job_id, outcome } => (job_id, outcome),
        };

        let kind = outcome.kind();
        let slot = match kind {
            JobKind::NowPlaying => &mut self.now_playing_job,
            JobKind::Flush => &mut self.flush_job,
        };
        if slot.as_ref().map(|job| job.id) != Some(job_id) {
            debug!(job = %kind, job_id, "Ignoring result of an abandoned job");
            return;
        }
        *slot = None;

        match outcome {
            JobOutcome::NowPlaying { track_id, success } => {
                if !self.controller.record_now_playing(track_id, success) {
                    // the track changed while we were announcing the old one
                    if let Some(snapshot) = self.controller.pending_now_playing() {
                        log_start(JobKind::NowPlaying, self.start_now_playing(snapshot));
                    }
                }
                if self.flush_job.is_none() && !self.controller.queue().is_empty() {
                    log_start(JobKind::Flush, self.start_flush());
                }
            }
            JobOutcome::Flush { submitted, failed } => {
                info!(submitted, remaining = self.controller.queue().len(), failed, "Flush finished");
                // anything queued while the flush ran goes out now
                if !failed && !self.controller.queue().is_empty() {
                    log_start(JobKind::Flush, self.start_flush());
                }
            }
            JobOutcome::Crashed { kind, error } => {
                error!(job = %kind, "Background job died: {}", error);
            }
        }
    }

    fn start_now_playing(&mut self, track: TrackSnapshot) -> Result<(), SubmitError> {
        if self.now_playing_job.is_some() {
            return Err(SubmitError::AlreadyRunning(JobKind::NowPlaying));
        }
        let session = self.session.clone().ok_or(SubmitError::NoSession)?;
        let client = Arc::clone(&self.client);

        let job = self.spawn_job(JobKind::NowPlaying, async move {
            let success = match client.now_playing(&session, &track).await {
                Ok(()) => true,
                Err(e) => {
                    warn!(artist = %track.artist, title = %track.title, "Now playing failed: {}", e);
                    false
                }
            };
            JobOutcome::NowPlaying {
                track_id: track.id,
                success,
            }
        });
        self.now_playing_job = Some(job);
        Ok(())
    }

    fn start_flush(&mut self) -> Result<(), SubmitError> {
        if self.flush_job.is_some() {
            return Err(SubmitError::AlreadyRunning(JobKind::Flush));
        }
        let session = self.session.clone().ok_or(SubmitError::NoSession)?;
        let client = Arc::clone(&self.client);
        let progress = self.job_tx.clone();
        let entries = self.controller.queue().to_vec();

        let job = self.spawn_job(JobKind::Flush, async move {
            info!("Going to submit {} tracks", entries.len());
            let mut submitted = 0;

            for entry in entries {
                if let Err(e) = submit_entry(&*client, &session, &entry).await {
                    warn!(
                        artist = %entry.artist,
                        title = %entry.title,
                        "Unable to submit track: {}",
                        e
                    );
                    return JobOutcome::Flush {
                        submitted,
                        failed: true,
                    };
                }
                submitted += 1;
                if progress.send(JobMessage::FlushProgress { entry_id: entry.id }).is_err() {
                    break;
                }
            }

            JobOutcome::Flush {
                submitted,
                failed: false,
            }
        });
        self.flush_job = Some(job);
        Ok(())
    }

    /// Run a job on its own task; a supervisor turns its result (or its panic) into a message
    fn spawn_job<F>(&mut self, kind: JobKind, job: F) -> RunningJob
    where
        F: Future<Output = JobOutcome> + Send + 'static,
    {
        self.next_job_id += 1;
        let job_id = self.next_job_id;
        let tx = self.job_tx.clone();
        let inner = tokio::spawn(job);
        let job = inner.abort_handle();

        let supervisor = tokio::spawn(async move {
            let outcome = match inner.await {
                Ok(outcome) => outcome,
                Err(e) => JobOutcome::Crashed {
                    kind,
                    error: e.to_string(),
                },
            };
            let _ = tx.send(JobMessage::Finished { job_id, outcome });
        });

        RunningJob {
            id: job_id,
            supervisor,
            job,
        }
    }

    fn abort_jobs(&mut self) {
        if let Some(job) = self.now_playing_job.take() {
            debug!("Abandoning now playing job");
            job.abort();
        }
        if let Some(job) = self.flush_job.take() {
            debug!("Abandoning flush job");
            job.abort();
        }
    }

    fn refresh_display(&self) {
        match self.controller.current() {
            Some(track) => self.display.on_track_changed(&track.title, &track.artist, None),
            None => self.display.on_track_changed("", "", None),
        }
    }

    /// Save the current track and queue
    pub fn checkpoint(&self) {
        self.store
            .persist(self.controller.current(), self.controller.queue().iter());
    }

    fn shutdown(mut self) -> ServiceSummary {
        self.abort_jobs();
        self.checkpoint();

        let summary = ServiceSummary {
            current: self.controller.current().cloned(),
            queued: self.controller.queue().len(),
            dropped_on_overflow: self.controller.dropped_on_overflow(),
        };
        info!(
            queued = summary.queued,
            has_current = summary.current.is_some(),
            dropped = summary.dropped_on_overflow,
            "Scrobbler service stopped"
        );
        summary
    }
}

fn log_start(kind: JobKind, result: Result<(), SubmitError>) {
    match result {
        Ok(()) => debug!(job = %kind, "Started background job"),
        Err(SubmitError::AlreadyRunning(_)) => debug!(job = %kind, "Job already in flight, not starting another"),
        Err(e) => warn!(job = %kind, "Not starting job: {}", e),
    }
}

async fn submit_entry(
    client: &dyn RemoteClient,
    session: &Session,
    entry: &TrackRecord,
) -> Result<(), crate::remote::RemoteError> {
    match entry.rating {
        Rating::Loved => client.love_track(&entry.artist, &entry.title, session.key()).await?,
        Rating::Banned => client.ban_track(&entry.artist, &entry.title, session.key()).await?,
        Rating::None | Rating::Skipped => {}
    }
    client
        .submit(session, &entry.snapshot(), entry.start_time(), entry.rating)
        .await
}
