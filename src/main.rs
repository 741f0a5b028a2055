// Scrobbler - listening-history daemon
// Started as a tiny "post what's playing" helper, now keeps plays safe across offline stretches

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use scrobbler::{
    config::Config,
    display::{LogDisplay, TrackDisplay},
    remote::JournalClient,
    scrobbler::{forward_json_lines, EventHandler, ScrobblerEvent, ScrobblerService, ServiceMode, ServiceOptions},
    store::QueueStore,
    track::TrackInfo,
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::BufReader;
use tracing::{debug, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "scrobbler")]
#[command(about = "Tracks what you play and submits it to your listening history, even after being offline")]
struct Args {
    /// Config file (defaults to the platform config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable developer logging (stderr + debug output)
    #[arg(long, global = true)]
    dev: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run as a daemon, reading JSON-lines events from stdin
    Run,
    /// Handle a single event and exit once its background work is done
    Send {
        #[command(subcommand)]
        event: EventArg,
    },
    /// Show the saved current track and pending queue
    Status,
}

#[derive(Subcommand)]
enum EventArg {
    /// A new track started
    TrackChanged {
        #[arg(long)]
        title: String,
        #[arg(long)]
        artist: String,
        #[arg(long, default_value = "")]
        album: String,
        /// Track length in milliseconds (0 if unknown)
        #[arg(long, default_value_t = 0)]
        duration_ms: u64,
        /// How far into the track playback already is, in milliseconds
        #[arg(long, default_value_t = 0)]
        position_ms: u64,
        #[arg(long, default_value = "")]
        track_auth: String,
    },
    /// Playback of the current track finished
    Finished,
    /// Love the current track
    Love,
    /// Ban the current track
    Ban,
    /// Network came back
    Online,
    /// Network went away
    Offline,
    /// Result of asking the player what it's doing
    PlayerState {
        #[arg(long)]
        playing: bool,
        #[arg(long, default_value_t = 0)]
        position_ms: u64,
        #[arg(long, default_value_t = 0)]
        duration_ms: u64,
        #[arg(long, default_value = "")]
        title: String,
        #[arg(long, default_value = "")]
        artist: String,
        #[arg(long, default_value = "")]
        album: String,
        #[arg(long, default_value = "")]
        track_auth: String,
    },
}

impl From<EventArg> for ScrobblerEvent {
    fn from(arg: EventArg) -> Self {
        match arg {
            EventArg::TrackChanged {
                title,
                artist,
                album,
                duration_ms,
                position_ms,
                track_auth,
            } => ScrobblerEvent::track_changed(
                TrackInfo {
                    title,
                    artist,
                    album,
                    duration_ms,
                    track_auth,
                },
                position_ms,
            ),
            EventArg::Finished => ScrobblerEvent::PlaybackFinished,
            EventArg::Love => ScrobblerEvent::Love,
            EventArg::Ban => ScrobblerEvent::Ban,
            EventArg::Online => ScrobblerEvent::ConnectivityChanged { connected: true },
            EventArg::Offline => ScrobblerEvent::ConnectivityChanged { connected: false },
            EventArg::PlayerState {
                playing,
                position_ms,
                duration_ms,
                title,
                artist,
                album,
                track_auth,
            } => ScrobblerEvent::PlayerState {
                is_playing: playing,
                position_ms,
                duration_ms,
                title,
                artist,
                album,
                track_auth,
            },
        }
    }
}

fn init_logging(config: &Config, dev: bool) -> Result<WorkerGuard> {
    std::fs::create_dir_all(&config.logging.directory)
        .with_context(|| format!("creating log dir {}", config.logging.directory.display()))?;

    // Daily rotating file appender
    let file_appender = tracing_appender::rolling::daily(&config.logging.directory, "scrobbler.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.filter));

    let file_layer = fmt::layer()
        .with_writer(file_writer)
        .with_target(true)
        .with_level(true)
        .with_ansi(false);

    // dev mode also mirrors everything to stderr
    let stderr_layer = dev.then(|| fmt::layer().with_writer(std::io::stderr).with_target(true));

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(stderr_layer)
        .try_init()?;

    Ok(guard)
}

#[cfg(feature = "notify")]
fn display_for(config: &Config) -> Arc<dyn TrackDisplay> {
    if config.display.notifications {
        return Arc::new(scrobbler::display::NotifyDisplay::new(
            config.display.notification_duration_ms,
        ));
    }
    Arc::new(LogDisplay)
}

#[cfg(not(feature = "notify"))]
fn display_for(config: &Config) -> Arc<dyn TrackDisplay> {
    if config.display.notifications {
        warn!("Notifications requested but built without the `notify` feature");
    }
    Arc::new(LogDisplay)
}

fn build_service(config: &Config, mode: ServiceMode) -> Result<ScrobblerService> {
    let store = QueueStore::new(&config.state_dir)
        .with_context(|| format!("opening state dir {}", config.state_dir.display()))?;
    let client = Arc::new(JournalClient::new(&config.state_dir));
    let session = config.session();
    if session.is_none() {
        warn!("No session key configured; plays will be queued but not submitted");
    }

    let options = ServiceOptions {
        mode,
        scrobble_media_player: config.scrobbling.scrobble_media_player,
        queue_capacity: config.scrobbling.queue_capacity,
    };

    Ok(ScrobblerService::new(store, client, display_for(config), options).with_session(session))
}

async fn run_daemon(config: &Config) -> Result<()> {
    let service = build_service(config, ServiceMode::Daemon)?;
    let (sender, receiver) = EventHandler::new().into_parts();

    // stdin feeder owns the only sender; when it ends the service drains and stops
    let feeder = tokio::spawn(async move {
        let stdin = BufReader::new(tokio::io::stdin());
        forward_json_lines(stdin, sender).await
    });
    let feeder_abort = feeder.abort_handle();

    let service_task = tokio::spawn(service.run(receiver));

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted, finishing up");
            feeder_abort.abort();
        }
        result = feeder => match result {
            Ok(Ok(count)) => debug!("Input finished after {} events", count),
            Ok(Err(e)) => warn!("Event input failed: {}", e),
            Err(e) => warn!("Event reader stopped: {}", e),
        },
    }

    let summary = service_task.await.context("scrobbler service panicked")?;
    info!(
        queued = summary.queued,
        dropped = summary.dropped_on_overflow,
        "Daemon exiting"
    );
    Ok(())
}

async fn send_event(config: &Config, event: ScrobblerEvent) -> Result<()> {
    let service = build_service(config, ServiceMode::OneShot)?;
    let (sender, receiver) = EventHandler::new().into_parts();
    sender.send(event).context("queueing event")?;
    drop(sender);

    let summary = service.run(receiver).await;
    println!("queued: {}", summary.queued);
    if let Some(track) = summary.current {
        println!("current: {} - {} ({})", track.artist, track.title, track.rating.code());
    }
    Ok(())
}

fn print_status(config: &Config) -> Result<()> {
    let store = QueueStore::new(&config.state_dir)?;
    let state = store.restore();

    match &state.current {
        Some(track) => println!(
            "Current: {} - {} (started {}, rating '{}', now playing sent: {})",
            track.artist,
            track.title,
            track.start_time(),
            track.rating.code(),
            track.posted_now_playing
        ),
        None => println!("Current: nothing"),
    }

    println!("Pending scrobbles: {}", state.queue.len());
    for (i, track) in state.queue.iter().enumerate() {
        println!(
            "  {:>3}. {} - {} @ {} '{}'",
            i + 1,
            track.artist,
            track.title,
            track.start_time(),
            track.rating.code()
        );
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Load config - falls back to defaults if missing
    let config = match &args.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };

    let _guard = init_logging(&config, args.dev)?;
    info!("Scrobbler starting up");

    match args.command {
        Command::Run => run_daemon(&config).await,
        Command::Send { event } => send_event(&config, event.into()).await,
        Command::Status => print_status(&config),
    }
}
