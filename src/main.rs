// Jukebox - folder-per-playlist music player for single-board computers
// Digits pick a folder, arrows set the volume, q or an interrupt shuts down

use anyhow::{Context, Result};
use clap::Parser;
use jukebox::{
    config::LoggingConfig, AudioPlayer, Config, Controller, Library, Shutdown, SongList,
};
use jukebox::ui::{QuietStderr, TerminalKeys};
use std::path::PathBuf;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "jukebox")]
#[command(about = "Plays the folders of a music directory, one key per folder")]
struct Args {
    /// Path to the configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log at debug level
    #[arg(short, long)]
    verbose: bool,

    /// Keep stderr (audio backend messages stay visible)
    #[arg(long)]
    dev: bool,
}

fn init_logging(config: &LoggingConfig, verbose: bool) -> Result<WorkerGuard> {
    std::fs::create_dir_all(&config.directory)
        .with_context(|| format!("cannot create log directory {}", config.directory.display()))?;

    // Daily rotating file appender; the terminal is in raw mode while running
    let file_appender = tracing_appender::rolling::daily(&config.directory, "jukebox.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    let default_filter = if verbose {
        "info,jukebox=debug"
    } else {
        config.filter.as_str()
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let subscriber = tracing_subscriber::fmt()
        .with_writer(file_writer)
        .with_target(true)
        .with_level(true)
        .with_ansi(false)
        .with_env_filter(filter)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    Ok(guard)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = Config::load(args.config.as_deref())?;
    let _log_guard = init_logging(&config.logging, args.verbose)?;

    info!("jukebox starting up");
    println!("Jukebox: 1-9 pick a folder, 0 stops, arrows set the volume, q quits");
    println!("Logs: {}", config.logging.directory.display());

    let quiet_stderr = if args.dev {
        None
    } else {
        debug!("Redirecting stderr to suppress ALSA errors");
        QuietStderr::new()
            .map_err(|e| warn!("stderr stays attached: {}", e))
            .ok()
    };

    let shutdown = Shutdown::new();
    let (ready_tx, ready_rx) = oneshot::channel();

    // The audio output stream must stay on the thread that created it
    let dispatch = {
        let shutdown = shutdown.clone();
        tokio::task::spawn_blocking(move || run_dispatch(config, shutdown, ready_tx))
    };

    if ready_rx.await.is_err() {
        // Dispatch thread gave up before entering its loop
        let outcome = dispatch.await?;
        // Put stderr back so the operator sees why
        drop(quiet_stderr);
        if let Err(e) = &outcome {
            error!("startup failed: {:#}", e);
        }
        return outcome;
    }

    info!("Press Q to shutdown");
    tokio::select! {
        signal = interrupted() => {
            match signal {
                Ok(()) => {
                    info!("interrupt received");
                    shutdown.trigger();
                }
                Err(e) => {
                    warn!("cannot listen for interrupts: {}", e);
                    shutdown.wait().await;
                }
            }
        }
        _ = shutdown.wait() => {}
    }

    info!("Shutting down audio player");
    let outcome = dispatch.await?;
    drop(quiet_stderr);
    outcome?;
    info!("jukebox stopped");

    Ok(())
}

/// Opens audio and library, reports readiness, then runs the dispatch loop
/// until shutdown. Fails without signalling readiness when no audio output
/// can be acquired.
fn run_dispatch(config: Config, shutdown: Shutdown, ready: oneshot::Sender<()>) -> Result<()> {
    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let player = AudioPlayer::open(&config.audio, event_tx).context("cannot start audio playback")?;

    let mut library = Library::open(&config.library);
    log_catalog(library.libraries());
    library.set_on_changed(log_catalog);

    let mut keys = TerminalKeys::new();
    if !keys.is_interactive() {
        info!("running without keyboard, stop with an interrupt");
    }
    let _ = ready.send(());

    let mut controller = Controller::new(player, library, event_rx, shutdown);
    controller.run(&mut keys);

    let (player, mut library) = controller.into_parts();
    library.close();
    player.close();

    Ok(())
}

fn log_catalog(libraries: &[SongList]) {
    info!("audio library has {} libraries", libraries.len());
    for (index, library) in libraries.iter().enumerate() {
        debug!("  [{}] {} ({} songs)", index + 1, library.name(), library.len());
    }
}

/// Ctrl+C from a cooked terminal, or SIGTERM from the service manager.
#[cfg(unix)]
async fn interrupted() -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = signal(SignalKind::terminate())?;
    tokio::select! {
        res = tokio::signal::ctrl_c() => res,
        _ = terminate.recv() => Ok(()),
    }
}

#[cfg(not(unix))]
async fn interrupted() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}
