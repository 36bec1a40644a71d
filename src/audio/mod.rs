pub mod player;

pub use player::AudioPlayer;

use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PlayerError {
    #[error("audio output unavailable: {0}")]
    Device(String),
    #[error("failed to open audio file {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to decode audio file {path}: {reason}")]
    Decode { path: PathBuf, reason: String },
}

/// Identifies one started track, so a late end-of-track notification can be
/// told apart from the one for the track playing now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TrackToken(pub u64);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayerEvent {
    /// The track ran to its end on its own.
    Finished(TrackToken),
    /// The track was faded out and stopped on request.
    Stopped(TrackToken),
}

/// What the dispatch loop needs from an audio backend.
///
/// `play` and `stop` block while a playing track fades out.
pub trait Playback {
    fn volume(&self) -> f32;

    /// Applies `volume` clamped to `0.0..=1.0`.
    fn set_volume(&mut self, volume: f32);

    /// Fades out whatever plays, then starts `path`. `None` only stops.
    fn play(&mut self, path: Option<&Path>) -> Result<Option<TrackToken>, PlayerError>;

    /// Fades out and stops. Does nothing when idle.
    fn stop(&mut self);
}

pub fn clamp_volume(volume: f32) -> f32 {
    if volume.is_nan() {
        0.0
    } else {
        volume.clamp(0.0, 1.0)
    }
}
