// Dispatch loop - turns key presses and end-of-track notifications into
// library selections and playback commands. Runs on its own thread.

pub mod shutdown;

pub use shutdown::Shutdown;

use crate::audio::{Playback, PlayerEvent, TrackToken};
use crate::library::Library;
use crate::ui::{Key, KeySource};
use anyhow::Result;
use std::path::Path;
use std::thread;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

pub const VOLUME_STEP: f32 = 0.1;

/// Longest wait for a key before the loop checks everything else again.
pub const IDLE_WAIT: Duration = Duration::from_millis(100);

pub struct Controller<P: Playback> {
    player: P,
    library: Library,
    player_events: mpsc::UnboundedReceiver<PlayerEvent>,
    shutdown: Shutdown,
    now_playing: Option<TrackToken>,
}

impl<P: Playback> Controller<P> {
    pub fn new(
        player: P,
        library: Library,
        player_events: mpsc::UnboundedReceiver<PlayerEvent>,
        shutdown: Shutdown,
    ) -> Self {
        Self {
            player,
            library,
            player_events,
            shutdown,
            now_playing: None,
        }
    }

    pub fn player(&self) -> &P {
        &self.player
    }

    pub fn library(&self) -> &Library {
        &self.library
    }

    pub fn into_parts(self) -> (P, Library) {
        (self.player, self.library)
    }

    /// Runs until the shutdown token is set, then stops playback.
    pub fn run<K: KeySource>(&mut self, keys: &mut K) {
        info!("dispatch loop running");

        while !self.shutdown.is_triggered() {
            self.library.sync_changes();
            self.drain_player_events();

            match keys.poll_key(IDLE_WAIT) {
                Ok(Some(key)) => self.on_key(key),
                Ok(None) => {}
                Err(e) => {
                    warn!("keyboard read failed: {:#}", e);
                    thread::sleep(IDLE_WAIT);
                }
            }
        }

        info!("dispatch loop stopping");
        self.player.stop();
        self.now_playing = None;
    }

    pub fn drain_player_events(&mut self) {
        while let Ok(event) = self.player_events.try_recv() {
            self.on_player_event(event);
        }
    }

    pub fn on_player_event(&mut self, event: PlayerEvent) {
        match event {
            PlayerEvent::Finished(token) if self.now_playing == Some(token) => {
                debug!("track {:?} finished, advancing", token);
                self.library.advance_to_next_song();
                if let Err(e) = self.play_current() {
                    error!("{:#}", e);
                }
            }
            PlayerEvent::Finished(token) => {
                debug!("ignoring stale end of track {:?}", token);
            }
            PlayerEvent::Stopped(token) => {
                debug!("track {:?} faded out", token);
            }
        }
    }

    /// Handles one key press. Failures are logged; they never end the loop.
    pub fn on_key(&mut self, key: Key) {
        if let Err(e) = self.handle_key(key) {
            error!("key {:?}: {:#}", key, e);
        }
    }

    fn handle_key(&mut self, key: Key) -> Result<()> {
        match key {
            Key::VolumeUp => self.player.set_volume(self.player.volume() + VOLUME_STEP),
            Key::VolumeDown => self.player.set_volume(self.player.volume() - VOLUME_STEP),
            Key::Digit(0) => {
                self.now_playing = None;
                self.player.stop();
            }
            Key::Digit(digit @ 1..=9) => self.select_song(usize::from(digit - 1))?,
            Key::Digit(_) => {}
            Key::Quit => {
                debug!("shutdown requested from keyboard");
                self.shutdown.trigger();
            }
        }
        Ok(())
    }

    /// Switches to library `index` if needed, then moves on to its next song.
    /// Selecting the playing library again skips ahead within it.
    fn select_song(&mut self, index: usize) -> Result<()> {
        debug!("select song from library {}", index);
        if self.library.current_library_index() != Some(index) {
            self.library.set_current_library_index(index)?;
        }

        self.library.advance_to_next_song();
        self.play_current()
    }

    fn play_current(&mut self) -> Result<()> {
        let song = self.library.current_song().map(Path::to_path_buf);
        self.now_playing = None;
        self.now_playing = self.player.play(song.as_deref())?;
        Ok(())
    }
}
