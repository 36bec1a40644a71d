use super::{clamp_volume, PlayerEvent, PlayerError, Playback, TrackToken};
use crate::config::AudioConfig;
use rodio::source::EmptyCallback;
use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::thread;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info};

/// How often a fade-out checks on the sink.
pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Where new sinks get attached.
enum Output {
    Device {
        _stream: OutputStream,
        handle: OutputStreamHandle,
    },
    /// Sinks nobody plays; their queue outputs are kept so samples can be
    /// pulled by hand.
    #[cfg(test)]
    Detached(Vec<rodio::queue::SourcesQueueOutput<f32>>),
}

pub struct AudioPlayer {
    output: Output,
    sink: Option<Sink>,
    playing: Option<TrackToken>,
    next_token: u64,
    volume: f32,
    fadeout: Duration,
    event_sender: mpsc::UnboundedSender<PlayerEvent>,
}

impl AudioPlayer {
    /// Acquires the default audio output. Fails when no device is usable.
    pub fn open(
        config: &AudioConfig,
        event_sender: mpsc::UnboundedSender<PlayerEvent>,
    ) -> Result<Self, PlayerError> {
        let (stream, handle) =
            OutputStream::try_default().map_err(|e| PlayerError::Device(e.to_string()))?;
        info!("audio output ready, fade-out {:?}", config.fadeout());

        Ok(Self::with_output(
            Output::Device {
                _stream: stream,
                handle,
            },
            config,
            event_sender,
        ))
    }

    #[cfg(test)]
    fn detached(config: &AudioConfig, event_sender: mpsc::UnboundedSender<PlayerEvent>) -> Self {
        Self::with_output(Output::Detached(Vec::new()), config, event_sender)
    }

    fn with_output(
        output: Output,
        config: &AudioConfig,
        event_sender: mpsc::UnboundedSender<PlayerEvent>,
    ) -> Self {
        Self {
            output,
            sink: None,
            playing: None,
            next_token: 0,
            volume: config.initial_volume(),
            fadeout: config.fadeout(),
            event_sender,
        }
    }

    /// Stops playback with a fade and releases the output.
    pub fn close(mut self) {
        self.stop();
        info!("audio output released");
    }

    pub fn is_busy(&self) -> bool {
        self.sink.as_ref().map_or(false, |sink| !sink.empty())
    }

    fn new_sink(&mut self) -> Result<Sink, PlayerError> {
        match &mut self.output {
            Output::Device { handle, .. } => {
                Sink::try_new(handle).map_err(|e| PlayerError::Device(e.to_string()))
            }
            #[cfg(test)]
            Output::Detached(outputs) => {
                let (sink, output) = Sink::new_idle();
                outputs.push(output);
                Ok(sink)
            }
        }
    }

    fn start(&mut self, path: &Path) -> Result<TrackToken, PlayerError> {
        let file = File::open(path).map_err(|source| PlayerError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        let source = Decoder::new(BufReader::new(file)).map_err(|e| PlayerError::Decode {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let sink = self.new_sink()?;
        sink.set_volume(self.volume);

        self.next_token += 1;
        let token = TrackToken(self.next_token);

        sink.append(source);
        // Runs once the decoded track has been drained
        let sender = self.event_sender.clone();
        sink.append(EmptyCallback::<f32>::new(Box::new(move || {
            let _ = sender.send(PlayerEvent::Finished(token));
        })));

        self.sink = Some(sink);
        self.playing = Some(token);
        Ok(token)
    }

    /// Ramps the sink volume down over the fade-out duration, leaving early
    /// when the track runs out on its own.
    fn fade_out(&self, sink: &Sink) {
        let (steps, step_duration) = fade_steps(self.fadeout);
        let start_volume = sink.volume();

        for step in 1..=steps {
            if sink.empty() {
                break;
            }
            let remaining = 1.0 - step as f32 / steps as f32;
            sink.set_volume(start_volume * remaining);
            thread::sleep(step_duration);
        }
    }
}

impl Playback for AudioPlayer {
    fn volume(&self) -> f32 {
        self.volume
    }

    fn set_volume(&mut self, volume: f32) {
        let clamped = clamp_volume(volume);
        debug!("set volume {:.2}", clamped);
        self.volume = clamped;

        if let Some(sink) = self.sink.as_ref() {
            sink.set_volume(clamped);
        }
    }

    fn play(&mut self, path: Option<&Path>) -> Result<Option<TrackToken>, PlayerError> {
        self.stop();

        let Some(path) = path else {
            return Ok(None);
        };

        debug!("play song {}", path.display());
        self.start(path).map(Some)
    }

    fn stop(&mut self) {
        let token = self.playing.take();

        if !self.is_busy() {
            self.sink = None;
            return;
        }
        let Some(sink) = self.sink.take() else {
            return;
        };

        if let Some(token) = token {
            let _ = self.event_sender.send(PlayerEvent::Stopped(token));
        }

        debug!("fade out song in {} [ms]", self.fadeout.as_millis());
        self.fade_out(&sink);
        sink.stop();
        debug!("song stopped");
    }
}

/// Splits a fade-out into steps of about [`POLL_INTERVAL`].
fn fade_steps(fadeout: Duration) -> (u32, Duration) {
    let steps = fadeout.as_millis() / POLL_INTERVAL.as_millis();
    let steps = u32::try_from(steps).unwrap_or(u32::MAX).max(1);
    (steps, fadeout / steps)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::PathBuf;

    /// 16-bit mono PCM WAV holding `samples` frames of a quiet ramp.
    fn write_wav(path: &Path, samples: u32) {
        let data_len = samples * 2;
        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"RIFF");
        bytes.extend_from_slice(&(36 + data_len).to_le_bytes());
        bytes.extend_from_slice(b"WAVEfmt ");
        bytes.extend_from_slice(&16u32.to_le_bytes());
        bytes.extend_from_slice(&1u16.to_le_bytes()); // PCM
        bytes.extend_from_slice(&1u16.to_le_bytes()); // mono
        bytes.extend_from_slice(&8000u32.to_le_bytes());
        bytes.extend_from_slice(&16000u32.to_le_bytes());
        bytes.extend_from_slice(&2u16.to_le_bytes());
        bytes.extend_from_slice(&16u16.to_le_bytes());
        bytes.extend_from_slice(b"data");
        bytes.extend_from_slice(&data_len.to_le_bytes());
        for i in 0..samples {
            bytes.extend_from_slice(&((i as i16) * 64).to_le_bytes());
        }
        fs::write(path, bytes).unwrap();
    }

    fn instant_config() -> AudioConfig {
        AudioConfig {
            fadeout_seconds: 0.0,
            volume: 0.5,
        }
    }

    fn player_with_song() -> (
        AudioPlayer,
        mpsc::UnboundedReceiver<PlayerEvent>,
        tempfile::TempDir,
        PathBuf,
    ) {
        let dir = tempfile::tempdir().unwrap();
        let song = dir.path().join("tone.wav");
        write_wav(&song, 16);
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        (AudioPlayer::detached(&instant_config(), event_tx), event_rx, dir, song)
    }

    fn drain(events: &mut mpsc::UnboundedReceiver<PlayerEvent>) -> Vec<PlayerEvent> {
        let mut seen = Vec::new();
        while let Ok(event) = events.try_recv() {
            seen.push(event);
        }
        seen
    }

    #[test]
    fn test_fade_steps_follow_poll_interval() {
        assert_eq!(fade_steps(Duration::from_secs(1)), (10, Duration::from_millis(100)));
        assert_eq!(fade_steps(Duration::from_millis(550)), (5, Duration::from_millis(110)));
    }

    #[test]
    fn test_short_fades_take_one_step() {
        assert_eq!(fade_steps(Duration::from_millis(40)), (1, Duration::from_millis(40)));
        assert_eq!(fade_steps(Duration::ZERO), (1, Duration::ZERO));
    }

    #[test]
    fn test_huge_fades_do_not_wrap() {
        let (steps, _) = fade_steps(Duration::MAX);
        assert_eq!(steps, u32::MAX);
    }

    #[test]
    fn test_stop_when_idle_does_nothing() {
        let (mut player, mut events, _dir, _song) = player_with_song();

        player.stop();
        assert!(!player.is_busy());
        assert!(drain(&mut events).is_empty());
    }

    #[test]
    fn test_each_play_issues_new_token() {
        let (mut player, mut events, _dir, song) = player_with_song();

        let first = player.play(Some(&song)).unwrap();
        assert_eq!(first, Some(TrackToken(1)));
        assert!(player.is_busy());

        let second = player.play(Some(&song)).unwrap();
        assert_eq!(second, Some(TrackToken(2)));

        // Replacing the first track faded it out
        assert_eq!(drain(&mut events), vec![PlayerEvent::Stopped(TrackToken(1))]);
    }

    #[test]
    fn test_stop_reports_and_clears_track() {
        let (mut player, mut events, _dir, song) = player_with_song();
        let token = player.play(Some(&song)).unwrap().unwrap();

        player.stop();
        assert!(!player.is_busy());
        assert_eq!(player.playing, None);
        assert_eq!(drain(&mut events), vec![PlayerEvent::Stopped(token)]);

        player.stop();
        assert!(drain(&mut events).is_empty());
    }

    #[test]
    fn test_play_none_only_stops() {
        let (mut player, mut events, _dir, song) = player_with_song();
        let token = player.play(Some(&song)).unwrap().unwrap();

        assert_eq!(player.play(None).unwrap(), None);
        assert!(!player.is_busy());
        assert_eq!(drain(&mut events), vec![PlayerEvent::Stopped(token)]);
    }

    #[test]
    fn test_missing_file_is_an_open_error() {
        let (mut player, _events, dir, _song) = player_with_song();

        let result = player.play(Some(&dir.path().join("gone.wav")));
        assert!(matches!(result, Err(PlayerError::Open { .. })));
        assert!(!player.is_busy());
    }

    #[test]
    fn test_volume_reaches_sink() {
        let (mut player, _events, _dir, song) = player_with_song();
        player.play(Some(&song)).unwrap();

        player.set_volume(1.4);
        assert_eq!(player.volume(), 1.0);
        assert_eq!(player.sink.as_ref().unwrap().volume(), 1.0);
    }

    #[test]
    fn test_natural_end_sends_finished() {
        let (mut player, mut events, _dir, song) = player_with_song();
        let token = player.play(Some(&song)).unwrap().unwrap();

        let Output::Detached(outputs) = &mut player.output else {
            panic!("test player must be detached");
        };
        let output = outputs.last_mut().unwrap();

        let mut seen = Vec::new();
        for _ in 0..100_000 {
            let _ = output.next();
            seen.extend(drain(&mut events));
            if !seen.is_empty() {
                break;
            }
        }
        assert_eq!(seen, vec![PlayerEvent::Finished(token)]);

        // A finished track needs no fade and reports no stop
        player.stop();
        assert!(drain(&mut events).is_empty());
    }
}
