// Jukebox library - folder-per-playlist player for headless boards
// Each part can be driven on its own, which is how the tests use them

pub mod audio;      // playback with fade-out, end-of-track events
pub mod config;     // settings and defaults
pub mod controller; // dispatch loop and shutdown token
pub mod library;    // folder scanning and watching
pub mod ui;         // raw keyboard input

// Export the stuff the binaries actually use
pub use audio::{AudioPlayer, Playback, PlayerEvent, TrackToken};
pub use config::Config;
pub use controller::{Controller, Shutdown};
pub use library::{CatalogChange, Library, SongList};
