// Terminal side of the jukebox - raw key input, no screen drawing
// The board usually runs headless, so a missing terminal is not an error.

pub mod events;
pub mod stderr;

pub use events::{Key, KeySource, TerminalKeys};
pub use stderr::QuietStderr;

use anyhow::Result;
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};

/// Puts the terminal into raw mode so single key presses arrive unbuffered
/// and unechoed. Restores the terminal on drop.
pub struct TerminalGuard {
    _private: (),
}

impl TerminalGuard {
    pub fn new() -> Result<Self> {
        // Ensure clean terminal state first
        let _ = disable_raw_mode();
        enable_raw_mode()?;

        Ok(Self { _private: () })
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
    }
}
