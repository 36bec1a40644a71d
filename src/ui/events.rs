use super::TerminalGuard;
use anyhow::Result;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use std::thread;
use std::time::Duration;
use tracing::{debug, warn};

/// Keys the jukebox reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    VolumeUp,
    VolumeDown,
    /// `0` stops, `1`-`9` select a library.
    Digit(u8),
    Quit,
}

impl Key {
    pub fn from_key_event(key: KeyEvent) -> Option<Self> {
        if key.kind != KeyEventKind::Press {
            return None;
        }

        match key.code {
            KeyCode::Up => Some(Key::VolumeUp),
            KeyCode::Down => Some(Key::VolumeDown),
            // Raw mode turns Ctrl+C into a key press instead of SIGINT
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => Some(Key::Quit),
            KeyCode::Char('q') | KeyCode::Char('Q') => Some(Key::Quit),
            KeyCode::Char(c) => c.to_digit(10).map(|d| Key::Digit(d as u8)),
            _ => None,
        }
    }
}

/// Source of key presses for the dispatch loop.
pub trait KeySource {
    /// Waits up to `timeout` for a key. `Ok(None)` means nothing arrived.
    fn poll_key(&mut self, timeout: Duration) -> Result<Option<Key>>;
}

/// Reads keys from the controlling terminal. Without a terminal it only idles.
pub struct TerminalKeys {
    guard: Option<TerminalGuard>,
}

impl TerminalKeys {
    pub fn new() -> Self {
        let guard = match TerminalGuard::new() {
            Ok(guard) => Some(guard),
            Err(e) => {
                warn!("no keyboard input available: {}", e);
                None
            }
        };

        Self { guard }
    }

    pub fn is_interactive(&self) -> bool {
        self.guard.is_some()
    }
}

impl Default for TerminalKeys {
    fn default() -> Self {
        Self::new()
    }
}

impl KeySource for TerminalKeys {
    fn poll_key(&mut self, timeout: Duration) -> Result<Option<Key>> {
        if self.guard.is_none() {
            thread::sleep(timeout);
            return Ok(None);
        }

        if !event::poll(timeout)? {
            return Ok(None);
        }

        match event::read()? {
            Event::Key(key) => {
                let mapped = Key::from_key_event(key);
                if mapped.is_none() {
                    debug!("ignoring key {:?}", key.code);
                }
                Ok(mapped)
            }
            _ => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn test_key_mapping() {
        assert_eq!(Key::from_key_event(press(KeyCode::Up)), Some(Key::VolumeUp));
        assert_eq!(Key::from_key_event(press(KeyCode::Down)), Some(Key::VolumeDown));
        assert_eq!(Key::from_key_event(press(KeyCode::Char('0'))), Some(Key::Digit(0)));
        assert_eq!(Key::from_key_event(press(KeyCode::Char('7'))), Some(Key::Digit(7)));
        assert_eq!(Key::from_key_event(press(KeyCode::Char('q'))), Some(Key::Quit));
        assert_eq!(Key::from_key_event(press(KeyCode::Char('Q'))), Some(Key::Quit));
    }

    #[test]
    fn test_ctrl_c_quits() {
        let ctrl_c = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
        assert_eq!(Key::from_key_event(ctrl_c), Some(Key::Quit));
        assert_eq!(Key::from_key_event(press(KeyCode::Char('c'))), None);
    }

    #[test]
    fn test_unmapped_and_released_keys() {
        assert_eq!(Key::from_key_event(press(KeyCode::Left)), None);
        assert_eq!(Key::from_key_event(press(KeyCode::Char('x'))), None);
        assert_eq!(Key::from_key_event(press(KeyCode::Enter)), None);

        let mut released = press(KeyCode::Char('1'));
        released.kind = KeyEventKind::Release;
        assert_eq!(Key::from_key_event(released), None);
    }
}
