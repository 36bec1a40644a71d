// Configuration management for the jukebox
// Handles loading/saving settings, with sensible defaults when config is missing

use anyhow::{Context, Result};
use dirs::config_dir;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub library: LibraryConfig,
    pub audio: AudioConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LibraryConfig {
    /// Root music directory; every direct subdirectory is one library.
    pub base_path: PathBuf,
    /// Extensions with or without the leading dot, matched case-insensitively.
    pub supported_extensions: Vec<String>,
    /// Keep the catalog in sync with the filesystem while running.
    pub watch: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    pub fadeout_seconds: f32,
    pub volume: f32, // 0.0 to 1.0
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub directory: PathBuf,
    pub filter: String,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            base_path: PathBuf::from("~/Music"),
            supported_extensions: vec![".mp3".to_string(), ".ogg".to_string()],
            watch: true,
        }
    }
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            fadeout_seconds: 1.0,
            volume: 0.7,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: dirs::data_local_dir()
                .map(|dir| dir.join("jukebox").join("logs"))
                .unwrap_or_else(|| PathBuf::from("logs")),
            filter: "info".to_string(),
        }
    }
}

impl LibraryConfig {
    /// Base path with a leading `~` replaced by the home directory.
    pub fn resolved_base_path(&self) -> PathBuf {
        expand_home(&self.base_path)
    }

    /// Lowercase extensions without the leading dot, ready to compare against
    /// `Path::extension`.
    pub fn extensions(&self) -> Vec<String> {
        self.supported_extensions
            .iter()
            .map(|ext| ext.trim().trim_start_matches('.').to_ascii_lowercase())
            .filter(|ext| !ext.is_empty())
            .collect()
    }
}

impl AudioConfig {
    pub fn fadeout(&self) -> Duration {
        Duration::try_from_secs_f32(self.fadeout_seconds).unwrap_or(Duration::ZERO)
    }

    pub fn initial_volume(&self) -> f32 {
        crate::audio::clamp_volume(self.volume)
    }
}

impl Config {
    /// Loads the config from `path`, or from the default location when no path
    /// is given. A missing default file is created with defaults; a missing
    /// explicit file is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load_from(path),
            None => {
                let config_path = Self::config_path()?;

                if config_path.exists() {
                    Self::load_from(&config_path)
                } else {
                    let config = Config::default();
                    config.save(&config_path)?;
                    Ok(config)
                }
            }
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("failed to parse config {}", path.display()))?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;

        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?
            .join("jukebox");

        Ok(config_dir.join("config.toml"))
    }
}

fn expand_home(path: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => match dirs::home_dir() {
            Some(home) => home.join(rest),
            None => path.to_path_buf(),
        },
        Err(_) => path.to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_falls_back_to_defaults() {
        let config: Config = toml::from_str(
            r#"
            [library]
            base_path = "/srv/music"

            [audio]
            fadeout_seconds = 0.5
            "#,
        )
        .unwrap();

        assert_eq!(config.library.base_path, PathBuf::from("/srv/music"));
        assert_eq!(config.library.supported_extensions, vec![".mp3", ".ogg"]);
        assert!(config.library.watch);
        assert_eq!(config.audio.fadeout(), Duration::from_millis(500));
        assert_eq!(config.audio.volume, 0.7);
        assert_eq!(config.logging.filter, "info");
    }

    #[test]
    fn test_extensions_are_normalized() {
        let library = LibraryConfig {
            supported_extensions: vec![".MP3".into(), "ogg".into(), " .Flac ".into(), ".".into()],
            ..LibraryConfig::default()
        };

        assert_eq!(library.extensions(), vec!["mp3", "ogg", "flac"]);
    }

    #[test]
    fn test_home_expansion() {
        let library = LibraryConfig::default();
        let resolved = library.resolved_base_path();

        if let Some(home) = dirs::home_dir() {
            assert_eq!(resolved, home.join("Music"));
        }

        let absolute = LibraryConfig {
            base_path: PathBuf::from("/srv/music"),
            ..LibraryConfig::default()
        };
        assert_eq!(absolute.resolved_base_path(), PathBuf::from("/srv/music"));
    }

    #[test]
    fn test_fadeout_rejects_nonsense() {
        let negative = AudioConfig { fadeout_seconds: -2.0, volume: 3.0 };
        assert_eq!(negative.fadeout(), Duration::ZERO);
        assert_eq!(negative.initial_volume(), 1.0);

        let huge = AudioConfig { fadeout_seconds: 1e30, volume: 0.5 };
        assert_eq!(huge.fadeout(), Duration::ZERO);

        let not_a_number = AudioConfig { fadeout_seconds: f32::NAN, volume: 0.5 };
        assert_eq!(not_a_number.fadeout(), Duration::ZERO);
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.library.base_path = PathBuf::from("/media/usb");
        config.audio.volume = 0.25;
        config.save(&path).unwrap();

        let loaded = Config::load(Some(&path)).unwrap();
        assert_eq!(loaded.library.base_path, PathBuf::from("/media/usb"));
        assert_eq!(loaded.audio.volume, 0.25);
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Config::load(Some(&dir.path().join("absent.toml"))).is_err());
    }
}
