use super::SongList;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Builds song lists from a base directory: one list per direct subdirectory,
/// each holding the supported files directly inside it.
#[derive(Debug, Clone)]
pub struct LibraryScanner {
    supported_extensions: Vec<String>,
}

impl LibraryScanner {
    /// `supported_extensions` are lowercase and without the leading dot.
    pub fn new(supported_extensions: Vec<String>) -> Self {
        Self {
            supported_extensions,
        }
    }

    pub fn scan(&self, base_path: &Path) -> Vec<SongList> {
        if !base_path.is_dir() {
            info!("audio library {} is missing, catalog is empty", base_path.display());
            return Vec::new();
        }

        let mut directories: Vec<PathBuf> = WalkDir::new(base_path)
            .min_depth(1)
            .max_depth(1)
            .follow_links(true)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|entry| entry.file_type().is_dir())
            .map(|entry| entry.into_path())
            .collect();
        directories.sort();

        directories
            .into_iter()
            .map(|directory| {
                info!("adding songs from directory {}", directory.display());
                let songs = self.scan_songs(&directory);
                SongList::new(directory, songs)
            })
            .collect()
    }

    /// Supported regular files directly inside `directory`, sorted by path.
    pub fn scan_songs(&self, directory: &Path) -> Vec<PathBuf> {
        let mut songs = Vec::new();

        for entry in WalkDir::new(directory).min_depth(1).max_depth(1).follow_links(true) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("skipping unreadable entry in {}: {}", directory.display(), e);
                    continue;
                }
            };

            if entry.file_type().is_file() && self.is_supported_file(entry.path()) {
                songs.push(entry.into_path());
            }
        }

        songs.sort();
        debug!("{} songs in {}", songs.len(), directory.display());
        songs
    }

    pub fn is_supported_file(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| {
                let normalized = ext.to_ascii_lowercase();
                self.supported_extensions.contains(&normalized)
            })
            .unwrap_or(false)
    }
}
