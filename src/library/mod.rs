// Song catalog - one library per subdirectory of the music folder
// The watcher only queues changes; the dispatch thread applies them.

pub mod scanner;
#[cfg(feature = "watch")]
pub mod watcher;

pub use scanner::LibraryScanner;

use crate::config::LibraryConfig;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum LibraryError {
    #[error("no libraries available")]
    EmptyCatalog,
    #[error("cannot watch {path}: {reason}")]
    Watch { path: PathBuf, reason: String },
}

/// One library: a directory and the songs directly inside it.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct SongList {
    pub directory: PathBuf,
    pub songs: Vec<PathBuf>,
}

impl SongList {
    pub fn new(directory: PathBuf, songs: Vec<PathBuf>) -> Self {
        Self { directory, songs }
    }

    pub fn name(&self) -> &str {
        self.directory
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("?")
    }

    pub fn len(&self) -> usize {
        self.songs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.songs.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    DirChanged,
    FileAdded,
    FileRemoved,
}

/// A filesystem change relevant to the catalog. `dest` is set when a file was
/// moved: the path is removed, then `dest` is added.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogChange {
    pub kind: ChangeKind,
    pub path: PathBuf,
    pub dest: Option<PathBuf>,
}

impl CatalogChange {
    pub fn dir_changed(path: PathBuf) -> Self {
        Self { kind: ChangeKind::DirChanged, path, dest: None }
    }

    pub fn file_added(path: PathBuf) -> Self {
        Self { kind: ChangeKind::FileAdded, path, dest: None }
    }

    pub fn file_removed(path: PathBuf) -> Self {
        Self { kind: ChangeKind::FileRemoved, path, dest: None }
    }

    pub fn file_moved(from: PathBuf, to: PathBuf) -> Self {
        Self { kind: ChangeKind::FileRemoved, path: from, dest: Some(to) }
    }
}

type ChangedHook = Box<dyn FnMut(&[SongList]) + Send>;

pub struct Library {
    base_path: PathBuf,
    scanner: LibraryScanner,
    libraries: Vec<SongList>,
    current_library: Option<usize>,
    current_song: Option<usize>,
    on_changed: Option<ChangedHook>,
    change_tx: mpsc::UnboundedSender<CatalogChange>,
    change_rx: mpsc::UnboundedReceiver<CatalogChange>,
    #[cfg(feature = "watch")]
    watcher: Option<watcher::LibraryWatcher>,
}

impl std::fmt::Debug for Library {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Library")
            .field("base_path", &self.base_path)
            .field("libraries", &self.libraries)
            .field("current_library", &self.current_library)
            .field("current_song", &self.current_song)
            .finish_non_exhaustive()
    }
}

impl Library {
    /// Scans the base directory and, when configured, starts watching it. A
    /// missing base directory gives an empty catalog; a watcher that cannot
    /// start leaves the catalog as scanned.
    pub fn open(config: &LibraryConfig) -> Self {
        let mut library = Self::new(config.resolved_base_path(), config.extensions());
        library.rescan();

        if config.watch {
            if let Err(e) = library.watch() {
                warn!("live library updates disabled: {}", e);
            }
        }

        library
    }

    /// An empty, unscanned library over `base_path`.
    pub fn new(base_path: PathBuf, supported_extensions: Vec<String>) -> Self {
        let base_path = std::path::absolute(&base_path).unwrap_or(base_path);
        let (change_tx, change_rx) = mpsc::unbounded_channel();

        Self {
            base_path,
            scanner: LibraryScanner::new(supported_extensions),
            libraries: Vec::new(),
            current_library: None,
            current_song: None,
            on_changed: None,
            change_tx,
            change_rx,
            #[cfg(feature = "watch")]
            watcher: None,
        }
    }

    #[cfg(feature = "watch")]
    pub fn watch(&mut self) -> Result<(), LibraryError> {
        if self.watcher.is_none() {
            let watcher = watcher::LibraryWatcher::start(&self.base_path, self.change_tx.clone())?;
            self.watcher = Some(watcher);
        }
        Ok(())
    }

    #[cfg(not(feature = "watch"))]
    pub fn watch(&mut self) -> Result<(), LibraryError> {
        Err(LibraryError::Watch {
            path: self.base_path.clone(),
            reason: "built without the `watch` feature".to_string(),
        })
    }

    /// Stops watching. Safe to call more than once.
    #[cfg(feature = "watch")]
    pub fn close(&mut self) {
        if self.watcher.take().is_some() {
            debug!("stopped watching {}", self.base_path.display());
        }
    }

    #[cfg(not(feature = "watch"))]
    pub fn close(&mut self) {}

    /// Registers the listener fired after every rescan or applied change.
    pub fn set_on_changed<F>(&mut self, hook: F)
    where
        F: FnMut(&[SongList]) + Send + 'static,
    {
        self.on_changed = Some(Box::new(hook));
    }

    /// Queue feeding [`Library::sync_changes`]; the watcher holds a clone.
    pub fn change_sender(&self) -> mpsc::UnboundedSender<CatalogChange> {
        self.change_tx.clone()
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    pub fn libraries(&self) -> &[SongList] {
        &self.libraries
    }

    pub fn is_empty(&self) -> bool {
        self.libraries.is_empty()
    }

    pub fn current_library_index(&self) -> Option<usize> {
        self.current_library
    }

    pub fn current_song_index(&self) -> Option<usize> {
        self.current_song
    }

    /// Selects library `index` modulo the number of libraries and clears the
    /// song selection. Returns the index actually selected.
    pub fn set_current_library_index(&mut self, index: usize) -> Result<usize, LibraryError> {
        self.current_song = None;

        if self.libraries.is_empty() {
            self.current_library = None;
            return Err(LibraryError::EmptyCatalog);
        }

        let wrapped = index % self.libraries.len();
        self.current_library = Some(wrapped);
        Ok(wrapped)
    }

    pub fn current_library(&self) -> Option<&SongList> {
        self.current_library.and_then(|index| self.libraries.get(index))
    }

    pub fn current_song(&self) -> Option<&Path> {
        let library = self.current_library()?;
        library.songs.get(self.current_song?).map(PathBuf::as_path)
    }

    /// Moves to the next song of the current library, wrapping at the end.
    pub fn advance_to_next_song(&mut self) {
        let len = match self.current_library() {
            Some(library) if !library.is_empty() => library.len(),
            _ => return,
        };

        self.current_song = Some(match self.current_song {
            Some(index) => (index + 1) % len,
            None => 0,
        });
    }

    /// Rebuilds the whole catalog from disk and re-applies the library
    /// selection.
    pub fn rescan(&mut self) {
        info!("loading audio library {}", self.base_path.display());
        self.libraries = self.scanner.scan(&self.base_path);

        if self.libraries.is_empty() {
            info!("audio library is empty");
        }

        let selected = self.current_library.unwrap_or(0);
        // An empty catalog leaves the selection unset
        let _ = self.set_current_library_index(selected);
        self.notify_changed();
    }

    /// Applies every change queued by the watcher. Returns how many were
    /// processed.
    pub fn sync_changes(&mut self) -> usize {
        let mut processed = 0;
        while let Ok(change) = self.change_rx.try_recv() {
            self.apply(change);
            processed += 1;
        }
        processed
    }

    pub fn apply(&mut self, change: CatalogChange) {
        match change.kind {
            ChangeKind::DirChanged => self.rescan(),
            ChangeKind::FileAdded => self.on_file_added(&change.path),
            ChangeKind::FileRemoved => {
                self.on_file_removed(&change.path);
                if let Some(dest) = change.dest {
                    self.on_file_added(&dest);
                }
            }
        }
    }

    fn on_file_added(&mut self, path: &Path) {
        let Some(directory) = path.parent() else {
            return;
        };
        if directory.parent() != Some(self.base_path.as_path()) {
            // Only direct children of a library directory are songs
            return;
        }
        if !self.scanner.is_supported_file(path) || path.is_dir() {
            return;
        }

        let owners: Vec<usize> = self
            .libraries
            .iter()
            .enumerate()
            .filter(|(_, library)| library.directory == directory)
            .map(|(index, _)| index)
            .collect();

        match owners.as_slice() {
            [] => {
                info!("add new library: {}", directory.display());
                let selected = self.current_library().map(|l| l.directory.clone());
                self.libraries
                    .push(SongList::new(directory.to_path_buf(), vec![path.to_path_buf()]));
                self.libraries.sort();
                self.reselect(selected);
            }
            [index] => {
                let library = &mut self.libraries[*index];
                if library.songs.iter().any(|song| song == path) {
                    return;
                }
                info!("add song to library: {}", path.display());
                library.songs.push(path.to_path_buf());
                library.songs.sort();
            }
            _ => {
                warn!("can't add song, multiple libraries match: {}", path.display());
                return;
            }
        }

        self.notify_changed();
    }

    fn on_file_removed(&mut self, path: &Path) {
        let mut emptied = Vec::new();
        let mut changed = false;

        for library in &mut self.libraries {
            let before = library.songs.len();
            library.songs.retain(|song| song != path);
            if library.songs.len() != before {
                info!("remove song from directory {}", path.display());
                changed = true;
                if library.is_empty() {
                    emptied.push(library.directory.clone());
                }
            }
        }

        if !changed {
            return;
        }

        let selected = self.current_library().map(|l| l.directory.clone());
        self.libraries
            .retain(|library| !emptied.contains(&library.directory));
        self.reselect(selected);
        self.notify_changed();
    }

    /// Keeps the selection on the same directory after the list of libraries
    /// changed shape, falling back to the modulo rule when it disappeared.
    fn reselect(&mut self, selected: Option<PathBuf>) {
        let Some(selected) = selected else {
            return;
        };

        match self.libraries.iter().position(|l| l.directory == selected) {
            Some(index) => self.current_library = Some(index),
            None => {
                let previous = self.current_library.unwrap_or(0);
                let _ = self.set_current_library_index(previous);
            }
        }

        if let (Some(library), Some(song)) = (self.current_library(), self.current_song) {
            if song >= library.len() {
                self.current_song = None;
            }
        }
    }

    fn notify_changed(&mut self) {
        if let Some(hook) = self.on_changed.as_mut() {
            hook(&self.libraries);
        }
    }
}

impl Drop for Library {
    fn drop(&mut self) {
        self.close();
    }
}
