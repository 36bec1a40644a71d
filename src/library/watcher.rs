use super::{CatalogChange, LibraryError};
use notify::event::{CreateKind, ModifyKind, RemoveKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tracing::{debug, error, info};

/// Watches the parent of the base directory so that creating or replacing the
/// base itself is noticed too. Raw notifications are translated into
/// [`CatalogChange`]s and queued for the dispatch thread.
pub struct LibraryWatcher {
    _watcher: RecommendedWatcher,
    watched: PathBuf,
}

impl std::fmt::Debug for LibraryWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LibraryWatcher")
            .field("watched", &self.watched)
            .finish()
    }
}

impl LibraryWatcher {
    pub fn start(
        base_path: &Path,
        change_tx: mpsc::UnboundedSender<CatalogChange>,
    ) -> Result<Self, LibraryError> {
        let watched = base_path
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .unwrap_or(base_path)
            .to_path_buf();
        let base = base_path.to_path_buf();

        let mut watcher = notify::recommended_watcher(
            move |res: std::result::Result<Event, notify::Error>| match res {
                Ok(event) => {
                    for change in classify(&event, &base) {
                        debug!("catalog change: {:?}", change);
                        if change_tx.send(change).is_err() {
                            // Library closed, nothing left to update
                            return;
                        }
                    }
                }
                Err(e) => error!("watch error: {:?}", e),
            },
        )
        .map_err(|e| LibraryError::Watch {
            path: watched.clone(),
            reason: e.to_string(),
        })?;

        watcher
            .watch(&watched, RecursiveMode::Recursive)
            .map_err(|e| LibraryError::Watch {
                path: watched.clone(),
                reason: e.to_string(),
            })?;
        info!("watching {} for library changes", watched.display());

        Ok(Self {
            _watcher: watcher,
            watched,
        })
    }
}

/// Translates one notification into catalog changes. Only the base directory
/// and its direct children count as directory-level changes; deeper
/// directories are not libraries.
pub(crate) fn classify(event: &Event, base: &Path) -> Vec<CatalogChange> {
    let is_root_level =
        |path: &Path| path == base || path.parent().map_or(false, |parent| parent == base);
    let under_base = |path: &Path| path.starts_with(base);

    let mut changes = Vec::new();

    match &event.kind {
        EventKind::Create(kind) => {
            for path in event.paths.iter().filter(|p| under_base(p)) {
                let is_dir = match kind {
                    CreateKind::Folder => true,
                    CreateKind::File => false,
                    _ => path.is_dir(),
                };
                created(&mut changes, path, is_dir, is_root_level(path));
            }
        }
        EventKind::Remove(kind) => {
            for path in event.paths.iter().filter(|p| under_base(p)) {
                removed(&mut changes, path, matches!(kind, RemoveKind::File), is_root_level(path));
            }
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
            if let [from, to] = event.paths.as_slice() {
                if to.is_dir() {
                    if is_root_level(from) || is_root_level(to) {
                        changes.push(CatalogChange::dir_changed(to.clone()));
                    }
                } else if under_base(from) {
                    changes.push(CatalogChange::file_moved(from.clone(), to.clone()));
                } else if under_base(to) {
                    changes.push(CatalogChange::file_added(to.clone()));
                }
            }
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => {
            for path in event.paths.iter().filter(|p| under_base(p)) {
                removed(&mut changes, path, false, is_root_level(path));
            }
        }
        EventKind::Modify(ModifyKind::Name(_)) => {
            // Rename target, or a platform that cannot tell which side this is
            for path in event.paths.iter().filter(|p| under_base(p)) {
                if path.exists() {
                    created(&mut changes, path, path.is_dir(), is_root_level(path));
                } else {
                    removed(&mut changes, path, false, is_root_level(path));
                }
            }
        }
        _ => {}
    }

    changes
}

fn created(changes: &mut Vec<CatalogChange>, path: &Path, is_dir: bool, root_level: bool) {
    if is_dir {
        if root_level {
            changes.push(CatalogChange::dir_changed(path.to_path_buf()));
        }
    } else {
        changes.push(CatalogChange::file_added(path.to_path_buf()));
    }
}

fn removed(changes: &mut Vec<CatalogChange>, path: &Path, known_file: bool, root_level: bool) {
    // A vanished path cannot be inspected; at the root level it may have been
    // a whole library, so rescan.
    if root_level && !known_file {
        changes.push(CatalogChange::dir_changed(path.to_path_buf()));
    } else {
        changes.push(CatalogChange::file_removed(path.to_path_buf()));
    }
}
