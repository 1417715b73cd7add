// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! File system watcher for the render output folder

use notify::event::{ModifyKind, RenameMode};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{channel, Receiver};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::Result;

/// Events emitted by the watcher
#[derive(Debug, Clone)]
pub enum WatchEvent {
    /// A file was created or renamed into the folder
    FileArrived(PathBuf),
    /// A file was deleted or renamed away
    FileRemoved(PathBuf),
    /// Watcher error
    Error(String),
    /// The notify backend stopped; no further events will come
    Disconnected,
}

/// File system watcher
pub struct FileWatcher {
    watcher: RecommendedWatcher,
    event_rx: Receiver<notify::Result<Event>>,
}

impl FileWatcher {
    /// Create a new file watcher
    pub fn new() -> Result<Self> {
        let (tx, rx) = channel();

        let config = Config::default()
            .with_poll_interval(Duration::from_secs(2));

        let watcher = RecommendedWatcher::new(tx, config)?;

        Ok(Self {
            watcher,
            event_rx: rx,
        })
    }

    /// Add a directory to watch
    pub fn watch(&mut self, path: &Path) -> Result<()> {
        if !path.exists() {
            std::fs::create_dir_all(path)?;
            info!("Created watch directory: {:?}", path);
        }

        self.watcher.watch(path, RecursiveMode::NonRecursive)?;
        info!("Watching: {:?}", path);

        Ok(())
    }

    /// Get the next event (blocking with timeout)
    pub fn next_event(&self, timeout: Duration) -> Option<WatchEvent> {
        match self.event_rx.recv_timeout(timeout) {
            Ok(Ok(event)) => Self::convert_event(event),
            Ok(Err(e)) => Some(WatchEvent::Error(e.to_string())),
            Err(std::sync::mpsc::RecvTimeoutError::Timeout) => None,
            Err(std::sync::mpsc::RecvTimeoutError::Disconnected) => Some(WatchEvent::Disconnected),
        }
    }

    fn convert_event(event: Event) -> Option<WatchEvent> {
        match event.kind {
            EventKind::Create(_) | EventKind::Modify(ModifyKind::Name(RenameMode::To)) => {
                event.paths.first().map(|p| WatchEvent::FileArrived(p.clone()))
            }
            // Old and new path, in that order
            EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
                event.paths.last().map(|p| WatchEvent::FileArrived(p.clone()))
            }
            EventKind::Remove(_) | EventKind::Modify(ModifyKind::Name(RenameMode::From)) => {
                event.paths.first().map(|p| WatchEvent::FileRemoved(p.clone()))
            }
            // Backends that cannot tell the two sides of a rename apart
            EventKind::Modify(ModifyKind::Name(_)) => event.paths.first().map(|p| {
                if p.exists() {
                    WatchEvent::FileArrived(p.clone())
                } else {
                    WatchEvent::FileRemoved(p.clone())
                }
            }),
            _ => None,
        }
    }
}

/// Wait for a file to stop growing.
///
/// Returns `false` if the file disappears. Gives up waiting after `max_wait`
/// and returns `true` anyway.
pub fn wait_for_stable(path: &Path, max_wait: Duration) -> bool {
    let check_interval = Duration::from_millis(500);
    let start = Instant::now();

    let mut last_size = match std::fs::metadata(path) {
        Ok(m) => m.len(),
        Err(_) => return false,
    };

    loop {
        std::thread::sleep(check_interval);

        if start.elapsed() > max_wait {
            warn!("File stability check timed out for {:?}", path);
            return true;
        }

        let current_size = match std::fs::metadata(path) {
            Ok(m) => m.len(),
            Err(_) => return false,
        };

        if current_size == last_size {
            return true;
        }

        last_size = current_size;
        debug!("File {:?} still being written, size: {}", path, current_size);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_is_not_stable() {
        let dir = tempfile::tempdir().unwrap();
        assert!(!wait_for_stable(&dir.path().join("gone.png"), Duration::from_secs(1)));
    }

    #[test]
    fn test_unchanged_file_is_stable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frame.png");
        std::fs::write(&path, b"done").unwrap();
        assert!(wait_for_stable(&path, Duration::from_secs(5)));
    }

    #[test]
    fn test_watch_creates_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("imgs");
        let mut watcher = FileWatcher::new().unwrap();
        watcher.watch(&target).unwrap();
        assert!(target.is_dir());
    }

    fn renamed(mode: RenameMode, paths: &[&Path]) -> Option<WatchEvent> {
        let event = paths
            .iter()
            .fold(Event::new(EventKind::Modify(ModifyKind::Name(mode))), |e, p| e.add_path(p.to_path_buf()));
        FileWatcher::convert_event(event)
    }

    #[test]
    fn test_rename_into_folder_is_an_arrival() {
        let dir = tempfile::tempdir().unwrap();
        let outside = dir.path().join("render.tmp");
        let inside = dir.path().join("imgs").join("7.png");

        assert!(matches!(renamed(RenameMode::To, &[&inside]), Some(WatchEvent::FileArrived(p)) if p == inside));
        assert!(matches!(
            renamed(RenameMode::Both, &[&outside, &inside]),
            Some(WatchEvent::FileArrived(p)) if p == inside
        ));
        assert!(matches!(renamed(RenameMode::From, &[&inside]), Some(WatchEvent::FileRemoved(_))));
    }

    #[test]
    fn test_ambiguous_rename_checks_the_path() {
        let dir = tempfile::tempdir().unwrap();
        let present = dir.path().join("here.png");
        std::fs::write(&present, b"x").unwrap();
        let absent = dir.path().join("gone.png");

        assert!(matches!(renamed(RenameMode::Any, &[&present]), Some(WatchEvent::FileArrived(_))));
        assert!(matches!(renamed(RenameMode::Any, &[&absent]), Some(WatchEvent::FileRemoved(_))));
    }

    #[test]
    fn test_content_changes_are_ignored() {
        let event = Event::new(EventKind::Modify(ModifyKind::Any)).add_path(PathBuf::from("a.png"));
        assert!(FileWatcher::convert_event(event).is_none());
    }
}
