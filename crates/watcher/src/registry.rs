//! Registry of watched paths
//!
//! Paths are stored absolute and unique. The registry only validates and
//! records; the lifecycle decides when mutation is allowed and the dispatch
//! run registers every recorded path on the raw source at start.

use crate::error::{Result, WatchError};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// What a registered path pointed at when it was added
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathKind {
    File,
    Dir,
}

/// Set of watched absolute paths
#[derive(Debug, Default)]
pub struct PathRegistry {
    paths: RwLock<BTreeMap<PathBuf, PathKind>>,
}

impl PathRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a single path
    ///
    /// Returns the absolute path and what it points at.
    pub fn add(&self, path: &Path) -> Result<(PathBuf, PathKind)> {
        let abs = absolutize(path)?;
        let kind = probe(&abs)?;

        let mut paths = self.paths.write();
        if paths.contains_key(&abs) {
            return Err(WatchError::AlreadyWatching { path: abs });
        }
        paths.insert(abs.clone(), kind);
        debug!(path = %abs.display(), ?kind, "registered path");
        Ok((abs, kind))
    }

    /// Register a directory and every directory beneath it
    ///
    /// The root must be a directory. Failures below the root are skipped.
    /// Returns the number of paths registered.
    pub fn add_recursive(&self, root: &Path) -> Result<usize> {
        let abs = absolutize(root)?;
        if probe(&abs)? != PathKind::Dir {
            return Err(WatchError::NotDirectory { path: abs });
        }
        self.add(&abs)?;
        let mut added = 1;

        let subdirs = WalkDir::new(&abs)
            .min_depth(1)
            .follow_links(false)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_dir());

        for entry in subdirs {
            match self.add(entry.path()) {
                Ok(_) => added += 1,
                Err(e) => debug!(path = %entry.path().display(), error = %e, "skipping directory"),
            }
        }

        Ok(added)
    }

    /// Unregister a path
    pub fn remove(&self, path: &Path) -> Result<(PathBuf, PathKind)> {
        let abs = absolutize(path)?;
        let mut paths = self.paths.write();
        match paths.remove(&abs) {
            Some(kind) => {
                debug!(path = %abs.display(), "unregistered path");
                Ok((abs, kind))
            }
            None => Err(WatchError::NotWatching { path: abs }),
        }
    }

    /// Whether `path` is registered; unresolvable paths are not
    pub fn contains(&self, path: &Path) -> bool {
        match absolutize(path) {
            Ok(abs) => self.paths.read().contains_key(&abs),
            Err(_) => false,
        }
    }

    /// Registered paths in sorted order
    pub fn paths(&self) -> Vec<PathBuf> {
        self.paths.read().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.paths.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.read().is_empty()
    }

    /// (files, dirs) currently registered
    pub fn counts(&self) -> (u64, u64) {
        let paths = self.paths.read();
        let dirs = paths.values().filter(|k| **k == PathKind::Dir).count() as u64;
        (paths.len() as u64 - dirs, dirs)
    }
}

/// Resolve `path` against the working directory without touching symlinks
pub fn absolutize(path: &Path) -> Result<PathBuf> {
    if path.as_os_str().is_empty() {
        return Err(WatchError::InvalidPath {
            path: path.to_path_buf(),
        });
    }
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        let cwd = std::env::current_dir().map_err(|source| WatchError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        cwd.join(path)
    };
    Ok(normalize(&joined))
}

/// Drop `.` components and fold `..` lexically
fn normalize(path: &Path) -> PathBuf {
    use std::path::Component;

    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

fn probe(path: &Path) -> Result<PathKind> {
    match std::fs::metadata(path) {
        Ok(meta) if meta.is_dir() => Ok(PathKind::Dir),
        Ok(_) => Ok(PathKind::File),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(WatchError::PathNotFound {
            path: path.to_path_buf(),
        }),
        Err(source) => Err(WatchError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}
