//! Event filtering
//!
//! A filter is a pure predicate over a normalized event plus whatever file
//! metadata it needs. Checks run in a fixed order:
//!
//! 1. event-type allow-list
//! 2. directory inclusion
//! 3. hidden-name exclusion
//! 4. size bounds
//! 5. extension allow-list
//! 6. include patterns
//! 7. exclude patterns (exclude wins over include)
//!
//! Metadata is only looked up when the directory check or the size bounds
//! need it. A failed lookup skips those checks for Remove/Rename events (the
//! file is expected to be gone) and drops every other event.

use crate::error::{Result, WatchError};
use crate::event::{Event, EventType};
use glob::Pattern;
use serde::{Deserialize, Serialize};
use std::io;
use std::path::Path;

/// Filter configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Filter {
    /// Glob patterns an event must match (empty: everything matches)
    pub include_patterns: Vec<String>,

    /// Glob patterns that reject an event
    pub exclude_patterns: Vec<String>,

    /// Deliver events for directories
    pub include_dirs: bool,

    /// Drop events for names starting with `.`
    pub ignore_hidden: bool,

    /// Allowed event types (empty: all types)
    pub event_types: Vec<EventType>,

    /// Minimum file size in bytes (0: no minimum)
    pub min_size: u64,

    /// Maximum file size in bytes (0: no maximum)
    pub max_size: u64,

    /// Allowed extensions, with or without leading dot (empty: all)
    pub extensions: Vec<String>,
}

impl Default for Filter {
    fn default() -> Self {
        Self {
            include_patterns: vec![],
            exclude_patterns: vec![],
            include_dirs: true,
            ignore_hidden: false,
            event_types: vec![],
            min_size: 0,
            max_size: 0,
            extensions: vec![],
        }
    }
}

impl Filter {
    pub fn include(mut self, pattern: impl Into<String>) -> Self {
        self.include_patterns.push(pattern.into());
        self
    }

    pub fn exclude(mut self, pattern: impl Into<String>) -> Self {
        self.exclude_patterns.push(pattern.into());
        self
    }

    pub fn extension(mut self, ext: impl Into<String>) -> Self {
        self.extensions.push(ext.into());
        self
    }

    pub fn event_type(mut self, event_type: EventType) -> Self {
        self.event_types.push(event_type);
        self
    }

    pub fn ignore_hidden(mut self, ignore: bool) -> Self {
        self.ignore_hidden = ignore;
        self
    }

    pub fn include_dirs(mut self, include: bool) -> Self {
        self.include_dirs = include;
        self
    }

    pub fn size_range(mut self, min: u64, max: u64) -> Self {
        self.min_size = min;
        self.max_size = max;
        self
    }

    /// Validate and compile the patterns
    pub fn compile(&self) -> Result<CompiledFilter> {
        Ok(CompiledFilter {
            include: compile_patterns(&self.include_patterns)?,
            exclude: compile_patterns(&self.exclude_patterns)?,
            extensions: self
                .extensions
                .iter()
                .map(|e| e.trim_start_matches('.').to_ascii_lowercase())
                .collect(),
            config: self.clone(),
        })
    }
}

fn compile_patterns(patterns: &[String]) -> Result<Vec<Pattern>> {
    patterns
        .iter()
        .map(|p| {
            Pattern::new(p).map_err(|e| WatchError::InvalidFilter {
                pattern: p.clone(),
                message: e.msg.to_string(),
            })
        })
        .collect()
}

/// The subset of file metadata the filter reads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileInfo {
    pub is_dir: bool,
    pub size: u64,
}

/// Source of file metadata for the filter
pub trait MetadataLookup {
    fn lookup(&self, path: &Path) -> io::Result<FileInfo>;
}

/// Metadata from the local file system
#[derive(Debug, Default, Clone, Copy)]
pub struct FsMetadata;

impl MetadataLookup for FsMetadata {
    fn lookup(&self, path: &Path) -> io::Result<FileInfo> {
        let meta = std::fs::metadata(path)?;
        Ok(FileInfo {
            is_dir: meta.is_dir(),
            size: meta.len(),
        })
    }
}

impl<F> MetadataLookup for F
where
    F: Fn(&Path) -> io::Result<FileInfo>,
{
    fn lookup(&self, path: &Path) -> io::Result<FileInfo> {
        self(path)
    }
}

/// A [`Filter`] with its patterns compiled
#[derive(Debug, Clone)]
pub struct CompiledFilter {
    config: Filter,
    include: Vec<Pattern>,
    exclude: Vec<Pattern>,
    extensions: Vec<String>,
}

impl Default for CompiledFilter {
    fn default() -> Self {
        Self {
            config: Filter::default(),
            include: vec![],
            exclude: vec![],
            extensions: vec![],
        }
    }
}

impl CompiledFilter {
    pub fn config(&self) -> &Filter {
        &self.config
    }

    /// Decide whether `event` passes
    pub fn matches(&self, event: &Event, meta: &impl MetadataLookup) -> bool {
        let cfg = &self.config;
        let path = event.path();

        if !cfg.event_types.is_empty() && !cfg.event_types.contains(&event.event_type()) {
            return false;
        }

        let needs_meta = !cfg.include_dirs || cfg.min_size > 0 || cfg.max_size > 0;
        let info = if needs_meta {
            match meta.lookup(path) {
                Ok(info) => Some(info),
                Err(_) if is_gone(event.event_type()) => None,
                Err(_) => return false,
            }
        } else {
            None
        };

        if let Some(info) = info {
            if info.is_dir && !cfg.include_dirs {
                return false;
            }
        }

        let name = event.file_name().unwrap_or_default();

        if cfg.ignore_hidden && name.starts_with('.') {
            return false;
        }

        // Size bounds only make sense for regular files
        if let Some(info) = info.filter(|i| !i.is_dir) {
            if cfg.min_size > 0 && info.size < cfg.min_size {
                return false;
            }
            if cfg.max_size > 0 && info.size > cfg.max_size {
                return false;
            }
        }

        if !self.extensions.is_empty() {
            let ext = path
                .extension()
                .map(|e| e.to_string_lossy().to_ascii_lowercase())
                .unwrap_or_default();
            if !self.extensions.iter().any(|allowed| *allowed == ext) {
                return false;
            }
        }

        if !self.include.is_empty() && !self.include.iter().any(|p| matches(p, &name, path)) {
            return false;
        }

        if self.exclude.iter().any(|p| matches(p, &name, path)) {
            return false;
        }

        true
    }
}

fn is_gone(event_type: EventType) -> bool {
    matches!(event_type, EventType::Remove | EventType::Rename)
}

/// A pattern matches either the bare file name or the whole path
fn matches(pattern: &Pattern, name: &str, path: &Path) -> bool {
    pattern.matches(name) || pattern.matches_path(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn file(size: u64) -> impl Fn(&Path) -> io::Result<FileInfo> {
        move |_: &Path| Ok(FileInfo { is_dir: false, size })
    }

    fn dir() -> impl Fn(&Path) -> io::Result<FileInfo> {
        |_: &Path| Ok(FileInfo { is_dir: true, size: 4096 })
    }

    fn missing() -> impl Fn(&Path) -> io::Result<FileInfo> {
        |_: &Path| Err(io::Error::new(io::ErrorKind::NotFound, "gone"))
    }

    fn write(path: &str) -> Event {
        Event::new(EventType::Write, PathBuf::from(path))
    }

    #[test]
    fn test_default_filter_passes_everything() {
        let filter = Filter::default().compile().unwrap();
        assert!(filter.matches(&write("/w/a.txt"), &missing()));
        assert!(filter.matches(&write("/w/.hidden"), &missing()));
    }

    #[test]
    fn test_event_type_allow_list() {
        let filter = Filter::default()
            .event_type(EventType::Create)
            .compile()
            .unwrap();
        assert!(!filter.matches(&write("/w/a.txt"), &file(1)));
        assert!(filter.matches(&Event::new(EventType::Create, "/w/a.txt"), &file(1)));
    }

    #[test]
    fn test_hidden_files_dropped() {
        let filter = Filter::default().ignore_hidden(true).compile().unwrap();
        assert!(!filter.matches(&write("/w/.env"), &file(1)));
        assert!(filter.matches(&write("/w/env"), &file(1)));
    }

    #[test]
    fn test_directories_dropped_when_excluded() {
        let filter = Filter::default().include_dirs(false).compile().unwrap();
        assert!(!filter.matches(&write("/w/sub"), &dir()));
        assert!(filter.matches(&write("/w/a.txt"), &file(10)));
    }

    #[test]
    fn test_size_bounds() {
        let filter = Filter::default().size_range(10, 100).compile().unwrap();
        assert!(!filter.matches(&write("/w/a"), &file(5)));
        assert!(filter.matches(&write("/w/a"), &file(50)));
        assert!(!filter.matches(&write("/w/a"), &file(500)));
    }

    #[test]
    fn test_missing_metadata_keeps_remove_but_drops_write() {
        let filter = Filter::default()
            .size_range(10, 0)
            .extension("rs")
            .compile()
            .unwrap();
        let removed = Event::new(EventType::Remove, "/w/lib.rs");
        assert!(filter.matches(&removed, &missing()));
        assert!(!filter.matches(&write("/w/lib.rs"), &missing()));

        // Name checks still apply without metadata
        let removed_txt = Event::new(EventType::Remove, "/w/notes.txt");
        assert!(!filter.matches(&removed_txt, &missing()));
    }

    #[test]
    fn test_extension_allow_list() {
        let filter = Filter::default()
            .extension(".RS")
            .extension("toml")
            .compile()
            .unwrap();
        assert!(filter.matches(&write("/w/main.rs"), &file(1)));
        assert!(filter.matches(&write("/w/Cargo.TOML"), &file(1)));
        assert!(!filter.matches(&write("/w/readme.md"), &file(1)));
        assert!(!filter.matches(&write("/w/Makefile"), &file(1)));
    }

    #[test]
    fn test_include_and_exclude_patterns() {
        let filter = Filter::default()
            .include("*.log")
            .exclude("debug*")
            .compile()
            .unwrap();
        assert!(filter.matches(&write("/var/app/server.log"), &file(1)));
        assert!(!filter.matches(&write("/var/app/server.txt"), &file(1)));
        // Exclude wins over include
        assert!(!filter.matches(&write("/var/app/debug.log"), &file(1)));
    }

    #[test]
    fn test_pattern_matches_full_path() {
        let filter = Filter::default().exclude("/w/target/*").compile().unwrap();
        assert!(!filter.matches(&write("/w/target/out.o"), &file(1)));
        assert!(filter.matches(&write("/w/src/out.o"), &file(1)));
    }

    #[test]
    fn test_invalid_pattern_rejected() {
        let err = Filter::default().include("[abc").compile().unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::InvalidFilter);
    }

    #[test]
    fn test_filter_from_toml() {
        let filter: Filter = toml::from_str(
            r#"
            ignore_hidden = true
            extensions = ["rs"]
            event_types = ["write", "create"]
            "#,
        )
        .unwrap();
        assert!(filter.ignore_hidden);
        assert!(filter.include_dirs);
        assert_eq!(filter.event_types, vec![EventType::Write, EventType::Create]);
    }
}
