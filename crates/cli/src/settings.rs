//! Config file loading and flag overrides

use anyhow::{Context, Result};
use fswatch::{BatchConfig, Config, DebounceConfig, Filter};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

/// On-disk watcher settings
///
/// ```toml
/// buffer_size = 256
///
/// [filter]
/// extensions = ["rs", "toml"]
/// ignore_hidden = true
///
/// [debounce]
/// enabled = true
/// max_wait_ms = 200
/// ```
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub filter: Filter,
    pub debounce: DebounceConfig,
    pub batch: BatchConfig,
    pub buffer_size: Option<usize>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        toml::from_str(&text)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }
}

/// Command-line values that take precedence over the file
#[derive(Debug, Default)]
pub struct Overrides {
    pub debounce_ms: Option<u64>,
    pub batch_size: Option<usize>,
    pub batch_wait_ms: Option<u64>,
    pub extensions: Vec<String>,
    pub ignore_hidden: bool,
}

/// Merge file settings and flags into a watcher config (no handlers yet)
pub fn resolve(file: FileConfig, flags: &Overrides) -> Config {
    let FileConfig {
        mut filter,
        mut debounce,
        mut batch,
        buffer_size,
    } = file;

    if let Some(ms) = flags.debounce_ms {
        debounce.enabled = true;
        debounce.delay = Duration::from_millis(ms);
        debounce.max_wait = Duration::from_millis(ms);
    }

    if let Some(size) = flags.batch_size {
        batch.enabled = true;
        batch.max_size = size;
    }
    if let Some(ms) = flags.batch_wait_ms {
        batch.enabled = true;
        batch.max_wait = Duration::from_millis(ms);
    }

    if !flags.extensions.is_empty() {
        filter.extensions = flags.extensions.clone();
    }
    if flags.ignore_hidden {
        filter.ignore_hidden = true;
    }

    let mut config = Config::default()
        .with_filter(filter)
        .with_debounce(debounce)
        .with_batch(batch);
    if let Some(size) = buffer_size {
        config = config.with_buffer_size(size);
    }
    config
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_sections() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("fsw.toml");
        fs::write(
            &path,
            r#"
buffer_size = 16

[filter]
extensions = ["rs"]
exclude_patterns = ["target*"]

[batch]
enabled = true
max_size = 10
max_wait_ms = 250
"#,
        )
        .unwrap();

        let file = FileConfig::load(&path).unwrap();
        assert_eq!(file.buffer_size, Some(16));
        assert_eq!(file.filter.extensions, ["rs"]);
        assert!(file.batch.enabled);
        assert_eq!(file.batch.max_wait, Duration::from_millis(250));
        assert!(!file.debounce.enabled);
    }

    #[test]
    fn test_missing_file_has_context() {
        let temp = TempDir::new().unwrap();
        let err = FileConfig::load(&temp.path().join("nope.toml")).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }

    #[test]
    fn test_flags_override_file() {
        let mut file = FileConfig::default();
        file.filter.extensions = vec!["txt".into()];
        file.buffer_size = Some(8);

        let flags = Overrides {
            debounce_ms: Some(75),
            batch_size: Some(3),
            extensions: vec!["rs".into()],
            ignore_hidden: true,
            ..Overrides::default()
        };
        let config = resolve(file, &flags);

        assert!(config.debounce.enabled);
        assert_eq!(config.debounce.max_wait, Duration::from_millis(75));
        assert!(config.batch.enabled);
        assert_eq!(config.batch.max_size, 3);
        assert_eq!(config.filter.extensions, ["rs"]);
        assert!(config.filter.ignore_hidden);
        assert_eq!(config.buffer_size, 8);
    }

    #[test]
    fn test_no_flags_keeps_defaults() {
        let config = resolve(FileConfig::default(), &Overrides::default());
        assert!(!config.debounce.enabled);
        assert!(!config.batch.enabled);
        assert_eq!(config.buffer_size, fswatch::config::DEFAULT_BUFFER_SIZE);
    }
}
