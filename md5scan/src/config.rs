use config::{Config as ConfigBuilder, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::errors::{ScanError, ScanResult};

/// Shortest supported substring length
pub const MIN_SUBSTRING_LEN: usize = 19;

/// Longest substring that still fits a single MD5 block with its padding
pub const MAX_SUBSTRING_LEN: usize = 55;

/// Exclusive upper bound on the worker count
pub const MAX_THREADS: usize = 64;

/// Settings shared by the corpus builder and the scan engine.
///
/// # Configuration Locations
///
/// Files are merged in order, later ones overriding earlier ones:
/// 1. Global `$CONFIG_DIR/md5scan/config.yaml`
/// 2. Local `.md5scan.yaml` in the current directory
/// 3. Custom config file specified via `--config`
///
/// Command-line flags are applied last with [`ScanConfig::merge_with_cli`].
///
/// # Configuration Format
///
/// ```yaml
/// # Corpus file produced by `md5scan-cli build`
/// corpus_path: "data/corpus.bin"
///
/// # Length of every candidate substring (19..=55)
/// substring_len: 22
///
/// # Worker threads (1..=63, default: CPU cores)
/// thread_count: 8
///
/// # Log level (trace, debug, info, warn, error)
/// log_level: "info"
///
/// # Upper bound on corpus size when building, null for unlimited
/// max_corpus_bytes: 450000000
///
/// # Source filtering when building from directories
/// extensions: ["txt"]
/// ignore_patterns: ["**/old/**"]
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    pub corpus_path: PathBuf,
    pub substring_len: usize,
    pub thread_count: usize,
    pub log_level: String,
    pub max_corpus_bytes: Option<usize>,
    /// Extensions accepted when walking directories; `None` accepts all
    pub extensions: Option<Vec<String>>,
    /// Glob patterns excluded when walking directories
    pub ignore_patterns: Vec<String>,
}

fn default_thread_count() -> usize {
    num_cpus::get().clamp(1, MAX_THREADS - 1)
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            corpus_path: PathBuf::from("corpus.bin"),
            substring_len: MIN_SUBSTRING_LEN,
            thread_count: default_thread_count(),
            log_level: "warn".to_string(),
            max_corpus_bytes: Some(450_000_000),
            extensions: None,
            ignore_patterns: Vec::new(),
        }
    }
}

/// Values given on the command line; `None` keeps the file value
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub corpus_path: Option<PathBuf>,
    pub substring_len: Option<usize>,
    pub thread_count: Option<usize>,
    pub log_level: Option<String>,
    pub extensions: Option<Vec<String>>,
    pub ignore_patterns: Option<Vec<String>>,
}

impl ScanConfig {
    /// Loads configuration from the default locations
    pub fn load() -> ScanResult<Self> {
        Self::load_from(None)
    }

    /// Loads the default locations plus an optional explicit file
    pub fn load_from(config_path: Option<&Path>) -> ScanResult<Self> {
        let mut builder = ConfigBuilder::builder();

        let config_files = [
            dirs::config_dir().map(|p| p.join("md5scan/config.yaml")),
            Some(PathBuf::from(".md5scan.yaml")),
            config_path.map(PathBuf::from),
        ];

        for path in config_files.iter().flatten() {
            if path.exists() {
                builder = builder.add_source(File::from(path.as_path()));
            }
        }

        // An explicit file that does not exist is a mistake, not an empty config
        if let Some(path) = config_path {
            if !path.exists() {
                return Err(ScanError::config_error(format!(
                    "config file not found: {}",
                    path.display()
                )));
            }
        }

        builder
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| ScanError::config_error(e.to_string()))
    }

    /// Applies command-line values on top of the file configuration
    pub fn merge_with_cli(mut self, cli: ConfigOverrides) -> Self {
        if let Some(corpus_path) = cli.corpus_path {
            self.corpus_path = corpus_path;
        }
        if let Some(substring_len) = cli.substring_len {
            self.substring_len = substring_len;
        }
        if let Some(thread_count) = cli.thread_count {
            self.thread_count = thread_count;
        }
        if let Some(log_level) = cli.log_level {
            self.log_level = log_level;
        }
        if cli.extensions.is_some() {
            self.extensions = cli.extensions;
        }
        if let Some(ignore_patterns) = cli.ignore_patterns {
            self.ignore_patterns = ignore_patterns;
        }
        self
    }

    /// Checks the substring length, the only bound a corpus build needs
    pub fn validate_substring_len(&self) -> ScanResult<()> {
        if !(MIN_SUBSTRING_LEN..=MAX_SUBSTRING_LEN).contains(&self.substring_len) {
            return Err(ScanError::config_error(format!(
                "substring length must be between {} and {}, got {}",
                MIN_SUBSTRING_LEN, MAX_SUBSTRING_LEN, self.substring_len
            )));
        }
        Ok(())
    }

    /// Checks the bounds the engine relies on
    pub fn validate(&self) -> ScanResult<()> {
        self.validate_substring_len()?;
        if self.thread_count == 0 || self.thread_count >= MAX_THREADS {
            return Err(ScanError::config_error(format!(
                "thread count must be between 1 and {}, got {}",
                MAX_THREADS - 1,
                self.thread_count
            )));
        }
        Ok(())
    }
}
