use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::errors::{ScanError, ScanResult};

/// Build information stored beside a corpus file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorpusManifest {
    /// Version of md5scan that wrote the corpus
    pub version: String,
    /// Substring length the corpus was built for; shorter lines were dropped
    pub substring_len: usize,
    /// Number of source files read
    pub files: usize,
    /// Number of records kept
    pub records: usize,
    /// Lines dropped for being shorter than `substring_len`
    pub discarded_lines: usize,
    /// Record bytes including separators, excluding the pad
    pub data_bytes: usize,
    /// Source files in the order they were added
    #[serde(default)]
    pub sources: Vec<PathBuf>,
}

impl CorpusManifest {
    /// `corpus.bin` -> `corpus.bin.json`
    pub fn path_for(corpus_path: &Path) -> PathBuf {
        let mut name = corpus_path.as_os_str().to_owned();
        name.push(".json");
        PathBuf::from(name)
    }

    pub fn save(&self, path: &Path) -> ScanResult<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).map_err(ScanError::IoError)
    }

    pub fn load(path: &Path) -> ScanResult<Self> {
        let json = fs::read_to_string(path).map_err(|e| ScanError::from_io(path, e))?;
        Ok(serde_json::from_str(&json)?)
    }

    /// Whether a search for substrings of `len` bytes can see every candidate.
    ///
    /// Lines shorter than the build length were dropped, so searching for
    /// shorter substrings may miss candidates inside those lines.
    pub fn covers_substring_len(&self, len: usize) -> bool {
        len >= self.substring_len
    }
}
