//! The corpus: every record of every source file concatenated into one flat buffer.
//!
//! # Format
//!
//! Records (lines) are stored back to back, each terminated by a single [`SENTINEL`]
//! byte, followed by [`CORPUS_PAD`] sentinel bytes. The pad lets fixed-width readers
//! run a few words past the last record without leaving the buffer; the scan engine
//! itself zero-fills reads past the end, so it does not depend on it.
//!
//! ```text
//! | r e c o r d 1 \0 | r e c o r d 2 \0 | ... | \0 \0 \0 ... (pad) |
//! ```
//!
//! A JSON manifest describing how the corpus was built is written next to the corpus
//! file (`corpus.bin` -> `corpus.bin.json`). It is informational; a corpus without a
//! manifest is still searchable.
//!
//! # Loading
//!
//! Corpus files are memory mapped with `memmap2`, so a multi-hundred-megabyte corpus is
//! shared between all workers without copying. Small in-memory corpora (tests, embedding)
//! use [`Corpus::from_bytes`] or [`Corpus::from_records`].

pub mod builder;
pub mod manifest;
pub mod sources;

pub use builder::{CorpusBuilder, CorpusStats};
pub use manifest::CorpusManifest;
pub use sources::{collect_sources, read_file_list, SourceFilter};

use memmap2::Mmap;
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::errors::{ScanError, ScanResult};

/// Record separator
pub const SENTINEL: u8 = 0;

/// Number of sentinel bytes written after the last record
pub const CORPUS_PAD: usize = 128;

enum Storage {
    Mapped(Mmap),
    Owned(Vec<u8>),
}

impl Storage {
    fn as_slice(&self) -> &[u8] {
        match self {
            Storage::Mapped(mmap) => &mmap[..],
            Storage::Owned(bytes) => bytes.as_slice(),
        }
    }
}

/// Read-only view of a corpus
pub struct Corpus {
    storage: Storage,
    data_len: usize,
    path: Option<PathBuf>,
    manifest: Option<CorpusManifest>,
}

impl Corpus {
    /// Memory maps a corpus file and loads its manifest if one exists
    pub fn open(path: impl AsRef<Path>) -> ScanResult<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| ScanError::from_io(path, e))?;
        let size = file
            .metadata()
            .map_err(|e| ScanError::from_io(path, e))?
            .len();

        let storage = if size == 0 {
            Storage::Owned(Vec::new())
        } else {
            let mmap = unsafe { Mmap::map(&file) }.map_err(ScanError::IoError)?;
            Storage::Mapped(mmap)
        };

        let manifest_path = CorpusManifest::path_for(path);
        let manifest = if manifest_path.exists() {
            match CorpusManifest::load(&manifest_path) {
                Ok(manifest) => Some(manifest),
                Err(e) => {
                    warn!("Ignoring unreadable manifest {}: {}", manifest_path.display(), e);
                    None
                }
            }
        } else {
            None
        };

        let mut corpus = Self::with_storage(storage);
        corpus.path = Some(path.to_path_buf());
        corpus.manifest = manifest;
        debug!(
            "Opened corpus {} ({} bytes, {} data bytes)",
            path.display(),
            size,
            corpus.data_len
        );
        Ok(corpus)
    }

    /// Wraps an already concatenated buffer
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self::with_storage(Storage::Owned(bytes))
    }

    /// Builds a corpus from individual records, adding separators and pad
    pub fn from_records<I, R>(records: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: AsRef<[u8]>,
    {
        let mut bytes = Vec::new();
        for record in records {
            bytes.extend_from_slice(record.as_ref());
            bytes.push(SENTINEL);
        }
        bytes.resize(bytes.len() + CORPUS_PAD, SENTINEL);
        Self::from_bytes(bytes)
    }

    fn with_storage(storage: Storage) -> Self {
        let data_len = storage
            .as_slice()
            .iter()
            .rposition(|&b| b != SENTINEL)
            .map_or(0, |last| last + 1);
        Self {
            storage,
            data_len,
            path: None,
            manifest: None,
        }
    }

    /// The searchable bytes, without the trailing sentinel run
    pub fn data(&self) -> &[u8] {
        &self.storage.as_slice()[..self.data_len]
    }

    /// The whole buffer including the pad
    pub fn as_bytes(&self) -> &[u8] {
        self.storage.as_slice()
    }

    pub fn len(&self) -> usize {
        self.data_len
    }

    pub fn is_empty(&self) -> bool {
        self.data_len == 0
    }

    pub fn is_mapped(&self) -> bool {
        matches!(self.storage, Storage::Mapped(_))
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn manifest(&self) -> Option<&CorpusManifest> {
        self.manifest.as_ref()
    }

    /// Number of non-empty records
    pub fn record_count(&self) -> usize {
        self.data()
            .split(|&b| b == SENTINEL)
            .filter(|record| !record.is_empty())
            .count()
    }
}

impl std::fmt::Debug for Corpus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Corpus")
            .field("path", &self.path)
            .field("data_len", &self.data_len)
            .field("mapped", &self.is_mapped())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_from_records_layout() {
        let corpus = Corpus::from_records(["abc", "de"]);
        assert_eq!(corpus.data(), b"abc\0de");
        assert_eq!(corpus.len(), 6);
        assert_eq!(corpus.as_bytes().len(), 7 + CORPUS_PAD);
        assert_eq!(corpus.record_count(), 2);
        assert!(!corpus.is_mapped());
    }

    #[test]
    fn test_empty_corpus() {
        let corpus = Corpus::from_bytes(vec![0; 16]);
        assert!(corpus.is_empty());
        assert_eq!(corpus.record_count(), 0);
    }

    #[test]
    fn test_open_maps_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("corpus.bin");
        std::fs::write(&path, b"hello world\0second\0\0\0\0").unwrap();

        let corpus = Corpus::open(&path).unwrap();
        assert!(corpus.is_mapped());
        assert_eq!(corpus.data(), b"hello world\0second");
        assert_eq!(corpus.path(), Some(path.as_path()));
        assert!(corpus.manifest().is_none());
    }

    #[test]
    fn test_open_empty_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("empty.bin");
        std::fs::write(&path, b"").unwrap();
        let corpus = Corpus::open(&path).unwrap();
        assert!(corpus.is_empty());
    }

    #[test]
    fn test_open_missing_file() {
        let err = Corpus::open("does/not/exist.bin").unwrap_err();
        assert!(matches!(err, ScanError::CorpusNotFound(_)));
    }
}
