use indicatif::{ProgressBar, ProgressStyle};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, trace};

use super::manifest::CorpusManifest;
use super::{Corpus, CORPUS_PAD, SENTINEL};
use crate::errors::{ScanError, ScanResult};

/// Counters describing a corpus build
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CorpusStats {
    pub files: usize,
    pub records: usize,
    pub discarded_lines: usize,
    /// Record bytes including separators, excluding the pad
    pub bytes: usize,
}

/// Concatenates text sources into a sentinel-delimited corpus.
///
/// Every line of every source becomes one record. Carriage returns are removed and
/// lines shorter than the substring length are dropped, since no candidate fits in them.
///
/// ```rust,ignore
/// let mut builder = CorpusBuilder::new(22).with_capacity(Some(1 << 20));
/// builder.add_file(Path::new("book.txt"))?;
/// let manifest = builder.write_to(Path::new("corpus.bin"))?;
/// ```
#[derive(Debug)]
pub struct CorpusBuilder {
    substring_len: usize,
    capacity: Option<usize>,
    bytes: Vec<u8>,
    stats: CorpusStats,
    sources: Vec<PathBuf>,
}

impl CorpusBuilder {
    pub fn new(substring_len: usize) -> Self {
        Self {
            substring_len,
            capacity: None,
            bytes: Vec::new(),
            stats: CorpusStats::default(),
            sources: Vec::new(),
        }
    }

    /// Limits the record bytes (separators included, pad excluded)
    pub fn with_capacity(mut self, capacity: Option<usize>) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn substring_len(&self) -> usize {
        self.substring_len
    }

    pub fn stats(&self) -> CorpusStats {
        self.stats
    }

    pub fn add_file(&mut self, path: &Path) -> ScanResult<()> {
        let file = File::open(path).map_err(|e| ScanError::from_source_io(path, e))?;
        self.add_reader(BufReader::new(file), path)
    }

    /// Adds every line of `reader` as a record; `origin` names the source in errors
    pub fn add_reader<R: BufRead>(&mut self, mut reader: R, origin: &Path) -> ScanResult<()> {
        let mut line = Vec::new();
        let mut kept = 0;
        let mut dropped = 0;

        loop {
            line.clear();
            let read = reader
                .read_until(b'\n', &mut line)
                .map_err(|e| ScanError::from_source_io(origin, e))?;
            if read == 0 {
                break;
            }
            if line.last() == Some(&b'\n') {
                line.pop();
            }
            line.retain(|&b| b != b'\r');

            if line.len() < self.substring_len {
                dropped += 1;
                continue;
            }

            let needed = self.bytes.len() + line.len() + 1;
            if let Some(capacity) = self.capacity {
                if needed > capacity {
                    return Err(ScanError::corpus_full(origin, capacity));
                }
            }
            self.bytes.extend_from_slice(&line);
            self.bytes.push(SENTINEL);
            kept += 1;
        }

        trace!(
            "{}: {} records kept, {} lines dropped",
            origin.display(),
            kept,
            dropped
        );
        self.stats.files += 1;
        self.stats.records += kept;
        self.stats.discarded_lines += dropped;
        self.stats.bytes = self.bytes.len();
        self.sources.push(origin.to_path_buf());
        Ok(())
    }

    /// Adds `paths` in order, showing a progress bar unless `quiet`
    pub fn add_files(&mut self, paths: &[PathBuf], quiet: bool) -> ScanResult<()> {
        let progress = if quiet {
            ProgressBar::hidden()
        } else {
            let bar = ProgressBar::new(paths.len() as u64);
            if let Ok(style) = ProgressStyle::default_bar()
                .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} files {msg}")
            {
                bar.set_style(style.progress_chars("=>-"));
            }
            bar
        };

        for path in paths {
            debug!("Adding file {}", path.display());
            progress.set_message(
                path.file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or_default(),
            );
            if let Err(e) = self.add_file(path) {
                progress.abandon();
                return Err(e);
            }
            progress.inc(1);
        }

        progress.finish_and_clear();
        Ok(())
    }

    pub fn manifest(&self) -> CorpusManifest {
        CorpusManifest {
            version: env!("CARGO_PKG_VERSION").to_string(),
            substring_len: self.substring_len,
            files: self.stats.files,
            records: self.stats.records,
            discarded_lines: self.stats.discarded_lines,
            data_bytes: self.stats.bytes,
            sources: self.sources.clone(),
        }
    }

    /// Returns the padded corpus bytes and the final counters
    pub fn finish(mut self) -> (Vec<u8>, CorpusStats) {
        self.bytes.resize(self.bytes.len() + CORPUS_PAD, SENTINEL);
        (self.bytes, self.stats)
    }

    pub fn into_corpus(self) -> Corpus {
        Corpus::from_bytes(self.finish().0)
    }

    /// Writes the corpus file and its manifest
    pub fn write_to(self, path: &Path) -> ScanResult<CorpusManifest> {
        let manifest = self.manifest();
        let (bytes, stats) = self.finish();

        let file = File::create(path).map_err(|e| ScanError::from_io(path, e))?;
        let mut writer = BufWriter::new(file);
        writer.write_all(&bytes)?;
        writer.flush()?;

        manifest.save(&CorpusManifest::path_for(path))?;
        info!(
            "Wrote corpus {}: {} files, {} records, {} bytes ({} lines dropped)",
            path.display(),
            stats.files,
            stats.records,
            stats.bytes,
            stats.discarded_lines
        );
        Ok(manifest)
    }
}
