//! Selection of the text files a corpus is built from.
//!
//! Sources can be given three ways, and they can be mixed:
//!
//! 1. Individual files, which are always included.
//! 2. Directories, walked recursively with `ignore::WalkBuilder`. Hidden entries are
//!    skipped and `.gitignore` rules are honoured.
//! 3. A file list, one path per line, read with [`read_file_list`].
//!
//! Files discovered by walking a directory must also pass the [`SourceFilter`]: an
//! optional extension allow-list, glob ignore patterns, and a fixed list of binary
//! extensions that would only pollute the corpus.

use glob::Pattern;
use ignore::WalkBuilder;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

use crate::errors::{ScanError, ScanResult};

const BINARY_EXTENSIONS: &[&str] = &[
    "exe", "dll", "so", "dylib", "bin", "obj", "o", "class", "jar", "png", "jpg", "jpeg", "gif",
    "bmp", "ico", "pdf", "doc", "docx", "xls", "xlsx", "zip", "tar", "gz", "bz2", "xz", "7z",
    "rar", "epub", "mobi",
];

/// Decides which walked files become corpus sources
#[derive(Debug, Clone, Default)]
pub struct SourceFilter {
    extensions: Option<Vec<String>>,
    ignore_patterns: Vec<Pattern>,
}

impl SourceFilter {
    /// Compiles the ignore globs; an invalid glob is a configuration error
    pub fn new(extensions: Option<Vec<String>>, ignore_patterns: &[String]) -> ScanResult<Self> {
        let ignore_patterns = ignore_patterns
            .iter()
            .map(|p| {
                Pattern::new(p).map_err(|e| {
                    ScanError::config_error(format!("invalid ignore pattern '{}': {}", p, e))
                })
            })
            .collect::<ScanResult<Vec<_>>>()?;
        let extensions = extensions.map(|exts| {
            exts.into_iter()
                .map(|e| e.trim_start_matches('.').to_string())
                .collect()
        });
        Ok(Self {
            extensions,
            ignore_patterns,
        })
    }

    fn extension(path: &Path) -> Option<&str> {
        path.extension().and_then(|ext| ext.to_str())
    }

    pub fn has_valid_extension(&self, path: &Path) -> bool {
        match &self.extensions {
            None => true,
            Some(exts) => Self::extension(path)
                .is_some_and(|ext| exts.iter().any(|e| e.eq_ignore_ascii_case(ext))),
        }
    }

    pub fn is_likely_binary(&self, path: &Path) -> bool {
        Self::extension(path).is_some_and(|ext| {
            BINARY_EXTENSIONS
                .iter()
                .any(|bin| bin.eq_ignore_ascii_case(ext))
        })
    }

    pub fn should_ignore(&self, path: &Path) -> bool {
        let normalized = path.to_string_lossy().replace('\\', "/");
        self.ignore_patterns.iter().any(|p| p.matches(&normalized))
    }

    pub fn should_include(&self, path: &Path) -> bool {
        !self.is_likely_binary(path) && self.has_valid_extension(path) && !self.should_ignore(path)
    }
}

/// Reads a file list: one path per line, blank lines and `#` comments skipped.
///
/// Relative entries are resolved against the directory holding the list.
pub fn read_file_list(list: &Path) -> ScanResult<Vec<PathBuf>> {
    let content = fs::read_to_string(list).map_err(|e| ScanError::from_source_io(list, e))?;
    let base = list.parent().unwrap_or_else(|| Path::new(""));
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(|line| {
            let path = PathBuf::from(line);
            if path.is_relative() {
                base.join(path)
            } else {
                path
            }
        })
        .collect())
}

/// Expands `roots` into a sorted, de-duplicated list of source files
pub fn collect_sources(roots: &[PathBuf], filter: &SourceFilter) -> ScanResult<Vec<PathBuf>> {
    let mut sources = Vec::new();

    for root in roots {
        let metadata = fs::metadata(root).map_err(|e| ScanError::from_source_io(root, e))?;
        if metadata.is_file() {
            trace!("Adding explicit source: {}", root.display());
            sources.push(root.clone());
            continue;
        }

        debug!("Walking source directory: {}", root.display());
        let walker = WalkBuilder::new(root)
            .hidden(true)
            .standard_filters(true)
            .require_git(false)
            .sort_by_file_path(|a, b| a.cmp(b))
            .build();

        let before = sources.len();
        sources.extend(
            walker
                .filter_map(Result::ok)
                .filter(|e| e.file_type().is_some_and(|ft| ft.is_file()))
                .filter(|e| filter.should_include(e.path()))
                .map(|e| e.into_path()),
        );
        debug!(
            "Found {} source files under {}",
            sources.len() - before,
            root.display()
        );
    }

    sources.sort();
    sources.dedup();
    Ok(sources)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_has_valid_extension() {
        let filter = SourceFilter::new(Some(vec![".txt".to_string()]), &[]).unwrap();
        assert!(filter.has_valid_extension(Path::new("book.txt")));
        assert!(filter.has_valid_extension(Path::new("BOOK.TXT")));
        assert!(!filter.has_valid_extension(Path::new("book.html")));
        assert!(!filter.has_valid_extension(Path::new("README")));

        let any = SourceFilter::default();
        assert!(any.has_valid_extension(Path::new("README")));
    }

    #[test]
    fn test_should_ignore() {
        let filter =
            SourceFilter::new(None, &["**/*-h.htm".to_string(), "old/*".to_string()]).unwrap();
        assert!(filter.should_ignore(Path::new("etext/1342-h.htm")));
        assert!(filter.should_ignore(Path::new("old/11.txt")));
        assert!(!filter.should_ignore(Path::new("etext/1342.txt")));
    }

    #[test]
    fn test_invalid_glob_is_config_error() {
        let err = SourceFilter::new(None, &["[".to_string()]).unwrap_err();
        assert!(matches!(err, ScanError::ConfigError(_)));
    }

    #[test]
    fn test_binary_files_excluded() {
        let filter = SourceFilter::default();
        assert!(!filter.should_include(Path::new("cover.JPG")));
        assert!(!filter.should_include(Path::new("book.zip")));
        assert!(filter.should_include(Path::new("book.txt")));
    }

    #[test]
    fn test_collect_sources_walks_and_filters() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("nested");
        fs::create_dir_all(&nested).unwrap();
        fs::write(dir.path().join("b.txt"), "b").unwrap();
        fs::write(nested.join("a.txt"), "a").unwrap();
        fs::write(nested.join("skip.md"), "md").unwrap();
        fs::write(nested.join("image.png"), "png").unwrap();

        let filter = SourceFilter::new(Some(vec!["txt".to_string()]), &[]).unwrap();
        let sources = collect_sources(&[dir.path().to_path_buf()], &filter).unwrap();
        assert_eq!(sources, vec![dir.path().join("b.txt"), nested.join("a.txt")]);
    }

    #[test]
    fn test_collect_sources_missing_root() {
        let err = collect_sources(&[PathBuf::from("no/such/dir")], &SourceFilter::default())
            .unwrap_err();
        assert!(matches!(err, ScanError::SourceNotFound(_)));
    }

    #[test]
    fn test_read_file_list() {
        let dir = tempdir().unwrap();
        let list = dir.path().join("filelist");
        fs::write(&list, "# books\none.txt\n\n/abs/two.txt\n").unwrap();
        let paths = read_file_list(&list).unwrap();
        assert_eq!(
            paths,
            vec![dir.path().join("one.txt"), PathBuf::from("/abs/two.txt")]
        );
    }
}
