//! Source discovery and decoding.
//!
//! Walks the source directory for image files, reads each one, fingerprints
//! it, and decodes it through the [`ImageBackend`]. Files that fail to read
//! or decode are reported and skipped; they never abort the scan.
//!
//! ## What counts as a source
//!
//! Any file whose extension has a compiled-in decoder (see
//! [`supported_input_extensions`](crate::imaging::supported_input_extensions)).
//! Hidden entries (leading `.`) and the directories passed in `skip` (the
//! output and temp directories when they live inside the source) are ignored.
//!
//! ## Ordering
//!
//! Results come back sorted by relative path. That order is the batch load
//! order, so the lexically first file becomes the reference item.

use crate::batch::LoadedImage;
use crate::imaging::{BackendError, ImageBackend, is_supported_image};
use rayon::prelude::*;
use sha2::{Digest, Sha256};
use std::io;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;
use thiserror::Error;
use tracing::{debug, warn};
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Source directory not found: {0}")]
    SourceMissing(PathBuf),
    #[error("Failed to walk source directory: {0}")]
    Walk(#[from] walkdir::Error),
}

/// Why a single file was skipped.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("read failed: {0}")]
    Io(#[from] io::Error),
    #[error("{0}")]
    Decode(#[from] BackendError),
}

/// A discovered source file, not yet read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub path: PathBuf,
    /// Path relative to the source root with `/` separators.
    pub name: String,
}

#[derive(Debug)]
pub struct LoadFailure {
    pub name: String,
    pub error: LoadError,
}

#[derive(Debug, Default)]
pub struct ScanReport {
    pub loaded: Vec<LoadedImage>,
    pub failures: Vec<LoadFailure>,
}

fn is_hidden(entry: &walkdir::DirEntry) -> bool {
    entry.depth() > 0 && entry.file_name().to_string_lossy().starts_with('.')
}

fn relative_name(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// List supported image files under `source`, sorted by relative name.
pub fn discover(source: &Path, skip: &[PathBuf]) -> Result<Vec<SourceFile>, ScanError> {
    let root = match source.canonicalize() {
        Ok(root) if root.is_dir() => root,
        _ => return Err(ScanError::SourceMissing(source.to_path_buf())),
    };
    // Skip dirs that don't exist yet hold nothing to skip.
    let skip: Vec<PathBuf> = skip.iter().filter_map(|p| p.canonicalize().ok()).collect();

    let walker = WalkDir::new(&root)
        .follow_links(true)
        .into_iter()
        .filter_entry(|e| !is_hidden(e) && !skip.iter().any(|s| e.path() == s));

    let mut files = Vec::new();
    for entry in walker {
        let entry = entry?;
        if entry.file_type().is_file() && is_supported_image(entry.path()) {
            files.push(SourceFile {
                name: relative_name(&root, entry.path()),
                path: entry.into_path(),
            });
        }
    }
    files.sort_by(|a, b| a.name.cmp(&b.name));
    debug!(count = files.len(), source = %source.display(), "discovered source images");
    Ok(files)
}

/// SHA-256 of a byte slice, lowercase hex.
pub fn hash_bytes(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

fn modified_millis(path: &Path) -> io::Result<u64> {
    let modified = std::fs::metadata(path)?.modified()?;
    Ok(modified
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0))
}

fn load_one(backend: &impl ImageBackend, file: &SourceFile) -> Result<LoadedImage, LoadError> {
    let bytes = std::fs::read(&file.path)?;
    let modified = modified_millis(&file.path)?;
    let source_hash = hash_bytes(&bytes);
    let image = backend.decode(&bytes)?;
    Ok(LoadedImage {
        name: file.name.clone(),
        modified,
        source_hash,
        image,
    })
}

/// Read and decode files in parallel. Output keeps the input order.
pub fn load_sources(backend: &impl ImageBackend, files: &[SourceFile]) -> ScanReport {
    let results: Vec<(String, Result<LoadedImage, LoadError>)> = files
        .par_iter()
        .map(|file| (file.name.clone(), load_one(backend, file)))
        .collect();

    let mut report = ScanReport::default();
    for (name, result) in results {
        match result {
            Ok(loaded) => report.loaded.push(loaded),
            Err(error) => {
                warn!(file = %name, %error, "skipping unreadable image");
                report.failures.push(LoadFailure { name, error });
            }
        }
    }
    report
}

/// Discover and load every source image.
pub fn scan(
    backend: &impl ImageBackend,
    source: &Path,
    skip: &[PathBuf],
) -> Result<ScanReport, ScanError> {
    let files = discover(source, skip)?;
    Ok(load_sources(backend, &files))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::backend::tests::MockBackend;
    use std::fs;
    use tempfile::TempDir;

    /// Write a mock "image": the mock backend reads bytes 0 and 1 as its size.
    fn write_mock(dir: &Path, name: &str, width: u8, height: u8) {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, [width, height, 0, 0]).unwrap();
    }

    #[test]
    fn discover_filters_by_extension() {
        let tmp = TempDir::new().unwrap();
        write_mock(tmp.path(), "b.png", 4, 4);
        write_mock(tmp.path(), "a.JPG", 4, 4);
        fs::write(tmp.path().join("notes.txt"), "hi").unwrap();
        fs::write(tmp.path().join("raw.cr2"), "raw").unwrap();

        let files = discover(tmp.path(), &[]).unwrap();
        let names: Vec<&str> = files.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["a.JPG", "b.png"]);
    }

    #[test]
    fn discover_recurses_with_relative_names() {
        let tmp = TempDir::new().unwrap();
        write_mock(tmp.path(), "top.png", 4, 4);
        write_mock(tmp.path(), "box/inner.tif", 4, 4);

        let files = discover(tmp.path(), &[]).unwrap();
        let names: Vec<&str> = files.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["box/inner.tif", "top.png"]);
    }

    #[test]
    fn discover_skips_hidden_and_excluded_dirs() {
        let tmp = TempDir::new().unwrap();
        write_mock(tmp.path(), "keep.png", 4, 4);
        write_mock(tmp.path(), ".cache/hidden.png", 4, 4);
        write_mock(tmp.path(), "out/card1.jpg", 4, 4);

        let files = discover(tmp.path(), &[tmp.path().join("out")]).unwrap();
        let names: Vec<&str> = files.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["keep.png"]);
    }

    #[test]
    fn discover_missing_source_errors() {
        let tmp = TempDir::new().unwrap();
        let result = discover(&tmp.path().join("nope"), &[]);
        assert!(matches!(result, Err(ScanError::SourceMissing(_))));
    }

    #[test]
    fn scan_decodes_and_fingerprints() {
        let tmp = TempDir::new().unwrap();
        write_mock(tmp.path(), "a.png", 12, 9);
        let backend = MockBackend::new();

        let report = scan(&backend, tmp.path(), &[]).unwrap();
        assert!(report.failures.is_empty());
        assert_eq!(report.loaded.len(), 1);

        let loaded = &report.loaded[0];
        assert_eq!(loaded.name, "a.png");
        assert_eq!(loaded.image.dimensions(), (12, 9));
        assert_eq!(loaded.source_hash, hash_bytes(&[12, 9, 0, 0]));
        assert!(loaded.modified > 0);
    }

    #[test]
    fn scan_skips_undecodable_files() {
        let tmp = TempDir::new().unwrap();
        write_mock(tmp.path(), "good.png", 5, 5);
        fs::write(tmp.path().join("broken.png"), b"").unwrap();
        let backend = MockBackend::new();

        let report = scan(&backend, tmp.path(), &[]).unwrap();
        assert_eq!(report.loaded.len(), 1);
        assert_eq!(report.loaded[0].name, "good.png");
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].name, "broken.png");
        assert!(matches!(report.failures[0].error, LoadError::Decode(_)));
    }

    #[test]
    fn load_order_matches_discovery_order() {
        let tmp = TempDir::new().unwrap();
        for name in ["c.png", "a.png", "b.png"] {
            write_mock(tmp.path(), name, 3, 3);
        }
        let report = scan(&MockBackend::new(), tmp.path(), &[]).unwrap();
        let names: Vec<&str> = report.loaded.iter().map(|l| l.name.as_str()).collect();
        assert_eq!(names, vec!["a.png", "b.png", "c.png"]);
    }

    #[test]
    fn hash_is_stable_hex() {
        let h = hash_bytes(b"card");
        assert_eq!(h.len(), 64);
        assert_eq!(h, hash_bytes(b"card"));
        assert_ne!(h, hash_bytes(b"card2"));
    }
}
