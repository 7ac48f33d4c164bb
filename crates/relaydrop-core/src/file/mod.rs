//! File selection, naming and size formatting.
//!
//! The sender side picks one file through a [`FileSelector`]; the receiver
//! side turns the offered name into a safe path inside its download
//! directory.

use std::path::{Component, Path, PathBuf};

use crate::error::{Error, Result};

/// Units used by [`format_bytes`].
const SIZE_UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];

/// A file selected for sending, held until its upload is dispatched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedFile {
    /// Name announced to the peer
    pub name: String,
    /// Size in bytes at selection time
    pub size: u64,
    /// Byte source
    pub path: PathBuf,
}

impl StagedFile {
    /// Stage the file at `path`, reading its name and size.
    ///
    /// # Errors
    ///
    /// Returns an error if the path does not exist or is not a regular file.
    pub fn from_path(path: &Path) -> Result<Self> {
        let metadata = std::fs::metadata(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::FileNotFound(path.display().to_string())
            } else {
                Error::Io(e)
            }
        })?;

        if !metadata.is_file() {
            return Err(Error::NotAFile(path.display().to_string()));
        }

        let name = path
            .file_name()
            .map_or_else(|| "file".to_string(), |n| n.to_string_lossy().to_string());

        Ok(Self {
            name,
            size: metadata.len(),
            path: path.to_path_buf(),
        })
    }
}

/// File-selection collaborator.
///
/// Returns zero or one file. `None` means the user dismissed the selection,
/// which is not an error.
pub trait FileSelector: Send {
    /// Select a file, optionally starting from a suggested path.
    fn select(&mut self, suggested: Option<&Path>) -> Result<Option<StagedFile>>;
}

/// Selects exactly the suggested path, or nothing when none is given.
#[derive(Debug, Default, Clone, Copy)]
pub struct PathSelector;

impl FileSelector for PathSelector {
    fn select(&mut self, suggested: Option<&Path>) -> Result<Option<StagedFile>> {
        suggested.map(StagedFile::from_path).transpose()
    }
}

/// Format a byte count for display: `0 Bytes`, `1.5 KB`, `2 MB`.
///
/// Values keep up to two decimals with trailing zeros removed; anything at
/// or above a gigabyte is shown in GB.
#[must_use]
pub fn format_bytes(bytes: u64) -> String {
    if bytes == 0 {
        return "0 Bytes".to_string();
    }

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < SIZE_UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    let fixed = format!("{value:.2}");
    let trimmed = fixed.trim_end_matches('0').trim_end_matches('.');
    format!("{trimmed} {}", SIZE_UNITS[unit])
}

/// Reduce an offered file name to a single safe path component.
///
/// Directory parts, `..` and empty names never reach the filesystem.
#[must_use]
pub fn sanitize_file_name(name: &str) -> String {
    let normalized = name.replace('\\', "/");
    Path::new(&normalized)
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().to_string()),
            _ => None,
        })
        .last()
        .filter(|n| !n.trim().is_empty())
        .unwrap_or_else(|| "download".to_string())
}

/// Pick a path for `name` inside `dir` that does not exist yet.
///
/// `report.pdf` becomes `report (1).pdf`, `report (2).pdf`, ... on clashes.
#[must_use]
pub fn unique_download_path(dir: &Path, name: &str) -> PathBuf {
    let safe = sanitize_file_name(name);
    let candidate = dir.join(&safe);
    if !candidate.exists() {
        return candidate;
    }

    let path = Path::new(&safe);
    let stem = path
        .file_stem()
        .map_or_else(|| safe.clone(), |s| s.to_string_lossy().to_string());
    let ext = path.extension().map(|e| e.to_string_lossy().to_string());

    (1u32..)
        .map(|n| match &ext {
            Some(ext) => dir.join(format!("{stem} ({n}).{ext}")),
            None => dir.join(format!("{stem} ({n})")),
        })
        .find(|p| !p.exists())
        .unwrap_or(candidate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(0), "0 Bytes");
        assert_eq!(format_bytes(1), "1 Bytes");
        assert_eq!(format_bytes(512), "512 Bytes");
        assert_eq!(format_bytes(1024), "1 KB");
        assert_eq!(format_bytes(1536), "1.5 KB");
        assert_eq!(format_bytes(2048), "2 KB");
        assert_eq!(format_bytes(1024 * 1024 + 10 * 1024), "1.01 MB");
        assert_eq!(format_bytes(5 * 1024 * 1024 * 1024), "5 GB");
        assert_eq!(format_bytes(2 * 1024 * 1024 * 1024 * 1024), "2048 GB");
    }

    #[test]
    fn test_sanitize_file_name() {
        assert_eq!(sanitize_file_name("doc.pdf"), "doc.pdf");
        assert_eq!(sanitize_file_name("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_file_name("C:\\Users\\me\\a.txt"), "a.txt");
        assert_eq!(sanitize_file_name(".."), "download");
        assert_eq!(sanitize_file_name(""), "download");
    }

    #[test]
    fn test_unique_download_path() {
        let dir = TempDir::new().unwrap();
        let first = unique_download_path(dir.path(), "report.pdf");
        assert_eq!(first, dir.path().join("report.pdf"));

        std::fs::write(&first, b"x").unwrap();
        let second = unique_download_path(dir.path(), "report.pdf");
        assert_eq!(second, dir.path().join("report (1).pdf"));

        std::fs::write(&second, b"x").unwrap();
        let third = unique_download_path(dir.path(), "report.pdf");
        assert_eq!(third, dir.path().join("report (2).pdf"));
    }

    #[test]
    fn test_staged_file_from_path() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("doc.pdf");
        std::fs::write(&path, vec![0u8; 2048]).unwrap();

        let staged = StagedFile::from_path(&path).unwrap();
        assert_eq!(staged.name, "doc.pdf");
        assert_eq!(staged.size, 2048);
    }

    #[test]
    fn test_staged_file_missing_and_directory() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            StagedFile::from_path(&dir.path().join("missing")),
            Err(Error::FileNotFound(_))
        ));
        assert!(matches!(
            StagedFile::from_path(dir.path()),
            Err(Error::NotAFile(_))
        ));
    }

    #[test]
    fn test_path_selector() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.txt");
        std::fs::write(&path, b"hello").unwrap();

        let mut selector = PathSelector;
        assert!(selector.select(None).unwrap().is_none());
        assert_eq!(selector.select(Some(&path)).unwrap().unwrap().size, 5);
    }
}
