//! # Cache Directory Module
//!
//! Questo modulo gestisce la directory di cache dove finiscono video compressi e thumbnail.
//!
//! ## Responsabilità:
//! - Calcolo dei path di output: `<cache>/<nome file sorgente senza estensione>.<ext>`
//! - Cancellazione di file stale prima di una nuova scrittura
//! - Svuotamento della cache (`deleteAllCache`) lasciando la directory utilizzabile
//! - Formattazione human-readable delle dimensioni
//!
//! ## Esempio:
//! ```rust,ignore
//! let cache = CacheDir::new("/tmp/video_compress");
//! let output = cache.output_path_for(Path::new("/videos/clip.mov"), "mp4")?;
//! // -> /tmp/video_compress/clip.mp4
//! ```

use crate::error::{CompressError, Result};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;
use walkdir::WalkDir;

/// The well-known directory receiving every file the bridge writes
#[derive(Debug, Clone)]
pub struct CacheDir {
    root: PathBuf,
}

impl CacheDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the directory if needed
    pub async fn ensure(&self) -> Result<()> {
        fs::create_dir_all(&self.root).await.map_err(|e| {
            CompressError::WriteFailed(format!("Failed to create cache dir {}: {}", self.root.display(), e))
        })
    }

    /// Output path for `source` with its extension replaced by `extension`
    pub fn output_path_for(&self, source: &Path, extension: &str) -> Result<PathBuf> {
        let file_stem = source
            .file_stem()
            .ok_or_else(|| CompressError::InvalidArgument(format!("Invalid file name: {}", source.display())))?
            .to_string_lossy();

        Ok(self.root.join(format!("{}.{}", file_stem, extension)))
    }

    /// Remove a file if it exists; returns whether something was deleted
    pub async fn remove_file_if_exists(path: &Path) -> Result<bool> {
        match fs::remove_file(path).await {
            Ok(()) => {
                debug!("Removed {}", path.display());
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Delete everything inside the cache and leave an empty directory behind
    pub async fn clear(&self) -> Result<usize> {
        if !self.root.exists() {
            self.ensure().await?;
            return Ok(0);
        }

        let entries: Vec<(PathBuf, bool)> = WalkDir::new(&self.root)
            .min_depth(1)
            .max_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
            .map(|e| (e.path().to_path_buf(), e.file_type().is_dir()))
            .collect();

        let mut removed = 0;
        for (path, is_dir) in entries {
            let result = if is_dir {
                fs::remove_dir_all(&path).await
            } else {
                fs::remove_file(&path).await
            };
            match result {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    return Err(CompressError::WriteFailed(format!("Failed to remove {}: {}", path.display(), e)));
                }
            }
        }

        self.ensure().await?;
        debug!("Cleared {} entries from {}", removed, self.root.display());
        Ok(removed)
    }

    /// Get human-readable file size
    pub fn format_size(size: u64) -> String {
        const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
        let mut size = size as f64;
        let mut unit_index = 0;

        while size >= 1024.0 && unit_index < UNITS.len() - 1 {
            size /= 1024.0;
            unit_index += 1;
        }

        if unit_index == 0 {
            format!("{} {}", size as u64, UNITS[unit_index])
        } else {
            format!("{:.2} {}", size, UNITS[unit_index])
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_output_path_uses_source_stem() {
        let cache = CacheDir::new("/tmp/vc");
        let output = cache.output_path_for(Path::new("/videos/holiday.clip.MOV"), "mp4").unwrap();
        assert_eq!(output, PathBuf::from("/tmp/vc/holiday.clip.mp4"));

        let thumb = cache.output_path_for(Path::new("/videos/holiday.mov"), "jpg").unwrap();
        assert_eq!(thumb, PathBuf::from("/tmp/vc/holiday.jpg"));

        assert!(cache.output_path_for(Path::new("/"), "mp4").is_err());
    }

    #[tokio::test]
    async fn test_clear_removes_everything_and_keeps_dir_usable() {
        let temp_dir = TempDir::new().unwrap();
        let cache = CacheDir::new(temp_dir.path().join("cache"));
        cache.ensure().await.unwrap();

        std::fs::write(cache.root().join("a.mp4"), b"a").unwrap();
        std::fs::write(cache.root().join("b.jpg"), b"b").unwrap();
        std::fs::create_dir(cache.root().join("nested")).unwrap();
        std::fs::write(cache.root().join("nested").join("c.mp4"), b"c").unwrap();

        assert_eq!(cache.clear().await.unwrap(), 3);
        assert!(cache.root().is_dir());
        assert_eq!(std::fs::read_dir(cache.root()).unwrap().count(), 0);

        std::fs::write(cache.root().join("again.mp4"), b"ok").unwrap();
        assert!(cache.root().join("again.mp4").exists());
    }

    #[tokio::test]
    async fn test_clear_creates_missing_dir() {
        let temp_dir = TempDir::new().unwrap();
        let cache = CacheDir::new(temp_dir.path().join("never-created"));
        assert_eq!(cache.clear().await.unwrap(), 0);
        assert!(cache.root().is_dir());
    }

    #[tokio::test]
    async fn test_remove_file_if_exists() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("stale.mp4");
        std::fs::write(&path, b"old").unwrap();

        assert!(CacheDir::remove_file_if_exists(&path).await.unwrap());
        assert!(!CacheDir::remove_file_if_exists(&path).await.unwrap());
    }

    #[test]
    fn test_format_size() {
        assert_eq!(CacheDir::format_size(512), "512 B");
        assert_eq!(CacheDir::format_size(1536), "1.50 KB");
        assert_eq!(CacheDir::format_size(5 * 1024 * 1024), "5.00 MB");
    }
}
