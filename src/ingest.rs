//! Image ingestion.
//!
//! Turns user-selected files and directories into opaque image references.
//! Explicit files keep their command-line order; directories are walked
//! in file-name order so repeated runs produce the same sequence.

use crate::config::IngestConfig;
use crate::models::ImageRef;
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

/// Rules for accepting image files.
#[derive(Debug, Clone)]
pub struct ImageScanConfig {
    /// Accepted extensions, lowercase, without the dot.
    pub extensions: Vec<String>,
    /// Maximum file size in bytes
    pub max_file_size: u64,
    /// Maximum images collected per call
    pub max_images: usize,
}

impl Default for ImageScanConfig {
    fn default() -> Self {
        Self::from(&IngestConfig::default())
    }
}

impl From<&IngestConfig> for ImageScanConfig {
    fn from(config: &IngestConfig) -> Self {
        Self {
            extensions: config
                .extensions
                .iter()
                .map(|e| e.trim_start_matches('.').to_lowercase())
                .collect(),
            max_file_size: config.max_file_size,
            max_images: config.max_images,
        }
    }
}

/// Collects image references from the filesystem.
pub struct ImageScanner {
    config: ImageScanConfig,
}

impl ImageScanner {
    pub fn new(config: ImageScanConfig) -> Self {
        Self { config }
    }

    /// Collect images from `inputs`, in order.
    ///
    /// A missing path is an error. Files that fail the extension or size
    /// rules are skipped with a warning.
    pub fn collect<P: AsRef<Path>>(&self, inputs: &[P]) -> Result<Vec<ImageRef>> {
        let mut images = Vec::new();

        for input in inputs {
            let path = input.as_ref();
            let metadata = fs::metadata(path)
                .with_context(|| format!("Image path not found: {}", path.display()))?;

            if metadata.is_dir() {
                self.walk_dir(path, &mut images)?;
            } else if self.matches(path) {
                images.push(ImageRef::new(path.display().to_string()));
            } else {
                warn!("Skipping {}: not an accepted image", path.display());
            }
        }

        if images.len() > self.config.max_images {
            warn!(
                "Collected {} images, keeping the first {}",
                images.len(),
                self.config.max_images
            );
            images.truncate(self.config.max_images);
        }

        debug!("Ingested {} image(s)", images.len());
        Ok(images)
    }

    /// Check if a file passes the extension and size rules.
    pub fn matches(&self, path: &Path) -> bool {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase)
            .unwrap_or_default();
        if !self.config.extensions.contains(&ext) {
            return false;
        }

        match fs::metadata(path) {
            Ok(metadata) => metadata.is_file() && metadata.len() <= self.config.max_file_size,
            Err(_) => false,
        }
    }

    fn walk_dir(&self, dir: &Path, images: &mut Vec<ImageRef>) -> Result<()> {
        let walker = WalkDir::new(dir)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !is_hidden(e));

        for entry in walker {
            let entry =
                entry.with_context(|| format!("Failed to read directory {}", dir.display()))?;
            if !entry.file_type().is_file() {
                continue;
            }

            if self.matches(entry.path()) {
                images.push(ImageRef::new(entry.path().display().to_string()));
            } else {
                debug!("Ignoring {}", entry.path().display());
            }
        }

        Ok(())
    }
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .is_some_and(|name| name.starts_with('.'))
}
