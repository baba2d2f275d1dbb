//! Filesystem scanning and manifest generation.
//!
//! Stage 1 of the rename pipeline. Walks a source directory, admits image files
//! against the ingestion limits, and extracts metadata from each admitted file,
//! producing a [`Manifest`] the matching stage consumes.
//!
//! ## Stages
//!
//! ```text
//! discover ──► admit ──► extract (parallel) ──► Manifest
//!    │           │             │
//!    │           │             └─ per-image failures logged, image kept
//!    │           └─ Rejection { FileTooLarge | ImageLimit | TotalSizeLimit }
//!    └─ hidden entries skipped, sorted by path
//! ```
//!
//! ## Limits
//!
//! Files are admitted in discovery order. A file larger than `max_file_bytes`
//! is rejected on its own. Once `max_images` files have been admitted, or the
//! next file would push the total past `max_total_bytes`, the remainder is
//! rejected and the manifest is marked `truncated`, so a partial batch is
//! always explicit.
//!
//! ## Cancellation
//!
//! Extraction checks an optional [`AtomicBool`] before each image. Setting it
//! stops the scan before the next image starts; an image already being read
//! is finished. The manifest then carries `cancelled: true` and only the images
//! that completed.

use crate::config::LimitsConfig;
use crate::extract;
use crate::metadata::FieldMap;
use crate::types::{ImageId, ImageRecord};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;
use walkdir::WalkDir;

/// Extensions (lowercase) considered images.
pub const IMAGE_EXTENSIONS: &[&str] = &[
    "png", "jpg", "jpeg", "webp", "tif", "tiff", "heic", "heif", "avif",
];

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Walk error: {0}")]
    Walk(#[from] walkdir::Error),
    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),
}

/// An image file found on disk, before admission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredFile {
    pub path: PathBuf,
    /// Path relative to the scan root, `/`-separated.
    pub relative: String,
    pub size: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RejectReason {
    FileTooLarge { limit: u64 },
    ImageLimit { limit: usize },
    TotalSizeLimit { limit: u64 },
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RejectReason::FileTooLarge { limit } => write!(f, "file exceeds {limit} bytes"),
            RejectReason::ImageLimit { limit } => write!(f, "more than {limit} images"),
            RejectReason::TotalSizeLimit { limit } => {
                write!(f, "batch exceeds {limit} bytes in total")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rejection {
    pub path: String,
    pub size: u64,
    pub reason: RejectReason,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Admission {
    pub accepted: Vec<DiscoveredFile>,
    pub rejected: Vec<Rejection>,
    /// A count or total-size limit cut the batch short.
    pub truncated: bool,
}

/// Output of a scan, serialized as `manifest.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub images: Vec<ImageRecord>,
    pub rejected: Vec<Rejection>,
    pub truncated: bool,
    pub cancelled: bool,
}

/// Discover, admit, and extract every image under `root`.
pub fn scan(
    root: &Path,
    limits: &LimitsConfig,
    cancel: Option<&AtomicBool>,
) -> Result<Manifest, ScanError> {
    let discovered = discover(root)?;
    log::info!("found {} image files under {}", discovered.len(), root.display());

    let admission = admit(discovered, limits);
    if !admission.rejected.is_empty() {
        log::warn!(
            "{} files rejected by ingestion limits",
            admission.rejected.len()
        );
    }

    let extracted: Vec<Option<ImageRecord>> = admission
        .accepted
        .par_iter()
        .enumerate()
        .map(|(index, file)| {
            if is_cancelled(cancel) {
                return None;
            }
            Some(extract_image(ImageId(index), file))
        })
        .collect();

    let cancelled = extracted.iter().any(Option::is_none);
    let images: Vec<ImageRecord> = extracted.into_iter().flatten().collect();
    if cancelled {
        log::warn!("scan cancelled after {} images", images.len());
    }

    Ok(Manifest {
        images,
        rejected: admission.rejected,
        truncated: admission.truncated,
        cancelled,
    })
}

/// Find image files under `root`, sorted by path. Hidden entries are skipped.
pub fn discover(root: &Path) -> Result<Vec<DiscoveredFile>, ScanError> {
    if !root.is_dir() {
        return Err(ScanError::NotADirectory(root.to_path_buf()));
    }

    let mut files = Vec::new();
    let walker = WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !is_hidden(e.file_name()));

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) if e.depth() == 0 => return Err(e.into()),
            Err(e) => {
                log::warn!("skipping unreadable entry: {e}");
                continue;
            }
        };
        if !entry.file_type().is_file() || !is_image(entry.path()) {
            continue;
        }
        let size = match entry.metadata() {
            Ok(meta) => meta.len(),
            Err(e) => {
                log::warn!("skipping {}: {e}", entry.path().display());
                continue;
            }
        };
        let relative = entry
            .path()
            .strip_prefix(root)
            .unwrap_or(entry.path())
            .to_string_lossy()
            .replace('\\', "/");
        files.push(DiscoveredFile {
            path: entry.path().to_path_buf(),
            relative,
            size,
        });
    }
    Ok(files)
}

/// Apply ingestion limits in order.
pub fn admit(files: Vec<DiscoveredFile>, limits: &LimitsConfig) -> Admission {
    let mut admission = Admission::default();
    let mut total: u64 = 0;

    for file in files {
        let reason = if file.size > limits.max_file_bytes {
            Some(RejectReason::FileTooLarge {
                limit: limits.max_file_bytes,
            })
        } else if admission.accepted.len() >= limits.max_images {
            admission.truncated = true;
            Some(RejectReason::ImageLimit {
                limit: limits.max_images,
            })
        } else if total.saturating_add(file.size) > limits.max_total_bytes {
            admission.truncated = true;
            Some(RejectReason::TotalSizeLimit {
                limit: limits.max_total_bytes,
            })
        } else {
            None
        };

        match reason {
            Some(reason) => {
                log::debug!("rejected {}: {reason}", file.relative);
                admission.rejected.push(Rejection {
                    path: file.relative,
                    size: file.size,
                    reason,
                });
            }
            None => {
                total += file.size;
                admission.accepted.push(file);
            }
        }
    }
    admission
}

/// Read one file and build its record. Failures leave the metadata empty.
fn extract_image(id: ImageId, file: &DiscoveredFile) -> ImageRecord {
    let metadata = match extract::extract_file(&file.path) {
        Ok(extraction) => {
            for warning in &extraction.warnings {
                log::debug!("{}: {warning}", file.relative);
            }
            extraction.fields
        }
        Err(e) => {
            log::warn!("could not read {}: {e}", file.relative);
            FieldMap::new()
        }
    };
    log::trace!("{}: {} metadata fields", file.relative, metadata.len());
    ImageRecord::new(id, file.relative.clone(), metadata).with_size(file.size)
}

fn is_cancelled(cancel: Option<&AtomicBool>) -> bool {
    cancel.is_some_and(|flag| flag.load(Ordering::Relaxed))
}

fn is_hidden(name: &std::ffi::OsStr) -> bool {
    name.to_string_lossy().starts_with('.')
}

fn is_image(path: &Path) -> bool {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    IMAGE_EXTENSIONS.contains(&ext.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{build_png, png_chunk};
    use std::fs;
    use tempfile::TempDir;

    fn write_png(dir: &Path, name: &str, text: &str) {
        let mut payload = b"parameters\x00".to_vec();
        payload.extend_from_slice(text.as_bytes());
        let png = build_png(&[png_chunk(b"tEXt", &payload)]);
        fs::write(dir.join(name), png).unwrap();
    }

    fn file(relative: &str, size: u64) -> DiscoveredFile {
        DiscoveredFile {
            path: PathBuf::from(relative),
            relative: relative.to_string(),
            size,
        }
    }

    // =========================================================================
    // discover()
    // =========================================================================

    #[test]
    fn discover_finds_images_sorted_and_skips_hidden() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("sub")).unwrap();
        fs::create_dir_all(tmp.path().join(".metaname")).unwrap();
        fs::write(tmp.path().join("b.png"), b"x").unwrap();
        fs::write(tmp.path().join("a.JPG"), b"x").unwrap();
        fs::write(tmp.path().join("notes.txt"), b"x").unwrap();
        fs::write(tmp.path().join(".hidden.png"), b"x").unwrap();
        fs::write(tmp.path().join("sub/c.webp"), b"xyz").unwrap();
        fs::write(tmp.path().join(".metaname/d.png"), b"x").unwrap();

        let files = discover(tmp.path()).unwrap();
        let names: Vec<&str> = files.iter().map(|f| f.relative.as_str()).collect();
        assert_eq!(names, vec!["a.JPG", "b.png", "sub/c.webp"]);
        assert_eq!(files[2].size, 3);
    }

    #[test]
    fn discover_requires_directory() {
        let tmp = TempDir::new().unwrap();
        let missing = tmp.path().join("nope");
        assert!(matches!(
            discover(&missing),
            Err(ScanError::NotADirectory(_))
        ));
    }

    // =========================================================================
    // admit()
    // =========================================================================

    #[test]
    fn admit_rejects_oversized_file_without_truncating() {
        let limits = LimitsConfig {
            max_images: 10,
            max_file_bytes: 100,
            max_total_bytes: 1000,
        };
        let admission = admit(vec![file("a", 50), file("big", 101), file("c", 50)], &limits);
        assert_eq!(admission.accepted.len(), 2);
        assert_eq!(
            admission.rejected,
            vec![Rejection {
                path: "big".into(),
                size: 101,
                reason: RejectReason::FileTooLarge { limit: 100 },
            }]
        );
        assert!(!admission.truncated);
    }

    #[test]
    fn admit_truncates_at_image_limit() {
        let limits = LimitsConfig {
            max_images: 2,
            ..Default::default()
        };
        let admission = admit(vec![file("a", 1), file("b", 1), file("c", 1)], &limits);
        let accepted: Vec<&str> = admission.accepted.iter().map(|f| f.relative.as_str()).collect();
        assert_eq!(accepted, vec!["a", "b"]);
        assert_eq!(admission.rejected[0].reason, RejectReason::ImageLimit { limit: 2 });
        assert!(admission.truncated);
    }

    #[test]
    fn admit_truncates_at_total_size() {
        let limits = LimitsConfig {
            max_images: 10,
            max_file_bytes: 100,
            max_total_bytes: 150,
        };
        let admission = admit(vec![file("a", 100), file("b", 60), file("c", 50)], &limits);
        let accepted: Vec<&str> = admission.accepted.iter().map(|f| f.relative.as_str()).collect();
        // c still fits after b is rejected
        assert_eq!(accepted, vec!["a", "c"]);
        assert_eq!(
            admission.rejected[0].reason,
            RejectReason::TotalSizeLimit { limit: 150 }
        );
        assert!(admission.truncated);
    }

    // =========================================================================
    // scan()
    // =========================================================================

    #[test]
    fn scan_extracts_metadata() {
        let tmp = TempDir::new().unwrap();
        write_png(tmp.path(), "00001.png", "1girl, standing");
        write_png(tmp.path(), "00002.png", "scenery");
        fs::write(tmp.path().join("broken.jpg"), b"not a jpeg").unwrap();

        let manifest = scan(tmp.path(), &LimitsConfig::default(), None).unwrap();
        assert_eq!(manifest.images.len(), 3);
        assert!(!manifest.cancelled);
        assert!(!manifest.truncated);

        let first = &manifest.images[0];
        assert_eq!(first.id, ImageId(0));
        assert_eq!(first.file_name, "00001.png");
        assert_eq!(first.metadata.get("PNG:parameters"), Some("1girl, standing"));

        // unreadable metadata is contained, the image is kept
        let broken = manifest.images.iter().find(|i| i.file_name == "broken.jpg").unwrap();
        assert!(broken.metadata.is_empty());
        assert!(broken.matched.is_none());
    }

    #[test]
    fn cancelled_scan_stops_before_extraction() {
        let tmp = TempDir::new().unwrap();
        write_png(tmp.path(), "00001.png", "a");
        write_png(tmp.path(), "00002.png", "b");

        let cancel = AtomicBool::new(true);
        let manifest = scan(tmp.path(), &LimitsConfig::default(), Some(&cancel)).unwrap();
        assert!(manifest.cancelled);
        assert!(manifest.images.is_empty());
    }

    #[test]
    fn manifest_serializes_rejections() {
        let manifest = Manifest {
            images: Vec::new(),
            rejected: vec![Rejection {
                path: "big.png".into(),
                size: 11,
                reason: RejectReason::FileTooLarge { limit: 10 },
            }],
            truncated: false,
            cancelled: false,
        };
        let json = serde_json::to_value(&manifest).unwrap();
        assert_eq!(json["rejected"][0]["reason"]["kind"], "file_too_large");
        assert_eq!(json["rejected"][0]["reason"]["limit"], 10);
    }
}
