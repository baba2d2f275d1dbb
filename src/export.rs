//! Export stage: batch matched images and copy them under their new names.
//!
//! Matched images are split into consecutive batches of `batch_size` files in
//! collection order. Name collisions are resolved per batch with
//! [`naming::resolve_collisions`], so the same name may appear once in every
//! batch:
//!
//! ```text
//! batch-001/                 batch-002/
//! ├── cat.jpg                ├── cat.jpg
//! ├── cat_1.jpg              └── dog.png
//! └── portrait.png
//! ```
//!
//! A single batch is written straight into the output directory; more than one
//! gets a `batch-NNN/` subdirectory each. Unmatched images are not exported.
//!
//! Writing is all-or-nothing: an existing destination file or a failed copy
//! aborts the export and removes every file written so far.

use crate::naming;
use crate::types::{ImageId, ImageRecord};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Destination already exists: {0}")]
    DestinationExists(PathBuf),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportEntry {
    pub image: ImageId,
    pub source_path: String,
    /// Final name inside the batch, collisions resolved.
    pub file_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportBatch {
    /// 1-based.
    pub index: usize,
    pub entries: Vec<ExportEntry>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExportPlan {
    pub batches: Vec<ExportBatch>,
    /// Source paths of images with no match.
    pub unmatched: Vec<String>,
}

impl ExportPlan {
    pub fn file_count(&self) -> usize {
        self.batches.iter().map(|b| b.entries.len()).sum()
    }

    /// Directory a batch is written to, relative to the output root.
    pub fn batch_dir(&self, batch: &ExportBatch) -> Option<String> {
        (self.batches.len() > 1).then(|| format!("batch-{:03}", batch.index))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportSummary {
    pub output_dir: PathBuf,
    pub batches: usize,
    pub files_written: usize,
    pub skipped_unmatched: usize,
}

/// Group matched images into batches and resolve names within each batch.
pub fn plan_export(images: &[ImageRecord], batch_size: usize) -> ExportPlan {
    let batch_size = batch_size.max(1);
    let mut unmatched = Vec::new();
    let mut matched = Vec::new();
    for image in images {
        match image.new_file_name() {
            Some(name) => matched.push((image, name)),
            None => unmatched.push(image.source_path.clone()),
        }
    }

    let batches = matched
        .chunks(batch_size)
        .enumerate()
        .map(|(i, chunk)| {
            let names: Vec<&str> = chunk.iter().map(|(_, name)| *name).collect();
            let resolved = naming::resolve_collisions(&names);
            let entries = chunk
                .iter()
                .zip(resolved)
                .map(|((image, _), file_name)| ExportEntry {
                    image: image.id,
                    source_path: image.source_path.clone(),
                    file_name,
                })
                .collect();
            ExportBatch {
                index: i + 1,
                entries,
            }
        })
        .collect();

    ExportPlan { batches, unmatched }
}

/// Copy every planned file from `source_root` into `output_dir`.
pub fn write_export(
    plan: &ExportPlan,
    source_root: &Path,
    output_dir: &Path,
) -> Result<ExportSummary, ExportError> {
    let mut written: Vec<PathBuf> = Vec::new();
    match copy_batches(plan, source_root, output_dir, &mut written) {
        Ok(()) => {
            log::info!(
                "exported {} files in {} batches to {}",
                written.len(),
                plan.batches.len(),
                output_dir.display()
            );
            Ok(ExportSummary {
                output_dir: output_dir.to_path_buf(),
                batches: plan.batches.len(),
                files_written: written.len(),
                skipped_unmatched: plan.unmatched.len(),
            })
        }
        Err(e) => {
            for path in written.iter().rev() {
                if let Err(cleanup) = fs::remove_file(path) {
                    log::warn!("could not remove {}: {cleanup}", path.display());
                }
            }
            Err(e)
        }
    }
}

fn copy_batches(
    plan: &ExportPlan,
    source_root: &Path,
    output_dir: &Path,
    written: &mut Vec<PathBuf>,
) -> Result<(), ExportError> {
    for batch in &plan.batches {
        let dir = match plan.batch_dir(batch) {
            Some(sub) => output_dir.join(sub),
            None => output_dir.to_path_buf(),
        };
        fs::create_dir_all(&dir)?;
        for entry in &batch.entries {
            let dest = dir.join(&entry.file_name);
            if dest.exists() {
                return Err(ExportError::DestinationExists(dest));
            }
            fs::copy(source_root.join(&entry.source_path), &dest)?;
            log::debug!("{} -> {}", entry.source_path, dest.display());
            written.push(dest);
        }
    }
    Ok(())
}
