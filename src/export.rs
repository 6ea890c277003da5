//! Batch export: crop, downscale, and write JPEGs.
//!
//! ## Ordering and naming
//!
//! Items are exported in chronological order (source modification time, then
//! name), not load order, so `card1.jpg`, `card2.jpg`, ... follow the order
//! the scans were made. Names are assigned up front from the start index; the
//! encodes themselves run in parallel on rayon and may finish in any order.
//!
//! ## Sizing
//!
//! The crop rectangle comes from each item's current offsets. When its longer
//! side exceeds the configured maximum, both sides are scaled down to fit;
//! smaller crops are written at their native size.
//!
//! ## Failure
//!
//! Export is fail-fast: the first encode error aborts the run and is
//! returned with the item and file it was working on. Files already written
//! stay on disk.

use crate::batch::{BatchState, ImageItem};
use crate::config::ExportSettings;
use crate::imaging::{
    BackendError, EncodeParams, ImageBackend, Quality, RustBackend, crop_rect, export_dimensions,
    preview_dimensions,
};
use crate::naming::{output_file_name, preview_file_name};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to write {output} from {name}: {source}")]
    Encode {
        name: String,
        output: String,
        #[source]
        source: BackendError,
    },
}

/// Progress reported while exporting or writing previews.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportEvent {
    Started {
        total: usize,
    },
    ItemWritten {
        /// Export index, or `None` for previews.
        index: Option<i64>,
        /// Relative source path.
        name: String,
        /// Output file name.
        output: String,
        width: u32,
        height: u32,
    },
}

/// One planned encode.
#[derive(Debug, Clone)]
pub struct ExportJob<'a> {
    pub item: &'a ImageItem,
    pub index: Option<i64>,
    pub params: EncodeParams,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportedFile {
    pub index: Option<i64>,
    pub name: String,
    pub output: PathBuf,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug)]
pub struct ExportReport {
    /// Written files in export order.
    pub exported: Vec<ExportedFile>,
    /// First unused index after this run.
    pub next_index: i64,
}

/// Plan the batch export: order items and assign names and output sizes.
pub fn plan_export<'a>(
    batch: &'a BatchState,
    settings: &ExportSettings,
    output_dir: &Path,
) -> Vec<ExportJob<'a>> {
    batch
        .export_order()
        .into_iter()
        .zip(settings.start_index..)
        .map(|(item, index)| {
            let crop = crop_rect(item.dimensions(), item.current_offsets);
            let (width, height) = export_dimensions(crop, settings.max_dimension);
            ExportJob {
                item,
                index: Some(index),
                params: EncodeParams {
                    crop,
                    width,
                    height,
                    quality: settings.quality,
                    output: output_dir.join(output_file_name(&settings.base_name, index)),
                },
            }
        })
        .collect()
}

/// Plan previews for every item in load order.
pub fn plan_previews<'a>(
    batch: &'a BatchState,
    quality: Quality,
    preview_dir: &Path,
) -> Vec<ExportJob<'a>> {
    batch
        .items()
        .iter()
        .map(|item| {
            let crop = crop_rect(item.dimensions(), item.current_offsets);
            let (width, height) = preview_dimensions(crop);
            ExportJob {
                item,
                index: None,
                params: EncodeParams {
                    crop,
                    width,
                    height,
                    quality,
                    output: preview_dir.join(preview_file_name(&item.name)),
                },
            }
        })
        .collect()
}

fn output_name(path: &Path) -> String {
    path.file_name()
        .map(|f| f.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Encode planned jobs in parallel, stopping at the first failure.
pub fn run_jobs(
    backend: &impl ImageBackend,
    jobs: &[ExportJob<'_>],
    progress: Option<Sender<ExportEvent>>,
) -> Result<Vec<ExportedFile>, ExportError> {
    if let Some(tx) = &progress {
        tx.send(ExportEvent::Started { total: jobs.len() }).ok();
    }

    jobs.par_iter()
        .map_with(progress, |progress, job| -> Result<ExportedFile, ExportError> {
            let output = output_name(&job.params.output);
            backend
                .encode(&job.item.image, &job.params)
                .map_err(|source| ExportError::Encode {
                    name: job.item.name.clone(),
                    output: output.clone(),
                    source,
                })?;

            if let Some(tx) = progress {
                tx.send(ExportEvent::ItemWritten {
                    index: job.index,
                    name: job.item.name.clone(),
                    output,
                    width: job.params.width,
                    height: job.params.height,
                })
                .ok();
            }

            Ok(ExportedFile {
                index: job.index,
                name: job.item.name.clone(),
                output: job.params.output.clone(),
                width: job.params.width,
                height: job.params.height,
            })
        })
        .collect()
}

/// Export the whole batch with the pure-Rust backend.
pub fn export(
    batch: &BatchState,
    settings: &ExportSettings,
    output_dir: &Path,
    progress: Option<Sender<ExportEvent>>,
) -> Result<ExportReport, ExportError> {
    export_with_backend(&RustBackend::new(), batch, settings, output_dir, progress)
}

/// Export using a specific backend (allows testing with mock).
pub fn export_with_backend(
    backend: &impl ImageBackend,
    batch: &BatchState,
    settings: &ExportSettings,
    output_dir: &Path,
    progress: Option<Sender<ExportEvent>>,
) -> Result<ExportReport, ExportError> {
    std::fs::create_dir_all(output_dir)?;

    let jobs = plan_export(batch, settings, output_dir);
    let exported = run_jobs(backend, &jobs, progress)?;
    let next_index = settings.start_index + exported.len() as i64;

    info!(
        count = exported.len(),
        next_index,
        output = %output_dir.display(),
        "export complete"
    );
    Ok(ExportReport {
        exported,
        next_index,
    })
}

/// Write small crop previews for every item.
pub fn write_previews(
    backend: &impl ImageBackend,
    batch: &BatchState,
    quality: Quality,
    preview_dir: &Path,
    progress: Option<Sender<ExportEvent>>,
) -> Result<Vec<ExportedFile>, ExportError> {
    std::fs::create_dir_all(preview_dir)?;
    let jobs = plan_previews(batch, quality, preview_dir);
    let written = run_jobs(backend, &jobs, progress)?;
    info!(count = written.len(), dir = %preview_dir.display(), "previews written");
    Ok(written)
}
