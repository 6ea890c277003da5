//! CLI output formatting.
//!
//! Each command has a `format_*` function returning `Vec<String>` so output
//! can be tested without capturing stdout, and a `print_*` wrapper. Format
//! functions are pure: no I/O, no side effects.
//!
//! # Output Format
//!
//! ## Batch listing
//!
//! ```text
//! Batch: 2 images, threshold 245, match first crop off
//! 001 scan-a.png (reference)
//!     1200x900 → 1100x800 auto
//!     Offsets: top 50, bottom 50, left 50, right 50
//! 002 scan-b.png
//!     1180x910 → 1000x700 manual
//!     Offsets: top 100, bottom 110, left 80, right 100
//!
//! Skipped
//!     broken.png: Decode failed: ...
//! ```
//!
//! ## Export
//!
//! ```text
//! Writing 2 images
//! 1 card1.jpg ← scan-a.png (500x364)
//! 2 card2.jpg ← scan-b.png (500x350)
//! Exported 2 images to cropped
//!     Next export starts at 3
//! ```

use crate::batch::{BatchState, CropSource, ImageItem};
use crate::export::{ExportEvent, ExportReport};
use crate::imaging::crop_rect;
use crate::scan::LoadFailure;
use crate::session::RestoreStats;
use std::path::Path;

// ============================================================================
// Shared helpers
// ============================================================================

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

fn on_off(flag: bool) -> &'static str {
    if flag { "on" } else { "off" }
}

fn source_label(source: CropSource) -> &'static str {
    match source {
        CropSource::Auto => "auto",
        CropSource::Manual => "manual",
        CropSource::Matched => "matched",
    }
}

fn plural(count: usize, word: &str) -> String {
    if count == 1 {
        format!("{count} {word}")
    } else {
        format!("{count} {word}s")
    }
}

// ============================================================================
// Batch listing
// ============================================================================

fn item_lines(batch: &BatchState, position: usize, item: &ImageItem) -> Vec<String> {
    let header = if Some(item.id) == batch.reference_id() {
        format!("{} {} (reference)", format_index(position), item.name)
    } else {
        format!("{} {}", format_index(position), item.name)
    };
    let crop = crop_rect(item.dimensions(), item.current_offsets);
    vec![
        header,
        format!(
            "{}{}x{} → {}x{} {}",
            indent(1),
            item.image.width(),
            item.image.height(),
            crop.width,
            crop.height,
            source_label(batch.crop_source(item))
        ),
        format!("{}Offsets: {}", indent(1), item.current_offsets),
    ]
}

/// Format the batch: settings header, one entry per item in load order,
/// then any files that failed to load.
pub fn format_batch(batch: &BatchState, failures: &[LoadFailure]) -> Vec<String> {
    let settings = batch.settings();
    let mut lines = vec![format!(
        "Batch: {}, threshold {}, match first crop {}",
        plural(batch.len(), "image"),
        settings.threshold.value(),
        on_off(settings.match_first_crop)
    )];

    for (i, item) in batch.items().iter().enumerate() {
        lines.extend(item_lines(batch, i + 1, item));
    }

    if !failures.is_empty() {
        lines.push(String::new());
        lines.push("Skipped".to_string());
        for failure in failures {
            lines.push(format!("{}{}: {}", indent(1), failure.name, failure.error));
        }
    }
    lines
}

pub fn print_batch(batch: &BatchState, failures: &[LoadFailure]) {
    for line in format_batch(batch, failures) {
        println!("{}", line);
    }
}

/// One line noting what the session re-applied, if anything.
pub fn format_restore(stats: &RestoreStats) -> Option<String> {
    if stats.manual == 0 && stats.removed == 0 && stats.stale == 0 {
        return None;
    }
    let mut line = format!(
        "Session: {} restored, {} removed",
        plural(stats.manual, "manual crop"),
        stats.removed
    );
    if stats.stale > 0 {
        line.push_str(&format!(", {} dropped (source changed)", stats.stale));
    }
    Some(line)
}

// ============================================================================
// Export
// ============================================================================

/// Format a single export or preview progress event.
pub fn format_export_event(event: &ExportEvent) -> Vec<String> {
    match event {
        ExportEvent::Started { total } => vec![format!("Writing {}", plural(*total, "image"))],
        ExportEvent::ItemWritten {
            index,
            name,
            output,
            width,
            height,
        } => {
            let line = match index {
                Some(index) => format!("{} {} ← {} ({}x{})", index, output, name, width, height),
                None => format!("{} ← {} ({}x{})", output, name, width, height),
            };
            vec![line]
        }
    }
}

/// Summary printed after a successful export.
pub fn format_export_summary(report: &ExportReport, output_dir: &Path) -> Vec<String> {
    vec![
        format!(
            "Exported {} to {}",
            plural(report.exported.len(), "image"),
            output_dir.display()
        ),
        format!("{}Next export starts at {}", indent(1), report.next_index),
    ]
}

pub fn print_export_summary(report: &ExportReport, output_dir: &Path) {
    for line in format_export_summary(report, output_dir) {
        println!("{}", line);
    }
}
