//! # cardcrop
//!
//! Batch border detection and cropping for flatbed scans of cards, photos
//! and other small flat objects lying on a white scanner lid.
//!
//! Point it at a directory of scans. Each image gets its uniform light margin
//! detected and trimmed, crops can be adjusted per image by hand, and the
//! batch is exported as numbered, downscaled JPEGs.
//!
//! # Pipeline
//!
//! ```text
//! 1. Scan     source/  →  decoded images        (walkdir + image, parallel)
//! 2. Detect   image    →  auto offsets          (row/column scan per image)
//! 3. Adjust   batch    →  current offsets       (manual edits, match-first-crop)
//! 4. Export   batch    →  output/card{N}.jpg    (crop + downscale + JPEG, parallel)
//! ```
//!
//! Detection is a pure function of pixels and threshold and is rerun on every
//! invocation. Only user decisions (manual crops, removals, setting flags,
//! next export index) persist, in a small JSON session file.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`detection`] | Background pixel classification and margin detection |
//! | [`crop`] | Offsets, the manual edit rule, adapting a crop to another image size |
//! | [`batch`] | Batch state and the events that change it; reference item and propagation |
//! | [`scan`] | Finds, fingerprints and decodes source images |
//! | [`export`] | Chronological naming and parallel JPEG export; previews |
//! | [`session`] | Persisted manual crops, removals and settings between runs |
//! | [`workspace`] | Ties config, scan, session and batch together for the CLI |
//! | [`config`] | `config.toml` loading over stock defaults, value sanitizing |
//! | [`naming`] | Output and preview file names |
//! | [`imaging`] | Crop math and the decode/encode backend |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Explicit Reference Item
//!
//! In match-first-crop mode the first loaded image supplies the crop for
//! every image that hasn't been adjusted by hand. The reference is exposed as
//! [`batch::BatchState::reference_id`] and recomputed on removal, so which
//! image drives the batch is always queryable.
//!
//! ## Graceful Settings
//!
//! Out-of-range numbers in config or on the command line (threshold, max
//! dimension, start index, quality) are clamped or replaced with defaults
//! instead of rejected. Malformed TOML and unknown keys are still errors.
//!
//! ## Pure-Rust Imaging
//!
//! Decoding and JPEG encoding use the `image` crate only. No system
//! libraries, so the binary runs anywhere it compiles.

pub mod batch;
pub mod config;
pub mod crop;
pub mod detection;
pub mod export;
pub mod imaging;
pub mod naming;
pub mod output;
pub mod scan;
pub mod session;
pub mod workspace;
