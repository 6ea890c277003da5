//! Batch state: loaded images, their offsets, and batch-wide settings.
//!
//! A [`BatchState`] owns every [`ImageItem`] in load order and changes only
//! through [`BatchState::apply`] with a [`BatchEvent`] (plus the bulk loader
//! [`BatchState::load_all`]). Each event leaves the batch consistent:
//!
//! - Non-manual items always show their auto-detected offsets, unless
//!   "match first crop" is on, in which case they show the reference crop
//!   adapted to their own size.
//! - Manual items are never overwritten by detection or propagation.
//!
//! ## Reference Item
//!
//! The reference is the first item in load order, exposed as
//! [`BatchState::reference_id`]. Removing it promotes the next item, which
//! immediately reverts to its own auto offsets (unless manual) and becomes
//! the template for the rest.

use crate::crop::{self, Dimensions, Edge, Offsets};
use crate::detection::{self, WhiteThreshold};
use image::RgbaImage;
use rayon::prelude::*;
use std::fmt;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum BatchError {
    #[error("No image with id {0} in the batch")]
    UnknownItem(ItemId),
}

/// Stable identity of a batch item. Never reused within a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemId(pub u64);

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A decoded source image ready to join the batch.
#[derive(Debug, Clone)]
pub struct LoadedImage {
    /// Path relative to the source directory, `/`-separated.
    pub name: String,
    /// Modification time in milliseconds since the Unix epoch.
    pub modified: u64,
    /// SHA-256 of the source file bytes, hex.
    pub source_hash: String,
    pub image: RgbaImage,
}

/// One image in the batch with its crop state.
#[derive(Debug, Clone)]
pub struct ImageItem {
    pub id: ItemId,
    pub name: String,
    pub modified: u64,
    pub source_hash: String,
    pub image: RgbaImage,
    /// Last result of border detection.
    pub auto_offsets: Offsets,
    /// Effective crop used for preview and export.
    pub current_offsets: Offsets,
    /// The user has taken control; detection and propagation leave it alone.
    pub is_manual: bool,
}

impl ImageItem {
    pub fn dimensions(&self) -> Dimensions {
        Dimensions::new(self.image.width(), self.image.height())
    }
}

/// Where an item's current offsets come from, for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CropSource {
    Auto,
    Manual,
    /// Adapted from the reference item's crop.
    Matched,
}

/// Batch-wide settings that trigger recomputation when changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSettings {
    pub threshold: WhiteThreshold,
    pub match_first_crop: bool,
}

/// Something that happened to the batch.
#[derive(Debug, Clone)]
pub enum BatchEvent {
    Load(LoadedImage),
    Remove(ItemId),
    /// Raw threshold value; clamped to the valid range.
    SetThreshold(i64),
    SetMatchFirst(bool),
    /// Set one edge by hand. Marks the item manual.
    Edit {
        id: ItemId,
        edge: Edge,
        value: i64,
    },
    /// Take (`true`) or release (`false`) manual control. Releasing restores
    /// the auto offsets.
    SetManual { id: ItemId, manual: bool },
    /// Re-run detection for one item and return it to automatic control.
    ResetToAuto(ItemId),
}

#[derive(Debug, Default)]
pub struct BatchState {
    items: Vec<ImageItem>,
    settings: BatchSettings,
    next_id: u64,
}

impl BatchState {
    pub fn new(settings: BatchSettings) -> Self {
        Self {
            items: Vec::new(),
            settings,
            next_id: 0,
        }
    }

    pub fn settings(&self) -> BatchSettings {
        self.settings
    }

    /// Items in load order.
    pub fn items(&self) -> &[ImageItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, id: ItemId) -> Option<&ImageItem> {
        self.items.iter().find(|item| item.id == id)
    }

    pub fn find_by_name(&self, name: &str) -> Option<&ImageItem> {
        self.items.iter().find(|item| item.name == name)
    }

    /// The item whose crop is propagated in match mode: the first loaded.
    pub fn reference_id(&self) -> Option<ItemId> {
        self.items.first().map(|item| item.id)
    }

    pub fn crop_source(&self, item: &ImageItem) -> CropSource {
        if item.is_manual {
            CropSource::Manual
        } else if self.settings.match_first_crop && Some(item.id) != self.reference_id() {
            CropSource::Matched
        } else {
            CropSource::Auto
        }
    }

    /// Items in export order: modification time, then name.
    pub fn export_order(&self) -> Vec<&ImageItem> {
        let mut ordered: Vec<&ImageItem> = self.items.iter().collect();
        ordered.sort_by(|a, b| (a.modified, &a.name).cmp(&(b.modified, &b.name)));
        ordered
    }

    fn index_of(&self, id: ItemId) -> Result<usize, BatchError> {
        self.items
            .iter()
            .position(|item| item.id == id)
            .ok_or(BatchError::UnknownItem(id))
    }

    fn make_item(&mut self, loaded: LoadedImage, auto_offsets: Offsets) -> ImageItem {
        let id = ItemId(self.next_id);
        self.next_id += 1;
        ImageItem {
            id,
            name: loaded.name,
            modified: loaded.modified,
            source_hash: loaded.source_hash,
            image: loaded.image,
            auto_offsets,
            current_offsets: auto_offsets,
            is_manual: false,
        }
    }

    /// Add one image, detecting its border with the current threshold.
    pub fn load(&mut self, loaded: LoadedImage) -> ItemId {
        let auto = detection::detect(&loaded.image, self.settings.threshold);
        let item = self.make_item(loaded, auto);
        let id = item.id;
        self.items.push(item);
        self.propagate();
        id
    }

    /// Add many images, detecting borders in parallel. Load order is kept.
    pub fn load_all(&mut self, images: Vec<LoadedImage>) -> Vec<ItemId> {
        let threshold = self.settings.threshold;
        let detected: Vec<(LoadedImage, Offsets)> = images
            .into_par_iter()
            .map(|loaded| {
                let auto = detection::detect(&loaded.image, threshold);
                (loaded, auto)
            })
            .collect();

        let mut ids = Vec::with_capacity(detected.len());
        for (loaded, auto) in detected {
            let item = self.make_item(loaded, auto);
            ids.push(item.id);
            self.items.push(item);
        }
        self.propagate();
        ids
    }

    /// Apply one event.
    pub fn apply(&mut self, event: BatchEvent) -> Result<(), BatchError> {
        match event {
            BatchEvent::Load(loaded) => {
                self.load(loaded);
            }
            BatchEvent::Remove(id) => {
                let index = self.index_of(id)?;
                self.items.remove(index);
                if index == 0 {
                    self.propagate();
                }
            }
            BatchEvent::SetThreshold(raw) => {
                let threshold = WhiteThreshold::new(raw);
                if threshold != self.settings.threshold {
                    self.settings.threshold = threshold;
                    self.redetect_all();
                }
            }
            BatchEvent::SetMatchFirst(enabled) => {
                if enabled != self.settings.match_first_crop {
                    self.settings.match_first_crop = enabled;
                    if enabled {
                        self.propagate();
                    } else {
                        for item in self.items.iter_mut().filter(|i| !i.is_manual) {
                            item.current_offsets = item.auto_offsets;
                        }
                    }
                }
            }
            BatchEvent::Edit { id, edge, value } => {
                let index = self.index_of(id)?;
                let item = &mut self.items[index];
                item.current_offsets =
                    crop::apply_edit(item.current_offsets, edge, value, item.dimensions());
                item.is_manual = true;
                if index == 0 {
                    self.propagate();
                }
            }
            BatchEvent::SetManual { id, manual } => {
                let index = self.index_of(id)?;
                let item = &mut self.items[index];
                item.is_manual = manual;
                if !manual {
                    item.current_offsets = item.auto_offsets;
                    self.propagate();
                }
            }
            BatchEvent::ResetToAuto(id) => {
                let index = self.index_of(id)?;
                let threshold = self.settings.threshold;
                let item = &mut self.items[index];
                item.auto_offsets = detection::detect(&item.image, threshold);
                item.current_offsets = item.auto_offsets;
                item.is_manual = false;
                self.propagate();
            }
        }
        Ok(())
    }

    /// Re-run detection on every item with the current threshold.
    fn redetect_all(&mut self) {
        let threshold = self.settings.threshold;
        self.items.par_iter_mut().for_each(|item| {
            item.auto_offsets = detection::detect(&item.image, threshold);
            if !item.is_manual {
                item.current_offsets = item.auto_offsets;
            }
        });
        self.propagate();
    }

    /// Push the reference crop onto every other non-manual item.
    fn propagate(&mut self) {
        if !self.settings.match_first_crop {
            return;
        }
        let Some((reference, rest)) = self.items.split_first_mut() else {
            return;
        };
        if !reference.is_manual {
            reference.current_offsets = reference.auto_offsets;
        }
        let template = reference.current_offsets;

        for item in rest.iter_mut().filter(|i| !i.is_manual) {
            item.current_offsets = crop::adapt(template, item.dimensions());
        }
        debug!(
            reference = %reference.name,
            %template,
            targets = rest.iter().filter(|i| !i.is_manual).count(),
            "propagated reference crop"
        );
    }
}
