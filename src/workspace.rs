//! One CLI run's view of a source directory.
//!
//! Opening a workspace loads `config.toml`, the saved session, and every
//! decodable source image, then rebuilds the batch: detection runs fresh with
//! the effective threshold and the session's removals and manual crops are
//! replayed on top. Commands then act on items by relative source path and
//! finish with [`Workspace::save`].
//!
//! Setting precedence, highest first:
//!
//! 1. command-line flags
//! 2. the session (threshold, match mode, next export index)
//! 3. `config.toml`
//! 4. stock defaults

use crate::batch::{BatchError, BatchEvent, BatchSettings, BatchState, ItemId};
use crate::config::{self, ConfigError, CropConfig, ExportSettings};
use crate::crop::Edge;
use crate::detection::WhiteThreshold;
use crate::export::{self, ExportError, ExportEvent, ExportReport, ExportedFile};
use crate::imaging::{ImageBackend, RustBackend};
use crate::scan::{self, LoadFailure, ScanError};
use crate::session::{RestoreStats, Session, SessionError};
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use thiserror::Error;
use tracing::info;

/// Subdirectory of the temp dir that holds crop previews.
const PREVIEW_DIR: &str = "previews";

#[derive(Error, Debug)]
pub enum WorkspaceError {
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
    #[error("Scan error: {0}")]
    Scan(#[from] ScanError),
    #[error("Session error: {0}")]
    Session(#[from] SessionError),
    #[error("{0}")]
    Batch(#[from] BatchError),
    #[error("Export error: {0}")]
    Export(#[from] ExportError),
    #[error("No image named {0:?} in the batch")]
    UnknownName(String),
}

#[derive(Debug, Clone)]
pub struct WorkspacePaths {
    pub source: PathBuf,
    pub output: PathBuf,
    pub temp_dir: PathBuf,
}

/// Command-line overrides for config values.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub threshold: Option<i64>,
    pub match_first: Option<bool>,
    pub max_dimension: Option<f64>,
    pub base_name: Option<String>,
    pub start_index: Option<i64>,
}

pub struct Workspace<B: ImageBackend = RustBackend> {
    backend: B,
    paths: WorkspacePaths,
    config: CropConfig,
    session: Session,
    batch: BatchState,
    export_settings: ExportSettings,
    failures: Vec<LoadFailure>,
    restored: RestoreStats,
}

impl Workspace<RustBackend> {
    pub fn open(paths: WorkspacePaths, overrides: &Overrides) -> Result<Self, WorkspaceError> {
        Self::open_with_backend(RustBackend::new(), paths, overrides)
    }

    /// Open with a config the caller already loaded for `paths.source`.
    pub fn open_with_config(
        config: CropConfig,
        paths: WorkspacePaths,
        overrides: &Overrides,
    ) -> Result<Self, WorkspaceError> {
        Self::from_parts(RustBackend::new(), config, paths, overrides)
    }
}

impl<B: ImageBackend> Workspace<B> {
    /// Open with a specific backend (allows testing with mock).
    pub fn open_with_backend(
        backend: B,
        paths: WorkspacePaths,
        overrides: &Overrides,
    ) -> Result<Self, WorkspaceError> {
        let config = config::load_config(&paths.source)?;
        Self::from_parts(backend, config, paths, overrides)
    }

    /// Build the workspace from a backend and a resolved config. The source
    /// directory's `config.toml` is not read again.
    pub fn from_parts(
        backend: B,
        config: CropConfig,
        paths: WorkspacePaths,
        overrides: &Overrides,
    ) -> Result<Self, WorkspaceError> {
        let mut session = Session::load(&paths.temp_dir);

        // Flags for batch settings stick for later runs.
        if overrides.threshold.is_some() {
            session.threshold = overrides.threshold;
        }
        if overrides.match_first.is_some() {
            session.match_first = overrides.match_first;
        }

        let settings = BatchSettings {
            threshold: WhiteThreshold::new(
                session
                    .threshold
                    .unwrap_or(config.detection.white_threshold),
            ),
            match_first_crop: session
                .match_first
                .unwrap_or(config.batch.match_first_crop),
        };
        let export_settings = resolve_export_settings(&config, &session, overrides);

        let skip = [paths.output.clone(), paths.temp_dir.clone()];
        let report = scan::scan(&backend, &paths.source, &skip)?;

        let mut batch = BatchState::new(settings);
        batch.load_all(report.loaded);
        let restored = session.restore(&mut batch);

        info!(
            images = batch.len(),
            failed = report.failures.len(),
            threshold = settings.threshold.value(),
            match_first = settings.match_first_crop,
            "workspace opened"
        );

        Ok(Self {
            backend,
            paths,
            config,
            session,
            batch,
            export_settings,
            failures: report.failures,
            restored,
        })
    }

    pub fn batch(&self) -> &BatchState {
        &self.batch
    }

    pub fn config(&self) -> &CropConfig {
        &self.config
    }

    pub fn paths(&self) -> &WorkspacePaths {
        &self.paths
    }

    pub fn export_settings(&self) -> &ExportSettings {
        &self.export_settings
    }

    /// Source files that could not be loaded this run.
    pub fn failures(&self) -> &[LoadFailure] {
        &self.failures
    }

    pub fn restored(&self) -> &RestoreStats {
        &self.restored
    }

    pub fn preview_dir(&self) -> PathBuf {
        self.paths.temp_dir.join(PREVIEW_DIR)
    }

    /// Resolve a relative source path to its batch item.
    pub fn item_id(&self, name: &str) -> Result<ItemId, WorkspaceError> {
        let normalized = name.replace('\\', "/");
        let trimmed = normalized.trim_start_matches("./");
        self.batch
            .find_by_name(trimmed)
            .map(|item| item.id)
            .ok_or_else(|| WorkspaceError::UnknownName(name.to_string()))
    }

    pub fn apply(&mut self, event: BatchEvent) -> Result<(), WorkspaceError> {
        self.batch.apply(event)?;
        Ok(())
    }

    /// Apply edge edits in order. Each edit marks the item manual.
    pub fn edit(&mut self, name: &str, edits: &[(Edge, i64)]) -> Result<(), WorkspaceError> {
        let id = self.item_id(name)?;
        for &(edge, value) in edits {
            self.apply(BatchEvent::Edit { id, edge, value })?;
        }
        Ok(())
    }

    pub fn set_manual(&mut self, name: &str, manual: bool) -> Result<(), WorkspaceError> {
        let id = self.item_id(name)?;
        self.apply(BatchEvent::SetManual { id, manual })
    }

    pub fn reset(&mut self, name: &str) -> Result<(), WorkspaceError> {
        let id = self.item_id(name)?;
        self.apply(BatchEvent::ResetToAuto(id))
    }

    /// Drop an item from the batch and remember the removal.
    pub fn remove(&mut self, name: &str) -> Result<(), WorkspaceError> {
        let id = self.item_id(name)?;
        if let Some(item) = self.batch.get(id) {
            self.session.mark_removed(item);
        }
        self.apply(BatchEvent::Remove(id))
    }

    /// Export every item; numbering continues from this export next time.
    pub fn export(
        &mut self,
        progress: Option<Sender<ExportEvent>>,
    ) -> Result<ExportReport, WorkspaceError> {
        let report = export::export_with_backend(
            &self.backend,
            &self.batch,
            &self.export_settings,
            &self.paths.output,
            progress,
        )?;
        self.session.next_index = Some(report.next_index);
        self.export_settings.start_index = report.next_index;
        Ok(report)
    }

    pub fn write_previews(
        &self,
        progress: Option<Sender<ExportEvent>>,
    ) -> Result<Vec<ExportedFile>, WorkspaceError> {
        let written = export::write_previews(
            &self.backend,
            &self.batch,
            self.export_settings.quality,
            &self.preview_dir(),
            progress,
        )?;
        Ok(written)
    }

    /// Persist manual crops, removals, and settings to the session file.
    pub fn save(&mut self) -> Result<(), WorkspaceError> {
        self.session.capture(&self.batch);
        self.session.save(&self.paths.temp_dir)?;
        Ok(())
    }

    pub fn session_path(&self) -> PathBuf {
        crate::session::session_path(&self.paths.temp_dir)
    }
}

/// Merge config, session and flags into sanitized export settings.
fn resolve_export_settings(
    config: &CropConfig,
    session: &Session,
    overrides: &Overrides,
) -> ExportSettings {
    let mut export = config.export.clone();
    if let Some(max_dimension) = overrides.max_dimension {
        export.max_dimension = max_dimension;
    }
    if let Some(base_name) = &overrides.base_name {
        export.base_name = base_name.clone();
    }
    export.start_index = overrides
        .start_index
        .or(session.next_index)
        .unwrap_or(export.start_index);
    export.settings()
}

/// Default paths relative to a source directory, for tests and embedding.
pub fn paths_in(root: &Path) -> WorkspacePaths {
    WorkspacePaths {
        source: root.to_path_buf(),
        output: root.join("cropped"),
        temp_dir: root.join(".cardcrop"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::backend::tests::{MockBackend, RecordedOp};
    use std::fs;
    use tempfile::TempDir;

    fn write_mock(dir: &Path, name: &str, width: u8, height: u8) {
        fs::write(dir.join(name), [width, height, 0, 0]).unwrap();
    }

    fn open(root: &Path, overrides: &Overrides) -> Workspace<MockBackend> {
        Workspace::open_with_backend(MockBackend::new(), paths_in(root), overrides).unwrap()
    }

    #[test]
    fn open_loads_sources_with_config_defaults() {
        let tmp = TempDir::new().unwrap();
        write_mock(tmp.path(), "a.png", 40, 30);
        write_mock(tmp.path(), "b.png", 20, 20);

        let ws = open(tmp.path(), &Overrides::default());

        assert_eq!(ws.batch().len(), 2);
        assert_eq!(ws.batch().settings().threshold.value(), 245);
        assert!(!ws.batch().settings().match_first_crop);
        assert_eq!(ws.export_settings().start_index, 1);
        assert_eq!(ws.export_settings().base_name, "card");
    }

    #[test]
    fn config_file_feeds_settings() {
        let tmp = TempDir::new().unwrap();
        write_mock(tmp.path(), "a.png", 10, 10);
        fs::write(
            tmp.path().join("config.toml"),
            "[detection]\nwhite_threshold = 230\n[export]\nbase_name = \"my deck\"\nmax_dimension = -4\n",
        )
        .unwrap();

        let ws = open(tmp.path(), &Overrides::default());
        assert_eq!(ws.batch().settings().threshold.value(), 230);
        assert_eq!(ws.export_settings().base_name, "my_deck");
        assert_eq!(ws.export_settings().max_dimension, 500);
    }

    #[test]
    fn preloaded_config_is_used_as_given() {
        let tmp = TempDir::new().unwrap();
        write_mock(tmp.path(), "a.png", 10, 10);
        fs::write(tmp.path().join("config.toml"), "[detection]\nwhite_threshold = 230\n").unwrap();

        let mut config = CropConfig::default();
        config.export.base_name = "tarot".into();
        let ws = Workspace::from_parts(
            MockBackend::new(),
            config,
            paths_in(tmp.path()),
            &Overrides::default(),
        )
        .unwrap();

        assert_eq!(ws.batch().settings().threshold.value(), 245);
        assert_eq!(ws.config().export.base_name, "tarot");
        assert_eq!(ws.export_settings().base_name, "tarot");
    }

    #[test]
    fn malformed_config_fails_open() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("config.toml"), "[detection\n").unwrap();
        let result = Workspace::open_with_backend(
            MockBackend::new(),
            paths_in(tmp.path()),
            &Overrides::default(),
        );
        assert!(matches!(result, Err(WorkspaceError::Config(_))));
    }

    #[test]
    fn flags_override_config() {
        let tmp = TempDir::new().unwrap();
        write_mock(tmp.path(), "a.png", 10, 10);
        let overrides = Overrides {
            threshold: Some(999),
            match_first: Some(true),
            max_dimension: Some(250.4),
            base_name: Some("  ".into()),
            start_index: Some(20),
        };

        let ws = open(tmp.path(), &overrides);
        assert_eq!(ws.batch().settings().threshold.value(), 254);
        assert!(ws.batch().settings().match_first_crop);
        assert_eq!(ws.export_settings().max_dimension, 250);
        assert_eq!(ws.export_settings().base_name, "card");
        assert_eq!(ws.export_settings().start_index, 20);
    }

    #[test]
    fn unknown_name_errors() {
        let tmp = TempDir::new().unwrap();
        write_mock(tmp.path(), "a.png", 10, 10);
        let mut ws = open(tmp.path(), &Overrides::default());
        assert!(matches!(
            ws.reset("missing.png"),
            Err(WorkspaceError::UnknownName(_))
        ));
    }

    #[test]
    fn item_lookup_accepts_dot_slash() {
        let tmp = TempDir::new().unwrap();
        write_mock(tmp.path(), "a.png", 10, 10);
        let ws = open(tmp.path(), &Overrides::default());
        assert!(ws.item_id("./a.png").is_ok());
    }

    #[test]
    fn edits_and_removals_survive_reopen() {
        let tmp = TempDir::new().unwrap();
        write_mock(tmp.path(), "a.png", 40, 40);
        write_mock(tmp.path(), "b.png", 40, 40);

        let mut ws = open(tmp.path(), &Overrides::default());
        ws.edit("a.png", &[(Edge::Top, 5), (Edge::Right, 7)]).unwrap();
        ws.remove("b.png").unwrap();
        ws.save().unwrap();

        let ws = open(tmp.path(), &Overrides::default());
        assert_eq!(ws.batch().len(), 1);
        let item = &ws.batch().items()[0];
        assert!(item.is_manual);
        assert_eq!(item.current_offsets.top, 5);
        assert_eq!(item.current_offsets.right, 7);
        assert_eq!(ws.restored().manual, 1);
        assert_eq!(ws.restored().removed, 1);
    }

    #[test]
    fn threshold_flag_persists_but_config_is_not_pinned() {
        let tmp = TempDir::new().unwrap();
        write_mock(tmp.path(), "a.png", 10, 10);

        let mut ws = open(tmp.path(), &Overrides::default());
        ws.save().unwrap();
        fs::write(
            tmp.path().join("config.toml"),
            "[detection]\nwhite_threshold = 210\n",
        )
        .unwrap();
        assert_eq!(
            open(tmp.path(), &Overrides::default())
                .batch()
                .settings()
                .threshold
                .value(),
            210
        );

        let mut ws = open(
            tmp.path(),
            &Overrides {
                threshold: Some(222),
                ..Default::default()
            },
        );
        ws.save().unwrap();
        assert_eq!(
            open(tmp.path(), &Overrides::default())
                .batch()
                .settings()
                .threshold
                .value(),
            222
        );
    }

    #[test]
    fn export_continues_numbering_across_runs() {
        let tmp = TempDir::new().unwrap();
        write_mock(tmp.path(), "a.png", 10, 10);
        write_mock(tmp.path(), "b.png", 10, 10);

        let mut ws = open(tmp.path(), &Overrides::default());
        let report = ws.export(None).unwrap();
        assert_eq!(report.next_index, 3);
        ws.save().unwrap();

        let mut ws = open(tmp.path(), &Overrides::default());
        assert_eq!(ws.export_settings().start_index, 3);
        ws.export(None).unwrap();
        let outputs: Vec<String> = ws
            .backend
            .encoded()
            .into_iter()
            .filter_map(|op| match op {
                RecordedOp::Encode { output, .. } => Some(output),
                _ => None,
            })
            .collect();
        assert_eq!(outputs, vec!["card3.jpg", "card4.jpg"]);
    }

    #[test]
    fn output_dir_inside_source_is_not_rescanned() {
        let tmp = TempDir::new().unwrap();
        write_mock(tmp.path(), "a.png", 10, 10);
        fs::create_dir_all(tmp.path().join("cropped")).unwrap();
        write_mock(&tmp.path().join("cropped"), "card1.jpg", 10, 10);

        let ws = open(tmp.path(), &Overrides::default());
        assert_eq!(ws.batch().len(), 1);
    }

    #[test]
    fn previews_go_to_temp_dir() {
        let tmp = TempDir::new().unwrap();
        write_mock(tmp.path(), "a.png", 10, 10);
        let ws = open(tmp.path(), &Overrides::default());

        let written = ws.write_previews(None).unwrap();
        assert_eq!(written[0].output, ws.preview_dir().join("a-preview.jpg"));
        assert!(ws.preview_dir().starts_with(&ws.paths().temp_dir));
    }
}
