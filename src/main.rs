use cardcrop::crop::Edge;
use cardcrop::export::ExportEvent;
use cardcrop::workspace::{Overrides, Workspace, WorkspacePaths};
use cardcrop::{config, output};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::mpsc::Sender;
use std::thread::JoinHandle;
use tracing_subscriber::EnvFilter;

/// Flags that override `config.toml` for this run.
#[derive(clap::Args, Clone, Default)]
struct SettingArgs {
    /// White threshold (200-254); remembered for later runs
    #[arg(long, global = true)]
    threshold: Option<i64>,

    /// Apply the first image's crop to all non-manual images; remembered for later runs
    #[arg(long, global = true)]
    match_first: Option<bool>,

    /// Longest side of exported images in pixels
    #[arg(long, global = true)]
    max_dimension: Option<f64>,

    /// Output file base name
    #[arg(long, global = true)]
    base_name: Option<String>,

    /// Index of the first exported file
    #[arg(long, global = true, allow_negative_numbers = true)]
    start_index: Option<i64>,
}

impl SettingArgs {
    fn overrides(&self) -> Overrides {
        Overrides {
            threshold: self.threshold,
            match_first: self.match_first,
            max_dimension: self.max_dimension,
            base_name: self.base_name.clone(),
            start_index: self.start_index,
        }
    }
}

/// New values for individual edges.
#[derive(clap::Args, Clone)]
struct EdgeArgs {
    #[arg(long, allow_negative_numbers = true)]
    top: Option<i64>,
    #[arg(long, allow_negative_numbers = true)]
    bottom: Option<i64>,
    #[arg(long, allow_negative_numbers = true)]
    left: Option<i64>,
    #[arg(long, allow_negative_numbers = true)]
    right: Option<i64>,
}

impl EdgeArgs {
    fn edits(&self) -> Vec<(Edge, i64)> {
        [
            (Edge::Top, self.top),
            (Edge::Bottom, self.bottom),
            (Edge::Left, self.left),
            (Edge::Right, self.right),
        ]
        .into_iter()
        .filter_map(|(edge, value)| value.map(|v| (edge, v)))
        .collect()
    }
}

#[derive(Parser)]
#[command(name = "cardcrop")]
#[command(version)]
#[command(about = "Detect and crop white scanner borders in batches of card scans")]
#[command(long_about = "\
Detect and crop white scanner borders in batches of card scans

Every image in the source directory has its uniform light margin detected
and cropped away. Crops can be adjusted per image; adjusted images are
'manual' and keep their crop when settings change. Export writes numbered
JPEGs in the order the scans were made.

Typical session:

  cardcrop --source scans detect                 # list detected crops
  cardcrop --source scans edit a.png --top 40    # adjust one image by hand
  cardcrop --source scans preview                # write small crop previews
  cardcrop --source scans export                 # write card1.jpg, card2.jpg, ...

Manual crops, removals, --threshold, --match-first and the next export index
are kept in <temp-dir>/session.json between runs.

Run 'cardcrop gen-config' to generate a documented config.toml.")]
struct Cli {
    /// Directory holding the scans (and an optional config.toml)
    #[arg(long, default_value = ".", global = true)]
    source: PathBuf,

    /// Directory exported JPEGs are written to
    #[arg(long, default_value = "cropped", global = true)]
    output: PathBuf,

    /// Directory for the session file and previews
    #[arg(long, default_value = ".cardcrop", global = true)]
    temp_dir: PathBuf,

    #[command(flatten)]
    settings: SettingArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Detect borders and list every image's crop
    Detect,
    /// Set one or more edges of an image by hand
    Edit {
        /// Image path relative to the source directory
        name: String,
        #[command(flatten)]
        edges: EdgeArgs,
    },
    /// Take manual control of an image without changing its crop
    Manual {
        name: String,
    },
    /// Re-detect an image and return it to automatic control
    Reset {
        name: String,
    },
    /// Leave an image out of the batch
    Remove {
        name: String,
    },
    /// Write cropped, numbered JPEGs to the output directory
    Export,
    /// Write small crop previews to the temp directory
    Preview,
    /// Print a stock config.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing();

    if let Command::GenConfig = cli.command {
        print!("{}", config::stock_config_toml());
        return Ok(());
    }

    let config = config::load_config(&cli.source)?;
    init_thread_pool(&config.processing);

    let paths = WorkspacePaths {
        source: cli.source.clone(),
        output: cli.output.clone(),
        temp_dir: cli.temp_dir.clone(),
    };
    let overrides = cli.settings.overrides();
    let mut workspace = Workspace::open_with_config(config, paths, &overrides)?;
    if let Some(line) = output::format_restore(workspace.restored()) {
        println!("{}", line);
    }

    match &cli.command {
        Command::Detect => {}
        Command::Edit { name, edges } => {
            let edits = edges.edits();
            if edits.is_empty() {
                return Err("edit needs at least one of --top, --bottom, --left, --right".into());
            }
            workspace.edit(name, &edits)?;
        }
        Command::Manual { name } => workspace.set_manual(name, true)?,
        Command::Reset { name } => workspace.reset(name)?,
        Command::Remove { name } => workspace.remove(name)?,
        Command::Export => {
            let (tx, printer) = spawn_printer();
            let result = workspace.export(Some(tx));
            join_printer(printer);
            let report = result?;
            output::print_export_summary(&report, &cli.output);
        }
        Command::Preview => {
            let (tx, printer) = spawn_printer();
            let result = workspace.write_previews(Some(tx));
            join_printer(printer);
            result?;
            println!("Previews in {}", workspace.preview_dir().display());
        }
        Command::GenConfig => unreachable!("handled before opening the workspace"),
    }

    if !matches!(cli.command, Command::Export | Command::Preview) {
        output::print_batch(workspace.batch(), workspace.failures());
    }
    workspace.save()?;
    Ok(())
}

/// Diagnostics go to stderr, filtered by `RUST_LOG` (default `warn`).
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Initialize the rayon thread pool based on processing config.
///
/// Capped at the number of available CPU cores.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}

/// Print export events as they arrive.
fn spawn_printer() -> (Sender<ExportEvent>, JoinHandle<()>) {
    let (tx, rx) = std::sync::mpsc::channel();
    let printer = std::thread::spawn(move || {
        for event in rx {
            for line in output::format_export_event(&event) {
                println!("{}", line);
            }
        }
    });
    (tx, printer)
}

fn join_printer(printer: JoinHandle<()>) {
    if printer.join().is_err() {
        tracing::warn!("progress printer panicked");
    }
}
