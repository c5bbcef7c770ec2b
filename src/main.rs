use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use scrollshot_lib::{
    hashing, quick_capture, utils::init_logging, CaptureArea, CaptureRequest, CaptureSettings,
    ChatJoiner, DisplayTarget, HashVariant, ReplayCaptureProvider, ScrollshotController,
    ScrollshotJob, ScrollshotPaths, SettingsStore, StitchSettings,
};

const ENABLE_LOGS: bool = true;

use scrollshot_lib::{log_error, log_info};

/// Scrolling screenshots stitched from deduplicated frames.
#[derive(Parser, Debug)]
#[command(name = "scrollshot")]
#[command(about = "Capture a scrolling area as one tall image")]
struct Args {
    /// Directory holding the encrypted settings file and its key
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the block hash of an image
    Hash {
        image: PathBuf,
        #[arg(long, default_value_t = 128)]
        bits: u32,
        /// even (1) or interpolated (2)
        #[arg(long, default_value = "interpolated")]
        variant: HashVariant,
    },
    /// Hamming distance between two hex hashes
    Distance { left: String, right: String },
    /// Run a full scrollshot over a directory of recorded display stills
    Replay {
        /// Directory of full-display stills, replayed in name order
        frames: PathBuf,
        /// Marked area as x,y,width,height
        #[arg(long)]
        area: CaptureArea,
        #[arg(long, default_value = "0")]
        display_id: String,
        /// Joiner executable; defaults to `chatjoiner` next to this binary
        #[arg(long)]
        joiner: Option<PathBuf>,
        /// Extra argument placed before the joiner's own (repeatable)
        #[arg(long = "joiner-arg", allow_hyphen_values = true)]
        joiner_args: Vec<String>,
        /// Root for frames and output; defaults to the temp and data directories
        #[arg(long)]
        root: Option<PathBuf>,
        #[arg(long, default_value_t = 512)]
        max_frames: u32,
        #[arg(long, default_value_t = 50)]
        max_repeated: u32,
        #[arg(long, default_value_t = 428)]
        min_delay_ms: u64,
        #[arg(long, default_value_t = 1000)]
        threshold: u32,
    },
    /// Save a single still of the area from the first recorded display still
    Snap {
        frames: PathBuf,
        #[arg(long)]
        area: CaptureArea,
        #[arg(long, default_value = "0")]
        display_id: String,
        #[arg(short, long, default_value = ".")]
        out: PathBuf,
    },
    /// Show or change the stitch settings
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },
}

#[derive(Subcommand, Debug)]
enum SettingsAction {
    Show,
    /// Set one field by its camelCase name, e.g. `denoisingFactor 0.2`
    Set { field: String, value: String },
    Reset,
}

#[tokio::main]
async fn main() {
    init_logging();

    if let Err(err) = run(Args::parse()).await {
        log_error!("{err:#}");
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    match args.command {
        Command::Hash {
            image,
            bits,
            variant,
        } => {
            if bits < 2 || bits % 2 != 0 {
                bail!("--bits must be an even number of at least 2");
            }
            let bytes = std::fs::read(&image)
                .with_context(|| format!("Failed to read {}", image.display()))?;
            println!("{}", hashing::hash_encoded(&bytes, bits, variant)?);
        }
        Command::Distance { left, right } => {
            let left: hashing::BlockHash = left.parse()?;
            let right: hashing::BlockHash = right.parse()?;
            println!("{}", hashing::distance(&left, &right)?);
        }
        Command::Replay {
            frames,
            area,
            display_id,
            joiner,
            joiner_args,
            root,
            max_frames,
            max_repeated,
            min_delay_ms,
            threshold,
        } => {
            let store = open_store(args.config_dir.as_deref())?;
            let provider = ReplayCaptureProvider::from_dir(&frames, display_id.clone())?;
            let joiner = match joiner {
                Some(program) => ChatJoiner::new(program),
                None => ChatJoiner::locate(&exe_dir()?)?,
            }
            .with_leading_args(joiner_args);

            let job = ScrollshotJob {
                request: CaptureRequest {
                    display: DisplayTarget::new(display_id, 0),
                    area,
                },
                capture: CaptureSettings {
                    max_frames,
                    max_repeated,
                    min_delay: Duration::from_millis(min_delay_ms),
                    diff_threshold: threshold,
                    ..CaptureSettings::default()
                },
                stitch: store.stitch(),
                paths: root.map(ScrollshotPaths::under).unwrap_or_default(),
            };

            let mut controller = ScrollshotController::new();
            controller.start(job, Arc::new(provider), Arc::new(joiner))?;
            if let Some(signals) = controller.signals() {
                tokio::spawn(async move {
                    if tokio::signal::ctrl_c().await.is_ok() {
                        log_info!("interrupted, cancelling scrollshot");
                        signals.cancel();
                    }
                });
            }

            match controller.wait().await? {
                Some(path) => println!("{}", path.display()),
                None => log_info!("scrollshot cancelled, nothing saved"),
            }
        }
        Command::Snap {
            frames,
            area,
            display_id,
            out,
        } => {
            let provider = ReplayCaptureProvider::from_dir(&frames, display_id.clone())?;
            let path =
                quick_capture(&provider, &DisplayTarget::new(display_id, 0), &area, &out).await?;
            println!("{}", path.display());
        }
        Command::Settings { action } => {
            let store = open_store(args.config_dir.as_deref())?;
            match action {
                SettingsAction::Show => {}
                SettingsAction::Set { field, value } => {
                    store.update_stitch(with_field(store.stitch(), &field, &value)?)?;
                    log_info!("saved settings to {}", store.path().display());
                }
                SettingsAction::Reset => store.reset()?,
            }
            println!("{}", serde_json::to_string_pretty(&store.stitch())?);
        }
    }
    Ok(())
}

fn open_store(config_dir: Option<&Path>) -> Result<SettingsStore> {
    let dir = match config_dir {
        Some(dir) => dir.to_path_buf(),
        None => dirs::config_dir()
            .context("no configuration directory on this platform")?
            .join("scrollshot"),
    };
    SettingsStore::open_in(&dir)
}

fn exe_dir() -> Result<PathBuf> {
    let exe = std::env::current_exe().context("Failed to resolve the current executable")?;
    exe.parent()
        .map(Path::to_path_buf)
        .context("executable has no parent directory")
}

/// Replaces one camelCase field of `settings`, going through JSON so field
/// names match the persisted form.
fn with_field(settings: StitchSettings, field: &str, value: &str) -> Result<StitchSettings> {
    let mut json = serde_json::to_value(settings)?;
    let slot = json
        .get_mut(field)
        .with_context(|| format!("unknown scrollshot setting '{field}'"))?;
    *slot = serde_json::from_str(value)
        .with_context(|| format!("'{value}' is not a number"))?;
    serde_json::from_value(json).with_context(|| format!("invalid value for '{field}': {value}"))
}
