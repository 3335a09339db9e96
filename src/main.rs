//! wtd - command-line access to wind-tunnel sensor columns
//!
//! Commands:
//! - load: ingest, reconstruct and summarise one column
//! - keys: list the experiments held by a cache store
//! - copy: copy every table of one cache store into another

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use wtd_tools::{CacheStore, ExperimentKey, Locator, Options, SensorColumn};

#[derive(Parser)]
#[command(name = "wtd")]
#[command(version)]
#[command(about = "Load and inspect wind-tunnel gas-sensor recordings", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load one column and print its summary
    Load {
        /// direct-file://<path>, archive-entry://<archive>.zip/<entry> or cache-store://<dir>
        locator: String,

        /// Gas, 1-based index into the gas table
        #[arg(long)]
        gas: usize,

        /// Location, 1..=6
        #[arg(long)]
        location: usize,

        /// Sensor voltage, 1..=5
        #[arg(long)]
        voltage: usize,

        /// Fan speed, 1..=3
        #[arg(long)]
        speed: usize,

        /// Trial, 1..=20
        #[arg(long)]
        trial: u32,

        /// JSON options file; flags below override it
        #[arg(long)]
        config: Option<PathBuf>,

        /// Cache store to read from and write to
        #[arg(long)]
        cache: Option<PathBuf>,

        /// Keep duplicate timestamps
        #[arg(long)]
        no_dedup: bool,

        /// Leave gaps in the time index as they are
        #[arg(long)]
        no_fill: bool,

        /// Skip resampling onto the uniform grid
        #[arg(long)]
        no_resample: bool,

        /// Replace the cached table if it already exists
        #[arg(long)]
        overwrite: bool,

        /// Report reconstruction steps at info level
        #[arg(short, long)]
        verbose: bool,
    },

    /// List the experiment keys held by a cache store
    Keys {
        store: PathBuf,
    },

    /// Copy every table of one cache store into another
    Copy {
        from: PathBuf,
        to: PathBuf,
    },
}

fn main() -> ExitCode {
    env_logger::init();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Load {
            locator,
            gas,
            location,
            voltage,
            speed,
            trial,
            config,
            cache,
            no_dedup,
            no_fill,
            no_resample,
            overwrite,
            verbose,
        } => {
            let key = ExperimentKey::from_indices(gas, location, voltage, speed, trial);
            key.context("invalid experiment selection").and_then(|key| {
                let mut options = match config {
                    Some(path) => Options::from_json_file(&path)
                        .with_context(|| format!("loading options from {}", path.display()))?,
                    None => Options::default(),
                };
                if let Some(dir) = cache {
                    options = options.with_cache(dir);
                }
                options.drop_duplicates &= !no_dedup;
                options.fill_gaps &= !no_fill;
                options.resample &= !no_resample;
                options.verbose |= verbose;
                run_load(&locator, key, options, overwrite)
            })
        }
        Commands::Keys { store } => run_keys(&store),
        Commands::Copy { from, to } => run_copy(&from, &to),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run_load(locator: &str, key: ExperimentKey, options: Options, overwrite: bool) -> Result<()> {
    let locator = Locator::parse(locator).context("parsing locator")?;
    let store = options.cache_store().map(PathBuf::from);
    let column = SensorColumn::load(&locator, key.clone(), options)
        .with_context(|| format!("loading {key} from {locator}"))?;

    // a fresh parse is persisted by the load itself; only a forced rewrite is left
    if overwrite {
        if let Some(dir) = store {
            let store = CacheStore::create(&dir)
                .with_context(|| format!("opening cache store {}", dir.display()))?;
            column.save(&store, true).context("rewriting cached table")?;
        }
    }

    println!("{column}");
    println!("Source:\t{}", column.source());
    let report = column.report();
    println!(
        "Reconstruction:\t{} duplicates removed, {} gaps filled ({} samples)",
        report.duplicates_removed, report.gaps_filled, report.samples_inserted
    );
    Ok(())
}

fn run_keys(store: &Path) -> Result<()> {
    let store = CacheStore::open(store)
        .with_context(|| format!("opening cache store {}", store.display()))?;
    let keys = store.keys().context("listing cache store")?;
    for key in &keys {
        println!("{key}");
    }
    log::info!("{} keys in {}", keys.len(), store.root().display());
    Ok(())
}

fn run_copy(from: &Path, to: &Path) -> Result<()> {
    let source = CacheStore::open(from)
        .with_context(|| format!("opening cache store {}", from.display()))?;
    let target = CacheStore::create(to)
        .with_context(|| format!("creating cache store {}", to.display()))?;
    let copied = source.copy_into(&target).context("copying tables")?;
    println!("copied {copied} tables from {} to {}", from.display(), to.display());
    Ok(())
}
