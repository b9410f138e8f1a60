use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use chaff_core::fingerprint::{HashKey, DEFAULT_KEY_HEX};
use chaff_core::progress::Progress;
use chaff_core::reconcile::reconcile;
use chaff_core::scan::{scan, ScanOptions};

#[derive(Parser)]
#[command(name = "chaff", version, about = "content-addressed dedup scanner")]
struct Cli {
    /// Keyed-hash key as 64 hex chars. Manifests only compare across runs
    /// that agree on this value.
    #[arg(long, global = true, env = "CHAFF_KEY", default_value = DEFAULT_KEY_HEX)]
    key_hex: String,
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(clap::Args)]
struct RunArgs {
    /// Root directory to scan
    root: PathBuf,
    /// Include globs, relative to the root (default: everything)
    #[arg(long)]
    include: Vec<String>,
    /// Exclude globs, relative to the root
    #[arg(long)]
    exclude: Vec<String>,
    /// Hashing worker threads
    #[arg(long, default_value_t = 8)]
    workers: usize,
    /// Report counters to stderr every few seconds
    #[arg(long, default_value_t = false)]
    progress: bool,
}

#[derive(Subcommand)]
enum Cmd {
    /// Fingerprint every file under the root and write a manifest
    Scan {
        #[command(flatten)]
        run: RunArgs,
        /// Manifest file to create
        manifest: PathBuf,
    },
    /// Classify the root's files against a saved manifest
    Reconcile {
        #[command(flatten)]
        run: RunArgs,
        /// Manifest file to compare against
        manifest: PathBuf,
        /// Delete every file already recorded in the manifest
        #[arg(long, default_value_t = false)]
        delete: bool,
    },
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    let key = HashKey::from_hex(&cli.key_hex).context("parse --key-hex")?;
    match cli.cmd {
        Cmd::Scan { run, manifest } => {
            let (opts, progress) = setup(key, &run);
            let report = scan(&run.root, &manifest, &opts, &progress)?;
            progress.stop();
            println!("Found {} files", progress.found());
            println!("Processed {} files", report.files);
        }
        Cmd::Reconcile { run, manifest, delete } => {
            let (opts, progress) = setup(key, &run);
            let report = reconcile(&run.root, &manifest, delete, &opts, &progress)?;
            progress.stop();
            println!("found={} not-found={}", report.duplicates, report.unrecorded);
            if delete {
                println!("deleted {} duplicate files", report.deleted);
            }
        }
    }
    Ok(())
}

fn setup(key: HashKey, run: &RunArgs) -> (ScanOptions, Progress) {
    let opts = ScanOptions {
        key,
        workers: run.workers,
        include: run.include.clone(),
        exclude: run.exclude.clone(),
        ..ScanOptions::default()
    };
    let progress = Progress::new(run.progress);
    progress.start();
    (opts, progress)
}
