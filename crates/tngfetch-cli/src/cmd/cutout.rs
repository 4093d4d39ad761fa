//! cutout subcommand - download a subhalo (or parent halo) cutout

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use tngfetch_api::Client;

use crate::config::Settings;

#[derive(Args, Debug)]
pub struct CutoutArgs {
    /// Simulation name (e.g. TNG50-1)
    pub simulation: String,

    /// Snapshot number
    pub snapshot: u32,

    /// Subhalo id
    pub subhalo: u64,

    /// File or directory to write to
    #[arg(short, long, default_value = ".")]
    pub output: PathBuf,

    /// Download the parent halo cutout instead
    #[arg(long)]
    pub parent: bool,
}

pub fn run(args: CutoutArgs, settings: &Settings) -> Result<()> {
    let client = Client::new(settings.base_url(), settings.api_key());
    if !client.is_authenticated() {
        log::warn!("No API key configured; cutout downloads usually require one");
    }
    let path = client
        .download_cutout(
            &args.simulation,
            args.snapshot,
            args.subhalo,
            &args.output,
            args.parent,
        )
        .with_context(|| {
            format!(
                "Cutout {}/{}/{} failed",
                args.simulation, args.snapshot, args.subhalo
            )
        })?;
    log::info!("Saved {}", path.display());
    Ok(())
}
