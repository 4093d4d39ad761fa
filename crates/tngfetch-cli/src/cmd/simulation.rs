//! simulation subcommand - print simulation metadata

use anyhow::{Context, Result, bail};
use clap::Args;
use serde_json::Value;

use tngfetch_api::Client;

use super::snapshot::format_table;
use crate::config::Settings;

#[derive(Args, Debug)]
pub struct SimulationArgs {
    /// Simulation name (e.g. TNG50-1)
    pub simulation: String,

    /// Print raw JSON instead of a table
    #[arg(long)]
    pub json: bool,
}

pub fn run(args: SimulationArgs, settings: &Settings) -> Result<()> {
    let client = Client::new(settings.base_url(), settings.api_key());
    let meta = client
        .simulation(&args.simulation)
        .with_context(|| format!("Cannot fetch simulation {}", args.simulation))?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&meta)?);
        return Ok(());
    }
    let Value::Object(attributes) = meta else {
        bail!("Simulation {} is not a JSON object", args.simulation);
    };
    println!("{}", format_table(&attributes));
    Ok(())
}
