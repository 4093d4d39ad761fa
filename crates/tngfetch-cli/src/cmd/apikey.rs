//! apikey subcommand - store the API key in the settings document

use std::path::Path;

use anyhow::{Context, Result};
use clap::Args;

use crate::config::{self, mask_key};

#[derive(Args, Debug)]
pub struct ApiKeyArgs {
    /// API key from your tng-project.org profile
    pub key: String,
}

pub fn run(args: ApiKeyArgs, explicit: Option<&Path>) -> Result<()> {
    let path = config::locate(explicit)?;
    config::set_api_key(&path, args.key.trim())
        .with_context(|| format!("Failed to update {}", path.display()))?;
    log::info!(
        "API key set to {} in {}",
        mask_key(args.key.trim()),
        path.display()
    );
    Ok(())
}
