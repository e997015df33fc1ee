//! `sigil init`: write a default configuration file.

use clap::Args;
use std::path::Path;

use crate::config::SigilConfig;

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Overwrite an existing configuration file.
    #[arg(long)]
    pub force: bool,
}

pub fn run(args: &InitArgs, path: &Path) -> anyhow::Result<()> {
    if path.exists() && !args.force {
        anyhow::bail!("{} already exists (use --force to overwrite)", path.display());
    }
    SigilConfig::default().save(path)?;
    println!("Wrote default configuration to {}", path.display());
    println!("Set RPC_URL, CONTRACT_ADDRESS and RHS_URL (or a .env file) before `sigil run`.");
    Ok(())
}
