//! `sigil run`: create the issuer and receiver identities and issue one
//! credential.

use clap::Args;
use std::path::PathBuf;

use crate::config::{ChainBackend, SigilConfig};
use crate::{output, workflow};

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Directory for the DID and credential documents.
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Seed for the issuer identity.
    #[arg(long, env = "SIGIL_ISSUER_SEED")]
    pub issuer_seed: Option<String>,

    /// Seed for the receiver identity.
    #[arg(long, env = "SIGIL_RECEIVER_SEED")]
    pub receiver_seed: Option<String>,

    /// Keep identity states in memory instead of reading the state contract.
    #[arg(long)]
    pub local_chain: bool,

    /// Verify the issued credential from the receiver's wallet.
    #[arg(long)]
    pub verify: bool,
}

impl RunArgs {
    pub fn apply(&self, config: &mut SigilConfig) {
        if let Some(dir) = &self.output {
            config.output.dir = Some(dir.clone());
        }
        if let Some(seed) = &self.issuer_seed {
            config.identity.issuer_seed = Some(seed.clone());
        }
        if let Some(seed) = &self.receiver_seed {
            config.identity.receiver_seed = Some(seed.clone());
        }
        if self.local_chain {
            config.chain.backend = ChainBackend::Memory;
        }
        if self.verify {
            config.workflow.verify = true;
        }
    }
}

pub async fn run(config: &SigilConfig) -> anyhow::Result<()> {
    let out = workflow::run(config).await?;
    output::print_summary(&out);

    if let Some(dir) = &config.output.dir {
        let written = output::write_outputs(dir, &out)?;
        tracing::info!(dir = %dir.display(), files = written.len(), "documents written");
    }
    Ok(())
}
