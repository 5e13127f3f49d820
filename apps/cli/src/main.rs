//! Outreach CLI: find businesses in a niche and email them.
//!
//! Searches for contacts, drafts personalized emails with an AI model and
//! sends them over SMTP, resuming interrupted runs from checkpoints.

mod commands;
mod prompt;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
