use anyhow::Result;
use clap::Parser;

use fmgen_cli::{cli::Cli, commands, logging};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.level_filter());
    commands::execute(cli).await
}
