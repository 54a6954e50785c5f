//! scenecast-cli: command-line client for the render and merge API.
#![deny(clippy::all, clippy::pedantic)]

mod args;
mod client;
mod handlers;
mod io;
mod print;

#[cfg(test)]
mod tests;

use clap::Parser;

use args::{Cli, Commands};
use client::{CliError, build_ctx_from_cli};
use handlers::{compile, health, merge};

#[tokio::main]
async fn main() -> Result<(), CliError> {
    let cli = Cli::parse();
    let ctx = build_ctx_from_cli(&cli)?;

    match cli.command {
        Commands::Compile(args) => compile::handle(&ctx, args).await?,
        Commands::Merge(args) => merge::handle(&ctx, args).await?,
        Commands::Health => health::handle(&ctx).await?,
    }

    Ok(())
}
