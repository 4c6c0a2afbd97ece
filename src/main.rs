use std::process::ExitCode;

use clap::Parser;
use tracing::error;

mod artifact;
mod catalog;
mod commands;
mod config;
mod credentials;
mod deploy;
mod error;
mod feed;
mod harvestor;
mod pipeline;
mod podcast;
mod schedule;
mod util;

pub use error::{Error, Result};

pub const GENERATOR_STR: &str =
  concat!("ilpost-feeds/", env!("CARGO_PKG_VERSION"));

#[tokio::main]
async fn main() -> ExitCode {
  let cli = commands::Cli::parse();
  commands::init_tracing(&cli);

  match commands::run(cli).await {
    Ok(()) => ExitCode::SUCCESS,
    Err(err) => {
      error!("{err}");
      ExitCode::FAILURE
    }
  }
}
