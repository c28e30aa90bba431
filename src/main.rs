//! Dockhand binary: watch folders, queue files, deliver with bounded retries.

use anyhow::Result;
use clap::Parser;
use dockhand::cli::{Cli, handle};
use std::time::Instant;

fn main() -> Result<()> {
    let start_time = Instant::now();
    let cli = Cli::parse();
    handle(&cli)?;
    log::debug!("Total time: {:?}", start_time.elapsed());
    Ok(())
}
