//! Entry point: parse the CLI, initialise tracing, and hand the resolved
//! run plan to `run.rs`.

mod cli;
mod run;

use anyhow::Result;

fn main() -> Result<()> {
    let args = cli::parse();
    run::initialise_tracing();
    run::run(args)
}
