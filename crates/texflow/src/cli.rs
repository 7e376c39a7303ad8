use std::path::PathBuf;

use clap::{Parser, ValueEnum};

#[derive(Parser, Debug)]
#[command(
    name = "texflow",
    version,
    about = "Run a ping-pong GPU compute scenario headlessly and report the final state"
)]
pub struct Args {
    /// Scenario TOML file describing the grid, variables, and wiring.
    #[arg(value_name = "SCENARIO", conflicts_with = "demo")]
    pub scenario: Option<PathBuf>,

    /// Run a built-in demo instead of a scenario file.
    #[arg(long, value_enum, value_name = "NAME")]
    pub demo: Option<Demo>,

    /// Override the scenario's tick count.
    #[arg(long, value_name = "N")]
    pub ticks: Option<u32>,

    /// Override the grid size (e.g. `256x256`).
    #[arg(long, value_name = "WIDTHxHEIGHT", value_parser = parse_size)]
    pub size: Option<(u32, u32)>,

    /// Print every texel of each final state instead of summary statistics.
    #[arg(long)]
    pub dump: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Demo {
    /// One self-dependent variable that adds 1 to itself every tick.
    Counter,
    /// A position/velocity pair integrating randomized velocities.
    Advect,
}

pub fn parse() -> Args {
    Args::parse()
}

fn parse_size(value: &str) -> Result<(u32, u32), String> {
    let (width, height) = value
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got `{value}`"))?;
    let width: u32 = width
        .trim()
        .parse()
        .map_err(|_| format!("invalid width `{width}`"))?;
    let height: u32 = height
        .trim()
        .parse()
        .map_err(|_| format!("invalid height `{height}`"))?;
    if width == 0 || height == 0 {
        return Err("grid dimensions must be non-zero".to_owned());
    }
    Ok((width, height))
}
