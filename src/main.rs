use std::{
    fs::File,
    io::{self, BufWriter, Write},
    path::PathBuf,
};

use anyhow::Context;
use clap::{Parser, Subcommand};

use battleship_tester::{
    prelude::*,
    report::{write_all, Palette},
};

#[derive(Debug, Clone, Parser)]
#[command(author, version, about, long_about = None)]
struct CommandArgs {
    #[command(subcommand)]
    mode: Mode,
}

#[derive(Debug, Clone, Subcommand)]
enum Mode {
    /// Test the AIs of a program
    Run(#[clap(flatten)] RunArg),
    /// Print the version of the tester
    Version,
}

#[derive(Debug, Clone, clap::Args)]
struct RunArg {
    /// Rounds played by each AI
    #[arg(long)]
    iterations: Option<usize>,
    /// Number of rows of the board
    #[arg(long)]
    rows: Option<u16>,
    /// Number of columns of the board
    #[arg(long)]
    cols: Option<u16>,
    /// Smallest and largest ship sizes
    #[arg(long, num_args = 2, value_names = ["MIN", "MAX"])]
    ships: Option<Vec<u8>>,
    /// Time allowed for each guess, in milliseconds
    #[arg(long, value_name = "MS")]
    wait: Option<u64>,
    /// AI to test, may be repeated (default: every AI of the program)
    #[arg(long = "ai", value_name = "ID")]
    ai_ids: Vec<usize>,
    /// Write the summary to this file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,
    /// Do not print progress
    #[arg(long)]
    quiet: bool,
    /// Log to a timestamped file in the working directory
    #[arg(long)]
    log: bool,
    /// Program under test
    program: String,
}

impl RunArg {
    /// Command line values override the environment.
    fn configuration(&self) -> Configuration {
        let mut config = Configuration::from_env();
        if let Some(iterations) = self.iterations {
            config = config.with_iterations(iterations);
        }
        if self.rows.is_some() || self.cols.is_some() {
            let rows = self.rows.unwrap_or(config.rows());
            let cols = self.cols.unwrap_or(config.cols());
            config = config.with_board(rows, cols);
        }
        if let Some([smallest, largest]) = self.ships.as_deref() {
            config = config.with_ships(*smallest, *largest);
        }
        if let Some(wait) = self.wait {
            config = config.with_wait_upto_millis(wait);
        }
        if !self.ai_ids.is_empty() {
            config = config.with_ai_selection(AiSelection::Ids(self.ai_ids.clone()));
        }
        if self.quiet {
            config = config.with_verbose(false);
        }
        if self.log {
            config = config.with_log(true);
        }
        config
    }
}

fn run(arg: &RunArg) -> anyhow::Result<()> {
    let harness = Harness::new(arg.configuration())?;
    let reports = harness.run(&arg.program)?;

    match &arg.output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("could not create '{}'", path.display()))?;
            let mut writer = BufWriter::new(file);
            write_all(&mut writer, &reports, Palette { enabled: false })?;
            writer.flush()?;
        }
        None => {
            let mut stdout = io::stdout().lock();
            write_all(&mut stdout, &reports, Palette { enabled: true })?;
            stdout.flush()?;
        }
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let args = CommandArgs::parse();
    match args.mode {
        Mode::Run(arg) => run(&arg)?,
        Mode::Version => println!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION")),
    }
    Ok(())
}
