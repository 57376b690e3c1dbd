#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI entry point for the address formatter.
//!
//! Formats a single YAML or JSON mapping of geocoder components, a file
//! of newline-delimited JSON objects, or lists the supported countries.
//!
//! Uses `indicatif-log-bridge` (via [`progress::init_logger`]) to route
//! `log` output through `indicatif::MultiProgress` so that log lines and
//! the batch progress bar never fight for the terminal.

mod batch;
mod config;
mod progress;

use std::io::{BufReader, Read, Write};
use std::path::PathBuf;

use address_formatter::AddressFormatter;
use clap::{Args, Parser, Subcommand};

use crate::config::FlagOverrides;
use crate::progress::IndicatifProgress;

#[derive(Parser)]
#[command(name = "address_formatter", about = "Country-aware postal address formatter")]
struct Cli {
    #[command(flatten)]
    options: GlobalOptions,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct GlobalOptions {
    /// TOML file with formatter options
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Directory with reference tables to use instead of the built-in ones
    #[arg(long, global = true)]
    data_dir: Option<String>,
    /// Abbreviate common words (e.g. "Street" to "St")
    #[arg(long, global = true)]
    abbreviate: bool,
    /// Add the country name when the input has none
    #[arg(long, global = true)]
    append_country: bool,
    /// Collect unrecognized components into the attention line
    #[arg(long, global = true)]
    append_unknown: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Format one YAML or JSON mapping of address components
    Format {
        /// File holding the mapping (reads stdin if omitted)
        #[arg(long)]
        input: Option<PathBuf>,
        /// Country code to use when the input has none
        #[arg(long)]
        country: Option<String>,
    },
    /// Format newline-delimited JSON objects, one address per line
    Batch {
        /// NDJSON input file
        #[arg(long)]
        input: PathBuf,
        /// Country code to use for lines that have none
        #[arg(long)]
        country: Option<String>,
    },
    /// List countries with their own layout
    Countries,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = progress::init_logger();
    let cli = Cli::parse();

    let flags = FlagOverrides {
        abbreviate: cli.options.abbreviate,
        append_country: cli.options.append_country,
        append_unknown: cli.options.append_unknown,
        data_dir: cli.options.data_dir,
    };
    let options = config::resolve(cli.options.config.as_deref(), &flags)?;
    let formatter = AddressFormatter::new(options)?;

    match cli.command {
        Commands::Format { input, country } => {
            let mut text = String::new();
            match input {
                Some(path) => text = std::fs::read_to_string(path)?,
                None => {
                    std::io::stdin().read_to_string(&mut text)?;
                }
            }

            let address = formatter.format_str(&text, country.as_deref())?;
            print!("{address}");
        }
        Commands::Batch { input, country } => {
            let file = std::fs::File::open(&input)?;
            log::info!("Formatting {}", input.display());

            let bar = IndicatifProgress::batch_bar(&multi, "Formatting");
            let stdout = std::io::stdout();
            let mut out = stdout.lock();
            let summary = batch::run(
                &formatter,
                BufReader::new(file),
                &mut out,
                country.as_deref(),
                bar.as_ref(),
            )?;
            out.flush()?;

            log::info!(
                "Done: {} formatted, {} failed",
                summary.formatted,
                summary.failed
            );
        }
        Commands::Countries => {
            let data = formatter.reference_data();
            for code in data.country_codes() {
                match data.country_name(code) {
                    Some(name) => println!("{code}\t{name}"),
                    None => println!("{code}"),
                }
            }
        }
    }

    Ok(())
}
