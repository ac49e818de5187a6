//! fill-pdf-template - fill the form fields of a PDF template
//!
//! Usage:
//!   fill-pdf-template <template_path> <json_data_file> <output_path>
//!
//! Results are reported on stdout as a single `SUCCESS:` or `ERROR:` line.
//! Logs go to stderr and are controlled by `RUST_LOG` or `-v`.

use anyhow::{Context, Result};
use clap::error::ErrorKind;
use clap::{ArgAction, Parser};
use form_fill::{parse_assignments, FillError, FillOptions, FormFiller};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const USAGE: &str = "Usage: fill-pdf-template <template_path> <json_data_file> <output_path>";

/// Missing input files, unreadable or malformed JSON, bad arguments
const EXIT_INPUT_ERROR: u8 = 1;
/// The template could not be filled or the output could not be written
const EXIT_FILL_FAILURE: u8 = 2;

#[derive(Parser, Debug)]
#[command(
    name = "fill-pdf-template",
    about = "Fill the form fields of a PDF template from a JSON file",
    version
)]
struct Cli {
    /// PDF form template
    #[arg(allow_hyphen_values = true)]
    template: PathBuf,

    /// JSON object mapping field names to values
    #[arg(allow_hyphen_values = true)]
    data: PathBuf,

    /// Where to write the filled PDF
    #[arg(allow_hyphen_values = true)]
    output: PathBuf,

    /// Arguments after the output path are ignored
    #[arg(hide = true, num_args = 0.., trailing_var_arg = true)]
    extra: Vec<String>,

    /// Ask viewers to regenerate field appearances from the new values
    #[arg(long)]
    need_appearances: bool,

    /// Log more to stderr (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) if matches!(err.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            let _ = err.print();
            return ExitCode::SUCCESS;
        }
        Err(_) => {
            println!("{}", USAGE);
            return ExitCode::from(EXIT_INPUT_ERROR);
        }
    };

    init_logging(cli.verbose);
    if !cli.extra.is_empty() {
        debug!(extra = ?cli.extra, "ignoring arguments after the output path");
    }

    match run(&cli) {
        Ok(code) => code,
        Err(err) => {
            println!("ERROR: {:#}", err);
            ExitCode::from(EXIT_INPUT_ERROR)
        }
    }
}

fn init_logging(verbose: u8) {
    let default_filter = match verbose {
        0 => "form_fill=warn,pdf_core=warn",
        1 => "form_fill=info,pdf_core=info",
        _ => "form_fill=debug,pdf_core=debug,fill_pdf_template=debug",
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn run(cli: &Cli) -> Result<ExitCode> {
    if !cli.template.exists() {
        println!("ERROR: Template file not found: {}", cli.template.display());
        return Ok(ExitCode::from(EXIT_INPUT_ERROR));
    }

    if !cli.data.exists() {
        println!("ERROR: JSON data file not found: {}", cli.data.display());
        return Ok(ExitCode::from(EXIT_INPUT_ERROR));
    }

    let json = std::fs::read_to_string(&cli.data)
        .with_context(|| format!("Failed to read JSON data file: {}", cli.data.display()))?;

    let assignments = match parse_assignments(&json) {
        Ok(assignments) => assignments,
        Err(FillError::InvalidJson(reason)) => {
            debug!(%reason, "rejected JSON data file");
            println!("ERROR: Invalid JSON format in data file.");
            return Ok(ExitCode::from(EXIT_INPUT_ERROR));
        }
        Err(err) => {
            println!("ERROR: {}", err);
            return Ok(ExitCode::from(EXIT_FILL_FAILURE));
        }
    };

    let filler = FormFiller::new(FillOptions {
        need_appearances: cli.need_appearances,
    });

    match filler.fill_to_path(&cli.template, &assignments, &cli.output) {
        Ok(report) => {
            debug!(
                filled = ?report.filled,
                unmatched = ?report.unmatched,
                "fill complete"
            );
            println!("SUCCESS: PDF created at {}", cli.output.display());
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => {
            println!("ERROR: {}", err);
            Ok(ExitCode::from(EXIT_FILL_FAILURE))
        }
    }
}
