//! Command-line tool that extracts the embedded images of PDF documents.
//!
//! Every PDF found under the given paths (default: the current directory) has
//! its images written as PNG files into a directory named after the document.

use clap::Parser;
use eximgpdf::{extract_images, ExtractorConfig, Result};
use std::path::PathBuf;
use std::process;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "eximgpdf",
    about = "Extract the embedded images of PDF documents as PNG files",
    version,
    author
)]
struct Cli {
    /// Files or directories to search for PDF documents [default: current directory]
    paths: Vec<PathBuf>,

    /// Log more detail (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, conflicts_with = "quiet")]
    verbose: u8,

    /// Only log warnings and errors
    #[arg(short, long)]
    quiet: bool,

    /// Fail instead of skipping images with an unsupported encoding
    #[arg(long)]
    strict: bool,
}

impl Cli {
    fn default_filter(&self) -> &'static str {
        match (self.quiet, self.verbose) {
            (true, _) => "warn",
            (false, 0) => "info",
            (false, 1) => "debug",
            (false, _) => "trace",
        }
    }
}

fn main() {
    let cli = Cli::parse();

    // RUST_LOG takes precedence over the command-line verbosity.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cli.default_filter())),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(cli) {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = ExtractorConfig {
        strict_decoding: cli.strict,
        ..Default::default()
    };

    let summary = extract_images(&cli.paths, &config)?;

    info!(
        documents = summary.documents,
        pages = summary.pages,
        written = summary.images_written,
        duplicates = summary.duplicates,
        unsupported = summary.unsupported,
        "done"
    );
    Ok(())
}
