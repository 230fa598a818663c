use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Crawl course sections and instructors from the LORIS registration portal.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Log output format
    #[arg(long, value_enum, default_value_t = default_tracing_format(), global = true)]
    pub tracing: TracingFormat,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Crawl one or more terms and write the results to the output store
    Crawl {
        /// Term codes to crawl, e.g. 202309
        #[arg(long = "term", required = true, num_args = 1..)]
        terms: Vec<String>,

        /// Output file; overrides `output_path` from the config
        #[arg(long)]
        output: Option<PathBuf>,

        /// Raw `Cookie` header of an authenticated session; overrides `cookies` from the config
        #[arg(long)]
        cookies: Option<String>,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum TracingFormat {
    /// Compact, colored single-line output
    Pretty,
    /// One JSON object per line
    Json,
}

/// Pretty in debug builds, JSON in release builds.
fn default_tracing_format() -> TracingFormat {
    if cfg!(debug_assertions) {
        TracingFormat::Pretty
    } else {
        TracingFormat::Json
    }
}
