//! Playbridge CLI - Playback bridge diagnostics
//!
//! Features:
//! - Source format resolution
//! - Telemetry metadata inspection
//! - Scripted session simulation with late listener attachment

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;
mod output;

/// Playbridge CLI - Playback session bridge toolkit
#[derive(Parser)]
#[command(name = "playbridge-cli")]
#[command(author = "Purple Squirrel Media")]
#[command(version)]
#[command(about = "Playback session bridge diagnostics", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Emit logs as JSON
    #[arg(long)]
    log_json: bool,

    /// Output format (text, json)
    #[arg(short, long, default_value = "text")]
    format: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve the media format of a source locator
    Format {
        /// Source URL or path
        locator: String,

        /// Explicit format hint (ss, dash, hls, other)
        #[arg(long)]
        hint: Option<String>,
    },

    /// Resolve telemetry metadata from request headers
    Telemetry {
        /// Source URL or path
        locator: String,

        /// Header as key=value (repeatable)
        #[arg(short = 'H', long = "header")]
        headers: Vec<String>,

        /// JSON object file with headers
        #[arg(long)]
        headers_file: Option<PathBuf>,
    },

    /// Run a scripted session and print every delivered event
    Simulate {
        /// Session request JSON file
        request: PathBuf,

        /// Attach the listener after this many engine notifications
        #[arg(short, long, default_value = "0")]
        attach_after: usize,

        /// Reported media duration in milliseconds
        #[arg(long, default_value = "60000")]
        duration: i64,

        /// Video geometry as WIDTHxHEIGHT[@ROTATION]
        #[arg(long)]
        video: Option<String>,

        /// Fail playback with this engine message instead of completing
        #[arg(long)]
        fail: Option<String>,

        /// Delay between notifications in milliseconds
        #[arg(long, default_value = "10")]
        interval: u64,
    },
}

fn init_tracing(verbose: bool, json: bool) {
    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.verbose, cli.log_json);
    playbridge_core::init();

    match cli.command {
        Commands::Format { locator, hint } => {
            commands::format(&locator, hint.as_deref(), &cli.format)?;
        }
        Commands::Telemetry {
            locator,
            headers,
            headers_file,
        } => {
            commands::telemetry(&locator, &headers, headers_file, &cli.format)?;
        }
        Commands::Simulate {
            request,
            attach_after,
            duration,
            video,
            fail,
            interval,
        } => {
            let options = commands::SimulateOptions {
                attach_after,
                duration_ms: duration,
                video: video.as_deref().map(commands::parse_video).transpose()?,
                fail,
                interval_ms: interval,
            };
            commands::simulate(&request, options).await?;
        }
    }

    Ok(())
}
