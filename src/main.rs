// SPDX-License-Identifier: GPL-3.0-only

use clap::{Parser, Subcommand};
use webcam::i18n;

mod cli;

#[derive(Parser)]
#[command(name = "webcam")]
#[command(about = "Preview, photograph and record from your webcam")]
#[command(version = env!("GIT_VERSION"))]
#[command(subcommand_required = false)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the live preview (default)
    Preview {
        /// Camera index to use (from 'webcam list')
        #[arg(short, long)]
        device: Option<usize>,
    },

    /// List available cameras
    List,

    /// Take a photo into the configured photo directory
    Photo {
        /// Camera index to use (from 'webcam list')
        #[arg(short, long)]
        device: Option<usize>,

        /// Open the photo once it is saved
        #[arg(long)]
        open: bool,
    },

    /// Record a video into the configured video directory
    Record {
        /// Camera index to use (from 'webcam list')
        #[arg(short, long)]
        device: Option<usize>,

        /// Recording duration in seconds
        #[arg(short, long, default_value = "10")]
        seconds: u64,
    },

    /// Move files to the trash
    Trash {
        /// Paths or file:// URLs
        #[arg(required = true)]
        urls: Vec<String>,
    },

    /// Reset a camera's controls and filters to their defaults
    Reset {
        /// Camera index to use (from 'webcam list')
        #[arg(short, long)]
        device: Option<usize>,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    // Set RUST_LOG environment variable to control log level
    // Examples: RUST_LOG=debug, RUST_LOG=webcam=debug, RUST_LOG=info
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(true)
        .with_level(true)
        .init();

    // Get the system's preferred languages.
    let requested_languages = i18n_embed::DesktopLanguageRequester::requested_languages();
    i18n::init(&requested_languages);

    let cli = Cli::parse();

    match cli.command {
        None => cli::run_preview(None),
        Some(Commands::Preview { device }) => cli::run_preview(device),
        Some(Commands::List) => cli::list_cameras(),
        Some(Commands::Photo { device, open }) => cli::take_photo(device, open),
        Some(Commands::Record { device, seconds }) => cli::record_video(device, seconds),
        Some(Commands::Trash { urls }) => cli::trash_files(&urls),
        Some(Commands::Reset { device }) => cli::reset_device(device),
    }
}
