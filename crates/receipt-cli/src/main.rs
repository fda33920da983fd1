//! Receipt CLI - Analyze receipt images from the command line
//!
//! Runs the same fusion pipeline as the API server, in-process.

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

use commands::analyze::AnalyzeCommand;
use commands::export_yolo::ExportYoloCommand;

#[derive(Parser)]
#[command(
    name = "receipt",
    version,
    about = "Detect and extract receipt regions and fields",
    after_help = "EXAMPLES:\n  \
                  # Analyze one image and draw the boxes\n  \
                  receipt analyze receipt1.jpg --overlay receipt1_boxes.png\n\n  \
                  # Convert ground truth into YOLO training labels\n  \
                  receipt export-yolo --annotations data/annotations.xml --output-dir data/labels\n\n\
                  Cloud extraction is enabled when AZURE_DI_ENDPOINT and AZURE_DI_KEY are set\n\
                  (a .env file in the working directory is read)."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the fusion pipeline on one image and print the result as JSON
    Analyze(AnalyzeCommand),

    /// Write YOLO label files from the ground-truth XML
    ExportYolo(ExportYoloCommand),
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "debug"
    } else {
        "receipt_fusion=info,receipt_annotation_index=info,warn"
    };
    // Logs go to stderr so stdout stays clean JSON
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match cli.command {
        Commands::Analyze(cmd) => cmd.execute().await,
        Commands::ExportYolo(cmd) => cmd.execute(),
    }
}
