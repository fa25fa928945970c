//! gatekeeper
//!
//! An HTTP service whose requests are admitted by two guards:
//!
//! ```text
//!     Client ──▶ request id ──▶ trace ──▶ timeout ──▶ rate limit ──▶ body size ──▶ handler
//!                                                        │              │
//!                                                       429            413
//! ```

use std::path::PathBuf;

use clap::Parser;

#[derive(Parser)]
#[command(name = "gatekeeper")]
#[command(about = "HTTP service with rate limiting and body size admission", long_about = None)]
struct Cli {
    /// Path to a TOML config file; watched for changes when given
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    gatekeeper::lifecycle::startup::start(cli.config).await
}
