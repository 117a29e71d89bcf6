//! CLI entry point — the composition root.
//!
//! This is the only place where infrastructure is wired together: the
//! filesystem chapter store, the external TTS command, and the rodio audio
//! device all meet here and nowhere else.

use clap::Parser;
use tracing_subscriber::EnvFilter;

mod commands;
mod play;

use commands::{Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Log to stderr so paragraph text on stdout stays readable.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("narrata=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Play(args) => play::run(args, cli.novel_dir).await,
        Commands::Chapters => play::list_chapters(&cli.novel_dir),
        Commands::Voices => {
            play::list_voices();
            Ok(())
        }
    }
}
