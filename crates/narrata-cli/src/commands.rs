//! Command-line definitions.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Novel narrator — reads chapters aloud with neural voices.
#[derive(Debug, Parser)]
#[command(name = "narrata", version, about)]
pub struct Cli {
    /// Novel directory (holds `metadata.json` and `chapters/`).
    #[arg(long, global = true, default_value = "novel", env = "NARRATA_NOVEL_DIR")]
    pub novel_dir: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Narrate chapters aloud with interactive controls.
    Play(PlayArgs),

    /// List the chapters available in the novel directory.
    Chapters,

    /// List the narrator voices.
    Voices,
}

#[derive(Debug, Args)]
pub struct PlayArgs {
    /// Chapter to start from (defaults to saved progress).
    pub chapter: Option<u32>,

    /// Paragraph to start from, 1-based.
    #[arg(long)]
    pub paragraph: Option<usize>,

    /// Narrator voice name (see `narrata voices`).
    #[arg(long)]
    pub voice: Option<String>,

    /// Rate offset in percent, e.g. -25 or 50.
    #[arg(long, allow_hyphen_values = true)]
    pub rate: Option<i32>,

    /// Narration volume in percent (0–100).
    #[arg(long)]
    pub volume: Option<u8>,

    /// Resume from saved progress, ignoring positional arguments.
    #[arg(long)]
    pub resume: bool,

    /// Directory of background-music tracks (`calm_*` / `combat_*`).
    #[arg(long)]
    pub music_dir: Option<PathBuf>,

    /// TTS backend command (must accept --voice/--rate/--text/--write-media).
    #[arg(long, default_value = narrata_narration::DEFAULT_SYNTH_COMMAND)]
    pub synth_command: String,
}
