use std::path::PathBuf;

use clap::Parser;

/// Audio/emotion-reactive conversation blobs in your terminal.
#[derive(Parser, Debug)]
#[command(name = "blobtalk", version, about)]
pub(crate) struct Cli {
    /// Path to a JSON visual config (missing/malformed falls back to defaults).
    #[arg(long)]
    pub(crate) config: Option<PathBuf>,

    /// Path to a JSON demo script (list of segments).
    #[arg(long)]
    pub(crate) script: Option<PathBuf>,

    /// Simulation seed.
    #[arg(long, default_value_t = 7)]
    pub(crate) seed: u64,

    /// Frame-rate cap.
    #[arg(long, default_value_t = 60)]
    pub(crate) fps: u32,

    /// Initial layout profile: full, compact or mini.
    #[arg(long)]
    pub(crate) layout: Option<String>,
}
