use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "irrigation-controller",
    version,
    about = "Closed-loop irrigation controller simulator"
)]
pub struct Cli {
    /// Path to config.toml
    #[arg(short, long, env = "CONFIG_PATH", default_value = "config.toml")]
    pub config: String,

    /// Simulated duration, e.g. 3600, 90m, 6h, 2d (overrides the file)
    #[arg(short, long)]
    pub duration: Option<String>,

    /// Simulated seconds per tick (overrides the file)
    #[arg(short, long)]
    pub step: Option<u32>,

    /// Seed for a reproducible run
    #[arg(long)]
    pub seed: Option<u64>,

    /// Pace ticks at one per wall-clock second
    #[arg(long)]
    pub realtime: bool,

    /// Write the CSV log here instead of the configured path
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Also write the end-of-run summary as JSON
    #[arg(long)]
    pub summary_json: Option<PathBuf>,

    /// Increase log verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    /// Filter used when `RUST_LOG` is unset.
    pub fn default_log_filter(&self) -> &'static str {
        match self.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }
}
