mod arbiter;
mod cli;
mod config;
mod decision;
mod history;
mod pump;
mod report;
mod simulation;
mod watchdog;
mod zone;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use cli::Cli;
use config::Config;
use report::CsvSink;
use simulation::Simulation;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(cli.default_log_filter())),
        )
        .init();

    // ── Config file + command-line overrides ─────────────────────────
    let mut cfg = config::load(&cli.config)?;
    apply_overrides(&mut cfg, &cli);
    cfg.validate().context("invalid command-line override")?;
    info!(config = %cli.config, "config loaded");

    // ── Simulation ───────────────────────────────────────────────────
    let sink = CsvSink::create(&cfg.simulation.output)?;
    let mut sim = Simulation::from_config(&cfg, sink)?;
    let summary = sim.run().await?;

    println!("{summary}");
    println!("CSV log saved to: {}", cfg.simulation.output.display());

    if let Some(path) = &cli.summary_json {
        let json = serde_json::to_string_pretty(&summary)?;
        std::fs::write(path, json)
            .with_context(|| format!("failed to write summary: {}", path.display()))?;
        info!(path = %path.display(), "summary written");
    }

    Ok(())
}

fn apply_overrides(cfg: &mut Config, cli: &Cli) {
    let sim = &mut cfg.simulation;
    if let Some(d) = &cli.duration {
        sim.duration = d.clone();
    }
    if let Some(step) = cli.step {
        sim.step_secs = step;
    }
    if cli.seed.is_some() {
        sim.seed = cli.seed;
    }
    if cli.realtime {
        sim.realtime = true;
    }
    if let Some(out) = &cli.output {
        sim.output = out.clone();
    }
}
