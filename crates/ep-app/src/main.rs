use std::path::Path;

use anyhow::Result;
use clap::Parser;
use ep_core::config::EnvpeakConfig;

pub mod cli;
pub mod report;
pub mod runner;

fn main() -> Result<()> {
    // 1. Parser CLI
    let cli = cli::Cli::parse();

    // 2. Initialiser le logging
    env_logger::Builder::new()
        .filter_level(cli.log_level.parse().unwrap_or(log::LevelFilter::Warn))
        .init();

    // 3. Charger la config puis appliquer les overrides CLI
    let mut config = resolve_config(&cli.config)?;
    cli.apply_overrides(&mut config);
    log::info!(
        "Analyse : fenêtre {} / hop {} / bloc {} ({:?}, {:?})",
        config.npoints,
        config.period,
        config.block_size,
        config.peak_mode,
        config.db_convention
    );

    // 4. Lancer la source
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    match cli.source() {
        cli::Source::File(path) => runner::run_file(&path, &config, &mut out),
        cli::Source::Mic { device } => {
            runner::run_live(&config, device.as_deref(), cli.duration, &mut out)
        }
    }
}

/// Load the config file, or fall back to the defaults if it does not exist.
fn resolve_config(path: &Path) -> Result<EnvpeakConfig> {
    if path.exists() {
        ep_core::config::load_config(path)
    } else {
        log::warn!(
            "Config introuvable : {}. Utilisation des défauts.",
            path.display()
        );
        Ok(EnvpeakConfig::default())
    }
}
