use std::path::PathBuf;

use clap::Parser;
use ep_core::config::{EnvpeakConfig, OutputFormat, PeakMode};
use ep_core::level::DbConvention;

/// envpeak — windowed energy and peak envelope follower.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Source audio : "mic" pour l'entrée par défaut, ou chemin vers un fichier audio.
    #[arg(long, default_value = "mic")]
    pub audio: String,

    /// Nom du périphérique d'entrée (avec --audio mic).
    #[arg(long)]
    pub device: Option<String>,

    /// Fichier de configuration TOML. Défaut : config/default.toml.
    #[arg(short, long, default_value = "config/default.toml")]
    pub config: PathBuf,

    /// Taille de la fenêtre d'analyse en samples.
    #[arg(long)]
    pub npoints: Option<usize>,

    /// Hop entre deux émissions en samples (0 = npoints / 2).
    #[arg(long)]
    pub period: Option<usize>,

    /// Taille de bloc DSP en samples.
    #[arg(long)]
    pub block_size: Option<usize>,

    /// Suivi du pic : signed, magnitude.
    #[arg(long)]
    pub peak_mode: Option<PeakMode>,

    /// Convention dB : dbfs, offset100.
    #[arg(long)]
    pub db: Option<DbConvention>,

    /// Format de sortie : text, json.
    #[arg(long)]
    pub format: Option<OutputFormat>,

    /// Arrêter la capture live après N secondes.
    #[arg(long)]
    pub duration: Option<f64>,

    /// Niveau de log : error, warn, info, debug, trace.
    #[arg(long, default_value = "warn")]
    pub log_level: String,
}

/// Where the samples come from.
#[derive(Debug, Clone, PartialEq)]
pub enum Source {
    /// Live capture.
    Mic {
        /// Device name, default device if `None`.
        device: Option<String>,
    },
    /// Decoded file.
    File(PathBuf),
}

impl Cli {
    /// Resolve `--audio` / `--device` into a [`Source`].
    #[must_use]
    pub fn source(&self) -> Source {
        if self.audio.eq_ignore_ascii_case("mic") {
            Source::Mic {
                device: self.device.clone(),
            }
        } else {
            Source::File(PathBuf::from(&self.audio))
        }
    }

    /// Apply the command-line overrides on top of a loaded config.
    pub fn apply_overrides(&self, config: &mut EnvpeakConfig) {
        if let Some(v) = self.npoints {
            config.npoints = v;
        }
        if let Some(v) = self.period {
            config.period = v;
        }
        if let Some(v) = self.block_size {
            config.block_size = v;
        }
        if let Some(v) = self.peak_mode {
            config.peak_mode = v;
        }
        if let Some(v) = self.db {
            config.db_convention = v;
        }
        if let Some(v) = self.format {
            config.format = v;
        }
        config.clamp_all();
    }
}
