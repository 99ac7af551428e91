use std::path::Path;
use std::str::FromStr;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::level::DbConvention;

/// Default analysis window length in samples.
pub const DEFAULT_NPOINTS: usize = 1024;
/// Default host block size in samples.
pub const DEFAULT_BLOCK_SIZE: usize = 64;
/// Largest accepted analysis window.
pub const MAX_NPOINTS: usize = 1 << 22;
/// Largest accepted host block size.
pub const MAX_BLOCK_SIZE: usize = 1 << 16;

/// Configuration complète de l'analyse et de la sortie.
///
/// Sérialisable en TOML. Chaque champ a une valeur par défaut saine.
///
/// # Example
/// ```
/// use ep_core::config::EnvpeakConfig;
/// let config = EnvpeakConfig::default();
/// assert_eq!(config.npoints, 1024);
/// assert_eq!(config.period, 0);
/// ```
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct EnvpeakConfig {
    // === Analyse ===
    /// Taille de la fenêtre d'analyse en samples.
    pub npoints: usize,
    /// Hop demandé en samples. 0 = npoints / 2.
    pub period: usize,
    /// Taille de bloc hôte en samples.
    pub block_size: usize,
    /// Comparaison utilisée pour le suivi du pic.
    pub peak_mode: PeakMode,

    // === Sortie ===
    /// Convention de conversion énergie → dB.
    pub db_convention: DbConvention,
    /// Format des lignes émises.
    pub format: OutputFormat,
}

/// How the running peak compares samples.
///
/// # Example
/// ```
/// use ep_core::config::PeakMode;
/// assert!(matches!(PeakMode::default(), PeakMode::Signed));
/// assert_eq!(PeakMode::Signed.level(-0.8), -0.8);
/// assert_eq!(PeakMode::Magnitude.level(-0.8), 0.8);
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub enum PeakMode {
    /// Raw signed value: negative excursions never raise the peak.
    #[default]
    Signed,
    /// Absolute value.
    Magnitude,
}

impl PeakMode {
    /// Value of `sample` as seen by the peak tracker.
    #[inline(always)]
    #[must_use]
    pub fn level(self, sample: f32) -> f32 {
        match self {
            Self::Signed => sample,
            Self::Magnitude => sample.abs(),
        }
    }
}

impl FromStr for PeakMode {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "signed" | "raw" => Ok(Self::Signed),
            "magnitude" | "abs" => Ok(Self::Magnitude),
            _ => Err(CoreError::UnknownValue {
                option: "peak_mode",
                value: s.to_string(),
            }),
        }
    }
}

/// Output line format.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub enum OutputFormat {
    /// Human-readable `t=… energy=… peak=…` lines.
    #[default]
    Text,
    /// One JSON object per line.
    Json,
}

impl FromStr for OutputFormat {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" | "jsonl" => Ok(Self::Json),
            _ => Err(CoreError::UnknownValue {
                option: "format",
                value: s.to_string(),
            }),
        }
    }
}

impl Default for EnvpeakConfig {
    fn default() -> Self {
        Self {
            npoints: DEFAULT_NPOINTS,
            period: 0,
            block_size: DEFAULT_BLOCK_SIZE,
            peak_mode: PeakMode::Signed,
            db_convention: DbConvention::FullScale,
            format: OutputFormat::Text,
        }
    }
}

impl EnvpeakConfig {
    /// Clamp all numeric fields to their valid ranges.
    /// Called after TOML deserialization to prevent out-of-range values.
    pub fn clamp_all(&mut self) {
        let before = (self.npoints, self.period, self.block_size);
        self.npoints = self.npoints.clamp(1, MAX_NPOINTS);
        self.block_size = self.block_size.clamp(1, MAX_BLOCK_SIZE);
        self.period = self.period.min(MAX_NPOINTS);
        if before != (self.npoints, self.period, self.block_size) {
            log::warn!(
                "Config hors bornes corrigée : npoints {}, period {}, block_size {}",
                self.npoints,
                self.period,
                self.block_size
            );
        }
    }

    /// Creation arguments handed to the `envpeak~` class, in host order.
    ///
    /// # Example
    /// ```
    /// use ep_core::config::EnvpeakConfig;
    /// let args = EnvpeakConfig::default().creation_args();
    /// assert_eq!(args, [1024.0, 0.0]);
    /// ```
    #[must_use]
    pub fn creation_args(&self) -> [f32; 2] {
        [self.npoints as f32, self.period as f32]
    }
}

/// Structure TOML intermédiaire pour désérialisation avec valeurs optionnelles.
#[derive(Deserialize)]
struct ConfigFile {
    analysis: Option<AnalysisSection>,
    output: Option<OutputSection>,
}

/// Analysis section of the TOML config, all fields optional for partial override.
#[derive(Deserialize)]
struct AnalysisSection {
    npoints: Option<usize>,
    period: Option<usize>,
    block_size: Option<usize>,
    peak_mode: Option<PeakMode>,
}

/// Output section of the TOML config, all fields optional.
#[derive(Deserialize)]
struct OutputSection {
    db_convention: Option<DbConvention>,
    format: Option<OutputFormat>,
}

/// Charge un fichier TOML et fusionne avec les valeurs par défaut.
///
/// # Errors
/// Returns an error if the file cannot be read or parsed.
///
/// # Example
/// ```no_run
/// use ep_core::config::load_config;
/// use std::path::Path;
/// let config = load_config(Path::new("config/default.toml")).unwrap();
/// ```
pub fn load_config(path: &Path) -> Result<EnvpeakConfig> {
    if !path.exists() {
        return Err(CoreError::FileNotFound {
            path: path.display().to_string(),
        }
        .into());
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Impossible de lire {}", path.display()))?;
    parse_config(&content).with_context(|| format!("Erreur de parsing TOML dans {}", path.display()))
}

/// Parse TOML text and merge it onto the defaults.
///
/// # Errors
/// Returns an error if the text is not valid TOML for this schema.
///
/// # Example
/// ```
/// use ep_core::config::{parse_config, PeakMode};
/// let config = parse_config("[analysis]\npeak_mode = \"Magnitude\"\n").unwrap();
/// assert_eq!(config.peak_mode, PeakMode::Magnitude);
/// assert_eq!(config.npoints, 1024);
/// ```
pub fn parse_config(content: &str) -> Result<EnvpeakConfig> {
    let file: ConfigFile =
        toml::from_str(content).map_err(|e| CoreError::Config(e.message().to_string()))?;

    let mut config = EnvpeakConfig::default();

    if let Some(a) = file.analysis {
        if let Some(v) = a.npoints {
            config.npoints = v;
        }
        if let Some(v) = a.period {
            config.period = v;
        }
        if let Some(v) = a.block_size {
            config.block_size = v;
        }
        if let Some(v) = a.peak_mode {
            config.peak_mode = v;
        }
    }

    if let Some(o) = file.output {
        if let Some(v) = o.db_convention {
            config.db_convention = v;
        }
        if let Some(v) = o.format {
            config.format = v;
        }
    }

    config.clamp_all();
    Ok(config)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn empty_file_yields_defaults() {
        let config = parse_config("").expect("empty TOML is valid");
        assert_eq!(config, EnvpeakConfig::default());
    }

    #[test]
    fn partial_sections_override_defaults() {
        let config = parse_config(
            "[analysis]\nnpoints = 2048\nperiod = 256\n\n[output]\ndb_convention = \"Offset100\"\nformat = \"Json\"\n",
        )
        .expect("valid config");
        assert_eq!(config.npoints, 2048);
        assert_eq!(config.period, 256);
        assert_eq!(config.block_size, DEFAULT_BLOCK_SIZE);
        assert_eq!(config.db_convention, DbConvention::Offset100);
        assert_eq!(config.format, OutputFormat::Json);
    }

    #[test]
    fn out_of_range_values_are_clamped() {
        let config = parse_config("[analysis]\nnpoints = 0\nblock_size = 0\n").expect("valid config");
        assert_eq!(config.npoints, 1);
        assert_eq!(config.block_size, 1);
    }

    #[test]
    fn unknown_enum_variant_is_rejected() {
        assert!(parse_config("[analysis]\npeak_mode = \"Loudest\"\n").is_err());
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(file, "[analysis]\nblock_size = 128").expect("write config");
        let config = load_config(file.path()).expect("load config");
        assert_eq!(config.block_size, 128);
    }

    #[test]
    fn missing_file_reports_path() {
        let err = load_config(Path::new("/nonexistent/envpeak.toml")).expect_err("must fail");
        assert!(format!("{err:#}").contains("/nonexistent/envpeak.toml"));
    }

    #[test]
    fn option_parsing() {
        assert_eq!("abs".parse::<PeakMode>().ok(), Some(PeakMode::Magnitude));
        assert_eq!("jsonl".parse::<OutputFormat>().ok(), Some(OutputFormat::Json));
        assert!("xml".parse::<OutputFormat>().is_err());
    }
}
