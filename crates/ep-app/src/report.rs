use anyhow::Result;
use ep_core::config::OutputFormat;
use ep_core::level::Emission;
use serde::Serialize;

/// One emission stamped with the stream time of the block that completed it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Report {
    /// Seconds since the start of the stream.
    pub time: f64,
    /// Outlet values.
    #[serde(flatten)]
    pub emission: Emission,
}

impl Report {
    /// Stamp `emission` at `sample_pos` samples into a stream at `sample_rate`.
    #[must_use]
    pub fn new(sample_pos: u64, sample_rate: u32, emission: Emission) -> Self {
        let time = if sample_rate == 0 {
            0.0
        } else {
            sample_pos as f64 / f64::from(sample_rate)
        };
        Self { time, emission }
    }

    /// Render as one output line (no trailing newline).
    ///
    /// # Errors
    /// Returns an error if JSON serialization fails.
    pub fn render(&self, format: OutputFormat) -> Result<String> {
        Ok(match format {
            OutputFormat::Text => format!(
                "t={:.3}s energy={:.2} dB peak={:.4}",
                self.time, self.emission.energy_db, self.emission.peak
            ),
            OutputFormat::Json => serde_json::to_string(self)?,
        })
    }
}
