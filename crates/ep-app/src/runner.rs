use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use ep_core::config::EnvpeakConfig;
use ep_core::level::Emission;
use ep_core::traits::FnSink;
use ep_dsp::capture::AudioCapture;
use ep_dsp::envpeak::{self, CLASS_NAME, ClassOptions};
use ep_dsp::error::DspError;
use ep_dsp::host::{BlockFramer, ClassRegistry, DspGraph};

use crate::report::Report;

/// Register the class and build a one-object graph prepared for the configured block size.
///
/// # Errors
/// Returns an error if the object cannot be created or prepared.
pub fn build_graph(config: &EnvpeakConfig) -> Result<DspGraph> {
    let mut registry = ClassRegistry::new();
    envpeak::setup_with(
        &mut registry,
        ClassOptions {
            peak_mode: config.peak_mode,
            db_convention: config.db_convention,
        },
    );

    let mut graph = DspGraph::new();
    graph
        .instantiate(&registry, CLASS_NAME, &config.creation_args())
        .context("Création de envpeak~ impossible")?;
    graph
        .set_block_size(config.block_size)
        .context("Négociation de la taille de bloc impossible")?;
    Ok(graph)
}

/// Streaming driver: frames samples into blocks and runs the deferred pass after each one.
pub struct Analyzer {
    graph: DspGraph,
    framer: BlockFramer,
    sample_rate: u32,
    position: u64,
}

impl Analyzer {
    /// Build the graph for `config` at `sample_rate`.
    ///
    /// # Errors
    /// Returns an error if the graph cannot be built.
    pub fn new(config: &EnvpeakConfig, sample_rate: u32) -> Result<Self> {
        Ok(Self::with_graph(
            build_graph(config)?,
            config.block_size,
            sample_rate,
        ))
    }

    fn with_graph(graph: DspGraph, block_size: usize, sample_rate: u32) -> Self {
        Self {
            graph,
            framer: BlockFramer::new(block_size),
            sample_rate,
            position: 0,
        }
    }

    /// Feed samples; `on_report` receives every emission fired along the way.
    ///
    /// A rejected block does not stop the chunk: every sample is framed and
    /// counted, so stream time keeps advancing.
    ///
    /// # Errors
    /// Returns the first block error, after the whole chunk has been processed.
    pub fn feed(&mut self, samples: &[f32], on_report: &mut dyn FnMut(Report)) -> Result<()> {
        let Self {
            graph,
            framer,
            sample_rate,
            position,
        } = self;
        let mut first_err = None;
        framer.push(samples, |block| {
            if let Err(e) = run_one(graph, block, *sample_rate, position, on_report) {
                first_err.get_or_insert(e);
            }
            Ok::<(), DspError>(())
        })?;
        first_err.map_or(Ok(()), |e| Err(e.into()))
    }

    /// Flush the trailing partial block, zero-padded.
    ///
    /// # Errors
    /// Returns the block error, if any.
    pub fn finish(&mut self, on_report: &mut dyn FnMut(Report)) -> Result<()> {
        let Self {
            graph,
            framer,
            sample_rate,
            position,
        } = self;
        framer.finish(|block| run_one(graph, block, *sample_rate, position, on_report))?;
        Ok(())
    }

    /// Samples processed so far.
    #[must_use]
    pub fn position(&self) -> u64 {
        self.position
    }
}

fn run_one(
    graph: &mut DspGraph,
    block: &[f32],
    sample_rate: u32,
    position: &mut u64,
    on_report: &mut dyn FnMut(Report),
) -> Result<(), DspError> {
    *position += block.len() as u64;
    let result = graph.run_block(block);
    let pos = *position;
    graph.run_deferred(&mut FnSink(|e: Emission| {
        on_report(Report::new(pos, sample_rate, e));
    }));
    result
}

/// Analyse an in-memory signal. Returns the reports in emission order.
///
/// # Errors
/// Returns an error if the graph cannot be built or a block is rejected.
pub fn analyze_samples(samples: &[f32], sample_rate: u32, config: &EnvpeakConfig) -> Result<Vec<Report>> {
    let mut analyzer = Analyzer::new(config, sample_rate)?;
    let mut reports = Vec::new();
    let mut push = |r: Report| reports.push(r);
    analyzer.feed(samples, &mut push)?;
    analyzer.finish(&mut push)?;
    Ok(reports)
}

/// Decode a file and write one line per emission to `out`.
///
/// # Errors
/// Returns an error if decoding, analysis or writing fails.
pub fn run_file(path: &Path, config: &EnvpeakConfig, out: &mut dyn Write) -> Result<()> {
    let audio = ep_dsp::decode::decode_file(path)?;
    if audio.samples.is_empty() {
        anyhow::bail!("Audio file is empty: {}", path.display());
    }

    let reports = analyze_samples(&audio.samples, audio.sample_rate, config)?;
    for report in &reports {
        writeln!(out, "{}", report.render(config.format)?)?;
    }
    log::info!(
        "{} émissions sur {:.2}s ({})",
        reports.len(),
        audio.duration_secs(),
        path.display()
    );
    Ok(())
}

/// Send a report to the output thread. Returns `false` once the receiver is gone.
fn forward(tx: &flume::Sender<Report>, report: Report) -> bool {
    match tx.send(report) {
        Ok(()) => true,
        Err(e) => {
            log::debug!("Rapport non transmis : {e}");
            false
        }
    }
}

/// Capture live input until Ctrl-C or `duration` seconds, writing one line per emission.
///
/// # Errors
/// Returns an error if capture cannot start, the analysis thread fails, or writing fails.
pub fn run_live(
    config: &EnvpeakConfig,
    device: Option<&str>,
    duration: Option<f64>,
    out: &mut dyn Write,
) -> Result<()> {
    let stop = Arc::new(AtomicBool::new(false));
    let stop_handler = Arc::clone(&stop);
    ctrlc::set_handler(move || stop_handler.store(true, Ordering::Relaxed))
        .context("Impossible d'installer le handler Ctrl-C")?;

    // cpal::Stream n'est pas Send : la capture vit dans le thread d'analyse.
    let format = config.format;
    let config = config.clone();
    let device = device.map(str::to_string);
    let (tx, rx) = flume::unbounded::<Report>();
    let handle = thread::Builder::new()
        .name("ep-analysis".to_string())
        .spawn(move || -> Result<()> {
            let mut capture = AudioCapture::start(device.as_deref())?;
            let sample_rate = capture.sample_rate();
            let limit = duration.map(|secs| (secs.max(0.0) * f64::from(sample_rate)) as u64);
            let mut analyzer = Analyzer::new(&config, sample_rate)?;

            let mut buf = vec![0.0f32; 4096];
            let mut send = |r: Report| {
                forward(&tx, r);
            };
            while !stop.load(Ordering::Relaxed) {
                if tx.is_disconnected() {
                    log::debug!("Plus de consommateur, arrêt de l'analyse");
                    break;
                }
                if limit.is_some_and(|l| analyzer.position() >= l) {
                    break;
                }
                let n = capture.read_into(&mut buf);
                if n == 0 {
                    thread::sleep(Duration::from_millis(2));
                    continue;
                }
                if let Err(e) = analyzer.feed(&buf[..n], &mut send) {
                    log::warn!("Bloc ignoré : {e}");
                }
            }
            if let Err(e) = capture.pause() {
                log::debug!("Pause du flux impossible : {e}");
            }
            if capture.overruns() > 0 {
                log::warn!("{} samples perdus (ring plein)", capture.overruns());
            }
            Ok(())
        })?;

    for report in rx.iter() {
        writeln!(out, "{}", report.render(format)?)?;
        out.flush()?;
    }

    handle
        .join()
        .map_err(|_| anyhow::anyhow!("Le thread d'analyse a paniqué"))?
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reports_are_stamped_at_block_end() {
        let config = EnvpeakConfig {
            npoints: 1024,
            period: 512,
            block_size: 64,
            ..EnvpeakConfig::default()
        };
        let samples = vec![0.5f32; 48_000];
        let reports = analyze_samples(&samples, 48_000, &config).expect("analyze");

        // First block completes immediately, then one emission per 512 samples.
        assert_eq!(reports.len(), 1 + (48_000 - 64) / 512);
        assert!((reports[0].time - 64.0 / 48_000.0).abs() < 1e-12);
        assert!((reports[1].time - 576.0 / 48_000.0).abs() < 1e-12);
        // Steady 0.5 → 0.25 power → about -6.02 dB.
        let last = reports.last().expect("reports").emission;
        assert!((last.energy_db + 6.0206).abs() < 1e-2);
        assert_eq!(last.peak, 0.5);
    }

    #[test]
    fn trailing_partial_block_is_flushed() {
        let config = EnvpeakConfig {
            npoints: 16,
            period: 8,
            block_size: 8,
            ..EnvpeakConfig::default()
        };
        // 20 samples: two full blocks and a padded third.
        let reports = analyze_samples(&[0.1; 20], 8_000, &config).expect("analyze");
        assert_eq!(reports.len(), 3);
        assert!((reports[2].time - 24.0 / 8_000.0).abs() < 1e-12);
    }

    #[test]
    fn chunked_feed_matches_one_shot() {
        let config = EnvpeakConfig::default();
        let samples: Vec<f32> = (0..10_000).map(|i| ((i as f32) * 0.01).sin()).collect();
        let whole = analyze_samples(&samples, 44_100, &config).expect("analyze");

        let mut analyzer = Analyzer::new(&config, 44_100).expect("analyzer");
        let mut chunked = Vec::new();
        let mut push = |r: Report| chunked.push(r);
        for chunk in samples.chunks(333) {
            analyzer.feed(chunk, &mut push).expect("feed");
        }
        analyzer.finish(&mut push).expect("finish");
        assert_eq!(whole, chunked);
    }

    #[test]
    fn rejected_blocks_still_advance_stream_time() {
        let config = EnvpeakConfig {
            npoints: 256,
            period: 128,
            block_size: 64,
            ..EnvpeakConfig::default()
        };
        // Graph negotiated for 64, framer cutting 32: every block is rejected.
        let graph = build_graph(&config).expect("graph");
        let mut analyzer = Analyzer::with_graph(graph, 32, 8_000);
        let mut reports = Vec::new();
        let mut push = |r: Report| reports.push(r);

        let err = analyzer.feed(&[0.5; 100], &mut push).expect_err("size mismatch");
        assert!(format!("{err}").contains("64"));
        // Three full blocks framed and counted, not just the first one.
        assert_eq!(analyzer.position(), 96);
        analyzer.finish(&mut push).expect_err("padded block is rejected too");
        assert_eq!(analyzer.position(), 128);
        assert!(reports.is_empty());
    }

    #[test]
    fn forward_reports_closed_receiver() {
        let (tx, rx) = flume::unbounded::<Report>();
        let report = Report::new(64, 48_000, Emission::default());
        assert!(forward(&tx, report));
        assert_eq!(rx.try_recv().ok(), Some(report));

        drop(rx);
        assert!(!forward(&tx, report));
        assert!(tx.is_disconnected());
    }

    #[test]
    fn missing_file_is_reported() {
        let mut out = Vec::new();
        let err = run_file(Path::new("/nonexistent.wav"), &EnvpeakConfig::default(), &mut out)
            .expect_err("must fail");
        assert!(format!("{err:#}").contains("/nonexistent.wav"));
        assert!(out.is_empty());
    }
}
