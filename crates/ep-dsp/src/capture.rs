use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::{Context, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use rtrb::{Consumer, RingBuffer};

/// Seconds of audio the capture ring can hold before samples are dropped.
pub const RING_SECONDS: usize = 2;

/// Live mono input via cpal.
///
/// The cpal callback downmixes to mono and pushes into a lock-free ring
/// buffer; the analysis thread drains it with [`AudioCapture::read_into`].
/// Samples that don't fit are counted, never waited for.
///
/// # Example
/// ```no_run
/// use ep_dsp::capture::AudioCapture;
/// let mut capture = AudioCapture::start(None).unwrap();
/// let mut buf = vec![0.0f32; 512];
/// let n = capture.read_into(&mut buf);
/// ```
pub struct AudioCapture {
    stream: cpal::Stream,
    consumer: Consumer<f32>,
    sample_rate: u32,
    overruns: Arc<AtomicUsize>,
}

impl AudioCapture {
    /// Start capturing from the named input device, or the default one.
    ///
    /// # Errors
    /// Returns an error if no matching device exists or the stream cannot start.
    pub fn start(device_name: Option<&str>) -> Result<Self> {
        let host = cpal::default_host();
        let device = match device_name {
            Some(name) => host
                .input_devices()?
                .find(|d| d.name().is_ok_and(|n| n == name))
                .with_context(|| format!("Périphérique d'entrée introuvable : {name}"))?,
            None => host
                .default_input_device()
                .context("Pas de périphérique audio d'entrée trouvé")?,
        };

        let config = device.default_input_config()?;
        let sample_rate = config.sample_rate().0;
        let channels = usize::from(config.channels().max(1));

        let (mut producer, consumer) = RingBuffer::new(sample_rate as usize * RING_SECONDS);
        let overruns = Arc::new(AtomicUsize::new(0));
        let overruns_cb = Arc::clone(&overruns);

        let stream = device.build_input_stream(
            &config.into(),
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                for frame in data.chunks(channels) {
                    let mono = frame.iter().sum::<f32>() / frame.len() as f32;
                    if producer.push(mono).is_err() {
                        overruns_cb.fetch_add(1, Ordering::Relaxed);
                    }
                }
            },
            |err| {
                log::error!("Audio stream error: {err}");
            },
            None,
        )?;

        stream.play()?;
        log::info!(
            "Capture démarrée @ {sample_rate}Hz, {channels} canal(aux) sur {}",
            device.name().unwrap_or_else(|_| "?".into())
        );

        Ok(Self {
            stream,
            consumer,
            sample_rate,
            overruns,
        })
    }

    /// Copy available samples into `out`; returns how many were written.
    pub fn read_into(&mut self, out: &mut [f32]) -> usize {
        let n = self.consumer.slots().min(out.len());
        if n == 0 {
            return 0;
        }
        let Ok(chunk) = self.consumer.read_chunk(n) else {
            return 0;
        };
        let (first, second) = chunk.as_slices();
        out[..first.len()].copy_from_slice(first);
        out[first.len()..n].copy_from_slice(second);
        chunk.commit_all();
        n
    }

    /// The sample rate of the capture stream.
    #[must_use]
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Samples dropped because the ring was full.
    #[must_use]
    pub fn overruns(&self) -> usize {
        self.overruns.load(Ordering::Relaxed)
    }

    /// Pause the underlying stream.
    ///
    /// # Errors
    /// Returns an error if the backend refuses.
    pub fn pause(&self) -> Result<()> {
        self.stream.pause()?;
        Ok(())
    }
}
