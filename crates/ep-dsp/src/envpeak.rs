use ep_core::config::PeakMode;
use ep_core::level::{DbConvention, Emission};
use ep_core::traits::EmissionSink;

use crate::accumulator::{EnvelopeAccumulator, Settings, Step};
use crate::error::DspError;
use crate::host::{ClassRegistry, SignalObject};
use crate::scheduler::EmissionScheduler;

/// Name under which the envelope follower is registered.
pub const CLASS_NAME: &str = "envpeak~";

/// Options fixed at registration time, shared by every instance of the class.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClassOptions {
    /// Peak comparison.
    pub peak_mode: PeakMode,
    /// Energy → dB conversion applied on emission.
    pub db_convention: DbConvention,
}

/// Envelope follower object: accumulator, emission clock and outlet conversion.
///
/// Port 1 receives the window energy in dB, port 2 the peak sample value.
///
/// # Example
/// ```
/// use ep_core::level::Emission;
/// use ep_dsp::envpeak::EnvPeak;
/// use ep_dsp::host::SignalObject;
///
/// let mut obj = EnvPeak::from_args(&[64.0, 32.0]).unwrap();
/// obj.dsp(32).unwrap();
/// obj.perform(&[1.0; 32]).unwrap();
/// assert!(obj.clock_pending());
///
/// let mut out: Vec<Emission> = Vec::new();
/// obj.tick(&mut out);
/// assert_eq!(out[0].peak, 1.0);
/// ```
#[derive(Debug)]
pub struct EnvPeak {
    accumulator: EnvelopeAccumulator,
    clock: EmissionScheduler,
    db_convention: DbConvention,
}

impl EnvPeak {
    /// Build an instance.
    ///
    /// # Errors
    /// Returns [`DspError::Alloc`] if the window table cannot be allocated.
    pub fn new(settings: Settings, options: ClassOptions) -> Result<Self, DspError> {
        Ok(Self {
            accumulator: EnvelopeAccumulator::new(settings, options.peak_mode)?,
            clock: EmissionScheduler::new(),
            db_convention: options.db_convention,
        })
    }

    /// Build from creation arguments `[npoints, period]` with default options.
    ///
    /// # Errors
    /// Returns [`DspError::Alloc`] if the window table cannot be allocated.
    pub fn from_args(args: &[f32]) -> Result<Self, DspError> {
        Self::new(Settings::from_args(args), ClassOptions::default())
    }

    /// The underlying accumulator.
    #[must_use]
    pub fn accumulator(&self) -> &EnvelopeAccumulator {
        &self.accumulator
    }

    /// The emission clock.
    #[must_use]
    pub fn scheduler(&self) -> &EmissionScheduler {
        &self.clock
    }
}

impl SignalObject for EnvPeak {
    fn class_name(&self) -> &'static str {
        CLASS_NAME
    }

    fn dsp(&mut self, block_size: usize) -> Result<(), DspError> {
        self.accumulator.block_size_changed(block_size)
    }

    fn perform(&mut self, block: &[f32]) -> Result<(), DspError> {
        if let Step::WindowComplete(_) = self.accumulator.process(block)? {
            self.clock.arm();
        }
        Ok(())
    }

    fn clock_pending(&self) -> bool {
        self.clock.is_armed()
    }

    fn tick(&mut self, sink: &mut dyn EmissionSink) {
        if !self.clock.fire() {
            return;
        }
        let published = self.accumulator.published();
        sink.emit(Emission::from_linear(
            published.energy,
            published.peak,
            self.db_convention,
        ));
    }
}

impl Drop for EnvPeak {
    fn drop(&mut self) {
        self.clock.cancel();
        log::debug!(
            "{CLASS_NAME} : {} fenêtres traitées, {} émissions",
            self.accumulator.completed(),
            self.clock.fired_count()
        );
    }
}

/// Register `envpeak~` with default options.
pub fn setup(registry: &mut ClassRegistry) {
    setup_with(registry, ClassOptions::default());
}

/// Register `envpeak~`; every instance gets `options`.
pub fn setup_with(registry: &mut ClassRegistry, options: ClassOptions) {
    registry.register(
        CLASS_NAME,
        Box::new(move |args: &[f32]| {
            let object: Box<dyn SignalObject> =
                Box::new(EnvPeak::new(Settings::from_args(args), options)?);
            Ok(object)
        }),
    );
}
