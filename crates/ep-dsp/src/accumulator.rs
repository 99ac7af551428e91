use ep_core::config::{DEFAULT_NPOINTS, MAX_NPOINTS, PeakMode};

use crate::error::DspError;
use crate::window::WindowTable;

/// Maximum number of analysis windows in flight at once.
pub const MAX_OVERLAP: usize = 32;

/// Window length and hop, validated and defaulted.
///
/// # Example
/// ```
/// use ep_dsp::accumulator::Settings;
/// let s = Settings::new(0, 0);
/// assert_eq!((s.npoints(), s.period()), (1024, 512));
/// // Hop raised so that 32 windows can span npoints.
/// assert_eq!(Settings::new(1024, 4).period(), 33);
/// // Absurd hops are capped.
/// assert_eq!(Settings::new(1024, usize::MAX).period(), 1 << 22);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settings {
    npoints: usize,
    period: usize,
}

impl Settings {
    /// Validate a window length and hop. Zero selects the default.
    ///
    /// The hop is capped at [`MAX_NPOINTS`], then raised to the overlap floor.
    #[must_use]
    pub fn new(npoints: usize, period: usize) -> Self {
        let npoints = if npoints < 1 { DEFAULT_NPOINTS } else { npoints };
        let period = if period < 1 { npoints / 2 } else { period };
        let period = period.min(MAX_NPOINTS).max(npoints / MAX_OVERLAP + 1);
        Self { npoints, period }
    }

    /// Build from host creation arguments `[npoints, period]`, both optional.
    ///
    /// Negative, NaN and missing arguments select the defaults.
    #[must_use]
    pub fn from_args(args: &[f32]) -> Self {
        let arg = |i: usize| args.get(i).map_or(0, |&v| v as usize);
        Self::new(arg(0), arg(1))
    }

    /// Window length in samples.
    #[must_use]
    pub fn npoints(&self) -> usize {
        self.npoints
    }

    /// Requested hop in samples.
    #[must_use]
    pub fn period(&self) -> usize {
        self.period
    }

    /// Hop rounded up to a multiple of `block_size`.
    ///
    /// # Errors
    /// [`DspError::InvalidBlockSize`] for a zero block, or if the rounded hop
    /// does not fit the signed phase counter.
    pub fn real_period(&self, block_size: usize) -> Result<usize, DspError> {
        if block_size == 0 {
            return Err(DspError::InvalidBlockSize(block_size));
        }
        self.period
            .div_ceil(block_size)
            .checked_mul(block_size)
            .filter(|&rp| isize::try_from(rp).is_ok())
            .ok_or(DspError::InvalidBlockSize(block_size))
    }
}

/// Energy and peak published together when a window completes.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Published {
    /// Hann-weighted sum of squared samples over the window.
    pub energy: f32,
    /// Peak sample value over the output interval.
    pub peak: f32,
}

/// Outcome of one processed block.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Step {
    /// The next window is still filling.
    Accumulating,
    /// A window completed on this block; its pair has been published.
    WindowComplete(Published),
}

/// Block geometry negotiated with the host.
#[derive(Debug, Clone, Copy)]
struct Prepared {
    block_size: usize,
    real_period: usize,
}

/// Overlap-add energy accumulator with running peak.
///
/// Keeps one partial sum per in-flight window, staggered by the real period.
/// Slot 0 is always the window that completes next.
///
/// # Example
/// ```
/// use ep_core::config::PeakMode;
/// use ep_dsp::accumulator::{EnvelopeAccumulator, Settings, Step};
///
/// let mut acc = EnvelopeAccumulator::new(Settings::new(1024, 512), PeakMode::Signed).unwrap();
/// acc.block_size_changed(64).unwrap();
/// assert_eq!(acc.real_period(), Some(512));
/// // The very first block completes the (partial) first window.
/// let block = [0.5f32; 64];
/// assert!(matches!(acc.process(&block).unwrap(), Step::WindowComplete(_)));
/// ```
#[derive(Debug)]
pub struct EnvelopeAccumulator {
    settings: Settings,
    table: WindowTable,
    /// Partial sums, plus one slot for the terminator written past the last active one.
    bank: [f32; MAX_OVERLAP + 1],
    /// Samples left before slot 0 completes.
    phase: isize,
    peak_accum: f32,
    peak_mode: PeakMode,
    prepared: Option<Prepared>,
    published: Published,
    completed: u64,
}

impl EnvelopeAccumulator {
    /// Allocate the window table and zero the bank.
    ///
    /// # Errors
    /// Returns [`DspError::Alloc`] if the window table cannot be allocated.
    pub fn new(settings: Settings, peak_mode: PeakMode) -> Result<Self, DspError> {
        let table = WindowTable::new(settings.npoints()).inspect_err(|e| {
            log::error!("{e}");
        })?;

        log::info!(
            "envpeak~ : fenêtre {} points, période {}",
            settings.npoints(),
            settings.period()
        );

        Ok(Self {
            settings,
            table,
            bank: [0.0; MAX_OVERLAP + 1],
            phase: 0,
            peak_accum: 0.0,
            peak_mode,
            prepared: None,
            published: Published::default(),
            completed: 0,
        })
    }

    /// Host block-size notification.
    ///
    /// Recomputes the real period and grows the window padding if the block
    /// no longer fits. Repeating the same size never reallocates.
    ///
    /// # Errors
    /// [`DspError::InvalidBlockSize`] for a zero block or one whose real
    /// period overflows (nothing changes then), [`DspError::Alloc`] if
    /// the table cannot grow. After a failed grow the previous allocation is
    /// kept and oversized blocks are dropped by [`Self::process`].
    pub fn block_size_changed(&mut self, block_size: usize) -> Result<(), DspError> {
        let real_period = self.settings.real_period(block_size).inspect_err(|e| {
            log::error!("{e}");
        })?;
        self.prepared = Some(Prepared {
            block_size,
            real_period,
        });

        match self.table.ensure_padding(block_size) {
            Ok(true) => {
                log::info!(
                    "envpeak~ : table agrandie à {} samples (bloc {block_size})",
                    self.table.len()
                );
                Ok(())
            }
            Ok(false) => Ok(()),
            Err(e) => {
                log::error!("envpeak~ : out of memory ({e})");
                Err(e)
            }
        }
    }

    /// Fold one block into the in-flight windows.
    ///
    /// Does not allocate. Returns [`Step::WindowComplete`] with the freshly
    /// published pair when slot 0 completes on this block.
    ///
    /// # Errors
    /// [`DspError::NotPrepared`] before any block-size notification,
    /// [`DspError::BlockSizeMismatch`] if `block.len()` is not the negotiated
    /// size, [`DspError::BlockTooLarge`] if the table padding could not be
    /// grown for it. The block is dropped and no state changes in all cases.
    pub fn process(&mut self, block: &[f32]) -> Result<Step, DspError> {
        let Some(prepared) = self.prepared else {
            return Err(DspError::NotPrepared);
        };
        let n = block.len();
        if n != prepared.block_size {
            return Err(DspError::BlockSizeMismatch {
                expected: prepared.block_size,
                got: n,
            });
        }
        if n > self.table.padding() {
            return Err(DspError::BlockTooLarge {
                block_size: n,
                allocated: self.table.padding(),
            });
        }

        let mode = self.peak_mode;
        self.peak_accum = block
            .iter()
            .map(|&x| mode.level(x))
            .fold(self.peak_accum, f32::max);

        // Newest sample meets table[count], oldest meets table[count + n - 1].
        let npoints = self.settings.npoints();
        let real_period = prepared.real_period;
        let mut count = self.phase.max(0) as usize;
        let mut slot = 0;
        while count < npoints {
            debug_assert!(slot < MAX_OVERLAP);
            let weights = self.table.segment(count, n);
            self.bank[slot] = weights
                .iter()
                .zip(block.iter().rev())
                .fold(self.bank[slot], |sum, (&w, &x)| sum + w * x * x);
            count += real_period;
            slot += 1;
        }
        self.bank[slot] = 0.0;

        self.phase -= n as isize;
        if self.phase >= 0 {
            return Ok(Step::Accumulating);
        }

        self.published = Published {
            energy: self.bank[0],
            peak: self.peak_accum,
        };
        self.peak_accum = 0.0;

        let shifted = (npoints - 1) / real_period;
        self.bank.copy_within(1..=shifted, 0);
        self.bank[shifted] = 0.0;

        self.phase = real_period as isize - n as isize;
        self.completed += 1;
        Ok(Step::WindowComplete(self.published))
    }

    /// Last published pair.
    #[must_use]
    pub fn published(&self) -> Published {
        self.published
    }

    /// Number of windows completed so far.
    #[must_use]
    pub fn completed(&self) -> u64 {
        self.completed
    }

    /// Samples left before the next completion (negative only transiently).
    #[must_use]
    pub fn phase(&self) -> isize {
        self.phase
    }

    /// Real period, once a block size has been negotiated.
    #[must_use]
    pub fn real_period(&self) -> Option<usize> {
        self.prepared.map(|p| p.real_period)
    }

    /// Negotiated block size.
    #[must_use]
    pub fn block_size(&self) -> Option<usize> {
        self.prepared.map(|p| p.block_size)
    }

    /// Validated window length and hop.
    #[must_use]
    pub fn settings(&self) -> Settings {
        self.settings
    }

    /// Peak comparison mode.
    #[must_use]
    pub fn peak_mode(&self) -> PeakMode {
        self.peak_mode
    }

    /// The weighting table.
    #[must_use]
    pub fn table(&self) -> &WindowTable {
        &self.table
    }

    /// Partial sums of the in-flight windows, slot 0 first.
    #[must_use]
    pub fn bank(&self) -> &[f32] {
        &self.bank
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prepared(npoints: usize, period: usize, block: usize) -> EnvelopeAccumulator {
        let mut acc =
            EnvelopeAccumulator::new(Settings::new(npoints, period), PeakMode::Signed).expect("alloc");
        acc.block_size_changed(block).expect("block size");
        acc
    }

    #[test]
    fn settings_defaults_and_floor() {
        assert_eq!(Settings::new(1, 0).period(), 1);
        assert_eq!(Settings::new(64, 1).period(), 3);
        assert_eq!(Settings::new(2048, 0).period(), 1024);
        assert_eq!(Settings::from_args(&[]), Settings::new(1024, 512));
        assert_eq!(Settings::from_args(&[-4.0, f32::NAN]), Settings::new(1024, 512));
        assert_eq!(Settings::from_args(&[256.0, 100.0]), Settings::new(256, 100));
    }

    #[test]
    fn real_period_rounds_up_to_block_multiple() {
        let s = Settings::new(1024, 500);
        assert_eq!(s.real_period(64), Ok(512));
        assert_eq!(s.real_period(100), Ok(500));
        assert_eq!(s.real_period(1000), Ok(1000));
        assert_eq!(s.real_period(0), Err(DspError::InvalidBlockSize(0)));
    }

    #[test]
    fn huge_hop_is_capped() {
        assert_eq!(Settings::from_args(&[1024.0, 1e30]).period(), MAX_NPOINTS);
        assert_eq!(Settings::new(1024, isize::MAX as usize + 10).period(), MAX_NPOINTS);

        let mut acc = EnvelopeAccumulator::new(Settings::from_args(&[1024.0, 1e30]), PeakMode::Signed)
            .expect("alloc");
        acc.block_size_changed(64).expect("block size");
        assert_eq!(acc.real_period(), Some(MAX_NPOINTS));

        let mut completions = 0;
        for _ in 0..10 {
            if let Step::WindowComplete(_) = acc.process(&[0.5; 64]).expect("process") {
                completions += 1;
            }
        }
        // Only the very first block completes; the next window is 2^22 samples away.
        assert_eq!(completions, 1);
        assert_eq!(acc.phase(), (MAX_NPOINTS - 640) as isize);
    }

    #[test]
    fn real_period_beyond_phase_range_is_rejected() {
        let s = Settings::new(1024, 512);
        let huge = isize::MAX as usize + 1;
        assert_eq!(s.real_period(huge), Err(DspError::InvalidBlockSize(huge)));

        let mut acc = prepared(1024, 512, 64);
        assert_eq!(acc.block_size_changed(huge), Err(DspError::InvalidBlockSize(huge)));
        // Previous negotiation survives.
        assert_eq!(acc.block_size(), Some(64));
        assert_eq!(acc.real_period(), Some(512));
    }

    #[test]
    fn process_before_block_size_is_rejected() {
        let mut acc = EnvelopeAccumulator::new(Settings::new(64, 32), PeakMode::Signed).expect("alloc");
        assert_eq!(acc.process(&[0.0; 8]), Err(DspError::NotPrepared));
        assert_eq!(acc.real_period(), None);
    }

    #[test]
    fn zero_block_size_is_rejected() {
        let mut acc = EnvelopeAccumulator::new(Settings::new(64, 32), PeakMode::Signed).expect("alloc");
        assert_eq!(acc.block_size_changed(0), Err(DspError::InvalidBlockSize(0)));
        assert!(acc.block_size().is_none());
    }

    #[test]
    fn mismatched_block_is_dropped() {
        let mut acc = prepared(64, 32, 16);
        let err = acc.process(&[1.0; 8]).expect_err("wrong size");
        assert_eq!(err, DspError::BlockSizeMismatch { expected: 16, got: 8 });
        assert_eq!(acc.phase(), 0);
        assert!(acc.bank().iter().all(|&s| s == 0.0));
    }

    #[test]
    fn larger_block_grows_padding() {
        let mut acc = prepared(64, 32, 16);
        acc.block_size_changed(128).expect("grow");
        assert_eq!(acc.table().padding(), 128);
        assert_eq!(acc.real_period(), Some(128));
        assert!(acc.process(&[0.1; 128]).is_ok());
    }

    #[test]
    fn failed_grow_fails_closed() {
        let mut acc = prepared(64, 32, 16);
        let huge = usize::MAX / 4;
        assert!(matches!(acc.block_size_changed(huge), Err(DspError::Alloc { .. })));
        assert_eq!(acc.table().padding(), 64);
        assert_eq!(acc.block_size(), Some(huge));
        // Oversized blocks can't be built here, but the guard is the padding check.
        let err = acc.process(&[0.0; 16]).expect_err("size mismatch");
        assert!(matches!(err, DspError::BlockSizeMismatch { .. }));
    }

    #[test]
    fn shift_moves_bank_down() {
        // npoints 8, hop 4, block 4: two windows in flight.
        let mut acc = prepared(8, 4, 4);
        let block = [1.0f32, 0.0, 0.0, 0.0];
        let step = acc.process(&block).expect("process");
        let table = acc.table().clone();
        // Oldest sample of the block meets table[3] in slot 0 and table[7] in slot 1.
        match step {
            Step::WindowComplete(p) => assert!((p.energy - table.weight(3)).abs() < 1e-7),
            Step::Accumulating => panic!("first block must complete"),
        }
        assert!((acc.bank()[0] - table.weight(7)).abs() < 1e-7);
        assert_eq!(acc.bank()[1], 0.0);
        assert_eq!(acc.phase(), 0);
    }

    #[test]
    fn terminator_fits_with_maximum_overlap() {
        // 1000 / 32 + 1 = 32, ceil(1000 / 32) = 32 active slots.
        let mut acc = prepared(1000, 1, 1);
        assert_eq!(acc.settings().period(), 32);
        for _ in 0..5000 {
            acc.process(&[0.3]).expect("process");
        }
        assert!(acc.completed() > 100);
    }

    #[test]
    fn magnitude_mode_counts_negative_excursions() {
        let mut acc =
            EnvelopeAccumulator::new(Settings::new(4, 4), PeakMode::Magnitude).expect("alloc");
        acc.block_size_changed(4).expect("block size");
        match acc.process(&[-5.0, 3.0, 9.0, -12.0]).expect("process") {
            Step::WindowComplete(p) => assert_eq!(p.peak, 12.0),
            Step::Accumulating => panic!("expected completion"),
        }
    }

    #[test]
    fn peak_covers_gap_blocks_when_hop_exceeds_window() {
        // Window 16, hop 64, block 16: blocks 1..=3 touch no window at all.
        let mut acc = prepared(16, 64, 16);
        assert!(matches!(acc.process(&[0.0; 16]), Ok(Step::WindowComplete(_))));

        let mut loud_gap = [0.0f32; 16];
        loud_gap[3] = 0.9;
        assert_eq!(acc.process(&loud_gap), Ok(Step::Accumulating));
        assert!(acc.bank().iter().all(|&s| s == 0.0));
        assert_eq!(acc.process(&[0.0; 16]), Ok(Step::Accumulating));
        assert_eq!(acc.process(&[0.0; 16]), Ok(Step::Accumulating));

        match acc.process(&[0.1; 16]).expect("process") {
            Step::WindowComplete(p) => {
                // Energy only sees the last block, the peak sees the whole interval.
                assert!((p.energy - 0.01).abs() < 1e-6, "energy {}", p.energy);
                assert_eq!(p.peak, 0.9);
            }
            Step::Accumulating => panic!("block 4 completes the window"),
        }
    }
}
