use crate::error::DspError;

/// Zero padding allocated after the window before the first block-size notification.
pub const INITIAL_PADDING: usize = 64;

/// Hann weighting table followed by zero padding.
///
/// The first `npoints` entries are `(1 - cos(2πi/npoints)) / npoints`; the
/// padding lets a block-aligned read start anywhere inside the window and run
/// up to one block past its end.
///
/// # Example
/// ```
/// use ep_dsp::window::WindowTable;
/// let table = WindowTable::new(8).unwrap();
/// assert_eq!(table.len(), 8 + 64);
/// assert_eq!(table.weight(0), 0.0);
/// assert!((table.weight(4) - 0.25).abs() < 1e-6);
/// ```
#[derive(Debug, Clone)]
pub struct WindowTable {
    weights: Vec<f32>,
    npoints: usize,
    padding: usize,
}

impl WindowTable {
    /// Build a table with [`INITIAL_PADDING`] samples of padding.
    ///
    /// # Errors
    /// Returns [`DspError::Alloc`] if the storage cannot be reserved.
    pub fn new(npoints: usize) -> Result<Self, DspError> {
        Self::with_padding(npoints, INITIAL_PADDING)
    }

    /// Build a table with an explicit amount of padding.
    ///
    /// # Errors
    /// Returns [`DspError::Alloc`] if the storage cannot be reserved.
    pub fn with_padding(npoints: usize, padding: usize) -> Result<Self, DspError> {
        let total = npoints
            .checked_add(padding)
            .ok_or(DspError::Alloc { samples: usize::MAX })?;

        let mut weights = Vec::new();
        weights
            .try_reserve_exact(total)
            .map_err(|_| DspError::Alloc { samples: total })?;
        weights.extend((0..npoints).map(|i| hann_weight(i, npoints)));
        weights.resize(total, 0.0);

        Ok(Self {
            weights,
            npoints,
            padding,
        })
    }

    /// Make sure a block of `block_size` samples can be read past the window end.
    ///
    /// Grows the storage to `npoints + block_size`, keeping the weights and
    /// zeroing the new tail. Returns `true` if the table was grown.
    ///
    /// # Errors
    /// Returns [`DspError::Alloc`] if the storage cannot grow; the table is
    /// left untouched in that case.
    pub fn ensure_padding(&mut self, block_size: usize) -> Result<bool, DspError> {
        if block_size <= self.padding {
            return Ok(false);
        }
        let total = self
            .npoints
            .checked_add(block_size)
            .ok_or(DspError::Alloc { samples: usize::MAX })?;
        self.weights
            .try_reserve_exact(total - self.weights.len())
            .map_err(|_| DspError::Alloc { samples: total })?;
        self.weights.resize(total, 0.0);
        self.padding = block_size;
        Ok(true)
    }

    /// `block_size` weights starting at `start`.
    ///
    /// Callers keep `start < npoints` and `block_size <= padding`.
    #[inline(always)]
    #[must_use]
    pub fn segment(&self, start: usize, block_size: usize) -> &[f32] {
        &self.weights[start..start + block_size]
    }

    /// Weight at index `i` (padding reads as zero).
    #[must_use]
    pub fn weight(&self, i: usize) -> f32 {
        self.weights.get(i).copied().unwrap_or(0.0)
    }

    /// Window length in samples.
    #[must_use]
    pub fn npoints(&self) -> usize {
        self.npoints
    }

    /// Zero padding currently allocated after the window.
    #[must_use]
    pub fn padding(&self) -> usize {
        self.padding
    }

    /// Total number of stored weights.
    #[must_use]
    pub fn len(&self) -> usize {
        self.weights.len()
    }

    /// `true` if the table holds no weights (never the case once built).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }
}

#[inline]
fn hann_weight(i: usize, npoints: usize) -> f32 {
    let n = npoints as f64;
    ((1.0 - (2.0 * std::f64::consts::PI * i as f64 / n).cos()) / n) as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weights_sum_to_one() {
        // Sum of (1 - cos) over a full period is npoints, divided by npoints.
        let table = WindowTable::new(1024).expect("table");
        let sum: f64 = (0..1024).map(|i| f64::from(table.weight(i))).sum();
        assert!((sum - 1.0).abs() < 1e-4, "sum = {sum}");
    }

    #[test]
    fn padding_is_zero() {
        let table = WindowTable::new(16).expect("table");
        assert!((16..table.len()).all(|i| table.weight(i) == 0.0));
        assert_eq!(table.weight(10_000), 0.0);
    }

    #[test]
    fn single_point_window() {
        let table = WindowTable::new(1).expect("table");
        assert_eq!(table.npoints(), 1);
        assert_eq!(table.weight(0), 0.0);
    }

    #[test]
    fn grow_preserves_weights_and_zeroes_tail() {
        let mut table = WindowTable::new(32).expect("table");
        let before: Vec<f32> = (0..32).map(|i| table.weight(i)).collect();

        assert_eq!(table.ensure_padding(64), Ok(false));
        assert_eq!(table.ensure_padding(256), Ok(true));
        assert_eq!(table.padding(), 256);
        assert_eq!(table.len(), 32 + 256);

        let after: Vec<f32> = (0..32).map(|i| table.weight(i)).collect();
        assert_eq!(before, after);
        assert!(table.segment(32, 256).iter().all(|&w| w == 0.0));
    }

    #[test]
    fn impossible_allocation_is_reported() {
        assert!(matches!(
            WindowTable::new(usize::MAX / 4),
            Err(DspError::Alloc { .. })
        ));
        assert!(matches!(
            WindowTable::new(usize::MAX - 3),
            Err(DspError::Alloc { .. })
        ));
    }

    #[test]
    fn failed_grow_keeps_previous_allocation() {
        let mut table = WindowTable::new(64).expect("table");
        assert!(table.ensure_padding(usize::MAX / 4).is_err());
        assert_eq!(table.padding(), INITIAL_PADDING);
        assert_eq!(table.len(), 64 + INITIAL_PADDING);
    }
}
