use crate::level::Emission;

/// Receives the outlet values of a fired emission.
///
/// Implémenté par : `Vec<Emission>` (tests, rendu offline) et [`FnSink`]
/// (closure, typiquement un envoi sur canal vers le thread de sortie).
///
/// # Example
/// ```
/// use ep_core::traits::EmissionSink;
/// use ep_core::level::Emission;
///
/// let mut out: Vec<Emission> = Vec::new();
/// out.emit(Emission { energy_db: -6.0, peak: 0.5 });
/// assert_eq!(out.len(), 1);
/// ```
pub trait EmissionSink {
    /// Push one emission (port 1 and port 2 together).
    ///
    /// CONTRAT : appelé depuis le chemin différé, jamais pendant `perform`.
    fn emit(&mut self, emission: Emission);
}

impl EmissionSink for Vec<Emission> {
    fn emit(&mut self, emission: Emission) {
        self.push(emission);
    }
}

impl<S: EmissionSink + ?Sized> EmissionSink for &mut S {
    fn emit(&mut self, emission: Emission) {
        (**self).emit(emission);
    }
}

/// Adapts a closure into an [`EmissionSink`].
///
/// # Example
/// ```
/// use ep_core::traits::{EmissionSink, FnSink};
/// use ep_core::level::Emission;
///
/// let mut peaks = Vec::new();
/// let mut sink = FnSink(|e: Emission| peaks.push(e.peak));
/// sink.emit(Emission { energy_db: 0.0, peak: 0.7 });
/// drop(sink);
/// assert_eq!(peaks, vec![0.7]);
/// ```
pub struct FnSink<F>(pub F);

impl<F: FnMut(Emission)> EmissionSink for FnSink<F> {
    fn emit(&mut self, emission: Emission) {
        (self.0)(emission);
    }
}
