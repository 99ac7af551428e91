use thiserror::Error;

/// Errors originating from the DSP module.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DspError {
    /// Window table storage could not be allocated.
    #[error("envpeak~ : impossible d'allouer la table de fenêtre ({samples} samples)")]
    Alloc {
        /// Number of samples requested.
        samples: usize,
    },

    /// Block size of zero was announced.
    #[error("Taille de bloc invalide : {0}")]
    InvalidBlockSize(usize),

    /// `perform` was called before any block-size notification.
    #[error("envpeak~ : aucun bloc DSP négocié")]
    NotPrepared,

    /// The delivered block does not match the negotiated block size.
    #[error("Bloc de {got} samples, {expected} attendus")]
    BlockSizeMismatch {
        /// Negotiated size.
        expected: usize,
        /// Delivered size.
        got: usize,
    },

    /// The block is larger than the zero padding of the window table.
    #[error("Bloc de {block_size} samples, padding alloué {allocated} : bloc ignoré")]
    BlockTooLarge {
        /// Delivered size.
        block_size: usize,
        /// Padding currently allocated after the window.
        allocated: usize,
    },

    /// No class registered under this name.
    #[error("Classe inconnue : {0}")]
    UnknownClass(String),
}
