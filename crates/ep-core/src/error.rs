use thiserror::Error;

/// Errors originating from the core module.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Invalid configuration value or structure.
    #[error("Configuration invalide : {0}")]
    Config(String),

    /// Referenced file does not exist.
    #[error("Fichier introuvable : {path}")]
    FileNotFound {
        /// Path that was not found.
        path: String,
    },

    /// Unknown value for an enumerated option.
    #[error("Valeur inconnue pour {option} : {value}")]
    UnknownValue {
        /// Option name (e.g. `peak_mode`).
        option: &'static str,
        /// The rejected value.
        value: String,
    },
}
