//! Fehlertypen fuer das Media-Crate

use thiserror::Error;

/// Media-Fehlertypen
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("Datei nicht gefunden: {0}")]
    DateiNichtGefunden(String),

    #[error("Datei zu gross: {size} Bytes (Maximum: {max} Bytes)")]
    DateiZuGross { size: usize, max: usize },

    #[error("Ungueltiger Dateiname: {0}")]
    UngueltigerName(String),

    #[error("Leere Datei")]
    LeereDatei,

    #[error("IO-Fehler: {0}")]
    Io(#[from] std::io::Error),
}

pub type MediaResult<T> = Result<T, MediaError>;
