//! # Error Types Module
//!
//! Questo modulo definisce tutti i tipi di errore custom del bridge.
//!
//! ## Responsabilità:
//! - Definisce `CompressError` enum per categorizzare tutti gli errori possibili
//! - Fornisce un codice stabile per ogni categoria (usato nelle risposte del canale)
//! - Integra con `thiserror` per automatic error conversion
//!
//! ## Categorie di errori:
//! - `SourceUnreadable`: Asset o traccia video non leggibile
//! - `ThumbnailEncodeFailed`: Frame estratto ma encoding JPEG fallito
//! - `WriteFailed`: Errori di scrittura (thumbnail o file di output)
//! - `EngineFailure`: L'engine di export ha riportato un errore
//! - `IncompleteExport`: L'engine ha terminato senza successo né errore esplicito
//! - `Busy`: Un export è già in corso (single-flight)
//! - `InvalidArgument`: Argomenti del metodo mancanti o non validi
//! - `MissingDependency`: Tool esterno mancante (ffmpeg, ffprobe)
//!
//! ## Esempio:
//! ```rust,ignore
//! if asset.video_track.is_none() {
//!     return Err(CompressError::SourceUnreadable(path.display().to_string()));
//! }
//! ```

/// Custom error types for the compression bridge
#[derive(thiserror::Error, Debug)]
pub enum CompressError {
    #[error("Source unreadable: {0}")]
    SourceUnreadable(String),

    #[error("Thumbnail encode failed: {0}")]
    ThumbnailEncodeFailed(String),

    #[error("Write failed: {0}")]
    WriteFailed(String),

    #[error("Export engine failure: {0}")]
    EngineFailure(String),

    #[error("Export did not complete: {0}")]
    IncompleteExport(String),

    #[error("Another compression is already running")]
    Busy,

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Dependency missing: {0}")]
    MissingDependency(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CompressError {
    /// Stable identifier reported to the host alongside the message
    pub fn code(&self) -> &'static str {
        match self {
            Self::SourceUnreadable(_) => "source_unreadable",
            Self::ThumbnailEncodeFailed(_) => "thumbnail_encode_failed",
            Self::WriteFailed(_) => "write_failed",
            Self::EngineFailure(_) => "engine_failure",
            Self::IncompleteExport(_) => "incomplete_export",
            Self::Busy => "busy",
            Self::InvalidArgument(_) => "invalid_argument",
            Self::MissingDependency(_) => "missing_dependency",
            Self::Io(_) => "io",
            Self::Json(_) => "json",
        }
    }
}

pub type Result<T> = std::result::Result<T, CompressError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_distinct_per_category() {
        assert_eq!(CompressError::Busy.code(), "busy");
        assert_eq!(CompressError::EngineFailure("x".into()).code(), "engine_failure");
        assert_eq!(CompressError::IncompleteExport("x".into()).code(), "incomplete_export");

        let io: CompressError = std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
        assert_eq!(io.code(), "io");
        assert!(io.to_string().contains("gone"));
    }
}
