use thiserror::Error;

/// Errores del reproductor y de sus colaboradores.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PlayerError {
    /// The resolver found nothing for a free-text query.
    #[error("no se encontraron resultados para \"{0}\"")]
    ResolutionFailed(String),

    /// The stream source could not produce audio for a queued link.
    #[error("no se pudo abrir el stream de {link}: {reason}")]
    StreamOpenFailed { link: String, reason: String },

    /// The transport could not join the requested channel.
    #[error("conexión de voz no disponible: {0}")]
    ConnectionUnavailable(String),

    /// The playback engine rejected or failed a request.
    #[error("error del motor de reproducción: {0}")]
    PlaybackEngineError(String),

    /// The session was torn down while the request was in flight.
    #[error("la sesión ya no está conectada")]
    SessionClosed,

    #[error("link vacío")]
    EmptyLink,
}

pub type Result<T> = std::result::Result<T, PlayerError>;
