pub mod frame;
pub mod models;
pub mod session;

mod monitor;

pub use models::{
    ConnectionConfig, ConnectionState, ReadingErrorKind, ReadingOutcome, ScaleModel, WeightReading,
};
pub use session::ScaleSession;

use crate::serial::SerialError;

#[derive(Debug, thiserror::Error)]
pub enum ScaleError {
    #[error("Reading unstable")]
    Unstable,

    #[error("Negative weight on the platter")]
    Negative,

    #[error("Scale overloaded")]
    Overload,

    #[error("Malformed frame: {raw:?}")]
    MalformedFrame { raw: String },

    #[error("Weight field is not numeric: {raw:?}")]
    ParseError { raw: String },

    #[error("Scale model not supported")]
    ModelUnsupported,

    #[error("Serial port is not open")]
    PortNotOpen,

    #[error("Serial port is already open")]
    PortAlreadyOpen,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Serial transport error: {0}")]
    Transport(#[from] SerialError),
}

impl ScaleError {
    /// Classification carried by `ReadingOutcome::Failure` events.
    pub fn kind(&self) -> ReadingErrorKind {
        match self {
            ScaleError::Unstable => ReadingErrorKind::Unstable,
            ScaleError::Negative => ReadingErrorKind::Negative,
            ScaleError::Overload => ReadingErrorKind::Overload,
            ScaleError::MalformedFrame { .. } => ReadingErrorKind::MalformedFrame,
            ScaleError::ParseError { .. } => ReadingErrorKind::ParseError,
            ScaleError::ModelUnsupported => ReadingErrorKind::ModelUnsupported,
            ScaleError::PortNotOpen => ReadingErrorKind::PortNotOpen,
            ScaleError::PortAlreadyOpen => ReadingErrorKind::PortAlreadyOpen,
            ScaleError::InvalidConfig(_) => ReadingErrorKind::InvalidConfig,
            ScaleError::Transport(_) => ReadingErrorKind::Transport,
        }
    }
}

pub type Result<T> = std::result::Result<T, ScaleError>;
