use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ScaleError;

/// Supported wire framings.
///
/// `Toledo` units send the weight field followed by a terminator byte;
/// `Filizola` units end the frame with the field itself. The model also
/// selects the error-marker layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScaleModel {
    Toledo,
    Filizola,
}

/// Connection parameters, fixed for the lifetime of a session.
///
/// There are deliberately no setters on a session: the port and baud rate
/// cannot change underneath an open connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    pub port_name: String,
    pub baud_rate: u32,
    /// Read timeout for the passive request/response exchange, in
    /// milliseconds.
    pub timeout_ms: u64,
    pub model: ScaleModel,
    /// Start the background poller on connect.
    pub monitoring: bool,
    /// Poll period of the background monitor, in milliseconds.
    pub monitor_interval_ms: u64,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            port_name: "COM1".to_string(),
            baud_rate: 9600,
            timeout_ms: 300,
            model: ScaleModel::Toledo,
            monitoring: false,
            monitor_interval_ms: 1000,
        }
    }
}

impl ConnectionConfig {
    pub(crate) fn validate(&self) -> Result<(), ScaleError> {
        if self.baud_rate == 0 {
            return Err(ScaleError::InvalidConfig(
                "baud rate must be positive".to_string(),
            ));
        }
        if self.monitoring && self.monitor_interval_ms == 0 {
            return Err(ScaleError::InvalidConfig(
                "monitor interval must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Session connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionState {
    Disconnected,
    Connected,
    ConnectedMonitoring,
}

/// One successfully decoded weight.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeightReading {
    pub kilograms: f64,
    /// The frame the weight was decoded from, kept for diagnostics.
    pub raw_frame: String,
    pub read_at: DateTime<Utc>,
}

/// Classification carried by failure events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReadingErrorKind {
    Unstable,
    Negative,
    Overload,
    MalformedFrame,
    ParseError,
    ModelUnsupported,
    PortNotOpen,
    PortAlreadyOpen,
    InvalidConfig,
    Transport,
}

/// Outcome of one read attempt, as delivered to event subscribers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ReadingOutcome {
    Weight(WeightReading),
    Failure {
        kind: ReadingErrorKind,
        /// Raw frame that produced the failure; empty when the failure
        /// happened before a frame was obtained.
        raw_frame: String,
        detail: String,
    },
}
