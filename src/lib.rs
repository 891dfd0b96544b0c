//! Serial driver for checkout weighing scales.
//!
//! Supports Toledo- and Filizola-style framing over a serial line:
//! single-shot reads, passive units polled with an ENQ request byte, and
//! an optional background monitor that delivers every reading outcome,
//! success or failure, to event subscribers.

pub mod scale;
pub mod serial;

pub use scale::models::{
    ConnectionConfig, ConnectionState, ReadingErrorKind, ReadingOutcome, ScaleModel, WeightReading,
};
pub use scale::{ScaleError, ScaleSession};
pub use serial::{list_ports, SerialError, SerialPortInfo};
