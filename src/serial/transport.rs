use std::io::{Read, Write};
use std::time::Duration;

use async_trait::async_trait;
use serialport::SerialPort;
use tokio::time::timeout;

use super::{Result, SerialError};

/// Poll step while waiting for bytes on the blocking read path.
const POLL_INTERVAL_MS: u64 = 10;

/// Grace period for the tail of a frame once the first bytes land. A full
/// Toledo frame is only a handful of bytes, but at 9600 baud it does not
/// arrive in one instant.
const SETTLE_MS: u64 = 20;

/// Byte-oriented connection to a scale.
///
/// The session drives exactly one of these; implementations other than
/// [`SerialTransport`] exist for tests and alternative backends.
#[async_trait]
pub trait Transport: Send {
    /// Configure and open the connection. The read timeout bounds the
    /// blocking read used for passive request/response exchanges.
    fn open(&mut self, port_name: &str, baud_rate: u32, timeout_ms: u64) -> Result<()>;

    fn is_open(&self) -> bool;

    /// Drain whatever is currently buffered without waiting. May be empty.
    async fn read_available(&mut self) -> Result<Vec<u8>>;

    /// Wait up to `timeout_ms` for data; an empty result means the far end
    /// stayed silent for the whole window.
    async fn read_blocking(&mut self, timeout_ms: u64) -> Result<Vec<u8>>;

    async fn write(&mut self, bytes: &[u8]) -> Result<()>;

    fn close(&mut self);
}

/// [`Transport`] over a system serial port.
pub struct SerialTransport {
    port: Option<Box<dyn SerialPort>>,
    port_name: Option<String>,
}

impl SerialTransport {
    pub fn new() -> Self {
        Self {
            port: None,
            port_name: None,
        }
    }

    /// Read everything the OS has buffered for this port right now.
    fn drain(port: &mut Box<dyn SerialPort>) -> Result<Vec<u8>> {
        let available = port.bytes_to_read()?;
        if available == 0 {
            return Ok(Vec::new());
        }

        let mut buf = vec![0u8; available as usize];
        match port.read(&mut buf) {
            Ok(n) => {
                buf.truncate(n);
                Ok(buf)
            }
            Err(ref e) if e.kind() == std::io::ErrorKind::TimedOut => Ok(Vec::new()),
            Err(e) => Err(SerialError::IoError(e)),
        }
    }
}

#[async_trait]
impl Transport for SerialTransport {
    fn open(&mut self, port_name: &str, baud_rate: u32, timeout_ms: u64) -> Result<()> {
        let port = serialport::new(port_name, baud_rate)
            .timeout(Duration::from_millis(timeout_ms))
            .open()
            .map_err(|e| SerialError::ConnectionFailed(e.to_string()))?;

        self.port = Some(port);
        self.port_name = Some(port_name.to_string());

        log::info!("Opened serial port {} at {} baud", port_name, baud_rate);
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.port.is_some()
    }

    async fn read_available(&mut self) -> Result<Vec<u8>> {
        let port = self.port.as_mut().ok_or(SerialError::NotConnected)?;
        Self::drain(port)
    }

    async fn read_blocking(&mut self, timeout_ms: u64) -> Result<Vec<u8>> {
        {
            let wait_for_data = async {
                loop {
                    {
                        let port = self.port.as_mut().ok_or(SerialError::NotConnected)?;
                        match port.bytes_to_read() {
                            Ok(0) => {}
                            Ok(_) => return Ok(()),
                            Err(e) => return Err(SerialError::SerialportError(e)),
                        }
                    }
                    tokio::time::sleep(Duration::from_millis(POLL_INTERVAL_MS)).await;
                }
            };

            match timeout(Duration::from_millis(timeout_ms), wait_for_data).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => return Err(e),
                // The unit never answered; the caller decides what an
                // empty frame means.
                Err(_) => return Ok(Vec::new()),
            }
        }

        tokio::time::sleep(Duration::from_millis(SETTLE_MS)).await;
        let port = self.port.as_mut().ok_or(SerialError::NotConnected)?;
        Self::drain(port)
    }

    async fn write(&mut self, bytes: &[u8]) -> Result<()> {
        let port = self.port.as_mut().ok_or(SerialError::NotConnected)?;
        port.write_all(bytes)?;
        port.flush()?;
        Ok(())
    }

    fn close(&mut self) {
        if self.port.take().is_some() {
            if let Some(name) = self.port_name.take() {
                log::info!("Closed serial port {}", name);
            }
        }
    }
}

impl Default for SerialTransport {
    fn default() -> Self {
        Self::new()
    }
}
