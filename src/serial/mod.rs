pub mod transport;

pub use transport::{SerialTransport, Transport};

use serde::{Deserialize, Serialize};

/// Description of a serial port present on the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerialPortInfo {
    pub port_name: String,
    pub port_type: String,
    pub manufacturer: Option<String>,
    pub product: Option<String>,
    pub serial_number: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum SerialError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Port is not open")]
    NotConnected,

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialport error: {0}")]
    SerialportError(#[from] serialport::Error),
}

pub type Result<T> = std::result::Result<T, SerialError>;

/// Enumerate the serial ports available on this machine.
///
/// Pass-through convenience for UI and CLI layers picking a port.
pub fn list_ports() -> Result<Vec<SerialPortInfo>> {
    let ports = serialport::available_ports()?;
    let mut infos = Vec::with_capacity(ports.len());

    for port in ports {
        let info = match port.port_type {
            serialport::SerialPortType::UsbPort(usb) => SerialPortInfo {
                port_name: port.port_name,
                port_type: "usb".to_string(),
                manufacturer: usb.manufacturer,
                product: usb.product,
                serial_number: usb.serial_number,
            },
            other => SerialPortInfo {
                port_name: port.port_name,
                port_type: match other {
                    serialport::SerialPortType::PciPort => "pci".to_string(),
                    serialport::SerialPortType::BluetoothPort => "bluetooth".to_string(),
                    _ => "unknown".to_string(),
                },
                manufacturer: None,
                product: None,
                serial_number: None,
            },
        };
        infos.push(info);
    }

    Ok(infos)
}
