//! Serial transport for K-line / D-CAN adapters
//!
//! Opens the OS serial port with the concept's baud rate and parity and a
//! short read timeout, so the engine thread can poll its stop flag between
//! reads.

use super::{Link, Transport};
use crate::error::{Result, SimError};
use crate::framer::{LineSettings, Parity};
use std::time::Duration;

/// Serial port transport
///
/// # Example
///
/// ```ignore
/// let transport = SerialTransport::new();
/// let link = transport.open("COM3", Concept::Fast.line(), Duration::from_millis(10))?;
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct SerialTransport;

impl SerialTransport {
    pub fn new() -> Self {
        Self
    }

    /// Names of serial ports present on this machine
    pub fn available_ports() -> Vec<String> {
        serialport::available_ports()
            .unwrap_or_default()
            .into_iter()
            .map(|p| p.port_name)
            .collect()
    }
}

fn map_parity(parity: Parity) -> serialport::Parity {
    match parity {
        Parity::None => serialport::Parity::None,
        Parity::Even => serialport::Parity::Even,
    }
}

impl Transport for SerialTransport {
    fn open(
        &self,
        port: &str,
        line: LineSettings,
        read_timeout: Duration,
    ) -> Result<Box<dyn Link>> {
        let port_handle = serialport::new(port, line.baud_rate)
            .data_bits(serialport::DataBits::Eight)
            .stop_bits(serialport::StopBits::One)
            .parity(map_parity(line.parity))
            .flow_control(serialport::FlowControl::None)
            .timeout(read_timeout)
            .open()
            .map_err(|e| SimError::PortUnavailable {
                port: port.to_string(),
                source: std::io::Error::other(e.to_string()),
            })?;

        Ok(Box::new(port_handle))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::framer::Concept;

    #[test]
    fn test_parity_mapping() {
        assert_eq!(map_parity(Parity::None), serialport::Parity::None);
        assert_eq!(map_parity(Parity::Even), serialport::Parity::Even);
    }

    #[test]
    fn test_open_missing_port_fails() {
        let result = SerialTransport::new().open(
            "/nonexistent/car-sim-port",
            Concept::Ds2.line(),
            Duration::from_millis(10),
        );
        assert!(matches!(
            result,
            Err(SimError::PortUnavailable { ref port, .. }) if port == "/nonexistent/car-sim-port"
        ));
    }
}
