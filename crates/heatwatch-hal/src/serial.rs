//! [`SerialLink`] – the physical link to the microcontroller.
//!
//! Opens the port 8N1 without flow control and raises DTR, since USB CDC
//! devices commonly hold their output until the host asserts it.  Reads are
//! non-blocking when the driver reports nothing waiting, and otherwise
//! bounded by the port timeout.

use std::io::{ErrorKind, Read, Write};
use std::time::Duration;

use heatwatch_types::HeatwatchError;
use serialport::{DataBits, FlowControl, Parity, SerialPort, SerialPortType, StopBits};
use tracing::{debug, info, warn};

use crate::framing::LineBuffer;
use crate::link::LinkChannel;

/// Size of the scratch buffer used for a single driver read.
const READ_CHUNK_BYTES: usize = 512;

/// A [`LinkChannel`] backed by an OS serial port.
pub struct SerialLink {
    address: String,
    port: Box<dyn SerialPort>,
    buffer: LineBuffer,
}

impl SerialLink {
    /// Open `address` at `baud_rate` with an initial read timeout.
    ///
    /// # Errors
    ///
    /// Returns [`HeatwatchError::LinkUnavailable`] if the port cannot be
    /// opened.  Failing to raise DTR is logged and tolerated.
    pub fn open(
        address: &str,
        baud_rate: u32,
        read_timeout: Duration,
    ) -> Result<Self, HeatwatchError> {
        let address = normalize_port_name(address);
        let mut port = serialport::new(&address, baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(read_timeout)
            .open()
            .map_err(|e| HeatwatchError::LinkUnavailable {
                address: address.clone(),
                details: e.to_string(),
            })?;

        if let Err(e) = port.write_data_terminal_ready(true) {
            warn!(address = %address, error = %e, "could not assert DTR; continuing");
        }

        info!(address = %address, baud_rate, "serial link opened");
        Ok(Self {
            address,
            port,
            buffer: LineBuffer::default(),
        })
    }
}

impl LinkChannel for SerialLink {
    fn address(&self) -> &str {
        &self.address
    }

    fn read_line(&mut self, timeout: Duration) -> Result<Option<String>, HeatwatchError> {
        if let Some(line) = self.buffer.next_line() {
            return Ok(Some(line));
        }

        let waiting = self
            .port
            .bytes_to_read()
            .map_err(|e| HeatwatchError::ReadError(e.to_string()))?;
        if waiting == 0 {
            return Ok(None);
        }

        if self.port.timeout() != timeout {
            self.port
                .set_timeout(timeout)
                .map_err(|e| HeatwatchError::ReadError(e.to_string()))?;
        }

        let mut chunk = [0u8; READ_CHUNK_BYTES];
        match self.port.read(&mut chunk) {
            Ok(0) => Ok(None),
            Ok(n) => {
                debug!(bytes = n, "serial read");
                self.buffer.push(&chunk[..n]);
                Ok(self.buffer.next_line())
            }
            Err(e) if matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock) => Ok(None),
            Err(e) => Err(HeatwatchError::ReadError(e.to_string())),
        }
    }

    fn write_line(&mut self, line: &str) -> Result<(), HeatwatchError> {
        let mut frame = String::with_capacity(line.len() + 1);
        frame.push_str(line);
        frame.push('\n');
        self.port
            .write_all(frame.as_bytes())
            .and_then(|_| self.port.flush())
            .map_err(|e| HeatwatchError::WriteError(e.to_string()))
    }
}

/// Windows needs the `\\.\COMxx` form for ports numbered 10 and above.
fn normalize_port_name(address: &str) -> String {
    if cfg!(target_os = "windows") && address.starts_with("COM") && !address.starts_with(r"\\") {
        format!(r"\\.\{address}")
    } else {
        address.to_string()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Port discovery
// ────────────────────────────────────────────────────────────────────────────

/// A serial port visible to the OS, reduced to what the CLI prints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortSummary {
    pub name: String,
    pub kind: &'static str,
    /// USB product string, when the driver reports one.
    pub product: Option<String>,
}

/// List the serial ports the OS currently exposes.
///
/// # Errors
///
/// Returns [`HeatwatchError::LinkUnavailable`] if enumeration itself fails.
pub fn available_ports() -> Result<Vec<PortSummary>, HeatwatchError> {
    let ports = serialport::available_ports().map_err(|e| HeatwatchError::LinkUnavailable {
        address: "<enumeration>".to_string(),
        details: e.to_string(),
    })?;
    Ok(ports
        .into_iter()
        .map(|p| {
            let (kind, product) = match &p.port_type {
                SerialPortType::UsbPort(info) => ("USB", info.product.clone()),
                SerialPortType::BluetoothPort => ("Bluetooth", None),
                SerialPortType::PciPort => ("PCI", None),
                SerialPortType::Unknown => ("Unknown", None),
            };
            PortSummary {
                name: p.port_name,
                kind,
                product,
            }
        })
        .collect())
}
