//! Byte-level access to the analyzer's serial line.
//!
//! [`Connection`] wraps any `Read + Write` stream so the protocol layers can
//! run against the real port or against the in-process [`Simulator`].
//! Single bytes are served from a small internal buffer; chunked reads go
//! straight to the port once that buffer is drained.
//!
//! [`Simulator`]: crate::sim::Simulator

use std::io::{self, Read, Write};

use serialport::{DataBits, FlowControl, Parity, SerialPort, SerialPortType, StopBits};
use tracing::{debug, warn};

use crate::config::LineSettings;
use crate::error::{Error, Result};

/// USB vendor id of the ChibiOS virtual COM port the analyzer enumerates as.
pub const USB_VID: u16 = 0x0483;
/// USB product id of the ChibiOS virtual COM port.
pub const USB_PID: u16 = 0x5740;

const READ_BUFFER_SIZE: usize = 64;

/// An open line to the device. Dropping it (or calling [`close`]) releases
/// the handle; no operation is possible afterwards.
///
/// [`close`]: Connection::close
pub struct Connection<P> {
    port: P,
    name: String,
    buf: [u8; READ_BUFFER_SIZE],
    pos: usize,
    filled: usize,
}

/// A connection backed by a real serial port.
pub type SerialConnection = Connection<Box<dyn SerialPort>>;

impl<P: Read + Write> Connection<P> {
    /// Wraps an already opened stream.
    pub fn new(port: P, name: impl Into<String>) -> Self {
        Self {
            port,
            name: name.into(),
            buf: [0; READ_BUFFER_SIZE],
            pos: 0,
            filled: 0,
        }
    }

    /// The device path (or a descriptive name for non-serial streams).
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn get_ref(&self) -> &P {
        &self.port
    }

    /// Reads exactly one byte.
    pub fn read_byte(&mut self) -> Result<u8> {
        if self.pos == self.filled {
            self.filled = read_port(&mut self.port, &mut self.buf)?;
            self.pos = 0;
        }
        let byte = self.buf[self.pos];
        self.pos += 1;
        Ok(byte)
    }

    /// A single read of at most `dest.len()` bytes. Bytes still buffered from
    /// earlier [`read_byte`] calls are handed out first.
    ///
    /// [`read_byte`]: Connection::read_byte
    pub fn read_chunk(&mut self, dest: &mut [u8]) -> Result<usize> {
        if dest.is_empty() {
            return Ok(0);
        }
        if self.pos < self.filled {
            let n = dest.len().min(self.filled - self.pos);
            dest[..n].copy_from_slice(&self.buf[self.pos..self.pos + n]);
            self.pos += n;
            return Ok(n);
        }
        read_port(&mut self.port, dest)
    }

    /// Writes the whole buffer in one call and waits until it is drained.
    /// A short write is an error; it is not retried.
    pub fn write_all(&mut self, bytes: &[u8]) -> Result<()> {
        if bytes.is_empty() {
            return Ok(());
        }
        let written = loop {
            match self.port.write(bytes) {
                Ok(n) => break n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(Error::WriteFailed(e)),
            }
        };
        if written != bytes.len() {
            return Err(Error::WriteFailed(io::Error::new(
                io::ErrorKind::WriteZero,
                format!("short write: {} of {} bytes", written, bytes.len()),
            )));
        }
        self.port.flush().map_err(Error::WriteFailed)
    }

    /// Releases the handle and hands back the underlying stream.
    pub fn close(self) -> P {
        debug!(port = %self.name, "closing connection");
        self.port
    }
}

impl SerialConnection {
    /// Opens the device node for exclusive read/write at the default line
    /// settings. Call [`configure`] before talking to the device.
    ///
    /// [`configure`]: Connection::configure
    pub fn open(path: &str) -> Result<Self> {
        let defaults = LineSettings::default();
        let port = serialport::new(path, defaults.baud)
            .timeout(defaults.timeout())
            .open()
            .map_err(|source| Error::OpenFailed {
                path: path.to_string(),
                source,
            })?;
        debug!(port = path, "opened serial port");
        Ok(Self::new(port, path))
    }

    /// Puts the line into raw 8N1 mode without flow control and applies the
    /// baud rate and inter-byte read timeout from `settings`.
    pub fn configure(&mut self, settings: &LineSettings) -> Result<()> {
        let port = &mut self.port;
        port.set_baud_rate(settings.baud).map_err(Error::ConfigureFailed)?;
        port.set_data_bits(DataBits::Eight).map_err(Error::ConfigureFailed)?;
        port.set_parity(Parity::None).map_err(Error::ConfigureFailed)?;
        port.set_stop_bits(StopBits::One).map_err(Error::ConfigureFailed)?;
        port.set_flow_control(FlowControl::None).map_err(Error::ConfigureFailed)?;
        port.set_timeout(settings.timeout()).map_err(Error::ConfigureFailed)?;
        debug!(
            port = %self.name,
            baud = settings.baud,
            timeout_tenths = settings.timeout_tenths,
            "configured serial line"
        );
        Ok(())
    }
}

/// One underlying read. Zero bytes, or the port's own timeout, means the
/// device went silent.
fn read_port<P: Read>(port: &mut P, dest: &mut [u8]) -> Result<usize> {
    loop {
        match port.read(dest) {
            Ok(0) => return Err(Error::Timeout),
            Ok(n) => return Ok(n),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) if e.kind() == io::ErrorKind::TimedOut => return Err(Error::Timeout),
            Err(e) => return Err(Error::ReadFailed(e)),
        }
    }
}

/// Scans the serial ports for the analyzer's USB id and returns its path.
pub fn find_device() -> Result<String> {
    let ports = serialport::available_ports().map_err(|e| {
        warn!("could not enumerate serial ports: {}", e);
        Error::DeviceNotFound
    })?;
    ports
        .into_iter()
        .find_map(|port| match &port.port_type {
            SerialPortType::UsbPort(info) if info.vid == USB_VID && info.pid == USB_PID => {
                Some(port.port_name)
            }
            _ => None,
        })
        .ok_or(Error::DeviceNotFound)
}
