//! Error types for talking to the analyzer and writing its screenshots.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Every failure is terminal for the current invocation; nothing is retried.
#[derive(Debug, Error)]
pub enum Error {
    /// The device node could not be opened for exclusive read/write.
    #[error("failed to open {path}: {source}")]
    OpenFailed {
        path: String,
        #[source]
        source: serialport::Error,
    },

    /// Getting or setting the line attributes failed.
    #[error("failed to configure serial line: {0}")]
    ConfigureFailed(#[source] serialport::Error),

    /// The device accepted fewer bytes than given, or the write/drain failed.
    #[error("write to device failed: {0}")]
    WriteFailed(#[source] io::Error),

    /// OS-level read error.
    #[error("read from device failed: {0}")]
    ReadFailed(#[source] io::Error),

    /// A read returned no data within the inter-byte timeout.
    #[error("timeout: device went silent")]
    Timeout,

    /// The frame was cut short before the expected byte count arrived.
    #[error("frame acquisition failed after {received} of {expected} bytes")]
    AcquisitionFailed {
        received: usize,
        expected: usize,
        #[source]
        source: Box<Error>,
    },

    /// The conversion buffer cannot hold the 3-byte-per-pixel form.
    #[error("pixel buffer too small: need {needed} bytes, have {actual}")]
    BufferTooSmall { needed: usize, actual: usize },

    /// Device output could not be forwarded to the echo sink.
    #[error("failed to forward device output: {0}")]
    Echo(#[source] io::Error),

    /// No analyzer was found while scanning the USB serial ports.
    #[error("no analyzer found on any serial port")]
    DeviceNotFound,

    /// Malformed command line.
    #[error("{0}")]
    Usage(String),

    /// The PNG encoder rejected the image or failed mid-write.
    #[error("PNG encoding failed: {0}")]
    Image(#[from] png::EncodingError),

    /// The destination file could not be created or written.
    #[error("cannot write {}: {source}", path.display())]
    Output {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Result type alias using [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
