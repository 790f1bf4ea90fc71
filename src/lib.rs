//! # NanoVNA Link Library
//!
//! Talks to a NanoVNA vector network analyzer over its USB serial shell.
//! It sends shell commands with the echo/prompt handshake the device expects,
//! pulls the raw RGB565 screen after a `capture` command and turns it into an
//! RGB888 buffer ready to be stored as PNG or PPM.
//!
//! Everything is synchronous and single-threaded. A [`Connection`] owns the
//! line for one transaction; any failure, including a silent device, ends it.
//!
//! ```no_run
//! use std::path::Path;
//!
//! use nanovna_link::{CommandProtocol, Geometry, LineSettings, SerialConnection};
//!
//! fn main() -> nanovna_link::Result<()> {
//!     let mut conn = SerialConnection::open("/dev/ttyACM0")?;
//!     conn.configure(&LineSettings::default())?;
//!     let mut protocol = CommandProtocol::new(conn);
//!     let rgb = protocol.capture_screen(Geometry::NANOVNA)?.into_rgb()?;
//!     nanovna_link::snapshot::write_image(Path::new("screen.png"), 320, 240, &rgb, None)?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod frame;
pub mod matcher;
pub mod pixel;
pub mod protocol;
pub mod sim;
pub mod snapshot;
pub mod transport;

pub use config::LineSettings;
pub use error::{Error, Result};
pub use frame::{FrameAcquirer, FrameBuffer, Geometry};
pub use matcher::{wait_for, PatternMatcher};
pub use pixel::{convert_565_to_888, fix_known_artifact, invert_colors, Pixel565, Pixel888};
pub use protocol::{CommandProtocol, CommandState, PROMPT};
pub use sim::Simulator;
pub use transport::{Connection, SerialConnection};
