//! Command/response handshake with the analyzer's shell.
//!
//! Every command goes through the same cycle: the text is sent followed by
//! `\r`, the device echoes it verbatim and terminates the echo with `\r\n`.
//! Whatever the command prints afterwards ends with the prompt `"ch> "`.
//! An echo that differs from what was sent is never matched, so the wait
//! runs into the read timeout and the command fails.

use std::io::{Read, Write};

use tracing::{debug, info};

use crate::error::Result;
use crate::frame::{FrameAcquirer, FrameBuffer, Geometry};
use crate::matcher::wait_for;
use crate::transport::Connection;

/// The device is idle and ready for a command after printing this.
pub const PROMPT: &[u8] = b"ch> ";
const CR: &[u8] = b"\r";
const CRLF: &[u8] = b"\r\n";

/// Where the current command stands in its handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandState {
    Idle,
    Sent,
    EchoConfirmed,
    TerminatorConfirmed,
}

/// Drives one connection through command handshakes.
pub struct CommandProtocol<P> {
    conn: Connection<P>,
    state: CommandState,
}

impl<P: Read + Write> CommandProtocol<P> {
    pub fn new(conn: Connection<P>) -> Self {
        Self {
            conn,
            state: CommandState::Idle,
        }
    }

    pub fn state(&self) -> CommandState {
        self.state
    }

    pub fn connection(&self) -> &Connection<P> {
        &self.conn
    }

    /// Sends `command` and waits until its echo and line terminator arrived.
    /// Nothing read on the way is forwarded.
    pub fn send_command(&mut self, command: &str) -> Result<()> {
        self.state = CommandState::Idle;
        self.conn.write_all(command.as_bytes())?;
        self.conn.write_all(CR)?;
        self.state = CommandState::Sent;

        wait_for(&mut self.conn, command.as_bytes(), None)?;
        self.state = CommandState::EchoConfirmed;

        wait_for(&mut self.conn, CRLF, None)?;
        self.state = CommandState::TerminatorConfirmed;
        debug!(command, "command acknowledged");
        Ok(())
    }

    /// Waits for the prompt. With `echo`, everything the device printed
    /// before it is forwarded there.
    pub fn wait_prompt(&mut self, echo: Option<&mut dyn Write>) -> Result<()> {
        wait_for(&mut self.conn, PROMPT, echo)?;
        self.state = CommandState::Idle;
        Ok(())
    }

    /// Runs an operator command and streams its response, without the
    /// trailing prompt, into `out`.
    pub fn execute(&mut self, command: &str, out: &mut dyn Write) -> Result<()> {
        info!(command, port = self.conn.name(), "executing command");
        self.send_command(command)?;
        self.wait_prompt(Some(out))
    }

    /// Runs a command whose output is of no interest to the operator.
    pub fn run_quiet(&mut self, command: &str) -> Result<()> {
        self.send_command(command)?;
        self.wait_prompt(None)
    }

    /// Freezes the display, fetches its native frame and resumes updates.
    pub fn capture_screen(&mut self, geometry: Geometry) -> Result<FrameBuffer> {
        info!(port = self.conn.name(), "capturing screen");
        self.run_quiet("pause")?;

        self.send_command("capture")?;
        let mut frame = FrameBuffer::new(geometry);
        FrameAcquirer::new(geometry).read_frame(&mut self.conn, frame.native_mut())?;
        self.wait_prompt(None)?;

        self.run_quiet("resume")?;
        Ok(frame)
    }

    /// Releases the connection.
    pub fn close(self) -> P {
        self.conn.close()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::pixel::{Pixel565, Pixel888};
    use crate::sim::Simulator;
    use std::io::{self, Cursor};

    fn protocol(sim: Simulator) -> CommandProtocol<Simulator> {
        CommandProtocol::new(Connection::new(sim, "sim"))
    }

    // Plays back a canned device transcript and swallows whatever is written.
    struct Transcript(Cursor<Vec<u8>>);

    impl Read for Transcript {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.0.read(buf)
        }
    }

    impl Write for Transcript {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            Ok(buf.len())
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn transcript(bytes: &[u8]) -> CommandProtocol<Transcript> {
        let device = Transcript(Cursor::new(bytes.to_vec()));
        CommandProtocol::new(Connection::new(device, "transcript"))
    }

    #[test]
    fn send_command_walks_through_handshake() {
        let mut protocol = protocol(Simulator::new(Geometry::NANOVNA));
        assert_eq!(protocol.state(), CommandState::Idle);
        protocol.send_command("version").unwrap();
        assert_eq!(protocol.state(), CommandState::TerminatorConfirmed);
        protocol.wait_prompt(None).unwrap();
        assert_eq!(protocol.state(), CommandState::Idle);
        assert_eq!(protocol.connection().get_ref().received(), b"version\r");
    }

    #[test]
    fn execute_forwards_response_without_prompt() {
        let mut protocol = protocol(Simulator::new(Geometry::NANOVNA));
        let mut out = Vec::new();
        protocol.execute("info", &mut out).unwrap();
        assert_eq!(out, b"NanoVNA simulator\r\n320x240 RGB565 display\r\n");

        let mut out = Vec::new();
        protocol.execute("bogus 1", &mut out).unwrap();
        assert_eq!(out, b"bogus?\r\n");
    }

    #[test]
    fn noise_before_echo_is_skipped() {
        let mut protocol = transcript(b"\r\nch> version\r\n1.0\r\nch> ");
        let mut out = Vec::new();
        protocol.execute("version", &mut out).unwrap();
        assert_eq!(out, b"1.0\r\n");
    }

    #[test]
    fn silent_device_times_out() {
        let mut sim = Simulator::new(Geometry::NANOVNA);
        sim.mute();
        let mut protocol = protocol(sim);
        assert!(matches!(protocol.send_command("pause"), Err(Error::Timeout)));
        assert_eq!(protocol.state(), CommandState::Sent);
    }

    #[test]
    fn diverging_echo_is_fatal() {
        let mut protocol = transcript(b"PAUSE\r\nch> ");
        assert!(matches!(protocol.run_quiet("pause"), Err(Error::Timeout)));
        assert_eq!(protocol.state(), CommandState::Sent);
    }

    #[test]
    fn missing_terminator_is_fatal() {
        let mut protocol = transcript(b"pause\rch> ");
        assert!(matches!(protocol.send_command("pause"), Err(Error::Timeout)));
        assert_eq!(protocol.state(), CommandState::EchoConfirmed);
    }

    #[test]
    fn capture_runs_pause_capture_resume() {
        let geometry = Geometry::NANOVNA;
        let mut protocol = protocol(Simulator::new(geometry));

        let frame = protocol.capture_screen(geometry).unwrap();

        assert_eq!(frame.native(), &Simulator::test_pattern(geometry)[..]);
        assert_eq!(protocol.state(), CommandState::Idle);
        let sim = protocol.close();
        assert_eq!(sim.received(), b"pause\rcapture\rresume\r");
        assert!(!sim.is_paused());
    }

    #[test]
    fn captured_frame_converts_to_reference_image() {
        let geometry = Geometry::NANOVNA;
        let native = Simulator::test_pattern(geometry);
        let mut protocol = protocol(Simulator::with_framebuffer(geometry, native.clone()));

        let rgb = protocol.capture_screen(geometry).unwrap().into_rgb().unwrap();

        let line = geometry.line_bytes();
        let reference: Vec<u8> = native
            .chunks_exact(2)
            .enumerate()
            .flat_map(|(i, px)| {
                let last_column = (i * 2) % line == line - 2;
                let value = if last_column {
                    0
                } else {
                    u16::from_be_bytes([px[0], px[1]])
                };
                Pixel888::from(Pixel565(value)).to_bytes()
            })
            .collect();
        assert_eq!(rgb.len(), 230_400);
        assert_eq!(rgb, reference);
    }

    #[test]
    fn h4_capture_uses_the_larger_screen() {
        let geometry = Geometry::NANOVNA_H4;
        let mut protocol = protocol(Simulator::new(geometry));

        let frame = protocol.capture_screen(geometry).unwrap();

        assert_eq!(frame.native(), &Simulator::test_pattern(geometry)[..]);
        assert_eq!(frame.into_rgb().unwrap().len(), 460_800);
        assert_eq!(protocol.state(), CommandState::Idle);
    }

    #[test]
    fn truncated_capture_yields_no_frame() {
        let mut stream = b"pause\r\nch> capture\r\n".to_vec();
        stream.extend(vec![0x55; 5000]);
        let mut protocol = transcript(&stream);
        match protocol.capture_screen(Geometry::NANOVNA) {
            Err(Error::AcquisitionFailed {
                received, expected, ..
            }) => {
                assert_eq!(received, 5000);
                assert_eq!(expected, 153_600);
            }
            Ok(_) => panic!("truncated frame reported as success"),
            Err(e) => panic!("unexpected error: {}", e),
        }
    }
}
