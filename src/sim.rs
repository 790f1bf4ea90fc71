//! # Analyzer Simulator
//!
//! An in-process stand-in for the analyzer's USB shell. It implements
//! `Read + Write`, so a [`Connection`] can be opened on it exactly like on a
//! serial port: bytes written are collected into lines, every line ending in
//! `\r` is echoed back with `\r\n`, answered, and followed by the prompt.
//! Each `read` hands out at most one burst, mirroring how the device streams
//! the screen two raster lines at a time.
//!
//! [`Connection`]: crate::transport::Connection

use std::collections::VecDeque;
use std::io::{self, Read, Write};

use crate::frame::Geometry;
use crate::protocol::PROMPT;

// Errors the simulated shell reports back to the host.
#[derive(Debug, PartialEq)]
pub enum CommandError {
    /// The shell does not know this command.
    UnknownCommand(String),
}

#[derive(Debug, Clone)]
pub struct Simulator {
    geometry: Geometry,
    // Native RGB565 screen contents returned by `capture`.
    framebuffer: Vec<u8>,
    paused: bool,
    muted: bool,
    // --- Host side bookkeeping ---
    line: Vec<u8>,
    received: Vec<u8>,
    outgoing: VecDeque<Vec<u8>>,
    read_calls: usize,
}

impl Simulator {
    /// Creates a simulator whose screen shows [`Simulator::test_pattern`].
    pub fn new(geometry: Geometry) -> Self {
        Self::with_framebuffer(geometry, Self::test_pattern(geometry))
    }

    /// `framebuffer` holds the native screen, `width * height * 2` bytes.
    pub fn with_framebuffer(geometry: Geometry, framebuffer: Vec<u8>) -> Self {
        Self {
            geometry,
            framebuffer,
            paused: false,
            muted: false,
            line: Vec::new(),
            received: Vec::new(),
            outgoing: VecDeque::new(),
            read_calls: 0,
        }
    }

    /// A deterministic screen where neighbouring pixels differ in every channel.
    pub fn test_pattern(geometry: Geometry) -> Vec<u8> {
        (0..geometry.pixel_count())
            .flat_map(|i| {
                let row = (i / geometry.width.max(1)) as u16;
                (i as u16).wrapping_mul(0x9E37).wrapping_add(row).to_be_bytes()
            })
            .collect()
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Stops answering; subsequent reads find nothing.
    pub fn mute(&mut self) {
        self.muted = true;
    }

    /// Everything the host has written so far.
    pub fn received(&self) -> &[u8] {
        &self.received
    }

    /// Number of `read` calls served so far.
    pub fn read_calls(&self) -> usize {
        self.read_calls
    }

    /// Queues the framebuffer for reading, split into device-sized bursts.
    pub fn queue_frame(&mut self) {
        let bursts = self.frame_bursts();
        self.outgoing.extend(bursts);
    }

    fn frame_bursts(&self) -> Vec<Vec<u8>> {
        self.framebuffer
            .chunks(self.geometry.burst_size().max(1))
            .map(<[u8]>::to_vec)
            .collect()
    }

    /// Executes one shell line and returns the output bursts, without echo
    /// and prompt.
    pub fn process_command(&mut self, line: &str) -> Result<Vec<Vec<u8>>, CommandError> {
        let name = match line.split_whitespace().next() {
            Some(name) => name,
            None => return Ok(Vec::new()),
        };
        match name {
            "pause" => {
                self.paused = true;
                Ok(Vec::new())
            }
            "resume" => {
                self.paused = false;
                Ok(Vec::new())
            }
            "capture" => Ok(self.frame_bursts()),
            "version" => Ok(vec![b"1.0.0-sim\r\n".to_vec()]),
            "info" => Ok(vec![format!(
                "NanoVNA simulator\r\n{}x{} RGB565 display\r\n",
                self.geometry.width, self.geometry.height
            )
            .into_bytes()]),
            other => Err(CommandError::UnknownCommand(other.to_string())),
        }
    }

    fn respond(&mut self, line: Vec<u8>) {
        if self.muted {
            return;
        }
        let mut echo = line.clone();
        echo.extend_from_slice(b"\r\n");
        self.outgoing.push_back(echo);

        let text = String::from_utf8_lossy(&line).into_owned();
        match self.process_command(&text) {
            Ok(bursts) => self.outgoing.extend(bursts),
            Err(CommandError::UnknownCommand(name)) => {
                self.outgoing.push_back(format!("{}?\r\n", name).into_bytes())
            }
        }
        self.outgoing.push_back(PROMPT.to_vec());
    }
}

impl Read for Simulator {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.read_calls += 1;
        let burst = match self.outgoing.front_mut() {
            Some(burst) => burst,
            None => return Ok(0),
        };
        let n = buf.len().min(burst.len());
        buf[..n].copy_from_slice(&burst[..n]);
        if n == burst.len() {
            self.outgoing.pop_front();
        } else {
            burst.drain(..n);
        }
        Ok(n)
    }
}

impl Write for Simulator {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.received.extend_from_slice(buf);
        for &byte in buf {
            match byte {
                b'\r' => {
                    let line = std::mem::take(&mut self.line);
                    self.respond(line);
                }
                b'\n' => {}
                _ => self.line.push(byte),
            }
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
