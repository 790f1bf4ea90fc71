//! Screen geometry, the shared native/RGB frame buffer and chunked frame
//! acquisition.

use std::io::{Read, Write};

use tracing::{debug, trace, warn};

use crate::error::{Error, Result};
use crate::pixel::{convert_565_to_888, fix_known_artifact};
use crate::transport::Connection;

pub const NATIVE_BYTES_PER_PIXEL: usize = 2;
pub const RGB_BYTES_PER_PIXEL: usize = 3;

// The device streams the frame two raster lines at a time.
const LINES_PER_BURST: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    pub width: usize,
    pub height: usize,
}

impl Geometry {
    /// The analyzer's 320x240 display.
    pub const NANOVNA: Geometry = Geometry {
        width: 320,
        height: 240,
    };

    /// The 4" models (NanoVNA-H4, tinySA Ultra) with a 480x320 display.
    pub const NANOVNA_H4: Geometry = Geometry {
        width: 480,
        height: 320,
    };

    pub fn pixel_count(&self) -> usize {
        self.width * self.height
    }

    /// Bytes of one native raster line.
    pub fn line_bytes(&self) -> usize {
        self.width * NATIVE_BYTES_PER_PIXEL
    }

    pub fn native_size(&self) -> usize {
        self.pixel_count() * NATIVE_BYTES_PER_PIXEL
    }

    pub fn rgb_size(&self) -> usize {
        self.pixel_count() * RGB_BYTES_PER_PIXEL
    }

    /// Size of one burst as sent by the device.
    pub fn burst_size(&self) -> usize {
        self.line_bytes() * LINES_PER_BURST
    }
}

impl Default for Geometry {
    fn default() -> Self {
        Self::NANOVNA
    }
}

/// One allocation sized for the RGB888 form. The native frame occupies its
/// first `native_size()` bytes and is converted in place.
#[derive(Debug, Clone)]
pub struct FrameBuffer {
    geometry: Geometry,
    data: Vec<u8>,
}

impl FrameBuffer {
    pub fn new(geometry: Geometry) -> Self {
        Self {
            geometry,
            data: vec![0; geometry.rgb_size()],
        }
    }

    pub fn geometry(&self) -> Geometry {
        self.geometry
    }

    pub fn native(&self) -> &[u8] {
        &self.data[..self.geometry.native_size()]
    }

    pub fn native_mut(&mut self) -> &mut [u8] {
        let size = self.geometry.native_size();
        &mut self.data[..size]
    }

    /// Clears the last-column artifact, converts to RGB888 and returns the
    /// row-major RGB bytes.
    pub fn into_rgb(mut self) -> Result<Vec<u8>> {
        let Geometry { width, height } = self.geometry;
        fix_known_artifact(&mut self.data, width, height);
        convert_565_to_888(&mut self.data, width * height)?;
        Ok(self.data)
    }
}

/// Pulls a frame of known size through a connection in fixed-size chunks.
#[derive(Debug, Clone, Copy)]
pub struct FrameAcquirer {
    chunk_size: usize,
}

impl FrameAcquirer {
    /// Reads in bursts of two raster lines of `geometry`.
    pub fn new(geometry: Geometry) -> Self {
        Self::with_chunk_size(geometry.burst_size())
    }

    pub fn with_chunk_size(chunk_size: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Fills `dest` completely, tolerating short reads. A silent or failing
    /// read aborts with [`Error::AcquisitionFailed`]; a partial frame is never
    /// returned as success.
    pub fn read_frame<P: Read + Write>(
        &self,
        conn: &mut Connection<P>,
        dest: &mut [u8],
    ) -> Result<()> {
        let expected = dest.len();
        let mut received = 0;
        let mut reads = 0usize;
        while received < expected {
            let end = expected.min(received + self.chunk_size);
            match conn.read_chunk(&mut dest[received..end]) {
                Ok(n) => {
                    received += n;
                    reads += 1;
                    trace!(got = n, total = received, "frame chunk");
                }
                Err(source) => {
                    warn!(received, expected, "frame transfer aborted: {}", source);
                    return Err(Error::AcquisitionFailed {
                        received,
                        expected,
                        source: Box::new(source),
                    });
                }
            }
        }
        debug!(bytes = received, reads, "frame received");
        Ok(())
    }

    /// Like [`read_frame`] but allocates a buffer of exactly `total_size`.
    ///
    /// [`read_frame`]: FrameAcquirer::read_frame
    pub fn acquire<P: Read + Write>(
        &self,
        conn: &mut Connection<P>,
        total_size: usize,
    ) -> Result<Vec<u8>> {
        let mut frame = vec![0; total_size];
        self.read_frame(conn, &mut frame)?;
        Ok(frame)
    }
}
