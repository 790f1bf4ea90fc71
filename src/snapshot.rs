//! Writes RGB888 screenshots as PNG, or as binary PPM for `.ppm` targets.
//!
//! The encoded image is assembled in memory and written in one go, so a
//! failing encoder leaves no file behind.

use std::fs;
use std::path::Path;

use tracing::info;

use crate::error::{Error, Result};

/// Chooses the format from the file name and writes the image.
pub fn write_image(
    path: &Path,
    width: u32,
    height: u32,
    rgb: &[u8],
    title: Option<&str>,
) -> Result<()> {
    let data = pixel_data(width, height, rgb)?;
    let encoded = if is_ppm(path) {
        encode_ppm(width, height, data, title)
    } else {
        encode_png(width, height, data, title)?
    };
    fs::write(path, &encoded).map_err(|source| Error::Output {
        path: path.to_path_buf(),
        source,
    })?;
    info!(path = %path.display(), bytes = encoded.len(), "image written");
    Ok(())
}

fn is_ppm(path: &Path) -> bool {
    path.to_string_lossy().ends_with(".ppm")
}

fn pixel_data(width: u32, height: u32, rgb: &[u8]) -> Result<&[u8]> {
    let needed = width as usize * height as usize * 3;
    rgb.get(..needed).ok_or(Error::BufferTooSmall {
        needed,
        actual: rgb.len(),
    })
}

/// 8-bit RGB PNG with an optional `Title` text chunk.
pub fn encode_png(width: u32, height: u32, rgb: &[u8], title: Option<&str>) -> Result<Vec<u8>> {
    let data = pixel_data(width, height, rgb)?;
    let mut encoded = Vec::new();
    {
        let mut encoder = png::Encoder::new(&mut encoded, width, height);
        encoder.set_color(png::ColorType::Rgb);
        encoder.set_depth(png::BitDepth::Eight);
        if let Some(title) = title {
            encoder.add_text_chunk("Title".to_string(), title.to_string())?;
        }
        let mut writer = encoder.write_header()?;
        writer.write_image_data(data)?;
        writer.finish()?;
    }
    Ok(encoded)
}

/// Binary portable pixmap: `P6`, an optional `# title` comment line, the
/// dimensions with a max value of 255, then the raw pixels. Line breaks in
/// the title become spaces so the comment stays on one header line.
pub fn encode_ppm(width: u32, height: u32, rgb: &[u8], title: Option<&str>) -> Vec<u8> {
    let mut encoded = b"P6\n".to_vec();
    if let Some(title) = title {
        let title = title.replace(['\r', '\n'], " ");
        encoded.extend_from_slice(format!("# {}\n", title).as_bytes());
    }
    encoded.extend_from_slice(format!("{} {} 255\n", width, height).as_bytes());
    encoded.extend_from_slice(rgb);
    encoded
}
