//! Image dimensions straight from the container header (JPEG SOF, PNG IHDR)
//! and the coarse orientation classification built on them.

use serde::{Deserialize, Serialize};

const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

/// Coarse aspect-ratio class used to pick a layout height
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    Horizontal,
    Vertical,
    Square,
}

impl Orientation {
    /// ratio > 1.2 is horizontal, ratio < 0.8 is vertical, the boundaries are square
    pub fn classify(width: u32, height: u32) -> Self {
        if width == 0 || height == 0 {
            return Orientation::Horizontal;
        }

        let ratio = width as f64 / height as f64;
        if ratio > 1.2 {
            Orientation::Horizontal
        } else if ratio < 0.8 {
            Orientation::Vertical
        } else {
            Orientation::Square
        }
    }

    /// Classify raw file bytes; undeterminable dimensions fall back to horizontal
    pub fn from_header(bytes: &[u8]) -> Self {
        probe_dimensions(bytes)
            .map(|(w, h)| Self::classify(w, h))
            .unwrap_or(Orientation::Horizontal)
    }
}

/// (width, height) from a JPEG or PNG header, without decoding pixels
pub fn probe_dimensions(bytes: &[u8]) -> Option<(u32, u32)> {
    if bytes.starts_with(&PNG_SIGNATURE) {
        png_dimensions(bytes)
    } else if bytes.starts_with(&[0xFF, 0xD8]) {
        jpeg_dimensions(bytes)
    } else {
        None
    }
}

fn png_dimensions(bytes: &[u8]) -> Option<(u32, u32)> {
    // signature, chunk length, "IHDR", width, height
    if bytes.len() < 24 || &bytes[12..16] != b"IHDR" {
        return None;
    }
    let width = u32::from_be_bytes(bytes[16..20].try_into().ok()?);
    let height = u32::from_be_bytes(bytes[20..24].try_into().ok()?);
    Some((width, height))
}

fn jpeg_dimensions(bytes: &[u8]) -> Option<(u32, u32)> {
    let mut i = 2;

    while i + 1 < bytes.len() {
        if bytes[i] != 0xFF {
            return None;
        }

        // fill bytes
        let mut marker = bytes[i + 1];
        while marker == 0xFF {
            i += 1;
            marker = *bytes.get(i + 1)?;
        }
        i += 2;

        match marker {
            0x01 | 0xD0..=0xD8 => continue,
            0xD9 | 0xDA => return None,
            _ => {}
        }

        let length = u16::from_be_bytes([*bytes.get(i)?, *bytes.get(i + 1)?]) as usize;
        if length < 2 {
            return None;
        }

        if is_start_of_frame(marker) {
            let segment = bytes.get(i..i + 7)?;
            let height = u16::from_be_bytes([segment[3], segment[4]]) as u32;
            let width = u16::from_be_bytes([segment[5], segment[6]]) as u32;
            return Some((width, height));
        }

        i += length;
    }

    None
}

fn is_start_of_frame(marker: u8) -> bool {
    matches!(marker, 0xC0..=0xCF) && !matches!(marker, 0xC4 | 0xC8 | 0xCC)
}
