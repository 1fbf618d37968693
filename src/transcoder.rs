//! # Image Transcoder Module
//!
//! Trasformazione pura: bytes raster in ingresso, bytes WebP in uscita.
//!
//! ## Responsabilità:
//! - Decodifica JPEG/PNG in memoria con il crate `image`
//! - Encoding WebP lossy a qualità configurabile (libwebp via `webp-encoder`)
//! - Nessun side effect di I/O: lettura e scrittura dei file sono del chiamante
//!
//! ## Errori:
//! - `PipelineError::Decode` se l'input non è un raster supportato
//! - `PipelineError::Encode` se l'encoder fallisce
//!
//! I file vuoti non arrivano mai qui: vengono scartati dalla policy a monte.
//! A parità di versione dell'encoder e di input l'output è deterministico.

use crate::error::PipelineError;
use image::codecs::webp::{WebPEncoder, WebPQuality};
use image::{ColorType, DynamicImage};

/// Lossy WebP transcoder
#[derive(Debug, Clone, Copy)]
pub struct WebPTranscoder {
    quality: u8,
}

impl WebPTranscoder {
    /// Create a transcoder; quality is clamped to 1..=100
    pub fn new(quality: u8) -> Self {
        Self {
            quality: quality.clamp(1, 100),
        }
    }

    pub fn quality(&self) -> u8 {
        self.quality
    }

    /// Decode `source` and re-encode it as WebP
    pub fn transcode(&self, source: &[u8]) -> Result<Vec<u8>, PipelineError> {
        let image = decode(source)?;
        self.encode(&image)
    }

    /// Encode an already decoded image
    #[allow(deprecated)]
    pub fn encode(&self, image: &DynamicImage) -> Result<Vec<u8>, PipelineError> {
        let mut output = Vec::new();
        let encoder = WebPEncoder::new_with_quality(&mut output, WebPQuality::lossy(self.quality));

        // libwebp only takes 8-bit RGB(A)
        let result = if image.color().has_alpha() {
            let rgba = image.to_rgba8();
            encoder.encode(rgba.as_raw(), rgba.width(), rgba.height(), ColorType::Rgba8)
        } else {
            let rgb = image.to_rgb8();
            encoder.encode(rgb.as_raw(), rgb.width(), rgb.height(), ColorType::Rgb8)
        };

        result.map_err(|e| PipelineError::Encode(e.to_string()))?;

        if output.is_empty() {
            return Err(PipelineError::Encode("encoder produced no data".into()));
        }
        Ok(output)
    }
}

/// Decode raster bytes, guessing the format from the content
pub fn decode(source: &[u8]) -> Result<DynamicImage, PipelineError> {
    if source.is_empty() {
        return Err(PipelineError::Decode("empty input".into()));
    }
    image::load_from_memory(source).map_err(|e| PipelineError::Decode(e.to_string()))
}


#[cfg(test)]
mod tests {
    use super::test_images::*;
    use super::*;

    fn is_webp(bytes: &[u8]) -> bool {
        bytes.len() > 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WEBP"
    }

    #[test]
    fn test_transcode_jpeg_to_webp() {
        let transcoder = WebPTranscoder::new(80);
        let output = transcoder.transcode(&jpeg_bytes(64, 48)).unwrap();
        assert!(is_webp(&output));
    }

    #[test]
    fn test_transcode_png_with_alpha() {
        let transcoder = WebPTranscoder::new(80);
        let output = transcoder.transcode(&png_rgba_bytes(32, 32)).unwrap();
        assert!(is_webp(&output));
    }

    #[test]
    fn test_transcode_is_deterministic() {
        let transcoder = WebPTranscoder::new(75);
        let source = png_bytes(40, 40);
        assert_eq!(transcoder.transcode(&source).unwrap(), transcoder.transcode(&source).unwrap());
    }

    #[test]
    fn test_transcode_rejects_garbage() {
        let transcoder = WebPTranscoder::new(80);
        let err = transcoder.transcode(b"definitely not an image").unwrap_err();
        assert!(matches!(err, PipelineError::Decode(_)));
    }

    #[test]
    fn test_transcode_rejects_empty() {
        let err = WebPTranscoder::new(80).transcode(&[]).unwrap_err();
        assert!(matches!(err, PipelineError::Decode(_)));
    }

    #[test]
    fn test_quality_clamped() {
        assert_eq!(WebPTranscoder::new(0).quality(), 1);
        assert_eq!(WebPTranscoder::new(200).quality(), 100);
    }
}
