//! QR payload extraction from uploaded images.
//!
//! Uploads are decoded with the `image` crate, reduced to 8-bit luminance
//! (the layout the detector works on) and handed to `rqrr`, which locates
//! candidate symbols and decodes them.

use axum::body::Bytes;
use image::{GrayImage, ImageError, ImageReader, Limits};
use std::io::Cursor;
use thiserror::Error;
use tracing::{debug, instrument};

/// Errors that prevent an image from being inspected at all
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("Failed to decode image: {0}")]
    Image(#[from] ImageError),

    #[error("QR decode task failed: {0}")]
    Worker(String),
}

/// What a successfully processed image contained
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QrOutcome {
    /// Text of the first decodable symbol
    Payload(String),
    /// No symbol found, or none could be decoded
    Absent,
}

/// Single-shot QR decoder
#[derive(Debug, Clone)]
pub struct QrDecoder {
    max_alloc_bytes: u64,
}

impl QrDecoder {
    /// Decoder refusing images whose decoded size exceeds `max_pixels`
    /// RGBA pixels
    pub fn new(max_pixels: u64) -> Self {
        Self {
            max_alloc_bytes: max_pixels.saturating_mul(4),
        }
    }

    /// Decode on the blocking pool
    #[instrument(skip(self, data), fields(size_bytes = data.len()))]
    pub async fn decode(&self, data: Bytes) -> Result<QrOutcome, DecodeError> {
        let decoder = self.clone();

        tokio::task::spawn_blocking(move || decoder.decode_bytes(&data))
            .await
            .map_err(|e| DecodeError::Worker(e.to_string()))?
    }

    /// Decode `data` on the current thread
    pub fn decode_bytes(&self, data: &[u8]) -> Result<QrOutcome, DecodeError> {
        let mut reader = ImageReader::new(Cursor::new(data))
            .with_guessed_format()
            .map_err(ImageError::IoError)?;

        let mut limits = Limits::default();
        limits.max_alloc = Some(self.max_alloc_bytes);
        reader.limits(limits);

        let frame = reader.decode()?.to_luma8();
        debug!(
            width = frame.width(),
            height = frame.height(),
            "Image decoded for QR detection"
        );

        Ok(detect(&frame))
    }
}

impl Default for QrDecoder {
    fn default() -> Self {
        Self::new(40_000_000)
    }
}

fn detect(frame: &GrayImage) -> QrOutcome {
    let mut prepared = rqrr::PreparedImage::prepare_from_greyscale(
        frame.width() as usize,
        frame.height() as usize,
        |x, y| frame.get_pixel(x as u32, y as u32)[0],
    );

    let grids = prepared.detect_grids();
    debug!(candidates = grids.len(), "QR grids detected");

    for grid in grids {
        match grid.decode() {
            Ok((_, content)) if !content.is_empty() => return QrOutcome::Payload(content),
            Ok(_) => debug!("QR grid decoded to an empty payload"),
            Err(e) => debug!(error = %e, "QR grid could not be decoded"),
        }
    }

    QrOutcome::Absent
}
