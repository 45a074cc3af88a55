//! Invisible watermark applied to every image before it is persisted.

use crate::error::WatermarkError;
use image::RgbImage;

/// Embeds a provenance signature. Stateless per call and order independent.
pub trait WatermarkEncoder {
    fn encode(&self, image: RgbImage) -> Result<RgbImage, WatermarkError>;
}

/// Writes the signature bits, repeated, into the least significant bit of the blue channel in
/// raster order.
#[derive(Debug, Clone)]
pub struct SignatureWatermark {
    bits: Vec<u8>,
}

impl SignatureWatermark {
    pub fn new(signature: &str) -> Result<Self, WatermarkError> {
        if signature.is_empty() {
            return Err(WatermarkError::EmptySignature);
        }
        let bits = signature
            .as_bytes()
            .iter()
            .flat_map(|byte| (0..8).rev().map(move |shift| (byte >> shift) & 1))
            .collect();
        Ok(Self { bits })
    }

    pub fn bit_len(&self) -> usize {
        self.bits.len()
    }

    /// Read back `len` signature bytes from the start of the image.
    pub fn decode(image: &RgbImage, len: usize) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(len);
        let mut current = 0u8;
        for (i, pixel) in image.pixels().take(len * 8).enumerate() {
            current = (current << 1) | (pixel.0[2] & 1);
            if i % 8 == 7 {
                bytes.push(current);
                current = 0;
            }
        }
        bytes
    }
}

impl WatermarkEncoder for SignatureWatermark {
    fn encode(&self, mut image: RgbImage) -> Result<RgbImage, WatermarkError> {
        let capacity = image.width() as usize * image.height() as usize;
        if capacity < self.bits.len() {
            return Err(WatermarkError::ImageTooSmall {
                width: image.width(),
                height: image.height(),
                bits: self.bits.len(),
            });
        }
        for (pixel, bit) in image.pixels_mut().zip(self.bits.iter().cycle()) {
            pixel.0[2] = (pixel.0[2] & !1) | bit;
        }
        Ok(image)
    }
}
