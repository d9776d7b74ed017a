//! Raw frame container.
//!
//! A `Frame` is an opaque BGR-ordered 3-channel pixel buffer. The detection
//! engine never interprets frames beyond per-pixel reads and a grayscale
//! projection; acquisition and display belong to the surrounding application.

use anyhow::{anyhow, Result};
use image::{GrayImage, Luma, RgbImage};

/// BGR-ordered raster frame of fixed dimensions.
#[derive(Clone, Debug)]
pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
}

impl Frame {
    /// Wrap a raw BGR byte buffer. Fails when the buffer length does not
    /// match `width * height * 3`.
    pub fn from_bgr(data: Vec<u8>, width: u32, height: u32) -> Result<Self> {
        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|v| v.checked_mul(3))
            .ok_or_else(|| anyhow!("frame dimensions overflow"))?;
        if data.len() != expected {
            return Err(anyhow!(
                "expected {} BGR bytes for {}x{}, received {}",
                expected,
                width,
                height,
                data.len()
            ));
        }
        Ok(Self {
            data,
            width,
            height,
        })
    }

    /// Build a frame from a decoded RGB image (demo/file input path).
    pub fn from_rgb_image(img: &RgbImage) -> Self {
        let (width, height) = img.dimensions();
        let mut data = Vec::with_capacity((width * height * 3) as usize);
        for pixel in img.pixels() {
            let [r, g, b] = pixel.0;
            data.extend_from_slice(&[b, g, r]);
        }
        Self {
            data,
            width,
            height,
        }
    }

    /// Solid-color synthetic frame, used by tests and the demo binary in
    /// place of a live camera.
    pub fn solid(width: u32, height: u32, bgr: [u8; 3]) -> Self {
        let mut data = Vec::with_capacity((width * height * 3) as usize);
        for _ in 0..width * height {
            data.extend_from_slice(&bgr);
        }
        Self {
            data,
            width,
            height,
        }
    }

    /// Paint an axis-aligned rectangle, clipped to the frame bounds.
    pub fn paint_rect(&mut self, x: u32, y: u32, w: u32, h: u32, bgr: [u8; 3]) {
        let x_end = x.saturating_add(w).min(self.width);
        let y_end = y.saturating_add(h).min(self.height);
        for py in y.min(self.height)..y_end {
            for px in x.min(self.width)..x_end {
                let idx = ((py * self.width + px) * 3) as usize;
                self.data[idx..idx + 3].copy_from_slice(&bgr);
            }
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// BGR triple at pixel coordinates. Callers must stay in bounds.
    pub fn bgr_at(&self, x: u32, y: u32) -> [u8; 3] {
        let idx = ((y * self.width + x) * 3) as usize;
        [self.data[idx], self.data[idx + 1], self.data[idx + 2]]
    }

    /// RGB triple at pixel coordinates.
    pub fn rgb_at(&self, x: u32, y: u32) -> [u8; 3] {
        let [b, g, r] = self.bgr_at(x, y);
        [r, g, b]
    }

    /// Grayscale projection using the BT.601 luma weights.
    pub fn to_gray(&self) -> GrayImage {
        let mut gray = GrayImage::new(self.width, self.height);
        for y in 0..self.height {
            for x in 0..self.width {
                let [b, g, r] = self.bgr_at(x, y);
                let luma =
                    0.114 * f32::from(b) + 0.587 * f32::from(g) + 0.299 * f32::from(r);
                gray.put_pixel(x, y, Luma([luma.round() as u8]));
            }
        }
        gray
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_mismatched_buffer_length() {
        assert!(Frame::from_bgr(vec![0u8; 10], 4, 4).is_err());
        assert!(Frame::from_bgr(vec![0u8; 48], 4, 4).is_ok());
    }

    #[test]
    fn paints_and_reads_pixels() {
        let mut frame = Frame::solid(8, 8, [255, 255, 255]);
        frame.paint_rect(2, 2, 3, 3, [0, 0, 255]);

        assert_eq!(frame.bgr_at(0, 0), [255, 255, 255]);
        assert_eq!(frame.bgr_at(3, 3), [0, 0, 255]);
        assert_eq!(frame.rgb_at(3, 3), [255, 0, 0]);
    }

    #[test]
    fn grayscale_uses_luma_weights() {
        let frame = Frame::solid(2, 2, [0, 0, 255]);
        let gray = frame.to_gray();
        assert_eq!(gray.get_pixel(0, 0)[0], 76);
    }

    #[test]
    fn paint_clips_to_bounds() {
        let mut frame = Frame::solid(4, 4, [0, 0, 0]);
        frame.paint_rect(2, 2, 10, 10, [1, 2, 3]);
        assert_eq!(frame.bgr_at(3, 3), [1, 2, 3]);
    }
}
