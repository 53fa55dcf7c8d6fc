//! RGBA slice images exchanged with hosts

use ndarray::Array2;

use crate::error::{Error, Result};

/// One RGBA pixel
pub type Rgba = [u8; 4];

/// A 2D RGBA image, the exchange format for slice import/export.
///
/// Storage is `(row, col)` i.e. `(y, x)`, matching the byte order hosts and
/// texture uploads expect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerImage {
    pixels: Array2<Rgba>,
}

impl LayerImage {
    /// Create a transparent-black layer
    pub fn new(width: i32, height: i32) -> Result<Self> {
        if width <= 0 || height <= 0 {
            return Err(Error::InvalidDimensions {
                width,
                height,
                depth: 1,
            });
        }
        Ok(Self {
            pixels: Array2::from_elem((height as usize, width as usize), [0u8; 4]),
        })
    }

    /// Create a layer filled with one pixel value
    pub fn filled(width: i32, height: i32, pixel: Rgba) -> Result<Self> {
        let mut layer = Self::new(width, height)?;
        layer.fill(pixel);
        Ok(layer)
    }

    /// Rebuild a layer from a tightly packed RGBA byte buffer
    pub fn from_rgba_bytes(width: i32, height: i32, bytes: &[u8]) -> Result<Self> {
        let mut layer = Self::new(width, height)?;
        let expected = width as usize * height as usize * 4;
        if bytes.len() != expected {
            return Err(Error::SizeMismatch {
                expected: expected as u64,
                found: bytes.len() as u64,
            });
        }
        for (i, chunk) in bytes.chunks_exact(4).enumerate() {
            let y = i / width as usize;
            let x = i % width as usize;
            layer.pixels[(y, x)] = [chunk[0], chunk[1], chunk[2], chunk[3]];
        }
        Ok(layer)
    }

    pub fn width(&self) -> i32 {
        self.pixels.ncols() as i32
    }

    pub fn height(&self) -> i32 {
        self.pixels.nrows() as i32
    }

    /// Get the pixel at (x, y)
    pub fn get(&self, x: i32, y: i32) -> Result<Rgba> {
        if x < 0 || y < 0 {
            return Err(self.out_of_bounds(x, y));
        }
        self.pixels
            .get((y as usize, x as usize))
            .copied()
            .ok_or_else(|| self.out_of_bounds(x, y))
    }

    /// Get the pixel at (x, y) without bounds checking
    ///
    /// # Safety
    /// Caller must ensure `0 <= x < width` and `0 <= y < height`
    pub unsafe fn get_unchecked(&self, x: i32, y: i32) -> Rgba {
        unsafe { *self.pixels.uget((y as usize, x as usize)) }
    }

    /// Set the pixel at (x, y)
    pub fn set(&mut self, x: i32, y: i32, pixel: Rgba) -> Result<()> {
        if x < 0 || y < 0 || x >= self.width() || y >= self.height() {
            return Err(self.out_of_bounds(x, y));
        }
        self.pixels[(y as usize, x as usize)] = pixel;
        Ok(())
    }

    /// Set the pixel at (x, y) without bounds checking
    ///
    /// # Safety
    /// Caller must ensure `0 <= x < width` and `0 <= y < height`
    pub unsafe fn set_unchecked(&mut self, x: i32, y: i32, pixel: Rgba) {
        unsafe { *self.pixels.uget_mut((y as usize, x as usize)) = pixel };
    }

    /// Overwrite every pixel
    pub fn fill(&mut self, pixel: Rgba) {
        self.pixels.fill(pixel);
    }

    /// Tightly packed RGBA bytes, row-major top-down
    pub fn as_rgba_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.pixels.len() * 4);
        for pixel in self.pixels.iter() {
            bytes.extend_from_slice(pixel);
        }
        bytes
    }

    fn out_of_bounds(&self, x: i32, y: i32) -> Error {
        Error::IndexOutOfBounds {
            x,
            y,
            z: 0,
            width: self.width(),
            height: self.height(),
            depth: 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layer_creation() {
        let layer = LayerImage::new(8, 5).unwrap();
        assert_eq!(layer.width(), 8);
        assert_eq!(layer.height(), 5);
        assert_eq!(layer.get(0, 0).unwrap(), [0, 0, 0, 0]);
        assert!(LayerImage::new(0, 5).is_err());
    }

    #[test]
    fn test_layer_set_get() {
        let mut layer = LayerImage::new(4, 4).unwrap();
        layer.set(2, 3, [255, 0, 0, 255]).unwrap();
        assert_eq!(layer.get(2, 3).unwrap(), [255, 0, 0, 255]);
        assert!(layer.get(4, 0).is_err());
        assert!(layer.set(-1, 0, [0; 4]).is_err());
    }

    #[test]
    fn test_rgba_bytes_round_trip() {
        let mut layer = LayerImage::new(3, 2).unwrap();
        layer.set(0, 0, [1, 2, 3, 4]).unwrap();
        layer.set(2, 1, [9, 8, 7, 6]).unwrap();

        let bytes = layer.as_rgba_bytes();
        assert_eq!(bytes.len(), 3 * 2 * 4);
        assert_eq!(&bytes[0..4], &[1, 2, 3, 4]);

        let back = LayerImage::from_rgba_bytes(3, 2, &bytes).unwrap();
        assert_eq!(back, layer);
    }

    #[test]
    fn test_from_bytes_validates_length() {
        assert!(matches!(
            LayerImage::from_rgba_bytes(2, 2, &[0u8; 15]),
            Err(Error::SizeMismatch { .. })
        ));
    }
}
