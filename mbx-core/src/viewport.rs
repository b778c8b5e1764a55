//! Mapping between the integral pixel plane and a window of the complex plane.
//!
//! The window is described by its center and its "zoom": the imaginary extent of the window.
//! The real extent follows from the aspect ratio of the pixel plane, so pixels stay square.
//! Row 0 is the top edge of the window; the imaginary axis grows upward.

use crate::{Complex, Error, Size};

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Viewport {
    size: Size,
    center: Complex,
    zoom: f64,
}

impl Viewport {
    /// Creates a viewport, rejecting empty pixel planes and non-positive or non-finite zooms.
    ///
    /// Each dimension must fit an image buffer (`u32`), and the pixel count must fit `usize`.
    pub fn new(size: Size, center: Complex, zoom: f64) -> Result<Self, Error> {
        if size.width == 0 || size.height == 0 {
            return Err(Error::InvalidArgument(format!(
                "image dimensions must be positive: {} x {}",
                size.width, size.height
            )));
        }
        if u32::try_from(size.width).is_err() || u32::try_from(size.height).is_err() {
            return Err(Error::InvalidArgument(format!(
                "image dimensions must fit in 32 bits: {} x {}",
                size.width, size.height
            )));
        }
        if size.width.checked_mul(size.height).is_none() {
            return Err(Error::InvalidArgument(format!(
                "image dimensions overflow: {} x {}",
                size.width, size.height
            )));
        }
        if !(zoom.is_finite() && zoom > 0.0) {
            return Err(Error::InvalidArgument(format!(
                "zoom must be positive and finite: {}",
                zoom
            )));
        }
        if !center.is_finite() {
            return Err(Error::InvalidArgument(format!(
                "center must be finite: {}",
                center
            )));
        }
        Ok(Viewport { size, center, zoom })
    }

    pub fn size(&self) -> Size {
        self.size
    }

    pub fn width(&self) -> usize {
        self.size.width
    }

    pub fn height(&self) -> usize {
        self.size.height
    }

    pub fn center(&self) -> Complex {
        self.center
    }

    pub fn zoom(&self) -> f64 {
        self.zoom
    }

    /// Total number of pixels.
    pub fn len(&self) -> usize {
        self.size.width * self.size.height
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Horizontal extent of the window.
    pub fn real_range(&self) -> f64 {
        self.zoom / self.size.height as f64 * self.size.width as f64
    }

    fn min_real(&self) -> f64 {
        self.center.re - self.real_range() / 2.0
    }

    fn min_imag(&self) -> f64 {
        self.center.im - self.zoom / 2.0
    }

    /// The complex point sampled by the pixel at `(x, y)`.
    pub fn point_at(&self, x: usize, y: usize) -> Complex {
        let (width, height) = (self.size.width as f64, self.size.height as f64);
        let re = self.min_real() + self.real_range() / width * x as f64;
        let im = self.min_imag() + self.zoom / height * (height - y as f64);
        Complex { re, im }
    }

    /// The pixel whose sample point lies nearest to `point`, if it falls inside the window.
    pub fn pixel_of(&self, point: Complex) -> Option<(usize, usize)> {
        let (width, height) = (self.size.width as f64, self.size.height as f64);
        let x = ((point.re - self.min_real()) * width / self.real_range()).round();
        let y = (height - (point.im - self.min_imag()) * height / self.zoom).round();
        if !(x >= 0.0 && x < width && y >= 0.0 && y < height) {
            return None;
        }
        Some((x as usize, y as usize))
    }

    /// A viewport with the same pixel plane, looking at a different window.
    pub fn zoomed(&self, center: Complex, zoom: f64) -> Result<Self, Error> {
        Viewport::new(self.size, center, zoom)
    }
}
