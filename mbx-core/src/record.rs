//! The persisted form of a [`RenderedImage`](crate::RenderedImage).
//!
//! A record holds the render parameters, the full result grid and the color parameters, so an
//! image can be restored and recolored without recomputation. The on-disk framing is left to
//! the caller: any serde format works.

use serde::{Deserialize, Serialize};

use crate::{
    mandelbrot::{PointResult, UNBOUNDED},
    Complex, Error, Gradient,
};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ImageRecord {
    pub width: usize,
    pub height: usize,
    pub center: Complex,
    pub zoom: f64,
    pub max_iterations: u32,
    pub scheme: crate::ColorScheme,
    pub gradient: GradientRecord,
    pub flux: f64,
    pub show_distance_overlay: bool,
    pub max_distance_rendered: f64,
    /// Row-major, `width * height` entries.
    pub grid: Vec<PointResult>,
}

/// A gradient by name and sampled colors.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GradientRecord {
    pub name: String,
    pub colors: Vec<[u8; 3]>,
}

impl From<&Gradient> for GradientRecord {
    fn from(gradient: &Gradient) -> Self {
        GradientRecord {
            name: gradient.name().to_string(),
            colors: gradient.colors().iter().map(|c| c.0).collect(),
        }
    }
}

impl ImageRecord {
    /// Rejects records that cannot describe a complete image.
    pub fn validate(&self) -> Result<(), Error> {
        if self.width == 0 || self.height == 0 {
            return Err(Error::InvalidArgument(format!(
                "record dimensions must be positive: {} x {}",
                self.width, self.height
            )));
        }
        let expected = self.width.checked_mul(self.height).ok_or_else(|| {
            Error::InvalidArgument(format!(
                "record dimensions overflow: {} x {}",
                self.width, self.height
            ))
        })?;
        if self.grid.len() != expected {
            return Err(Error::InvalidArgument(format!(
                "record grid size != width * height: {} != {} * {}",
                self.grid.len(),
                self.width,
                self.height
            )));
        }
        if self.max_iterations == 0 {
            return Err(Error::InvalidArgument(
                "record maximum iteration count must be positive".to_string(),
            ));
        }
        if self.gradient.colors.is_empty() {
            return Err(Error::InvalidArgument(format!(
                "record gradient {} has no colors",
                self.gradient.name
            )));
        }
        if let Some((offset, cell)) = self
            .grid
            .iter()
            .enumerate()
            .find(|(_, cell)| {
                cell.escape_iter != UNBOUNDED && cell.escape_iter > self.max_iterations
            })
        {
            return Err(Error::InvalidArgument(format!(
                "record cell {} escapes after {} iterations, beyond the limit of {}",
                offset, cell.escape_iter, self.max_iterations
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ColorScheme, RenderedImage};

    fn record(width: usize, height: usize, cells: usize) -> ImageRecord {
        ImageRecord {
            width,
            height,
            center: Complex::new(-0.5, 0.0),
            zoom: 3.0,
            max_iterations: 10,
            scheme: ColorScheme::BlackAndWhite,
            gradient: GradientRecord::from(&Gradient::hue()),
            flux: 0.4,
            show_distance_overlay: false,
            max_distance_rendered: 0.03,
            grid: vec![PointResult::unbounded(Complex::ZERO, true); cells],
        }
    }

    #[test]
    fn accepts_consistent_record() {
        let image = RenderedImage::from_record(record(3, 2, 6)).unwrap();
        assert_eq!(image.width(), 3);
        assert_eq!(image.height(), 2);
        assert!(image
            .pixels()
            .pixels()
            .all(|p| *p == crate::color::INTERIOR));
    }

    #[test]
    fn rejects_mismatched_grid() {
        assert!(matches!(
            RenderedImage::from_record(record(3, 2, 5)),
            Err(Error::InvalidArgument(_))
        ));
        assert!(record(0, 2, 0).validate().is_err());
    }

    #[test]
    fn rejects_out_of_range_cells() {
        let mut bad = record(1, 1, 1);
        bad.grid[0] = PointResult::escaped(Complex::new(3.0, 0.0), 11, 0.1);
        assert!(bad.validate().is_err());
        bad.grid[0].escape_iter = 10;
        assert!(bad.validate().is_ok());
    }

    #[test]
    fn rejects_empty_gradient_and_zero_budget() {
        let mut bad = record(1, 1, 1);
        bad.gradient.colors.clear();
        assert!(bad.validate().is_err());
        let mut bad = record(1, 1, 1);
        bad.max_iterations = 0;
        assert!(bad.validate().is_err());
    }

    #[test]
    fn scheme_serializes_by_name() {
        let json = serde_json::to_string(&ColorScheme::DwellAngleRadius).unwrap();
        assert_eq!(json, "\"dwell-angle-radius\"");
    }
}
