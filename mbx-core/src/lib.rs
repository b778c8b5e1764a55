//! Library code for the Mandelbrot explorer.
//!
//! Data flows one way: a [`RenderRequest`] is mapped through a [`Viewport`] to one complex
//! point per pixel; [`mandelbrot::escape`] turns each point into a [`PointResult`]; a
//! [`ColorMapper`] turns each result into a pixel of a [`RenderedImage`].
//! [`SuccessiveRefiner`] produces the same image progressively, coarse blocks first.

pub mod cancel;
pub mod color;
pub mod complex;
mod error;
pub mod gradient;
pub mod grid;
pub mod mandelbrot;
pub mod record;
pub mod rendered;
pub mod successive;
pub mod viewport;

pub use cancel::CancelToken;
pub use color::{Color, ColorMapper, ColorParameters, ColorScheme};
pub use complex::Complex;
pub use error::Error;
pub use gradient::{ColorStop, Gradient};
pub use grid::PixelGrid;
pub use mandelbrot::PointResult;
pub use record::ImageRecord;
pub use rendered::RenderedImage;
pub use successive::SuccessiveRefiner;
pub use viewport::Viewport;

/// A pair of integer (width, height) dimensions.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Size {
    pub width: usize,
    pub height: usize,
}

/// Default fraction of the zoom used as the distance-overlay threshold.
pub const DEFAULT_FILAMENT_SIZE: f64 = 0.01;

/// Everything needed to compute and color one image.
#[derive(Clone, Debug, PartialEq)]
pub struct RenderRequest {
    pub size: Size,
    pub center: Complex,
    /// Imaginary extent of the window.
    pub zoom: f64,
    pub max_iterations: u32,
    pub scheme: ColorScheme,
    pub colors: ColorParameters,
}

impl Default for RenderRequest {
    fn default() -> Self {
        let zoom = 3.0;
        RenderRequest {
            size: Size {
                width: 500,
                height: 500,
            },
            center: Complex::new(-0.5, 0.0),
            zoom,
            max_iterations: 1000,
            scheme: ColorScheme::DiscreteBands,
            colors: ColorParameters::for_zoom(zoom, DEFAULT_FILAMENT_SIZE),
        }
    }
}

impl RenderRequest {
    /// Checks every parameter, returning the window transform for valid requests.
    pub fn validate(&self) -> Result<Viewport, Error> {
        if self.max_iterations == 0 {
            return Err(Error::InvalidArgument(
                "maximum iteration count must be positive".to_string(),
            ));
        }
        self.colors.validate()?;
        Viewport::new(self.size, self.center, self.zoom)
    }

    /// Iteration budget used when exploring: deeper zooms get more iterations.
    pub fn explorer_iterations(zoom: f64) -> u32 {
        if zoom < 2e-4 {
            2000
        } else {
            1000
        }
    }
}
