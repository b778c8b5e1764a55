//! A fully computed image: per-pixel escape results plus the pixel buffer colored from them.

use image::RgbImage;

use crate::{
    mandelbrot::{self, PointResult},
    record::{GradientRecord, ImageRecord},
    CancelToken, ColorMapper, ColorParameters, ColorScheme, Complex, Error, Gradient, RenderRequest,
    Size, Viewport,
};

/// The result grid and pixel buffer of one render.
///
/// The grid is always fully populated, so recoloring never fails. Changing the scheme or
/// color parameters takes effect on the next [`RenderedImage::recolor`]; the grid itself is
/// never recomputed.
#[derive(Clone, Debug)]
pub struct RenderedImage {
    viewport: Viewport,
    max_iterations: u32,
    mapper: ColorMapper,
    colors: ColorParameters,
    grid: Vec<PointResult>,
    pixels: RgbImage,
}

impl RenderedImage {
    /// Renders column by column, left to right, with each column split across the current
    /// rayon pool.
    ///
    /// The request is validated before any computation. Progress, if requested, is reported on
    /// the calling thread as a fraction in `[0, 1]` every few columns.
    pub fn render(
        request: &RenderRequest,
        progress: Option<&mut dyn FnMut(f64)>,
        cancel: &CancelToken,
    ) -> Result<Self, Error> {
        let viewport = request.validate()?;
        let span = tracing::info_span!(
            "render",
            width = viewport.width(),
            height = viewport.height()
        );
        let _guard = span.enter();

        let iterations = request.max_iterations;
        let grid = mandelbrot::evaluate_columns(&viewport, iterations, progress, cancel)?;
        tracing::debug!("grid computed");
        Ok(Self::from_grid(viewport, request, grid))
    }

    /// Renders with rows split across the current rayon pool. Produces the same image as
    /// [`RenderedImage::render`].
    pub fn render_parallel(request: &RenderRequest, cancel: &CancelToken) -> Result<Self, Error> {
        let viewport = request.validate()?;
        let span = tracing::info_span!(
            "render-parallel",
            width = viewport.width(),
            height = viewport.height()
        );
        let _guard = span.enter();

        let grid = mandelbrot::evaluate_parallel(&viewport, request.max_iterations, cancel)?;
        tracing::debug!("grid computed");
        Ok(Self::from_grid(viewport, request, grid))
    }

    /// Assembles an image around a complete grid and colors it.
    pub(crate) fn from_grid(
        viewport: Viewport,
        request: &RenderRequest,
        grid: Vec<PointResult>,
    ) -> Self {
        Self::assemble(
            viewport,
            request.max_iterations,
            request.scheme,
            request.colors.clone(),
            grid,
        )
    }

    fn assemble(
        viewport: Viewport,
        max_iterations: u32,
        scheme: ColorScheme,
        colors: ColorParameters,
        grid: Vec<PointResult>,
    ) -> Self {
        debug_assert_eq!(grid.len(), viewport.len());
        let pixels = RgbImage::new(viewport.width() as u32, viewport.height() as u32);
        let mut image = RenderedImage {
            viewport,
            max_iterations,
            mapper: ColorMapper::new(scheme),
            colors,
            grid,
            pixels,
        };
        image.recolor();
        image
    }

    /// Colors every pixel from the grid with the current scheme and parameters.
    pub fn recolor(&mut self) {
        let mapper = self.mapper;
        let colors = &self.colors;
        self.pixels
            .pixels_mut()
            .zip(self.grid.iter())
            .for_each(|(pixel, result)| {
                *pixel = mapper.color_of(result, colors);
            });
    }

    pub fn size(&self) -> Size {
        self.viewport.size()
    }

    pub fn width(&self) -> usize {
        self.viewport.width()
    }

    pub fn height(&self) -> usize {
        self.viewport.height()
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn center(&self) -> Complex {
        self.viewport.center()
    }

    pub fn zoom(&self) -> f64 {
        self.viewport.zoom()
    }

    pub fn max_iterations(&self) -> u32 {
        self.max_iterations
    }

    pub fn pixels(&self) -> &RgbImage {
        &self.pixels
    }

    /// Row-major escape results, one per pixel.
    pub fn grid(&self) -> &[PointResult] {
        &self.grid
    }

    pub fn result_at(&self, x: usize, y: usize) -> Option<&PointResult> {
        if x >= self.width() || y >= self.height() {
            return None;
        }
        self.grid.get(y * self.width() + x)
    }

    /// The complex point sampled by pixel `(x, y)`.
    pub fn point_at(&self, x: usize, y: usize) -> Complex {
        self.viewport.point_at(x, y)
    }

    pub fn scheme(&self) -> ColorScheme {
        self.mapper.scheme()
    }

    pub fn set_scheme(&mut self, scheme: ColorScheme) {
        self.mapper = ColorMapper::new(scheme);
    }

    pub fn colors(&self) -> &ColorParameters {
        &self.colors
    }

    pub fn set_colors(&mut self, colors: ColorParameters) -> Result<(), Error> {
        colors.validate()?;
        self.colors = colors;
        Ok(())
    }

    /// The distance-overlay threshold as a fraction of the zoom.
    pub fn filament_size(&self) -> f64 {
        self.colors.max_distance_rendered / self.zoom()
    }

    /// Sets the distance-overlay threshold to `filament_size * zoom`.
    pub fn set_filament_size(&mut self, filament_size: f64) -> Result<(), Error> {
        if !(0.0..1.0).contains(&filament_size) {
            return Err(Error::InvalidArgument(format!(
                "filament size must be in [0, 1): {}",
                filament_size
            )));
        }
        self.colors.max_distance_rendered = filament_size * self.zoom();
        Ok(())
    }

    /// Captures everything needed to rebuild this image without recomputation.
    pub fn to_record(&self) -> ImageRecord {
        ImageRecord {
            width: self.width(),
            height: self.height(),
            center: self.center(),
            zoom: self.zoom(),
            max_iterations: self.max_iterations,
            scheme: self.scheme(),
            gradient: GradientRecord::from(&self.colors.gradient),
            flux: self.colors.flux,
            show_distance_overlay: self.colors.show_distance_overlay,
            max_distance_rendered: self.colors.max_distance_rendered,
            grid: self.grid.clone(),
        }
    }

    /// Rebuilds an image from a record and recolors it. Structurally invalid records are rejected.
    pub fn from_record(record: ImageRecord) -> Result<Self, Error> {
        record.validate()?;
        let ImageRecord {
            width,
            height,
            center,
            zoom,
            max_iterations,
            scheme,
            gradient,
            flux,
            show_distance_overlay,
            max_distance_rendered,
            grid,
        } = record;

        let viewport = Viewport::new(Size { width, height }, center, zoom)?;
        let colors = ColorParameters {
            gradient: Gradient::from_colors(
                gradient.name,
                gradient.colors.into_iter().map(image::Rgb).collect(),
            )?,
            flux,
            show_distance_overlay,
            max_distance_rendered,
        };
        colors.validate()?;
        Ok(Self::assemble(viewport, max_iterations, scheme, colors, grid))
    }
}
