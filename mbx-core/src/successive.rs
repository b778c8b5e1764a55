//! Progressive rendering by successive refinement.
//!
//! The first pass evaluates one pixel per `chunk_size x chunk_size` block and paints each block
//! solid. Each following pass halves the chunk size. A new block origin whose parent (the
//! enclosing origin of the previous pass) is surrounded by eight same-escape-count neighbours
//! copies the parent's result instead of evaluating.
//!
//! Origins of one pass are filled in parallel across the current rayon pool.
//!
//! This is a heuristic: a small feature that slips between the sampled neighbours is copied
//! over rather than computed, so the final pass is not guaranteed to match a full render
//! pixel for pixel. Use [`RenderedImage::render`] when exact output matters.

use image::RgbImage;
use rayon::prelude::*;

use crate::{
    mandelbrot::{self, PointResult},
    CancelToken, ColorMapper, Error, PixelGrid, RenderRequest, RenderedImage, Viewport,
};

/// Default size of the blocks painted by the first pass.
pub const COARSEST_CHUNK: usize = 16;

enum Origin {
    Evaluated(PointResult),
    Copied(PointResult),
}

/// Counters for one refinement pass.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct RefineStep {
    /// Block size this pass evaluated at and painted with.
    pub chunk_size: usize,
    pub evaluated: usize,
    pub copied: usize,
    /// Whether this was the last pass.
    pub done: bool,
}

#[derive(Debug)]
pub struct SuccessiveRefiner {
    request: RenderRequest,
    viewport: Viewport,
    mapper: ColorMapper,
    grid: PixelGrid,
    pixels: RgbImage,
    coarsest: usize,
    chunk_size: usize,
    done: bool,
}

impl SuccessiveRefiner {
    pub fn new(request: RenderRequest) -> Result<Self, Error> {
        Self::with_chunk_size(request, COARSEST_CHUNK)
    }

    /// Starts from blocks of `chunk_size`, which must be a power of two.
    pub fn with_chunk_size(request: RenderRequest, chunk_size: usize) -> Result<Self, Error> {
        let viewport = request.validate()?;
        if !chunk_size.is_power_of_two() {
            return Err(Error::InvalidArgument(format!(
                "chunk size must be a power of two: {}",
                chunk_size
            )));
        }
        Ok(SuccessiveRefiner {
            mapper: ColorMapper::new(request.scheme),
            grid: PixelGrid::new(viewport.size()),
            pixels: RgbImage::new(viewport.width() as u32, viewport.height() as u32),
            request,
            viewport,
            coarsest: chunk_size,
            chunk_size,
            done: false,
        })
    }

    /// Block size the next pass will use.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    /// The image as painted by the last pass.
    pub fn pixels(&self) -> &RgbImage {
        &self.pixels
    }

    pub fn grid(&self) -> &PixelGrid {
        &self.grid
    }

    /// Runs one pass. Returns None once the final (single-pixel) pass has completed.
    pub fn refine(&mut self) -> Result<Option<RefineStep>, Error> {
        self.refine_cancellable(&CancelToken::new())
    }

    /// Runs one pass, checking `cancel` between rows. A cancelled pass changes nothing, so a
    /// retry repeats it.
    pub fn refine_cancellable(
        &mut self,
        cancel: &CancelToken,
    ) -> Result<Option<RefineStep>, Error> {
        if self.done {
            return Ok(None);
        }
        let chunk = self.chunk_size;
        let (evaluated, copied) = self.scan(cancel)?;
        self.paint()?;

        let done = chunk == 1;
        if done {
            self.done = true;
        } else {
            self.chunk_size /= 2;
        }
        tracing::debug!(chunk, evaluated, copied, "refinement pass");
        Ok(Some(RefineStep {
            chunk_size: chunk,
            evaluated,
            copied,
            done,
        }))
    }

    /// Runs every remaining pass and returns the finished image.
    pub fn finish(mut self) -> Result<RenderedImage, Error> {
        let span = tracing::info_span!("refine", chunk = self.chunk_size);
        let _guard = span.enter();
        while self.refine()?.is_some() {}
        self.into_image()
    }

    /// Converts a finished refinement into a [`RenderedImage`].
    pub fn into_image(self) -> Result<RenderedImage, Error> {
        if !self.done {
            return Err(Error::InvalidArgument(format!(
                "refinement has not finished; next chunk size is {}",
                self.chunk_size
            )));
        }
        let grid = self.grid.into_complete()?;
        Ok(RenderedImage::from_grid(self.viewport, &self.request, grid))
    }

    /// Fills in the block origins of the current chunk size, rows split across the current
    /// rayon pool.
    ///
    /// Every decision reads only cells set by coarser passes, so origins within a pass are
    /// independent of each other.
    fn scan(&mut self, cancel: &CancelToken) -> Result<(usize, usize), Error> {
        let chunk = self.chunk_size;
        let width = self.viewport.width();
        let this = &*self;

        let rows: Vec<Vec<(usize, usize, Origin)>> = (0..self.viewport.height())
            .into_par_iter()
            .step_by(chunk)
            .map(|y| {
                if cancel.is_cancelled() {
                    return Err(Error::Cancelled);
                }
                (0..width)
                    .step_by(chunk)
                    // Set cells were evaluated by a coarser pass.
                    .filter(|&x| this.grid.get(x, y).is_none())
                    .map(|x| Ok((x, y, this.fill(x, y)?)))
                    .collect::<Result<Vec<_>, Error>>()
            })
            .collect::<Result<_, Error>>()?;

        let (mut evaluated, mut copied) = (0, 0);
        for (x, y, origin) in rows.into_iter().flatten() {
            let result = match origin {
                Origin::Evaluated(result) => {
                    evaluated += 1;
                    result
                }
                Origin::Copied(result) => {
                    copied += 1;
                    result
                }
            };
            self.grid.set(x, y, result);
        }
        Ok((evaluated, copied))
    }

    fn fill(&self, x: usize, y: usize) -> Result<Origin, Error> {
        let chunk = self.chunk_size;
        if chunk < self.coarsest {
            let parent_x = x - x % (2 * chunk);
            let parent_y = y - y % (2 * chunk);
            if let Some(parent) = self.uniform_parent(parent_x, parent_y)? {
                return Ok(Origin::Copied(parent));
            }
        }
        let point = self.viewport.point_at(x, y);
        Ok(Origin::Evaluated(mandelbrot::escape(point, self.request.max_iterations)))
    }

    /// The parent's result, if all eight in-bounds neighbours of the parent (spaced one parent
    /// block apart) share its escape count.
    fn uniform_parent(
        &self,
        parent_x: usize,
        parent_y: usize,
    ) -> Result<Option<PointResult>, Error> {
        let parent = *self.grid.get(parent_x, parent_y).ok_or_else(|| {
            Error::Internal(format!(
                "parent block at {}, {} was never evaluated",
                parent_x, parent_y
            ))
        })?;
        let step = 2 * self.chunk_size as isize;
        let (width, height) = (self.viewport.width() as isize, self.viewport.height() as isize);
        for dy in [-step, 0, step] {
            for dx in [-step, 0, step] {
                let (x, y) = (parent_x as isize + dx, parent_y as isize + dy);
                if x < 0 || y < 0 || x >= width || y >= height {
                    continue;
                }
                match self.grid.get(x as usize, y as usize) {
                    Some(neighbour) if neighbour.escape_iter == parent.escape_iter => (),
                    _ => return Ok(None),
                }
            }
        }
        Ok(Some(parent))
    }

    /// Paints every block of the current chunk size with its origin's color.
    fn paint(&mut self) -> Result<(), Error> {
        let chunk = self.chunk_size;
        let (width, height) = (self.viewport.width(), self.viewport.height());
        for y in (0..height).step_by(chunk) {
            for x in (0..width).step_by(chunk) {
                let result = self.grid.get(x, y).ok_or_else(|| {
                    Error::Internal(format!("unset result at block origin {}, {}", x, y))
                })?;
                let color = self.mapper.color_of(result, &self.request.colors);
                for py in y..(y + chunk).min(height) {
                    for px in x..(x + chunk).min(width) {
                        self.pixels.put_pixel(px as u32, py as u32, color);
                    }
                }
            }
        }
        Ok(())
    }
}
