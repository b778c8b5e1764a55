//! Per-pixel result storage.

use crate::{mandelbrot::PointResult, Error, Size};

/// A `width x height` grid of lazily-populated escape results, stored row-major.
///
/// Cells start unset and must all be populated before the grid becomes part of a
/// [`RenderedImage`](crate::RenderedImage).
#[derive(Clone, Debug)]
pub struct PixelGrid {
    size: Size,
    cells: Vec<Option<PointResult>>,
}

impl PixelGrid {
    pub fn new(size: Size) -> Self {
        PixelGrid {
            size,
            cells: vec![None; size.width * size.height],
        }
    }

    pub fn size(&self) -> Size {
        self.size
    }

    #[inline]
    fn offset(&self, x: usize, y: usize) -> usize {
        debug_assert!(x < self.size.width && y < self.size.height);
        y * self.size.width + x
    }

    pub fn get(&self, x: usize, y: usize) -> Option<&PointResult> {
        self.cells[self.offset(x, y)].as_ref()
    }

    pub fn set(&mut self, x: usize, y: usize, value: PointResult) {
        let offset = self.offset(x, y);
        self.cells[offset] = Some(value);
    }

    /// Number of populated cells.
    pub fn populated(&self) -> usize {
        self.cells.iter().filter(|c| c.is_some()).count()
    }

    pub fn is_complete(&self) -> bool {
        self.cells.iter().all(Option::is_some)
    }

    /// Unwraps every cell, failing on the first unset one.
    pub fn into_complete(self) -> Result<Vec<PointResult>, Error> {
        let width = self.size.width;
        self.cells
            .into_iter()
            .enumerate()
            .map(|(offset, cell)| {
                cell.ok_or_else(|| {
                    Error::Internal(format!(
                        "unset result at {}, {}",
                        offset % width,
                        offset / width
                    ))
                })
            })
            .collect()
    }
}
