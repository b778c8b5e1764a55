//! Escape-time evaluation of the Mandelbrot map `z -> z^2 + c`.
//!
//! Each point yields a [`PointResult`]: where the iterate ended up, how long it took to escape,
//! an analytic estimate of its distance to the set, and whether a periodic orbit was found.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::{CancelToken, Complex, Error, PixelGrid, Viewport};

/// Escape radius R. Points whose iterate leaves the disk of this radius never return.
pub const ESCAPE_RADIUS: f64 = 2.0;

/// Escape count reserved for points that did not escape: either the iteration budget ran out,
/// or a periodic orbit was detected.
pub const UNBOUNDED: u32 = u32::MAX;

/// Progress is reported every this-many columns of a column scan.
const PROGRESS_STRIDE: usize = 5;

/// Escape-time data gathered for a single point `c`.
///
/// `escape_iter` is either a count in `1..=max_iterations` with a meaningful
/// `distance_estimate`, or [`UNBOUNDED`] with a distance estimate of zero.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PointResult {
    /// The iterate at the point the loop stopped.
    pub last_z: Complex,
    pub escape_iter: u32,
    pub distance_estimate: f64,
    pub orbit_detected: bool,
}

impl PointResult {
    pub fn escaped(last_z: Complex, escape_iter: u32, distance_estimate: f64) -> Self {
        PointResult {
            last_z,
            escape_iter,
            distance_estimate,
            orbit_detected: false,
        }
    }

    pub fn unbounded(last_z: Complex, orbit_detected: bool) -> Self {
        PointResult {
            last_z,
            escape_iter: UNBOUNDED,
            distance_estimate: 0.0,
            orbit_detected,
        }
    }

    pub fn has_escaped(&self) -> bool {
        self.escape_iter != UNBOUNDED
    }

    /// The escape count, or None for points treated as members of the set.
    pub fn escape_count(&self) -> Option<u32> {
        self.has_escaped().then_some(self.escape_iter)
    }

    /// Continuous ("smooth") escape value: `n + 1 - log2(ln|z| / ln R)`.
    ///
    /// Monotonic in escape behavior, and continuous across the bands of the integer count.
    /// Clamped away from zero so callers may take its logarithm.
    pub fn smooth_dwell(&self) -> Option<f64> {
        let count = self.escape_count()?;
        let ratio = self.last_z.abs().ln() / ESCAPE_RADIUS.ln();
        let dwell = count as f64 + 1.0 - ratio.log2();
        Some(dwell.max(f64::MIN_POSITIVE))
    }
}

/// Runs the escape-time iteration for `c`, seeded at `z_0 = c`.
///
/// Alongside `z` this tracks the derivative `dz` for the distance estimate, and a "slow" copy
/// of `z` advanced every second iteration. If the fast and slow iterates ever match exactly,
/// `z` has entered a cycle and the point is reported as unbounded without exhausting `limit`.
pub fn escape(c: Complex, limit: u32) -> PointResult {
    let mut z = c;
    let mut z_slow = c;
    let mut dz = Complex::ZERO;
    let radius_squared = ESCAPE_RADIUS * ESCAPE_RADIUS;

    let mut i = 0;
    while i < limit {
        dz = z * dz * 2.0 + Complex::ONE;
        z = z.square() + c;
        i += 1;
        if i % 2 == 0 {
            z_slow = z_slow.square() + c;
        }

        if z.norm_sqr() > radius_squared {
            return PointResult::escaped(z, i, distance_estimate(z, dz));
        }
        if z == z_slow {
            return PointResult::unbounded(z, true);
        }
    }
    PointResult::unbounded(z, false)
}

/// `ln(|z|^2) * |z| / |dz|`; only meaningful once `z` has escaped.
fn distance_estimate(z: Complex, dz: Complex) -> f64 {
    debug_assert!(z.norm_sqr() > ESCAPE_RADIUS * ESCAPE_RADIUS);
    let z_magnitude = z.abs();
    z.norm_sqr().ln() * z_magnitude / dz.abs()
}

/// Evaluates every pixel of the viewport column by column.
///
/// Columns complete in order, left to right; the pixels within a column are spread across the
/// current rayon pool. The progress sink, if any, runs on the calling thread and receives the
/// completed fraction every few columns and `1.0` at the end. The cancel token is checked
/// before each column.
pub fn evaluate_columns(
    viewport: &Viewport,
    iterations: u32,
    progress: Option<&mut dyn FnMut(f64)>,
    cancel: &CancelToken,
) -> Result<Vec<PointResult>, Error> {
    scan_columns(viewport, progress, cancel, |c| escape(c, iterations))
}

fn scan_columns<F>(
    viewport: &Viewport,
    mut progress: Option<&mut dyn FnMut(f64)>,
    cancel: &CancelToken,
    evaluate: F,
) -> Result<Vec<PointResult>, Error>
where
    F: Fn(Complex) -> PointResult + Sync,
{
    let (width, height) = (viewport.width(), viewport.height());
    let mut grid = PixelGrid::new(viewport.size());
    for x in 0..width {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        let column: Vec<PointResult> = (0..height)
            .into_par_iter()
            .map(|y| evaluate(viewport.point_at(x, y)))
            .collect();
        for (y, result) in column.into_iter().enumerate() {
            grid.set(x, y, result);
        }
        if let Some(sink) = progress.as_mut() {
            if x % PROGRESS_STRIDE == 0 {
                sink(x as f64 / width as f64);
            }
        }
    }
    if let Some(sink) = progress.as_mut() {
        sink(1.0);
    }
    grid.into_complete()
}

/// Evaluates every pixel of the viewport, splitting rows across the current rayon pool.
///
/// Each pixel is independent, so the result is identical to [`evaluate_columns`].
pub fn evaluate_parallel(
    viewport: &Viewport,
    iterations: u32,
    cancel: &CancelToken,
) -> Result<Vec<PointResult>, Error> {
    let width = viewport.width();
    let rows: Option<Vec<Vec<PointResult>>> = (0..viewport.height())
        .into_par_iter()
        .map(|y| {
            if cancel.is_cancelled() {
                return None;
            }
            Some(
                (0..width)
                    .map(|x| escape(viewport.point_at(x, y), iterations))
                    .collect(),
            )
        })
        .collect();
    let rows = rows.ok_or(Error::Cancelled)?;
    Ok(rows.into_iter().flatten().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Size;

    #[test]
    fn cardioid_interior_never_escapes() {
        let steps = 20;
        for i in 0..=steps {
            for j in 0..=steps {
                let re = -0.25 + 0.5 * i as f64 / steps as f64;
                let im = -0.25 + 0.5 * j as f64 / steps as f64;
                let c = Complex::new(re, im);
                if c.abs() > 0.25 {
                    continue;
                }
                for limit in [1, 2, 7, 100, 1000] {
                    let result = escape(c, limit);
                    assert_eq!(result.escape_iter, UNBOUNDED, "{} escaped at limit {}", c, limit);
                    assert_eq!(result.distance_estimate, 0.0);
                }
            }
        }
    }

    #[test]
    fn two_escapes_immediately() {
        let result = escape(Complex::new(2.0, 0.0), 100);
        assert!(result.has_escaped());
        assert!(result.escape_iter <= 2);
        assert_eq!(result.last_z, Complex::new(6.0, 0.0));
        assert!(!result.orbit_detected);
        // dz = 1 after the first step.
        assert!((result.distance_estimate - 36f64.ln() * 6.0).abs() < 1e-12);
    }

    #[test]
    fn fixed_point_detected_as_orbit() {
        // c = 0 is a fixed point of z^2 + c.
        let result = escape(Complex::ZERO, 1000);
        assert!(result.orbit_detected);
        assert_eq!(result.escape_iter, UNBOUNDED);

        // c = -2 lands on the fixed point z = 2 and stays there.
        let result = escape(Complex::new(-2.0, 0.0), 1000);
        assert!(result.orbit_detected);
        assert!(!result.has_escaped());
    }

    #[test]
    fn budget_exhaustion_is_not_an_orbit() {
        // On the cardioid cusp the iterate converges too slowly to match exactly in 10 steps.
        let result = escape(Complex::new(0.25, 0.0), 10);
        assert_eq!(result.escape_iter, UNBOUNDED);
        assert!(!result.orbit_detected);
        assert_eq!(result.distance_estimate, 0.0);
    }

    #[test]
    fn escape_count_is_within_budget() {
        for limit in [1, 3, 50] {
            for re in [0.3, 0.5, 1.0, -2.1] {
                let result = escape(Complex::new(re, 0.1), limit);
                if let Some(count) = result.escape_count() {
                    assert!(count >= 1 && count <= limit);
                    assert!(result.distance_estimate > 0.0);
                }
            }
        }
    }

    #[test]
    fn smooth_dwell_tracks_escape_count() {
        let slow = escape(Complex::new(0.26, 0.0), 1000);
        let fast = escape(Complex::new(0.5, 0.0), 1000);
        assert!(slow.smooth_dwell().unwrap() > fast.smooth_dwell().unwrap());
        let dwell = fast.smooth_dwell().unwrap();
        let count = fast.escape_iter as f64;
        assert!(dwell > count - 1.0 && dwell <= count + 1.0);
        assert_eq!(escape(Complex::ZERO, 10).smooth_dwell(), None);
    }

    #[test]
    fn column_and_row_scans_agree() {
        let size = Size {
            width: 23,
            height: 17,
        };
        let viewport = Viewport::new(size, Complex::new(-0.5, 0.0), 3.0).unwrap();
        let cancel = CancelToken::new();
        let mut reports = Vec::new();
        let mut sink = |p: f64| reports.push(p);
        let columns = evaluate_columns(&viewport, 64, Some(&mut sink), &cancel).unwrap();
        let rows = evaluate_parallel(&viewport, 64, &cancel).unwrap();
        assert_eq!(columns, rows);
        assert_eq!(columns.len(), 23 * 17);

        assert_eq!(reports.first(), Some(&0.0));
        assert_eq!(reports.last(), Some(&1.0));
        assert!(reports.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn cancelled_scans_stop() {
        let size = Size {
            width: 8,
            height: 8,
        };
        let viewport = Viewport::new(size, Complex::ZERO, 3.0).unwrap();
        let cancel = CancelToken::new();
        cancel.cancel();
        assert_eq!(evaluate_columns(&viewport, 10, None, &cancel), Err(Error::Cancelled));
        assert_eq!(evaluate_parallel(&viewport, 10, &cancel), Err(Error::Cancelled));
    }

    #[test]
    fn column_scan_spreads_across_pool() {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(4)
            .build()
            .unwrap();
        let size = Size {
            width: 4,
            height: 64,
        };
        let viewport = Viewport::new(size, Complex::new(-0.5, 0.0), 3.0).unwrap();
        let workers = std::sync::Mutex::new(std::collections::HashSet::new());
        let mut reports = Vec::new();
        let mut sink = |p: f64| reports.push(p);

        let grid = pool
            .install(|| {
                scan_columns(&viewport, Some(&mut sink), &CancelToken::new(), |c| {
                    workers
                        .lock()
                        .unwrap()
                        .insert(rayon::current_thread_index());
                    std::thread::sleep(std::time::Duration::from_millis(1));
                    escape(c, 32)
                })
            })
            .unwrap();

        assert_eq!(grid.len(), 4 * 64);
        assert!(workers.lock().unwrap().len() > 1);
        assert_eq!(reports, vec![0.0, 1.0]);
    }
}
