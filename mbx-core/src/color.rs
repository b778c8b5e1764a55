//! Mapping escape-time results to colors.
//!
//! A [`ColorScheme`] picks one of a closed set of coloring functions. A [`ColorMapper`] resolves
//! the scheme to its function once, then colors any number of [`PointResult`]s with it.

use std::f64::consts::TAU;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{mandelbrot::PointResult, Error, Gradient};

pub type Color = image::Rgb<u8>;

/// Color of points that never escaped, under every scheme.
pub const INTERIOR: Color = image::Rgb([0, 0, 0]);

/// Color of escaped points under [`ColorScheme::BlackAndWhite`].
pub const EXTERIOR: Color = image::Rgb([255, 255, 255]);

/// Saturation multiplier applied to even escape counts by [`ColorScheme::OddEven`].
const EVEN_DESATURATION: f64 = 0.67;

/// Hue shift applied to clockwise escapes by [`ColorScheme::EscapeDirection`], in turns.
const DIRECTION_HUE_SHIFT: f64 = 0.025;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ColorScheme {
    /// White if escaped.
    BlackAndWhite,
    /// Gradient bands from the log of the integer escape count.
    DiscreteBands,
    /// Like `DiscreteBands`, but from the smooth escape value, blending adjacent gradient entries.
    Continuous,
    /// `DiscreteBands`, desaturated on even escape counts.
    OddEven,
    /// `OddEven`, with the hue nudged when the final iterate lies below the real axis.
    EscapeDirection,
    /// Hue from the smooth escape value, saturation from the final angle, brightness from the
    /// final radius.
    DwellAngleRadius,
}

impl ColorScheme {
    pub const ALL: [ColorScheme; 6] = [
        ColorScheme::BlackAndWhite,
        ColorScheme::DiscreteBands,
        ColorScheme::Continuous,
        ColorScheme::OddEven,
        ColorScheme::EscapeDirection,
        ColorScheme::DwellAngleRadius,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ColorScheme::BlackAndWhite => "black-and-white",
            ColorScheme::DiscreteBands => "discrete-bands",
            ColorScheme::Continuous => "continuous",
            ColorScheme::OddEven => "odd-even",
            ColorScheme::EscapeDirection => "escape-direction",
            ColorScheme::DwellAngleRadius => "dwell-angle-radius",
        }
    }

    fn function(self) -> SchemeFn {
        match self {
            ColorScheme::BlackAndWhite => black_and_white,
            ColorScheme::DiscreteBands => discrete_bands,
            ColorScheme::Continuous => continuous,
            ColorScheme::OddEven => odd_even,
            ColorScheme::EscapeDirection => escape_direction,
            ColorScheme::DwellAngleRadius => dwell_angle_radius,
        }
    }
}

impl std::fmt::Display for ColorScheme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ColorScheme {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace('_', "-");
        ColorScheme::ALL
            .into_iter()
            .find(|scheme| scheme.name() == wanted)
            .ok_or_else(|| Error::InvalidArgument(format!("unknown color scheme {}", s)))
    }
}

/// Parameters shared by the coloring functions.
#[derive(Clone, Debug, PartialEq)]
pub struct ColorParameters {
    pub gradient: Gradient,
    /// How quickly colors cycle through the gradient.
    pub flux: f64,
    /// Darken pixels close to the boundary of the set.
    pub show_distance_overlay: bool,
    /// Distance estimate below which the overlay darkens a pixel.
    pub max_distance_rendered: f64,
}

impl Default for ColorParameters {
    fn default() -> Self {
        ColorParameters {
            gradient: Gradient::hue(),
            flux: 0.4,
            show_distance_overlay: true,
            max_distance_rendered: 3e-2,
        }
    }
}

impl ColorParameters {
    /// Default parameters with the overlay threshold set to `filament_size * zoom`.
    pub fn for_zoom(zoom: f64, filament_size: f64) -> Self {
        ColorParameters {
            max_distance_rendered: filament_size * zoom,
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<(), Error> {
        if !self.flux.is_finite() {
            return Err(Error::InvalidArgument(format!(
                "flux must be finite: {}",
                self.flux
            )));
        }
        if self.max_distance_rendered.is_nan() {
            return Err(Error::InvalidArgument(
                "distance threshold must be a number".to_string(),
            ));
        }
        Ok(())
    }
}

type SchemeFn = fn(&PointResult, &ColorParameters) -> Color;

/// A color scheme resolved to its coloring function.
#[derive(Copy, Clone)]
pub struct ColorMapper {
    scheme: ColorScheme,
    function: SchemeFn,
}

impl std::fmt::Debug for ColorMapper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ColorMapper")
            .field("scheme", &self.scheme)
            .finish()
    }
}

impl From<ColorScheme> for ColorMapper {
    fn from(scheme: ColorScheme) -> Self {
        ColorMapper::new(scheme)
    }
}

impl ColorMapper {
    pub fn new(scheme: ColorScheme) -> Self {
        ColorMapper {
            scheme,
            function: scheme.function(),
        }
    }

    pub fn scheme(&self) -> ColorScheme {
        self.scheme
    }

    /// Colors one point. Points that never escaped are [`INTERIOR`] regardless of scheme;
    /// escaped points may then be darkened by the distance overlay.
    pub fn color_of(&self, result: &PointResult, params: &ColorParameters) -> Color {
        if !result.has_escaped() {
            return INTERIOR;
        }
        let color = (self.function)(result, params);
        if !params.show_distance_overlay {
            return color;
        }
        apply_distance_estimate(
            color,
            result.distance_estimate,
            params.max_distance_rendered,
        )
    }
}

/// Scales brightness by `distance / max_distance` when the distance is below the threshold.
fn apply_distance_estimate(color: Color, distance: f64, max_distance: f64) -> Color {
    if max_distance <= 0.0 || !(distance < max_distance) {
        return color;
    }
    // Scaling every channel scales HSB brightness and keeps hue and saturation.
    let factor = (distance / max_distance).clamp(0.0, 1.0);
    image::Rgb(color.0.map(|c| (c as f64 * factor).round() as u8))
}

fn black_and_white(_: &PointResult, _: &ColorParameters) -> Color {
    EXTERIOR
}

/// Band index from the log of the escape count.
fn band_index(result: &PointResult, params: &ColorParameters) -> usize {
    let len = params.gradient.len();
    let index = ((result.escape_iter as f64).ln() * params.flux * len as f64).floor();
    if !index.is_finite() {
        return 0;
    }
    (index.rem_euclid(len as f64) as usize).min(len - 1)
}

fn discrete_bands(result: &PointResult, params: &ColorParameters) -> Color {
    params.gradient.get(band_index(result, params))
}

fn continuous(result: &PointResult, params: &ColorParameters) -> Color {
    let gradient = &params.gradient;
    let len = gradient.len();
    let dwell = result.smooth_dwell().unwrap_or(1.0);
    let index = (dwell.ln() * params.flux * len as f64).rem_euclid(len as f64);
    if !index.is_finite() {
        return gradient.get(0);
    }
    let lower = index.floor();
    let i0 = lower as usize % len;
    let i1 = (i0 + 1) % len;
    crate::gradient::interpolate_rgb(gradient.get(i0), gradient.get(i1), index - lower)
}

fn odd_even(result: &PointResult, params: &ColorParameters) -> Color {
    let color = discrete_bands(result, params);
    if result.escape_iter % 2 != 0 {
        return color;
    }
    let (h, s, b) = rgb_to_hsb(color);
    hsb_to_rgb(h, s * EVEN_DESATURATION, b)
}

fn escape_direction(result: &PointResult, params: &ColorParameters) -> Color {
    let color = odd_even(result, params);
    if result.last_z.arg() >= 0.0 {
        return color;
    }
    let (h, s, b) = rgb_to_hsb(color);
    hsb_to_rgb(h + DIRECTION_HUE_SHIFT, s, b)
}

fn dwell_angle_radius(result: &PointResult, params: &ColorParameters) -> Color {
    let dwell = result.smooth_dwell().unwrap_or(1.0);
    let hue = dwell.ln() * params.flux;
    let saturation = (result.last_z.arg() / TAU).rem_euclid(1.0);
    let brightness = result.last_z.abs().ln().rem_euclid(1.0);
    hsb_to_rgb(hue, saturation, brightness)
}

/// HSB to RGB. Hue is in turns and wraps; saturation and brightness are clamped to `[0, 1]`.
pub(crate) fn hsb_to_rgb(hue: f64, saturation: f64, brightness: f64) -> Color {
    let unit = |v: f64| if v.is_finite() { v.clamp(0.0, 1.0) } else { 0.0 };
    let mut degrees = if hue.is_finite() {
        hue.rem_euclid(1.0) * 360.0
    } else {
        0.0
    };
    if degrees >= 360.0 {
        degrees = 0.0;
    }
    let (r, g, b) = hsv::hsv_to_rgb(degrees, unit(saturation), unit(brightness));
    image::Rgb([r, g, b])
}

/// RGB to HSB, with hue in turns `[0, 1)`.
pub(crate) fn rgb_to_hsb(color: Color) -> (f64, f64, f64) {
    let [r, g, b] = color.0.map(|c| c as f64 / 255.0);
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;

    let saturation = if max > 0.0 { delta / max } else { 0.0 };
    let hue = if delta == 0.0 {
        0.0
    } else if max == r {
        ((g - b) / delta).rem_euclid(6.0) / 6.0
    } else if max == g {
        ((b - r) / delta + 2.0) / 6.0
    } else {
        ((r - g) / delta + 4.0) / 6.0
    };
    (hue, saturation, max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{mandelbrot::escape, Complex};
    use image::Rgb;

    fn no_overlay() -> ColorParameters {
        ColorParameters {
            show_distance_overlay: false,
            ..Default::default()
        }
    }

    fn escaped(count: u32, last_z: Complex) -> PointResult {
        PointResult::escaped(last_z, count, 1.0)
    }

    #[test]
    fn interior_regardless_of_scheme() {
        let params = ColorParameters::default();
        for orbit in [true, false] {
            let result = PointResult::unbounded(Complex::new(0.1, -0.2), orbit);
            for scheme in ColorScheme::ALL {
                assert_eq!(ColorMapper::new(scheme).color_of(&result, &params), INTERIOR);
            }
        }
    }

    #[test]
    fn black_and_white() {
        let mapper = ColorMapper::new(ColorScheme::BlackAndWhite);
        let params = no_overlay();
        assert_eq!(mapper.color_of(&escape(Complex::new(2.0, 0.0), 50), &params), EXTERIOR);
        assert_eq!(mapper.color_of(&escape(Complex::new(-1.0, 0.0), 50), &params), INTERIOR);
    }

    #[test]
    fn discrete_bands_index_the_gradient() {
        let params = ColorParameters {
            flux: 0.25,
            ..no_overlay()
        };
        let mapper = ColorMapper::new(ColorScheme::DiscreteBands);
        let len = params.gradient.len();
        for count in [1, 2, 9, 100, 999] {
            let expected = ((count as f64).ln() * 0.25 * len as f64).floor() as usize % len;
            let result = escaped(count, Complex::new(3.0, 0.0));
            assert_eq!(mapper.color_of(&result, &params), params.gradient.get(expected));
        }
        // ln(1) = 0 always lands on the first entry.
        assert_eq!(
            mapper.color_of(&escaped(1, Complex::new(3.0, 0.0)), &params),
            params.gradient.get(0)
        );
    }

    #[test]
    fn continuous_blends_between_neighbours() {
        let gradient =
            Gradient::from_colors("bw", vec![Rgb([0, 0, 0]), Rgb([200, 200, 200])]).unwrap();
        let params = ColorParameters {
            gradient,
            flux: 1.0,
            ..no_overlay()
        };
        let mapper = ColorMapper::new(ColorScheme::Continuous);
        for count in [3, 10, 40] {
            let color = mapper.color_of(&escaped(count, Complex::new(2.5, 0.5)), &params);
            assert_eq!(color.0[0], color.0[1]);
            assert!(color.0[0] <= 200);
        }
    }

    #[test]
    fn continuous_is_smooth_across_points() {
        // Neighbouring points differ a little in smooth value, so their colors differ a little.
        let params = no_overlay();
        let mapper = ColorMapper::new(ColorScheme::Continuous);
        let a = mapper.color_of(&escape(Complex::new(0.3, 0.0), 500), &params);
        let b = mapper.color_of(&escape(Complex::new(0.3 + 1e-9, 0.0), 500), &params);
        for c in 0..3 {
            assert!((a.0[c] as i32 - b.0[c] as i32).abs() <= 2);
        }
    }

    #[test]
    fn odd_even_desaturates_even_counts() {
        let gradient = Gradient::from_colors("red", vec![Rgb([255, 0, 0])]).unwrap();
        let params = ColorParameters {
            gradient,
            ..no_overlay()
        };
        let mapper = ColorMapper::new(ColorScheme::OddEven);
        let odd = mapper.color_of(&escaped(7, Complex::new(3.0, 0.0)), &params);
        let even = mapper.color_of(&escaped(8, Complex::new(3.0, 0.0)), &params);
        assert_eq!(odd, Rgb([255, 0, 0]));
        let (_, odd_saturation, _) = rgb_to_hsb(odd);
        let (_, even_saturation, _) = rgb_to_hsb(even);
        assert!(even_saturation < odd_saturation);
        assert!((even_saturation - 0.67).abs() < 0.02);
    }

    #[test]
    fn escape_direction_shifts_hue_below_axis() {
        let gradient = Gradient::from_colors("red", vec![Rgb([255, 0, 0])]).unwrap();
        let params = ColorParameters {
            gradient,
            ..no_overlay()
        };
        let mapper = ColorMapper::new(ColorScheme::EscapeDirection);
        let above = mapper.color_of(&escaped(7, Complex::new(3.0, 1.0)), &params);
        let below = mapper.color_of(&escaped(7, Complex::new(3.0, -1.0)), &params);
        assert_eq!(above, Rgb([255, 0, 0]));
        let (hue, _, _) = rgb_to_hsb(below);
        assert!((hue - DIRECTION_HUE_SHIFT).abs() < 0.01);
    }

    #[test]
    fn dwell_angle_radius_encodes_final_iterate() {
        let params = no_overlay();
        let mapper = ColorMapper::new(ColorScheme::DwellAngleRadius);
        // On the positive real axis the angle is zero, so saturation is zero: a grey.
        let on_axis = escaped(5, Complex::new(std::f64::consts::E.powf(1.5), 0.0));
        let grey = mapper.color_of(&on_axis, &params);
        assert_eq!(grey.0[0], grey.0[1]);
        assert_eq!(grey.0[1], grey.0[2]);
        // ln|z| = 1.5, so brightness is 0.5.
        assert!((grey.0[0] as i32 - 128).abs() <= 1);
    }

    #[test]
    fn distance_overlay_darkens_near_boundary() {
        let params = ColorParameters {
            gradient: Gradient::from_colors("white", vec![Rgb([200, 100, 50])]).unwrap(),
            show_distance_overlay: true,
            max_distance_rendered: 0.1,
            ..Default::default()
        };
        let mapper = ColorMapper::new(ColorScheme::DiscreteBands);
        let far = PointResult::escaped(Complex::new(3.0, 0.0), 4, 0.5);
        let near = PointResult::escaped(Complex::new(3.0, 0.0), 4, 0.05);
        assert_eq!(mapper.color_of(&far, &params), Rgb([200, 100, 50]));
        assert_eq!(mapper.color_of(&near, &params), Rgb([100, 50, 25]));

        let disabled = ColorParameters {
            max_distance_rendered: 0.0,
            ..params.clone()
        };
        assert_eq!(mapper.color_of(&near, &disabled), Rgb([200, 100, 50]));
        let hidden = ColorParameters {
            show_distance_overlay: false,
            ..params
        };
        assert_eq!(mapper.color_of(&near, &hidden), Rgb([200, 100, 50]));
    }

    #[test]
    fn scheme_names_round_trip() {
        for scheme in ColorScheme::ALL {
            assert_eq!(scheme.to_string().parse::<ColorScheme>(), Ok(scheme));
        }
        assert_eq!("ODD_EVEN".parse::<ColorScheme>(), Ok(ColorScheme::OddEven));
        assert!("sepia".parse::<ColorScheme>().is_err());
    }

    #[test]
    fn hsb_round_trip_of_primaries() {
        for color in [Rgb([255, 0, 0]), Rgb([0, 255, 0]), Rgb([0, 0, 255]), Rgb([255, 255, 255])] {
            let (h, s, b) = rgb_to_hsb(color);
            assert_eq!(hsb_to_rgb(h, s, b), color);
        }
        assert_eq!(hsb_to_rgb(f64::NAN, 2.0, -1.0), Rgb([0, 0, 0]));
    }
}
