//! Cyclic color palettes.
//!
//! A [`Gradient`] is a fixed-length sequence of colors, sampled once from either a list of
//! [`ColorStop`]s (piecewise-linear interpolation) or a continuous function on `[0, 1)`.
//! Lookups wrap modulo the length, so the palette repeats as the escape value grows.

use std::{str::FromStr, sync::Arc};

use crate::{color::hsb_to_rgb, Color, Error};

/// Number of samples taken by the built-in gradients.
pub const DEFAULT_SAMPLES: usize = 256;

/// A color anchored at a position in `[0, 1]` of a gradient.
///
/// Positions 0 and 1 name the same point: the gradient wraps around there.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ColorStop {
    pub color: Color,
    pub position: f64,
}

impl ColorStop {
    pub fn new(color: Color, position: f64) -> Result<Self, Error> {
        if !(0.0..=1.0).contains(&position) {
            return Err(Error::InvalidArgument(format!(
                "color stop position must be between 0 and 1: {}",
                position
            )));
        }
        Ok(ColorStop { color, position })
    }
}

type ColorFn = Arc<dyn Fn(f64) -> Color + Send + Sync>;

#[derive(Clone)]
enum Source {
    Stops(Vec<ColorStop>),
    Function(ColorFn),
    /// Explicit colors, e.g. reconstructed from a record; cannot be resampled.
    Colors,
}

impl std::fmt::Debug for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Source::Stops(stops) => f.debug_tuple("Stops").field(stops).finish(),
            Source::Function(_) => f.write_str("Function"),
            Source::Colors => f.write_str("Colors"),
        }
    }
}

#[derive(Clone, Debug)]
pub struct Gradient {
    name: String,
    colors: Vec<Color>,
    source: Source,
}

/// Gradients are equal when they have the same name and the same sampled colors.
impl PartialEq for Gradient {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.colors == other.colors
    }
}

impl Gradient {
    /// Samples `samples` colors evenly across the stops.
    ///
    /// Requires at least two stops, each within `[0, 1]`. Stops are ordered by position.
    pub fn from_stops(
        name: impl Into<String>,
        samples: usize,
        mut stops: Vec<ColorStop>,
    ) -> Result<Self, Error> {
        if stops.len() < 2 {
            return Err(Error::InvalidArgument(
                "gradient must have at least 2 stops".to_string(),
            ));
        }
        for stop in &stops {
            ColorStop::new(stop.color, stop.position)?;
        }
        check_samples(samples)?;
        stops.sort_by(|a, b| a.position.total_cmp(&b.position));

        let colors = sample_points(samples)
            .map(|t| color_between_stops(&stops, t))
            .collect();
        Ok(Gradient {
            name: name.into(),
            colors,
            source: Source::Stops(stops),
        })
    }

    /// Samples `samples` colors from `f`, evaluated at `i / samples`.
    pub fn from_fn<F>(name: impl Into<String>, samples: usize, f: F) -> Result<Self, Error>
    where
        F: Fn(f64) -> Color + Send + Sync + 'static,
    {
        check_samples(samples)?;
        let f: ColorFn = Arc::new(f);
        Ok(Self::sample_fn(name.into(), samples, f))
    }

    fn sample_fn(name: String, samples: usize, f: ColorFn) -> Self {
        let colors = sample_points(samples).map(|t| f(t)).collect();
        Gradient {
            name,
            colors,
            source: Source::Function(f),
        }
    }

    /// Wraps an explicit list of colors.
    pub fn from_colors(name: impl Into<String>, colors: Vec<Color>) -> Result<Self, Error> {
        if colors.is_empty() {
            return Err(Error::InvalidArgument(
                "gradient must have at least one color".to_string(),
            ));
        }
        Ok(Gradient {
            name: name.into(),
            colors,
            source: Source::Colors,
        })
    }

    /// Rebuilds the gradient with a different number of samples.
    ///
    /// Gradients made from explicit colors have nothing to resample from.
    pub fn resample(&self, samples: usize) -> Result<Self, Error> {
        match &self.source {
            Source::Stops(stops) => Gradient::from_stops(self.name.clone(), samples, stops.clone()),
            Source::Function(f) => {
                check_samples(samples)?;
                Ok(Self::sample_fn(self.name.clone(), samples, f.clone()))
            }
            Source::Colors => Err(Error::InvalidArgument(format!(
                "gradient {} was built from explicit colors and cannot be resampled",
                self.name
            ))),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn colors(&self) -> &[Color] {
        &self.colors
    }

    /// The stops this gradient was sampled from, if any.
    pub fn stops(&self) -> Option<&[ColorStop]> {
        match &self.source {
            Source::Stops(stops) => Some(stops),
            _ => None,
        }
    }

    /// Never zero.
    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    /// Looks up a color; the index wraps around the length of the gradient.
    pub fn get(&self, index: usize) -> Color {
        self.colors[index % self.colors.len()]
    }

    // Built-in gradients.

    pub fn hue() -> Self {
        Self::builtin_fn("Hue", |t| hsb_to_rgb(t, 1.0, 1.0))
    }

    pub fn greyscale() -> Self {
        Self::builtin_fn("Greyscale", |t| hsb_to_rgb(0.0, 0.0, 1.0 - t))
    }

    pub fn rasta() -> Self {
        Self::builtin_stops("Rasta", &[(0x1E9600, 0.0), (0xFFF200, 0.5), (0xFF0000, 1.0)])
    }

    pub fn argon() -> Self {
        Self::builtin_stops(
            "Argon",
            &[
                (0xFDEFF9, 0.0),
                (0xEC38BC, 0.33),
                (0x7303C0, 0.66),
                (0x03001E, 1.0),
            ],
        )
    }

    pub fn king_yna() -> Self {
        Self::builtin_stops("King Yna", &[(0xFDBB2D, 0.0), (0xB21F1F, 0.5), (0x1A2A6C, 1.0)])
    }

    pub fn terminal() -> Self {
        Self::builtin_stops("Terminal", &[(0x0F9B0F, 0.0), (0x000000, 1.0)])
    }

    pub fn jupiter() -> Self {
        Self::builtin_stops("Jupiter", &[(0xFFD89B, 0.0), (0x19547B, 1.0)])
    }

    /// All built-in gradients.
    pub fn presets() -> Vec<Gradient> {
        vec![
            Self::hue(),
            Self::rasta(),
            Self::argon(),
            Self::king_yna(),
            Self::terminal(),
            Self::jupiter(),
            Self::greyscale(),
        ]
    }

    /// Finds a built-in gradient by name, ignoring case, spaces, dashes and underscores.
    pub fn preset(name: &str) -> Option<Gradient> {
        let wanted = normalize_name(name);
        Self::presets()
            .into_iter()
            .find(|g| normalize_name(&g.name) == wanted)
    }

    fn builtin_fn(name: &str, f: fn(f64) -> Color) -> Self {
        Self::sample_fn(name.to_string(), DEFAULT_SAMPLES, Arc::new(f))
    }

    /// Built-in stop tables are listed in position order, starting at 0 and ending at 1.
    fn builtin_stops(name: &str, stops: &[(u32, f64)]) -> Self {
        let stops: Vec<ColorStop> = stops
            .iter()
            .map(|&(hex, position)| ColorStop {
                color: from_hex(hex),
                position,
            })
            .collect();
        let colors = sample_points(DEFAULT_SAMPLES)
            .map(|t| color_between_stops(&stops, t))
            .collect();
        Gradient {
            name: name.to_string(),
            colors,
            source: Source::Stops(stops),
        }
    }
}

impl std::fmt::Display for Gradient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name)
    }
}

impl FromStr for Gradient {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::preset(s).ok_or_else(|| {
            let known: Vec<String> = Self::presets().into_iter().map(|g| g.name).collect();
            Error::InvalidArgument(format!(
                "unknown gradient {:?}; expected one of {}",
                s,
                known.join(", ")
            ))
        })
    }
}

/// Linear interpolation between two colors, per channel, rounded.
///
/// `t = 0` gives `from`, `t = 1` gives `to`.
pub fn interpolate_rgb(from: Color, to: Color, t: f64) -> Color {
    let mut out = from;
    for (channel, (&a, &b)) in out.0.iter_mut().zip(from.0.iter().zip(to.0.iter())) {
        let value = (1.0 - t) * a as f64 + t * b as f64;
        *channel = value.round().clamp(0.0, 255.0) as u8;
    }
    out
}

fn check_samples(samples: usize) -> Result<(), Error> {
    if samples == 0 {
        return Err(Error::InvalidArgument(
            "gradient must have at least one sample".to_string(),
        ));
    }
    Ok(())
}

fn sample_points(samples: usize) -> impl Iterator<Item = f64> {
    (0..samples).map(move |i| i as f64 / samples as f64)
}

/// Color at `t` of a gradient described by stops sorted by position.
fn color_between_stops(stops: &[ColorStop], t: f64) -> Color {
    let t = t.rem_euclid(1.0);
    for pair in stops.windows(2) {
        let (a, b) = (&pair[0], &pair[1]);
        if a.position <= t && t < b.position {
            let local = (t - a.position) / (b.position - a.position);
            return interpolate_rgb(a.color, b.color, local);
        }
    }

    // t lies across the wrap point: after the last stop, or before the first.
    let (first, last) = (&stops[0], &stops[stops.len() - 1]);
    let span = first.position + 1.0 - last.position;
    if span <= 0.0 {
        return last.color;
    }
    let offset = if t >= last.position {
        t - last.position
    } else {
        t + 1.0 - last.position
    };
    interpolate_rgb(last.color, first.color, offset / span)
}

fn from_hex(hex: u32) -> Color {
    image::Rgb([(hex >> 16) as u8, (hex >> 8) as u8, hex as u8])
}

fn normalize_name(name: &str) -> String {
    name.chars()
        .filter(|c| !matches!(c, ' ' | '-' | '_'))
        .flat_map(char::to_lowercase)
        .collect()
}
