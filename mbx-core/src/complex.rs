//! Complex number implementation.
//!
//! A little more granular than `num::Complex`, because we're only interested in the operations the
//! escape-time iteration and the coloring functions need.

use std::ops::{Add, Mul};

use serde::{Deserialize, Serialize};

/// An immutable complex number with `f64` parts.
///
/// Equality is exact IEEE equality of both parts, never an epsilon comparison:
/// orbit detection relies on the fast and slow iterates matching exactly.
#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Complex {
    pub re: f64,
    pub im: f64,
}

impl Complex {
    pub const ZERO: Complex = Complex { re: 0.0, im: 0.0 };
    pub const ONE: Complex = Complex { re: 1.0, im: 0.0 };

    pub const fn new(re: f64, im: f64) -> Self {
        Complex { re, im }
    }

    /// Squares the given number.
    /// This takes fewer operations than a generic multiply.
    pub fn square(self) -> Self {
        // (a+bi)^2 = (a^2-b^2) + 2abi
        Complex {
            re: self.re * self.re - self.im * self.im,
            im: 2.0 * self.re * self.im,
        }
    }

    /// Squared magnitude; the escape test compares this against R^2 to skip the square root.
    #[inline]
    pub fn norm_sqr(self) -> f64 {
        self.re * self.re + self.im * self.im
    }

    /// Magnitude (Euclidean distance from the origin).
    pub fn abs(self) -> f64 {
        self.norm_sqr().sqrt()
    }

    /// Argument, in `(-pi, pi]`.
    pub fn arg(self) -> f64 {
        self.im.atan2(self.re)
    }

    pub fn is_finite(self) -> bool {
        self.re.is_finite() && self.im.is_finite()
    }
}

impl Add<Complex> for Complex {
    type Output = Complex;

    fn add(self, rhs: Complex) -> Self {
        Complex {
            re: self.re + rhs.re,
            im: self.im + rhs.im,
        }
    }
}

impl Mul<Complex> for Complex {
    type Output = Complex;

    fn mul(self, rhs: Complex) -> Self {
        // (a + ib) * (c + id)
        // = ac + aid + (ibc + i^2 bd)      (FOIL)
        // = (ac - bd) + i(ad + bc)         (turning i^2 into -1, combining real/imaginary terms)
        let (a, b) = (self.re, self.im);
        let (c, d) = (rhs.re, rhs.im);
        Complex {
            re: a * c - b * d,
            im: a * d + b * c,
        }
    }
}

impl Mul<f64> for Complex {
    type Output = Complex;

    fn mul(self, scalar: f64) -> Self {
        Complex {
            re: self.re * scalar,
            im: self.im * scalar,
        }
    }
}

impl std::fmt::Display for Complex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.im.is_sign_negative() {
            write!(f, "{}-{}i", self.re, -self.im)
        } else {
            write!(f, "{}+{}i", self.re, self.im)
        }
    }
}
