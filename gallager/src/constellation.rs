//! Constellation (alphabet) generation (component C2).

use crate::convert::f64_from_usize;
use crate::error::{Error, InputError, Result};
use num_complex::Complex64;
use serde::{Deserialize, Serialize};

/// Modulation family used to generate an alphabet.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Modulation {
    /// Pulse-amplitude modulation: `M` equally spaced real points.
    Pam,
    /// Phase-shift keying: `M` equally spaced points on the unit circle.
    Psk,
    /// Quadrature-amplitude modulation: a square `L x L` grid, `L = sqrt(M)`.
    /// Falls back to [`Modulation::Pam`] when `M` is not a perfect square.
    Qam,
    /// Caller-supplied points and (optionally overridden) probabilities.
    Custom,
}

/// User-supplied points for `Modulation::Custom`.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct CustomPoints {
    /// Real parts of the constellation points.
    pub re: Vec<f64>,
    /// Imaginary parts of the constellation points.
    pub im: Vec<f64>,
    /// A-priori symbol probabilities (renormalised by [`crate::prior`]).
    pub prob: Vec<f64>,
}

/// A finite complex alphabet with `M = x.len()` points.
#[derive(Clone, Debug)]
pub struct Constellation {
    /// The alphabet points, in a fixed order used consistently with the
    /// prior returned alongside them.
    pub x: Vec<Complex64>,
}

impl Constellation {
    /// Builds the alphabet for `m`-ary `kind`, with `custom` supplying
    /// points when `kind == Modulation::Custom`.
    ///
    /// # Errors
    ///
    /// Returns [`InputError::InvalidAlphabetSize`] if `m < 2`, or
    /// [`InputError::InvalidCustomPoints`] if `kind == Custom` and `custom`
    /// is missing or has mismatched/empty arrays.
    pub fn build(m: usize, kind: Modulation, custom: Option<&CustomPoints>) -> Result<Self> {
        if m < 2 {
            return Err(Error::InvalidInput(InputError::InvalidAlphabetSize { m }));
        }

        let x = match kind {
            Modulation::Pam => pam(m),
            Modulation::Psk => psk(m),
            Modulation::Qam => qam_or_pam_fallback(m),
            Modulation::Custom => {
                let points = custom.ok_or(Error::InvalidInput(InputError::InvalidCustomPoints))?;
                custom_alphabet(points)?
            }
        };

        Ok(Self { x })
    }

    /// Number of points in the alphabet.
    #[must_use]
    pub fn m(&self) -> usize {
        self.x.len()
    }
}

fn pam(m: usize) -> Vec<Complex64> {
    let delta = (3.0 / f64_from_usize(m * m - 1)).sqrt();
    (0..m)
        .map(|k| {
            let re = (2.0 * f64_from_usize(k) - f64_from_usize(m) + 1.0) * delta;
            Complex64::new(re, 0.0)
        })
        .collect()
}

fn psk(m: usize) -> Vec<Complex64> {
    (0..m)
        .map(|k| {
            let theta = 2.0 * std::f64::consts::PI * f64_from_usize(k) / f64_from_usize(m);
            Complex64::new(theta.cos(), theta.sin())
        })
        .collect()
}

fn qam_or_pam_fallback(m: usize) -> Vec<Complex64> {
    let l = (f64_from_usize(m).sqrt()).round() as usize;
    if l * l == m {
        qam_square(l)
    } else {
        tracing::warn!(
            m,
            attempted_side = l,
            "QAM requires a perfect-square M; falling back to PAM"
        );
        pam(m)
    }
}

fn qam_square(l: usize) -> Vec<Complex64> {
    let delta = (3.0 / (2.0 * f64_from_usize(l * l - 1))).sqrt();
    let mut points = Vec::with_capacity(l * l);
    for i in 0..l {
        for j in 0..l {
            let re = (2.0 * f64_from_usize(i) - f64_from_usize(l) + 1.0) * delta;
            let im = (2.0 * f64_from_usize(j) - f64_from_usize(l) + 1.0) * delta;
            points.push(Complex64::new(re, im));
        }
    }
    points
}

fn custom_alphabet(points: &CustomPoints) -> Result<Vec<Complex64>> {
    let n = points.re.len();
    if n == 0 || points.im.len() != n || points.prob.len() != n {
        return Err(Error::InvalidInput(InputError::InvalidCustomPoints));
    }
    Ok(points
        .re
        .iter()
        .zip(&points.im)
        .map(|(&re, &im)| Complex64::new(re, im))
        .collect())
}
