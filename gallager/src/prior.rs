//! Prior distribution and joint power normalisation (component C3).

use crate::constellation::Constellation;
use crate::error::{Error, InputError, Result};
use num_complex::Complex64;
use serde::{Deserialize, Serialize};

/// Family of a-priori symbol distribution.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum PriorKind {
    /// `Q_i = 1/M`.
    Uniform,
    /// `Q_i ~ exp(-beta |x_i|^2)`, coupled with the power normalisation.
    MaxwellBoltzmann,
}

/// Absolute tolerance on successive `s` iterates for the Maxwell-Boltzmann
/// fixed point.
const ABS_TOL: f64 = 1e-14;
/// Relative tolerance on successive `s` iterates.
const REL_TOL: f64 = 1e-12;
/// Hard cap on fixed-point iterations.
const MAX_ITER: usize = 1000;

/// Result of normalising a constellation and its prior to unit average
/// power.
#[derive(Clone, Debug)]
pub struct Normalized {
    /// The rescaled alphabet, `E[|X|^2] = 1` under `q`.
    pub x: Vec<Complex64>,
    /// The prior over `x`, summing to 1.
    pub q: Vec<f64>,
    /// Whether the Maxwell-Boltzmann fixed point converged within
    /// [`MAX_ITER`] iterations. Always `true` for the uniform prior.
    pub converged: bool,
    /// Number of fixed-point iterations performed (1 for the uniform
    /// prior, whose normalisation is a single closed-form step).
    pub iterations: usize,
}

/// Normalises `constellation` under `kind`, jointly rescaling the alphabet
/// so that `sum_i q_i |x_i|^2 = 1`.
///
/// # Errors
///
/// Returns [`InputError::InvalidBeta`] if `kind` is
/// [`PriorKind::MaxwellBoltzmann`] and `beta < 0`.
pub fn normalize(constellation: &Constellation, kind: PriorKind, beta: f64) -> Result<Normalized> {
    match kind {
        PriorKind::Uniform => Ok(normalize_uniform(constellation)),
        PriorKind::MaxwellBoltzmann => {
            if !(beta >= 0.0) {
                return Err(Error::InvalidInput(InputError::InvalidBeta { beta }));
            }
            Ok(normalize_maxwell_boltzmann(constellation, beta))
        }
    }
}

/// Normalises a caller-supplied prior (`Modulation::Custom`'s `prob[]`)
/// instead of deriving `Q` from `kind`/`beta`: renormalise `prob` to sum to
/// 1, then jointly rescale `constellation` the same way [`normalize_uniform`]
/// does. `prior`/`beta` play no role here; the prior is the caller's.
///
/// # Errors
///
/// Returns [`InputError::InvalidCustomPoints`] if `prob` has the wrong
/// length, contains a negative or non-finite entry, or sums to (near) zero.
pub fn normalize_custom(constellation: &Constellation, prob: &[f64]) -> Result<Normalized> {
    let m = constellation.m();
    if prob.len() != m || prob.iter().any(|&p| !p.is_finite() || p < 0.0) {
        return Err(Error::InvalidInput(InputError::InvalidCustomPoints));
    }
    let sum: f64 = prob.iter().sum();
    if !(sum > 0.0) {
        return Err(Error::InvalidInput(InputError::InvalidCustomPoints));
    }
    let q: Vec<f64> = prob.iter().map(|&p| p / sum).collect();

    let e: f64 = q
        .iter()
        .zip(&constellation.x)
        .map(|(&qi, xi)| qi * xi.norm_sqr())
        .sum();
    let s = 1.0 / e.sqrt();
    let x = constellation.x.iter().map(|&xi| xi * s).collect();

    Ok(Normalized {
        x,
        q,
        converged: true,
        iterations: 1,
    })
}

fn normalize_uniform(constellation: &Constellation) -> Normalized {
    let m = constellation.m();
    #[allow(clippy::cast_precision_loss)]
    let q = vec![1.0 / m as f64; m];
    let e: f64 = q
        .iter()
        .zip(&constellation.x)
        .map(|(&qi, xi)| qi * xi.norm_sqr())
        .sum();
    let s = 1.0 / e.sqrt();
    let x = constellation.x.iter().map(|&xi| xi * s).collect();
    Normalized {
        x,
        q,
        converged: true,
        iterations: 1,
    }
}

fn normalize_maxwell_boltzmann(constellation: &Constellation, beta: f64) -> Normalized {
    let p = &constellation.x;
    let abs2: Vec<f64> = p.iter().map(num_complex::Complex::norm_sqr).collect();

    let mut s = 1.0_f64;
    let mut converged = false;
    let mut iterations = 0;

    for it in 1..=MAX_ITER {
        iterations = it;

        let raw: Vec<f64> = abs2.iter().map(|&a2| (-beta * s * s * a2).exp()).collect();
        let sum: f64 = raw.iter().sum();
        let q: Vec<f64> = raw.iter().map(|&v| v / sum).collect();

        let e: f64 = q.iter().zip(&abs2).map(|(&qi, &a2)| qi * a2).sum();
        let s_new = 1.0 / e.sqrt();

        let abs_diff = (s_new - s).abs();
        let rel_diff = abs_diff / s;
        let stagnant = s_new == s;

        s = s_new;

        if abs_diff < ABS_TOL || rel_diff < REL_TOL || stagnant {
            converged = true;
            break;
        }
    }

    if !converged {
        tracing::warn!(
            beta,
            s,
            iterations,
            "Maxwell-Boltzmann fixed point did not converge in {MAX_ITER} iterations; proceeding with the last iterate"
        );
    }

    let x: Vec<Complex64> = p.iter().map(|&pi| pi * s).collect();
    let raw: Vec<f64> = x
        .iter()
        .map(|xi| (-beta * xi.norm_sqr()).exp())
        .collect();
    let sum: f64 = raw.iter().sum();
    let q: Vec<f64> = raw.iter().map(|&v| v / sum).collect();

    Normalized {
        x,
        q,
        converged,
        iterations,
    }
}
