//! The compute façade (component C7): the one entry point a transport
//! layer is expected to call.

use crate::cancel::CancellationToken;
use crate::constellation::{Constellation, CustomPoints, Modulation};
use crate::convert::log2;
use crate::error::{Error, InputError, Result};
use crate::optimize::{self, ConvergenceInfo};
use crate::prior::{self, PriorKind};
use crate::quadrature;
use crate::tensor::build_tensors;
use serde::{Deserialize, Serialize};

/// `-n*E0` below this (in bits) underflows `2^(-n*E0)` to exactly zero
/// rather than relying on `f64::powf` to do the right thing near the edge
/// of its dynamic range.
const PE_UNDERFLOW_THRESHOLD: f64 = -1000.0;
/// Sentinel `E0`/`Pe` reported on catastrophic, unrecoverable failure.
const SENTINEL: f64 = -1.0;

/// Input parameters for one [`compute`] call.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ComputeParams {
    /// Alphabet size.
    pub m: usize,
    /// Modulation family.
    pub modulation: Modulation,
    /// Caller-supplied points, required when `modulation == Custom`.
    pub custom_points: Option<CustomPoints>,
    /// Signal-to-noise ratio, linear scale.
    pub snr: f64,
    /// Target code rate, bits per channel use.
    pub r: f64,
    /// Gauss-Hermite quadrature order.
    pub n: usize,
    /// Block length used to turn `E(R)` into a `Pe` bound.
    pub block_length: f64,
    /// Gradient-ascent convergence tolerance. Defaults to `1e-6`.
    pub threshold: f64,
    /// A-priori distribution family.
    pub prior: PriorKind,
    /// Maxwell-Boltzmann shaping parameter (ignored unless `prior` is
    /// [`PriorKind::MaxwellBoltzmann`]).
    pub beta: f64,
}

/// Default gradient-ascent convergence tolerance, per `spec.md` §6.
pub const DEFAULT_THRESHOLD: f64 = 1e-6;

/// Outcome of one [`compute`] call.
#[derive(Clone, Copy, Debug, Serialize)]
pub struct ComputeReport {
    /// Block-error probability bound, or the `-1` sentinel on catastrophic
    /// failure.
    pub pe: f64,
    /// `E0` at the optimal rho, or the `-1` sentinel.
    pub error_exponent: f64,
    /// The optimal rho found by the optimiser.
    pub rho_optimal: f64,
    /// `dE0/drho` at rho=0.
    pub mutual_information: f64,
    /// `E0(1)`.
    pub cutoff_rate: f64,
    /// Diagnostics from the rho-optimiser (iteration count, whether it
    /// converged, whether it was cancelled).
    pub convergence: ConvergenceInfo,
}

/// Validates `params`, then runs C2 through C6 and assembles a report.
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] if any parameter is out of range,
/// before any tensor is allocated. Returns [`Error::QuadratureUnavailable`]
/// if `params.n` has no supported quadrature table.
pub fn compute(params: &ComputeParams, cancel: &CancellationToken) -> Result<ComputeReport> {
    validate(params)?;

    let constellation = Constellation::build(params.m, params.modulation, params.custom_points.as_ref())?;
    let normalized = match (&params.modulation, &params.custom_points) {
        (Modulation::Custom, Some(points)) => prior::normalize_custom(&constellation, &points.prob)?,
        _ => prior::normalize(&constellation, params.prior, params.beta)?,
    };
    let quad = quadrature::quadrature(params.n)?;
    let tensors = build_tensors(&normalized.x, &quad, params.snr);

    let outcome = optimize::optimize(
        params.r,
        &normalized.q,
        &tensors.d,
        &tensors.pi,
        optimize::DEFAULT_MAX_ITER,
        params.threshold,
        cancel,
    );

    let pe = derive_pe(outcome.e0_star, params.block_length);

    Ok(ComputeReport {
        pe,
        error_exponent: outcome.e0_star,
        rho_optimal: outcome.rho_star,
        mutual_information: outcome.mutual_information,
        cutoff_rate: outcome.cutoff_rate,
        convergence: outcome.convergence,
    })
}

fn derive_pe(e0_star: f64, n: f64) -> f64 {
    if e0_star <= SENTINEL {
        return SENTINEL;
    }
    let exponent = -n * e0_star;
    if exponent < PE_UNDERFLOW_THRESHOLD {
        tracing::info!(
            e0_star,
            block_length = n,
            exponent,
            "Pe underflows to exactly zero at this block length; reporting 0"
        );
        return 0.0;
    }
    2f64.powf(exponent)
}

fn validate(params: &ComputeParams) -> Result<()> {
    if params.m < 2 {
        return Err(Error::InvalidInput(InputError::InvalidAlphabetSize { m: params.m }));
    }
    if !(params.snr > 0.0 && params.snr.is_finite()) {
        return Err(Error::InvalidInput(InputError::InvalidSnr { snr: params.snr }));
    }
    #[allow(clippy::cast_precision_loss)]
    let max_rate = log2(params.m as f64);
    if !(params.r > 0.0 && params.r < max_rate) {
        return Err(Error::InvalidInput(InputError::InvalidRate {
            r: params.r,
            m: params.m,
            max_rate,
        }));
    }
    if !(params.block_length > 0.0 && params.block_length.is_finite()) {
        return Err(Error::InvalidInput(InputError::InvalidBlockLength {
            n: params.block_length,
        }));
    }
    if !(params.threshold > 0.0 && params.threshold.is_finite()) {
        return Err(Error::InvalidInput(InputError::InvalidThreshold {
            threshold: params.threshold,
        }));
    }
    if params.prior == PriorKind::MaxwellBoltzmann && !(params.beta >= 0.0) {
        return Err(Error::InvalidInput(InputError::InvalidBeta { beta: params.beta }));
    }
    if params.modulation == Modulation::Custom && params.custom_points.is_none() {
        return Err(Error::InvalidInput(InputError::InvalidCustomPoints));
    }
    quadrature::validate_order(params.n)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_params() -> ComputeParams {
        ComputeParams {
            m: 16,
            modulation: Modulation::Pam,
            custom_points: None,
            snr: 10.0,
            r: 0.5,
            n: 30,
            block_length: 100.0,
            threshold: DEFAULT_THRESHOLD,
            prior: PriorKind::Uniform,
            beta: 0.0,
        }
    }

    #[test]
    fn scenario_s1_pam() {
        let report = compute(&base_params(), &CancellationToken::new()).unwrap();
        assert!((report.error_exponent - 1.28).abs() < 0.05);
        assert_eq!(report.rho_optimal, 1.0);
        assert!(report.pe < 1e-38);
    }

    #[test]
    fn scenario_s3_qam_non_square_falls_back_to_pam() {
        let mut qam = base_params();
        qam.m = 8;
        qam.modulation = Modulation::Qam;
        let mut pam = base_params();
        pam.m = 8;
        pam.modulation = Modulation::Pam;

        let qam_report = compute(&qam, &CancellationToken::new()).unwrap();
        let pam_report = compute(&pam, &CancellationToken::new()).unwrap();
        assert_eq!(qam_report.error_exponent, pam_report.error_exponent);
    }

    #[test]
    fn rejects_rate_at_or_above_capacity() {
        let mut params = base_params();
        params.r = 4.5; // log2(16) == 4
        assert!(compute(&params, &CancellationToken::new()).is_err());
    }

    #[test]
    fn rejects_negative_snr() {
        let mut params = base_params();
        params.snr = -1.0;
        assert!(matches!(
            compute(&params, &CancellationToken::new()),
            Err(Error::InvalidInput(InputError::InvalidSnr { .. }))
        ));
    }

    #[test]
    fn underflow_reports_exactly_zero() {
        let mut params = base_params();
        params.block_length = 1_000_000.0;
        let report = compute(&params, &CancellationToken::new()).unwrap();
        assert_eq!(report.pe, 0.0);
    }

    #[test]
    fn custom_modulation_without_points_is_rejected() {
        let mut params = base_params();
        params.modulation = Modulation::Custom;
        params.custom_points = None;
        assert!(matches!(
            compute(&params, &CancellationToken::new()),
            Err(Error::InvalidInput(InputError::InvalidCustomPoints))
        ));
    }

    #[test]
    fn params_and_report_round_trip_through_json() {
        let params = base_params();
        let json = serde_json::to_string(&params).unwrap();
        let decoded: ComputeParams = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded.m, params.m);
        assert_eq!(decoded.modulation, params.modulation);

        let report = compute(&params, &CancellationToken::new()).unwrap();
        let report_json = serde_json::to_value(&report).unwrap();
        assert_eq!(report_json["rho_optimal"], report.rho_optimal);
    }

    #[test]
    fn custom_modulation_uses_caller_supplied_prior() {
        let mut params = base_params();
        params.modulation = Modulation::Custom;
        params.m = 2;
        params.r = 0.3;
        params.custom_points = Some(crate::constellation::CustomPoints {
            re: vec![-1.0, 1.0],
            im: vec![0.0, 0.0],
            prob: vec![0.25, 0.75],
        });
        let report = compute(&params, &CancellationToken::new()).unwrap();
        assert!(report.error_exponent >= 0.0);
        assert!(report.pe >= 0.0 && report.pe <= 1.0);
    }
}
