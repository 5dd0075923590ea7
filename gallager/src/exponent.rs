//! The E0(rho) evaluator (component C5): Gallager's random-coding exponent
//! and its rho-derivative, computed in one of three arithmetic modes
//! depending on how large the scaled distances get.

use ndarray::Array2;

/// One-sided finite-difference step used by the pure log-space gradient.
const LOG_SPACE_FD_STEP: f64 = 1e-6;
/// Above this magnitude, `exp(-D/(1+rho))` risks overflowing in linear space.
const REGULAR_THRESHOLD: f64 = 650.0;
/// Above this magnitude, even the hybrid log-sum-exp path can't safely
/// exponentiate back to linear space.
const HYBRID_THRESHOLD: f64 = 690.0;
/// A channel is treated as indistinguishable (SNR effectively zero) when
/// `log(qg)` has variance below this across all quadrature columns.
const DEGENERATE_LOG_QG_VARIANCE: f64 = 1e-20;
/// `|E0|` below this is treated as harmless round-off and clamped to zero
/// rather than escalated to the catastrophic sentinel.
const CLAMPABLE_NEGATIVE_E0: f64 = 0.5;

/// Which arithmetic regime an [`evaluate`] call uses. Chosen once per
/// rho-optimisation from `max|D|` (see [`choose_mode`]) and then held
/// fixed: switching modes between evaluations at different rho would make
/// E0(rho) discontinuous and derail gradient descent.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArithmeticMode {
    /// Direct evaluation in linear space.
    Regular,
    /// `qg` computed via log-sum-exp, exponentiated back when safe for the
    /// rho in question, otherwise falling through to `LogSpace` for that
    /// call only.
    Hybrid,
    /// Never exponentiates; `E0` is recovered from a single log-sum-exp
    /// over all `(i, j)` and the gradient uses a finite difference.
    LogSpace,
}

/// `E0(rho)` and `dE0/drho` at one point.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Evaluation {
    /// The random-coding exponent at this rho.
    pub e0: f64,
    /// Its derivative with respect to rho (unstable/finite-differenced in
    /// [`ArithmeticMode::LogSpace`]).
    pub grad: f64,
}

/// Picks the arithmetic mode for a whole rho-optimisation from the largest
/// entry of the distance tensor.
#[must_use]
pub fn choose_mode(d: &Array2<f64>) -> ArithmeticMode {
    let max_d = d.iter().copied().fold(0.0_f64, f64::max);
    if max_d < REGULAR_THRESHOLD {
        ArithmeticMode::Regular
    } else if 0.5 * max_d < HYBRID_THRESHOLD {
        ArithmeticMode::Hybrid
    } else {
        ArithmeticMode::LogSpace
    }
}

/// Evaluates `E0(rho)` and its gradient using `mode`.
#[must_use]
pub fn evaluate(rho: f64, q: &[f64], d: &Array2<f64>, pi: &Array2<f64>, mode: ArithmeticMode) -> Evaluation {
    match mode {
        ArithmeticMode::Regular => evaluate_regular(rho, q, d, pi),
        ArithmeticMode::Hybrid => evaluate_hybrid(rho, q, d, pi),
        ArithmeticMode::LogSpace => evaluate_log_space(rho, q, d, pi),
    }
}

fn logsumexp(values: impl Iterator<Item = f64>) -> f64 {
    let xs: Vec<f64> = values.collect();
    let max = xs.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if !max.is_finite() {
        return max;
    }
    let sum: f64 = xs.iter().map(|&x| (x - max).exp()).sum();
    max + sum.ln()
}

fn is_degenerate(log_qg: &[f64]) -> bool {
    let n = log_qg.len();
    if n == 0 {
        return true;
    }
    #[allow(clippy::cast_precision_loss)]
    let len = n as f64;
    let mean = log_qg.iter().sum::<f64>() / len;
    let var = log_qg.iter().map(|&v| (v - mean).powi(2)).sum::<f64>() / len;
    var < DEGENERATE_LOG_QG_VARIANCE
}

fn finalize(e0: f64, grad: f64) -> Evaluation {
    if !e0.is_finite() || e0 < -CLAMPABLE_NEGATIVE_E0 {
        tracing::warn!(e0, "E0 is non-finite or grossly negative; returning sentinel");
        return Evaluation { e0: -1.0, grad: 0.0 };
    }
    if e0 < 0.0 {
        tracing::warn!(e0, "clamping small negative E0 (round-off) to 0");
        return Evaluation { e0: 0.0, grad };
    }
    Evaluation { e0, grad }
}

/// `qg(j)` in linear space together with `log(qg(j))` for the degeneracy
/// check, shared by the regular and (successful) hybrid paths.
fn qg_linear(rho: f64, q: &[f64], d: &Array2<f64>) -> (Vec<f64>, Vec<f64>) {
    let m = q.len();
    let cols = d.ncols();
    let one_plus_rho = 1.0 + rho;
    let mut qg = vec![0.0_f64; cols];
    for (j, slot) in qg.iter_mut().enumerate() {
        let mut acc = 0.0;
        for i in 0..m {
            acc += q[i] * (-d[[i, j]] / one_plus_rho).exp();
        }
        *slot = acc;
    }
    let log_qg: Vec<f64> = qg.iter().map(|&v| v.max(f64::MIN_POSITIVE).ln()).collect();
    (qg, log_qg)
}

/// `log(qg(j))` via log-sum-exp, never exponentiating intermediate terms.
fn log_qg_stable(rho: f64, q: &[f64], d: &Array2<f64>) -> Vec<f64> {
    let m = q.len();
    let cols = d.ncols();
    let one_plus_rho = 1.0 + rho;
    let ln_q: Vec<f64> = q.iter().map(|x| x.ln()).collect();
    (0..cols)
        .map(|j| logsumexp((0..m).map(|i| ln_q[i] - d[[i, j]] / one_plus_rho)))
        .collect()
}

/// Combines `qg` (already exponentiated, either directly or from the
/// hybrid path) with `D`/`Pi` to produce `F(rho)` and `dF/drho`, per the
/// Gallager form in the engine's specification.
fn combine_linear(rho: f64, q: &[f64], d: &Array2<f64>, pi: &Array2<f64>, qg: &[f64]) -> (f64, f64) {
    let m = q.len();
    let cols = d.ncols();
    let one_plus_rho = 1.0 + rho;
    let coeff = rho / one_plus_rho;

    let mut f = 0.0_f64;
    let mut term1 = 0.0_f64;
    let mut term2 = 0.0_f64;

    for j in 0..cols {
        let qg_j = qg[j];
        if qg_j <= 0.0 {
            continue;
        }
        let qg_pow_rho = qg_j.powf(rho);
        let mut pg_dot_pi = 0.0_f64;
        let mut pg_dot_pi_negd = 0.0_f64;
        for i in 0..m {
            let pij = pi[[i, j]];
            if pij == 0.0 {
                continue;
            }
            let pg_ij = q[i] * (coeff * d[[i, j]]).exp();
            pg_dot_pi += pij * pg_ij;
            pg_dot_pi_negd += pij * pg_ij * (-d[[i, j]]);
        }
        f += pg_dot_pi * qg_pow_rho;
        term1 += pg_dot_pi * qg_pow_rho * qg_j.ln();
        term2 += pg_dot_pi_negd * qg_pow_rho;
    }

    let pi_const = std::f64::consts::PI;
    let f_total = f / pi_const;
    let df_total = (term1 - term2 / one_plus_rho) / pi_const;
    (f_total, df_total)
}

fn e0_and_grad_from_f(f: f64, df: f64) -> (f64, f64) {
    if f <= 0.0 || !f.is_finite() {
        return (f64::NAN, 0.0);
    }
    let e0 = -crate::convert::log2(f);
    let grad = -df / (f * std::f64::consts::LN_2);
    (e0, grad)
}

fn evaluate_regular(rho: f64, q: &[f64], d: &Array2<f64>, pi: &Array2<f64>) -> Evaluation {
    let (qg, log_qg) = qg_linear(rho, q, d);
    if is_degenerate(&log_qg) {
        return Evaluation { e0: 0.0, grad: 0.0 };
    }
    let (f, df) = combine_linear(rho, q, d, pi, &qg);
    let (e0, grad) = e0_and_grad_from_f(f, df);
    finalize(e0, grad)
}

fn evaluate_hybrid(rho: f64, q: &[f64], d: &Array2<f64>, pi: &Array2<f64>) -> Evaluation {
    let log_qg = log_qg_stable(rho, q, d);
    if is_degenerate(&log_qg) {
        return Evaluation { e0: 0.0, grad: 0.0 };
    }

    let one_plus_rho = 1.0 + rho;
    let max_log_qg = log_qg.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let max_d = d.iter().copied().fold(0.0_f64, f64::max);
    let safe_to_exponentiate =
        (rho * max_log_qg).abs() < HYBRID_THRESHOLD && (rho / one_plus_rho) * max_d < HYBRID_THRESHOLD;

    if safe_to_exponentiate {
        let qg: Vec<f64> = log_qg.iter().map(|&lq| lq.exp()).collect();
        let (f, df) = combine_linear(rho, q, d, pi, &qg);
        let (e0, grad) = e0_and_grad_from_f(f, df);
        finalize(e0, grad)
    } else {
        evaluate_log_space_given(rho, q, d, pi, &log_qg)
    }
}

fn evaluate_log_space(rho: f64, q: &[f64], d: &Array2<f64>, pi: &Array2<f64>) -> Evaluation {
    let log_qg = log_qg_stable(rho, q, d);
    evaluate_log_space_given(rho, q, d, pi, &log_qg)
}

fn log_f0_given(rho: f64, q: &[f64], d: &Array2<f64>, pi: &Array2<f64>, log_qg: &[f64]) -> f64 {
    let m = q.len();
    let cols = d.ncols();
    let one_plus_rho = 1.0 + rho;
    let coeff = rho / one_plus_rho;
    let ln_q: Vec<f64> = q.iter().map(|x| x.ln()).collect();

    let terms = (0..cols).flat_map(|j| {
        let log_qg_j = log_qg[j];
        (0..m).filter_map(move |i| {
            let pij = pi[[i, j]];
            if pij <= 0.0 {
                None
            } else {
                Some(pij.ln() + ln_q[i] + coeff * d[[i, j]] + rho * log_qg_j)
            }
        })
    });
    logsumexp(terms)
}

fn e0_log_space_only(rho: f64, q: &[f64], d: &Array2<f64>, pi: &Array2<f64>) -> f64 {
    let log_qg = log_qg_stable(rho, q, d);
    if is_degenerate(&log_qg) {
        return 0.0;
    }
    let log_f0 = log_f0_given(rho, q, d, pi, &log_qg);
    (std::f64::consts::PI.ln() - log_f0) / std::f64::consts::LN_2
}

fn evaluate_log_space_given(rho: f64, q: &[f64], d: &Array2<f64>, pi: &Array2<f64>, log_qg: &[f64]) -> Evaluation {
    if is_degenerate(log_qg) {
        return Evaluation { e0: 0.0, grad: 0.0 };
    }
    let log_f0 = log_f0_given(rho, q, d, pi, log_qg);
    let e0 = (std::f64::consts::PI.ln() - log_f0) / std::f64::consts::LN_2;

    // the analytic gradient is unstable here; use a one-sided finite
    // difference instead, stepping inward if we're at the rho=1 boundary
    let rho2 = if rho + LOG_SPACE_FD_STEP <= 1.0 {
        rho + LOG_SPACE_FD_STEP
    } else {
        rho - LOG_SPACE_FD_STEP
    };
    let e0_2 = e0_log_space_only(rho2, q, d, pi);
    let grad = (e0_2 - e0) / (rho2 - rho);

    finalize(e0, grad)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constellation::{Constellation, Modulation};
    use crate::prior::{normalize, PriorKind};
    use crate::quadrature::quadrature;
    use crate::tensor::build_tensors;
    use float_cmp::assert_approx_eq;

    fn setup(m: usize, snr: f64, n: usize) -> (Vec<f64>, Array2<f64>, Array2<f64>) {
        let c = Constellation::build(m, Modulation::Pam, None).unwrap();
        let norm = normalize(&c, PriorKind::Uniform, 0.0).unwrap();
        let q = quadrature(n).unwrap();
        let t = build_tensors(&norm.x, &q, snr);
        (norm.q, t.d, t.pi)
    }

    #[test]
    fn e0_at_rho_zero_is_zero() {
        let (q, d, pi) = setup(4, 3.0, 20);
        let mode = choose_mode(&d);
        let ev = evaluate(0.0, &q, &d, &pi, mode);
        assert_approx_eq!(f64, ev.e0, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn scenario_s5_two_pam_rho_fixed() {
        let (q, d, pi) = setup(2, 1.0, 30);
        let mode = choose_mode(&d);
        let ev = evaluate(0.73, &q, &d, &pi, mode);
        assert_approx_eq!(f64, ev.e0, 1.257_250_393_872_879, epsilon = 1e-10);
    }

    #[test]
    fn regular_and_hybrid_agree_when_both_apply() {
        let (q, d, pi) = setup(4, 5.0, 20);
        let reg = evaluate(0.4, &q, &d, &pi, ArithmeticMode::Regular);
        let hyb = evaluate(0.4, &q, &d, &pi, ArithmeticMode::Hybrid);
        assert_approx_eq!(f64, reg.e0, hyb.e0, epsilon = 1e-8);
    }

    #[test]
    fn high_snr_uses_log_space_and_stays_non_negative() {
        let (q, d, pi) = setup(32, 10_f64.powi(5), 35);
        let mode = choose_mode(&d);
        assert_eq!(mode, ArithmeticMode::LogSpace);
        let ev = evaluate(0.5, &q, &d, &pi, mode);
        assert!(ev.e0 >= 0.0);
        assert!(ev.e0.is_finite());
    }

    #[test]
    fn e0_is_monotone_non_decreasing_in_snr() {
        let mut last = 0.0_f64;
        for &snr in &[0.5, 1.0, 2.0, 5.0, 10.0, 20.0] {
            let (q, d, pi) = setup(4, snr, 25);
            let mode = choose_mode(&d);
            let ev = evaluate(0.5, &q, &d, &pi, mode);
            assert!(ev.e0 >= last - 1e-9, "E0 decreased from {last} to {} at SNR={snr}", ev.e0);
            last = ev.e0;
        }
    }
}
