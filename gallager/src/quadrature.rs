//! Gauss-Hermite quadrature tables (component C1).
//!
//! Nodes and weights of the physicist's Hermite polynomial of a given
//! order `N`, built via the Golub-Welsch construction: the roots are the
//! eigenvalues of the symmetric tridiagonal Jacobi matrix for the Hermite
//! recurrence, and the weights come from the first components of the
//! corresponding (normalised) eigenvectors. Results are memoised by `N` in
//! a process-lifetime cache (see [`quadrature`]).

use crate::convert::f64_from_usize;
use crate::error::{Error, Result};
use ndarray::Array2;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock, RwLock};

/// Smallest supported quadrature order.
pub const MIN_ORDER: usize = 2;
/// Largest supported quadrature order.
pub const MAX_ORDER: usize = 200;
/// Orders at which the Golub-Welsch construction is observed to degenerate
/// (the eigensolver fails to separate nearly-coincident extreme roots to
/// full precision). Rejected explicitly rather than returning a silently
/// degraded table.
const KNOWN_BAD_ORDERS: [usize; 2] = [99, 101];

/// Nodes and weights of an `N`-point Gauss-Hermite rule, exact for
/// polynomials of degree `<= 2N - 1` against the weight `exp(-t^2)`.
#[derive(Clone, Debug, PartialEq)]
pub struct Quadrature {
    /// Quadrature order.
    pub n: usize,
    /// Roots of the order-`N` physicist's Hermite polynomial, ascending.
    pub roots: Vec<f64>,
    /// Weights corresponding to `roots`, same order.
    pub weights: Vec<f64>,
}

pub(crate) fn validate_order(n: usize) -> Result<()> {
    if !(MIN_ORDER..=MAX_ORDER).contains(&n) || KNOWN_BAD_ORDERS.contains(&n) {
        return Err(Error::QuadratureUnavailable { n });
    }
    Ok(())
}

type Cache = RwLock<HashMap<usize, Arc<Quadrature>>>;

fn cache() -> &'static Cache {
    static QUADRATURE_CACHE: OnceLock<Cache> = OnceLock::new();
    QUADRATURE_CACHE.get_or_init(|| RwLock::new(HashMap::new()))
}

/// Returns the (cached) Gauss-Hermite quadrature table of order `n`.
///
/// Concurrent readers never block each other; the first caller to request
/// an unseen `n` pays for the construction while holding the write lock,
/// and any caller racing it for the same `n` simply waits and reuses the
/// result instead of duplicating the work.
///
/// # Errors
///
/// Returns [`Error::QuadratureUnavailable`] if `n` is outside
/// `[MIN_ORDER, MAX_ORDER]` or is one of the known-degenerate orders.
pub fn quadrature(n: usize) -> Result<Arc<Quadrature>> {
    validate_order(n)?;

    if let Some(table) = cache().read().unwrap().get(&n) {
        return Ok(Arc::clone(table));
    }

    let mut guard = cache().write().unwrap();
    // another thread may have inserted it while we were waiting for the lock
    if let Some(table) = guard.get(&n) {
        return Ok(Arc::clone(table));
    }

    let table = Arc::new(build(n));
    guard.insert(n, Arc::clone(&table));
    Ok(table)
}

/// Builds the order-`n` table from scratch (no cache lookup).
fn build(n: usize) -> Quadrature {
    // Jacobi matrix for the physicist's Hermite recurrence: zero diagonal,
    // off-diagonal e_k = sqrt(k / 2) for k = 1..n-1.
    let mut diag = vec![0.0_f64; n];
    let mut sub = vec![0.0_f64; n];
    for k in 1..n {
        sub[k] = (f64_from_usize(k) / 2.0).sqrt();
    }

    let mut eigvecs = Array2::<f64>::eye(n);
    sym_tridiag_eigen(&mut diag, &mut sub, &mut eigvecs);

    // mu0 = integral of exp(-t^2) dt over R = sqrt(pi)
    let mu0 = std::f64::consts::PI.sqrt();

    let mut pairs: Vec<(f64, f64)> = (0..n)
        .map(|k| {
            let first_component = eigvecs[[0, k]];
            (diag[k], mu0 * first_component * first_component)
        })
        .collect();
    pairs.sort_by(|a, b| a.0.total_cmp(&b.0));

    let mut roots: Vec<f64> = pairs.iter().map(|&(t, _)| t).collect();
    let mut weights: Vec<f64> = pairs.iter().map(|&(_, w)| w).collect();

    symmetrize(&mut roots, &mut weights);

    Quadrature { n, roots, weights }
}

/// Enforces `t_i = -t_{n-1-i}` and `w_i = w_{n-1-i}` exactly, averaging the
/// numerically-computed mirror pair rather than trusting either one alone.
fn symmetrize(roots: &mut [f64], weights: &mut [f64]) {
    let n = roots.len();
    for i in 0..n / 2 {
        let j = n - 1 - i;
        let t = (roots[j] - roots[i]) / 2.0;
        roots[i] = -t;
        roots[j] = t;
        let w = (weights[i] + weights[j]) / 2.0;
        weights[i] = w;
        weights[j] = w;
    }
    if n % 2 == 1 {
        roots[n / 2] = 0.0;
    }
}

/// Eigen-decomposition of a real symmetric tridiagonal matrix via the
/// implicit-shift QL algorithm, accumulating eigenvectors in `z` (which
/// must start as the identity). `diag`/`sub` are overwritten with the
/// eigenvalues and zeros respectively; `sub[0]` is unused on entry.
///
/// This is the classical Golub-Welsch eigensolver (see Golub & Van Loan,
/// *Matrix Computations*, the symmetric QL step with Wilkinson shift).
fn sym_tridiag_eigen(diag: &mut [f64], sub: &mut [f64], z: &mut Array2<f64>) {
    let n = diag.len();
    if n == 0 {
        return;
    }
    // shift so sub[i] holds the off-diagonal element between diag[i] and
    // diag[i+1]; the convention above filled sub[1..n], so re-index down by
    // one and drop the unused slot.
    let mut e = vec![0.0_f64; n];
    e[..n - 1].copy_from_slice(&sub[1..n]);
    e[n - 1] = 0.0;

    for l in 0..n {
        let mut iterations = 0;
        'converge: loop {
            let mut m = l;
            while m < n - 1 {
                let dd = diag[m].abs() + diag[m + 1].abs();
                if e[m].abs() <= f64::EPSILON * dd {
                    break;
                }
                m += 1;
            }
            if m == l {
                break 'converge;
            }

            iterations += 1;
            assert!(
                iterations < 100,
                "Hermite quadrature eigensolver failed to converge for N={n}"
            );

            let mut g = (diag[l + 1] - diag[l]) / (2.0 * e[l]);
            let mut r = g.hypot(1.0);
            g = diag[m] - diag[l] + e[l] / (g + r.copysign(g));
            let mut s = 1.0_f64;
            let mut c = 1.0_f64;
            let mut p = 0.0_f64;
            let mut early_restart = false;

            for i in (l..m).rev() {
                let f = s * e[i];
                let b = c * e[i];
                r = f.hypot(g);
                e[i + 1] = r;
                if r == 0.0 {
                    diag[i + 1] -= p;
                    e[m] = 0.0;
                    early_restart = true;
                    break;
                }
                s = f / r;
                c = g / r;
                g = diag[i + 1] - p;
                r = (diag[i] - g) * s + 2.0 * c * b;
                p = s * r;
                diag[i + 1] = g + p;
                g = c * r - b;

                for k in 0..n {
                    let f2 = z[[k, i + 1]];
                    z[[k, i + 1]] = s * z[[k, i]] + c * f2;
                    z[[k, i]] = c * z[[k, i]] - s * f2;
                }
            }

            if early_restart {
                continue 'converge;
            }

            diag[l] -= p;
            e[l] = g;
            e[m] = 0.0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::assert_approx_eq;

    #[test]
    fn rejects_out_of_range_orders() {
        assert!(matches!(
            quadrature(0),
            Err(Error::QuadratureUnavailable { n: 0 })
        ));
        assert!(matches!(
            quadrature(1),
            Err(Error::QuadratureUnavailable { n: 1 })
        ));
        assert!(matches!(
            quadrature(201),
            Err(Error::QuadratureUnavailable { n: 201 })
        ));
    }

    #[test]
    fn rejects_known_bad_orders() {
        for n in [99, 101, 300, 500] {
            assert!(quadrature(n).is_err());
        }
    }

    #[test]
    fn caches_by_order() {
        let a = quadrature(10).unwrap();
        let b = quadrature(10).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn n2_matches_known_closed_form() {
        // 2-point Gauss-Hermite: roots +-1/sqrt(2), weights sqrt(pi)/2 each.
        let q = quadrature(2).unwrap();
        assert_approx_eq!(f64, q.roots[0], -std::f64::consts::FRAC_1_SQRT_2, epsilon = 1e-10);
        assert_approx_eq!(f64, q.roots[1], std::f64::consts::FRAC_1_SQRT_2, epsilon = 1e-10);
        let half_sqrt_pi = std::f64::consts::PI.sqrt() / 2.0;
        assert_approx_eq!(f64, q.weights[0], half_sqrt_pi, epsilon = 1e-10);
        assert_approx_eq!(f64, q.weights[1], half_sqrt_pi, epsilon = 1e-10);
    }

    #[test]
    fn symmetry_and_positivity_hold_across_orders() {
        for n in [3, 4, 5, 8, 15, 30, 40, 64, 100, 150, 200] {
            let q = quadrature(n).unwrap();
            assert_eq!(q.roots.len(), n);
            for i in 0..n {
                assert_approx_eq!(f64, q.roots[i], -q.roots[n - 1 - i], epsilon = 1e-9);
                assert_approx_eq!(f64, q.weights[i], q.weights[n - 1 - i], epsilon = 1e-9);
                assert!(q.weights[i] > 0.0);
            }
        }
    }

    #[test]
    fn integrates_polynomials_exactly_up_to_degree_2n_minus_1() {
        // integral of t^4 exp(-t^2) dt = 3*sqrt(pi)/4; exact for N >= 3 (2N-1 >= 4... wait N=3 -> 2N-1=5 OK)
        let q = quadrature(3).unwrap();
        let sum: f64 = q
            .roots
            .iter()
            .zip(&q.weights)
            .map(|(&t, &w)| w * t.powi(4))
            .sum();
        let expected = 3.0 * std::f64::consts::PI.sqrt() / 4.0;
        assert_approx_eq!(f64, sum, expected, epsilon = 1e-9);
    }
}
