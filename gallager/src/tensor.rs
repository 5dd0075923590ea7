//! Channel distance/weight tensor construction (component C4).

use crate::quadrature::Quadrature;
use ndarray::Array2;
use num_complex::Complex64;
use rayon::prelude::*;

/// Dense `D`/`Pi` tensors of shape `(M, N^2 * M)`, built fresh for one
/// `compute()` call and dropped when it returns.
pub struct Tensors {
    /// `D[i, j*N^2 + k] = |y - sqrt(SNR) x_i|^2`, the squared channel
    /// distance from symbol `i` to the `k`-th noise realisation around
    /// transmitted symbol `j`.
    pub d: Array2<f64>,
    /// Block-diagonal Gauss-Hermite product weights: non-zero only in the
    /// `N^2`-column block belonging to the symbol that was actually
    /// transmitted.
    pub pi: Array2<f64>,
}

/// Builds the distance and weight tensors for alphabet `x` at `snr` using
/// the quadrature table `quad`.
///
/// Each transmitted-symbol block (`N^2` columns) is independent of every
/// other block, so the blocks are computed in parallel and assembled into
/// the dense tensors afterwards.
#[must_use]
pub fn build_tensors(x: &[Complex64], quad: &Quadrature, snr: f64) -> Tensors {
    let m = x.len();
    let n = quad.n;
    let n2 = n * n;
    let cols = n2 * m;
    let sqrt_snr = Complex64::new(snr.sqrt(), 0.0);

    let nodes: Vec<(Complex64, f64)> = (0..n2)
        .map(|k| {
            let k_re = k / n;
            let k_im = k % n;
            (
                Complex64::new(quad.roots[k_re], quad.roots[k_im]),
                quad.weights[k_re] * quad.weights[k_im],
            )
        })
        .collect();

    let blocks: Vec<(Vec<f64>, Vec<f64>)> = (0..m)
        .into_par_iter()
        .map(|j| {
            let mut d_block = vec![0.0_f64; m * n2];
            let mut pi_block = vec![0.0_f64; m * n2];
            for (k, &(z, w)) in nodes.iter().enumerate() {
                let y = sqrt_snr * x[j] + z;
                for (i, &xi) in x.iter().enumerate() {
                    let diff = y - sqrt_snr * xi;
                    d_block[i * n2 + k] = diff.norm_sqr();
                }
                pi_block[j * n2 + k] = w;
            }
            (d_block, pi_block)
        })
        .collect();

    let mut d = Array2::<f64>::zeros((m, cols));
    let mut pi = Array2::<f64>::zeros((m, cols));
    for (j, (d_block, pi_block)) in blocks.into_iter().enumerate() {
        let col_start = j * n2;
        for i in 0..m {
            for k in 0..n2 {
                d[[i, col_start + k]] = d_block[i * n2 + k];
                pi[[i, col_start + k]] = pi_block[i * n2 + k];
            }
        }
    }

    Tensors { d, pi }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constellation::{Constellation, Modulation};
    use crate::quadrature::quadrature;

    #[test]
    fn shapes_match_spec() {
        let c = Constellation::build(4, Modulation::Pam, None).unwrap();
        let q = quadrature(10).unwrap();
        let t = build_tensors(&c.x, &q, 5.0);
        let n2 = 10 * 10;
        assert_eq!(t.d.shape(), &[4, n2 * 4]);
        assert_eq!(t.pi.shape(), &[4, n2 * 4]);
    }

    #[test]
    fn pi_is_block_diagonal_in_the_transmitted_symbol() {
        let c = Constellation::build(4, Modulation::Pam, None).unwrap();
        let q = quadrature(8).unwrap();
        let t = build_tensors(&c.x, &q, 3.0);
        let n2 = 8 * 8;
        for j in 0..4 {
            for i in 0..4 {
                let block = t.pi.slice(ndarray::s![i, j * n2..(j + 1) * n2]);
                let total: f64 = block.sum();
                if i == j {
                    assert!(total > 0.0);
                } else {
                    assert_eq!(total, 0.0);
                }
            }
        }
    }

    #[test]
    fn distances_are_non_negative() {
        let c = Constellation::build(8, Modulation::Psk, None).unwrap();
        let q = quadrature(6).unwrap();
        let t = build_tensors(&c.x, &q, 10.0);
        assert!(t.d.iter().all(|&v| v >= 0.0));
    }
}
