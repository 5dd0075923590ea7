//! Error types for the `gallager` engine.

use thiserror::Error;

/// Parameter-validation failures, detected before any tensor is built.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum InputError {
    /// `M` (alphabet size) is not a positive integer in a usable range.
    #[error("alphabet size M must be >= 2, got {m}")]
    InvalidAlphabetSize {
        /// The rejected value of `M`.
        m: usize,
    },
    /// `SNR` was not a positive, finite real number.
    #[error("SNR must be positive and finite, got {snr}")]
    InvalidSnr {
        /// The rejected value of `SNR`.
        snr: f64,
    },
    /// `R` fell outside `(0, log2 M)`.
    #[error("rate R = {r} must lie in (0, log2({m})) = (0, {max_rate})")]
    InvalidRate {
        /// The rejected rate.
        r: f64,
        /// The alphabet size it was checked against.
        m: usize,
        /// `log2(m)`, the open upper bound.
        max_rate: f64,
    },
    /// Block length `n` was not positive.
    #[error("block length n must be positive, got {n}")]
    InvalidBlockLength {
        /// The rejected value of `n`.
        n: f64,
    },
    /// Convergence tolerance was not positive.
    #[error("threshold (gradient-descent epsilon) must be positive, got {threshold}")]
    InvalidThreshold {
        /// The rejected tolerance.
        threshold: f64,
    },
    /// Maxwell-Boltzmann `beta` was negative.
    #[error("beta must be >= 0 for the Maxwell-Boltzmann prior, got {beta}")]
    InvalidBeta {
        /// The rejected value of `beta`.
        beta: f64,
    },
    /// `custom_points` was missing or malformed for `modulation = custom`.
    #[error("custom modulation requires re[], im[] and prob[] of equal, non-zero length")]
    InvalidCustomPoints,
}

/// Catch-all error for this crate.
#[derive(Debug, Error)]
pub enum Error {
    /// A parameter was out of range; no tensors were allocated.
    #[error("invalid input: {0}")]
    InvalidInput(#[from] InputError),
    /// The requested quadrature order is unsupported (out of `[2, 200]`, or a
    /// known-degenerate order such as 99, 101, 300 or 500).
    #[error("quadrature order N = {n} is not supported")]
    QuadratureUnavailable {
        /// The rejected quadrature order.
        n: usize,
    },
    /// A non-finite result survived every recovery path (mode escalation,
    /// clamping). Callers should retry with a higher `N` or investigate the
    /// reported parameters.
    #[error(
        "catastrophic numerical failure at SNR={snr}, N={n}, rho={rho}: {detail}"
    )]
    Catastrophic {
        /// SNR at the time of failure.
        snr: f64,
        /// Quadrature order at the time of failure.
        n: usize,
        /// Last value of rho before failure.
        rho: f64,
        /// Human-readable description of what went wrong.
        detail: String,
    },
}

/// Specialised `Result` for this crate.
pub type Result<T> = std::result::Result<T, Error>;
