//! Random-coding exponent E0(rho), Gallager error exponent E(R) and the
//! block-error bound Pe for memoryless AWGN channels with discrete input
//! constellations.
//!
//! [`compute::compute`] is the one entry point a transport layer (HTTP
//! handler, CLI, notebook) is expected to call; everything else is `pub`
//! for composability and testing.

#![warn(clippy::all, clippy::cargo, clippy::nursery, clippy::pedantic)]
#![warn(missing_docs)]
#![allow(clippy::multiple_crate_versions)]

pub mod cancel;
pub mod compute;
pub mod constellation;
pub mod convert;
pub mod error;
pub mod exponent;
pub mod optimize;
pub mod prior;
pub mod quadrature;
pub mod tensor;

pub use cancel::CancellationToken;
pub use compute::{compute as compute_exponent, ComputeParams, ComputeReport};
pub use error::{Error, InputError, Result};
