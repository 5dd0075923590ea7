//! Small numeric conversion helpers used throughout the crate.

#[allow(clippy::cast_precision_loss)]
pub fn f64_from_usize(x: usize) -> f64 {
    x as f64
}

/// `log2` computed as `ln(x) / ln(2)`, kept as a named helper so call sites
/// read as "log base 2" rather than a magic division.
pub fn log2(x: f64) -> f64 {
    x.ln() / std::f64::consts::LN_2
}
