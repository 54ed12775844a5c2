use anyhow::{anyhow, Result};
use ndarray::Array1;

/// Tolerance on the normalization of the insertion content probabilities
pub const EPSILON_INSERTION: f64 = 1e-10;
/// Tolerance on the normalization of the rearrangement frequency table
pub const EPSILON_VERSION: f64 = 1e-8;
/// Tolerance on the mean of a per-site rate vector
pub const EPSILON_RATES: f64 = 1e-6;

/// True if `total` is one, up to `eps`
///```
/// use vdjsim::shared::utils::is_normed;
/// assert!(is_normed(1. - 1e-12, 1e-10));
/// assert!(!is_normed(0.99, 1e-10));
///```
pub fn is_normed(total: f64, eps: f64) -> bool {
    (total - 1.).abs() < eps
}

/// Rescale `rates` so that their sum equals their number (mean rate 1.0), and
/// check it by summing again.
///```
/// use ndarray::array;
/// use vdjsim::shared::utils::normalize_rates;
/// let r = normalize_rates(array![1., 2., 3., 2.]).unwrap();
/// assert!((r.sum() - 4.).abs() < 1e-12);
/// assert!((r[2] - 1.5).abs() < 1e-12);
///```
pub fn normalize_rates(rates: Array1<f64>) -> Result<Array1<f64>> {
    let n = rates.len();
    if n == 0 {
        return Ok(rates);
    }
    let total = rates.sum();
    if total <= 0. || !total.is_finite() {
        return Err(anyhow!(
            "Mutation rates sum to {}, can't normalize them",
            total
        ));
    }
    let rates = rates * (n as f64 / total);
    let check = rates.sum();
    if !is_normed(check / n as f64, EPSILON_RATES) {
        return Err(anyhow!(
            "Normalized mutation rates sum to {} instead of {}",
            check,
            n
        ));
    }
    Ok(rates)
}
