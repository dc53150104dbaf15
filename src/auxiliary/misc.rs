use ndarray::{ArrayBase, Data, Dimension};

/// Trait for rounding floats to a fixed number of decimal places.
pub(crate) trait RoundableFloat {
    /// Returns a float rounded after being multiplied by a factor.
    ///
    /// Let $`x`$ be a float, $`k`$ a factor, and $`[\cdot]`$ denote the rounding-to-integer
    /// operation. This function yields $`[x \times k] / k`$.
    ///
    /// # Arguments
    ///
    /// * `factor` - The factor $`k`$ used in the rounding of the float.
    ///
    /// # Returns
    ///
    /// The rounded float.
    fn round_factor(self, factor: Self) -> Self;

    /// Rounds a float to `decimals` decimal places.
    fn round_decimals(self, decimals: i32) -> Self;
}

impl RoundableFloat for f64 {
    fn round_factor(self, factor: f64) -> Self {
        (self * factor).round() / factor
    }

    fn round_decimals(self, decimals: i32) -> Self {
        self.round_factor(10f64.powi(decimals))
    }
}

/// Element-wise closeness test with the conventional relative and absolute tolerances
/// (`|a - b| <= atol + rtol * |b|`).
pub(crate) fn allclose<S1, S2, D>(a: &ArrayBase<S1, D>, b: &ArrayBase<S2, D>) -> bool
where
    S1: Data<Elem = f64>,
    S2: Data<Elem = f64>,
    D: Dimension,
{
    allclose_tol(a, b, 1.0e-5, 1.0e-8)
}

/// Element-wise closeness test with explicit tolerances.
pub(crate) fn allclose_tol<S1, S2, D>(
    a: &ArrayBase<S1, D>,
    b: &ArrayBase<S2, D>,
    rtol: f64,
    atol: f64,
) -> bool
where
    S1: Data<Elem = f64>,
    S2: Data<Elem = f64>,
    D: Dimension,
{
    a.shape() == b.shape()
        && a
            .iter()
            .zip(b.iter())
            .all(|(x, y)| (x - y).abs() <= atol + rtol * y.abs())
}
