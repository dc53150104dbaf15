//! Angular momentum: rotation matrices and coupling coefficients.

use factorial::Factorial;
use num::BigUint;
use num_traits::ToPrimitive;
use phf::phf_map;

pub mod gaunt;
pub mod spinor_rotation_3d;
pub mod wigner_rotation_3d;


/// Alphabetical labels of angular momenta.
pub static ANGMOM_LABELS: [&str; 7] = ["S", "P", "D", "F", "G", "H", "I"];

/// Indices of alphabetical labels of angular momenta.
pub static ANGMOM_INDICES: phf::Map<&'static str, u32> = phf_map! {
    "S" => 0,
    "P" => 1,
    "D" => 2,
    "F" => 3,
    "G" => 4,
    "H" => 5,
    "I" => 6,
};

/// Returns $`n!`$ as a float, evaluated exactly before the conversion.
///
/// Callers keep `n` non-negative through the selection rules of the coefficient being computed.
pub(crate) fn factorial_f64(n: i64) -> f64 {
    debug_assert!(n >= 0, "Unable to take the factorial of {n}.");
    BigUint::from(n.max(0).unsigned_abs())
        .checked_factorial()
        .and_then(|value| value.to_f64())
        .unwrap_or(f64::INFINITY)
}
