//! Wigner $`3j`$ symbols and Gaunt coefficients for integral angular momenta.

use crate::angmom::factorial_f64;

#[cfg(test)]
#[path = "gaunt_tests.rs"]
mod gaunt_tests;

/// Checks the triangle condition $`|j_1 - j_2| \le j_3 \le j_1 + j_2`$.
fn triangle(j1: i64, j2: i64, j3: i64) -> bool {
    j3 >= (j1 - j2).abs() && j3 <= j1 + j2
}

/// Computes the Wigner $`3j`$ symbol
///
/// ```math
/// \begin{pmatrix} j_1 & j_2 & j_3 \\ m_1 & m_2 & m_3 \end{pmatrix}
/// ```
///
/// for integral angular momenta using the Racah formula.
///
/// # Returns
///
/// The value of the symbol, which is zero whenever the selection rules are violated.
pub fn wigner_3j(j1: i64, j2: i64, j3: i64, m1: i64, m2: i64, m3: i64) -> f64 {
    if j1 < 0 || j2 < 0 || j3 < 0 {
        return 0.0;
    }
    if m1 + m2 + m3 != 0 || m1.abs() > j1 || m2.abs() > j2 || m3.abs() > j3 {
        return 0.0;
    }
    if !triangle(j1, j2, j3) {
        return 0.0;
    }

    let delta = (factorial_f64(j1 + j2 - j3) * factorial_f64(j1 - j2 + j3)
        * factorial_f64(-j1 + j2 + j3)
        / factorial_f64(j1 + j2 + j3 + 1))
    .sqrt();
    let norm = (factorial_f64(j1 + m1)
        * factorial_f64(j1 - m1)
        * factorial_f64(j2 + m2)
        * factorial_f64(j2 - m2)
        * factorial_f64(j3 + m3)
        * factorial_f64(j3 - m3))
    .sqrt();

    let kmin = 0.max(j2 - j3 - m1).max(j1 - j3 + m2);
    let kmax = (j1 + j2 - j3).min(j1 - m1).min(j2 + m2);
    let sum: f64 = (kmin..=kmax)
        .map(|k| {
            let sign = if k % 2 == 0 { 1.0 } else { -1.0 };
            sign / (factorial_f64(k)
                * factorial_f64(j1 + j2 - j3 - k)
                * factorial_f64(j1 - m1 - k)
                * factorial_f64(j2 + m2 - k)
                * factorial_f64(j3 - j2 + m1 + k)
                * factorial_f64(j3 - j1 - m2 + k))
        })
        .sum();

    let phase = if (j1 - j2 - m3).rem_euclid(2) == 0 {
        1.0
    } else {
        -1.0
    };
    phase * delta * norm * sum
}

/// Computes the Gaunt coefficient, *i.e.* the integral of three complex spherical harmonics,
///
/// ```math
/// \int Y_{l_1 m_1} Y_{l_2 m_2} Y_{l_3 m_3} \, d\Omega
/// = \sqrt{\frac{(2l_1+1)(2l_2+1)(2l_3+1)}{4\pi}}
///   \begin{pmatrix} l_1 & l_2 & l_3 \\ 0 & 0 & 0 \end{pmatrix}
///   \begin{pmatrix} l_1 & l_2 & l_3 \\ m_1 & m_2 & m_3 \end{pmatrix}.
/// ```
pub fn gaunt(l1: i64, l2: i64, l3: i64, m1: i64, m2: i64, m3: i64) -> f64 {
    let parity = wigner_3j(l1, l2, l3, 0, 0, 0);
    if parity == 0.0 {
        return 0.0;
    }
    let pref = ((2 * l1 + 1) * (2 * l2 + 1) * (2 * l3 + 1)) as f64 / (4.0 * std::f64::consts::PI);
    pref.sqrt() * parity * wigner_3j(l1, l2, l3, m1, m2, m3)
}
