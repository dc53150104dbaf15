//! Wigner rotation matrices for integral and half-integral angular momenta.

use ndarray::{Array2, Axis};
use num::Complex;

use crate::angmom::factorial_f64;

#[cfg(test)]
#[path = "wigner_rotation_3d_tests.rs"]
mod wigner_rotation_3d_tests;

/// Returns an element of the Wigner small-$`d`$ matrix for an integral or half-integral $`j`$,
///
/// ```math
/// d^{(j)}_{m'm}(\beta) = \sum_k (-1)^{k-m+m'}
///     \frac{\sqrt{(j+m')!(j-m')!(j+m)!(j-m)!}}{(j+m-k)!\,k!\,(j-k-m')!\,(k-m+m')!}
///     \cos^{2j-2k+m-m'}\tfrac{\beta}{2} \sin^{2k-m+m'}\tfrac{\beta}{2}.
/// ```
///
/// # Arguments
///
/// * `twoj` - Two times the angular momentum $`2j`$.
/// * `twomdash` - Two times $`m'`$.
/// * `twom` - Two times $`m`$.
/// * `beta` - The angle $`\beta`$ in radians.
///
/// # Returns
///
/// The element $`d^{(j)}_{m'm}(\beta)`$.
fn dmat_small_element(twoj: u32, twomdash: i64, twom: i64, beta: f64) -> f64 {
    let twoj = i64::from(twoj);
    debug_assert!(twom.abs() <= twoj && (twoj - twom) % 2 == 0, "Invalid 2m = {twom}.");
    debug_assert!(
        twomdash.abs() <= twoj && (twoj - twomdash) % 2 == 0,
        "Invalid 2m' = {twomdash}."
    );
    // All factorial arguments below are integers because j ± m and j ± m' are.
    let jpm = (twoj + twom) / 2;
    let jmm = (twoj - twom) / 2;
    let jpmd = (twoj + twomdash) / 2;
    let jmmd = (twoj - twomdash) / 2;
    let mdmm = (twomdash - twom) / 2;

    let prefactor = (factorial_f64(jpmd) * factorial_f64(jmmd) * factorial_f64(jpm) * factorial_f64(jmm))
        .sqrt();
    let (sin_half, cos_half) = (beta / 2.0).sin_cos();

    let kmin = 0.max(-mdmm);
    let kmax = jpm.min(jmmd);
    (kmin..=kmax)
        .map(|k| {
            let sign = if (k + mdmm) % 2 == 0 { 1.0 } else { -1.0 };
            let den = factorial_f64(jpm - k)
                * factorial_f64(k)
                * factorial_f64(jmmd - k)
                * factorial_f64(k + mdmm);
            let cos_pow = (twoj - 2 * k - mdmm) as i32;
            let sin_pow = (2 * k + mdmm) as i32;
            sign * prefactor / den * cos_half.powi(cos_pow) * sin_half.powi(sin_pow)
        })
        .sum()
}

/// Returns an element in the Wigner rotation matrix for an integral or half-integral
/// $`j`$, defined by
///
/// ```math
/// \hat{R}(\alpha, \beta, \gamma) \ket{jm}
/// = \sum_{m'} \ket{jm'} D^{(j)}_{m'm}(\alpha, \beta, \gamma)
/// = \sum_{m'} \ket{jm'} e^{-i m' \alpha} d^{(j)}_{m'm}(\beta) e^{-i m \gamma}.
/// ```
///
/// # Arguments
///
/// * `twoj` - Two times the angular momentum $`2j`$. If this is even, $`j`$ is integral;
/// otherwise, $`j`$ is half-integral.
/// * `mdashi` - Index for $`m'`$ given by $`m'+j`$.
/// * `mi` - Index for $`m`$ given by $`m+j`$.
/// * `euler_angles` - A triplet of Euler angles $`(\alpha, \beta, \gamma)`$ in radians,
/// following the Whitaker convention, *i.e.* $`z_2-y-z_1`$ (extrinsic rotations).
///
/// # Returns
///
/// The element $`D^{(j)}_{m'm}(\alpha, \beta, \gamma)`$.
pub fn dmat_euler_gen_element(
    twoj: u32,
    mdashi: usize,
    mi: usize,
    euler_angles: (f64, f64, f64),
) -> Complex<f64> {
    let twoj_i = i64::from(twoj);
    let twomdash = 2 * mdashi as i64 - twoj_i;
    let twom = 2 * mi as i64 - twoj_i;
    let (alpha, beta, gamma) = euler_angles;
    let d = dmat_small_element(twoj, twomdash, twom, beta);

    let i = Complex::<f64>::i();
    let mdash = twomdash as f64 / 2.0;
    let m = twom as f64 / 2.0;
    (-1.0 * i * (alpha * mdash + gamma * m)).exp() * d
}

/// Returns the Wigner rotation matrix for an integral or half-integral $`j`$ whose elements are
/// defined by
///
/// ```math
/// \hat{R}(\alpha, \beta, \gamma) \ket{jm}
/// = \sum_{m'} \ket{jm'} D^{(j)}_{m'm}(\alpha, \beta, \gamma).
/// ```
///
/// # Arguments
///
/// * `twoj` - Two times the angular momentum $`2j`$.
/// * `euler_angles` - A triplet of Euler angles $`(\alpha, \beta, \gamma)`$ in radians,
/// following the Whitaker convention, *i.e.* $`z_2-y-z_1`$ (extrinsic rotations).
/// * `increasingm` - If `true`, the rows and columns of $`\mathbf{D}^{(j)}`$ are
/// arranged in increasing order of $`m = -j, \ldots, j`$. If `false`, the order is reversed:
/// $`m = j, \ldots, -j`$.
///
/// # Returns
///
/// The matrix $`\mathbf{D}^{(j)}(\alpha, \beta, \gamma)`$.
pub fn dmat_euler_gen(
    twoj: u32,
    euler_angles: (f64, f64, f64),
    increasingm: bool,
) -> Array2<Complex<f64>> {
    let dim = twoj as usize + 1;
    let mut dmat = Array2::<Complex<f64>>::zeros((dim, dim));
    for mdashi in 0..dim {
        for mi in 0..dim {
            dmat[(mdashi, mi)] = dmat_euler_gen_element(twoj, mdashi, mi, euler_angles);
        }
    }
    if !increasingm {
        dmat.invert_axis(Axis(0));
        dmat.invert_axis(Axis(1));
    }
    dmat
}

/// Returns the Wigner rotation matrix $`\mathbf{D}^{(l)}(\alpha, \beta, 0)`$ acting on complex
/// spherical harmonics $`Y_{lm}`$ stored in increasing order of $`m = -l, \ldots, l`$.
///
/// This is the real-space rotation applied to the orbital axes of a Green's function.
///
/// # Arguments
///
/// * `l` - The orbital angular momentum.
/// * `alpha` - The azimuthal angle in radians.
/// * `beta` - The polar angle in radians.
pub fn orbital_rotation(l: u32, alpha: f64, beta: f64) -> Array2<Complex<f64>> {
    dmat_euler_gen(2 * l, (alpha, beta, 0.0), true)
}
