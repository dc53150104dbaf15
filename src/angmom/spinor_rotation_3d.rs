//! Spin-space rotations and the Pauli basis.

use std::fmt;
use std::str::FromStr;

use ndarray::{array, Array2};
use num::complex::Complex;
use num_traits::{One, Zero};
use serde::{Deserialize, Serialize};

use crate::angmom::wigner_rotation_3d::dmat_euler_gen;
use crate::auxiliary::error::GreensfError;

#[cfg(test)]
#[path = "spinor_rotation_3d_tests.rs"]
mod spinor_rotation_3d_tests;

type C128 = Complex<f64>;

/// Returns the Wigner rotation matrix for $`j = 1/2`$ whose elements are defined by
///
/// ```math
/// \hat{R}(\alpha, \beta, \gamma) \ket{\tfrac{1}{2}m}
/// = \sum_{m'} \ket{\tfrac{1}{2}m'} D^{(1/2)}_{m'm}(\alpha, \beta, \gamma).
/// ```
///
/// # Arguments
///
/// * `euler_angles` - A triplet of Euler angles $`(\alpha, \beta, \gamma)`$ in radians, following
/// the Whitaker convention, *i.e.* $`z_2-y-z_1`$ (extrinsic rotations).
/// * `increasingm` - If `true`, the rows and columns of $`\mathbf{D}^{(1/2)}`$ are
/// arranged in increasing order of $`m = -1/2, 1/2`$. If `false`, the order is reversed, which
/// places spin-up first as in the packed Green's-function storage.
///
/// # Returns
///
/// The matrix $`\mathbf{D}^{(1/2)}(\alpha, \beta, \gamma)`$.
pub fn dmat_euler(euler_angles: (f64, f64, f64), increasingm: bool) -> Array2<C128> {
    dmat_euler_gen(1, euler_angles, increasingm)
}

/// Returns the SU(2) matrix that rotates the spin quantisation axis of a site whose local frame
/// is described by the polar angles $`(\alpha, \beta)`$, with spin-up first.
pub fn spin_rotation(alpha: f64, beta: f64) -> Array2<C128> {
    dmat_euler((alpha, beta, 0.0), false)
}

/// An enumerated type for the identity and the three Pauli matrices.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PauliMatrix {
    /// The $`2 \times 2`$ identity, alias `"0"`.
    Identity,

    /// $`\sigma_x`$.
    X,

    /// $`\sigma_y`$.
    Y,

    /// $`\sigma_z`$.
    Z,
}

impl PauliMatrix {
    /// The three Cartesian Pauli matrices in the order $`x, y, z`$.
    pub const CARTESIAN: [PauliMatrix; 3] = [PauliMatrix::X, PauliMatrix::Y, PauliMatrix::Z];

    /// Returns the matrix in the spin-up-first basis.
    pub fn matrix(&self) -> Array2<C128> {
        let o = C128::one();
        let z = C128::zero();
        let i = C128::i();
        match self {
            PauliMatrix::Identity => array![[o, z], [z, o]],
            PauliMatrix::X => array![[z, o], [o, z]],
            PauliMatrix::Y => array![[z, -i], [i, z]],
            PauliMatrix::Z => array![[o, z], [z, -o]],
        }
    }
}

impl fmt::Display for PauliMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PauliMatrix::Identity => write!(f, "0"),
            PauliMatrix::X => write!(f, "x"),
            PauliMatrix::Y => write!(f, "y"),
            PauliMatrix::Z => write!(f, "z"),
        }
    }
}

impl FromStr for PauliMatrix {
    type Err = GreensfError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "0" => Ok(PauliMatrix::Identity),
            "x" => Ok(PauliMatrix::X),
            "y" => Ok(PauliMatrix::Y),
            "z" => Ok(PauliMatrix::Z),
            _ => Err(GreensfError::BadField(format!("Pauli matrix `{s}`"))),
        }
    }
}
