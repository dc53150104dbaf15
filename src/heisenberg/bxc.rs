//! Exchange splittings assembled from the radial exchange-correlation field.
//!
//! The container stores the expansion coefficients $`B_{l_p m_p}(r)`$ of the
//! exchange-correlation field in spherical harmonics on the logarithmic radial mesh of each atom
//! type. The exchange splitting between $`Y_{lm}`$ and $`Y_{lm'}`$ is
//!
//! ```math
//! \Delta^{(l)}_{mm'} = \sum_{l_p = 0}^{2l} \sum_{m_p = -l_p}^{l_p}
//!     (-1)^{m'} \langle l, -m \mid l_p, m_p \mid l, m' \rangle
//!     \int_0^{r_\mathrm{max}} B_{l_p m_p}(r) \, dr,
//! ```
//!
//! where the angular factor is a Gaunt coefficient.

use ndarray::{s, Array1, Array3, Array4, ArrayD, ArrayView1, ArrayView2, Axis, Ix2, Ix3, Zip};
use num_complex::Complex;
use num_traits::Zero;
use rayon::prelude::*;

use crate::angmom::gaunt::gaunt;
use crate::auxiliary::constants::HTR_TO_EV;
use crate::auxiliary::error::{GreensfError, GreensfResult};
use crate::container::Container;

#[cfg(test)]
#[path = "bxc_tests.rs"]
mod bxc_tests;

type C128 = Complex<f64>;

/// Default number of points of the linear radial mesh.
pub const DEFAULT_RADIAL_POINTS: usize = 4000;

/// Minimum container version carrying `/bxc/data`.
pub const BXC_VERSION: i64 = 9;

/// The largest orbital quantum number for which splittings are assembled.
const BXC_LMAX: usize = 3;

const BXC_PATH: &str = "/bxc/data";
const RMSH_PATH: &str = "/RadialFunctions/rmsh";

/// Assembles the exchange-splitting matrices of every atom type from the Bxc dataset.
///
/// # Arguments
///
/// * `container` - The container to read.
/// * `radial_points` - The number of points of the linear radial mesh.
///
/// # Returns
///
/// An array `[atom_type, l, m, m']` of shape `[T, 4, 7, 7]` in eV, with the
/// $`(2l+1)\times(2l+1)`$ block of each `l` in the leading corner.
///
/// # Errors
///
/// Errors with [`GreensfError::BadVersion`] if the container predates the Bxc dataset.
pub fn calculate_bxc_mmp_matrix<C: Container + ?Sized>(
    container: &C,
    radial_points: usize,
) -> GreensfResult<Array4<C128>> {
    container.require_version(BXC_VERSION)?;
    if radial_points < 2 {
        return Err(GreensfError::BadShape(format!(
            "calculate_bxc_mmp_matrix ({radial_points} radial points)"
        )));
    }

    let bxc = read_bxc(container)?;
    let rmsh = container
        .dataset(RMSH_PATH)?
        .read()?
        .into_dimensionality::<Ix2>()?;
    let ntypes = bxc.shape()[0];
    if rmsh.nrows() < ntypes {
        return Err(GreensfError::Malformed(format!(
            "`{RMSH_PATH}` covers {} atom types, `{BXC_PATH}` {ntypes}",
            rmsh.nrows()
        )));
    }
    let group = container.group("/RadialFunctions")?;
    let jri = match group.optional_attribute("jri")? {
        Some(_) => group
            .get_i64_vec("jri")?
            .into_iter()
            .map(|n| usize::try_from(n).unwrap_or(0))
            .collect::<Vec<_>>(),
        None => vec![rmsh.ncols(); ntypes],
    };
    if jri.len() < ntypes {
        return Err(GreensfError::Malformed(format!(
            "`/RadialFunctions@jri` has {} entries for {ntypes} atom types",
            jri.len()
        )));
    }

    log::debug!(
        "Assembling exchange splittings of {ntypes} atom types on {radial_points} radial points."
    );
    let blocks = (0..ntypes)
        .into_par_iter()
        .map(|t| {
            let nr = jri[t].min(rmsh.ncols());
            atom_type_splitting(
                bxc.index_axis(Axis(0), t),
                rmsh.slice(s![t, ..nr]),
                radial_points,
            )
        })
        .collect::<GreensfResult<Vec<_>>>()?;

    let nm = 2 * BXC_LMAX + 1;
    let mut delta = Array4::<C128>::zeros((ntypes, BXC_LMAX + 1, nm, nm));
    for (t, block) in blocks.into_iter().enumerate() {
        delta.index_axis_mut(Axis(0), t).assign(&block);
    }
    Ok(delta)
}

/// Reads `/bxc/data` (`[T, lm, nr, 2]` in Htr) as a complex array `[T, lm, nr]` in eV.
fn read_bxc<C: Container + ?Sized>(container: &C) -> GreensfResult<Array3<C128>> {
    let raw: ArrayD<f64> = container.dataset(BXC_PATH)?.read()?;
    if raw.ndim() != 4 || raw.shape()[3] != 2 {
        return Err(GreensfError::Malformed(format!(
            "`{BXC_PATH}` has shape {:?}, expected [T, lm, nr, 2]",
            raw.shape()
        )));
    }
    let re = raw.index_axis(Axis(3), 0);
    let im = raw.index_axis(Axis(3), 1);
    let bxc = Zip::from(&re)
        .and(&im)
        .map_collect(|&re, &im| C128::new(re, im) * HTR_TO_EV);
    Ok(bxc.into_dimensionality::<Ix3>()?)
}

/// Assembles `[l, m, m']` for one atom type.
fn atom_type_splitting(
    bxc: ArrayView2<'_, C128>,
    mesh: ArrayView1<'_, f64>,
    radial_points: usize,
) -> GreensfResult<Array3<C128>> {
    let mesh = mesh.to_vec();
    let nr = mesh.len();
    if nr < 2 || bxc.ncols() < nr {
        return Err(GreensfError::Malformed(format!(
            "radial mesh of {nr} points for Bxc of {} points",
            bxc.ncols()
        )));
    }
    let r_max = mesh[nr - 1];
    let linear = Array1::linspace(0.0, r_max, radial_points);
    let integrals = bxc
        .outer_iter()
        .map(|b| {
            let b = b.slice(s![..nr]);
            let values = linear.mapv(|r| interpolate(&mesh, &b, r));
            trapezoid(&linear, &values)
        })
        .collect::<Vec<_>>();

    let nm = 2 * BXC_LMAX + 1;
    let mut delta = Array3::<C128>::zeros((BXC_LMAX + 1, nm, nm));
    for l in 0..=BXC_LMAX as i64 {
        for m in -l..=l {
            for mp in -l..=l {
                let sign = if mp.rem_euclid(2) == 0 { 1.0 } else { -1.0 };
                let mut value = C128::zero();
                for lpot in 0..=2 * l {
                    for mpot in -lpot..=lpot {
                        let lm = (lpot * (lpot + 1) + mpot) as usize;
                        if lm >= integrals.len() {
                            continue;
                        }
                        let coefficient = gaunt(l, lpot, l, -m, mpot, mp);
                        if coefficient != 0.0 {
                            value += integrals[lm] * (sign * coefficient);
                        }
                    }
                }
                delta[(l as usize, (m + l) as usize, (mp + l) as usize)] = value;
            }
        }
    }
    Ok(delta)
}

/// Piecewise-linear interpolation of `y(x)` at `r`, extrapolating linearly beyond the mesh.
fn interpolate(x: &[f64], y: &ArrayView1<'_, C128>, r: f64) -> C128 {
    let n = x.len();
    let k = x.partition_point(|&xi| xi <= r).clamp(1, n - 1);
    let (x0, x1) = (x[k - 1], x[k]);
    let t = (r - x0) / (x1 - x0);
    y[k - 1] + (y[k] - y[k - 1]) * t
}

/// Trapezoidal integral of `y` over the mesh `x`.
fn trapezoid(x: &Array1<f64>, y: &Array1<C128>) -> C128 {
    x.windows(2)
        .into_iter()
        .zip(y.windows(2))
        .map(|(xs, ys)| (ys[0] + ys[1]) * (0.5 * (xs[1] - xs[0])))
        .sum()
}
