//! Heisenberg exchange constants from pairs of inter-site Green's functions.
//!
//! For a pair of sites $`i`$ and $`j`$ with exchange splittings $`\Delta_i`$ and $`\Delta_j`$,
//! the scalar exchange constant is
//!
//! ```math
//! J_{ij} = \frac{1}{2} \frac{1}{8\pi i} \sum_{z} \sum_{c}
//!     w_c \operatorname{Tr}_L \left[
//!         \Delta_i G^{\uparrow}_{ij}(z_c) \Delta_j G^{\downarrow}_{ji}(z_c)
//!     \right],
//! ```
//!
//! where $`c`$ runs over the two contour branches with weights $`(w, -w^*)`$, and the full
//! exchange tensor is
//!
//! ```math
//! J^{\alpha\beta}_{ij} = \frac{1}{4} \frac{1}{8\pi i} \sum_{z} \sum_{c}
//!     w_c \operatorname{Tr}_{L,S} \left[
//!         \Delta_i \sigma_\alpha G_{ij}(z_c) \Delta_j \sigma_\beta G_{ji}(z_c)
//!     \right].
//! ```
//!
//! All exchange constants are reported in meV.

use std::f64::consts::PI;
use std::fmt;
use std::str::FromStr;

use ndarray::{s, stack, Array1, Array2, Array4, ArrayD, Axis};
use ndarray_einsum_beta::einsum;
use num_complex::Complex;
use serde::{Deserialize, Serialize};

use crate::angmom::spinor_rotation_3d::PauliMatrix;
use crate::angmom::wigner_rotation_3d::orbital_rotation;
use crate::auxiliary::constants::EV_TO_MEV;
use crate::auxiliary::error::{GreensfError, GreensfResult};
use crate::container::memory::MemoryContainer;
use crate::greensfunction::element::StorageKind;
use crate::greensfunction::{dagger, GreensFunction};
use crate::io::format::table_rule;

pub mod bxc;
pub mod shells;

#[cfg(test)]
#[path = "heisenberg_tests.rs"]
mod heisenberg_tests;

use bxc::{calculate_bxc_mmp_matrix, DEFAULT_RADIAL_POINTS};
use shells::{intersite_shells, intersite_shells_from_file, ShellPair};

type C128 = Complex<f64>;

/// A transformation applied to every reconstructed Green's function and every expanded exchange
/// splitting just before contraction. It must return an array of compatible shape.
pub type TransformFn<'a> = &'a dyn Fn(ArrayD<C128>) -> ArrayD<C128>;

const CARTESIAN_LABELS: [&str; 3] = ["x", "y", "z"];

// ==================
// Enum definitions
// ==================

/// An enumerated type for the direction of the magnetic moments.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MomentDirection {
    X,
    Y,
    Z,
}

impl MomentDirection {
    /// Returns the Cartesian indices $`(\alpha, \beta)`$ of the two axes perpendicular to the
    /// moment direction, ordered cyclically.
    pub fn perpendicular_axes(&self) -> (usize, usize) {
        match self {
            MomentDirection::X => (1, 2),
            MomentDirection::Y => (2, 0),
            MomentDirection::Z => (0, 1),
        }
    }
}

impl fmt::Display for MomentDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MomentDirection::X => write!(f, "x"),
            MomentDirection::Y => write!(f, "y"),
            MomentDirection::Z => write!(f, "z"),
        }
    }
}

impl FromStr for MomentDirection {
    type Err = GreensfError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "x" => Ok(MomentDirection::X),
            "y" => Ok(MomentDirection::Y),
            "z" => Ok(MomentDirection::Z),
            _ => Err(GreensfError::BadField(format!("moment direction `{s}`"))),
        }
    }
}

/// An enumerated type for the kinds of exchange calculations.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExchangeMode {
    /// Scalar exchange constants $`J_{ij}`$ from collinear spin channels.
    Scalar,

    /// Full exchange tensors $`J^{\alpha\beta}_{ij}`$.
    Tensor,
}

impl fmt::Display for ExchangeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExchangeMode::Scalar => write!(f, "scalar"),
            ExchangeMode::Tensor => write!(f, "tensor"),
        }
    }
}

// ======================
// Exchange splitting
// ======================

/// The on-site exchange splitting $`\Delta`$ of every atom type, in eV.
#[derive(Clone, Debug, PartialEq)]
pub enum OnsiteDelta {
    /// One value per `[atom_type, l]`, applied as a multiple of the identity on the orbital
    /// block.
    Scalar(Array2<f64>),

    /// One matrix per `[atom_type, l, m, m']` in the local real-space frame of the atom, with
    /// the $`(2l+1)\times(2l+1)`$ block in the leading corner.
    Matrix(Array4<C128>),
}

impl OnsiteDelta {
    /// Returns the exchange splitting of one site as a $`(2l+1)\times(2l+1)`$ matrix in the
    /// global real-space frame.
    ///
    /// # Arguments
    ///
    /// * `atom_type` - The 1-based atom type of the site.
    /// * `l` - The orbital quantum number.
    /// * `alpha`, `beta` - The angles of the local frame of the site. Scalar splittings are
    /// rotationally invariant and ignore them.
    ///
    /// # Errors
    ///
    /// Errors with [`GreensfError::OutOfRange`] if the atom type or `l` is not covered.
    pub fn expand(
        &self,
        atom_type: usize,
        l: u32,
        alpha: f64,
        beta: f64,
    ) -> GreensfResult<Array2<C128>> {
        let nm = 2 * l as usize + 1;
        match self {
            OnsiteDelta::Scalar(values) => {
                let (ntypes, nl) = values.dim();
                check_coverage(atom_type, l, ntypes, nl)?;
                Ok(Array2::from_diag_elem(
                    nm,
                    C128::from(values[(atom_type - 1, l as usize)]),
                ))
            }
            OnsiteDelta::Matrix(values) => {
                let (ntypes, nl, nmax, nmaxp) = values.dim();
                check_coverage(atom_type, l, ntypes, nl)?;
                if nm > nmax.min(nmaxp) {
                    return Err(GreensfError::BadShape(format!(
                        "OnsiteDelta::expand (l = {l} needs a {nm}×{nm} block, found {nmax}×{nmaxp})"
                    )));
                }
                let local = values
                    .slice(s![atom_type - 1, l as usize, ..nm, ..nm])
                    .to_owned();
                let rotation = orbital_rotation(l, alpha, beta);
                Ok(rotation.dot(&local).dot(&dagger(&rotation)))
            }
        }
    }
}

fn check_coverage(atom_type: usize, l: u32, ntypes: usize, nl: usize) -> GreensfResult<()> {
    if atom_type == 0 || atom_type > ntypes {
        return Err(GreensfError::out_of_range(
            "atom type",
            atom_type as i64,
            1,
            ntypes as i64,
        ));
    }
    if l as usize >= nl {
        return Err(GreensfError::out_of_range(
            "l",
            i64::from(l),
            0,
            nl as i64 - 1,
        ));
    }
    Ok(())
}

// =======
// Records
// =======

/// Trait for rows of exchange-constant tables.
pub trait ExchangeRecord {
    /// Returns the inter-site displacement $`\mathbf{R}_{ij}`$ in Å.
    fn displacement(&self) -> [f64; 3];

    /// Returns the value of a named numerical column, *e.g.* `R`, `R_ij_x` or `J_ij`, if the
    /// record has it.
    fn entry(&self, name: &str) -> Option<f64>;
}

fn geometric_entry(distance: f64, displacement: &[f64; 3], name: &str) -> Option<f64> {
    match name {
        "R" => Some(distance),
        "R_ij_x" => Some(displacement[0]),
        "R_ij_y" => Some(displacement[1]),
        "R_ij_z" => Some(displacement[2]),
        _ => None,
    }
}

/// A row of the scalar exchange-constant table.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct JijRecord {
    /// The inter-site distance in Å.
    pub distance: f64,

    /// The inter-site displacement in Å.
    pub displacement: [f64; 3],

    pub atom_i: String,

    pub atom_j: String,

    /// The exchange constant in meV.
    pub j_ij: f64,
}

impl ExchangeRecord for JijRecord {
    fn displacement(&self) -> [f64; 3] {
        self.displacement
    }

    fn entry(&self, name: &str) -> Option<f64> {
        match name {
            "J_ij" => Some(self.j_ij),
            _ => geometric_entry(self.distance, &self.displacement, name),
        }
    }
}

/// The decomposition of an exchange tensor relative to a moment direction, in meV.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct JijDecomposition {
    /// The moment direction defining the perpendicular axes $`(\alpha, \beta)`$.
    pub direction: MomentDirection,

    /// The isotropic part $`\frac{1}{2}(J^{\alpha\alpha} + J^{\beta\beta})`$.
    pub j_ij: f64,

    /// The diagonal anisotropy $`\frac{1}{2}(J^{\alpha\alpha} - J^{\beta\beta})`$.
    pub a_ij: f64,

    /// The symmetric off-diagonal part $`\frac{1}{2}(J^{\alpha\beta} + J^{\beta\alpha})`$.
    pub s_ij: f64,

    /// The antisymmetric (Dzyaloshinskii–Moriya) part
    /// $`\frac{1}{2}(J^{\alpha\beta} - J^{\beta\alpha})`$.
    pub d_ij: f64,
}

/// A row of the exchange-tensor table.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct JijTensorRecord {
    /// The inter-site distance in Å.
    pub distance: f64,

    /// The inter-site displacement in Å.
    pub displacement: [f64; 3],

    pub atom_i: String,

    pub atom_j: String,

    /// The exchange tensor $`J^{\alpha\beta}`$ in meV, indexed by Cartesian axes.
    pub tensor: [[f64; 3]; 3],

    /// The decomposition added by [`decompose_jij_tensor`].
    pub decomposition: Option<JijDecomposition>,
}

impl ExchangeRecord for JijTensorRecord {
    fn displacement(&self) -> [f64; 3] {
        self.displacement
    }

    fn entry(&self, name: &str) -> Option<f64> {
        if let Some(value) = geometric_entry(self.distance, &self.displacement, name) {
            return Some(value);
        }
        if let Some(axes) = name.strip_prefix("J_") {
            let mut chars = axes.chars();
            if let (Some(a), Some(b), None) = (chars.next(), chars.next(), chars.next()) {
                let a = CARTESIAN_LABELS.iter().position(|x| x.starts_with(a));
                let b = CARTESIAN_LABELS.iter().position(|x| x.starts_with(b));
                if let (Some(a), Some(b)) = (a, b) {
                    return Some(self.tensor[a][b]);
                }
            }
        }
        let decomposition = self.decomposition.as_ref()?;
        match name {
            "J_ij" => Some(decomposition.j_ij),
            "A_ij" => Some(decomposition.a_ij),
            "S_ij" => Some(decomposition.s_ij),
            "D_ij" => Some(decomposition.d_ij),
            _ => None,
        }
    }
}

// ============
// Shell source
// ============

/// Trait for sources of inter-site Green's-function pairs.
pub trait ShellSource {
    /// Returns the pairs of every shell around `reference_atom`, in shell order.
    ///
    /// # Arguments
    ///
    /// * `reference_atom` - The 1-based atom type at the centre of the shells.
    /// * `show` - Boolean indicating if the shells are to be written to the output log.
    /// * `max_shells` - The maximum number of shells to consider.
    fn shell_pairs<'a>(
        &'a self,
        reference_atom: usize,
        show: bool,
        max_shells: Option<usize>,
    ) -> GreensfResult<Box<dyn Iterator<Item = GreensfResult<ShellPair>> + 'a>>;

    /// Returns the exchange splitting used when none is supplied.
    fn default_onsite_delta(&self) -> GreensfResult<OnsiteDelta>;
}

macro_rules! impl_shell_source_for_container {
    ($container:ty) => {
        impl ShellSource for $container {
            fn shell_pairs<'a>(
                &'a self,
                reference_atom: usize,
                show: bool,
                max_shells: Option<usize>,
            ) -> GreensfResult<Box<dyn Iterator<Item = GreensfResult<ShellPair>> + 'a>> {
                Ok(Box::new(intersite_shells_from_file(
                    self,
                    reference_atom,
                    show,
                    max_shells,
                )?))
            }

            fn default_onsite_delta(&self) -> GreensfResult<OnsiteDelta> {
                log::debug!("No exchange splitting supplied; assembling it from Bxc.");
                calculate_bxc_mmp_matrix(self, DEFAULT_RADIAL_POINTS).map(OnsiteDelta::Matrix)
            }
        }
    };
}

impl_shell_source_for_container!(MemoryContainer);

#[cfg(feature = "hdf5")]
impl_shell_source_for_container!(crate::container::hdf5::Hdf5Container);

impl ShellSource for [GreensFunction] {
    fn shell_pairs<'a>(
        &'a self,
        reference_atom: usize,
        show: bool,
        max_shells: Option<usize>,
    ) -> GreensfResult<Box<dyn Iterator<Item = GreensfResult<ShellPair>> + 'a>> {
        Ok(Box::new(intersite_shells(
            self,
            reference_atom,
            show,
            max_shells,
        )))
    }

    fn default_onsite_delta(&self) -> GreensfResult<OnsiteDelta> {
        Err(GreensfError::not_available(
            "default_onsite_delta",
            "preloaded",
        ))
    }
}

impl ShellSource for Vec<GreensFunction> {
    fn shell_pairs<'a>(
        &'a self,
        reference_atom: usize,
        show: bool,
        max_shells: Option<usize>,
    ) -> GreensfResult<Box<dyn Iterator<Item = GreensfResult<ShellPair>> + 'a>> {
        self.as_slice()
            .shell_pairs(reference_atom, show, max_shells)
    }

    fn default_onsite_delta(&self) -> GreensfResult<OnsiteDelta> {
        self.as_slice().default_onsite_delta()
    }
}

// ===============
// Exchange engine
// ===============

fn apply_transform(array: ArrayD<C128>, transform: Option<TransformFn<'_>>) -> ArrayD<C128> {
    match transform {
        Some(transform) => transform(array),
        None => array,
    }
}

/// One inter-site pair, rotated to the global frame and ready for contraction.
struct ExchangePair {
    distance: f64,
    displacement: [f64; 3],
    atom_i: String,
    atom_j: String,
    gij: GreensFunction,
    gji: GreensFunction,
    delta_i: ArrayD<C128>,
    delta_j: ArrayD<C128>,

    /// Paired weights $`(w, -w^*)`$, `[nz, 2]`.
    weights: ArrayD<C128>,
}

impl ExchangePair {
    fn new(
        op: &str,
        (distance, mut gij, mut gji): ShellPair,
        onsite_delta: &OnsiteDelta,
        transform: Option<TransformFn<'_>>,
    ) -> GreensfResult<Self> {
        for gf in [&gij, &gji] {
            if gf.kind() == StorageKind::KResolved {
                return Err(GreensfError::not_available(op, &gf.kind().to_string()));
            }
        }
        if gij.points().len() != gji.points().len() {
            return Err(GreensfError::BadShape(format!(
                "{op} (elements {} and {} have different contours)",
                gij.index() + 1,
                gji.index() + 1
            )));
        }
        gij.to_global_frame()?;
        gji.to_global_frame()?;

        let element = gij.element().clone();
        let frame = *gij.frame();
        let delta_i = onsite_delta.expand(element.atom_type, element.l, frame.alpha, frame.beta)?;
        let delta_j =
            onsite_delta.expand(element.atom_type_p, element.l_p, frame.alphap, frame.betap)?;

        let w = gij.weights();
        let w_conj = w.mapv(|x| -x.conj());
        let weights = stack(Axis(1), &[w.view(), w_conj.view()])?.into_dyn();

        let (atom_i, atom_j) = gij.atom_labels();
        let (atom_i, atom_j) = (atom_i.to_string(), atom_j.to_string());
        Ok(Self {
            distance,
            displacement: [
                element.atom_diff[0],
                element.atom_diff[1],
                element.atom_diff[2],
            ],
            atom_i,
            atom_j,
            gij,
            gji,
            delta_i: apply_transform(delta_i.into_dyn(), transform),
            delta_j: apply_transform(delta_j.into_dyn(), transform),
            weights,
        })
    }

    /// Sums a `[nz, 2]` integrand over both contour branches and applies
    /// $`\frac{1}{8\pi i}`$.
    fn contour_integral(&self, integrand: &ArrayD<C128>) -> GreensfResult<C128> {
        if integrand.shape() != self.weights.shape() {
            return Err(GreensfError::BadShape(format!(
                "contour integral (integrand {:?}, weights {:?})",
                integrand.shape(),
                self.weights.shape()
            )));
        }
        let total = (integrand * &self.weights).sum();
        Ok(total / C128::new(0.0, 8.0 * PI))
    }

    fn scalar(&self, transform: Option<TransformFn<'_>>) -> GreensfResult<f64> {
        let gij_up = apply_transform(
            self.gij.energy_dependence_both_contours(None, None, Some(1))?,
            transform,
        );
        let gji_down = apply_transform(
            self.gji.energy_dependence_both_contours(None, None, Some(2))?,
            transform,
        );
        let integrand = einsum(
            "ij,zjkc,kl,zlic->zc",
            &[
                &self.delta_i.view(),
                &gij_up.view(),
                &self.delta_j.view(),
                &gji_down.view(),
            ],
        )
        .map_err(GreensfError::contraction)?;
        Ok(0.5 * self.contour_integral(&integrand)?.re * EV_TO_MEV)
    }

    fn tensor(&self, transform: Option<TransformFn<'_>>) -> GreensfResult<[[f64; 3]; 3]> {
        let gij = apply_transform(
            self.gij.energy_dependence_both_contours(None, None, None)?,
            transform,
        );
        let gji = apply_transform(
            self.gji.energy_dependence_both_contours(None, None, None)?,
            transform,
        );
        let pauli = PauliMatrix::CARTESIAN.map(|sigma| sigma.matrix());
        let mut tensor = [[0.0; 3]; 3];
        for (a, sigma_a) in pauli.iter().enumerate() {
            for (b, sigma_b) in pauli.iter().enumerate() {
                let integrand = einsum(
                    "ij,st,zjktuc,kl,uv,zlivsc->zc",
                    &[
                        &self.delta_i.view(),
                        &sigma_a.view(),
                        &gij.view(),
                        &self.delta_j.view(),
                        &sigma_b.view(),
                        &gji.view(),
                    ],
                )
                .map_err(GreensfError::contraction)?;
                tensor[a][b] = 0.25 * self.contour_integral(&integrand)?.re * EV_TO_MEV;
            }
        }
        Ok(tensor)
    }
}

fn resolve_onsite_delta<S: ShellSource + ?Sized>(
    source: &S,
    onsite_delta: Option<&OnsiteDelta>,
) -> GreensfResult<OnsiteDelta> {
    match onsite_delta {
        Some(delta) => Ok(delta.clone()),
        None => source.default_onsite_delta(),
    }
}

/// Calculates the scalar exchange constants $`J_{ij}`$ for all shells around a reference atom.
///
/// # Arguments
///
/// * `source` - A container, or a list of loaded Green's functions.
/// * `reference_atom` - The 1-based atom type at the centre of the shells.
/// * `onsite_delta` - The exchange splitting. If `None`, containers assemble it from Bxc and
/// lists of loaded Green's functions fail.
/// * `max_shells` - The maximum number of shells to consider.
/// * `transform` - An optional hook applied to every Green's function and exchange splitting
/// before contraction.
///
/// # Returns
///
/// One record per pair, in shell order.
pub fn calculate_heisenberg_jij<S: ShellSource + ?Sized>(
    source: &S,
    reference_atom: usize,
    onsite_delta: Option<&OnsiteDelta>,
    max_shells: Option<usize>,
    transform: Option<TransformFn<'_>>,
) -> GreensfResult<Vec<JijRecord>> {
    let onsite_delta = resolve_onsite_delta(source, onsite_delta)?;
    let mut records = Vec::new();
    for shell_pair in source.shell_pairs(reference_atom, false, max_shells)? {
        let pair = ExchangePair::new(
            "calculate_heisenberg_jij",
            shell_pair?,
            &onsite_delta,
            transform,
        )?;
        let j_ij = pair.scalar(transform)?;
        log::debug!(
            "J({} → {}, R = {:.6} Å) = {j_ij:+.6} meV",
            pair.atom_i,
            pair.atom_j,
            pair.distance
        );
        records.push(JijRecord {
            distance: pair.distance,
            displacement: pair.displacement,
            atom_i: pair.atom_i,
            atom_j: pair.atom_j,
            j_ij,
        });
    }
    Ok(records)
}

/// Calculates the exchange tensors $`J^{\alpha\beta}_{ij}`$ for all shells around a reference
/// atom. The arguments are as for [`calculate_heisenberg_jij`].
pub fn calculate_heisenberg_tensor<S: ShellSource + ?Sized>(
    source: &S,
    reference_atom: usize,
    onsite_delta: Option<&OnsiteDelta>,
    max_shells: Option<usize>,
    transform: Option<TransformFn<'_>>,
) -> GreensfResult<Vec<JijTensorRecord>> {
    let onsite_delta = resolve_onsite_delta(source, onsite_delta)?;
    let mut records = Vec::new();
    for shell_pair in source.shell_pairs(reference_atom, false, max_shells)? {
        let pair = ExchangePair::new(
            "calculate_heisenberg_tensor",
            shell_pair?,
            &onsite_delta,
            transform,
        )?;
        let tensor = pair.tensor(transform)?;
        records.push(JijTensorRecord {
            distance: pair.distance,
            displacement: pair.displacement,
            atom_i: pair.atom_i,
            atom_j: pair.atom_j,
            tensor,
            decomposition: None,
        });
    }
    Ok(records)
}

/// Decomposes every exchange tensor relative to a moment direction, augmenting the records in
/// place.
pub fn decompose_jij_tensor(records: &mut [JijTensorRecord], direction: MomentDirection) {
    let (a, b) = direction.perpendicular_axes();
    for record in records.iter_mut() {
        let j = &record.tensor;
        record.decomposition = Some(JijDecomposition {
            direction,
            j_ij: 0.5 * (j[a][a] + j[b][b]),
            a_ij: 0.5 * (j[a][a] - j[b][b]),
            s_ij: 0.5 * (j[a][b] + j[b][a]),
            d_ij: 0.5 * (j[a][b] - j[b][a]),
        });
    }
}

/// Evaluates the lattice sum
///
/// ```math
/// J(\mathbf{q}) = \sum_k J_k \exp(i \mathbf{q} \cdot \mathbf{R}_k)
/// ```
///
/// of one column of an exchange table.
///
/// # Arguments
///
/// * `qpoints` - Cartesian q-points in 1/Å, one per row.
/// * `records` - The exchange table.
/// * `entry` - The name of the column to sum, *e.g.* `J_ij` or `D_ij`.
///
/// # Errors
///
/// Errors with [`GreensfError::BadField`] if a record lacks the column, and with
/// [`GreensfError::BadShape`] if the q-points do not have three components.
pub fn heisenberg_reciprocal<R: ExchangeRecord>(
    qpoints: &Array2<f64>,
    records: &[R],
    entry: &str,
) -> GreensfResult<Array1<C128>> {
    if qpoints.ncols() != 3 {
        return Err(GreensfError::BadShape(format!(
            "heisenberg_reciprocal (q-points with {} components)",
            qpoints.ncols()
        )));
    }
    let values = records
        .iter()
        .map(|record| {
            record
                .entry(entry)
                .map(|value| (record.displacement(), value))
                .ok_or_else(|| GreensfError::BadField(entry.to_string()))
        })
        .collect::<GreensfResult<Vec<_>>>()?;
    Ok(qpoints
        .outer_iter()
        .map(|q| {
            values
                .iter()
                .map(|(r, value)| {
                    let phase = q[0] * r[0] + q[1] * r[1] + q[2] * r[2];
                    C128::from_polar(*value, phase)
                })
                .sum::<C128>()
        })
        .collect())
}

// ======
// Tables
// ======

/// Writes a scalar exchange-constant table.
pub(crate) fn write_jij_table(f: &mut fmt::Formatter<'_>, records: &[JijRecord]) -> fmt::Result {
    writeln!(f, "{}", table_rule(76))?;
    writeln!(
        f,
        "{:>10} {:>10} {:>10} {:>10}  {:<8} {:<8} {:>12}",
        "R / Å", "R_ij_x", "R_ij_y", "R_ij_z", "Atom_i", "Atom_j", "J_ij / meV"
    )?;
    writeln!(f, "{}", table_rule(76))?;
    for record in records {
        let [x, y, z] = record.displacement;
        writeln!(
            f,
            "{:>10.6} {:>+10.6} {:>+10.6} {:>+10.6}  {:<8} {:<8} {:>+12.6}",
            record.distance, x, y, z, record.atom_i, record.atom_j, record.j_ij
        )?;
    }
    writeln!(f, "{}", table_rule(76))?;
    Ok(())
}

/// Writes an exchange-tensor table, followed by the decompositions if there are any.
pub(crate) fn write_tensor_table(
    f: &mut fmt::Formatter<'_>,
    records: &[JijTensorRecord],
) -> fmt::Result {
    writeln!(f, "{}", table_rule(104))?;
    writeln!(
        f,
        "{:>10} {:<8} {:<8} {:>9} {:>9} {:>9} {:>9} {:>9} {:>9} {:>9} {:>9} {:>9}",
        "R / Å",
        "Atom_i",
        "Atom_j",
        "J_xx",
        "J_xy",
        "J_xz",
        "J_yx",
        "J_yy",
        "J_yz",
        "J_zx",
        "J_zy",
        "J_zz"
    )?;
    writeln!(f, "{}", table_rule(104))?;
    for record in records {
        write!(
            f,
            "{:>10.6} {:<8} {:<8}",
            record.distance, record.atom_i, record.atom_j
        )?;
        for value in record.tensor.iter().flatten() {
            write!(f, " {value:>+9.4}")?;
        }
        writeln!(f)?;
    }
    writeln!(f, "{}", table_rule(104))?;

    if records.iter().any(|record| record.decomposition.is_some()) {
        writeln!(f)?;
        writeln!(f, "{}", table_rule(68))?;
        writeln!(
            f,
            "{:>10} {:<8} {:<8} {:>4} {:>8} {:>8} {:>8} {:>8}",
            "R / Å", "Atom_i", "Atom_j", "dir", "J_ij", "A_ij", "S_ij", "D_ij"
        )?;
        writeln!(f, "{}", table_rule(68))?;
        for record in records {
            if let Some(d) = record.decomposition.as_ref() {
                writeln!(
                    f,
                    "{:>10.6} {:<8} {:<8} {:>4} {:>+8.4} {:>+8.4} {:>+8.4} {:>+8.4}",
                    record.distance,
                    record.atom_i,
                    record.atom_j,
                    d.direction,
                    d.j_ij,
                    d.a_ij,
                    d.s_ij,
                    d.d_ij
                )?;
            }
        }
        writeln!(f, "{}", table_rule(68))?;
    }
    Ok(())
}
