//! Green's functions of single elements and their energy-dependent selectors.
//!
//! A [`GreensFunction`] holds the coefficients of one element in the in-memory layout
//! `[nz, 2l+1, 2l'+1, spin, ..., branch]`, where the packed spin axis has length 1, 2 or 4 and
//! orders its entries as $`(\uparrow\uparrow, \downarrow\downarrow, \downarrow\uparrow,
//! \uparrow\downarrow)`$. The 2×2 spin block $`[\uparrow\uparrow, \uparrow\downarrow;
//! \downarrow\uparrow, \downarrow\downarrow]`$ is only formed when requested.

use std::f64::consts::PI;
use std::fmt;
use std::str::FromStr;

use indexmap::IndexMap;
use ndarray::{Array1, Array2, ArrayD, ArrayViewD, Axis, IxDyn, Slice};
use ndarray_einsum_beta::einsum;
use num_complex::Complex;
use serde::{Deserialize, Serialize};

use crate::angmom::spinor_rotation_3d::spin_rotation;
use crate::angmom::wigner_rotation_3d::orbital_rotation;
use crate::auxiliary::error::{GreensfError, GreensfResult};
use crate::container::Container;
use crate::io::format::{greensf_output, greensf_warn};

pub mod element;
pub mod recipe;
pub mod selection;

#[cfg(test)]
pub(crate) mod fixtures;


use element::{list_elements, ElementHeader, StorageKind};
use recipe::{load_element, ElementAttributes, FrameState, KPoints, RadialFunctions, ScalarProducts};
use selection::{select_element_indices, ElementSelection};

type C128 = Complex<f64>;

// ==================
// Coefficient names
// ==================

/// An enumerated type for the coefficient families an element can carry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CoefficientName {
    /// Spherically averaged coefficients (also used for k-resolved storage).
    Sphavg,
    Uu,
    Ud,
    Du,
    Dd,
    Uulo,
    Ulou,
    Dulo,
    Ulod,
    Uloulo,
}

impl CoefficientName {
    /// All coefficient names in storage order.
    pub const ALL: [CoefficientName; 10] = [
        CoefficientName::Sphavg,
        CoefficientName::Uu,
        CoefficientName::Ud,
        CoefficientName::Du,
        CoefficientName::Dd,
        CoefficientName::Uulo,
        CoefficientName::Ulou,
        CoefficientName::Dulo,
        CoefficientName::Ulod,
        CoefficientName::Uloulo,
    ];

    /// Returns the family whose conjugate transpose gives the opposite spin-offdiagonal entry.
    pub fn partner(&self) -> CoefficientName {
        match self {
            CoefficientName::Ud => CoefficientName::Du,
            CoefficientName::Du => CoefficientName::Ud,
            CoefficientName::Uulo => CoefficientName::Ulou,
            CoefficientName::Ulou => CoefficientName::Uulo,
            CoefficientName::Dulo => CoefficientName::Ulod,
            CoefficientName::Ulod => CoefficientName::Dulo,
            other => *other,
        }
    }

    /// Returns the number of trailing local-orbital axes.
    pub fn lo_axes(&self) -> usize {
        match self {
            CoefficientName::Uulo
            | CoefficientName::Ulou
            | CoefficientName::Dulo
            | CoefficientName::Ulod => 1,
            CoefficientName::Uloulo => 2,
            _ => 0,
        }
    }
}

impl fmt::Display for CoefficientName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CoefficientName::Sphavg => "sphavg",
            CoefficientName::Uu => "uu",
            CoefficientName::Ud => "ud",
            CoefficientName::Du => "du",
            CoefficientName::Dd => "dd",
            CoefficientName::Uulo => "uulo",
            CoefficientName::Ulou => "ulou",
            CoefficientName::Dulo => "dulo",
            CoefficientName::Ulod => "ulod",
            CoefficientName::Uloulo => "uloulo",
        };
        write!(f, "{name}")
    }
}

impl FromStr for CoefficientName {
    type Err = GreensfError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CoefficientName::ALL
            .iter()
            .find(|name| name.to_string() == s)
            .copied()
            .ok_or_else(|| GreensfError::BadField(format!("coefficient `{s}`")))
    }
}

// =======
// Locator
// =======

/// An enumerated type for the two mutually exclusive ways of choosing one element.
#[derive(Clone, Debug)]
pub enum ElementLocator {
    /// The 1-based on-disk index of the element.
    Index(usize),

    /// A selection that must match exactly one element.
    Selection(ElementSelection),
}

impl From<usize> for ElementLocator {
    fn from(index: usize) -> Self {
        ElementLocator::Index(index)
    }
}

impl From<ElementSelection> for ElementLocator {
    fn from(selection: ElementSelection) -> Self {
        ElementLocator::Selection(selection)
    }
}

// ==================
// Spin-axis plumbing
// ==================

const SPIN_AXIS: usize = 3;

/// Packed spin index to row-major 2×2 order, and back (the permutation is an involution).
const SPIN_BLOCK_ORDER: [usize; 4] = [0, 3, 2, 1];

/// Reshapes an array in logical (row-major) order.
pub(crate) fn reshape(array: ArrayViewD<'_, C128>, shape: &[usize]) -> GreensfResult<ArrayD<C128>> {
    Ok(ArrayD::from_shape_vec(
        IxDyn(shape),
        array.iter().cloned().collect(),
    )?)
}

/// Promotes the packed spin axis to length 4, zero-filling the spin-offdiagonal entries. A
/// length-one axis is duplicated onto both diagonal entries.
pub(crate) fn promote_spin(packed: &ArrayD<C128>) -> GreensfResult<ArrayD<C128>> {
    let nspin = packed.shape()[SPIN_AXIS];
    let mut shape = packed.shape().to_vec();
    shape[SPIN_AXIS] = 4;
    let mut full = ArrayD::<C128>::zeros(IxDyn(&shape));
    match nspin {
        1 => {
            for s in 0..2 {
                full.index_axis_mut(Axis(SPIN_AXIS), s)
                    .assign(&packed.index_axis(Axis(SPIN_AXIS), 0));
            }
        }
        2..=4 => full
            .slice_axis_mut(Axis(SPIN_AXIS), Slice::from(0..nspin))
            .assign(packed),
        _ => {
            return Err(GreensfError::BadShape(format!(
                "promote_spin (spin axis of length {nspin})"
            )))
        }
    }
    Ok(full)
}

/// Expands a packed spin axis into a 2×2 block on axes 3 and 4.
pub(crate) fn spin_block(packed: &ArrayD<C128>) -> GreensfResult<ArrayD<C128>> {
    let full = promote_spin(packed)?;
    let ordered = full.select(Axis(SPIN_AXIS), &SPIN_BLOCK_ORDER);
    let mut shape = ordered.shape().to_vec();
    shape.splice(SPIN_AXIS..=SPIN_AXIS, [2, 2]);
    reshape(ordered.view(), &shape)
}

/// Packs a 2×2 spin block on axes 3 and 4 back into a spin axis of length 4.
pub(crate) fn pack_spin_block(block: &ArrayD<C128>) -> GreensfResult<ArrayD<C128>> {
    let mut shape = block.shape().to_vec();
    shape.splice(SPIN_AXIS..=SPIN_AXIS + 1, [4]);
    let flat = reshape(block.view(), &shape)?;
    Ok(flat.select(Axis(SPIN_AXIS), &SPIN_BLOCK_ORDER))
}

/// Contracts the trailing axes of `array` with `weights`.
fn contract_trailing(array: ArrayViewD<'_, C128>, weights: ArrayViewD<'_, f64>) -> GreensfResult<ArrayD<C128>> {
    let ntrail = weights.ndim();
    let split = array.ndim() - ntrail;
    if array.shape()[split..] != *weights.shape() {
        return Err(GreensfError::BadShape(format!(
            "scalar-product contraction of {:?} with {:?}",
            array.shape(),
            weights.shape()
        )));
    }
    let lead_shape = array.shape()[..split].to_vec();
    let nlead = lead_shape.iter().product::<usize>();
    let ntrail_size = weights.len();
    let matrix = Array2::from_shape_vec((nlead, ntrail_size), array.iter().cloned().collect())?;
    let vector = Array1::from_iter(weights.iter().map(|&w| C128::from(w)));
    Ok(ArrayD::from_shape_vec(IxDyn(&lead_shape), matrix.dot(&vector).to_vec())?)
}

// ==================
// Struct definitions
// ==================

/// The Green's function of one stored element.
#[derive(Clone, Debug)]
pub struct GreensFunction {
    /// The 0-based catalog index of the element.
    index: usize,

    element: ElementHeader,

    /// Contour points relative to the Fermi energy, in eV.
    points: Array1<C128>,

    /// Contour weights in eV.
    weights: Array1<C128>,

    coefficients: IndexMap<CoefficientName, ArrayD<C128>>,

    scalar_products: Option<ScalarProducts>,

    radial_functions: Option<RadialFunctions>,

    kpoints: Option<KPoints>,

    attributes: ElementAttributes,
}

impl GreensFunction {
    /// Loads one element from a container.
    ///
    /// # Arguments
    ///
    /// * `container` - The container to read.
    /// * `locator` - Either the 1-based on-disk index of the element or a selection matching
    /// exactly one element.
    ///
    /// # Errors
    ///
    /// Errors with [`GreensfError::NoMatch`] or [`GreensfError::Ambiguous`] if a selection does not
    /// match exactly one element, and propagates any loader error.
    pub fn from_container<C: Container + ?Sized>(
        container: &C,
        locator: ElementLocator,
    ) -> GreensfResult<Self> {
        let elements = list_elements(container, false)?;
        let index = match locator {
            ElementLocator::Index(k) => {
                if k == 0 || k > elements.len() {
                    return Err(GreensfError::out_of_range(
                        "element index",
                        k as i64,
                        1,
                        elements.len() as i64,
                    ));
                }
                k - 1
            }
            ElementLocator::Selection(selection) => {
                let matches = select_element_indices(&elements, &selection, false)?;
                match matches.as_slice() {
                    [] => {
                        greensf_warn!("No element satisfies {selection}.");
                        return Err(GreensfError::NoMatch);
                    }
                    [single] => *single,
                    _ => {
                        greensf_warn!(
                            "{} elements satisfy {selection}; exactly one is required.",
                            matches.len()
                        );
                        select_element_indices(&elements, &selection, true)?;
                        return Err(GreensfError::Ambiguous { matches });
                    }
                }
            }
        };
        Self::load(container, index, &elements[index])
    }

    /// Loads one element from an HDF5 file.
    #[cfg(feature = "hdf5")]
    pub fn from_file<P: AsRef<std::path::Path>>(
        path: P,
        locator: ElementLocator,
    ) -> GreensfResult<Self> {
        let container = crate::container::hdf5::Hdf5Container::open(path)?;
        Self::from_container(&container, locator)
    }

    /// Loads the element at a known 0-based catalog index.
    pub(crate) fn load<C: Container + ?Sized>(
        container: &C,
        index: usize,
        element: &ElementHeader,
    ) -> GreensfResult<Self> {
        let data = load_element(container, index, element)?;
        let mut gf = Self {
            index,
            element: element.clone(),
            points: data.points,
            weights: data.weights,
            coefficients: data.coefficients,
            scalar_products: data.scalar_products,
            radial_functions: data.radial_functions,
            kpoints: data.kpoints,
            attributes: data.attributes,
        };
        if gf.attributes.mperp {
            gf.complete_offdiagonal()?;
        }
        Ok(gf)
    }

    // ~~~~~~~~~
    // Accessors
    // ~~~~~~~~~

    /// Returns the 0-based catalog index of the element.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Returns the element header.
    pub fn element(&self) -> &ElementHeader {
        &self.element
    }

    /// Returns the storage kind of the element.
    pub fn kind(&self) -> StorageKind {
        self.element.kind()
    }

    /// Returns the contour points relative to the Fermi energy, in eV.
    pub fn points(&self) -> &Array1<C128> {
        &self.points
    }

    /// Returns the contour weights in eV.
    pub fn weights(&self) -> &Array1<C128> {
        &self.weights
    }

    /// Returns the loaded attributes.
    pub fn attributes(&self) -> &ElementAttributes {
        &self.attributes
    }

    /// Returns the current rotation state.
    pub fn frame(&self) -> &FrameState {
        &self.attributes.frame
    }

    /// Checks if spin-offdiagonal entries are stored.
    pub fn mperp(&self) -> bool {
        self.attributes.mperp
    }

    /// Returns the number of spins of the calculation.
    pub fn nspins(&self) -> usize {
        self.attributes.spins
    }

    /// Returns the length of the packed spin axis of the stored coefficients.
    pub fn packed_spins(&self) -> usize {
        self.coefficients
            .values()
            .next()
            .map(|c| c.shape()[SPIN_AXIS])
            .unwrap_or(0)
    }

    /// Returns the number of valid 1-based spin indices.
    pub fn nspins_effective(&self) -> usize {
        self.packed_spins().max(2)
    }

    /// Returns the maximum orbital quantum number of the element group.
    pub fn lmax(&self) -> u32 {
        self.attributes.lmax
    }

    /// Returns the labels of the two sites, *e.g.* `("Fe-1", "Fe-2")`.
    pub fn atom_labels(&self) -> (&str, &str) {
        (&self.attributes.atom_label, &self.attributes.atom_label_p)
    }

    /// Returns the scalar products of a radial element.
    pub fn scalar_products(&self) -> Option<&ScalarProducts> {
        self.scalar_products.as_ref()
    }

    /// Returns the radial functions of a radial element.
    pub fn radial_functions(&self) -> Option<&RadialFunctions> {
        self.radial_functions.as_ref()
    }

    /// Returns the k-point set of a k-resolved element, if the container provides it.
    pub fn kpoints(&self) -> Option<&KPoints> {
        self.kpoints.as_ref()
    }

    /// Returns the names of the stored coefficient families.
    pub fn coefficient_names(&self) -> Vec<CoefficientName> {
        self.coefficients.keys().copied().collect()
    }

    fn l_i64(&self) -> (i64, i64) {
        (i64::from(self.element.l), i64::from(self.element.l_p))
    }

    fn branch_axis(&self) -> usize {
        if self.kind() == StorageKind::KResolved {
            5
        } else {
            4
        }
    }

    // ~~~~~~~~~~~~~~~~~~~~~~~
    // Hermitian completion
    // ~~~~~~~~~~~~~~~~~~~~~~~

    /// Produces the $`\uparrow\downarrow`$ entry of every coefficient storing only three spin
    /// entries from the $`\downarrow\uparrow`$ entry of its partner family, using
    /// $`G(z^*) = G(z)^\dagger`$.
    fn complete_offdiagonal(&mut self) -> GreensfResult<()> {
        let branch_axis = self.branch_axis();
        let square = self.element.l == self.element.l_p;
        if !square && self.coefficients.values().any(|c| c.shape()[SPIN_AXIS] == 3) {
            greensf_warn!(
                "Element {} has l = {} and l' = {}; the ↑↓ entry cannot be completed and is zero-filled.",
                self.index + 1,
                self.element.l,
                self.element.l_p
            );
        }

        let mut completed = Vec::new();
        for (&name, coefficient) in self.coefficients.iter() {
            if coefficient.shape()[SPIN_AXIS] != 3 {
                continue;
            }
            let mut offdiag_shape = coefficient.shape().to_vec();
            offdiag_shape.remove(SPIN_AXIS);

            let from_partner = if square {
                self.coefficients.get(&name.partner()).and_then(|partner| {
                    if partner.shape()[SPIN_AXIS] < 3 {
                        return None;
                    }
                    let mut x = partner.index_axis(Axis(SPIN_AXIS), 2).to_owned();
                    x.swap_axes(1, 2);
                    x.invert_axis(Axis(branch_axis - 1));
                    if name == CoefficientName::Uloulo {
                        let n = x.ndim();
                        x.swap_axes(n - 2, n - 1);
                    }
                    let x = x.mapv(|z| z.conj());
                    (x.shape() == offdiag_shape.as_slice()).then_some(x)
                })
            } else {
                None
            };
            let updown = match from_partner {
                Some(x) => x,
                None => {
                    if square {
                        greensf_warn!(
                            "Unable to complete the ↑↓ entry of `{name}` for element {}; zero-filling.",
                            self.index + 1
                        );
                    }
                    ArrayD::zeros(IxDyn(&offdiag_shape))
                }
            };
            let full = ndarray::concatenate(
                Axis(SPIN_AXIS),
                &[coefficient.view(), updown.insert_axis(Axis(SPIN_AXIS)).view()],
            )?;
            completed.push((name, full));
        }
        for (name, full) in completed {
            self.coefficients.insert(name, full);
        }
        Ok(())
    }

    // ~~~~~~~~~~~~
    // Coefficients
    // ~~~~~~~~~~~~

    /// Returns the scalar-product weights of a coefficient family at a packed spin index.
    fn scalar_product_weights(&self, name: CoefficientName, packed: usize) -> Option<ArrayD<f64>> {
        let sp = self.scalar_products.as_ref()?;
        let s = packed.min(sp.nspins().saturating_sub(1));
        let weights = match name {
            CoefficientName::Sphavg => return None,
            CoefficientName::Uu => sp.uu.slice(ndarray::s![s]).to_owned().into_dyn(),
            CoefficientName::Ud => sp.ud.slice(ndarray::s![s]).to_owned().into_dyn(),
            CoefficientName::Du => sp.du.slice(ndarray::s![s]).to_owned().into_dyn(),
            CoefficientName::Dd => sp.dd.slice(ndarray::s![s]).to_owned().into_dyn(),
            CoefficientName::Uulo => sp.uulo.row(s).to_owned().into_dyn(),
            CoefficientName::Ulou => sp.ulou.row(s).to_owned().into_dyn(),
            CoefficientName::Dulo => sp.dulo.row(s).to_owned().into_dyn(),
            CoefficientName::Ulod => sp.ulod.row(s).to_owned().into_dyn(),
            CoefficientName::Uloulo => sp.uloulo.index_axis(Axis(0), s).to_owned().into_dyn(),
        };
        Some(weights)
    }

    /// Returns one packed spin entry of a coefficient multiplied by its scalar products.
    fn scaled_entry(&self, name: CoefficientName, packed: usize) -> GreensfResult<ArrayD<C128>> {
        let coefficient = &self.coefficients[&name];
        let nspin = coefficient.shape()[SPIN_AXIS];
        let entry = if packed < nspin {
            coefficient.index_axis(Axis(SPIN_AXIS), packed)
        } else if nspin == 1 && packed == 1 {
            coefficient.index_axis(Axis(SPIN_AXIS), 0)
        } else {
            let mut shape = coefficient.shape().to_vec();
            shape.remove(SPIN_AXIS);
            shape.truncate(shape.len() - name.lo_axes());
            return Ok(ArrayD::zeros(IxDyn(&shape)));
        };
        match self.scalar_product_weights(name, packed) {
            Some(weights) if weights.ndim() == 0 => {
                let w = weights.iter().next().copied().unwrap_or(0.0);
                Ok(entry.mapv(|x| x * w))
            }
            Some(weights) => contract_trailing(entry, weights.view()),
            None => Ok(entry.to_owned()),
        }
    }

    /// Returns a coefficient family with its scalar products applied.
    ///
    /// # Arguments
    ///
    /// * `name` - The family. Spherically averaged and k-resolved elements only carry
    /// [`CoefficientName::Sphavg`]; radial elements carry everything else.
    /// * `spin` - A 1-based spin index selecting one packed spin entry, giving an array of shape
    /// `[nz, 2l+1, 2l'+1, (nk,) 2]`. If `None`, the 2×2 spin block is formed, giving
    /// `[nz, 2l+1, 2l'+1, 2, 2, (nk,) 2]`.
    /// * `radial` - Per-radius reconstruction. Not implemented.
    ///
    /// # Errors
    ///
    /// Errors with [`GreensfError::NotAvailable`] if the family is not stored for this element.
    pub fn get_coefficient(
        &self,
        name: CoefficientName,
        spin: Option<usize>,
        radial: bool,
    ) -> GreensfResult<ArrayD<C128>> {
        if radial {
            return Err(GreensfError::NotImplemented(
                "get_coefficient with radial = true".to_string(),
            ));
        }
        let valid = match self.kind() {
            StorageKind::SphericalAverage | StorageKind::KResolved => {
                name == CoefficientName::Sphavg
            }
            StorageKind::Radial => name != CoefficientName::Sphavg,
        };
        if !valid || !self.coefficients.contains_key(&name) {
            return Err(GreensfError::not_available(
                &format!("get_coefficient(`{name}`)"),
                &self.kind().to_string(),
            ));
        }
        match spin {
            Some(s) => {
                let nmax = self.nspins_effective();
                if s == 0 || s > nmax {
                    return Err(GreensfError::out_of_range("spin", s as i64, 1, nmax as i64));
                }
                self.scaled_entry(name, s - 1)
            }
            None => {
                let entries = (0..4)
                    .map(|packed| self.scaled_entry(name, packed))
                    .collect::<GreensfResult<Vec<_>>>()?;
                let views = entries.iter().map(|e| e.view()).collect::<Vec<_>>();
                let packed = ndarray::stack(Axis(SPIN_AXIS), &views)?;
                spin_block(&packed)
            }
        }
    }

    // ~~~~~~~~~~~~~~~~~
    // Energy dependence
    // ~~~~~~~~~~~~~~~~~

    fn summed_coefficients(&self, spin: Option<usize>) -> GreensfResult<ArrayD<C128>> {
        let mut total: Option<ArrayD<C128>> = None;
        for &name in self.coefficients.keys() {
            let c = self.get_coefficient(name, spin, false)?;
            total = Some(match total {
                Some(t) => t + &c,
                None => c,
            });
        }
        total.ok_or_else(|| {
            GreensfError::Malformed(format!("element {} has no coefficients", self.index + 1))
        })
    }

    fn select_m(
        &self,
        array: ArrayD<C128>,
        m: Option<i64>,
        mp: Option<i64>,
    ) -> GreensfResult<ArrayD<C128>> {
        let (l, lp) = self.l_i64();
        let mut array = array;
        let mut mp_axis = 2;
        if let Some(m) = m {
            if m < -l || m > l {
                return Err(GreensfError::out_of_range("m", m, -l, l));
            }
            array = array.index_axis_move(Axis(1), (m + l) as usize);
            mp_axis = 1;
        }
        if let Some(mp) = mp {
            if mp < -lp || mp > lp {
                return Err(GreensfError::out_of_range("m'", mp, -lp, lp));
            }
            array = array.index_axis_move(Axis(mp_axis), (mp + lp) as usize);
        }
        Ok(array)
    }

    /// Returns the Green's function on both contour branches, $`G(z)`$ and $`G(z^*)`$, on a
    /// trailing axis of length two.
    ///
    /// # Arguments
    ///
    /// * `m`, `mp` - Physical magnetic quantum numbers selecting one orbital entry each. A given
    /// value removes its axis.
    /// * `spin` - A 1-based spin index, or `None` for the 2×2 spin block.
    pub fn energy_dependence_both_contours(
        &self,
        m: Option<i64>,
        mp: Option<i64>,
        spin: Option<usize>,
    ) -> GreensfResult<ArrayD<C128>> {
        let g = self.summed_coefficients(spin)?;
        self.select_m(g, m, mp)
    }

    /// Returns the energy dependence of the Green's function on the upper contour.
    ///
    /// With `imag = true`, this is
    /// ```math
    /// -\frac{1}{2\pi i}\left[G(z) - G(z^*)\right],
    /// ```
    /// and with `imag = false`,
    /// ```math
    /// -\frac{1}{2\pi}\left[G(z) + G(z^*)\right].
    /// ```
    ///
    /// # Arguments
    ///
    /// * `m`, `mp` - Physical magnetic quantum numbers selecting one orbital entry each.
    /// * `spin` - A 1-based spin index, or `None` for the 2×2 spin block.
    /// * `imag` - Selects the combination of the two branches.
    ///
    /// # Returns
    ///
    /// An array of shape `[nz, (2l+1,) (2l'+1,) (2, 2,) (nk)]`.
    pub fn energy_dependence(
        &self,
        m: Option<i64>,
        mp: Option<i64>,
        spin: Option<usize>,
        imag: bool,
    ) -> GreensfResult<ArrayD<C128>> {
        let both = self.energy_dependence_both_contours(m, mp, spin)?;
        Ok(combine_branches(&both, imag))
    }

    fn full_matrix_both_contours_unchecked(&self) -> GreensfResult<ArrayD<C128>> {
        let g = self.summed_coefficients(None)?;
        let shape = g.shape().to_vec();
        let (nz, nm, nmp) = (shape[0], shape[1], shape[2]);
        let permuted = g.permuted_axes(IxDyn(&[0, 3, 1, 4, 2, 5]));
        reshape(permuted.view(), &[nz, 2 * nm, 2 * nmp, 2])
    }

    /// Returns the spin-orbital matrix $`[[\uparrow\uparrow, \uparrow\downarrow],
    /// [\downarrow\uparrow, \downarrow\downarrow]]`$ on both contour branches, of shape
    /// `[nz, 2(2l+1), 2(2l'+1), 2]`.
    ///
    /// # Errors
    ///
    /// Errors with [`GreensfError::NotAvailable`] for k-resolved elements.
    pub fn energy_dependence_full_matrix_both_contours(&self) -> GreensfResult<ArrayD<C128>> {
        if self.kind() == StorageKind::KResolved {
            return Err(GreensfError::not_available(
                "energy_dependence_full_matrix",
                &self.kind().to_string(),
            ));
        }
        self.full_matrix_both_contours_unchecked()
    }

    /// Returns the spin-orbital matrix of shape `[nz, 2(2l+1), 2(2l'+1)]`, combining the contour
    /// branches as in [`Self::energy_dependence`].
    ///
    /// # Errors
    ///
    /// Errors with [`GreensfError::NotAvailable`] for k-resolved elements.
    pub fn energy_dependence_full_matrix(&self, imag: bool) -> GreensfResult<ArrayD<C128>> {
        let both = self.energy_dependence_full_matrix_both_contours()?;
        Ok(combine_branches(&both, imag))
    }

    /// Returns the orbital trace $`\sum_m G_{mm}`$ of [`Self::energy_dependence`].
    ///
    /// # Errors
    ///
    /// Errors with [`GreensfError::BadShape`] if $`l \neq l'`$.
    pub fn trace_energy_dependence(
        &self,
        spin: Option<usize>,
        imag: bool,
    ) -> GreensfResult<ArrayD<C128>> {
        if self.element.l != self.element.l_p {
            return Err(GreensfError::BadShape(
                "trace_energy_dependence (l != l')".to_string(),
            ));
        }
        let g = self.energy_dependence(None, None, spin, imag)?;
        Ok(orbital_trace(&g))
    }

    /// Computes the $`n`$-th energy moment
    ///
    /// ```math
    /// M_n = -\frac{1}{4\pi i} \sum_{z} \left[ w\, z^n G(z) - w^* (z^*)^n G(z^*) \right].
    /// ```
    ///
    /// # Returns
    ///
    /// An array of shape `[2l+1, 2l'+1, (2, 2,) (nk)]`.
    pub fn moment(&self, n: i32, spin: Option<usize>) -> GreensfResult<ArrayD<C128>> {
        let g = self.energy_dependence_both_contours(None, None, spin)?;
        let branch = g.ndim() - 1;
        let mut result = ArrayD::<C128>::zeros(IxDyn(&g.shape()[1..branch]));
        for (iz, (z, w)) in self.points.iter().zip(self.weights.iter()).enumerate() {
            let gz = g.index_axis(Axis(0), iz);
            let upper = gz.index_axis(Axis(branch - 1), 0);
            let lower = gz.index_axis(Axis(branch - 1), 1);
            result.scaled_add(w * z.powi(n), &upper);
            result.scaled_add(-w.conj() * z.conj().powi(n), &lower);
        }
        let prefactor = -1.0 / C128::new(0.0, 4.0 * PI);
        Ok(result.mapv(|x| x * prefactor))
    }

    /// Computes the occupation matrix, *i.e.* the zeroth moment. This is an occupation only if
    /// the contour ends at the Fermi energy.
    pub fn occupation(&self, spin: Option<usize>) -> GreensfResult<ArrayD<C128>> {
        self.moment(0, spin)
    }

    // ~~~~~~~~~
    // Rotations
    // ~~~~~~~~~

    /// Applies $`X \leftarrow L X R^\dagger`$ on the orbital axes of every coefficient.
    fn rotate_orbitals(&mut self, left: &Array2<C128>, right: &Array2<C128>) -> GreensfResult<()> {
        let right_conj = right.mapv(|x| x.conj());
        for coefficient in self.coefficients.values_mut() {
            let shape = coefficient.shape().to_vec();
            let rest = shape[3..].iter().product::<usize>();
            let x = reshape(coefficient.view(), &[shape[0], shape[1], shape[2], rest])?;
            let rotated = einsum(
                "am,zmnr,bn->zabr",
                &[&left.view(), &x.view(), &right_conj.view()],
            )
            .map_err(GreensfError::contraction)?;
            *coefficient = reshape(rotated.view(), &shape)?;
        }
        Ok(())
    }

    /// Applies $`X \leftarrow L X R^\dagger`$ on the spin axes of every coefficient, promoting
    /// the packed spin axis to length four first.
    fn rotate_spins(&mut self, left: &Array2<C128>, right: &Array2<C128>) -> GreensfResult<()> {
        let right_conj = right.mapv(|x| x.conj());
        for coefficient in self.coefficients.values_mut() {
            let block = spin_block(coefficient)?;
            let shape = block.shape().to_vec();
            let rest = shape[5..].iter().product::<usize>();
            let x = reshape(
                block.view(),
                &[shape[0], shape[1], shape[2], 2, 2, rest],
            )?;
            let rotated = einsum(
                "as,zmnstr,bt->zmnabr",
                &[&left.view(), &x.view(), &right_conj.view()],
            )
            .map_err(GreensfError::contraction)?;
            let rotated = reshape(rotated.view(), &shape)?;
            *coefficient = pack_spin_block(&rotated)?;
        }
        self.attributes.mperp = true;
        Ok(())
    }

    /// Rotates the element from the local frames of its sites into the global frame. Does
    /// nothing for parts that are already global.
    pub fn to_global_frame(&mut self) -> GreensfResult<()> {
        let frame = self.attributes.frame;
        if frame.local_real_frame {
            let left = orbital_rotation(self.element.l, frame.alpha, frame.beta);
            let right = orbital_rotation(self.element.l_p, frame.alphap, frame.betap);
            self.rotate_orbitals(&left, &right)?;
            self.attributes.frame.local_real_frame = false;
            log::debug!("Element {} rotated to the global real-space frame.", self.index + 1);
        }
        if frame.local_spin_frame {
            let left = spin_rotation(-frame.alpha, -frame.beta);
            let right = spin_rotation(-frame.alphap, -frame.betap);
            self.rotate_spins(&left, &right)?;
            self.attributes.frame.local_spin_frame = false;
            log::debug!("Element {} rotated to the global spin frame.", self.index + 1);
        }
        Ok(())
    }

    /// Rotates the element from the global frame into the local frames of its sites. Does
    /// nothing for parts that are already local.
    pub fn to_local_frame(&mut self) -> GreensfResult<()> {
        let frame = self.attributes.frame;
        if !frame.local_real_frame {
            let left = orbital_rotation(self.element.l, frame.alpha, frame.beta);
            let right = orbital_rotation(self.element.l_p, frame.alphap, frame.betap);
            self.rotate_orbitals(&dagger(&left), &dagger(&right))?;
            self.attributes.frame.local_real_frame = true;
        }
        if !frame.local_spin_frame {
            let left = spin_rotation(-frame.alpha, -frame.beta);
            let right = spin_rotation(-frame.alphap, -frame.betap);
            self.rotate_spins(&dagger(&left), &dagger(&right))?;
            self.attributes.frame.local_spin_frame = true;
        }
        Ok(())
    }

    /// Writes a summary of the element to the output log.
    pub fn log_summary(&self) {
        greensf_output!(
            "Element {} ({}): {}",
            self.index + 1,
            self.kind(),
            self.element
        );
        greensf_output!(
            "  sites {} → {}, {} energy points, packed spin axis of length {}",
            self.attributes.atom_label,
            self.attributes.atom_label_p,
            self.points.len(),
            self.packed_spins()
        );
    }
}

/// Returns the conjugate transpose of a matrix.
pub(crate) fn dagger(matrix: &Array2<C128>) -> Array2<C128> {
    matrix.t().mapv(|x| x.conj())
}

/// Combines the trailing contour-branch axis into the imaginary or real combination.
fn combine_branches(both: &ArrayD<C128>, imag: bool) -> ArrayD<C128> {
    let branch = Axis(both.ndim() - 1);
    let upper = both.index_axis(branch, 0);
    let lower = both.index_axis(branch, 1);
    if imag {
        let prefactor = -1.0 / C128::new(0.0, 2.0 * PI);
        (&upper - &lower).mapv(|x| x * prefactor)
    } else {
        let prefactor = -1.0 / (2.0 * PI);
        (&upper + &lower).mapv(|x| x * prefactor)
    }
}

/// Sums the diagonal of the orbital axes 1 and 2.
fn orbital_trace(g: &ArrayD<C128>) -> ArrayD<C128> {
    let n = g.shape()[1];
    let mut shape = g.shape().to_vec();
    shape.drain(1..3);
    let mut trace = ArrayD::<C128>::zeros(IxDyn(&shape));
    for m in 0..n {
        trace += &g.index_axis(Axis(1), m).index_axis(Axis(1), m);
    }
    trace
}
