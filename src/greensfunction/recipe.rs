//! Loader recipes turning stored element data into in-memory arrays.
//!
//! Coefficient datasets are stored row-major with their axes reversed relative to the in-memory
//! layout and with a trailing real/imaginary axis, *i.e.* `[2, Nspin, 2l'+1, 2l+1, nz, 2]` on
//! disk. After loading, every coefficient is a complex array in 1/eV with the energy axis first:
//!
//! | Family              | In-memory shape                           |
//! |---------------------|-------------------------------------------|
//! | `sphavg`            | `[nz, 2l+1, 2l'+1, Nspin, 2]`             |
//! | `uu, ud, du, dd`    | `[nz, 2l+1, 2l'+1, Nspin, 2]`             |
//! | `uulo, ulou, ...`   | `[nz, 2l+1, 2l'+1, Nspin, 2, nLO]`        |
//! | `uloulo`            | `[nz, 2l+1, 2l'+1, Nspin, 2, nLO, nLO']`  |
//! | k-resolved `sphavg` | `[nz, 2l+1, 2l'+1, Nspin, nk, 2]`         |

use indexmap::IndexMap;
use lazy_static::lazy_static;
use ndarray::{s, stack, Array1, Array2, Array3, ArrayD, Axis, Ix1, Ix2, Ix4, Zip};
use num_complex::Complex;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::auxiliary::atom::{site_label, ElementMap};
use crate::auxiliary::constants::HTR_TO_EV;
use crate::auxiliary::error::{GreensfError, GreensfResult};
use crate::container::{join_path, Container, GroupHandle};
use crate::greensfunction::element::{
    element_group_path, element_path, ElementHeader, StorageKind, ROTATION_VERSION,
};
use crate::greensfunction::CoefficientName;

type C128 = Complex<f64>;

/// Minimum container version providing the atom table used for element symbols.
const ATOM_TABLE_VERSION: i64 = 8;

lazy_static! {
    static ref LO_DATASET_RE: Regex =
        Regex::new(r"^(uulo|ulou|dulo|ulod|uloulop)-(\d+)$").expect("Regex pattern invalid.");
    static ref KRESOLVED_DATASET_RE: Regex =
        Regex::new(r"^kresolved-(\d+)$").expect("Regex pattern invalid.");
}

// ==================
// Struct definitions
// ==================

/// Radial scalar products of one element at each spin, restricted to the local orbitals of the
/// element.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScalarProducts {
    /// $`\langle u|u \rangle`$ per spin.
    pub uu: Array1<f64>,

    /// $`\langle u|\dot{u} \rangle`$ per spin.
    pub ud: Array1<f64>,

    /// $`\langle \dot{u}|u \rangle`$ per spin.
    pub du: Array1<f64>,

    /// $`\langle \dot{u}|\dot{u} \rangle`$ per spin.
    pub dd: Array1<f64>,

    /// `[Nspin, nLO']`, local orbitals of the right side.
    pub uulo: Array2<f64>,

    /// `[Nspin, nLO]`, local orbitals of the left side.
    pub ulou: Array2<f64>,

    /// `[Nspin, nLO']`, local orbitals of the right side.
    pub dulo: Array2<f64>,

    /// `[Nspin, nLO]`, local orbitals of the left side.
    pub ulod: Array2<f64>,

    /// `[Nspin, nLO, nLO']`.
    pub uloulo: Array3<f64>,
}

impl ScalarProducts {
    /// Returns the number of spins the scalar products are given for.
    pub fn nspins(&self) -> usize {
        self.uu.len()
    }
}

/// Radial functions of the two sides of an element, stored as $`r\,u(r)`$ on the logarithmic
/// mesh of the corresponding atom type.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RadialFunctions {
    /// The radial mesh of the left atom type.
    pub rmesh: Array1<f64>,

    /// The radial mesh of the right atom type.
    pub rmesh_p: Array1<f64>,

    /// `[Nspin, nr]`.
    pub u: Array2<f64>,

    /// `[Nspin, nr]`.
    pub d: Array2<f64>,

    /// `[Nspin, nr']`.
    pub u_p: Array2<f64>,

    /// `[Nspin, nr']`.
    pub d_p: Array2<f64>,

    /// `[Nspin, nLO, nr]`.
    pub ulo: Array3<f64>,

    /// `[Nspin, nLO', nr']`.
    pub ulo_p: Array3<f64>,
}

/// The k-point set of a k-resolved calculation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct KPoints {
    /// The kind of k-point set, *e.g.* `path` or `mesh`.
    pub kind: Option<String>,

    /// `[nk, 3]` coordinates.
    pub coordinates: Array2<f64>,

    /// `[nk]` weights.
    pub weights: Array1<f64>,

    /// Indices of labelled special points.
    pub special_point_indices: Vec<i64>,

    /// Labels of the special points.
    pub special_point_labels: Vec<String>,
}

/// The rotation state of an element.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FrameState {
    /// Boolean indicating if the orbital axes are still in the local real-space frames.
    pub local_real_frame: bool,

    /// Boolean indicating if the spin axes are still in the local spin frames.
    pub local_spin_frame: bool,

    /// Azimuthal angle of the left site.
    pub alpha: f64,

    /// Azimuthal angle of the right site.
    pub alphap: f64,

    /// Polar angle of the left site.
    pub beta: f64,

    /// Polar angle of the right site.
    pub betap: f64,
}

/// Scalars attached to a loaded element.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ElementAttributes {
    /// The container format version.
    pub version: i64,

    /// The Fermi energy in eV.
    pub fermi_energy: f64,

    /// The number of spins of the calculation.
    pub spins: usize,

    /// Boolean indicating if the calculation stores spin-offdiagonal entries.
    pub mperp: bool,

    /// The maximum orbital quantum number of the element group.
    pub lmax: u32,

    /// The label of the left site.
    pub atom_label: String,

    /// The label of the right site.
    pub atom_label_p: String,

    /// The rotation state as stored.
    pub frame: FrameState,
}

/// Everything the loader yields for one element.
#[derive(Clone, Debug)]
pub(crate) struct ElementData {
    pub(crate) points: Array1<C128>,
    pub(crate) weights: Array1<C128>,
    pub(crate) coefficients: IndexMap<CoefficientName, ArrayD<C128>>,
    pub(crate) scalar_products: Option<ScalarProducts>,
    pub(crate) radial_functions: Option<RadialFunctions>,
    pub(crate) kpoints: Option<KPoints>,
    pub(crate) attributes: ElementAttributes,
}

// ======
// Loader
// ======

/// Loads one element with the recipe matching its storage kind.
///
/// # Arguments
///
/// * `container` - The container to read.
/// * `index` - The 0-based catalog index of the element.
/// * `element` - The header of the element.
pub(crate) fn load_element<C: Container + ?Sized>(
    container: &C,
    index: usize,
    element: &ElementHeader,
) -> GreensfResult<ElementData> {
    let version = container.version()?;
    let group_path = element_group_path(container)?;
    let element_group = container.group(&element_path(&group_path, index))?;
    log::debug!(
        "Loading element {} with the {} recipe.",
        index + 1,
        element.kind()
    );

    let (points, weights) = read_contour(container, element.contour)?;

    let coefficients = match element.kind() {
        StorageKind::SphericalAverage => read_sphavg(&element_group, element)?,
        StorageKind::Radial => read_radial(&element_group, element)?,
        StorageKind::KResolved => read_kresolved(&element_group, element)?,
    };
    for (name, coefficient) in coefficients.iter() {
        if coefficient.shape()[0] != points.len() {
            return Err(GreensfError::Malformed(format!(
                "`{name}` of element {} has {} energy points but contour {} has {}",
                index + 1,
                coefficient.shape()[0],
                element.contour,
                points.len()
            )));
        }
    }

    let (scalar_products, radial_functions) = if element.kind() == StorageKind::Radial {
        let llo = read_llo(container)?;
        let left_los = lo_indices(llo.as_ref(), element.atom_type, element.l);
        let right_los = lo_indices(llo.as_ref(), element.atom_type_p, element.l_p);
        let nlo_max = llo.as_ref().map(|llo| llo.ncols()).unwrap_or(0);
        check_lo_count(&coefficients, &left_los, &right_los)?;
        (
            Some(read_scalar_products(
                &element_group,
                nlo_max,
                &left_los,
                &right_los,
            )?),
            Some(read_radial_functions(container, element, &left_los, &right_los)?),
        )
    } else {
        (None, None)
    };

    let kpoints = if element.kind() == StorageKind::KResolved {
        read_kpoints(container)?
    } else {
        None
    };

    let attributes = read_attributes(container, &group_path, &element_group, element, version)?;

    Ok(ElementData {
        points,
        weights,
        coefficients,
        scalar_products,
        radial_functions,
        kpoints,
        attributes,
    })
}

// ~~~~~~~~~~~~~~~~~~~~~~~~~~~~~
// Array conversion and checking
// ~~~~~~~~~~~~~~~~~~~~~~~~~~~~~

/// Splits the trailing real/imaginary axis into complex numbers.
fn to_complex(raw: &ArrayD<f64>, path: &str) -> GreensfResult<ArrayD<C128>> {
    let ndim = raw.ndim();
    if ndim == 0 || raw.shape()[ndim - 1] != 2 {
        return Err(GreensfError::Malformed(format!(
            "`{path}` of shape {:?} lacks a trailing real/imaginary axis",
            raw.shape()
        )));
    }
    let re = raw.index_axis(Axis(ndim - 1), 0);
    let im = raw.index_axis(Axis(ndim - 1), 1);
    Ok(Zip::from(&re)
        .and(&im)
        .map_collect(|&r, &i| C128::new(r, i)))
}

/// Converts an on-disk coefficient to the in-memory layout in 1/eV.
fn to_canonical(raw: &ArrayD<f64>, path: &str) -> GreensfResult<ArrayD<C128>> {
    let complex = to_complex(raw, path)?;
    Ok(complex
        .reversed_axes()
        .as_standard_layout()
        .mapv(|x| x / HTR_TO_EV))
}

/// Checks the leading `[nz, 2l+1, 2l'+1, Nspin, 2]` axes of a loaded coefficient.
fn check_coefficient(
    coefficient: &ArrayD<C128>,
    element: &ElementHeader,
    branch_axis: usize,
    path: &str,
) -> GreensfResult<()> {
    let shape = coefficient.shape();
    let ok = shape.len() > branch_axis
        && shape[1] == 2 * element.l as usize + 1
        && shape[2] == 2 * element.l_p as usize + 1
        && (1..=4).contains(&shape[3])
        && shape[branch_axis] == 2;
    if ok {
        Ok(())
    } else {
        Err(GreensfError::Malformed(format!(
            "`{path}` has in-memory shape {shape:?}, incompatible with l = {}, l' = {}",
            element.l, element.l_p
        )))
    }
}

fn read_coefficient<C: Container + ?Sized>(
    group: &GroupHandle<'_, C>,
    name: &str,
    element: &ElementHeader,
) -> GreensfResult<ArrayD<C128>> {
    let dataset = group.dataset(name)?;
    let coefficient = to_canonical(&dataset.read()?, dataset.path())?;
    check_coefficient(&coefficient, element, 4, dataset.path())?;
    Ok(coefficient)
}

/// Stacks views along a new axis.
fn stack_along(axis: usize, arrays: &[ArrayD<C128>]) -> GreensfResult<ArrayD<C128>> {
    let views = arrays.iter().map(|a| a.view()).collect::<Vec<_>>();
    Ok(stack(Axis(axis), &views)?)
}

// ~~~~~~~
// Recipes
// ~~~~~~~

fn read_sphavg<C: Container + ?Sized>(
    group: &GroupHandle<'_, C>,
    element: &ElementHeader,
) -> GreensfResult<IndexMap<CoefficientName, ArrayD<C128>>> {
    let mut coefficients = IndexMap::new();
    coefficients.insert(
        CoefficientName::Sphavg,
        read_coefficient(group, "sphavg", element)?,
    );
    Ok(coefficients)
}

fn read_radial<C: Container + ?Sized>(
    group: &GroupHandle<'_, C>,
    element: &ElementHeader,
) -> GreensfResult<IndexMap<CoefficientName, ArrayD<C128>>> {
    let mut coefficients = IndexMap::new();
    for name in [
        CoefficientName::Uu,
        CoefficientName::Ud,
        CoefficientName::Du,
        CoefficientName::Dd,
    ] {
        coefficients.insert(name, read_coefficient(group, &name.to_string(), element)?);
    }

    let Some(lo_group) = group.optional_group("LOcontribution") else {
        return Ok(coefficients);
    };

    let mut families: IndexMap<CoefficientName, Vec<(usize, ArrayD<C128>)>> = IndexMap::new();
    for member in lo_group.member_names()? {
        let Some(captures) = LO_DATASET_RE.captures(&member) else {
            log::debug!("Skipping unrecognised local-orbital dataset `{member}`.");
            continue;
        };
        let name = match &captures[1] {
            "uulo" => CoefficientName::Uulo,
            "ulou" => CoefficientName::Ulou,
            "dulo" => CoefficientName::Dulo,
            "ulod" => CoefficientName::Ulod,
            _ => CoefficientName::Uloulo,
        };
        let lo_index = captures[2].parse::<usize>().map_err(|err| {
            GreensfError::Malformed(format!("bad local-orbital index in `{member}`: {err}"))
        })?;
        let dataset = lo_group.dataset(&member)?;
        let coefficient = to_canonical(&dataset.read()?, dataset.path())?;
        let expected_ndim = if name == CoefficientName::Uloulo { 6 } else { 5 };
        if coefficient.ndim() != expected_ndim {
            return Err(GreensfError::Malformed(format!(
                "`{}` has {} axes, expected {}",
                dataset.path(),
                coefficient.ndim() + 1,
                expected_ndim + 1
            )));
        }
        check_coefficient(&coefficient, element, 4, dataset.path())?;
        families
            .entry(name)
            .or_default()
            .push((lo_index, coefficient));
    }

    for (name, mut members) in families {
        members.sort_by_key(|(lo_index, _)| *lo_index);
        let arrays = members
            .into_iter()
            .map(|(_, coefficient)| coefficient)
            .collect::<Vec<_>>();
        // Single-LO families get a trailing LO axis; `uloulop` gets one before its LO' axis.
        coefficients.insert(name, stack_along(5, &arrays)?);
    }
    Ok(coefficients)
}

fn read_kresolved<C: Container + ?Sized>(
    group: &GroupHandle<'_, C>,
    element: &ElementHeader,
) -> GreensfResult<IndexMap<CoefficientName, ArrayD<C128>>> {
    let mut panels = group
        .member_names()?
        .into_iter()
        .filter_map(|member| {
            KRESOLVED_DATASET_RE
                .captures(&member)
                .and_then(|captures| captures[1].parse::<usize>().ok())
                .map(|k| (k, member))
        })
        .collect::<Vec<_>>();
    if panels.is_empty() {
        return Err(GreensfError::NotFound(join_path(group.path(), "kresolved-*")));
    }
    panels.sort_by_key(|(k, _)| *k);
    let arrays = panels
        .iter()
        .map(|(_, member)| read_coefficient(group, member, element))
        .collect::<GreensfResult<Vec<_>>>()?;
    log::debug!("Stacked {} k-resolved panels.", arrays.len());

    let mut coefficients = IndexMap::new();
    coefficients.insert(CoefficientName::Sphavg, stack_along(4, &arrays)?);
    Ok(coefficients)
}

// ~~~~~~~
// Contour
// ~~~~~~~

fn read_complex_vector<C: Container + ?Sized>(
    group: &GroupHandle<'_, C>,
    name: &str,
) -> GreensfResult<Array1<C128>> {
    let dataset = group.dataset(name)?;
    let complex = to_complex(&dataset.read()?, dataset.path())?;
    Ok(complex.into_dimensionality::<Ix1>()?)
}

/// Reads the contour points and weights, relative to the Fermi energy and in eV.
pub(crate) fn read_contour<C: Container + ?Sized>(
    container: &C,
    contour: usize,
) -> GreensfResult<(Array1<C128>, Array1<C128>)> {
    let fermi_energy = container.group("/general")?.get_f64("FermiEnergy")?;
    let contour_group = container.group(&format!("/EnergyContours/contour-{contour}"))?;
    let points = read_complex_vector(&contour_group, "ContourPoints")?
        .mapv(|z| (z - fermi_energy) * HTR_TO_EV);
    let weights = read_complex_vector(&contour_group, "IntegrationWeights")?
        .mapv(|w| w * HTR_TO_EV);
    if points.len() != weights.len() {
        return Err(GreensfError::Malformed(format!(
            "contour {contour} has {} points but {} weights",
            points.len(),
            weights.len()
        )));
    }
    Ok((points, weights))
}

// ~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~
// Scalar products, radial functions, local orbitals
// ~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~

fn read_llo<C: Container + ?Sized>(container: &C) -> GreensfResult<Option<Array2<i64>>> {
    container
        .optional_dataset("/RadialFunctions/llo")
        .map(|dataset| -> GreensfResult<Array2<i64>> {
            let llo = dataset.read()?.into_dimensionality::<Ix2>()?;
            Ok(llo.mapv(|x| x.round() as i64))
        })
        .transpose()
}

/// Returns the local-orbital indices of an atom type carrying angular momentum `l`.
fn lo_indices(llo: Option<&Array2<i64>>, atom_type: usize, l: u32) -> Vec<usize> {
    llo.and_then(|llo| {
        atom_type
            .checked_sub(1)
            .filter(|&t| t < llo.nrows())
            .map(|t| {
                llo.row(t)
                    .iter()
                    .enumerate()
                    .filter(|&(_, &lo_l)| lo_l == i64::from(l))
                    .map(|(i, _)| i)
                    .collect::<Vec<_>>()
            })
    })
    .unwrap_or_default()
}

/// Checks that the stacked LO axes agree with the local orbitals found for each side.
fn check_lo_count(
    coefficients: &IndexMap<CoefficientName, ArrayD<C128>>,
    left_los: &[usize],
    right_los: &[usize],
) -> GreensfResult<()> {
    let expected = |name: CoefficientName| -> Vec<usize> {
        match name {
            CoefficientName::Uulo | CoefficientName::Dulo => vec![right_los.len()],
            CoefficientName::Ulou | CoefficientName::Ulod => vec![left_los.len()],
            CoefficientName::Uloulo => vec![left_los.len(), right_los.len()],
            _ => vec![],
        }
    };
    for (&name, coefficient) in coefficients.iter() {
        let lo_axes = expected(name);
        if lo_axes.is_empty() {
            continue;
        }
        let found = coefficient.shape()[5..].to_vec();
        if found != lo_axes {
            return Err(GreensfError::Malformed(format!(
                "`{name}` carries local-orbital axes {found:?}, expected {lo_axes:?}"
            )));
        }
    }
    Ok(())
}

fn lo_products<C: Container + ?Sized>(
    group: &GroupHandle<'_, C>,
    name: &str,
    nspins: usize,
    nlo_max: usize,
    indices: &[usize],
) -> GreensfResult<Array2<f64>> {
    if indices.is_empty() {
        return Ok(Array2::zeros((nspins, 0)));
    }
    let flat = group.get_f64_vec(name)?;
    let full = Array2::from_shape_vec((nspins, nlo_max), flat)?;
    Ok(full.select(Axis(1), indices))
}

fn read_scalar_products<C: Container + ?Sized>(
    element_group: &GroupHandle<'_, C>,
    nlo_max: usize,
    left_los: &[usize],
    right_los: &[usize],
) -> GreensfResult<ScalarProducts> {
    let group = element_group.group("scalarProducts")?;
    let uu = Array1::from(group.get_f64_vec("uun")?);
    let nspins = uu.len();
    let diag = |name: &str| -> GreensfResult<Array1<f64>> {
        let values = Array1::from(group.get_f64_vec(name)?);
        if values.len() != nspins {
            Err(GreensfError::Malformed(format!(
                "`{}@{name}` has {} spins, `uun` has {nspins}",
                group.path(),
                values.len()
            )))
        } else {
            Ok(values)
        }
    };

    let uloulo = if left_los.is_empty() || right_los.is_empty() {
        Array3::zeros((nspins, left_los.len(), right_los.len()))
    } else {
        let flat = group.get_f64_vec("uloulopn")?;
        Array3::from_shape_vec((nspins, nlo_max, nlo_max), flat)?
            .select(Axis(1), left_los)
            .select(Axis(2), right_los)
    };

    Ok(ScalarProducts {
        ud: diag("udn")?,
        du: diag("dun")?,
        dd: diag("ddn")?,
        uulo: lo_products(&group, "uulon", nspins, nlo_max, right_los)?,
        ulou: lo_products(&group, "uloun", nspins, nlo_max, left_los)?,
        dulo: lo_products(&group, "dulon", nspins, nlo_max, right_los)?,
        ulod: lo_products(&group, "ulodn", nspins, nlo_max, left_los)?,
        uloulo,
        uu,
    })
}

fn read_radial_functions<C: Container + ?Sized>(
    container: &C,
    element: &ElementHeader,
    left_los: &[usize],
    right_los: &[usize],
) -> GreensfResult<RadialFunctions> {
    let group = container.group("/RadialFunctions")?;
    let rmsh = group.dataset("rmsh")?.read()?.into_dimensionality::<Ix2>()?;
    let u = group.dataset("u")?.read()?;
    let d = group.dataset("d")?.read()?;
    let ulo = match group.optional_dataset("ulo") {
        Some(dataset) => Some(dataset.read()?),
        None => None,
    };
    let jri = match group.optional_attribute("jri")? {
        Some(_) => Some(group.get_i64_vec("jri")?),
        None => None,
    };

    let side = |atom_type: usize, l: u32, los: &[usize]| -> GreensfResult<_> {
        let t = atom_type
            .checked_sub(1)
            .filter(|&t| t < rmsh.nrows())
            .ok_or_else(|| {
                GreensfError::out_of_range("atom type", atom_type as i64, 1, rmsh.nrows() as i64)
            })?;
        let nr = jri
            .as_ref()
            .and_then(|jri| jri.get(t))
            .map(|&n| (n.max(0) as usize).min(rmsh.ncols()))
            .unwrap_or(rmsh.ncols());
        let rmesh = rmsh.slice(s![t, ..nr]).to_owned();
        let radial = |f: &ArrayD<f64>, index: usize| -> GreensfResult<Array2<f64>> {
            let f = f.view().into_dimensionality::<Ix4>()?;
            Ok(f.slice(s![.., t, index, ..nr]).to_owned())
        };
        let uf = radial(&u, l as usize)?;
        let df = radial(&d, l as usize)?;
        let ulof = match (ulo.as_ref(), los.is_empty()) {
            (Some(ulo), false) => {
                let ulo = ulo.view().into_dimensionality::<Ix4>()?;
                ulo.slice(s![.., t, .., ..nr]).select(Axis(1), los)
            }
            (None, false) => {
                return Err(GreensfError::NotFound("/RadialFunctions/ulo".to_string()))
            }
            (_, true) => Array3::zeros((uf.nrows(), 0, nr)),
        };
        Ok((rmesh, uf, df, ulof))
    };

    let (rmesh, u, d, ulo) = side(element.atom_type, element.l, left_los)?;
    let (rmesh_p, u_p, d_p, ulo_p) = side(element.atom_type_p, element.l_p, right_los)?;
    Ok(RadialFunctions {
        rmesh,
        rmesh_p,
        u,
        d,
        u_p,
        d_p,
        ulo,
        ulo_p,
    })
}

// ~~~~~~~~~~~~~~~~~~~~~~~~~~~~
// k-points and attribute table
// ~~~~~~~~~~~~~~~~~~~~~~~~~~~~

fn read_kpoints<C: Container + ?Sized>(container: &C) -> GreensfResult<Option<KPoints>> {
    let Some(group) = container.optional_group("/general/kpts") else {
        return Ok(None);
    };
    let coordinates = group
        .dataset("coordinates")?
        .read()?
        .into_dimensionality::<Ix2>()?;
    let weights = group
        .dataset("weights")?
        .read()?
        .into_dimensionality::<Ix1>()?;
    let kind = match group.optional_attribute("kind")? {
        Some(_) => Some(group.get_text("kind")?),
        None => None,
    };
    let special_point_indices = match group.optional_attribute("specialPointIndices")? {
        Some(_) => group.get_i64_vec("specialPointIndices")?,
        None => Vec::new(),
    };
    let special_point_labels = group
        .optional_attribute("specialPointLabels")?
        .and_then(|value| value.as_text_vec())
        .unwrap_or_default();
    Ok(Some(KPoints {
        kind,
        coordinates,
        weights,
        special_point_indices,
        special_point_labels,
    }))
}

/// Resolves the element symbol of a site from the atom table, if there is one.
fn site_symbol<C: Container + ?Sized>(
    container: &C,
    version: i64,
    atom: Option<usize>,
    atom_type: usize,
    emap: &ElementMap<'static>,
) -> GreensfResult<Option<String>> {
    if version < ATOM_TABLE_VERSION {
        return Ok(None);
    }
    let Some(numbers) = container.optional_dataset("/atoms/atomicNumbers") else {
        return Ok(None);
    };
    let numbers = numbers.read()?;
    let position = match atom {
        Some(atom) => atom.checked_sub(1),
        None => match container.optional_dataset("/atoms/equivAtomsGroup") {
            Some(groups) => groups
                .read()?
                .iter()
                .position(|&t| t.round() as usize == atom_type),
            None => None,
        },
    };
    Ok(position
        .and_then(|i| numbers.iter().nth(i))
        .and_then(|&z| emap.symbol(z.round() as u32))
        .map(str::to_string))
}

fn read_attributes<C: Container + ?Sized>(
    container: &C,
    group_path: &str,
    element_group: &GroupHandle<'_, C>,
    element: &ElementHeader,
    version: i64,
) -> GreensfResult<ElementAttributes> {
    let general = container.group("/general")?;
    let spins = general.get_i64("spins")?;
    let lmax = container.group(group_path)?.get_i64("maxl")?;

    let frame = if version >= ROTATION_VERSION {
        let angle = |name: &str| -> GreensfResult<f64> {
            match element_group.optional_attribute(name)? {
                Some(_) => element_group.get_f64(name),
                None => Ok(0.0),
            }
        };
        FrameState {
            local_real_frame: element_group.get_bool_or("local_real_frame", false)?,
            local_spin_frame: element_group.get_bool_or("local_spin_frame", false)?,
            alpha: angle("alpha")?,
            alphap: angle("alphap")?,
            beta: angle("beta")?,
            betap: angle("betap")?,
        }
    } else {
        FrameState::default()
    };

    let emap = ElementMap::new();
    let atom_label = site_label(
        element.atom.unwrap_or(element.atom_type),
        site_symbol(container, version, element.atom, element.atom_type, &emap)?.as_deref(),
    );
    let atom_label_p = site_label(
        element.atom_p.unwrap_or(element.atom_type_p),
        site_symbol(container, version, element.atom_p, element.atom_type_p, &emap)?.as_deref(),
    );

    Ok(ElementAttributes {
        version,
        fermi_energy: general.get_f64("FermiEnergy")? * HTR_TO_EV,
        spins: usize::try_from(spins)
            .map_err(|_| GreensfError::Malformed(format!("/general@spins = {spins}")))?,
        mperp: general.get_bool_or("mperp", false)?,
        lmax: u32::try_from(lmax)
            .map_err(|_| GreensfError::Malformed(format!("{group_path}@maxl = {lmax}")))?,
        atom_label,
        atom_label_p,
        frame,
    })
}
