//! Element headers and the element catalog of a container.

use std::fmt;

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::angmom::ANGMOM_LABELS;
use crate::auxiliary::constants::{BOHR_TO_ANGSTROM, ZERO_DISPLACEMENT_THRESHOLD};
use crate::auxiliary::error::{GreensfError, GreensfResult};
use crate::container::{Container, GroupHandle};
use crate::io::format::{greensf_output, log_subtitle, table_rule};

#[cfg(test)]
#[path = "element_tests.rs"]
mod element_tests;

/// Conventional names of the group holding the Green's-function elements.
pub const ELEMENT_GROUP_NAMES: [&str; 2] = ["GreensFunctionElements", "Hubbard1Elements"];

/// Minimum container version carrying rotation angles, frame flags and atom indices.
pub(crate) const ROTATION_VERSION: i64 = 7;

// ==================
// Struct definitions
// ==================

/// An enumerated type for the storage kinds of Green's-function elements.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StorageKind {
    /// Spherically averaged coefficients.
    SphericalAverage,

    /// Coefficients in the basis of radial functions, including local orbitals.
    Radial,

    /// Spherically averaged coefficients resolved by k-point.
    KResolved,
}

impl fmt::Display for StorageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageKind::SphericalAverage => write!(f, "spherically averaged"),
            StorageKind::Radial => write!(f, "radial"),
            StorageKind::KResolved => write!(f, "k-resolved"),
        }
    }
}

/// The immutable descriptor of one stored Green's-function element.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ElementHeader {
    /// The orbital quantum number on the left side.
    pub l: u32,

    /// The orbital quantum number on the right side.
    pub l_p: u32,

    /// The 1-based atom type on the left side.
    pub atom_type: usize,

    /// The 1-based atom type on the right side.
    pub atom_type_p: usize,

    /// Boolean indicating if the coefficients are spherically averaged.
    pub sphavg: bool,

    /// Boolean indicating if the element couples a site with itself.
    pub onsite: bool,

    /// Boolean indicating if the coefficients are resolved by k-point.
    pub kresolved: bool,

    /// The 1-based index of the energy contour.
    pub contour: usize,

    /// The number of local orbitals involved.
    pub n_lo: usize,

    /// The inter-site displacement in Å.
    pub atom_diff: Vector3<f64>,

    /// The 1-based atom index on the left side, if the container stores it.
    pub atom: Option<usize>,

    /// The 1-based atom index on the right side, if the container stores it.
    pub atom_p: Option<usize>,
}

impl ElementHeader {
    /// Reads a header from the group of one element.
    ///
    /// # Arguments
    ///
    /// * `group` - The group `/<element group>/element-<k>`.
    /// * `version` - The format version of the container.
    pub fn from_group<C: Container + ?Sized>(
        group: &GroupHandle<'_, C>,
        version: i64,
    ) -> GreensfResult<Self> {
        let atom_diff_bohr = group.get_f64_vec("atomDiff")?;
        if atom_diff_bohr.len() != 3 {
            return Err(GreensfError::Malformed(format!(
                "`{}@atomDiff` has {} components",
                group.path(),
                atom_diff_bohr.len()
            )));
        }
        let atom_diff = Vector3::from_iterator(atom_diff_bohr.into_iter().map(|x| {
            let x = x * BOHR_TO_ANGSTROM;
            if x.abs() < ZERO_DISPLACEMENT_THRESHOLD {
                0.0
            } else {
                x
            }
        }));

        let (atom, atom_p) = if version >= ROTATION_VERSION {
            (
                optional_index(group, "atom")?,
                optional_index(group, "atomp")?,
            )
        } else {
            (None, None)
        };

        Ok(Self {
            l: to_unsigned(group, "l")?,
            l_p: to_unsigned(group, "lp")?,
            atom_type: to_unsigned(group, "atomType")?,
            atom_type_p: to_unsigned(group, "atomTypep")?,
            sphavg: group.get_bool("l_sphavg")?,
            onsite: group.get_bool("l_onsite")?,
            kresolved: group.get_bool_or("l_kresolved", false)?,
            contour: to_unsigned(group, "iContour")?,
            n_lo: to_unsigned(group, "numLOs")?,
            atom_diff,
            atom,
            atom_p,
        })
    }

    /// Returns the storage kind. k-resolved storage takes precedence over spherical averaging.
    pub fn kind(&self) -> StorageKind {
        if self.kresolved {
            StorageKind::KResolved
        } else if self.sphavg {
            StorageKind::SphericalAverage
        } else {
            StorageKind::Radial
        }
    }

    /// Returns the inter-site distance in Å.
    pub fn distance(&self) -> f64 {
        self.atom_diff.norm()
    }
}

fn to_unsigned<C, T>(group: &GroupHandle<'_, C>, name: &str) -> GreensfResult<T>
where
    C: Container + ?Sized,
    T: TryFrom<i64>,
{
    let value = group.get_i64(name)?;
    T::try_from(value).map_err(|_| {
        GreensfError::Malformed(format!(
            "`{}@{name}` = {value} is not a valid non-negative integer",
            group.path()
        ))
    })
}

fn optional_index<C: Container + ?Sized>(
    group: &GroupHandle<'_, C>,
    name: &str,
) -> GreensfResult<Option<usize>> {
    if group.optional_attribute(name)?.is_some() {
        to_unsigned(group, name).map(Some)
    } else {
        Ok(None)
    }
}

// =======
// Catalog
// =======

/// Locates the group holding the Green's-function elements.
pub(crate) fn element_group_path<C: Container + ?Sized>(container: &C) -> GreensfResult<String> {
    ELEMENT_GROUP_NAMES
        .iter()
        .map(|name| format!("/{name}"))
        .find(|path| container.contains_group(path))
        .ok_or_else(|| GreensfError::NotFound(format!("/{}", ELEMENT_GROUP_NAMES.join(" | /"))))
}

/// Returns the path of the group of the `index`-th element (0-based).
pub(crate) fn element_path(group_path: &str, index: usize) -> String {
    format!("{group_path}/element-{}", index + 1)
}

/// Counts the stored elements, from `NumElements` or else from the `element-<k>` members.
fn count_elements<C: Container + ?Sized>(
    container: &C,
    group_path: &str,
) -> GreensfResult<usize> {
    let group = container.group(group_path)?;
    match group.optional_attribute("NumElements")? {
        Some(_) => to_unsigned(&group, "NumElements"),
        None => Ok(group
            .member_names()?
            .iter()
            .filter(|name| name.starts_with("element-"))
            .count()),
    }
}

/// Lists the headers of all Green's-function elements stored in a container.
///
/// # Arguments
///
/// * `container` - The container to read.
/// * `show` - Boolean indicating if the catalog is to be written to the output log.
///
/// # Returns
///
/// The element headers in catalog order. The `k`-th entry corresponds to the on-disk group
/// `element-<k+1>`.
pub fn list_elements<C: Container + ?Sized>(
    container: &C,
    show: bool,
) -> GreensfResult<Vec<ElementHeader>> {
    let version = container.version()?;
    let group_path = element_group_path(container)?;
    let n_elements = count_elements(container, &group_path)?;
    let elements = (0..n_elements)
        .map(|index| {
            let group = container.group(&element_path(&group_path, index))?;
            ElementHeader::from_group(&group, version)
        })
        .collect::<GreensfResult<Vec<_>>>()?;
    log::debug!("Found {} Green's-function elements in {group_path}.", elements.len());
    if show {
        log_element_table(&elements, None);
    }
    Ok(elements)
}

/// Writes a table of element headers to the output log.
///
/// # Arguments
///
/// * `elements` - The element headers in catalog order.
/// * `indices` - The 0-based indices to show, or `None` for all.
pub(crate) fn log_element_table(elements: &[ElementHeader], indices: Option<&[usize]>) {
    let all = (0..elements.len()).collect::<Vec<_>>();
    let indices = indices.unwrap_or(&all);
    log_subtitle("Green's-function elements");
    greensf_output!("");
    greensf_output!("{}", table_rule(96));
    greensf_output!(
        "{:>5} {:>3} {:>3} {:>5} {:>6} {:>7} {:>7} {:>5} {:>7} {:>4}  {:<30}",
        "#",
        "l",
        "l'",
        "type",
        "type'",
        "sphavg",
        "onsite",
        "k",
        "contour",
        "nLO",
        "atom_diff / Å"
    );
    greensf_output!("{}", table_rule(96));
    for &index in indices.iter() {
        if let Some(element) = elements.get(index) {
            greensf_output!("{:>5} {}", index + 1, element);
        }
    }
    greensf_output!("{}", table_rule(96));
    greensf_output!("");
}

impl fmt::Display for ElementHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = |l: u32| {
            ANGMOM_LABELS
                .get(l as usize)
                .map(|s| s.to_string())
                .unwrap_or_else(|| l.to_string())
        };
        write!(
            f,
            "{:>3} {:>3} {:>5} {:>6} {:>7} {:>7} {:>5} {:>7} {:>4}  [{:+.6}, {:+.6}, {:+.6}]",
            label(self.l),
            label(self.l_p),
            self.atom_type,
            self.atom_type_p,
            self.sphavg,
            self.onsite,
            self.kresolved,
            self.contour,
            self.n_lo,
            self.atom_diff[0],
            self.atom_diff[1],
            self.atom_diff[2],
        )
    }
}
