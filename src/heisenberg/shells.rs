//! Shells of inter-site elements around a reference atom.

use std::fmt;

use itertools::Itertools;
use ndarray::Array1;
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

use crate::auxiliary::constants::SHELL_DISTANCE_DECIMALS;
use crate::auxiliary::error::GreensfResult;
use crate::auxiliary::misc::{allclose, RoundableFloat};
use crate::container::Container;
use crate::greensfunction::element::{list_elements, ElementHeader};
use crate::greensfunction::GreensFunction;
use crate::io::format::{greensf_output, log_subtitle, table_rule};

#[cfg(test)]
#[path = "shells_tests.rs"]
mod shells_tests;

/// One inter-site pair of a shell: the shell distance in Å, $`G_{ij}`$ and $`G_{ji}`$.
pub type ShellPair = (f64, GreensFunction, GreensFunction);

/// A group of compatible inter-site element pairs at the same distance from a reference atom.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Shell {
    /// The inter-site distance in Å, rounded to [`SHELL_DISTANCE_DECIMALS`] decimal places.
    pub distance: f64,

    /// The 0-based catalog indices `(i, j)` of the elements $`G_{ij}`$ and $`G_{ji}`$.
    pub pairs: Vec<(usize, usize)>,
}

impl fmt::Display for Shell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "R = {:.6} Å: {}",
            self.distance,
            self.pairs
                .iter()
                .map(|(i, j)| format!("({}, {})", i + 1, j + 1))
                .join(", ")
        )
    }
}

/// Checks if `e_ji` is the reverse of `e_ij`.
fn is_reverse(e_ij: &ElementHeader, e_ji: &ElementHeader) -> bool {
    let sum = e_ij.atom_diff + e_ji.atom_diff;
    e_ij.contour == e_ji.contour
        && e_ij.atom_type == e_ji.atom_type_p
        && e_ij.atom_type_p == e_ji.atom_type
        && e_ij.l == e_ji.l
        && e_ij.l_p == e_ji.l_p
        && allclose(&Array1::from_iter(sum.iter().copied()), &Array1::zeros(3))
}

/// Groups the elements of a catalog into shells around a reference atom.
///
/// Distances are rounded to [`SHELL_DISTANCE_DECIMALS`] decimal places and sorted stably, so
/// that pairs within a shell keep their catalog order. On-site elements are skipped.
///
/// # Arguments
///
/// * `elements` - The element headers in catalog order.
/// * `reference_atom` - The 1-based atom type at the centre of the shells.
/// * `max_shells` - The maximum number of non-empty shells to return.
///
/// # Returns
///
/// The non-empty shells in ascending order of distance.
pub fn find_shells(
    elements: &[ElementHeader],
    reference_atom: usize,
    max_shells: Option<usize>,
) -> Vec<Shell> {
    if max_shells == Some(0) {
        return Vec::new();
    }
    let distances = elements
        .iter()
        .map(|element| element.distance().round_decimals(SHELL_DISTANCE_DECIMALS))
        .collect_vec();
    let groups = (0..elements.len())
        .sorted_by_key(|&index| OrderedFloat(distances[index]))
        .group_by(|&index| OrderedFloat(distances[index]));

    let mut shells: Vec<Shell> = Vec::new();
    for (distance, group) in &groups {
        if distance.0 == 0.0 {
            continue;
        }
        let group = group.collect_vec();
        let mut pairs: Vec<(usize, usize)> = Vec::new();
        for &i in group.iter() {
            let e_ij = &elements[i];
            if e_ij.atom_type != reference_atom {
                continue;
            }
            let Some(&j) = group.iter().find(|&&j| is_reverse(e_ij, &elements[j])) else {
                log::debug!("Element {} has no reverse partner at R = {}.", i + 1, distance.0);
                continue;
            };
            if pairs.contains(&(j, i)) && e_ij.atom_type != e_ij.atom_type_p {
                continue;
            }
            pairs.push((i, j));
        }
        if pairs.is_empty() {
            continue;
        }
        shells.push(Shell {
            distance: distance.0,
            pairs,
        });
        if max_shells.is_some_and(|n| shells.len() >= n) {
            break;
        }
    }
    shells
}

/// Writes the shells to the output log.
pub(crate) fn log_shell_table(elements: &[ElementHeader], shells: &[Shell]) {
    log_subtitle("Inter-site shells");
    greensf_output!("");
    greensf_output!("{}", table_rule(58));
    greensf_output!(
        "{:>6} {:>12} {:>7} {:>7} {:>7} {:>7} {:>6}",
        "Shell",
        "R / Å",
        "G_ij",
        "G_ji",
        "type",
        "type'",
        "l"
    );
    greensf_output!("{}", table_rule(58));
    for (ishell, shell) in shells.iter().enumerate() {
        for &(i, j) in shell.pairs.iter() {
            let e_ij = &elements[i];
            greensf_output!(
                "{:>6} {:>12.6} {:>7} {:>7} {:>7} {:>7} {:>6}",
                ishell + 1,
                shell.distance,
                i + 1,
                j + 1,
                e_ij.atom_type,
                e_ij.atom_type_p,
                e_ij.l
            );
        }
    }
    greensf_output!("{}", table_rule(58));
    greensf_output!("");
}

fn flatten_pairs(shells: Vec<Shell>) -> Vec<(f64, usize, usize)> {
    shells
        .into_iter()
        .flat_map(|shell| {
            let distance = shell.distance;
            shell.pairs.into_iter().map(move |(i, j)| (distance, i, j))
        })
        .collect()
}

/// Iterates over the inter-site pairs of a container, shell by shell.
///
/// The catalog is read eagerly; the Green's functions of each pair are loaded only when the
/// iterator reaches it, so a loading error ends the iteration at that pair.
///
/// # Arguments
///
/// * `container` - The container to read.
/// * `reference_atom` - The 1-based atom type at the centre of the shells.
/// * `show` - Boolean indicating if the shells are to be written to the output log.
/// * `max_shells` - The maximum number of shells to consider.
pub fn intersite_shells_from_file<'a, C: Container + ?Sized>(
    container: &'a C,
    reference_atom: usize,
    show: bool,
    max_shells: Option<usize>,
) -> GreensfResult<impl Iterator<Item = GreensfResult<ShellPair>> + 'a> {
    let elements = list_elements(container, false)?;
    let shells = find_shells(&elements, reference_atom, max_shells);
    if show {
        log_shell_table(&elements, &shells);
    }
    let pairs = flatten_pairs(shells);
    Ok(pairs.into_iter().map(move |(distance, i, j)| {
        let gij = GreensFunction::load(container, i, &elements[i])?;
        let gji = GreensFunction::load(container, j, &elements[j])?;
        Ok((distance, gij, gji))
    }))
}

/// Iterates over the inter-site pairs among already loaded Green's functions, shell by shell.
///
/// Pair indices refer to positions in `greens_functions`, which need not form a complete
/// catalog. The yielded Green's functions are copies.
pub fn intersite_shells<'a>(
    greens_functions: &'a [GreensFunction],
    reference_atom: usize,
    show: bool,
    max_shells: Option<usize>,
) -> impl Iterator<Item = GreensfResult<ShellPair>> + 'a {
    let elements = greens_functions
        .iter()
        .map(|gf| gf.element().clone())
        .collect_vec();
    let shells = find_shells(&elements, reference_atom, max_shells);
    if show {
        log_shell_table(&elements, &shells);
    }
    flatten_pairs(shells).into_iter().map(move |(distance, i, j)| {
        Ok((
            distance,
            greens_functions[i].clone(),
            greens_functions[j].clone(),
        ))
    })
}
