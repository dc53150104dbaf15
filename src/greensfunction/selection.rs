//! Selection of Green's-function elements by header fields.

use std::fmt;

use indexmap::IndexMap;
use nalgebra::Vector3;
use ndarray::arr1;
use serde::{Deserialize, Serialize};

use crate::angmom::ANGMOM_INDICES;
use crate::auxiliary::error::{GreensfError, GreensfResult};
use crate::auxiliary::misc::allclose;
use crate::greensfunction::element::{log_element_table, ElementHeader};
use crate::greensfunction::GreensFunction;

#[cfg(test)]
#[path = "selection_tests.rs"]
mod selection_tests;

/// An enumerated type for the header fields usable in a selection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ElementField {
    L,
    LP,
    AtomType,
    AtomTypeP,
    Sphavg,
    Onsite,
    KResolved,
    Contour,
    NLO,
    AtomDiff,
    Atom,
    AtomP,
}

impl ElementField {
    /// Parses a field name. The on-disk attribute names are accepted as aliases.
    ///
    /// # Errors
    ///
    /// Errors with [`GreensfError::BadField`] for unknown names.
    pub fn parse(name: &str) -> GreensfResult<Self> {
        let field = match name {
            "l" => ElementField::L,
            "l_p" | "lp" => ElementField::LP,
            "atom_type" | "atomType" => ElementField::AtomType,
            "atom_type_p" | "atomTypep" => ElementField::AtomTypeP,
            "sphavg" | "l_sphavg" => ElementField::Sphavg,
            "onsite" | "l_onsite" => ElementField::Onsite,
            "kresolved" | "l_kresolved" => ElementField::KResolved,
            "contour" | "iContour" => ElementField::Contour,
            "n_lo" | "nLO" | "numLOs" => ElementField::NLO,
            "atom_diff" | "atomDiff" => ElementField::AtomDiff,
            "atom" => ElementField::Atom,
            "atom_p" | "atomp" => ElementField::AtomP,
            _ => return Err(GreensfError::BadField(name.to_string())),
        };
        Ok(field)
    }
}

impl fmt::Display for ElementField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ElementField::L => "l",
            ElementField::LP => "l_p",
            ElementField::AtomType => "atom_type",
            ElementField::AtomTypeP => "atom_type_p",
            ElementField::Sphavg => "sphavg",
            ElementField::Onsite => "onsite",
            ElementField::KResolved => "kresolved",
            ElementField::Contour => "contour",
            ElementField::NLO => "n_lo",
            ElementField::AtomDiff => "atom_diff",
            ElementField::Atom => "atom",
            ElementField::AtomP => "atom_p",
        };
        write!(f, "{name}")
    }
}

/// An enumerated type for the values a field is compared against.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum FieldValue {
    /// An integer, compared exactly.
    Integer(i64),

    /// A boolean, compared exactly.
    Bool(bool),

    /// A vector, compared with `allclose`.
    Vector([f64; 3]),

    /// A text value; angular momenta may be given by their letters.
    Text(String),
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Integer(value)
    }
}

impl From<i32> for FieldValue {
    fn from(value: i32) -> Self {
        FieldValue::Integer(i64::from(value))
    }
}

impl From<u32> for FieldValue {
    fn from(value: u32) -> Self {
        FieldValue::Integer(i64::from(value))
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Bool(value)
    }
}

impl From<[f64; 3]> for FieldValue {
    fn from(value: [f64; 3]) -> Self {
        FieldValue::Vector(value)
    }
}

impl From<Vector3<f64>> for FieldValue {
    fn from(value: Vector3<f64>) -> Self {
        FieldValue::Vector([value[0], value[1], value[2]])
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Integer(i) => write!(f, "{i}"),
            FieldValue::Bool(b) => write!(f, "{b}"),
            FieldValue::Vector(v) => write!(f, "[{}, {}, {}]", v[0], v[1], v[2]),
            FieldValue::Text(s) => write!(f, "{s}"),
        }
    }
}

/// A set of field constraints, all of which must hold for an element to be selected.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ElementSelection {
    constraints: IndexMap<String, FieldValue>,
}

impl ElementSelection {
    /// Creates an empty selection, which matches every element.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a constraint `field == value`. Field names are validated when the selection is
    /// applied.
    pub fn with<V: Into<FieldValue>>(mut self, field: &str, value: V) -> Self {
        self.constraints.insert(field.to_string(), value.into());
        self
    }

    /// Checks if the selection has no constraints.
    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }

    /// Checks if an element satisfies every constraint.
    ///
    /// # Errors
    ///
    /// Errors with [`GreensfError::BadField`] if a field is unknown or its value has the wrong
    /// kind for the field.
    pub fn matches(&self, element: &ElementHeader) -> GreensfResult<bool> {
        matches_all(&self.parsed_constraints()?, element)
    }

    /// Parses the field name of every constraint.
    fn parsed_constraints(&self) -> GreensfResult<Vec<(ElementField, &FieldValue)>> {
        self.constraints
            .iter()
            .map(|(name, value)| Ok((ElementField::parse(name)?, value)))
            .collect()
    }
}

impl fmt::Display for ElementSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.constraints.is_empty() {
            write!(f, "(all elements)")
        } else {
            let parts = self
                .constraints
                .iter()
                .map(|(name, value)| format!("{name} = {value}"))
                .collect::<Vec<_>>();
            write!(f, "{}", parts.join(", "))
        }
    }
}

fn bad_value(field: ElementField, value: &FieldValue) -> GreensfError {
    GreensfError::BadField(format!("{field} (unexpected value `{value}`)"))
}

fn expect_integer(field: ElementField, value: &FieldValue) -> GreensfResult<i64> {
    match value {
        FieldValue::Integer(i) => Ok(*i),
        _ => Err(bad_value(field, value)),
    }
}

fn expect_angmom(field: ElementField, value: &FieldValue) -> GreensfResult<i64> {
    match value {
        FieldValue::Integer(i) => Ok(*i),
        FieldValue::Text(s) => ANGMOM_INDICES
            .get(s.to_uppercase().as_str())
            .map(|&l| i64::from(l))
            .ok_or_else(|| bad_value(field, value)),
        _ => Err(bad_value(field, value)),
    }
}

fn expect_bool(field: ElementField, value: &FieldValue) -> GreensfResult<bool> {
    match value {
        FieldValue::Bool(b) => Ok(*b),
        FieldValue::Integer(0) => Ok(false),
        FieldValue::Integer(1) => Ok(true),
        _ => Err(bad_value(field, value)),
    }
}

fn field_matches(
    field: ElementField,
    value: &FieldValue,
    element: &ElementHeader,
) -> GreensfResult<bool> {
    let as_i64 = |x: usize| i64::try_from(x).unwrap_or(i64::MAX);
    let matched = match field {
        ElementField::L => expect_angmom(field, value)? == i64::from(element.l),
        ElementField::LP => expect_angmom(field, value)? == i64::from(element.l_p),
        ElementField::AtomType => expect_integer(field, value)? == as_i64(element.atom_type),
        ElementField::AtomTypeP => expect_integer(field, value)? == as_i64(element.atom_type_p),
        ElementField::Sphavg => expect_bool(field, value)? == element.sphavg,
        ElementField::Onsite => expect_bool(field, value)? == element.onsite,
        ElementField::KResolved => expect_bool(field, value)? == element.kresolved,
        ElementField::Contour => expect_integer(field, value)? == as_i64(element.contour),
        ElementField::NLO => expect_integer(field, value)? == as_i64(element.n_lo),
        ElementField::Atom => element.atom.map(as_i64) == Some(expect_integer(field, value)?),
        ElementField::AtomP => element.atom_p.map(as_i64) == Some(expect_integer(field, value)?),
        ElementField::AtomDiff => match value {
            FieldValue::Vector(v) => allclose(
                &arr1(element.atom_diff.as_slice()),
                &arr1(v.as_slice()),
            ),
            _ => return Err(bad_value(field, value)),
        },
    };
    Ok(matched)
}

fn matches_all(
    constraints: &[(ElementField, &FieldValue)],
    element: &ElementHeader,
) -> GreensfResult<bool> {
    for &(field, value) in constraints.iter() {
        if !field_matches(field, value, element)? {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Selects elements of a catalog.
///
/// # Arguments
///
/// * `elements` - The element headers in catalog order.
/// * `selection` - The constraints to satisfy.
/// * `show` - Boolean indicating if the selected elements are to be written to the output log.
///
/// # Returns
///
/// The 0-based catalog indices of all matching elements, in catalog order.
///
/// # Errors
///
/// Errors with [`GreensfError::BadField`] if the selection refers to an unknown field, even for an
/// empty catalog.
pub fn select_element_indices(
    elements: &[ElementHeader],
    selection: &ElementSelection,
    show: bool,
) -> GreensfResult<Vec<usize>> {
    let constraints = selection.parsed_constraints()?;
    let mut indices = Vec::new();
    for (index, element) in elements.iter().enumerate() {
        if matches_all(&constraints, element)? {
            indices.push(index);
        }
    }
    if show {
        log_element_table(elements, Some(&indices));
    }
    Ok(indices)
}

/// Selects loaded Green's functions by their element headers.
///
/// # Arguments
///
/// * `greens_functions` - The loaded Green's functions.
/// * `selection` - The constraints to satisfy.
/// * `show` - Boolean indicating if the selected elements are to be written to the output log.
///
/// # Returns
///
/// An iterator over the matching Green's functions, in their original order.
pub fn select_elements<'a>(
    greens_functions: &'a [GreensFunction],
    selection: &ElementSelection,
    show: bool,
) -> GreensfResult<impl Iterator<Item = &'a GreensFunction>> {
    let elements = greens_functions
        .iter()
        .map(|gf| gf.element().clone())
        .collect::<Vec<_>>();
    let indices = select_element_indices(&elements, selection, show)?;
    Ok(indices.into_iter().map(move |index| &greens_functions[index]))
}
