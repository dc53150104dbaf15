//! Read-only access to the versioned Green's-function container.
//!
//! A container is a tree of groups and datasets addressed by absolute, slash-separated paths.
//! Groups and datasets carry attributes, which are small scalars or one-dimensional arrays.
//! Datasets are materialised as dense [`ArrayD<f64>`] arrays; complex data are kept with a
//! trailing real/imaginary axis of length two, exactly as they are stored.

use std::fmt;

use indexmap::IndexMap;
use ndarray::ArrayD;
use serde::{Deserialize, Serialize};

use crate::auxiliary::error::{GreensfError, GreensfResult};

#[cfg(feature = "hdf5")]
pub mod hdf5;
pub mod memory;


// ==================
// Attribute values
// ==================

/// An enumerated type for the values an attribute can hold.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum AttributeValue {
    /// A scalar integer.
    Integer(i64),

    /// A scalar float.
    Float(f64),

    /// A text value. Byte strings are decoded to text on read.
    Text(String),

    /// A one-dimensional integer array.
    IntegerArray(Vec<i64>),

    /// A one-dimensional float array.
    FloatArray(Vec<f64>),

    /// A one-dimensional text array.
    TextArray(Vec<String>),
}

impl AttributeValue {
    /// Returns the value as an integer. Length-one arrays are unpacked.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            AttributeValue::Integer(i) => Some(*i),
            AttributeValue::IntegerArray(v) if v.len() == 1 => Some(v[0]),
            _ => None,
        }
    }

    /// Returns the value as a float. Integers are widened and length-one arrays are unpacked.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AttributeValue::Float(x) => Some(*x),
            AttributeValue::FloatArray(v) if v.len() == 1 => Some(v[0]),
            _ => self.as_i64().map(|i| i as f64),
        }
    }

    /// Returns the value as a boolean. Only the integers 0 and 1 are accepted.
    pub fn as_bool(&self) -> Option<bool> {
        match self.as_i64() {
            Some(0) => Some(false),
            Some(1) => Some(true),
            _ => None,
        }
    }

    /// Returns the value as text. Length-one text arrays are unpacked.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            AttributeValue::Text(s) => Some(s.as_str()),
            AttributeValue::TextArray(v) if v.len() == 1 => Some(v[0].as_str()),
            _ => None,
        }
    }

    /// Returns the value as a vector of integers. Scalars are wrapped.
    pub fn as_i64_vec(&self) -> Option<Vec<i64>> {
        match self {
            AttributeValue::Integer(i) => Some(vec![*i]),
            AttributeValue::IntegerArray(v) => Some(v.clone()),
            _ => None,
        }
    }

    /// Returns the value as a vector of floats. Integers are widened and scalars are wrapped.
    pub fn as_f64_vec(&self) -> Option<Vec<f64>> {
        match self {
            AttributeValue::Float(x) => Some(vec![*x]),
            AttributeValue::FloatArray(v) => Some(v.clone()),
            _ => self
                .as_i64_vec()
                .map(|v| v.into_iter().map(|i| i as f64).collect()),
        }
    }

    /// Returns the value as a vector of strings. Scalars are wrapped.
    pub fn as_text_vec(&self) -> Option<Vec<String>> {
        match self {
            AttributeValue::Text(s) => Some(vec![s.clone()]),
            AttributeValue::TextArray(v) => Some(v.clone()),
            _ => None,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            AttributeValue::Integer(_) => "integer",
            AttributeValue::Float(_) => "float",
            AttributeValue::Text(_) => "text",
            AttributeValue::IntegerArray(_) => "integer array",
            AttributeValue::FloatArray(_) => "float array",
            AttributeValue::TextArray(_) => "text array",
        }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::Integer(i) => write!(f, "{i}"),
            AttributeValue::Float(x) => write!(f, "{x}"),
            AttributeValue::Text(s) => write!(f, "{s}"),
            AttributeValue::IntegerArray(v) => write!(f, "{v:?}"),
            AttributeValue::FloatArray(v) => write!(f, "{v:?}"),
            AttributeValue::TextArray(v) => write!(f, "{v:?}"),
        }
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        AttributeValue::Integer(value)
    }
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        AttributeValue::Integer(i64::from(value))
    }
}

impl From<f64> for AttributeValue {
    fn from(value: f64) -> Self {
        AttributeValue::Float(value)
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        AttributeValue::Text(value.to_string())
    }
}

impl From<Vec<i64>> for AttributeValue {
    fn from(value: Vec<i64>) -> Self {
        AttributeValue::IntegerArray(value)
    }
}

impl From<Vec<f64>> for AttributeValue {
    fn from(value: Vec<f64>) -> Self {
        AttributeValue::FloatArray(value)
    }
}

impl From<Vec<String>> for AttributeValue {
    fn from(value: Vec<String>) -> Self {
        AttributeValue::TextArray(value)
    }
}

/// Attributes of a group or a dataset, in storage order.
pub type Attributes = IndexMap<String, AttributeValue>;

// =================
// Trait definitions
// =================

/// Trait for read-only, path-addressed access to a Green's-function container.
///
/// Paths are absolute and slash-separated, *e.g.* `/GreensFunctionElements/element-1/sphavg`.
/// Implementors only provide the primitive accessors; handles, optional look-ups and version
/// checks are derived from them.
pub trait Container {
    /// Checks if a group exists at `path`.
    fn contains_group(&self, path: &str) -> bool;

    /// Checks if a dataset exists at `path`.
    fn contains_dataset(&self, path: &str) -> bool;

    /// Returns the attributes of the group at `path`.
    fn read_group_attributes(&self, path: &str) -> GreensfResult<Attributes>;

    /// Returns the names of the direct members (groups and datasets) of the group at `path`.
    fn read_member_names(&self, path: &str) -> GreensfResult<Vec<String>>;

    /// Materialises the dataset at `path` as a dense array of floats.
    fn read_dataset(&self, path: &str) -> GreensfResult<ArrayD<f64>>;

    /// Returns the attributes of the dataset at `path`.
    fn read_dataset_attributes(&self, path: &str) -> GreensfResult<Attributes>;

    /// Returns a handle to the group at `path`.
    ///
    /// # Errors
    ///
    /// Errors with [`GreensfError::NotFound`] if there is no group at `path`.
    fn group(&self, path: &str) -> GreensfResult<GroupHandle<'_, Self>> {
        self.optional_group(path)
            .ok_or_else(|| GreensfError::NotFound(normalise_path(path)))
    }

    /// Returns a handle to the group at `path`, or `None` if it is absent.
    fn optional_group(&self, path: &str) -> Option<GroupHandle<'_, Self>> {
        if self.contains_group(path) {
            Some(GroupHandle {
                container: self,
                path: normalise_path(path),
            })
        } else {
            None
        }
    }

    /// Returns a handle to the dataset at `path`.
    ///
    /// # Errors
    ///
    /// Errors with [`GreensfError::NotFound`] if there is no dataset at `path`.
    fn dataset(&self, path: &str) -> GreensfResult<DatasetHandle<'_, Self>> {
        self.optional_dataset(path)
            .ok_or_else(|| GreensfError::NotFound(normalise_path(path)))
    }

    /// Returns a handle to the dataset at `path`, or `None` if it is absent.
    fn optional_dataset(&self, path: &str) -> Option<DatasetHandle<'_, Self>> {
        if self.contains_dataset(path) {
            Some(DatasetHandle {
                container: self,
                path: normalise_path(path),
            })
        } else {
            None
        }
    }

    /// Returns the format version stamped on `/meta`.
    fn version(&self) -> GreensfResult<i64> {
        self.group("/meta")?.get_i64("version")
    }

    /// Ensures the format version is at least `min`.
    ///
    /// # Errors
    ///
    /// Errors with [`GreensfError::BadVersion`] if the version is lower.
    fn require_version(&self, min: i64) -> GreensfResult<i64> {
        let got = self.version()?;
        if got < min {
            Err(GreensfError::BadVersion { got, min })
        } else {
            Ok(got)
        }
    }
}

/// Normalises a path to its absolute form without trailing slashes.
pub(crate) fn normalise_path(path: &str) -> String {
    let parts = path
        .split('/')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>();
    format!("/{}", parts.join("/"))
}

/// Joins a child name onto a parent path.
pub(crate) fn join_path(parent: &str, child: &str) -> String {
    normalise_path(&format!("{parent}/{child}"))
}

// =======
// Handles
// =======

fn typed_attribute<T>(
    path: &str,
    name: &str,
    value: &AttributeValue,
    convert: impl Fn(&AttributeValue) -> Option<T>,
    expected: &str,
) -> GreensfResult<T> {
    convert(value).ok_or_else(|| {
        GreensfError::Malformed(format!(
            "attribute `{name}` of `{path}` holds {} `{value}`, expected {expected}",
            value.kind()
        ))
    })
}

macro_rules! attribute_getters {
    () => {
        /// Returns the attribute called `name`.
        ///
        /// # Errors
        ///
        /// Errors with [`GreensfError::NotFound`] if the attribute is absent.
        pub fn attribute(&self, name: &str) -> GreensfResult<AttributeValue> {
            self.optional_attribute(name)?
                .ok_or_else(|| GreensfError::NotFound(format!("{}@{name}", self.path)))
        }

        /// Returns the attribute called `name`, or `None` if it is absent.
        pub fn optional_attribute(&self, name: &str) -> GreensfResult<Option<AttributeValue>> {
            Ok(self.attributes()?.shift_remove(name))
        }

        /// Returns an integer attribute.
        pub fn get_i64(&self, name: &str) -> GreensfResult<i64> {
            typed_attribute(&self.path, name, &self.attribute(name)?, AttributeValue::as_i64, "an integer")
        }

        /// Returns a float attribute.
        pub fn get_f64(&self, name: &str) -> GreensfResult<f64> {
            typed_attribute(&self.path, name, &self.attribute(name)?, AttributeValue::as_f64, "a float")
        }

        /// Returns a boolean attribute stored as the integer 0 or 1.
        pub fn get_bool(&self, name: &str) -> GreensfResult<bool> {
            typed_attribute(&self.path, name, &self.attribute(name)?, AttributeValue::as_bool, "a boolean")
        }

        /// Returns a boolean attribute, or `default` if it is absent.
        pub fn get_bool_or(&self, name: &str, default: bool) -> GreensfResult<bool> {
            match self.optional_attribute(name)? {
                Some(value) => typed_attribute(&self.path, name, &value, AttributeValue::as_bool, "a boolean"),
                None => Ok(default),
            }
        }

        /// Returns a text attribute.
        pub fn get_text(&self, name: &str) -> GreensfResult<String> {
            typed_attribute(
                &self.path,
                name,
                &self.attribute(name)?,
                |value| value.as_text().map(str::to_string),
                "text",
            )
        }

        /// Returns an integer-array attribute.
        pub fn get_i64_vec(&self, name: &str) -> GreensfResult<Vec<i64>> {
            typed_attribute(&self.path, name, &self.attribute(name)?, AttributeValue::as_i64_vec, "integers")
        }

        /// Returns a float-array attribute.
        pub fn get_f64_vec(&self, name: &str) -> GreensfResult<Vec<f64>> {
            typed_attribute(&self.path, name, &self.attribute(name)?, AttributeValue::as_f64_vec, "floats")
        }

        /// Returns the absolute path of the object.
        pub fn path(&self) -> &str {
            &self.path
        }
    };
}

/// A handle to a group of a [`Container`].
pub struct GroupHandle<'a, C: Container + ?Sized> {
    container: &'a C,
    path: String,
}

impl<'a, C: Container + ?Sized> GroupHandle<'a, C> {
    /// Returns all attributes of the group.
    pub fn attributes(&self) -> GreensfResult<Attributes> {
        self.container.read_group_attributes(&self.path)
    }

    /// Returns the names of the direct members of the group.
    pub fn member_names(&self) -> GreensfResult<Vec<String>> {
        self.container.read_member_names(&self.path)
    }

    /// Returns a handle to a child group.
    pub fn group(&self, name: &str) -> GreensfResult<GroupHandle<'a, C>> {
        self.container.group(&join_path(&self.path, name))
    }

    /// Returns a handle to a child group, or `None` if it is absent.
    pub fn optional_group(&self, name: &str) -> Option<GroupHandle<'a, C>> {
        self.container.optional_group(&join_path(&self.path, name))
    }

    /// Returns a handle to a child dataset.
    pub fn dataset(&self, name: &str) -> GreensfResult<DatasetHandle<'a, C>> {
        self.container.dataset(&join_path(&self.path, name))
    }

    /// Returns a handle to a child dataset, or `None` if it is absent.
    pub fn optional_dataset(&self, name: &str) -> Option<DatasetHandle<'a, C>> {
        self.container.optional_dataset(&join_path(&self.path, name))
    }

    attribute_getters!();
}

/// A handle to a dataset of a [`Container`].
pub struct DatasetHandle<'a, C: Container + ?Sized> {
    container: &'a C,
    path: String,
}

impl<'a, C: Container + ?Sized> DatasetHandle<'a, C> {
    /// Materialises the dataset into memory.
    pub fn read(&self) -> GreensfResult<ArrayD<f64>> {
        self.container.read_dataset(&self.path)
    }

    /// Returns all attributes of the dataset.
    pub fn attributes(&self) -> GreensfResult<Attributes> {
        self.container.read_dataset_attributes(&self.path)
    }

    attribute_getters!();
}
