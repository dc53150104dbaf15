//! HDF5-backed container.

use std::path::Path;

use hdf5::types::{FixedAscii, FixedUnicode, TypeDescriptor, VarLenAscii, VarLenUnicode};
use hdf5::{self, Location};
use log;
use ndarray::ArrayD;

use crate::auxiliary::error::{GreensfError, GreensfResult};
use crate::container::{normalise_path, AttributeValue, Attributes, Container};

#[cfg(test)]
#[path = "hdf5_tests.rs"]
mod hdf5_tests;

/// Length of the buffer used to read fixed-length string attributes.
const FIXED_STRING_BUFFER: usize = 512;

/// A [`Container`] backed by an HDF5 file opened read-only.
///
/// The underlying file is closed when this structure is dropped.
pub struct Hdf5Container {
    file: hdf5::File,
}

impl Hdf5Container {
    /// Opens an HDF5 file read-only.
    pub fn open<P: AsRef<Path>>(path: P) -> GreensfResult<Self> {
        let file = hdf5::File::open(path.as_ref())?;
        log::debug!("Opened HDF5 container {}.", path.as_ref().display());
        Ok(Self { file })
    }

    fn read_attributes(location: &Location) -> GreensfResult<Attributes> {
        location
            .attr_names()?
            .into_iter()
            .map(|name| {
                let value = Self::read_attribute(&location.attr(&name)?)?;
                Ok((name, value))
            })
            .collect()
    }

    fn read_attribute(attr: &hdf5::Attribute) -> GreensfResult<AttributeValue> {
        let scalar = attr.ndim() == 0;
        let descriptor = attr.dtype()?.to_descriptor()?;
        let value = match descriptor {
            TypeDescriptor::Integer(_) | TypeDescriptor::Unsigned(_) => {
                let values = attr.read_raw::<i64>()?;
                if scalar {
                    AttributeValue::Integer(values[0])
                } else {
                    AttributeValue::IntegerArray(values)
                }
            }
            TypeDescriptor::Boolean => {
                let values = attr
                    .read_raw::<bool>()?
                    .into_iter()
                    .map(i64::from)
                    .collect::<Vec<_>>();
                if scalar {
                    AttributeValue::Integer(values[0])
                } else {
                    AttributeValue::IntegerArray(values)
                }
            }
            TypeDescriptor::Float(_) => {
                let values = attr.read_raw::<f64>()?;
                if scalar {
                    AttributeValue::Float(values[0])
                } else {
                    AttributeValue::FloatArray(values)
                }
            }
            TypeDescriptor::FixedAscii(_) => {
                let values = attr
                    .read_raw::<FixedAscii<FIXED_STRING_BUFFER>>()?
                    .iter()
                    .map(|s| s.as_str().trim_end_matches('\0').trim_end().to_string())
                    .collect::<Vec<_>>();
                Self::text_value(values, scalar)
            }
            TypeDescriptor::FixedUnicode(_) => {
                let values = attr
                    .read_raw::<FixedUnicode<FIXED_STRING_BUFFER>>()?
                    .iter()
                    .map(|s| s.as_str().trim_end_matches('\0').trim_end().to_string())
                    .collect::<Vec<_>>();
                Self::text_value(values, scalar)
            }
            TypeDescriptor::VarLenAscii => {
                let values = attr
                    .read_raw::<VarLenAscii>()?
                    .iter()
                    .map(|s| s.as_str().to_string())
                    .collect::<Vec<_>>();
                Self::text_value(values, scalar)
            }
            TypeDescriptor::VarLenUnicode => {
                let values = attr
                    .read_raw::<VarLenUnicode>()?
                    .iter()
                    .map(|s| s.as_str().to_string())
                    .collect::<Vec<_>>();
                Self::text_value(values, scalar)
            }
            other => {
                return Err(GreensfError::Malformed(format!(
                    "unsupported attribute type `{other:?}` of `{}`",
                    attr.name()
                )))
            }
        };
        Ok(value)
    }

    fn text_value(mut values: Vec<String>, scalar: bool) -> AttributeValue {
        if scalar && values.len() == 1 {
            AttributeValue::Text(values.remove(0))
        } else {
            AttributeValue::TextArray(values)
        }
    }
}

impl Container for Hdf5Container {
    fn contains_group(&self, path: &str) -> bool {
        let path = normalise_path(path);
        path == "/" || (self.file.link_exists(&path) && self.file.group(&path).is_ok())
    }

    fn contains_dataset(&self, path: &str) -> bool {
        let path = normalise_path(path);
        self.file.link_exists(&path) && self.file.dataset(&path).is_ok()
    }

    fn read_group_attributes(&self, path: &str) -> GreensfResult<Attributes> {
        let group = self.file.group(&normalise_path(path))?;
        Self::read_attributes(&group)
    }

    fn read_member_names(&self, path: &str) -> GreensfResult<Vec<String>> {
        Ok(self.file.group(&normalise_path(path))?.member_names()?)
    }

    fn read_dataset(&self, path: &str) -> GreensfResult<ArrayD<f64>> {
        Ok(self
            .file
            .dataset(&normalise_path(path))?
            .read_dyn::<f64>()?)
    }

    fn read_dataset_attributes(&self, path: &str) -> GreensfResult<Attributes> {
        let dataset = self.file.dataset(&normalise_path(path))?;
        Self::read_attributes(&dataset)
    }
}
