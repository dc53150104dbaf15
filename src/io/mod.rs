//! File input and output for greensf parameters and exchange tables.
//!
//! Exchange tables are written with `bincode` to files whose compound extension names the kind of
//! table, *e.g.* `run.greensf.jij`. Driver parameters are read from and written to YAML files.

use std::ffi::OsString;
use std::fmt;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use anyhow::{self, Context};
use bincode;
use serde::{de::DeserializeOwned, Serialize};
use serde_yaml;

use crate::heisenberg::ExchangeMode;

pub(crate) mod format;


/// An enumerated type for the kinds of exchange table saved by greensf.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GreensfFileType {
    /// Scalar exchange constants $`J_{ij}`$.
    Jij,

    /// Exchange tensors $`J^{\alpha\beta}_{ij}`$, possibly with their decomposition.
    Tensor,
}

impl GreensfFileType {
    /// Returns the file type holding the tables produced in `mode`.
    pub fn for_mode(mode: ExchangeMode) -> Self {
        match mode {
            ExchangeMode::Scalar => GreensfFileType::Jij,
            ExchangeMode::Tensor => GreensfFileType::Tensor,
        }
    }

    /// Returns the extension of the file type.
    pub fn ext(&self) -> &'static str {
        match self {
            GreensfFileType::Jij => "greensf.jij",
            GreensfFileType::Tensor => "greensf.jten",
        }
    }

    /// Returns the path of a file of this type. The extension is appended to `name`, so that any
    /// dots already in `name` are kept.
    pub fn path<P: AsRef<Path>>(&self, name: P) -> PathBuf {
        let mut path = OsString::from(name.as_ref().as_os_str());
        path.push(".");
        path.push(self.ext());
        PathBuf::from(path)
    }
}

impl fmt::Display for GreensfFileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GreensfFileType::Jij => write!(f, "scalar exchange table"),
            GreensfFileType::Tensor => write!(f, "exchange-tensor table"),
        }
    }
}

/// Reads an exchange table saved by [`write_greensf_binary`].
///
/// # Arguments
///
/// * `name` - The name of the file without its greensf-specific extension.
/// * `file_type` - The kind of table stored in the file.
///
/// # Errors
///
/// Errors if the file cannot be opened or does not hold a structure of type `T`.
pub fn read_greensf_binary<T, P: AsRef<Path>>(
    name: P,
    file_type: GreensfFileType,
) -> Result<T, anyhow::Error>
where
    T: DeserializeOwned,
{
    let path = file_type.path(name);
    let mut reader = BufReader::new(
        File::open(&path)
            .with_context(|| format!("Unable to open {file_type} `{}`.", path.display()))?,
    );
    bincode::deserialize_from(&mut reader)
        .with_context(|| format!("Unable to read {file_type} `{}`.", path.display()))
}

/// Writes an exchange table to a binary file named `name` plus the extension of `file_type`.
///
/// # Returns
///
/// The path of the written file.
pub fn write_greensf_binary<T, P: AsRef<Path>>(
    name: P,
    file_type: GreensfFileType,
    value: &T,
) -> Result<PathBuf, anyhow::Error>
where
    T: Serialize,
{
    let path = file_type.path(name);
    let mut writer = BufWriter::new(
        File::create(&path)
            .with_context(|| format!("Unable to create {file_type} `{}`.", path.display()))?,
    );
    bincode::serialize_into(&mut writer, value)
        .with_context(|| format!("Unable to write {file_type} `{}`.", path.display()))?;
    Ok(path)
}

/// Reads driver parameters from a YAML file.
///
/// # Arguments
///
/// * `path` - The path of the file, including its `.yml` or `.yaml` extension.
pub fn read_greensf_yaml<T, P: AsRef<Path>>(path: P) -> Result<T, anyhow::Error>
where
    T: DeserializeOwned,
{
    let path = path.as_ref();
    let reader = BufReader::new(
        File::open(path)
            .with_context(|| format!("Unable to open parameter file `{}`.", path.display()))?,
    );
    serde_yaml::from_reader(reader)
        .with_context(|| format!("Unable to parse parameter file `{}`.", path.display()))
}

/// Writes driver parameters to the YAML file `name.yml`.
///
/// # Returns
///
/// The path of the written file.
pub fn write_greensf_yaml<T, P: AsRef<Path>>(name: P, value: &T) -> Result<PathBuf, anyhow::Error>
where
    T: Serialize,
{
    let mut path = OsString::from(name.as_ref().as_os_str());
    path.push(".yml");
    let path = PathBuf::from(path);
    let writer = BufWriter::new(
        File::create(&path)
            .with_context(|| format!("Unable to create parameter file `{}`.", path.display()))?,
    );
    serde_yaml::to_writer(writer, value)
        .with_context(|| format!("Unable to write parameter file `{}`.", path.display()))?;
    Ok(path)
}
