//! Error types surfaced by the Green's-function core.

use thiserror::Error;

/// Result alias used throughout the Green's-function core.
pub type GreensfResult<T> = Result<T, GreensfError>;

/// An enumerated type for all failure kinds of the Green's-function core.
#[derive(Debug, Error)]
pub enum GreensfError {
    /// A dataset or group required by a loader recipe is absent from the container.
    #[error("required path `{0}` not found in the container")]
    NotFound(String),

    /// The format version of the container is below the one required by an operation.
    #[error("container version {got} is below the required minimum {min}")]
    BadVersion { got: i64, min: i64 },

    /// A selection refers to an unknown header field, or supplies a value of the wrong kind.
    #[error("bad element field `{0}`")]
    BadField(String),

    /// A selection matched more than one element where exactly one was required.
    #[error("selection matched {} elements where exactly one was required: {matches:?}", matches.len())]
    Ambiguous {
        /// The 0-based catalog indices of all matching elements.
        matches: Vec<usize>,
    },

    /// A selection matched no element where exactly one was required.
    #[error("selection matched no element")]
    NoMatch,

    /// An operation is incompatible with the storage kind of the element.
    #[error("operation `{op}` is not available for {kind} elements")]
    NotAvailable { op: String, kind: String },

    /// A shape invariant required by an operation is violated.
    #[error("shape invariant violated in `{0}`")]
    BadShape(String),

    /// The requested path is deliberately unsupported.
    #[error("operation `{0}` is not implemented")]
    NotImplemented(String),

    /// An index argument lies outside its permitted range.
    #[error("{what} = {value} lies outside {range}")]
    OutOfRange {
        what: String,
        value: i64,
        range: String,
    },

    /// Container data are present but not in the expected form.
    #[error("malformed container data: {0}")]
    Malformed(String),

    /// A tensor contraction could not be performed.
    #[error("tensor contraction failed: {0}")]
    Contraction(String),

    /// An array could not be reshaped.
    #[error(transparent)]
    Shape(#[from] ndarray::ShapeError),

    /// The HDF5 library reported an error.
    #[cfg(feature = "hdf5")]
    #[error(transparent)]
    Hdf5(#[from] hdf5::Error),
}

impl GreensfError {
    pub(crate) fn not_available(op: &str, kind: &str) -> Self {
        Self::NotAvailable {
            op: op.to_string(),
            kind: kind.to_string(),
        }
    }

    pub(crate) fn contraction(err: &str) -> Self {
        Self::Contraction(err.to_string())
    }

    pub(crate) fn out_of_range(what: &str, value: i64, lower: i64, upper: i64) -> Self {
        Self::OutOfRange {
            what: what.to_string(),
            value,
            range: format!("[{lower}, {upper}]"),
        }
    }
}
