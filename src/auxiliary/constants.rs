//! Physical constants and unit conversions.
//!
//! Every energy crossing the public boundary of this crate is in eV and every length in Å.
//! Conversions from the atomic units used on disk happen exactly once, when data are loaded.

/// Conversion factor from Hartree to electronvolt (CODATA 2018).
pub const HTR_TO_EV: f64 = 27.211_386_245_988;

/// Conversion factor from Bohr radius to Ångström (CODATA 2018).
pub const BOHR_TO_ANGSTROM: f64 = 0.529_177_210_903;

/// Conversion factor from eV to meV, used for reporting exchange constants.
pub const EV_TO_MEV: f64 = 1000.0;

/// Displacement components with magnitudes below this value are snapped to exactly zero.
pub const ZERO_DISPLACEMENT_THRESHOLD: f64 = 1.0e-12;

/// Number of decimal places to which inter-site distances are rounded when forming shells.
pub const SHELL_DISTANCE_DECIMALS: i32 = 12;
