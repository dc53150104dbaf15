//! # greensf: Post-processing of DFT Green's functions
//!
//! greensf reads the Green's functions written by a DFT code into a versioned hierarchical
//! container and derives physical quantities from them by contour integration:
//! - occupation matrices and higher energy moments of single elements,
//! - energy-resolved projections (imaginary and real parts, orbital traces, spin-orbital
//!   matrices),
//! - scalar Heisenberg exchange constants $`J_{ij}`$ for shells of inter-site pairs,
//! - full exchange tensors $`J^{\alpha\beta}_{ij}`$ and their decomposition into isotropic,
//!   anisotropic, symmetric and Dzyaloshinskii–Moriya parts, and
//! - exchange splittings assembled from the radial exchange-correlation field.
//!
//! Three storage kinds of Green's-function elements are supported: spherically averaged,
//! radially resolved (including local orbitals) and k-resolved.
//!
//! ## Units
//!
//! Energies are returned in eV relative to the Fermi energy, lengths in Å and exchange constants
//! in meV. Conversions from the atomic units of the container happen once, on loading.
//!
//! ## Features
//!
//! - `hdf5`: Enables reading HDF5 containers through [`container::hdf5::Hdf5Container`]. Without
//!   it, containers can be assembled in memory with [`container::memory::MemoryContainer`].
//!
//! ## Examples and usage
//!
//! For most items (structs, enums, functions, and traits), their usages are illustrated in test
//! functions.
//!
//! ## License
//!
//! GNU Lesser General Public License v3.0.

pub mod angmom;
pub mod auxiliary;
pub mod container;
pub mod drivers;
pub mod greensfunction;
pub mod heisenberg;
pub mod io;
