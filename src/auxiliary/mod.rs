//! Helper items to assist the working of greensf.

pub mod atom;
pub mod constants;
pub mod error;
pub(crate) mod misc;
