//! Signal processing on column tables: interpolation, reconstruction of a
//! clean time index, and Butterworth filtering.

pub mod filter;
pub mod interp;
pub mod reconstruct;
