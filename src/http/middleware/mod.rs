//! Request middleware.

pub mod apm;

pub use apm::apm_tracking;
