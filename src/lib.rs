//! Diagnostic tools for the HERA analog front end and the SNAP correlator.
//!
//! The library backs three binaries:
//!
//! * `snapcorr_integrate` polls a SNAP board over KATCP, sums auto-correlation
//!   spectra over several hardware accumulations and dumps/plots them.
//! * `fem_sensor` reads and drives the I2C peripherals of a Front-End Module.
//! * `pam_sensor` does the same for a Post-Amplifier Module.

pub mod config;
pub mod dump;
pub mod error;
pub mod fem;
pub mod fpga;
pub mod i2c;
pub mod katcp;
pub mod pam;
pub mod plot;
pub mod poll;
pub mod spectrum;

pub use error::{Error, Result};
