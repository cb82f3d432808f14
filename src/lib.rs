//! FMCW radar firmware core
//!
//! Resolves operator waveform requests into hardware timing and buffer geometry, fills the VCO
//! ramp table, sequences the timing master, the output driver and the sampler, tracks acquired
//! pulses and reports them to the host.
#![cfg_attr(not(test), no_std)]

pub mod buffers;
pub mod command;
pub mod controller;
pub mod hardware;
pub mod pulse;
pub mod radar;
pub mod settings;
pub mod timing;

pub use radar::{Error, Radar, State};
