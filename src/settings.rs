//! Radar run-time settings
//!
//! # Design
//! Settings are plain serde structures. The waveform request is what the host sends with a start
//! command. The remaining settings apply to the controller when it is constructed.
use serde::{Deserialize, Serialize};
use vco_ramp::Shape;

use crate::hardware::design_parameters::HEARTBEAT_INTERVAL;

/// An operator request for a pulse waveform.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WaveformRequest {
    /// Pulse duration in milliseconds. Must be a supported duration.
    pub duration_ms: u16,
    /// Receive gain stage selection.
    pub gain: u16,
    /// Ramp start frequency in MHz.
    pub freq_start: f32,
    /// Ramp stop frequency in MHz.
    pub freq_stop: f32,
    /// Return frequency in MHz. Zero selects a sawtooth, anything else a triangle.
    pub freq_return: f32,
}

impl WaveformRequest {
    pub fn shape(&self) -> Shape {
        Shape::new(self.freq_start, self.freq_stop, self.freq_return)
    }
}

impl Default for WaveformRequest {
    fn default() -> Self {
        Self {
            duration_ms: 20,
            gain: 0,
            freq_start: 2260.0,
            freq_stop: 2590.0,
            freq_return: 0.0,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// The waveform configured at startup.
    pub waveform: WaveformRequest,
    /// Start acquiring with `waveform` as soon as the controller is constructed.
    pub autostart: bool,
    /// Drive the transmit trigger output.
    pub transmit_trigger: bool,
    /// Milliseconds between heartbeats.
    pub heartbeat_interval_ms: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            waveform: WaveformRequest::default(),
            autostart: false,
            transmit_trigger: false,
            heartbeat_interval_ms: HEARTBEAT_INTERVAL.to_millis(),
        }
    }
}
