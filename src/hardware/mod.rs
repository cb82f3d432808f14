//! Interface to the radar's peripheral drivers.
//!
//! # Design
//! The radar core never touches peripheral registers. Everything it needs from the board is
//! expressed through the [Hardware] trait: descriptor programming for the timing master, the
//! output driver and the sampler, subsystem enables, the free-running cycle counter, sampler
//! calibration and the receive gain stage. The board support layer implements the trait once.
//!
//! Cycle counter reads happen in interrupt context and are split out into [CycleClock] so the
//! acquisition interrupt does not need access to the rest of the driver.
mod cycle_clock;
mod descriptor;
pub mod design_parameters;

pub use cycle_clock::*;
pub use descriptor::*;

use num_enum::IntoPrimitive;

/// The peripherals that take part in an acquisition.
///
/// # Note
/// The declaration order is the required enable order. The timing master is armed first so no
/// trigger can be latched before its consumers exist.
#[derive(Debug, Copy, Clone, PartialEq, Eq, IntoPrimitive, strum::EnumIter)]
#[repr(u8)]
pub enum Subsystem {
    TimingMaster = 0,
    Output = 1,
    Sampler = 2,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HardwareError {
    #[error("Sampler calibration failed")]
    Calibration,
    #[error("Receive gain {0} not supported")]
    Gain(u16),
}

/// Board driver operations consumed by the radar state machine.
pub trait Hardware {
    /// Run the blocking sampler calibration routine.
    fn calibrate(&mut self) -> Result<(), HardwareError>;

    /// Load counts into the timing master, the sampler channel delay and the output interval
    /// trigger. Nothing is enabled.
    fn program_timing(&mut self, timing: &TimingDescriptor);

    /// Point the output driver's transfer engine at the ramp table.
    fn program_output(&mut self, buffer: &BufferDescriptor);

    /// Point the sampler's transfer engine at the ping-pong input buffer.
    fn program_sampler(&mut self, buffer: &BufferDescriptor);

    fn enable(&mut self, subsystem: Subsystem);

    /// Disable a subsystem.
    ///
    /// # Note
    /// Disabling [Subsystem::Output] must also clear the output-enable bit so the output floats
    /// rather than holding its last code.
    fn disable(&mut self, subsystem: Subsystem);

    /// Zero the free-running cycle counter used for pulse timestamps.
    fn reset_cycle_counter(&mut self);

    /// Select the receive gain stage.
    fn set_receive_gain(&mut self, gain: u16) -> Result<(), HardwareError>;

    /// Switch the front-end supply and the status indicator.
    fn set_front_end_power(&mut self, enabled: bool);
}
