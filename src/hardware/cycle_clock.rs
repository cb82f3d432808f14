/// A free-running counter read at each acquisition trigger.
pub trait CycleClock {
    /// The current counter value. Wraps at `u32::MAX`.
    fn now(&self) -> u32;
}

impl<F: Fn() -> u32> CycleClock for F {
    fn now(&self) -> u32 {
        self()
    }
}

/// The CPU cycle counter of the debug watch and trace unit.
///
/// # Note
/// The counter runs at the CPU clock and wraps roughly every 44 seconds at 96 MHz. It must be
/// enabled by the board setup before use.
#[cfg(target_arch = "arm")]
#[derive(Copy, Clone, Debug, Default)]
pub struct DwtClock;

#[cfg(target_arch = "arm")]
impl DwtClock {
    /// Enable the cycle counter and take it as the pulse clock.
    ///
    /// # Args
    /// * `dwt` - The debug watch and trace unit of the CPU core.
    /// * `dcb` - The debug control block, used to enable tracing.
    pub fn new(
        dwt: &mut cortex_m::peripheral::DWT,
        dcb: &mut cortex_m::peripheral::DCB,
    ) -> Self {
        dcb.enable_trace();
        dwt.enable_cycle_counter();
        Self
    }

    /// Restart the count from zero.
    pub fn reset(dwt: &mut cortex_m::peripheral::DWT) {
        dwt.set_cycle_count(0);
    }
}

#[cfg(target_arch = "arm")]
impl CycleClock for DwtClock {
    fn now(&self) -> u32 {
        cortex_m::peripheral::DWT::cycle_count()
    }
}
