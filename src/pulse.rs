//! Acquisition interrupt bookkeeping
//!
//! # Design
//! The acquisition-complete interrupt is the only code that runs outside the main flow. It
//! writes the pulse sequence number, the pulse timestamp and the transmit-trigger state, always as
//! one group inside a critical section, and the main flow reads the group the same way.
//!
//! The transmit-trigger output fires on every other pulse while transmission is enabled. The
//! enable flag itself is a plain atomic, written by the main flow and only read in the interrupt.
use core::{
    cell::Cell,
    sync::atomic::{AtomicBool, Ordering},
};

use critical_section::Mutex;
use embedded_hal_1::digital::{OutputPin, PinState};

use crate::hardware::CycleClock;

/// State of the most recent acquisition trigger.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct PulseRecord {
    /// Number of completed trigger cycles since power-up.
    pub sequence: u32,
    /// Cycle counter value captured at the trigger.
    pub timestamp: u32,
    /// Whether the transmit trigger was asserted for this pulse.
    pub transmit_trigger: bool,
}

/// Which half of the ping-pong input buffer a pulse landed in.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Half {
    First,
    Second,
}

impl PulseRecord {
    /// The input buffer half the sampler completed with this pulse.
    pub fn half(&self) -> Half {
        if self.sequence & 1 == 1 {
            Half::First
        } else {
            Half::Second
        }
    }
}

/// Pulse state shared between the acquisition interrupt and the main flow.
pub struct PulseTracker {
    record: Mutex<Cell<PulseRecord>>,
    transmit: AtomicBool,
}

impl Default for PulseTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl PulseTracker {
    pub const fn new() -> Self {
        Self {
            record: Mutex::new(Cell::new(PulseRecord {
                sequence: 0,
                timestamp: 0,
                transmit_trigger: false,
            })),
            transmit: AtomicBool::new(false),
        }
    }

    /// Enable or disable the transmit trigger output.
    pub fn set_transmit(&self, enabled: bool) {
        self.transmit.store(enabled, Ordering::Relaxed);
    }

    pub fn transmit_enabled(&self) -> bool {
        self.transmit.load(Ordering::Relaxed)
    }

    /// Read the most recent pulse record.
    pub fn latest(&self) -> PulseRecord {
        critical_section::with(|cs| self.record.borrow(cs).get())
    }

    /// Account for a completed trigger cycle.
    ///
    /// # Args
    /// * `timestamp` - Cycle counter value at the trigger.
    ///
    /// # Returns
    /// The new record.
    pub fn complete(&self, timestamp: u32) -> PulseRecord {
        let transmit = self.transmit_enabled();
        critical_section::with(|cs| {
            let cell = self.record.borrow(cs);
            let previous = cell.get();
            let record = PulseRecord {
                sequence: previous.sequence.wrapping_add(1),
                timestamp,
                transmit_trigger: transmit && previous.sequence & 1 == 1,
            };
            cell.set(record);
            record
        })
    }
}

/// The acquisition-complete interrupt handler.
///
/// # Note
/// Bound once to the tracker, the cycle clock and the trigger output, then owned by the
/// interrupt. It does constant work and never allocates or blocks.
pub struct CompletionHandler<'a, C, P> {
    pulses: &'a PulseTracker,
    clock: C,
    trigger: P,
}

impl<'a, C: CycleClock, P: OutputPin> CompletionHandler<'a, C, P> {
    pub fn new(pulses: &'a PulseTracker, clock: C, trigger: P) -> Self {
        Self {
            pulses,
            clock,
            trigger,
        }
    }

    /// Handle one acquisition-complete interrupt.
    ///
    /// # Returns
    /// The record of the pulse. The record is updated even if driving the trigger fails.
    pub fn on_complete(&mut self) -> Result<PulseRecord, P::Error> {
        let record = self.pulses.complete(self.clock.now());
        self.trigger
            .set_state(PinState::from(record.transmit_trigger))?;
        Ok(record)
    }

    /// Release the bound resources.
    pub fn free(self) -> (C, P) {
        (self.clock, self.trigger)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::convert::Infallible;

    #[derive(Default)]
    struct Pin {
        high: bool,
        edges: usize,
    }

    impl embedded_hal_1::digital::ErrorType for Pin {
        type Error = Infallible;
    }

    impl OutputPin for Pin {
        fn set_low(&mut self) -> Result<(), Infallible> {
            self.high = false;
            Ok(())
        }

        fn set_high(&mut self) -> Result<(), Infallible> {
            self.edges += !self.high as usize;
            self.high = true;
            Ok(())
        }
    }

    #[test]
    fn sequence_and_parity() {
        let pulses = PulseTracker::new();
        let ticks = Cell::new(0u32);
        let clock = || {
            ticks.set(ticks.get() + 960);
            ticks.get()
        };
        let mut handler = CompletionHandler::new(&pulses, clock, Pin::default());

        pulses.set_transmit(true);
        let triggers: Vec<bool> = (0..8)
            .map(|_| handler.on_complete().unwrap().transmit_trigger)
            .collect();
        assert_eq!(
            triggers,
            [false, true, false, true, false, true, false, true]
        );

        let latest = pulses.latest();
        assert_eq!(latest.sequence, 8);
        assert_eq!(latest.timestamp, 8 * 960);
        assert_eq!(latest.half(), Half::Second);

        pulses.set_transmit(false);
        for _ in 0..5 {
            let record = handler.on_complete().unwrap();
            assert!(!record.transmit_trigger);
        }
        assert_eq!(pulses.latest().sequence, 13);
        assert_eq!(pulses.latest().half(), Half::First);

        let (_, pin) = handler.free();
        assert!(!pin.high);
        assert_eq!(pin.edges, 4);
    }
}
