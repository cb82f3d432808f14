//! Acquisition and output synchronization
//!
//! # Design
//! The radar sequences three coupled subsystems: the timing master, the output driver reading the
//! ramp table and the sampler filling the ping-pong input buffer.
//!
//! ```text
//!          configure          start
//!   Idle ------------> Configured ------> Running
//!    ^   <------------     ^   <-------------'
//!    |   failed step       |       stop
//!    '---------------------'-- configure (stops first)
//! ```
//!
//! Configuration runs the timing resolver, the buffer manager and the ramp generator, then
//! programs descriptors into the hardware without enabling anything. Any failing step releases
//! the buffers and leaves the radar idle. Buffers are only ever touched while nothing is running.
use vco_ramp::{DacTransfer, RampGenerator, RangeError, VCO_FIT};

use crate::{
    buffers::{AllocationError, BufferAllocator, BufferManager},
    hardware::{
        design_parameters::{DAC_CODES, DAC_REFERENCE_VOLTAGE, VCO_TUNE_GAIN},
        Hardware, HardwareError, Subsystem, Wrap,
    },
    pulse::{Half, PulseRecord, PulseTracker},
    settings::WaveformRequest,
    timing::{ConfigError, TimingProfile, TimingResolver},
};
use strum::IntoEnumIterator;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum State {
    /// No profile is bound.
    Idle,
    /// Buffers are filled and the hardware is programmed, nothing is enabled.
    Configured,
    /// All subsystems are enabled.
    Running,
}

#[derive(Debug, Copy, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Range(#[from] RangeError),
    #[error(transparent)]
    Allocation(#[from] AllocationError),
    #[error(transparent)]
    Hardware(#[from] HardwareError),
    #[error("Not valid in the {0:?} state")]
    State(State),
}

impl Error {
    /// The status code reported to the host.
    pub fn code(&self) -> i16 {
        match self {
            Error::Config(_) => -1,
            Error::Range(_) => -2,
            Error::Allocation(_) => -3,
            Error::Hardware(_) => -4,
            Error::State(_) => -5,
        }
    }
}

/// A pulse ready to be reported.
#[derive(Debug)]
pub struct Pulse<'a> {
    pub record: PulseRecord,
    /// The waveform the pulse was acquired with.
    pub request: WaveformRequest,
    /// The input buffer half the sampler completed.
    pub samples: &'a [u16],
}

#[derive(Debug, Copy, Clone)]
struct Binding {
    request: WaveformRequest,
    profile: TimingProfile,
}

pub struct Radar<'a, H: Hardware, A: BufferAllocator> {
    hardware: H,
    buffers: BufferManager<A>,
    resolver: TimingResolver<'a>,
    generator: RampGenerator<'a>,
    pulses: &'a PulseTracker,
    binding: Option<Binding>,
    state: State,
    emitted: u32,
    dropped: u32,
}

impl<'a, H: Hardware, A: BufferAllocator> Radar<'a, H, A> {
    /// Calibrate the sampler and construct the radar.
    ///
    /// # Args
    /// * `hardware` - The board driver.
    /// * `allocator` - Storage for the sample buffers.
    /// * `pulses` - The pulse state shared with the acquisition interrupt.
    ///
    /// # Returns
    /// The idle radar, or the calibration failure. A radar that failed calibration can not be
    /// constructed and so never runs.
    pub fn new(
        hardware: H,
        allocator: A,
        pulses: &'a PulseTracker,
    ) -> Result<Self, Error> {
        let dac = DacTransfer {
            reference_voltage: DAC_REFERENCE_VOLTAGE,
            max_code: DAC_CODES,
            tune_gain: VCO_TUNE_GAIN,
        };
        Self::with_generators(
            hardware,
            allocator,
            pulses,
            TimingResolver::default(),
            RampGenerator::new(VCO_FIT, dac),
        )
    }

    /// Construct the radar with a specific timing table and ramp calibration.
    pub fn with_generators(
        mut hardware: H,
        allocator: A,
        pulses: &'a PulseTracker,
        resolver: TimingResolver<'a>,
        generator: RampGenerator<'a>,
    ) -> Result<Self, Error> {
        hardware.calibrate().inspect_err(|e| {
            log::error!("Calibration failed: {e}");
        })?;

        Ok(Self {
            hardware,
            buffers: BufferManager::new(allocator),
            resolver,
            generator,
            pulses,
            binding: None,
            state: State::Idle,
            emitted: pulses.latest().sequence,
            dropped: 0,
        })
    }

    pub fn state(&self) -> State {
        self.state
    }

    /// The active request and its timing profile, if configured.
    pub fn profile(&self) -> Option<(&WaveformRequest, &TimingProfile)> {
        self.binding.as_ref().map(|b| (&b.request, &b.profile))
    }

    pub fn pulses(&self) -> &'a PulseTracker {
        self.pulses
    }

    /// Number of pulses that completed without being reported.
    pub fn dropped(&self) -> u32 {
        self.dropped
    }

    pub fn hardware(&self) -> &H {
        &self.hardware
    }

    pub fn hardware_mut(&mut self) -> &mut H {
        &mut self.hardware
    }

    pub fn buffers(&self) -> &BufferManager<A> {
        &self.buffers
    }

    /// Bind a waveform request, stopping first if running.
    ///
    /// # Returns
    /// The resolved profile. On failure the radar is idle and holds no buffers.
    pub fn configure(
        &mut self,
        request: WaveformRequest,
    ) -> Result<TimingProfile, Error> {
        self.stop();

        match self.bind(&request) {
            Ok(profile) => {
                log::info!("Configured {request:?}: {profile:?}");
                self.binding = Some(Binding { request, profile });
                self.state = State::Configured;
                Ok(profile)
            }
            Err(e) => {
                log::warn!("Configuration {request:?} failed: {e}");
                self.buffers.release();
                self.binding = None;
                self.state = State::Idle;
                Err(e)
            }
        }
    }

    fn bind(&mut self, request: &WaveformRequest) -> Result<TimingProfile, Error> {
        let profile = self.resolver.resolve(request.duration_ms)?;
        self.buffers.allocate(&profile)?;
        self.generator
            .fill(request.shape(), self.buffers.output_mut().as_mut_slice())?;
        self.hardware.set_receive_gain(request.gain)?;

        self.hardware.program_timing(&profile.descriptor());
        self.hardware
            .program_output(&self.buffers.output().descriptor(Wrap::Circular));
        self.hardware
            .program_sampler(&self.buffers.input().descriptor(Wrap::PingPong));
        Ok(profile)
    }

    /// Enable acquisition.
    ///
    /// # Note
    /// The cycle counter is zeroed and the subsystems enabled inside one critical section, timing
    /// master first, so the acquisition interrupt never sees a partially enabled system.
    pub fn start(&mut self) -> Result<(), Error> {
        if self.state != State::Configured {
            return Err(Error::State(self.state));
        }

        let hardware = &mut self.hardware;
        critical_section::with(|_| {
            hardware.reset_cycle_counter();
            for subsystem in Subsystem::iter() {
                hardware.enable(subsystem);
            }
        });
        self.hardware.set_front_end_power(true);

        // Pulses from earlier runs are not reported.
        self.emitted = self.pulses.latest().sequence;
        self.state = State::Running;
        log::info!("Acquisition started");
        Ok(())
    }

    /// Disable acquisition. Valid in every state and idempotent.
    pub fn stop(&mut self) {
        for subsystem in Subsystem::iter().rev() {
            self.hardware.disable(subsystem);
        }

        if self.state == State::Running {
            self.hardware.set_front_end_power(false);
            self.state = State::Configured;
            log::info!("Acquisition stopped");
        }
    }

    /// Take the newest pulse not yet reported.
    ///
    /// # Returns
    /// The pulse and its input buffer half while running and a new pulse has completed. Pulses
    /// completing between two calls are counted as dropped.
    pub fn next_pulse(&mut self) -> Option<Pulse<'_>> {
        if self.state != State::Running {
            return None;
        }
        let binding = self.binding?;

        let record = self.pulses.latest();
        let pending = record.sequence.wrapping_sub(self.emitted);
        if pending == 0 {
            return None;
        }
        if pending > 1 {
            self.dropped = self.dropped.wrapping_add(pending - 1);
            log::warn!("Dropped {} pulses before #{}", pending - 1, record.sequence);
        }
        self.emitted = record.sequence;

        let (first, second) = self
            .buffers
            .input()
            .as_slice()
            .split_at(binding.profile.half_len());
        let samples = match record.half() {
            Half::First => first,
            Half::Second => second,
        };

        Some(Pulse {
            record,
            request: binding.request,
            samples,
        })
    }
}
