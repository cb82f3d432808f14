use fugit::{HertzU32, MillisDurationU32, NanosDurationU32};

/// The peripheral bus clock driving the timing master, the output driver and the sampler.
pub const BUS_CLOCK: HertzU32 = HertzU32::MHz(48);

/// The CPU core clock. The pulse timestamp counter runs at this rate.
pub const CPU_CLOCK: HertzU32 = HertzU32::MHz(96);

/// The time the sampler needs after a trigger before its conversion result is valid.
pub const SAMPLER_SETTLING_TIME: NanosDurationU32 = NanosDurationU32::from_ticks(667);

/// The sampler settling time expressed in bus clock counts, rounded to nearest.
pub const SAMPLER_SETTLING_COUNTS: u32 = ((BUS_CLOCK.to_Hz() as u64
    * SAMPLER_SETTLING_TIME.ticks() as u64
    + 500_000_000)
    / 1_000_000_000) as u32;

/// Width of the timing master and sampler counters.
pub const COUNTER_BITS: u32 = 16;

/// The largest count the timing hardware can hold.
pub const COUNTER_MAX: u32 = (1 << COUNTER_BITS) - 1;

/// Size of one output or input sample.
pub const SAMPLE_BYTES: usize = core::mem::size_of::<u16>();

/// The output driver's transfer engine moves 16-byte bursts, so the ramp table must be a whole
/// number of bursts.
pub const OUTPUT_GRANULARITY: usize = 16;

/// The sampler's transfer engine moves one sample per request.
pub const INPUT_GRANULARITY: usize = 2;

/// Alignment required for any buffer handed to a transfer engine.
pub const DMA_ALIGNMENT: usize = 16;

/// The output DAC full-scale reference.
pub const DAC_REFERENCE_VOLTAGE: f32 = 3.3;

/// Number of codes spanned by the output DAC.
pub const DAC_CODES: f32 = 4096.0;

/// The gain of the amplifier between the DAC and the VCO tuning input.
pub const VCO_TUNE_GAIN: f32 = 1.5;

/// How often a heartbeat is sent to the host.
pub const HEARTBEAT_INTERVAL: MillisDurationU32 = MillisDurationU32::secs(1);
