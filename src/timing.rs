//! Pulse timing resolution
//!
//! # Design
//! A pulse duration selects a row of a fixed table holding the output table length and the
//! sampler time scale (output samples per input sample). Every other count the hardware needs is
//! derived from these two and the bus clock:
//!
//! * output hold count: bus clock counts per output sample
//! * sampler period: `time_scale` output holds
//! * sampler channel delay: the period minus the sampler settling time
//! * input buffer length: two halves of `output_len / time_scale` samples each
//!
//! Rows for durations that cannot be realized are tagged [TimingEntry::unsupported] and are
//! rejected like unknown durations. The table is checked when the crate is compiled.
use crate::hardware::{
    design_parameters::{
        BUS_CLOCK, COUNTER_MAX, INPUT_GRANULARITY, OUTPUT_GRANULARITY,
        SAMPLER_SETTLING_COUNTS, SAMPLE_BYTES,
    },
    TimingDescriptor,
};
use fugit::HertzU32;

#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("Pulse duration {0} ms is not supported")]
    UnsupportedDuration(u16),
    #[error("Output length {output_len} is not divisible by time scale {time_scale}")]
    Indivisible { output_len: u16, time_scale: u16 },
    #[error("Count {0} exceeds the counter width")]
    CounterOverflow(u32),
    #[error("Sampler period of {0} counts is shorter than the settling time")]
    Settling(u32),
    #[error("Buffer of {bytes} bytes is not a multiple of {granularity}")]
    Granularity { bytes: usize, granularity: usize },
}

/// Buffer geometry of a realizable pulse duration.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Geometry {
    /// Number of samples in the output ramp table.
    pub output_len: u16,
    /// Output samples per input sample.
    pub time_scale: u16,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct TimingEntry {
    pub duration_ms: u16,
    /// `None` marks a duration that has no valid hardware configuration.
    pub geometry: Option<Geometry>,
}

impl TimingEntry {
    pub const fn supported(duration_ms: u16, output_len: u16, time_scale: u16) -> Self {
        Self {
            duration_ms,
            geometry: Some(Geometry {
                output_len,
                time_scale,
            }),
        }
    }

    pub const fn unsupported(duration_ms: u16) -> Self {
        Self {
            duration_ms,
            geometry: None,
        }
    }
}

/// Supported pulse durations. Every realizable row samples at 50 kHz.
pub const TIMING_TABLE: [TimingEntry; 8] = [
    TimingEntry::supported(5, 3000, 12),
    TimingEntry::supported(10, 3000, 6),
    TimingEntry::supported(15, 3000, 4),
    TimingEntry::supported(20, 3000, 3),
    TimingEntry::supported(25, 5000, 4),
    TimingEntry::supported(30, 3000, 2),
    TimingEntry::unsupported(35),
    TimingEntry::supported(40, 4000, 2),
];

/// Check that every supported row has a usable geometry and every duration appears once.
pub const fn validate(table: &[TimingEntry]) -> bool {
    let mut i = 0;
    while i < table.len() {
        if let Some(Geometry {
            output_len,
            time_scale,
        }) = table[i].geometry
        {
            if output_len == 0 || time_scale == 0 || output_len % time_scale != 0 {
                return false;
            }
            if (output_len as usize * SAMPLE_BYTES) % OUTPUT_GRANULARITY != 0 {
                return false;
            }
        }
        let mut j = i + 1;
        while j < table.len() {
            if table[j].duration_ms == table[i].duration_ms {
                return false;
            }
            j += 1;
        }
        i += 1;
    }
    true
}

const _: () = assert!(validate(&TIMING_TABLE));

/// The hardware timing and buffer geometry of a pulse duration.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct TimingProfile {
    pub duration_ms: u16,
    /// Output ramp table length in samples.
    pub output_len: usize,
    pub time_scale: u16,
    /// Bus clock counts each output sample is held for.
    pub output_hold: u16,
    /// Bus clock counts between sampler conversions.
    pub sampler_period: u16,
    pub channel_delay: u16,
    pub output_interval: u16,
    /// Input buffer length in samples, covering both ping-pong halves.
    pub input_len: usize,
}

impl TimingProfile {
    /// The counts to load into the timing hardware.
    pub fn descriptor(&self) -> TimingDescriptor {
        TimingDescriptor {
            modulus: self.sampler_period - 1,
            channel_delay: self.channel_delay,
            output_interval: self.output_interval,
        }
    }

    /// Number of input samples acquired per pulse.
    pub fn half_len(&self) -> usize {
        self.input_len / 2
    }
}

/// Maps pulse durations onto timing profiles.
#[derive(Debug, Copy, Clone)]
pub struct TimingResolver<'a> {
    table: &'a [TimingEntry],
    bus_clock: HertzU32,
    settling_counts: u32,
}

impl Default for TimingResolver<'static> {
    fn default() -> Self {
        Self::new(&TIMING_TABLE)
    }
}

impl<'a> TimingResolver<'a> {
    pub const fn new(table: &'a [TimingEntry]) -> Self {
        Self {
            table,
            bus_clock: BUS_CLOCK,
            settling_counts: SAMPLER_SETTLING_COUNTS,
        }
    }

    /// The pulse durations that resolve to a profile.
    pub fn durations(&self) -> impl Iterator<Item = u16> + 'a {
        self.table
            .iter()
            .filter(|entry| entry.geometry.is_some())
            .map(|entry| entry.duration_ms)
    }

    /// Resolve a pulse duration.
    ///
    /// # Args
    /// * `duration_ms` - The requested pulse duration. Must match a table row exactly.
    ///
    /// # Returns
    /// The profile, or the first check the derived counts fail.
    pub fn resolve(&self, duration_ms: u16) -> Result<TimingProfile, ConfigError> {
        let Geometry {
            output_len,
            time_scale,
        } = self
            .table
            .iter()
            .find(|entry| entry.duration_ms == duration_ms)
            .and_then(|entry| entry.geometry)
            .filter(|g| g.output_len != 0 && g.time_scale != 0)
            .ok_or(ConfigError::UnsupportedDuration(duration_ms))?;

        if output_len % time_scale != 0 {
            return Err(ConfigError::Indivisible {
                output_len,
                time_scale,
            });
        }
        let input_len = 2 * (output_len / time_scale) as usize;

        for (bytes, granularity) in [
            (output_len as usize * SAMPLE_BYTES, OUTPUT_GRANULARITY),
            (input_len * SAMPLE_BYTES, INPUT_GRANULARITY),
        ] {
            if bytes % granularity != 0 {
                return Err(ConfigError::Granularity { bytes, granularity });
            }
        }

        // Counts per output sample, rounded to nearest.
        let num = self.bus_clock.to_Hz() as u64 * duration_ms as u64;
        let den = 1000 * output_len as u64;
        let hold = (num + den / 2) / den;
        let hold = u32::try_from(hold)
            .ok()
            .filter(|&hold| hold <= COUNTER_MAX)
            .ok_or(ConfigError::CounterOverflow(hold.min(u32::MAX as u64) as u32))?;

        let period = hold * time_scale as u32;
        if period > COUNTER_MAX {
            return Err(ConfigError::CounterOverflow(period));
        }
        if period <= self.settling_counts {
            return Err(ConfigError::Settling(period));
        }

        Ok(TimingProfile {
            duration_ms,
            output_len: output_len as usize,
            time_scale,
            output_hold: hold as u16,
            sampler_period: period as u16,
            channel_delay: (period - 1 - (self.settling_counts - 1)) as u16,
            output_interval: (hold - 1) as u16,
            input_len,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_profiles() {
        let resolver = TimingResolver::default();
        let durations: Vec<u16> = resolver.durations().collect();
        assert_eq!(durations, [5, 10, 15, 20, 25, 30, 40]);

        for duration in durations {
            let profile = resolver.resolve(duration).unwrap();
            assert_eq!(profile.output_len % profile.time_scale as usize, 0);
            assert_eq!(
                profile.input_len,
                2 * (profile.output_len / profile.time_scale as usize)
            );
            assert!(profile.sampler_period as u32 <= COUNTER_MAX);
            assert_eq!(
                profile.sampler_period as u32,
                profile.output_hold as u32 * profile.time_scale as u32
            );
            // 50 kHz sampling at a 48 MHz bus clock.
            assert_eq!(profile.sampler_period, 960);
            assert_eq!(profile.channel_delay, 928);
            assert_eq!(profile.descriptor().modulus, 959);
            assert_eq!((profile.output_len * SAMPLE_BYTES) % OUTPUT_GRANULARITY, 0);
        }
    }

    #[test]
    fn twenty_ms() {
        let profile = TimingResolver::default().resolve(20).unwrap();
        assert_eq!(
            profile,
            TimingProfile {
                duration_ms: 20,
                output_len: 3000,
                time_scale: 3,
                output_hold: 320,
                sampler_period: 960,
                channel_delay: 928,
                output_interval: 319,
                input_len: 2000,
            }
        );
        assert_eq!(profile.half_len(), 1000);
    }

    #[test]
    fn unsupported_durations() {
        let resolver = TimingResolver::default();
        assert_eq!(
            resolver.resolve(35),
            Err(ConfigError::UnsupportedDuration(35))
        );
        assert_eq!(resolver.resolve(7), Err(ConfigError::UnsupportedDuration(7)));
        assert_eq!(resolver.resolve(0), Err(ConfigError::UnsupportedDuration(0)));
    }

    #[test]
    fn zero_geometry_rejected() {
        let table = [TimingEntry::supported(10, 0, 0)];
        assert!(!validate(&table));
        assert_eq!(
            TimingResolver::new(&table).resolve(10),
            Err(ConfigError::UnsupportedDuration(10))
        );
    }

    #[test]
    fn invalid_geometry() {
        let table = [
            TimingEntry::supported(10, 3000, 7),
            TimingEntry::supported(11, 3004, 2),
            TimingEntry::supported(100, 48, 1),
            TimingEntry::supported(1, 3000, 1),
        ];
        let resolver = TimingResolver::new(&table);
        assert_eq!(
            resolver.resolve(10),
            Err(ConfigError::Indivisible {
                output_len: 3000,
                time_scale: 7
            })
        );
        assert_eq!(
            resolver.resolve(11),
            Err(ConfigError::Granularity {
                bytes: 6008,
                granularity: 16
            })
        );
        assert_eq!(resolver.resolve(100), Err(ConfigError::CounterOverflow(100_000)));
        assert_eq!(resolver.resolve(1), Err(ConfigError::Settling(16)));
    }

    #[test]
    fn duplicate_durations_invalid() {
        let table = [
            TimingEntry::supported(10, 3000, 6),
            TimingEntry::unsupported(10),
        ];
        assert!(!validate(&table));
        assert!(validate(&TIMING_TABLE));
    }
}
