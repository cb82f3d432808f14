//! Linearized VCO frequency ramp synthesis
//!
//! # Design
//! The radar transmitter is a voltage-controlled oscillator (VCO) whose output frequency is a
//! nonlinear function of its tuning voltage. Driving it with a linear voltage ramp would produce a
//! nonlinear chirp. Instead, each output slot of the DAC waveform table is computed from the
//! desired frequency at that slot:
//!
//! 1. The frequency is located within a piecewise-cubic fit of tuning voltage versus frequency
//!    (the [Calibration]).
//! 2. The cubic of that segment is evaluated to obtain the tuning voltage.
//! 3. The tuning voltage is mapped onto a DAC output code through the board [DacTransfer].
//!
//! Ramps are always evaluated in ascending frequency order. Descending ramps are produced by
//! writing the ascending evaluation back-to-front, so a ramp and its reverse are exact mirrors.
#![cfg_attr(not(test), no_std)]

use core::ops::RangeInclusive;
use num_traits::float::FloatCore;
use serde::{Deserialize, Serialize};

mod calibration;
pub use calibration::VCO_FIT;

/// Return frequencies below this magnitude select a sawtooth waveform.
pub const SAWTOOTH_RETURN_THRESHOLD: f32 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
pub enum RangeError {
    #[error("Frequency {0} MHz outside usable VCO range")]
    Frequency(f32),
    #[error("Calibration exhausted after {written} of {requested} samples")]
    Coverage { written: usize, requested: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
pub enum CalibrationError {
    #[error("{breaks} breakpoints for {segments} cubic segments")]
    Shape { breaks: usize, segments: usize },
    #[error("Breakpoints not strictly ascending at index {0}")]
    Unsorted(usize),
    #[error("Usable range not covered by breakpoints")]
    Usable,
}

/// Piecewise-cubic fit of VCO tuning voltage against output frequency.
///
/// Segment `i` spans `breaks[i]..=breaks[i + 1]` and evaluates
/// `c0 + x * (c1 + x * (c2 + x * c3))` with `x = f - breaks[i]`.
#[derive(Copy, Clone, Debug)]
pub struct Calibration<'a> {
    breaks: &'a [f32],
    coefficients: &'a [[f32; 4]],
    usable_min: f32,
    usable_max: f32,
}

impl<'a> Calibration<'a> {
    /// Construct and validate a calibration table.
    ///
    /// # Args
    /// * `breaks` - Segment breakpoints in MHz, strictly ascending.
    /// * `coefficients` - One `[c0, c1, c2, c3]` cubic per segment.
    /// * `usable` - Frequency interval ramps may be requested over. Must lie within the breakpoints.
    pub fn new(
        breaks: &'a [f32],
        coefficients: &'a [[f32; 4]],
        usable: RangeInclusive<f32>,
    ) -> Result<Self, CalibrationError> {
        if coefficients.is_empty() || breaks.len() != coefficients.len() + 1 {
            return Err(CalibrationError::Shape {
                breaks: breaks.len(),
                segments: coefficients.len(),
            });
        }

        if let Some(index) = breaks.windows(2).position(|w| !(w[0] < w[1])) {
            return Err(CalibrationError::Unsorted(index + 1));
        }

        let (usable_min, usable_max) = usable.into_inner();
        if !(usable_min <= usable_max
            && usable_min >= breaks[0]
            && usable_max <= breaks[breaks.len() - 1])
        {
            return Err(CalibrationError::Usable);
        }

        Ok(Self {
            breaks,
            coefficients,
            usable_min,
            usable_max,
        })
    }

    /// The interval ramp endpoints must lie within.
    pub fn usable_range(&self) -> RangeInclusive<f32> {
        self.usable_min..=self.usable_max
    }

    pub fn segments(&self) -> usize {
        self.coefficients.len()
    }

    fn evaluate(&self, segment: usize, frequency: f32) -> f32 {
        let [c0, c1, c2, c3] = self.coefficients[segment];
        let x = frequency - self.breaks[segment];
        c0 + x * (c1 + x * (c2 + x * c3))
    }

    /// Tuning voltage for a single frequency, if the frequency is covered by a segment.
    pub fn voltage(&self, frequency: f32) -> Option<f32> {
        let segment = self
            .breaks
            .windows(2)
            .position(|w| (w[0]..=w[1]).contains(&frequency))?;
        Some(self.evaluate(segment, frequency))
    }
}

/// Mapping from VCO tuning voltage to DAC output code.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DacTransfer {
    /// DAC reference voltage in volts.
    pub reference_voltage: f32,
    /// Number of DAC codes (full scale).
    pub max_code: f32,
    /// Gain of the amplifier between DAC output and VCO tuning input.
    pub tune_gain: f32,
}

impl Default for DacTransfer {
    fn default() -> Self {
        Self {
            reference_voltage: 3.3,
            max_code: 4096.0,
            tune_gain: 1.5,
        }
    }
}

impl DacTransfer {
    /// Convert a tuning voltage into a DAC code.
    ///
    /// The DAC outputs `v_ref * (1 + code) / max_code`, hence the trailing `- 1`. Codes saturate
    /// into `0..max_code`.
    pub fn code(&self, tuning_voltage: f32) -> u16 {
        let dac_voltage = tuning_voltage / self.tune_gain;
        let code = (dac_voltage / self.reference_voltage * self.max_code).round()
            - 1.0;
        code.clamp(0.0, self.max_code - 1.0) as u16
    }
}

/// The shape of the output waveform table.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Shape {
    /// A single ramp from start to stop, then an instantaneous return.
    Sawtooth { start: f32, stop: f32 },
    /// A ramp from start to stop followed by a ramp from stop to the return frequency.
    Triangle { start: f32, stop: f32, ret: f32 },
}

impl Shape {
    /// Select the waveform shape from operator frequencies. A zero return frequency selects a
    /// sawtooth.
    pub fn new(start: f32, stop: f32, ret: f32) -> Self {
        if ret.abs() < SAWTOOTH_RETURN_THRESHOLD {
            Self::Sawtooth { start, stop }
        } else {
            Self::Triangle { start, stop, ret }
        }
    }
}

pub struct RampGenerator<'a> {
    calibration: Calibration<'a>,
    dac: DacTransfer,
}

impl<'a> RampGenerator<'a> {
    pub fn new(calibration: Calibration<'a>, dac: DacTransfer) -> Self {
        Self { calibration, dac }
    }

    pub fn calibration(&self) -> &Calibration<'a> {
        &self.calibration
    }

    fn check(&self, frequency: f32) -> Result<(), RangeError> {
        if self.calibration.usable_range().contains(&frequency) {
            Ok(())
        } else {
            Err(RangeError::Frequency(frequency))
        }
    }

    /// Generate a linear frequency ramp into `out`.
    ///
    /// # Args
    /// * `start` - Frequency of the first sample in MHz.
    /// * `stop` - Frequency of the last sample in MHz. May be below `start` for a down-ramp.
    /// * `out` - The DAC codes, one per output slot. The ramp spans the entire slice.
    ///
    /// # Returns
    /// An error if either endpoint is outside the usable range, in which case `out` is untouched,
    /// or if the calibration segments do not cover the ramp. In the latter case the contents of
    /// `out` are unspecified and must be discarded.
    pub fn generate(
        &self,
        start: f32,
        stop: f32,
        out: &mut [u16],
    ) -> Result<(), RangeError> {
        let (low, high, ascending) = if start > stop {
            (stop, start, false)
        } else {
            (start, stop, true)
        };
        self.check(low)?;
        self.check(high)?;

        let count = out.len();
        if count == 0 {
            return Ok(());
        }
        let step = if count > 1 {
            (high - low) / (count - 1) as f32
        } else {
            0.0
        };

        let breaks = self.calibration.breaks;
        let mut segment = 0;
        for index in 0..count {
            let frequency = if index + 1 == count {
                high
            } else {
                low + step * index as f32
            };

            while frequency > breaks[segment + 1] {
                segment += 1;
                if segment == self.calibration.segments() {
                    log::warn!(
                        "Ramp {low}..{high} MHz leaves calibration at {frequency} MHz"
                    );
                    return Err(RangeError::Coverage {
                        written: index,
                        requested: count,
                    });
                }
            }

            let code = self.dac.code(self.calibration.evaluate(segment, frequency));
            let slot = if ascending { index } else { count - 1 - index };
            out[slot] = code;
        }

        Ok(())
    }

    /// Fill a complete waveform table.
    ///
    /// A triangle is an up-ramp over the first `len - len / 2` slots followed by the return ramp
    /// over the remainder. All endpoints are checked before any slot is written.
    pub fn fill(&self, shape: Shape, out: &mut [u16]) -> Result<(), RangeError> {
        match shape {
            Shape::Sawtooth { start, stop } => self.generate(start, stop, out),
            Shape::Triangle { start, stop, ret } => {
                self.check(start)?;
                self.check(stop)?;
                self.check(ret)?;
                let split = out.len() - out.len() / 2;
                let (up, down) = out.split_at_mut(split);
                self.generate(start, stop, up)?;
                self.generate(stop, ret, down)
            }
        }
    }
}

impl Default for RampGenerator<'static> {
    fn default() -> Self {
        Self::new(VCO_FIT, DacTransfer::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reversed_endpoints_mirror() {
        let generator = RampGenerator::default();
        let mut up = [0u16; 360];
        let mut down = [0u16; 360];
        generator.generate(2258.0, 2588.0, &mut up).unwrap();
        generator.generate(2588.0, 2258.0, &mut down).unwrap();

        let mut reversed = down;
        reversed.reverse();
        assert_eq!(up, reversed);
    }

    #[test]
    fn up_ramp_is_monotonic() {
        let generator = RampGenerator::default();
        let mut ramp = [0u16; 1000];
        generator.generate(2240.0, 2620.0, &mut ramp).unwrap();
        assert!(ramp.windows(2).all(|w| w[0] <= w[1]));
        assert!(ramp[0] < ramp[999]);
    }

    #[test]
    fn out_of_range_untouched() {
        let generator = RampGenerator::default();
        let mut ramp = [0xAAAAu16; 16];
        assert_eq!(
            generator.generate(2000.0, 2500.0, &mut ramp),
            Err(RangeError::Frequency(2000.0))
        );
        assert_eq!(
            generator.generate(2500.0, 2700.0, &mut ramp),
            Err(RangeError::Frequency(2700.0))
        );
        assert!(matches!(
            generator.generate(f32::NAN, 2500.0, &mut ramp),
            Err(RangeError::Frequency(_))
        ));
        assert!(ramp.iter().all(|&code| code == 0xAAAA));
    }

    #[test]
    fn triangle_concatenates() {
        let generator = RampGenerator::default();
        let mut table = [0u16; 301];
        generator
            .fill(
                Shape::Triangle {
                    start: 2260.0,
                    stop: 2590.0,
                    ret: 2300.0,
                },
                &mut table,
            )
            .unwrap();

        let mut up = [0u16; 151];
        let mut down = [0u16; 150];
        generator.generate(2260.0, 2590.0, &mut up).unwrap();
        generator.generate(2590.0, 2300.0, &mut down).unwrap();
        assert_eq!(&table[..151], &up[..]);
        assert_eq!(&table[151..], &down[..]);
    }

    #[test]
    fn triangle_checks_return_first() {
        let generator = RampGenerator::default();
        let mut table = [7u16; 100];
        let shape = Shape::new(2260.0, 2590.0, 3000.0);
        assert_eq!(
            generator.fill(shape, &mut table),
            Err(RangeError::Frequency(3000.0))
        );
        assert!(table.iter().all(|&code| code == 7));
    }

    #[test]
    fn zero_return_selects_sawtooth() {
        assert_eq!(
            Shape::new(2260.0, 2590.0, 0.0),
            Shape::Sawtooth {
                start: 2260.0,
                stop: 2590.0
            }
        );
    }

    #[test]
    fn coverage_exhaustion_fails() {
        // The usable range claims more than the segments cover.
        let breaks = [0.0, 10.0, 20.0];
        let coefficients = [[1.0, 0.0, 0.0, 0.0]; 2];
        let calibration = Calibration {
            breaks: &breaks,
            coefficients: &coefficients,
            usable_min: 0.0,
            usable_max: 30.0,
        };
        let generator = RampGenerator::new(calibration, DacTransfer::default());
        let mut ramp = [0u16; 31];
        assert_eq!(
            generator.generate(0.0, 30.0, &mut ramp),
            Err(RangeError::Coverage {
                written: 21,
                requested: 31
            })
        );
    }

    #[test]
    fn calibration_validation() {
        let breaks = [0.0, 10.0, 5.0];
        let coefficients = [[0.0; 4]; 2];
        assert_eq!(
            Calibration::new(&breaks, &coefficients, 0.0..=5.0).err(),
            Some(CalibrationError::Unsorted(2))
        );
        assert_eq!(
            Calibration::new(&breaks[..2], &coefficients, 0.0..=5.0).err(),
            Some(CalibrationError::Shape {
                breaks: 2,
                segments: 2
            })
        );
        let breaks = [0.0, 10.0, 20.0];
        assert_eq!(
            Calibration::new(&breaks, &coefficients, 0.0..=25.0).err(),
            Some(CalibrationError::Usable)
        );
        assert!(Calibration::new(&breaks, &coefficients, 1.0..=19.0).is_ok());
    }

    #[test]
    fn dac_code_transfer() {
        let dac = DacTransfer::default();
        // 1.65 V at the DAC is half scale.
        assert_eq!(dac.code(1.65 * 1.5), 2047);
        assert_eq!(dac.code(0.0), 0);
        assert_eq!(dac.code(100.0), 4095);
    }
}
