use super::Calibration;

// Piecewise-cubic fit of tuning voltage (V) against VCO output frequency (MHz), measured on the
// production front-end. Segments are 50 MHz wide.
const BREAKS: [f32; 10] = [
    2200.0, 2250.0, 2300.0, 2350.0, 2400.0, 2450.0, 2500.0, 2550.0, 2600.0,
    2650.0,
];

const COEFFICIENTS: [[f32; 4]; 9] = [
    [4.000000e-1, 2.534938e-3, 7.057034e-5, -4.022353e-7],
    [6.528934e-1, 6.575247e-3, 1.885303e-5, -4.873440e-8],
    [1.022696e0, 8.095066e-3, 1.195191e-5, -1.975222e-8],
    [1.454861e0, 9.142134e-3, 9.068831e-6, -1.104582e-8],
    [1.933259e0, 9.966188e-3, 7.438282e-6, -7.178344e-9],
    [2.449266e0, 1.065619e-2, 6.372825e-6, -5.093880e-9],
    [2.997371e0, 1.125528e-2, 5.614428e-6, -3.830382e-9],
    [3.573693e0, 1.178801e-2, 5.043059e-6, -3.001206e-9],
    [4.175325e0, 1.226981e-2, 4.594811e-6, -2.424884e-9],
];

/// The default VCO calibration.
///
/// Ramps may span 2240 MHz to 2620 MHz; the fit extends beyond that on both sides.
pub const VCO_FIT: Calibration<'static> = Calibration {
    breaks: &BREAKS,
    coefficients: &COEFFICIENTS,
    usable_min: 2240.0,
    usable_max: 2620.0,
};
