//! Scaling of raw 24-bit conversion results.

use crate::params::Polarity;

/// Fixed gain of the AD7797 input stage.
pub const GAIN: f32 = 128.0;
/// Code of a zero-volt input in bipolar coding.
pub const MID_SCALE: u32 = 0x80_0000;
/// Temperature sensor sensitivity in codes per kelvin (bipolar coding).
pub const TEMPERATURE_CODES_PER_KELVIN: f32 = 2815.0;

const HALF_SCALE: f32 = 8_388_608.0;
const FULL_SCALE: f32 = 16_777_216.0;
const KELVIN_OFFSET: f32 = 273.0;

/// Converts a raw result to the differential input voltage for reference `vref` (volts).
pub fn raw_to_volts(raw: u32, polarity: Polarity, vref: f32) -> f32 {
    let raw = (raw & 0x00FF_FFFF) as f32;
    match polarity {
        Polarity::Bipolar => (raw / HALF_SCALE - 1.0) * vref / GAIN,
        Polarity::Unipolar => raw * vref / FULL_SCALE / GAIN,
    }
}

/// Converts a bipolar temperature-channel result to degrees Celsius.
pub fn raw_to_celsius(raw: u32) -> f32 {
    let offset = (raw & 0x00FF_FFFF) as i32 - MID_SCALE as i32;
    offset as f32 / TEMPERATURE_CODES_PER_KELVIN - KELVIN_OFFSET
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-6
    }

    #[test]
    fn bipolar_mid_scale_is_zero_volts() {
        assert!(close(raw_to_volts(MID_SCALE, Polarity::Bipolar, 2.5), 0.0));
        assert!(close(raw_to_volts(0, Polarity::Bipolar, 2.5), -2.5 / GAIN));
    }

    #[test]
    fn unipolar_scales_from_zero() {
        assert!(close(raw_to_volts(0, Polarity::Unipolar, 2.5), 0.0));
        assert!(close(
            raw_to_volts(MID_SCALE, Polarity::Unipolar, 2.5),
            1.25 / GAIN
        ));
    }

    #[test]
    fn temperature_offsets_from_absolute_zero() {
        let raw = MID_SCALE + 2815 * 298;
        assert!((raw_to_celsius(raw) - 25.0).abs() < 1e-3);
        assert!((raw_to_celsius(MID_SCALE) + 273.0).abs() < 1e-3);
    }
}
