//! Strongly typed parameter enumerations for the AD7797 driver.
//!
//! These enums map directly to datasheet field encodings and are used across
//! [`Config`](crate::config::Config) and the high-level driver APIs. Prefer these
//! types over raw integers to keep register values valid and explicit.
//!
//! # Examples
//!
//! ```rust
//! use ad7797::params::{Channel, ClockSource, UpdateRate};
//!
//! let rate = UpdateRate::Hz123;
//! let clock = ClockSource::Internal;
//! let channel = Channel::Ain;
//! let _ = (rate, clock, channel);
//! ```

use modular_bitfield::prelude::Specifier;

/// Operating modes encoded in `MODE[15:13]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Specifier)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
#[bits = 3]
pub enum OperatingMode {
    /// Continuous conversion mode (power-on default).
    Continuous = 0b000,
    /// Single conversion mode; the chip idles after one result.
    Single = 0b001,
    /// Idle mode.
    Idle = 0b010,
    /// Power-down mode.
    PowerDown = 0b011,
    /// Internal zero-scale calibration.
    InternalZeroScale = 0b100,
    /// Internal full-scale calibration.
    InternalFullScale = 0b101,
    /// System zero-scale calibration.
    SystemZeroScale = 0b110,
    /// System full-scale calibration.
    SystemFullScale = 0b111,
}

/// ADC clock source selections encoded in `MODE[7:6]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Specifier)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
#[bits = 2]
pub enum ClockSource {
    /// Internal 64 kHz clock, not available at the CLK pin.
    Internal = 0b00,
    /// Internal 64 kHz clock, available at the CLK pin.
    InternalWithOutput = 0b01,
    /// External 64 kHz clock.
    External = 0b10,
    /// External clock divided by 2.
    ExternalDiv2 = 0b11,
}

/// Filter update rate selections encoded in `MODE[3:0]`.
///
/// Codes `0x0`, `0x1`, `0x2`, `0x6` and `0x8` are reserved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Specifier)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
#[bits = 4]
pub enum UpdateRate {
    /// 123 Hz, no rejection.
    Hz123 = 0x3,
    /// 62 Hz, no rejection.
    Hz62 = 0x4,
    /// 50 Hz, no rejection.
    Hz50 = 0x5,
    /// 33.2 Hz, no rejection.
    Hz33 = 0x7,
    /// 16.7 Hz, 80 dB rejection (60 Hz only).
    Hz16Reject60 = 0x9,
    /// 16.7 Hz, 65 dB rejection (50 Hz and 60 Hz).
    Hz16Reject50And60 = 0xA,
    /// 12.5 Hz, 66 dB rejection (50 Hz and 60 Hz).
    Hz12 = 0xB,
    /// 10 Hz, 69 dB rejection (50 Hz and 60 Hz).
    Hz10 = 0xC,
    /// 8.33 Hz, 70 dB rejection (50 Hz and 60 Hz).
    Hz8 = 0xD,
    /// 6.25 Hz, 72 dB rejection (50 Hz and 60 Hz).
    Hz6 = 0xE,
    /// 4.17 Hz, 74 dB rejection (50 Hz and 60 Hz).
    Hz4 = 0xF,
}

impl UpdateRate {
    /// Returns the nominal update rate in millihertz.
    pub const fn millihertz(self) -> u32 {
        match self {
            Self::Hz123 => 123_000,
            Self::Hz62 => 62_000,
            Self::Hz50 => 50_000,
            Self::Hz33 => 33_200,
            Self::Hz16Reject60 | Self::Hz16Reject50And60 => 16_700,
            Self::Hz12 => 12_500,
            Self::Hz10 => 10_000,
            Self::Hz8 => 8_330,
            Self::Hz6 => 6_250,
            Self::Hz4 => 4_170,
        }
    }

    /// Returns the power-line rejection in dB, or `None` for the unfiltered rates.
    pub const fn rejection_db(self) -> Option<u8> {
        match self {
            Self::Hz123 | Self::Hz62 | Self::Hz50 | Self::Hz33 => None,
            Self::Hz16Reject60 => Some(80),
            Self::Hz16Reject50And60 => Some(65),
            Self::Hz12 => Some(66),
            Self::Hz10 => Some(69),
            Self::Hz8 => Some(70),
            Self::Hz6 => Some(72),
            Self::Hz4 => Some(74),
        }
    }
}

/// Output coding selection (`CONF.U/B`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Specifier)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
#[bits = 1]
pub enum Polarity {
    /// Offset binary coding around mid-scale (power-on default).
    Bipolar = 0,
    /// Straight binary coding from zero.
    Unipolar = 1,
}

/// Input channel selections encoded in `CONF[2:0]`.
///
/// Codes `0b001`, `0b010`, `0b100` and `0b101` are reserved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Specifier)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
#[bits = 3]
pub enum Channel {
    /// AIN(+) - AIN(-).
    Ain = 0b000,
    /// AIN(-) - AIN(-), used for noise tests.
    AinShorted = 0b011,
    /// On-chip temperature sensor.
    Temperature = 0b110,
    /// AVDD monitor.
    AvddMonitor = 0b111,
}

/// Calibration sequences selectable through `MODE[15:13]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CalibrationMode {
    /// Internal zero-scale calibration.
    InternalZeroScale,
    /// Internal full-scale calibration.
    InternalFullScale,
    /// System zero-scale calibration.
    SystemZeroScale,
    /// System full-scale calibration.
    SystemFullScale,
}

impl CalibrationMode {
    /// Returns the operating mode that triggers this calibration.
    pub const fn operating_mode(self) -> OperatingMode {
        match self {
            Self::InternalZeroScale => OperatingMode::InternalZeroScale,
            Self::InternalFullScale => OperatingMode::InternalFullScale,
            Self::SystemZeroScale => OperatingMode::SystemZeroScale,
            Self::SystemFullScale => OperatingMode::SystemFullScale,
        }
    }
}

/// Low-power states reachable through [`Ad7797::set_power`](crate::Ad7797::set_power).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PowerState {
    /// Idle: modulator and filter held in reset, clocks kept running.
    Idle,
    /// Power-down: all on-chip circuitry off.
    PowerDown,
}

impl PowerState {
    /// Returns the operating mode written for this power state.
    pub const fn operating_mode(self) -> OperatingMode {
        match self {
            Self::Idle => OperatingMode::Idle,
            Self::PowerDown => OperatingMode::PowerDown,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn calibration_modes_map_to_upper_mode_codes() {
        assert_eq!(CalibrationMode::InternalZeroScale.operating_mode() as u8, 4);
        assert_eq!(CalibrationMode::InternalFullScale.operating_mode() as u8, 5);
        assert_eq!(CalibrationMode::SystemZeroScale.operating_mode() as u8, 6);
        assert_eq!(CalibrationMode::SystemFullScale.operating_mode() as u8, 7);
    }

    #[test]
    fn power_states_map_to_idle_and_power_down() {
        assert_eq!(PowerState::Idle.operating_mode() as u8, 2);
        assert_eq!(PowerState::PowerDown.operating_mode() as u8, 3);
    }

    #[test]
    fn filtered_rates_report_rejection() {
        assert_eq!(UpdateRate::Hz123.rejection_db(), None);
        assert_eq!(UpdateRate::Hz16Reject60.rejection_db(), Some(80));
        assert_eq!(UpdateRate::Hz4.millihertz(), 4_170);
    }
}
