//! Register map definitions for the AD7797 ADC.
#![allow(unused_parens)]

use modular_bitfield::prelude::*;

use crate::params::{Channel, ClockSource, OperatingMode, Polarity, UpdateRate};

/// Register address of `COMMS` (write) and `STATUS` (read).
pub const REG_COMMS: u8 = 0x00;
/// Register address of `STATUS`, shared with `COMMS`.
pub const REG_STATUS: u8 = 0x00;
/// Register address of `MODE`.
pub const REG_MODE: u8 = 0x01;
/// Register address of `CONF`.
pub const REG_CONF: u8 = 0x02;
/// Register address of `DATA`.
pub const REG_DATA: u8 = 0x03;
/// Register address of `ID`.
pub const REG_ID: u8 = 0x04;
/// Register address of `OFFSET`.
pub const REG_OFFSET: u8 = 0x06;
/// Register address of `FULL_SCALE`.
pub const REG_FULL_SCALE: u8 = 0x07;

/// Value held by the `ID` register of an AD7797.
pub const EXPECTED_ID: u8 = 0x5B;
/// Mask applied to the `ID` register before comparison.
pub const ID_MASK: u8 = 0xFF;
/// Channel select field `CONF[2:0]`.
pub const CONF_CHANNEL_MASK: u16 = 0x0007;

/// Pattern that resets the serial interface and all registers.
pub const RESET_PATTERN: [u8; 4] = [0xFF; 4];

/// Number of addressable registers.
pub const REGISTER_COUNT: usize = 8;

/// Width used for each address when dumping the whole map, indexed by address.
pub const DUMP_WIDTHS: [RegisterWidth; REGISTER_COUNT] = [
    RegisterWidth::One,
    RegisterWidth::Three,
    RegisterWidth::Three,
    RegisterWidth::Three,
    RegisterWidth::One,
    RegisterWidth::One,
    RegisterWidth::Three,
    RegisterWidth::Three,
];

/// Number of bytes exchanged after the command byte.
///
/// The width is chosen per access, not per address: the chip accepts the mode register
/// both as a 2-byte and a 3-byte write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RegisterWidth {
    /// 8-bit access.
    One = 1,
    /// 16-bit access.
    Two = 2,
    /// 24-bit access.
    Three = 3,
}

impl RegisterWidth {
    /// Returns the number of payload bytes.
    pub const fn bytes(self) -> usize {
        self as usize
    }

    /// Returns a mask covering the bits representable at this width.
    pub const fn mask(self) -> u32 {
        match self {
            Self::One => 0xFF,
            Self::Two => 0xFFFF,
            Self::Three => 0x00FF_FFFF,
        }
    }
}

/// Bitfield representation of the `COMMS` register (address `0x00`, write-only).
///
/// Every access starts with this byte.
#[allow(unused_parens)]
#[bitfield]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Communications {
    #[skip]
    __: B2,
    // Continuous read of the data register (bit 2).
    pub continuous_read: bool,
    // Register address (bits 5:3).
    pub address: B3,
    // Read operation when set (bit 6).
    pub read: bool,
    // Write enable, must be zero for the byte to be accepted (bit 7).
    pub write_enable_n: bool,
}

impl Communications {
    /// Builds the command byte for a read of `address`.
    pub fn read_of(address: u8) -> Self {
        Self::new().with_address(address & 0x07).with_read(true)
    }

    /// Builds the command byte for a write of `address`.
    pub fn write_of(address: u8) -> Self {
        Self::new().with_address(address & 0x07).with_read(false)
    }
}

impl From<u8> for Communications {
    fn from(value: u8) -> Self {
        Self::from_bytes([value])
    }
}

impl From<Communications> for u8 {
    fn from(value: Communications) -> Self {
        value.into_bytes()[0]
    }
}

/// Bitfield representation of the `STATUS` register (address `0x00`, read-only).
#[allow(unused_parens)]
#[bitfield]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Status {
    // Channel of the current conversion (bits 2:0).
    pub channel_bits: B3,
    // Part identifier bit, set on the AD7797 (bit 3).
    pub part_bit: bool,
    #[skip]
    __: B2,
    // Overrange or underrange on the last result (bit 6).
    pub error: bool,
    // Cleared when a result is available (bit 7).
    pub not_ready: bool,
}

impl Status {
    /// Returns `true` when a conversion result is waiting in the data register.
    pub fn data_ready(self) -> bool {
        !self.not_ready()
    }
}

impl From<u8> for Status {
    fn from(value: u8) -> Self {
        Self::from_bytes([value])
    }
}

impl From<Status> for u8 {
    fn from(value: Status) -> Self {
        value.into_bytes()[0]
    }
}

/// Bitfield representation of the `MODE` register (address `0x01`, 16-bit).
#[allow(unused_parens)]
#[bitfield]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mode {
    // Filter update rate (bits 3:0).
    pub rate: UpdateRate,
    #[skip]
    __: B2,
    // Clock source (bits 7:6).
    pub clock_source: ClockSource,
    #[skip]
    __: B5,
    // Operating mode (bits 15:13).
    pub mode: OperatingMode,
}

impl Mode {
    /// Builds the command word that starts `mode` with the given clock and rate.
    pub fn command(mode: OperatingMode, clock_source: ClockSource, rate: UpdateRate) -> Self {
        Self::new()
            .with_rate(rate)
            .with_clock_source(clock_source)
            .with_mode(mode)
    }
}

impl From<u16> for Mode {
    fn from(value: u16) -> Self {
        Self::from_bytes(value.to_le_bytes())
    }
}

impl From<Mode> for u16 {
    fn from(value: Mode) -> Self {
        u16::from_le_bytes(value.into_bytes())
    }
}

/// Bitfield representation of the `CONF` register (address `0x02`, 16-bit).
#[allow(unused_parens)]
#[bitfield]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Configuration {
    // Input channel (bits 2:0).
    pub channel: Channel,
    #[skip]
    __: B9,
    // Output coding (bit 12).
    pub polarity: Polarity,
    // Burnout current enable (bit 13).
    pub burnout: bool,
    #[skip]
    __: B2,
}

impl From<u16> for Configuration {
    fn from(value: u16) -> Self {
        Self::from_bytes(value.to_le_bytes())
    }
}

impl From<Configuration> for u16 {
    fn from(value: Configuration) -> Self {
        u16::from_le_bytes(value.into_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Command bytes carry the address in bits 5:3 and the read flag in bit 6.
    #[test]
    fn command_bytes_match_datasheet() {
        assert_eq!(u8::from(Communications::read_of(REG_ID)), 0x60);
        assert_eq!(u8::from(Communications::read_of(REG_DATA)), 0x58);
        assert_eq!(u8::from(Communications::write_of(REG_MODE)), 0x08);
        assert_eq!(u8::from(Communications::write_of(REG_CONF)), 0x10);
        assert_eq!(u8::from(Communications::read_of(0x0F)), 0x78);
    }

    #[test]
    fn mode_command_layout() {
        let mode = Mode::command(
            OperatingMode::Single,
            ClockSource::Internal,
            UpdateRate::Hz123,
        );
        assert_eq!(u16::from(mode), 0x2003);

        let mode = Mode::command(
            OperatingMode::Continuous,
            ClockSource::ExternalDiv2,
            UpdateRate::Hz4,
        );
        assert_eq!(u16::from(mode), 0x00CF);
    }

    #[test]
    fn mode_preserves_reserved_bits() {
        let mut mode = Mode::from(0x1F3A);
        mode.set_mode(OperatingMode::PowerDown);
        assert_eq!(u16::from(mode), 0x7F3A);
    }

    #[test]
    fn configuration_layout_matches_datasheet() {
        let conf = Configuration::from(0x0000)
            .with_channel(Channel::AvddMonitor)
            .with_polarity(Polarity::Unipolar)
            .with_burnout(true);
        assert_eq!(u16::from(conf), 0x3007);
    }

    #[test]
    fn status_flags_decode() {
        let status = Status::from(0b0100_1110);
        assert!(status.data_ready());
        assert!(status.error());
        assert!(status.part_bit());
        assert_eq!(status.channel_bits(), 0b110);

        assert!(!Status::from(0x80).data_ready());
    }

    #[test]
    fn width_masks() {
        assert_eq!(RegisterWidth::One.mask(), 0xFF);
        assert_eq!(RegisterWidth::Two.bytes(), 2);
        assert_eq!(RegisterWidth::Three.mask(), 0xFF_FFFF);
    }
}
