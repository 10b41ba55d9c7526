//! Bus interface abstraction for the AD7797 driver.

pub mod spi;

use crate::config::BusConfig;
use crate::registers::{Communications, RegisterWidth};

/// Abstraction over the bus and GPIO access required by the driver.
///
/// A transaction is the span between [`acquire`](Self::acquire) and
/// [`release`](Self::release); register exchanges only happen inside one.
pub trait Ad7797Interface {
    /// Error type produced by the concrete bus implementation.
    type Error;

    /// Starts the transport and drives chip-select high.
    fn start(&mut self) -> core::result::Result<(), Self::Error>;

    /// Stops the transport.
    fn stop(&mut self) -> core::result::Result<(), Self::Error>;

    /// Takes ownership of the bus with `config` and asserts chip-select.
    fn acquire(&mut self, config: &BusConfig) -> core::result::Result<(), Self::Error>;

    /// Deasserts chip-select and hands the bus back.
    fn release(&mut self) -> core::result::Result<(), Self::Error>;

    /// Shifts out `data`, discarding the bytes clocked in.
    fn write(&mut self, data: &[u8]) -> core::result::Result<(), Self::Error>;

    /// Fills `buf` with bytes clocked in while shifting out zero bytes.
    fn read(&mut self, buf: &mut [u8]) -> core::result::Result<(), Self::Error>;

    /// Returns `true` while the data-ready line is low.
    fn is_ready(&mut self) -> core::result::Result<bool, Self::Error>;

    /// Reads a register, assembling the bytes most significant first.
    fn read_register(
        &mut self,
        address: u8,
        width: RegisterWidth,
    ) -> core::result::Result<u32, Self::Error> {
        self.write(&[u8::from(Communications::read_of(address))])?;

        let mut raw = [0u8; 3];
        let raw = &mut raw[..width.bytes()];
        self.read(raw)?;

        Ok(raw
            .iter()
            .fold(0u32, |value, &byte| (value << 8) | u32::from(byte)))
    }

    /// Writes the low `width` bytes of `value`, most significant first.
    fn write_register(
        &mut self,
        address: u8,
        value: u32,
        width: RegisterWidth,
    ) -> core::result::Result<(), Self::Error> {
        let count = width.bytes();
        let mut frame = [0u8; 4];
        frame[0] = u8::from(Communications::write_of(address));
        for (i, byte) in frame[1..=count].iter_mut().enumerate() {
            *byte = (value >> (8 * (count - 1 - i))) as u8;
        }

        self.write(&frame[..=count])
    }
}

#[cfg(test)]
mod tests {
    use super::Ad7797Interface;
    use crate::config::BusConfig;
    use crate::registers::RegisterWidth;
    use core::convert::Infallible;

    /// Loops written frames back into the register they addressed.
    struct LoopbackRegisters {
        registers: [[u8; 3]; 8],
        pending_read: Option<usize>,
        last_frame: [u8; 4],
        last_frame_len: usize,
    }

    impl LoopbackRegisters {
        fn new() -> Self {
            Self {
                registers: [[0; 3]; 8],
                pending_read: None,
                last_frame: [0; 4],
                last_frame_len: 0,
            }
        }
    }

    impl Ad7797Interface for LoopbackRegisters {
        type Error = Infallible;

        fn start(&mut self) -> Result<(), Self::Error> {
            Ok(())
        }

        fn stop(&mut self) -> Result<(), Self::Error> {
            Ok(())
        }

        fn acquire(&mut self, _config: &BusConfig) -> Result<(), Self::Error> {
            Ok(())
        }

        fn release(&mut self) -> Result<(), Self::Error> {
            Ok(())
        }

        fn write(&mut self, data: &[u8]) -> Result<(), Self::Error> {
            let command = data[0];
            let address = usize::from((command >> 3) & 0x07);
            if command & 0x40 != 0 {
                assert_eq!(data.len(), 1, "read command carries no payload");
                self.pending_read = Some(address);
            } else {
                let payload = &data[1..];
                self.registers[address] = [0; 3];
                self.registers[address][..payload.len()].copy_from_slice(payload);
            }
            self.last_frame[..data.len()].copy_from_slice(data);
            self.last_frame_len = data.len();
            Ok(())
        }

        fn read(&mut self, buf: &mut [u8]) -> Result<(), Self::Error> {
            let address = self.pending_read.take().expect("read without command");
            buf.copy_from_slice(&self.registers[address][..buf.len()]);
            Ok(())
        }

        fn is_ready(&mut self) -> Result<bool, Self::Error> {
            Ok(true)
        }
    }

    #[test]
    fn write_transmits_most_significant_byte_first() {
        let mut iface = LoopbackRegisters::new();
        iface
            .write_register(0x06, 0x00AB_CDEF, RegisterWidth::Three)
            .unwrap();
        assert_eq!(&iface.last_frame[..iface.last_frame_len], &[0x30, 0xAB, 0xCD, 0xEF]);
    }

    #[test]
    fn write_truncates_to_declared_width() {
        let mut iface = LoopbackRegisters::new();
        iface
            .write_register(0x01, 0x0012_3456, RegisterWidth::Two)
            .unwrap();
        assert_eq!(&iface.last_frame[..iface.last_frame_len], &[0x08, 0x34, 0x56]);
    }

    #[test]
    fn equal_width_round_trip_is_exact() {
        let mut iface = LoopbackRegisters::new();
        let cases = [
            (0x02, 0xA5, RegisterWidth::One),
            (0x01, 0x2003, RegisterWidth::Two),
            (0x07, 0x0055_AA01, RegisterWidth::Three),
        ];

        for (address, value, width) in cases {
            iface.write_register(address, value, width).unwrap();
            assert_eq!(iface.read_register(address, width).unwrap(), value);
        }
    }

    #[test]
    fn round_trip_keeps_only_low_bits() {
        let mut iface = LoopbackRegisters::new();
        iface
            .write_register(0x06, 0xFFEE_DDCC, RegisterWidth::Three)
            .unwrap();
        assert_eq!(
            iface.read_register(0x06, RegisterWidth::Three).unwrap(),
            0xFFEE_DDCC & RegisterWidth::Three.mask()
        );
    }

    #[test]
    fn read_sends_read_command() {
        let mut iface = LoopbackRegisters::new();
        iface.registers[4] = [0x5B, 0, 0];
        assert_eq!(iface.read_register(0x04, RegisterWidth::One).unwrap(), 0x5B);
        assert_eq!(&iface.last_frame[..iface.last_frame_len], &[0x60]);
    }
}
