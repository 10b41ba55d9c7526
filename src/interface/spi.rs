//! SPI interface implementation built on top of `embedded-hal` `SpiBus` and GPIO pins.
//!
//! The driver keeps chip-select asserted while it polls the data-ready line, so it drives the
//! chip-select pin itself instead of going through `SpiDevice`.

use embedded_hal::digital::{InputPin, OutputPin};
use embedded_hal::spi::SpiBus;

use super::Ad7797Interface;
use crate::config::BusConfig;

/// Hook invoked to reconfigure the bus when the requested [`BusConfig`] changes.
pub type BusSetup<SPI> = fn(&mut SPI, &BusConfig);

/// Errors raised by the SPI transport or its two GPIO lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpiInterfaceError<SpiE, CsE, RdyE> {
    /// SPI bus error.
    Spi(SpiE),
    /// Chip-select pin error.
    ChipSelect(CsE),
    /// Data-ready pin error.
    DataReady(RdyE),
}

/// SPI-based interface implementation for the AD7797 driver.
pub struct SpiInterface<SPI, CS, RDY> {
    spi: SPI,
    cs: CS,
    ready: RDY,
    setup: Option<BusSetup<SPI>>,
    applied: Option<BusConfig>,
}

impl<SPI, CS, RDY> SpiInterface<SPI, CS, RDY> {
    /// Creates a new interface from an exclusively owned bus, the chip-select output and the
    /// data-ready input (usually the pin multiplexed with MISO).
    pub const fn new(spi: SPI, cs: CS, ready: RDY) -> Self {
        Self {
            spi,
            cs,
            ready,
            setup: None,
            applied: None,
        }
    }

    /// Installs a hook that applies frequency changes to the bus.
    pub fn with_bus_setup(mut self, setup: BusSetup<SPI>) -> Self {
        self.setup = Some(setup);
        self.applied = None;
        self
    }

    /// Swaps the chip-select and data-ready pins, returning the previous ones.
    pub fn rebind_pins(&mut self, cs: CS, ready: RDY) -> (CS, RDY) {
        let cs = core::mem::replace(&mut self.cs, cs);
        let ready = core::mem::replace(&mut self.ready, ready);
        (cs, ready)
    }

    /// Provides mutable access to the wrapped bus.
    pub fn spi_mut(&mut self) -> &mut SPI {
        &mut self.spi
    }

    /// Consumes the interface and returns the bus and both pins.
    pub fn into_parts(self) -> (SPI, CS, RDY) {
        (self.spi, self.cs, self.ready)
    }
}

impl<SPI, CS, RDY> Ad7797Interface for SpiInterface<SPI, CS, RDY>
where
    SPI: SpiBus,
    CS: OutputPin,
    RDY: InputPin,
{
    type Error = SpiInterfaceError<SPI::Error, CS::Error, RDY::Error>;

    fn start(&mut self) -> core::result::Result<(), Self::Error> {
        self.cs.set_high().map_err(SpiInterfaceError::ChipSelect)
    }

    fn stop(&mut self) -> core::result::Result<(), Self::Error> {
        self.spi.flush().map_err(SpiInterfaceError::Spi)
    }

    fn acquire(&mut self, config: &BusConfig) -> core::result::Result<(), Self::Error> {
        if let Some(setup) = self.setup {
            if self.applied != Some(*config) {
                setup(&mut self.spi, config);
                self.applied = Some(*config);
            }
        }

        self.cs.set_low().map_err(SpiInterfaceError::ChipSelect)
    }

    fn release(&mut self) -> core::result::Result<(), Self::Error> {
        let flushed = self.spi.flush().map_err(SpiInterfaceError::Spi);
        self.cs.set_high().map_err(SpiInterfaceError::ChipSelect)?;
        flushed
    }

    fn write(&mut self, data: &[u8]) -> core::result::Result<(), Self::Error> {
        if data.is_empty() {
            return Ok(());
        }

        self.spi.write(data).map_err(SpiInterfaceError::Spi)
    }

    fn read(&mut self, buf: &mut [u8]) -> core::result::Result<(), Self::Error> {
        if buf.is_empty() {
            return Ok(());
        }

        buf.fill(0);
        self.spi.transfer_in_place(buf).map_err(SpiInterfaceError::Spi)
    }

    fn is_ready(&mut self) -> core::result::Result<bool, Self::Error> {
        self.ready.is_low().map_err(SpiInterfaceError::DataReady)
    }
}

#[cfg(test)]
mod tests {
    use super::SpiInterface;
    use crate::config::BusConfig;
    use crate::interface::Ad7797Interface;
    use crate::registers::RegisterWidth;
    use core::sync::atomic::{AtomicU32, Ordering};
    use embedded_hal_mock::eh1::digital::{
        Mock as PinMock, State as PinState, Transaction as PinTransaction,
    };
    use embedded_hal_mock::eh1::spi::{Mock as SpiMock, Transaction as SpiTransaction};

    #[test]
    fn read_register_sends_command_then_reads_payload() {
        let mut spi = SpiMock::new(&[
            SpiTransaction::write(0x58),
            SpiTransaction::transfer_in_place(vec![0x00; 3], vec![0x12, 0x34, 0x56]),
        ]);
        let mut cs = PinMock::new(&[]);
        let mut ready = PinMock::new(&[]);
        let mut interface = SpiInterface::new(spi.clone(), cs.clone(), ready.clone());

        let value = interface.read_register(0x03, RegisterWidth::Three).unwrap();
        assert_eq!(value, 0x12_3456);

        spi.done();
        cs.done();
        ready.done();
    }

    #[test]
    fn write_register_sends_command_and_payload_in_one_frame() {
        let mut spi = SpiMock::new(&[SpiTransaction::write_vec(vec![0x10, 0x10, 0x06])]);
        let mut cs = PinMock::new(&[]);
        let mut ready = PinMock::new(&[]);
        let mut interface = SpiInterface::new(spi.clone(), cs.clone(), ready.clone());

        interface
            .write_register(0x02, 0x1006, RegisterWidth::Two)
            .unwrap();

        spi.done();
        cs.done();
        ready.done();
    }

    #[test]
    fn acquire_and_release_drive_chip_select() {
        let mut spi = SpiMock::new(&[SpiTransaction::flush()]);
        let mut cs = PinMock::new(&[
            PinTransaction::set(PinState::Low),
            PinTransaction::set(PinState::High),
        ]);
        let mut ready = PinMock::new(&[]);
        let mut interface = SpiInterface::new(spi.clone(), cs.clone(), ready.clone());

        interface.acquire(&BusConfig::default()).unwrap();
        interface.release().unwrap();

        spi.done();
        cs.done();
        ready.done();
    }

    #[test]
    fn into_parts_hands_back_bus_and_pins_after_release() {
        let spi = SpiMock::new(&[SpiTransaction::flush()]);
        let cs = PinMock::new(&[
            PinTransaction::set(PinState::Low),
            PinTransaction::set(PinState::High),
        ]);
        let ready = PinMock::new(&[]);
        let mut interface = SpiInterface::new(spi, cs, ready);

        interface.acquire(&BusConfig::default()).unwrap();
        Ad7797Interface::release(&mut interface).unwrap();

        let (mut spi, mut cs, mut ready) = interface.into_parts();
        spi.done();
        cs.done();
        ready.done();
    }

    #[test]
    fn ready_is_reported_while_line_is_low() {
        let mut spi = SpiMock::new(&[]);
        let mut cs = PinMock::new(&[]);
        let mut ready = PinMock::new(&[
            PinTransaction::get(PinState::High),
            PinTransaction::get(PinState::Low),
        ]);
        let mut interface = SpiInterface::new(spi.clone(), cs.clone(), ready.clone());

        assert!(!interface.is_ready().unwrap());
        assert!(interface.is_ready().unwrap());

        spi.done();
        cs.done();
        ready.done();
    }

    #[test]
    fn rebind_pins_returns_previous_pins() {
        let mut spi = SpiMock::new(&[]);
        let mut old_cs = PinMock::new(&[]);
        let mut old_ready = PinMock::new(&[]);
        let mut new_cs = PinMock::new(&[PinTransaction::set(PinState::High)]);
        let mut new_ready = PinMock::new(&[]);
        let mut interface = SpiInterface::new(spi.clone(), old_cs.clone(), old_ready.clone());

        let (_previous_cs, _previous_ready) =
            interface.rebind_pins(new_cs.clone(), new_ready.clone());
        interface.start().unwrap();

        spi.done();
        old_cs.done();
        old_ready.done();
        new_cs.done();
        new_ready.done();
    }

    static APPLIED_FREQUENCY: AtomicU32 = AtomicU32::new(0);
    static SETUP_CALLS: AtomicU32 = AtomicU32::new(0);

    fn record_setup(_spi: &mut SpiMock<u8>, config: &BusConfig) {
        APPLIED_FREQUENCY.store(config.frequency_hz(), Ordering::SeqCst);
        SETUP_CALLS.fetch_add(1, Ordering::SeqCst);
    }

    #[test]
    fn bus_setup_runs_only_when_config_changes() {
        let mut spi = SpiMock::new(&[
            SpiTransaction::flush(),
            SpiTransaction::flush(),
            SpiTransaction::flush(),
        ]);
        let mut cs = PinMock::new(&[
            PinTransaction::set(PinState::Low),
            PinTransaction::set(PinState::High),
            PinTransaction::set(PinState::Low),
            PinTransaction::set(PinState::High),
            PinTransaction::set(PinState::Low),
            PinTransaction::set(PinState::High),
        ]);
        let mut ready = PinMock::new(&[]);
        let mut interface =
            SpiInterface::new(spi.clone(), cs.clone(), ready.clone()).with_bus_setup(record_setup);

        let slow = BusConfig::new(500_000);
        let fast = BusConfig::new(2_000_000);
        for config in [slow, slow, fast] {
            interface.acquire(&config).unwrap();
            interface.release().unwrap();
        }

        assert_eq!(SETUP_CALLS.load(Ordering::SeqCst), 2);
        assert_eq!(APPLIED_FREQUENCY.load(Ordering::SeqCst), 2_000_000);

        spi.done();
        cs.done();
        ready.done();
    }
}
