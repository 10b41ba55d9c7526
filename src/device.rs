//! High-level AD7797 device driver implementation.

use crate::config::{BusConfig, Config};
use crate::conversion::{raw_to_celsius, raw_to_volts};
use crate::error::{Error, Result};
use crate::interface::spi::{SpiInterface, SpiInterfaceError};
use crate::interface::Ad7797Interface;
use crate::params::{
    CalibrationMode,
    Channel,
    ClockSource,
    OperatingMode,
    Polarity,
    PowerState,
    UpdateRate,
};
use crate::registers::{
    Configuration,
    Mode,
    RegisterWidth,
    Status,
    CONF_CHANNEL_MASK,
    DUMP_WIDTHS,
    EXPECTED_ID,
    ID_MASK,
    REGISTER_COUNT,
    REG_CONF,
    REG_DATA,
    REG_FULL_SCALE,
    REG_ID,
    REG_MODE,
    REG_OFFSET,
    REG_STATUS,
    RESET_PATTERN,
};
use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};
use embedded_hal::spi::SpiBus;

// Settle time after the reset pattern before the chip accepts commands (milliseconds).
const RESET_SETTLE_DELAY_MS: u32 = 1;
// Poll period of the bounded ready-wait (microseconds).
const READY_POLL_INTERVAL_US: u32 = 10;

/// High-level synchronous driver for the AD7797 ADC.
///
/// The driver is the only writer of the mode register; the clock source, update rate,
/// polarity and operating mode it holds mirror what it last programmed. Anything else
/// writing to the chip invalidates that shadow.
pub struct Ad7797<IFACE> {
    interface: IFACE,
    config: Config,
    polarity: Polarity,
    mode: OperatingMode,
}

/// Contents of all eight registers read in one pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterDump {
    /// Raw values indexed by register address, read at the widths in [`DUMP_WIDTHS`].
    pub values: [u32; REGISTER_COUNT],
}

impl RegisterDump {
    /// Returns the raw value read from `address`.
    pub fn value(&self, address: u8) -> Option<u32> {
        self.values.get(usize::from(address)).copied()
    }

    /// Decoded `STATUS` register.
    pub fn status(&self) -> Status {
        Status::from(self.values[usize::from(REG_STATUS)] as u8)
    }

    /// Raw `ID` register.
    pub fn id(&self) -> u8 {
        self.values[usize::from(REG_ID)] as u8
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for RegisterDump {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(
            f,
            "RegisterDump {{\n    STATUS: {=u32:#04x},\n    MODE: {=u32:#08x},\n    CONF: {=u32:#08x},\n    DATA: {=u32:#08x},\n    ID: {=u32:#04x},\n    REG5: {=u32:#04x},\n    OFFSET: {=u32:#08x},\n    FULL_SCALE: {=u32:#08x}\n}}",
            self.values[0],
            self.values[1],
            self.values[2],
            self.values[3],
            self.values[4],
            self.values[5],
            self.values[6],
            self.values[7]
        );
    }
}

impl<IFACE> Ad7797<IFACE> {
    // ==================================================================
    // == Driver Construction & Ownership ===============================
    // ==================================================================
    /// Creates a new driver instance from the provided bus interface.
    ///
    /// Nothing is sent until [`init`](Self::init) is called.
    pub fn new(interface: IFACE, config: Config) -> Self {
        Self {
            interface,
            config,
            polarity: Polarity::Bipolar,
            mode: OperatingMode::Single,
        }
    }

    /// Consumes the driver and returns the owned interface.
    pub fn release(self) -> (IFACE, Config) {
        (self.interface, self.config)
    }

    /// Provides mutable access to the underlying interface.
    pub fn interface_mut(&mut self) -> &mut IFACE {
        &mut self.interface
    }

    /// Swaps in another bus interface, returning the previous one.
    pub fn replace_interface(&mut self, interface: IFACE) -> IFACE {
        core::mem::replace(&mut self.interface, interface)
    }

    // ==================================================================
    // == Cached State ==================================================
    // ==================================================================
    /// Returns a shared reference to the active configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Bus settings used for every transaction.
    pub fn bus_config(&self) -> &BusConfig {
        &self.config.bus
    }

    /// Clock source written with conversion commands.
    pub fn clock_source(&self) -> ClockSource {
        self.config.clock_source
    }

    /// Filter update rate written with conversion commands.
    pub fn update_rate(&self) -> UpdateRate {
        self.config.update_rate
    }

    /// Output coding last programmed through [`set_polarity`](Ad7797::set_polarity).
    pub fn polarity(&self) -> Polarity {
        self.polarity
    }

    /// Operating mode last written to the chip.
    pub fn mode(&self) -> OperatingMode {
        self.mode
    }

    /// Selects the clock source used by subsequent conversions.
    ///
    /// Takes effect with the next mode register write; a continuous conversion that is
    /// already running keeps its clock until single mode is re-armed.
    pub fn set_clock_source(&mut self, clock_source: ClockSource) {
        self.config.clock_source = clock_source;
    }

    /// Selects the update rate used by subsequent conversions.
    pub fn set_update_rate(&mut self, update_rate: UpdateRate) {
        self.config.update_rate = update_rate;
    }

    /// Converts a raw result to volts using the cached polarity.
    pub fn to_volts(&self, raw: u32, vref: f32) -> f32 {
        raw_to_volts(raw, self.polarity, vref)
    }
}

impl<SPI, CS, RDY> Ad7797<SpiInterface<SPI, CS, RDY>>
where
    SPI: SpiBus,
    CS: OutputPin,
    RDY: InputPin,
{
    // ==================================================================
    // == SPI Convenience Constructors ==================================
    // ==================================================================
    /// Convenience constructor for SPI transports.
    pub fn new_spi(spi: SPI, cs: CS, ready: RDY, config: Config) -> Self {
        Self::new(SpiInterface::new(spi, cs, ready), config)
    }

    /// Releases the driver, returning the SPI bus, both pins and configuration.
    pub fn release_spi(self) -> (SPI, CS, RDY, Config) {
        let (iface, config) = self.release();
        let (spi, cs, ready) = iface.into_parts();
        (spi, cs, ready, config)
    }

    /// Rebinds the chip-select and data-ready pins, returning the previous ones.
    pub fn rebind_pins(&mut self, cs: CS, ready: RDY) -> (CS, RDY) {
        self.interface.rebind_pins(cs, ready)
    }

    /// Rebinds both pins, then runs [`init`](Ad7797::init).
    ///
    /// Returns the identity check result together with the pins that were replaced.
    pub fn init_with_pins(
        &mut self,
        cs: CS,
        ready: RDY,
        delay: &mut impl DelayNs,
    ) -> Result<(bool, (CS, RDY)), SpiInterfaceError<SPI::Error, CS::Error, RDY::Error>> {
        let previous = self.rebind_pins(cs, ready);
        let identified = self.init(delay)?;
        Ok((identified, previous))
    }
}

impl<IFACE, CommE> Ad7797<IFACE>
where
    IFACE: Ad7797Interface<Error = CommE>,
{
    // ==================================================================
    // == Initialization & Global Configuration ==========================
    // ==================================================================
    /// Starts the bus, resets the chip and verifies its identity.
    ///
    /// Returns `Ok(false)` when the `ID` register does not hold the AD7797 identity; the
    /// caller must not issue conversions in that case.
    pub fn init(&mut self, delay: &mut impl DelayNs) -> Result<bool, CommE> {
        self.config.validate().map_err(|_| Error::InvalidConfig)?;

        self.interface.start()?;
        self.reset(delay)?;

        let identified = self.check_id()?;
        if !identified {
            warn!("AD7797 identity mismatch");
        }
        Ok(identified)
    }

    /// Stops the bus transport.
    pub fn shutdown(&mut self) -> Result<(), CommE> {
        self.interface.stop().map_err(Error::from)
    }

    /// Sends the reset pattern and waits for the chip to settle.
    ///
    /// All registers return to their power-on values; the cached mode is left untouched so
    /// the next conversion call re-programs the mode register.
    pub fn reset(&mut self, delay: &mut impl DelayNs) -> Result<(), CommE> {
        self.transaction(|iface| Ok(iface.write(&RESET_PATTERN)?))?;
        delay.delay_ms(RESET_SETTLE_DELAY_MS);
        debug!("reset issued");
        Ok(())
    }

    /// Changes the serial clock frequency used from the next transaction on.
    pub fn set_bus_frequency(&mut self, frequency_hz: u32) -> Result<(), CommE> {
        if frequency_hz == 0 {
            return Err(Error::InvalidConfig);
        }

        self.config.bus = BusConfig::new(frequency_hz);
        Ok(())
    }

    // ==================================================================
    // == Identification & Status =======================================
    // ==================================================================
    /// Reads the raw `ID` register.
    pub fn read_id(&mut self) -> Result<u8, CommE> {
        let id = self.read_register(REG_ID, RegisterWidth::One)?;
        Ok(id as u8)
    }

    /// Returns `true` when the `ID` register matches the AD7797 identity.
    pub fn check_id(&mut self) -> Result<bool, CommE> {
        let id = self.read_id()?;
        trace!("ID = {=u8:#04x}", id);
        Ok(id & ID_MASK == EXPECTED_ID)
    }

    /// Reads the `STATUS` register.
    pub fn read_status(&mut self) -> Result<Status, CommE> {
        let raw = self.read_register(REG_STATUS, RegisterWidth::One)?;
        Ok(Status::from(raw as u8))
    }

    /// Selects the chip and spins until the data-ready line goes low.
    ///
    /// There is no timeout: a chip that never signals ready blocks the caller forever.
    /// Use [`wait_ready_timeout`](Self::wait_ready_timeout) for a bounded wait.
    pub fn wait_ready(&mut self) -> Result<(), CommE> {
        self.transaction(Self::poll_ready)
    }

    /// Selects the chip and polls the data-ready line for at most `timeout_us` microseconds.
    pub fn wait_ready_timeout(
        &mut self,
        delay: &mut impl DelayNs,
        timeout_us: u32,
    ) -> Result<(), CommE> {
        self.transaction(|iface| Self::poll_ready_bounded(iface, delay, timeout_us))
    }

    // ==================================================================
    // == Power, Channel & Coding =======================================
    // ==================================================================
    /// Puts the chip into idle or power-down mode.
    ///
    /// The mode register is read as 16 bits and written back as 24 bits.
    pub fn set_power(&mut self, state: PowerState) -> Result<(), CommE> {
        let current = self.read_register(REG_MODE, RegisterWidth::Two)?;

        let mut mode = Mode::from(current as u16);
        mode.set_mode(state.operating_mode());

        self.write_register(REG_MODE, u32::from(u16::from(mode)), RegisterWidth::Three)?;
        self.mode = state.operating_mode();
        debug!("power state {}", state);
        Ok(())
    }

    /// Routes `channel` to the converter, leaving the other configuration bits unchanged.
    ///
    /// [`Channel`] only names the documented inputs; use
    /// [`select_channel_code`](Self::select_channel_code) to program a reserved code.
    pub fn select_channel(&mut self, channel: Channel) -> Result<(), CommE> {
        self.update_configuration(|conf| conf.set_channel(channel))
    }

    /// Writes the raw 3-bit channel `code` (0 to 7), leaving the other configuration bits
    /// unchanged.
    pub fn select_channel_code(&mut self, code: u8) -> Result<(), CommE> {
        if u16::from(code) > CONF_CHANNEL_MASK {
            return Err(Error::InvalidConfig);
        }

        self.update_configuration(|conf| {
            let raw = (u16::from(*conf) & !CONF_CHANNEL_MASK) | u16::from(code);
            *conf = Configuration::from(raw);
        })
    }

    /// Selects bipolar or unipolar output coding.
    pub fn set_polarity(&mut self, polarity: Polarity) -> Result<(), CommE> {
        self.update_configuration(|conf| conf.set_polarity(polarity))?;
        self.polarity = polarity;
        Ok(())
    }

    /// Enables or disables the burnout current sources.
    pub fn set_burnout_current(&mut self, enabled: bool) -> Result<(), CommE> {
        self.update_configuration(|conf| conf.set_burnout(enabled))
    }

    // ==================================================================
    // == Calibration ===================================================
    // ==================================================================
    /// Runs `mode` calibration on `channel` and blocks until it completes.
    ///
    /// The chip drops to idle mode once the calibration is done.
    pub fn calibrate(&mut self, mode: CalibrationMode, channel: Channel) -> Result<(), CommE> {
        self.calibrate_with(mode, channel, Self::poll_ready)
    }

    /// Like [`calibrate`](Self::calibrate), but gives up after `timeout_us` microseconds
    /// without data-ready.
    pub fn calibrate_timeout(
        &mut self,
        mode: CalibrationMode,
        channel: Channel,
        delay: &mut impl DelayNs,
        timeout_us: u32,
    ) -> Result<(), CommE> {
        self.calibrate_with(mode, channel, |iface| {
            Self::poll_ready_bounded(iface, &mut *delay, timeout_us)
        })
    }

    /// Reads the 24-bit offset calibration coefficient.
    pub fn read_offset(&mut self) -> Result<u32, CommE> {
        self.read_register(REG_OFFSET, RegisterWidth::Three)
    }

    /// Overwrites the 24-bit offset calibration coefficient.
    pub fn write_offset(&mut self, value: u32) -> Result<(), CommE> {
        self.write_register(REG_OFFSET, value, RegisterWidth::Three)
    }

    /// Reads the 24-bit full-scale calibration coefficient.
    pub fn read_full_scale(&mut self) -> Result<u32, CommE> {
        self.read_register(REG_FULL_SCALE, RegisterWidth::Three)
    }

    /// Overwrites the 24-bit full-scale calibration coefficient.
    pub fn write_full_scale(&mut self, value: u32) -> Result<(), CommE> {
        self.write_register(REG_FULL_SCALE, value, RegisterWidth::Three)
    }

    // ==================================================================
    // == Data Acquisition ==============================================
    // ==================================================================
    /// Starts a single conversion and returns the raw 24-bit result.
    pub fn single_conversion(&mut self) -> Result<u32, CommE> {
        self.single_conversion_with(Self::poll_ready)
    }

    /// Like [`single_conversion`](Self::single_conversion), but gives up after
    /// `timeout_us` microseconds without data-ready.
    pub fn single_conversion_timeout(
        &mut self,
        delay: &mut impl DelayNs,
        timeout_us: u32,
    ) -> Result<u32, CommE> {
        self.single_conversion_with(|iface| {
            Self::poll_ready_bounded(iface, &mut *delay, timeout_us)
        })
    }

    /// Returns the next result of continuous conversion, arming continuous mode first if the
    /// chip is not converting continuously yet.
    pub fn continuous_conversion(&mut self) -> Result<u32, CommE> {
        self.continuous_conversion_with(Self::poll_ready)
    }

    /// Like [`continuous_conversion`](Self::continuous_conversion), but gives up after
    /// `timeout_us` microseconds without data-ready.
    pub fn continuous_conversion_timeout(
        &mut self,
        delay: &mut impl DelayNs,
        timeout_us: u32,
    ) -> Result<u32, CommE> {
        self.continuous_conversion_with(|iface| {
            Self::poll_ready_bounded(iface, &mut *delay, timeout_us)
        })
    }

    /// Arms continuous mode and returns the truncated mean of `samples` results, all read
    /// inside one transaction.
    pub fn continuous_read_average(&mut self, samples: u32) -> Result<u32, CommE> {
        self.continuous_read_average_with(samples, Self::poll_ready)
    }

    /// Like [`continuous_read_average`](Self::continuous_read_average), but gives up when
    /// any one sample takes longer than `timeout_us` microseconds.
    pub fn continuous_read_average_timeout(
        &mut self,
        samples: u32,
        delay: &mut impl DelayNs,
        timeout_us: u32,
    ) -> Result<u32, CommE> {
        self.continuous_read_average_with(samples, |iface| {
            Self::poll_ready_bounded(iface, &mut *delay, timeout_us)
        })
    }

    /// Measures the on-chip temperature sensor in degrees Celsius.
    ///
    /// Switches to bipolar coding and the temperature channel, which stay selected afterwards.
    pub fn read_temperature(&mut self) -> Result<f32, CommE> {
        self.set_polarity(Polarity::Bipolar)?;
        self.select_channel(Channel::Temperature)?;
        let raw = self.single_conversion()?;
        Ok(raw_to_celsius(raw))
    }

    // ==================================================================
    // == Diagnostics ===================================================
    // ==================================================================
    /// Reads every register in a single transaction and logs the values.
    pub fn dump_registers(&mut self) -> Result<RegisterDump, CommE> {
        let mut values = [0u32; REGISTER_COUNT];
        self.transaction(|iface| {
            for (address, (value, width)) in values.iter_mut().zip(DUMP_WIDTHS).enumerate() {
                *value = iface.read_register(address as u8, width)?;
            }
            Ok(())
        })?;

        for (address, value) in values.iter().enumerate() {
            info!("register {=usize}: {=u32:#x}", address, *value);
        }
        Ok(RegisterDump { values })
    }

    // ==================================================================
    // == Register Access ===============================================
    // ==================================================================
    /// Reads one register inside its own transaction.
    pub fn read_register(&mut self, address: u8, width: RegisterWidth) -> Result<u32, CommE> {
        self.transaction(|iface| Ok(iface.read_register(address, width)?))
    }

    /// Writes one register inside its own transaction.
    pub fn write_register(
        &mut self,
        address: u8,
        value: u32,
        width: RegisterWidth,
    ) -> Result<(), CommE> {
        self.transaction(|iface| Ok(iface.write_register(address, value, width)?))
    }

    // ==================================================================
    // == Internal Helpers ==============================================
    // ==================================================================
    /// Runs `exchange` between bus acquisition and release.
    ///
    /// The transaction is closed even when `exchange` fails; its error takes precedence
    /// over one raised while closing.
    fn transaction<T, F>(&mut self, exchange: F) -> Result<T, CommE>
    where
        F: FnOnce(&mut IFACE) -> Result<T, CommE>,
    {
        self.interface.acquire(&self.config.bus)?;
        let outcome = exchange(&mut self.interface);
        let closed = self.interface.release();

        let value = outcome?;
        closed?;
        Ok(value)
    }

    fn poll_ready(iface: &mut IFACE) -> Result<(), CommE> {
        while !iface.is_ready()? {
            core::hint::spin_loop();
        }
        Ok(())
    }

    fn poll_ready_bounded(
        iface: &mut IFACE,
        delay: &mut impl DelayNs,
        timeout_us: u32,
    ) -> Result<(), CommE> {
        let mut waited_us = 0u32;
        while !iface.is_ready()? {
            if waited_us >= timeout_us {
                warn!("no data-ready after {=u32} us", waited_us);
                return Err(Error::Timeout);
            }

            delay.delay_us(READY_POLL_INTERVAL_US);
            waited_us = waited_us.saturating_add(READY_POLL_INTERVAL_US);
        }
        Ok(())
    }

    fn calibrate_with<W>(
        &mut self,
        mode: CalibrationMode,
        channel: Channel,
        mut wait: W,
    ) -> Result<(), CommE>
    where
        W: FnMut(&mut IFACE) -> Result<(), CommE>,
    {
        self.select_channel(channel)?;

        let current = self.read_register(REG_MODE, RegisterWidth::Two)?;
        let mut register = Mode::from(current as u16);
        register.set_mode(mode.operating_mode());
        let command = u32::from(u16::from(register));

        debug!("calibration {} started", mode);
        self.transaction(|iface| {
            iface.write_register(REG_MODE, command, RegisterWidth::Two)?;
            wait(iface)
        })?;
        self.mode = OperatingMode::Idle;
        debug!("calibration {} done", mode);
        Ok(())
    }

    fn single_conversion_with<W>(&mut self, mut wait: W) -> Result<u32, CommE>
    where
        W: FnMut(&mut IFACE) -> Result<(), CommE>,
    {
        let command = self.conversion_command(OperatingMode::Single);
        self.mode = OperatingMode::Single;

        self.transaction(|iface| {
            iface.write_register(REG_MODE, command, RegisterWidth::Two)?;
            wait(iface)?;
            Ok(iface.read_register(REG_DATA, RegisterWidth::Three)?)
        })
    }

    fn continuous_conversion_with<W>(&mut self, mut wait: W) -> Result<u32, CommE>
    where
        W: FnMut(&mut IFACE) -> Result<(), CommE>,
    {
        let arm = if self.mode != OperatingMode::Continuous {
            trace!("continuous mode armed");
            Some(self.conversion_command(OperatingMode::Continuous))
        } else {
            None
        };
        self.mode = OperatingMode::Continuous;

        self.transaction(|iface| {
            if let Some(command) = arm {
                iface.write_register(REG_MODE, command, RegisterWidth::Two)?;
            }
            wait(iface)?;
            Ok(iface.read_register(REG_DATA, RegisterWidth::Three)?)
        })
    }

    fn continuous_read_average_with<W>(&mut self, samples: u32, mut wait: W) -> Result<u32, CommE>
    where
        W: FnMut(&mut IFACE) -> Result<(), CommE>,
    {
        if samples == 0 {
            return Err(Error::InvalidSampleCount);
        }

        let command = self.conversion_command(OperatingMode::Continuous);
        self.mode = OperatingMode::Continuous;

        let sum = self.transaction(|iface| {
            iface.write_register(REG_MODE, command, RegisterWidth::Two)?;

            let mut sum = 0u64;
            for _ in 0..samples {
                wait(iface)?;
                sum += u64::from(iface.read_register(REG_DATA, RegisterWidth::Three)?);
            }
            Ok(sum)
        })?;

        Ok((sum / u64::from(samples)) as u32)
    }

    fn conversion_command(&self, mode: OperatingMode) -> u32 {
        let command = Mode::command(mode, self.config.clock_source, self.config.update_rate);
        u32::from(u16::from(command))
    }

    fn update_configuration<F>(&mut self, mut mutate: F) -> Result<(), CommE>
    where
        F: FnMut(&mut Configuration),
    {
        let current = self.read_register(REG_CONF, RegisterWidth::Two)?;

        let mut conf = Configuration::from(current as u16);
        mutate(&mut conf);

        self.write_register(REG_CONF, u32::from(u16::from(conf)), RegisterWidth::Two)
    }
}
