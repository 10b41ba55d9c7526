//! Configuration primitives for the AD7797 driver.

use embedded_hal::spi::{Mode, MODE_3};

use crate::params::{ClockSource, UpdateRate};

/// Default serial clock frequency in hertz.
pub const DEFAULT_BUS_FREQUENCY_HZ: u32 = 1_000_000;

/// Bit order on the serial bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BitOrder {
    /// Most significant bit first, the only order the AD7797 supports.
    MsbFirst,
}

/// Serial bus settings applied whenever the driver acquires the bus.
///
/// Bit order and SPI mode are fixed by the chip: the clock idles high and data is sampled
/// on the trailing edge (mode 3). Only the clock frequency can be changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusConfig {
    frequency_hz: u32,
}

impl BusConfig {
    /// Creates bus settings running at `frequency_hz`.
    pub const fn new(frequency_hz: u32) -> Self {
        Self { frequency_hz }
    }

    /// Serial clock frequency in hertz.
    pub const fn frequency_hz(&self) -> u32 {
        self.frequency_hz
    }

    /// Bit order, always MSB first.
    pub const fn bit_order(&self) -> BitOrder {
        BitOrder::MsbFirst
    }

    /// SPI clock polarity and phase, always mode 3.
    pub const fn mode(&self) -> Mode {
        MODE_3
    }
}

impl Default for BusConfig {
    fn default() -> Self {
        Self::new(DEFAULT_BUS_FREQUENCY_HZ)
    }
}

/// User-facing configuration for the AD7797.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    /// Serial bus settings.
    pub bus: BusConfig,
    /// Clock source written with every conversion command.
    pub clock_source: ClockSource,
    /// Filter update rate written with every conversion command.
    pub update_rate: UpdateRate,
}

impl Config {
    /// Begins building a [`Config`] using the builder pattern.
    pub fn new() -> ConfigBuilder {
        ConfigBuilder::new()
    }

    /// Checks whether this configuration can be applied.
    pub fn validate(&self) -> core::result::Result<(), ConfigError> {
        if self.bus.frequency_hz() == 0 {
            return Err(ConfigError::ZeroBusFrequency);
        }

        Ok(())
    }
}

/// Builder for [`Config`] allowing piecemeal construction.
#[derive(Debug, Clone, Copy)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Creates a new builder seeded with [`Config::default()`].
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    /// Overrides the serial clock frequency.
    pub fn bus_frequency(mut self, frequency_hz: u32) -> Self {
        self.config.bus = BusConfig::new(frequency_hz);
        self
    }

    /// Overrides the clock source.
    pub fn clock_source(mut self, clock_source: ClockSource) -> Self {
        self.config.clock_source = clock_source;
        self
    }

    /// Overrides the filter update rate.
    pub fn update_rate(mut self, update_rate: UpdateRate) -> Self {
        self.config.update_rate = update_rate;
        self
    }

    /// Finalizes the builder and returns the [`Config`].
    pub fn build(self) -> Config {
        self.config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bus: BusConfig::default(),
            clock_source: ClockSource::Internal,
            update_rate: UpdateRate::Hz123,
        }
    }
}

/// Validation errors generated while verifying a [`Config`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// The serial clock frequency is zero.
    ZeroBusFrequency,
}
