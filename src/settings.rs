use bit_field::BitField;
use core::ops::Range;

/// Register addresses of the control block.
pub(crate) mod regs {
    pub const CHIP_ID: u8 = 0xD0;
    pub const CTRL_HUM: u8 = 0xF2;
    pub const CTRL_MEAS: u8 = 0xF4;
    pub const CONFIG: u8 = 0xF5;
}

/// Default I2C address (SDO pulled to GND).
pub const ADDRESS_PRIMARY: u8 = 0x76;
/// Alternate I2C address (SDO pulled to VDDIO).
pub const ADDRESS_SECONDARY: u8 = 0x77;

/// A configurable bit field inside one control register.
///
/// Every setter of the driver is a read-modify-write of one of these
/// descriptors, so the bits outside `offset..offset + width` are never
/// touched. A descriptor always lies within one 8-bit register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    register: u8,
    offset: u8,
    width: u8,
}

impl Field {
    /// `ctrl_meas[1:0]`
    pub const MODE: Field = Field::new(regs::CTRL_MEAS, 0, 2);
    /// `ctrl_meas[4:2]`
    pub const OSRS_P: Field = Field::new(regs::CTRL_MEAS, 2, 3);
    /// `ctrl_meas[7:5]`
    pub const OSRS_T: Field = Field::new(regs::CTRL_MEAS, 5, 3);
    /// `ctrl_hum[2:0]`
    pub const OSRS_H: Field = Field::new(regs::CTRL_HUM, 0, 3);
    /// `config[4:2]`
    pub const FILTER: Field = Field::new(regs::CONFIG, 2, 3);
    /// `config[7:5]`
    pub const STANDBY: Field = Field::new(regs::CONFIG, 5, 3);

    /// Describes `width` bits starting at bit `offset` of `register`.
    ///
    /// # Panics
    /// If the field is empty or extends past bit 7. For constants this is
    /// a compile-time error.
    pub const fn new(register: u8, offset: u8, width: u8) -> Self {
        assert!(
            width > 0 && offset as u16 + width as u16 <= 8,
            "field must fit into one 8-bit register"
        );
        Self {
            register,
            offset,
            width,
        }
    }

    /// Register address holding the field.
    pub fn register(&self) -> u8 {
        self.register
    }

    /// Position of the least significant bit.
    pub fn offset(&self) -> u8 {
        self.offset
    }

    /// Number of bits.
    pub fn width(&self) -> u8 {
        self.width
    }

    fn bits(&self) -> Range<usize> {
        self.offset as usize..(self.offset + self.width) as usize
    }

    /// Largest value the field can hold.
    pub fn max_value(&self) -> u8 {
        ((1u16 << self.width) - 1) as u8
    }

    /// Returns `current` with the field replaced by `value`.
    ///
    /// Bits of `value` above the field width are dropped.
    pub fn insert(&self, current: u8, value: u8) -> u8 {
        let mut register = current;
        register.set_bits(self.bits(), value & self.max_value());
        register
    }

    /// Extracts the field from a register value.
    pub fn extract(&self, register: u8) -> u8 {
        register.get_bits(self.bits())
    }
}

/// Sensor power mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum Mode {
    /// No measurements, lowest power. Reset state.
    #[default]
    Sleep = 0b00,
    /// One measurement cycle, then back to sleep.
    Forced = 0b01,
    /// Continuous cycling between measurement and standby.
    Normal = 0b11,
}

impl From<u8> for Mode {
    /// Anything that does not fit the 2-bit field falls back to `Sleep`.
    ///
    /// The value is canonicalized: `0b10` becomes `Forced` and is written
    /// back as `0b01`, which the sensor treats the same way.
    fn from(value: u8) -> Self {
        match value {
            0b01 | 0b10 => Mode::Forced,
            0b11 => Mode::Normal,
            _ => Mode::Sleep,
        }
    }
}

/// Oversampling settings for Temperature, Pressure, and Humidity.
///
/// Higher rates reduce noise at the cost of longer conversions and
/// higher power consumption.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum Oversampling {
    /// No measurement performed. The output register holds `0x80000`.
    Skipped = 0,
    /// 1x Oversampling.
    #[default]
    X1 = 1,
    /// 2x Oversampling.
    X2 = 2,
    /// 4x Oversampling.
    X4 = 3,
    /// 8x Oversampling.
    X8 = 4,
    /// 16x Oversampling.
    X16 = 5,
}

/// IIR filter coefficient applied to pressure and temperature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum Filter {
    /// Filter disabled.
    #[default]
    Off = 0,
    /// Coefficient 2.
    X2 = 1,
    /// Coefficient 4.
    X4 = 2,
    /// Coefficient 8.
    X8 = 3,
    /// Coefficient 16.
    X16 = 4,
}

/// Inactive duration between two measurements in normal mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum Standby {
    /// 0.5 ms
    #[default]
    Ms0_5 = 0,
    /// 62.5 ms
    Ms62_5 = 1,
    /// 125 ms
    Ms125 = 2,
    /// 250 ms
    Ms250 = 3,
    /// 500 ms
    Ms500 = 4,
    /// 1000 ms
    Ms1000 = 5,
    /// 10 ms
    Ms10 = 6,
    /// 20 ms
    Ms20 = 7,
}

/// Connection-level settings, fixed for the lifetime of a driver.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Settings {
    /// 7-bit I2C address.
    pub address: u8,
    /// Offset in °C added to every reported temperature.
    ///
    /// Only the reported value is shifted; the fine temperature fed to the
    /// pressure and humidity formulas stays uncorrected.
    pub temp_correction: f32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            address: ADDRESS_PRIMARY,
            temp_correction: 0.0,
        }
    }
}

impl Settings {
    /// Default settings at a different I2C address.
    pub fn with_address(address: u8) -> Self {
        Self {
            address,
            ..Self::default()
        }
    }
}

/// Grouped oversampling settings.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
pub struct OversamplingConfig {
    pub temp_osrs: Oversampling,
    pub hum_osrs: Oversampling,
    pub pres_osrs: Oversampling,
}

/// Complete sampling configuration, applied with `Bme280::configure`.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    pub osrs_config: OversamplingConfig,
    pub filter: Filter,
    pub standby: Standby,
    pub mode: Mode,
}

/// Builder for [`Config`].
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Starts from x1 oversampling on every channel, filter off, sleep mode.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the temperature oversampling.
    pub fn temp_oversampling(mut self, os: Oversampling) -> Self {
        self.config.osrs_config.temp_osrs = os;
        self
    }

    /// Sets the humidity oversampling.
    pub fn hum_oversampling(mut self, os: Oversampling) -> Self {
        self.config.osrs_config.hum_osrs = os;
        self
    }

    /// Sets the pressure oversampling.
    pub fn pres_oversampling(mut self, os: Oversampling) -> Self {
        self.config.osrs_config.pres_osrs = os;
        self
    }

    /// Sets the IIR filter coefficient.
    pub fn filter(mut self, filter: Filter) -> Self {
        self.config.filter = filter;
        self
    }

    /// Sets the standby time used in normal mode.
    pub fn standby(mut self, standby: Standby) -> Self {
        self.config.standby = standby;
        self
    }

    /// Sets the power mode written last by `configure`.
    pub fn mode(mut self, mode: Mode) -> Self {
        self.config.mode = mode;
        self
    }

    /// Finishes the builder and returns the `Config`.
    pub fn build(self) -> Config {
        self.config
    }
}
