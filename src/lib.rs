#![cfg_attr(not(test), no_std)]

//! # BME280 Environmental Sensor Driver
//!
//! A type-safe, `no_std` driver for the Bosch BME280.
//! This driver uses the typestate pattern to ensure calibration data has been
//! loaded before any measurement is compensated.
//!
//! ## Features
//! - **Any register transport**: implement [`RegisterTransport`] or use the
//!   bundled [`I2cTransport`] over `embedded-hal` I2C.
//! - **Floating-point compensation**: the datasheet's double precision
//!   formulas, exposed as pure functions in [`calc`].
//! - **Typestate Pattern**: measuring an uncalibrated sensor does not compile.
//!
//! ## Units
//! - **Temperature**: degrees Celsius (or Fahrenheit)
//! - **Pressure**: hectopascal (hPa)
//! - **Humidity**: relative humidity in percent (%RH)
//!
//! ## Example
//! ```no_run
//! # use embedded_hal_mock::eh1::i2c::Mock;
//! # let i2c = Mock::new(&[]);
//! use bme280_driver::{Bme280, ConfigBuilder, Mode, Oversampling, Settings};
//!
//! let sensor = Bme280::new_i2c(i2c, Settings::default());
//! let mut sensor = sensor.init().map_err(|e| e.error)?;
//!
//! let config = ConfigBuilder::new()
//!     .temp_oversampling(Oversampling::X1)
//!     .pres_oversampling(Oversampling::X4)
//!     .hum_oversampling(Oversampling::X1)
//!     .mode(Mode::Normal)
//!     .build();
//! sensor.configure(&config)?;
//!
//! let sample = sensor.sample()?;
//! # Ok::<(), bme280_driver::error::Bme280Error<embedded_hal::i2c::ErrorKind>>(())
//! ```
//!
//! Measurements only exist on a calibrated driver:
//! ```compile_fail
//! # use embedded_hal_mock::eh1::i2c::Mock;
//! use bme280_driver::{Bme280, Settings};
//!
//! let mut sensor = Bme280::new_i2c(Mock::new(&[]), Settings::default());
//! sensor.temperature();
//! ```

pub mod bus;
pub mod calc;
mod calib;
pub mod settings;

use core::marker::PhantomData;
use embedded_hal::i2c;
use log::{debug, trace, warn};

pub use bus::{I2cTransport, RegisterTransport};
pub use calc::{CalcTempData, FineTemperature};
pub use calib::CalibrationData;
pub use settings::{
    Config, ConfigBuilder, Field, Filter, Mode, Oversampling, OversamplingConfig, Settings,
    Standby, ADDRESS_PRIMARY, ADDRESS_SECONDARY,
};

/// Expected content of the chip id register.
pub const CHIP_ID: u8 = 0x60;

/// Memory addresses of the measurement data registers.
mod raw_data_mem {
    /// Burst start: press_msb..hum_lsb
    pub const ADDR: u8 = 0xF7;
    pub const SIZE: usize = 8;
    pub const PRESS: u8 = 0xF7;
    pub const TEMP: u8 = 0xFA;
    pub const HUM: u8 = 0xFD;
}

// --- Typestates ---

/// Sensor has been created but calibration data is not loaded.
#[derive(Debug)]
pub struct Uncalibrated;
/// Chip id verified and calibration loaded; measurements are available.
#[derive(Debug)]
pub struct Calibrated;

/// Error types for the BME280 driver.
pub mod error {
    /// Errors that can occur during communication or compensation.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum Bme280Error<E> {
        /// Register transport failure.
        Bus(E),
        /// The chip id register held this value instead of `0x60`.
        IdentityMismatch(u8),
        /// The pressure formula's denominator is zero (P1 erased or invalid).
        InvalidCalibration,
    }

    /// Result type alias for BME280 operations.
    pub type Result<T, E> = core::result::Result<T, Bme280Error<E>>;
}

/// A failed [`Bme280::init`]: the uncalibrated driver together with the cause.
#[derive(Debug)]
pub struct InitError<B, E> {
    pub sensor: Bme280<B, Uncalibrated>,
    pub error: error::Bme280Error<E>,
}

/// Raw ADC values as read from the data registers.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct RawData {
    pub temp_adc: u32,
    pub press_adc: u32,
    pub hum_adc: u16,
}

impl RawData {
    /// Unpacks a burst read of `0xF7..=0xFE`.
    fn from_burst(buffer: &[u8; raw_data_mem::SIZE]) -> Self {
        RawData {
            press_adc: adc20(&[buffer[0], buffer[1], buffer[2]]),
            temp_adc: adc20(&[buffer[3], buffer[4], buffer[5]]),
            hum_adc: u16::from_be_bytes([buffer[6], buffer[7]]),
        }
    }
}

/// msb[19:12] lsb[11:4] xlsb[7:4]
fn adc20(bytes: &[u8; 3]) -> u32 {
    ((bytes[0] as u32) << 12) | ((bytes[1] as u32) << 4) | ((bytes[2] as u32) >> 4)
}

/// Compensated measurement result.
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct Measurement {
    /// °C, including the configured temperature correction.
    pub temperature: f32,
    /// hPa
    pub pressure: f32,
    /// %RH, unclamped.
    pub humidity: f32,
}

/// The main BME280 driver structure.
///
/// Use `Bme280::new(...)` or `Bme280::new_i2c(...)` to start. The `STATE`
/// generic tracks calibration status at compile time.
#[derive(Debug)]
pub struct Bme280<B, STATE> {
    bus: B,
    settings: Settings,
    calib_data: CalibrationData,
    /// Fine temperature of the last temperature read.
    t_fine: Option<FineTemperature>,
    _state: PhantomData<STATE>,
}

impl<I2C> Bme280<I2cTransport<I2C>, Uncalibrated>
where
    I2C: i2c::I2c,
{
    /// Creates a driver on an I2C bus at `settings.address`.
    ///
    /// This does not communicate with the sensor yet.
    pub fn new_i2c(i2c: I2C, settings: Settings) -> Self {
        Self::new(I2cTransport::new(i2c, settings.address), settings)
    }
}

impl<B> Bme280<B, Uncalibrated>
where
    B: RegisterTransport,
{
    /// Creates a new driver instance in the `Uncalibrated` state.
    pub fn new(bus: B, settings: Settings) -> Self {
        Bme280 {
            bus,
            settings,
            calib_data: CalibrationData::default(),
            t_fine: None,
            _state: PhantomData,
        }
    }

    /// Verifies the chip id and loads the factory calibration data.
    ///
    /// This transitions the driver state from `Uncalibrated` to `Calibrated`.
    ///
    /// # Errors
    /// On a chip id mismatch or a bus failure the driver is handed back,
    /// still uncalibrated, inside [`InitError`].
    pub fn init(mut self) -> Result<Bme280<B, Calibrated>, InitError<B, B::Error>> {
        match self.probe_and_load() {
            Ok(calib_data) => Ok(Bme280 {
                bus: self.bus,
                settings: self.settings,
                calib_data,
                t_fine: None,
                _state: PhantomData,
            }),
            Err(error) => Err(InitError {
                sensor: self,
                error,
            }),
        }
    }

    fn probe_and_load(&mut self) -> error::Result<CalibrationData, B::Error> {
        let chip_id = self.chip_id()?;
        if chip_id != CHIP_ID {
            warn!("bme280: unexpected chip id {:#04x}", chip_id);
            return Err(error::Bme280Error::IdentityMismatch(chip_id));
        }
        debug!("bme280: chip id ok, loading calibration");

        CalibrationData::load(&mut self.bus)
    }
}

impl<B, STATE> Bme280<B, STATE>
where
    B: RegisterTransport,
{
    /// Reads data from a starting register address into a provided buffer.
    fn read_into(&mut self, reg_address: u8, buffer: &mut [u8]) -> error::Result<(), B::Error> {
        self.bus
            .read_range(reg_address, buffer)
            .map_err(error::Bme280Error::Bus)
    }

    /// Reads a single byte from a specific register address.
    fn read_reg_byte(&mut self, reg_address: u8) -> error::Result<u8, B::Error> {
        self.bus
            .read_byte(reg_address)
            .map_err(error::Bme280Error::Bus)
    }

    fn write_reg(&mut self, reg_address: u8, value: u8) -> error::Result<(), B::Error> {
        trace!("bme280: write {:#04x} <- {:#010b}", reg_address, value);
        self.bus
            .write_byte(reg_address, value)
            .map_err(error::Bme280Error::Bus)
    }

    /// Reads the chip id register (expected value: 0x60).
    pub fn chip_id(&mut self) -> error::Result<u8, B::Error> {
        self.read_reg_byte(settings::regs::CHIP_ID)
    }

    /// Read-modify-write of a single field; all other bits keep their value.
    pub fn set_field(&mut self, field: Field, value: u8) -> error::Result<(), B::Error> {
        let register = self.read_reg_byte(field.register())?;
        self.write_reg(field.register(), field.insert(register, value))
    }

    /// Reads the current value of a field.
    pub fn field(&mut self, field: Field) -> error::Result<u8, B::Error> {
        Ok(field.extract(self.read_reg_byte(field.register())?))
    }

    /// Sets the power mode in `ctrl_meas[1:0]`.
    pub fn set_mode(&mut self, mode: Mode) -> error::Result<(), B::Error> {
        self.set_field(Field::MODE, mode as u8)
    }

    /// Reads the current power mode back from `ctrl_meas`.
    pub fn mode(&mut self) -> error::Result<Mode, B::Error> {
        Ok(Mode::from(self.field(Field::MODE)?))
    }

    /// Sets the temperature oversampling in `ctrl_meas[7:5]`.
    pub fn set_temp_oversampling(&mut self, os: Oversampling) -> error::Result<(), B::Error> {
        self.set_field(Field::OSRS_T, os as u8)
    }

    /// Sets the pressure oversampling in `ctrl_meas[4:2]`.
    pub fn set_pres_oversampling(&mut self, os: Oversampling) -> error::Result<(), B::Error> {
        self.set_field(Field::OSRS_P, os as u8)
    }

    /// Sets the humidity oversampling in `ctrl_hum[2:0]`.
    ///
    /// Takes effect only after the next write to `ctrl_meas`.
    pub fn set_hum_oversampling(&mut self, os: Oversampling) -> error::Result<(), B::Error> {
        self.set_field(Field::OSRS_H, os as u8)
    }

    /// Sets the IIR filter coefficient in `config[4:2]`.
    pub fn set_filter(&mut self, filter: Filter) -> error::Result<(), B::Error> {
        self.set_field(Field::FILTER, filter as u8)
    }

    /// Sets the normal mode standby time in `config[7:5]`.
    pub fn set_standby_time(&mut self, standby: Standby) -> error::Result<(), B::Error> {
        self.set_field(Field::STANDBY, standby as u8)
    }

    /// Applies a full sampling configuration.
    ///
    /// The `config` register (filter, standby) is written first, then
    /// `ctrl_hum`, then `ctrl_meas` so the humidity setting is latched. The
    /// mode goes last.
    pub fn configure(&mut self, config: &Config) -> error::Result<(), B::Error> {
        self.set_filter(config.filter)?;
        self.set_standby_time(config.standby)?;
        self.set_hum_oversampling(config.osrs_config.hum_osrs)?;
        self.set_temp_oversampling(config.osrs_config.temp_osrs)?;
        self.set_pres_oversampling(config.osrs_config.pres_osrs)?;
        self.set_mode(config.mode)
    }

    /// Settings the driver was created with.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Destroys the driver and returns the transport.
    pub fn release(self) -> B {
        self.bus
    }
}

impl<B> Bme280<B, Calibrated>
where
    B: RegisterTransport,
{
    /// Decoded calibration coefficients.
    pub fn calibration(&self) -> &CalibrationData {
        &self.calib_data
    }

    /// Reloads calibration data, replacing the current coefficients.
    pub fn recalibrate(&mut self) -> error::Result<(), B::Error> {
        self.calib_data = CalibrationData::load(&mut self.bus)?;
        Ok(())
    }

    /// Fine temperature of the most recent temperature read, if any.
    pub fn fine_temperature(&self) -> Option<FineTemperature> {
        self.t_fine
    }

    fn read_adc20(&mut self, reg_address: u8) -> error::Result<u32, B::Error> {
        let mut buffer = [0u8; 3];
        self.read_into(reg_address, &mut buffer)?;
        Ok(adc20(&buffer))
    }

    fn read_hum_adc(&mut self) -> error::Result<u16, B::Error> {
        let mut buffer = [0u8; 2];
        self.read_into(raw_data_mem::HUM, &mut buffer)?;
        Ok(u16::from_be_bytes(buffer))
    }

    fn apply_temperature(&mut self, temp_adc: u32) -> CalcTempData {
        let mut temp = calc::compensate_temperature(temp_adc, &self.calib_data);
        self.t_fine = Some(temp.temp_fine);
        temp.temp_comp += self.settings.temp_correction;
        temp
    }

    fn current_fine(&mut self) -> error::Result<FineTemperature, B::Error> {
        match self.t_fine {
            Some(t_fine) => Ok(t_fine),
            None => Ok(self.temperature_data()?.temp_fine),
        }
    }

    fn pressure_from(
        &self,
        press_adc: u32,
        t_fine: FineTemperature,
    ) -> error::Result<f32, B::Error> {
        calc::compensate_pressure(press_adc, t_fine, &self.calib_data).ok_or_else(|| {
            warn!("bme280: pressure denominator is zero, calibration invalid");
            error::Bme280Error::InvalidCalibration
        })
    }

    /// Reads and compensates the temperature, refreshing the cached fine
    /// temperature. `temp_comp` includes the configured correction.
    pub fn temperature_data(&mut self) -> error::Result<CalcTempData, B::Error> {
        let temp_adc = self.read_adc20(raw_data_mem::TEMP)?;
        Ok(self.apply_temperature(temp_adc))
    }

    /// Temperature in °C.
    pub fn temperature(&mut self) -> error::Result<f32, B::Error> {
        Ok(self.temperature_data()?.temp_comp)
    }

    /// Temperature in °F.
    pub fn temperature_fahrenheit(&mut self) -> error::Result<f32, B::Error> {
        Ok(calc::celsius_to_fahrenheit(self.temperature()?))
    }

    /// Pressure in hPa.
    ///
    /// Uses the cached fine temperature; a temperature read is issued first
    /// if there is none yet.
    pub fn pressure(&mut self) -> error::Result<f32, B::Error> {
        let t_fine = self.current_fine()?;
        self.pressure_with(t_fine)
    }

    /// Pressure in hPa, compensated with an explicit fine temperature.
    pub fn pressure_with(&mut self, t_fine: FineTemperature) -> error::Result<f32, B::Error> {
        let press_adc = self.read_adc20(raw_data_mem::PRESS)?;
        self.pressure_from(press_adc, t_fine)
    }

    /// Relative humidity in %RH. Same fine temperature rules as
    /// [`pressure`](Self::pressure).
    pub fn humidity(&mut self) -> error::Result<f32, B::Error> {
        let t_fine = self.current_fine()?;
        self.humidity_with(t_fine)
    }

    /// Relative humidity in %RH, compensated with an explicit fine
    /// temperature.
    pub fn humidity_with(&mut self, t_fine: FineTemperature) -> error::Result<f32, B::Error> {
        let hum_adc = self.read_hum_adc()?;
        Ok(calc::compensate_humidity(hum_adc, t_fine, &self.calib_data))
    }

    /// Reads all data registers in one burst and compensates them together.
    pub fn sample(&mut self) -> error::Result<Measurement, B::Error> {
        let mut buffer = [0u8; raw_data_mem::SIZE];
        self.read_into(raw_data_mem::ADDR, &mut buffer)?;
        let raw = RawData::from_burst(&buffer);
        trace!("bme280: raw {:?}", raw);

        let temp = self.apply_temperature(raw.temp_adc);
        let pressure = self.pressure_from(raw.press_adc, temp.temp_fine)?;
        let humidity = calc::compensate_humidity(raw.hum_adc, temp.temp_fine, &self.calib_data);

        Ok(Measurement {
            temperature: temp.temp_comp,
            pressure,
            humidity,
        })
    }
}
