//! Register-level access to the sensor.
//!
//! The driver never talks to the bus directly. Everything goes through
//! [`RegisterTransport`], which keeps the calibration loader and the field
//! setters independent of the physical interface.

use embedded_hal::i2c;

/// Byte-addressed read/write access to the sensor's register map.
///
/// Every call is one complete bus transaction. Implementations must not
/// interleave transactions; serializing a shared bus is the caller's job.
pub trait RegisterTransport {
    /// Transport error type.
    type Error;

    /// Reads a single register.
    fn read_byte(&mut self, reg: u8) -> Result<u8, Self::Error>;

    /// Reads `buffer.len()` contiguous registers starting at `reg`.
    fn read_range(&mut self, reg: u8, buffer: &mut [u8]) -> Result<(), Self::Error>;

    /// Writes a single register.
    fn write_byte(&mut self, reg: u8, value: u8) -> Result<(), Self::Error>;
}

/// [`RegisterTransport`] over any `embedded-hal` I2C bus.
#[derive(Debug)]
pub struct I2cTransport<I2C> {
    i2c: I2C,
    address: u8,
}

impl<I2C> I2cTransport<I2C> {
    /// Wraps `i2c`, addressing the device at the 7-bit `address`.
    pub fn new(i2c: I2C, address: u8) -> Self {
        Self { i2c, address }
    }

    /// The 7-bit device address used for every transaction.
    pub fn address(&self) -> u8 {
        self.address
    }

    /// Gives the bus back.
    pub fn release(self) -> I2C {
        self.i2c
    }
}

impl<I2C, E> RegisterTransport for I2cTransport<I2C>
where
    I2C: i2c::I2c<Error = E>,
{
    type Error = E;

    fn read_byte(&mut self, reg: u8) -> Result<u8, E> {
        let mut buffer = [0];
        self.i2c.write_read(self.address, &[reg], &mut buffer)?;
        Ok(buffer[0])
    }

    fn read_range(&mut self, reg: u8, buffer: &mut [u8]) -> Result<(), E> {
        self.i2c.write_read(self.address, &[reg], buffer)
    }

    fn write_byte(&mut self, reg: u8, value: u8) -> Result<(), E> {
        self.i2c.write(self.address, &[reg, value])
    }
}
