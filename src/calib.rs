use bit_field::BitField;
use log::debug;

use crate::{bus::RegisterTransport, error};

/// Calibration blocks. `dig_H1` sits alone at 0xA1, one byte past the
/// pressure coefficients.
mod calib_mem {
    /// Location of a calibration block in the register map.
    pub struct Region {
        pub addr: u8,
        pub len: usize,
    }

    pub const TEMP: Region = Region { addr: 0x88, len: 6 };
    pub const PRESS: Region = Region { addr: 0x8E, len: 18 };
    pub const HUM_H1: Region = Region { addr: 0xA1, len: 1 };
    pub const HUM: Region = Region { addr: 0xE1, len: 7 };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Nibble {
    Low,
    High,
}

/// Bit layout of a single coefficient inside its block.
#[derive(Debug, Clone, Copy)]
enum Layout {
    U8(usize),
    I8(usize),
    /// Little-endian, starting at the given offset.
    U16(usize),
    I16(usize),
    /// 12-bit signed value: `(msb as i8) * 16` OR'ed with one nibble of
    /// `shared`. H4 and H5 split byte 0xE5 this way.
    Packed12 {
        msb: usize,
        shared: usize,
        nibble: Nibble,
    },
}

impl Layout {
    fn decode(self, block: &[u8]) -> i32 {
        match self {
            Layout::U8(i) => block[i] as i32,
            Layout::I8(i) => block[i] as i8 as i32,
            Layout::U16(i) => u16::from_le_bytes([block[i], block[i + 1]]) as i32,
            Layout::I16(i) => i16::from_le_bytes([block[i], block[i + 1]]) as i32,
            Layout::Packed12 { msb, shared, nibble } => {
                let low = match nibble {
                    Nibble::Low => block[shared].get_bits(0..4),
                    Nibble::High => block[shared].get_bits(4..8),
                };
                ((block[msb] as i8 as i32) * 16) | low as i32
            }
        }
    }
}

/// T1..T3 within [`calib_mem::TEMP`].
const TEMP_LAYOUT: [Layout; 3] = [Layout::U16(0), Layout::I16(2), Layout::I16(4)];

/// P1..P9 within [`calib_mem::PRESS`].
const PRESS_LAYOUT: [Layout; 9] = [
    Layout::U16(0),
    Layout::I16(2),
    Layout::I16(4),
    Layout::I16(6),
    Layout::I16(8),
    Layout::I16(10),
    Layout::I16(12),
    Layout::I16(14),
    Layout::I16(16),
];

/// H1 within [`calib_mem::HUM_H1`].
const H1_LAYOUT: Layout = Layout::U8(0);

/// H2..H6 within [`calib_mem::HUM`].
const HUM_LAYOUT: [Layout; 5] = [
    Layout::I16(0),
    Layout::U8(2),
    Layout::Packed12 {
        msb: 3,
        shared: 4,
        nibble: Nibble::Low,
    },
    Layout::Packed12 {
        msb: 5,
        shared: 4,
        nibble: Nibble::High,
    },
    Layout::I8(6),
];

/// Factory-fused calibration coefficients read from the sensor.
///
/// Unique to every chip and required by the compensation formulas.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct CalibrationData {
    pub dig_t1: u16,
    pub dig_t2: i16,
    pub dig_t3: i16,
    pub dig_p1: u16,
    pub dig_p2: i16,
    pub dig_p3: i16,
    pub dig_p4: i16,
    pub dig_p5: i16,
    pub dig_p6: i16,
    pub dig_p7: i16,
    pub dig_p8: i16,
    pub dig_p9: i16,
    pub dig_h1: u8,
    pub dig_h2: i16,
    pub dig_h3: u8,
    pub dig_h4: i16,
    pub dig_h5: i16,
    pub dig_h6: i8,
}

impl CalibrationData {
    /// Reads all calibration blocks and decodes them.
    ///
    /// Each block is fetched with one contiguous read. Nothing is returned
    /// unless every read succeeded.
    pub fn load<T: RegisterTransport>(transport: &mut T) -> error::Result<Self, T::Error> {
        let mut temp = [0u8; calib_mem::TEMP.len];
        let mut press = [0u8; calib_mem::PRESS.len];
        let mut hum = [0u8; calib_mem::HUM.len];

        transport
            .read_range(calib_mem::TEMP.addr, &mut temp)
            .map_err(error::Bme280Error::Bus)?;
        transport
            .read_range(calib_mem::PRESS.addr, &mut press)
            .map_err(error::Bme280Error::Bus)?;
        let h1 = transport
            .read_byte(calib_mem::HUM_H1.addr)
            .map_err(error::Bme280Error::Bus)?;
        transport
            .read_range(calib_mem::HUM.addr, &mut hum)
            .map_err(error::Bme280Error::Bus)?;

        let calib = Self::from_regions(&temp, &press, h1, &hum);
        debug!("bme280: calibration loaded: {:?}", calib);

        Ok(calib)
    }

    /// Decodes coefficients from raw calibration blocks.
    ///
    /// * `temp` - 6 bytes starting at 0x88
    /// * `press` - 18 bytes starting at 0x8E
    /// * `h1` - the byte at 0xA1
    /// * `hum` - 7 bytes starting at 0xE1
    pub fn from_regions(temp: &[u8; 6], press: &[u8; 18], h1: u8, hum: &[u8; 7]) -> Self {
        let t = |i: usize| TEMP_LAYOUT[i].decode(temp);
        let p = |i: usize| PRESS_LAYOUT[i].decode(press);
        let h = |i: usize| HUM_LAYOUT[i].decode(hum);

        CalibrationData {
            dig_t1: t(0) as u16,
            dig_t2: t(1) as i16,
            dig_t3: t(2) as i16,
            dig_p1: p(0) as u16,
            dig_p2: p(1) as i16,
            dig_p3: p(2) as i16,
            dig_p4: p(3) as i16,
            dig_p5: p(4) as i16,
            dig_p6: p(5) as i16,
            dig_p7: p(6) as i16,
            dig_p8: p(7) as i16,
            dig_p9: p(8) as i16,
            dig_h1: H1_LAYOUT.decode(&[h1]) as u8,
            dig_h2: h(0) as i16,
            dig_h3: h(1) as u8,
            dig_h4: h(2) as i16,
            dig_h5: h(3) as i16,
            dig_h6: h(4) as i8,
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::bus::tests::RegisterMap;
    use embedded_hal::i2c::ErrorKind;
    use embedded_hal_mock::eh1::i2c::{Mock as I2cMock, Transaction};

    // Worked example from the BMP280/BME280 datasheet.
    pub(crate) const TEMP_BYTES: [u8; 6] = [0x70, 0x6B, 0x43, 0x67, 0x18, 0xFC];
    pub(crate) const PRESS_BYTES: [u8; 18] = [
        0x7D, 0x8E, 0x43, 0xD6, 0xD0, 0x0B, 0x27, 0x0B, 0x8C, 0x00, 0xF9, 0xFF, 0x8C, 0x3C, 0xF8,
        0xC6, 0x70, 0x17,
    ];
    // H1=75 H2=362 H3=0 H4=313 H5=50 H6=30
    pub(crate) const H1_BYTE: u8 = 0x4B;
    pub(crate) const HUM_BYTES: [u8; 7] = [0x6A, 0x01, 0x00, 0x13, 0x29, 0x03, 0x1E];

    pub(crate) fn datasheet() -> CalibrationData {
        CalibrationData {
            dig_t1: 27504,
            dig_t2: 26435,
            dig_t3: -1000,
            dig_p1: 36477,
            dig_p2: -10685,
            dig_p3: 3024,
            dig_p4: 2855,
            dig_p5: 140,
            dig_p6: -7,
            dig_p7: 15500,
            dig_p8: -14600,
            dig_p9: 6000,
            dig_h1: 75,
            dig_h2: 362,
            dig_h3: 0,
            dig_h4: 313,
            dig_h5: 50,
            dig_h6: 30,
        }
    }

    /// Places the datasheet calibration blocks into a register map.
    pub(crate) fn register_map() -> RegisterMap {
        let mut map = RegisterMap::new();
        map.regs[0x88..0x8E].copy_from_slice(&TEMP_BYTES);
        map.regs[0x8E..0xA0].copy_from_slice(&PRESS_BYTES);
        map.regs[0xA1] = H1_BYTE;
        map.regs[0xE1..0xE8].copy_from_slice(&HUM_BYTES);
        map
    }

    #[test]
    fn decodes_datasheet_blocks() {
        let calib = CalibrationData::from_regions(&TEMP_BYTES, &PRESS_BYTES, H1_BYTE, &HUM_BYTES);
        assert_eq!(calib, datasheet());
    }

    #[test]
    fn h4_h5_share_nibbles_of_one_byte() {
        let hum = [0x00, 0x00, 0x00, 0x12, 0x34, 0x56, 0x00];
        let calib = CalibrationData::from_regions(&[0; 6], &[0; 18], 0, &hum);

        assert_eq!(calib.dig_h4, 0x124);
        assert_eq!(calib.dig_h5, 0x563);
    }

    #[test]
    fn packed_coefficients_keep_sign_of_msb() {
        // 0xFF as i8 is -1 -> -16 | nibble
        let hum = [0x00, 0x00, 0x00, 0xFF, 0xA5, 0x80, 0x00];
        let calib = CalibrationData::from_regions(&[0; 6], &[0; 18], 0, &hum);

        assert_eq!(calib.dig_h4, -16 | 0x5);
        assert_eq!(calib.dig_h5, -128 * 16 | 0xA);
    }

    #[test]
    fn signed_and_unsigned_words() {
        let temp = [0xFF, 0xFF, 0xFF, 0xFF, 0x00, 0x80];
        let hum = [0x00, 0x80, 0xFF, 0x00, 0x00, 0x00, 0x80];
        let calib = CalibrationData::from_regions(&temp, &[0; 18], 0xFF, &hum);

        assert_eq!(calib.dig_t1, u16::MAX);
        assert_eq!(calib.dig_t2, -1);
        assert_eq!(calib.dig_t3, i16::MIN);
        assert_eq!(calib.dig_h1, 0xFF);
        assert_eq!(calib.dig_h2, i16::MIN);
        assert_eq!(calib.dig_h3, 0xFF);
        assert_eq!(calib.dig_h6, i8::MIN);
    }

    #[test]
    fn load_reads_each_block_once() {
        let expectations = [
            Transaction::write_read(0x76, vec![0x88], TEMP_BYTES.to_vec()),
            Transaction::write_read(0x76, vec![0x8E], PRESS_BYTES.to_vec()),
            Transaction::write_read(0x76, vec![0xA1], vec![H1_BYTE]),
            Transaction::write_read(0x76, vec![0xE1], HUM_BYTES.to_vec()),
        ];
        let mut transport = crate::bus::I2cTransport::new(I2cMock::new(&expectations), 0x76);

        let calib = CalibrationData::load(&mut transport).unwrap();
        assert_eq!(calib, datasheet());

        transport.release().done();
    }

    #[test]
    fn load_from_register_map() {
        let mut map = register_map();
        assert_eq!(CalibrationData::load(&mut map).unwrap(), datasheet());
    }

    #[test]
    fn load_propagates_bus_error() {
        let expectations = [
            Transaction::write_read(0x76, vec![0x88], TEMP_BYTES.to_vec()),
            Transaction::write_read(0x76, vec![0x8E], vec![0; 18]).with_error(ErrorKind::Other),
        ];
        let mut transport = crate::bus::I2cTransport::new(I2cMock::new(&expectations), 0x76);

        let result = CalibrationData::load(&mut transport);
        assert!(matches!(
            result,
            Err(error::Bme280Error::Bus(ErrorKind::Other))
        ));

        transport.release().done();
    }
}
