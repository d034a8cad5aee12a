//! Compensation formulas from the BME280 datasheet (section 8.1,
//! double precision variant).
//!
//! Temperature has to be compensated first: it yields the fine temperature
//! that both the pressure and the humidity formula depend on.

use crate::calib::CalibrationData;

/// Temperature scaled by 5120, carried from the temperature formula into the
/// pressure and humidity formulas.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct FineTemperature(pub i32);

/// Result of temperature compensation.
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct CalcTempData {
    pub temp_fine: FineTemperature,
    /// Degrees Celsius.
    pub temp_comp: f32,
}

/// Converts the raw 20-bit temperature ADC value to degrees Celsius.
pub fn compensate_temperature(temp_adc: u32, calib: &CalibrationData) -> CalcTempData {
    let adc = temp_adc as f64;
    let t1 = calib.dig_t1 as f64;

    let var1 = (adc / 16384.0 - t1 / 1024.0) * calib.dig_t2 as f64;
    let var2 = adc / 131072.0 - t1 / 8192.0;
    let var2 = var2 * var2 * calib.dig_t3 as f64;

    CalcTempData {
        // Truncates toward zero, like the vendor reference.
        temp_fine: FineTemperature((var1 + var2) as i32),
        temp_comp: ((var1 + var2) / 5120.0) as f32,
    }
}

/// Degrees Celsius to degrees Fahrenheit.
pub fn celsius_to_fahrenheit(celsius: f32) -> f32 {
    celsius * 1.8 + 32.0
}

/// Converts the raw 20-bit pressure ADC value to hectopascal.
///
/// Returns `None` when the P1-derived denominator is exactly zero, which only
/// happens with erased or invalid calibration data.
pub fn compensate_pressure(
    press_adc: u32,
    t_fine: FineTemperature,
    calib: &CalibrationData,
) -> Option<f32> {
    let mut var1 = t_fine.0 as f64 / 2.0 - 64000.0;
    let mut var2 = var1 * var1 * calib.dig_p6 as f64 / 32768.0;
    var2 += var1 * calib.dig_p5 as f64 * 2.0;
    var2 = var2 / 4.0 + calib.dig_p4 as f64 * 65536.0;
    var1 = (calib.dig_p3 as f64 * var1 * var1 / 524288.0 + calib.dig_p2 as f64 * var1) / 524288.0;
    var1 = (1.0 + var1 / 32768.0) * calib.dig_p1 as f64;

    if var1 == 0.0 {
        return None;
    }

    let mut p = 1048576.0 - press_adc as f64;
    p = (p - var2 / 4096.0) * 6250.0 / var1;
    let var1 = calib.dig_p9 as f64 * p * p / 2147483648.0;
    let var2 = p * calib.dig_p8 as f64 / 32768.0;
    p += (var1 + var2 + calib.dig_p7 as f64) / 16.0;

    Some((p / 100.0) as f32)
}

/// Converts the raw 16-bit humidity ADC value to %RH.
///
/// The result is not clamped; readings near saturation may leave 0..100.
pub fn compensate_humidity(
    hum_adc: u16,
    t_fine: FineTemperature,
    calib: &CalibrationData,
) -> f32 {
    let h = t_fine.0 as f64 - 76800.0;
    let offset = calib.dig_h4 as f64 * 64.0 + calib.dig_h5 as f64 / 16384.0 * h;
    let gain = calib.dig_h2 as f64 / 65536.0
        * (1.0
            + calib.dig_h6 as f64 / 67108864.0
                * h
                * (1.0 + calib.dig_h3 as f64 / 67108864.0 * h));
    let h = (hum_adc as f64 - offset) * gain;
    let h = h * (1.0 - calib.dig_h1 as f64 * h / 524288.0);

    h as f32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calib::tests::datasheet;

    const TOLERANCE: f32 = 1e-2;

    fn assert_close(actual: f32, expected: f32) {
        assert!(
            (actual - expected).abs() < TOLERANCE,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn temperature_matches_datasheet_example() {
        let temp = compensate_temperature(519888, &datasheet());

        assert_eq!(temp.temp_fine, FineTemperature(128422));
        assert_close(temp.temp_comp, 25.08);
    }

    #[test]
    fn pressure_matches_datasheet_example() {
        let calib = datasheet();
        let temp = compensate_temperature(519888, &calib);

        let pres = compensate_pressure(415148, temp.temp_fine, &calib).unwrap();
        assert_close(pres, 1006.53);
    }

    #[test]
    fn humidity_uses_fine_temperature() {
        let calib = datasheet();
        let temp = compensate_temperature(519888, &calib);

        assert_close(compensate_humidity(30000, temp.temp_fine, &calib), 55.0);
    }

    #[test]
    fn zero_fine_temperature_is_computed_not_rejected() {
        // Pressure/humidity before any temperature read: the formulas run on
        // a fine temperature of 0 and give a skewed but finite result.
        let calib = datasheet();

        assert_close(
            compensate_pressure(415148, FineTemperature::default(), &calib).unwrap(),
            968.21,
        );
        assert_close(
            compensate_humidity(30000, FineTemperature::default(), &calib),
            53.996,
        );
    }

    #[test]
    fn pressure_guard_on_zero_p1() {
        let calib = CalibrationData {
            dig_p1: 0,
            ..datasheet()
        };
        let temp = compensate_temperature(519888, &calib);

        assert_eq!(compensate_pressure(415148, temp.temp_fine, &calib), None);
    }

    #[test]
    fn humidity_is_not_clamped() {
        let calib = datasheet();
        let temp = compensate_temperature(519888, &calib);

        assert!(compensate_humidity(0, temp.temp_fine, &calib) < 0.0);
        assert!(compensate_humidity(u16::MAX, temp.temp_fine, &calib) > 100.0);
    }

    #[test]
    fn fahrenheit_conversion() {
        assert_eq!(celsius_to_fahrenheit(0.0), 32.0);
        assert_close(celsius_to_fahrenheit(100.0), 212.0);
        assert_close(celsius_to_fahrenheit(-40.0), -40.0);
    }
}
