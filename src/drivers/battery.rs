//! MAX17320 fuel-gauge + protection IC, two-cell Li-ion pack.
//!
//! Ground-truthed against `device/max17320.c`/`.h`: 16-bit memory-mapped
//! registers, split across two I2C addresses (`BMS_LOWER` for memory
//! `<= 0xFF`, `BMS_UPPER` for the extended page above it), with fixed
//! scaling constants per register class (voltage LSB 78.125 uV,
//! percentage LSB 1/256 %, temperature LSB 1/256 degC).

use embedded_hal::i2c::I2c;

use crate::drivers::i2c_bus::SharedI2c;
use crate::error::{DeviceId, WtError};

const REG_REP_SOC: u16 = 0x006;
const REG_CELL1_VOLTAGE: u16 = 0x0D8;
const REG_CELL2_VOLTAGE: u16 = 0x0D7;
const REG_TOTAL_BAT_VOLTAGE: u16 = 0x0DA;
const REG_BATT_CURRENT: u16 = 0x01C;
const REG_TEMPERATURE: u16 = 0x01B;

const VOLTAGE_LSB_V: f64 = 0.000_078_125;
const PERCENT_LSB: f64 = 1.0 / 256.0;
const TEMPERATURE_LSB_C: f64 = 1.0 / 256.0;
/// Current-sense resistor, per the tag's power-board BOM.
const R_SENSE_MOHM: f64 = 5.0;
const CURRENT_LSB_UV: f64 = 1.5625;

fn raw_to_voltage_v(raw: u16) -> f64 {
    raw as f64 * VOLTAGE_LSB_V
}

fn raw_to_percentage(raw: u16) -> f64 {
    raw as f64 * PERCENT_LSB
}

fn raw_to_temperature_c(raw: u16) -> f64 {
    raw as i16 as f64 * TEMPERATURE_LSB_C
}

fn raw_to_current_ma(raw: u16) -> f64 {
    (raw as i16 as f64 * CURRENT_LSB_UV) / R_SENSE_MOHM
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BatteryReading {
    pub cell1_v: f64,
    pub cell2_v: f64,
    pub total_v: f64,
    pub state_of_charge_pct: f64,
    pub current_ma: f64,
    pub temperature_c: f64,
}

pub struct BatteryMonitor<I: I2c> {
    bus: SharedI2c<I>,
    addr_lower: u8,
    addr_upper: u8,
}

impl<I: I2c> BatteryMonitor<I> {
    pub fn new(bus: SharedI2c<I>, addr_lower: u8, addr_upper: u8) -> Self {
        Self {
            bus,
            addr_lower,
            addr_upper,
        }
    }

    fn read_word(&self, memory: u16) -> Result<u16, WtError> {
        let addr = if memory > 0xFF {
            self.addr_upper
        } else {
            self.addr_lower
        };
        let register = (memory & 0xFF) as u8;
        let mut buf = [0u8; 2];
        self.bus
            .write_read(DeviceId::Bms, addr, &[register], &mut buf)?;
        Ok(u16::from_le_bytes(buf))
    }

    pub fn read(&self) -> Result<BatteryReading, WtError> {
        Ok(BatteryReading {
            cell1_v: raw_to_voltage_v(self.read_word(REG_CELL1_VOLTAGE)?),
            cell2_v: raw_to_voltage_v(self.read_word(REG_CELL2_VOLTAGE)?),
            total_v: raw_to_voltage_v(self.read_word(REG_TOTAL_BAT_VOLTAGE)?),
            state_of_charge_pct: raw_to_percentage(self.read_word(REG_REP_SOC)?),
            current_ma: raw_to_current_ma(self.read_word(REG_BATT_CURRENT)?),
            temperature_c: raw_to_temperature_c(self.read_word(REG_TEMPERATURE)?),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn voltage_scaling_matches_datasheet_lsb() {
        // 5.0V / 78.125uV ~= 64000 counts
        let raw = (5.0 / VOLTAGE_LSB_V).round() as u16;
        assert!((raw_to_voltage_v(raw) - 5.0).abs() < 1e-3);
    }

    #[test]
    fn negative_current_round_trips_through_twos_complement() {
        let raw = (-1000i16) as u16;
        assert!(raw_to_current_ma(raw) < 0.0);
    }
}
