//! LiteON LTR-329ALS-01 ambient light sensor (visible + infrared channels).
//!
//! Ground-truthed against `device/ltr329als.c`: the sensor idles in
//! standby until `CONTRL` is written with gain + active-mode bits, needs a
//! 10 ms wake delay, and exposes the two photodiode channels as 16-bit
//! words at `DATA_CH1` (visible) and `DATA_CH0` (infrared).

use std::thread;
use std::time::Duration;

use embedded_hal::i2c::I2c;

use crate::drivers::i2c_bus::SharedI2c;
use crate::error::{DeviceId, WtError};

const REG_CONTRL: u8 = 0x80;
const REG_PART_ID: u8 = 0x86;
const REG_MANUFAC_ID: u8 = 0x87;
const REG_DATA_CH1: u8 = 0x88; // visible
const REG_DATA_CH0: u8 = 0x8A; // infrared

const CONTRL_GAIN_1X: u8 = 0b000 << 2;
const CONTRL_MODE_ACTIVE: u8 = 0b1;

const WAKEUP_DELAY: Duration = Duration::from_micros(10_000);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LightReading {
    pub visible: u16,
    pub infrared: u16,
}

pub struct LightSensor<I: I2c> {
    bus: SharedI2c<I>,
    addr: u8,
}

impl<I: I2c> LightSensor<I> {
    pub fn new(bus: SharedI2c<I>, addr: u8) -> Self {
        Self { bus, addr }
    }

    /// Bring the sensor out of standby. Must be called once before the
    /// first [`LightSensor::read`].
    pub fn wake(&self) -> Result<(), WtError> {
        self.bus.write(
            DeviceId::Light,
            self.addr,
            &[REG_CONTRL, CONTRL_GAIN_1X | CONTRL_MODE_ACTIVE],
        )?;
        thread::sleep(WAKEUP_DELAY);
        Ok(())
    }

    pub fn read(&self) -> Result<LightReading, WtError> {
        let mut visible = [0u8; 2];
        self.bus
            .write_read(DeviceId::Light, self.addr, &[REG_DATA_CH1], &mut visible)?;
        let mut infrared = [0u8; 2];
        self.bus
            .write_read(DeviceId::Light, self.addr, &[REG_DATA_CH0], &mut infrared)?;

        Ok(LightReading {
            visible: u16::from_le_bytes(visible),
            infrared: u16::from_le_bytes(infrared),
        })
    }

    pub fn manufacturer_id(&self) -> Result<u8, WtError> {
        let mut buf = [0u8; 1];
        self.bus
            .write_read(DeviceId::Light, self.addr, &[REG_MANUFAC_ID], &mut buf)?;
        Ok(buf[0])
    }

    pub fn part_id(&self) -> Result<(u8, u8), WtError> {
        let mut buf = [0u8; 1];
        self.bus
            .write_read(DeviceId::Light, self.addr, &[REG_PART_ID], &mut buf)?;
        Ok(((buf[0] >> 4) & 0x0F, buf[0] & 0x0F))
    }
}
