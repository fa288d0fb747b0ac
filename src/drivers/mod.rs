//! Device drivers: one module per peripheral, each a thin wrapper around
//! an `embedded-hal` bus with a typed read/write surface and a
//! [`crate::error::WtError`] result, per spec.md §2's driver contract.
//! No driver here owns a thread — acquisition workers in
//! [`crate::acquisition`] poll them on a schedule.

pub mod audio;
pub mod battery;
pub mod burnwire;
pub mod ecg;
pub mod i2c_bus;
pub mod imu;
pub mod iox;
pub mod light;
pub mod pressure;
pub mod recovery;
pub mod rtc;

/// I2C addresses, per spec.md §6.
pub mod addr {
    pub const IOX: u8 = 0x21;
    pub const ALS: u8 = 0x29;
    pub const BMS_LOWER: u8 = 0x36;
    pub const BMS_UPPER: u8 = 0x0B;
    pub const RTC: u8 = 0x68;
    pub const IMU: u8 = 0x4A;

    /// Keller 4LD default transmitter address. Not part of spec.md's fixed
    /// address table; fixed here as a documented design constant (see
    /// DESIGN.md) since the Keller series ships at this address absent a
    /// custom factory configuration.
    pub const PRESSURE: u8 = 0x40;

    /// ECG front-end ADC address, a documented design constant for the
    /// same reason as `PRESSURE` (see DESIGN.md).
    pub const ECG_ADC: u8 = 0x2A;
}

/// I/O-expander bit positions, a documented design constant (see
/// DESIGN.md) since spec.md names the two lead-off inputs without
/// assigning them bit numbers on the shared expander bank.
pub mod iox_bit {
    pub const ECG_LEAD_OFF_POS: u8 = 0;
    pub const ECG_LEAD_OFF_NEG: u8 = 1;
}
