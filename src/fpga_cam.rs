//! FPGA Control-And-Monitor (CAM) packet framing.
//!
//! The host talks to the audio front-end FPGA over a bit-banged,
//! SPI-like link using fixed 8-byte packets (spec.md §6). This module
//! owns only the framing and opcode table; the bit-banged transport lives
//! in `drivers::audio`, grounded on the teacher's `SpiBus`-over-GPIO
//! pattern (`ZanzyTHEbar-pet-filter/firmware/src/drivers`) generalised
//! from a real SPI peripheral to a software-clocked link.

use crate::error::{DeviceId, ErrCode, WtError};

const STX: u8 = 0x02;
const ETX: u8 = 0x03;

/// CAM opcodes, per spec.md §6's "design constants" table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CamOpcode {
    AdcReadWrite,
    AdcSync,
    FifoReset,
    FifoStart,
    FifoStop,
    /// Bulk FIFO drain: `arg0`/`arg1` carry a little-endian cycle index,
    /// the response's `payload0`/`payload1` carry the next two drained
    /// sample bytes. Not part of spec.md's opcode table — it names only
    /// the single-register ADC access and FIFO control opcodes — added
    /// here as a documented design constant (see DESIGN.md) so the drain
    /// worker can pull bytes off the link within the same 8-byte framing
    /// everything else on this bus uses.
    FifoReadBlock,
    BatteryPowerCut,
    FifoSetBitdepth,
}

impl CamOpcode {
    const fn raw(self) -> u8 {
        match self {
            Self::AdcReadWrite => 0x01,
            Self::AdcSync => 0x02,
            Self::FifoReset => 0x03,
            Self::FifoStart => 0x04,
            Self::FifoStop => 0x05,
            Self::FifoReadBlock => 0x06,
            Self::BatteryPowerCut => 0x0E,
            Self::FifoSetBitdepth => 0x11,
        }
    }

    const fn from_raw(raw: u8) -> Option<Self> {
        match raw {
            0x01 => Some(Self::AdcReadWrite),
            0x02 => Some(Self::AdcSync),
            0x03 => Some(Self::FifoReset),
            0x04 => Some(Self::FifoStart),
            0x05 => Some(Self::FifoStop),
            0x06 => Some(Self::FifoReadBlock),
            0x0E => Some(Self::BatteryPowerCut),
            0x11 => Some(Self::FifoSetBitdepth),
            _ => None,
        }
    }
}

/// One 8-byte CAM packet, framed and checksummed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CamPacket {
    pub opcode: u8,
    pub arg0: u8,
    pub arg1: u8,
    pub payload0: u8,
    pub payload1: u8,
}

impl CamPacket {
    pub fn new(opcode: CamOpcode, arg0: u8, arg1: u8, payload0: u8, payload1: u8) -> Self {
        Self {
            opcode: opcode.raw(),
            arg0,
            arg1,
            payload0,
            payload1,
        }
    }

    /// The high bit of `arg0` selects the ADC-register-address phase of a
    /// two-cycle read, per spec.md §6.
    pub fn adc_read_address(register: u8) -> Self {
        Self::new(CamOpcode::AdcReadWrite, register | 0x80, 0, 0, 0)
    }

    pub fn adc_write(register: u8, value_lo: u8, value_hi: u8) -> Self {
        Self::new(CamOpcode::AdcReadWrite, register & 0x7F, 0, value_lo, value_hi)
    }

    fn checksum(&self) -> u8 {
        [self.opcode, self.arg0, self.arg1, self.payload0, self.payload1]
            .iter()
            .fold(0u8, |acc, b| acc.wrapping_add(*b))
    }

    /// Serialize to the 8-byte wire frame.
    pub fn to_bytes(self) -> [u8; 8] {
        [
            STX,
            self.opcode,
            self.arg0,
            self.arg1,
            self.payload0,
            self.payload1,
            self.checksum(),
            ETX,
        ]
    }

    /// Parse and validate a received 8-byte frame (STX/ETX/checksum).
    pub fn from_bytes(bytes: [u8; 8]) -> Result<Self, WtError> {
        if bytes[0] != STX || bytes[7] != ETX {
            return Err(framing_error());
        }
        let packet = Self {
            opcode: bytes[1],
            arg0: bytes[2],
            arg1: bytes[3],
            payload0: bytes[4],
            payload1: bytes[5],
        };
        if packet.checksum() != bytes[6] {
            return Err(framing_error());
        }
        Ok(packet)
    }

    /// The 16-bit value returned by the second cycle of an ADC read.
    pub fn payload_u16(&self) -> u16 {
        u16::from_le_bytes([self.payload0, self.payload1])
    }

    pub fn decoded_opcode(&self) -> Option<CamOpcode> {
        CamOpcode::from_raw(self.opcode)
    }
}

fn framing_error() -> WtError {
    WtError::new(DeviceId::Fpga, ErrCode::MalformedPacket)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_the_wire_format() {
        let packet = CamPacket::new(CamOpcode::FifoStart, 0x01, 0x02, 0x03, 0x04);
        let bytes = packet.to_bytes();
        assert_eq!(bytes[0], 0x02);
        assert_eq!(bytes[7], 0x03);
        let parsed = CamPacket::from_bytes(bytes).unwrap();
        assert_eq!(parsed, packet);
    }

    #[test]
    fn rejects_bad_checksum() {
        let mut bytes = CamPacket::new(CamOpcode::FifoReset, 0, 0, 0, 0).to_bytes();
        bytes[6] ^= 0xFF;
        assert!(CamPacket::from_bytes(bytes).is_err());
    }

    #[test]
    fn rejects_bad_framing_bytes() {
        let mut bytes = CamPacket::new(CamOpcode::FifoReset, 0, 0, 0, 0).to_bytes();
        bytes[0] = 0x00;
        assert!(CamPacket::from_bytes(bytes).is_err());
    }

    #[test]
    fn adc_read_sets_high_bit_of_arg0() {
        let packet = CamPacket::adc_read_address(0x05);
        assert_eq!(packet.arg0 & 0x80, 0x80);
        assert_eq!(packet.arg0 & 0x7F, 0x05);
    }

    #[test]
    fn payload_u16_is_little_endian() {
        let packet = CamPacket::new(CamOpcode::AdcReadWrite, 0, 0, 0x34, 0x12);
        assert_eq!(packet.payload_u16(), 0x1234);
    }

    #[test]
    fn opcode_table_matches_design_constants() {
        assert_eq!(CamOpcode::AdcReadWrite.raw(), 0x01);
        assert_eq!(CamOpcode::FifoReadBlock.raw(), 0x06);
        assert_eq!(CamOpcode::BatteryPowerCut.raw(), 0x0E);
        assert_eq!(CamOpcode::FifoSetBitdepth.raw(), 0x11);
        assert_eq!(CamOpcode::from_raw(0x06), Some(CamOpcode::FifoReadBlock));
        assert_eq!(CamOpcode::from_raw(0x0E), Some(CamOpcode::BatteryPowerCut));
        assert_eq!(CamOpcode::from_raw(0xFF), None);
    }
}
