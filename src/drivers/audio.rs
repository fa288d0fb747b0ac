//! Audio front-end: FPGA-mediated 4-channel ΣΔ ADC plus its sample FIFO.
//!
//! Ground-truthed against `device/fpga.h`'s CAM macros and `gpio.h`'s pin
//! map: ADC register access and FIFO control ride the 8-byte CAM protocol
//! ([`crate::fpga_cam`]); FIFO drain watches `AUDIO_DATA_AVAILABLE` (and
//! `AUDIO_OVERFLOW_GPIO`) and bulk-reads one block at a time over the
//! bit-banged CAM data lines. `powerdown` reproduces the fixed
//! `wt_fpga_shutdown()` opcode/argument tuple `(0x0E, 0x6C, 0x61, 0x03,
//! 0x00)`, which writes the BMS's shutdown register through the FPGA's
//! own I2C bus rather than the host's.

use embedded_hal::digital::InputPin;

use crate::error::WtError;
use crate::fpga_cam::{CamOpcode, CamPacket};

/// Bits per audio sample, negotiated once at recording start via
/// `fifo_set_bitdepth`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BitDepth {
    Sixteen,
    TwentyFour,
}

impl BitDepth {
    fn cam_arg(self) -> u8 {
        match self {
            Self::Sixteen => 16,
            Self::TwentyFour => 24,
        }
    }
}

/// Transport abstraction over the bit-banged CAM link, so the drain loop
/// and `AudioFifo` stay testable without real GPIO/SPI hardware. The
/// production implementation bit-bangs CLK/DIN/DOUT at a conservative
/// ~100 us half-period, per SPEC_FULL.md's correctness-over-speed note.
pub trait CamTransport {
    fn exchange(&mut self, packet: CamPacket) -> Result<CamPacket, WtError>;
}

pub struct AudioFifo<T: CamTransport, D: InputPin, O: InputPin> {
    transport: T,
    data_available: D,
    overflow: O,
}

impl<T: CamTransport, D: InputPin, O: InputPin> AudioFifo<T, D, O> {
    pub fn new(transport: T, data_available: D, overflow: O) -> Self {
        Self {
            transport,
            data_available,
            overflow,
        }
    }

    fn cam(&mut self, packet: CamPacket) -> Result<CamPacket, WtError> {
        self.transport.exchange(packet)
    }

    pub fn configure_bitdepth(&mut self, depth: BitDepth) -> Result<(), WtError> {
        self.cam(CamPacket::new(
            CamOpcode::FifoSetBitdepth,
            depth.cam_arg(),
            0,
            0,
            0,
        ))?;
        Ok(())
    }

    pub fn reset(&mut self) -> Result<(), WtError> {
        self.cam(CamPacket::new(CamOpcode::FifoReset, 0, 0, 0, 0))?;
        Ok(())
    }

    pub fn start(&mut self) -> Result<(), WtError> {
        self.cam(CamPacket::new(CamOpcode::FifoStart, 0, 0, 0, 0))?;
        Ok(())
    }

    pub fn stop(&mut self) -> Result<(), WtError> {
        self.cam(CamPacket::new(CamOpcode::FifoStop, 0, 0, 0, 0))?;
        Ok(())
    }

    /// True when the FPGA reports samples waiting in the FIFO.
    pub fn data_available(&mut self) -> bool {
        self.data_available.is_high().unwrap_or(false)
    }

    /// True when the FIFO has overflowed since the last check. The drain
    /// loop never stops on this — it keeps draining and tags the next
    /// block header, per spec.md §4.4.
    pub fn overflowed(&mut self) -> bool {
        self.overflow.is_high().unwrap_or(false)
    }

    /// Cut battery power via the FPGA's own I2C write to the BMS —
    /// the fixed `(0x0E, 0x6C, 0x61, 0x03, 0x00)` CAM tuple.
    pub fn powerdown(&mut self) -> Result<(), WtError> {
        self.cam(CamPacket::new(CamOpcode::BatteryPowerCut, 0x6C, 0x61, 0x03, 0x00))?;
        Ok(())
    }

    /// Bulk-read `len` drained bytes over the CAM link: one
    /// `FifoReadBlock` cycle per two bytes, each cycle's response payload
    /// carrying the next pair of sample bytes. Mirrors the two-cycle
    /// request/response shape [`adc_read_sequence`] already uses for
    /// register reads, generalised to an arbitrary byte count.
    pub fn read_block(&mut self, len: usize) -> Result<Vec<u8>, WtError> {
        let mut block = Vec::with_capacity(len);
        let mut index: u16 = 0;
        while block.len() < len {
            let [arg0, arg1] = index.to_le_bytes();
            let response = self.cam(CamPacket::new(CamOpcode::FifoReadBlock, arg0, arg1, 0, 0))?;
            block.push(response.payload0);
            if block.len() < len {
                block.push(response.payload1);
            }
            index += 1;
        }
        Ok(block)
    }
}

/// Bytes drained per audio block handed to the logging worker, per
/// spec.md §4.4.
pub const AUDIO_BLOCK_BYTES: usize = 512;

pub fn adc_configure_register(register: u8, value: u16) -> CamPacket {
    let [lo, hi] = value.to_le_bytes();
    CamPacket::new(CamOpcode::AdcReadWrite, register & 0x7F, 0, lo, hi)
}

/// Build the two-cycle CAM sequence for reading ADC register `register`
/// (spec.md §6: address phase with high bit set, then a data phase).
pub fn adc_read_sequence(register: u8) -> [CamPacket; 2] {
    let addr_phase = CamPacket::adc_read_address(register);
    [addr_phase, addr_phase]
}

pub fn adc_sync() -> CamPacket {
    CamPacket::new(CamOpcode::AdcSync, 0, 0, 0, 0)
}

/// A `CamTransport` that answers every exchange with a bus-transaction
/// error. Wires the audio pipeline end to end ahead of a real bit-banged
/// CLK/DIN/DOUT transport — the same placeholder-pending-hardware role
/// the teacher's RPC engine fills with its own null transport.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullCamTransport;

impl CamTransport for NullCamTransport {
    fn exchange(&mut self, _packet: CamPacket) -> Result<CamPacket, WtError> {
        Err(WtError::new(
            crate::error::DeviceId::Fpga,
            crate::error::ErrCode::BusOpenFailed,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct LoopbackTransport;
    impl CamTransport for LoopbackTransport {
        fn exchange(&mut self, packet: CamPacket) -> Result<CamPacket, WtError> {
            Ok(packet)
        }
    }

    struct FixedPin(bool);
    impl embedded_hal::digital::ErrorType for FixedPin {
        type Error = core::convert::Infallible;
    }
    impl InputPin for FixedPin {
        fn is_high(&mut self) -> Result<bool, Self::Error> {
            Ok(self.0)
        }
        fn is_low(&mut self) -> Result<bool, Self::Error> {
            Ok(!self.0)
        }
    }

    #[test]
    fn powerdown_sends_fixed_cam_tuple() {
        let mut fifo = AudioFifo::new(LoopbackTransport, FixedPin(false), FixedPin(false));
        let echoed = fifo.cam(CamPacket::new(CamOpcode::BatteryPowerCut, 0x6C, 0x61, 0x03, 0x00)).unwrap();
        assert_eq!(echoed.arg0, 0x6C);
        assert_eq!(echoed.arg1, 0x61);
        assert_eq!(echoed.payload0, 0x03);
    }

    #[test]
    fn adc_read_sequence_sets_high_bit_on_both_cycles() {
        let seq = adc_read_sequence(0x10);
        assert_eq!(seq[0].arg0 & 0x80, 0x80);
        assert_eq!(seq[1].arg0 & 0x80, 0x80);
    }

    #[test]
    fn data_available_reflects_pin_state() {
        let mut fifo = AudioFifo::new(LoopbackTransport, FixedPin(true), FixedPin(false));
        assert!(fifo.data_available());
        assert!(!fifo.overflowed());
    }

    struct CountingTransport;
    impl CamTransport for CountingTransport {
        fn exchange(&mut self, packet: CamPacket) -> Result<CamPacket, WtError> {
            let index = u16::from_le_bytes([packet.arg0, packet.arg1]);
            Ok(CamPacket {
                payload0: (index * 2) as u8,
                payload1: (index * 2 + 1) as u8,
                ..packet
            })
        }
    }

    #[test]
    fn read_block_assembles_bytes_from_successive_cam_cycles() {
        let mut fifo = AudioFifo::new(CountingTransport, FixedPin(false), FixedPin(false));
        let block = fifo.read_block(5).unwrap();
        assert_eq!(block, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn read_block_propagates_transport_errors() {
        let mut fifo = AudioFifo::new(NullCamTransport, FixedPin(false), FixedPin(false));
        assert!(fifo.read_block(AUDIO_BLOCK_BYTES).is_err());
    }
}
