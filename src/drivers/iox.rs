//! I/O expander: shared digital-input/output bank at I2C address 0x21.
//!
//! Used by two unrelated consumers: ECG lead-off detection (two input
//! bits) and the burnwire drive line, when the board routes it through
//! the expander rather than a native GPIO. Modeled as a byte-wide
//! input-register read plus a read-modify-write output-register set,
//! which is how every PCA9539/TCA9535-class expander on this bus family
//! exposes its pins.

use embedded_hal::i2c::I2c;

use crate::drivers::i2c_bus::SharedI2c;
use crate::error::{DeviceId, WtError};

const REG_INPUT: u8 = 0x00;
const REG_OUTPUT: u8 = 0x02;

pub struct IoExpander<I: I2c> {
    bus: SharedI2c<I>,
    addr: u8,
}

impl<I: I2c> IoExpander<I> {
    pub fn new(bus: SharedI2c<I>, addr: u8) -> Self {
        Self { bus, addr }
    }

    pub fn read_inputs(&self) -> Result<u8, WtError> {
        let mut buf = [0u8; 1];
        self.bus
            .write_read(DeviceId::Iox, self.addr, &[REG_INPUT], &mut buf)?;
        Ok(buf[0])
    }

    /// True when `bit` reads low, i.e. a lead-off condition per the
    /// ECG front-end's active-low convention.
    pub fn is_bit_low(&self, bit: u8) -> Result<bool, WtError> {
        Ok(self.read_inputs()? & (1 << bit) == 0)
    }

    fn read_outputs(&self) -> Result<u8, WtError> {
        let mut buf = [0u8; 1];
        self.bus
            .write_read(DeviceId::Iox, self.addr, &[REG_OUTPUT], &mut buf)?;
        Ok(buf[0])
    }

    pub fn set_output_bit(&self, bit: u8, value: bool) -> Result<(), WtError> {
        let mut outputs = self.read_outputs()?;
        if value {
            outputs |= 1 << bit;
        } else {
            outputs &= !(1 << bit);
        }
        self.bus
            .write(DeviceId::Iox, self.addr, &[REG_OUTPUT, outputs])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_hal::i2c::{ErrorType, Operation};

    /// A byte-wide expander register bank. Overrides `read`/`write`/
    /// `write_read` directly rather than `transaction`, since
    /// `SharedI2c` only ever calls those three.
    #[derive(Default)]
    struct FakeExpander {
        input_reg: u8,
        output_reg: u8,
    }

    impl ErrorType for FakeExpander {
        type Error = core::convert::Infallible;
    }

    impl I2c for FakeExpander {
        fn transaction(&mut self, _address: u8, _operations: &mut [Operation<'_>]) -> Result<(), Self::Error> {
            unreachable!("SharedI2c drives read/write/write_read directly")
        }

        fn read(&mut self, _address: u8, read: &mut [u8]) -> Result<(), Self::Error> {
            read[0] = self.input_reg;
            Ok(())
        }

        fn write(&mut self, _address: u8, write: &[u8]) -> Result<(), Self::Error> {
            if let [REG_OUTPUT, value] = write {
                self.output_reg = *value;
            }
            Ok(())
        }

        fn write_read(&mut self, _address: u8, write: &[u8], read: &mut [u8]) -> Result<(), Self::Error> {
            read[0] = match write {
                [REG_INPUT] => self.input_reg,
                [REG_OUTPUT] => self.output_reg,
                _ => 0,
            };
            Ok(())
        }
    }

    #[test]
    fn is_bit_low_reflects_the_input_register() {
        let bus = SharedI2c::new(FakeExpander { input_reg: 0b1111_1101, output_reg: 0 });
        let iox = IoExpander::new(bus, 0x21);
        assert!(iox.is_bit_low(1).unwrap());
        assert!(!iox.is_bit_low(0).unwrap());
    }

    #[test]
    fn set_output_bit_preserves_other_bits() {
        let bus = SharedI2c::new(FakeExpander { input_reg: 0, output_reg: 0b0000_0100 });
        let iox = IoExpander::new(bus, 0x21);
        iox.set_output_bit(0, true).unwrap();
        assert_eq!(iox.read_outputs().unwrap(), 0b0000_0101);
    }

    #[test]
    fn set_output_bit_can_clear_a_bit() {
        let bus = SharedI2c::new(FakeExpander { input_reg: 0, output_reg: 0b0000_0111 });
        let iox = IoExpander::new(bus, 0x21);
        iox.set_output_bit(1, false).unwrap();
        assert_eq!(iox.read_outputs().unwrap(), 0b0000_0101);
    }
}
