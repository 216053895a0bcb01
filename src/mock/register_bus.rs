//! Mock register bus behaving like a PCA9685

use crate::consts::{
    CHANNEL_FULL_OFF, MODE1_SLEEP, PCA9685_ALL_CHANNELS_ON_LOW, PCA9685_CHANNEL_COUNT,
    PCA9685_CHANNEL_SIZE, PCA9685_CHANNEL_START, PCA9685_MODE1, PCA9685_PRESCALE,
    PCA9685_PRESCALE_DEFAULT,
};
use crate::drivers::bus::RegisterBus;
use crate::error::BusError;

// power-on MODE1: sleeping, responds to all call
const MODE1_POWER_ON: u8 = MODE1_SLEEP | 0x01;

/// 256 byte register file with auto increment.
///
/// Like the real chip, prescale writes only take effect while sleeping and
/// writes to the "all call" group land in every channel.
#[derive(Debug)]
pub struct MockRegisterBus {
    registers: [u8; 256],
    writes: Vec<(u8, Vec<u8>)>,
    fail_next: Option<BusError>,
}

impl MockRegisterBus {
    pub fn new() -> Self {
        let mut registers = [0u8; 256];
        registers[PCA9685_MODE1 as usize] = MODE1_POWER_ON;
        registers[PCA9685_PRESCALE as usize] = PCA9685_PRESCALE_DEFAULT;
        for channel in 0..PCA9685_CHANNEL_COUNT {
            let off_high = PCA9685_CHANNEL_START as usize + channel * PCA9685_CHANNEL_SIZE as usize + 3;
            registers[off_high] = CHANNEL_FULL_OFF;
        }

        Self {
            registers,
            writes: Vec::new(),
            fail_next: None,
        }
    }

    pub fn with_register(mut self, address: u8, value: u8) -> Self {
        self.registers[address as usize] = value;
        self
    }

    pub fn register(&self, address: u8) -> u8 {
        self.registers[address as usize]
    }

    /// Every successful write as (start address, bytes)
    pub fn writes(&self) -> &[(u8, Vec<u8>)] {
        &self.writes
    }

    pub fn clear_writes(&mut self) {
        self.writes.clear();
    }

    /// Makes the next transfer fail with `error`
    pub fn fail_next(&mut self, error: BusError) {
        self.fail_next = Some(error);
    }

    fn store(&mut self, address: u8, value: u8) {
        if address == PCA9685_PRESCALE && self.registers[PCA9685_MODE1 as usize] & MODE1_SLEEP == 0 {
            return;
        }

        self.registers[address as usize] = value;

        let all_call = PCA9685_ALL_CHANNELS_ON_LOW..PCA9685_ALL_CHANNELS_ON_LOW + PCA9685_CHANNEL_SIZE;
        if all_call.contains(&address) {
            let offset = (address - PCA9685_ALL_CHANNELS_ON_LOW) as usize;
            for channel in 0..PCA9685_CHANNEL_COUNT {
                let target = PCA9685_CHANNEL_START as usize + channel * PCA9685_CHANNEL_SIZE as usize + offset;
                self.registers[target] = value;
            }
        }
    }
}

impl Default for MockRegisterBus {
    fn default() -> Self {
        Self::new()
    }
}

impl RegisterBus for MockRegisterBus {
    fn write_registers(&mut self, address: u8, bytes: &[u8]) -> Result<(), BusError> {
        if let Some(error) = self.fail_next.take() {
            return Err(error);
        }

        for (offset, &value) in bytes.iter().enumerate() {
            self.store(address.wrapping_add(offset as u8), value);
        }
        self.writes.push((address, bytes.to_vec()));
        Ok(())
    }

    fn read_registers(&mut self, address: u8, buf: &mut [u8]) -> Result<(), BusError> {
        if let Some(error) = self.fail_next.take() {
            return Err(error);
        }

        for (offset, value) in buf.iter_mut().enumerate() {
            *value = self.registers[address.wrapping_add(offset as u8) as usize];
        }
        Ok(())
    }
}
