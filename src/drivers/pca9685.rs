use std::thread;

use log::{debug, info};

use crate::consts::{
    CHANNEL_FULL_OFF, MODE1_SLEEP, PCA9685_ALL_CHANNELS, PCA9685_ALL_CHANNELS_OFF_HIGH,
    PCA9685_ALL_CHANNELS_ON_LOW, PCA9685_CHANNEL_COUNT, PCA9685_CHANNEL_SIZE,
    PCA9685_CHANNEL_START, PCA9685_INTERNAL_CLOCK_HZ, PCA9685_MODE1, PCA9685_MODE_SWITCH_DELAY,
    PCA9685_PRESCALE, PCA9685_PRESCALE_DEFAULT, PCA9685_PRESCALE_MAXIMUM,
    PCA9685_PRESCALE_MINIMUM, PWM_MAXIMUM,
};
use crate::drivers::bus::RegisterBus;
use crate::drivers::pwm_codec::{
    frequency_from_prescale, prescale_from_frequency, width_to_ms, ChannelValue, Hertz, Millis,
};
use crate::error::{CodecError, PwmError};

/// PCA9685 16 channel PWM/LED controller, the Navio's servo and LED output.
pub struct Pca9685<B: RegisterBus> {
    bus: B,
    clock_hz: u32,
    frequency: Hertz,
    frequency_minimum: Hertz,
    frequency_maximum: Hertz,
    frequency_default: Hertz,
}

impl<B: RegisterBus> Pca9685<B> {
    /// `clock_hz` is the external clock, `None` for the internal 25 MHz oscillator.
    pub fn new(bus: B, clock_hz: Option<u32>) -> Result<Self, PwmError> {
        let clock_hz = clock_hz.unwrap_or(PCA9685_INTERNAL_CLOCK_HZ);
        let frequency_default = frequency_from_prescale(PCA9685_PRESCALE_DEFAULT, clock_hz)?;

        Ok(Self {
            bus,
            clock_hz,
            frequency: frequency_default,
            frequency_minimum: frequency_from_prescale(PCA9685_PRESCALE_MAXIMUM, clock_hz)?,
            frequency_maximum: frequency_from_prescale(PCA9685_PRESCALE_MINIMUM, clock_hz)?,
            frequency_default,
        })
    }

    pub fn release(self) -> B {
        self.bus
    }

    pub fn clock_hz(&self) -> u32 {
        self.clock_hz
    }

    /// Frequency as of the last read or write
    pub fn frequency(&self) -> Hertz {
        self.frequency
    }

    pub fn frequency_minimum(&self) -> Hertz {
        self.frequency_minimum
    }

    pub fn frequency_maximum(&self) -> Hertz {
        self.frequency_maximum
    }

    pub fn frequency_default(&self) -> Hertz {
        self.frequency_default
    }

    pub fn pwm_ms_minimum(&self) -> Result<Millis, PwmError> {
        Ok(width_to_ms(self.frequency, 0)?)
    }

    pub fn pwm_ms_maximum(&self) -> Result<Millis, PwmError> {
        Ok(width_to_ms(self.frequency, PWM_MAXIMUM)?)
    }

    pub fn read_mode1(&mut self) -> Result<u8, PwmError> {
        Ok(self.bus.read_register(PCA9685_MODE1)?)
    }

    /// Stops the oscillator. Returns false if it was already asleep.
    pub fn sleep(&mut self) -> Result<bool, PwmError> {
        let mode = self.read_mode1()?;
        if mode & MODE1_SLEEP != 0 {
            return Ok(false);
        }

        self.bus.write_register(PCA9685_MODE1, mode | MODE1_SLEEP)?;
        thread::sleep(PCA9685_MODE_SWITCH_DELAY);
        Ok(true)
    }

    /// Starts the oscillator. Returns false if it was already running.
    pub fn wake(&mut self) -> Result<bool, PwmError> {
        let mode = self.read_mode1()?;
        if mode & MODE1_SLEEP == 0 {
            return Ok(false);
        }

        self.bus.write_register(PCA9685_MODE1, mode & !MODE1_SLEEP)?;
        thread::sleep(PCA9685_MODE_SWITCH_DELAY);
        Ok(true)
    }

    pub fn read_frequency(&mut self) -> Result<Hertz, PwmError> {
        let prescale = self.bus.read_register(PCA9685_PRESCALE)?;
        self.frequency = frequency_from_prescale(prescale, self.clock_hz)?;
        Ok(self.frequency)
    }

    /// Sets the output frequency and returns the one actually reached.
    ///
    /// The prescale can only change while asleep. The chip is put to sleep for
    /// the write and only woken again if it was running before, so outputs never
    /// start unexpectedly.
    pub fn write_frequency(&mut self, frequency: Hertz) -> Result<Hertz, PwmError> {
        if frequency < self.frequency_minimum || frequency > self.frequency_maximum {
            return Err(PwmError::FrequencyOutOfRange);
        }

        let prescale = prescale_from_frequency(frequency, self.clock_hz)?;
        let was_awake = self.sleep()?;
        self.bus.write_register(PCA9685_PRESCALE, prescale)?;
        let actual = self.read_frequency()?;
        if was_awake {
            self.wake()?;
        }

        info!(
            "PCA9685 frequency set to {} Hz (requested {} Hz, prescale {})",
            actual, frequency, prescale
        );
        Ok(actual)
    }

    /// Register address of a channel group, index 16 being "all call".
    pub fn channel_address(index: usize) -> Result<u8, CodecError> {
        match index {
            PCA9685_ALL_CHANNELS => Ok(PCA9685_ALL_CHANNELS_ON_LOW),
            index if index < PCA9685_CHANNEL_COUNT => {
                Ok(PCA9685_CHANNEL_START + PCA9685_CHANNEL_SIZE * index as u8)
            }
            _ => Err(CodecError::ChannelOutOfRange(index)),
        }
    }

    pub fn read_channel(&mut self, index: usize) -> Result<ChannelValue, PwmError> {
        if index >= PCA9685_CHANNEL_COUNT {
            return Err(CodecError::ChannelOutOfRange(index).into());
        }

        let mut group = [0u8; PCA9685_CHANNEL_SIZE as usize];
        self.bus
            .read_registers(Self::channel_address(index)?, &mut group)?;
        Ok(ChannelValue::from_bytes(&group)?)
    }

    pub fn read_all_channels(&mut self) -> Result<[ChannelValue; PCA9685_CHANNEL_COUNT], PwmError> {
        let mut registers = [0u8; PCA9685_CHANNEL_COUNT * PCA9685_CHANNEL_SIZE as usize];
        self.bus
            .read_registers(PCA9685_CHANNEL_START, &mut registers)?;

        let mut channels = [ChannelValue::ALWAYS_OFF; PCA9685_CHANNEL_COUNT];
        for (channel, group) in channels
            .iter_mut()
            .zip(registers.chunks_exact(PCA9685_CHANNEL_SIZE as usize))
        {
            *channel = ChannelValue::from_bytes(group)?;
        }
        Ok(channels)
    }

    /// Writes both counters of a channel and returns what the chip now holds,
    /// or `None` after an "all call" write.
    pub fn write_channel(
        &mut self,
        index: usize,
        value: ChannelValue,
    ) -> Result<Option<ChannelValue>, PwmError> {
        let address = Self::channel_address(index)?;
        self.bus.write_registers(address, &value.to_bytes())?;
        debug!("PCA9685 channel {} set to on {} off {}", index, value.on(), value.off());

        if index == PCA9685_ALL_CHANNELS {
            return Ok(None);
        }
        self.read_channel(index).map(Some)
    }

    pub fn write_channel_width(
        &mut self,
        index: usize,
        width: u16,
        delay: u16,
    ) -> Result<Option<ChannelValue>, PwmError> {
        let value = ChannelValue::from_width(width, delay)?;
        self.write_channel(index, value)
    }

    /// Pulse length in milliseconds at the frequency currently programmed.
    pub fn write_channel_ms(
        &mut self,
        index: usize,
        width_ms: Millis,
        delay_ms: Millis,
    ) -> Result<Option<ChannelValue>, PwmError> {
        let frequency = self.read_frequency()?;
        let value = ChannelValue::from_width_ms(width_ms, frequency, delay_ms)?;
        self.write_channel(index, value)
    }

    /// Turns every output fully off.
    pub fn clear(&mut self) -> Result<(), PwmError> {
        // enable, zero, then disable all channels
        self.bus.write_register(PCA9685_ALL_CHANNELS_OFF_HIGH, 0x00)?;
        self.bus
            .write_registers(PCA9685_ALL_CHANNELS_ON_LOW, &[0x00; PCA9685_CHANNEL_SIZE as usize])?;
        self.bus
            .write_register(PCA9685_ALL_CHANNELS_OFF_HIGH, CHANNEL_FULL_OFF)?;
        Ok(())
    }
}
