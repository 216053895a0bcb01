use std::sync::Mutex;

use crate::error::BusError;

/// Register level access to one chip: the only shape the PWM driver needs from
/// the I2C layer.
pub trait RegisterBus {
    fn write_registers(&mut self, address: u8, bytes: &[u8]) -> Result<(), BusError>;
    /// Fills `buf` starting at `address`, relying on the chip's auto increment.
    fn read_registers(&mut self, address: u8, buf: &mut [u8]) -> Result<(), BusError>;

    fn read_register(&mut self, address: u8) -> Result<u8, BusError> {
        let mut value = [0u8];
        self.read_registers(address, &mut value)?;
        Ok(value[0])
    }

    fn write_register(&mut self, address: u8, value: u8) -> Result<(), BusError> {
        self.write_registers(address, &[value])
    }
}

impl<B: RegisterBus + ?Sized> RegisterBus for &mut B {
    fn write_registers(&mut self, address: u8, bytes: &[u8]) -> Result<(), BusError> {
        (**self).write_registers(address, bytes)
    }

    fn read_registers(&mut self, address: u8, buf: &mut [u8]) -> Result<(), BusError> {
        (**self).read_registers(address, buf)
    }
}

/// A bus shared by several chips. Every transaction holds the lock for its
/// whole duration so transfers from different drivers never interleave.
///
/// Guarded by an OS mutex, not a critical section, so the RC edge producer
/// never waits behind a transfer.
pub struct SharedBus<B> {
    bus: Mutex<B>,
}

impl<B> SharedBus<B> {
    pub fn new(bus: B) -> Self {
        Self {
            bus: Mutex::new(bus),
        }
    }

    /// Runs `f` with exclusive access. A poisoned lock (a driver panicked mid
    /// transfer) reports [`BusError::Busy`].
    pub fn lock<R>(&self, f: impl FnOnce(&mut B) -> R) -> Result<R, BusError> {
        let mut bus = self.bus.lock().map_err(|_| BusError::Busy)?;
        Ok(f(&mut bus))
    }

    pub fn into_inner(self) -> Result<B, BusError> {
        self.bus.into_inner().map_err(|_| BusError::Busy)
    }
}

impl<B: RegisterBus> RegisterBus for &SharedBus<B> {
    fn write_registers(&mut self, address: u8, bytes: &[u8]) -> Result<(), BusError> {
        self.lock(|bus| bus.write_registers(address, bytes))?
    }

    fn read_registers(&mut self, address: u8, buf: &mut [u8]) -> Result<(), BusError> {
        self.lock(|bus| bus.read_registers(address, buf))?
    }
}
