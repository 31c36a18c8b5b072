//! Monitor seam between the async agent and the blocking I2C driver.

use async_trait::async_trait;

use crate::ups::types::UpsSnapshot;
use crate::ups::UpsError;

/// Per-cycle UPS poll. Stateless: each call reads fresh hardware state.
#[async_trait]
pub trait UpsMonitor: Send + Sync {
    async fn read_snapshot(&self) -> Result<UpsSnapshot, UpsError>;
}

/// Polls a PiJuice HAT over the configured I2C bus.
///
/// The device is opened per poll, so an unplugged or resetting HAT shows up
/// as `Unreachable` on that cycle and recovers by itself on the next one.
#[cfg(target_os = "linux")]
pub struct PiJuiceMonitor {
    bus: u8,
    address: u16,
}

#[cfg(target_os = "linux")]
impl PiJuiceMonitor {
    pub fn new(bus: u8, address: u16) -> Self {
        Self { bus, address }
    }
}

#[cfg(target_os = "linux")]
#[async_trait]
impl UpsMonitor for PiJuiceMonitor {
    async fn read_snapshot(&self) -> Result<UpsSnapshot, UpsError> {
        let (bus, address) = (self.bus, self.address);
        tokio::task::spawn_blocking(move || {
            let i2c = crate::ups::i2c::LinuxI2cBus::open(bus, address)?;
            let mut pijuice = crate::ups::pijuice::PiJuice::new(i2c);
            pijuice.snapshot()
        })
        .await
        .map_err(|e| UpsError::Poll(e.to_string()))?
    }
}
