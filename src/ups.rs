//! UPS access: I2C transport, PiJuice protocol, snapshot types, monitor trait.

pub mod i2c;
pub mod monitor;
pub mod pijuice;
pub mod types;

use thiserror::Error;

/// Errors raised while talking to the UPS. Every variant is non-fatal to the
/// host collection cycle: callers log it and skip augmentation for the cycle.
#[derive(Debug, Error)]
pub enum UpsError {
    #[error("UPS unreachable on /dev/i2c-{bus}: {source}")]
    Unreachable {
        bus: u8,
        #[source]
        source: std::io::Error,
    },

    #[error("I2C read of command {command:#04x} failed: {source}")]
    ReadFailed {
        command: u8,
        #[source]
        source: std::io::Error,
    },

    #[error("checksum mismatch on command {command:#04x} (expected {expected:#04x}, got {received:#04x})")]
    BadChecksum {
        command: u8,
        expected: u8,
        received: u8,
    },

    #[error("short response to command {command:#04x}: got {got} bytes, wanted {wanted}")]
    ShortResponse {
        command: u8,
        got: usize,
        wanted: usize,
    },

    #[error("malformed {field} value: {detail}")]
    MalformedValue {
        field: &'static str,
        detail: String,
    },

    #[error("UPS poll task failed: {0}")]
    Poll(String),
}
