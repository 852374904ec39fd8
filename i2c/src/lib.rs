//! Raw, address-selectable byte I/O over an I²C bus.
//!
//! The [I2cBus] trait is the seam between the display protocol and the board. [LinuxI2cBus]
//! talks to `/dev/i2c-N` character devices, [mock::MockI2cBus] records transactions for tests.
pub mod board;
pub mod delay;
pub mod linux;
pub mod mock;

use std::fmt::{Debug, Display, Formatter};
use std::io::ErrorKind;
use thiserror::Error;

pub use board::Board;
pub use delay::{Delay, ThreadDelay};
pub use linux::LinuxI2cBus;

/// Highest valid 7-bit slave address.
pub const MAX_ADDRESS: u8 = 0x7F;

#[derive(Debug, Error, Eq, PartialEq, Clone)]
pub enum I2cError {
    #[error("I2C bus {bus} unavailable: {kind}")]
    BusUnavailable { bus: u8, kind: ErrorKind },
    #[error("address {address:#04x} rejected: {kind}")]
    AddressRejected { address: u8, kind: ErrorKind },
    #[error("write to {address:#04x} failed: {kind}")]
    Write { address: u8, kind: ErrorKind },
    #[error("read from {address:#04x} failed: {kind}")]
    Read { address: u8, kind: ErrorKind },
    #[error("endpoint {address:#04x} is closed")]
    EndpointClosed { address: u8 },
}

pub type I2cResult<T> = Result<T, I2cError>;

/// Handle to one addressed chip on one bus.
///
/// Handles are plain values; the transport that issued one keeps track of whether it is still open.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct Endpoint {
    bus: u8,
    address: u8,
}

impl Endpoint {
    pub fn new(bus: u8, address: u8) -> Self {
        Endpoint { bus, address }
    }

    pub fn bus(&self) -> u8 {
        self.bus
    }

    pub fn address(&self) -> u8 {
        self.address
    }
}

impl Display for Endpoint {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "i2c-{}@{:#04x}", self.bus, self.address)
    }
}

/// A shared I²C bus.
///
/// All methods take `&self` so that several drivers can hold the same bus. Implementations must
/// serialize every transaction (and `close`) under one bus-wide lock: I²C is not reentrant, and two
/// interleaved transactions to different addresses corrupt each other.
pub trait I2cBus: Debug + Send + Sync {
    /// Gets the bus number this transport is bound to.
    fn bus(&self) -> u8;

    /// Opens an endpoint for the given 7-bit address.
    ///
    /// Opening an address that is already open returns the same endpoint.
    ///
    /// # Errors
    /// - [I2cError::BusUnavailable] if the bus device cannot be opened.
    /// - [I2cError::AddressRejected] if the address cannot be selected.
    fn open(&self, address: u8) -> I2cResult<Endpoint>;

    /// Writes `data` as one transaction, returning the number of bytes written.
    ///
    /// A short write is reported as [I2cError::Write].
    fn write(&self, endpoint: &Endpoint, data: &[u8]) -> I2cResult<usize>;

    /// Reads at most `max_len` bytes. Short reads return fewer bytes and are not errors.
    fn read(&self, endpoint: &Endpoint, max_len: usize) -> I2cResult<Vec<u8>>;

    /// Releases the endpoint. Closing an endpoint that is not open does nothing.
    fn close(&self, endpoint: &Endpoint) -> I2cResult<()>;
}

pub(crate) fn check_address(address: u8) -> I2cResult<()> {
    if address > MAX_ADDRESS {
        return Err(I2cError::AddressRejected {
            address,
            kind: ErrorKind::InvalidInput,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_display_shows_bus_and_address() {
        assert_eq!(Endpoint::new(6, 0x3E).to_string(), "i2c-6@0x3e");
    }

    #[test]
    fn eight_bit_addresses_are_rejected() {
        assert_eq!(
            check_address(0x80),
            Err(I2cError::AddressRejected { address: 0x80, kind: ErrorKind::InvalidInput })
        );
        assert!(check_address(MAX_ADDRESS).is_ok());
    }

    #[test]
    fn errors_format_addresses_in_hex() {
        let err = I2cError::Write { address: 0x62, kind: ErrorKind::WriteZero };
        assert_eq!(err.to_string(), format!("write to 0x62 failed: {}", ErrorKind::WriteZero));
    }
}
