//! I²C transport over the Linux `i2c-dev` character devices.
use crate::{check_address, Board, Endpoint, I2cBus, I2cError, I2cResult, MAX_ADDRESS};
use bitvec::vec::BitVec;
use log::{debug, trace};
use std::fmt::{Debug, Formatter};
use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Read, Write};
use std::os::fd::AsRawFd;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// `ioctl` request selecting the slave address for subsequent reads and writes.
const I2C_SLAVE: u16 = 0x0703;

/// One `/dev/i2c-N` device shared by every endpoint on that bus.
///
/// The device file is opened on the first [I2cBus::open] and released when the last endpoint is
/// closed. A single mutex guards the file and the currently selected slave address. Every
/// transaction re-selects its endpoint's address (only issuing the `ioctl` when it changed) under
/// that lock, so a re-address and the transfer after it never interleave with another caller's.
pub struct LinuxI2cBus {
    bus: u8,
    path: PathBuf,
    state: Mutex<BusState>,
}

struct BusState {
    file: Option<File>,
    selected: Option<u8>,
    open_addresses: BitVec,
}

impl LinuxI2cBus {
    pub fn new(bus: u8) -> Self {
        Self::with_path(bus, format!("/dev/i2c-{}", bus))
    }

    pub fn for_board(board: Board) -> Self {
        Self::new(board.bus())
    }

    /// Uses a device node at a non-standard path, e.g. a udev symlink.
    pub fn with_path(bus: u8, path: impl AsRef<Path>) -> Self {
        LinuxI2cBus {
            bus,
            path: path.as_ref().to_path_buf(),
            state: Mutex::new(BusState {
                file: None,
                selected: None,
                open_addresses: BitVec::repeat(false, MAX_ADDRESS as usize + 1),
            }),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the device file is currently held. It is only held while an endpoint is open.
    pub fn is_device_open(&self) -> bool {
        self.lock().file.is_some()
    }

    fn lock(&self) -> MutexGuard<'_, BusState> {
        // A panic mid-transaction leaves nothing half-written in BusState itself.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn ensure_file(&self, state: &mut BusState) -> I2cResult<()> {
        if state.file.is_none() {
            let file = OpenOptions::new()
                .read(true)
                .write(true)
                .open(&self.path)
                .map_err(|err| I2cError::BusUnavailable {
                    bus: self.bus,
                    kind: err.kind(),
                })?;
            debug!("Opened {}", self.path.display());
            state.file = Some(file);
            state.selected = None;
        }
        Ok(())
    }

    fn select(state: &mut BusState, address: u8) -> I2cResult<()> {
        if state.selected == Some(address) {
            return Ok(());
        }
        let Some(file) = state.file.as_ref() else {
            return Err(I2cError::EndpointClosed { address });
        };

        // SAFETY: the descriptor is owned by `file` and stays open for the duration of the call.
        let ret = unsafe {
            libc::ioctl(file.as_raw_fd(), I2C_SLAVE as _, libc::c_ulong::from(address))
        };
        if ret < 0 {
            state.selected = None;
            return Err(I2cError::AddressRejected {
                address,
                kind: std::io::Error::last_os_error().kind(),
            });
        }

        trace!("Selected slave {:#04x}", address);
        state.selected = Some(address);
        Ok(())
    }

    fn release_if_unused(&self, state: &mut BusState) {
        if state.open_addresses.not_any() && state.file.take().is_some() {
            state.selected = None;
            debug!("Closed {}", self.path.display());
        }
    }

    fn check_open(&self, state: &BusState, endpoint: &Endpoint) -> I2cResult<()> {
        let address = endpoint.address();
        if endpoint.bus() != self.bus
            || address > MAX_ADDRESS
            || !state.open_addresses[address as usize]
        {
            return Err(I2cError::EndpointClosed { address });
        }
        Ok(())
    }
}

impl Debug for LinuxI2cBus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "LinuxI2cBus({})", self.path.display())
    }
}

impl I2cBus for LinuxI2cBus {
    fn bus(&self) -> u8 {
        self.bus
    }

    fn open(&self, address: u8) -> I2cResult<Endpoint> {
        check_address(address)?;
        let endpoint = Endpoint::new(self.bus, address);

        let mut state = self.lock();
        if state.open_addresses[address as usize] {
            return Ok(endpoint);
        }

        self.ensure_file(&mut state)?;
        if let Err(err) = Self::select(&mut state, address) {
            self.release_if_unused(&mut state);
            return Err(err);
        }

        state.open_addresses.set(address as usize, true);
        debug!("Opened endpoint {}", endpoint);
        Ok(endpoint)
    }

    fn write(&self, endpoint: &Endpoint, data: &[u8]) -> I2cResult<usize> {
        let address = endpoint.address();
        let mut state = self.lock();
        self.check_open(&state, endpoint)?;
        Self::select(&mut state, address)?;

        trace!("Writing to {}: {:02x?}", endpoint, data);
        let Some(file) = state.file.as_mut() else {
            return Err(I2cError::EndpointClosed { address });
        };
        match file.write(data) {
            Ok(written) if written == data.len() => Ok(written),
            Ok(_) => Err(I2cError::Write {
                address,
                kind: ErrorKind::WriteZero,
            }),
            Err(err) => Err(I2cError::Write {
                address,
                kind: err.kind(),
            }),
        }
    }

    fn read(&self, endpoint: &Endpoint, max_len: usize) -> I2cResult<Vec<u8>> {
        let address = endpoint.address();
        let mut state = self.lock();
        self.check_open(&state, endpoint)?;
        Self::select(&mut state, address)?;

        let Some(file) = state.file.as_mut() else {
            return Err(I2cError::EndpointClosed { address });
        };
        let mut buf = vec![0u8; max_len];
        let read = file.read(&mut buf).map_err(|err| I2cError::Read {
            address,
            kind: err.kind(),
        })?;
        buf.truncate(read);
        trace!("Read from {}: {:02x?}", endpoint, buf);
        Ok(buf)
    }

    fn close(&self, endpoint: &Endpoint) -> I2cResult<()> {
        let address = endpoint.address();
        if endpoint.bus() != self.bus || address > MAX_ADDRESS {
            return Ok(());
        }

        let mut state = self.lock();
        if !state.open_addresses[address as usize] {
            return Ok(());
        }
        state.open_addresses.set(address as usize, false);
        debug!("Closed endpoint {}", endpoint);
        self.release_if_unused(&mut state);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn missing_bus() -> LinuxI2cBus {
        LinuxI2cBus::with_path(42, "/nonexistent/dev/i2c-42")
    }

    #[test]
    fn default_path_follows_bus_number() {
        assert_eq!(LinuxI2cBus::new(6).path(), Path::new("/dev/i2c-6"));
        assert_eq!(LinuxI2cBus::for_board(Board::RaspberryPi).path(), Path::new("/dev/i2c-1"));
    }

    #[test]
    fn missing_device_is_bus_unavailable() {
        let bus = missing_bus();
        assert_eq!(
            bus.open(0x3E),
            Err(I2cError::BusUnavailable { bus: 42, kind: ErrorKind::NotFound })
        );
    }

    #[test]
    fn invalid_address_is_rejected_before_opening_the_device() {
        let bus = missing_bus();
        assert!(matches!(
            bus.open(0xFE),
            Err(I2cError::AddressRejected { address: 0xFE, .. })
        ));
    }

    #[test]
    fn unopened_endpoints_cannot_be_used() {
        let bus = missing_bus();
        let endpoint = Endpoint::new(42, 0x62);
        assert_eq!(
            bus.write(&endpoint, &[0x04, 0xFF]),
            Err(I2cError::EndpointClosed { address: 0x62 })
        );
        assert_eq!(bus.read(&endpoint, 1), Err(I2cError::EndpointClosed { address: 0x62 }));
    }

    #[test]
    fn rejected_address_does_not_hold_the_device() {
        // A regular file opens fine but refuses the slave-select ioctl.
        let path = std::env::temp_dir().join(format!("rgblcd-not-i2c-{}", std::process::id()));
        std::fs::write(&path, []).unwrap();
        let bus = LinuxI2cBus::with_path(7, &path);

        assert!(matches!(
            bus.open(0x3E),
            Err(I2cError::AddressRejected { address: 0x3E, .. })
        ));
        assert!(!bus.is_device_open());
        assert_eq!(
            bus.write(&Endpoint::new(7, 0x3E), &[0x80, 0x01]),
            Err(I2cError::EndpointClosed { address: 0x3E })
        );

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn closing_an_unopened_endpoint_is_a_no_op() {
        let bus = missing_bus();
        let endpoint = Endpoint::new(42, 0x3E);
        assert_eq!(bus.close(&endpoint), Ok(()));
        assert_eq!(bus.close(&endpoint), Ok(()));
    }
}
