//! Test doubles for running display code without hardware.
//!
//! | Double | Trait | Purpose |
//! |--------|-------|---------|
//! | [MockClock] | [Delay] | Virtual monotonic time, advanced only by delays |
//! | [MockI2cBus] | [I2cBus] | Records timestamped transactions, injects failures, emulates settle times |
//!
//! Both are cheap to share: the bus timestamps every transaction with the clock it was built with,
//! and a driver that waits on the same clock moves that time forward. A driver given a *different*
//! clock never advances the bus's time, which is how tests reproduce a skipped settle delay.
use crate::{check_address, Delay, Endpoint, I2cBus, I2cError, I2cResult};
use log::trace;
use std::collections::{BTreeSet, HashMap, VecDeque};
use std::fmt::{Debug, Formatter};
use std::io::ErrorKind;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Virtual clock. Clones share the same time.
#[derive(Clone, Debug, Default)]
pub struct MockClock {
    nanos: Arc<AtomicU64>,
    delays: Arc<Mutex<Vec<Duration>>>,
}

impl MockClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Time elapsed since the clock was created.
    pub fn now(&self) -> Duration {
        Duration::from_nanos(self.nanos.load(Ordering::SeqCst))
    }

    pub fn advance(&self, duration: Duration) {
        let nanos = u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX);
        self.nanos.fetch_add(nanos, Ordering::SeqCst);
    }

    /// Every delay requested through [Delay::delay], in order.
    pub fn delays(&self) -> Vec<Duration> {
        self.delays
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Delay for MockClock {
    fn delay(&self, duration: Duration) {
        self.delays
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(duration);
        self.advance(duration);
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Operation {
    Open,
    Write,
    /// A write the device refused; nothing reached the chip.
    RejectedWrite,
    Read,
    Close,
}

/// One recorded bus operation.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Transaction {
    pub address: u8,
    pub operation: Operation,
    pub bytes: Vec<u8>,
    pub at: Duration,
}

struct WriteRule {
    address: u8,
    prefix: Vec<u8>,
    duration: Duration,
}

struct FailRule {
    address: u8,
    prefix: Vec<u8>,
    remaining: usize,
}

#[derive(Default)]
struct MockState {
    open: BTreeSet<u8>,
    log: Vec<Transaction>,
    open_failures: HashMap<u8, I2cError>,
    write_failures: Vec<FailRule>,
    settle_rules: Vec<WriteRule>,
    busy_until: HashMap<u8, Duration>,
    read_queue: HashMap<u8, VecDeque<u8>>,
    close_calls: HashMap<u8, usize>,
}

/// Recording I²C bus.
///
/// Transactions are serialized by one mutex, like a real bus.
pub struct MockI2cBus {
    bus: u8,
    clock: MockClock,
    state: Mutex<MockState>,
}

impl MockI2cBus {
    pub fn new() -> Self {
        Self::with_clock(MockClock::new())
    }

    pub fn with_clock(clock: MockClock) -> Self {
        MockI2cBus {
            bus: 0,
            clock,
            state: Mutex::new(MockState::default()),
        }
    }

    pub fn clock(&self) -> &MockClock {
        &self.clock
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Makes every future `open` of `address` fail with `error`.
    pub fn fail_open(&self, address: u8, error: I2cError) {
        self.lock().open_failures.insert(address, error);
    }

    /// Makes the next `count` writes to `address` fail.
    pub fn fail_writes(&self, address: u8, count: usize) {
        self.fail_writes_with_prefix(address, &[], count);
    }

    /// Makes the next `count` writes to `address` that start with `prefix` fail.
    pub fn fail_writes_with_prefix(&self, address: u8, prefix: &[u8], count: usize) {
        self.lock().write_failures.push(FailRule {
            address,
            prefix: prefix.to_vec(),
            remaining: count,
        });
    }

    /// Emulates a command that keeps the chip busy: after a write to `address` starting with
    /// `prefix`, any write to `address` within `duration` is refused.
    pub fn settle_after(&self, address: u8, prefix: &[u8], duration: Duration) {
        self.lock().settle_rules.push(WriteRule {
            address,
            prefix: prefix.to_vec(),
            duration,
        });
    }

    /// Queues bytes returned by subsequent reads from `address`.
    pub fn queue_read(&self, address: u8, bytes: &[u8]) {
        self.lock()
            .read_queue
            .entry(address)
            .or_default()
            .extend(bytes.iter().copied());
    }

    pub fn transactions(&self) -> Vec<Transaction> {
        self.lock().log.clone()
    }

    /// Accepted writes to `address`, oldest first.
    pub fn writes_to(&self, address: u8) -> Vec<Vec<u8>> {
        self.lock()
            .log
            .iter()
            .filter(|t| t.address == address && t.operation == Operation::Write)
            .map(|t| t.bytes.clone())
            .collect()
    }

    /// Accepted writes to any address, oldest first.
    pub fn writes(&self) -> Vec<(u8, Vec<u8>)> {
        self.lock()
            .log
            .iter()
            .filter(|t| t.operation == Operation::Write)
            .map(|t| (t.address, t.bytes.clone()))
            .collect()
    }

    pub fn clear_log(&self) {
        self.lock().log.clear();
    }

    pub fn is_open(&self, address: u8) -> bool {
        self.lock().open.contains(&address)
    }

    /// How many times an open endpoint for `address` was actually closed.
    pub fn close_count(&self, address: u8) -> usize {
        self.lock().close_calls.get(&address).copied().unwrap_or(0)
    }

    fn record(&self, state: &mut MockState, address: u8, operation: Operation, bytes: &[u8]) {
        trace!("{:?} {:#04x}: {:02x?}", operation, address, bytes);
        state.log.push(Transaction {
            address,
            operation,
            bytes: bytes.to_vec(),
            at: self.clock.now(),
        });
    }

    fn check_open(&self, state: &MockState, endpoint: &Endpoint) -> I2cResult<()> {
        if endpoint.bus() != self.bus || !state.open.contains(&endpoint.address()) {
            return Err(I2cError::EndpointClosed {
                address: endpoint.address(),
            });
        }
        Ok(())
    }
}

impl Default for MockI2cBus {
    fn default() -> Self {
        Self::new()
    }
}

impl Debug for MockI2cBus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "MockI2cBus({})", self.bus)
    }
}

impl I2cBus for MockI2cBus {
    fn bus(&self) -> u8 {
        self.bus
    }

    fn open(&self, address: u8) -> I2cResult<Endpoint> {
        check_address(address)?;
        let mut state = self.lock();
        if let Some(err) = state.open_failures.get(&address) {
            return Err(err.clone());
        }
        if state.open.insert(address) {
            self.record(&mut state, address, Operation::Open, &[]);
        }
        Ok(Endpoint::new(self.bus, address))
    }

    fn write(&self, endpoint: &Endpoint, data: &[u8]) -> I2cResult<usize> {
        let address = endpoint.address();
        let mut state = self.lock();
        self.check_open(&state, endpoint)?;

        let now = self.clock.now();
        if state.busy_until.get(&address).is_some_and(|until| now < *until) {
            self.record(&mut state, address, Operation::RejectedWrite, data);
            return Err(I2cError::Write {
                address,
                kind: ErrorKind::ResourceBusy,
            });
        }

        let injected = state.write_failures.iter_mut().find(|rule| {
            rule.address == address && rule.remaining > 0 && data.starts_with(&rule.prefix)
        });
        if let Some(rule) = injected {
            rule.remaining -= 1;
            self.record(&mut state, address, Operation::RejectedWrite, data);
            return Err(I2cError::Write {
                address,
                kind: ErrorKind::Other,
            });
        }

        self.record(&mut state, address, Operation::Write, data);
        let settle = state
            .settle_rules
            .iter()
            .filter(|rule| rule.address == address && data.starts_with(&rule.prefix))
            .map(|rule| rule.duration)
            .max();
        if let Some(duration) = settle {
            state.busy_until.insert(address, now + duration);
        }
        Ok(data.len())
    }

    fn read(&self, endpoint: &Endpoint, max_len: usize) -> I2cResult<Vec<u8>> {
        let address = endpoint.address();
        let mut state = self.lock();
        self.check_open(&state, endpoint)?;

        let queue = state.read_queue.entry(address).or_default();
        let count = max_len.min(queue.len());
        let bytes: Vec<u8> = queue.drain(..count).collect();
        self.record(&mut state, address, Operation::Read, &bytes);
        Ok(bytes)
    }

    fn close(&self, endpoint: &Endpoint) -> I2cResult<()> {
        let address = endpoint.address();
        let mut state = self.lock();
        if endpoint.bus() != self.bus || !state.open.remove(&address) {
            return Ok(());
        }
        *state.close_calls.entry(address).or_default() += 1;
        self.record(&mut state, address, Operation::Close, &[]);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clock_advances_only_through_delays() {
        let clock = MockClock::new();
        assert_eq!(clock.now(), Duration::ZERO);
        clock.delay(Duration::from_millis(2));
        clock.delay(Duration::from_micros(100));
        assert_eq!(clock.now(), Duration::from_micros(2100));
        assert_eq!(
            clock.delays(),
            vec![Duration::from_millis(2), Duration::from_micros(100)]
        );
    }

    #[test]
    fn clones_share_time() {
        let clock = MockClock::new();
        let other = clock.clone();
        other.advance(Duration::from_millis(5));
        assert_eq!(clock.now(), Duration::from_millis(5));
    }

    #[test]
    fn records_writes_with_timestamps() {
        let bus = MockI2cBus::new();
        let endpoint = bus.open(0x3E).unwrap();
        bus.write(&endpoint, &[0x80, 0x01]).unwrap();
        bus.clock().advance(Duration::from_millis(1));
        bus.write(&endpoint, &[0x40, b'a']).unwrap();

        let writes: Vec<_> = bus
            .transactions()
            .into_iter()
            .filter(|t| t.operation == Operation::Write)
            .collect();
        assert_eq!(writes.len(), 2);
        assert_eq!(writes[0].at, Duration::ZERO);
        assert_eq!(writes[1].at, Duration::from_millis(1));
        assert_eq!(bus.writes_to(0x3E), vec![vec![0x80, 0x01], vec![0x40, b'a']]);
    }

    #[test]
    fn writes_to_closed_endpoints_fail() {
        let bus = MockI2cBus::new();
        let endpoint = Endpoint::new(0, 0x62);
        assert_eq!(
            bus.write(&endpoint, &[0x04, 0x00]),
            Err(I2cError::EndpointClosed { address: 0x62 })
        );
    }

    #[test]
    fn injected_failures_are_consumed() {
        let bus = MockI2cBus::new();
        let endpoint = bus.open(0x3E).unwrap();
        bus.fail_writes(0x3E, 1);
        assert!(matches!(bus.write(&endpoint, &[0x80]), Err(I2cError::Write { .. })));
        assert_eq!(bus.write(&endpoint, &[0x80]), Ok(1));
    }

    #[test]
    fn prefix_failures_only_match_their_prefix() {
        let bus = MockI2cBus::new();
        let endpoint = bus.open(0x62).unwrap();
        bus.fail_writes_with_prefix(0x62, &[0x03], 1);
        assert_eq!(bus.write(&endpoint, &[0x04, 10]), Ok(2));
        assert!(bus.write(&endpoint, &[0x03, 20]).is_err());
        assert_eq!(bus.write(&endpoint, &[0x03, 20]), Ok(2));
    }

    #[test]
    fn settle_window_refuses_early_writes() {
        let bus = MockI2cBus::new();
        let endpoint = bus.open(0x3E).unwrap();
        bus.settle_after(0x3E, &[0x80, 0x02], Duration::from_millis(2));

        bus.write(&endpoint, &[0x80, 0x02]).unwrap();
        assert_eq!(
            bus.write(&endpoint, &[0x80, 0x01]),
            Err(I2cError::Write { address: 0x3E, kind: ErrorKind::ResourceBusy })
        );
        bus.clock().advance(Duration::from_millis(2));
        assert_eq!(bus.write(&endpoint, &[0x80, 0x01]), Ok(2));
    }

    #[test]
    fn reads_return_queued_bytes_and_tolerate_short_reads() {
        let bus = MockI2cBus::new();
        let endpoint = bus.open(0x62).unwrap();
        bus.queue_read(0x62, &[1, 2, 3]);
        assert_eq!(bus.read(&endpoint, 2), Ok(vec![1, 2]));
        assert_eq!(bus.read(&endpoint, 4), Ok(vec![3]));
        assert_eq!(bus.read(&endpoint, 4), Ok(vec![]));
    }

    #[test]
    fn close_is_idempotent() {
        let bus = MockI2cBus::new();
        let endpoint = bus.open(0x3E).unwrap();
        bus.close(&endpoint).unwrap();
        bus.close(&endpoint).unwrap();
        assert_eq!(bus.close_count(0x3E), 1);
        assert!(!bus.is_open(0x3E));
    }

    #[test]
    fn reopening_an_open_address_is_recorded_once() {
        let bus = MockI2cBus::new();
        assert_eq!(bus.open(0x3E), bus.open(0x3E));
        let opens = bus
            .transactions()
            .iter()
            .filter(|t| t.operation == Operation::Open)
            .count();
        assert_eq!(opens, 1);
    }
}
