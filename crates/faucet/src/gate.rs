//! Eligibility gate
//!
//! Tracks the last grant per canonical address and enforces at most one grant
//! per address per cooldown window. Records live in memory for the lifetime of
//! the gate; nothing is persisted.
//!
//! Besides the plain `check`/`commit` pair the gate hands out [`Reservation`]s:
//! an atomic check that also marks the address as in flight, so two concurrent
//! requests for the same address can never both reach submission. A reservation
//! that is dropped without being committed restores the previous record.

use crate::address::Address;
use crate::error::{FaucetError, FaucetResult};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

/// Time source for the gate
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// Wall clock backed by `Instant::now`
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Manually advanced clock for tests and simulations
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<Instant>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: Mutex::new(Instant::now()),
        }
    }

    pub fn advance(&self, by: Duration) {
        *self.now.lock() += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *self.now.lock()
    }
}

#[derive(Debug, Clone, Copy)]
enum Entry {
    Granted(Instant),
    /// A disbursement is between reservation and its outcome.
    InFlight { previous: Option<Instant> },
}

struct GateInner {
    window: Duration,
    clock: Arc<dyn Clock>,
    records: Mutex<HashMap<String, Entry>>,
}

/// Per-address cooldown store
#[derive(Clone)]
pub struct EligibilityGate {
    inner: Arc<GateInner>,
}

impl EligibilityGate {
    pub fn new(window: Duration) -> Self {
        Self::with_clock(window, Arc::new(SystemClock))
    }

    pub fn with_clock(window: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Arc::new(GateInner {
                window,
                clock,
                records: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub fn window(&self) -> Duration {
        self.inner.window
    }

    /// Whether the address may receive funds now. No side effects.
    pub fn check(&self, address: &Address) -> bool {
        self.retry_after(address).is_none()
    }

    /// Remaining cooldown, or `None` if the address is eligible.
    pub fn retry_after(&self, address: &Address) -> Option<Duration> {
        let now = self.inner.clock.now();
        let records = self.inner.records.lock();
        records
            .get(&address.canonical())
            .and_then(|entry| self.remaining(entry, now))
    }

    /// Record a grant for the address at the current time.
    pub fn commit(&self, address: &Address) {
        let now = self.inner.clock.now();
        self.inner
            .records
            .lock()
            .insert(address.canonical(), Entry::Granted(now));
        debug!("Committed grant for {}", address);
    }

    /// Atomically check eligibility and mark the address in flight.
    pub fn reserve(&self, address: &Address) -> FaucetResult<Reservation> {
        let key = address.canonical();
        let now = self.inner.clock.now();
        let mut records = self.inner.records.lock();

        let previous = match records.get(&key) {
            Some(entry) => {
                if let Some(remaining) = self.remaining(entry, now) {
                    debug!("Address {} not eligible for {:?}", key, remaining);
                    return Err(FaucetError::rate_limited(remaining));
                }
                match entry {
                    Entry::Granted(at) => Some(*at),
                    Entry::InFlight { previous } => *previous,
                }
            }
            None => None,
        };

        records.insert(key.clone(), Entry::InFlight { previous });
        Ok(Reservation {
            gate: self.clone(),
            key,
            previous,
            committed: false,
        })
    }

    /// Drop committed entries whose window has elapsed.
    pub fn prune(&self) -> usize {
        let now = self.inner.clock.now();
        let window = self.inner.window;
        let mut records = self.inner.records.lock();
        let before = records.len();
        records.retain(|_, entry| match entry {
            Entry::Granted(at) => now.saturating_duration_since(*at) < window,
            Entry::InFlight { .. } => true,
        });
        before - records.len()
    }

    pub fn len(&self) -> usize {
        self.inner.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn remaining(&self, entry: &Entry, now: Instant) -> Option<Duration> {
        match entry {
            Entry::Granted(at) => {
                let elapsed = now.saturating_duration_since(*at);
                self.inner.window.checked_sub(elapsed).filter(|d| !d.is_zero())
            }
            Entry::InFlight { .. } => Some(self.inner.window),
        }
    }
}

/// In-flight claim on an address, released on drop unless committed
pub struct Reservation {
    gate: EligibilityGate,
    key: String,
    previous: Option<Instant>,
    committed: bool,
}

impl Reservation {
    /// Record the grant. Call only once the transfer has been accepted.
    pub fn commit(mut self) {
        let now = self.gate.inner.clock.now();
        self.gate
            .inner
            .records
            .lock()
            .insert(self.key.clone(), Entry::Granted(now));
        self.committed = true;
        debug!("Committed grant for {}", self.key);
    }
}

impl Drop for Reservation {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        let mut records = self.gate.inner.records.lock();
        match self.previous {
            Some(at) => {
                records.insert(self.key.clone(), Entry::Granted(at));
            }
            None => {
                records.remove(&self.key);
            }
        }
        debug!("Released reservation for {}", self.key);
    }
}
