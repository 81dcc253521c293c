//! Serial/IP allocation for new registrations.
//!
//! ```text
//! allocate()
//!    │
//!    ├── IP number: IP<DateKey>-<random 000..999>
//!    │
//!    └── GET /patients/today-count
//!            │ ok(count)                 │ any failure
//!            ▼                           ▼
//!       sequence = count + 1      FallbackCounter for today?
//!                                   yes → stored + 1
//!                                   no  → reset (today, 0), sequence = 1
//!
//! commit(date)   (only after the service confirms a registration)
//!    FallbackCounter = (date, stored-for-date + 1)
//! ```
//!
//! Allocation never fails: a directory outage only moves the serial number
//! onto the device-local counter.

mod clock;
mod store;

pub use clock::*;
pub use store::*;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::db::DbResult;
use crate::directory::PatientDirectory;
use crate::models::{DateKey, IpNumber, SerialNumber};

/// Where a serial number's sequence came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SerialSource {
    /// Directory service's count of today's registrations
    Server,
    /// Device-local fallback counter
    Fallback,
}

/// Identifiers pre-filled into a registration form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Allocation {
    pub date: DateKey,
    pub ip_number: IpNumber,
    pub serial_number: SerialNumber,
    pub source: SerialSource,
}

/// Allocates identifier pairs from a directory, a counter store and a clock.
pub struct Allocator<D, S, C = SystemClock> {
    directory: D,
    store: S,
    clock: C,
}

impl<D, S> Allocator<D, S, SystemClock>
where
    D: PatientDirectory,
    S: CounterStore,
{
    /// Create an allocator on the local system clock.
    pub fn with_system_clock(directory: D, store: S) -> Self {
        Self::new(directory, store, SystemClock)
    }
}

impl<D, S, C> Allocator<D, S, C>
where
    D: PatientDirectory,
    S: CounterStore,
    C: Clock,
{
    pub fn new(directory: D, store: S, clock: C) -> Self {
        Self {
            directory,
            store,
            clock,
        }
    }

    pub fn directory(&self) -> &D {
        &self.directory
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Today's date key according to the injected clock.
    pub fn today(&self) -> DateKey {
        DateKey::from_date(self.clock.today())
    }

    /// Compute the identifier pair for a new registration.
    pub async fn allocate(&self) -> Allocation {
        let date = self.today();
        let ip_number = IpNumber::new(date, random_suffix());

        let (sequence, source) = match self.directory.today_count().await {
            Ok(count) => (count.saturating_add(1), SerialSource::Server),
            Err(e) => {
                warn!(error = %e, date = %date, "Today-count unavailable, using fallback counter");
                (self.fallback_sequence(date), SerialSource::Fallback)
            }
        };

        let allocation = Allocation {
            date,
            ip_number,
            serial_number: SerialNumber::new(date, sequence),
            source,
        };
        debug!(
            ip_number = %allocation.ip_number,
            serial_number = %allocation.serial_number,
            source = ?allocation.source,
            "Allocated registration identifiers"
        );
        allocation
    }

    /// Record one confirmed registration for `date`.
    ///
    /// Call only after the directory service has accepted the registration.
    pub fn commit(&self, date: DateKey) -> DbResult<FallbackCounter> {
        let current = self
            .store
            .read()?
            .and_then(|counter| counter.count_for(date))
            .unwrap_or(0);

        let next = FallbackCounter::new(date, current.saturating_add(1));
        self.store.write(&next)?;
        debug!(date = %date, count = next.count, "Fallback counter advanced");
        Ok(next)
    }

    fn fallback_sequence(&self, date: DateKey) -> u32 {
        let stored = self.store.read().unwrap_or_else(|e| {
            warn!(error = %e, "Could not read fallback counter");
            None
        });

        match stored.and_then(|counter| counter.count_for(date)) {
            Some(count) => count.saturating_add(1),
            None => {
                if let Err(e) = self.store.write(&FallbackCounter::new(date, 0)) {
                    warn!(error = %e, date = %date, "Could not reset fallback counter");
                }
                1
            }
        }
    }
}

fn random_suffix() -> u16 {
    rand::thread_rng().gen_range(0..=IpNumber::MAX_SUFFIX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::testing::ScriptedDirectory;
    use chrono::NaiveDate;

    fn may(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, day).unwrap()
    }

    fn key(date: NaiveDate) -> DateKey {
        DateKey::from_date(date)
    }

    #[tokio::test]
    async fn test_server_count_wins() {
        let directory = ScriptedDirectory::with_count(41);
        let store = MemoryCounterStore::with_counter(FallbackCounter::new(key(may(1)), 7));
        let allocator = Allocator::new(&directory, &store, FixedClock::new(may(1)));

        let allocation = allocator.allocate().await;
        assert_eq!(allocation.serial_number.to_string(), "SN20240501-042");
        assert_eq!(allocation.source, SerialSource::Server);

        // Server path leaves the local counter alone
        assert_eq!(
            store.read().unwrap(),
            Some(FallbackCounter::new(key(may(1)), 7))
        );
    }

    #[tokio::test]
    async fn test_unset_counter_server_down() {
        let directory = ScriptedDirectory::offline();
        let store = MemoryCounterStore::new();
        let allocator = Allocator::new(&directory, &store, FixedClock::new(may(1)));

        let allocation = allocator.allocate().await;
        assert_eq!(allocation.serial_number.to_string(), "SN20240501-001");
        assert_eq!(allocation.source, SerialSource::Fallback);
        assert_eq!(
            store.read().unwrap(),
            Some(FallbackCounter::new(key(may(1)), 0))
        );

        let committed = allocator.commit(allocation.date).unwrap();
        assert_eq!(committed, FallbackCounter::new(key(may(1)), 1));
        assert_eq!(store.read().unwrap(), Some(committed));
    }

    #[tokio::test]
    async fn test_same_day_counter_server_down() {
        let directory = ScriptedDirectory::offline();
        let store = MemoryCounterStore::with_counter(FallbackCounter::new(key(may(1)), 5));
        let allocator = Allocator::new(&directory, &store, FixedClock::new(may(1)));

        let allocation = allocator.allocate().await;
        assert_eq!(allocation.serial_number.to_string(), "SN20240501-006");
        // Read-only on this branch
        assert_eq!(
            store.read().unwrap(),
            Some(FallbackCounter::new(key(may(1)), 5))
        );
    }

    #[tokio::test]
    async fn test_stale_counter_resets() {
        let directory = ScriptedDirectory::offline();
        let stale = FallbackCounter::new(key(NaiveDate::from_ymd_opt(2024, 4, 30).unwrap()), 17);
        let store = MemoryCounterStore::with_counter(stale);
        let allocator = Allocator::new(&directory, &store, FixedClock::new(may(1)));

        let allocation = allocator.allocate().await;
        assert_eq!(allocation.serial_number.to_string(), "SN20240501-001");
        assert_eq!(
            store.read().unwrap(),
            Some(FallbackCounter::new(key(may(1)), 0))
        );

        allocator.commit(key(may(1))).unwrap();
        assert_eq!(
            store.read().unwrap(),
            Some(FallbackCounter::new(key(may(1)), 1))
        );
    }

    #[tokio::test]
    async fn test_malformed_and_status_failures_fall_back() {
        let store = MemoryCounterStore::with_counter(FallbackCounter::new(key(may(1)), 2));

        for directory in [ScriptedDirectory::malformed(), ScriptedDirectory::status(503)] {
            let allocator = Allocator::new(&directory, &store, FixedClock::new(may(1)));
            let allocation = allocator.allocate().await;
            assert_eq!(allocation.serial_number.sequence(), 3);
            assert_eq!(allocation.source, SerialSource::Fallback);
        }
    }

    #[test]
    fn test_commit_on_new_day_starts_from_zero() {
        let directory = ScriptedDirectory::offline();
        let store = MemoryCounterStore::with_counter(FallbackCounter::new(key(may(1)), 9));
        let allocator = Allocator::new(&directory, &store, FixedClock::new(may(2)));

        let committed = allocator.commit(key(may(2))).unwrap();
        assert_eq!(committed, FallbackCounter::new(key(may(2)), 1));
    }

    #[tokio::test]
    async fn test_ip_number_uses_today() {
        let directory = ScriptedDirectory::with_count(0);
        let store = MemoryCounterStore::new();
        let allocator = Allocator::new(&directory, &store, FixedClock::new(may(1)));

        for _ in 0..50 {
            let allocation = allocator.allocate().await;
            let text = allocation.ip_number.to_string();
            assert!(text.starts_with("IP20240501-"));
            assert_eq!(text.len(), "IP20240501-000".len());
            assert!(allocation.ip_number.suffix() <= IpNumber::MAX_SUFFIX);
        }
    }
}
