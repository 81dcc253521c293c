//! Device-local fallback counter and the storage seam behind it.

use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::db::{DbError, DbResult};
use crate::models::DateKey;

/// Registrations this device has confirmed on one date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FallbackCounter {
    pub date: DateKey,
    pub count: u32,
}

impl FallbackCounter {
    pub fn new(date: DateKey, count: u32) -> Self {
        Self { date, count }
    }

    /// Stored count, but only when it belongs to `date`.
    pub fn count_for(&self, date: DateKey) -> Option<u32> {
        (self.date == date).then_some(self.count)
    }
}

/// Persistence for the fallback counter.
///
/// Date and count are always read and written as one unit.
pub trait CounterStore {
    /// Current counter, or `None` when nothing valid is stored.
    fn read(&self) -> DbResult<Option<FallbackCounter>>;

    /// Replace the stored counter.
    fn write(&self, counter: &FallbackCounter) -> DbResult<()>;
}

impl<T: CounterStore + ?Sized> CounterStore for &T {
    fn read(&self) -> DbResult<Option<FallbackCounter>> {
        (**self).read()
    }

    fn write(&self, counter: &FallbackCounter) -> DbResult<()> {
        (**self).write(counter)
    }
}

/// In-process counter store (for testing and ephemeral sessions).
#[derive(Debug, Default)]
pub struct MemoryCounterStore {
    counter: Mutex<Option<FallbackCounter>>,
}

impl MemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with a counter already stored.
    pub fn with_counter(counter: FallbackCounter) -> Self {
        Self {
            counter: Mutex::new(Some(counter)),
        }
    }
}

impl CounterStore for MemoryCounterStore {
    fn read(&self) -> DbResult<Option<FallbackCounter>> {
        let guard = self
            .counter
            .lock()
            .map_err(|e| DbError::Poisoned(e.to_string()))?;
        Ok(*guard)
    }

    fn write(&self, counter: &FallbackCounter) -> DbResult<()> {
        let mut guard = self
            .counter
            .lock()
            .map_err(|e| DbError::Poisoned(e.to_string()))?;
        *guard = Some(*counter);
        Ok(())
    }
}
