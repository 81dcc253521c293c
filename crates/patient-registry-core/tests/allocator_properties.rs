//! Property tests for serial/IP allocation.
//!
//! Every property is checked across arbitrary calendar dates.

use chrono::NaiveDate;
use patient_registry_core::allocator::{
    Allocator, CounterStore, FallbackCounter, FixedClock, MemoryCounterStore, SerialSource,
};
use patient_registry_core::directory::testing::ScriptedDirectory;
use patient_registry_core::models::{DateKey, IpNumber, SerialNumber};
use proptest::prelude::*;

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap()
}

fn any_date() -> impl Strategy<Value = NaiveDate> {
    (1000i32..=9999, 1u32..=12, 1u32..=28)
        .prop_map(|(y, m, d)| NaiveDate::from_ymd_opt(y, m, d).unwrap())
}

/// `IP\d{8}-\d{3}`
fn is_ip_shaped(s: &str) -> bool {
    let b = s.as_bytes();
    s.len() == 14
        && s.starts_with("IP")
        && b[2..10].iter().all(u8::is_ascii_digit)
        && b[10] == b'-'
        && b[11..].iter().all(u8::is_ascii_digit)
}

/// `SN\d{8}-\d{3}`
fn is_serial_shaped(s: &str) -> bool {
    let b = s.as_bytes();
    s.len() == 14
        && s.starts_with("SN")
        && b[2..10].iter().all(u8::is_ascii_digit)
        && b[10] == b'-'
        && b[11..].iter().all(u8::is_ascii_digit)
}

proptest! {
    #[test]
    fn server_count_gives_next_sequence(date in any_date(), count in 0u32..999) {
        let directory = ScriptedDirectory::with_count(count);
        let store = MemoryCounterStore::new();
        let allocator = Allocator::new(&directory, &store, FixedClock::new(date));

        let allocation = runtime().block_on(allocator.allocate());
        prop_assert_eq!(allocation.serial_number.sequence(), count + 1);
        prop_assert_eq!(allocation.source, SerialSource::Server);
        prop_assert_eq!(store.read().unwrap(), None);
    }

    #[test]
    fn same_day_fallback_gives_next_sequence(date in any_date(), stored in 0u32..999) {
        let directory = ScriptedDirectory::offline();
        let store = MemoryCounterStore::with_counter(
            FallbackCounter::new(DateKey::from_date(date), stored),
        );
        let allocator = Allocator::new(&directory, &store, FixedClock::new(date));

        let allocation = runtime().block_on(allocator.allocate());
        prop_assert_eq!(allocation.serial_number.sequence(), stored + 1);
        prop_assert_eq!(allocation.source, SerialSource::Fallback);
    }

    #[test]
    fn stale_fallback_resets(
        date in any_date(),
        stale in any_date(),
        stored in 0u32..10_000,
    ) {
        prop_assume!(date != stale);
        let directory = ScriptedDirectory::offline();
        let store = MemoryCounterStore::with_counter(
            FallbackCounter::new(DateKey::from_date(stale), stored),
        );
        let allocator = Allocator::new(&directory, &store, FixedClock::new(date));

        let allocation = runtime().block_on(allocator.allocate());
        prop_assert_eq!(allocation.serial_number.sequence(), 1);
        prop_assert_eq!(
            store.read().unwrap(),
            Some(FallbackCounter::new(DateKey::from_date(date), 0))
        );
    }

    #[test]
    fn commit_increments_by_one(date in any_date(), stored in 0u32..10_000, same_day in any::<bool>()) {
        let today = DateKey::from_date(date);
        let stored_date = if same_day {
            today
        } else {
            DateKey::from_date(date.pred_opt().unwrap())
        };
        let directory = ScriptedDirectory::offline();
        let store = MemoryCounterStore::with_counter(FallbackCounter::new(stored_date, stored));
        let allocator = Allocator::new(&directory, &store, FixedClock::new(date));

        let committed = allocator.commit(today).unwrap();
        let expected = if same_day { stored + 1 } else { 1 };
        prop_assert_eq!(committed, FallbackCounter::new(today, expected));

        // Repeated commits keep climbing
        let again = allocator.commit(today).unwrap();
        prop_assert_eq!(again.count, expected + 1);
        prop_assert!(again.count > committed.count);
    }

    #[test]
    fn identifiers_have_fixed_shape(date in any_date(), count in 0u32..999, online in any::<bool>()) {
        let directory = if online {
            ScriptedDirectory::with_count(count)
        } else {
            ScriptedDirectory::offline()
        };
        let store = MemoryCounterStore::new();
        let allocator = Allocator::new(&directory, &store, FixedClock::new(date));

        let allocation = runtime().block_on(allocator.allocate());
        let ip = allocation.ip_number.to_string();
        let serial = allocation.serial_number.to_string();

        prop_assert!(is_ip_shaped(&ip), "bad IP number {}", ip);
        prop_assert!(is_serial_shaped(&serial), "bad serial number {}", serial);
        prop_assert_eq!(ip.parse::<IpNumber>().unwrap(), allocation.ip_number);
        prop_assert_eq!(serial.parse::<SerialNumber>().unwrap(), allocation.serial_number);
        prop_assert_eq!(&ip[2..10], &serial[2..10]);
    }
}

#[test]
fn scenario_unset_counter_server_down() {
    let date = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
    let directory = ScriptedDirectory::offline();
    let store = MemoryCounterStore::new();
    let allocator = Allocator::new(&directory, &store, FixedClock::new(date));

    let allocation = runtime().block_on(allocator.allocate());
    assert_eq!(allocation.serial_number.to_string(), "SN20240501-001");

    let committed = allocator.commit(allocation.date).unwrap();
    assert_eq!(committed.date.to_string(), "20240501");
    assert_eq!(committed.count, 1);
}

#[test]
fn scenario_stored_five_server_down() {
    let date = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
    let directory = ScriptedDirectory::offline();
    let store = MemoryCounterStore::with_counter(FallbackCounter::new(
        "20240501".parse().unwrap(),
        5,
    ));
    let allocator = Allocator::new(&directory, &store, FixedClock::new(date));

    let allocation = runtime().block_on(allocator.allocate());
    assert_eq!(allocation.serial_number.to_string(), "SN20240501-006");
}

#[test]
fn scenario_rollover_from_previous_day() {
    let date = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
    let directory = ScriptedDirectory::offline();
    let store = MemoryCounterStore::with_counter(FallbackCounter::new(
        "20240430".parse().unwrap(),
        23,
    ));
    let allocator = Allocator::new(&directory, &store, FixedClock::new(date));

    let allocation = runtime().block_on(allocator.allocate());
    assert_eq!(allocation.serial_number.to_string(), "SN20240501-001");
    assert_eq!(store.read().unwrap().map(|c| c.count), Some(0));

    allocator.commit(allocation.date).unwrap();
    assert_eq!(store.read().unwrap().map(|c| c.count), Some(1));
}
