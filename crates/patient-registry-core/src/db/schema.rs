//! SQLite schema definition.

/// Key holding the fallback counter's date (`YYYYMMDD`).
pub const SERIAL_COUNT_DATE_KEY: &str = "serialCountDate";

/// Key holding the fallback counter's count.
pub const SERIAL_COUNT_KEY: &str = "serialCount";

/// Complete database schema for device-local registry state.
pub const SCHEMA: &str = r#"
-- ============================================================================
-- Device-local key/value state
-- ============================================================================

-- Values are plain strings; callers own their interpretation.
-- serialCountDate / serialCount together form the fallback serial counter.
CREATE TABLE IF NOT EXISTS local_state (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);
"#;
