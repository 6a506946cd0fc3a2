/// Application name
pub const APP_NAME: &str = "Tickler";

/// Task title length bounds (Unicode scalar values, after trimming)
pub const TITLE_MIN_LEN: usize = 1;
pub const TITLE_MAX_LEN: usize = 200;

/// Task category length bounds
pub const CATEGORY_MIN_LEN: usize = 0;
pub const CATEGORY_MAX_LEN: usize = 50;

/// Task description length bounds
pub const DESCRIPTION_MIN_LEN: usize = 0;
pub const DESCRIPTION_MAX_LEN: usize = 4000;

/// Recurrence descriptor text length bounds
pub const RECURRENCE_MIN_LEN: usize = 7;
pub const RECURRENCE_MAX_LEN: usize = 1000;

/// Largest representable timestamp, in unix seconds
pub const TIMESTAMP_MAX_SECS: i64 = 9_999_999_999;

/// Smallest valid chat-platform snowflake id
pub const SNOWFLAKE_MIN: u64 = 10_000_000_000_000_000;

/// UTC offsets must lie strictly inside (-24, 24) hours
pub const UTC_OFFSET_BOUND_HOURS: f64 = 24.0;

/// Default reminder dispatcher poll interval in milliseconds
pub const DEFAULT_DISPATCH_INTERVAL_MS: u64 = 1_000;

/// Default timeout for a single notification delivery in seconds
pub const DEFAULT_DELIVERY_TIMEOUT_SECS: u64 = 30;
