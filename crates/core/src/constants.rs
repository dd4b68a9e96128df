/// Decimal places kept for derived percentages (progress, contribution shares)
pub const PERCENT_PRECISION: u32 = 2;

/// Allowed drift when checking that contribution shares add up to 100
pub const PERCENT_SUM_TOLERANCE: &str = "0.01";

/// Days used to turn an annual interest rate into a daily one
pub const DAYS_PER_YEAR: u32 = 365;

/// Default annual interest rate applied to new goals (5%)
pub const DEFAULT_ANNUAL_INTEREST_RATE: &str = "0.05";

/// Default cap on active + pending members of a group goal
pub const DEFAULT_GROUP_MEMBER_CAP: u32 = 50;

/// Price quotes older than this are rejected
pub const DEFAULT_PRICE_STALENESS_SECS: i64 = 60 * 60;

/// Bounded retries for optimistic-concurrency conflicts on one entity
pub const MAX_CONFLICT_RETRIES: usize = 5;

/// Default number of blocks fetched per scan window
pub const DEFAULT_MAX_BLOCK_RANGE: u64 = 2_000;

/// Default interval between scans of one vault
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 15;

/// Default upper bound on time spent retrying one event-source call
pub const DEFAULT_MAX_RETRY_ELAPSED_SECS: u64 = 120;
