//! Hard caps on input sizes. Everything a client can grow is bounded here.

/// Longest stay a single booking or request may cover.
pub const MAX_STAY_NIGHTS: i64 = 90;

/// Longest operator block, in days (inclusive range).
pub const MAX_BLOCK_DAYS: i64 = 366;

/// Widest window accepted by `free_ranges`.
pub const MAX_QUERY_WINDOW_DAYS: i64 = 731;

/// Dates outside this year range are rejected outright.
pub const MIN_VALID_YEAR: i32 = 2000;
pub const MAX_VALID_YEAR: i32 = 2200;

pub const MAX_NAME_LEN: usize = 200;
pub const MAX_EMAIL_LEN: usize = 254;
pub const MAX_NOTES_LEN: usize = 2_000;
pub const MAX_REASON_LEN: usize = 500;
pub const MAX_REF_LEN: usize = 1_024;

/// Per-booking cap on appended identity documents.
pub const MAX_KYC_DOCUMENTS: usize = 20;

/// Largest identity document the storage layer may report.
pub const MAX_KYC_DOCUMENT_BYTES: u64 = 25 * 1024 * 1024;

/// Channel feeds larger than this are refused before parsing.
pub const MAX_FEED_BYTES: usize = 2 * 1024 * 1024;
pub const MAX_CHANNEL_BLOCKS: usize = 5_000;

pub const MAX_BOOKINGS_PER_TENANT: usize = 100_000;
pub const MAX_REQUESTS_PER_TENANT: usize = 100_000;
pub const MAX_BLOCKS_PER_TENANT: usize = 10_000;

pub const MAX_TENANTS: usize = 1_000;
pub const MAX_TENANT_NAME_LEN: usize = 64;
