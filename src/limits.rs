//! Hard input bounds, enforced at the mutation boundary.

use crate::model::Sec;

pub const MAX_NAME_LEN: usize = 256;
pub const MAX_TITLE_LEN: usize = 512;
pub const MAX_TEXT_LEN: usize = 4096;

pub const MAX_PARTICIPANTS_PER_MEETING: usize = 1024;
pub const MAX_BATCH_SIZE: usize = 256;

/// 2000-01-01T00:00:00Z.
pub const MIN_VALID_TIMESTAMP: Sec = 946_684_800;
/// 2100-01-01T00:00:00Z.
pub const MAX_VALID_TIMESTAMP: Sec = 4_102_444_800;

/// 30 days. No single meeting runs longer.
pub const MAX_SPAN_DURATION_SECS: Sec = 30 * 24 * 3600;

/// 366 days. Availability queries wider than this are refused.
pub const MAX_QUERY_WINDOW_SECS: Sec = 366 * 24 * 3600;
