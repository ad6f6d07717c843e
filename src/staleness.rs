// Health verdict from the newest persisted timestamp

use chrono::{DateTime, TimeDelta, Utc};

/// Active iff a sample exists and it is newer than `now - threshold`.
/// A threshold reaching past the representable range counts every sample as fresh.
pub fn is_active(latest: Option<DateTime<Utc>>, now: DateTime<Utc>, threshold: TimeDelta) -> bool {
    latest.is_some_and(|t| {
        now.checked_sub_signed(threshold)
            .is_none_or(|cutoff| t > cutoff)
    })
}
