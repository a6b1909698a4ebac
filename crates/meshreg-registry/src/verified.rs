//! Pure decision functions for registration.
//!
//! Deterministic and side-effect free: time is passed in explicitly.

use chrono::DateTime;
use chrono::SecondsFormat;
use chrono::Utc;
use meshreg_types::ServiceInstanceSpec;

/// Whether the stored record must be (re)written to match `desired`.
///
/// Only reachability counts: the record is rewritten when absent or when its
/// IP or port differs. Label, tenant, status and timestamp drift is ignored.
#[inline]
pub fn needs_update(existing: Option<&ServiceInstanceSpec>, desired: &ServiceInstanceSpec) -> bool {
    match existing {
        None => true,
        Some(existing) => !existing.same_address(desired),
    }
}

/// Format a registration timestamp as RFC 3339 (UTC, second precision).
#[inline]
pub fn format_registry_time(now: DateTime<Utc>) -> String {
    now.to_rfc3339_opts(SecondsFormat::Secs, true)
}
