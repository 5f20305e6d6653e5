//! Observer mode gate
//!
//! New accounts spend their first days as observers: they can read
//! everything but cannot post or message. A flagged account is restricted
//! permanently regardless of age. The gate is a pure function of the join
//! timestamp and the flag; the one-time publish allowance during the
//! observer period adds the published count on top (`publish_allowed`).

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::db::{accounts, Db};
use crate::error::Result;

/// Days a new account spends in observer mode.
pub const OBSERVER_PERIOD_DAYS: f64 = 3.0;

/// days_left reported for flagged accounts. A moderation override, not a
/// countdown.
pub const FLAGGED_DAYS_SENTINEL: i64 = 999;

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AccessStatus {
    pub is_observer: bool,
    pub days_left: i64,
    pub can_post: bool,
    pub can_message: bool,
}

impl AccessStatus {
    /// The most restrictive state, used when the account row is missing.
    /// Fail closed, never open.
    pub fn restricted() -> Self {
        Self {
            is_observer: true,
            days_left: OBSERVER_PERIOD_DAYS as i64,
            can_post: false,
            can_message: false,
        }
    }

    fn flagged() -> Self {
        Self {
            is_observer: true,
            days_left: FLAGGED_DAYS_SENTINEL,
            can_post: false,
            can_message: false,
        }
    }
}

/// Evaluate the gate for an account joined at `joined_at`, as of `now`.
pub fn evaluate(joined_at: DateTime<Utc>, is_flagged: bool, now: DateTime<Utc>) -> AccessStatus {
    if is_flagged {
        return AccessStatus::flagged();
    }

    let elapsed_days =
        (now - joined_at).num_milliseconds() as f64 / (1000.0 * 60.0 * 60.0 * 24.0);
    let is_observer = elapsed_days < OBSERVER_PERIOD_DAYS;
    let days_left = if is_observer {
        (OBSERVER_PERIOD_DAYS - elapsed_days).ceil() as i64
    } else {
        0
    };

    AccessStatus {
        is_observer,
        days_left,
        can_post: !is_observer,
        can_message: !is_observer,
    }
}

/// The one-time publish allowance: an observer with nothing published
/// yet may publish once. Past the period the count never matters.
pub fn publish_allowed(status: &AccessStatus, published_count: i64) -> bool {
    status.can_post || published_count == 0
}

/// Gate lookup for an account id. A missing or unparsable account row
/// yields the restrictive default.
pub fn check_access(db: &Db, account_id: &str) -> Result<AccessStatus> {
    let account = db.with_conn(|conn| accounts::get_account(conn, account_id))?;
    let Some(account) = account else {
        return Ok(AccessStatus::restricted());
    };

    let joined_at = match DateTime::parse_from_rfc3339(&account.joined_at) {
        Ok(t) => t.with_timezone(&Utc),
        Err(_) => return Ok(AccessStatus::restricted()),
    };

    Ok(evaluate(joined_at, account.is_flagged, Utc::now()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_just_joined_is_observer() {
        let now = Utc::now();
        let status = evaluate(now, false, now);
        assert!(status.is_observer);
        assert_eq!(status.days_left, 3);
        assert!(!status.can_post);
        assert!(!status.can_message);
    }

    #[test]
    fn test_period_lapsed() {
        let now = Utc::now();
        let status = evaluate(now - Duration::days(4), false, now);
        assert!(!status.is_observer);
        assert_eq!(status.days_left, 0);
        assert!(status.can_post);
        assert!(status.can_message);
    }

    #[test]
    fn test_partial_day_rounds_up() {
        let now = Utc::now();
        // 2.5 days in: half a day plus rounding leaves 1 day on the banner
        let status = evaluate(now - Duration::hours(60), false, now);
        assert!(status.is_observer);
        assert_eq!(status.days_left, 1);
    }

    #[test]
    fn test_flag_overrides_elapsed_time() {
        let now = Utc::now();
        let status = evaluate(now - Duration::days(365), true, now);
        assert!(status.is_observer);
        assert_eq!(status.days_left, FLAGGED_DAYS_SENTINEL);
        assert!(!status.can_post);
        assert!(!status.can_message);
    }

    #[test]
    fn test_publish_allowance_is_single_use() {
        let now = Utc::now();
        let observer = evaluate(now, false, now);
        assert!(publish_allowed(&observer, 0));
        assert!(!publish_allowed(&observer, 1));

        let lapsed = evaluate(now - Duration::days(4), false, now);
        assert!(publish_allowed(&lapsed, 0));
        assert!(publish_allowed(&lapsed, 7));
    }

    #[test]
    fn test_missing_account_fails_closed() {
        let db = Db::open_in_memory().unwrap();
        let status = check_access(&db, "no-such-account").unwrap();
        assert_eq!(status, AccessStatus::restricted());
    }
}
