use serde::{Deserialize, Serialize};

use super::verdict::ReasonCode;

// ---------------------------------------------------------------------------
// TimeUnit – one counting window within a CounterRecord
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimeUnit {
    Second,
    Minute,
    Hour,
    Day,
}

impl TimeUnit {
    /// Evaluation order for the frequency quota pass.
    pub const ALL: [TimeUnit; 4] = [
        TimeUnit::Second,
        TimeUnit::Minute,
        TimeUnit::Hour,
        TimeUnit::Day,
    ];

    pub fn period_secs(&self) -> i64 {
        match self {
            TimeUnit::Second => 1,
            TimeUnit::Minute => 60,
            TimeUnit::Hour => 3600,
            TimeUnit::Day => 86400,
        }
    }

    /// The deny reason written when this unit's quota is exceeded.
    pub fn deny_reason(&self) -> ReasonCode {
        match self {
            TimeUnit::Second => ReasonCode::LimitSecond,
            TimeUnit::Minute => ReasonCode::LimitMinute,
            TimeUnit::Hour => ReasonCode::LimitHour,
            TimeUnit::Day => ReasonCode::LimitDay,
        }
    }
}

// ---------------------------------------------------------------------------
// CounterRecord – rolling per-identity state (kind `log`)
// ---------------------------------------------------------------------------

/// Time-windowed pageview and anomaly-flag counters for one identity.
///
/// A record exists only while the identity is undecided; writing a verdict
/// deletes it. Pageview buckets roll over per unit, the three anomaly flags
/// age out together on the `first_time_flag` cadence.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterRecord {
    pub ip: String,
    pub session: String,
    pub hostname: String,
    /// Unix timestamp of the last request seen from this identity.
    pub last_time: i64,

    pub pageviews_s: u32,
    pub pageviews_m: u32,
    pub pageviews_h: u32,
    pub pageviews_d: u32,

    pub first_time_s: i64,
    pub first_time_m: i64,
    pub first_time_h: i64,
    pub first_time_d: i64,

    /// When the anomaly flags were last reset.
    pub first_time_flag: i64,
    pub flag_multi_session: u32,
    pub flag_empty_referer: u32,
    pub flag_js_cookie: u32,
    /// Requests that presented a correctly-valued script-set cookie.
    pub pageviews_cookie: u32,
}

impl CounterRecord {
    /// Record for an identity seen for the first time: every bucket opens
    /// now with a zero count.
    pub fn fresh(ip: &str, session: &str, hostname: &str, now: i64) -> Self {
        Self {
            ip: ip.to_string(),
            session: session.to_string(),
            hostname: hostname.to_string(),
            last_time: now,
            first_time_s: now,
            first_time_m: now,
            first_time_h: now,
            first_time_d: now,
            first_time_flag: now,
            ..Self::default()
        }
    }

    pub fn pageviews(&self, unit: TimeUnit) -> u32 {
        match unit {
            TimeUnit::Second => self.pageviews_s,
            TimeUnit::Minute => self.pageviews_m,
            TimeUnit::Hour => self.pageviews_h,
            TimeUnit::Day => self.pageviews_d,
        }
    }

    pub fn first_time(&self, unit: TimeUnit) -> i64 {
        match unit {
            TimeUnit::Second => self.first_time_s,
            TimeUnit::Minute => self.first_time_m,
            TimeUnit::Hour => self.first_time_h,
            TimeUnit::Day => self.first_time_d,
        }
    }

    /// Count one more request against every unit's bucket.
    pub fn increment_pageviews(&mut self) {
        self.pageviews_s += 1;
        self.pageviews_m += 1;
        self.pageviews_h += 1;
        self.pageviews_d += 1;
    }

    /// Whether the unit's bucket has aged past its period and must be
    /// reopened before the next quota comparison.
    pub fn bucket_expired(&self, unit: TimeUnit, now: i64) -> bool {
        now - self.first_time(unit) >= unit.period_secs() + 1
    }

    /// Reopen the unit's bucket: zero count, stamped at `now`.
    pub fn reset_bucket(&mut self, unit: TimeUnit, now: i64) {
        match unit {
            TimeUnit::Second => {
                self.pageviews_s = 0;
                self.first_time_s = now;
            }
            TimeUnit::Minute => {
                self.pageviews_m = 0;
                self.first_time_m = now;
            }
            TimeUnit::Hour => {
                self.pageviews_h = 0;
                self.first_time_h = now;
            }
            TimeUnit::Day => {
                self.pageviews_d = 0;
                self.first_time_d = now;
            }
        }
    }

    /// Clear the three anomaly flags and re-stamp the flag window.
    /// Idempotent: clearing already-zero flags is a no-op apart from the
    /// timestamp.
    pub fn clear_flags(&mut self, now: i64) {
        self.flag_multi_session = 0;
        self.flag_empty_referer = 0;
        self.flag_js_cookie = 0;
        self.first_time_flag = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_record_opens_all_buckets_now() {
        let rec = CounterRecord::fresh("10.0.0.1", "sess", "host.example", 1000);
        for unit in TimeUnit::ALL {
            assert_eq!(rec.first_time(unit), 1000);
            assert_eq!(rec.pageviews(unit), 0);
        }
        assert_eq!(rec.first_time_flag, 1000);
        assert_eq!(rec.last_time, 1000);
    }

    #[test]
    fn test_bucket_expiry_boundary() {
        let rec = CounterRecord::fresh("10.0.0.1", "s", "h", 1000);
        // A minute bucket expires at period + 1 seconds, not before.
        assert!(!rec.bucket_expired(TimeUnit::Minute, 1060));
        assert!(rec.bucket_expired(TimeUnit::Minute, 1061));
        assert!(!rec.bucket_expired(TimeUnit::Second, 1001));
        assert!(rec.bucket_expired(TimeUnit::Second, 1002));
    }

    #[test]
    fn test_reset_bucket_is_per_unit() {
        let mut rec = CounterRecord::fresh("10.0.0.1", "s", "h", 1000);
        rec.increment_pageviews();
        rec.increment_pageviews();
        rec.reset_bucket(TimeUnit::Second, 1005);
        assert_eq!(rec.pageviews_s, 0);
        assert_eq!(rec.first_time_s, 1005);
        assert_eq!(rec.pageviews_m, 2);
        assert_eq!(rec.first_time_m, 1000);
    }

    #[test]
    fn test_clear_flags_idempotent() {
        let mut rec = CounterRecord::fresh("10.0.0.1", "s", "h", 1000);
        rec.flag_empty_referer = 3;
        rec.flag_multi_session = 2;
        rec.flag_js_cookie = 1;
        rec.clear_flags(5000);
        let snapshot = rec.clone();
        rec.clear_flags(5000);
        assert_eq!(rec, snapshot);
        assert_eq!(rec.flag_empty_referer, 0);
        assert_eq!(rec.first_time_flag, 5000);
    }
}
