use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// ActionKind – what a persisted verdict does to an identity
// ---------------------------------------------------------------------------

/// Action codes. The integer values are part of the persisted format and
/// must never change: deny=0, allow=1, unban=9.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionKind {
    Deny,
    Allow,
    Unban,
}

impl ActionKind {
    pub fn as_code(&self) -> i64 {
        match self {
            ActionKind::Deny => 0,
            ActionKind::Allow => 1,
            ActionKind::Unban => 9,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(Self::Deny),
            1 => Some(Self::Allow),
            9 => Some(Self::Unban),
            _ => None,
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionKind::Deny => write!(f, "deny"),
            ActionKind::Allow => write!(f, "allow"),
            ActionKind::Unban => write!(f, "unban"),
        }
    }
}

// ---------------------------------------------------------------------------
// ReasonCode – why a verdict was reached
// ---------------------------------------------------------------------------

/// Enumerated reason codes. The integer values are stable and persisted
/// bit-for-bit: 100-103 are allow reasons, the rest are deny reasons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReasonCode {
    TooManySessions,
    TooManyRequests,
    EmptyJsCookie,
    EmptyReferer,
    LimitDay,
    LimitHour,
    LimitMinute,
    LimitSecond,
    ManualBan,
    SearchEngine,
    Google,
    Bing,
    Yahoo,
}

impl ReasonCode {
    pub fn as_code(&self) -> i64 {
        match self {
            ReasonCode::TooManySessions => 1,
            ReasonCode::TooManyRequests => 2,
            ReasonCode::EmptyJsCookie => 3,
            ReasonCode::EmptyReferer => 4,
            ReasonCode::LimitDay => 11,
            ReasonCode::LimitHour => 12,
            ReasonCode::LimitMinute => 13,
            ReasonCode::LimitSecond => 14,
            ReasonCode::ManualBan => 99,
            ReasonCode::SearchEngine => 100,
            ReasonCode::Google => 101,
            ReasonCode::Bing => 102,
            ReasonCode::Yahoo => 103,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(Self::TooManySessions),
            2 => Some(Self::TooManyRequests),
            3 => Some(Self::EmptyJsCookie),
            4 => Some(Self::EmptyReferer),
            11 => Some(Self::LimitDay),
            12 => Some(Self::LimitHour),
            13 => Some(Self::LimitMinute),
            14 => Some(Self::LimitSecond),
            99 => Some(Self::ManualBan),
            100 => Some(Self::SearchEngine),
            101 => Some(Self::Google),
            102 => Some(Self::Bing),
            103 => Some(Self::Yahoo),
            _ => None,
        }
    }

    /// Whether this reason accompanies an allow verdict.
    pub fn is_allow(&self) -> bool {
        self.as_code() >= 100
    }
}

impl fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReasonCode::TooManySessions => write!(f, "too_many_sessions"),
            ReasonCode::TooManyRequests => write!(f, "too_many_requests"),
            ReasonCode::EmptyJsCookie => write!(f, "empty_js_cookie"),
            ReasonCode::EmptyReferer => write!(f, "empty_referer"),
            ReasonCode::LimitDay => write!(f, "limit_day"),
            ReasonCode::LimitHour => write!(f, "limit_hour"),
            ReasonCode::LimitMinute => write!(f, "limit_minute"),
            ReasonCode::LimitSecond => write!(f, "limit_second"),
            ReasonCode::ManualBan => write!(f, "manual_ban"),
            ReasonCode::SearchEngine => write!(f, "verified_search_engine"),
            ReasonCode::Google => write!(f, "verified_google"),
            ReasonCode::Bing => write!(f, "verified_bing"),
            ReasonCode::Yahoo => write!(f, "verified_yahoo"),
        }
    }
}

// ---------------------------------------------------------------------------
// Verdict – the persisted decision for an identity (kind `rule`)
// ---------------------------------------------------------------------------

/// A persisted allow/deny decision. While a verdict exists for an identity,
/// the engine skips anomaly detection entirely for that identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    pub ip: String,
    pub hostname: String,
    /// Unix timestamp of the decision.
    pub time: i64,
    pub kind: ActionKind,
    pub reason: ReasonCode,
}

// ---------------------------------------------------------------------------
// Outcome – what the engine tells the host server per request
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny,
}

/// Per-request result surfaced to the HTTP layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub decision: Decision,
    pub reason: Option<ReasonCode>,
    /// The host should expire the script-set cookie on this response.
    pub clear_cookie: bool,
}

impl Outcome {
    pub fn allow() -> Self {
        Self {
            decision: Decision::Allow,
            reason: None,
            clear_cookie: false,
        }
    }

    pub fn deny(reason: ReasonCode) -> Self {
        Self {
            decision: Decision::Deny,
            reason: Some(reason),
            clear_cookie: false,
        }
    }

    pub fn is_allowed(&self) -> bool {
        self.decision == Decision::Allow
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reason_codes_are_stable() {
        assert_eq!(ReasonCode::TooManySessions.as_code(), 1);
        assert_eq!(ReasonCode::TooManyRequests.as_code(), 2);
        assert_eq!(ReasonCode::EmptyJsCookie.as_code(), 3);
        assert_eq!(ReasonCode::EmptyReferer.as_code(), 4);
        assert_eq!(ReasonCode::LimitDay.as_code(), 11);
        assert_eq!(ReasonCode::LimitHour.as_code(), 12);
        assert_eq!(ReasonCode::LimitMinute.as_code(), 13);
        assert_eq!(ReasonCode::LimitSecond.as_code(), 14);
        assert_eq!(ReasonCode::ManualBan.as_code(), 99);
        assert_eq!(ReasonCode::SearchEngine.as_code(), 100);
        assert_eq!(ReasonCode::Google.as_code(), 101);
        assert_eq!(ReasonCode::Bing.as_code(), 102);
        assert_eq!(ReasonCode::Yahoo.as_code(), 103);
    }

    #[test]
    fn test_reason_code_round_trip() {
        for code in [1, 2, 3, 4, 11, 12, 13, 14, 99, 100, 101, 102, 103] {
            let reason = ReasonCode::from_code(code).unwrap();
            assert_eq!(reason.as_code(), code);
        }
        assert_eq!(ReasonCode::from_code(42), None);
    }

    #[test]
    fn test_action_codes_are_stable() {
        assert_eq!(ActionKind::Deny.as_code(), 0);
        assert_eq!(ActionKind::Allow.as_code(), 1);
        assert_eq!(ActionKind::Unban.as_code(), 9);
        assert_eq!(ActionKind::from_code(9), Some(ActionKind::Unban));
        assert_eq!(ActionKind::from_code(5), None);
    }

    #[test]
    fn test_allow_reasons() {
        assert!(ReasonCode::Google.is_allow());
        assert!(!ReasonCode::ManualBan.is_allow());
    }
}
