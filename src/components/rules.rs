use dashmap::DashSet;
use tracing::debug;

use crate::models::verdict::{ActionKind, ReasonCode, Verdict};

// ---------------------------------------------------------------------------
// RuleList – the capability the engine consumes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleStatus {
    Allow,
    Deny,
    None,
}

/// Result of a rule-list lookup: the explicit lists answer first, the
/// fallback verdict (read from the store) answers second.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleLookup {
    pub status: RuleStatus,
    pub code: Option<ReasonCode>,
}

impl RuleLookup {
    pub fn none() -> Self {
        Self {
            status: RuleStatus::None,
            code: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListKind {
    Allow,
    Deny,
}

/// Explicit allow/deny list for identities, consulted before anomaly
/// detection. `fallback` supplies a verdict read from the store when the
/// in-memory lists miss.
pub trait RuleList: Send + Sync {
    fn lookup(&self, ip: &str, fallback: &dyn Fn() -> Option<Verdict>) -> RuleLookup;
    fn add_to_deny_list(&self, ip: &str);
    fn remove(&self, ip: &str, kind: ListKind);
}

// ---------------------------------------------------------------------------
// MemoryRuleList – canonical implementation
// ---------------------------------------------------------------------------

/// Rule list on concurrent sets. Explicit entries come from operator
/// configuration or manual bans; persisted verdicts arrive through the
/// lookup fallback.
pub struct MemoryRuleList {
    allowed: DashSet<String>,
    denied: DashSet<String>,
}

impl MemoryRuleList {
    pub fn new() -> Self {
        Self {
            allowed: DashSet::new(),
            denied: DashSet::new(),
        }
    }

    pub fn add_to_allow_list(&self, ip: &str) {
        self.allowed.insert(ip.to_string());
    }
}

impl Default for MemoryRuleList {
    fn default() -> Self {
        Self::new()
    }
}

impl RuleList for MemoryRuleList {
    fn lookup(&self, ip: &str, fallback: &dyn Fn() -> Option<Verdict>) -> RuleLookup {
        if self.denied.contains(ip) {
            debug!(ip = %ip, "Identity on explicit deny list");
            return RuleLookup {
                status: RuleStatus::Deny,
                code: Some(ReasonCode::ManualBan),
            };
        }
        if self.allowed.contains(ip) {
            debug!(ip = %ip, "Identity on explicit allow list");
            return RuleLookup {
                status: RuleStatus::Allow,
                code: None,
            };
        }

        match fallback() {
            Some(verdict) => match verdict.kind {
                ActionKind::Allow => RuleLookup {
                    status: RuleStatus::Allow,
                    code: Some(verdict.reason),
                },
                ActionKind::Deny => RuleLookup {
                    status: RuleStatus::Deny,
                    code: Some(verdict.reason),
                },
                // An unban action is never persisted as a verdict.
                ActionKind::Unban => RuleLookup::none(),
            },
            None => RuleLookup::none(),
        }
    }

    fn add_to_deny_list(&self, ip: &str) {
        self.denied.insert(ip.to_string());
    }

    fn remove(&self, ip: &str, kind: ListKind) {
        match kind {
            ListKind::Allow => {
                self.allowed.remove(ip);
            }
            ListKind::Deny => {
                self.denied.remove(ip);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn verdict(kind: ActionKind, reason: ReasonCode) -> Verdict {
        Verdict {
            ip: "10.0.0.1".to_string(),
            hostname: String::new(),
            time: 100,
            kind,
            reason,
        }
    }

    #[test]
    fn test_explicit_lists_win_over_fallback() {
        let list = MemoryRuleList::new();
        list.add_to_deny_list("10.0.0.1");
        let result = list.lookup("10.0.0.1", &|| {
            Some(verdict(ActionKind::Allow, ReasonCode::Google))
        });
        assert_eq!(result.status, RuleStatus::Deny);
        assert_eq!(result.code, Some(ReasonCode::ManualBan));
    }

    #[test]
    fn test_fallback_verdict_maps_by_kind() {
        let list = MemoryRuleList::new();
        let allow = list.lookup("10.0.0.1", &|| {
            Some(verdict(ActionKind::Allow, ReasonCode::Google))
        });
        assert_eq!(allow.status, RuleStatus::Allow);
        assert_eq!(allow.code, Some(ReasonCode::Google));

        let deny = list.lookup("10.0.0.1", &|| {
            Some(verdict(ActionKind::Deny, ReasonCode::LimitMinute))
        });
        assert_eq!(deny.status, RuleStatus::Deny);
        assert_eq!(deny.code, Some(ReasonCode::LimitMinute));

        let miss = list.lookup("10.0.0.1", &|| None);
        assert_eq!(miss.status, RuleStatus::None);
    }

    #[test]
    fn test_explicit_allow_list() {
        let list = MemoryRuleList::new();
        list.add_to_allow_list("10.0.0.3");
        let result = list.lookup("10.0.0.3", &|| None);
        assert_eq!(result.status, RuleStatus::Allow);
        assert_eq!(result.code, None);

        list.remove("10.0.0.3", ListKind::Allow);
        assert_eq!(list.lookup("10.0.0.3", &|| None).status, RuleStatus::None);
    }

    #[test]
    fn test_remove_from_deny_list() {
        let list = MemoryRuleList::new();
        list.add_to_deny_list("10.0.0.2");
        list.remove("10.0.0.2", ListKind::Deny);
        let result = list.lookup("10.0.0.2", &|| None);
        assert_eq!(result.status, RuleStatus::None);
    }
}
