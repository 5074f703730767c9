use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::components::robot::RobotClassifier;
use crate::components::rules::{ListKind, RuleList, RuleStatus};
use crate::config::settings::{FailurePolicy, Settings};
use crate::models::context::RequestContext;
use crate::models::counter::{CounterRecord, TimeUnit};
use crate::models::verdict::{ActionKind, Decision, Outcome, ReasonCode, Verdict};
use crate::storage::{Store, StoreError};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("storage failure: {0}")]
    Store(#[from] StoreError),
}

// ---------------------------------------------------------------------------
// DecisionEngine
// ---------------------------------------------------------------------------

/// Per-request access-control decision engine.
///
/// Pipeline order per request: denied-agent rejection, rule-list lookup
/// (short-circuits on a persisted verdict), then anomaly detection against
/// the identity's counter record. Collaborators are injected at
/// construction; the engine holds no request-scoped state.
pub struct DecisionEngine {
    store: Arc<dyn Store>,
    robot: Arc<dyn RobotClassifier>,
    rules: Arc<dyn RuleList>,
    settings: Settings,
    /// Per-identity mutexes serializing the detect read-modify-write cycle,
    /// so concurrent requests from one IP cannot under-count each other.
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl DecisionEngine {
    /// Build an engine. Applies the configured storage channel up front, so
    /// a misconfigured backend fails here rather than on the first request.
    pub fn new(
        store: Arc<dyn Store>,
        robot: Arc<dyn RobotClassifier>,
        rules: Arc<dyn RuleList>,
        settings: Settings,
    ) -> Result<Self, EngineError> {
        store.set_channel(&settings.storage.channel)?;
        Ok(Self {
            store,
            robot,
            rules,
            settings,
            locks: DashMap::new(),
        })
    }

    /// Evaluate one request.
    ///
    /// Verdict lookups that fail at the store degrade per the configured
    /// failure policy instead of erroring; failed writes propagate.
    pub fn run(&self, ctx: &RequestContext) -> Result<Outcome, EngineError> {
        self.store.init(self.settings.storage.auto_create_schema)?;

        // Known-bad agents are rejected before any state is touched.
        if self.robot.is_denied_agent(ctx) {
            info!(ip = %ctx.ip, "Denied agent rejected by classifier");
            return Ok(Outcome {
                decision: Decision::Deny,
                reason: None,
                clear_cookie: false,
            });
        }

        let verdict = match self.store.get_verdict(&ctx.ip) {
            Ok(v) => v,
            Err(err) => {
                warn!(ip = %ctx.ip, error = %err, "Verdict lookup failed, degrading per policy");
                return Ok(self.degraded_outcome());
            }
        };

        let lookup = self.rules.lookup(&ctx.ip, &|| verdict.clone());
        match lookup.status {
            RuleStatus::Allow => {
                debug!(ip = %ctx.ip, code = ?lookup.code, "Allowed by rule list");
                Ok(Outcome {
                    decision: Decision::Allow,
                    reason: lookup.code,
                    clear_cookie: false,
                })
            }
            RuleStatus::Deny => {
                info!(ip = %ctx.ip, code = ?lookup.code, "Denied by rule list");
                Ok(Outcome {
                    decision: Decision::Deny,
                    reason: lookup.code,
                    clear_cookie: false,
                })
            }
            RuleStatus::None => {
                if self.settings.filters.enabled {
                    self.detect(ctx)
                } else {
                    Ok(Outcome::allow())
                }
            }
        }
    }

    /// Anomaly detection for an identity with no persisted verdict.
    fn detect(&self, ctx: &RequestContext) -> Result<Outcome, EngineError> {
        // Serialize everything that reads or writes this identity's state.
        let lock = self
            .locks
            .entry(ctx.ip.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let _guard = lock.lock();

        // Verified crawlers are promoted straight to a persisted allow;
        // they never accumulate counters.
        if self.robot.is_allowed_agent(ctx) {
            let reason = if self.robot.is_verified_google(ctx) {
                ReasonCode::Google
            } else if self.robot.is_verified_bing(ctx) {
                ReasonCode::Bing
            } else if self.robot.is_verified_yahoo(ctx) {
                ReasonCode::Yahoo
            } else {
                ReasonCode::SearchEngine
            };
            self.action(ActionKind::Allow, reason, ctx.timestamp, &ctx.ip, &ctx.hostname)?;
            info!(ip = %ctx.ip, reason = %reason, "Verified crawler promoted to allow list");
            return Ok(Outcome::allow());
        }

        let now = ctx.timestamp;
        let previous = match self.store.get_counter(&ctx.ip) {
            Ok(p) => p,
            Err(err) => {
                warn!(ip = %ctx.ip, error = %err, "Counter lookup failed, degrading per policy");
                return Ok(self.degraded_outcome());
            }
        };

        let prev = match previous {
            Some(prev) => prev,
            None => {
                // First sight: open every bucket now with a zero count.
                let rec = CounterRecord::fresh(&ctx.ip, &ctx.session_id, &ctx.hostname, now);
                self.store.save_counter(&rec)?;
                debug!(ip = %ctx.ip, "First sight, counter record created");
                return Ok(Outcome::allow());
            }
        };

        let mut rec = prev.clone();
        rec.increment_pageviews();
        rec.session = ctx.session_id.clone();
        rec.hostname = ctx.hostname.clone();
        rec.last_time = now;
        let mut clear_cookie = false;

        // Referer anomaly: only meaningful in quick succession, a user
        // navigating inside the site always carries a referer.
        if self.settings.filters.referer
            && now - prev.last_time <= self.settings.intervals.check_referer_secs
        {
            if ctx.referer.is_empty() {
                rec.flag_empty_referer += 1;
            }
            if rec.flag_empty_referer >= self.settings.flag_limits.referer {
                self.action(ActionKind::Deny, ReasonCode::EmptyReferer, now, &ctx.ip, &ctx.hostname)?;
                info!(ip = %ctx.ip, flags = rec.flag_empty_referer, "Denied: empty referer flags");
                return Ok(Outcome::deny(ReasonCode::EmptyReferer));
            }
        }

        // Session anomaly: a browser keeps its session cookie; a fresh
        // token on every hit means the client discards cookies.
        if self.settings.filters.session
            && now - prev.last_time <= self.settings.intervals.check_session_secs
        {
            if ctx.session_id != prev.session {
                rec.flag_multi_session += 1;
            }
            if rec.flag_multi_session >= self.settings.flag_limits.session {
                self.action(ActionKind::Deny, ReasonCode::TooManySessions, now, &ctx.ip, &ctx.hostname)?;
                info!(ip = %ctx.ip, flags = rec.flag_multi_session, "Denied: session churn");
                return Ok(Outcome::deny(ReasonCode::TooManySessions));
            }
        }

        // Script-cookie anomaly: most crawlers never execute the JavaScript
        // that sets the cookie.
        if self.settings.filters.js_cookie {
            match ctx.cookie(&self.settings.cookie.name) {
                Some(v) if v == self.settings.cookie.value => rec.pageviews_cookie += 1,
                _ => rec.flag_js_cookie += 1,
            }
            if rec.flag_js_cookie >= self.settings.flag_limits.cookie {
                self.action(ActionKind::Deny, ReasonCode::EmptyJsCookie, now, &ctx.ip, &ctx.hostname)?;
                info!(ip = %ctx.ip, flags = rec.flag_js_cookie, "Denied: missing script cookie");
                return Ok(Outcome::deny(ReasonCode::EmptyJsCookie));
            }
            if rec.pageviews_cookie > self.settings.flag_limits.cookie {
                // Periodically restart the cookie cycle and have the host
                // expire the cookie so it gets set again.
                rec.pageviews_cookie = 0;
                rec.flag_js_cookie = 0;
                clear_cookie = true;
            }
        } else {
            rec.flag_js_cookie = 0;
        }

        // Frequency quotas. Aged buckets are only marked here; they reset
        // after the whole pass allows, so a deny never loses state.
        if self.settings.filters.frequency {
            let mut expired: Vec<TimeUnit> = Vec::new();
            for unit in TimeUnit::ALL {
                if rec.bucket_expired(unit, now) {
                    expired.push(unit);
                } else if rec.pageviews(unit) >= self.settings.quotas.limit(unit) {
                    let reason = unit.deny_reason();
                    self.action(ActionKind::Deny, reason, now, &ctx.ip, &ctx.hostname)?;
                    info!(
                        ip = %ctx.ip,
                        unit = ?unit,
                        pageviews = rec.pageviews(unit),
                        "Denied: pageview quota reached"
                    );
                    return Ok(Outcome::deny(reason));
                }
            }
            for unit in expired {
                rec.reset_bucket(unit, now);
            }
        }

        // Flag aging: a transient anomaly only contributes for so long.
        if now - prev.first_time_flag >= self.settings.intervals.reset_flags_secs {
            rec.clear_flags(now);
        }

        self.store.save_counter(&rec)?;
        Ok(Outcome {
            decision: Decision::Allow,
            reason: None,
            clear_cookie,
        })
    }

    /// The single mutation point between "undecided, accumulating" and
    /// "decided, static". Allow/deny persist a verdict, unban removes one;
    /// in every case the identity's counters are deleted.
    pub fn action(
        &self,
        kind: ActionKind,
        reason: ReasonCode,
        time: i64,
        ip: &str,
        hostname: &str,
    ) -> Result<(), EngineError> {
        match kind {
            ActionKind::Allow | ActionKind::Deny => {
                let verdict = Verdict {
                    ip: ip.to_string(),
                    hostname: hostname.to_string(),
                    time,
                    kind,
                    reason,
                };
                self.store.save_verdict(&verdict)?;
            }
            ActionKind::Unban => {
                self.store.delete_verdict(ip)?;
            }
        }
        self.store.delete_counter(ip)?;
        Ok(())
    }

    /// Manually ban an identity: explicit deny list plus a persisted
    /// manual-ban verdict.
    pub fn ban(&self, ip: &str) -> Result<(), EngineError> {
        self.rules.add_to_deny_list(ip);
        self.action(
            ActionKind::Deny,
            ReasonCode::ManualBan,
            chrono::Utc::now().timestamp(),
            ip,
            "",
        )?;
        info!(ip = %ip, "Manually banned");
        Ok(())
    }

    /// Lift a ban: the identity returns to the undecided state and starts
    /// accumulating counters from zero on its next request.
    pub fn unban(&self, ip: &str) -> Result<(), EngineError> {
        self.action(
            ActionKind::Unban,
            ReasonCode::ManualBan,
            chrono::Utc::now().timestamp(),
            ip,
            "",
        )?;
        self.rules.remove(ip, ListKind::Deny);
        info!(ip = %ip, "Manually unbanned");
        Ok(())
    }

    /// Drop per-identity mutexes nobody is holding. Call from the host's
    /// periodic maintenance task.
    pub fn cleanup(&self) {
        self.locks.retain(|_, lock| Arc::strong_count(lock) > 1);
    }

    fn degraded_outcome(&self) -> Outcome {
        match self.settings.storage.on_failure {
            FailurePolicy::FailOpen => Outcome::allow(),
            FailurePolicy::FailClosed => Outcome {
                decision: Decision::Deny,
                reason: None,
                clear_cookie: false,
            },
        }
    }
}
