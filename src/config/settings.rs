use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;

use super::defaults;
use crate::models::counter::TimeUnit;

/// Top-level configuration for the decision engine.
/// Deserializes from a TOML configuration file.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default = "defaults::default_filter_config")]
    pub filters: FilterConfig,

    #[serde(default = "defaults::default_quota_config")]
    pub quotas: QuotaConfig,

    #[serde(default = "defaults::default_flag_limit_config")]
    pub flag_limits: FlagLimitConfig,

    #[serde(default = "defaults::default_interval_config")]
    pub intervals: IntervalConfig,

    #[serde(default = "defaults::default_cookie_config")]
    pub cookie: CookieConfig,

    #[serde(default = "defaults::default_storage_config")]
    pub storage: StorageConfig,
}

impl Settings {
    /// Load configuration from a TOML file at the given path.
    pub fn load(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path))?;
        let settings: Settings = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path))?;
        Ok(settings)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            filters: defaults::default_filter_config(),
            quotas: defaults::default_quota_config(),
            flag_limits: defaults::default_flag_limit_config(),
            intervals: defaults::default_interval_config(),
            cookie: defaults::default_cookie_config(),
            storage: defaults::default_storage_config(),
        }
    }
}

/// Which anomaly checks run inside `detect`.
#[derive(Debug, Clone, Deserialize)]
pub struct FilterConfig {
    /// Master switch: when false, unlisted identities fall through to an
    /// implicit allow and no counters are written.
    #[serde(default = "defaults::default_true")]
    pub enabled: bool,

    #[serde(default = "defaults::default_true")]
    pub session: bool,

    #[serde(default = "defaults::default_true")]
    pub referer: bool,

    /// Off by default: requires the host site to set the cookie from
    /// JavaScript.
    #[serde(default = "defaults::default_false")]
    pub js_cookie: bool,

    #[serde(default = "defaults::default_true")]
    pub frequency: bool,
}

/// Pageview limits per time unit.
#[derive(Debug, Clone, Deserialize)]
pub struct QuotaConfig {
    #[serde(default = "defaults::default_quota_second")]
    pub second: u32,

    #[serde(default = "defaults::default_quota_minute")]
    pub minute: u32,

    #[serde(default = "defaults::default_quota_hour")]
    pub hour: u32,

    #[serde(default = "defaults::default_quota_day")]
    pub day: u32,
}

impl QuotaConfig {
    pub fn limit(&self, unit: TimeUnit) -> u32 {
        match unit {
            TimeUnit::Second => self.second,
            TimeUnit::Minute => self.minute,
            TimeUnit::Hour => self.hour,
            TimeUnit::Day => self.day,
        }
    }
}

/// Escalation thresholds for the anomaly flags.
#[derive(Debug, Clone, Deserialize)]
pub struct FlagLimitConfig {
    #[serde(default = "defaults::default_flag_limit_cookie")]
    pub cookie: u32,

    #[serde(default = "defaults::default_flag_limit_session")]
    pub session: u32,

    #[serde(default = "defaults::default_flag_limit_referer")]
    pub referer: u32,
}

/// Time windows for flag accumulation and aging, in seconds.
#[derive(Debug, Clone, Deserialize)]
pub struct IntervalConfig {
    /// Referer flag only accumulates when the previous request was within
    /// this many seconds.
    #[serde(default = "defaults::default_interval_check_referer")]
    pub check_referer_secs: i64,

    #[serde(default = "defaults::default_interval_check_session")]
    pub check_session_secs: i64,

    /// How long the anomaly flags live before they age out together.
    #[serde(default = "defaults::default_time_reset_flags")]
    pub reset_flags_secs: i64,
}

/// The script-set cookie checked by the js-cookie filter.
#[derive(Debug, Clone, Deserialize)]
pub struct CookieConfig {
    #[serde(default = "defaults::default_cookie_name")]
    pub name: String,

    /// The value the host's JavaScript writes; anything else is flagged.
    #[serde(default = "defaults::default_cookie_value")]
    pub value: String,

    #[serde(default = "defaults::default_cookie_domain")]
    pub domain: String,
}

/// What to do when the store fails during a lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Degrade to an implicit allow rather than denying all traffic.
    FailOpen,
    /// Deny when the store cannot answer.
    FailClosed,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Logical namespace (table prefix) within the store.
    #[serde(default = "defaults::default_channel")]
    pub channel: String,

    /// Create the schema on the first `init`. Leave off for high-traffic
    /// deployments where the schema is provisioned ahead of time.
    #[serde(default = "defaults::default_true")]
    pub auto_create_schema: bool,

    #[serde(default = "defaults::default_failure_policy")]
    pub on_failure: FailurePolicy,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_shipped_limits() {
        let settings = Settings::default();
        assert_eq!(settings.quotas.second, 2);
        assert_eq!(settings.quotas.minute, 10);
        assert_eq!(settings.quotas.hour, 30);
        assert_eq!(settings.quotas.day, 60);
        assert_eq!(settings.flag_limits.cookie, 5);
        assert_eq!(settings.flag_limits.session, 5);
        assert_eq!(settings.flag_limits.referer, 10);
        assert_eq!(settings.intervals.check_referer_secs, 5);
        assert_eq!(settings.intervals.check_session_secs, 30);
        assert_eq!(settings.intervals.reset_flags_secs, 3600);
        assert_eq!(settings.cookie.name, "ssjd");
        assert!(!settings.filters.js_cookie);
        assert!(settings.filters.enabled);
        assert_eq!(settings.storage.on_failure, FailurePolicy::FailOpen);
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let settings: Settings = toml::from_str(
            r#"
            [quotas]
            second = 5

            [storage]
            on_failure = "fail_closed"
            "#,
        )
        .unwrap();
        assert_eq!(settings.quotas.second, 5);
        assert_eq!(settings.quotas.minute, 10);
        assert_eq!(settings.storage.on_failure, FailurePolicy::FailClosed);
        assert!(settings.filters.session);
    }
}
