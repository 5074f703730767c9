use super::settings::{
    CookieConfig, FailurePolicy, FilterConfig, FlagLimitConfig, IntervalConfig, QuotaConfig,
    StorageConfig,
};

pub fn default_true() -> bool {
    true
}

pub fn default_false() -> bool {
    false
}

pub fn default_quota_second() -> u32 {
    2
}

pub fn default_quota_minute() -> u32 {
    10
}

pub fn default_quota_hour() -> u32 {
    30
}

pub fn default_quota_day() -> u32 {
    60
}

pub fn default_flag_limit_cookie() -> u32 {
    5
}

pub fn default_flag_limit_session() -> u32 {
    5
}

pub fn default_flag_limit_referer() -> u32 {
    10
}

pub fn default_interval_check_referer() -> i64 {
    5
}

pub fn default_interval_check_session() -> i64 {
    30
}

pub fn default_time_reset_flags() -> i64 {
    3600
}

pub fn default_cookie_name() -> String {
    "ssjd".to_string()
}

pub fn default_cookie_value() -> String {
    "1".to_string()
}

pub fn default_cookie_domain() -> String {
    String::new()
}

pub fn default_channel() -> String {
    "palisade".to_string()
}

pub fn default_failure_policy() -> FailurePolicy {
    FailurePolicy::FailOpen
}

pub fn default_filter_config() -> FilterConfig {
    FilterConfig {
        enabled: true,
        session: true,
        referer: true,
        js_cookie: false,
        frequency: true,
    }
}

pub fn default_quota_config() -> QuotaConfig {
    QuotaConfig {
        second: default_quota_second(),
        minute: default_quota_minute(),
        hour: default_quota_hour(),
        day: default_quota_day(),
    }
}

pub fn default_flag_limit_config() -> FlagLimitConfig {
    FlagLimitConfig {
        cookie: default_flag_limit_cookie(),
        session: default_flag_limit_session(),
        referer: default_flag_limit_referer(),
    }
}

pub fn default_interval_config() -> IntervalConfig {
    IntervalConfig {
        check_referer_secs: default_interval_check_referer(),
        check_session_secs: default_interval_check_session(),
        reset_flags_secs: default_time_reset_flags(),
    }
}

pub fn default_cookie_config() -> CookieConfig {
    CookieConfig {
        name: default_cookie_name(),
        value: default_cookie_value(),
        domain: default_cookie_domain(),
    }
}

pub fn default_storage_config() -> StorageConfig {
    StorageConfig {
        channel: default_channel(),
        auto_create_schema: true,
        on_failure: default_failure_policy(),
    }
}
