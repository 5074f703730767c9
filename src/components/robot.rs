use tracing::debug;

use crate::models::context::RequestContext;

// ---------------------------------------------------------------------------
// RobotClassifier – the capability the engine consumes
// ---------------------------------------------------------------------------

/// Distinguishes known-bad, known-good, and verified-crawler automated
/// agents. How verification is performed is the implementation's business;
/// the engine only consumes the answers.
pub trait RobotClassifier: Send + Sync {
    /// Agents rejected outright, before any state is consulted.
    fn is_denied_agent(&self, ctx: &RequestContext) -> bool;

    /// Agents that may be promoted to a persisted allow verdict.
    fn is_allowed_agent(&self, ctx: &RequestContext) -> bool;

    fn is_verified_google(&self, ctx: &RequestContext) -> bool;
    fn is_verified_bing(&self, ctx: &RequestContext) -> bool;
    fn is_verified_yahoo(&self, ctx: &RequestContext) -> bool;
}

// ---------------------------------------------------------------------------
// UserAgentClassifier – canonical implementation
// ---------------------------------------------------------------------------

struct KnownCrawler {
    ua_contains: &'static str,
    host_suffixes: &'static [&'static str],
}

const GOOGLE: KnownCrawler = KnownCrawler {
    ua_contains: "googlebot",
    host_suffixes: &[".googlebot.com", ".google.com"],
};

const BING: KnownCrawler = KnownCrawler {
    ua_contains: "bingbot",
    host_suffixes: &[".search.msn.com"],
};

const YAHOO: KnownCrawler = KnownCrawler {
    ua_contains: "slurp",
    host_suffixes: &[".crawl.yahoo.net"],
};

/// Classifier driven by user-agent substrings plus resolved-hostname
/// verification for the major search engines.
///
/// A crawler user agent counts as verified only when the reverse-resolved
/// hostname carried by the request context ends with one of the engine's
/// known domains; a spoofed UA from an unrelated host is not promoted.
pub struct UserAgentClassifier {
    denied_agents: Vec<String>,
    trusted_agents: Vec<String>,
}

/// UA fragments denied by default. Operators extend or replace the list.
const DEFAULT_DENIED_AGENTS: &[&str] = &[
    "scrapy",
    "sqlmap",
    "masscan",
    "nikto",
    "httrack",
    "grabber",
];

impl UserAgentClassifier {
    pub fn new() -> Self {
        Self {
            denied_agents: DEFAULT_DENIED_AGENTS.iter().map(|s| s.to_string()).collect(),
            trusted_agents: Vec::new(),
        }
    }

    /// Replace the denied-agent substring list.
    pub fn with_denied_agents(mut self, agents: Vec<String>) -> Self {
        self.denied_agents = agents;
        self
    }

    /// UA substrings allowed without hostname verification, for crawlers
    /// the operator trusts explicitly.
    pub fn with_trusted_agents(mut self, agents: Vec<String>) -> Self {
        self.trusted_agents = agents;
        self
    }

    fn ua_lower(ctx: &RequestContext) -> Option<String> {
        ctx.user_agent.as_deref().map(|ua| ua.to_lowercase())
    }

    fn verify(&self, ctx: &RequestContext, crawler: &KnownCrawler) -> bool {
        let ua = match Self::ua_lower(ctx) {
            Some(ua) => ua,
            None => return false,
        };
        if !ua.contains(crawler.ua_contains) {
            return false;
        }
        let hostname = ctx.hostname.to_lowercase();
        let verified = crawler
            .host_suffixes
            .iter()
            .any(|suffix| hostname.ends_with(suffix));
        if !verified {
            debug!(ip = %ctx.ip, hostname = %ctx.hostname, "Crawler UA claimed but hostname does not match");
        }
        verified
    }
}

impl Default for UserAgentClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl RobotClassifier for UserAgentClassifier {
    fn is_denied_agent(&self, ctx: &RequestContext) -> bool {
        let ua = match Self::ua_lower(ctx) {
            Some(ua) => ua,
            None => return false,
        };
        self.denied_agents.iter().any(|bad| ua.contains(bad.as_str()))
    }

    fn is_allowed_agent(&self, ctx: &RequestContext) -> bool {
        if self.is_verified_google(ctx) || self.is_verified_bing(ctx) || self.is_verified_yahoo(ctx)
        {
            return true;
        }
        if let Some(ua) = Self::ua_lower(ctx) {
            return self
                .trusted_agents
                .iter()
                .any(|good| ua.contains(good.as_str()));
        }
        false
    }

    fn is_verified_google(&self, ctx: &RequestContext) -> bool {
        self.verify(ctx, &GOOGLE)
    }

    fn is_verified_bing(&self, ctx: &RequestContext) -> bool {
        self.verify(ctx, &BING)
    }

    fn is_verified_yahoo(&self, ctx: &RequestContext) -> bool {
        self.verify(ctx, &YAHOO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(ua: Option<&str>, hostname: &str) -> RequestContext {
        let mut ctx = RequestContext::new("66.249.66.1", "sess", 1000);
        ctx.user_agent = ua.map(|s| s.to_string());
        ctx.hostname = hostname.to_string();
        ctx
    }

    #[test]
    fn test_verified_google_needs_matching_hostname() {
        let classifier = UserAgentClassifier::new();
        let genuine = ctx(
            Some("Mozilla/5.0 (compatible; Googlebot/2.1)"),
            "crawl-66-249-66-1.googlebot.com",
        );
        assert!(classifier.is_verified_google(&genuine));
        assert!(classifier.is_allowed_agent(&genuine));

        let spoofed = ctx(
            Some("Mozilla/5.0 (compatible; Googlebot/2.1)"),
            "host.badcloud.example",
        );
        assert!(!classifier.is_verified_google(&spoofed));
        assert!(!classifier.is_allowed_agent(&spoofed));
    }

    #[test]
    fn test_verified_bing_and_yahoo() {
        let classifier = UserAgentClassifier::new();
        let bing = ctx(Some("bingbot/2.0"), "msnbot-1.search.msn.com");
        assert!(classifier.is_verified_bing(&bing));
        assert!(!classifier.is_verified_google(&bing));

        let yahoo = ctx(Some("Yahoo! Slurp"), "b1.crawl.yahoo.net");
        assert!(classifier.is_verified_yahoo(&yahoo));
    }

    #[test]
    fn test_denied_agent_substrings() {
        let classifier = UserAgentClassifier::new();
        assert!(classifier.is_denied_agent(&ctx(Some("Scrapy/2.11"), "")));
        assert!(!classifier.is_denied_agent(&ctx(Some("Mozilla/5.0"), "")));
        assert!(!classifier.is_denied_agent(&ctx(None, "")));
    }

    #[test]
    fn test_trusted_agents_skip_verification() {
        let classifier =
            UserAgentClassifier::new().with_trusted_agents(vec!["duckduckbot".to_string()]);
        let duck = ctx(Some("DuckDuckBot/1.1"), "");
        assert!(classifier.is_allowed_agent(&duck));
        assert!(!classifier.is_verified_google(&duck));
    }
}
