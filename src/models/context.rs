use std::collections::HashMap;

/// Everything the engine needs to know about one inbound request.
///
/// Built by the host server per request and passed into every pipeline
/// call; the engine itself holds no request-scoped state.
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// The identity under evaluation. Primary key for all persisted state.
    pub ip: String,

    /// Reverse-resolved hostname for the IP, empty if resolution failed.
    /// Resolution happens outside the engine.
    pub hostname: String,

    /// Session token issued by the host server.
    pub session_id: String,

    /// Raw HTTP referer header, empty if absent.
    pub referer: String,

    pub user_agent: Option<String>,

    /// Request cookies, already parsed by the host.
    pub cookies: HashMap<String, String>,

    /// Unix timestamp the request arrived.
    pub timestamp: i64,
}

impl RequestContext {
    pub fn new(ip: &str, session_id: &str, timestamp: i64) -> Self {
        Self {
            ip: ip.to_string(),
            hostname: String::new(),
            session_id: session_id.to_string(),
            referer: String::new(),
            user_agent: None,
            cookies: HashMap::new(),
            timestamp,
        }
    }

    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(|v| v.as_str())
    }
}
