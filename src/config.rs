use std::time::Duration;

#[derive(Clone, Debug)]
pub struct AppConfig {
    /// Absolute base URI records are identified under, without a trailing
    /// slash (e.g. `https://example.com`).
    pub base_uri: String,
    pub routes: Routes,
    /// Verify push-service TLS certificates. Only disable against test
    /// endpoints with self-signed certificates.
    pub strict_tls: bool,
    /// Per-request timeout for outbound push deliveries.
    pub request_timeout: Duration,
    /// Upper bound on concurrent deliveries within one fan-out.
    pub fanout_limit: usize,
}

#[derive(Clone, Debug)]
pub struct Routes {
    pub vapid_keys: String,
    pub subscriptions: String,
}

impl Default for Routes {
    fn default() -> Self {
        Self {
            vapid_keys: "/web-push/vapid-keys".to_string(),
            subscriptions: "/web-push/subscriptions".to_string(),
        }
    }
}

#[cfg(test)]
impl Default for AppConfig {
    fn default() -> Self {
        Self {
            base_uri: "https://push.test".to_string(),
            routes: Routes::default(),
            strict_tls: true,
            request_timeout: Duration::from_secs(10),
            fanout_limit: 8,
        }
    }
}
