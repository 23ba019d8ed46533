#[derive(Debug, Clone, serde::Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_base_url() -> String { "http://localhost:3000".into() }
fn default_timeout_secs() -> u64 { 10 }

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl ApiConfig {
    /// Reads `EVENTS_API_URL` and `EVENTS_API_TIMEOUT_SECS`, falling
    /// back to the defaults for anything unset.
    pub fn from_env() -> Self {
        let base_url = std::env::var("EVENTS_API_URL")
            .unwrap_or_else(|_| default_base_url());
        let timeout_secs = std::env::var("EVENTS_API_TIMEOUT_SECS")
            .ok()
            .and_then(|raw| raw.parse().ok())
            .unwrap_or_else(default_timeout_secs);
        Self {
            base_url,
            timeout_secs,
        }
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    pub fn timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.timeout_secs)
    }
}
