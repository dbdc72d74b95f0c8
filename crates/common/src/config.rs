use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Top-level gatekeeper configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_listen")]
    pub listen: String,
    #[serde(default)]
    pub admin: AdminConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            admin: AdminConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_admin_listen")]
    pub listen: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            listen: default_admin_listen(),
        }
    }
}

/// Per-client token bucket sizing and idle reclamation timing.
///
/// These are startup constants: nothing mutates them once the limiter has
/// been built.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Bucket capacity, i.e. the largest burst a fresh or rested client gets.
    #[serde(default = "default_capacity")]
    pub capacity: u64,
    /// Tokens added per second.
    #[serde(default = "default_refill_rate")]
    pub refill_rate: f64,
    /// How often the reclaimer wakes up.
    #[serde(default = "default_scan_interval_secs")]
    pub scan_interval_secs: u64,
    /// Inactivity after which a client's state is dropped.
    #[serde(default = "default_idle_threshold_secs")]
    pub idle_threshold_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
            refill_rate: default_refill_rate(),
            scan_interval_secs: default_scan_interval_secs(),
            idle_threshold_secs: default_idle_threshold_secs(),
        }
    }
}

impl RateLimitConfig {
    pub fn scan_interval(&self) -> Duration {
        Duration::from_secs(self.scan_interval_secs)
    }

    pub fn idle_threshold(&self) -> Duration {
        Duration::from_secs(self.idle_threshold_secs)
    }
}

// Default value helpers
fn default_listen() -> String {
    "0.0.0.0:9080".to_string()
}
fn default_admin_listen() -> String {
    "127.0.0.1:9090".to_string()
}
fn default_true() -> bool {
    true
}
fn default_capacity() -> u64 {
    4
}
fn default_refill_rate() -> f64 {
    2.0
}
fn default_scan_interval_secs() -> u64 {
    60
}
fn default_idle_threshold_secs() -> u64 {
    // three scan intervals
    180
}

impl AppConfig {
    /// Load configuration from a YAML file.
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        tracing::debug!(path, bytes = content.len(), "read configuration file");
        Self::from_yaml(&content)
    }

    /// Parse and validate configuration from a YAML string.
    pub fn from_yaml(content: &str) -> anyhow::Result<Self> {
        let config: Self = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration for consistency.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.server.listen.trim().is_empty() {
            anyhow::bail!("server.listen must not be empty");
        }

        if self.server.admin.enabled && self.server.admin.listen.trim().is_empty() {
            anyhow::bail!("server.admin.listen must not be empty when the admin API is enabled");
        }

        let rl = &self.rate_limit;
        if rl.capacity == 0 {
            anyhow::bail!("rate_limit.capacity must be at least 1");
        }
        if !rl.refill_rate.is_finite() || rl.refill_rate < 0.0 {
            anyhow::bail!(
                "rate_limit.refill_rate must be a finite, non-negative number (got {})",
                rl.refill_rate
            );
        }
        if rl.scan_interval_secs == 0 {
            anyhow::bail!("rate_limit.scan_interval_secs must be greater than zero");
        }
        if rl.idle_threshold_secs == 0 {
            anyhow::bail!("rate_limit.idle_threshold_secs must be greater than zero");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_uses_defaults() {
        let config = AppConfig::from_yaml("{}").unwrap();

        assert_eq!(config.server.listen, "0.0.0.0:9080");
        assert!(config.server.admin.enabled);
        assert_eq!(config.rate_limit.capacity, 4);
        assert_eq!(config.rate_limit.refill_rate, 2.0);
        assert_eq!(config.rate_limit.scan_interval(), Duration::from_secs(60));
        assert_eq!(config.rate_limit.idle_threshold(), Duration::from_secs(180));
    }

    #[test]
    fn partial_sections_are_filled_in() {
        let yaml = r#"
server:
  listen: "127.0.0.1:8080"
rate_limit:
  capacity: 10
  refill_rate: 0.5
"#;
        let config = AppConfig::from_yaml(yaml).unwrap();

        assert_eq!(config.server.listen, "127.0.0.1:8080");
        assert_eq!(config.server.admin.listen, "127.0.0.1:9090");
        assert_eq!(config.rate_limit.capacity, 10);
        assert_eq!(config.rate_limit.refill_rate, 0.5);
        assert_eq!(config.rate_limit.scan_interval_secs, 60);
    }

    #[test]
    fn rejects_zero_capacity() {
        let err = AppConfig::from_yaml("rate_limit:\n  capacity: 0\n").unwrap_err();
        assert!(err.to_string().contains("capacity"));
    }

    #[test]
    fn rejects_negative_refill_rate() {
        let err = AppConfig::from_yaml("rate_limit:\n  refill_rate: -1.0\n").unwrap_err();
        assert!(err.to_string().contains("refill_rate"));
    }

    #[test]
    fn zero_refill_rate_is_allowed() {
        let config = AppConfig::from_yaml("rate_limit:\n  refill_rate: 0\n").unwrap();
        assert_eq!(config.rate_limit.refill_rate, 0.0);
    }

    #[test]
    fn rejects_zero_scan_interval() {
        let err = AppConfig::from_yaml("rate_limit:\n  scan_interval_secs: 0\n").unwrap_err();
        assert!(err.to_string().contains("scan_interval_secs"));
    }

    #[test]
    fn rejects_empty_listen() {
        let err = AppConfig::from_yaml("server:\n  listen: \"\"\n").unwrap_err();
        assert!(err.to_string().contains("server.listen"));
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(AppConfig::load("/nonexistent/gatekeeper.yaml").is_err());
    }
}
