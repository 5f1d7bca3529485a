use std::time::Duration;

use serde::Deserialize;

/// Options applied to each feed request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
#[serde(default)]
pub struct RequestOptions {
    /// Total request timeout in seconds (default: 30)
    pub timeout_secs: u64,

    /// Connection timeout in seconds (default: 30)
    pub connect_timeout_secs: u64,

    /// Follow redirects (default: true)
    pub allow_redirects: bool,

    /// Redirect limit when following (default: 10)
    pub max_redirects: usize,

    /// Reject invalid TLS certificates (default: true)
    pub verify_tls: bool,

    /// User agent string to use
    pub user_agent: String,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            connect_timeout_secs: 30,
            allow_redirects: true,
            max_redirects: 10,
            verify_tls: true,
            user_agent: concat!("feedcache/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// Per-feed overrides; unset fields inherit the global options.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RequestOverrides {
    pub timeout_secs: Option<u64>,
    pub connect_timeout_secs: Option<u64>,
    pub allow_redirects: Option<bool>,
    pub max_redirects: Option<usize>,
    pub verify_tls: Option<bool>,
    pub user_agent: Option<String>,
}

impl RequestOptions {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn merged(&self, overrides: Option<&RequestOverrides>) -> Self {
        let Some(o) = overrides else {
            return self.clone();
        };
        Self {
            timeout_secs: o.timeout_secs.unwrap_or(self.timeout_secs),
            connect_timeout_secs: o.connect_timeout_secs.unwrap_or(self.connect_timeout_secs),
            allow_redirects: o.allow_redirects.unwrap_or(self.allow_redirects),
            max_redirects: o.max_redirects.unwrap_or(self.max_redirects),
            verify_tls: o.verify_tls.unwrap_or(self.verify_tls),
            user_agent: o
                .user_agent
                .clone()
                .unwrap_or_else(|| self.user_agent.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options() {
        let options = RequestOptions::default();
        assert_eq!(options.timeout(), Duration::from_secs(30));
        assert!(options.allow_redirects);
        assert!(options.verify_tls);
        assert!(options.user_agent.starts_with("feedcache/"));
    }

    #[test]
    fn test_merge_without_overrides() {
        let options = RequestOptions::default();
        assert_eq!(options.merged(None), options);
    }

    #[test]
    fn test_merge_partial_overrides() {
        let options = RequestOptions::default();
        let overrides = RequestOverrides {
            timeout_secs: Some(5),
            verify_tls: Some(false),
            ..Default::default()
        };
        let merged = options.merged(Some(&overrides));
        assert_eq!(merged.timeout_secs, 5);
        assert!(!merged.verify_tls);
        // Inherits the rest
        assert_eq!(merged.connect_timeout_secs, 30);
        assert_eq!(merged.max_redirects, 10);
    }
}
