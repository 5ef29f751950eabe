use serde::{Deserialize, Serialize};

use moot_core::config::DEFAULT_STUN_SERVER;

/// ICE configuration applied to every server-side peer connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IceConfig {
    /// STUN server URLs. TURN is out of scope; only STUN is emitted.
    pub urls: Vec<String>,
}

impl Default for IceConfig {
    fn default() -> Self {
        Self {
            urls: vec![DEFAULT_STUN_SERVER.to_string()],
        }
    }
}

impl IceConfig {
    #[must_use]
    pub fn new(urls: Vec<String>) -> Self {
        if urls.is_empty() {
            return Self::default();
        }
        Self { urls }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_stun_server() {
        let config = IceConfig::default();
        assert_eq!(config.urls, vec!["stun:stun.l.google.com:19302"]);
    }

    #[test]
    fn test_empty_list_falls_back_to_default() {
        let config = IceConfig::new(Vec::new());
        assert_eq!(config.urls, IceConfig::default().urls);
    }
}
