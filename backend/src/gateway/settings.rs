//! Gateway endpoint settings

use serde::{Deserialize, Serialize};
use std::fmt;

/// Endpoint and credential used to reach the gateway
#[derive(Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GatewaySettings {
    /// Endpoint URL (`ws://`, `wss://`, or `http(s)://` mapped onto them)
    pub url: String,
    /// Bearer token; empty means none
    #[serde(default)]
    pub token: String,
}

impl GatewaySettings {
    /// Create settings from an endpoint and optional token
    pub fn new(url: impl Into<String>, token: Option<&str>) -> Self {
        Self {
            url: url.into(),
            token: token.unwrap_or_default().to_string(),
        }
    }

    /// The token, if one is configured
    pub fn token(&self) -> Option<&str> {
        if self.token.is_empty() {
            None
        } else {
            Some(&self.token)
        }
    }

    /// Token with all but the last four characters hidden
    pub fn masked_token(&self) -> String {
        let count = self.token.chars().count();
        if count == 0 {
            return String::new();
        }
        let visible: String = self.token.chars().skip(count.saturating_sub(4)).collect();
        if count <= 4 {
            "*".repeat(count)
        } else {
            format!("{}{}", "*".repeat(count - 4), visible)
        }
    }
}

impl fmt::Debug for GatewaySettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatewaySettings")
            .field("url", &self.url)
            .field("token", &if self.token.is_empty() { "" } else { "<redacted>" })
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_token_is_none() {
        assert_eq!(GatewaySettings::new("ws://x", None).token(), None);
        assert_eq!(GatewaySettings::new("ws://x", Some("")).token(), None);
        assert_eq!(GatewaySettings::new("ws://x", Some("t")).token(), Some("t"));
    }

    #[test]
    fn test_masked_token() {
        assert_eq!(GatewaySettings::new("ws://x", Some("abcdefgh")).masked_token(), "****efgh");
        assert_eq!(GatewaySettings::new("ws://x", Some("abc")).masked_token(), "***");
        assert_eq!(GatewaySettings::new("ws://x", None).masked_token(), "");
    }

    #[test]
    fn test_debug_never_prints_token() {
        let settings = GatewaySettings::new("ws://x", Some("super-secret"));
        assert!(!format!("{:?}", settings).contains("super-secret"));
    }
}
