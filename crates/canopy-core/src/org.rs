//! Target org connection details.

use serde::{Deserialize, Serialize};
use url::Url;

fn default_api_version() -> String {
    "62.0".to_string()
}

/// Connection details for one authenticated org.
///
/// Tokens come from configuration; canopy does not own an auth flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Org {
    pub username: String,
    pub instance_url: Url,
    pub access_token: String,
    #[serde(default = "default_api_version")]
    pub api_version: String,
}

impl Org {
    /// Major component of the org's API version ("62.0" -> 62).
    pub fn api_version_major(&self) -> Option<u32> {
        self.api_version.split('.').next()?.parse().ok()
    }

    /// Instance URL without a trailing slash, ready for path joining.
    pub fn base_url(&self) -> &str {
        self.instance_url.as_str().trim_end_matches('/')
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn org(api_version: &str) -> Org {
        Org {
            username: "admin@example.org".to_string(),
            instance_url: Url::parse("https://example.my.platform.com/").unwrap(),
            access_token: "00Dxx!token".to_string(),
            api_version: api_version.to_string(),
        }
    }

    #[test]
    fn api_version_major_parses_leading_component() {
        assert_eq!(org("62.0").api_version_major(), Some(62));
        assert_eq!(org("35.0").api_version_major(), Some(35));
        assert_eq!(org("not-a-version").api_version_major(), None);
    }

    #[test]
    fn base_url_strips_trailing_slash() {
        assert_eq!(org("62.0").base_url(), "https://example.my.platform.com");
    }
}
