//! Client-identity header profiles.
//!
//! Each profile is one plausible desktop browser's header set. The fetcher
//! picks one per attempt; stats sites fingerprint repeated identical
//! header sets faster than they fingerprint request volume.

const ACCEPT_CHROME: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,image/apng,*/*;q=0.8,application/signed-exchange;v=b3;q=0.9";
const ACCEPT_FIREFOX: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8";
const ACCEPT_SAFARI: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";

/// One browser-like identity: User-Agent plus matching Accept headers.
#[derive(Debug, Clone)]
pub struct HeaderProfile {
    pub user_agent: String,
    pub accept: String,
    pub accept_language: String,
}

impl HeaderProfile {
    pub fn new(
        user_agent: impl Into<String>,
        accept: impl Into<String>,
        accept_language: impl Into<String>,
    ) -> Self {
        Self {
            user_agent: user_agent.into(),
            accept: accept.into(),
            accept_language: accept_language.into(),
        }
    }
}

/// The default rotation pool: current-ish Chrome, Firefox, Safari and Edge
/// builds across Windows, macOS and Linux.
pub fn default_profiles() -> Vec<HeaderProfile> {
    vec![
        HeaderProfile::new(
            "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/135.0.0.0 Safari/537.36",
            ACCEPT_CHROME,
            "en-US,en;q=0.9",
        ),
        HeaderProfile::new(
            "Mozilla/5.0 (Macintosh; Intel Mac OS X 14_7_5) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/135.0.0.0 Safari/537.36",
            ACCEPT_CHROME,
            "en-US,en;q=0.9",
        ),
        HeaderProfile::new(
            "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/123.0.0.0 Safari/537.36",
            ACCEPT_CHROME,
            "en-US,en;q=0.9",
        ),
        HeaderProfile::new(
            "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:137.0) Gecko/20100101 Firefox/137.0",
            ACCEPT_FIREFOX,
            "en-US,en;q=0.9",
        ),
        HeaderProfile::new(
            "Mozilla/5.0 (Macintosh; Intel Mac OS X 14.7; rv:137.0) Gecko/20100101 Firefox/137.0",
            ACCEPT_FIREFOX,
            "en-US,en;q=0.5",
        ),
        HeaderProfile::new(
            "Mozilla/5.0 (X11; Ubuntu; Linux x86_64; rv:124.0) Gecko/20100101 Firefox/124.0",
            ACCEPT_FIREFOX,
            "en-US,en;q=0.5",
        ),
        HeaderProfile::new(
            "Mozilla/5.0 (Macintosh; Intel Mac OS X 14_7_5) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/18.3 Safari/605.1.15",
            ACCEPT_SAFARI,
            "en-US,en;q=0.9",
        ),
        HeaderProfile::new(
            "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/135.0.0.0 Safari/537.36 Edg/135.0.3179.73",
            ACCEPT_CHROME,
            "en-US,en;q=0.9",
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_is_non_empty_and_distinct() {
        let profiles = default_profiles();
        assert!(profiles.len() >= 4);

        let mut agents: Vec<&str> = profiles.iter().map(|p| p.user_agent.as_str()).collect();
        agents.sort_unstable();
        agents.dedup();
        assert_eq!(agents.len(), profiles.len());
    }
}
