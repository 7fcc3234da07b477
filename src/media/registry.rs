use std::cmp::Reverse;

use super::traits::MediaSite;
use crate::error::MediaError;

/// Registry of site downloaders.
pub struct MediaRegistry {
    sites: Vec<Box<dyn MediaSite>>,
}

impl MediaRegistry {
    /// Create a new empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self { sites: Vec::new() }
    }

    /// Register a site. Among equal priorities, earlier registrations win.
    pub fn register(&mut self, site: Box<dyn MediaSite>) {
        self.sites.push(site);
        // Stable sort keeps registration order within a priority
        self.sites.sort_by_key(|s| Reverse(s.priority()));
    }

    /// Offer `url` to each site in turn. The first site that claims it
    /// decides the result; later sites are never asked.
    ///
    /// # Errors
    ///
    /// Returns the claiming site's error.
    pub async fn download(&self, url: &str) -> Result<Option<String>, MediaError> {
        for site in &self.sites {
            if let Some(filename) = site.download(url).await? {
                return Ok(Some(filename));
            }
        }
        Ok(None)
    }

    /// Get all registered sites.
    #[must_use]
    pub fn sites(&self) -> &[Box<dyn MediaSite>] {
        &self.sites
    }
}

impl Default for MediaRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct Fixed {
        id: &'static str,
        prefix: &'static str,
        priority: i32,
        fail: bool,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl MediaSite for Fixed {
        fn site_id(&self) -> &'static str {
            self.id
        }

        fn priority(&self) -> i32 {
            self.priority
        }

        async fn download(&self, url: &str) -> Result<Option<String>, MediaError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !url.starts_with(self.prefix) {
                return Ok(None);
            }
            if self.fail {
                return Err(MediaError::malformed(url, "broken"));
            }
            Ok(Some(format!("{}:{url}", self.id)))
        }
    }

    fn site(id: &'static str, prefix: &'static str, priority: i32) -> Box<dyn MediaSite> {
        Box::new(Fixed {
            id,
            prefix,
            priority,
            fail: false,
            calls: Arc::default(),
        })
    }

    #[tokio::test]
    async fn test_earliest_registration_wins() {
        let mut registry = MediaRegistry::new();
        registry.register(site("first", "https://", 0));
        registry.register(site("second", "https://", 0));

        assert_eq!(
            registry.download("https://example.com/a.png").await.unwrap(),
            Some("first:https://example.com/a.png".to_string())
        );
    }

    #[tokio::test]
    async fn test_priority_beats_registration_order() {
        let mut registry = MediaRegistry::new();
        registry.register(site("low", "https://", 0));
        registry.register(site("high", "https://", 10));

        let ids: Vec<_> = registry.sites().iter().map(|s| s.site_id()).collect();
        assert_eq!(ids, vec!["high", "low"]);
        assert_eq!(
            registry.download("https://example.com/").await.unwrap(),
            Some("high:https://example.com/".to_string())
        );
    }

    #[tokio::test]
    async fn test_falls_through_to_claiming_site() {
        let mut registry = MediaRegistry::new();
        registry.register(site("imgur", "https://imgur.com/", 0));
        registry.register(site("imgbb", "https://ibb.co/", 0));

        assert_eq!(
            registry.download("https://ibb.co/Abc1234").await.unwrap(),
            Some("imgbb:https://ibb.co/Abc1234".to_string())
        );
        assert_eq!(registry.download("https://other.example/x").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_claiming_site_error_stops_the_search() {
        let later_calls = Arc::new(AtomicUsize::new(0));
        let mut registry = MediaRegistry::new();
        registry.register(Box::new(Fixed {
            id: "broken",
            prefix: "https://",
            priority: 0,
            fail: true,
            calls: Arc::default(),
        }));
        registry.register(Box::new(Fixed {
            id: "later",
            prefix: "https://",
            priority: 0,
            fail: false,
            calls: later_calls.clone(),
        }));

        let err = registry.download("https://example.com/x").await.unwrap_err();
        assert!(matches!(err, MediaError::Malformed { .. }));
        assert_eq!(later_calls.load(Ordering::SeqCst), 0);
    }
}
