//! Storefront lookup for the `{{storeUrl}}` template variable.

use crate::id::CreatorId;
use async_trait::async_trait;
use std::collections::HashMap;

/// Resolves a creator's public storefront URL.
#[async_trait]
pub trait Storefronts: Send + Sync {
    /// Returns the storefront URL, or `None` if the creator has not set one up.
    async fn store_url(&self, creator_id: CreatorId) -> Option<String>;
}

/// A fixed creator-to-URL table.
#[derive(Debug, Clone, Default)]
pub struct FixedStorefronts {
    urls: HashMap<CreatorId, String>,
}

impl FixedStorefronts {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a storefront URL for a creator.
    #[must_use]
    pub fn with(mut self, creator_id: CreatorId, url: impl Into<String>) -> Self {
        self.urls.insert(creator_id, url.into());
        self
    }
}

#[async_trait]
impl Storefronts for FixedStorefronts {
    async fn store_url(&self, creator_id: CreatorId) -> Option<String> {
        self.urls.get(&creator_id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fixed_storefronts_lookup() {
        let creator = CreatorId::new();
        let storefronts = FixedStorefronts::new().with(creator, "https://shop.example/maya");

        assert_eq!(
            storefronts.store_url(creator).await.as_deref(),
            Some("https://shop.example/maya")
        );
        assert!(storefronts.store_url(CreatorId::new()).await.is_none());
    }
}
