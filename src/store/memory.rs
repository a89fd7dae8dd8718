//! In-memory [`ProfileStore`] for tests.
//!
//! Profiles live in a `BTreeMap` behind `std::sync::RwLock`, keyed the same
//! way the SQLite table is.

use std::collections::BTreeMap;
use std::sync::RwLock;

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::models::{CanonicalProfile, Metric, SourcePlatform};

use super::ProfileStore;

type Key = (SourcePlatform, String);

pub struct MemoryProfileStore {
    profiles: RwLock<BTreeMap<Key, CanonicalProfile>>,
}

impl MemoryProfileStore {
    pub fn new() -> Self {
        Self {
            profiles: RwLock::new(BTreeMap::new()),
        }
    }

    /// Snapshot of everything stored, in key order.
    pub fn profiles(&self) -> Vec<CanonicalProfile> {
        self.profiles
            .read()
            .map(|map| map.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn get(&self, platform: SourcePlatform, source_id: &str) -> Option<CanonicalProfile> {
        let map = self.profiles.read().ok()?;
        map.get(&(platform, source_id.to_string())).cloned()
    }
}

impl Default for MemoryProfileStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProfileStore for MemoryProfileStore {
    async fn exists(&self, platform: SourcePlatform, source_id: &str) -> Result<bool> {
        let map = self.profiles.read().map_err(|_| anyhow!("store lock poisoned"))?;
        Ok(map.contains_key(&(platform, source_id.to_string())))
    }

    async fn replace(&self, profile: &CanonicalProfile) -> Result<()> {
        if !crate::normalize::is_valid_email(&profile.basics.email) {
            anyhow::bail!("email '{}' does not match .+@.+", profile.basics.email);
        }
        let mut map = self.profiles.write().map_err(|_| anyhow!("store lock poisoned"))?;
        map.insert(
            (profile.source_platform, profile.source_id.clone()),
            profile.clone(),
        );
        Ok(())
    }

    async fn lowest_metric(&self, platform: SourcePlatform, metric: Metric) -> Result<Option<i64>> {
        let map = self.profiles.read().map_err(|_| anyhow!("store lock poisoned"))?;
        Ok(map
            .values()
            .filter(|p| p.source_platform == platform)
            .filter_map(|p| p.metrics.known(metric))
            .min())
    }

    async fn count(&self) -> Result<i64> {
        let map = self.profiles.read().map_err(|_| anyhow!("store lock poisoned"))?;
        Ok(map.len() as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Basics, Metrics};
    use crate::store::save_profile;

    fn profile(id: &str, reputation: i64) -> CanonicalProfile {
        CanonicalProfile::new(
            SourcePlatform::QnaSite,
            id,
            Basics {
                name: format!("user {}", id),
                email: format!("{}@no-email.stackoverflow.com", id),
                ..Basics::default()
            },
        )
        .with_metrics(Metrics {
            reputation_score: reputation,
            ..Metrics::default()
        })
    }

    #[tokio::test]
    async fn upsert_twice_keeps_one_document() {
        let store = MemoryProfileStore::new();
        let first = store.upsert(&profile("1", 10)).await.unwrap();
        let second = store.upsert(&profile("1", 99)).await.unwrap();
        assert!(first.inserted);
        assert!(!second.inserted);
        assert_eq!(store.count().await.unwrap(), 1);
        let stored = store.get(SourcePlatform::QnaSite, "1").unwrap();
        assert_eq!(stored.metrics.reputation_score, 10);
    }

    #[tokio::test]
    async fn same_id_on_other_platform_is_distinct() {
        let store = MemoryProfileStore::new();
        let mut other = profile("1", 10);
        other.source_platform = SourcePlatform::CodeHost;
        assert!(store.upsert(&profile("1", 10)).await.unwrap().inserted);
        assert!(store.upsert(&other).await.unwrap().inserted);
        assert_eq!(store.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn lowest_metric_ignores_sentinel() {
        let store = MemoryProfileStore::new();
        store.upsert(&profile("1", 500)).await.unwrap();
        store.upsert(&profile("2", 120)).await.unwrap();
        store.upsert(&profile("3", -1)).await.unwrap();
        let lowest = store
            .lowest_metric(SourcePlatform::QnaSite, Metric::ReputationScore)
            .await
            .unwrap();
        assert_eq!(lowest, Some(120));
        let none = store
            .lowest_metric(SourcePlatform::CodeHost, Metric::ReputationScore)
            .await
            .unwrap();
        assert_eq!(none, None);
    }

    #[tokio::test]
    async fn invalid_email_is_reported_as_not_inserted() {
        let store = MemoryProfileStore::new();
        let mut bad = profile("9", 1);
        bad.basics.email = "nobody".to_string();
        assert!(!save_profile(&store, &bad).await);
        assert_eq!(store.count().await.unwrap(), 0);
    }
}
