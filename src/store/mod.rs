//! Persistence boundary for canonical profiles.
//!
//! [`ProfileStore`] is the only write path adapters see. Implementations
//! must be `Send + Sync`; the SQLite store backs real runs and
//! [`memory::MemoryProfileStore`] backs tests.
//!
//! Identity is `(source_platform, source_id)`. Email is never used for
//! deduplication.

pub mod memory;
pub mod sqlite;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{CanonicalProfile, Metric, SourcePlatform};

/// Result of [`ProfileStore::upsert`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpsertOutcome {
    pub inserted: bool,
}

#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Whether a profile with this identity is already stored.
    async fn exists(&self, platform: SourcePlatform, source_id: &str) -> Result<bool>;

    /// Insert or fully overwrite the profile under its identity key.
    async fn replace(&self, profile: &CanonicalProfile) -> Result<()>;

    /// Smallest known (non-sentinel) value of `metric` stored for `platform`.
    async fn lowest_metric(&self, platform: SourcePlatform, metric: Metric) -> Result<Option<i64>>;

    /// Number of stored profiles.
    async fn count(&self) -> Result<i64>;

    /// Check-then-act insert. An existing identity is left untouched and
    /// reported as `inserted: false`.
    ///
    /// A concurrent writer can slip in between the check and the write;
    /// the uniqueness constraint on the key keeps that to a harmless
    /// overwrite of the same identity.
    async fn upsert(&self, profile: &CanonicalProfile) -> Result<UpsertOutcome> {
        if self
            .exists(profile.source_platform, &profile.source_id)
            .await?
        {
            return Ok(UpsertOutcome { inserted: false });
        }
        self.replace(profile).await?;
        Ok(UpsertOutcome { inserted: true })
    }
}

/// Upsert `profile`, turning any persistence error into "not inserted".
pub async fn save_profile(store: &dyn ProfileStore, profile: &CanonicalProfile) -> bool {
    match store.upsert(profile).await {
        Ok(outcome) => {
            if outcome.inserted {
                tracing::info!(
                    platform = %profile.source_platform,
                    source_id = %profile.source_id,
                    name = %profile.basics.name,
                    "saved new profile"
                );
            } else {
                tracing::debug!(
                    platform = %profile.source_platform,
                    source_id = %profile.source_id,
                    "duplicate, skipped"
                );
            }
            outcome.inserted
        }
        Err(e) => {
            tracing::error!(
                platform = %profile.source_platform,
                source_id = %profile.source_id,
                error = %e,
                "failed to save profile"
            );
            false
        }
    }
}
