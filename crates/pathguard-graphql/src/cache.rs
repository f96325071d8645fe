//! Request-scoped path/action cache.
//!
//! The cache records which rule keys are known to have at least one policy
//! rule. It is built from the policy engine's rule set on the first field
//! access of a request and then only grows, when inline declarations register
//! new rules. A cache is never shared between requests, so rules added or
//! removed in the engine between requests are always picked up.
//!
//! # Example
//!
//! ```ignore
//! use pathguard_graphql::cache::CacheSlot;
//!
//! let slot = CacheSlot::new();
//! let cache = slot.ensure(engine.as_ref()).await?; // scans the engine
//! let again = slot.ensure(engine.as_ref()).await?; // no scan
//! assert!(cache.contains(&key).await);
//! ```

use std::collections::HashSet;

use pathguard_policy::{PolicyEngine, PolicyResult};
use tokio::sync::{OnceCell, RwLock};
use tracing::debug;

use crate::key::RuleKey;

/// Set of rule keys with a known policy rule.
#[derive(Debug, Default)]
pub struct PathCache {
    keys: RwLock<HashSet<RuleKey>>,
}

impl PathCache {
    /// Creates a cache holding `keys`.
    #[must_use]
    pub fn from_keys(keys: impl IntoIterator<Item = RuleKey>) -> Self {
        Self {
            keys: RwLock::new(keys.into_iter().collect()),
        }
    }

    /// Builds a cache from every rule the engine currently knows.
    ///
    /// # Errors
    ///
    /// Returns the engine's error if its rules cannot be listed.
    pub async fn build(engine: &dyn PolicyEngine) -> PolicyResult<Self> {
        let rules = engine.get_policy().await?;
        let keys: HashSet<RuleKey> = rules.iter().map(RuleKey::from_rule).collect();

        debug!(
            rules = rules.len(),
            keys = keys.len(),
            "Built path cache from policy engine"
        );

        Ok(Self {
            keys: RwLock::new(keys),
        })
    }

    /// Returns whether `key` has a known rule.
    pub async fn contains(&self, key: &RuleKey) -> bool {
        self.keys.read().await.contains(key)
    }

    /// Records that `key` now has a rule.
    ///
    /// Returns `false` if the key was already present.
    pub async fn record(&self, key: RuleKey) -> bool {
        self.keys.write().await.insert(key)
    }

    /// Returns the number of distinct keys.
    pub async fn len(&self) -> usize {
        self.keys.read().await.len()
    }

    /// Returns whether the cache holds no keys.
    pub async fn is_empty(&self) -> bool {
        self.keys.read().await.is_empty()
    }
}

/// Lazily built cache slot of one request.
///
/// Concurrent callers of [`CacheSlot::ensure`] share a single build: the first
/// one scans the engine, the rest wait for it. A failed build leaves the slot
/// empty so a later field of the same request can try again.
#[derive(Debug, Default)]
pub struct CacheSlot {
    cell: OnceCell<PathCache>,
}

impl CacheSlot {
    /// Creates an empty slot.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the request's cache, building it on first use.
    ///
    /// # Errors
    ///
    /// Returns the engine's error if the build scan fails.
    pub async fn ensure(&self, engine: &dyn PolicyEngine) -> PolicyResult<&PathCache> {
        self.cell.get_or_try_init(|| PathCache::build(engine)).await
    }

    /// Returns the cache if it has been built.
    #[must_use]
    pub fn get(&self) -> Option<&PathCache> {
        self.cell.get()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use pathguard_policy::{MemoryPolicyEngine, PolicyError, PolicyRule};

    use super::*;

    /// Engine wrapper counting `get_policy` scans.
    struct ScanCounting {
        inner: MemoryPolicyEngine,
        scans: AtomicUsize,
        fail: bool,
    }

    impl ScanCounting {
        fn new(policy: &str) -> Self {
            Self {
                inner: MemoryPolicyEngine::from_csv(policy).unwrap(),
                scans: AtomicUsize::new(0),
                fail: false,
            }
        }
    }

    #[async_trait]
    impl PolicyEngine for ScanCounting {
        async fn enforce(&self, role: &str, resource: &str, action: &str) -> PolicyResult<bool> {
            self.inner.enforce(role, resource, action).await
        }

        async fn get_policy(&self) -> PolicyResult<Vec<PolicyRule>> {
            self.scans.fetch_add(1, Ordering::SeqCst);
            // Let concurrent callers pile up behind the first scan.
            tokio::task::yield_now().await;
            if self.fail {
                return Err(PolicyError::backend("scan failed"));
            }
            self.inner.get_policy().await
        }

        async fn add_policy(&self, rule: PolicyRule) -> PolicyResult<bool> {
            self.inner.add_policy(rule).await
        }
    }

    #[tokio::test]
    async fn test_build_collects_unique_keys() {
        // Same resource and action for two subjects -> one key.
        let engine = ScanCounting::new(
            "p, user, project.id, query\np, admin, project.id, query\np, admin, project.id, mutation",
        );

        let cache = PathCache::build(&engine).await.unwrap();

        assert_eq!(cache.len().await, 2);
        assert!(cache.contains(&RuleKey::encode("project.id", "query")).await);
        assert!(cache.contains(&RuleKey::encode("project.id", "mutation")).await);
        assert!(!cache.contains(&RuleKey::encode("project.name", "query")).await);
    }

    #[tokio::test]
    async fn test_record_deduplicates() {
        let cache = PathCache::default();
        assert!(cache.is_empty().await);

        assert!(cache.record(RuleKey::encode("a", "query")).await);
        assert!(!cache.record(RuleKey::encode("a", "query")).await);
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn test_ensure_scans_once() {
        let engine = ScanCounting::new("p, user, project.id, query");
        let slot = CacheSlot::new();
        assert!(slot.get().is_none());

        slot.ensure(&engine).await.unwrap();
        slot.ensure(&engine).await.unwrap();

        assert_eq!(engine.scans.load(Ordering::SeqCst), 1);
        assert!(slot.get().is_some());
    }

    #[tokio::test]
    async fn test_concurrent_ensure_scans_once() {
        let engine = ScanCounting::new("p, user, project.id, query");
        let slot = CacheSlot::new();

        let (a, b, c) = tokio::join!(
            slot.ensure(&engine),
            slot.ensure(&engine),
            slot.ensure(&engine)
        );
        assert!(a.is_ok() && b.is_ok() && c.is_ok());

        assert_eq!(engine.scans.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_build_is_not_memoized() {
        let mut engine = ScanCounting::new("p, user, project.id, query");
        engine.fail = true;
        let slot = CacheSlot::new();

        let err = slot.ensure(&engine).await.unwrap_err();
        assert_eq!(err.to_string(), "Policy backend error: scan failed");
        assert!(slot.get().is_none());

        engine.fail = false;
        slot.ensure(&engine).await.unwrap();
        assert_eq!(engine.scans.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_records_survive_in_slot() {
        let engine = ScanCounting::new("");
        let slot = CacheSlot::new();

        let cache = slot.ensure(&engine).await.unwrap();
        cache.record(RuleKey::encode("userById.id", "query")).await;

        let cache = slot.ensure(&engine).await.unwrap();
        assert!(cache.contains(&RuleKey::encode("userById.id", "query")).await);
    }
}
