//! Permission catalog: cached lookup and deterministic best-match selection

use crate::cache::TtlCache;
use crate::config::CacheConfig;
use crate::domain::{CreatePermissionInput, Permission};
use crate::error::{EngineError, Result};
use crate::repository::PermissionRepository;
use std::cmp::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

/// Read path over the permission store with a TTL'd snapshot cache.
///
/// The catalog snapshot is the unit of caching: matching is cheap once the
/// active set is in memory, and a single invalidation point keeps writes
/// simple.
pub struct PermissionCatalog<R: PermissionRepository> {
    repo: Arc<R>,
    snapshot_cache: TtlCache<(), Arc<Vec<Permission>>>,
}

impl<R: PermissionRepository> PermissionCatalog<R> {
    pub fn new(repo: Arc<R>, config: &CacheConfig) -> Self {
        Self {
            repo,
            snapshot_cache: TtlCache::new(
                "catalog",
                config.capacity,
                Duration::from_secs(config.catalog_ttl_secs),
            ),
        }
    }

    pub async fn create(&self, input: &CreatePermissionInput) -> Result<Permission> {
        let permission = self.repo.create(input).await?;
        self.snapshot_cache.clear();
        debug!(permission_id = %permission.id, code = %permission.code(), "permission created");
        Ok(permission)
    }

    pub async fn deactivate(&self, id: Uuid) -> Result<()> {
        self.repo.deactivate(id).await?;
        self.snapshot_cache.clear();
        Ok(())
    }

    pub async fn reparent(&self, id: Uuid, new_parent: Option<Uuid>) -> Result<Permission> {
        let permission = self.repo.reparent(id, new_parent).await?;
        self.snapshot_cache.clear();
        Ok(permission)
    }

    pub async fn resolve(&self, id: Uuid) -> Result<Permission> {
        self.repo
            .find_by_id(id)
            .await?
            .ok_or(EngineError::PermissionNotFound(id))
    }

    /// The active catalog, served from cache within the TTL.
    pub async fn snapshot(&self) -> Result<Arc<Vec<Permission>>> {
        if let Some(cached) = self.snapshot_cache.get(&()) {
            return Ok(cached);
        }
        let snapshot = Arc::new(self.repo.list_active().await?);
        self.snapshot_cache.insert((), snapshot.clone());
        Ok(snapshot)
    }

    /// Expand a pattern into the concrete permissions it covers.
    /// `InvalidPattern` if the pattern does not compile.
    pub async fn expand(&self, pattern: &str) -> Result<Vec<Permission>> {
        let compiled = crate::domain::WildcardPattern::parse(pattern)?;
        let snapshot = self.snapshot().await?;
        Ok(snapshot
            .iter()
            .filter(|p| !p.is_wildcard && compiled.matches(&p.resource, &p.action))
            .cloned()
            .collect())
    }

    /// Every active permission covering `(resource, action)`, concrete or via
    /// wildcard.
    pub async fn matching(&self, resource: &str, action: &str) -> Result<Vec<Permission>> {
        let snapshot = self.snapshot().await?;
        Ok(snapshot
            .iter()
            .filter(|p| p.matches_request(resource, action))
            .cloned()
            .collect())
    }

    /// The single winning permission for `(resource, action)`.
    ///
    /// Ordering is total, so repeated calls over an unchanged catalog always
    /// return the same winner: higher priority first, then concrete over
    /// wildcard, then deeper hierarchy level, then earliest created.
    pub async fn best_match(&self, resource: &str, action: &str) -> Result<Option<Permission>> {
        let mut candidates = self.matching(resource, action).await?;
        candidates.sort_by(compare_specificity);
        Ok(candidates.into_iter().next())
    }

    pub fn invalidate(&self) {
        self.snapshot_cache.clear();
    }
}

fn compare_specificity(a: &Permission, b: &Permission) -> Ordering {
    b.priority
        .cmp(&a.priority)
        .then_with(|| a.is_wildcard.cmp(&b.is_wildcard))
        .then_with(|| b.level.cmp(&a.level))
        .then_with(|| a.created_seq.cmp(&b.created_seq))
}
