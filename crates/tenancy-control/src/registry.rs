//! In-memory tenant registry.
//!
//! The registry is the authoritative record of which tenants exist. It holds
//! its own lock and never performs I/O while holding it; callers read a
//! snapshot, talk to the platform, then come back to apply the result.
//!
//! Every insertion receives a generation number. Background work that
//! captured a generation can only update the record it started from, so a
//! rollout launched for a tenant that was since deleted and re-created
//! cannot touch the new record.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use indexmap::IndexMap;

use crate::error::{ControlError, ControlResult};
use crate::types::{DeploymentStatus, Tenant, TenantId};

/// Identifies one incarnation of a tenant record.
pub type Generation = u64;

#[derive(Debug, Clone)]
struct Entry {
    tenant: Tenant,
    generation: Generation,
}

/// Insertion-ordered tenant registry guarded by a single lock.
#[derive(Debug, Default)]
pub struct TenantRegistry {
    tenants: RwLock<IndexMap<TenantId, Entry>>,
    next_generation: AtomicU64,
}

impl TenantRegistry {
    /// Create a new empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a tenant if its id is not already registered.
    ///
    /// Returns the generation assigned to the new record.
    pub fn insert(&self, tenant: Tenant) -> ControlResult<Generation> {
        let mut tenants = self
            .tenants
            .write()
            .map_err(|_| ControlError::internal("lock poisoned"))?;

        if tenants.contains_key(&tenant.id) {
            return Err(ControlError::TenantAlreadyExists(tenant.id.to_string()));
        }

        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        tenants.insert(tenant.id.clone(), Entry { tenant, generation });
        Ok(generation)
    }

    /// Check whether a tenant is registered.
    pub fn contains(&self, id: &TenantId) -> ControlResult<bool> {
        let tenants = self
            .tenants
            .read()
            .map_err(|_| ControlError::internal("lock poisoned"))?;

        Ok(tenants.contains_key(id))
    }

    /// Get a snapshot of a tenant and its generation.
    pub fn get(&self, id: &TenantId) -> ControlResult<Option<(Tenant, Generation)>> {
        let tenants = self
            .tenants
            .read()
            .map_err(|_| ControlError::internal("lock poisoned"))?;

        Ok(tenants
            .get(id)
            .map(|entry| (entry.tenant.clone(), entry.generation)))
    }

    /// Snapshot of every tenant in insertion order.
    pub fn list(&self) -> ControlResult<Vec<Tenant>> {
        let tenants = self
            .tenants
            .read()
            .map_err(|_| ControlError::internal("lock poisoned"))?;

        Ok(tenants.values().map(|entry| entry.tenant.clone()).collect())
    }

    /// Overwrite the cached deployment status of one incarnation.
    ///
    /// Returns the updated record, or `None` if the tenant is gone or has
    /// been re-created under a newer generation.
    pub fn set_deployment_status(
        &self,
        id: &TenantId,
        generation: Generation,
        status: DeploymentStatus,
    ) -> ControlResult<Option<Tenant>> {
        let mut tenants = self
            .tenants
            .write()
            .map_err(|_| ControlError::internal("lock poisoned"))?;

        match tenants.get_mut(id) {
            Some(entry) if entry.generation == generation => {
                entry.tenant.deployment_status = status;
                Ok(Some(entry.tenant.clone()))
            }
            _ => Ok(None),
        }
    }

    /// Remove a tenant, keeping the order of the remaining entries.
    ///
    /// Returns the removed record, if any.
    pub fn remove(&self, id: &TenantId) -> ControlResult<Option<Tenant>> {
        let mut tenants = self
            .tenants
            .write()
            .map_err(|_| ControlError::internal("lock poisoned"))?;

        Ok(tenants.shift_remove(id).map(|entry| entry.tenant))
    }

    /// Count tenants by cached deployment status from one snapshot.
    ///
    /// Every status appears, in [`DeploymentStatus::ALL`] order.
    pub fn counts_by_status(&self) -> ControlResult<Vec<(DeploymentStatus, usize)>> {
        let tenants = self
            .tenants
            .read()
            .map_err(|_| ControlError::internal("lock poisoned"))?;

        Ok(DeploymentStatus::ALL
            .into_iter()
            .map(|status| {
                let count = tenants
                    .values()
                    .filter(|entry| entry.tenant.deployment_status == status)
                    .count();
                (status, count)
            })
            .collect())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn tenant(id: &str) -> Tenant {
        Tenant::new(TenantId::new(id), format!("{id} corp"), "tenant-")
    }

    #[test]
    fn insert_rejects_duplicates() {
        let registry = TenantRegistry::new();
        registry.insert(tenant("acme")).unwrap();

        let err = registry.insert(tenant("acme")).unwrap_err();
        assert!(matches!(err, ControlError::TenantAlreadyExists(ref id) if id == "acme"));
        assert_eq!(registry.list().unwrap().len(), 1);
    }

    #[test]
    fn list_preserves_insertion_order_across_removal() {
        let registry = TenantRegistry::new();
        for id in ["zeta", "alpha", "mid", "beta"] {
            registry.insert(tenant(id)).unwrap();
        }
        registry.remove(&TenantId::new("mid")).unwrap();

        let ids: Vec<_> = registry
            .list()
            .unwrap()
            .into_iter()
            .map(|t| t.id.to_string())
            .collect();
        assert_eq!(ids, ["zeta", "alpha", "beta"]);
    }

    #[test]
    fn status_update_is_bound_to_generation() {
        let registry = TenantRegistry::new();
        let id = TenantId::new("acme");

        let old = registry.insert(tenant("acme")).unwrap();
        registry.remove(&id).unwrap();
        let new = registry.insert(tenant("acme")).unwrap();
        assert_ne!(old, new);

        let stale = registry
            .set_deployment_status(&id, old, DeploymentStatus::Error)
            .unwrap();
        assert!(stale.is_none());

        let (current, _) = registry.get(&id).unwrap().unwrap();
        assert_eq!(current.deployment_status, DeploymentStatus::Creating);

        let updated = registry
            .set_deployment_status(&id, new, DeploymentStatus::Running)
            .unwrap()
            .unwrap();
        assert_eq!(updated.deployment_status, DeploymentStatus::Running);
    }

    #[test]
    fn counts_by_status_in_display_order() {
        let registry = TenantRegistry::new();
        let generation = registry.insert(tenant("a")).unwrap();
        registry.insert(tenant("b")).unwrap();
        registry
            .set_deployment_status(&TenantId::new("a"), generation, DeploymentStatus::Running)
            .unwrap();

        assert_eq!(
            registry.counts_by_status().unwrap(),
            [
                (DeploymentStatus::Creating, 1),
                (DeploymentStatus::Running, 1),
                (DeploymentStatus::Stopped, 0),
                (DeploymentStatus::Error, 0),
            ]
        );
    }

    #[test]
    fn remove_missing_is_none() {
        let registry = TenantRegistry::new();
        assert!(registry.remove(&TenantId::new("ghost")).unwrap().is_none());
        assert!(!registry.contains(&TenantId::new("ghost")).unwrap());
    }
}
