//! Core tenant orchestration logic.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use crate::config::TenantConfig;
use crate::error::{ControlError, ControlResult};
use crate::platform::PlatformGateway;
use crate::registry::{Generation, TenantRegistry};
use crate::types::{DeploymentStatus, Tenant, TenantId};

/// Orchestrates tenant lifecycle operations.
///
/// Registry reads and writes are short critical sections; every platform
/// call happens outside the registry lock.
pub struct TenantManager {
    registry: Arc<TenantRegistry>,
    platform: Arc<dyn PlatformGateway>,
    config: TenantConfig,
    rollouts: TaskTracker,
    cancel: CancellationToken,
}

impl TenantManager {
    /// Create a new tenant manager.
    pub fn new(
        registry: Arc<TenantRegistry>,
        platform: Arc<dyn PlatformGateway>,
        config: TenantConfig,
    ) -> Self {
        Self {
            registry,
            platform,
            config,
            rollouts: TaskTracker::new(),
            cancel: CancellationToken::new(),
        }
    }

    /// Prefix used to derive namespace names.
    #[must_use]
    pub fn namespace_prefix(&self) -> &str {
        &self.config.namespace_prefix
    }

    /// The registry this manager maintains.
    #[must_use]
    pub fn registry(&self) -> &TenantRegistry {
        &self.registry
    }

    /// Register a tenant and start provisioning it.
    ///
    /// The namespace is created before the record becomes visible; the
    /// rollout runs detached and reports failure only through the record's
    /// `deployment_status`. The returned record is always `creating`.
    pub async fn create(&self, id: TenantId, name: String) -> ControlResult<Tenant> {
        if self.registry.contains(&id)? {
            return Err(ControlError::TenantAlreadyExists(id.to_string()));
        }

        let tenant = Tenant::new(id.clone(), name, &self.config.namespace_prefix);
        info!(tenant_id = %id, namespace = %tenant.namespace, "creating tenant");

        if let Err(e) = self.platform.create_isolation_boundary(&id).await {
            error!(tenant_id = %id, error = %e, "failed to create namespace");
            return Err(e);
        }

        // A concurrent create for the same id may have won the race while the
        // namespace call was in flight; the namespace is shared, so leave it.
        let generation = self.registry.insert(tenant.clone())?;
        self.spawn_rollout(id, generation);

        Ok(tenant)
    }

    /// Look up a tenant and refresh its deployment status.
    ///
    /// Returns `None` if no such tenant is registered. A failed readiness
    /// query is propagated and the cached status is kept.
    pub async fn get(&self, id: &TenantId) -> ControlResult<Option<Tenant>> {
        let Some((_, generation)) = self.registry.get(id)? else {
            return Ok(None);
        };

        let status = self.platform.query_readiness(id).await?;
        debug!(tenant_id = %id, %status, "refreshed deployment status");

        match self.registry.set_deployment_status(id, generation, status)? {
            Some(tenant) => Ok(Some(tenant)),
            // Deleted or re-created while the query was in flight
            None => Ok(self.registry.get(id)?.map(|(tenant, _)| tenant)),
        }
    }

    /// Snapshot of every tenant with its cached status.
    pub fn list(&self) -> ControlResult<Vec<Tenant>> {
        self.registry.list()
    }

    /// Tear down a tenant's platform resources and forget it.
    ///
    /// If either teardown step fails the tenant stays registered so the
    /// delete can be retried.
    pub async fn delete(&self, id: &TenantId) -> ControlResult<()> {
        if !self.registry.contains(id)? {
            return Err(ControlError::TenantNotFound(id.to_string()));
        }

        info!(tenant_id = %id, "deleting tenant");

        if let Err(e) = self.platform.teardown_deployment(id).await {
            error!(tenant_id = %id, error = %e, "failed to tear down deployment");
            return Err(e);
        }
        if let Err(e) = self.platform.teardown_isolation_boundary(id).await {
            error!(tenant_id = %id, error = %e, "failed to tear down namespace");
            return Err(e);
        }

        if self.registry.remove(id)?.is_none() {
            debug!(tenant_id = %id, "tenant already removed by a concurrent delete");
        }

        info!(tenant_id = %id, "tenant deleted");
        Ok(())
    }

    /// Number of rollouts still running.
    #[must_use]
    pub fn active_rollouts(&self) -> usize {
        self.rollouts.len()
    }

    /// Cancel in-flight rollouts and wait for them to stop.
    ///
    /// Cancelled rollouts leave their tenant's status untouched.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        self.rollouts.close();

        let pending = self.rollouts.len();
        if pending > 0 {
            info!(pending, "waiting for rollouts to stop");
        }
        self.rollouts.wait().await;
    }

    fn spawn_rollout(&self, id: TenantId, generation: Generation) {
        let rollout = Rollout {
            registry: Arc::clone(&self.registry),
            platform: Arc::clone(&self.platform),
            id,
            generation,
            deadline: self.config.rollout_timeout(),
        };
        let cancel = self.cancel.child_token();
        self.rollouts.spawn(rollout.run(cancel));
    }
}

/// A detached deployment of one tenant incarnation.
struct Rollout {
    registry: Arc<TenantRegistry>,
    platform: Arc<dyn PlatformGateway>,
    id: TenantId,
    generation: Generation,
    deadline: Duration,
}

impl Rollout {
    async fn run(self, cancel: CancellationToken) {
        debug!(tenant_id = %self.id, deadline = ?self.deadline, "rollout started");

        let outcome = tokio::select! {
            () = cancel.cancelled() => {
                warn!(tenant_id = %self.id, "rollout cancelled");
                return;
            }
            outcome = timeout(self.deadline, self.platform.trigger_deployment(&self.id)) => outcome,
        };

        let error = match outcome {
            Ok(Ok(())) => {
                info!(tenant_id = %self.id, "rollout complete");
                return;
            }
            Ok(Err(e)) => e,
            Err(_) => ControlError::RolloutTimeout(self.deadline),
        };

        error!(tenant_id = %self.id, error = %error, "rollout failed");

        match self
            .registry
            .set_deployment_status(&self.id, self.generation, DeploymentStatus::Error)
        {
            Ok(Some(_)) => {}
            Ok(None) => {
                debug!(tenant_id = %self.id, "tenant gone or re-created, discarding rollout result");
            }
            Err(e) => error!(tenant_id = %self.id, error = %e, "failed to record rollout failure"),
        }
    }
}
