//! In-process platform for tests and local runs.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{ControlError, ControlResult};
use crate::types::{DeploymentStatus, TenantId};

use super::PlatformGateway;

/// A gateway operation, as recorded by [`MockPlatform`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlatformCall {
    /// `create_isolation_boundary`
    CreateBoundary(String),
    /// `trigger_deployment`
    TriggerDeployment(String),
    /// `query_readiness`
    QueryReadiness(String),
    /// `teardown_deployment`
    TeardownDeployment(String),
    /// `teardown_isolation_boundary`
    TeardownBoundary(String),
}

/// Operation that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailPoint {
    /// Fail namespace creation.
    CreateBoundary,
    /// Fail the rollout.
    TriggerDeployment,
    /// Fail readiness queries at the transport level.
    QueryReadiness,
    /// Fail workload teardown.
    TeardownDeployment,
    /// Fail namespace teardown.
    TeardownBoundary,
}

#[derive(Debug, Clone, Copy)]
struct Replicas {
    desired: i32,
    ready: i32,
}

#[derive(Debug, Default)]
struct MockState {
    boundaries: HashSet<String>,
    workloads: HashMap<String, Replicas>,
    failures: HashSet<FailPoint>,
    calls: Vec<PlatformCall>,
}

/// Platform that keeps namespaces and workloads in memory.
///
/// A rollout registers a one-replica workload with nothing ready, waits for
/// the configured rollout delay, then marks the replica ready.
#[derive(Debug, Default)]
pub struct MockPlatform {
    state: Mutex<MockState>,
    rollout_delay: Duration,
}

impl MockPlatform {
    /// Create a mock platform whose rollouts complete immediately.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every rollout take `delay` before its replica becomes ready.
    #[must_use]
    pub fn with_rollout_delay(mut self, delay: Duration) -> Self {
        self.rollout_delay = delay;
        self
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut MockState) -> R) -> ControlResult<R> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| ControlError::internal("lock poisoned"))?;
        Ok(f(&mut state))
    }

    fn enter(&self, call: PlatformCall, point: FailPoint) -> ControlResult<()> {
        let fail = self.with_state(|state| {
            state.calls.push(call);
            state.failures.contains(&point)
        })?;
        if fail {
            return Err(ControlError::platform(format!("injected {point:?} failure")));
        }
        Ok(())
    }

    /// Make an operation fail until [`MockPlatform::recover`] is called.
    pub fn fail(&self, point: FailPoint) -> ControlResult<()> {
        self.with_state(|state| {
            state.failures.insert(point);
        })
    }

    /// Stop failing an operation.
    pub fn recover(&self, point: FailPoint) -> ControlResult<()> {
        self.with_state(|state| {
            state.failures.remove(&point);
        })
    }

    /// Overwrite the replica counts of a tenant's workload.
    pub fn set_replicas(&self, tenant_id: &str, desired: i32, ready: i32) -> ControlResult<()> {
        self.with_state(|state| {
            state
                .workloads
                .insert(tenant_id.to_owned(), Replicas { desired, ready });
        })
    }

    /// Delete a tenant's workload behind the orchestrator's back.
    pub fn remove_workload(&self, tenant_id: &str) -> ControlResult<()> {
        self.with_state(|state| {
            state.workloads.remove(tenant_id);
        })
    }

    /// Whether the tenant's namespace exists.
    pub fn has_boundary(&self, tenant_id: &str) -> ControlResult<bool> {
        self.with_state(|state| state.boundaries.contains(tenant_id))
    }

    /// Whether the tenant's workload exists.
    pub fn has_workload(&self, tenant_id: &str) -> ControlResult<bool> {
        self.with_state(|state| state.workloads.contains_key(tenant_id))
    }

    /// Every call received so far, in order.
    pub fn calls(&self) -> ControlResult<Vec<PlatformCall>> {
        self.with_state(|state| state.calls.clone())
    }
}

#[async_trait]
impl PlatformGateway for MockPlatform {
    async fn create_isolation_boundary(&self, tenant_id: &TenantId) -> ControlResult<()> {
        let id = tenant_id.to_string();
        self.enter(PlatformCall::CreateBoundary(id.clone()), FailPoint::CreateBoundary)?;
        self.with_state(|state| {
            state.boundaries.insert(id);
        })
    }

    async fn trigger_deployment(&self, tenant_id: &TenantId) -> ControlResult<()> {
        let id = tenant_id.to_string();
        self.enter(
            PlatformCall::TriggerDeployment(id.clone()),
            FailPoint::TriggerDeployment,
        )?;

        let has_boundary = self.with_state(|state| {
            let has_boundary = state.boundaries.contains(&id);
            if has_boundary {
                state
                    .workloads
                    .entry(id.clone())
                    .or_insert(Replicas { desired: 1, ready: 0 });
            }
            has_boundary
        })?;
        if !has_boundary {
            return Err(ControlError::platform(format!("namespace missing for {id}")));
        }

        if !self.rollout_delay.is_zero() {
            tokio::time::sleep(self.rollout_delay).await;
        }

        self.with_state(|state| {
            if let Some(replicas) = state.workloads.get_mut(&id) {
                replicas.ready = replicas.desired;
            }
        })
    }

    async fn query_readiness(&self, tenant_id: &TenantId) -> ControlResult<DeploymentStatus> {
        let id = tenant_id.to_string();
        self.enter(PlatformCall::QueryReadiness(id.clone()), FailPoint::QueryReadiness)?;
        self.with_state(|state| {
            state.workloads.get(&id).map_or(DeploymentStatus::Error, |r| {
                DeploymentStatus::from_replicas(r.desired, r.ready)
            })
        })
    }

    async fn teardown_deployment(&self, tenant_id: &TenantId) -> ControlResult<()> {
        let id = tenant_id.to_string();
        self.enter(
            PlatformCall::TeardownDeployment(id.clone()),
            FailPoint::TeardownDeployment,
        )?;
        self.with_state(|state| {
            state.workloads.remove(&id);
        })
    }

    async fn teardown_isolation_boundary(&self, tenant_id: &TenantId) -> ControlResult<()> {
        let id = tenant_id.to_string();
        self.enter(PlatformCall::TeardownBoundary(id.clone()), FailPoint::TeardownBoundary)?;
        self.with_state(|state| {
            state.boundaries.remove(&id);
            state.workloads.remove(&id);
        })
    }
}
