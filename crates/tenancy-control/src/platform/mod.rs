//! Platform gateway for tenant workloads.
//!
//! This module translates lifecycle intents into calls against the
//! container platform. Gateways own no tenant state: every call is
//! self-contained, treats "already exists" and "already gone" as success,
//! and normalises platform readiness into [`DeploymentStatus`].

pub mod classify;
mod helm;
mod kubernetes;
mod mock;

pub use helm::{HelmClient, HelmFailure, HelmRelease};
pub use kubernetes::{
    ingress_manifest, select_endpoint, KubernetesGateway, ServiceEndpoint, TENANT_LABEL,
};
pub use mock::{FailPoint, MockPlatform, PlatformCall};

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::config::{PlatformConfig, PlatformType};
use crate::error::ControlResult;
use crate::types::{DeploymentStatus, TenantId};

/// Lifecycle operations a platform must support for tenants.
#[async_trait]
pub trait PlatformGateway: Send + Sync {
    /// Create the tenant's namespace, labelled with its identity.
    ///
    /// An existing namespace is success.
    async fn create_isolation_boundary(&self, tenant_id: &TenantId) -> ControlResult<()>;

    /// Roll out the tenant application and route its hostname to it.
    ///
    /// May take minutes; an existing installation is success.
    async fn trigger_deployment(&self, tenant_id: &TenantId) -> ControlResult<()>;

    /// Report current workload readiness.
    ///
    /// A missing workload is reported as [`DeploymentStatus::Error`]; only
    /// transport-level failures are returned as errors.
    async fn query_readiness(&self, tenant_id: &TenantId) -> ControlResult<DeploymentStatus>;

    /// Remove the tenant application and its routing rule.
    ///
    /// A missing installation is success.
    async fn teardown_deployment(&self, tenant_id: &TenantId) -> ControlResult<()>;

    /// Delete the tenant's namespace and everything left inside it.
    ///
    /// A missing namespace is success.
    async fn teardown_isolation_boundary(&self, tenant_id: &TenantId) -> ControlResult<()>;
}

/// Create a platform gateway from configuration.
pub async fn create_platform(
    config: &PlatformConfig,
    namespace_prefix: &str,
) -> ControlResult<Arc<dyn PlatformGateway>> {
    match config.platform_type {
        PlatformType::Kubernetes => {
            let gateway = KubernetesGateway::connect(config, namespace_prefix).await?;
            Ok(Arc::new(gateway))
        }
        PlatformType::Mock => {
            info!("using in-process mock platform");
            Ok(Arc::new(MockPlatform::new()))
        }
    }
}
