//! Core types for tenancy-control.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Caller-supplied tenant identifier.
///
/// The id is used verbatim to derive the namespace name, the Helm release
/// name and the routing hostname.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantId(String);

impl TenantId {
    /// Create a new tenant ID.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for TenantId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Derive the namespace name for a tenant.
#[must_use]
pub fn namespace_for(prefix: &str, id: &TenantId) -> String {
    format!("{prefix}{id}")
}

/// Lifecycle state of the tenant record itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TenantStatus {
    /// Tenant is provisioned and usable.
    #[default]
    Active,
    /// Reserved for future use.
    Inactive,
    /// Reserved for future use.
    Suspended,
}

/// Workload readiness as last observed on the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeploymentStatus {
    /// Rollout in progress or partially ready.
    Creating,
    /// All desired replicas are ready.
    Running,
    /// No replicas ready.
    Stopped,
    /// Rollout failed or the workload is missing.
    Error,
}

impl DeploymentStatus {
    /// All statuses, in declaration order.
    pub const ALL: [Self; 4] = [Self::Creating, Self::Running, Self::Stopped, Self::Error];

    /// Get the status name as a static string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Creating => "creating",
            Self::Running => "running",
            Self::Stopped => "stopped",
            Self::Error => "error",
        }
    }

    /// Project replica counts onto a status.
    ///
    /// `running` requires every desired replica ready and at least one
    /// desired. Any ready replica short of that is `creating`; a workload
    /// scaled to zero is `stopped` even while old pods drain.
    #[must_use]
    pub const fn from_replicas(desired: i32, ready: i32) -> Self {
        if desired > 0 && ready == desired {
            Self::Running
        } else if desired > 0 && ready > 0 {
            Self::Creating
        } else {
            Self::Stopped
        }
    }
}

impl fmt::Display for DeploymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A tenant as held in the registry and returned to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tenant {
    /// Unique tenant identifier.
    pub id: TenantId,
    /// Display label.
    pub name: String,
    /// Namespace holding the tenant's workloads.
    pub namespace: String,
    /// When the tenant was registered.
    pub created_at: DateTime<Utc>,
    /// Record lifecycle state.
    pub status: TenantStatus,
    /// Cached workload readiness; refreshed on single-tenant reads.
    pub deployment_status: DeploymentStatus,
}

impl Tenant {
    /// Create a freshly provisioned tenant record.
    #[must_use]
    pub fn new(id: TenantId, name: impl Into<String>, namespace_prefix: &str) -> Self {
        let namespace = namespace_for(namespace_prefix, &id);
        Self {
            id,
            name: name.into(),
            namespace,
            created_at: Utc::now(),
            status: TenantStatus::Active,
            deployment_status: DeploymentStatus::Creating,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn readiness_projection() {
        assert_eq!(DeploymentStatus::from_replicas(1, 1), DeploymentStatus::Running);
        assert_eq!(DeploymentStatus::from_replicas(3, 3), DeploymentStatus::Running);
        assert_eq!(DeploymentStatus::from_replicas(3, 1), DeploymentStatus::Creating);
        assert_eq!(DeploymentStatus::from_replicas(1, 0), DeploymentStatus::Stopped);
        assert_eq!(DeploymentStatus::from_replicas(2, 3), DeploymentStatus::Creating);
    }

    #[test]
    fn never_running_with_zero_desired() {
        for ready in 0..4 {
            assert_ne!(
                DeploymentStatus::from_replicas(0, ready),
                DeploymentStatus::Running
            );
        }
        assert_eq!(DeploymentStatus::from_replicas(0, 0), DeploymentStatus::Stopped);
    }

    #[test]
    fn new_tenant_derives_namespace() {
        let tenant = Tenant::new(TenantId::new("acme"), "Acme Corp", "tenant-");
        assert_eq!(tenant.namespace, "tenant-acme");
        assert_eq!(tenant.namespace, namespace_for("tenant-", &tenant.id));
        assert_eq!(tenant.status, TenantStatus::Active);
        assert_eq!(tenant.deployment_status, DeploymentStatus::Creating);
    }

    #[test]
    fn tenant_json_projection() {
        let tenant = Tenant::new(TenantId::new("acme"), "Acme Corp", "tenant-");
        let json = serde_json::to_value(&tenant).unwrap();

        assert_eq!(json["id"], "acme");
        assert_eq!(json["name"], "Acme Corp");
        assert_eq!(json["namespace"], "tenant-acme");
        assert_eq!(json["status"], "active");
        assert_eq!(json["deploymentStatus"], "creating");
        let created_at = json["createdAt"].as_str().unwrap();
        assert!(DateTime::parse_from_rfc3339(created_at).is_ok());
    }
}
