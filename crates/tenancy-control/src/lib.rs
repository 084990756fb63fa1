//! Tenancy Control Plane
//!
//! This crate provisions isolated per-tenant workloads on a shared
//! Kubernetes cluster. Given a tenant identifier it creates a namespace,
//! rolls out a Helm chart into it, routes `<id>.<host-suffix>` to the
//! deployed service, and reports a derived deployment status on demand.
//!
//! # Architecture
//!
//! - **Registry**: the authoritative in-memory record of tenants, guarded by
//!   a single lock that is never held across platform I/O
//! - **Tenant manager**: sequences create, get, list and delete; namespace
//!   creation is synchronous while the rollout runs as a detached task with
//!   a deadline
//! - **Platform gateway**: a trait with a Kubernetes + Helm implementation
//!   and an in-process mock; benign "already exists" and "not found"
//!   outcomes are absorbed in one classification step
//! - **API surface**: HTTP endpoints for tenant management, health and
//!   metrics
//!
//! # Deployment status
//!
//! A tenant's `deploymentStatus` is a cache of the last platform
//! observation. Single-tenant reads refresh it; listing does not.
//!
//! ```text
//! creating ──▶ running ◀──▶ stopped
//!     │           │            │
//!     └───────────┴────────────┴──▶ error
//! ```
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use tenancy_control::config::TenantConfig;
//! use tenancy_control::platform::{MockPlatform, PlatformGateway};
//! use tenancy_control::{TenantId, TenantManager, TenantRegistry};
//!
//! # async fn example() -> tenancy_control::ControlResult<()> {
//! let platform: Arc<dyn PlatformGateway> = Arc::new(MockPlatform::new());
//! let manager = TenantManager::new(
//!     Arc::new(TenantRegistry::new()),
//!     platform,
//!     TenantConfig::default(),
//! );
//!
//! let tenant = manager
//!     .create(TenantId::new("acme"), "Acme Corp".to_owned())
//!     .await?;
//! assert_eq!(tenant.namespace, "tenant-acme");
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]

pub mod api;
pub mod config;
pub mod error;
pub mod platform;
pub mod registry;
pub mod service;
pub mod tenant;
pub mod types;
pub mod validation;

// Re-export commonly used types at the crate root
pub use config::ControlConfig;
pub use error::{ControlError, ControlResult};
pub use platform::{MockPlatform, PlatformGateway};
pub use registry::TenantRegistry;
pub use service::ControlService;
pub use tenant::TenantManager;
pub use types::{DeploymentStatus, Tenant, TenantId, TenantStatus};
