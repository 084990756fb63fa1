//! Tenant lifecycle orchestration.
//!
//! This module sequences the create, read, list and delete protocol over the
//! registry and the platform gateway, and owns the detached rollouts that
//! creation launches.

mod manager;

pub use manager::TenantManager;
