//! Tenant identifier validation.
//!
//! Runs at the API boundary, before the orchestrator or the platform can be
//! reached. Reserved names are checked first so that `API` is reported as
//! forbidden rather than malformed.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::{ControlError, ControlResult};

/// Identifiers that collide with administrative or well-known hostnames.
pub const RESERVED_TENANT_IDS: &[&str] = &[
    "api",
    "admin",
    "system",
    "root",
    "localhost",
    "www",
    "mail",
    "ftp",
    "test",
];

/// Kubernetes limit for namespace names (DNS-1123 label).
pub const MAX_NAMESPACE_LENGTH: usize = 63;

/// DNS-1123 label pattern.
static TENANT_ID_PATTERN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9]([-a-z0-9]*[a-z0-9])?$").ok());

/// Check whether an id matches a reserved name, ignoring case.
#[must_use]
pub fn is_reserved(id: &str) -> bool {
    RESERVED_TENANT_IDS
        .iter()
        .any(|reserved| reserved.eq_ignore_ascii_case(id))
}

/// Validate a tenant id for use with the given namespace prefix.
pub fn validate_tenant_id(id: &str, namespace_prefix: &str) -> ControlResult<()> {
    if is_reserved(id) {
        return Err(ControlError::ForbiddenTenantId { id: id.to_owned() });
    }

    let invalid = |reason: &str| ControlError::InvalidTenantId {
        id: id.to_owned(),
        reason: reason.to_owned(),
    };

    if id.is_empty() {
        return Err(invalid("tenant id cannot be empty"));
    }

    let max_len = MAX_NAMESPACE_LENGTH.saturating_sub(namespace_prefix.len());
    if id.len() > max_len {
        return Err(invalid(&format!(
            "tenant id exceeds maximum length of {max_len} characters"
        )));
    }

    let Some(pattern) = TENANT_ID_PATTERN.as_ref() else {
        return Err(invalid("tenant id validation unavailable"));
    };

    if !pattern.is_match(id) {
        return Err(invalid(
            "must consist of lowercase alphanumerics or '-', and start and end with an alphanumeric",
        ));
    }

    Ok(())
}

/// Validate a tenant display name.
pub fn validate_tenant_name(name: &str) -> ControlResult<()> {
    if name.trim().is_empty() {
        return Err(ControlError::InvalidTenantName(
            "tenant name cannot be empty".to_owned(),
        ));
    }
    Ok(())
}
