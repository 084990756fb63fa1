//! Error types for tenancy-control.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use serde::Serialize;
use tracing::error;

use crate::platform::HelmFailure;
use crate::validation::RESERVED_TENANT_IDS;

/// Result type alias using [`ControlError`].
pub type ControlResult<T> = Result<T, ControlError>;

/// Errors that can occur in the control plane.
#[derive(Debug, thiserror::Error)]
pub enum ControlError {
    /// Tenant id collides with a reserved name.
    #[error("tenant id {id:?} is reserved")]
    ForbiddenTenantId {
        /// The rejected id, as supplied.
        id: String,
    },

    /// Tenant id cannot be used to derive a namespace or hostname.
    #[error("invalid tenant id {id:?}: {reason}")]
    InvalidTenantId {
        /// The rejected id, as supplied.
        id: String,
        /// Why it was rejected.
        reason: String,
    },

    /// Tenant display name is unusable.
    #[error("invalid tenant name: {0}")]
    InvalidTenantName(String),

    /// Request body could not be parsed.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// A tenant with this id is already registered.
    #[error("tenant already exists: {0}")]
    TenantAlreadyExists(String),

    /// No tenant with this id is registered.
    #[error("tenant not found: {0}")]
    TenantNotFound(String),

    /// Kubernetes API error.
    #[error("kubernetes error: {0}")]
    Kube(#[from] kube::Error),

    /// Helm invocation error.
    #[error("helm error: {0}")]
    Helm(#[from] HelmFailure),

    /// Any other platform failure.
    #[error("platform error: {0}")]
    Platform(String),

    /// A detached rollout outlived its deadline.
    #[error("rollout timed out after {0:?}")]
    RolloutTimeout(std::time::Duration),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Serialisation error.
    #[error("serialisation error: {0}")]
    Serialisation(String),

    /// Internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ControlError {
    /// Create a platform error.
    #[must_use]
    pub fn platform(msg: impl Into<String>) -> Self {
        Self::Platform(msg.into())
    }

    /// Create an internal error.
    #[must_use]
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Stable machine-readable error kind.
    #[must_use]
    pub const fn error_type(&self) -> &'static str {
        match self {
            Self::ForbiddenTenantId { .. } => "forbidden_tenant_id",
            Self::InvalidTenantId { .. } => "invalid_tenant_id",
            Self::InvalidTenantName(_) => "invalid_tenant_name",
            Self::InvalidRequest(_) => "invalid_request",
            Self::TenantAlreadyExists(_) => "tenant_already_exists",
            Self::TenantNotFound(_) => "tenant_not_found",
            Self::Kube(_) => "kubernetes_error",
            Self::Helm(_) => "helm_error",
            Self::Platform(_) => "platform_error",
            Self::RolloutTimeout(_) => "rollout_timeout",
            Self::Config(_) => "config_error",
            Self::Serialisation(_) => "serialisation_error",
            Self::Internal(_) => "internal_error",
        }
    }

    /// HTTP status reported to API callers.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::ForbiddenTenantId { .. }
            | Self::InvalidTenantId { .. }
            | Self::InvalidTenantName(_)
            | Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::TenantAlreadyExists(_) => StatusCode::CONFLICT,
            Self::TenantNotFound(_) => StatusCode::NOT_FOUND,
            Self::Kube(_)
            | Self::Helm(_)
            | Self::Platform(_)
            | Self::RolloutTimeout(_)
            | Self::Config(_)
            | Self::Serialisation(_)
            | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to show to API callers.
    #[must_use]
    pub fn public_message(&self) -> String {
        match self {
            Self::ForbiddenTenantId { id } => format!(
                "Tenant ID \"{id}\" is forbidden. Reserved tenant names: {}",
                RESERVED_TENANT_IDS.join(", ")
            ),
            Self::InvalidTenantId { id, reason } => {
                format!("Tenant ID \"{id}\" is invalid: {reason}")
            }
            Self::InvalidTenantName(reason) => format!("Tenant name is invalid: {reason}"),
            Self::InvalidRequest(reason) => format!("Invalid request body: {reason}"),
            Self::TenantAlreadyExists(id) => format!("Tenant with ID \"{id}\" already exists"),
            Self::TenantNotFound(id) => format!("Tenant with ID \"{id}\" not found"),

            // Hide platform internals from callers
            Self::Kube(_)
            | Self::Helm(_)
            | Self::Platform(_)
            | Self::RolloutTimeout(_)
            | Self::Config(_)
            | Self::Serialisation(_)
            | Self::Internal(_) => "Internal server error".to_owned(),
        }
    }
}

/// Error body returned by the HTTP API.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    /// Numeric HTTP status.
    pub status_code: u16,
    /// Machine-readable error kind.
    pub error: &'static str,
    /// Human-readable message.
    pub message: String,
    /// When the error was produced.
    pub timestamp: String,
}

impl IntoResponse for ControlError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if status.is_server_error() {
            error!(error = %self, error_type = self.error_type(), "request failed");
        }

        let body = ErrorResponse {
            status_code: status.as_u16(),
            error: self.error_type(),
            message: self.public_message(),
            timestamp: Utc::now().to_rfc3339(),
        };

        (status, Json(body)).into_response()
    }
}
