//! Service lifecycle management.
//!
//! Provides the main service runner with signal handling and graceful shutdown.

use std::sync::Arc;

use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::api;
use crate::config::ControlConfig;
use crate::error::{ControlError, ControlResult};
use crate::platform::{create_platform, PlatformGateway};
use crate::registry::TenantRegistry;
use crate::tenant::TenantManager;

/// The control service.
///
/// Manages the lifecycle of the control plane, including:
/// - Platform gateway connection
/// - Tenant registry and manager
/// - HTTP API server
/// - Signal handling and graceful shutdown
pub struct ControlService {
    config: ControlConfig,
    cancel: CancellationToken,
}

impl ControlService {
    /// Create a new control service with the given configuration.
    #[must_use]
    pub fn new(config: ControlConfig) -> Self {
        Self {
            config,
            cancel: CancellationToken::new(),
        }
    }

    /// Run the control service.
    ///
    /// This will:
    /// 1. Connect to the platform
    /// 2. Create the tenant registry and manager
    /// 3. Start the HTTP API server
    /// 4. Wait for shutdown signal
    /// 5. Stop in-flight rollouts
    pub async fn run(&self) -> ControlResult<()> {
        let platform = self.create_platform().await?;

        let manager = Arc::new(TenantManager::new(
            Arc::new(TenantRegistry::new()),
            platform,
            self.config.tenants.clone(),
        ));
        info!(
            namespace_prefix = %manager.namespace_prefix(),
            rollout_timeout_secs = self.config.tenants.rollout_timeout_secs,
            "tenant manager initialised"
        );

        let app = api::router(api::AppState::new(Arc::clone(&manager)));

        let addr = self.config.server.listen_addr();
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| ControlError::Config(format!("failed to bind {addr}: {e}")))?;

        info!(%addr, "control service listening");

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal(self.cancel.clone()))
            .await
            .map_err(|e| ControlError::internal(format!("server error: {e}")))?;

        manager.shutdown().await;

        info!("control service shutdown complete");
        Ok(())
    }

    /// Request graceful shutdown.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    async fn create_platform(&self) -> ControlResult<Arc<dyn PlatformGateway>> {
        let platform =
            create_platform(&self.config.platform, &self.config.tenants.namespace_prefix).await?;
        info!(
            platform_type = ?self.config.platform.platform_type,
            host_suffix = %self.config.platform.host_suffix,
            "platform gateway configured"
        );
        Ok(platform)
    }
}

async fn shutdown_signal(cancel: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            info!("received SIGTERM, initiating shutdown");
        }
        () = cancel.cancelled() => {
            info!("shutdown requested");
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::net::{IpAddr, Ipv4Addr};

    use super::*;
    use crate::config::PlatformType;

    #[test]
    fn service_shutdown() {
        let service = ControlService::new(ControlConfig::default());
        assert!(!service.cancel.is_cancelled());
        service.shutdown();
        assert!(service.cancel.is_cancelled());
    }

    #[tokio::test]
    async fn runs_until_shutdown_with_mock_platform() {
        let mut config = ControlConfig::default();
        config.platform.platform_type = PlatformType::Mock;
        config.server.host = IpAddr::V4(Ipv4Addr::LOCALHOST);
        config.server.port = 0;

        let service = Arc::new(ControlService::new(config));
        let runner = tokio::spawn({
            let service = Arc::clone(&service);
            async move { service.run().await }
        });

        tokio::task::yield_now().await;
        service.shutdown();

        runner.await.unwrap().unwrap();
    }
}
