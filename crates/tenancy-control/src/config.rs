//! Configuration for tenancy-control.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::providers::{Env, Format, Toml};
use figment::Figment;
use serde::Deserialize;

use crate::error::{ControlError, ControlResult};

/// Default configuration file, looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "tenancy.toml";

/// Top-level configuration for the control service.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ControlConfig {
    /// HTTP server configuration.
    #[serde(default)]
    pub server: ServerConfig,

    /// Tenant lifecycle configuration.
    #[serde(default)]
    pub tenants: TenantConfig,

    /// Platform gateway configuration.
    #[serde(default)]
    pub platform: PlatformConfig,
}

impl ControlConfig {
    /// Load configuration from the default sources.
    ///
    /// Configuration is loaded in the following order (later sources override earlier):
    /// 1. Default values
    /// 2. `tenancy.toml` in the current directory (if present)
    /// 3. Environment variables with `TENANCY_` prefix
    /// 4. `PORT` and `NAMESPACE_PREFIX`
    pub fn load() -> ControlResult<Self> {
        Self::from_file(DEFAULT_CONFIG_FILE)
    }

    /// Load configuration from a specific TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> ControlResult<Self> {
        Figment::new()
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed("TENANCY_").split("__"))
            .merge(Env::raw().only(&["PORT"]).map(|_| "server.port".into()))
            .merge(
                Env::raw()
                    .only(&["NAMESPACE_PREFIX"])
                    .map(|_| "tenants.namespace_prefix".into()),
            )
            .extract()
            .map_err(|e| ControlError::Config(e.to_string()))
    }
}

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Address to bind.
    #[serde(default = "default_host")]
    pub host: IpAddr,

    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
}

impl ServerConfig {
    /// Socket address the API listens on.
    #[must_use]
    pub const fn listen_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

const fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

const fn default_port() -> u16 {
    3000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Tenant lifecycle configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct TenantConfig {
    /// Prefix prepended to the tenant id to form its namespace name.
    #[serde(default = "default_namespace_prefix")]
    pub namespace_prefix: String,

    /// Deadline for a detached rollout, in seconds.
    #[serde(default = "default_rollout_timeout_secs")]
    pub rollout_timeout_secs: u64,
}

impl TenantConfig {
    /// Rollout deadline as a duration.
    #[must_use]
    pub const fn rollout_timeout(&self) -> Duration {
        Duration::from_secs(self.rollout_timeout_secs)
    }
}

fn default_namespace_prefix() -> String {
    "tenant-".to_owned()
}

const fn default_rollout_timeout_secs() -> u64 {
    300 // 5 minutes
}

impl Default for TenantConfig {
    fn default() -> Self {
        Self {
            namespace_prefix: default_namespace_prefix(),
            rollout_timeout_secs: default_rollout_timeout_secs(),
        }
    }
}

/// Platform gateway configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct PlatformConfig {
    /// Which gateway implementation to use.
    #[serde(default)]
    pub platform_type: PlatformType,

    /// Domain suffix for tenant hostnames (`<id>.<suffix>`).
    #[serde(default = "default_host_suffix")]
    pub host_suffix: String,

    /// Ingress class for routing rules.
    #[serde(default = "default_ingress_class")]
    pub ingress_class: String,

    /// Port used when no service metadata can be discovered.
    #[serde(default = "default_service_port")]
    pub default_service_port: i32,

    /// Helm invocation settings.
    #[serde(default)]
    pub helm: HelmConfig,
}

fn default_host_suffix() -> String {
    "localhost".to_owned()
}

fn default_ingress_class() -> String {
    "nginx".to_owned()
}

const fn default_service_port() -> i32 {
    9090
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            platform_type: PlatformType::default(),
            host_suffix: default_host_suffix(),
            ingress_class: default_ingress_class(),
            default_service_port: default_service_port(),
            helm: HelmConfig::default(),
        }
    }
}

/// Type of platform gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlatformType {
    /// Kubernetes cluster driven through the API server and Helm.
    #[default]
    Kubernetes,

    /// In-process mock for testing and local runs.
    Mock,
}

/// Helm invocation settings.
#[derive(Debug, Clone, Deserialize)]
pub struct HelmConfig {
    /// Helm executable.
    #[serde(default = "default_helm_binary")]
    pub binary: PathBuf,

    /// Chart reference installed for every tenant.
    #[serde(default = "default_chart")]
    pub chart: String,

    /// Optional values file passed to every install.
    pub values_file: Option<PathBuf>,

    /// Timeout for a single Helm invocation, in seconds.
    #[serde(default = "default_helm_timeout_secs")]
    pub timeout_secs: u64,
}

impl HelmConfig {
    /// Helm timeout as a duration.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_helm_binary() -> PathBuf {
    PathBuf::from("helm")
}

fn default_chart() -> String {
    "./charts/tenant-app".to_owned()
}

const fn default_helm_timeout_secs() -> u64 {
    300
}

impl Default for HelmConfig {
    fn default() -> Self {
        Self {
            binary: default_helm_binary(),
            chart: default_chart(),
            values_file: None,
            timeout_secs: default_helm_timeout_secs(),
        }
    }
}
