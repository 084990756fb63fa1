//! Kubernetes platform gateway.
//!
//! Namespaces and ingresses are managed through the API server, the tenant
//! application through Helm. The chart decides what its service and
//! deployment are called, so both are discovered by listing the tenant's
//! namespace rather than assumed.

use std::collections::BTreeMap;

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{Namespace, Service};
use k8s_openapi::api::networking::v1::Ingress;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::api::{DeleteParams, ListParams, PostParams};
use kube::config::KubeConfigOptions;
use kube::{Api, Client, Config};
use serde_json::json;
use tracing::{debug, info, warn};

use crate::config::PlatformConfig;
use crate::error::{ControlError, ControlResult};
use crate::types::{namespace_for, DeploymentStatus, TenantId};

use super::classify::{self, Outcome};
use super::helm::HelmClient;
use super::PlatformGateway;

/// Label carrying the tenant id on every namespace we create.
pub const TENANT_LABEL: &str = "tenant";

/// Network endpoint the tenant hostname is routed to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceEndpoint {
    /// Service name.
    pub name: String,
    /// Service port.
    pub port: i32,
    /// Whether the endpoint came from a listed service or from fallbacks.
    pub discovered: bool,
}

/// Pick the item whose name starts with the tenant id, else the first named one.
fn prefer_tenant_prefixed<'a, T>(
    tenant_id: &TenantId,
    items: &'a [T],
    name: impl Fn(&T) -> Option<&str>,
) -> Option<&'a T> {
    items
        .iter()
        .find(|item| name(item).is_some_and(|n| n.starts_with(tenant_id.as_str())))
        .or_else(|| items.iter().find(|item| name(item).is_some()))
}

/// Resolve the service a tenant's hostname should route to.
///
/// Best effort: a service prefixed by the tenant id wins, then the first
/// service listed, then the tenant id itself on `default_port`. Charts that
/// create several services may route to the wrong one.
#[must_use]
pub fn select_endpoint(
    tenant_id: &TenantId,
    services: &[Service],
    default_port: i32,
) -> ServiceEndpoint {
    let Some(service) =
        prefer_tenant_prefixed(tenant_id, services, |s| s.metadata.name.as_deref())
    else {
        return ServiceEndpoint {
            name: tenant_id.to_string(),
            port: default_port,
            discovered: false,
        };
    };

    let port = service
        .spec
        .as_ref()
        .and_then(|spec| spec.ports.as_ref())
        .and_then(|ports| ports.first())
        .map_or(default_port, |p| p.port);

    ServiceEndpoint {
        name: service.metadata.name.clone().unwrap_or_default(),
        port,
        discovered: true,
    }
}

/// Build the routing rule sending `host` to the tenant's service.
pub fn ingress_manifest(
    tenant_id: &TenantId,
    namespace: &str,
    host: &str,
    ingress_class: &str,
    endpoint: &ServiceEndpoint,
) -> ControlResult<Ingress> {
    serde_json::from_value(json!({
        "apiVersion": "networking.k8s.io/v1",
        "kind": "Ingress",
        "metadata": {
            "name": tenant_id.as_str(),
            "namespace": namespace,
            "labels": {
                "app": "tenant-app",
                TENANT_LABEL: tenant_id.as_str(),
            },
            "annotations": {
                "nginx.ingress.kubernetes.io/rewrite-target": "/",
            },
        },
        "spec": {
            "ingressClassName": ingress_class,
            "rules": [{
                "host": host,
                "http": {
                    "paths": [{
                        "path": "/",
                        "pathType": "Prefix",
                        "backend": {
                            "service": {
                                "name": endpoint.name,
                                "port": { "number": endpoint.port },
                            },
                        },
                    }],
                },
            }],
        },
    }))
    .map_err(|e| ControlError::Serialisation(format!("invalid ingress manifest: {e}")))
}

/// Project a deployment's replica counts onto a status.
fn deployment_status(deployment: &Deployment) -> DeploymentStatus {
    let desired = deployment
        .spec
        .as_ref()
        .and_then(|spec| spec.replicas)
        .unwrap_or(0);
    let ready = deployment
        .status
        .as_ref()
        .and_then(|status| status.ready_replicas)
        .unwrap_or(0);
    DeploymentStatus::from_replicas(desired, ready)
}

/// Gateway backed by a Kubernetes cluster and Helm.
pub struct KubernetesGateway {
    client: Client,
    helm: HelmClient,
    namespace_prefix: String,
    host_suffix: String,
    ingress_class: String,
    default_service_port: i32,
}

impl KubernetesGateway {
    /// Create a gateway with an existing client.
    #[must_use]
    pub fn new(client: Client, config: &PlatformConfig, namespace_prefix: &str) -> Self {
        Self {
            client,
            helm: HelmClient::new(&config.helm),
            namespace_prefix: namespace_prefix.to_owned(),
            host_suffix: config.host_suffix.clone(),
            ingress_class: config.ingress_class.clone(),
            default_service_port: config.default_service_port,
        }
    }

    /// Connect to the cluster.
    ///
    /// The in-cluster service account is tried first; outside a cluster
    /// the local kubeconfig is used.
    pub async fn connect(config: &PlatformConfig, namespace_prefix: &str) -> ControlResult<Self> {
        let kube_config = match Config::incluster() {
            Ok(kube_config) => {
                info!("using in-cluster Kubernetes configuration");
                kube_config
            }
            Err(e) => {
                debug!(error = %e, "in-cluster configuration unavailable");
                let kube_config = Config::from_kubeconfig(&KubeConfigOptions::default())
                    .await
                    .map_err(|e| ControlError::Config(format!("failed to load kubeconfig: {e}")))?;
                info!(cluster_url = %kube_config.cluster_url, "using local kubeconfig");
                kube_config
            }
        };

        let client = Client::try_from(kube_config)?;
        Ok(Self::new(client, config, namespace_prefix))
    }

    fn namespace(&self, tenant_id: &TenantId) -> String {
        namespace_for(&self.namespace_prefix, tenant_id)
    }

    fn host(&self, tenant_id: &TenantId) -> String {
        format!("{tenant_id}.{}", self.host_suffix)
    }

    async fn discover_endpoint(
        &self,
        tenant_id: &TenantId,
        namespace: &str,
    ) -> ControlResult<ServiceEndpoint> {
        let services: Api<Service> = Api::namespaced(self.client.clone(), namespace);
        let listed = match services.list(&ListParams::default()).await {
            Ok(list) => list.items,
            Err(e) if classify::is_not_found(&e) => Vec::new(),
            Err(e) => return Err(e.into()),
        };

        let endpoint = select_endpoint(tenant_id, &listed, self.default_service_port);
        if endpoint.discovered {
            info!(
                tenant_id = %tenant_id,
                service = %endpoint.name,
                port = endpoint.port,
                candidates = listed.len(),
                "resolved tenant service"
            );
        } else {
            warn!(
                tenant_id = %tenant_id,
                service = %endpoint.name,
                port = endpoint.port,
                "no service found, falling back to defaults"
            );
        }
        Ok(endpoint)
    }

    async fn create_ingress(
        &self,
        tenant_id: &TenantId,
        namespace: &str,
        endpoint: &ServiceEndpoint,
    ) -> ControlResult<()> {
        let host = self.host(tenant_id);
        let ingress = ingress_manifest(tenant_id, namespace, &host, &self.ingress_class, endpoint)?;
        let ingresses: Api<Ingress> = Api::namespaced(self.client.clone(), namespace);

        if classify::absorb_conflict(ingresses.create(&PostParams::default(), &ingress).await)?
            .is_done()
        {
            info!(tenant_id = %tenant_id, host = %host, service = %endpoint.name, "ingress created");
        } else {
            info!(tenant_id = %tenant_id, host = %host, "ingress already exists");
        }
        Ok(())
    }
}

impl std::fmt::Debug for KubernetesGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubernetesGateway")
            .field("namespace_prefix", &self.namespace_prefix)
            .field("host_suffix", &self.host_suffix)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl PlatformGateway for KubernetesGateway {
    async fn create_isolation_boundary(&self, tenant_id: &TenantId) -> ControlResult<()> {
        let name = self.namespace(tenant_id);
        let namespace = Namespace {
            metadata: ObjectMeta {
                name: Some(name.clone()),
                labels: Some(BTreeMap::from([(
                    TENANT_LABEL.to_owned(),
                    tenant_id.to_string(),
                )])),
                ..ObjectMeta::default()
            },
            ..Namespace::default()
        };

        let namespaces: Api<Namespace> = Api::all(self.client.clone());
        match classify::absorb_conflict(namespaces.create(&PostParams::default(), &namespace).await)? {
            Outcome::Done(_) => info!(tenant_id = %tenant_id, namespace = %name, "namespace created"),
            Outcome::AlreadySatisfied => {
                info!(tenant_id = %tenant_id, namespace = %name, "namespace already exists");
            }
        }
        Ok(())
    }

    async fn trigger_deployment(&self, tenant_id: &TenantId) -> ControlResult<()> {
        let namespace = self.namespace(tenant_id);
        let release = tenant_id.as_str();

        if self.helm.release_exists(release, &namespace).await? {
            info!(tenant_id = %tenant_id, release = %release, "release already installed");
        } else {
            info!(tenant_id = %tenant_id, release = %release, namespace = %namespace, "installing release");
            let outcome = classify::absorb_helm_installed(
                self.helm
                    .install(release, &namespace, tenant_id.as_str())
                    .await,
            )?;
            if outcome.is_done() {
                info!(tenant_id = %tenant_id, release = %release, "release installed");
            } else {
                info!(tenant_id = %tenant_id, release = %release, "release name already in use");
            }
        }

        let endpoint = self.discover_endpoint(tenant_id, &namespace).await?;
        self.create_ingress(tenant_id, &namespace, &endpoint).await
    }

    async fn query_readiness(&self, tenant_id: &TenantId) -> ControlResult<DeploymentStatus> {
        let namespace = self.namespace(tenant_id);
        let deployments: Api<Deployment> = Api::namespaced(self.client.clone(), &namespace);

        let listed = match deployments.list(&ListParams::default()).await {
            Ok(list) => list.items,
            Err(e) if classify::is_not_found(&e) => {
                debug!(tenant_id = %tenant_id, "namespace not found");
                return Ok(DeploymentStatus::Error);
            }
            Err(e) => return Err(e.into()),
        };

        let Some(deployment) =
            prefer_tenant_prefixed(tenant_id, &listed[..], |d| d.metadata.name.as_deref())
        else {
            debug!(tenant_id = %tenant_id, namespace = %namespace, "no deployment found");
            return Ok(DeploymentStatus::Error);
        };

        let status = deployment_status(deployment);
        debug!(
            tenant_id = %tenant_id,
            deployment = ?deployment.metadata.name,
            status = %status,
            "deployment readiness"
        );
        Ok(status)
    }

    async fn teardown_deployment(&self, tenant_id: &TenantId) -> ControlResult<()> {
        let namespace = self.namespace(tenant_id);
        let release = tenant_id.as_str();

        if self.helm.release_exists(release, &namespace).await? {
            let outcome = classify::absorb_helm_missing(self.helm.uninstall(release, &namespace).await)?;
            if outcome.is_done() {
                info!(tenant_id = %tenant_id, release = %release, "release uninstalled");
            }
        } else {
            info!(tenant_id = %tenant_id, release = %release, "release not found");
        }

        let ingresses: Api<Ingress> = Api::namespaced(self.client.clone(), &namespace);
        if classify::absorb_not_found(ingresses.delete(release, &DeleteParams::default()).await)?
            .is_done()
        {
            info!(tenant_id = %tenant_id, "ingress deleted");
        } else {
            debug!(tenant_id = %tenant_id, "ingress not found");
        }
        Ok(())
    }

    async fn teardown_isolation_boundary(&self, tenant_id: &TenantId) -> ControlResult<()> {
        let name = self.namespace(tenant_id);
        let namespaces: Api<Namespace> = Api::all(self.client.clone());

        if classify::absorb_not_found(namespaces.delete(&name, &DeleteParams::default()).await)?
            .is_done()
        {
            info!(tenant_id = %tenant_id, namespace = %name, "namespace deleted");
        } else {
            info!(tenant_id = %tenant_id, namespace = %name, "namespace not found");
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use k8s_openapi::api::apps::v1::{DeploymentSpec, DeploymentStatus as K8sDeploymentStatus};
    use k8s_openapi::api::core::v1::{ServicePort, ServiceSpec};

    use super::*;

    fn service(name: &str, port: Option<i32>) -> Service {
        Service {
            metadata: ObjectMeta {
                name: Some(name.to_owned()),
                ..ObjectMeta::default()
            },
            spec: port.map(|port| ServiceSpec {
                ports: Some(vec![ServicePort {
                    port,
                    ..ServicePort::default()
                }]),
                ..ServiceSpec::default()
            }),
            ..Service::default()
        }
    }

    fn deployment(name: &str, desired: Option<i32>, ready: Option<i32>) -> Deployment {
        Deployment {
            metadata: ObjectMeta {
                name: Some(name.to_owned()),
                ..ObjectMeta::default()
            },
            spec: Some(DeploymentSpec {
                replicas: desired,
                ..DeploymentSpec::default()
            }),
            status: Some(K8sDeploymentStatus {
                ready_replicas: ready,
                ..K8sDeploymentStatus::default()
            }),
        }
    }

    #[test]
    fn endpoint_prefers_tenant_prefixed_service() {
        let id = TenantId::new("acme");
        let services = [service("redis", Some(6379)), service("acme-tenant-app", Some(8080))];

        let endpoint = select_endpoint(&id, &services, 9090);
        assert_eq!(endpoint.name, "acme-tenant-app");
        assert_eq!(endpoint.port, 8080);
        assert!(endpoint.discovered);
    }

    #[test]
    fn endpoint_falls_back_to_first_service() {
        let id = TenantId::new("acme");
        let services = [service("tenant-app", Some(80)), service("metrics", Some(9100))];

        let endpoint = select_endpoint(&id, &services, 9090);
        assert_eq!(endpoint.name, "tenant-app");
        assert_eq!(endpoint.port, 80);
    }

    #[test]
    fn endpoint_falls_back_to_default_port() {
        let id = TenantId::new("acme");

        let endpoint = select_endpoint(&id, &[service("acme", None)], 9090);
        assert_eq!(endpoint.name, "acme");
        assert_eq!(endpoint.port, 9090);
        assert!(endpoint.discovered);

        let endpoint = select_endpoint(&id, &[], 9090);
        assert_eq!(endpoint.name, "acme");
        assert_eq!(endpoint.port, 9090);
        assert!(!endpoint.discovered);
    }

    #[test]
    fn ingress_routes_host_to_endpoint() {
        let id = TenantId::new("acme");
        let endpoint = ServiceEndpoint {
            name: "acme-tenant-app".to_owned(),
            port: 8080,
            discovered: true,
        };
        let ingress =
            ingress_manifest(&id, "tenant-acme", "acme.localhost", "nginx", &endpoint).unwrap();

        assert_eq!(ingress.metadata.name.as_deref(), Some("acme"));
        assert_eq!(ingress.metadata.namespace.as_deref(), Some("tenant-acme"));
        assert_eq!(
            ingress.metadata.labels.as_ref().unwrap().get(TENANT_LABEL),
            Some(&"acme".to_owned())
        );

        let spec = ingress.spec.unwrap();
        assert_eq!(spec.ingress_class_name.as_deref(), Some("nginx"));
        let rule = &spec.rules.unwrap()[0];
        assert_eq!(rule.host.as_deref(), Some("acme.localhost"));
        let path = &rule.http.as_ref().unwrap().paths[0];
        let backend = path.backend.service.as_ref().unwrap();
        assert_eq!(backend.name, "acme-tenant-app");
        assert_eq!(backend.port.as_ref().unwrap().number, Some(8080));
    }

    #[test]
    fn readiness_from_deployment() {
        assert_eq!(
            deployment_status(&deployment("acme", Some(1), Some(1))),
            DeploymentStatus::Running
        );
        assert_eq!(
            deployment_status(&deployment("acme", Some(2), Some(1))),
            DeploymentStatus::Creating
        );
        assert_eq!(
            deployment_status(&deployment("acme", Some(1), None)),
            DeploymentStatus::Stopped
        );
        assert_eq!(
            deployment_status(&deployment("acme", None, None)),
            DeploymentStatus::Stopped
        );
    }

    #[test]
    fn workload_selection_prefers_tenant_prefix() {
        let id = TenantId::new("acme");
        let listed = [
            deployment("sidecar", Some(1), Some(0)),
            deployment("acme-web", Some(1), Some(1)),
        ];
        let picked = prefer_tenant_prefixed(&id, &listed[..], |d| d.metadata.name.as_deref()).unwrap();
        assert_eq!(picked.metadata.name.as_deref(), Some("acme-web"));
    }
}
