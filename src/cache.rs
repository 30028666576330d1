//! Read-through view of the resources the translator needs to look up by
//! name: Services (for Ingress backend resolution), Secrets (TLS material),
//! and ConfigMaps (cloud-provider config blobs). Backed by `kube::Api` reads
//! against the informer's warm cache; exposed as a trait so the translator
//! and admission path can run against an in-memory fake in tests.

use std::collections::BTreeMap;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::{ConfigMap, Secret, Service};
use kube::{Api, Client};

#[derive(Debug, Clone, PartialEq)]
pub struct ServiceRef {
    pub service_type: String,
    pub node_port_by_port: BTreeMap<i32, i32>,
}

#[async_trait]
pub trait ResourceCache: Send + Sync {
    async fn get_service(&self, namespace: &str, name: &str) -> Option<ServiceRef>;
    async fn get_secret_keys(&self, namespace: &str, name: &str) -> Option<Vec<String>>;
    async fn get_configmap_data(&self, namespace: &str, name: &str) -> Option<BTreeMap<String, String>>;
}

pub struct KubeResourceCache {
    client: Client,
}

impl KubeResourceCache {
    pub fn new(client: Client) -> Self {
        KubeResourceCache { client }
    }
}

#[async_trait]
impl ResourceCache for KubeResourceCache {
    async fn get_service(&self, namespace: &str, name: &str) -> Option<ServiceRef> {
        let api: Api<Service> = Api::namespaced(self.client.clone(), namespace);
        let svc = api.get(name).await.ok()?;
        let spec = svc.spec?;
        let service_type = spec.type_.unwrap_or_else(|| "ClusterIP".to_string());
        let mut node_port_by_port = BTreeMap::new();
        for port in spec.ports.unwrap_or_default() {
            if let Some(node_port) = port.node_port {
                node_port_by_port.insert(port.port, node_port);
            }
        }
        Some(ServiceRef {
            service_type,
            node_port_by_port,
        })
    }

    async fn get_secret_keys(&self, namespace: &str, name: &str) -> Option<Vec<String>> {
        let api: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
        let secret = api.get(name).await.ok()?;
        Some(secret.data.unwrap_or_default().into_keys().collect())
    }

    async fn get_configmap_data(
        &self,
        namespace: &str,
        name: &str,
    ) -> Option<BTreeMap<String, String>> {
        let api: Api<ConfigMap> = Api::namespaced(self.client.clone(), namespace);
        let cm = api.get(name).await.ok()?;
        Some(cm.data.unwrap_or_default().into_iter().collect())
    }
}

#[cfg(test)]
#[derive(Default)]
pub struct FakeResourceCache {
    pub services: std::sync::Mutex<BTreeMap<(String, String), ServiceRef>>,
    pub secrets: std::sync::Mutex<BTreeMap<(String, String), Vec<String>>>,
    pub configmaps: std::sync::Mutex<BTreeMap<(String, String), BTreeMap<String, String>>>,
}

#[cfg(test)]
#[async_trait]
impl ResourceCache for FakeResourceCache {
    async fn get_service(&self, namespace: &str, name: &str) -> Option<ServiceRef> {
        self.services
            .lock()
            .unwrap()
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
    }

    async fn get_secret_keys(&self, namespace: &str, name: &str) -> Option<Vec<String>> {
        self.secrets
            .lock()
            .unwrap()
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
    }

    async fn get_configmap_data(
        &self,
        namespace: &str,
        name: &str,
    ) -> Option<BTreeMap<String, String>> {
        self.configmaps
            .lock()
            .unwrap()
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fake_cache_returns_seeded_service() {
        let cache = FakeResourceCache::default();
        cache.services.lock().unwrap().insert(
            ("default".to_string(), "web".to_string()),
            ServiceRef {
                service_type: "NodePort".to_string(),
                node_port_by_port: BTreeMap::from([(80, 31000)]),
            },
        );
        let found = cache.get_service("default", "web").await.unwrap();
        assert_eq!(found.service_type, "NodePort");
        assert_eq!(found.node_port_by_port.get(&80), Some(&31000));
        assert!(cache.get_service("default", "missing").await.is_none());
    }
}
