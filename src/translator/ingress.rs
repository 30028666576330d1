use super::{virtual_network_entry, DesiredObjects, EventSeverity, Owner, TranslatorEvent};
use crate::cache::ResourceCache;
use crate::errors::Result;
use crate::lbclient::{Backend, BackendService, Frontend, Haproxy, LinkBackend};
use crate::naming::{self, Scheme};
use crate::poolspec::PoolSpec;
use crate::secret_reflector::SecretReflector;

const DEFAULT_BACKEND_NAMESPACE: &str = "kube-system";
const DEFAULT_BACKEND_SERVICE: &str = "dklb";
const TLS_CERT_KEY: &str = "tls.crt";
const TLS_PRIVATE_KEY: &str = "tls.key";

#[derive(Debug, Clone)]
pub struct IngressBackendRef {
    pub service: String,
    pub port: String,
}

#[derive(Debug, Clone)]
pub struct IngressRule {
    pub host: Option<String>,
    pub path: Option<String>,
    pub backend: IngressBackendRef,
}

#[derive(Debug, Clone)]
pub struct IngressTls {
    pub secret_name: String,
}

#[derive(Debug, Clone)]
pub struct IngressResourceInput {
    pub default_backend: Option<IngressBackendRef>,
    pub rules: Vec<IngressRule>,
    pub tls: Vec<IngressTls>,
}

fn path_to_regex(path: &Option<String>) -> String {
    match path {
        Some(p) if !p.is_empty() => format!("^{}$", regex::escape(p)),
        _ => "^.*$".to_string(),
    }
}

async fn resolve_backend_node_port(
    cache: &dyn ResourceCache,
    namespace: &str,
    backend: &IngressBackendRef,
    events: &mut Vec<TranslatorEvent>,
) -> (String, u16) {
    if let Some(svc) = cache.get_service(namespace, &backend.service).await {
        if svc.service_type == "NodePort" || svc.service_type == "LoadBalancer" {
            if let Ok(port_num) = backend.port.parse::<i32>() {
                if let Some(node_port) = svc.node_port_by_port.get(&port_num) {
                    return (backend.service.clone(), *node_port as u16);
                }
            } else if let Some((_, node_port)) = svc.node_port_by_port.iter().next() {
                return (backend.service.clone(), *node_port as u16);
            }
        }
    }

    events.push(TranslatorEvent {
        severity: EventSeverity::Warning,
        reason: "InvalidBackendService",
        message: format!(
            "service {}/{} is missing or is not NodePort/LoadBalancer; using default backend",
            namespace, backend.service
        ),
    });

    let default = default_backend_node_port(cache, events).await;
    (DEFAULT_BACKEND_SERVICE.to_string(), default)
}

async fn default_backend_node_port(cache: &dyn ResourceCache, events: &mut Vec<TranslatorEvent>) -> u16 {
    if let Some(svc) = cache
        .get_service(DEFAULT_BACKEND_NAMESPACE, DEFAULT_BACKEND_SERVICE)
        .await
    {
        if let Some((_, node_port)) = svc.node_port_by_port.iter().next() {
            return *node_port as u16;
        }
    }
    events.push(TranslatorEvent {
        severity: EventSeverity::Warning,
        reason: "NoDefaultBackendSpecified",
        message: format!(
            "well-known default backend {}/{} is unavailable",
            DEFAULT_BACKEND_NAMESPACE, DEFAULT_BACKEND_SERVICE
        ),
    });
    0
}

pub async fn desired_objects(
    owner: &Owner<'_>,
    input: &IngressResourceInput,
    spec: &PoolSpec,
    cache: &dyn ResourceCache,
    secret_reflector: &dyn SecretReflector,
) -> Result<(DesiredObjects, Vec<TranslatorEvent>)> {
    let mut events = Vec::new();
    let mut backends = Vec::new();
    let mut links = Vec::new();

    let (default_service, default_node_port, default_port) = match &input.default_backend {
        Some(b) => {
            let (service, node_port) =
                resolve_backend_node_port(cache, owner.namespace, b, &mut events).await;
            (service, node_port, b.port.clone())
        }
        None => {
            let node_port = default_backend_node_port(cache, &mut events).await;
            (DEFAULT_BACKEND_SERVICE.to_string(), node_port, "0".to_string())
        }
    };
    let default_backend_name = naming::ingress_backend_name(
        owner.cluster,
        owner.namespace,
        owner.resource,
        &default_service,
        &default_port,
    );
    backends.push(Backend {
        name: default_backend_name.clone(),
        balance: "leastconn".to_string(),
        protocol: "HTTP".to_string(),
        services: vec![BackendService {
            address: "*".to_string(),
            port: default_node_port,
        }],
        rewrite_http: false,
    });

    let mut rules: Vec<&IngressRule> = input.rules.iter().collect();
    rules.sort_by(|a, b| match (&a.host, &b.host) {
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        _ => a.host.cmp(&b.host),
    });

    for rule in rules {
        let (service, node_port) =
            resolve_backend_node_port(cache, owner.namespace, &rule.backend, &mut events).await;
        let backend_name = naming::ingress_backend_name(
            owner.cluster,
            owner.namespace,
            owner.resource,
            &service,
            &rule.backend.port,
        );
        if !backends.iter().any(|b| b.name == backend_name) {
            backends.push(Backend {
                name: backend_name.clone(),
                balance: "leastconn".to_string(),
                protocol: "HTTP".to_string(),
                services: vec![BackendService {
                    address: "*".to_string(),
                    port: node_port,
                }],
                rewrite_http: false,
            });
        }
        links.push(LinkBackend {
            backend: backend_name,
            host: rule.host.clone(),
            path_regex: Some(path_to_regex(&rule.path)),
        });
    }

    let mut secrets = Vec::new();
    let mut certificates = Vec::new();
    let mut tls_names: Vec<&IngressTls> = input.tls.iter().collect();
    tls_names.sort_by(|a, b| a.secret_name.cmp(&b.secret_name));
    for tls in tls_names {
        let keys = cache.get_secret_keys(owner.namespace, &tls.secret_name).await;
        let has_tls_pair = keys
            .map(|k| k.iter().any(|key| key == TLS_CERT_KEY) && k.iter().any(|key| key == TLS_PRIVATE_KEY))
            .unwrap_or(false);
        if !has_tls_pair {
            events.push(TranslatorEvent {
                severity: EventSeverity::Warning,
                reason: "SecretReflectionError",
                message: format!(
                    "secret {}/{} is missing or lacks {TLS_CERT_KEY}/{TLS_PRIVATE_KEY}; skipping TLS entry",
                    owner.namespace, tls.secret_name
                ),
            });
            continue;
        }

        let reflected = secret_reflector.reflect(owner.namespace, &tls.secret_name).await?;
        secrets.push(reflected.clone());
        certificates.push(format!("$SECRETS/{reflected}"));
    }

    let mut frontends = Vec::new();
    let http = spec.http_frontend();
    if http.mode_enabled {
        frontends.push(Frontend {
            name: naming::ingress_frontend_name(owner.cluster, owner.namespace, owner.resource, Scheme::Http),
            bind_address: "0.0.0.0".to_string(),
            bind_port: http.port,
            protocol: "HTTP".to_string(),
            default_backend: Some(default_backend_name.clone()),
            link_backends: links.clone(),
            certificates: Vec::new(),
        });
    }
    if !certificates.is_empty() {
        let https = spec.https_frontend();
        frontends.push(Frontend {
            name: naming::ingress_frontend_name(owner.cluster, owner.namespace, owner.resource, Scheme::Https),
            bind_address: "0.0.0.0".to_string(),
            bind_port: https.port,
            protocol: "HTTPS".to_string(),
            default_backend: Some(default_backend_name),
            link_backends: links,
            certificates,
        });
    }

    backends.sort_by(|a, b| a.name.cmp(&b.name));
    frontends.sort_by(|a, b| a.name.cmp(&b.name));
    secrets.sort();

    Ok((
        DesiredObjects {
            haproxy: Haproxy {
                backends,
                frontends,
            },
            secrets,
            virtual_network: virtual_network_entry(spec),
        },
        events,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::FakeResourceCache;
    use crate::secret_reflector::FakeSecretReflector;
    use std::collections::BTreeMap;

    fn owner<'a>() -> Owner<'a> {
        Owner {
            cluster: "c",
            namespace: "ns",
            resource: "ing1",
        }
    }

    #[tokio::test]
    async fn missing_backend_falls_back_to_default_and_warns() {
        let cache = FakeResourceCache::default();
        let reflector = FakeSecretReflector::default();
        let spec = PoolSpec::defaulted("c", "ns", "ing1");
        let input = IngressResourceInput {
            default_backend: None,
            rules: vec![IngressRule {
                host: Some("foo.bar".to_string()),
                path: Some("/bar".to_string()),
                backend: IngressBackendRef {
                    service: "baz".to_string(),
                    port: "8080".to_string(),
                },
            }],
            tls: Vec::new(),
        };
        let (_desired, events) = desired_objects(&owner(), &input, &spec, &cache, &reflector)
            .await
            .unwrap();
        assert!(events
            .iter()
            .any(|e| e.reason == "InvalidBackendService"));
    }

    #[tokio::test]
    async fn resolved_backend_uses_node_port() {
        let cache = FakeResourceCache::default();
        cache.services.lock().unwrap().insert(
            ("ns".to_string(), "baz".to_string()),
            crate::cache::ServiceRef {
                service_type: "NodePort".to_string(),
                node_port_by_port: BTreeMap::from([(8080, 31234)]),
            },
        );
        let reflector = FakeSecretReflector::default();
        let spec = PoolSpec::defaulted("c", "ns", "ing1");
        let input = IngressResourceInput {
            default_backend: None,
            rules: vec![IngressRule {
                host: Some("foo.bar".to_string()),
                path: None,
                backend: IngressBackendRef {
                    service: "baz".to_string(),
                    port: "8080".to_string(),
                },
            }],
            tls: Vec::new(),
        };
        let (desired, events) = desired_objects(&owner(), &input, &spec, &cache, &reflector)
            .await
            .unwrap();
        assert!(!events.iter().any(|e| e.reason == "InvalidBackendService"));
        assert!(desired
            .haproxy
            .backends
            .iter()
            .any(|b| b.services[0].port == 31234));
    }

    #[tokio::test]
    async fn absent_default_backend_looks_up_kube_system_not_owner_namespace() {
        let cache = FakeResourceCache::default();
        cache.services.lock().unwrap().insert(
            (DEFAULT_BACKEND_NAMESPACE.to_string(), DEFAULT_BACKEND_SERVICE.to_string()),
            crate::cache::ServiceRef {
                service_type: "NodePort".to_string(),
                node_port_by_port: BTreeMap::from([(80, 32000)]),
            },
        );
        let reflector = FakeSecretReflector::default();
        let spec = PoolSpec::defaulted("c", "ns", "ing1");
        let input = IngressResourceInput {
            default_backend: None,
            rules: Vec::new(),
            tls: Vec::new(),
        };
        let (desired, events) = desired_objects(&owner(), &input, &spec, &cache, &reflector)
            .await
            .unwrap();
        assert!(!events.iter().any(|e| e.reason == "InvalidBackendService"));
        assert!(!events.iter().any(|e| e.reason == "NoDefaultBackendSpecified"));
        assert!(desired
            .haproxy
            .backends
            .iter()
            .any(|b| b.services[0].port == 32000));
    }

    #[tokio::test]
    async fn tls_secret_missing_key_pair_is_skipped_with_warning() {
        let cache = FakeResourceCache::default();
        cache.secrets.lock().unwrap().insert(
            ("ns".to_string(), "test-secret".to_string()),
            vec![TLS_CERT_KEY.to_string()],
        );
        let reflector = FakeSecretReflector::default();
        let spec = PoolSpec::defaulted("c", "ns", "ing1");
        let input = IngressResourceInput {
            default_backend: None,
            rules: Vec::new(),
            tls: vec![IngressTls {
                secret_name: "test-secret".to_string(),
            }],
        };
        let (desired, events) = desired_objects(&owner(), &input, &spec, &cache, &reflector)
            .await
            .unwrap();
        assert!(events.iter().any(|e| e.reason == "SecretReflectionError"));
        assert!(desired.secrets.is_empty());
    }

    #[tokio::test]
    async fn tls_secret_with_full_key_pair_is_reflected() {
        let cache = FakeResourceCache::default();
        cache.secrets.lock().unwrap().insert(
            ("ns".to_string(), "test-secret".to_string()),
            vec![TLS_CERT_KEY.to_string(), TLS_PRIVATE_KEY.to_string()],
        );
        let reflector = FakeSecretReflector::default();
        let spec = PoolSpec::defaulted("c", "ns", "ing1");
        let input = IngressResourceInput {
            default_backend: None,
            rules: Vec::new(),
            tls: vec![IngressTls {
                secret_name: "test-secret".to_string(),
            }],
        };
        let (desired, events) = desired_objects(&owner(), &input, &spec, &cache, &reflector)
            .await
            .unwrap();
        assert!(!events.iter().any(|e| e.reason == "SecretReflectionError"));
        assert_eq!(desired.secrets.len(), 1);
    }
}
