//! Deterministic, reversible encoding of owner identity into external
//! backend/frontend object names. `:` is the separator because Kubernetes
//! names never contain it; `.` stands in for `/` inside the cluster name.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NamingError {
    #[error("name has too few `:`-separated segments: {0}")]
    TooFewSegments(String),
}

/// The parsed, tagged result of `parse_name`. Any string that doesn't match
/// the owned-name shape resolves to `Foreign` rather than an error: a pool
/// can legitimately contain backends/frontends this controller never created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Owner {
    ServiceOwned {
        cluster: String,
        namespace: String,
        service: String,
        port: String,
    },
    IngressOwned {
        cluster: String,
        namespace: String,
        ingress: String,
        suffix: IngressSuffix,
    },
    Foreign,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngressSuffix {
    Backend { service: String, port: String },
    Frontend { scheme: Scheme },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    Http,
    Https,
}

fn encode_cluster(cluster: &str) -> String {
    cluster.replace('/', ".")
}

fn decode_cluster(encoded: &str) -> String {
    encoded.replace('.', "/")
}

/// `<cluster>:<ns>:<svc>:<port>`
pub fn service_backend_name(cluster: &str, namespace: &str, service: &str, port: &str) -> String {
    format!(
        "{}:{}:{}:{}",
        encode_cluster(cluster),
        namespace,
        service,
        port
    )
}

/// `<cluster>:<ns>:<ing>:<serviceName>:<servicePortStringOrInt>`
pub fn ingress_backend_name(
    cluster: &str,
    namespace: &str,
    ingress: &str,
    service: &str,
    port: &str,
) -> String {
    format!(
        "{}:{}:{}:{}:{}",
        encode_cluster(cluster),
        namespace,
        ingress,
        service,
        port
    )
}

/// `<cluster>:<ns>:<ing>:<http|https>`
pub fn ingress_frontend_name(cluster: &str, namespace: &str, ingress: &str, scheme: Scheme) -> String {
    format!(
        "{}:{}:{}:{}",
        encode_cluster(cluster),
        namespace,
        ingress,
        match scheme {
            Scheme::Http => "http",
            Scheme::Https => "https",
        }
    )
}

/// Parses any backend/frontend name this controller might encounter. Never
/// fails: a name with the wrong shape, wrong segment count, or unrecognized
/// suffix is `Owner::Foreign`, never an error, because a pool can legitimately
/// hold objects this controller did not create.
pub fn parse_name(name: &str) -> Owner {
    let parts: Vec<&str> = name.split(':').collect();
    match parts.as_slice() {
        [cluster, namespace, ingress, tail] if *tail == "http" || *tail == "https" => {
            Owner::IngressOwned {
                cluster: decode_cluster(cluster),
                namespace: namespace.to_string(),
                ingress: ingress.to_string(),
                suffix: IngressSuffix::Frontend {
                    scheme: if *tail == "http" {
                        Scheme::Http
                    } else {
                        Scheme::Https
                    },
                },
            }
        }
        [cluster, namespace, resource, port] => Owner::ServiceOwned {
            cluster: decode_cluster(cluster),
            namespace: namespace.to_string(),
            service: resource.to_string(),
            port: port.to_string(),
        },
        [cluster, namespace, ingress, service, port] => Owner::IngressOwned {
            cluster: decode_cluster(cluster),
            namespace: namespace.to_string(),
            ingress: ingress.to_string(),
            suffix: IngressSuffix::Backend {
                service: service.to_string(),
                port: port.to_string(),
            },
        },
        _ => Owner::Foreign,
    }
}

impl Owner {
    /// Does this name belong to the given cluster/namespace/resource-name triple.
    pub fn is_owned_by(&self, cluster: &str, namespace: &str, resource: &str) -> bool {
        match self {
            Owner::ServiceOwned {
                cluster: c,
                namespace: ns,
                service,
                ..
            } => c == cluster && ns == namespace && service == resource,
            Owner::IngressOwned {
                cluster: c,
                namespace: ns,
                ingress,
                ..
            } => c == cluster && ns == namespace && ingress == resource,
            Owner::Foreign => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_name_round_trips() {
        let name = service_backend_name("my/cluster", "default", "web", "8080");
        assert_eq!(name, "my.cluster:default:web:8080");
        match parse_name(&name) {
            Owner::ServiceOwned {
                cluster,
                namespace,
                service,
                port,
            } => {
                assert_eq!(cluster, "my/cluster");
                assert_eq!(namespace, "default");
                assert_eq!(service, "web");
                assert_eq!(port, "8080");
            }
            other => panic!("expected ServiceOwned, got {other:?}"),
        }
    }

    #[test]
    fn ingress_frontend_round_trips() {
        let name = ingress_frontend_name("c1", "ns", "ing1", Scheme::Https);
        assert_eq!(name, "c1:ns:ing1:https");
        match parse_name(&name) {
            Owner::IngressOwned {
                suffix: IngressSuffix::Frontend { scheme },
                ..
            } => assert_eq!(scheme, Scheme::Https),
            other => panic!("expected IngressOwned frontend, got {other:?}"),
        }
    }

    #[test]
    fn ingress_backend_round_trips() {
        let name = ingress_backend_name("c1", "ns", "ing1", "svc", "80");
        match parse_name(&name) {
            Owner::IngressOwned {
                suffix: IngressSuffix::Backend { service, port },
                ..
            } => {
                assert_eq!(service, "svc");
                assert_eq!(port, "80");
            }
            other => panic!("expected IngressOwned backend, got {other:?}"),
        }
    }

    #[test]
    fn malformed_names_are_foreign() {
        assert_eq!(parse_name(""), Owner::Foreign);
        assert_eq!(parse_name("no-colons-here"), Owner::Foreign);
        assert_eq!(parse_name("a:b"), Owner::Foreign);
    }

    #[test]
    fn ownership_check_matches_triple() {
        let owner = parse_name(&service_backend_name("c", "ns", "web", "80"));
        assert!(owner.is_owned_by("c", "ns", "web"));
        assert!(!owner.is_owned_by("c", "ns", "other"));
        assert!(!owner.is_owned_by("c", "other-ns", "web"));
    }
}
