use super::{virtual_network_entry, DesiredObjects, Owner};
use crate::lbclient::{Backend, BackendService, Frontend, Haproxy};
use crate::naming;
use crate::poolspec::PoolSpec;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServicePort {
    pub port: u16,
    pub node_port: u16,
}

#[derive(Debug, Clone)]
pub struct ServiceResourceInput {
    pub ports: Vec<ServicePort>,
}

/// One backend and one frontend per TCP port, matching `I5` (no two ports
/// may share a bind-port — enforced upstream by spec validation, not here).
pub fn desired_objects(
    owner: &Owner<'_>,
    input: &ServiceResourceInput,
    spec: &PoolSpec,
) -> DesiredObjects {
    let mut backends = Vec::new();
    let mut frontends = Vec::new();

    let mut ports = input.ports.clone();
    ports.sort_by_key(|p| p.port);

    for port in &ports {
        let backend_name =
            naming::service_backend_name(owner.cluster, owner.namespace, owner.resource, &port.port.to_string());
        backends.push(Backend {
            name: backend_name.clone(),
            balance: "leastconn".to_string(),
            protocol: "HTTP".to_string(),
            services: vec![BackendService {
                address: "*".to_string(),
                port: port.node_port,
            }],
            rewrite_http: false,
        });

        let bind_port = spec.bind_port_for_service_port(port.port);
        let frontend_name = naming::service_backend_name(
            owner.cluster,
            owner.namespace,
            owner.resource,
            &port.port.to_string(),
        );
        frontends.push(Frontend {
            name: frontend_name,
            bind_address: "0.0.0.0".to_string(),
            bind_port,
            protocol: "TCP".to_string(),
            default_backend: Some(backend_name),
            link_backends: Vec::new(),
            certificates: Vec::new(),
        });
    }

    backends.sort_by(|a, b| a.name.cmp(&b.name));
    frontends.sort_by(|a, b| a.name.cmp(&b.name));

    DesiredObjects {
        haproxy: Haproxy {
            backends,
            frontends,
        },
        secrets: Vec::new(),
        virtual_network: virtual_network_entry(spec),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::poolspec::PoolSpec;

    #[test]
    fn one_backend_and_frontend_per_port() {
        let owner = Owner {
            cluster: "c",
            namespace: "ns",
            resource: "web",
        };
        let input = ServiceResourceInput {
            ports: vec![
                ServicePort {
                    port: 80,
                    node_port: 31000,
                },
                ServicePort {
                    port: 443,
                    node_port: 31001,
                },
            ],
        };
        let spec = PoolSpec::defaulted("c", "ns", "web");
        let desired = desired_objects(&owner, &input, &spec);
        assert_eq!(desired.haproxy.backends.len(), 2);
        assert_eq!(desired.haproxy.frontends.len(), 2);
        // sorted lexicographically by name (I3)
        assert!(desired.haproxy.backends[0].name <= desired.haproxy.backends[1].name);
    }

    #[test]
    fn is_deterministic_given_identical_inputs() {
        let owner = Owner {
            cluster: "c",
            namespace: "ns",
            resource: "web",
        };
        let input = ServiceResourceInput {
            ports: vec![ServicePort {
                port: 80,
                node_port: 31000,
            }],
        };
        let spec = PoolSpec::defaulted("c", "ns", "web");
        let a = desired_objects(&owner, &input, &spec);
        let b = desired_objects(&owner, &input, &spec);
        assert_eq!(a.haproxy, b.haproxy);
    }
}
