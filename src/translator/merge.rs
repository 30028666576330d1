use std::collections::HashSet;

use super::{DesiredObjects, Owner};
use crate::lbclient::{Backend, Frontend, Pool};
use crate::naming;
use crate::poolspec::PoolSpec;

pub struct MergeResult {
    pub pool: Pool,
    pub changed: bool,
}

fn owned_by(owner: &Owner<'_>, name: &str) -> bool {
    naming::parse_name(name).is_owned_by(owner.cluster, owner.namespace, owner.resource)
}

/// Implements the six-step per-object-class merge: preserve foreign objects,
/// drop stale owned ones, replace changed ones, insert new ones, then
/// reference-count backends so nothing orphaned survives.
pub fn merge(owner: &Owner<'_>, spec: &PoolSpec, desired: &DesiredObjects, mut observed: Pool) -> MergeResult {
    let being_removed = desired.haproxy.backends.is_empty() && desired.haproxy.frontends.is_empty();

    let mut backends: Vec<Backend> = observed
        .haproxy
        .backends
        .iter()
        .filter(|b| !owned_by(owner, &b.name))
        .cloned()
        .collect();

    let mut frontends: Vec<Frontend> = observed
        .haproxy
        .frontends
        .iter()
        .filter(|f| !owned_by(owner, &f.name))
        .cloned()
        .collect();

    if !being_removed {
        backends.extend(desired.haproxy.backends.iter().cloned());
        frontends.extend(desired.haproxy.frontends.iter().cloned());
    } else {
        // step 6: strip references to this resource's backends from retained
        // foreign frontends, then drop any frontend left with an empty map.
        let dropped_backend_names: HashSet<String> = observed
            .haproxy
            .backends
            .iter()
            .filter(|b| owned_by(owner, &b.name))
            .map(|b| b.name.clone())
            .collect();

        for frontend in frontends.iter_mut() {
            if let Some(def) = &frontend.default_backend {
                if dropped_backend_names.contains(def) {
                    frontend.default_backend = None;
                }
            }
            frontend
                .link_backends
                .retain(|link| !dropped_backend_names.contains(&link.backend));
        }
        frontends.retain(|f| f.default_backend.is_some() || !f.link_backends.is_empty());
    }

    // step 5: reference-counted GC — drop any backend no frontend references.
    let referenced: HashSet<String> = frontends
        .iter()
        .flat_map(|f| {
            f.default_backend
                .iter()
                .cloned()
                .chain(f.link_backends.iter().map(|l| l.backend.clone()))
        })
        .collect();
    backends.retain(|b| !owned_by(owner, &b.name) || referenced.contains(&b.name));

    backends.sort_by(|a, b| a.name.cmp(&b.name));
    frontends.sort_by(|a, b| a.name.cmp(&b.name));

    let mut secrets: Vec<String> = observed
        .secrets
        .iter()
        .filter(|s| !desired.secrets.contains(s))
        .cloned()
        .collect();
    if !being_removed {
        secrets.extend(desired.secrets.iter().cloned());
    }
    secrets.sort();
    secrets.dedup();

    let virtual_networks: Vec<String> = desired.virtual_network.clone().into_iter().collect();

    let changed = backends != observed.haproxy.backends
        || frontends != observed.haproxy.frontends
        || secrets != observed.secrets
        || (observed.cpus - spec.cpus).abs() > f64::EPSILON
        || observed.mem != spec.mem
        || observed.count != spec.size
        || observed.cloud_provider_config != spec.cloud_provider_config
        || observed.virtual_networks != virtual_networks;

    observed.cpus = spec.cpus;
    observed.mem = spec.mem;
    observed.count = spec.size;
    observed.cloud_provider_config = spec.cloud_provider_config.clone();
    observed.virtual_networks = virtual_networks;
    observed.haproxy.backends = backends;
    observed.haproxy.frontends = frontends;
    observed.secrets = secrets;

    MergeResult {
        pool: observed,
        changed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lbclient::{BackendService, Haproxy};

    fn empty_pool(spec: &PoolSpec) -> Pool {
        Pool {
            name: spec.name.clone(),
            namespace_group: "group".to_string(),
            role: spec.role.clone(),
            cpus: spec.cpus,
            mem: spec.mem,
            count: spec.size,
            virtual_networks: Vec::new(),
            constraints: Vec::new(),
            cloud_provider_config: None,
            secrets: Vec::new(),
            haproxy: Haproxy::default(),
        }
    }

    #[test]
    fn foreign_objects_survive_unowned() {
        let owner = Owner {
            cluster: "c",
            namespace: "ns",
            resource: "web",
        };
        let spec = PoolSpec::defaulted("c", "ns", "web");
        let mut pool = empty_pool(&spec);
        pool.haproxy.backends.push(Backend {
            name: "foreign-backend".to_string(),
            balance: "leastconn".to_string(),
            protocol: "HTTP".to_string(),
            services: vec![BackendService {
                address: "1.2.3.4".to_string(),
                port: 80,
            }],
            rewrite_http: false,
        });
        let desired = DesiredObjects {
            haproxy: Haproxy::default(),
            secrets: Vec::new(),
            virtual_network: None,
        };
        let result = merge(&owner, &spec, &desired, pool);
        assert!(result
            .pool
            .haproxy
            .backends
            .iter()
            .any(|b| b.name == "foreign-backend"));
    }

    #[test]
    fn reapplying_identical_desired_state_reports_no_change() {
        let owner = Owner {
            cluster: "c",
            namespace: "ns",
            resource: "web",
        };
        let spec = PoolSpec::defaulted("c", "ns", "web");
        let backend = Backend {
            name: naming::service_backend_name("c", "ns", "web", "80"),
            balance: "leastconn".to_string(),
            protocol: "HTTP".to_string(),
            services: vec![BackendService {
                address: "*".to_string(),
                port: 31000,
            }],
            rewrite_http: false,
        };
        let frontend = Frontend {
            name: naming::service_backend_name("c", "ns", "web", "80"),
            bind_address: "0.0.0.0".to_string(),
            bind_port: 80,
            protocol: "TCP".to_string(),
            default_backend: Some(backend.name.clone()),
            link_backends: Vec::new(),
            certificates: Vec::new(),
        };
        let mut pool = empty_pool(&spec);
        pool.haproxy.backends.push(backend.clone());
        pool.haproxy.frontends.push(frontend.clone());

        let desired = DesiredObjects {
            haproxy: Haproxy {
                backends: vec![backend],
                frontends: vec![frontend],
            },
            secrets: Vec::new(),
            virtual_network: None,
        };
        let result = merge(&owner, &spec, &desired, pool);
        assert!(!result.changed);
    }
}
