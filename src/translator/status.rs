use std::collections::BTreeSet;

use tracing::warn;

use super::Owner;
use crate::lbclient::{with_deadline, PoolClient};
use crate::naming;

/// Projection of external-LB pool metadata into a Kubernetes LoadBalancer
/// status, filtered to endpoints this resource owns (I6) and ordered
/// hostnames-then-private-IPs-then-public-IPs, each sorted and deduplicated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusSnapshot {
    pub hostnames: Vec<String>,
    pub private_ips: Vec<String>,
    pub public_ips: Vec<String>,
}

/// Reads pool metadata and projects it to a status snapshot. A failure here
/// (including `NotFound`) is logged and swallowed — status-read errors never
/// fail translation.
pub async fn synthesize(owner: &Owner<'_>, pool_client: &dyn PoolClient, pool_name: &str) -> Option<StatusSnapshot> {
    let metadata = match with_deadline(pool_client.get_pool_metadata(pool_name)).await {
        Ok(metadata) => metadata,
        Err(e) => {
            warn!(pool = pool_name, error = %e, "could not read pool status");
            return None;
        }
    };

    let mut hostnames = BTreeSet::new();
    let mut private_ips = BTreeSet::new();
    let mut public_ips = BTreeSet::new();

    for endpoint in &metadata.frontend_endpoints {
        if !naming::parse_name(&endpoint.frontend_name).is_owned_by(owner.cluster, owner.namespace, owner.resource) {
            continue;
        }
        private_ips.extend(endpoint.private_ips.iter().cloned());
        public_ips.extend(endpoint.public_ips.iter().cloned());
    }

    for listener in &metadata.elb_listeners {
        if !naming::parse_name(&listener.frontend_name).is_owned_by(owner.cluster, owner.namespace, owner.resource) {
            continue;
        }
        hostnames.insert(listener.dns_name.to_lowercase());
    }

    Some(StatusSnapshot {
        hostnames: hostnames.into_iter().collect(),
        private_ips: private_ips.into_iter().collect(),
        public_ips: public_ips.into_iter().collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lbclient::{ElbListener, FakePoolClient, FrontendEndpoint, PoolMetadata};

    #[tokio::test]
    async fn only_owned_frontends_contribute_to_status() {
        let owner = Owner {
            cluster: "c",
            namespace: "ns",
            resource: "web",
        };
        let owned_frontend = naming::service_backend_name("c", "ns", "web", "80");
        let client = FakePoolClient::new("group").with_metadata(
            "pool1",
            PoolMetadata {
                frontend_endpoints: vec![
                    FrontendEndpoint {
                        frontend_name: owned_frontend.clone(),
                        private_ips: vec!["10.0.0.2".to_string(), "10.0.0.1".to_string()],
                        public_ips: vec![],
                    },
                    FrontendEndpoint {
                        frontend_name: "foreign".to_string(),
                        private_ips: vec!["10.9.9.9".to_string()],
                        public_ips: vec![],
                    },
                ],
                elb_listeners: vec![ElbListener {
                    frontend_name: owned_frontend,
                    dns_name: "MyElb.Example.com".to_string(),
                }],
            },
        );

        let snapshot = synthesize(&owner, &client, "pool1").await.unwrap();
        assert_eq!(snapshot.private_ips, vec!["10.0.0.1", "10.0.0.2"]);
        assert_eq!(snapshot.hostnames, vec!["myelb.example.com"]);
    }

    #[tokio::test]
    async fn missing_metadata_returns_none_without_erroring() {
        let owner = Owner {
            cluster: "c",
            namespace: "ns",
            resource: "web",
        };
        let client = FakePoolClient::new("group");
        assert!(synthesize(&owner, &client, "nonexistent").await.is_none());
    }
}
