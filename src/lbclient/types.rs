use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Backend {
    pub name: String,
    pub balance: String,
    pub protocol: String,
    pub services: Vec<BackendService>,
    pub rewrite_http: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendService {
    pub address: String,
    pub port: u16,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkBackend {
    pub backend: String,
    pub host: Option<String>,
    pub path_regex: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frontend {
    pub name: String,
    pub bind_address: String,
    pub bind_port: u16,
    pub protocol: String,
    pub default_backend: Option<String>,
    pub link_backends: Vec<LinkBackend>,
    pub certificates: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Haproxy {
    pub backends: Vec<Backend>,
    pub frontends: Vec<Frontend>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pool {
    pub name: String,
    pub namespace_group: String,
    pub role: String,
    pub cpus: f64,
    pub mem: u32,
    pub count: u32,
    pub virtual_networks: Vec<String>,
    pub constraints: Vec<String>,
    pub cloud_provider_config: Option<String>,
    pub secrets: Vec<String>,
    pub haproxy: Haproxy,
}

/// Endpoint/status information reported by the external LB for a pool, as
/// distinct from the pool's desired configuration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PoolMetadata {
    pub frontend_endpoints: Vec<FrontendEndpoint>,
    pub elb_listeners: Vec<ElbListener>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FrontendEndpoint {
    pub frontend_name: String,
    pub private_ips: Vec<String>,
    pub public_ips: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ElbListener {
    pub frontend_name: String,
    pub dns_name: String,
}
