use serde::{Deserialize, Serialize};

use crate::defaults;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CreationStrategy {
    IfNotPresent,
    Never,
    Once,
}

impl Default for CreationStrategy {
    fn default() -> Self {
        CreationStrategy::IfNotPresent
    }
}

impl std::str::FromStr for CreationStrategy {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "IfNotPresent" => Ok(CreationStrategy::IfNotPresent),
            "Never" => Ok(CreationStrategy::Never),
            "Once" => Ok(CreationStrategy::Once),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct FrontendHttp {
    pub mode_enabled: bool,
    pub port: u16,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FrontendSpec {
    pub http: Option<FrontendHttp>,
    pub https: Option<FrontendHttp>,
}

/// Points `cloudProviderConfig` at a key in a ConfigMap in the owning
/// resource's namespace, instead of carrying the JSON blob inline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CloudProviderConfigRef {
    pub name: String,
    pub key: String,
}

/// The resolved, defaulted configuration for a single owned pool. One
/// `PoolSpec` is computed per Service or Ingress generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolSpec {
    pub name: String,
    #[serde(default = "defaults::default_role")]
    pub role: String,
    #[serde(default = "defaults::default_network")]
    pub network: String,
    #[serde(default = "defaults::default_cpus")]
    pub cpus: f64,
    #[serde(default = "defaults::default_mem")]
    pub mem: u32,
    #[serde(default = "defaults::default_size")]
    pub size: u32,
    #[serde(default)]
    pub creation_strategy: CreationStrategy,
    #[serde(default = "defaults::default_translation_paused")]
    pub translation_paused: bool,
    #[serde(default)]
    pub cloud_provider_config: Option<String>,
    /// Alternative to `cloud_provider_config`: resolved from a ConfigMap at
    /// translation time rather than carried inline. If both are set, this
    /// takes precedence.
    #[serde(default)]
    pub cloud_provider_config_ref: Option<CloudProviderConfigRef>,
    /// Service port -> frontend bind port. Empty means identity mapping.
    #[serde(default)]
    pub port_map: Vec<(u16, u16)>,
    #[serde(default)]
    pub frontends_http: Option<FrontendHttp>,
    #[serde(default)]
    pub frontends_https: Option<FrontendHttp>,
}

impl PoolSpec {
    /// Builds an all-defaults spec for the given owner triple. Annotation
    /// parsing starts from this and overlays whatever the user specified.
    pub fn defaulted(cluster: &str, namespace: &str, resource: &str) -> Self {
        PoolSpec {
            name: defaults::pool_name(cluster, namespace, resource),
            role: defaults::default_role(),
            network: defaults::default_network(),
            cpus: defaults::default_cpus(),
            mem: defaults::default_mem(),
            size: defaults::default_size(),
            creation_strategy: CreationStrategy::default(),
            translation_paused: defaults::default_translation_paused(),
            cloud_provider_config: None,
            cloud_provider_config_ref: None,
            port_map: Vec::new(),
            frontends_http: None,
            frontends_https: None,
        }
    }

    pub fn bind_port_for_service_port(&self, service_port: u16) -> u16 {
        self.port_map
            .iter()
            .find(|(sp, _)| *sp == service_port)
            .map(|(_, bp)| *bp)
            .unwrap_or(service_port)
    }

    pub fn http_frontend(&self) -> FrontendHttp {
        self.frontends_http.unwrap_or(FrontendHttp {
            mode_enabled: defaults::default_http_mode_enabled(),
            port: defaults::default_http_port(),
        })
    }

    pub fn https_frontend(&self) -> FrontendHttp {
        self.frontends_https.unwrap_or(FrontendHttp {
            mode_enabled: defaults::default_http_mode_enabled(),
            port: defaults::default_https_port(),
        })
    }
}
