use std::collections::BTreeMap;

use super::{CloudProviderConfigRef, CreationStrategy, FrontendHttp, PoolSpec, PoolSpecError};
use crate::{defaults, DKLB_CONFIG_ANNOTATION, LEGACY_ANNOTATION_PREFIX};

/// Where a spec came from, surfaced for logging and for the admission
/// response's decision on whether a defaulting patch is needed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolSpecSource {
    YamlAnnotation,
    LegacyAnnotations,
    Defaults,
}

/// The shape of the YAML body carried by `kubernetes.dcos.io/dklb-config`.
/// All fields optional: anything left out is defaulted by `PoolSpec::defaulted`.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct YamlConfig {
    name: Option<String>,
    role: Option<String>,
    network: Option<String>,
    cpus: Option<f64>,
    mem: Option<u32>,
    size: Option<u32>,
    creation_strategy: Option<String>,
    translation_paused: Option<bool>,
    cloud_provider_config: Option<String>,
    cloud_provider_config_ref: Option<YamlConfigMapRef>,
    #[serde(default)]
    port_map: BTreeMap<u16, u16>,
    frontends: Option<YamlFrontends>,
}

#[derive(Debug, Default, serde::Deserialize)]
struct YamlConfigMapRef {
    name: String,
    key: String,
}

#[derive(Debug, Default, serde::Deserialize)]
struct YamlFrontends {
    http: Option<YamlFrontend>,
    https: Option<YamlFrontend>,
}

#[derive(Debug, Default, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct YamlFrontend {
    mode: Option<String>,
    port: Option<u16>,
}

fn frontend_from_yaml(yaml: Option<YamlFrontend>, default_port: u16) -> Option<FrontendHttp> {
    yaml.map(|f| FrontendHttp {
        mode_enabled: f.mode.as_deref() != Some("disabled"),
        port: f.port.unwrap_or(default_port),
    })
}

/// Parses a spec out of a resource's annotation map. Prefers the YAML
/// annotation; falls back to the legacy discrete-annotation prefix; falls
/// back further to an all-defaults spec if neither is present.
pub fn parse_from_annotations(
    annotations: &BTreeMap<String, String>,
    cluster: &str,
    namespace: &str,
    resource: &str,
) -> Result<(PoolSpec, PoolSpecSource), PoolSpecError> {
    let mut spec = PoolSpec::defaulted(cluster, namespace, resource);

    if let Some(raw) = annotations.get(DKLB_CONFIG_ANNOTATION) {
        let parsed: YamlConfig = serde_yaml::from_str(raw)
            .map_err(|e| PoolSpecError::InvalidYaml(DKLB_CONFIG_ANNOTATION.to_string(), e.to_string()))?;
        apply_yaml(&mut spec, parsed)?;
        return Ok((spec, PoolSpecSource::YamlAnnotation));
    }

    let legacy: BTreeMap<&str, &str> = annotations
        .iter()
        .filter_map(|(k, v)| {
            k.strip_prefix(LEGACY_ANNOTATION_PREFIX)
                .map(|suffix| (suffix, v.as_str()))
        })
        .collect();

    if legacy.is_empty() {
        return Ok((spec, PoolSpecSource::Defaults));
    }

    apply_legacy(&mut spec, &legacy)?;
    Ok((spec, PoolSpecSource::LegacyAnnotations))
}

fn apply_yaml(spec: &mut PoolSpec, yaml: YamlConfig) -> Result<(), PoolSpecError> {
    if let Some(name) = yaml.name {
        spec.name = name;
    }
    if let Some(role) = yaml.role {
        spec.role = role;
    }
    if let Some(network) = yaml.network {
        spec.network = network;
    }
    if let Some(cpus) = yaml.cpus {
        spec.cpus = cpus;
    }
    if let Some(mem) = yaml.mem {
        spec.mem = mem;
    }
    if let Some(size) = yaml.size {
        spec.size = size;
    }
    if let Some(strategy) = yaml.creation_strategy {
        spec.creation_strategy = strategy
            .parse::<CreationStrategy>()
            .map_err(|_| PoolSpecError::InvalidCreationStrategy(strategy.clone()))?;
    }
    if let Some(paused) = yaml.translation_paused {
        spec.translation_paused = paused;
    }
    if yaml.cloud_provider_config.is_some() {
        spec.cloud_provider_config = yaml.cloud_provider_config;
    }
    if let Some(cref) = yaml.cloud_provider_config_ref {
        spec.cloud_provider_config_ref = Some(CloudProviderConfigRef {
            name: cref.name,
            key: cref.key,
        });
    }
    if !yaml.port_map.is_empty() {
        spec.port_map = yaml.port_map.into_iter().collect();
    }
    if let Some(frontends) = yaml.frontends {
        spec.frontends_http = frontend_from_yaml(frontends.http, defaults::default_http_port());
        spec.frontends_https = frontend_from_yaml(frontends.https, defaults::default_https_port());
    }
    Ok(())
}

fn apply_legacy(
    spec: &mut PoolSpec,
    legacy: &BTreeMap<&str, &str>,
) -> Result<(), PoolSpecError> {
    if let Some(name) = legacy.get("name") {
        spec.name = name.to_string();
    }
    if let Some(role) = legacy.get("role") {
        spec.role = role.to_string();
    }
    if let Some(network) = legacy.get("network") {
        spec.network = network.to_string();
    }
    if let Some(cpus) = legacy.get("cpus") {
        spec.cpus = cpus
            .parse::<f64>()
            .map_err(|_| PoolSpecError::InvalidCpus(cpus.to_string()))?;
    }
    if let Some(mem) = legacy.get("mem") {
        spec.mem = mem
            .parse::<u32>()
            .map_err(|_| PoolSpecError::InvalidMem(mem.to_string()))?;
    }
    if let Some(size) = legacy.get("size") {
        spec.size = size
            .parse::<u32>()
            .map_err(|_| PoolSpecError::InvalidSize(size.to_string()))?;
    }
    if let Some(strategy) = legacy.get("creation-strategy") {
        spec.creation_strategy = strategy
            .parse::<CreationStrategy>()
            .map_err(|_| PoolSpecError::InvalidCreationStrategy(strategy.to_string()))?;
    }
    if let Some(paused) = legacy.get("translation-paused") {
        spec.translation_paused = paused
            .parse::<bool>()
            .map_err(|_| PoolSpecError::InvalidBoolean(paused.to_string()))?;
    }
    if let Some(configmap) = legacy.get("cloud-provider-config-configmap") {
        let (name, key) = configmap
            .split_once('/')
            .ok_or_else(|| PoolSpecError::InvalidConfigMapRef(configmap.to_string()))?;
        spec.cloud_provider_config_ref = Some(CloudProviderConfigRef {
            name: name.to_string(),
            key: key.to_string(),
        });
    }

    let mut port_map: Vec<(u16, u16)> = Vec::new();
    for (key, value) in legacy {
        if let Some(service_port) = key.strip_prefix("portmap.") {
            let service_port = service_port
                .parse::<u16>()
                .map_err(|_| PoolSpecError::PortOutOfRange(0))?;
            let bind_port = value
                .parse::<u16>()
                .map_err(|_| PoolSpecError::PortOutOfRange(0))?;
            port_map.push((service_port, bind_port));
        }
    }
    if !port_map.is_empty() {
        spec.port_map = port_map;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn annotations(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn no_annotations_yields_defaults() {
        let (spec, source) = parse_from_annotations(&BTreeMap::new(), "c", "ns", "res").unwrap();
        assert_eq!(source, PoolSpecSource::Defaults);
        assert_eq!(spec.cpus, defaults::default_cpus());
    }

    #[test]
    fn yaml_annotation_overrides_defaults() {
        let yaml = "size: 3\ncpus: 0.5\ncreationStrategy: Never\n";
        let ann = annotations(&[(DKLB_CONFIG_ANNOTATION, yaml)]);
        let (spec, source) = parse_from_annotations(&ann, "c", "ns", "res").unwrap();
        assert_eq!(source, PoolSpecSource::YamlAnnotation);
        assert_eq!(spec.size, 3);
        assert_eq!(spec.cpus, 0.5);
        assert_eq!(spec.creation_strategy, CreationStrategy::Never);
    }

    #[test]
    fn legacy_annotations_are_understood() {
        let ann = annotations(&[
            ("kubernetes.dcos.io/edgelb-pool-size", "4"),
            ("kubernetes.dcos.io/edgelb-pool-cpus", "0.25"),
        ]);
        let (spec, source) = parse_from_annotations(&ann, "c", "ns", "res").unwrap();
        assert_eq!(source, PoolSpecSource::LegacyAnnotations);
        assert_eq!(spec.size, 4);
        assert_eq!(spec.cpus, 0.25);
    }

    #[test]
    fn invalid_yaml_is_rejected() {
        let ann = annotations(&[(DKLB_CONFIG_ANNOTATION, "size: [this is not valid: -")]);
        assert!(parse_from_annotations(&ann, "c", "ns", "res").is_err());
    }

    #[test]
    fn yaml_name_overrides_default() {
        let ann = annotations(&[(DKLB_CONFIG_ANNOTATION, "name: baz\n")]);
        let (spec, _) = parse_from_annotations(&ann, "c", "ns", "res").unwrap();
        assert_eq!(spec.name, "baz");
    }

    #[test]
    fn legacy_name_overrides_default() {
        let ann = annotations(&[("kubernetes.dcos.io/edgelb-pool-name", "baz")]);
        let (spec, _) = parse_from_annotations(&ann, "c", "ns", "res").unwrap();
        assert_eq!(spec.name, "baz");
    }

    #[test]
    fn legacy_portmap_keys_build_port_map() {
        let ann = annotations(&[
            ("kubernetes.dcos.io/edgelb-pool-portmap.80", "10080"),
            ("kubernetes.dcos.io/edgelb-pool-portmap.443", "10443"),
        ]);
        let (spec, _) = parse_from_annotations(&ann, "c", "ns", "res").unwrap();
        assert_eq!(spec.bind_port_for_service_port(80), 10080);
        assert_eq!(spec.bind_port_for_service_port(443), 10443);
    }

    #[test]
    fn legacy_cloud_provider_config_configmap_is_parsed() {
        let ann = annotations(&[(
            "kubernetes.dcos.io/edgelb-pool-cloud-provider-config-configmap",
            "aws-config/credentials",
        )]);
        let (spec, _) = parse_from_annotations(&ann, "c", "ns", "res").unwrap();
        let cref = spec.cloud_provider_config_ref.unwrap();
        assert_eq!(cref.name, "aws-config");
        assert_eq!(cref.key, "credentials");
    }

    #[test]
    fn legacy_cloud_provider_config_configmap_without_slash_is_rejected() {
        let ann = annotations(&[(
            "kubernetes.dcos.io/edgelb-pool-cloud-provider-config-configmap",
            "aws-config",
        )]);
        assert!(matches!(
            parse_from_annotations(&ann, "c", "ns", "res"),
            Err(PoolSpecError::InvalidConfigMapRef(_))
        ));
    }

    #[test]
    fn yaml_cloud_provider_config_ref_is_parsed() {
        let yaml = "cloudProviderConfigRef:\n  name: aws-config\n  key: credentials\n";
        let ann = annotations(&[(DKLB_CONFIG_ANNOTATION, yaml)]);
        let (spec, _) = parse_from_annotations(&ann, "c", "ns", "res").unwrap();
        let cref = spec.cloud_provider_config_ref.unwrap();
        assert_eq!(cref.name, "aws-config");
        assert_eq!(cref.key, "credentials");
    }
}
