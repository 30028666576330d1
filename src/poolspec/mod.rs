//! Pool-spec parsing, defaulting, validation, and transition checking.
//! Shared by the admission path and the reconcile path so both see the same
//! rules.

mod parse;
mod types;

pub use parse::{parse_from_annotations, PoolSpecSource};
pub use types::{CloudProviderConfigRef, CreationStrategy, FrontendHttp, FrontendSpec, PoolSpec};

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PoolSpecError {
    #[error("invalid YAML in {0}: {1}")]
    InvalidYaml(String, String),
    #[error("cpus must be a positive number, got {0:?}")]
    InvalidCpus(String),
    #[error("mem must be a positive integer, got {0:?}")]
    InvalidMem(String),
    #[error("size must be a positive integer, got {0:?}")]
    InvalidSize(String),
    #[error("creationStrategy must be one of IfNotPresent, Never, Once, got {0:?}")]
    InvalidCreationStrategy(String),
    #[error("frontend bind port {0} is out of range [1, 65535]")]
    PortOutOfRange(u32),
    #[error("translationPaused must be a boolean, got {0:?}")]
    InvalidBoolean(String),
    #[error("two service ports map to the same frontend bind-port {0}")]
    DuplicateBindPort(u16),
    #[error("cloud-provider-config-configmap must be <name>/<key>, got {0:?}")]
    InvalidConfigMapRef(String),
    #[error("transition changes immutable field {field}: {from:?} -> {to:?}")]
    ImmutableFieldChanged {
        field: &'static str,
        from: String,
        to: String,
    },
}

/// Validates a fully-defaulted `PoolSpec` in isolation (no access to the
/// previous generation — see `validate_transition` for that).
pub fn validate(spec: &PoolSpec) -> Result<(), PoolSpecError> {
    if !(spec.cpus.is_finite() && spec.cpus > 0.0) {
        return Err(PoolSpecError::InvalidCpus(spec.cpus.to_string()));
    }
    if spec.mem == 0 {
        return Err(PoolSpecError::InvalidMem(spec.mem.to_string()));
    }
    if spec.size == 0 {
        return Err(PoolSpecError::InvalidSize(spec.size.to_string()));
    }

    let mut bind_ports: Vec<u16> = Vec::new();
    for (_service_port, bind_port) in &spec.port_map {
        if *bind_port == 0 {
            return Err(PoolSpecError::PortOutOfRange(*bind_port as u32));
        }
        if bind_ports.contains(bind_port) {
            return Err(PoolSpecError::DuplicateBindPort(*bind_port));
        }
        bind_ports.push(*bind_port);
    }

    if let Some(http) = &spec.frontends_http {
        if http.port == 0 {
            return Err(PoolSpecError::PortOutOfRange(http.port as u32));
        }
    }
    if let Some(https) = &spec.frontends_https {
        if https.port == 0 {
            return Err(PoolSpecError::PortOutOfRange(https.port as u32));
        }
    }

    Ok(())
}

/// Enforces immutability of `name`, `role`, and `network` across generations.
/// Any other field may change freely between reconciles.
pub fn validate_transition(previous: &PoolSpec, next: &PoolSpec) -> Result<(), PoolSpecError> {
    if previous.name != next.name {
        return Err(PoolSpecError::ImmutableFieldChanged {
            field: "name",
            from: previous.name.clone(),
            to: next.name.clone(),
        });
    }
    if previous.role != next.role {
        return Err(PoolSpecError::ImmutableFieldChanged {
            field: "role",
            from: previous.role.clone(),
            to: next.role.clone(),
        });
    }
    if previous.network != next.network {
        return Err(PoolSpecError::ImmutableFieldChanged {
            field: "network",
            from: previous.network.clone(),
            to: next.network.clone(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_spec() -> PoolSpec {
        PoolSpec::defaulted("cluster", "ns", "res")
    }

    #[test]
    fn defaulted_spec_is_valid() {
        assert!(validate(&base_spec()).is_ok());
    }

    #[test]
    fn zero_cpus_is_rejected() {
        let mut spec = base_spec();
        spec.cpus = 0.0;
        assert!(matches!(validate(&spec), Err(PoolSpecError::InvalidCpus(_))));
    }

    #[test]
    fn duplicate_bind_ports_are_rejected() {
        let mut spec = base_spec();
        spec.port_map = vec![(80, 10000), (443, 10000)];
        assert!(matches!(
            validate(&spec),
            Err(PoolSpecError::DuplicateBindPort(10000))
        ));
    }

    #[test]
    fn transition_rejects_name_change() {
        let previous = base_spec();
        let mut next = previous.clone();
        next.name = "renamed".to_string();
        assert!(matches!(
            validate_transition(&previous, &next),
            Err(PoolSpecError::ImmutableFieldChanged { field: "name", .. })
        ));
    }

    #[test]
    fn transition_allows_size_change() {
        let previous = base_spec();
        let mut next = previous.clone();
        next.size = 5;
        assert!(validate_transition(&previous, &next).is_ok());
    }
}
