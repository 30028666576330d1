//! Default values for a `PoolSpec`, plain functions so they can be used both
//! as `#[serde(default = "...")]` targets and from the defaulting pass that
//! runs after annotation parsing.

pub fn default_role() -> String {
    "slave_public".to_string()
}

/// The sentinel meaning "host network" rather than a named virtual network.
pub const HOST_NETWORK: &str = "__host__";

pub fn default_network() -> String {
    HOST_NETWORK.to_string()
}

pub fn default_cpus() -> f64 {
    0.1
}

pub fn default_mem() -> u32 {
    128
}

pub fn default_size() -> u32 {
    1
}

pub fn default_translation_paused() -> bool {
    false
}

pub fn default_http_mode_enabled() -> bool {
    true
}

pub fn default_http_port() -> u16 {
    80
}

pub fn default_https_port() -> u16 {
    443
}

pub fn pool_name(cluster: &str, namespace: &str, resource: &str) -> String {
    format!("{cluster}--{namespace}--{resource}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_name_joins_with_double_dash() {
        assert_eq!(pool_name("prod", "default", "web"), "prod--default--web");
    }
}
