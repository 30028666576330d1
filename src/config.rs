use clap::{Parser, Subcommand, ValueEnum};

/// Top-level CLI, parsed in `main`. A single `Config` struct is threaded
/// through every other component instead of reading `std::env` piecemeal,
/// sourced from flags (with `env` fallback) via `clap`'s derive API.
#[derive(Parser, Debug)]
#[command(name = "edgelb-controller", about = "EdgeLB pool controller")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Runs the reconciliation loop and the admission webhook.
    Run(Config),
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailurePolicy {
    Ignore,
    Fail,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum EdgelbScheme {
    Http,
    Https,
}

#[derive(Parser, Clone, Debug)]
pub struct Config {
    #[arg(long, env = "INGRESS_CLASS_NAME", default_value = "edgelb")]
    pub ingress_class_name: String,

    #[arg(long, env = "CLUSTER_NAME", default_value = "cluster")]
    pub cluster_name: String,

    #[arg(long, env = "KUBECONFIG")]
    pub kubeconfig: Option<String>,

    /// Seconds between periodic resyncs that re-enqueue all resources.
    #[arg(long, env = "RESYNC_PERIOD_SECONDS", default_value_t = 120)]
    pub resync_period_seconds: u64,

    #[arg(long, env = "ADMISSION_TLS_CA_BUNDLE")]
    pub admission_tls_ca_bundle: Option<String>,

    #[arg(long, env = "ADMISSION_FAILURE_POLICY", value_enum, default_value_t = FailurePolicy::Ignore)]
    pub admission_failure_policy: FailurePolicy,

    #[arg(long, env = "ADMISSION_TLS_CERT", default_value = "/certs/tls.crt")]
    pub admission_tls_cert: String,

    #[arg(long, env = "ADMISSION_TLS_KEY", default_value = "/certs/tls.key")]
    pub admission_tls_key: String,

    #[arg(long, env = "ADMISSION_BIND_PORT", default_value_t = 8443)]
    pub admission_bind_port: u16,

    #[arg(long, env = "METRICS_BIND_PORT", default_value_t = 8080)]
    pub metrics_bind_port: u16,

    #[arg(long, env = "EDGELB_HOST", default_value = "edgelb-api.marathon.l4lb.thisdcos.directory")]
    pub edgelb_host: String,

    #[arg(long, env = "EDGELB_PATH", default_value = "/v2")]
    pub edgelb_path: String,

    #[arg(long, env = "EDGELB_SCHEME", value_enum, default_value_t = EdgelbScheme::Http)]
    pub edgelb_scheme: EdgelbScheme,

    #[arg(long, env = "POOL_GROUP", default_value = "dcos")]
    pub pool_group: String,
}

impl Config {
    pub fn edgelb_base_url(&self) -> String {
        let scheme = match self.edgelb_scheme {
            EdgelbScheme::Http => "http",
            EdgelbScheme::Https => "https",
        };
        format!("{scheme}://{}{}", self.edgelb_host, self.edgelb_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn edgelb_base_url_combines_scheme_host_and_path() {
        let config = Config {
            ingress_class_name: "edgelb".to_string(),
            cluster_name: "cluster".to_string(),
            kubeconfig: None,
            resync_period_seconds: 120,
            admission_tls_ca_bundle: None,
            admission_failure_policy: FailurePolicy::Ignore,
            admission_tls_cert: "cert".to_string(),
            admission_tls_key: "key".to_string(),
            admission_bind_port: 8443,
            metrics_bind_port: 8080,
            edgelb_host: "edgelb.example".to_string(),
            edgelb_path: "/v2".to_string(),
            edgelb_scheme: EdgelbScheme::Https,
            pool_group: "dcos".to_string(),
        };
        assert_eq!(config.edgelb_base_url(), "https://edgelb.example/v2");
    }
}
