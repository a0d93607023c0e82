//! Server configuration from environment variables.

use std::net::SocketAddr;
use std::path::PathBuf;

use mdlab_core::identity::DEFAULT_PBKDF2_ITERATIONS;
use mdlab_core::PricePolicy;

pub use mdlab_core::{APP_NAME, APP_VERSION};

pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8080";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{var}: {message}")]
    Invalid { var: &'static str, message: String },
}

/// Runtime configuration for the API server.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub db_path: PathBuf,
    pub bind_addr: SocketAddr,
    pub price_policy: PricePolicy,
    pub pbkdf2_iterations: u32,
}

impl ApiConfig {
    /// Read `MDLAB_*` variables, falling back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup (tests pass a map).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let db_path = get("MDLAB_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(default_db_path);

        let bind_addr = get("MDLAB_BIND_ADDR")
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string())
            .parse()
            .map_err(|e: std::net::AddrParseError| ConfigError::Invalid {
                var: "MDLAB_BIND_ADDR",
                message: e.to_string(),
            })?;

        let price_policy = match get("MDLAB_PRICE_POLICY") {
            Some(raw) => raw.parse().map_err(|message| ConfigError::Invalid {
                var: "MDLAB_PRICE_POLICY",
                message,
            })?,
            None => PricePolicy::default(),
        };

        let pbkdf2_iterations = match get("MDLAB_PBKDF2_ITERATIONS") {
            Some(raw) => match raw.trim().parse::<u32>() {
                Ok(n) if n > 0 => n,
                _ => {
                    return Err(ConfigError::Invalid {
                        var: "MDLAB_PBKDF2_ITERATIONS",
                        message: format!("expected a positive integer, got '{}'", raw),
                    })
                }
            },
            None => DEFAULT_PBKDF2_ITERATIONS,
        };

        Ok(Self {
            db_path,
            bind_addr,
            price_policy,
            pbkdf2_iterations,
        })
    }
}

/// `<data dir>/mdlab/mdlab.db`, or the working directory when no data dir exists.
pub fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("mdlab")
        .join("mdlab.db")
}

/// Log filter used when `RUST_LOG` is unset.
pub fn default_log_filter() -> &'static str {
    "mdlab_api=info,mdlab_core=info,tower_http=info"
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<ApiConfig, ConfigError> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ApiConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn defaults() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.bind_addr.to_string(), DEFAULT_BIND_ADDR);
        assert_eq!(config.price_policy, PricePolicy::Enforce);
        assert_eq!(config.pbkdf2_iterations, DEFAULT_PBKDF2_ITERATIONS);
        assert!(config.db_path.ends_with("mdlab/mdlab.db"));
    }

    #[test]
    fn overrides() {
        let config = config_from(&[
            ("MDLAB_DB_PATH", "/tmp/lab.db"),
            ("MDLAB_BIND_ADDR", "0.0.0.0:9000"),
            ("MDLAB_PRICE_POLICY", "trust"),
            ("MDLAB_PBKDF2_ITERATIONS", "1000"),
        ])
        .unwrap();
        assert_eq!(config.db_path, PathBuf::from("/tmp/lab.db"));
        assert_eq!(config.bind_addr.port(), 9000);
        assert_eq!(config.price_policy, PricePolicy::ClientTrusted);
        assert_eq!(config.pbkdf2_iterations, 1000);
    }

    #[test]
    fn invalid_values_name_the_variable() {
        let err = config_from(&[("MDLAB_BIND_ADDR", "localhost")]).unwrap_err();
        assert!(err.to_string().starts_with("MDLAB_BIND_ADDR"));

        let err = config_from(&[("MDLAB_PRICE_POLICY", "sometimes")]).unwrap_err();
        assert!(err.to_string().starts_with("MDLAB_PRICE_POLICY"));

        let err = config_from(&[("MDLAB_PBKDF2_ITERATIONS", "0")]).unwrap_err();
        assert!(err.to_string().starts_with("MDLAB_PBKDF2_ITERATIONS"));
    }

    #[test]
    fn default_filter_covers_both_crates() {
        let filter = default_log_filter();
        assert!(filter.contains("mdlab_api"));
        assert!(filter.contains("mdlab_core"));
    }

    #[test]
    fn app_version_matches_cargo() {
        assert_eq!(APP_VERSION, "0.1.0");
    }
}
