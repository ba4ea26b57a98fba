//! Configuration loading from disk and environment.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::config::schema::{LogFormat, TrustConfig};
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid value for {var}: {value:?}")]
    Env { var: &'static str, value: String },
    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load, override and validate configuration.
///
/// The TOML file is optional; without one the defaults are the base layer.
pub fn load_config(path: Option<&Path>) -> Result<TrustConfig, ConfigError> {
    let mut config = match path {
        Some(path) => {
            let content = fs::read_to_string(path)?;
            toml::from_str(&content)?
        }
        None => TrustConfig::default(),
    };

    apply_env_overrides(&mut config, |var| std::env::var(var).ok())?;
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Apply the externally supplied settings on top of `config`.
pub fn apply_env_overrides<F>(config: &mut TrustConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(addr) = lookup("BIND_ADDRESS") {
        config.server.bind_address = addr;
    }
    if let Some(port) = lookup("PORT") {
        let port: u16 = parse_var("PORT", port)?;
        let host = config
            .server
            .bind_address
            .rsplit_once(':')
            .map(|(host, _)| host.to_string())
            .unwrap_or_else(|| "0.0.0.0".to_string());
        config.server.bind_address = format!("{}:{}", host, port);
    }
    if let Some(value) = lookup("TRUST_PROXY") {
        config.server.trust_proxy = parse_var("TRUST_PROXY", value)?;
    }
    if let Some(value) = lookup("RATE_LIMIT_WINDOW_MS") {
        config.rate_limit.window_ms = parse_var("RATE_LIMIT_WINDOW_MS", value)?;
    }
    if let Some(value) = lookup("RATE_LIMIT_MAX") {
        config.rate_limit.max_requests = parse_var("RATE_LIMIT_MAX", value)?;
    }
    if let Some(value) = lookup("MAX_FILE_SIZE") {
        config.security.max_file_size = parse_var("MAX_FILE_SIZE", value)?;
    }
    if let Some(origin) = lookup("CORS_ORIGIN") {
        config.server.cors_origin = origin;
    }
    if let Some(secret) = lookup("SESSION_SECRET") {
        config.admin.session_secret = secret;
    }
    if let Some(password) = lookup("ADMIN_PASSWORD") {
        config.admin.password = password;
    }
    if let Some(dir) = lookup("DATA_DIR") {
        config.data_dir = PathBuf::from(dir);
    }
    if let Some(format) = lookup("LOG_FORMAT") {
        config.observability.log_format = match format.to_ascii_lowercase().as_str() {
            "json" => LogFormat::Json,
            "pretty" => LogFormat::Pretty,
            _ => {
                return Err(ConfigError::Env {
                    var: "LOG_FORMAT",
                    value: format,
                })
            }
        };
    }
    Ok(())
}

fn parse_var<T: std::str::FromStr>(var: &'static str, value: String) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::Env { var, value })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |var| map.get(var).cloned()
    }

    #[test]
    fn test_env_overrides() {
        let mut config = TrustConfig::default();
        apply_env_overrides(
            &mut config,
            env(&[
                ("PORT", "8080"),
                ("RATE_LIMIT_MAX", "30"),
                ("RATE_LIMIT_WINDOW_MS", "1000"),
                ("CORS_ORIGIN", "https://tools.example.com"),
                ("LOG_FORMAT", "JSON"),
                ("TRUST_PROXY", "true"),
            ]),
        )
        .unwrap();

        assert_eq!(config.server.bind_address, "0.0.0.0:8080");
        assert_eq!(config.rate_limit.max_requests, 30);
        assert_eq!(config.rate_limit.window_ms, 1000);
        assert_eq!(config.server.cors_origin, "https://tools.example.com");
        assert_eq!(config.observability.log_format, LogFormat::Json);
        assert!(config.server.trust_proxy);
    }

    #[test]
    fn test_bad_env_value_names_variable() {
        let mut config = TrustConfig::default();
        let err = apply_env_overrides(&mut config, env(&[("RATE_LIMIT_MAX", "lots")])).unwrap_err();
        assert!(err.to_string().contains("RATE_LIMIT_MAX"));
    }

    #[test]
    fn test_partial_toml_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[rate_limit]\nmax_requests = 42\n\n[rapid]\nthreshold = 5").unwrap();

        let content = fs::read_to_string(file.path()).unwrap();
        let config: TrustConfig = toml::from_str(&content).unwrap();
        assert_eq!(config.rate_limit.max_requests, 42);
        assert_eq!(config.rate_limit.window_ms, 60_000);
        assert_eq!(config.rapid.threshold, 5);
        assert_eq!(config.audit.capacity, 10_000);
    }
}
