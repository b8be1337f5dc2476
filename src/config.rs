use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 5000;
pub const DEFAULT_MODEL_PATH: &str = "train/model.json";
pub const DEFAULT_LABELS_PATH: &str = "train/class_mapping.json";
pub const DEFAULT_INFERENCE_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var}={value:?} is not a valid {expected}")]
    Invalid {
        var: &'static str,
        value: String,
        expected: &'static str,
    },
}

/// Runtime settings for the prediction server, read from the environment.
///
/// | variable               | default                     |
/// |------------------------|-----------------------------|
/// | `HOST`                 | `0.0.0.0`                   |
/// | `PORT`                 | `5000`                      |
/// | `MODEL_PATH`           | `train/model.json`          |
/// | `LABELS_PATH`          | `train/class_mapping.json`  |
/// | `INFERENCE_TIMEOUT_MS` | `30000` (`0` disables)      |
/// | `MAX_UPLOAD_BYTES`     | `10485760`                  |
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub model_path: PathBuf,
    pub labels_path: PathBuf,
    pub inference_timeout: Option<Duration>,
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            host: DEFAULT_HOST.to_owned(),
            port: DEFAULT_PORT,
            model_path: PathBuf::from(DEFAULT_MODEL_PATH),
            labels_path: PathBuf::from(DEFAULT_LABELS_PATH),
            inference_timeout: Some(Duration::from_millis(DEFAULT_INFERENCE_TIMEOUT_MS)),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<ServerConfig, ConfigError> {
        ServerConfig::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from any key → value source. Unset or blank keys
    /// fall back to their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<ServerConfig, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_owned()).filter(|v| !v.is_empty());
        let mut cfg = ServerConfig::default();

        if let Some(host) = get("HOST") {
            cfg.host = host;
        }
        if let Some(port) = get("PORT") {
            cfg.port = parse("PORT", port, "port number")?;
        }
        if let Some(path) = get("MODEL_PATH") {
            cfg.model_path = PathBuf::from(path);
        }
        if let Some(path) = get("LABELS_PATH") {
            cfg.labels_path = PathBuf::from(path);
        }
        if let Some(ms) = get("INFERENCE_TIMEOUT_MS") {
            let ms: u64 = parse("INFERENCE_TIMEOUT_MS", ms, "millisecond count")?;
            cfg.inference_timeout = (ms > 0).then(|| Duration::from_millis(ms));
        }
        if let Some(bytes) = get("MAX_UPLOAD_BYTES") {
            cfg.max_upload_bytes = parse("MAX_UPLOAD_BYTES", bytes, "byte count")?;
        }
        Ok(cfg)
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse<T: std::str::FromStr>(var: &'static str, value: String, expected: &'static str) -> Result<T, ConfigError> {
    match value.parse() {
        Ok(v) => Ok(v),
        Err(_) => Err(ConfigError::Invalid { var, value, expected }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_unset() {
        let cfg = ServerConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(cfg, ServerConfig::default());
        assert_eq!(cfg.bind_addr(), "0.0.0.0:5000");
    }

    #[test]
    fn overrides_apply() {
        let cfg = ServerConfig::from_lookup(lookup(&[
            ("PORT", "8080"),
            ("MODEL_PATH", "/srv/model.json"),
            ("INFERENCE_TIMEOUT_MS", "0"),
            ("MAX_UPLOAD_BYTES", "1024"),
        ])).unwrap();
        assert_eq!(cfg.port, 8080);
        assert_eq!(cfg.model_path, PathBuf::from("/srv/model.json"));
        assert_eq!(cfg.inference_timeout, None);
        assert_eq!(cfg.max_upload_bytes, 1024);
    }

    #[test]
    fn blank_value_uses_default() {
        let cfg = ServerConfig::from_lookup(lookup(&[("PORT", "  ")])).unwrap();
        assert_eq!(cfg.port, DEFAULT_PORT);
    }

    #[test]
    fn bad_port_names_the_variable() {
        let err = ServerConfig::from_lookup(lookup(&[("PORT", "eighty")])).unwrap_err();
        assert!(err.to_string().starts_with("PORT="), "{err}");
    }
}
