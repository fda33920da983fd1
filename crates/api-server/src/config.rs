//! Server configuration from the environment

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

const DEFAULT_ADDR: &str = "0.0.0.0:8000";
const DEFAULT_ANNOTATIONS_PATH: &str = "data/annotations.xml";
const DEFAULT_MODEL_PATH: &str = "models/receipt-yolov8.onnx";
const DEFAULT_CLOUD_TIMEOUT_SECS: u64 = 30;
const DEFAULT_CORS_ORIGINS: &[&str] = &["http://localhost:8501", "http://127.0.0.1:8501"];

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {name}: {value:?}")]
    InvalidValue { name: &'static str, value: String },
}

/// Everything the server needs to assemble its pipeline
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    /// Bind address (`API_SERVER_ADDR`)
    pub addr: String,
    /// Ground-truth XML (`ANNOTATIONS_PATH`)
    pub annotations_path: PathBuf,
    /// YOLOv8 ONNX model (`YOLO_MODEL_PATH`)
    pub model_path: PathBuf,
    /// Detector class names in id order (`YOLO_CLASS_NAMES`); empty keeps the model default
    pub class_names: Vec<String>,
    /// Document Intelligence endpoint (`AZURE_DI_ENDPOINT`)
    pub azure_endpoint: Option<String>,
    /// Document Intelligence key (`AZURE_DI_KEY`)
    pub azure_key: Option<String>,
    /// Deadline around the cloud call (`CLOUD_TIMEOUT_SECS`)
    pub cloud_timeout: Duration,
    /// Allowed browser origins (`CORS_ALLOWED_ORIGINS`)
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: DEFAULT_ADDR.to_string(),
            annotations_path: PathBuf::from(DEFAULT_ANNOTATIONS_PATH),
            model_path: PathBuf::from(DEFAULT_MODEL_PATH),
            class_names: Vec::new(),
            azure_endpoint: None,
            azure_key: None,
            cloud_timeout: Duration::from_secs(DEFAULT_CLOUD_TIMEOUT_SECS),
            cors_origins: DEFAULT_CORS_ORIGINS.iter().map(ToString::to_string).collect(),
        }
    }
}

impl ServerConfig {
    /// Read the process environment
    ///
    /// Call `dotenvy::dotenv()` first to pick up a `.env` file.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if a numeric variable does not parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from any variable lookup; blank values count as unset
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if a numeric variable does not parse.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let mut config = Self::default();

        if let Some(addr) = var("API_SERVER_ADDR") {
            config.addr = addr;
        }
        if let Some(path) = var("ANNOTATIONS_PATH") {
            config.annotations_path = PathBuf::from(path);
        }
        if let Some(path) = var("YOLO_MODEL_PATH") {
            config.model_path = PathBuf::from(path);
        }
        if let Some(names) = var("YOLO_CLASS_NAMES") {
            config.class_names = split_list(&names);
        }
        config.azure_endpoint = var("AZURE_DI_ENDPOINT");
        config.azure_key = var("AZURE_DI_KEY");

        if let Some(secs) = var("CLOUD_TIMEOUT_SECS") {
            let secs = secs.parse::<u64>().map_err(|_| ConfigError::InvalidValue {
                name: "CLOUD_TIMEOUT_SECS",
                value: secs.clone(),
            })?;
            config.cloud_timeout = Duration::from_secs(secs);
        }
        if let Some(origins) = var("CORS_ALLOWED_ORIGINS") {
            config.cors_origins = split_list(&origins);
        }

        Ok(config)
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ServerConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, ServerConfig::default());
        assert_eq!(config.addr, "0.0.0.0:8000");
        assert_eq!(config.cloud_timeout, Duration::from_secs(30));
        assert_eq!(
            config.cors_origins,
            vec!["http://localhost:8501", "http://127.0.0.1:8501"]
        );
        assert!(config.azure_endpoint.is_none());
    }

    #[test]
    fn test_overrides() {
        let config = ServerConfig::from_lookup(lookup(&[
            ("API_SERVER_ADDR", "127.0.0.1:9000"),
            ("YOLO_CLASS_NAMES", "STORE, DATE_TIME ,ITEM,TOTAL,"),
            ("AZURE_DI_ENDPOINT", "https://acme.cognitiveservices.azure.com"),
            ("AZURE_DI_KEY", "   "),
            ("CLOUD_TIMEOUT_SECS", "5"),
            ("CORS_ALLOWED_ORIGINS", "https://receipts.example.com"),
        ]))
        .unwrap();

        assert_eq!(config.addr, "127.0.0.1:9000");
        assert_eq!(config.class_names, vec!["STORE", "DATE_TIME", "ITEM", "TOTAL"]);
        assert_eq!(
            config.azure_endpoint.as_deref(),
            Some("https://acme.cognitiveservices.azure.com")
        );
        assert!(config.azure_key.is_none());
        assert_eq!(config.cloud_timeout, Duration::from_secs(5));
        assert_eq!(config.cors_origins, vec!["https://receipts.example.com"]);
    }

    #[test]
    fn test_invalid_timeout() {
        let err = ServerConfig::from_lookup(lookup(&[("CLOUD_TIMEOUT_SECS", "soon")])).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid value for CLOUD_TIMEOUT_SECS: \"soon\""
        );
    }
}
