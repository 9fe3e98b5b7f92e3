//! Configuration: `kura.toml` plus `KURA_*` environment overrides.
//!
//! ```toml
//! [store]
//! backend = "s3"
//! bucket = "files"
//! endpoint = "http://localhost:9000"
//! access_key = "minio"
//! secret_key = "minio123"
//!
//! [api]
//! upload_max_size_mb = 32
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use serde::Deserialize;

use kura_vfs::{MemoryStore, ObjectStore};

/// Config file looked up in the working directory when none is given.
pub const DEFAULT_CONFIG_FILE: &str = "kura.toml";

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub store: StoreConfig,
    pub api: ApiConfig,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    Memory,
    S3,
}

impl std::str::FromStr for Backend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "memory" => Ok(Backend::Memory),
            "s3" => Ok(Backend::S3),
            other => bail!("unknown store backend: {other}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: Backend,
    pub bucket: String,
    /// S3 endpoint; unset means AWS.
    pub endpoint: Option<String>,
    pub region: String,
    pub access_key: String,
    pub secret_key: String,
    pub force_path_style: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: Backend::Memory,
            bucket: "kura".to_string(),
            endpoint: None,
            region: "us-east-1".to_string(),
            access_key: String::new(),
            secret_key: String::new(),
            force_path_style: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Largest accepted upload, per file.
    pub upload_max_size_mb: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            upload_max_size_mb: 32,
        }
    }
}

impl Config {
    /// Load configuration.
    ///
    /// An explicit `path` must exist. Without one, `kura.toml` in the working
    /// directory is used if present, otherwise defaults. Environment
    /// overrides apply last.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                let default = PathBuf::from(DEFAULT_CONFIG_FILE);
                if default.exists() {
                    Self::from_file(&default)?
                } else {
                    Self::default()
                }
            }
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::from_toml(&content).with_context(|| format!("parsing config {}", path.display()))
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Apply `KURA_<SECTION>_<FIELD>` overrides from `lookup`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        let store = &mut self.store;
        if let Some(v) = lookup("KURA_STORE_BACKEND") {
            store.backend = v.parse()?;
        }
        if let Some(v) = lookup("KURA_STORE_BUCKET") {
            store.bucket = v;
        }
        if let Some(v) = lookup("KURA_STORE_ENDPOINT") {
            store.endpoint = (!v.is_empty()).then_some(v);
        }
        if let Some(v) = lookup("KURA_STORE_REGION") {
            store.region = v;
        }
        if let Some(v) = lookup("KURA_STORE_ACCESS_KEY") {
            store.access_key = v;
        }
        if let Some(v) = lookup("KURA_STORE_SECRET_KEY") {
            store.secret_key = v;
        }
        if let Some(v) = lookup("KURA_STORE_FORCE_PATH_STYLE") {
            store.force_path_style = parse_bool(&v)
                .with_context(|| format!("KURA_STORE_FORCE_PATH_STYLE={v}"))?;
        }
        if let Some(v) = lookup("KURA_API_UPLOAD_MAX_SIZE_MB") {
            self.api.upload_max_size_mb = v
                .parse()
                .with_context(|| format!("KURA_API_UPLOAD_MAX_SIZE_MB={v}"))?;
        }
        Ok(())
    }

    pub fn upload_max_bytes(&self) -> u64 {
        self.api.upload_max_size_mb.saturating_mul(1024 * 1024)
    }
}

fn parse_bool(v: &str) -> Result<bool> {
    match v.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => bail!("expected a boolean"),
    }
}

/// Build the configured store, creating its bucket if needed.
pub async fn build_store(config: &StoreConfig) -> Result<Arc<dyn ObjectStore>> {
    let store: Arc<dyn ObjectStore> = match config.backend {
        Backend::Memory => {
            tracing::info!("using in-memory store; data is lost on exit");
            Arc::new(MemoryStore::new())
        }
        Backend::S3 => s3_store(config)?,
    };

    store
        .ensure_bucket()
        .await
        .with_context(|| format!("preparing bucket {}", config.bucket))?;
    Ok(store)
}

#[cfg(feature = "s3")]
fn s3_store(config: &StoreConfig) -> Result<Arc<dyn ObjectStore>> {
    use kura_vfs::{S3Store, S3StoreConfig};

    if config.bucket.is_empty() {
        bail!("store.bucket must be set for the s3 backend");
    }
    tracing::info!(bucket = %config.bucket, endpoint = ?config.endpoint, "using s3 store");
    Ok(Arc::new(S3Store::connect(&S3StoreConfig {
        bucket: config.bucket.clone(),
        endpoint: config.endpoint.clone(),
        region: config.region.clone(),
        access_key: config.access_key.clone(),
        secret_key: config.secret_key.clone(),
        force_path_style: config.force_path_style,
    })))
}

#[cfg(not(feature = "s3"))]
fn s3_store(_config: &StoreConfig) -> Result<Arc<dyn ObjectStore>> {
    bail!("the s3 backend requires building with the `s3` feature")
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
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.store.backend, Backend::Memory);
        assert_eq!(config.upload_max_bytes(), 32 * 1024 * 1024);
    }

    #[test]
    fn test_parse_sections() {
        let config = Config::from_toml(
            r#"
            [store]
            backend = "s3"
            bucket = "files"
            endpoint = "http://localhost:9000"

            [api]
            upload_max_size_mb = 5
            "#,
        )
        .unwrap();
        assert_eq!(config.store.backend, Backend::S3);
        assert_eq!(config.store.bucket, "files");
        assert_eq!(config.store.endpoint.as_deref(), Some("http://localhost:9000"));
        assert_eq!(config.store.region, "us-east-1");
        assert_eq!(config.api.upload_max_size_mb, 5);
    }

    #[test]
    fn test_unknown_backend_rejected() {
        assert!(Config::from_toml("[store]\nbackend = \"ftp\"").is_err());
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::default();
        config
            .apply_env(env(&[
                ("KURA_STORE_BACKEND", "S3"),
                ("KURA_STORE_BUCKET", "env-bucket"),
                ("KURA_STORE_FORCE_PATH_STYLE", "false"),
                ("KURA_API_UPLOAD_MAX_SIZE_MB", "1"),
            ]))
            .unwrap();
        assert_eq!(config.store.backend, Backend::S3);
        assert_eq!(config.store.bucket, "env-bucket");
        assert!(!config.store.force_path_style);
        assert_eq!(config.upload_max_bytes(), 1024 * 1024);

        let mut config = Config::default();
        assert!(config.apply_env(env(&[("KURA_API_UPLOAD_MAX_SIZE_MB", "lots")])).is_err());
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[store]\nbucket = \"on-disk\"").unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.store.bucket, "on-disk");

        let missing = file.path().with_extension("missing");
        assert!(Config::from_file(&missing).is_err());
    }

    #[tokio::test]
    async fn test_build_memory_store() {
        let store = build_store(&StoreConfig::default()).await.unwrap();
        assert!(!store.exists("anything").await);
    }
}
