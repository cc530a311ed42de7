use dashmap::DashMap;
use dotenvy::Error as DotenvError;
use rand::{RngCore, rng};
use std::collections::HashMap;
use std::fmt::{Debug, Formatter};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use thiserror::Error;
use tracing::{error, info};

#[async_trait::async_trait]
pub trait SecretsManagerType: Send + Sync {
    fn get(&self, key: &str) -> Option<u32>;
    fn keys(&self) -> Vec<String>;
    async fn add_secret(&self, key: &str, secret: &str) -> Result<(), SecretsError>;
    async fn update_secret(&self, key: &str, secret: &str) -> Result<(), SecretsError>;
    async fn delete_secret(&self, key: &str) -> Result<(), SecretsError>;
    async fn reveal(&self, handle: u32) -> Result<Option<String>, SecretsError>;
    fn name(&self) -> &'static str;
    fn clone_box(&self) -> Arc<dyn SecretsManagerType>;
    fn debug_box(&self) -> String;
}

pub struct SecretsManager(pub Arc<dyn SecretsManagerType + Send + Sync>);

impl SecretsManager {
    pub async fn add_secret(&self, key: &str, value: &str) -> Result<(), SecretsError> {
        self.0.add_secret(key, value).await
    }

    pub async fn update_secret(&self, key: &str, value: &str) -> Result<(), SecretsError> {
        self.0.update_secret(key, value).await
    }

    pub async fn delete_secret(&self, key: &str) -> Result<(), SecretsError> {
        self.0.delete_secret(key).await
    }

    pub async fn get_secret(&self, key: &str) -> Result<Option<String>, SecretsError> {
        match self.0.get(key) {
            Some(handle) => self.0.reveal(handle).await,
            None => Ok(None),
        }
    }

    pub fn keys(&self) -> Vec<String> {
        self.0.keys()
    }
}

impl Clone for SecretsManager {
    fn clone(&self) -> Self {
        SecretsManager(self.0.clone_box())
    }
}

impl Debug for SecretsManager {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0.debug_box())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SecretsError {
    #[error("secret store error: {0}")]
    Upstream(String),
    #[error("secret file error: {0}")]
    Io(String),
    #[error("secret not found")]
    NotFound,
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Secrets kept in `<dir>/.env`. Values are only reachable through random
/// handles so keys can be listed without exposing them.
#[derive(Clone)]
pub struct EnvSecretsManager {
    keys: Arc<RwLock<HashMap<String, u32>>>,
    secrets: Arc<RwLock<HashMap<u32, String>>>,
    env_path: Option<PathBuf>,
}

impl Debug for EnvSecretsManager {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "EnvSecretsManager {{ keys: {:?} }}", self.keys())
    }
}

impl EnvSecretsManager {
    pub fn new(dotenv_dir: Option<PathBuf>) -> Arc<Self> {
        let env_path = dotenv_dir.map(|dir| dir.join(".env"));
        let mgr = Arc::new(Self {
            keys: Arc::new(RwLock::new(HashMap::new())),
            secrets: Arc::new(RwLock::new(HashMap::new())),
            env_path: env_path.clone(),
        });

        match env_path {
            Some(path) if path.exists() => mgr.load_dotenv(&path),
            Some(path) => info!(".env file {} not found, starting empty", path.display()),
            None => info!("secrets kept in memory only (no .env path provided)"),
        }

        mgr
    }

    fn insert(&self, key: &str, secret: &str) {
        let mut keys = write(&self.keys);
        let mut secrets = write(&self.secrets);
        let handle = match keys.get(key) {
            Some(handle) => *handle,
            None => {
                let id = rng().next_u32();
                keys.insert(key.to_string(), id);
                id
            }
        };
        secrets.insert(handle, secret.to_string());
    }

    /// Parse only the given `.env` file, replacing whatever was loaded.
    fn load_dotenv(&self, path: &Path) {
        match dotenvy::from_path_iter(path) {
            Ok(iter) => {
                write(&self.keys).clear();
                write(&self.secrets).clear();
                for item in iter {
                    match item {
                        Ok((k, v)) => self.insert(&k, &v),
                        Err(e) => error!("Malformed line in {}: {}", path.display(), e),
                    }
                }
                info!(".env loaded from {}", path.display());
            }
            Err(DotenvError::Io(io)) if io.kind() == std::io::ErrorKind::NotFound => {
                info!(".env file {} not found, skipping", path.display());
            }
            Err(e) => {
                error!("Failed to read {}: {}", path.display(), e);
            }
        }
    }

    fn write_dotenv(&self) -> Result<(), SecretsError> {
        let Some(path) = &self.env_path else {
            return Ok(());
        };

        let out = {
            let keys = read(&self.keys);
            let secrets = read(&self.secrets);
            let mut entries: Vec<_> = keys
                .iter()
                .filter_map(|(key, handle)| secrets.get(handle).map(|value| (key, value)))
                .collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));

            entries
                .into_iter()
                .map(|(key, value)| format!("{}={}\n", key, value.replace('\n', "\\n")))
                .collect::<String>()
        };

        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir).map_err(|e| SecretsError::Io(e.to_string()))?;
        }
        std::fs::write(path, out).map_err(|e| {
            error!("Failed to write .env file {}: {}", path.display(), e);
            SecretsError::Io(e.to_string())
        })?;
        info!(".env file updated at {}", path.display());
        Ok(())
    }
}

#[async_trait::async_trait]
impl SecretsManagerType for EnvSecretsManager {
    fn get(&self, key: &str) -> Option<u32> {
        read(&self.keys).get(key).copied()
    }

    fn keys(&self) -> Vec<String> {
        read(&self.keys).keys().cloned().collect()
    }

    async fn add_secret(&self, key: &str, secret: &str) -> Result<(), SecretsError> {
        self.insert(key, secret);
        self.write_dotenv()
    }

    async fn update_secret(&self, key: &str, secret: &str) -> Result<(), SecretsError> {
        self.insert(key, secret);
        self.write_dotenv()
    }

    async fn delete_secret(&self, key: &str) -> Result<(), SecretsError> {
        let handle = write(&self.keys).remove(key).ok_or(SecretsError::NotFound)?;
        write(&self.secrets).remove(&handle);
        self.write_dotenv()
    }

    async fn reveal(&self, handle: u32) -> Result<Option<String>, SecretsError> {
        Ok(read(&self.secrets).get(&handle).cloned())
    }

    fn name(&self) -> &'static str {
        "EnvSecrets"
    }

    fn clone_box(&self) -> Arc<dyn SecretsManagerType> {
        Arc::new(self.clone())
    }

    fn debug_box(&self) -> String {
        format!("SecretsManager {{ keys: {:?} }}", self.keys())
    }
}

/// Holds nothing. Used when only inline tokens are expected.
#[derive(Clone, Debug, Default)]
pub struct EmptySecretsManager;

impl EmptySecretsManager {
    pub fn new() -> Arc<Self> {
        Arc::new(Self)
    }
}

#[async_trait::async_trait]
impl SecretsManagerType for EmptySecretsManager {
    fn get(&self, _key: &str) -> Option<u32> {
        None
    }

    fn keys(&self) -> Vec<String> {
        vec![]
    }

    async fn add_secret(&self, _key: &str, _secret: &str) -> Result<(), SecretsError> {
        Err(SecretsError::Upstream("empty secrets manager is read-only".into()))
    }

    async fn update_secret(&self, _key: &str, _secret: &str) -> Result<(), SecretsError> {
        Err(SecretsError::NotFound)
    }

    async fn delete_secret(&self, _key: &str) -> Result<(), SecretsError> {
        Err(SecretsError::NotFound)
    }

    async fn reveal(&self, _handle: u32) -> Result<Option<String>, SecretsError> {
        Ok(None)
    }

    fn name(&self) -> &'static str {
        "EmptySecretsManager"
    }

    fn clone_box(&self) -> Arc<dyn SecretsManagerType> {
        Arc::new(self.clone())
    }

    fn debug_box(&self) -> String {
        "EmptySecretsManager".to_string()
    }
}

pub struct TestSecretsManager {
    // key -> handle
    handles: DashMap<String, u32>,
    // key -> secret
    secrets: DashMap<String, String>,
    next_handle: AtomicU32,
}

impl TestSecretsManager {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            handles: DashMap::new(),
            secrets: DashMap::new(),
            next_handle: AtomicU32::new(1),
        })
    }
}

impl Clone for TestSecretsManager {
    fn clone(&self) -> Self {
        Self {
            handles: self.handles.clone(),
            secrets: self.secrets.clone(),
            next_handle: AtomicU32::new(self.next_handle.load(Ordering::Relaxed)),
        }
    }
}

#[async_trait::async_trait]
impl SecretsManagerType for TestSecretsManager {
    fn get(&self, key: &str) -> Option<u32> {
        self.handles.get(key).map(|v| *v)
    }

    fn keys(&self) -> Vec<String> {
        self.handles.iter().map(|kv| kv.key().clone()).collect()
    }

    async fn add_secret(&self, key: &str, secret: &str) -> Result<(), SecretsError> {
        self.handles
            .entry(key.to_string())
            .or_insert_with(|| self.next_handle.fetch_add(1, Ordering::Relaxed));
        self.secrets.insert(key.to_string(), secret.to_string());
        Ok(())
    }

    async fn update_secret(&self, key: &str, secret: &str) -> Result<(), SecretsError> {
        if !self.handles.contains_key(key) {
            return Err(SecretsError::NotFound);
        }
        self.secrets.insert(key.to_string(), secret.to_string());
        Ok(())
    }

    async fn delete_secret(&self, key: &str) -> Result<(), SecretsError> {
        let existed_h = self.handles.remove(key).is_some();
        let existed_s = self.secrets.remove(key).is_some();
        if existed_h || existed_s {
            Ok(())
        } else {
            Err(SecretsError::NotFound)
        }
    }

    async fn reveal(&self, handle: u32) -> Result<Option<String>, SecretsError> {
        let key = self
            .handles
            .iter()
            .find(|kv| *kv.value() == handle)
            .map(|kv| kv.key().clone());

        Ok(key.and_then(|key| self.secrets.get(&key).map(|v| v.clone())))
    }

    fn name(&self) -> &'static str {
        "TestSecretsManager"
    }

    fn clone_box(&self) -> Arc<dyn SecretsManagerType> {
        Arc::new(self.clone())
    }

    fn debug_box(&self) -> String {
        format!(
            "TestSecretsManager {{ handles: {}, secrets: {} }}",
            self.handles.len(),
            self.secrets.len()
        )
    }
}
