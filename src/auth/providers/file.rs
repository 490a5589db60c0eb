//! File-based credentials store.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use directories::BaseDirs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::auth::{CredentialsData, CredentialsProvider};
use crate::{Error, Result};

const CONJUR_DIR: &str = ".conjur";
const CREDENTIALS_FILE: &str = "credentials.json";

type CredentialsFile = BTreeMap<String, CredentialsData>;

/// Credentials persisted as a JSON object keyed by server URL.
///
/// The file is rewritten as a whole on every change and, on unix, restricted to
/// the owner.
#[derive(Debug)]
pub struct FileCredentialsProvider {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileCredentialsProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Store at `~/.conjur/credentials.json`.
    pub fn default_location() -> Result<Self> {
        Self::default_path()
            .map(Self::new)
            .ok_or_else(|| Error::Config("Unable to determine home directory".into()))
    }

    pub fn default_path() -> Option<PathBuf> {
        BaseDirs::new().map(|dirs| dirs.home_dir().join(CONJUR_DIR).join(CREDENTIALS_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_all(&self) -> Result<CredentialsFile> {
        if !tokio::fs::try_exists(&self.path).await? {
            return Ok(CredentialsFile::new());
        }

        let content = tokio::fs::read_to_string(&self.path).await?;
        if content.trim().is_empty() {
            return Ok(CredentialsFile::new());
        }
        Ok(serde_json::from_str(&content)?)
    }

    async fn write_all(&self, credentials: &CredentialsFile) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let contents = serde_json::to_vec_pretty(credentials)?;
        let tmp = self.path.with_extension("json.tmp");
        let written = async {
            write_private(&tmp, &contents).await?;
            tokio::fs::rename(&tmp, &self.path).await
        }
        .await;

        if let Err(e) = written {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        Ok(())
    }
}

/// Create `path` readable by the owner only and write `contents` to it.
///
/// A leftover file is removed first so its permissions are never reused.
async fn write_private(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e),
    }

    let mut options = tokio::fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    options.mode(0o600);

    let mut file = options.open(path).await?;
    file.write_all(contents).await?;
    file.sync_all().await
}

#[async_trait]
impl CredentialsProvider for FileCredentialsProvider {
    fn store_location(&self) -> String {
        self.path.display().to_string()
    }

    async fn load(&self, url: &str) -> Result<CredentialsData> {
        self.read_all()
            .await?
            .remove(url)
            .ok_or_else(|| Error::CredentialsNotFound {
                url: url.to_string(),
            })
    }

    async fn save(&self, data: &CredentialsData) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut credentials = self.read_all().await?;
        credentials.insert(data.machine.clone(), data.clone());
        self.write_all(&credentials).await?;
        tracing::debug!(location = %self.path.display(), machine = %data.machine, "Credentials saved");
        Ok(())
    }

    async fn exists(&self, url: &str) -> Result<bool> {
        Ok(self.read_all().await?.contains_key(url))
    }

    async fn remove(&self, url: &str) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut credentials = self.read_all().await?;
        if credentials.remove(url).is_none() {
            return Err(Error::CredentialsNotFound {
                url: url.to_string(),
            });
        }
        self.write_all(&credentials).await
    }
}
