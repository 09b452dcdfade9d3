use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use sha2::{Digest, Sha256};
use tokio::sync::Mutex;

#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("Model artifacts not available: {0}")]
    NotAvailable(String),
    #[error("Download error: {0}")]
    DownloadError(#[from] reqwest::Error),
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),
    #[error("Model verification failed")]
    VerificationFailed,
    #[error("Hash mismatch: expected {expected}, got {actual} for {file_type} file")]
    HashMismatch {
        file_type: String,
        expected: String,
        actual: String,
    },
}

/// Expected SHA-256 digests (lowercase hex) of a topology/weights pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactDigests {
    pub topology_sha256: String,
    pub weights_sha256: String,
}

/// Remote location of model artifacts. Files are fetched from
/// `<base_url>/<stem>model.json` and `<base_url>/<stem>model_weights.safetensors`.
#[derive(Debug, Clone)]
pub struct ArtifactSource {
    pub base_url: String,
    pub digests: Option<ArtifactDigests>,
}

impl ArtifactSource {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            digests: None,
        }
    }

    pub fn with_digests(mut self, digests: ArtifactDigests) -> Self {
        self.digests = Some(digests);
        self
    }

    fn url(&self, file_name: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), file_name)
    }
}

/// Locates, verifies and fetches the `<stem>model.*` artifacts of a models
/// directory.
#[derive(Debug, Clone)]
pub struct ModelManager {
    models_dir: PathBuf,
    download_lock: Arc<Mutex<()>>,
}

impl ModelManager {
    /// Creates a new ModelManager with the default models directory
    pub fn new_default() -> Self {
        Self::new(Self::get_default_models_dir())
    }

    /// Returns the default models directory path
    pub fn get_default_models_dir() -> PathBuf {
        if let Ok(path) = env::var("CROPCAST_MODELS") {
            return PathBuf::from(path);
        }

        if let Some(cache_dir) = dirs::cache_dir() {
            return cache_dir.join("cropcast").join("models");
        }

        if let Some(home_dir) = dirs::home_dir() {
            return home_dir.join(".cache").join("cropcast").join("models");
        }

        env::temp_dir().join("cropcast").join("models")
    }

    /// The directory is created lazily on the first download
    pub fn new<P: AsRef<Path>>(models_dir: P) -> Self {
        Self {
            models_dir: models_dir.as_ref().to_path_buf(),
            download_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn models_dir(&self) -> &Path {
        &self.models_dir
    }

    /// `<stem>model.json`, falling back to `<stem>model.onnx` when only that exists
    pub fn topology_path(&self, stem: &str) -> PathBuf {
        let json = self.models_dir.join(format!("{stem}model.json"));
        let onnx = self.models_dir.join(format!("{stem}model.onnx"));
        if !json.exists() && onnx.exists() {
            onnx
        } else {
            json
        }
    }

    pub fn weights_path(&self, stem: &str) -> PathBuf {
        self.models_dir.join(format!("{stem}model_weights.safetensors"))
    }

    pub fn is_available(&self, stem: &str) -> bool {
        let topology_path = self.topology_path(stem);
        let weights_path = self.weights_path(stem);
        log::debug!(
            "Artifacts for {}: topology {:?} (exists: {}), weights {:?} (exists: {})",
            stem,
            topology_path,
            topology_path.exists(),
            weights_path,
            weights_path.exists()
        );
        topology_path.exists() && weights_path.exists()
    }

    fn hash_file(path: &Path) -> Result<String, ModelError> {
        let bytes = fs::read(path)?;
        Ok(Self::hash_bytes(&bytes))
    }

    fn hash_bytes(bytes: &[u8]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        format!("{:x}", hasher.finalize())
    }

    /// Checks both artifacts against the expected digests. Missing files
    /// verify as `false`.
    pub fn verify(&self, stem: &str, digests: &ArtifactDigests) -> Result<bool, ModelError> {
        if !self.is_available(stem) {
            return Ok(false);
        }

        let topology_ok =
            Self::hash_file(&self.topology_path(stem))? == digests.topology_sha256;
        let weights_ok = Self::hash_file(&self.weights_path(stem))? == digests.weights_sha256;
        log::info!(
            "Verification of {}: topology {}, weights {}",
            stem,
            topology_ok,
            weights_ok
        );
        Ok(topology_ok && weights_ok)
    }

    pub fn remove(&self, stem: &str) -> Result<(), ModelError> {
        Self::remove_files(&[self.topology_path(stem), self.weights_path(stem)])
    }

    fn remove_files(paths: &[PathBuf]) -> Result<(), ModelError> {
        for path in paths {
            if path.exists() {
                fs::remove_file(path)?;
            }
        }
        Ok(())
    }

    /// Fetches both artifacts. Each file is hashed before it is written and
    /// the files this call writes are removed again when either one fails.
    pub async fn download(
        &self,
        stem: &str,
        source: &ArtifactSource,
    ) -> Result<(), ModelError> {
        let _lock = self.download_lock.lock().await;
        fs::create_dir_all(&self.models_dir)?;

        let topology_path = self.models_dir.join(format!("{stem}model.json"));
        let weights_path = self.weights_path(stem);
        let digests = source.digests.as_ref();

        let topology_result = self
            .download_and_verify_file(
                &source.url(&format!("{stem}model.json")),
                &topology_path,
                digests.map(|d| d.topology_sha256.as_str()),
                "topology",
            )
            .await;
        let result = match topology_result {
            Ok(()) => {
                self.download_and_verify_file(
                    &source.url(&format!("{stem}model_weights.safetensors")),
                    &weights_path,
                    digests.map(|d| d.weights_sha256.as_str()),
                    "weights",
                )
                .await
            }
            Err(e) => Err(e),
        };

        if let Err(e) = result {
            log::error!("Failed to fetch {} artifacts: {}", stem, e);
            let _ = Self::remove_files(&[topology_path, weights_path]);
            return Err(e);
        }
        log::info!("{} artifacts ready in {:?}", stem, self.models_dir);
        Ok(())
    }

    async fn download_and_verify_file(
        &self,
        url: &str,
        path: &Path,
        expected_hash: Option<&str>,
        file_type: &str,
    ) -> Result<(), ModelError> {
        log::info!("Downloading {} file from {} to {:?}", file_type, url, path);
        let response = reqwest::get(url).await?.error_for_status()?;
        let bytes = response.bytes().await?;
        log::debug!("Downloaded {} bytes", bytes.len());

        match expected_hash {
            Some(expected) => {
                let hash = Self::hash_bytes(&bytes);
                if hash != expected {
                    return Err(ModelError::HashMismatch {
                        file_type: file_type.to_string(),
                        expected: expected.to_string(),
                        actual: hash,
                    });
                }
            }
            None => log::warn!(
                "No digest configured for {} file, skipping verification",
                file_type
            ),
        }

        fs::write(path, &bytes)?;

        if let Some(expected) = expected_hash {
            if Self::hash_file(path)? != expected {
                return Err(ModelError::VerificationFailed);
            }
        }
        Ok(())
    }

    /// Downloads the artifacts when they are missing or fail verification
    pub async fn ensure_available(
        &self,
        stem: &str,
        source: &ArtifactSource,
    ) -> Result<(), ModelError> {
        if !self.is_available(stem) {
            log::info!("{} artifacts not found, downloading...", stem);
            return self.download(stem, source).await;
        }

        if let Some(digests) = &source.digests {
            if !self.verify(stem, digests)? {
                log::info!("{} artifacts failed verification, re-downloading...", stem);
                self.remove(stem)?;
                self.download(stem, source).await?;
            }
        }
        Ok(())
    }

    /// Fails with [`ModelError::NotAvailable`] unless both artifacts exist
    pub fn require(&self, stem: &str) -> Result<(), ModelError> {
        if self.is_available(stem) {
            Ok(())
        } else {
            Err(ModelError::NotAvailable(format!(
                "{} artifacts missing from {:?}",
                stem, self.models_dir
            )))
        }
    }
}
