//! Object storage for question images
//!
//! Images live in the `game_assets` bucket on one of two backends: plain
//! files under a local directory, or a hosted bucket HTTP API. Object paths
//! are namespaced by question kind and carry a timestamp plus a short
//! content fingerprint so parallel uploads can not collide.

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Bucket holding all question images.
pub const GAME_ASSETS: &str = "game_assets";

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur while talking to the image store
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Invalid object path: {0}")]
    InvalidPath(String),

    #[error("I/O error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Storage request failed: {0}")]
    Request(String),

    #[error("Storage backend returned status {status}: {body}")]
    Upstream { status: u16, body: String },

    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Object path for a freshly uploaded image, e.g.
/// `quizzes/movie/1712345678901-3fa9c2d4.png`.
pub fn object_path(kind: &str, ext: &str, bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    let fingerprint = hex::encode(&digest[..4]);
    format!(
        "quizzes/{}/{}-{}.{}",
        kind,
        chrono::Utc::now().timestamp_millis(),
        fingerprint,
        ext
    )
}

/// Recover the bucket-relative object path from a public URL produced by
/// [`ObjectStore::public_url`]. None when the URL points somewhere else, so
/// callers can skip cleanup for images hosted elsewhere.
pub fn extract_object_path(url: &str) -> Option<&str> {
    let marker = format!("/{}/", GAME_ASSETS);
    let (_, tail) = url.split_once(marker.as_str())?;
    (!tail.is_empty()).then_some(tail)
}

/// Trait both storage backends implement
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store an object, replacing any previous object at the same path.
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> StorageResult<()>;

    /// Publicly reachable URL for an object.
    fn public_url(&self, bucket: &str, path: &str) -> String;

    /// Remove an object. Removing an object that is already gone succeeds.
    async fn delete(&self, bucket: &str, path: &str) -> StorageResult<()>;

    /// File names directly under a folder prefix.
    async fn list(&self, bucket: &str, prefix: &str) -> StorageResult<Vec<String>>;

    /// Get the name of this backend
    fn name(&self) -> &str;
}

/// Stores objects as plain files under a root directory; the HTTP layer
/// serves them back via the static uploads route.
pub struct DiskStore {
    root: PathBuf,
    public_base: String,
}

impl DiskStore {
    pub fn new(root: impl Into<PathBuf>, public_base: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            public_base: public_base.into().trim_end_matches('/').to_string(),
        }
    }

    fn resolve(&self, bucket: &str, path: &str) -> StorageResult<PathBuf> {
        if path.is_empty()
            || path.starts_with('/')
            || path.split('/').any(|seg| seg.is_empty() || seg == "..")
        {
            return Err(StorageError::InvalidPath(path.to_string()));
        }
        Ok(self.root.join(bucket).join(path))
    }
}

#[async_trait]
impl ObjectStore for DiskStore {
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        _content_type: &str,
    ) -> StorageResult<()> {
        let full = self.resolve(bucket, path)?;
        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StorageError::Io {
                    path: parent.display().to_string(),
                    source: e,
                })?;
        }
        tokio::fs::write(&full, bytes)
            .await
            .map_err(|e| StorageError::Io {
                path: full.display().to_string(),
                source: e,
            })
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        format!("{}/{}/{}", self.public_base, bucket, path)
    }

    async fn delete(&self, bucket: &str, path: &str) -> StorageResult<()> {
        let full = self.resolve(bucket, path)?;
        match tokio::fs::remove_file(&full).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::Io {
                path: full.display().to_string(),
                source: e,
            }),
        }
    }

    async fn list(&self, bucket: &str, prefix: &str) -> StorageResult<Vec<String>> {
        let mut dir = self.root.join(bucket);
        if !prefix.is_empty() {
            if prefix.starts_with('/') || prefix.split('/').any(|seg| seg == "..") {
                return Err(StorageError::InvalidPath(prefix.to_string()));
            }
            dir = dir.join(prefix);
        }

        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(StorageError::Io {
                    path: dir.display().to_string(),
                    source: e,
                })
            }
        };

        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(|e| StorageError::Io {
            path: dir.display().to_string(),
            source: e,
        })? {
            let is_file = entry.file_type().await.map(|t| t.is_file()).unwrap_or(false);
            if is_file {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort();
        Ok(names)
    }

    fn name(&self) -> &str {
        "disk"
    }
}

/// Talks to a hosted bucket HTTP API (Supabase storage compatible paths).
pub struct HttpStore {
    base_url: String,
    service_key: String,
    client: reqwest::Client,
}

impl HttpStore {
    pub fn new(base_url: String, service_key: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap();

        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            service_key,
            client,
        }
    }

    fn object_url(&self, bucket: &str, path: &str) -> String {
        format!("{}/object/{}/{}", self.base_url, bucket, path)
    }
}

#[async_trait]
impl ObjectStore for HttpStore {
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> StorageResult<()> {
        let response = self
            .client
            .post(self.object_url(bucket, path))
            .bearer_auth(&self.service_key)
            .header("apikey", &self.service_key)
            .header("x-upsert", "true")
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(bytes)
            .send()
            .await
            .map_err(|e| StorageError::Request(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(StorageError::Upstream { status, body });
        }
        Ok(())
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        format!("{}/object/public/{}/{}", self.base_url, bucket, path)
    }

    async fn delete(&self, bucket: &str, path: &str) -> StorageResult<()> {
        let response = self
            .client
            .delete(self.object_url(bucket, path))
            .bearer_auth(&self.service_key)
            .header("apikey", &self.service_key)
            .send()
            .await
            .map_err(|e| StorageError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() && status != reqwest::StatusCode::NOT_FOUND {
            let body = response.text().await.unwrap_or_default();
            return Err(StorageError::Upstream {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }

    async fn list(&self, bucket: &str, prefix: &str) -> StorageResult<Vec<String>> {
        let response = self
            .client
            .post(format!("{}/object/list/{}", self.base_url, bucket))
            .bearer_auth(&self.service_key)
            .header("apikey", &self.service_key)
            .json(&serde_json::json!({ "prefix": prefix, "limit": 1000, "offset": 0 }))
            .send()
            .await
            .map_err(|e| StorageError::Request(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(StorageError::Upstream { status, body });
        }

        let entries: Vec<serde_json::Value> = response
            .json()
            .await
            .map_err(|e| StorageError::Request(e.to_string()))?;
        Ok(entries
            .iter()
            .filter_map(|entry| entry.get("name").and_then(|n| n.as_str()))
            .map(|name| name.to_string())
            .collect())
    }

    fn name(&self) -> &str {
        "http"
    }
}

/// Storage backend selection
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// "disk" or "http".
    pub backend: String,
    /// Root directory for the disk backend.
    pub disk_root: String,
    /// URL prefix under which the disk backend's files are served.
    pub public_base: String,
    /// Base URL of the bucket API for the http backend.
    pub http_base_url: Option<String>,
    /// Service key for the bucket API.
    pub http_service_key: Option<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: "disk".to_string(),
            disk_root: "uploads".to_string(),
            public_base: "/uploads".to_string(),
            http_base_url: None,
            http_service_key: None,
        }
    }
}

impl StorageConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            backend: env_trimmed("QUIZDECK_STORAGE_BACKEND").unwrap_or(defaults.backend),
            disk_root: env_trimmed("QUIZDECK_STORAGE_ROOT").unwrap_or(defaults.disk_root),
            public_base: env_trimmed("QUIZDECK_STORAGE_PUBLIC_BASE")
                .unwrap_or(defaults.public_base),
            http_base_url: env_trimmed("QUIZDECK_STORAGE_URL"),
            http_service_key: env_trimmed("QUIZDECK_STORAGE_KEY"),
        }
    }

    /// Build the configured backend
    pub fn build_store(&self) -> StorageResult<Arc<dyn ObjectStore>> {
        match self.backend.as_str() {
            "disk" => Ok(Arc::new(DiskStore::new(
                self.disk_root.clone(),
                self.public_base.clone(),
            ))),
            "http" => {
                let base_url = self.http_base_url.clone().ok_or_else(|| {
                    StorageError::Config(
                        "QUIZDECK_STORAGE_URL is required for the http backend".to_string(),
                    )
                })?;
                let service_key = self.http_service_key.clone().ok_or_else(|| {
                    StorageError::Config(
                        "QUIZDECK_STORAGE_KEY is required for the http backend".to_string(),
                    )
                })?;
                Ok(Arc::new(HttpStore::new(base_url, service_key)))
            }
            other => Err(StorageError::Config(format!(
                "Unknown storage backend: {}",
                other
            ))),
        }
    }
}

fn env_trimmed(key: &str) -> Option<String> {
    std::env::var(key).ok().and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_path_namespaces_by_kind() {
        let path = object_path("movie", "png", b"image-bytes");
        assert!(path.starts_with("quizzes/movie/"));
        assert!(path.ends_with(".png"));
    }

    #[test]
    fn test_object_path_fingerprint_follows_content() {
        let a = object_path("trivia", "jpg", b"first");
        let b = object_path("trivia", "jpg", b"second");
        assert_ne!(a, b);
    }

    #[test]
    fn test_extract_object_path_inverts_public_urls() {
        let disk = DiskStore::new("/tmp/assets", "/uploads");
        let url = disk.public_url(GAME_ASSETS, "quizzes/movie/1-abc.png");
        assert_eq!(extract_object_path(&url), Some("quizzes/movie/1-abc.png"));

        let http = HttpStore::new(
            "http://localhost:54321/storage/v1".to_string(),
            "key".to_string(),
        );
        let url = http.public_url(GAME_ASSETS, "quizzes/movie/1-abc.png");
        assert_eq!(extract_object_path(&url), Some("quizzes/movie/1-abc.png"));

        assert_eq!(extract_object_path("https://example.com/elsewhere.png"), None);
    }

    #[tokio::test]
    async fn test_disk_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = DiskStore::new(dir.path(), "/uploads");

        store
            .upload(
                GAME_ASSETS,
                "quizzes/trivia/1-abc.png",
                b"png-bytes".to_vec(),
                "image/png",
            )
            .await
            .unwrap();
        let listed = store.list(GAME_ASSETS, "quizzes/trivia").await.unwrap();
        assert_eq!(listed, vec!["1-abc.png".to_string()]);

        store
            .delete(GAME_ASSETS, "quizzes/trivia/1-abc.png")
            .await
            .unwrap();
        assert!(store
            .list(GAME_ASSETS, "quizzes/trivia")
            .await
            .unwrap()
            .is_empty());

        // Deleting an object that is already gone is fine.
        store
            .delete(GAME_ASSETS, "quizzes/trivia/1-abc.png")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_disk_store_rejects_escaping_paths() {
        let dir = tempfile::tempdir().unwrap();
        let store = DiskStore::new(dir.path(), "/uploads");

        let result = store
            .upload(GAME_ASSETS, "../outside.png", b"x".to_vec(), "image/png")
            .await;
        assert!(matches!(result, Err(StorageError::InvalidPath(_))));

        let result = store
            .upload(GAME_ASSETS, "/absolute.png", b"x".to_vec(), "image/png")
            .await;
        assert!(matches!(result, Err(StorageError::InvalidPath(_))));
    }

    #[test]
    #[serial_test::serial]
    fn test_config_from_env() {
        std::env::set_var("QUIZDECK_STORAGE_BACKEND", "disk");
        std::env::set_var("QUIZDECK_STORAGE_ROOT", "  /var/lib/quizdeck  ");
        let config = StorageConfig::from_env();
        assert_eq!(config.backend, "disk");
        assert_eq!(config.disk_root, "/var/lib/quizdeck");
        assert_eq!(config.public_base, "/uploads");
        std::env::remove_var("QUIZDECK_STORAGE_BACKEND");
        std::env::remove_var("QUIZDECK_STORAGE_ROOT");
    }

    #[test]
    fn test_build_store_validates_configuration() {
        let config = StorageConfig {
            backend: "http".to_string(),
            ..Default::default()
        };
        assert!(config.build_store().is_err());

        let config = StorageConfig {
            backend: "carrier-pigeon".to_string(),
            ..Default::default()
        };
        assert!(config.build_store().is_err());

        let config = StorageConfig::default();
        assert_eq!(config.build_store().unwrap().name(), "disk");
    }

    #[tokio::test]
    #[ignore] // Only run with a bucket API reachable on localhost:54321
    async fn test_http_store_upload() {
        let store = HttpStore::new(
            "http://localhost:54321/storage/v1".to_string(),
            std::env::var("QUIZDECK_STORAGE_KEY").unwrap_or_default(),
        );
        let path = object_path("trivia", "png", b"probe");
        store
            .upload(GAME_ASSETS, &path, b"probe".to_vec(), "image/png")
            .await
            .unwrap();
        store.delete(GAME_ASSETS, &path).await.unwrap();
    }
}
