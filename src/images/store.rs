use super::detection::mime_from_extension;
use crate::error::ImageError;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;

/// Bytes read back from an [`ImageStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredMedia {
    pub mime_type: &'static str,
    pub bytes: Vec<u8>,
}

/// Durable, publicly addressable storage for images. Writes are keyed by
/// freshly generated names, so callers never contend for the same key.
pub trait ImageStore: Send + Sync {
    /// Persist `bytes` under `file_name` and return its public URL.
    fn put<'a>(
        &'a self,
        file_name: &'a str,
        bytes: &'a [u8],
    ) -> Pin<Box<dyn Future<Output = Result<String, ImageError>> + Send + 'a>>;

    fn get<'a>(
        &'a self,
        file_name: &'a str,
    ) -> Pin<Box<dyn Future<Output = Option<StoredMedia>> + Send + 'a>>;
}

/// Names are generated by us; anything else is refused so a request path can
/// never escape the storage directory.
pub fn is_safe_file_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= 128
        && !name.starts_with('.')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

/// Filesystem store served by the gateway under `/media/<file>`.
pub struct LocalImageStore {
    storage_dir: PathBuf,
    public_base_url: String,
}

impl LocalImageStore {
    pub fn new(storage_dir: impl Into<PathBuf>, public_base_url: &str) -> Self {
        Self {
            storage_dir: storage_dir.into(),
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        }
    }

    #[must_use]
    pub fn storage_dir(&self) -> &Path {
        &self.storage_dir
    }

    pub fn public_url(&self, file_name: &str) -> String {
        format!("{}/media/{file_name}", self.public_base_url)
    }
}

impl ImageStore for LocalImageStore {
    fn put<'a>(
        &'a self,
        file_name: &'a str,
        bytes: &'a [u8],
    ) -> Pin<Box<dyn Future<Output = Result<String, ImageError>> + Send + 'a>> {
        Box::pin(async move {
            if !is_safe_file_name(file_name) {
                return Err(ImageError::UploadFailed(format!(
                    "refusing file name {file_name:?}"
                )));
            }
            tokio::fs::create_dir_all(&self.storage_dir)
                .await
                .map_err(|e| ImageError::UploadFailed(e.to_string()))?;
            tokio::fs::write(self.storage_dir.join(file_name), bytes)
                .await
                .map_err(|e| ImageError::UploadFailed(e.to_string()))?;
            tracing::debug!(file = file_name, size = bytes.len(), "image stored");
            Ok(self.public_url(file_name))
        })
    }

    fn get<'a>(
        &'a self,
        file_name: &'a str,
    ) -> Pin<Box<dyn Future<Output = Option<StoredMedia>> + Send + 'a>> {
        Box::pin(async move {
            if !is_safe_file_name(file_name) {
                return None;
            }
            let bytes = tokio::fs::read(self.storage_dir.join(file_name)).await.ok()?;
            Some(StoredMedia {
                mime_type: mime_from_extension(file_name),
                bytes,
            })
        })
    }
}
