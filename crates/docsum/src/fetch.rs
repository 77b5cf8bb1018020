//! Blob fetching.
//!
//! Resolves a caller-supplied `file_url` to bytes and spools them into a
//! uniquely named temporary file. The temp file is owned by the returned
//! `FetchedBlob` and removed when it drops — on success and failure paths
//! alike. Leaked temp files accumulate unboundedly under sustained
//! failure, so releasing them is the central resource contract here.

use std::io::Write;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use tempfile::NamedTempFile;

use crate::error::FetchError;

/// Raw document bytes materialized on disk for one job's processing.
/// The backing file is deleted on drop.
#[derive(Debug)]
pub struct FetchedBlob {
    file: NamedTempFile,
}

impl FetchedBlob {
    /// Writes the given bytes to a fresh temp file. Used by fetcher
    /// implementations and by tests building blobs directly.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, std::io::Error> {
        let mut file = tempfile::Builder::new()
            .prefix("docsum_")
            .suffix(".pdf")
            .tempfile()?;
        file.write_all(bytes)?;
        file.flush()?;
        Ok(Self { file })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }
}

/// Resolves a file reference to a local temporary copy.
#[async_trait]
pub trait BlobFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchedBlob, FetchError>;
}

/// HTTP implementation used in production: plain GET against the blob
/// store URL the caller supplied.
pub struct HttpBlobFetcher {
    client: reqwest::Client,
}

impl HttpBlobFetcher {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl BlobFetcher for HttpBlobFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedBlob, FetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::Request {
                url: url.to_string(),
                source: e,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::BadStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let bytes = response.bytes().await.map_err(|e| FetchError::Request {
            url: url.to_string(),
            source: e,
        })?;

        tracing::debug!(url, bytes = bytes.len(), "Downloaded blob");
        Ok(FetchedBlob::from_bytes(&bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blob_written_to_unique_temp_file() {
        let a = FetchedBlob::from_bytes(b"first").unwrap();
        let b = FetchedBlob::from_bytes(b"second").unwrap();

        assert_ne!(a.path(), b.path());
        assert_eq!(std::fs::read(a.path()).unwrap(), b"first");
        assert_eq!(std::fs::read(b.path()).unwrap(), b"second");
    }

    #[test]
    fn test_blob_removed_on_drop() {
        let blob = FetchedBlob::from_bytes(b"transient content").unwrap();
        let path = blob.path().to_path_buf();
        assert!(path.exists());

        drop(blob);
        assert!(!path.exists());
    }
}
