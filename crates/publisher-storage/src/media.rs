//! Filesystem-backed [`MediaStore`].
//!
//! Downloads referenced media and lays it out under a root directory as
//! `<address>/tokens/<token_id>.<ext>` for token images and
//! `<address>/<name>` for collection images.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use tracing::debug;

use publisher_common::{MediaKind, MediaStore};

const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(30);

pub struct LocalMediaStore {
    root: PathBuf,
    client: reqwest::Client,
}

impl LocalMediaStore {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)
            .with_context(|| format!("failed to create media root {}", root.display()))?;
        let client = reqwest::Client::builder()
            .timeout(DOWNLOAD_TIMEOUT)
            .build()
            .context("failed to build media client")?;
        Ok(Self { root, client })
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("download of {url} failed"))?;
        if !response.status().is_success() {
            bail!("download of {url} returned status {}", response.status());
        }
        let bytes = response
            .bytes()
            .await
            .with_context(|| format!("failed to read body of {url}"))?;
        Ok(bytes.to_vec())
    }

    async fn write(&self, relative: &Path, bytes: &[u8]) -> Result<()> {
        let target = self.root.join(relative);
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        tokio::fs::write(&target, bytes)
            .await
            .with_context(|| format!("failed to write {}", target.display()))?;
        debug!(
            target: "publisher_storage::media",
            path = %target.display(),
            size = bytes.len(),
            "stored media file"
        );
        Ok(())
    }
}

#[async_trait]
impl MediaStore for LocalMediaStore {
    async fn upload_token_image(
        &self,
        collection_address: &str,
        source_url: &str,
        token_id: &str,
        kind: MediaKind,
    ) -> Result<()> {
        let bytes = self.download(source_url).await?;
        let relative = Path::new(collection_address)
            .join("tokens")
            .join(format!("{token_id}.{}", kind.extension()));
        self.write(&relative, &bytes).await
    }

    async fn upload_collection_image(
        &self,
        collection_address: &str,
        source_url: &str,
        name: &str,
    ) -> Result<()> {
        let bytes = self.download(source_url).await?;
        let relative = Path::new(collection_address).join(name);
        self.write(&relative, &bytes).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_write_creates_nested_layout() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalMediaStore::new(dir.path()).unwrap();

        let relative = Path::new("0xabc").join("tokens").join("7.png");
        store.write(&relative, b"png bytes").await.unwrap();

        let written = dir.path().join("0xabc").join("tokens").join("7.png");
        assert_eq!(std::fs::read(written).unwrap(), b"png bytes");
    }

    #[tokio::test]
    async fn test_write_overwrites_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalMediaStore::new(dir.path()).unwrap();

        let relative = Path::new("0xabc").join("avatar.png");
        store.write(&relative, b"first").await.unwrap();
        store.write(&relative, b"second").await.unwrap();

        let written = dir.path().join("0xabc").join("avatar.png");
        assert_eq!(std::fs::read(written).unwrap(), b"second");
    }
}
