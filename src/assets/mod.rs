//! Blob storage for mirrored song cover images.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use std::time::Duration;
use tracing::warn;

/// Write-side of the asset bucket.
#[async_trait]
pub trait AssetStore: Send + Sync {
    async fn put_song_image(&self, filename: &str, bytes: Vec<u8>, content_type: &str)
        -> Result<()>;
}

/// Asset store PUTting objects to an S3-compatible HTTP endpoint under
/// `<endpoint>/<bucket>/songs/<filename>`.
pub struct HttpAssetStore {
    client: reqwest::Client,
    endpoint: String,
    bucket: String,
}

impl HttpAssetStore {
    pub fn new(endpoint: &str, bucket: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build asset store client")?;
        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            bucket: bucket.to_string(),
        })
    }
}

#[async_trait]
impl AssetStore for HttpAssetStore {
    async fn put_song_image(
        &self,
        filename: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<()> {
        let url = format!("{}/{}/songs/{}", self.endpoint, self.bucket, filename);
        self.client
            .put(&url)
            .header("Content-Type", content_type)
            .body(bytes)
            .send()
            .await
            .with_context(|| format!("Failed to upload {}", filename))?
            .error_for_status()
            .with_context(|| format!("Asset endpoint rejected {}", filename))?;
        Ok(())
    }
}

pub fn content_type_for_filename(filename: &str) -> &'static str {
    let ext = filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "webp" => "image/webp",
        _ => "application/octet-stream",
    }
}

/// Download a cover from the game's image host and store it. Best-effort:
/// failures are logged, the caller never sees them.
pub async fn mirror_song_image(asset_store: &dyn AssetStore, url: &str, filename: &str) {
    if let Err(e) = try_mirror(asset_store, url, filename).await {
        warn!("Failed to mirror cover image {}: {:#}", filename, e);
    }
}

async fn try_mirror(asset_store: &dyn AssetStore, url: &str, filename: &str) -> Result<()> {
    // same legacy TLS setup as the portal itself
    let client = reqwest::Client::builder()
        .danger_accept_invalid_certs(true)
        .timeout(Duration::from_secs(30))
        .build()?;

    let response = client.get(url).send().await?;
    if !response.status().is_success() {
        bail!("non-200 response: {}", response.status());
    }

    let content_type = response
        .headers()
        .get("Content-Type")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| content_type_for_filename(filename).to_string());
    let bytes = response.bytes().await?.to_vec();

    asset_store
        .put_song_image(filename, bytes, &content_type)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_type_from_extension() {
        assert_eq!(content_type_for_filename("cover.png"), "image/png");
        assert_eq!(content_type_for_filename("cover.JPG"), "image/jpeg");
        assert_eq!(content_type_for_filename("cover.jpeg"), "image/jpeg");
        assert_eq!(content_type_for_filename("cover.webp"), "image/webp");
        assert_eq!(
            content_type_for_filename("no_extension"),
            "application/octet-stream"
        );
    }
}
