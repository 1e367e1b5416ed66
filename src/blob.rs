//! Filesystem blob store for uploaded images

use sha2::{Digest, Sha256};
use std::path::PathBuf;

use crate::db::models::BlobRef;
use crate::error::BlobError;

#[derive(Debug, Clone)]
pub struct BlobStore {
    root: PathBuf,
    max_bytes: usize,
}

fn detect_image_type(bytes: &[u8]) -> Option<&'static str> {
    if bytes.len() < 4 {
        return None;
    }
    match bytes {
        // JPEG: FF D8 FF
        [0xFF, 0xD8, 0xFF, ..] => Some("image/jpeg"),
        // PNG: 89 50 4E 47
        [0x89, 0x50, 0x4E, 0x47, ..] => Some("image/png"),
        // GIF: 47 49 46 38
        [0x47, 0x49, 0x46, 0x38, ..] => Some("image/gif"),
        // WebP: 52 49 46 46 ... 57 45 42 50
        [0x52, 0x49, 0x46, 0x46, _, _, _, _, 0x57, 0x45, 0x42, 0x50, ..] => Some("image/webp"),
        _ => None,
    }
}

fn extension_for(content_type: &str) -> &'static str {
    match content_type {
        "image/jpeg" => "jpg",
        "image/png" => "png",
        "image/gif" => "gif",
        "image/webp" => "webp",
        _ => "bin",
    }
}

/// Keys are `<sha256 hex>.<ext>`; anything else could escape the root.
fn is_valid_key(key: &str) -> bool {
    match key.split_once('.') {
        Some((digest, ext)) => {
            digest.len() == 64
                && digest.chars().all(|c| c.is_ascii_hexdigit())
                && ["jpg", "png", "gif", "webp"].contains(&ext)
        }
        None => false,
    }
}

impl BlobStore {
    pub fn new(root: impl Into<PathBuf>, max_bytes: usize) -> Self {
        Self {
            root: root.into(),
            max_bytes,
        }
    }

    /// Store an image and return its reference. The content type is taken from
    /// the file's magic bytes, not from what the client claims.
    pub async fn put(&self, bytes: &[u8]) -> Result<BlobRef, BlobError> {
        if bytes.is_empty() {
            return Err(BlobError::Empty);
        }
        if bytes.len() > self.max_bytes {
            return Err(BlobError::TooLarge {
                size: bytes.len(),
                limit: self.max_bytes,
            });
        }
        let content_type = detect_image_type(bytes).ok_or(BlobError::UnsupportedType)?;

        let digest = format!("{:x}", Sha256::digest(bytes));
        let key = format!("{}.{}", digest, extension_for(content_type));

        tokio::fs::create_dir_all(&self.root).await?;
        let path = self.root.join(&key);
        // Identical content is stored once.
        if !tokio::fs::try_exists(&path).await? {
            tokio::fs::write(&path, bytes).await?;
        }

        tracing::info!(key = %key, size = bytes.len(), "image stored");
        Ok(BlobRef {
            key,
            content_type: content_type.to_string(),
            size: bytes.len(),
        })
    }

    pub async fn get(&self, key: &str) -> Result<Vec<u8>, BlobError> {
        if !is_valid_key(key) {
            return Err(BlobError::InvalidKey);
        }
        Ok(tokio::fs::read(self.root.join(key)).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG: &[u8] = &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];

    #[test]
    fn test_detect_image_type() {
        assert_eq!(detect_image_type(PNG), Some("image/png"));
        assert_eq!(detect_image_type(&[0xFF, 0xD8, 0xFF, 0xE0]), Some("image/jpeg"));
        assert_eq!(detect_image_type(b"GIF89a"), Some("image/gif"));
        assert_eq!(detect_image_type(b"hello world"), None);
        assert_eq!(detect_image_type(&[0x89]), None);
    }

    #[test]
    fn test_key_validation_rejects_traversal() {
        assert!(!is_valid_key("../etc/passwd"));
        assert!(!is_valid_key("abc.png"));
        let good = format!("{}.png", "a".repeat(64));
        assert!(is_valid_key(&good));
    }

    #[tokio::test]
    async fn test_put_then_get_round_trips_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let store = BlobStore::new(dir.path(), 1024);
        let blob = store.put(PNG).await.unwrap();
        assert_eq!(blob.content_type, "image/png");
        assert_eq!(blob.size, PNG.len());
        assert!(blob.key.ends_with(".png"));
        assert_eq!(store.get(&blob.key).await.unwrap(), PNG);

        // Same content, same key.
        assert_eq!(store.put(PNG).await.unwrap().key, blob.key);
    }

    #[tokio::test]
    async fn test_put_rejects_oversized_and_non_images() {
        let dir = tempfile::tempdir().unwrap();
        let store = BlobStore::new(dir.path(), 8);
        assert!(matches!(
            store.put(PNG).await,
            Err(BlobError::TooLarge { .. })
        ));
        assert!(matches!(store.put(b"text").await, Err(BlobError::UnsupportedType)));
        assert!(matches!(store.put(b"").await, Err(BlobError::Empty)));
    }
}
