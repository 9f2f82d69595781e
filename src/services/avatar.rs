use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::task;
use tracing::info;

use crate::config::Config;
use crate::db::DEFAULT_AVATAR;

/// Thumbnails fit inside this bounding box; smaller sources are stored as-is.
const THUMBNAIL_BOUND: u32 = 100;

/// Random bytes in a generated avatar filename (hex-encoded, so 16 chars).
const FILENAME_BYTES: usize = 8;

/// Accepts uploaded avatar images: thumbnail, random filename, stale-file
/// cleanup. Extension whitelisting happens at the form layer before bytes
/// ever reach this service.
pub struct AvatarService {
    config: Config,
}

impl AvatarService {
    #[must_use]
    pub const fn new(config: Config) -> Self {
        Self { config }
    }

    fn avatar_dir(&self) -> PathBuf {
        PathBuf::from(&self.config.media.avatar_path)
    }

    /// Store an uploaded image and return its generated filename.
    ///
    /// The upload is decoded, bounded to 100x100 preserving aspect ratio
    /// (never upscaled), and written under a fresh random name keeping the
    /// original extension. The caller's previous avatar is then deleted
    /// unless it is the shared default. The file write and the subsequent
    /// row update are not transactional; a crash in between orphans a file.
    pub async fn save_avatar(
        &self,
        bytes: Vec<u8>,
        original_filename: &str,
        previous: &str,
    ) -> Result<String> {
        let extension = Path::new(original_filename)
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase)
            .ok_or_else(|| anyhow::anyhow!("Upload has no file extension"))?;

        let filename = format!("{}.{}", random_hex(), extension);

        let avatar_dir = self.avatar_dir();
        if !avatar_dir.exists() {
            fs::create_dir_all(&avatar_dir).await?;
        }

        let path = avatar_dir.join(&filename);

        let write_path = path.clone();
        task::spawn_blocking(move || -> Result<()> {
            let img = image::load_from_memory(&bytes).context("Failed to decode avatar upload")?;

            let thumb = if img.width() > THUMBNAIL_BOUND || img.height() > THUMBNAIL_BOUND {
                img.thumbnail(THUMBNAIL_BOUND, THUMBNAIL_BOUND)
            } else {
                img
            };

            thumb
                .save(&write_path)
                .with_context(|| format!("Failed to write avatar to {}", write_path.display()))
        })
        .await
        .context("Avatar processing task panicked")??;

        info!(file = %filename, "Stored avatar thumbnail");

        if previous != DEFAULT_AVATAR {
            let old_path = avatar_dir.join(previous);
            match fs::remove_file(&old_path).await {
                Ok(()) => info!(file = %previous, "Removed previous avatar"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    return Err(e)
                        .with_context(|| format!("Failed to remove {}", old_path.display()));
                }
            }
        }

        Ok(filename)
    }
}

/// 16-char hex filename stem from 8 random bytes.
fn random_hex() -> String {
    use rand::Rng;

    let mut rng = rand::rng();
    let bytes: [u8; FILENAME_BYTES] = rng.random();

    bytes
        .iter()
        .fold(String::with_capacity(FILENAME_BYTES * 2), |mut acc, b| {
            use std::fmt::Write;
            let _ = write!(acc, "{b:02x}");
            acc
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn test_config(avatar_dir: &Path) -> Config {
        let mut config = Config::default();
        config.media.avatar_path = avatar_dir.to_string_lossy().into_owned();
        config
    }

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = image::DynamicImage::ImageRgb8(image::RgbImage::new(width, height));
        let mut buf = Cursor::new(Vec::new());
        img.write_to(&mut buf, image::ImageFormat::Png).unwrap();
        buf.into_inner()
    }

    #[test]
    fn random_hex_is_sixteen_lowercase_chars() {
        let name = random_hex();
        assert_eq!(name.len(), 16);
        assert!(name.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        assert_ne!(random_hex(), random_hex());
    }

    #[tokio::test]
    async fn large_upload_is_bounded_to_the_thumbnail_box() {
        let dir = tempfile::tempdir().unwrap();
        let service = AvatarService::new(test_config(dir.path()));

        let stored = service
            .save_avatar(png_bytes(4000, 3000), "huge.png", DEFAULT_AVATAR)
            .await
            .unwrap();

        let on_disk = image::open(dir.path().join(&stored)).unwrap();
        assert!(on_disk.width() <= THUMBNAIL_BOUND);
        assert!(on_disk.height() <= THUMBNAIL_BOUND);
        // Aspect ratio survives the shrink.
        assert_eq!(on_disk.width(), 100);
        assert_eq!(on_disk.height(), 75);
    }

    #[tokio::test]
    async fn small_upload_is_never_upscaled() {
        let dir = tempfile::tempdir().unwrap();
        let service = AvatarService::new(test_config(dir.path()));

        let stored = service
            .save_avatar(png_bytes(40, 30), "tiny.png", DEFAULT_AVATAR)
            .await
            .unwrap();

        let on_disk = image::open(dir.path().join(&stored)).unwrap();
        assert_eq!(on_disk.width(), 40);
        assert_eq!(on_disk.height(), 30);
    }

    #[tokio::test]
    async fn previous_non_default_avatar_is_deleted() {
        let dir = tempfile::tempdir().unwrap();
        let service = AvatarService::new(test_config(dir.path()));

        let first = service
            .save_avatar(png_bytes(300, 300), "one.png", DEFAULT_AVATAR)
            .await
            .unwrap();
        assert!(dir.path().join(&first).exists());

        let second = service
            .save_avatar(png_bytes(200, 200), "two.png", &first)
            .await
            .unwrap();

        assert!(!dir.path().join(&first).exists());
        assert!(dir.path().join(&second).exists());
    }

    #[tokio::test]
    async fn default_avatar_is_never_deleted() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path()).await.unwrap();
        tokio::fs::write(dir.path().join(DEFAULT_AVATAR), b"sentinel")
            .await
            .unwrap();

        let service = AvatarService::new(test_config(dir.path()));
        service
            .save_avatar(png_bytes(50, 50), "pic.jpeg", DEFAULT_AVATAR)
            .await
            .unwrap();

        assert!(dir.path().join(DEFAULT_AVATAR).exists());
    }

    #[tokio::test]
    async fn undecodable_bytes_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let service = AvatarService::new(test_config(dir.path()));

        let result = service
            .save_avatar(b"not an image".to_vec(), "evil.png", DEFAULT_AVATAR)
            .await;

        assert!(result.is_err());
    }
}
