use std::io::Cursor;

use bytes::Bytes;
use image::{DynamicImage, ImageFormat};
use rand::Rng;
use thiserror::Error;
use tracing::{debug, info, instrument};

use crate::storage::StorageClient;

/// Avatars are shrunk to fit inside a square of this side.
pub const AVATAR_MAX_SIDE: u32 = 200;

pub struct AvatarUpload {
    pub file_name: String,
    pub body: Bytes,
}

#[derive(Debug, Error)]
pub enum ImageError {
    #[error("unsupported image format")]
    UnsupportedFormat,
    #[error("failed to persist image: {0:#}")]
    Io(#[from] anyhow::Error),
}

/// Decodes, shrinks and stores an uploaded avatar. Returns the generated
/// file name, which is the storage key.
#[instrument(skip(storage, upload), fields(file_name = %upload.file_name, size = upload.body.len()))]
pub async fn store_avatar(
    storage: &dyn StorageClient,
    upload: AvatarUpload,
) -> Result<String, ImageError> {
    let (file_name, format) = unique_file_name(&upload.file_name)?;

    let body = upload.body;
    let encoded = tokio::task::spawn_blocking(move || shrink(&body, format))
        .await
        .map_err(|e| ImageError::Io(e.into()))??;

    storage.put_object(&file_name, encoded).await?;
    info!(%file_name, "avatar stored");
    Ok(file_name)
}

/// Output format chosen from the client's file extension.
pub fn format_from_extension(ext: &str) -> Option<ImageFormat> {
    match ext.to_ascii_lowercase().as_str() {
        "jpg" | "jpeg" => Some(ImageFormat::Jpeg),
        "png" => Some(ImageFormat::Png),
        _ => None,
    }
}

/// `<stem><16 hex digits>.<ext>` built from the client file name.
fn unique_file_name(original: &str) -> Result<(String, ImageFormat), ImageError> {
    let base = original.rsplit(['/', '\\']).next().unwrap_or_default();
    let (stem, ext) = base.rsplit_once('.').ok_or(ImageError::UnsupportedFormat)?;
    let format = format_from_extension(ext).ok_or(ImageError::UnsupportedFormat)?;

    let stem: String = stem
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    let token: u64 = rand::thread_rng().gen();
    let name = format!("{stem}{token:016x}.{}", ext.to_ascii_lowercase());
    Ok((name, format))
}

fn shrink(bytes: &[u8], format: ImageFormat) -> Result<Bytes, ImageError> {
    let img = image::load_from_memory(bytes).map_err(|e| {
        debug!(error = %e, "avatar decode failed");
        ImageError::UnsupportedFormat
    })?;

    let img = if img.width() > AVATAR_MAX_SIDE || img.height() > AVATAR_MAX_SIDE {
        img.thumbnail(AVATAR_MAX_SIDE, AVATAR_MAX_SIDE)
    } else {
        img
    };
    // JPEG has no alpha channel
    let img = match format {
        ImageFormat::Jpeg => DynamicImage::ImageRgb8(img.to_rgb8()),
        _ => img,
    };

    encode(&img, format)
}

/// Encode errors map to [`ImageError::Io`].
fn encode(img: &DynamicImage, format: ImageFormat) -> Result<Bytes, ImageError> {
    let mut out = Vec::new();
    img.write_to(&mut Cursor::new(&mut out), format)
        .map_err(|e| ImageError::Io(anyhow::Error::new(e).context("encode avatar")))?;
    Ok(Bytes::from(out))
}
