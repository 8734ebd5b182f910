//! Uploaded image processing: every upload is cropped to a fixed size and
//! stored as JPEG under the public directory.

use std::path::{Path, PathBuf};

use chrono::Utc;
use image::{DynamicImage, codecs::jpeg::JpegEncoder, imageops::FilterType};
use thiserror::Error;
use uuid::Uuid;

use crate::errors::ApiError;

pub const JPEG_QUALITY: u8 = 90;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageTarget {
    pub width: u32,
    pub height: u32,
}

pub const USER_PHOTO: ImageTarget = ImageTarget {
    width: 500,
    height: 500,
};
pub const TOUR_COVER: ImageTarget = ImageTarget {
    width: 2000,
    height: 1333,
};
pub const TOUR_IMAGE: ImageTarget = ImageTarget {
    width: 500,
    height: 500,
};

#[derive(Debug, Error)]
pub enum ImageError {
    #[error("Not an image! Please upload only images.")]
    NotAnImage,

    #[error("could not decode image: {0}")]
    Decode(#[from] image::ImageError),

    #[error("could not store image: {0}")]
    Io(#[from] std::io::Error),

    #[error("image task failed: {0}")]
    Task(String),
}

impl From<ImageError> for ApiError {
    fn from(err: ImageError) -> Self {
        match err {
            ImageError::NotAnImage | ImageError::Decode(_) => {
                Self::bad_request(ImageError::NotAnImage.to_string())
            }
            other => Self::internal("Failed to process image", Some(other.to_string())),
        }
    }
}

/// Reject uploads whose declared content type is not an image.
///
/// # Errors
///
/// `NotAnImage` for missing or non-image content types.
pub fn ensure_image(content_type: Option<&str>) -> Result<(), ImageError> {
    match content_type {
        Some(mime) if mime.starts_with("image/") => Ok(()),
        _ => Err(ImageError::NotAnImage),
    }
}

/// Decode, crop to `target` and re-encode as JPEG.
///
/// # Errors
///
/// Fails for undecodable input.
pub fn resize_to_jpeg(bytes: &[u8], target: ImageTarget) -> Result<Vec<u8>, ImageError> {
    let decoded = image::load_from_memory(bytes)?;
    let resized = decoded.resize_to_fill(target.width, target.height, FilterType::Lanczos3);
    let mut out = Vec::new();
    DynamicImage::ImageRgb8(resized.to_rgb8())
        .write_with_encoder(JpegEncoder::new_with_quality(&mut out, JPEG_QUALITY))?;
    Ok(out)
}

/// Resize on the blocking pool and write `dir/file_name`.
///
/// # Errors
///
/// Fails for undecodable input or when the file cannot be written.
pub async fn store(
    bytes: Vec<u8>,
    target: ImageTarget,
    dir: &Path,
    file_name: &str,
) -> Result<(), ImageError> {
    let jpeg = tokio::task::spawn_blocking(move || resize_to_jpeg(&bytes, target))
        .await
        .map_err(|e| ImageError::Task(e.to_string()))??;
    tokio::fs::create_dir_all(dir).await?;
    tokio::fs::write(dir.join(file_name), jpeg).await?;
    tracing::debug!(file = file_name, "Image stored");
    Ok(())
}

#[must_use]
pub fn users_dir(public_dir: &Path) -> PathBuf {
    public_dir.join("img").join("users")
}

#[must_use]
pub fn tours_dir(public_dir: &Path) -> PathBuf {
    public_dir.join("img").join("tours")
}

#[must_use]
pub fn user_photo_name(user_id: Uuid) -> String {
    format!("user-{user_id}-{}.jpeg", Utc::now().timestamp_millis())
}

#[must_use]
pub fn tour_cover_name(tour_id: Uuid, timestamp: i64) -> String {
    format!("tour-{tour_id}-{timestamp}-cover.jpeg")
}

/// `index` starts at 1.
#[must_use]
pub fn tour_image_name(tour_id: Uuid, timestamp: i64, index: usize) -> String {
    format!("tour-{tour_id}-{timestamp}-{index}.jpeg")
}
