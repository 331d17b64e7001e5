//! Image upload pipeline.
//!
//! Uploads are decoded, bounded to a target size and written under the
//! media directory with a slug-plus-timestamp filename. Handlers only need
//! the returned filename; stale files from replaced uploads are removed
//! best-effort (log and continue).

use std::path::{Path, PathBuf};

use image::imageops::FilterType;
use image::DynamicImage;
use newsdesk_shared::{now_ms, CmsError, CmsResult};

#[derive(Debug, Clone, Copy)]
pub enum ImageKind {
    /// Listing/teaser image, 450x300 bound.
    Home,
    /// In-article image, 1024x1024 bound.
    Content,
}

impl ImageKind {
    fn bounds(self) -> (u32, u32) {
        match self {
            ImageKind::Home => (450, 300),
            ImageKind::Content => (1024, 1024),
        }
    }
}

/// Decode, downscale and persist an upload. Returns the stored filename.
pub async fn process_image(
    bytes: Vec<u8>,
    original_filename: &str,
    media_dir: &Path,
    kind: ImageKind,
) -> CmsResult<String> {
    let filename = storage_filename(original_filename);
    let target: PathBuf = media_dir.join(&filename);
    let (max_w, max_h) = kind.bounds();

    // Decoding and resizing are CPU-bound, keep them off the runtime
    // threads.
    let write_to = target.clone();
    tokio::task::spawn_blocking(move || -> CmsResult<()> {
        let decoded = image::load_from_memory(&bytes)
            .map_err(|err| CmsError::InvalidInput(format!("unreadable image: {err}")))?;
        let resized = if decoded.width() > max_w || decoded.height() > max_h {
            decoded.resize(max_w, max_h, FilterType::Lanczos3)
        } else {
            decoded
        };
        save(resized, &write_to)
    })
    .await
    .map_err(|err| CmsError::InvalidInput(format!("image task failed: {err}")))??;

    Ok(filename)
}

/// Remove a previously stored media file. Orphan cleanup is best-effort:
/// a failure here is logged, never surfaced.
pub async fn remove_media(media_dir: &Path, filename: &str) {
    let path = media_dir.join(filename);
    if let Err(err) = tokio::fs::remove_file(&path).await {
        tracing::warn!(file = %path.display(), "could not remove media file: {err}");
    }
}

fn save(img: DynamicImage, path: &Path) -> CmsResult<()> {
    let result = if path.extension().and_then(|e| e.to_str()) == Some("png") {
        img.save(path)
    } else {
        // JPEG output cannot carry an alpha channel.
        img.to_rgb8().save(path)
    };
    result.map_err(|err| CmsError::InvalidInput(format!("could not store image: {err}")))
}

/// `Cover Photo.JPG` -> `cover-photo-1700000000000.jpg`. The timestamp
/// keeps repeated uploads of the same file from colliding.
fn storage_filename(original: &str) -> String {
    let (stem, ext) = match original.rsplit_once('.') {
        Some((stem, ext)) => (stem, ext.to_ascii_lowercase()),
        None => (original, "jpg".to_string()),
    };
    let ext = match ext.as_str() {
        "png" => "png",
        _ => "jpg",
    };
    format!("{}-{}.{}", slugify(stem), now_ms(), ext)
}

/// Lowercased, alphanumerics kept, everything else collapsed to single
/// dashes.
pub fn slugify(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut last_dash = true;
    for c in input.chars() {
        if c.is_alphanumeric() {
            out.extend(c.to_lowercase());
            last_dash = false;
        } else if !last_dash {
            out.push('-');
            last_dash = true;
        }
    }
    while out.ends_with('-') {
        out.pop();
    }
    if out.is_empty() {
        out.push_str("upload");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugify_basics() {
        assert_eq!(slugify("Cover Photo"), "cover-photo");
        assert_eq!(slugify("  a__b  "), "a-b");
        assert_eq!(slugify("Grüße 2024"), "grüße-2024");
        assert_eq!(slugify("!!!"), "upload");
    }

    #[test]
    fn storage_filename_shape() {
        let name = storage_filename("My Pic.PNG");
        assert!(name.starts_with("my-pic-"), "{name}");
        assert!(name.ends_with(".png"), "{name}");

        let fallback = storage_filename("weird.webp");
        assert!(fallback.ends_with(".jpg"), "{fallback}");
    }

    #[tokio::test]
    async fn processes_and_stores_a_real_image() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut png = Vec::new();
        image::DynamicImage::new_rgb8(800, 600)
            .write_to(&mut std::io::Cursor::new(&mut png), image::ImageFormat::Png)
            .expect("encode");

        let filename = process_image(png, "big.png", dir.path(), ImageKind::Home)
            .await
            .expect("process");
        let stored = image::open(dir.path().join(&filename)).expect("reopen");
        assert!(stored.width() <= 450 && stored.height() <= 300);

        remove_media(dir.path(), &filename).await;
        assert!(!dir.path().join(&filename).exists());
    }

    #[tokio::test]
    async fn garbage_bytes_are_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = process_image(vec![1, 2, 3], "x.png", dir.path(), ImageKind::Content)
            .await
            .expect_err("must fail");
        assert!(matches!(err, CmsError::InvalidInput(_)));
    }
}
