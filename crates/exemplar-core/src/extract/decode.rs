//! Reading, fingerprinting and decoding image files.

use std::io::Cursor;
use std::path::Path;

use image::{DynamicImage, GenericImageView};

use crate::config::LimitsConfig;
use crate::error::ExtractionError;

/// Read an image file after checking it against the size limit.
pub async fn read_image(path: &Path, limits: &LimitsConfig) -> Result<Vec<u8>, ExtractionError> {
    let read_err = |e: std::io::Error| ExtractionError::Read {
        path: path.to_path_buf(),
        message: e.to_string(),
    };

    let metadata = tokio::fs::metadata(path).await.map_err(read_err)?;
    let max_bytes = limits.max_file_size_mb.saturating_mul(1024 * 1024);
    if metadata.len() > max_bytes {
        return Err(ExtractionError::FileTooLarge {
            path: path.to_path_buf(),
            size_mb: metadata.len() / (1024 * 1024),
            max_mb: limits.max_file_size_mb,
        });
    }

    tokio::fs::read(path).await.map_err(read_err)
}

/// BLAKE3 hex digest of the file contents.
pub fn fingerprint(bytes: &[u8]) -> String {
    blake3::hash(bytes).to_hex().to_string()
}

/// Decode image bytes, detecting the format from content rather than extension.
///
/// Blocking; call from `spawn_blocking`.
pub fn decode(bytes: &[u8], path: &Path, max_dimension: u32) -> Result<DynamicImage, ExtractionError> {
    let reader = image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| ExtractionError::Decode {
            path: path.to_path_buf(),
            message: format!("cannot detect image format: {e}"),
        })?;

    if reader.format().is_none() {
        return Err(ExtractionError::Decode {
            path: path.to_path_buf(),
            message: "unrecognized image format".to_string(),
        });
    }

    let image = reader.decode().map_err(|e| ExtractionError::Decode {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    let (width, height) = image.dimensions();
    if width > max_dimension || height > max_dimension {
        return Err(ExtractionError::ImageTooLarge {
            path: path.to_path_buf(),
            width,
            height,
            max_dim: max_dimension,
        });
    }
    Ok(image)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgb, RgbImage};

    fn png_bytes(w: u32, h: u32) -> Vec<u8> {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(w, h, Rgb([10, 20, 30])));
        let mut buf = Cursor::new(Vec::new());
        img.write_to(&mut buf, ImageFormat::Png).unwrap();
        buf.into_inner()
    }

    #[test]
    fn test_fingerprint_stable_and_content_sensitive() {
        let a = png_bytes(4, 4);
        let b = png_bytes(5, 4);
        assert_eq!(fingerprint(&a), fingerprint(&a));
        assert_ne!(fingerprint(&a), fingerprint(&b));
        assert_eq!(fingerprint(&a).len(), 64);
    }

    #[test]
    fn test_decode_detects_format_from_content() {
        let bytes = png_bytes(8, 6);
        let image = decode(&bytes, Path::new("misnamed.jpg"), 100).unwrap();
        assert_eq!(image.dimensions(), (8, 6));
    }

    #[test]
    fn test_decode_rejects_garbage() {
        let err = decode(b"definitely not an image", Path::new("x.png"), 100).unwrap_err();
        assert!(matches!(err, ExtractionError::Decode { .. }));
    }

    #[test]
    fn test_decode_enforces_dimension_limit() {
        let bytes = png_bytes(20, 4);
        let err = decode(&bytes, Path::new("wide.png"), 10).unwrap_err();
        assert!(matches!(err, ExtractionError::ImageTooLarge { width: 20, .. }));
    }

    #[tokio::test]
    async fn test_read_image_missing_file() {
        let err = read_image(Path::new("/nonexistent/x.png"), &LimitsConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractionError::Read { .. }));
    }

    #[tokio::test]
    async fn test_read_image_with_huge_size_limit() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.png");
        std::fs::write(&path, png_bytes(2, 2)).unwrap();
        let limits = LimitsConfig {
            max_file_size_mb: u64::MAX,
            ..LimitsConfig::default()
        };
        let bytes = read_image(&path, &limits).await.unwrap();
        assert_eq!(bytes, png_bytes(2, 2));
    }
}
