use std::path::Path;

use image::RgbImage;

use crate::{Result, VisualizerError};

/// Loads cover art. Failures are never fatal to a render; see [`load_cover`].
pub trait CoverLoader: Send + Sync {
    fn load(&self, path: &Path) -> Result<RgbImage>;
}

/// Reads PNG/JPEG files from disk via the `image` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct FileCoverLoader;

impl FileCoverLoader {
    pub fn supports_format(path: &Path) -> bool {
        path.extension()
            .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
            .is_some_and(|ext| matches!(ext.as_str(), "png" | "jpg" | "jpeg"))
    }
}

impl CoverLoader for FileCoverLoader {
    fn load(&self, path: &Path) -> Result<RgbImage> {
        if !path.exists() {
            return Err(VisualizerError::msg(format!(
                "cover image not found: {}",
                path.display()
            )));
        }
        if !Self::supports_format(path) {
            return Err(VisualizerError::msg(format!(
                "unsupported cover format (expected png or jpeg): {}",
                path.display()
            )));
        }
        let image = image::open(path)?.to_rgb8();
        tracing::info!(
            width = image.width(),
            height = image.height(),
            path = %path.display(),
            "cover art loaded"
        );
        Ok(image)
    }
}

/// Loads the optional cover, degrading to `None` with a warning on failure.
pub fn load_cover(loader: &dyn CoverLoader, path: Option<&Path>) -> Option<RgbImage> {
    let path = path?;
    match loader.load(path) {
        Ok(image) => Some(image),
        Err(err) => {
            tracing::warn!(path = %path.display(), %err, "could not load cover art, continuing without it");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn loads_png_as_rgb() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cover.png");
        RgbImage::from_pixel(3, 2, Rgb([1, 2, 3])).save(&path).unwrap();

        let image = FileCoverLoader.load(&path).unwrap();
        assert_eq!(image.dimensions(), (3, 2));
        assert_eq!(image.get_pixel(2, 1).0, [1, 2, 3]);
    }

    #[test]
    fn missing_or_corrupt_cover_degrades_to_none() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.png");
        assert!(load_cover(&FileCoverLoader, Some(&missing)).is_none());

        let corrupt = dir.path().join("bad.jpg");
        std::fs::write(&corrupt, b"definitely not a jpeg").unwrap();
        assert!(load_cover(&FileCoverLoader, Some(&corrupt)).is_none());

        assert!(load_cover(&FileCoverLoader, None).is_none());
    }

    #[test]
    fn recognises_supported_extensions() {
        assert!(FileCoverLoader::supports_format(Path::new("art.JPG")));
        assert!(FileCoverLoader::supports_format(Path::new("a/b.png")));
        assert!(!FileCoverLoader::supports_format(Path::new("notes.txt")));
    }

    #[test]
    fn rejects_unsupported_extension_before_decoding() {
        let dir = tempfile::tempdir().unwrap();
        let png = dir.path().join("cover.png");
        RgbImage::from_pixel(2, 2, Rgb([9, 9, 9])).save(&png).unwrap();
        let renamed = dir.path().join("cover.gif");
        std::fs::copy(&png, &renamed).unwrap();

        let err = FileCoverLoader.load(&renamed).unwrap_err();
        assert!(err.to_string().contains("unsupported cover format"), "{err}");
        assert!(load_cover(&FileCoverLoader, Some(&renamed)).is_none());
    }
}
