use std::fmt;
use std::path::{Path, PathBuf};

use image::{ImageReader, RgbImage};
use tracing::info;

use crate::error::CutError;
use crate::geometry::ImageBounds;

/// The image whose size every batch image is brought to before cutting
#[derive(Clone)]
pub struct ReferenceTemplate {
    path: PathBuf,
    image: RgbImage,
}

impl fmt::Debug for ReferenceTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReferenceTemplate")
            .field("path", &self.path)
            .field("width", &self.image.width())
            .field("height", &self.image.height())
            .finish()
    }
}

impl ReferenceTemplate {
    /// Decode the template from disk
    pub fn open(path: impl AsRef<Path>) -> Result<Self, CutError> {
        let path = path.as_ref();
        let image = decode_rgb(path).map_err(|source| CutError::TemplateUnreadable {
            path: path.to_path_buf(),
            source,
        })?;

        info!(
            path = %path.display(),
            width = image.width(),
            height = image.height(),
            "Loaded reference template"
        );

        Ok(Self::from_image(path, image))
    }

    pub fn from_image(path: impl Into<PathBuf>, image: RgbImage) -> Self {
        Self {
            path: path.into(),
            image,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    pub fn bounds(&self) -> ImageBounds {
        ImageBounds::new(self.image.width(), self.image.height())
    }
}

/// Open an image file, sniffing the format from content when the extension lies
pub(crate) fn decode_rgb(path: &Path) -> Result<RgbImage, image::ImageError> {
    let image = ImageReader::open(path)?.with_guessed_format()?.decode()?;
    Ok(image.into_rgb8())
}
