use std::path::PathBuf;

use thiserror::Error;

/// Failures while loading, cutting or writing a single image
#[derive(Debug, Error)]
pub enum CutError {
    /// The reference template could not be opened or decoded.
    #[error("cannot read template {path:?}: {source}")]
    TemplateUnreadable {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// A batch file could not be opened or decoded.
    #[error("cannot read image {path:?}: {source}")]
    FileUnreadable {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// The image does not have the size the cut was fitted for.
    #[error("image is {actual_width}x{actual_height}, cut expects {expected_width}x{expected_height}")]
    DimensionMismatch {
        expected_width: u32,
        expected_height: u32,
        actual_width: u32,
        actual_height: u32,
    },

    /// No pixel lies on the kept side of the line.
    #[error("cut keeps no pixels")]
    EmptyResult,

    /// Writing the cropped image back over the source failed.
    #[error("cannot write {path:?}: {reason}")]
    WriteFailure { path: PathBuf, reason: String },
}
