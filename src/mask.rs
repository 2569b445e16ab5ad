use image::{imageops, GrayImage, Luma, Rgb, RgbImage};
use imageproc::rect::Rect;
use tracing::debug;

use crate::error::CutError;
use crate::geometry::{ImageBounds, Line, Side};

const KEPT: Luma<u8> = Luma([255]);

/// A frozen cut: the fitted line, the side to keep, and the image size both
/// are expressed in
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CutSpec {
    pub line: Line,
    pub keep_side: Side,
    pub bounds: ImageBounds,
}

impl CutSpec {
    pub fn new(line: Line, keep_side: Side, bounds: ImageBounds) -> Self {
        Self {
            line,
            keep_side,
            bounds,
        }
    }
}

/// Binary keep-mask for one cut, plus the bounding rectangle of what it keeps
///
/// The mask only depends on the [`CutSpec`], so it is built once and applied
/// to any number of images of the same size.
#[derive(Debug, Clone)]
pub struct KeepMask {
    bounds: ImageBounds,
    mask: GrayImage,
    bounding_rect: Option<Rect>,
}

impl KeepMask {
    /// Evaluate the half-plane test for every pixel center.
    ///
    /// Each row is a single affine sweep: `B·y + C` is computed once and the
    /// row walks `A·x` across it. Pixels whose center lies exactly on the
    /// line are kept for either side; for a snapped line that only happens
    /// when it sits on a half-pixel coordinate such as `x = 49.5`.
    pub fn build(spec: &CutSpec) -> Self {
        let ImageBounds { width, height } = spec.bounds;
        let equation = spec.line.equation();
        let mut mask = GrayImage::new(width, height);

        let mut min_x = width;
        let mut max_x = 0;
        let mut min_y = height;
        let mut max_y = 0;

        for y in 0..height {
            let row_offset = equation.row_offset(y as f64 + 0.5);
            let mut row_kept = false;

            for x in 0..width {
                let distance = equation.signed_distance_in_row(x as f64 + 0.5, row_offset);
                if spec.keep_side.keeps(distance) {
                    mask.put_pixel(x, y, KEPT);
                    min_x = min_x.min(x);
                    max_x = max_x.max(x);
                    row_kept = true;
                }
            }

            if row_kept {
                min_y = min_y.min(y);
                max_y = max_y.max(y);
            }
        }

        let bounding_rect = (min_x <= max_x && min_y <= max_y).then(|| {
            Rect::at(min_x as i32, min_y as i32).of_size(max_x - min_x + 1, max_y - min_y + 1)
        });

        debug!(
            width,
            height,
            side = %spec.keep_side,
            rect = ?bounding_rect,
            "Built keep mask"
        );

        Self {
            bounds: spec.bounds,
            mask,
            bounding_rect,
        }
    }

    pub fn bounds(&self) -> ImageBounds {
        self.bounds
    }

    /// Smallest rectangle enclosing every kept pixel, `None` if nothing is kept
    pub fn bounding_rect(&self) -> Option<Rect> {
        self.bounding_rect
    }

    pub fn is_kept(&self, x: u32, y: u32) -> bool {
        self.mask.get_pixel(x, y)[0] != 0
    }

    pub fn kept_count(&self) -> usize {
        self.mask.pixels().filter(|p| p[0] != 0).count()
    }

    /// Size of every image this mask produces
    pub fn output_dimensions(&self) -> Option<(u32, u32)> {
        self.bounding_rect.map(|r| (r.width(), r.height()))
    }

    /// Black out discarded pixels and crop to the kept region.
    ///
    /// The input is left untouched.
    pub fn apply(&self, image: &RgbImage) -> Result<RgbImage, CutError> {
        let (actual_width, actual_height) = image.dimensions();
        if actual_width != self.bounds.width || actual_height != self.bounds.height {
            return Err(CutError::DimensionMismatch {
                expected_width: self.bounds.width,
                expected_height: self.bounds.height,
                actual_width,
                actual_height,
            });
        }

        let rect = self.bounding_rect.ok_or(CutError::EmptyResult)?;
        let (left, top) = (rect.left() as u32, rect.top() as u32);

        let mut cropped = imageops::crop_imm(image, left, top, rect.width(), rect.height()).to_image();
        for (x, y, pixel) in cropped.enumerate_pixels_mut() {
            if !self.is_kept(left + x, top + y) {
                *pixel = Rgb([0, 0, 0]);
            }
        }

        Ok(cropped)
    }
}

/// Cut a single image: build the mask for `spec` and apply it
pub fn cut(image: &RgbImage, spec: &CutSpec) -> Result<RgbImage, CutError> {
    KeepMask::build(spec).apply(image)
}
