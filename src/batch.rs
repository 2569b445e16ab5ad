use std::fmt;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use image::imageops::{self, FilterType};
use image::{ImageFormat, RgbImage};
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::error::CutError;
use crate::mask::{CutSpec, KeepMask};
use crate::template::{decode_rgb, ReferenceTemplate};

/// File extensions picked up by the directory walk (compared lowercase)
pub const SUPPORTED_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "bmp", "tiff"];

/// Knobs for a batch run
#[derive(Debug, Clone, Copy)]
pub struct BatchOptions {
    /// Worker threads; 1 processes files strictly in order
    pub jobs: usize,
    /// Filter used when an image has to be brought to the template size
    pub filter: FilterType,
    /// Cut everything but leave files on disk untouched
    pub dry_run: bool,
    /// Draw a progress bar on stderr
    pub progress: bool,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            jobs: 1,
            filter: FilterType::Triangle,
            dry_run: false,
            progress: false,
        }
    }
}

/// Cooperative stop signal checked before each file is started
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// What happened to one file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileOutcome {
    /// Cut and written back (or would have been, on a dry run)
    Ok,
    SkippedUnreadable,
    SkippedEmpty,
    SkippedWriteError,
    /// Cut rejected the image for any other reason
    SkippedInvalid,
}

impl From<&CutError> for FileOutcome {
    fn from(err: &CutError) -> Self {
        match err {
            CutError::FileUnreadable { .. } => FileOutcome::SkippedUnreadable,
            CutError::EmptyResult => FileOutcome::SkippedEmpty,
            CutError::WriteFailure { .. } => FileOutcome::SkippedWriteError,
            CutError::TemplateUnreadable { .. } | CutError::DimensionMismatch { .. } => {
                FileOutcome::SkippedInvalid
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct FileReport {
    pub path: PathBuf,
    pub outcome: FileOutcome,
}

/// Counts and per-file outcomes of a batch run
#[derive(Debug, Clone, Default)]
pub struct BatchResult {
    pub attempted: usize,
    pub succeeded: usize,
    /// Set when the run stopped early; files not started are absent from `files`
    pub cancelled: bool,
    pub files: Vec<FileReport>,
}

impl BatchResult {
    pub fn failed(&self) -> usize {
        self.attempted - self.succeeded
    }

    pub fn outcome_of(&self, path: &Path) -> Option<FileOutcome> {
        self.files
            .iter()
            .find(|report| report.path == path)
            .map(|report| report.outcome)
    }

    fn push(&mut self, path: PathBuf, outcome: FileOutcome) {
        self.attempted += 1;
        if outcome == FileOutcome::Ok {
            self.succeeded += 1;
        }
        self.files.push(FileReport { path, outcome });
    }
}

impl fmt::Display for BatchResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Processed {}/{} images ({} failed)",
            self.succeeded,
            self.attempted,
            self.failed()
        )?;
        if self.cancelled {
            write!(f, ", cancelled before finishing")?;
        }
        Ok(())
    }
}

pub fn is_supported_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            let ext = ext.to_ascii_lowercase();
            SUPPORTED_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}

/// Every supported image under `root`, recursively, sorted by name within each directory
pub fn collect_images(root: &Path) -> Vec<PathBuf> {
    WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!("Skipping unreadable directory entry: {e}");
                None
            }
        })
        // `Path::is_file` follows symlinks, so linked images are picked up too
        .filter(|entry| entry.path().is_file() && is_supported_image(entry.path()))
        .map(|entry| entry.into_path())
        .collect()
}

/// Applies one frozen cut to many files
pub struct BatchProcessor {
    mask: KeepMask,
    options: BatchOptions,
    cancel: CancelToken,
}

impl BatchProcessor {
    /// Fails with [`CutError::DimensionMismatch`] when `spec` was not fitted on
    /// an image the size of `template`.
    pub fn new(
        template: &ReferenceTemplate,
        spec: &CutSpec,
        options: BatchOptions,
    ) -> Result<Self, CutError> {
        let expected = template.bounds();
        if spec.bounds != expected {
            return Err(CutError::DimensionMismatch {
                expected_width: expected.width,
                expected_height: expected.height,
                actual_width: spec.bounds.width,
                actual_height: spec.bounds.height,
            });
        }

        let mask = KeepMask::build(spec);
        match mask.output_dimensions() {
            Some((w, h)) => debug!(w, h, "Every output will be cropped to this size"),
            None => warn!("The chosen side keeps no pixels; every file will be skipped"),
        }

        Ok(Self {
            mask,
            options,
            cancel: CancelToken::new(),
        })
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Walk `root` and process everything found
    pub fn run(&self, root: &Path) -> BatchResult {
        let files = collect_images(root);
        self.run_files(&files)
    }

    /// Process the given files in order; per-file failures are logged and counted
    pub fn run_files(&self, files: &[PathBuf]) -> BatchResult {
        info!(
            count = files.len(),
            jobs = self.options.jobs,
            dry_run = self.options.dry_run,
            "Starting batch"
        );

        let progress = self.progress_bar(files.len());
        let outcomes: Vec<Option<FileOutcome>> = if self.options.jobs > 1 {
            match rayon::ThreadPoolBuilder::new()
                .num_threads(self.options.jobs)
                .build()
            {
                Ok(pool) => pool.install(|| {
                    files
                        .par_iter()
                        .map(|path| self.process_tracked(path, &progress))
                        .collect()
                }),
                Err(e) => {
                    warn!("Could not start worker pool, processing sequentially: {e}");
                    self.run_sequential(files, &progress)
                }
            }
        } else {
            self.run_sequential(files, &progress)
        };
        progress.finish_and_clear();

        let mut result = BatchResult::default();
        for (path, outcome) in files.iter().zip(outcomes) {
            match outcome {
                Some(outcome) => result.push(path.clone(), outcome),
                None => result.cancelled = true,
            }
        }

        info!(
            attempted = result.attempted,
            succeeded = result.succeeded,
            cancelled = result.cancelled,
            "Batch finished"
        );
        result
    }

    fn run_sequential(&self, files: &[PathBuf], progress: &ProgressBar) -> Vec<Option<FileOutcome>> {
        files
            .iter()
            .map(|path| self.process_tracked(path, progress))
            .collect()
    }

    fn progress_bar(&self, len: usize) -> ProgressBar {
        if !self.options.progress {
            return ProgressBar::hidden();
        }

        let bar = ProgressBar::new(len as u64);
        if let Ok(style) = ProgressStyle::with_template(
            "{spinner:.green} [{elapsed}] [{bar:40.cyan/blue}] {pos}/{len} {wide_msg}",
        ) {
            bar.set_style(style.progress_chars("#>-"));
        }
        bar
    }

    /// `None` when the run was cancelled before this file was started
    fn process_tracked(&self, path: &Path, progress: &ProgressBar) -> Option<FileOutcome> {
        if self.cancel.is_cancelled() {
            return None;
        }

        if let Some(name) = path.file_name() {
            progress.set_message(name.to_string_lossy().into_owned());
        }

        let outcome = match self.process_file(path) {
            Ok(()) => {
                debug!(path = %path.display(), "Cut written");
                FileOutcome::Ok
            }
            Err(e) => {
                warn!(path = %path.display(), "Skipping: {e}");
                FileOutcome::from(&e)
            }
        };
        progress.inc(1);
        Some(outcome)
    }

    /// Decode, bring to template size, cut, overwrite
    pub fn process_file(&self, path: &Path) -> Result<(), CutError> {
        let image = decode_rgb(path).map_err(|source| CutError::FileUnreadable {
            path: path.to_path_buf(),
            source,
        })?;

        let target = self.mask.bounds();
        let image = if image.dimensions() != (target.width, target.height) {
            debug!(
                path = %path.display(),
                from = ?image.dimensions(),
                to = ?(target.width, target.height),
                "Resizing to template size"
            );
            imageops::resize(&image, target.width, target.height, self.options.filter)
        } else {
            image
        };

        let cropped = self.mask.apply(&image)?;

        if self.options.dry_run {
            return Ok(());
        }
        overwrite_image(path, &cropped)
    }
}

/// Replace `path` with `image`, encoded in the format its extension names.
///
/// The bytes go to a temporary file next to the target which is renamed over
/// it only after a complete write; on any error the original stays intact.
/// A symlinked path is resolved first so the link keeps pointing at the
/// rewritten file.
pub fn overwrite_image(path: &Path, image: &RgbImage) -> Result<(), CutError> {
    let fail = |reason: String| CutError::WriteFailure {
        path: path.to_path_buf(),
        reason,
    };

    let format = ImageFormat::from_path(path).map_err(|e| fail(e.to_string()))?;
    let target = fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
    let dir = match target.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| fail(e.to_string()))?;
    {
        let mut writer = BufWriter::new(tmp.as_file_mut());
        image
            .write_to(&mut writer, format)
            .map_err(|e| fail(e.to_string()))?;
        writer.flush().map_err(|e| fail(e.to_string()))?;
    }
    tmp.as_file().sync_all().map_err(|e| fail(e.to_string()))?;

    if let Ok(metadata) = fs::metadata(&target) {
        fs::set_permissions(tmp.path(), metadata.permissions()).map_err(|e| fail(e.to_string()))?;
    }

    tmp.persist(&target).map_err(|e| fail(e.error.to_string()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{ImageBounds, Line, Point, Side};
    use image::Rgb;

    fn left_half_spec() -> CutSpec {
        CutSpec::new(
            Line::new(Point::new(50.0, 0.0), Point::new(50.0, 100.0)),
            Side::Left,
            ImageBounds::new(100, 100),
        )
    }

    fn template() -> ReferenceTemplate {
        ReferenceTemplate::from_image("ref.png", RgbImage::from_pixel(100, 100, Rgb([9, 9, 9])))
    }

    #[test]
    fn test_supported_extensions_case_insensitive() {
        assert!(is_supported_image(Path::new("a/b/photo.JPG")));
        assert!(is_supported_image(Path::new("scan.tiff")));
        assert!(is_supported_image(Path::new("x.Jpeg")));
        assert!(!is_supported_image(Path::new("scan.tif")));
        assert!(!is_supported_image(Path::new("notes.txt")));
        assert!(!is_supported_image(Path::new("png")));
    }

    #[test]
    fn test_collect_images_recurses_and_filters() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        fs::create_dir_all(&nested).unwrap();
        fs::write(dir.path().join("top.png"), b"").unwrap();
        fs::write(nested.join("deep.BMP"), b"").unwrap();
        fs::write(nested.join("readme.md"), b"").unwrap();

        let found = collect_images(dir.path());
        assert_eq!(found, vec![nested.join("deep.BMP"), dir.path().join("top.png")]);
    }

    #[test]
    fn test_cancelled_run_attempts_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("one.png");
        RgbImage::from_pixel(100, 100, Rgb([1, 1, 1])).save(&path).unwrap();

        let template = template();
        let cancel = CancelToken::new();
        cancel.cancel();
        let processor = BatchProcessor::new(&template, &left_half_spec(), BatchOptions::default())
            .unwrap()
            .with_cancel(cancel);

        let result = processor.run(dir.path());
        assert!(result.cancelled);
        assert_eq!(result.attempted, 0);
        assert_eq!(image::open(&path).unwrap().width(), 100);
    }

    #[test]
    fn test_overwrite_with_unknown_extension_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.unknownext");
        let err = overwrite_image(&path, &RgbImage::new(2, 2)).unwrap_err();
        assert!(matches!(err, CutError::WriteFailure { .. }));
        assert!(!path.exists());
    }

    #[test]
    fn test_dry_run_leaves_file_alone() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("one.png");
        RgbImage::from_pixel(100, 100, Rgb([1, 1, 1])).save(&path).unwrap();

        let template = template();
        let options = BatchOptions {
            dry_run: true,
            ..BatchOptions::default()
        };
        let result = BatchProcessor::new(&template, &left_half_spec(), options)
            .unwrap()
            .run(dir.path());

        assert_eq!((result.attempted, result.succeeded), (1, 1));
        assert_eq!(image::open(&path).unwrap().width(), 100);
    }

    #[test]
    fn test_spec_fitted_on_other_size_is_rejected() {
        let template = template();
        let spec = CutSpec::new(
            Line::new(Point::new(25.0, 0.0), Point::new(25.0, 50.0)),
            Side::Left,
            ImageBounds::new(50, 50),
        );

        let err = BatchProcessor::new(&template, &spec, BatchOptions::default())
            .err()
            .unwrap();
        assert!(matches!(
            err,
            CutError::DimensionMismatch {
                expected_width: 100,
                actual_width: 50,
                ..
            }
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinked_image_is_cut_through_the_link() {
        let dir = tempfile::tempdir().unwrap();
        let store = dir.path().join("store");
        let root = dir.path().join("root");
        fs::create_dir_all(&store).unwrap();
        fs::create_dir_all(&root).unwrap();

        let real = store.join("real.png");
        RgbImage::from_pixel(100, 100, Rgb([7, 7, 7])).save(&real).unwrap();
        let link = root.join("link.png");
        std::os::unix::fs::symlink(&real, &link).unwrap();

        assert_eq!(collect_images(&root), vec![link.clone()]);

        let template = template();
        let result = BatchProcessor::new(&template, &left_half_spec(), BatchOptions::default())
            .unwrap()
            .run(&root);

        assert_eq!((result.attempted, result.succeeded), (1, 1));
        assert!(fs::symlink_metadata(&link).unwrap().file_type().is_symlink());
        assert_eq!(image::open(&real).unwrap().width(), 50);
    }

    #[test]
    fn test_summary_line() {
        let mut result = BatchResult::default();
        result.push(PathBuf::from("a.png"), FileOutcome::Ok);
        result.push(PathBuf::from("b.png"), FileOutcome::SkippedUnreadable);
        assert_eq!(result.to_string(), "Processed 1/2 images (1 failed)");
        assert_eq!(result.outcome_of(Path::new("b.png")), Some(FileOutcome::SkippedUnreadable));
    }
}
