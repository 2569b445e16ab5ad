use clap::{Args, Parser, ValueEnum};
use image::imageops::FilterType;
use std::path::PathBuf;

use crate::batch::BatchOptions;
use crate::geometry::{Point, Side};

#[derive(Parser, Debug)]
#[command(name = "picture-cut")]
#[command(version, about = "Cut every image in a folder tree along a line drawn on a reference image")]
pub struct Cli {
    /// Folder whose images (recursively) are cut and overwritten in place
    #[arg(required = true)]
    pub root: PathBuf,

    /// Reference image; its size is the size every batch image is brought to
    #[arg(short, long)]
    pub template: PathBuf,

    /// Cut line drawn on the template, as "X1,Y1,X2,Y2" in template pixels
    #[arg(short, long, value_parser = parse_line, allow_hyphen_values = true)]
    pub line: (Point, Point),

    #[command(flatten)]
    pub keep: KeepArgs,

    /// Worker threads (1 processes files one after another)
    #[arg(short, long, default_value = "1")]
    pub jobs: usize,

    /// Interpolation used when a batch image differs in size from the template
    #[arg(long, value_enum, default_value_t = ResizeFilter::Bilinear)]
    pub filter: ResizeFilter,

    /// Cut every image but do not overwrite anything
    #[arg(long)]
    pub dry_run: bool,

    /// Hide the progress bar
    #[arg(long)]
    pub no_progress: bool,

    /// Show per-file details
    #[arg(short, long)]
    pub verbose: bool,
}

/// How the side to keep is given; exactly one is required
#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
pub struct KeepArgs {
    /// A point on the side to keep, as "X,Y" in template pixels
    #[arg(short = 'k', long, value_parser = parse_point, allow_hyphen_values = true)]
    pub keep_point: Option<Point>,

    /// The side to keep, relative to the fitted line
    #[arg(short, long, value_enum)]
    pub side: Option<SideArg>,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SideArg {
    Left,
    Right,
}

impl From<SideArg> for Side {
    fn from(side: SideArg) -> Self {
        match side {
            SideArg::Left => Side::Left,
            SideArg::Right => Side::Right,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResizeFilter {
    Nearest,
    Bilinear,
    Cubic,
    Lanczos,
}

impl From<ResizeFilter> for FilterType {
    fn from(filter: ResizeFilter) -> Self {
        match filter {
            ResizeFilter::Nearest => FilterType::Nearest,
            ResizeFilter::Bilinear => FilterType::Triangle,
            ResizeFilter::Cubic => FilterType::CatmullRom,
            ResizeFilter::Lanczos => FilterType::Lanczos3,
        }
    }
}

impl Cli {
    pub fn batch_options(&self) -> BatchOptions {
        BatchOptions {
            jobs: self.jobs.max(1),
            filter: self.filter.into(),
            dry_run: self.dry_run,
            progress: !self.no_progress,
        }
    }
}

fn parse_numbers<const N: usize>(s: &str, expected: &str) -> Result<[f64; N], String> {
    let parts: Vec<&str> = s.split(',').map(str::trim).collect();
    if parts.len() != N {
        return Err(format!("Invalid format '{}', expected {}", s, expected));
    }

    let mut values = [0.0_f64; N];
    for (value, part) in values.iter_mut().zip(&parts) {
        *value = part
            .parse()
            .map_err(|_| format!("Invalid coordinate: {}", part))?;
        if !value.is_finite() {
            return Err(format!("Coordinate must be finite: {}", part));
        }
    }

    Ok(values)
}

fn parse_point(s: &str) -> Result<Point, String> {
    let [x, y] = parse_numbers::<2>(s, "X,Y")?;
    Ok(Point::new(x, y))
}

fn parse_line(s: &str) -> Result<(Point, Point), String> {
    let [x1, y1, x2, y2] = parse_numbers::<4>(s, "X1,Y1,X2,Y2")?;
    Ok((Point::new(x1, y1), Point::new(x2, y2)))
}
