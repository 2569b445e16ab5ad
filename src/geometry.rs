use nalgebra::Vector3;

/// Segments shorter than this on both axes are too short to judge orientation
pub const MIN_LINE_EXTENT: f64 = 5.0;

/// Angular distance (degrees) within which a line counts as horizontal or vertical
pub const SNAP_TOLERANCE_DEGREES: f64 = 10.0;

/// A point in image pixel space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    fn homogeneous(&self) -> Vector3<f64> {
        Vector3::new(self.x, self.y, 1.0)
    }
}

/// Width and height of the pixel grid a line is expressed in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageBounds {
    pub width: u32,
    pub height: u32,
}

impl ImageBounds {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// A straight line through two points; the order of the points gives it a direction
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Line {
    pub p1: Point,
    pub p2: Point,
}

impl Line {
    pub fn new(p1: Point, p2: Point) -> Self {
        Self { p1, p2 }
    }

    /// Same line with the endpoints swapped
    pub fn reversed(&self) -> Self {
        Self::new(self.p2, self.p1)
    }

    /// Direction of the segment in degrees, normalized into [0, 180)
    pub fn angle_degrees(&self) -> f64 {
        let dx = self.p2.x - self.p1.x;
        let dy = self.p2.y - self.p1.y;
        dy.atan2(dx).to_degrees().rem_euclid(180.0)
    }

    pub fn equation(&self) -> LineEquation {
        LineEquation::through(self)
    }
}

/// Which half-plane of a cut line a point lies in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    /// Signed distance <= 0, including points on the line
    Left,
    /// Signed distance > 0
    Right,
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Left => write!(f, "left"),
            Side::Right => write!(f, "right"),
        }
    }
}

/// Axis a fitted line was snapped to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    Horizontal,
    Vertical,
}

/// Result of fitting a freehand line to the image
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FittedLine {
    /// Extended edge to edge along an axis
    Snapped(Line, Orientation),
    /// Too short to judge; returned as drawn
    Unchanged(Line),
}

impl FittedLine {
    pub fn line(&self) -> Line {
        match *self {
            FittedLine::Snapped(line, _) => line,
            FittedLine::Unchanged(line) => line,
        }
    }

    pub fn orientation(&self) -> Option<Orientation> {
        match *self {
            FittedLine::Snapped(_, orientation) => Some(orientation),
            FittedLine::Unchanged(_) => None,
        }
    }
}

/// Implicit form `A·x + B·y + C = 0` of a line
///
/// The coefficients are the cross product of the homogeneous endpoints taken
/// as `p2 × p1`, which gives `A = y2 - y1`, `B = x1 - x2`, `C = x2·y1 - x1·y2`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineEquation {
    coefficients: Vector3<f64>,
}

impl LineEquation {
    pub fn through(line: &Line) -> Self {
        Self {
            coefficients: line.p2.homogeneous().cross(&line.p1.homogeneous()),
        }
    }

    pub fn a(&self) -> f64 {
        self.coefficients.x
    }

    pub fn b(&self) -> f64 {
        self.coefficients.y
    }

    pub fn c(&self) -> f64 {
        self.coefficients.z
    }

    /// `B·y + C`, the part of the signed distance that is constant along a row
    #[inline]
    pub fn row_offset(&self, y: f64) -> f64 {
        self.b() * y + self.c()
    }

    /// Signed distance given a precomputed [`row_offset`](Self::row_offset).
    ///
    /// Every evaluation goes through here so a point classifies the same way
    /// whether it is tested alone or as part of a row scan.
    #[inline]
    pub fn signed_distance_in_row(&self, x: f64, row_offset: f64) -> f64 {
        self.a() * x + row_offset
    }

    pub fn signed_distance(&self, point: Point) -> f64 {
        self.signed_distance_in_row(point.x, self.row_offset(point.y))
    }

    pub fn side_of(&self, point: Point) -> Side {
        Side::from_signed_distance(self.signed_distance(point))
    }
}

impl Side {
    pub fn from_signed_distance(distance: f64) -> Self {
        if distance <= 0.0 {
            Side::Left
        } else {
            Side::Right
        }
    }

    /// Whether a pixel at this signed distance survives when this side is kept.
    /// Points on the line survive for both sides.
    #[inline]
    pub fn keeps(&self, distance: f64) -> bool {
        match self {
            Side::Left => distance <= 0.0,
            Side::Right => distance >= 0.0,
        }
    }
}

/// Classify a point against a line
pub fn side_of(line: &Line, point: Point) -> Side {
    line.equation().side_of(point)
}

/// Fit a freehand line to the image: snap it to the nearest axis and extend it
/// from edge to edge.
///
/// Lines shorter than [`MIN_LINE_EXTENT`] on both axes are returned unchanged.
/// Lines within [`SNAP_TOLERANCE_DEGREES`] of an axis take that axis; any
/// other angle is forced onto whichever axis is closer, horizontal on ties.
pub fn fit_line(p1: Point, p2: Point, bounds: ImageBounds) -> FittedLine {
    let raw = Line::new(p1, p2);
    let dx = p2.x - p1.x;
    let dy = p2.y - p1.y;

    if dx.abs() < MIN_LINE_EXTENT && dy.abs() < MIN_LINE_EXTENT {
        return FittedLine::Unchanged(raw);
    }

    let orientation = snap_orientation(raw.angle_degrees());
    let (width, height) = (bounds.width as f64, bounds.height as f64);

    let line = match orientation {
        Orientation::Vertical => {
            let avg_x = (p1.x + p2.x) / 2.0;
            Line::new(Point::new(avg_x, 0.0), Point::new(avg_x, height))
        }
        Orientation::Horizontal => {
            let avg_y = (p1.y + p2.y) / 2.0;
            Line::new(Point::new(0.0, avg_y), Point::new(width, avg_y))
        }
    };

    FittedLine::Snapped(line, orientation)
}

/// Pick the axis for an angle in [0, 180)
fn snap_orientation(angle_degrees: f64) -> Orientation {
    let to_horizontal = angle_degrees.min(180.0 - angle_degrees);
    let to_vertical = (angle_degrees - 90.0).abs();

    let is_horizontal = to_horizontal < SNAP_TOLERANCE_DEGREES;
    let is_vertical = to_vertical < SNAP_TOLERANCE_DEGREES;

    if is_vertical {
        Orientation::Vertical
    } else if is_horizontal || to_horizontal <= to_vertical {
        Orientation::Horizontal
    } else {
        Orientation::Vertical
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const BOUNDS: ImageBounds = ImageBounds {
        width: 200,
        height: 100,
    };

    #[test]
    fn test_short_line_unchanged() {
        let fitted = fit_line(Point::new(10.0, 10.0), Point::new(13.0, 14.0), BOUNDS);
        assert_eq!(
            fitted,
            FittedLine::Unchanged(Line::new(Point::new(10.0, 10.0), Point::new(13.0, 14.0)))
        );
        assert!(fitted.orientation().is_none());
    }

    #[test]
    fn test_extent_of_exactly_five_is_fitted() {
        let fitted = fit_line(Point::new(10.0, 10.0), Point::new(15.0, 10.0), BOUNDS);
        assert_eq!(fitted.orientation(), Some(Orientation::Horizontal));
    }

    #[test]
    fn test_near_vertical_snaps_to_average_x() {
        let fitted = fit_line(Point::new(48.0, 10.0), Point::new(52.0, 90.0), BOUNDS);
        assert_eq!(fitted.orientation(), Some(Orientation::Vertical));
        assert_eq!(
            fitted.line(),
            Line::new(Point::new(50.0, 0.0), Point::new(50.0, 100.0))
        );
    }

    #[test]
    fn test_near_horizontal_snaps_to_average_y() {
        let fitted = fit_line(Point::new(180.0, 42.0), Point::new(20.0, 38.0), BOUNDS);
        assert_eq!(fitted.orientation(), Some(Orientation::Horizontal));
        assert_eq!(
            fitted.line(),
            Line::new(Point::new(0.0, 40.0), Point::new(200.0, 40.0))
        );
    }

    #[test]
    fn test_steep_diagonal_forced_vertical() {
        // ~63 degrees: closer to vertical
        let fitted = fit_line(Point::new(0.0, 0.0), Point::new(20.0, 40.0), BOUNDS);
        assert_eq!(fitted.orientation(), Some(Orientation::Vertical));
        assert_eq!(fitted.line().p1.x, 10.0);
    }

    #[test]
    fn test_shallow_diagonal_forced_horizontal() {
        // ~27 degrees: closer to horizontal
        let fitted = fit_line(Point::new(0.0, 0.0), Point::new(40.0, 20.0), BOUNDS);
        assert_eq!(fitted.orientation(), Some(Orientation::Horizontal));
        assert_eq!(fitted.line().p1.y, 10.0);
    }

    #[test]
    fn test_snap_orientation_tie_is_horizontal() {
        assert_eq!(snap_orientation(45.0), Orientation::Horizontal);
        assert_eq!(snap_orientation(135.0), Orientation::Horizontal);
        assert_eq!(snap_orientation(170.0), Orientation::Horizontal);
        assert_eq!(snap_orientation(100.0), Orientation::Vertical);
    }

    #[test]
    fn test_line_equation_coefficients() {
        let line = Line::new(Point::new(1.0, 2.0), Point::new(4.0, 7.0));
        let eq = line.equation();
        assert_eq!(eq.a(), 5.0);
        assert_eq!(eq.b(), -3.0);
        assert_eq!(eq.c(), 4.0 * 2.0 - 1.0 * 7.0);
    }

    #[test]
    fn test_point_on_line_is_left() {
        let line = Line::new(Point::new(50.0, 0.0), Point::new(50.0, 100.0));
        assert_eq!(side_of(&line, Point::new(50.0, 30.0)), Side::Left);
        assert_eq!(side_of(&line.reversed(), Point::new(50.0, 30.0)), Side::Left);
    }

    #[test]
    fn test_vertical_line_sides() {
        let line = Line::new(Point::new(50.0, 0.0), Point::new(50.0, 100.0));
        assert_eq!(side_of(&line, Point::new(10.0, 50.0)), Side::Left);
        assert_eq!(side_of(&line, Point::new(90.0, 50.0)), Side::Right);
    }

    #[test]
    fn test_horizontal_line_left_is_below() {
        let line = Line::new(Point::new(0.0, 40.0), Point::new(200.0, 40.0));
        assert_eq!(side_of(&line, Point::new(100.0, 80.0)), Side::Left);
        assert_eq!(side_of(&line, Point::new(100.0, 10.0)), Side::Right);
    }

    #[test]
    fn test_keeps_boundary_on_both_sides() {
        assert!(Side::Left.keeps(0.0));
        assert!(Side::Right.keeps(0.0));
        assert!(!Side::Left.keeps(0.5));
        assert!(!Side::Right.keeps(-0.5));
    }

    proptest! {
        #[test]
        fn prop_short_lines_unchanged(
            x in 0.0f64..200.0, y in 0.0f64..100.0,
            dx in -4.99f64..4.99, dy in -4.99f64..4.99,
        ) {
            let (p1, p2) = (Point::new(x, y), Point::new(x + dx, y + dy));
            prop_assert_eq!(fit_line(p1, p2, BOUNDS), FittedLine::Unchanged(Line::new(p1, p2)));
        }

        #[test]
        fn prop_near_horizontal_spans_width(
            x in 0.0f64..100.0, y in 10.0f64..90.0,
            len in 10.0f64..100.0, angle in -9.9f64..9.9,
        ) {
            let rad = angle.to_radians();
            let p1 = Point::new(x, y);
            let p2 = Point::new(x + len * rad.cos(), y + len * rad.sin());
            let line = fit_line(p1, p2, BOUNDS).line();
            let avg_y = (p1.y + p2.y) / 2.0;
            prop_assert_eq!(line, Line::new(Point::new(0.0, avg_y), Point::new(200.0, avg_y)));
        }

        #[test]
        fn prop_near_vertical_spans_height(
            x in 10.0f64..190.0, y in 0.0f64..50.0,
            len in 10.0f64..50.0, angle in 80.1f64..99.9,
        ) {
            let rad = angle.to_radians();
            let p1 = Point::new(x, y);
            let p2 = Point::new(x + len * rad.cos(), y + len * rad.sin());
            let line = fit_line(p1, p2, BOUNDS).line();
            let avg_x = (p1.x + p2.x) / 2.0;
            prop_assert_eq!(line, Line::new(Point::new(avg_x, 0.0), Point::new(avg_x, 100.0)));
        }

        #[test]
        fn prop_reversing_negates_signed_distance(
            x1 in -50.0f64..250.0, y1 in -50.0f64..150.0,
            x2 in -50.0f64..250.0, y2 in -50.0f64..150.0,
            px in 0.0f64..200.0, py in 0.0f64..100.0,
        ) {
            let line = Line::new(Point::new(x1, y1), Point::new(x2, y2));
            let p = Point::new(px, py);
            let forward = line.equation().signed_distance(p);
            let backward = line.reversed().equation().signed_distance(p);
            prop_assert!((forward + backward).abs() <= 1e-6 * (1.0 + forward.abs()));
        }
    }
}
