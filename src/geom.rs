use super::error::Error;
use super::sweep::Interval;
use super::traits::Overlaps;

use cgmath::prelude::*;
use cgmath::{Point2, Rad, Vector2};
use smallvec::SmallVec;

use std::cmp::Ordering;

#[cfg(feature="parallel")]
use rayon::prelude::*;

/// Polygons with up to this many vertices are stored inline
pub const INLINE_VERTICES: usize = 8;

/// A sweep axis
#[derive(Copy, Clone, Debug, Eq, Hash, PartialEq)]
#[cfg_attr(feature="serialize", derive(serde::Serialize, serde::Deserialize))]
pub enum Axis {
    X,
    Y
}

impl Axis {
    #[inline]
    pub fn component(self, point: Point2<f32>) -> f32 {
        match self {
            Axis::X => point.x,
            Axis::Y => point.y
        }
    }
}

/// An axis-aligned bounding box
///
/// The extractor only produces bounds with `min <= max` on every axis.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature="serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct Bounds<Point> {
    pub min: Point,
    pub max: Point
}

impl<Point> Bounds<Point>
where
    Point: EuclideanSpace + Copy
{
    pub fn new(min: Point, max: Point) -> Self {
        Self{min, max}
    }

    pub fn size(self) -> Point::Diff {
        self.max - self.min
    }
}

impl Bounds<Point2<f32>> {
    /// The extent of these bounds along `axis`
    pub fn interval(self, axis: Axis) -> Interval {
        Interval::clamped(axis.component(self.min), axis.component(self.max))
    }

    fn include(&mut self, point: Point2<f32>) {
        self.min.x = self.min.x.min(point.x);
        self.min.y = self.min.y.min(point.y);
        self.max.x = self.max.x.max(point.x);
        self.max.y = self.max.y.max(point.y);
    }
}

impl Overlaps for Bounds<Point2<f32>> {
    fn overlaps(&self, other: &Self) -> bool {
        self.min.x <= other.max.x &&
        other.min.x <= self.max.x &&
        self.min.y <= other.max.y &&
        other.min.y <= self.max.y
    }
}

/// Placement of a polygon in world space
///
/// Local vertices are rotated counter-clockwise about the local origin, then translated.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature="serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct Transform {
    pub position: Vector2<f32>,
    pub rotation: Rad<f32>
}

impl Default for Transform {
    fn default() -> Self {
        Self{
            position: Vector2::new(0f32, 0f32),
            rotation: Rad(0f32)}
    }
}

impl Transform {
    pub fn new(position: Vector2<f32>, rotation: Rad<f32>) -> Self {
        Self{position, rotation}
    }

    pub fn from_position(x: f32, y: f32) -> Self {
        Self{
            position: Vector2::new(x, y),
            rotation: Rad(0f32)}
    }

    pub fn is_finite(&self) -> bool {
        self.position.x.is_finite() &&
        self.position.y.is_finite() &&
        self.rotation.0.is_finite()
    }

    #[inline]
    fn apply_with(&self, (sin, cos): (f32, f32), point: Point2<f32>) -> Point2<f32> {
        Point2::new(
            point.x * cos - point.y * sin + self.position.x,
            point.x * sin + point.y * cos + self.position.y)
    }

    /// Map a local-space point into world space
    pub fn apply(&self, point: Point2<f32>) -> Point2<f32> {
        self.apply_with(self.rotation.sin_cos(), point)
    }
}

/// The immutable shape of a simulated object, in local space
///
/// Vertex count is not validated on construction; [`Polygon::bounds`] rejects polygons with fewer than
/// three vertices so that one bad shape only excludes its own object.
///
/// [`Polygon::bounds`]: struct.Polygon.html#method.bounds
#[derive(Clone, Debug, PartialEq)]
pub struct Polygon {
    vertices: SmallVec<[Point2<f32>; INLINE_VERTICES]>
}

impl Polygon {
    pub fn new<Iter>(vertices: Iter) -> Self
    where
        Iter: IntoIterator<Item = Point2<f32>>
    {
        let vertices: SmallVec<[Point2<f32>; INLINE_VERTICES]> = vertices.into_iter().collect();
        if vertices.spilled() {
            warn!("polygon has {} vertices; shapes with more than {} vertices are heap-allocated",
                vertices.len(), INLINE_VERTICES);
        }
        Self{vertices}
    }

    /// Build the convex hull of a point cloud
    ///
    /// The result winds counter-clockwise, starting from the lowest-x (then lowest-y) point.  Collinear and
    /// duplicate points are dropped, as are non-finite points.  Fewer than three distinct, non-collinear
    /// points produce a degenerate polygon.
    pub fn convex_hull<Iter>(points: Iter) -> Self
    where
        Iter: IntoIterator<Item = Point2<f32>>
    {
        let mut points: Vec<Point2<f32>> = points.into_iter()
            .filter(|point| point.x.is_finite() && point.y.is_finite())
            .collect();
        points.sort_by(|lhs, rhs| lhs.x.partial_cmp(&rhs.x)
            .unwrap_or(Ordering::Equal)
            .then(lhs.y.partial_cmp(&rhs.y).unwrap_or(Ordering::Equal)));
        points.dedup();

        if points.len() < 3 {
            return Self::new(points);
        }

        fn turn(o: Point2<f32>, a: Point2<f32>, b: Point2<f32>) -> f32 {
            (a - o).perp_dot(b - o)
        }

        let mut hull: SmallVec<[Point2<f32>; INLINE_VERTICES]> = SmallVec::new();
        for &point in &points {
            while hull.len() >= 2 && turn(hull[hull.len() - 2], hull[hull.len() - 1], point) <= 0f32 {
                hull.pop();
            }
            hull.push(point);
        }

        let lower_len = hull.len() + 1;
        for &point in points.iter().rev().skip(1) {
            while hull.len() >= lower_len && turn(hull[hull.len() - 2], hull[hull.len() - 1], point) <= 0f32 {
                hull.pop();
            }
            hull.push(point);
        }
        // the upper chain ends where the lower chain started
        hull.pop();

        Self::new(hull)
    }

    pub fn vertices(&self) -> &[Point2<f32>] {
        self.vertices.as_slice()
    }

    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// Vertices after applying `transform`
    pub fn world_vertices<'a>(&'a self, transform: &'a Transform) -> impl Iterator<Item = Point2<f32>> + 'a {
        let sin_cos = transform.rotation.sin_cos();
        self.vertices.iter().map(move |&vertex| transform.apply_with(sin_cos, vertex))
    }

    /// World-space bounds of this polygon under `transform`
    pub fn bounds(&self, transform: &Transform) -> Result<Bounds<Point2<f32>>, Error> {
        if self.vertices.len() < 3 {
            return Err(Error::InvalidGeometry{vertices: self.vertices.len()});
        }
        if !transform.is_finite() {
            return Err(Error::NonFiniteGeometry);
        }

        let mut vertices = self.world_vertices(transform);
        let first = match vertices.next() {
            Some(vertex) => vertex,
            None => return Err(Error::InvalidGeometry{vertices: 0})
        };

        let mut bounds = Bounds::new(first, first);
        for vertex in vertices {
            bounds.include(vertex);
        }

        let finite = bounds.min.x.is_finite() && bounds.min.y.is_finite() &&
                     bounds.max.x.is_finite() && bounds.max.y.is_finite();
        if finite && self.vertices.iter().all(|v| v.x.is_finite() && v.y.is_finite()) {
            Ok(bounds)
        } else {
            Err(Error::NonFiniteGeometry)
        }
    }
}

/// The per-tick input for one live object
#[derive(Copy, Clone, Debug)]
pub struct ObjectState<'a, ID> {
    pub id: ID,
    pub polygon: &'a Polygon,
    pub transform: Transform
}

impl<'a, ID> ObjectState<'a, ID> {
    pub fn new(id: ID, polygon: &'a Polygon, transform: Transform) -> Self {
        Self{id, polygon, transform}
    }
}

/// Compute world-space bounds for every object
///
/// `out` is cleared and refilled so that `out[i]` corresponds to `objects[i]`
pub fn extract_bounds<ID>(objects: &[ObjectState<ID>], out: &mut Vec<Result<Bounds<Point2<f32>>, Error>>) {
    out.clear();
    out.reserve(objects.len());
    out.extend(objects.iter().map(|object| object.polygon.bounds(&object.transform)));
}

/// [`extract_bounds`]: fn.extract_bounds.html
/// Parallel version of [`extract_bounds`]
#[cfg(feature="parallel")]
pub fn par_extract_bounds<ID>(objects: &[ObjectState<ID>], out: &mut Vec<Result<Bounds<Point2<f32>>, Error>>)
where
    ID: Sync
{
    objects.par_iter()
        .map(|object| object.polygon.bounds(&object.transform))
        .collect_into_vec(out);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_square() -> Polygon {
        Polygon::new(vec![
            Point2::new(-0.5f32, -0.5f32),
            Point2::new( 0.5f32, -0.5f32),
            Point2::new( 0.5f32,  0.5f32),
            Point2::new(-0.5f32,  0.5f32)])
    }

    fn assert_close(actual: Point2<f32>, expected: Point2<f32>) {
        assert!((actual.x - expected.x).abs() < 1e-5 && (actual.y - expected.y).abs() < 1e-5,
            "expected {:?}, got {:?}", expected, actual);
    }

    #[test]
    fn translated_bounds() {
        let bounds = unit_square()
            .bounds(&Transform::from_position(10f32, -2f32))
            .expect("square should be valid");
        assert_eq!(bounds, Bounds::new(Point2::new(9.5f32, -2.5f32), Point2::new(10.5f32, -1.5f32)));
        assert_eq!(bounds.size(), Vector2::new(1f32, 1f32));
    }

    #[test]
    fn rotated_bounds() {
        let transform = Transform::new(Vector2::new(0f32, 0f32), Rad(std::f32::consts::FRAC_PI_4));
        let bounds = unit_square().bounds(&transform).expect("square should be valid");
        let half_diagonal = 0.5f32 * 2f32.sqrt();
        assert_close(bounds.min, Point2::new(-half_diagonal, -half_diagonal));
        assert_close(bounds.max, Point2::new( half_diagonal,  half_diagonal));
    }

    #[test]
    fn rotation_is_counter_clockwise() {
        let transform = Transform::new(Vector2::new(1f32, 0f32), Rad(std::f32::consts::FRAC_PI_2));
        assert_close(transform.apply(Point2::new(1f32, 0f32)), Point2::new(1f32, 1f32));
    }

    #[test]
    fn too_few_vertices() {
        let segment = Polygon::new(vec![Point2::new(0f32, 0f32), Point2::new(1f32, 0f32)]);
        assert_eq!(
            segment.bounds(&Transform::default()),
            Err(Error::InvalidGeometry{vertices: 2}));
    }

    #[test]
    fn non_finite_geometry() {
        let polygon = Polygon::new(vec![
            Point2::new(0f32, 0f32),
            Point2::new(std::f32::NAN, 0f32),
            Point2::new(0f32, 1f32)]);
        assert_eq!(polygon.bounds(&Transform::default()), Err(Error::NonFiniteGeometry));

        let transform = Transform::from_position(std::f32::INFINITY, 0f32);
        assert_eq!(unit_square().bounds(&transform), Err(Error::NonFiniteGeometry));
    }

    #[test]
    fn extract_is_indexed_like_input() {
        let square = unit_square();
        let empty = Polygon::new(Vec::new());
        let objects = vec![
            ObjectState::new(7u32, &square, Transform::from_position(0f32, 0f32)),
            ObjectState::new(3u32, &empty, Transform::default()),
            ObjectState::new(5u32, &square, Transform::from_position(2f32, 0f32))];

        let mut out = Vec::new();
        extract_bounds(&objects, &mut out);
        assert_eq!(out.len(), 3);
        assert!(out[0].is_ok());
        assert_eq!(out[1], Err(Error::InvalidGeometry{vertices: 0}));
        assert_eq!(out[2].as_ref().map(|bounds| bounds.min.x), Ok(1.5f32));
    }

    #[cfg(feature="parallel")]
    #[test]
    fn par_extract_matches_extract() {
        let square = unit_square();
        let objects: Vec<_> = (0..256u32)
            .map(|id| ObjectState::new(id, &square, Transform::new(
                Vector2::new(id as f32, -(id as f32)),
                Rad(0.1f32 * id as f32))))
            .collect();

        let mut expected = Vec::new();
        extract_bounds(&objects, &mut expected);
        let mut actual = Vec::new();
        par_extract_bounds(&objects, &mut actual);
        assert_eq!(actual, expected);
    }

    #[test]
    fn convex_hull() {
        let hull = Polygon::convex_hull(vec![
            Point2::new(0f32, 0f32),
            Point2::new(1f32, 0f32),
            Point2::new(0f32, 1f32),
            Point2::new(1f32, 1f32),
            Point2::new(0.5f32, 0.5f32),
            Point2::new(0.5f32, 0f32),
            Point2::new(0f32, 0.5f32),
            Point2::new(0.5f32, 1f32),
            Point2::new(1f32, 0.5f32)]);

        assert_eq!(hull.vertices(), &[
            Point2::new(0f32, 0f32),
            Point2::new(1f32, 0f32),
            Point2::new(1f32, 1f32),
            Point2::new(0f32, 1f32)]);
    }

    #[test]
    fn collinear_hull_is_degenerate() {
        let hull = Polygon::convex_hull(vec![
            Point2::new(0f32, 0f32),
            Point2::new(1f32, 1f32),
            Point2::new(2f32, 2f32)]);
        assert_eq!(hull.len(), 2);
        assert!(hull.bounds(&Transform::default()).is_err());
    }

    #[test]
    fn interval_per_axis() {
        let bounds = Bounds::new(Point2::new(1f32, 2f32), Point2::new(3f32, 4f32));
        assert_eq!(bounds.interval(Axis::X), Interval::clamped(1f32, 3f32));
        assert_eq!(bounds.interval(Axis::Y), Interval::clamped(2f32, 4f32));
    }

    #[test]
    fn closed_overlap() {
        let lhs = Bounds::new(Point2::new(0f32, 0f32), Point2::new(1f32, 1f32));
        let touching = Bounds::new(Point2::new(1f32, 1f32), Point2::new(2f32, 2f32));
        let apart = Bounds::new(Point2::new(1.5f32, 0f32), Point2::new(2f32, 1f32));
        assert!(lhs.overlaps(&touching));
        assert!(!lhs.overlaps(&apart));
    }
}
