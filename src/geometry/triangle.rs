use std::ops::{Index, IndexMut};

use serde::{Deserialize, Serialize};

use super::{EPSILON, FloatType, LocalRay, WorldPoint, WorldVector};

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Triangle<Point>([Point; 3]);

impl<Point> Triangle<Point> {
    pub fn new(a: Point, b: Point, c: Point) -> Triangle<Point> {
        Triangle([a, b, c])
    }

    pub fn iter<'a>(&'a self) -> impl Iterator<Item = &'a Point> {
        self.0.iter()
    }

    pub fn map<Point2, F: FnMut(&Point) -> Point2>(&self, mut f: F) -> Triangle<Point2> {
        Triangle([f(&self[0]), f(&self[1]), f(&self[2])])
    }
}

impl<Point> Index<usize> for Triangle<Point> {
    type Output = Point;

    fn index(&self, index: usize) -> &Self::Output {
        &self.0[index]
    }
}

impl<Point> IndexMut<usize> for Triangle<Point> {
    fn index_mut(&mut self, index: usize) -> &mut Self::Output {
        &mut self.0[index]
    }
}

impl Triangle<WorldPoint> {
    /// Returns edge vectors, coming from self[0]
    pub fn edges(&self) -> [WorldVector; 2] {
        [self[1] - self[0], self[2] - self[0]]
    }

    /// Returns a normal vector of the triangle, not normalized.
    pub fn normal(&self) -> WorldVector {
        let [e1, e2] = self.edges();
        e1.cross(&e2)
    }

    pub fn centroid(&self) -> WorldPoint {
        WorldPoint::from((self[0].coords + self[1].coords + self[2].coords) / 3.0)
    }

    /// Calculates ray intersection with the (two sided) triangle.
    /// Returns distance along the ray, if the ray hits.
    /// Adapted from https://en.wikipedia.org/wiki/M%C3%B6ller%E2%80%93Trumbore_intersection_algorithm#Rust_implementation
    pub fn intersect(&self, ray: &LocalRay) -> Option<FloatType> {
        let [e1, e2] = self.edges();

        let ray_cross_e2 = ray.direction.cross(&e2);
        let det = e1.dot(&ray_cross_e2);
        if det.abs() < EPSILON {
            return None; // Parallel with the triangle plane
        }

        let inv_det = 1.0 / det;
        let s = ray.origin - self[0];
        let u = inv_det * s.dot(&ray_cross_e2);
        if !(0.0..=1.0).contains(&u) {
            return None;
        }

        let s_cross_e1 = s.cross(&e1);
        let v = inv_det * ray.direction.dot(&s_cross_e1);
        if v < 0.0 || u + v > 1.0 {
            return None;
        }

        Some(inv_det * e2.dot(&s_cross_e1))
    }

    /// Unsigned distance from the point to the triangle surface.
    pub fn distance(&self, point: &WorldPoint) -> FloatType {
        let normal = self.normal();
        let edges = [
            (self[0], self[1] - self[0]),
            (self[1], self[2] - self[1]),
            (self[2], self[0] - self[2]),
        ];

        let outside_edge = edges.iter().any(|(start, edge)| {
            edge.cross(&normal).dot(&(point - start)) > 0.0
        });

        if outside_edge {
            // Closest point lies on one of the edges
            edges
                .iter()
                .map(|(start, edge)| {
                    let to_point = point - start;
                    let t = (edge.dot(&to_point) / edge.norm_squared()).clamp(0.0, 1.0);
                    (edge * t - to_point).norm()
                })
                .fold(FloatType::INFINITY, FloatType::min)
        } else {
            // Closest point lies inside, distance to the plane
            normal.normalize().dot(&(point - self[0])).abs()
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use assert2::{assert, let_assert};

    fn unit_triangle() -> Triangle<WorldPoint> {
        Triangle::new(
            WorldPoint::new(0.0, 0.0, 0.0),
            WorldPoint::new(1.0, 0.0, 0.0),
            WorldPoint::new(0.0, 1.0, 0.0),
        )
    }

    #[test]
    fn ray_hits_inside() {
        let ray = LocalRay::new(WorldPoint::new(0.25, 0.25, 2.0), WorldVector::new(0.0, 0.0, -1.0));
        let_assert!(Some(t) = unit_triangle().intersect(&ray));
        assert!((t - 2.0).abs() < 1e-6);
    }

    #[test]
    fn ray_hits_back_side() {
        let ray = LocalRay::new(WorldPoint::new(0.25, 0.25, -3.0), WorldVector::new(0.0, 0.0, 1.0));
        let_assert!(Some(t) = unit_triangle().intersect(&ray));
        assert!((t - 3.0).abs() < 1e-6);
    }

    #[test]
    fn ray_misses_outside() {
        let ray = LocalRay::new(WorldPoint::new(0.75, 0.75, 2.0), WorldVector::new(0.0, 0.0, -1.0));
        assert!(unit_triangle().intersect(&ray).is_none());
    }

    #[test]
    fn parallel_ray_misses() {
        let ray = LocalRay::new(WorldPoint::new(-1.0, 0.25, 0.0), WorldVector::new(1.0, 0.0, 0.0));
        assert!(unit_triangle().intersect(&ray).is_none());
    }

    #[test]
    fn distance_above_face() {
        let d = unit_triangle().distance(&WorldPoint::new(0.2, 0.2, -0.5));
        assert!((d - 0.5).abs() < 1e-6);
    }

    #[test]
    fn distance_beyond_vertex() {
        let d = unit_triangle().distance(&WorldPoint::new(-3.0, -4.0, 0.0));
        assert!((d - 5.0).abs() < 1e-5);
    }

    #[test]
    fn distance_beside_hypotenuse() {
        let d = unit_triangle().distance(&WorldPoint::new(1.0, 1.0, 0.0));
        assert!((d - 0.5f32.sqrt()).abs() < 1e-5);
    }
}
