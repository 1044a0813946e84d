use std::ops::Add;

use nalgebra::{Point2, Scalar};

use super::{WorldBox, WorldPoint, WorldVector};

/// Axis aligned box, `min` inclusive. For screen blocks `max` is exclusive.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct AABB<Point> {
    pub min: Point,
    pub max: Point,
}

impl<Point> AABB<Point> {
    pub fn new(min: Point, max: Point) -> AABB<Point> {
        AABB { min, max }
    }

    pub fn with_size<S>(min: Point, size: &S) -> AABB<Point>
    where
        for<'a> &'a Point: Add<&'a S, Output = Point>,
    {
        let max = &min + size;
        AABB { min, max }
    }
}

impl<T: Scalar + Copy + std::ops::Sub> AABB<Point2<T>> {
    pub fn width(&self) -> T::Output {
        self.max.x - self.min.x
    }

    pub fn height(&self) -> T::Output {
        self.max.y - self.min.y
    }
}

impl<T: Scalar + Copy + PartialOrd> AABB<Point2<T>> {
    pub fn is_empty(&self) -> bool {
        !(self.min.x < self.max.x && self.min.y < self.max.y)
    }
}

impl WorldBox {
    /// Box centered at the origin.
    pub fn symmetric(half_extents: &WorldVector) -> WorldBox {
        WorldBox::new(WorldPoint::from(-half_extents), WorldPoint::from(*half_extents))
    }

    pub fn contains(&self, point: &WorldPoint) -> bool {
        (0..3).all(|i| self.min[i] <= point[i] && point[i] <= self.max[i])
    }
}
