mod aabb;
mod ray_box_intersection;
mod transform;
mod triangle;

pub use aabb::AABB;
pub use ray_box_intersection::RayIntersectionExt;
pub use transform::{LocalRay, Transform};
pub use triangle::Triangle;

use nalgebra::{Point2, Point3, Unit, Vector2, Vector3};

use crate::scene::Material;

pub type FloatType = f32;

pub type ScreenPoint = Point2<u32>;
pub type ScreenSize = Vector2<u32>;
pub type ScreenBlock = AABB<ScreenPoint>;

pub type WorldPoint = Point3<FloatType>;
pub type WorldVector = Vector3<FloatType>;
pub type WorldBox = AABB<WorldPoint>;

/// Linear RGB radiance, not clamped.
pub type Color = Vector3<FloatType>;

pub const EPSILON: FloatType = 1e-6;

/// Distance of a ray that did not hit anything.
/// Larger than any distance a valid hit can report.
pub const NO_HIT: FloatType = FloatType::INFINITY;

/// Offset along the surface normal used when spawning secondary rays from a hit.
pub const SURFACE_OFFSET: FloatType = 1e-3;

#[derive(Copy, Clone, Debug)]
pub struct Ray {
    pub origin: WorldPoint,
    /// Normalized direction of the ray
    pub direction: Unit<WorldVector>,

    /// Per channel attenuation, starts at one and only decreases with bounces.
    pub energy: Color,
    /// Radiance gathered along the ray so far.
    pub result: Color,
}

impl Ray {
    /// Creates a new ray, normalizing the direction.
    /// Zero direction produces NaNs, use `try_new` for untrusted input.
    pub fn new(origin: WorldPoint, direction: WorldVector) -> Ray {
        Self::with_direction(origin, Unit::new_normalize(direction))
    }

    /// Creates a new ray, returns None if the direction is (close to) zero.
    pub fn try_new(origin: WorldPoint, direction: WorldVector) -> Option<Ray> {
        Unit::try_new(direction, EPSILON).map(|direction| Self::with_direction(origin, direction))
    }

    pub fn with_direction(origin: WorldPoint, direction: Unit<WorldVector>) -> Ray {
        Ray {
            origin,
            direction,
            energy: Color::repeat(1.0),
            result: Color::zeros(),
        }
    }

    pub fn point_at(&self, distance: FloatType) -> WorldPoint {
        self.origin + self.direction.as_ref() * distance
    }

    /// Continues the ray as a mirror reflection at the hit.
    /// Energy and result are carried over unchanged.
    pub fn reflect(&mut self, hit: &RayHit) {
        self.origin = hit.position + hit.normal.as_ref() * SURFACE_OFFSET;
        self.direction = Unit::new_normalize(reflect(self.direction.as_ref(), &hit.normal));
    }
}

/// Reflects `direction` about `normal`.
pub fn reflect(direction: &WorldVector, normal: &Unit<WorldVector>) -> WorldVector {
    direction - normal.as_ref() * (2.0 * direction.dot(normal))
}

#[derive(Copy, Clone, Debug)]
pub struct RayHit {
    pub position: WorldPoint,
    pub distance: FloatType,
    pub normal: Unit<WorldVector>,
    pub material: Material,
}

impl RayHit {
    /// Hit record that represents a miss, any real hit is closer.
    pub fn none() -> RayHit {
        RayHit {
            position: WorldPoint::origin(),
            distance: NO_HIT,
            normal: WorldVector::y_axis(),
            material: Material::default(),
        }
    }

    pub fn is_hit(&self) -> bool {
        self.distance < NO_HIT
    }

    /// Returns the closer of the two hits.
    /// Candidates at non-positive distance (behind the ray origin) are ignored,
    /// on ties the current hit is kept.
    pub fn closest(self, candidate: Option<RayHit>) -> RayHit {
        match candidate {
            Some(candidate) if candidate.distance > 0.0 && candidate.distance < self.distance => {
                candidate
            }
            _ => self,
        }
    }
}

impl Default for RayHit {
    fn default() -> Self {
        Self::none()
    }
}

#[cfg(test)]
pub mod test {
    use super::*;
    use assert2::assert;
    use proptest::prelude::*;

    /// Helper macro that creates a wrapper arnound a type that implemetns Deref and Arbitary
    macro_rules! arbitrary_wrapper {
        ( $wrapper_name:ident ( $type:ty ) -> $block:block ) => {
            #[derive(Copy, Clone, Debug)]
            pub struct $wrapper_name(pub $type);

            impl std::ops::Deref for $wrapper_name {
                type Target = $type;
                fn deref(&self) -> &$type {
                    &self.0
                }
            }

            impl Arbitrary for $wrapper_name {
                type Parameters = ();
                type Strategy = proptest::strategy::BoxedStrategy<Self>;
                fn arbitrary_with(_args: Self::Parameters) -> Self::Strategy {
                    $block.prop_map(|x| $wrapper_name(x)).boxed()
                }
            }
        };
    }

    fn simple_float() -> BoxedStrategy<f32> {
        (-100_000i32..100_000).prop_map(|n| n as f32 * 1e-3).boxed()
    }

    arbitrary_wrapper! {
        UnitWorldVectorWrapper(Unit<WorldVector>) -> {
            (simple_float(), simple_float(), simple_float())
                .prop_filter_map(
                    "vector is zero",
                    |coords| Unit::try_new(WorldVector::new(coords.0, coords.1, coords.2), 1e-3))
        }
    }

    arbitrary_wrapper! {
        WorldPointWrapper(WorldPoint) -> {
            (simple_float(), simple_float(), simple_float())
                .prop_map(|coords| WorldPoint::new(coords.0, coords.1, coords.2))
        }
    }

    fn hit_at(distance: FloatType) -> RayHit {
        RayHit {
            distance,
            ..RayHit::none()
        }
    }

    #[test]
    fn closest_prefers_nearer_hit() {
        let best = RayHit::none().closest(Some(hit_at(5.0))).closest(Some(hit_at(2.0)));
        assert!(best.distance == 2.0);
    }

    #[test]
    fn closest_ignores_hits_behind_origin() {
        let best = hit_at(5.0).closest(Some(hit_at(-1.0))).closest(Some(hit_at(0.0)));
        assert!(best.distance == 5.0);
    }

    #[test]
    fn closest_keeps_first_on_tie() {
        let mut first = hit_at(3.0);
        first.position = WorldPoint::new(1.0, 0.0, 0.0);
        let best = first.closest(Some(hit_at(3.0)));
        assert!(best.position == WorldPoint::new(1.0, 0.0, 0.0));
    }

    #[test]
    fn none_is_not_a_hit() {
        assert!(!RayHit::none().is_hit());
        assert!(hit_at(1e30).is_hit());
    }

    #[test]
    fn zero_direction_is_rejected() {
        assert!(Ray::try_new(WorldPoint::origin(), WorldVector::zeros()).is_none());
    }

    #[test]
    fn reflect_flips_normal_component() {
        let mut ray = Ray::new(WorldPoint::new(0.0, 1.0, 0.0), WorldVector::new(1.0, -1.0, 0.0));
        let hit = RayHit {
            position: WorldPoint::new(1.0, 0.0, 0.0),
            distance: 2.0f32.sqrt(),
            normal: WorldVector::y_axis(),
            material: Material::default(),
        };
        ray.reflect(&hit);

        let expected = WorldVector::new(1.0, 1.0, 0.0).normalize();
        assert!((ray.direction.as_ref() - expected).norm() < 1e-6);
        assert!(ray.origin.y > 0.0);
    }
}
