use nalgebra::{Rotation3, Unit};
use serde::{Deserialize, Serialize};

use super::{FloatType, Ray, WorldPoint, WorldVector};

/// Rigid placement of an object with non-uniform scaling.
/// Maps the canonical shape (centered at origin, axis aligned) into the world:
/// scale by `size`, rotate by `rotation` (Euler angles in radians, X then Y then Z),
/// move to `position`.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub position: WorldPoint,
    #[serde(default = "unit_size")]
    pub size: WorldVector,
    #[serde(default)]
    pub rotation: WorldVector,
}

fn unit_size() -> WorldVector {
    WorldVector::repeat(1.0)
}

impl Transform {
    pub fn at(position: WorldPoint) -> Transform {
        Transform {
            position,
            size: unit_size(),
            rotation: WorldVector::zeros(),
        }
    }

    pub fn identity() -> Transform {
        Self::at(WorldPoint::origin())
    }

    fn rotation_matrix(&self) -> Rotation3<FloatType> {
        Rotation3::from_euler_angles(self.rotation.x, self.rotation.y, self.rotation.z)
    }

    /// Transforms a world space point into the shape's canonical space.
    pub fn to_local_point(&self, point: &WorldPoint) -> WorldPoint {
        let local = self.rotation_matrix().inverse() * (point - self.position);
        WorldPoint::from(local.component_div(&self.size))
    }

    /// Transforms a ray into the shape's canonical space.
    /// The direction is not normalized, so that distances along the local ray
    /// are the same as distances along the world ray.
    pub fn to_local_ray(&self, ray: &Ray) -> LocalRay {
        let inverse = self.rotation_matrix().inverse();
        let origin = inverse * (ray.origin - self.position);
        let direction = inverse * ray.direction.as_ref();
        LocalRay::new(
            WorldPoint::from(origin.component_div(&self.size)),
            direction.component_div(&self.size),
        )
    }

    /// Transforms a canonical space normal back into world space.
    pub fn to_world_normal(&self, local_normal: &WorldVector) -> Unit<WorldVector> {
        Unit::new_normalize(self.rotation_matrix() * local_normal.component_div(&self.size))
    }

    /// Factor converting canonical space distances to world space distances.
    /// Smallest scale component, so that the scaled distance never overestimates.
    pub fn distance_scale(&self) -> FloatType {
        self.size.abs().min()
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::identity()
    }
}

/// Ray expressed in the canonical space of a shape.
#[derive(Copy, Clone, Debug)]
pub struct LocalRay {
    pub origin: WorldPoint,
    /// Not normalized.
    pub direction: WorldVector,

    /// Componentwise inverse of the ray direction
    /// Zeros in direction get turned into positive infinity regardless of the sign of the zero
    pub inv_direction: WorldVector,
}

impl LocalRay {
    pub fn new(origin: WorldPoint, direction: WorldVector) -> LocalRay {
        let inv_direction = direction.map(|x| if x == 0.0 { FloatType::INFINITY } else { 1.0 / x });
        LocalRay {
            origin,
            direction,
            inv_direction,
        }
    }

    pub fn point_at(&self, distance: FloatType) -> WorldPoint {
        self.origin + self.direction * distance
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use assert2::assert;
    use std::f32::consts::FRAC_PI_2;

    #[test]
    fn local_point_undoes_placement() {
        let transform = Transform {
            position: WorldPoint::new(1.0, 2.0, 3.0),
            size: WorldVector::new(2.0, 1.0, 1.0),
            rotation: WorldVector::new(0.0, FRAC_PI_2, 0.0),
        };
        // Canonical +X is scaled by 2, then rotated by 90 degrees around Y onto -Z
        let world = WorldPoint::new(1.0, 2.0, 1.0);
        let local = transform.to_local_point(&world);
        assert!((local - WorldPoint::new(1.0, 0.0, 0.0)).norm() < 1e-5);
    }

    #[test]
    fn local_ray_preserves_distances() {
        let transform = Transform {
            position: WorldPoint::new(0.0, 0.0, 5.0),
            size: WorldVector::new(3.0, 0.5, 2.0),
            rotation: WorldVector::new(0.3, -0.2, 1.1),
        };
        let ray = Ray::new(WorldPoint::new(1.0, -1.0, 0.0), WorldVector::new(0.2, 0.1, 1.0));
        let local = transform.to_local_ray(&ray);

        let t = 4.5;
        let expected = transform.to_local_point(&ray.point_at(t));
        assert!((local.point_at(t) - expected).norm() < 1e-4);
    }

    #[test]
    fn distance_scale_is_smallest_component() {
        let transform = Transform {
            size: WorldVector::new(3.0, 0.5, 2.0),
            ..Transform::identity()
        };
        assert!(transform.distance_scale() == 0.5);
    }
}
