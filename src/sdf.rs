//! Scene level signed distance queries used by the marcher.

use nalgebra::Unit;
use ordered_float::OrderedFloat;

use crate::geometry::{EPSILON, FloatType, NO_HIT, WorldPoint, WorldVector};
use crate::scene::{Scene, Surface};

/// Result of a distance query: the smallest signed distance and the surface it belongs to.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Nearest {
    pub distance: FloatType,
    /// None only if the scene has nothing in it.
    pub surface: Option<Surface>,
}

impl Nearest {
    pub fn nothing() -> Nearest {
        Nearest {
            distance: NO_HIT,
            surface: None,
        }
    }
}

/// Minimum signed distance over the ground plane (if enabled) and all objects.
/// Equal distances resolve to whichever comes first, the ground plane before objects
/// and objects in scene order.
pub fn scene_distance(scene: &Scene, point: &WorldPoint) -> Nearest {
    let objects = scene
        .objects
        .iter_enumerated()
        .map(|(idx, object)| (object.distance(point), Surface::Object(idx)))
        .min_by_key(|(distance, _)| OrderedFloat(*distance))
        // Offset is the same for every object, so it can be added after taking the minimum
        .map(|(distance, surface)| match &scene.distortion {
            Some(distortion) => (distance + distortion.offset(point), surface),
            None => (distance, surface),
        });
    let ground = scene.ground_plane.then_some((point.y, Surface::GroundPlane));

    ground
        .into_iter()
        .chain(objects)
        .min_by_key(|(distance, _)| OrderedFloat(*distance))
        .map_or_else(Nearest::nothing, |(distance, surface)| Nearest {
            distance,
            surface: Some(surface),
        })
}

/// Normalized central difference gradient of the scene distance.
/// Falls back to +Y where the gradient vanishes.
pub fn estimate_normal(scene: &Scene, point: &WorldPoint, precision: FloatType) -> Unit<WorldVector> {
    let gradient = WorldVector::from_fn(|axis, _| {
        let mut offset = WorldVector::zeros();
        offset[axis] = precision;
        scene_distance(scene, &(point + offset)).distance
            - scene_distance(scene, &(point - offset)).distance
    });
    Unit::try_new(gradient, EPSILON).unwrap_or_else(WorldVector::y_axis)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::geometry::test::UnitWorldVectorWrapper;
    use crate::scene::{DistortionField, Material, Object, ObjectIdx};
    use assert2::assert;
    use test_strategy::proptest;

    fn sphere(x: f32, y: f32, z: f32, radius: f32) -> Object {
        Object::sphere(WorldPoint::new(x, y, z), radius, Material::default())
    }

    #[test]
    fn empty_scene_is_infinitely_far() {
        let nearest = scene_distance(&Scene::default(), &WorldPoint::origin());
        assert!(nearest == Nearest::nothing());
    }

    #[test]
    fn nearest_object_wins() {
        let scene = Scene::new([sphere(10.0, 0.0, 0.0, 1.0), sphere(-3.0, 0.0, 0.0, 1.0)]);
        let nearest = scene_distance(&scene, &WorldPoint::origin());
        assert!(nearest.distance == 2.0);
        assert!(nearest.surface == Some(Surface::Object(ObjectIdx::new(1))));
    }

    #[test]
    fn ties_go_to_first_object() {
        let scene = Scene::new([sphere(3.0, 0.0, 0.0, 1.0), sphere(-3.0, 0.0, 0.0, 1.0)]);
        let nearest = scene_distance(&scene, &WorldPoint::origin());
        assert!(nearest.surface == Some(Surface::Object(ObjectIdx::new(0))));
    }

    #[test]
    fn ties_go_to_ground_plane_before_objects() {
        let scene = Scene::new([sphere(0.0, 5.0, 0.0, 1.0)]).with_ground_plane(true);
        let nearest = scene_distance(&scene, &WorldPoint::new(0.0, 2.0, 0.0));
        assert!(nearest.distance == 2.0);
        assert!(nearest.surface == Some(Surface::GroundPlane));
    }

    #[test]
    fn ground_plane_distance_is_height() {
        let scene = Scene::default().with_ground_plane(true);
        let nearest = scene_distance(&scene, &WorldPoint::new(3.0, -1.5, 7.0));
        assert!(nearest.distance == -1.5);
    }

    #[test]
    fn distortion_offsets_objects_only() {
        let distortion = DistortionField::default();
        let point = WorldPoint::new(1.3, 2.7, -0.4);
        let offset = distortion.offset(&point);
        assert!(offset != 0.0);

        let scene = Scene {
            distortion: Some(distortion),
            ..Scene::new([sphere(0.0, 0.0, 0.0, 1.0)])
        };
        let nearest = scene_distance(&scene, &point);
        assert!((nearest.distance - (point.coords.norm() - 1.0 + offset)).abs() < 1e-5);

        let ground_only = Scene {
            distortion: Some(distortion),
            ..Scene::default().with_ground_plane(true)
        };
        assert!(scene_distance(&ground_only, &point).distance == point.y);
    }

    #[proptest]
    fn normal_converges_to_sphere_normal(direction: UnitWorldVectorWrapper) {
        let direction = *direction;
        let scene = Scene::new([sphere(0.0, 0.0, 0.0, 1.0)]);
        let point = WorldPoint::from(direction.into_inner());
        let mut previous_error = FloatType::INFINITY;
        for precision in [0.5, 0.1, 0.01] {
            let error = (estimate_normal(&scene, &point, precision).into_inner() - *direction).norm();
            assert!(error <= precision);
            assert!(error <= previous_error + 1e-4);
            previous_error = error;
        }
    }

    #[test]
    fn ground_plane_normal_points_up() {
        let scene = Scene::default().with_ground_plane(true);
        let normal = estimate_normal(&scene, &WorldPoint::new(4.0, 0.0, -2.0), 0.1);
        assert!((normal.into_inner() - WorldVector::y()).norm() < 1e-6);
    }
}
