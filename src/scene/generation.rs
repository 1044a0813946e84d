use std::f32::consts::TAU;

use bon::Builder;
use rand::seq::IndexedRandom;
use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};

use crate::geometry::{Color, FloatType, Transform, Triangle, WorldPoint, WorldVector};

use super::{Material, Object, Shape};

/// Hard limit on placement attempts, regardless of how many objects were requested.
pub const MAX_ATTEMPTS: usize = 10_000;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaterialKind {
    /// Mostly diffuse, up to 10% reflective.
    Solid,
    /// At least 90% reflective.
    Metallic,
    /// Independent random albedo and specular.
    Wacky,
    /// Any of solid, metallic and wacky.
    Random,
    /// Solid or metallic.
    RandomNormal,
}

impl MaterialKind {
    pub fn sample<R: RngCore + ?Sized>(self, rng: &mut R) -> Material {
        match self {
            MaterialKind::Random => [MaterialKind::Solid, MaterialKind::Metallic, MaterialKind::Wacky]
                .choose(rng)
                .map_or_else(Material::default, |kind| kind.sample(rng)),
            MaterialKind::RandomNormal => [MaterialKind::Solid, MaterialKind::Metallic]
                .choose(rng)
                .map_or_else(Material::default, |kind| kind.sample(rng)),
            MaterialKind::Solid => tinted(random_color(rng), rng.random_range(0.0..=0.1)),
            MaterialKind::Metallic => tinted(random_color(rng), rng.random_range(0.9..=1.0)),
            MaterialKind::Wacky => Material {
                albedo: random_color(rng),
                specular: random_color(rng),
                ..Material::default()
            },
        }
    }
}

fn random_color<R: RngCore + ?Sized>(rng: &mut R) -> Color {
    Color::from_fn(|_, _| rng.random::<FloatType>())
}

/// Splits the color between diffuse and specular reflection.
fn tinted(color: Color, metallicness: FloatType) -> Material {
    Material {
        albedo: color * (1.0 - metallicness),
        specular: color * metallicness,
        ..Material::default()
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShapeKind {
    Sphere,
    Box,
    Torus,
    Prism,
    Cylinder,
    /// Four triangles forming a tetrahedron.
    Tetrahedron,
}

impl ShapeKind {
    /// Canonical shape of the given overall size and the height of its center
    /// when resting on the ground plane.
    fn shape(self, size: &WorldVector) -> (Shape, FloatType) {
        match self {
            ShapeKind::Sphere => (Shape::Sphere { radius: size.x }, size.x),
            ShapeKind::Box | ShapeKind::Tetrahedron => (
                Shape::Box {
                    half_extents: size * 0.5,
                },
                size.y * 0.5,
            ),
            ShapeKind::Torus => (
                Shape::Torus {
                    major_radius: size.x,
                    minor_radius: size.x * 0.25,
                },
                size.x * 0.25,
            ),
            ShapeKind::Prism => (
                Shape::Prism {
                    radius: size.x,
                    half_length: size.z * 0.5,
                },
                size.x * 0.5,
            ),
            ShapeKind::Cylinder => (
                Shape::Cylinder {
                    radius: size.x * 0.5,
                    half_height: size.y * 0.5,
                },
                size.y * 0.5,
            ),
        }
    }
}

/// How horizontal positions are drawn from `position_range`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Placement {
    /// Range x is the distance from the origin, range y the angle in radians.
    Radial,
    /// Range x and z are the world coordinates.
    Box,
}

/// Which candidates are kept, judged by bounding spheres.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Collision {
    /// Objects may overlap freely.
    Any,
    /// Reject candidates overlapping an already placed object.
    Distinct,
    /// Keep only candidates touching an already placed object. The first one is always kept.
    Intersecting,
}

impl Collision {
    /// `parts` are the objects a single candidate shape expands into.
    fn accepts(self, placed: &[Object], parts: &[Object]) -> bool {
        let touching = || {
            parts
                .iter()
                .any(|part| placed.iter().any(|other| overlaps(part, other)))
        };
        match self {
            Collision::Any => true,
            Collision::Distinct => !touching(),
            Collision::Intersecting => placed.is_empty() || touching(),
        }
    }
}

/// Random scene of simple objects scattered over the ground plane.
/// Each of the `object_count` shapes is one object, except for a tetrahedron,
/// which is four triangle objects.
#[derive(Clone, Debug, PartialEq, Builder, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneGenerator {
    #[builder(default = 30)]
    pub object_count: usize,
    #[builder(default = vec![ShapeKind::Sphere, ShapeKind::Box])]
    pub shapes: Vec<ShapeKind>,
    #[builder(default = Placement::Radial)]
    pub placement: Placement,
    /// Objects rest on the ground plane instead of floating at a random height.
    #[builder(default = true)]
    pub grounded: bool,
    #[builder(default = Collision::Distinct)]
    pub collision: Collision,
    #[builder(default = (WorldVector::repeat(0.5), WorldVector::repeat(3.0)))]
    pub size_range: (WorldVector, WorldVector),
    #[builder(default = (WorldVector::zeros(), WorldVector::new(50.0, TAU, 10.0)))]
    pub position_range: (WorldVector, WorldVector),
    #[builder(default = MaterialKind::RandomNormal)]
    pub material: MaterialKind,
}

impl Default for SceneGenerator {
    fn default() -> Self {
        SceneGenerator::builder().build()
    }
}

fn lerp(a: FloatType, b: FloatType, p: FloatType) -> FloatType {
    a + (b - a) * p
}

impl SceneGenerator {
    /// Generates up to `object_count` shapes, giving up after `MAX_ATTEMPTS` attempts.
    pub fn generate<R: RngCore + ?Sized>(&self, rng: &mut R) -> Vec<Object> {
        let mut objects: Vec<Object> = Vec::with_capacity(self.object_count);
        let mut shape_count = 0;
        let mut attempts = 0;

        while shape_count < self.object_count && attempts < MAX_ATTEMPTS {
            attempts += 1;
            let Some(&kind) = self.shapes.choose(rng) else {
                break;
            };

            let candidate = self.candidate(kind, rng);
            let parts = match (kind, candidate.shape) {
                // Placed like a box, then replaced by the triangles
                (ShapeKind::Tetrahedron, Shape::Box { half_extents }) => tetrahedron(
                    &candidate.transform.position,
                    half_extents.x * 2.0,
                    candidate.transform.rotation.y,
                    candidate.material,
                )
                .to_vec(),
                _ => vec![candidate],
            };

            if self.collision.accepts(&objects, &parts) {
                objects.extend(parts);
                shape_count += 1;
            }
        }

        if shape_count < self.object_count {
            tracing::warn!(
                requested = self.object_count,
                generated = shape_count,
                "scene generation ran out of attempts"
            );
        }
        tracing::debug!(shapes = shape_count, objects = objects.len(), attempts, "generated scene");
        objects
    }

    fn horizontal_position<R: RngCore + ?Sized>(&self, rng: &mut R) -> (FloatType, FloatType) {
        let (min, max) = &self.position_range;
        let (u, v) = (rng.random::<FloatType>(), rng.random::<FloatType>());
        match self.placement {
            Placement::Radial => {
                let r = lerp(min.x, max.x, u);
                let theta = lerp(min.y, max.y, v);
                (r * theta.cos(), r * theta.sin())
            }
            Placement::Box => (lerp(min.x, max.x, u), lerp(min.z, max.z, v)),
        }
    }

    fn candidate<R: RngCore + ?Sized>(&self, kind: ShapeKind, rng: &mut R) -> Object {
        let (x, z) = self.horizontal_position(rng);
        let (min, max) = &self.size_range;
        let size = WorldVector::from_fn(|i, _| lerp(min[i], max[i], rng.random()));
        let (shape, ground_height) = kind.shape(&size);

        let y = if self.grounded {
            ground_height
        } else {
            let (min, max) = &self.position_range;
            lerp(min.y, max.y, rng.random())
        };

        let transform = Transform {
            rotation: WorldVector::new(0.0, rng.random_range(0.0..TAU), 0.0),
            ..Transform::at(WorldPoint::new(x, y, z))
        };
        Object::new(shape, transform, self.material.sample(rng))
    }
}

fn overlaps(a: &Object, b: &Object) -> bool {
    let (center_a, radius_a) = bounding_sphere(a);
    let (center_b, radius_b) = bounding_sphere(b);
    (center_a - center_b).norm() < radius_a + radius_b
}

/// World space sphere enclosing the object.
fn bounding_sphere(object: &Object) -> (WorldPoint, FloatType) {
    let scale = object.transform.size.abs().max();
    let local_radius = match object.shape {
        Shape::GroundPlane => FloatType::INFINITY,
        Shape::Sphere { radius } => radius,
        Shape::Box { half_extents } => half_extents.norm(),
        Shape::Torus {
            major_radius,
            minor_radius,
        } => major_radius + minor_radius,
        Shape::Prism {
            radius,
            half_length,
        } => radius.hypot(half_length),
        Shape::Cylinder {
            radius,
            half_height,
        } => radius.hypot(half_height),
        Shape::Triangle { vertices } => {
            let centroid = vertices.centroid();
            let radius = vertices
                .iter()
                .map(|v| (v - centroid).norm())
                .fold(0.0, FloatType::max);
            return (object.transform.position + centroid.coords * scale, radius * scale);
        }
    };
    (object.transform.position, local_radius * scale)
}

/// Four triangles of a tetrahedron standing on the ground below `center`.
fn tetrahedron(center: &WorldPoint, length: FloatType, theta: FloatType, material: Material) -> [Object; 4] {
    let (sin, cos) = theta.sin_cos();
    let base = WorldPoint::new(center.x, 0.0, center.z);
    let rotated = |x: FloatType, y: FloatType, z: FloatType| {
        base + WorldVector::new(x * cos - z * sin, y, x * sin + z * cos)
    };

    let side = length / 3.0f32.sqrt();
    let v0 = rotated(0.0, 0.0, length);
    let v1 = rotated(side * 2.0, 0.0, -side);
    let v2 = rotated(-side * 2.0, 0.0, -side);
    let v3 = rotated(0.0, length, 0.0);

    [
        Object::triangle(Triangle::new(v0, v1, v2), material),
        Object::triangle(Triangle::new(v0, v1, v3), material),
        Object::triangle(Triangle::new(v0, v3, v2), material),
        Object::triangle(Triangle::new(v3, v1, v2), material),
    ]
}

/// Unit sized objects of random shape and orientation at the given locations,
/// used as blobs for ray marching.
pub fn march_locations<R: RngCore + ?Sized>(
    locations: &[WorldPoint],
    material: MaterialKind,
    rng: &mut R,
) -> Vec<Object> {
    const SHAPES: [ShapeKind; 4] = [
        ShapeKind::Sphere,
        ShapeKind::Box,
        ShapeKind::Torus,
        ShapeKind::Cylinder,
    ];

    locations
        .iter()
        .map(|location| {
            let kind = SHAPES.choose(rng).copied().unwrap_or(ShapeKind::Sphere);
            let (shape, _) = kind.shape(&WorldVector::repeat(1.0));
            let transform = Transform {
                rotation: WorldVector::from_fn(|_, _| rng.random_range(0.0..TAU)),
                ..Transform::at(*location)
            };
            Object::new(shape, transform, material.sample(rng))
        })
        .collect()
}
