pub mod generation;
pub mod obj;
pub mod primitives;

use bon::Builder;
use index_vec::IndexVec;
use serde::{Deserialize, Serialize};

use crate::geometry::{Color, FloatType, Transform, Triangle, WorldPoint, WorldVector};
use crate::noise::{Octaves, WhirlNoise};

/// Surface response of an object.
#[derive(Copy, Clone, Debug, PartialEq, Builder, Serialize, Deserialize)]
#[serde(default)]
pub struct Material {
    #[builder(default = Color::repeat(0.8))]
    pub albedo: Color,
    /// Reflectance, also the energy kept by a reflected ray.
    #[builder(default = Color::zeros())]
    pub specular: Color,
    /// Shininess exponent
    #[builder(default = 1.0)]
    pub n: FloatType,
    #[builder(default = 0.0)]
    pub transparency: FloatType,
    /// Added to the shaded color regardless of lighting.
    #[builder(default = Color::zeros())]
    pub emission: Color,
}

impl Material {
    pub fn ground() -> Material {
        let red = Color::new(0.7, 0.2, 0.2);
        Material {
            albedo: red,
            specular: red,
            n: 1.0,
            transparency: 1.0,
            emission: Color::zeros(),
        }
    }
}

impl Default for Material {
    fn default() -> Self {
        Material::builder().build()
    }
}

/// Canonical shape, centered at the origin and axis aligned.
/// Placement in the world is done by the object's transform.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Shape {
    /// The XZ plane, facing +Y.
    GroundPlane,
    Sphere {
        radius: FloatType,
    },
    Box {
        half_extents: WorldVector,
    },
    Triangle {
        vertices: Triangle<WorldPoint>,
    },
    /// Ring around the Y axis.
    Torus {
        major_radius: FloatType,
        minor_radius: FloatType,
    },
    /// Triangular prism along the Z axis, `radius` is the inradius of the cross section doubled.
    Prism {
        radius: FloatType,
        half_length: FloatType,
    },
    /// Capped cylinder along the Y axis.
    Cylinder {
        radius: FloatType,
        half_height: FloatType,
    },
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Object {
    #[serde(flatten)]
    pub shape: Shape,
    #[serde(default)]
    pub transform: Transform,
    #[serde(default)]
    pub material: Material,
}

impl Object {
    pub fn new(shape: Shape, transform: Transform, material: Material) -> Object {
        Object {
            shape,
            transform,
            material,
        }
    }

    /// The distinguished plane at height zero.
    pub fn ground_plane() -> Object {
        Self::new(Shape::GroundPlane, Transform::identity(), Material::ground())
    }

    pub fn sphere(center: WorldPoint, radius: FloatType, material: Material) -> Object {
        Self::new(Shape::Sphere { radius }, Transform::at(center), material)
    }

    pub fn cube(center: WorldPoint, half_extents: WorldVector, material: Material) -> Object {
        Self::new(Shape::Box { half_extents }, Transform::at(center), material)
    }

    pub fn triangle(vertices: Triangle<WorldPoint>, material: Material) -> Object {
        Self::new(Shape::Triangle { vertices }, Transform::identity(), material)
    }
}

index_vec::define_index_type! {
    pub struct ObjectIdx = u32;
}

/// Which surface of the scene something refers to.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Surface {
    GroundPlane,
    Object(ObjectIdx),
}

/// Noise offset applied to the distance of every object (not the ground plane)
/// when ray marching.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DistortionField {
    pub noise: WhirlNoise,
    pub octaves: Octaves,
    pub amplitude: FloatType,
}

impl Default for DistortionField {
    fn default() -> Self {
        DistortionField {
            noise: WhirlNoise::default(),
            octaves: Octaves::default(),
            amplitude: 0.5,
        }
    }
}

impl DistortionField {
    pub fn offset(&self, point: &WorldPoint) -> FloatType {
        self.amplitude * self.noise.recursive_smooth_noise(point, &self.octaves)
    }
}

/// Surface where the multi scale noise field reaches a threshold, found by the tracer.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NoiseVolume {
    pub noise: WhirlNoise,
    pub octaves: Octaves,
    pub threshold: FloatType,
    /// How far along each ray the volume is searched.
    pub length: FloatType,
    pub material: Material,
}

impl Default for NoiseVolume {
    fn default() -> Self {
        NoiseVolume {
            noise: WhirlNoise::default(),
            octaves: Octaves::default(),
            threshold: 1.2,
            length: 200.0,
            material: Material::default(),
        }
    }
}

/// Everything that can be hit. Read only while rendering.
#[derive(Clone, Debug, Default)]
pub struct Scene {
    pub objects: IndexVec<ObjectIdx, Object>,
    pub ground_plane: bool,
    pub distortion: Option<DistortionField>,
    pub volume: Option<NoiseVolume>,
}

impl Scene {
    pub fn new(objects: impl IntoIterator<Item = Object>) -> Scene {
        Scene {
            objects: objects.into_iter().collect(),
            ..Default::default()
        }
    }

    pub fn with_ground_plane(mut self, enabled: bool) -> Scene {
        self.ground_plane = enabled;
        self
    }

    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    pub fn material(&self, surface: Surface) -> Material {
        match surface {
            Surface::GroundPlane => Material::ground(),
            Surface::Object(idx) => self.objects[idx].material,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use assert2::{assert, let_assert};

    #[test]
    fn object_parses_from_json() {
        let json = r#"{
            "type": "sphere",
            "radius": 2.0,
            "transform": { "position": [1.0, 2.0, 3.0] },
            "material": { "albedo": [1.0, 0.0, 0.0] }
        }"#;
        let_assert!(Ok(object) = serde_json::from_str::<Object>(json));
        assert!(object.shape == Shape::Sphere { radius: 2.0 });
        assert!(object.transform.size == WorldVector::repeat(1.0));
        assert!(object.material.albedo == Color::new(1.0, 0.0, 0.0));
        assert!(object.material.specular == Color::zeros());
    }

    #[test]
    fn unknown_shape_is_rejected() {
        let json = r#"{ "type": "klein_bottle", "transform": { "position": [0.0, 0.0, 0.0] } }"#;
        assert!(serde_json::from_str::<Object>(json).is_err());
    }

    #[test]
    fn ground_material_is_used_for_ground_plane() {
        let scene = Scene::new([Object::sphere(WorldPoint::origin(), 1.0, Material::default())]);
        assert!(scene.material(Surface::GroundPlane) == Material::ground());
        assert!(scene.material(Surface::Object(ObjectIdx::new(0))) == Material::default());
    }
}
