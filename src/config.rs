//! JSON scene files.
//!
//! A scene file describes everything a render needs: camera, environment (sky and light),
//! scene content and render settings. Every section and almost every field is optional.
//!
//! ```json
//! {
//!     "camera": { "position": [0, 2, -10], "resolution": [640, 480] },
//!     "environment": { "sky": { "type": "uniform", "color": [0.5, 0.6, 0.9] } },
//!     "scene": {
//!         "objects": [{ "type": "sphere", "radius": 1.0, "transform": { "position": [0, 1, 0] } }]
//!     },
//!     "render": { "sample_count": 4, "mode": { "type": "march" } }
//! }
//! ```

use std::path::{Path, PathBuf};

use nalgebra::Vector4;
use rand::{SeedableRng, rngs::SmallRng};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    camera::Camera,
    geometry::{Color, FloatType, ScreenSize, Transform, WorldPoint, WorldVector},
    renderer::RenderSettings,
    scene::{
        DistortionField, Material, NoiseVolume, Object, Scene,
        generation::{MaterialKind, SceneGenerator, march_locations},
        obj::{ObjOpenError, load_obj},
    },
    shading::{Environment, EnvironmentMap, Light, Sky},
};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid scene file: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to load sky texture: {0}")]
    Image(#[from] image::ImageError),

    #[error("Failed to load mesh {path:?}: {source}")]
    Obj {
        path: PathBuf,
        source: ObjOpenError,
    },

    #[error("Camera settings don't describe a valid projection")]
    DegenerateCamera,

    #[error("Light direction must not be zero")]
    ZeroLight,

    #[error("Sky texture is empty")]
    EmptySky,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SceneFile {
    pub camera: CameraConfig,
    pub environment: EnvironmentConfig,
    pub scene: SceneConfig,
    pub render: RenderSettings,
}

/// Everything needed to start a render.
#[derive(Clone, Debug)]
pub struct RenderJob {
    pub scene: Scene,
    pub camera: Camera,
    pub environment: Environment,
    pub settings: RenderSettings,
}

impl SceneFile {
    pub fn from_json(json: &str) -> Result<SceneFile, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn open(path: impl AsRef<Path>) -> Result<SceneFile, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_owned(),
            source,
        })?;
        Self::from_json(&json)
    }

    /// Loads referenced files and builds the render job.
    /// Relative paths are resolved against `base_dir`.
    pub fn build(&self, base_dir: &Path) -> Result<RenderJob, ConfigError> {
        Ok(RenderJob {
            scene: self.scene.build(base_dir)?,
            camera: self.camera.build()?,
            environment: self.environment.build(base_dir)?,
            settings: self.render,
        })
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CameraConfig {
    /// Degrees
    pub fov: FloatType,
    pub aspect_ratio: Option<FloatType>,
    pub position: WorldPoint,
    /// Degrees around X, Y and Z
    pub rotation: WorldVector,
    pub resolution: ScreenSize,
}

impl Default for CameraConfig {
    fn default() -> Self {
        CameraConfig {
            fov: 30.0,
            aspect_ratio: None,
            position: WorldPoint::new(0.0, 3.0, -20.0),
            rotation: WorldVector::zeros(),
            resolution: ScreenSize::new(800, 600),
        }
    }
}

impl CameraConfig {
    pub fn build(&self) -> Result<Camera, ConfigError> {
        Camera::builder()
            .fov(self.fov)
            .maybe_aspect_ratio(self.aspect_ratio)
            .position(self.position)
            .rotation(self.rotation)
            .resolution(self.resolution)
            .build()
            .ok_or(ConfigError::DegenerateCamera)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SkyConfig {
    Uniform { color: Color },
    Gradient { horizon: Color, zenith: Color },
    /// Equirectangular image
    Texture { path: PathBuf },
}

impl Default for SkyConfig {
    fn default() -> Self {
        SkyConfig::Gradient {
            horizon: Color::new(0.85, 0.88, 0.92),
            zenith: Color::new(0.3, 0.5, 0.9),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EnvironmentConfig {
    pub sky: SkyConfig,
    /// Direction the light travels in xyz, intensity in w.
    pub light: Vector4<FloatType>,
    pub sky_intensity: FloatType,
    pub ambient: FloatType,
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        let environment = Environment::default();
        EnvironmentConfig {
            sky: SkyConfig::default(),
            light: Vector4::new(0.1, -0.1, 0.1, environment.light.intensity),
            sky_intensity: environment.sky_intensity,
            ambient: environment.ambient,
        }
    }
}

impl EnvironmentConfig {
    pub fn build(&self, base_dir: &Path) -> Result<Environment, ConfigError> {
        let sky = match &self.sky {
            SkyConfig::Uniform { color } => Sky::Uniform(*color),
            SkyConfig::Gradient { horizon, zenith } => Sky::Gradient {
                horizon: *horizon,
                zenith: *zenith,
            },
            SkyConfig::Texture { path } => {
                let path = base_dir.join(path);
                tracing::debug!(?path, "loading sky texture");
                Sky::Texture(EnvironmentMap::open(path)?.ok_or(ConfigError::EmptySky)?)
            }
        };
        Ok(Environment {
            sky,
            light: Light::from_homogeneous(&self.light).ok_or(ConfigError::ZeroLight)?,
            sky_intensity: self.sky_intensity,
            ambient: self.ambient,
        })
    }
}

/// Triangles of a Wavefront OBJ file placed into the scene.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MeshConfig {
    pub path: PathBuf,
    #[serde(default = "Transform::identity")]
    pub transform: Transform,
    #[serde(default)]
    pub material: Material,
}

/// Random shapes at fixed positions.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LocationsConfig {
    pub locations: Vec<WorldPoint>,
    #[serde(default = "default_location_material")]
    pub material: MaterialKind,
}

fn default_location_material() -> MaterialKind {
    MaterialKind::RandomNormal
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SceneConfig {
    pub ground_plane: bool,
    pub objects: Vec<Object>,
    pub meshes: Vec<MeshConfig>,
    pub generator: Option<SceneGenerator>,
    pub march_locations: Option<LocationsConfig>,
    /// Seed of the generated content.
    pub seed: u64,
    pub distortion: Option<DistortionField>,
    pub volume: Option<NoiseVolume>,
}

impl Default for SceneConfig {
    fn default() -> Self {
        SceneConfig {
            ground_plane: true,
            objects: Vec::new(),
            meshes: Vec::new(),
            generator: None,
            march_locations: None,
            seed: 0,
            distortion: None,
            volume: None,
        }
    }
}

impl SceneConfig {
    /// Objects are added in a fixed order: listed objects, meshes, generated objects
    /// and finally march locations.
    pub fn build(&self, base_dir: &Path) -> Result<Scene, ConfigError> {
        let mut objects = self.objects.clone();

        for mesh in &self.meshes {
            let path = base_dir.join(&mesh.path);
            let triangles = load_obj(&path, mesh.transform, mesh.material)
                .map_err(|source| ConfigError::Obj { path, source })?;
            objects.extend(triangles);
        }

        let mut rng = SmallRng::seed_from_u64(self.seed);
        if let Some(generator) = &self.generator {
            objects.extend(generator.generate(&mut rng));
        }
        if let Some(locations) = &self.march_locations {
            objects.extend(march_locations(&locations.locations, locations.material, &mut rng));
        }

        tracing::debug!(objects = objects.len(), "scene built");
        Ok(Scene {
            distortion: self.distortion,
            volume: self.volume,
            ..Scene::new(objects).with_ground_plane(self.ground_plane)
        })
    }
}
