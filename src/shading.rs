use std::f32::consts::PI;
use std::path::Path;

use image::Rgb32FImage;
use nalgebra::{Unit, Vector2, Vector4};

use crate::geometry::{Color, EPSILON, FloatType, Ray, RayHit, WorldVector, reflect};

/// Directional light.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Light {
    /// Direction the light travels in.
    pub direction: Unit<WorldVector>,
    pub intensity: FloatType,
}

impl Light {
    /// Light from a direction in xyz and intensity in w.
    /// Returns None if the direction is zero.
    pub fn from_homogeneous(v: &Vector4<FloatType>) -> Option<Light> {
        Some(Light {
            direction: Unit::try_new(v.xyz(), EPSILON)?,
            intensity: v.w,
        })
    }
}

impl Default for Light {
    fn default() -> Self {
        Light {
            direction: Unit::new_normalize(WorldVector::new(0.1, -0.1, 0.1)),
            intensity: 1.0,
        }
    }
}

/// Equirectangular environment texture.
#[derive(Clone, Debug)]
pub struct EnvironmentMap {
    image: Rgb32FImage,
}

impl EnvironmentMap {
    /// Returns None for an empty image.
    pub fn new(image: Rgb32FImage) -> Option<EnvironmentMap> {
        (image.width() > 0 && image.height() > 0).then_some(EnvironmentMap { image })
    }

    pub fn open(path: impl AsRef<Path>) -> Result<Option<EnvironmentMap>, image::ImageError> {
        Ok(Self::new(image::open(path)?.into_rgb32f()))
    }

    /// Pixel coordinates of the texel seen in the given direction.
    pub fn sample_sky(&self, direction: &Unit<WorldVector>) -> (u32, u32) {
        let uv = uv(direction);
        let to_pixel =
            |t: FloatType, size: u32| ((t * size as FloatType) as u32).min(size - 1);
        (
            to_pixel(uv.x, self.image.width()),
            to_pixel(uv.y, self.image.height()),
        )
    }

    pub fn sample(&self, direction: &Unit<WorldVector>) -> Color {
        let (x, y) = self.sample_sky(direction);
        Color::from(self.image.get_pixel(x, y).0)
    }
}

/// Maps a direction to equirectangular texture coordinates in [0, 1].
/// v = 0 is straight up, u goes around the vertical axis starting behind (-Z).
pub fn uv(direction: &Unit<WorldVector>) -> Vector2<FloatType> {
    let u = (-direction.x.atan2(-direction.z) / (2.0 * PI)).rem_euclid(1.0);
    let v = direction.y.clamp(-1.0, 1.0).acos() / PI;
    Vector2::new(u, v)
}

#[derive(Clone, Debug)]
pub enum Sky {
    Uniform(Color),
    /// Blend from the horizon color to the zenith color, horizon color below the horizon.
    Gradient { horizon: Color, zenith: Color },
    Texture(EnvironmentMap),
}

impl Sky {
    pub fn sample(&self, direction: &Unit<WorldVector>) -> Color {
        match self {
            Sky::Uniform(color) => *color,
            Sky::Gradient { horizon, zenith } => horizon.lerp(zenith, direction.y.max(0.0)),
            Sky::Texture(map) => map.sample(direction),
        }
    }
}

impl Default for Sky {
    fn default() -> Self {
        Sky::Gradient {
            horizon: Color::new(0.85, 0.88, 0.92),
            zenith: Color::new(0.3, 0.5, 0.9),
        }
    }
}

/// Everything outside the scene geometry that contributes light.
#[derive(Clone, Debug)]
pub struct Environment {
    pub sky: Sky,
    pub light: Light,
    pub sky_intensity: FloatType,
    /// Weight of the sky light reaching surfaces from around the normal.
    pub ambient: FloatType,
}

impl Default for Environment {
    fn default() -> Self {
        Environment {
            sky: Sky::default(),
            light: Light::default(),
            sky_intensity: 1.0,
            ambient: 0.2,
        }
    }
}

impl Environment {
    pub fn sky_color(&self, direction: &Unit<WorldVector>) -> Color {
        self.sky.sample(direction) * self.sky_intensity
    }
}

/// Color leaving the hit surface toward the ray origin.
/// A miss (see `RayHit::none`) sees the sky instead.
/// Direct light is skipped for shadowed hits, emission and ambient sky light are not.
pub fn shade(ray: &Ray, hit: &RayHit, environment: &Environment, shadowed: bool) -> Color {
    if !hit.is_hit() {
        return environment.sky_color(&ray.direction);
    }

    let material = &hit.material;
    let ambient = material
        .albedo
        .component_mul(&environment.sky_color(&hit.normal))
        * environment.ambient;
    let mut color = material.emission + ambient;

    if !shadowed {
        let light = &environment.light;
        let diffuse = material.albedo * hit.normal.dot(&-light.direction.as_ref()).max(0.0);
        let reflected = reflect(light.direction.as_ref(), &hit.normal);
        let highlight = reflected.dot(&-ray.direction.as_ref()).max(0.0).powf(material.n);
        color += (diffuse + material.specular * highlight) * light.intensity;
    }

    color
}
