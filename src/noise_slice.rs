//! Flat view of the whirl noise field: a slice at constant z, one noise unit per pixel.

use nalgebra::{Unit, Vector2, Vector4};
use serde::{Deserialize, Serialize};

use crate::geometry::{Color, FloatType, WorldPoint, WorldVector};
use crate::noise::{WhirlNoise, chunk_of, chunk_point};
use crate::shading::Light;

/// Radius of the feature point markers in pixels.
const POINT_RADIUS: FloatType = 1.5;

fn point_color() -> Color {
    Color::new(1.0, 0.0, 0.0)
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NoiseSlice {
    pub noise: WhirlNoise,
    /// Height of the slice.
    pub z: FloatType,
    /// Mark the feature point of each chunk.
    pub points: bool,
    /// Show normals as colors instead of the field values.
    pub normals: bool,
    /// Use the blended noise instead of the raw nearest cell noise.
    pub smooth: bool,
    /// Direction the light travels in xyz, intensity in w.
    /// Zero intensity or a zero direction shows the unlit field.
    pub light: Vector4<FloatType>,
    /// Step of the normal estimation.
    pub precision: FloatType,
}

impl Default for NoiseSlice {
    fn default() -> Self {
        NoiseSlice {
            noise: WhirlNoise::default(),
            z: 0.0,
            points: true,
            normals: false,
            smooth: false,
            light: Vector4::new(-0.1, -0.1, -0.1, 1.0),
            precision: 0.1,
        }
    }
}

impl NoiseSlice {
    /// Point of the noise field shown at the given image position.
    pub fn point(&self, position: &Vector2<FloatType>) -> WorldPoint {
        WorldPoint::new(position.x, position.y, self.z)
    }

    fn value(&self, point: &WorldPoint) -> FloatType {
        if self.smooth {
            self.noise.smooth_noise(point)
        } else {
            self.noise.noise(point)
        }
    }

    fn normal(&self, point: &WorldPoint) -> Unit<WorldVector> {
        if self.smooth {
            self.noise.smooth_normal(point, self.precision)
        } else {
            self.noise.normal(point, self.precision)
        }
    }

    /// Distance within the slice plane to the feature point of the containing chunk.
    fn feature_distance(&self, point: &WorldPoint) -> FloatType {
        let noise = &self.noise;
        let chunk = chunk_of(point, &noise.chunk_size);
        let feature = chunk_point(&chunk, &noise.chunk_size, noise.seed, noise.density);
        (feature.xy() - point.xy()).norm()
    }

    /// Color of the image at the given position, in pixels.
    pub fn color(&self, position: &Vector2<FloatType>) -> Color {
        let point = self.point(position);
        if self.points && self.feature_distance(&point) < POINT_RADIUS {
            return point_color();
        }
        if self.normals {
            return (self.normal(&point).into_inner() + WorldVector::repeat(1.0)) * 0.5;
        }

        let value = self.value(&point);
        let lighting = match Light::from_homogeneous(&self.light) {
            Some(light) if light.intensity != 0.0 => {
                let diffuse = self.normal(&point).dot(&-light.direction.into_inner()).max(0.0);
                1.0 - light.intensity + light.intensity * diffuse
            }
            _ => 1.0,
        };
        Color::repeat(value * lighting)
    }
}
