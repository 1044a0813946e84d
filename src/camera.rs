use bon::bon;
use nalgebra::{Matrix4, Rotation3, Unit, Vector2, Vector4};

use crate::geometry::{FloatType, Ray, ScreenPoint, ScreenSize, WorldPoint, WorldVector};

const NEAR: FloatType = 0.3;
const FAR: FloatType = 1000.0;

/// Pinhole camera built from a model matrix and an inverse projection matrix.
/// With zero rotation it looks along +Z with +Y up.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Camera {
    resolution: ScreenSize,
    model: Matrix4<FloatType>,
    inverse_projection: Matrix4<FloatType>,
}

#[bon]
impl Camera {
    /// Returns None for an empty resolution or a field of view outside (0, 180) degrees.
    #[builder]
    pub fn new(
        /// Field of view in degrees
        #[builder(default = 30.0)]
        fov: FloatType,
        /// Vertical extent relative to the horizontal one, defaults to square pixels.
        aspect_ratio: Option<FloatType>,
        position: WorldPoint,
        /// Rotation around X, Y and Z in degrees
        #[builder(default = WorldVector::zeros())]
        rotation: WorldVector,
        resolution: ScreenSize,
    ) -> Option<Self> {
        if resolution.x == 0 || resolution.y == 0 || !(fov > 0.0 && fov < 180.0) {
            return None;
        }
        let aspect_ratio =
            aspect_ratio.unwrap_or(resolution.y as FloatType / resolution.x as FloatType);
        if !(aspect_ratio > 0.0 && aspect_ratio.is_finite()) {
            return None;
        }
        let inverse_projection = projection(fov, aspect_ratio, &rotation).try_inverse()?;

        #[rustfmt::skip]
        let model = Matrix4::new(
            1.0, 0.0, 0.0, position.x,
            0.0, 1.0, 0.0, position.y,
            0.0, 0.0, -1.0, position.z,
            0.0, 0.0, 0.0, 1.0,
        );

        Some(Camera {
            resolution,
            model,
            inverse_projection,
        })
    }
}

/// Perspective projection followed by the camera rotation.
fn projection(fov: FloatType, aspect_ratio: FloatType, rotation: &WorldVector) -> Matrix4<FloatType> {
    let half_fov = fov.to_radians() / 2.0;
    let r = (-half_fov).tan();
    let l = half_fov.tan();
    let t = half_fov.tan() * aspect_ratio;
    let b = -t;

    let x = 2.0 * NEAR / (r - l);
    let y = 2.0 * NEAR / (t - b);
    let a = (r + l) / (r - l);
    let b = (t + b) / (t - b);
    let c = -(FAR + NEAR) / (FAR - NEAR);
    let d = -2.0 * FAR * NEAR / (FAR - NEAR);

    #[rustfmt::skip]
    let projection = Matrix4::new(
        x, 0.0, a, 0.0,
        0.0, y, b, 0.0,
        0.0, 0.0, c, d,
        0.0, 0.0, -1.0, 0.0,
    );

    let axis_rotation = |axis: Unit<WorldVector>, degrees: FloatType| {
        Rotation3::from_axis_angle(&axis, degrees.to_radians()).to_homogeneous()
    };
    projection
        * axis_rotation(WorldVector::x_axis(), rotation.x)
        * axis_rotation(WorldVector::y_axis(), rotation.y)
        * axis_rotation(WorldVector::z_axis(), rotation.z)
}

/// Maps a pixel to [-1, 1] screen coordinates, +v up, row 0 at the top.
/// Jitter is the position inside the pixel, (0.5, 0.5) is the center.
pub fn uv(pixel: &ScreenPoint, jitter: &Vector2<FloatType>, size: &ScreenSize) -> Vector2<FloatType> {
    let u = (pixel.x as FloatType + jitter.x) / size.x as FloatType;
    let v = (pixel.y as FloatType + jitter.y) / size.y as FloatType;
    Vector2::new(u * 2.0 - 1.0, 1.0 - v * 2.0)
}

impl Camera {
    pub fn get_resolution(&self) -> ScreenSize {
        self.resolution
    }

    pub fn position(&self) -> WorldPoint {
        WorldPoint::from(self.model.fixed_view::<3, 1>(0, 3).into_owned())
    }

    /// Ray through the given screen coordinates.
    pub fn ray_at(&self, uv: &Vector2<FloatType>) -> Ray {
        let direction = (self.inverse_projection * Vector4::new(uv.x, uv.y, 0.0, 1.0)).xyz();
        let direction = (self.model * direction.to_homogeneous()).xyz();
        Ray::new(self.position(), direction)
    }

    /// Ray through a pixel, offset inside the pixel by the jitter.
    pub fn pixel_ray(&self, pixel: &ScreenPoint, jitter: &Vector2<FloatType>) -> Ray {
        self.ray_at(&uv(pixel, jitter, &self.resolution))
    }

    /// Ray through a uniformly random point of the pixel.
    pub fn sample_ray(&self, pixel: &ScreenPoint, rng: &mut impl rand::Rng) -> Ray {
        let jitter = Vector2::new(rng.random::<FloatType>(), rng.random::<FloatType>());
        self.pixel_ray(pixel, &jitter)
    }
}
