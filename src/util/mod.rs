mod stats;

pub use stats::{MarchStats, Stats};

use crate::geometry::Color;

pub type Rgba = rgb::RGBA<f32>;

/// Opaque pixel of the given linear color.
pub fn color_to_rgba(color: &Color) -> Rgba {
    Rgba::new(color.x, color.y, color.z, 1.0)
}

/// Maps a 0-1 f32 rgba pixel to pixel type compatible with module image.
/// Out of range channels saturate, NaNs become 0.
pub fn color_to_image(color: Rgba) -> image::Rgba<u8> {
    let channel = |c: f32| (c * 255.0).round().clamp(0.0, 255.0) as u8;
    image::Rgba([
        channel(color.r),
        channel(color.g),
        channel(color.b),
        channel(color.a),
    ])
}
