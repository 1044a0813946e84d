mod camera;
pub mod config;
pub mod geometry;
pub mod marcher;
pub mod noise;
pub mod noise_slice;
mod renderer;
pub mod scene;
mod screen_block;
pub mod sdf;
pub mod shading;
pub mod tracer;
mod util;

pub use crate::renderer::{RenderMode, RenderProgress, RenderSettings, render};
pub use camera::Camera;
pub use config::{RenderJob, SceneFile};
pub use scene::Scene;
pub use shading::Environment;
pub use util::{MarchStats, Stats};
