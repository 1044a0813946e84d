mod machinery;
mod worker;

use std::num::{NonZeroU32, NonZeroUsize};

use serde::{Deserialize, Serialize};

use crate::marcher::MarchSettings;
use crate::noise_slice::NoiseSlice;
use crate::tracer::TraceSettings;

pub use crate::renderer::machinery::{RenderProgress, render};

/// How a pixel is turned into a color.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RenderMode {
    /// Analytic intersections with mirror bounces.
    Trace(TraceSettings),
    /// Sphere tracing through the (possibly distorted) distance field.
    March(MarchSettings),
    /// Marches first, rays that miss or run out of steps are traced analytically.
    Hybrid {
        #[serde(default)]
        trace: TraceSettings,
        #[serde(default)]
        march: MarchSettings,
    },
    /// Flat slice through the noise field, ignoring the camera and the scene.
    NoiseSlice(NoiseSlice),
}

impl Default for RenderMode {
    fn default() -> Self {
        RenderMode::Trace(TraceSettings::default())
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderSettings {
    pub tile_size: NonZeroU32,
    pub sample_count: NonZeroU32,
    /// One worker per CPU core if not set.
    pub worker_count: Option<NonZeroUsize>,
    /// Seed of the sub-pixel jitter.
    pub seed: u64,
    pub mode: RenderMode,
}

impl Default for RenderSettings {
    fn default() -> Self {
        RenderSettings {
            tile_size: NonZeroU32::new(32).unwrap_or(NonZeroU32::MIN),
            sample_count: NonZeroU32::MIN,
            worker_count: None,
            seed: 0,
            mode: RenderMode::default(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use assert2::{assert, let_assert};

    #[test]
    fn settings_from_json() {
        let json = r#"{
            "tile_size": 16,
            "sample_count": 4,
            "mode": { "type": "hybrid", "march": { "max_iterations": 30 } }
        }"#;
        let_assert!(Ok(settings) = serde_json::from_str::<RenderSettings>(json));
        assert!(settings.tile_size.get() == 16);
        assert!(settings.sample_count.get() == 4);
        assert!(settings.worker_count.is_none());
        let_assert!(RenderMode::Hybrid { trace, march } = settings.mode);
        assert!(trace == TraceSettings::default());
        assert!(march.max_iterations == 30);
        assert!(march.precision == MarchSettings::default().precision);
    }

    #[test]
    fn noise_slice_from_json() {
        let json = r#"{ "mode": { "type": "noise_slice", "z": 3.0, "smooth": true, "noise": { "seed": 5 } } }"#;
        let_assert!(Ok(settings) = serde_json::from_str::<RenderSettings>(json));
        let_assert!(RenderMode::NoiseSlice(slice) = settings.mode);
        assert!(slice.z == 3.0);
        assert!(slice.smooth);
        assert!(slice.points);
        assert!(slice.noise.seed == 5);
        assert!(slice.noise.chunk_size == NoiseSlice::default().noise.chunk_size);
    }

    #[test]
    fn zero_samples_are_rejected() {
        assert!(serde_json::from_str::<RenderSettings>(r#"{ "sample_count": 0 }"#).is_err());
    }
}
