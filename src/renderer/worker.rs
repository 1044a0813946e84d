use image::RgbaImage;
use nalgebra::Vector2;
use rand::{Rng, SeedableRng, rngs::SmallRng};

use crate::{
    camera::Camera,
    geometry::{Color, FloatType, ScreenBlock, ScreenPoint},
    marcher::{self, MarchOutcome},
    renderer::{RenderMode, RenderSettings},
    scene::Scene,
    screen_block::ScreenBlockExt,
    shading::Environment,
    tracer::trace_color,
    util::{MarchStats, Rgba, color_to_image, color_to_rgba},
};

pub struct Worker {
    worker_id: usize,
    stats: MarchStats,
}

impl Worker {
    pub fn new(worker_id: usize) -> Self {
        Self {
            worker_id,
            stats: MarchStats::default(),
        }
    }

    pub fn stats(&self) -> &MarchStats {
        &self.stats
    }

    /// Renders the tile into the top left corner of the buffer.
    /// The output only depends on the tile index and settings, not on which worker renders it.
    #[allow(clippy::too_many_arguments)]
    pub fn render_tile(
        &mut self,
        scene: &Scene,
        camera: &Camera,
        environment: &Environment,
        settings: &RenderSettings,
        tile_index: usize,
        tile: &ScreenBlock,
        buffer: &mut RgbaImage,
    ) {
        let mut rng = tile_rng(settings.seed, tile_index);
        let tile_stats_before = self.stats;

        for point in tile.internal_points() {
            let mut pixel_sum = Rgba::new(0.0, 0.0, 0.0, 0.0);
            for _i in 0..settings.sample_count.get() {
                let color = self.render_sample(scene, camera, environment, settings, &point, &mut rng);
                pixel_sum += color_to_rgba(&color);
            }
            let pixel = pixel_sum * (1.0 / settings.sample_count.get() as f32);

            let buffer_position = point - tile.min;
            buffer.put_pixel(buffer_position.x, buffer_position.y, color_to_image(pixel));
        }

        let marched = self.stats.steps.count - tile_stats_before.steps.count;
        tracing::debug!(
            worker = self.worker_id,
            tile = tile_index,
            x = tile.min.x,
            y = tile.min.y,
            marched,
            hits = self.stats.hits - tile_stats_before.hits,
            exceeded_budget = self.stats.exceeded_budget - tile_stats_before.exceeded_budget,
            "tile done"
        );
    }

    fn render_sample(
        &mut self,
        scene: &Scene,
        camera: &Camera,
        environment: &Environment,
        settings: &RenderSettings,
        point: &ScreenPoint,
        rng: &mut SmallRng,
    ) -> Color {
        // A single sample goes through the pixel center so that low sample renders are stable
        let single = settings.sample_count.get() == 1;
        let center = Vector2::new(0.5, 0.5);
        let camera_ray = |rng: &mut SmallRng| {
            if single {
                camera.pixel_ray(point, &center)
            } else {
                camera.sample_ray(point, rng)
            }
        };

        match &settings.mode {
            RenderMode::Trace(trace) => trace_color(camera_ray(rng), scene, environment, trace),
            RenderMode::March(march) => {
                let (color, outcome) = marcher::march_color(&camera_ray(rng), scene, environment, march);
                self.stats.record(&outcome, march);
                color
            }
            RenderMode::Hybrid { trace, march } => {
                let ray = camera_ray(rng);
                let outcome = marcher::march(&ray, scene, march);
                self.stats.record(&outcome, march);
                match outcome {
                    MarchOutcome::Hit { .. } => {
                        marcher::outcome_color(&ray, &outcome, scene, environment, march)
                    }
                    MarchOutcome::Miss { .. } | MarchOutcome::ExceededBudget => {
                        trace_color(ray, scene, environment, trace)
                    }
                }
            }
            RenderMode::NoiseSlice(slice) => {
                let jitter = if single {
                    center
                } else {
                    Vector2::new(rng.random(), rng.random())
                };
                slice.color(&(point.cast::<FloatType>().coords + jitter))
            }
        }
    }
}

/// Jitter generator of a single tile.
fn tile_rng(seed: u64, tile_index: usize) -> SmallRng {
    SmallRng::seed_from_u64(seed ^ (tile_index as u64).wrapping_mul(0x9e37_79b9_7f4a_7c15))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::geometry::{ScreenSize, WorldPoint};
    use crate::marcher::MarchSettings;
    use crate::noise_slice::NoiseSlice;
    use crate::scene::{Material, Object};
    use assert2::{assert, let_assert};
    use nalgebra::Vector4;
    use std::num::NonZeroU32;

    fn camera() -> Camera {
        let_assert!(
            Some(camera) = Camera::builder()
                .position(WorldPoint::new(0.0, 1.0, -6.0))
                .resolution(ScreenSize::new(8, 8))
                .build()
        );
        camera
    }

    fn scene() -> Scene {
        Scene::new([Object::sphere(
            WorldPoint::new(0.0, 1.0, 0.0),
            1.0,
            Material::default(),
        )])
        .with_ground_plane(true)
    }

    fn render(settings: &RenderSettings, tile_index: usize) -> (RgbaImage, MarchStats) {
        let mut worker = Worker::new(0);
        let mut buffer = RgbaImage::new(8, 8);
        let tile = ScreenBlock::from_size(ScreenSize::new(8, 8));
        worker.render_tile(
            &scene(),
            &camera(),
            &Environment::default(),
            settings,
            tile_index,
            &tile,
            &mut buffer,
        );
        (buffer, *worker.stats())
    }

    #[test]
    fn tile_rngs_differ() {
        let a: u64 = tile_rng(7, 0).random();
        let b: u64 = tile_rng(7, 1).random();
        let c: u64 = tile_rng(8, 0).random();
        assert!(a != b);
        assert!(a != c);
        assert!(a == tile_rng(7, 0).random::<u64>());
    }

    #[test]
    fn same_tile_renders_the_same() {
        let settings = RenderSettings {
            sample_count: NonZeroU32::new(4).unwrap(),
            ..RenderSettings::default()
        };
        assert!(render(&settings, 3).0 == render(&settings, 3).0);
    }

    #[test]
    fn marching_collects_stats() {
        let settings = RenderSettings {
            mode: RenderMode::March(MarchSettings::default()),
            ..RenderSettings::default()
        };
        let (_, stats) = render(&settings, 0);
        assert!(stats.steps.count == 64);
        assert!(stats.hits > 0);
    }

    #[test]
    fn tracing_collects_no_march_stats() {
        let (image, stats) = render(&RenderSettings::default(), 0);
        assert!(stats.is_empty());
        assert!(image.pixels().all(|p| p.0[3] == 255));
    }

    #[test]
    fn noise_slice_shows_the_field_at_pixel_centers() {
        let slice = NoiseSlice {
            light: Vector4::zeros(),
            ..NoiseSlice::default()
        };
        let settings = RenderSettings {
            mode: RenderMode::NoiseSlice(slice),
            ..RenderSettings::default()
        };
        let (image, stats) = render(&settings, 0);
        assert!(stats.is_empty());
        for (x, y, pixel) in image.enumerate_pixels() {
            let expected = slice.color(&Vector2::new(x as FloatType + 0.5, y as FloatType + 0.5));
            assert!(*pixel == color_to_image(color_to_rgba(&expected)));
        }
    }

    #[test]
    fn hybrid_matches_trace_on_misses() {
        // Without any surfaces every march misses and falls back to the tracer
        let empty = Scene::default();
        let environment = Environment::default();
        let settings = RenderSettings {
            mode: RenderMode::Hybrid {
                trace: Default::default(),
                march: Default::default(),
            },
            ..RenderSettings::default()
        };
        let mut worker = Worker::new(0);
        let mut rng = tile_rng(0, 0);
        let point = ScreenPoint::new(2, 5);
        let color = worker.render_sample(&empty, &camera(), &environment, &settings, &point, &mut rng);
        let traced = trace_color(
            camera().pixel_ray(&point, &Vector2::new(0.5, 0.5)),
            &empty,
            &environment,
            &Default::default(),
        );
        assert!(color == traced);
        assert!(worker.stats().misses == 1);
    }
}
