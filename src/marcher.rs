//! Sphere tracing against the scene distance field.

use serde::{Deserialize, Serialize};

use crate::geometry::{Color, FloatType, Ray, RayHit};
use crate::scene::Scene;
use crate::sdf::{estimate_normal, scene_distance};
use crate::shading::{Environment, shade};

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarchSettings {
    /// Step budget of a single march.
    pub max_iterations: u32,
    /// Distance along the ray after which the march gives up.
    pub max_distance: FloatType,
    /// Hit threshold, also the normal estimation step.
    pub precision: FloatType,
    /// Fraction of the distance bound advanced per step.
    /// Values below one keep strongly distorted fields from overshooting.
    pub step_scale: FloatType,
    pub shadows: bool,
}

impl Default for MarchSettings {
    fn default() -> Self {
        MarchSettings {
            max_iterations: 100,
            max_distance: 400.0,
            precision: 0.1,
            step_scale: 1.0,
            shadows: true,
        }
    }
}

#[derive(Copy, Clone, Debug)]
pub enum MarchOutcome {
    Hit { hit: RayHit, steps: u32 },
    /// Travelled past the maximum distance.
    Miss { steps: u32 },
    /// Ran out of steps before deciding.
    ExceededBudget,
}

impl MarchOutcome {
    /// Number of distance evaluations the march took.
    pub fn steps(&self, settings: &MarchSettings) -> u32 {
        match self {
            MarchOutcome::Hit { steps, .. } | MarchOutcome::Miss { steps } => *steps,
            MarchOutcome::ExceededBudget => settings.max_iterations,
        }
    }

    pub fn hit(&self) -> Option<&RayHit> {
        match self {
            MarchOutcome::Hit { hit, .. } => Some(hit),
            _ => None,
        }
    }
}

/// Marches the ray through the scene.
/// Always finishes within `settings.max_iterations` distance evaluations.
pub fn march(ray: &Ray, scene: &Scene, settings: &MarchSettings) -> MarchOutcome {
    let mut travelled = 0.0;

    for step in 1..=settings.max_iterations {
        let position = ray.point_at(travelled);
        let nearest = scene_distance(scene, &position);

        if nearest.distance < settings.precision {
            let Some(surface) = nearest.surface else {
                return MarchOutcome::Miss { steps: step };
            };
            let hit = RayHit {
                position,
                distance: travelled,
                normal: estimate_normal(scene, &position, settings.precision),
                material: scene.material(surface),
            };
            return MarchOutcome::Hit { hit, steps: step };
        }

        travelled += nearest.distance * settings.step_scale;
        if travelled > settings.max_distance {
            return MarchOutcome::Miss { steps: step };
        }
    }

    MarchOutcome::ExceededBudget
}

/// Whether the light is blocked on its way to the hit, found by marching toward the light.
pub fn occluded(scene: &Scene, hit: &RayHit, environment: &Environment, settings: &MarchSettings) -> bool {
    // Start clear of the surface, otherwise the march stops right away
    let origin = hit.position + hit.normal.as_ref() * (2.0 * settings.precision);
    let shadow_ray = Ray::new(origin, -environment.light.direction.as_ref());
    matches!(march(&shadow_ray, scene, settings), MarchOutcome::Hit { .. })
}

/// Color seen along the ray together with the march outcome.
/// Misses and exceeded budgets both see the sky.
pub fn march_color(
    ray: &Ray,
    scene: &Scene,
    environment: &Environment,
    settings: &MarchSettings,
) -> (Color, MarchOutcome) {
    let outcome = march(ray, scene, settings);
    (outcome_color(ray, &outcome, scene, environment, settings), outcome)
}

/// Shades an already computed march outcome of the ray.
pub fn outcome_color(
    ray: &Ray,
    outcome: &MarchOutcome,
    scene: &Scene,
    environment: &Environment,
    settings: &MarchSettings,
) -> Color {
    let color = match outcome {
        MarchOutcome::Hit { hit, .. } => {
            let shadowed = settings.shadows && occluded(scene, hit, environment, settings);
            shade(ray, hit, environment, shadowed)
        }
        MarchOutcome::Miss { .. } | MarchOutcome::ExceededBudget => {
            shade(ray, &RayHit::none(), environment, false)
        }
    };
    ray.energy.component_mul(&color)
}
