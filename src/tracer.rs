//! Analytic ray tracing with mirror bounces.

use serde::{Deserialize, Serialize};

use crate::geometry::{Color, FloatType, Ray, RayHit, SURFACE_OFFSET};
use crate::scene::{Object, Scene};
use crate::shading::{Environment, shade};

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TraceSettings {
    /// Maximum number of surfaces (or the sky) a camera ray visits.
    pub bounces: u32,
    /// Stop bouncing once every energy component drops below this.
    pub min_energy: FloatType,
    pub shadows: bool,
}

impl Default for TraceSettings {
    fn default() -> Self {
        TraceSettings {
            bounces: 8,
            min_energy: 1e-3,
            shadows: true,
        }
    }
}

/// Closest hit of the ray among the ground plane, the objects and the noise volume.
/// Returns `RayHit::none()` if nothing is hit.
pub fn trace(ray: &Ray, scene: &Scene) -> RayHit {
    let ground = scene.ground_plane.then(Object::ground_plane);
    let best = ground
        .iter()
        .chain(scene.objects.iter())
        .fold(RayHit::none(), |best, object| best.closest(object.intersect(ray)));

    match &scene.volume {
        Some(volume) => best.closest(volume.intersect(ray, best.distance)),
        None => best,
    }
}

/// Whether anything blocks the light from reaching the hit.
pub fn in_shadow(scene: &Scene, hit: &RayHit, environment: &Environment) -> bool {
    let origin = hit.position + hit.normal.as_ref() * SURFACE_OFFSET;
    let shadow_ray = Ray::new(origin, -environment.light.direction.as_ref());
    trace(&shadow_ray, scene).is_hit()
}

/// One visited surface (or the sky) along the bounce path.
#[derive(Copy, Clone, Debug)]
pub struct Bounce {
    /// `RayHit::none()` for the final sky sample.
    pub hit: RayHit,
    /// Energy of the ray when it arrived.
    pub energy: Color,
    /// Color added to the ray result by this bounce.
    pub contribution: Color,
}

/// Bounce sequence of a single camera ray, at most `TraceSettings::bounces` long.
pub struct Bounces<'a> {
    scene: &'a Scene,
    environment: &'a Environment,
    settings: TraceSettings,
    ray: Ray,
    remaining: u32,
    finished: bool,
}

impl<'a> Bounces<'a> {
    pub fn new(
        ray: Ray,
        scene: &'a Scene,
        environment: &'a Environment,
        settings: TraceSettings,
    ) -> Bounces<'a> {
        Bounces {
            scene,
            environment,
            settings,
            ray,
            remaining: settings.bounces,
            finished: false,
        }
    }

    /// The ray in its current state, its result holds the color gathered so far.
    pub fn ray(&self) -> &Ray {
        &self.ray
    }
}

impl Iterator for Bounces<'_> {
    type Item = Bounce;

    fn next(&mut self) -> Option<Bounce> {
        if self.finished || self.remaining == 0 || self.ray.energy.max() < self.settings.min_energy {
            self.finished = true;
            return None;
        }
        self.remaining -= 1;

        let hit = trace(&self.ray, self.scene);
        let shadowed =
            self.settings.shadows && hit.is_hit() && in_shadow(self.scene, &hit, self.environment);
        let color = shade(&self.ray, &hit, self.environment, shadowed);

        let energy = self.ray.energy;
        let contribution = energy.component_mul(&color);
        self.ray.result += contribution;

        if hit.is_hit() {
            let reflectance = hit.material.specular.map(|s| s.clamp(0.0, 1.0));
            self.ray.energy = energy.component_mul(&reflectance);
            self.ray.reflect(&hit);
        } else {
            self.finished = true;
        }

        Some(Bounce {
            hit,
            energy,
            contribution,
        })
    }
}

/// Color seen along the ray.
pub fn trace_color(
    ray: Ray,
    scene: &Scene,
    environment: &Environment,
    settings: &TraceSettings,
) -> Color {
    let mut bounces = Bounces::new(ray, scene, environment, *settings);
    bounces.by_ref().for_each(drop);
    bounces.ray().result
}
