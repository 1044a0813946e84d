use nalgebra::Unit;
use ordered_float::OrderedFloat;

use crate::geometry::{
    EPSILON, FloatType, LocalRay, Ray, RayHit, RayIntersectionExt, WorldBox, WorldPoint, WorldVector,
};

use super::{NoiseVolume, Object, Shape};

const SIN_60: FloatType = 0.866_025_4;

/// Iteration cap for sphere tracing the torus inside its bounding sphere.
const TORUS_MAX_STEPS: usize = 256;
const TORUS_PRECISION: FloatType = 1e-4;

/// Gradient step of the noise volume normal, relative to the base chunk size.
const VOLUME_NORMAL_PRECISION: FloatType = 1e-2;

impl Object {
    /// Analytic intersection of the ray with the object.
    /// Only hits in front of the ray origin are reported.
    pub fn intersect(&self, ray: &Ray) -> Option<RayHit> {
        let local_ray = self.transform.to_local_ray(ray);
        let (t, local_normal) = self.shape.intersect(&local_ray)?;
        if !(t > 0.0 && t.is_finite()) {
            return None;
        }

        Some(RayHit {
            position: ray.point_at(t),
            distance: t,
            normal: self.transform.to_world_normal(&local_normal),
            material: self.material,
        })
    }

    /// Signed distance from the point to the object surface, negative inside.
    pub fn distance(&self, point: &WorldPoint) -> FloatType {
        let local = self.transform.to_local_point(point);
        self.shape.distance(&local) * self.transform.distance_scale()
    }
}

impl NoiseVolume {
    /// First point along the ray where the noise reaches the threshold, no further than
    /// `max_distance` or the volume length.
    pub fn intersect(&self, ray: &Ray, max_distance: FloatType) -> Option<RayHit> {
        let length = self.length.min(max_distance);
        let position = self.noise.recursive_sample(
            &ray.origin,
            &ray.direction,
            length,
            0,
            &self.octaves,
            self.threshold,
        )?;

        let precision = VOLUME_NORMAL_PRECISION * self.noise.chunk_size.min().abs();
        // The field grows toward the inside
        let inward = self.noise.recursive_normal(&position, &self.octaves, precision);
        Some(RayHit {
            position,
            distance: (position - ray.origin).norm(),
            normal: Unit::new_unchecked(-inward.into_inner()),
            material: self.material,
        })
    }
}

impl Shape {
    /// Intersection in canonical space.
    /// Returns distance along the ray and an unnormalized outward normal.
    pub fn intersect(&self, ray: &LocalRay) -> Option<(FloatType, WorldVector)> {
        match *self {
            Shape::GroundPlane => {
                if ray.direction.y.abs() < EPSILON {
                    return None;
                }
                Some((-ray.origin.y / ray.direction.y, WorldVector::y()))
            }
            Shape::Sphere { radius } => intersect_sphere(ray, radius),
            Shape::Box { half_extents } => intersect_box(ray, &half_extents),
            Shape::Triangle { vertices } => {
                let t = vertices.intersect(ray)?;
                let normal = vertices.normal();
                // Two sided, face the ray
                if normal.dot(&ray.direction) > 0.0 {
                    Some((t, -normal))
                } else {
                    Some((t, normal))
                }
            }
            Shape::Torus {
                major_radius,
                minor_radius,
            } => intersect_torus(ray, major_radius, minor_radius),
            Shape::Prism {
                radius,
                half_length,
            } => intersect_convex(ray, &prism_planes(radius, half_length)),
            Shape::Cylinder {
                radius,
                half_height,
            } => intersect_cylinder(ray, radius, half_height),
        }
    }

    /// Signed distance in canonical space.
    pub fn distance(&self, p: &WorldPoint) -> FloatType {
        match *self {
            Shape::GroundPlane => p.y,
            Shape::Sphere { radius } => p.coords.norm() - radius,
            Shape::Box { half_extents } => {
                let q = p.coords.abs() - half_extents;
                q.sup(&WorldVector::zeros()).norm() + q.max().min(0.0)
            }
            Shape::Triangle { vertices } => vertices.distance(p),
            Shape::Torus {
                major_radius,
                minor_radius,
            } => {
                let ring = p.xz().coords.norm() - major_radius;
                (ring * ring + p.y * p.y).sqrt() - minor_radius
            }
            Shape::Prism {
                radius,
                half_length,
            } => prism_planes(radius, half_length)
                .iter()
                .map(|(normal, offset)| normal.dot(&p.coords) - offset)
                .fold(FloatType::NEG_INFINITY, FloatType::max),
            Shape::Cylinder {
                radius,
                half_height,
            } => {
                let dx = p.xz().coords.norm() - radius;
                let dy = p.y.abs() - half_height;
                dx.max(dy).min(0.0) + (dx.max(0.0).powi(2) + dy.max(0.0).powi(2)).sqrt()
            }
        }
    }
}

fn intersect_sphere(ray: &LocalRay, radius: FloatType) -> Option<(FloatType, WorldVector)> {
    let oc = ray.origin.coords;
    let a = ray.direction.norm_squared();
    let b = oc.dot(&ray.direction);
    let c = oc.norm_squared() - radius * radius;
    let discriminant = b * b - a * c;

    if discriminant < 0.0 || a < EPSILON {
        return None;
    }

    let sqrt_disc = discriminant.sqrt();
    let t1 = (-b - sqrt_disc) / a;
    let t2 = (-b + sqrt_disc) / a;
    let t = if t1 > 0.0 {
        t1
    } else if t2 > 0.0 {
        t2
    } else {
        return None;
    };

    Some((t, ray.point_at(t).coords))
}

fn intersect_box(ray: &LocalRay, half_extents: &WorldVector) -> Option<(FloatType, WorldVector)> {
    let (t_min, t_max) = WorldBox::symmetric(half_extents).intersect(ray);
    if t_min > t_max || t_max <= 0.0 {
        return None;
    }
    let t = if t_min > 0.0 { t_min } else { t_max };

    // The face is on the axis where the point is relatively furthest out
    let relative = ray.point_at(t).coords.component_div(half_extents);
    let axis = relative.iamax();
    let mut normal = WorldVector::zeros();
    normal[axis] = relative[axis].signum();

    Some((t, normal))
}

fn intersect_torus(
    ray: &LocalRay,
    major_radius: FloatType,
    minor_radius: FloatType,
) -> Option<(FloatType, WorldVector)> {
    let scale = ray.direction.norm();
    if scale < EPSILON {
        return None;
    }
    let direction = ray.direction / scale;
    let shape = Shape::Torus {
        major_radius,
        minor_radius,
    };

    // Limit the march to the bounding sphere
    let bound = major_radius + minor_radius;
    let b = ray.origin.coords.dot(&direction);
    let c = ray.origin.coords.norm_squared() - bound * bound;
    let discriminant = b * b - c;
    if discriminant < 0.0 {
        return None;
    }
    let exit = -b + discriminant.sqrt();
    if exit <= 0.0 {
        return None;
    }

    let mut s = (-b - discriminant.sqrt()).max(0.0);
    for _ in 0..TORUS_MAX_STEPS {
        let p = ray.origin + direction * s;
        let d = shape.distance(&p).abs();
        if d < TORUS_PRECISION {
            return Some((s / scale, torus_normal(&p, major_radius)));
        }
        s += d;
        if s > exit {
            return None;
        }
    }
    None
}

fn torus_normal(p: &WorldPoint, major_radius: FloatType) -> WorldVector {
    let ring = p.xz().coords.norm();
    if ring < EPSILON {
        return WorldVector::new(0.0, p.y, 0.0);
    }
    let factor = 1.0 - major_radius / ring;
    WorldVector::new(p.x * factor, p.y, p.z * factor)
}

fn intersect_cylinder(
    ray: &LocalRay,
    radius: FloatType,
    half_height: FloatType,
) -> Option<(FloatType, WorldVector)> {
    let (o, d) = (ray.origin, ray.direction);
    let mut candidates: Vec<(FloatType, WorldVector)> = Vec::with_capacity(4);

    // Mantle
    let a = d.x * d.x + d.z * d.z;
    if a > EPSILON {
        let b = o.x * d.x + o.z * d.z;
        let c = o.x * o.x + o.z * o.z - radius * radius;
        let discriminant = b * b - a * c;
        if discriminant >= 0.0 {
            let sqrt_disc = discriminant.sqrt();
            for t in [(-b - sqrt_disc) / a, (-b + sqrt_disc) / a] {
                let p = ray.point_at(t);
                if p.y.abs() <= half_height {
                    candidates.push((t, WorldVector::new(p.x, 0.0, p.z)));
                }
            }
        }
    }

    // Caps
    if d.y.abs() > EPSILON {
        for side in [-1.0, 1.0] {
            let t = (side * half_height - o.y) / d.y;
            let p = ray.point_at(t);
            if p.x * p.x + p.z * p.z <= radius * radius {
                candidates.push((t, WorldVector::new(0.0, side, 0.0)));
            }
        }
    }

    candidates
        .into_iter()
        .filter(|(t, _)| *t > 0.0)
        .min_by_key(|(t, _)| OrderedFloat(*t))
}

/// Bounding planes (outward normal, offset) of the triangular prism.
fn prism_planes(radius: FloatType, half_length: FloatType) -> [(WorldVector, FloatType); 5] {
    let inradius = 0.5 * radius;
    [
        (WorldVector::new(SIN_60, 0.5, 0.0), inradius),
        (WorldVector::new(-SIN_60, 0.5, 0.0), inradius),
        (WorldVector::new(0.0, -1.0, 0.0), inradius),
        (WorldVector::z(), half_length),
        (-WorldVector::z(), half_length),
    ]
}

/// Intersection with the convex region `normal . p <= offset` for all planes.
fn intersect_convex(
    ray: &LocalRay,
    planes: &[(WorldVector, FloatType)],
) -> Option<(FloatType, WorldVector)> {
    let mut near = (FloatType::NEG_INFINITY, WorldVector::zeros());
    let mut far = (FloatType::INFINITY, WorldVector::zeros());

    for (normal, offset) in planes {
        let denominator = normal.dot(&ray.direction);
        let numerator = offset - normal.dot(&ray.origin.coords);
        if denominator.abs() < EPSILON {
            if numerator < 0.0 {
                return None; // Parallel and outside
            }
            continue;
        }
        let t = numerator / denominator;
        if denominator < 0.0 {
            if t > near.0 {
                near = (t, *normal);
            }
        } else if t < far.0 {
            far = (t, *normal);
        }
    }

    if near.0 > far.0 || far.0 <= 0.0 {
        None
    } else if near.0 > 0.0 {
        Some(near)
    } else {
        Some(far)
    }
}
