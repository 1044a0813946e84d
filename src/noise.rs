//! Whirl noise: cellular noise over a grid of chunks, one hashed feature point per chunk.
//!
//! All functions are pure functions of their inputs, the seed is always passed explicitly.

use bon::Builder;
use itertools::iproduct;
use nalgebra::{Unit, Vector3};
use serde::{Deserialize, Serialize};

use crate::geometry::{EPSILON, FloatType, WorldPoint, WorldVector};

/// Upper bound on the number of field evaluations `recursive_sample` does while stepping.
pub const MAX_SAMPLE_STEPS: u32 = 1024;

/// Number of bisection steps used to refine a crossing found by `recursive_sample`.
const REFINE_STEPS: u32 = 16;

const SQRT_3: FloatType = 1.732_050_8;

pub type ChunkIndex = Vector3<i32>;

/// Chunk indices are clamped to this magnitude, leaving room for neighbor offsets.
pub const MAX_CHUNK_INDEX: i32 = i32::MAX - 1;

/// Parameters of a single scale whirl noise field.
#[derive(Copy, Clone, Debug, PartialEq, Builder, Serialize, Deserialize)]
#[serde(default)]
pub struct WhirlNoise {
    /// Size of a single chunk of the grid.
    #[builder(default = WorldVector::repeat(10.0))]
    pub chunk_size: WorldVector,
    #[builder(default = 761579)]
    pub seed: u32,
    /// Amplitude of the field.
    #[builder(default = 1.0)]
    pub scaling: FloatType,
    /// How far from the chunk center the feature points may wander, 0 places them all
    /// in chunk centers, 1 anywhere in the chunk. Clamped to this range.
    #[builder(default = 1.0)]
    pub density: FloatType,
    /// Width of the blend between neighboring chunks in the smooth variant.
    /// Zero disables blending.
    #[builder(default = 0.5)]
    pub blending_strength: FloatType,
}

impl Default for WhirlNoise {
    fn default() -> Self {
        WhirlNoise::builder().build()
    }
}

/// Parameters of the multi scale composition.
#[derive(Copy, Clone, Debug, PartialEq, Builder, Serialize, Deserialize)]
#[serde(default)]
pub struct Octaves {
    /// Multiplier of the chunk size between consecutive octaves.
    #[builder(default = 0.5)]
    pub chunk_factor: FloatType,
    /// Multiplier of the scaling between consecutive octaves.
    #[builder(default = 0.5)]
    pub scaling_factor: FloatType,
    /// Multiplier of the density between consecutive octaves.
    #[builder(default = 1.0)]
    pub density_factor: FloatType,
    #[builder(default = 4)]
    pub iterations: u32,
}

impl Default for Octaves {
    fn default() -> Self {
        Octaves::builder().build()
    }
}

/// Integer hash (lowbias32).
fn hash(mut x: u32) -> u32 {
    x ^= x >> 16;
    x = x.wrapping_mul(0x7feb_352d);
    x ^= x >> 15;
    x = x.wrapping_mul(0x846c_a68b);
    x ^= x >> 16;
    x
}

/// Maps a hash to [0, 1).
fn hash_to_unit(x: u32) -> FloatType {
    (hash(x) >> 8) as FloatType / (1u32 << 24) as FloatType
}

fn chunk_hash(chunk: &ChunkIndex, seed: u32) -> u32 {
    chunk.iter().fold(hash(seed), |h, c| hash(h ^ (*c as u32)))
}

fn smoothstep(x: FloatType) -> FloatType {
    let t = x.clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

/// Smooth monotonic falloff, 1 at zero distance, 0 from 1 on.
fn falloff(normalized_distance: FloatType) -> FloatType {
    1.0 - smoothstep(normalized_distance)
}

/// Index of the chunk containing the point.
/// Points too far away for the index range share the outermost chunk.
pub fn chunk_of(coordinates: &WorldPoint, chunk_size: &WorldVector) -> ChunkIndex {
    coordinates
        .coords
        .component_div(chunk_size)
        .map(|x| (x.floor() as i32).clamp(-MAX_CHUNK_INDEX, MAX_CHUNK_INDEX))
}

/// Feature point of a chunk.
/// Always lies inside the chunk, reproducible for a given chunk, seed and density.
pub fn chunk_point(
    chunk: &ChunkIndex,
    chunk_size: &WorldVector,
    seed: u32,
    density: FloatType,
) -> WorldPoint {
    let h = chunk_hash(chunk, seed);
    let density = density.clamp(0.0, 1.0);
    let offset = WorldVector::from_fn(|i, _| {
        0.5 + (hash_to_unit(h.wrapping_add(i as u32)) - 0.5) * density
    });
    WorldPoint::from((chunk.cast::<FloatType>() + offset).component_mul(chunk_size))
}

/// Central difference gradient of a scalar field.
fn gradient(
    point: &WorldPoint,
    precision: FloatType,
    field: impl Fn(&WorldPoint) -> FloatType,
) -> WorldVector {
    WorldVector::from_fn(|i, _| {
        let mut offset = WorldVector::zeros();
        offset[i] = precision;
        (field(&(point + offset)) - field(&(point - offset))) / (2.0 * precision)
    })
}

fn normalize_or_up(v: WorldVector) -> Unit<WorldVector> {
    Unit::try_new(v, EPSILON).unwrap_or_else(WorldVector::y_axis)
}

impl WhirlNoise {
    /// Offset between the point and a chunk's feature point, in chunk units.
    fn relative_to_feature(&self, coordinates: &WorldPoint, chunk: &ChunkIndex) -> WorldVector {
        let feature = chunk_point(chunk, &self.chunk_size, self.seed, self.density);
        (coordinates - feature).component_div(&self.chunk_size)
    }

    /// Nearest cell noise, discontinuous across chunk boundaries.
    /// Falls off with the distance from the feature point of the containing chunk.
    pub fn noise(&self, coordinates: &WorldPoint) -> FloatType {
        let chunk = chunk_of(coordinates, &self.chunk_size);
        let relative = self.relative_to_feature(coordinates, &chunk);
        self.scaling * falloff(relative.norm() / SQRT_3)
    }

    /// Noise blended over the containing chunk and its 26 neighbors.
    /// Continuous everywhere as long as `blending_strength` is positive.
    pub fn smooth_noise(&self, coordinates: &WorldPoint) -> FloatType {
        if self.blending_strength <= 0.0 {
            return self.noise(coordinates);
        }
        let sharpness = 1.0 / self.blending_strength;
        let own = chunk_of(coordinates, &self.chunk_size);

        let (weighted, total) = iproduct!(-1..=1, -1..=1, -1..=1)
            .map(|(x, y, z)| {
                let relative = self.relative_to_feature(coordinates, &(own + ChunkIndex::new(x, y, z)));
                // Vanishes once the feature point is a whole chunk away on any axis,
                // that is before the chunk leaves the neighborhood.
                let weight = relative
                    .iter()
                    .map(|c| falloff(c.abs()))
                    .product::<FloatType>()
                    .powf(sharpness);
                (weight * falloff(relative.norm() / SQRT_3), weight)
            })
            .fold((0.0, 0.0), |(a, b), (c, d)| (a + c, b + d));

        if total > 0.0 {
            self.scaling * weighted / total
        } else {
            self.noise(coordinates)
        }
    }

    /// Normalized gradient of the nearest cell noise.
    pub fn normal(&self, coordinates: &WorldPoint, precision: FloatType) -> Unit<WorldVector> {
        normalize_or_up(gradient(coordinates, precision, |p| self.noise(p)))
    }

    /// Normalized gradient of the smooth noise.
    pub fn smooth_normal(&self, coordinates: &WorldPoint, precision: FloatType) -> Unit<WorldVector> {
        normalize_or_up(gradient(coordinates, precision, |p| self.smooth_noise(p)))
    }

    /// Parameters of the next finer octave.
    fn next_octave(&self, octaves: &Octaves) -> WhirlNoise {
        WhirlNoise {
            chunk_size: self.chunk_size * octaves.chunk_factor,
            seed: self.seed.wrapping_add(1),
            scaling: self.scaling * octaves.scaling_factor,
            density: self.density * octaves.density_factor,
            blending_strength: self.blending_strength,
        }
    }

    /// Octaves starting from `first`, the octave zero is `self`.
    fn layers(&self, octaves: &Octaves, first: u32) -> impl Iterator<Item = WhirlNoise> {
        let octaves = *octaves;
        std::iter::successors(Some(*self), move |layer| Some(layer.next_octave(&octaves)))
            .take(octaves.iterations as usize)
            .skip(first as usize)
    }

    /// Sum of nearest cell noise over all octaves.
    /// With a single iteration this is exactly `noise`.
    pub fn recursive_noise(&self, coordinates: &WorldPoint, octaves: &Octaves) -> FloatType {
        self.layers(octaves, 0)
            .map(|layer| layer.noise(coordinates))
            .sum()
    }

    /// Sum of smooth noise over all octaves.
    pub fn recursive_smooth_noise(&self, coordinates: &WorldPoint, octaves: &Octaves) -> FloatType {
        self.recursive_smooth_noise_from(coordinates, octaves, 0)
    }

    fn recursive_smooth_noise_from(
        &self,
        coordinates: &WorldPoint,
        octaves: &Octaves,
        first: u32,
    ) -> FloatType {
        self.layers(octaves, first)
            .map(|layer| layer.smooth_noise(coordinates))
            .sum()
    }

    /// Normalized gradient of the multi scale smooth noise.
    pub fn recursive_normal(
        &self,
        coordinates: &WorldPoint,
        octaves: &Octaves,
        precision: FloatType,
    ) -> Unit<WorldVector> {
        normalize_or_up(gradient(coordinates, precision, |p| {
            self.recursive_smooth_noise(p, octaves)
        }))
    }

    /// Walks along the ray and finds where the multi scale smooth noise (octaves from
    /// `iteration` on) first reaches `threshold`.
    /// Returns None if there is no crossing within `length`, returns the origin if it
    /// already is above the threshold.
    pub fn recursive_sample(
        &self,
        origin: &WorldPoint,
        direction: &Unit<WorldVector>,
        length: FloatType,
        iteration: u32,
        octaves: &Octaves,
        threshold: FloatType,
    ) -> Option<WorldPoint> {
        if !(length > 0.0 && length.is_finite()) || iteration >= octaves.iterations {
            return None;
        }

        let field = |t: FloatType| {
            self.recursive_smooth_noise_from(&(origin + direction.as_ref() * t), octaves, iteration)
        };
        if field(0.0) >= threshold {
            return Some(*origin);
        }

        // Step a quarter of the finest chunk, never more than MAX_SAMPLE_STEPS times
        let finest_chunk = self
            .layers(octaves, 0)
            .last()
            .map_or(self.chunk_size.min(), |layer| layer.chunk_size.min());
        let steps = (length / (0.25 * finest_chunk.abs().max(EPSILON)))
            .ceil()
            .clamp(1.0, MAX_SAMPLE_STEPS as FloatType) as u32;
        let step = length / steps as FloatType;

        let (mut below, mut above) = (1..=steps)
            .map(|i| ((i - 1) as FloatType * step, i as FloatType * step))
            .find(|(_, t)| field(*t) >= threshold)?;

        for _ in 0..REFINE_STEPS {
            let middle = 0.5 * (below + above);
            if field(middle) >= threshold {
                above = middle;
            } else {
                below = middle;
            }
        }

        Some(origin + direction.as_ref() * above)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::geometry::test::{UnitWorldVectorWrapper, WorldPointWrapper};
    use assert2::{assert, let_assert};
    use test_strategy::proptest;

    fn noise() -> WhirlNoise {
        WhirlNoise::builder()
            .chunk_size(WorldVector::new(4.0, 5.0, 6.0))
            .seed(1234)
            .build()
    }

    #[proptest]
    fn noise_is_reproducible(p: WorldPointWrapper, seed: u32) {
        let a = WhirlNoise { seed, ..noise() };
        let b = WhirlNoise { seed, ..noise() };
        assert!(a.noise(&p).to_bits() == b.noise(&p).to_bits());
        assert!(a.smooth_noise(&p).to_bits() == b.smooth_noise(&p).to_bits());
    }

    #[proptest]
    fn chunk_point_lies_in_its_chunk(
        #[strategy(-100i32..100)] x: i32,
        #[strategy(-100i32..100)] y: i32,
        #[strategy(-100i32..100)] z: i32,
        seed: u32,
        #[strategy(0.0f32..=0.9)] density: f32,
    ) {
        let chunk = ChunkIndex::new(x, y, z);
        let size = WorldVector::new(2.0, 3.0, 4.0);
        let point = chunk_point(&chunk, &size, seed, density);
        assert!(chunk_of(&point, &size) == chunk);
    }

    #[test]
    fn zero_density_centers_feature_points() {
        let point = chunk_point(&ChunkIndex::new(1, -2, 3), &WorldVector::repeat(2.0), 7, 0.0);
        assert!(point == WorldPoint::new(3.0, -3.0, 7.0));
    }

    #[test]
    fn seed_changes_feature_points() {
        let chunk = ChunkIndex::new(3, 4, 5);
        let size = WorldVector::repeat(1.0);
        assert!(chunk_point(&chunk, &size, 1, 1.0) != chunk_point(&chunk, &size, 2, 1.0));
    }

    #[proptest]
    fn noise_is_bounded_by_scaling(p: WorldPointWrapper) {
        let n = noise();
        let value = n.noise(&p);
        let smooth = n.smooth_noise(&p);
        assert!((0.0..=n.scaling).contains(&value));
        assert!((0.0..=n.scaling + 1e-5).contains(&smooth));
    }

    #[proptest]
    fn smooth_noise_is_continuous_across_chunk_boundaries(
        #[strategy(0usize..3)] axis: usize,
        #[strategy(-50i32..50)] boundary: i32,
        #[strategy(-100.0f32..100.0)] u: f32,
        #[strategy(-100.0f32..100.0)] v: f32,
    ) {
        let n = noise();
        let mut point = WorldPoint::new(u, v, u - v);
        point[axis] = boundary as f32 * n.chunk_size[axis];
        let mut offset = WorldVector::zeros();
        offset[axis] = 1e-4;

        let before = point - offset;
        let after = point + offset;
        assert!(chunk_of(&before, &n.chunk_size)[axis] + 1 == chunk_of(&after, &n.chunk_size)[axis]);
        assert!((n.smooth_noise(&before) - n.smooth_noise(&after)).abs() < 1e-2);
    }

    #[test]
    fn far_points_share_the_outermost_chunk() {
        let size = WorldVector::repeat(1e-3);
        let far = WorldPoint::new(1e12, -1e12, 0.0);
        assert!(chunk_of(&far, &size) == ChunkIndex::new(MAX_CHUNK_INDEX, -MAX_CHUNK_INDEX, 0));

        let n = WhirlNoise {
            chunk_size: size,
            ..noise()
        };
        assert!(n.smooth_noise(&far).is_finite());
    }

    #[test]
    fn deep_octaves_stay_finite() {
        let octaves = Octaves::builder().iterations(40).build();
        let n = WhirlNoise::default();
        let p = WorldPoint::new(3.0, 1.0, 2.0);
        assert!(n.recursive_noise(&p, &octaves).is_finite());
        assert!(n.recursive_smooth_noise(&p, &octaves).is_finite());
    }

    #[test]
    fn raw_noise_jumps_across_some_boundary() {
        let n = noise();
        let jump = (-20..20).any(|i| {
            let x = i as f32 * n.chunk_size.x;
            let before = WorldPoint::new(x - 1e-4, 1.0, 1.0);
            let after = WorldPoint::new(x + 1e-4, 1.0, 1.0);
            (n.noise(&before) - n.noise(&after)).abs() > 1e-2
        });
        assert!(jump);
    }

    #[test]
    fn zero_blending_is_raw_noise() {
        let n = WhirlNoise {
            blending_strength: 0.0,
            ..noise()
        };
        let p = WorldPoint::new(1.5, -7.25, 3.0);
        assert!(n.smooth_noise(&p) == n.noise(&p));
    }

    #[proptest]
    fn single_iteration_is_plain_noise(p: WorldPointWrapper) {
        let octaves = Octaves::builder().iterations(1).chunk_factor(0.3).scaling_factor(0.1).build();
        let n = noise();
        assert!(n.recursive_noise(&p, &octaves).to_bits() == n.noise(&p).to_bits());
    }

    #[test]
    fn zero_iterations_is_zero() {
        let octaves = Octaves::builder().iterations(0).build();
        assert!(noise().recursive_noise(&WorldPoint::new(1.0, 2.0, 3.0), &octaves) == 0.0);
    }

    #[test]
    fn octaves_scale_parameters() {
        let octaves = Octaves::builder()
            .chunk_factor(0.5)
            .scaling_factor(0.25)
            .density_factor(0.5)
            .iterations(3)
            .build();
        let layers: Vec<_> = noise().layers(&octaves, 0).collect();
        assert!(layers.len() == 3);
        assert!(layers[2].chunk_size == noise().chunk_size * 0.25);
        assert!(layers[2].scaling == noise().scaling * 0.0625);
        assert!(layers[2].density == noise().density * 0.25);
        assert!(layers[1].seed != layers[0].seed);
    }

    #[test]
    fn normal_points_toward_feature_point() {
        let n = WhirlNoise {
            density: 0.5,
            ..noise()
        };
        let chunk = ChunkIndex::new(2, 2, 2);
        let feature = chunk_point(&chunk, &n.chunk_size, n.seed, n.density);
        let p = feature + WorldVector::new(0.3, 0.1, -0.2);
        let normal = n.normal(&p, 1e-3);
        // The field grows toward the feature point
        assert!(normal.dot(&(feature - p)) > 0.0);
    }

    #[proptest]
    fn smooth_normal_is_unit(p: WorldPointWrapper) {
        let normal = noise().smooth_normal(&p, 1e-2);
        assert!((normal.norm() - 1.0).abs() < 1e-4);
    }

    #[test]
    fn sample_finds_crossing_toward_chunk_center() {
        // Zero density puts feature points in chunk centers, independent of the seed
        let n = WhirlNoise {
            density: 0.0,
            ..noise()
        };
        let octaves = Octaves::builder().iterations(1).build();
        // On the boundary between the chunk centers (2, 2.5, -3) and (2, 2.5, 3)
        let origin = WorldPoint::new(2.0, 2.5, 0.0);
        let direction = WorldVector::z_axis();
        let threshold = 0.9;
        assert!(n.recursive_smooth_noise(&origin, &octaves) < threshold);

        let_assert!(
            Some(crossing) = n.recursive_sample(&origin, &direction, 10.0, 0, &octaves, threshold)
        );
        let value = n.recursive_smooth_noise(&crossing, &octaves);
        assert!((value - threshold).abs() < 1e-3);
        assert!(crossing.z > 0.0 && crossing.z < 3.0);
    }

    #[test]
    fn sample_starting_inside_returns_origin() {
        let n = WhirlNoise {
            density: 0.0,
            ..noise()
        };
        let octaves = Octaves::builder().iterations(1).build();
        let center = WorldPoint::new(2.0, 2.5, 3.0);
        let result = n.recursive_sample(&center, &WorldVector::x_axis(), 5.0, 0, &octaves, 0.5);
        assert!(result == Some(center));
    }

    #[proptest]
    fn sample_reports_no_crossing_above_range(
        origin: WorldPointWrapper,
        direction: UnitWorldVectorWrapper,
    ) {
        let octaves = Octaves::builder().iterations(2).build();
        let n = noise();
        let result = n.recursive_sample(&origin, &direction, 30.0, 0, &octaves, 10.0);
        assert!(result.is_none());
    }

    #[test]
    fn sample_from_later_iteration_skips_coarse_octaves() {
        let n = WhirlNoise {
            density: 0.0,
            ..noise()
        };
        let octaves = Octaves::builder().iterations(2).scaling_factor(1.0).build();
        let fine = n.next_octave(&octaves);
        // Between the fine chunk centers (1, 1.25, -1.5) and (1, 1.25, 1.5)
        let origin = WorldPoint::new(1.0, 1.25, 0.0);
        let threshold = 0.9;

        let_assert!(
            Some(crossing) = n.recursive_sample(&origin, &WorldVector::z_axis(), 10.0, 1, &octaves, threshold)
        );
        assert!((fine.smooth_noise(&crossing) - threshold).abs() < 1e-3);
        assert!(crossing.z > 0.0 && crossing.z < 1.5);
        // Starting past the last octave there is nothing to sample
        assert!(
            n.recursive_sample(&origin, &WorldVector::z_axis(), 10.0, 2, &octaves, threshold)
                .is_none()
        );
    }

    #[test]
    fn sample_rejects_infinite_length() {
        let n = noise();
        let octaves = Octaves::default();
        let result = n.recursive_sample(
            &WorldPoint::origin(),
            &WorldVector::x_axis(),
            FloatType::INFINITY,
            0,
            &octaves,
            0.0,
        );
        assert!(result.is_none());
    }
}
