use std::fmt::Display;

use crate::marcher::{MarchOutcome, MarchSettings};

/// Running min / max / mean of a stream of counts.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Stats {
    pub count: usize,
    pub min: u32,
    pub max: u32,
    pub avg: f32,
}

impl Stats {
    pub fn add_sample(&mut self, value: u32) {
        self.count += 1;
        self.min = self.min.min(value);
        self.max = self.max.max(value);
        self.avg += (value as f32 - self.avg) / (self.count as f32);
    }

    pub fn merge(&self, other: &Self) -> Self {
        let count = self.count + other.count;
        Stats {
            count,
            min: self.min.min(other.min),
            max: self.max.max(other.max),
            avg: if count > 0 {
                (self.avg * self.count as f32 + other.avg * other.count as f32) / count as f32
            } else {
                0.0
            },
        }
    }
}

impl Default for Stats {
    fn default() -> Self {
        Stats {
            count: 0,
            min: u32::MAX,
            max: 0,
            avg: 0.0,
        }
    }
}

impl Display for Stats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            return write!(f, "no samples");
        }
        write!(f, "{} - {}; avg {:.1}", self.min, self.max, self.avg)
    }
}

/// Outcome counts and step statistics of a batch of marches.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct MarchStats {
    pub steps: Stats,
    pub hits: usize,
    pub misses: usize,
    pub exceeded_budget: usize,
}

impl MarchStats {
    pub fn record(&mut self, outcome: &MarchOutcome, settings: &MarchSettings) {
        self.steps.add_sample(outcome.steps(settings));
        match outcome {
            MarchOutcome::Hit { .. } => self.hits += 1,
            MarchOutcome::Miss { .. } => self.misses += 1,
            MarchOutcome::ExceededBudget => self.exceeded_budget += 1,
        }
    }

    pub fn merge(&self, other: &Self) -> Self {
        MarchStats {
            steps: self.steps.merge(&other.steps),
            hits: self.hits + other.hits,
            misses: self.misses + other.misses,
            exceeded_budget: self.exceeded_budget + other.exceeded_budget,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.steps.count == 0
    }
}

impl Display for MarchStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} hits, {} misses, {} over budget; steps {}",
            self.hits, self.misses, self.exceeded_budget, self.steps
        )
    }
}
