//! Bounded electrode set and the inverse-distance-weighted activity field.

use std::collections::VecDeque;

use log::debug;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// At most this many live electrodes; the oldest ages out first.
pub const ELECTRODE_CAPACITY: usize = 8;

/// Field value reported when no electrode has been placed yet.
pub const NEUTRAL_VALUE: f32 = 0.5;

/// Squared-distance floor so weights never overflow to infinity.
const DISTANCE_SQ_FLOOR: f32 = 1e-9;

#[derive(Clone, Debug)]
pub struct Electrode {
    pub id: u32,
    pub position: [f32; 3],
    pub value: f32,
}

/// How `tick()` animates electrode values.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "policy")]
pub enum ValuePolicy {
    /// Redraw each value from the configured pool every tick.
    Resample { pool: Vec<f32> },
    /// Bounded random walk from the previous value.
    RandomWalk { step: f32 },
}

impl Default for ValuePolicy {
    fn default() -> Self {
        ValuePolicy::Resample { pool: vec![0.0, 0.5, 1.0] }
    }
}

/// Bounded `(tick, value)` sequence backing the per-electrode chart.
#[derive(Clone, Debug)]
pub struct SampleHistory {
    samples: VecDeque<(u64, f32)>,
    capacity: usize,
}

impl SampleHistory {
    fn new(capacity: usize) -> Self {
        Self { samples: VecDeque::with_capacity(capacity), capacity }
    }

    fn push(&mut self, tick: u64, value: f32) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back((tick, value));
    }

    pub fn samples(&self) -> impl Iterator<Item = (u64, f32)> + '_ {
        self.samples.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Outcome of placing an electrode; `evicted` carries the id whose chart the
/// caller should clear.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ElectrodePlacement {
    pub id: u32,
    pub evicted: Option<u32>,
}

/// Maintains the electrode ring and computes the Shepard-interpolated field
/// over mesh vertices (inverse squared distance, `p = 2`).
pub struct InterpolationEngine {
    electrodes: VecDeque<Electrode>,
    histories: Vec<(u32, SampleHistory)>,
    policy: ValuePolicy,
    history_capacity: usize,
    tick_count: u64,
    next_id: u32,
    rng: StdRng,
}

impl InterpolationEngine {
    pub fn new(policy: ValuePolicy, history_capacity: usize) -> Self {
        Self::with_seed(policy, history_capacity, rand::random())
    }

    pub fn with_seed(policy: ValuePolicy, history_capacity: usize, seed: u64) -> Self {
        Self {
            electrodes: VecDeque::with_capacity(ELECTRODE_CAPACITY),
            histories: Vec::new(),
            policy,
            history_capacity: history_capacity.max(1),
            tick_count: 0,
            next_id: 0,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn electrodes(&self) -> impl Iterator<Item = &Electrode> {
        self.electrodes.iter()
    }

    pub fn len(&self) -> usize {
        self.electrodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.electrodes.is_empty()
    }

    pub fn history(&self, id: u32) -> Option<&SampleHistory> {
        self.histories
            .iter()
            .find(|(hid, _)| *hid == id)
            .map(|(_, h)| h)
    }

    pub fn histories(&self) -> impl Iterator<Item = (u32, &SampleHistory)> {
        self.histories.iter().map(|(id, h)| (*id, h))
    }

    /// Places a new electrode with a freshly drawn value. Strict FIFO: once
    /// the ring is full the earliest-inserted electrode ages out regardless of
    /// later activity.
    pub fn add_electrode(&mut self, position: [f32; 3]) -> ElectrodePlacement {
        let id = self.next_id;
        self.next_id += 1;
        let value = self.initial_value();
        debug!("add_electrode #{id} at {position:?} value {value:.2}");

        let evicted = if self.electrodes.len() == ELECTRODE_CAPACITY {
            let oldest = self.electrodes.pop_front().map(|e| e.id);
            if let Some(old) = oldest {
                self.histories.retain(|(hid, _)| *hid != old);
            }
            oldest
        } else {
            None
        };

        self.electrodes.push_back(Electrode { id, position, value });
        let mut history = SampleHistory::new(self.history_capacity);
        history.push(self.tick_count, value);
        self.histories.push((id, history));

        ElectrodePlacement { id, evicted }
    }

    /// One animation step: every electrode gets a new value per the configured
    /// policy and its history is extended.
    pub fn tick(&mut self) {
        self.tick_count += 1;
        for i in 0..self.electrodes.len() {
            let next = match &self.policy {
                ValuePolicy::Resample { pool } if !pool.is_empty() => {
                    pool[self.rng.gen_range(0..pool.len())]
                }
                ValuePolicy::Resample { .. } => self.rng.gen_range(0.0..=1.0),
                ValuePolicy::RandomWalk { step } => {
                    let delta = self.rng.gen_range(-step.abs()..=step.abs());
                    (self.electrodes[i].value + delta).clamp(0.0, 1.0)
                }
            };
            self.electrodes[i].value = next;
            let id = self.electrodes[i].id;
            if let Some((_, history)) = self.histories.iter_mut().find(|(hid, _)| *hid == id) {
                history.push(self.tick_count, next);
            }
        }
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    pub fn reset(&mut self) {
        self.electrodes.clear();
        self.histories.clear();
        self.tick_count = 0;
    }

    /// Shepard estimate at `vertex`. A vertex coinciding with an electrode
    /// takes that electrode's value exactly; an empty set yields the neutral
    /// constant.
    pub fn interpolate(&self, vertex: [f32; 3]) -> f32 {
        if self.electrodes.is_empty() {
            return NEUTRAL_VALUE;
        }
        let mut weight_sum = 0.0f64;
        let mut value_sum = 0.0f64;
        for electrode in &self.electrodes {
            let dist_sq = distance_sq(vertex, electrode.position);
            if dist_sq < DISTANCE_SQ_FLOOR {
                return electrode.value;
            }
            let weight = 1.0 / dist_sq as f64;
            weight_sum += weight;
            value_sum += weight * electrode.value as f64;
        }
        (value_sum / weight_sum) as f32
    }

    /// Interpolated field over a vertex array, one value per vertex.
    pub fn field(&self, vertices: &[[f32; 3]]) -> Vec<f32> {
        vertices.iter().map(|&v| self.interpolate(v)).collect()
    }

    fn initial_value(&mut self) -> f32 {
        match &self.policy {
            ValuePolicy::Resample { pool } if !pool.is_empty() => {
                pool[self.rng.gen_range(0..pool.len())]
            }
            _ => self.rng.gen_range(0.0..=1.0),
        }
    }
}

fn distance_sq(a: [f32; 3], b: [f32; 3]) -> f32 {
    let dx = a[0] - b[0];
    let dy = a[1] - b[1];
    let dz = a[2] - b[2];
    dx * dx + dy * dy + dz * dz
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> InterpolationEngine {
        InterpolationEngine::with_seed(ValuePolicy::default(), 16, 7)
    }

    #[test]
    fn ninth_electrode_evicts_the_first() {
        let mut e = engine();
        let mut ids = Vec::new();
        for i in 0..9 {
            let placement = e.add_electrode([i as f32, 0.0, 0.0]);
            ids.push(placement.id);
            if i < 8 {
                assert_eq!(placement.evicted, None);
            } else {
                assert_eq!(placement.evicted, Some(ids[0]));
            }
        }
        let live: Vec<u32> = e.electrodes().map(|el| el.id).collect();
        assert_eq!(live, ids[1..].to_vec());
        assert!(e.history(ids[0]).is_none());
    }

    #[test]
    fn eviction_order_is_insertion_order_not_usage() {
        let mut e = engine();
        for i in 0..8 {
            e.add_electrode([i as f32, 0.0, 0.0]);
        }
        // Ticking "touches" every electrode; FIFO must still evict id 0.
        e.tick();
        let placement = e.add_electrode([99.0, 0.0, 0.0]);
        assert_eq!(placement.evicted, Some(0));
    }

    #[test]
    fn interpolation_is_exact_at_electrode_positions() {
        let mut e = engine();
        e.add_electrode([1.0, 2.0, 3.0]);
        e.add_electrode([-4.0, 0.0, 1.0]);
        let values: Vec<f32> = e.electrodes().map(|el| el.value).collect();
        assert_eq!(e.interpolate([1.0, 2.0, 3.0]), values[0]);
        assert_eq!(e.interpolate([-4.0, 0.0, 1.0]), values[1]);
    }

    #[test]
    fn interpolation_stays_within_electrode_value_bounds() {
        let mut e = engine();
        for i in 0..5 {
            e.add_electrode([i as f32 * 3.0, (i % 2) as f32, -(i as f32)]);
        }
        let values: Vec<f32> = e.electrodes().map(|el| el.value).collect();
        let lo = values.iter().cloned().fold(f32::MAX, f32::min);
        let hi = values.iter().cloned().fold(f32::MIN, f32::max);
        for &vertex in &[[0.5, 0.5, 0.5], [10.0, -3.0, 2.0], [-7.0, 4.0, 4.0]] {
            let v = e.interpolate(vertex);
            assert!(v >= lo - 1e-6 && v <= hi + 1e-6, "{v} outside [{lo}, {hi}]");
            assert!(v.is_finite());
        }
    }

    #[test]
    fn empty_engine_reports_the_neutral_constant() {
        let e = engine();
        assert_eq!(e.interpolate([12.0, -5.0, 3.0]), NEUTRAL_VALUE);
        assert_eq!(e.interpolate([0.0, 0.0, 0.0]), NEUTRAL_VALUE);
    }

    #[test]
    fn resample_values_come_from_the_pool() {
        let mut e = InterpolationEngine::with_seed(
            ValuePolicy::Resample { pool: vec![0.0, 0.5, 1.0] },
            8,
            3,
        );
        e.add_electrode([0.0; 3]);
        for _ in 0..20 {
            e.tick();
            for el in e.electrodes() {
                assert!([0.0, 0.5, 1.0].contains(&el.value));
            }
        }
    }

    #[test]
    fn random_walk_stays_bounded() {
        let mut e = InterpolationEngine::with_seed(ValuePolicy::RandomWalk { step: 0.2 }, 8, 11);
        e.add_electrode([0.0; 3]);
        let mut prev = e.electrodes().next().map(|el| el.value);
        for _ in 0..50 {
            e.tick();
            let value = e.electrodes().next().map(|el| el.value);
            let (Some(p), Some(v)) = (prev, value) else { panic!("electrode lost") };
            assert!((0.0..=1.0).contains(&v));
            assert!((v - p).abs() <= 0.2 + 1e-6);
            prev = value;
        }
    }

    #[test]
    fn history_is_trimmed_to_capacity() {
        let mut e = InterpolationEngine::with_seed(ValuePolicy::default(), 4, 5);
        let placement = e.add_electrode([0.0; 3]);
        for _ in 0..10 {
            e.tick();
        }
        let history = e.history(placement.id).unwrap();
        assert_eq!(history.len(), 4);
        let ticks: Vec<u64> = history.samples().map(|(t, _)| t).collect();
        assert_eq!(ticks, vec![7, 8, 9, 10]);
    }

    #[test]
    fn reset_clears_electrodes_and_histories() {
        let mut e = engine();
        e.add_electrode([0.0; 3]);
        e.tick();
        e.reset();
        assert!(e.is_empty());
        assert_eq!(e.histories().count(), 0);
        assert_eq!(e.tick_count(), 0);
    }
}
