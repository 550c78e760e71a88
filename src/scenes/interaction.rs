//! Mode-driven visibility policy for the octant regions of the head volume.
//!
//! The volume is split into eight regions by the three orthogonal cut planes.
//! An axis whose cut plane is disabled still splits at the bounds midpoint,
//! but the two halves along that axis behave as one logical region.

use log::debug;
use serde::{Deserialize, Serialize};

use crate::scenes::mesh::Bounds;

pub const REGION_COUNT: usize = 8;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum InteractionMode {
    Opacity,
    Interactive,
    Automatic,
}

impl Default for InteractionMode {
    fn default() -> Self {
        InteractionMode::Opacity
    }
}

/// Octant partition of the volume bounds. Region ids follow the bit layout
/// `4 * x_high + 2 * y_high + z_high` where a set bit means the octant lies on
/// the high side of that axis' cut plane.
#[derive(Clone, Debug)]
pub struct RegionPartition {
    bounds: Bounds,
    slices: [Option<f32>; 3],
}

impl RegionPartition {
    pub fn new(bounds: Bounds) -> Self {
        Self { bounds, slices: [None; 3] }
    }

    pub fn set_slices(&mut self, slices: [Option<f32>; 3]) {
        let (min, max) = self.bounds;
        for axis in 0..3 {
            self.slices[axis] = slices[axis].map(|v| v.clamp(min[axis], max[axis]));
        }
    }

    pub fn slices(&self) -> [Option<f32>; 3] {
        self.slices
    }

    /// Cut position per axis; disabled axes cut at the midpoint so all eight
    /// octants stay populated and grouping handles the rest.
    fn planes(&self) -> [f32; 3] {
        let (min, max) = self.bounds;
        let mut planes = [0.0; 3];
        for axis in 0..3 {
            planes[axis] = self.slices[axis].unwrap_or((min[axis] + max[axis]) * 0.5);
        }
        planes
    }

    pub fn region_of(&self, point: [f32; 3]) -> usize {
        let planes = self.planes();
        let mut id = 0;
        for axis in 0..3 {
            if point[axis] >= planes[axis] {
                id += 1 << (2 - axis);
            }
        }
        id
    }

    /// Expands a region id to the group it belongs to: for every disabled
    /// axis, the mirrored octant across that axis joins the group.
    pub fn group_of(&self, region: usize) -> Vec<usize> {
        let mut group = vec![region & (REGION_COUNT - 1)];
        for axis in 0..3 {
            if self.slices[axis].is_none() {
                let mirror_bit = 1 << (2 - axis);
                for i in 0..group.len() {
                    group.push(group[i] ^ mirror_bit);
                }
            }
        }
        group
    }

    /// Regions facing the camera for a given direction of projection: on every
    /// enabled axis the octant centroid lies on the side the camera looks
    /// from. Disabled axes impose no constraint, so a whole group faces as
    /// one. Without any enabled axis nothing is considered facing.
    pub fn facing_regions(&self, direction: [f32; 3]) -> [bool; REGION_COUNT] {
        let mut facing = [false; REGION_COUNT];
        if self.slices.iter().all(Option::is_none) {
            return facing;
        }
        for (id, slot) in facing.iter_mut().enumerate() {
            *slot = (0..3).all(|axis| {
                if self.slices[axis].is_none() {
                    return true;
                }
                let high = id & (1 << (2 - axis)) != 0;
                // Looking along +axis means the low half sits between the
                // camera and the cut plane.
                if direction[axis] >= 0.0 {
                    !high
                } else {
                    high
                }
            });
        }
        facing
    }
}

/// Tracks the active visualization mode and owns the per-region opacities.
pub struct InteractionController {
    mode: InteractionMode,
    global_opacity: f32,
    opacities: [f32; REGION_COUNT],
    /// Last non-zero opacity per region, restored by the Interactive toggle.
    restore: [f32; REGION_COUNT],
    /// Interactive-mode opacities, preserved across mode switches.
    interactive: Option<[f32; REGION_COUNT]>,
    partition: RegionPartition,
    direction: [f32; 3],
}

impl InteractionController {
    pub fn new(bounds: Bounds, mode: InteractionMode, global_opacity: f32) -> Self {
        let global_opacity = global_opacity.clamp(0.0, 1.0);
        let mut controller = Self {
            mode,
            global_opacity,
            opacities: [global_opacity; REGION_COUNT],
            restore: [global_opacity; REGION_COUNT],
            interactive: None,
            partition: RegionPartition::new(bounds),
            direction: [0.0, 0.0, -1.0],
        };
        controller.set_mode(mode);
        controller
    }

    pub fn mode(&self) -> InteractionMode {
        self.mode
    }

    pub fn global_opacity(&self) -> f32 {
        self.global_opacity
    }

    pub fn opacities(&self) -> [f32; REGION_COUNT] {
        self.opacities
    }

    pub fn partition(&self) -> &RegionPartition {
        &self.partition
    }

    pub fn set_mode(&mut self, mode: InteractionMode) {
        debug!("set_mode({mode:?})");
        if self.mode == InteractionMode::Interactive && mode != InteractionMode::Interactive {
            self.interactive = Some(self.opacities);
        }
        self.mode = mode;
        match mode {
            InteractionMode::Opacity => {
                self.opacities = [self.global_opacity; REGION_COUNT];
            }
            InteractionMode::Interactive => {
                self.opacities = self
                    .interactive
                    .unwrap_or([self.global_opacity; REGION_COUNT]);
            }
            InteractionMode::Automatic => {
                self.recompute_visibility();
            }
        }
    }

    /// Camera-change notification; meaningful only in Automatic mode and a
    /// silent no-op otherwise.
    pub fn on_camera_changed(&mut self, direction: [f32; 3]) {
        self.direction = direction;
        if self.mode != InteractionMode::Automatic {
            return;
        }
        self.recompute_visibility();
    }

    /// Binary opacity toggle of the clicked region group; meaningful only in
    /// Interactive mode and a silent no-op otherwise.
    pub fn on_region_clicked(&mut self, region: usize) {
        if self.mode != InteractionMode::Interactive || region >= REGION_COUNT {
            return;
        }
        debug!("on_region_clicked({region})");
        for id in self.partition.group_of(region) {
            if self.opacities[id] > 0.0 {
                self.restore[id] = self.opacities[id];
                self.opacities[id] = 0.0;
            } else {
                self.opacities[id] = self.restore[id];
            }
        }
    }

    pub fn set_global_opacity(&mut self, value: f32) {
        let value = value.clamp(0.0, 1.0);
        self.global_opacity = value;
        if self.mode == InteractionMode::Opacity {
            self.opacities = [value; REGION_COUNT];
        }
    }

    /// Re-derives the partition from new cut-plane positions. In Automatic
    /// mode this forces a visibility recompute, since the groups may change.
    pub fn set_slices(&mut self, slices: [Option<f32>; 3]) {
        self.partition.set_slices(slices);
        if self.mode == InteractionMode::Automatic {
            self.recompute_visibility();
        }
    }

    /// Drops all per-region state back to the global opacity. Used when a cut
    /// plane is toggled on or off.
    pub fn reset_regions(&mut self) {
        self.opacities = [self.global_opacity; REGION_COUNT];
        self.restore = [self.global_opacity; REGION_COUNT];
        self.interactive = None;
        if self.mode == InteractionMode::Automatic {
            self.recompute_visibility();
        }
    }

    fn recompute_visibility(&mut self) {
        let facing = self.partition.facing_regions(self.direction);
        for (id, &is_facing) in facing.iter().enumerate() {
            self.opacities[id] = if is_facing { 0.0 } else { self.global_opacity };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BOUNDS: Bounds = ([0.0; 3], [100.0; 3]);

    fn controller(mode: InteractionMode, opacity: f32) -> InteractionController {
        let mut c = InteractionController::new(BOUNDS, mode, opacity);
        c.set_slices([Some(50.0), Some(50.0), Some(50.0)]);
        c
    }

    #[test]
    fn opacity_mode_applies_global_value_everywhere() {
        let c = controller(InteractionMode::Opacity, 0.6);
        assert!(c.opacities().iter().all(|&o| (o - 0.6).abs() < 1e-6));
    }

    #[test]
    fn interactive_toggle_is_an_involution() {
        let mut c = controller(InteractionMode::Opacity, 0.6);
        c.set_mode(InteractionMode::Interactive);
        c.on_region_clicked(3);
        assert_eq!(c.opacities()[3], 0.0);
        c.on_region_clicked(3);
        assert!((c.opacities()[3] - 0.6).abs() < 1e-6);
    }

    #[test]
    fn clicks_outside_interactive_mode_are_ignored() {
        let mut c = controller(InteractionMode::Opacity, 0.6);
        let before = c.opacities();
        c.on_region_clicked(3);
        assert_eq!(before, c.opacities());
    }

    #[test]
    fn camera_recompute_is_idempotent() {
        let mut c = controller(InteractionMode::Automatic, 0.7);
        c.on_camera_changed([1.0, -0.2, 0.1]);
        let first = c.opacities();
        c.on_camera_changed([1.0, -0.2, 0.1]);
        assert_eq!(first, c.opacities());
    }

    #[test]
    fn automatic_mode_hides_exactly_one_octant_with_all_axes_cut() {
        let mut c = controller(InteractionMode::Automatic, 1.0);
        c.on_camera_changed([1.0, 1.0, 1.0]);
        let hidden: Vec<usize> = c
            .opacities()
            .iter()
            .enumerate()
            .filter(|(_, &o)| o == 0.0)
            .map(|(i, _)| i)
            .collect();
        // Positive direction on every axis hides the all-low octant.
        assert_eq!(hidden, vec![0]);
    }

    #[test]
    fn disabled_axis_hides_the_group() {
        let mut c = controller(InteractionMode::Automatic, 1.0);
        c.set_slices([Some(50.0), Some(50.0), None]);
        c.on_camera_changed([1.0, 1.0, 0.3]);
        let hidden: Vec<usize> = c
            .opacities()
            .iter()
            .enumerate()
            .filter(|(_, &o)| o == 0.0)
            .map(|(i, _)| i)
            .collect();
        assert_eq!(hidden, vec![0, 1]);
    }

    #[test]
    fn automatic_without_cut_planes_hides_nothing() {
        let mut c = InteractionController::new(BOUNDS, InteractionMode::Automatic, 0.8);
        c.on_camera_changed([1.0, 0.0, 0.0]);
        assert!(c.opacities().iter().all(|&o| o > 0.0));
    }

    #[test]
    fn group_toggle_spans_disabled_axes() {
        let mut c = controller(InteractionMode::Interactive, 0.5);
        c.set_mode(InteractionMode::Interactive);
        c.set_slices([Some(50.0), None, Some(50.0)]);
        c.on_region_clicked(4);
        assert_eq!(c.opacities()[4], 0.0);
        assert_eq!(c.opacities()[6], 0.0);
        assert!(c.opacities()[0] > 0.0);
    }

    #[test]
    fn interactive_state_survives_a_mode_round_trip() {
        let mut c = controller(InteractionMode::Interactive, 0.4);
        c.set_mode(InteractionMode::Interactive);
        c.on_region_clicked(2);
        c.set_mode(InteractionMode::Opacity);
        c.set_mode(InteractionMode::Interactive);
        assert_eq!(c.opacities()[2], 0.0);
    }

    #[test]
    fn global_opacity_is_clamped() {
        let mut c = controller(InteractionMode::Opacity, 0.5);
        c.set_global_opacity(1.7);
        assert_eq!(c.global_opacity(), 1.0);
        c.set_global_opacity(-0.3);
        assert_eq!(c.global_opacity(), 0.0);
    }

    #[test]
    fn region_ids_follow_the_bit_layout() {
        let p = {
            let mut p = RegionPartition::new(BOUNDS);
            p.set_slices([Some(50.0), Some(50.0), Some(50.0)]);
            p
        };
        assert_eq!(p.region_of([10.0, 10.0, 10.0]), 0);
        assert_eq!(p.region_of([90.0, 10.0, 90.0]), 5);
        assert_eq!(p.region_of([90.0, 90.0, 90.0]), 7);
    }
}
