//! Resolves a middle-click screen coordinate into either a point on the
//! reference mesh (electrode placement, region selection) or a frame pixel
//! (hue calibration). A miss resolves to `None`; callers treat that as a
//! no-op, never an error.

use crate::scenes::interaction::RegionPartition;
use crate::scenes::mesh::SurfaceMesh;

/// Where a pick landed, depending on the active scene.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum HitResult {
    MeshPoint { position: [f32; 3], region: usize },
    Pixel { x: u32, y: u32 },
}

/// Orthographic screen basis for a view direction; shared between picking and
/// the field painter so both agree on where a vertex appears.
#[derive(Clone, Copy, Debug)]
pub struct ViewBasis {
    pub right: [f32; 3],
    pub up: [f32; 3],
    pub forward: [f32; 3],
}

impl ViewBasis {
    /// Basis orthogonal to the direction of projection. Falls back to the
    /// world axes when the direction is degenerate or aligned with world-up.
    pub fn from_direction(direction: [f32; 3]) -> Self {
        let forward = normalize(direction).unwrap_or([0.0, 0.0, -1.0]);
        let world_up = if forward[2].abs() > 0.99 {
            [0.0, 1.0, 0.0]
        } else {
            [0.0, 0.0, 1.0]
        };
        let right = normalize(cross(forward, world_up)).unwrap_or([1.0, 0.0, 0.0]);
        let up = cross(right, forward);
        Self { right, up, forward }
    }

    /// Projects a world point into normalized screen coordinates in roughly
    /// [-1, 1] on each axis, centered on `center` and scaled by `radius`.
    pub fn project(&self, point: [f32; 3], center: [f32; 3], radius: f32) -> [f32; 2] {
        let d = [
            point[0] - center[0],
            point[1] - center[1],
            point[2] - center[2],
        ];
        let scale = if radius > 0.0 { 1.0 / radius } else { 1.0 };
        [dot(d, self.right) * scale, dot(d, self.up) * scale]
    }

    /// Depth along the viewing direction; smaller is closer to the camera.
    pub fn depth(&self, point: [f32; 3], center: [f32; 3]) -> f32 {
        let d = [
            point[0] - center[0],
            point[1] - center[1],
            point[2] - center[2],
        ];
        dot(d, self.forward)
    }
}

/// Picks the nearest camera-facing mesh vertex within a screen-space radius.
#[derive(Clone, Copy, Debug)]
pub struct MeshPicker {
    /// Pick radius in normalized screen units.
    pub radius: f32,
}

impl Default for MeshPicker {
    fn default() -> Self {
        Self { radius: 0.08 }
    }
}

impl MeshPicker {
    /// `screen` is in normalized [-1, 1] coordinates (x right, y up) as
    /// produced by [`ViewBasis::project`].
    pub fn resolve(
        &self,
        screen: [f32; 2],
        direction: [f32; 3],
        mesh: &SurfaceMesh,
        partition: &RegionPartition,
    ) -> Option<HitResult> {
        let basis = ViewBasis::from_direction(direction);
        let center = mesh.center();
        let radius = mesh.radius();

        let mut best: Option<([f32; 3], f32)> = None;
        for &vertex in mesh.vertices() {
            // Only the hemisphere facing the camera is pickable.
            if basis.depth(vertex, center) > 0.0 {
                continue;
            }
            let projected = basis.project(vertex, center, radius);
            let dx = projected[0] - screen[0];
            let dy = projected[1] - screen[1];
            let dist_sq = dx * dx + dy * dy;
            if dist_sq > self.radius * self.radius {
                continue;
            }
            if best.map(|(_, d)| dist_sq < d).unwrap_or(true) {
                best = Some((vertex, dist_sq));
            }
        }

        best.map(|(position, _)| HitResult::MeshPoint {
            position,
            region: partition.region_of(position),
        })
    }
}

/// Maps a normalized [0, 1] screen coordinate onto frame pixels.
#[derive(Clone, Copy, Debug)]
pub struct ImagePicker {
    pub width: u32,
    pub height: u32,
}

impl ImagePicker {
    pub fn resolve(&self, screen: [f32; 2]) -> Option<HitResult> {
        if self.width == 0 || self.height == 0 {
            return None;
        }
        if !(0.0..=1.0).contains(&screen[0]) || !(0.0..=1.0).contains(&screen[1]) {
            return None;
        }
        let x = ((screen[0] * self.width as f32) as u32).min(self.width - 1);
        let y = ((screen[1] * self.height as f32) as u32).min(self.height - 1);
        Some(HitResult::Pixel { x, y })
    }
}

fn dot(a: [f32; 3], b: [f32; 3]) -> f32 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

fn cross(a: [f32; 3], b: [f32; 3]) -> [f32; 3] {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

fn normalize(v: [f32; 3]) -> Option<[f32; 3]> {
    let len = dot(v, v).sqrt();
    if len < 1e-6 {
        return None;
    }
    Some([v[0] / len, v[1] / len, v[2] / len])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenes::interaction::RegionPartition;

    fn mesh() -> SurfaceMesh {
        SurfaceMesh::ellipsoid([0.0; 3], [50.0, 50.0, 50.0], 16, 24)
    }

    fn partition(mesh: &SurfaceMesh) -> RegionPartition {
        let mut p = RegionPartition::new(mesh.bounds());
        p.set_slices([Some(0.0), Some(0.0), Some(0.0)]);
        p
    }

    #[test]
    fn center_click_hits_a_facing_vertex() {
        let mesh = mesh();
        let partition = partition(&mesh);
        let picker = MeshPicker::default();
        // Camera looks along +x; facing vertices sit at negative x.
        let hit = picker.resolve([0.0, 0.0], [1.0, 0.0, 0.0], &mesh, &partition);
        let Some(HitResult::MeshPoint { position, .. }) = hit else {
            panic!("expected a mesh hit, got {hit:?}");
        };
        assert!(position[0] < 0.0);
    }

    #[test]
    fn far_off_screen_click_misses() {
        let mesh = mesh();
        let partition = partition(&mesh);
        let picker = MeshPicker::default();
        assert_eq!(
            picker.resolve([8.0, 8.0], [1.0, 0.0, 0.0], &mesh, &partition),
            None
        );
    }

    #[test]
    fn hit_region_matches_the_partition() {
        let mesh = mesh();
        let partition = partition(&mesh);
        let picker = MeshPicker { radius: 0.3 };
        let hit = picker.resolve([0.5, 0.5], [1.0, 0.0, 0.0], &mesh, &partition);
        let Some(HitResult::MeshPoint { position, region }) = hit else {
            panic!("expected a mesh hit");
        };
        assert_eq!(region, partition.region_of(position));
    }

    #[test]
    fn image_picker_maps_corners_and_rejects_outside() {
        let picker = ImagePicker { width: 100, height: 50 };
        assert_eq!(
            picker.resolve([0.0, 0.0]),
            Some(HitResult::Pixel { x: 0, y: 0 })
        );
        assert_eq!(
            picker.resolve([1.0, 1.0]),
            Some(HitResult::Pixel { x: 99, y: 49 })
        );
        assert_eq!(picker.resolve([1.2, 0.5]), None);
        assert_eq!(picker.resolve([-0.1, 0.5]), None);
    }

    #[test]
    fn degenerate_view_direction_still_yields_a_basis() {
        let basis = ViewBasis::from_direction([0.0; 3]);
        let p = basis.project([1.0, 0.0, 0.0], [0.0; 3], 1.0);
        assert!(p[0].is_finite() && p[1].is_finite());
    }
}
