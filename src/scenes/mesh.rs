//! Vertex cloud of the reference surface the scenes interpolate over and pick
//! against. Surface extraction itself (contouring, smoothing) belongs to the
//! rendering collaborator; this only carries the resulting points.

/// Axis-aligned bounds as `(min, max)` corners.
pub type Bounds = ([f32; 3], [f32; 3]);

#[derive(Clone, Debug)]
pub struct SurfaceMesh {
    vertices: Vec<[f32; 3]>,
    bounds: Bounds,
}

impl SurfaceMesh {
    pub fn new(vertices: Vec<[f32; 3]>) -> Self {
        let mut min = [f32::MAX; 3];
        let mut max = [f32::MIN; 3];
        for v in &vertices {
            for axis in 0..3 {
                min[axis] = min[axis].min(v[axis]);
                max[axis] = max[axis].max(v[axis]);
            }
        }
        if vertices.is_empty() {
            min = [0.0; 3];
            max = [0.0; 3];
        }
        Self { vertices, bounds: (min, max) }
    }

    /// Latitude/longitude sampled ellipsoid, used as the built-in head surface
    /// when no dataset is configured.
    pub fn ellipsoid(center: [f32; 3], radii: [f32; 3], rings: usize, segments: usize) -> Self {
        let mut vertices = Vec::with_capacity(rings * segments + 2);
        vertices.push([center[0], center[1], center[2] + radii[2]]);
        for ring in 1..rings {
            let polar = std::f32::consts::PI * ring as f32 / rings as f32;
            for segment in 0..segments {
                let azimuth = std::f32::consts::TAU * segment as f32 / segments as f32;
                vertices.push([
                    center[0] + radii[0] * polar.sin() * azimuth.cos(),
                    center[1] + radii[1] * polar.sin() * azimuth.sin(),
                    center[2] + radii[2] * polar.cos(),
                ]);
            }
        }
        vertices.push([center[0], center[1], center[2] - radii[2]]);
        Self::new(vertices)
    }

    /// Built-in head surface. The engine and the viewport painters both call
    /// this, so the interpolated field stays aligned with what is drawn.
    pub fn head() -> Self {
        Self::ellipsoid([0.0; 3], [60.0, 80.0, 70.0], 24, 32)
    }

    pub fn vertices(&self) -> &[[f32; 3]] {
        &self.vertices
    }

    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    pub fn bounds(&self) -> Bounds {
        self.bounds
    }

    pub fn center(&self) -> [f32; 3] {
        let (min, max) = self.bounds;
        [
            (min[0] + max[0]) * 0.5,
            (min[1] + max[1]) * 0.5,
            (min[2] + max[2]) * 0.5,
        ]
    }

    /// Half of the largest bounds extent; the scale used to normalize
    /// projected coordinates.
    pub fn radius(&self) -> f32 {
        let (min, max) = self.bounds;
        (0..3)
            .map(|axis| (max[axis] - min[axis]) * 0.5)
            .fold(0.0f32, f32::max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ellipsoid_fits_its_radii() {
        let mesh = SurfaceMesh::ellipsoid([1.0, 2.0, 3.0], [10.0, 12.0, 14.0], 12, 16);
        let (min, max) = mesh.bounds();
        assert!(min[2] <= 3.0 - 14.0 + 1e-3);
        assert!(max[2] >= 3.0 + 14.0 - 1e-3);
        let c = mesh.center();
        assert!((c[0] - 1.0).abs() < 1.0);
        assert!(mesh.radius() > 10.0);
    }

    #[test]
    fn bounds_of_empty_mesh_are_degenerate() {
        let mesh = SurfaceMesh::new(Vec::new());
        assert_eq!(mesh.bounds(), ([0.0; 3], [0.0; 3]));
        assert_eq!(mesh.radius(), 0.0);
    }
}
