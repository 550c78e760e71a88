// src/visualizer.rs
//
// egui painters for the mesh viewports. Projection here uses the same view
// basis as engine-side picking, so a click lands on the vertex the user sees.

use eframe::egui;
use egui::{Color32, PointerButton, Sense, Stroke, Vec2};

use crate::scenes::{SurfaceMesh, ViewBasis};

/// Orbit camera state for one viewport.
pub struct ViewportState {
    pub yaw: f32,
    pub pitch: f32,
}

impl Default for ViewportState {
    fn default() -> Self {
        Self { yaw: 0.5, pitch: 0.25 }
    }
}

impl ViewportState {
    /// Direction of projection, camera towards the mesh center.
    pub fn direction(&self) -> [f32; 3] {
        let (sy, cy) = self.yaw.sin_cos();
        let (sp, cp) = self.pitch.sin_cos();
        [cp * cy, cp * sy, -sp]
    }
}

pub struct ViewportResponse {
    /// Normalized [-1, 1] coordinates of a middle click, if any.
    pub middle_click: Option<[f32; 2]>,
    pub camera_moved: bool,
}

/// Draws the projected mesh as a point cloud, colored per vertex by the
/// caller, with electrode markers on top. Dragging orbits the camera.
pub fn draw_mesh_viewport(
    ui: &mut egui::Ui,
    state: &mut ViewportState,
    mesh: &SurfaceMesh,
    color_of: &dyn Fn(usize, [f32; 3]) -> Color32,
    markers: &[([f32; 3], f32)],
) -> ViewportResponse {
    let side = ui.available_width().clamp(280.0, 480.0);
    let (response, painter) =
        ui.allocate_painter(Vec2::new(side, side), Sense::click_and_drag());
    let rect = response.rect;
    painter.rect_filled(rect, 4.0, Color32::from_rgb(10, 10, 15));

    let mut camera_moved = false;
    if response.dragged_by(PointerButton::Primary) {
        let delta = response.drag_delta();
        if delta != Vec2::ZERO {
            state.yaw -= delta.x * 0.01;
            state.pitch = (state.pitch + delta.y * 0.01).clamp(-1.4, 1.4);
            camera_moved = true;
        }
    }

    let basis = ViewBasis::from_direction(state.direction());
    let center = mesh.center();
    let radius = mesh.radius();
    let scale = rect.size().min_elem() * 0.45;
    let origin = rect.center();

    // Far-to-near so nearer points paint over farther ones.
    let mut points: Vec<(f32, egui::Pos2, Color32)> = Vec::with_capacity(mesh.len());
    for (index, &vertex) in mesh.vertices().iter().enumerate() {
        let depth = basis.depth(vertex, center);
        if depth > 0.0 {
            continue;
        }
        let p = basis.project(vertex, center, radius);
        let pos = origin + Vec2::new(p[0] * scale, -p[1] * scale);
        points.push((depth, pos, color_of(index, vertex)));
    }
    points.sort_by(|a, b| b.0.total_cmp(&a.0));
    for (_, pos, color) in &points {
        painter.circle_filled(*pos, 2.5, *color);
    }

    for &(position, value) in markers {
        if basis.depth(position, center) > 0.0 {
            continue;
        }
        let p = basis.project(position, center, radius);
        let pos = origin + Vec2::new(p[0] * scale, -p[1] * scale);
        painter.circle_filled(pos, 6.0, field_color(value));
        painter.circle_stroke(pos, 6.0, Stroke::new(1.5, Color32::WHITE));
    }

    let middle_click = if response.clicked_by(PointerButton::Middle) {
        response.interact_pointer_pos().map(|pos| {
            [(pos.x - origin.x) / scale, -(pos.y - origin.y) / scale]
        })
    } else {
        None
    };

    ViewportResponse { middle_click, camera_moved }
}

/// Cold-to-hot map for activity values in [0, 1].
pub fn field_color(value: f32) -> Color32 {
    let v = value.clamp(0.0, 1.0);
    Color32::from_rgb((v * 255.0) as u8, 60, ((1.0 - v) * 255.0) as u8)
}

/// Bone tint with the region's opacity baked into the alpha channel.
pub fn region_color(opacity: f32) -> Color32 {
    let a = (opacity.clamp(0.0, 1.0) * 255.0) as u8;
    Color32::from_rgba_unmultiplied(210, 205, 190, a)
}
