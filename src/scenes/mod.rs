//! Scene core: the three visualization scenes, their interaction state
//! machines, and the computation pipelines feeding the rendering collaborator.

pub mod chart;
pub mod compositor;
pub mod electrodes;
pub mod error;
pub mod interaction;
pub mod mesh;
pub mod picking;

pub use chart::{render_history_png, ChartStyle};
pub use compositor::{FrameStack, HueCalibration, PeakAggregation, TemporalFlowCompositor};
pub use electrodes::{
    ElectrodePlacement, InterpolationEngine, SampleHistory, ValuePolicy, ELECTRODE_CAPACITY,
    NEUTRAL_VALUE,
};
pub use error::SceneError;
pub use interaction::{InteractionController, InteractionMode, RegionPartition, REGION_COUNT};
pub use mesh::SurfaceMesh;
pub use picking::{HitResult, ImagePicker, MeshPicker, ViewBasis};

use log::{debug, warn};

use crate::config::{BasicConfig, DsaConfig, EegConfig};
use crate::types::InputEvent;

/// Everything the core hands to the rendering collaborator. The core supplies
/// *what to show*; drawing, cameras and tessellation live on the other side.
pub trait RenderTarget {
    fn set_region_opacities(&mut self, opacities: [f32; REGION_COUNT]);
    fn set_scalar_field(&mut self, values: Vec<f32>);
    fn set_electrode_markers(&mut self, markers: Vec<([f32; 3], f32)>);
    fn notify_evicted(&mut self, id: u32);
    fn set_chart_series(&mut self, series: Vec<(u32, Vec<[f64; 2]>)>);
    fn set_composite(&mut self, image: image::RgbImage);
    fn set_calibration(&mut self, calibration: HueCalibration);
    fn redraw(&mut self);
}

/// Side effects an event handler asks the surrounding engine to perform.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SceneEffect {
    None,
    /// The eighth electrode has been placed; start the animation timer.
    StartAnimation,
}

pub struct BasicSceneState {
    pub controller: InteractionController,
    mesh: SurfaceMesh,
    picker: MeshPicker,
    view: [f32; 3],
}

impl BasicSceneState {
    pub fn new(mesh: SurfaceMesh, config: &BasicConfig) -> Self {
        let mut controller =
            InteractionController::new(mesh.bounds(), config.interaction_mode, config.opacity);
        controller.set_slices(slice_positions(config));
        Self {
            controller,
            mesh,
            picker: MeshPicker::default(),
            view: [0.0, 0.0, -1.0],
        }
    }

    fn handle<R: RenderTarget>(&mut self, event: &InputEvent, render: &mut R) {
        match *event {
            InputEvent::ModeChanged(mode) => self.controller.set_mode(mode),
            InputEvent::OpacityChanged(value) => self.controller.set_global_opacity(value),
            InputEvent::SliceChanged(axis, value) => {
                let mut slices = self.controller.partition().slices();
                if let Some(slot) = slices.get_mut(axis) {
                    *slot = Some(value);
                }
                self.controller.set_slices(slices);
            }
            InputEvent::SliceToggled(axis, value) => {
                let mut slices = self.controller.partition().slices();
                if let Some(slot) = slices.get_mut(axis) {
                    *slot = value;
                }
                self.controller.set_slices(slices);
                self.controller.reset_regions();
            }
            InputEvent::CameraChanged(direction) => {
                self.view = direction;
                self.controller.on_camera_changed(direction);
            }
            InputEvent::MiddleClick { x, y } => {
                match self
                    .picker
                    .resolve([x, y], self.view, &self.mesh, self.controller.partition())
                {
                    Some(HitResult::MeshPoint { region, .. }) => {
                        self.controller.on_region_clicked(region);
                    }
                    // A miss, or a pixel hit that cannot happen here, is a
                    // silent no-op.
                    _ => return,
                }
            }
            InputEvent::TimerTick | InputEvent::HueParamsChanged { .. } => return,
        }
        render.set_region_opacities(self.controller.opacities());
        render.redraw();
    }
}

pub struct EegSceneState {
    pub engine: InterpolationEngine,
    mesh: SurfaceMesh,
    picker: MeshPicker,
    view: [f32; 3],
    animation_started: bool,
}

impl EegSceneState {
    pub fn new(mesh: SurfaceMesh, config: &EegConfig) -> Self {
        Self {
            engine: InterpolationEngine::new(config.value_policy.clone(), config.n_samples),
            mesh,
            picker: MeshPicker::default(),
            view: [0.0, 0.0, -1.0],
            animation_started: false,
        }
    }

    /// Clears all electrodes and pushes the emptied field so the display
    /// drops back to neutral.
    pub fn reset<R: RenderTarget>(&mut self, render: &mut R) {
        self.engine.reset();
        self.animation_started = false;
        self.push_field(render);
    }

    fn handle<R: RenderTarget>(&mut self, event: &InputEvent, render: &mut R) -> SceneEffect {
        match *event {
            InputEvent::CameraChanged(direction) => {
                self.view = direction;
                SceneEffect::None
            }
            InputEvent::MiddleClick { x, y } => {
                // The partition only classifies hits here; the EEG scene has
                // no cut planes.
                let partition = RegionPartition::new(self.mesh.bounds());
                let Some(HitResult::MeshPoint { position, .. }) =
                    self.picker.resolve([x, y], self.view, &self.mesh, &partition)
                else {
                    return SceneEffect::None;
                };
                let placement = self.engine.add_electrode(position);
                if let Some(evicted) = placement.evicted {
                    debug!("electrode {evicted} evicted by {}", placement.id);
                    render.notify_evicted(evicted);
                }
                self.push_field(render);
                if self.engine.len() == ELECTRODE_CAPACITY && !self.animation_started {
                    self.animation_started = true;
                    return SceneEffect::StartAnimation;
                }
                SceneEffect::None
            }
            InputEvent::TimerTick => {
                self.engine.tick();
                self.push_field(render);
                SceneEffect::None
            }
            _ => SceneEffect::None,
        }
    }

    fn push_field<R: RenderTarget>(&self, render: &mut R) {
        render.set_scalar_field(self.engine.field(self.mesh.vertices()));
        render.set_electrode_markers(
            self.engine
                .electrodes()
                .map(|e| (e.position, e.value))
                .collect(),
        );
        render.set_chart_series(
            self.engine
                .histories()
                .map(|(id, history)| {
                    (
                        id,
                        history
                            .samples()
                            .map(|(tick, value)| [tick as f64, value as f64])
                            .collect(),
                    )
                })
                .collect(),
        );
        render.redraw();
    }
}

pub struct DsaSceneState {
    compositor: TemporalFlowCompositor,
}

impl DsaSceneState {
    pub fn new(stack: FrameStack, config: &DsaConfig) -> Self {
        Self {
            compositor: TemporalFlowCompositor::new(stack, config.calibration, config.aggregation),
        }
    }

    pub fn compositor(&self) -> &TemporalFlowCompositor {
        &self.compositor
    }

    /// Swaps in a new frame stack, keeping the current calibration.
    pub fn set_stack<R: RenderTarget>(&mut self, stack: FrameStack, render: &mut R) {
        let calibration = self.compositor.calibration();
        let aggregation = self.compositor.aggregation();
        self.compositor = TemporalFlowCompositor::new(stack, calibration, aggregation);
        self.push_composite(render);
    }

    fn handle<R: RenderTarget>(&mut self, event: &InputEvent, render: &mut R) {
        match *event {
            InputEvent::MiddleClick { x, y } => {
                let picker = ImagePicker {
                    width: self.compositor.stack().width(),
                    height: self.compositor.stack().height(),
                };
                let Some(HitResult::Pixel { x, y }) = picker.resolve([x, y]) else {
                    return;
                };
                match self.compositor.pick_hue((x, y)) {
                    Ok(true) => {
                        render.set_calibration(self.compositor.calibration());
                        self.push_composite(render);
                    }
                    Ok(false) => debug!("low hue extremum picked at ({x}, {y})"),
                    Err(e) => warn!("calibration pick rejected: {e}"),
                }
            }
            InputEvent::HueParamsChanged {
                hue_multiplier,
                hue_constant,
                value_multiplier,
            } => {
                self.compositor
                    .set_parameters(hue_multiplier, hue_constant, value_multiplier);
                render.set_calibration(self.compositor.calibration());
                self.push_composite(render);
            }
            _ => {}
        }
    }

    fn push_composite<R: RenderTarget>(&self, render: &mut R) {
        render.set_composite(self.compositor.calculate_rgb_image());
        render.redraw();
    }
}

pub enum SceneState {
    Basic(BasicSceneState),
    Eeg(EegSceneState),
    Dsa(DsaSceneState),
}

/// One generic scene: a render target handle plus the scene-specific state.
/// The middle-click strategy (toggle opacity / add electrode / pick hue) is
/// selected by the state variant, not by interactor subclassing.
pub struct Scene<R: RenderTarget> {
    pub render: R,
    pub state: SceneState,
}

impl<R: RenderTarget> Scene<R> {
    pub fn new(render: R, state: SceneState) -> Self {
        Self { render, state }
    }

    pub fn handle(&mut self, event: &InputEvent) -> SceneEffect {
        match &mut self.state {
            SceneState::Basic(state) => {
                state.handle(event, &mut self.render);
                SceneEffect::None
            }
            SceneState::Eeg(state) => state.handle(event, &mut self.render),
            SceneState::Dsa(state) => {
                state.handle(event, &mut self.render);
                SceneEffect::None
            }
        }
    }
}

fn slice_positions(config: &BasicConfig) -> [Option<f32>; 3] {
    let mut slices = [None; 3];
    for (axis, slice) in config.slices.iter().enumerate() {
        if slice.enabled {
            slices[axis] = Some(slice.value);
        }
    }
    slices
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BasicConfig, DsaConfig, EegConfig};
    use crate::types::InputEvent;

    #[derive(Default)]
    struct RecordingTarget {
        opacities: Option<[f32; REGION_COUNT]>,
        field: Option<Vec<f32>>,
        evicted: Vec<u32>,
        composites: usize,
        calibration: Option<HueCalibration>,
        redraws: usize,
    }

    impl RenderTarget for RecordingTarget {
        fn set_region_opacities(&mut self, opacities: [f32; REGION_COUNT]) {
            self.opacities = Some(opacities);
        }
        fn set_scalar_field(&mut self, values: Vec<f32>) {
            self.field = Some(values);
        }
        fn set_electrode_markers(&mut self, _markers: Vec<([f32; 3], f32)>) {}
        fn notify_evicted(&mut self, id: u32) {
            self.evicted.push(id);
        }
        fn set_chart_series(&mut self, _series: Vec<(u32, Vec<[f64; 2]>)>) {}
        fn set_composite(&mut self, _image: image::RgbImage) {
            self.composites += 1;
        }
        fn set_calibration(&mut self, calibration: HueCalibration) {
            self.calibration = Some(calibration);
        }
        fn redraw(&mut self) {
            self.redraws += 1;
        }
    }

    fn head_mesh() -> SurfaceMesh {
        SurfaceMesh::ellipsoid([0.0; 3], [60.0, 80.0, 70.0], 12, 18)
    }

    #[test]
    fn basic_scene_pushes_opacities_on_mode_change() {
        let state = BasicSceneState::new(head_mesh(), &BasicConfig::default());
        let mut scene = Scene::new(RecordingTarget::default(), SceneState::Basic(state));
        scene.handle(&InputEvent::ModeChanged(InteractionMode::Automatic));
        assert!(scene.render.opacities.is_some());
        assert_eq!(scene.render.redraws, 1);
    }

    #[test]
    fn basic_scene_ignores_foreign_events() {
        let state = BasicSceneState::new(head_mesh(), &BasicConfig::default());
        let mut scene = Scene::new(RecordingTarget::default(), SceneState::Basic(state));
        scene.handle(&InputEvent::TimerTick);
        scene.handle(&InputEvent::HueParamsChanged {
            hue_multiplier: Some(1.0),
            hue_constant: None,
            value_multiplier: None,
        });
        assert_eq!(scene.render.redraws, 0);
    }

    #[test]
    fn eeg_click_places_an_electrode_and_updates_the_field() {
        let state = EegSceneState::new(head_mesh(), &EegConfig::default());
        let mut scene = Scene::new(RecordingTarget::default(), SceneState::Eeg(state));
        scene.handle(&InputEvent::CameraChanged([1.0, 0.0, 0.0]));
        let effect = scene.handle(&InputEvent::MiddleClick { x: 0.0, y: 0.0 });
        assert_eq!(effect, SceneEffect::None);
        let field = scene.render.field.as_ref().expect("field pushed");
        assert_eq!(field.len(), head_mesh().len());
    }

    #[test]
    fn eighth_electrode_requests_animation_start() {
        let state = EegSceneState::new(head_mesh(), &EegConfig::default());
        let mut scene = Scene::new(RecordingTarget::default(), SceneState::Eeg(state));
        scene.handle(&InputEvent::CameraChanged([1.0, 0.0, 0.0]));
        let mut effects = Vec::new();
        // Equator vertices of the facing hemisphere project to these screen
        // positions for a camera looking along +x.
        for x in [-1.0, -0.88, -0.65, -0.35, 0.0, 0.35, 0.65, 0.88] {
            effects.push(scene.handle(&InputEvent::MiddleClick { x, y: 0.0 }));
        }
        let placed = match &scene.state {
            SceneState::Eeg(state) => state.engine.len(),
            _ => unreachable!(),
        };
        assert_eq!(placed, ELECTRODE_CAPACITY);
        assert_eq!(effects.pop(), Some(SceneEffect::StartAnimation));
        assert!(effects.iter().all(|e| *e == SceneEffect::None));
    }

    #[test]
    fn eeg_miss_is_a_no_op() {
        let state = EegSceneState::new(head_mesh(), &EegConfig::default());
        let mut scene = Scene::new(RecordingTarget::default(), SceneState::Eeg(state));
        scene.handle(&InputEvent::MiddleClick { x: 9.0, y: 9.0 });
        assert!(scene.render.field.is_none());
        assert_eq!(scene.render.redraws, 0);
    }

    #[test]
    fn dsa_two_picks_recalibrate_and_recomposite() {
        let stack = FrameStack::synthetic(8, 8, 6);
        let state = DsaSceneState::new(stack, &DsaConfig::default());
        let mut scene = Scene::new(RecordingTarget::default(), SceneState::Dsa(state));
        // Top of the image peaks early, bottom peaks late.
        scene.handle(&InputEvent::MiddleClick { x: 0.5, y: 0.15 });
        assert_eq!(scene.render.composites, 0);
        scene.handle(&InputEvent::MiddleClick { x: 0.5, y: 0.9 });
        assert_eq!(scene.render.composites, 1);
        assert!(scene.render.calibration.is_some());
    }

    #[test]
    fn dsa_hue_params_are_partially_updated() {
        let stack = FrameStack::synthetic(4, 4, 3);
        let state = DsaSceneState::new(stack, &DsaConfig::default());
        let mut scene = Scene::new(RecordingTarget::default(), SceneState::Dsa(state));
        scene.handle(&InputEvent::HueParamsChanged {
            hue_multiplier: None,
            hue_constant: Some(0.2),
            value_multiplier: None,
        });
        let calibration = scene.render.calibration.expect("calibration pushed");
        assert_eq!(calibration.hue_constant, 0.2);
        assert_eq!(calibration.hue_multiplier, DsaConfig::default().calibration.hue_multiplier);
    }
}
