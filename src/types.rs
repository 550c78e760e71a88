//! Messages exchanged between the GUI thread and the scene engine thread.

use std::path::PathBuf;

use crate::scenes::{HueCalibration, InteractionMode, REGION_COUNT};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SceneKind {
    Basic,
    Eeg,
    Dsa,
}

/// Discrete input events; each is fully processed before the next is
/// delivered.
#[derive(Clone, Debug)]
pub enum InputEvent {
    /// Normalized screen coordinates: [-1, 1] over the 3-D viewport for mesh
    /// scenes, [0, 1] over the image for the DSA scene.
    MiddleClick { x: f32, y: f32 },
    ModeChanged(InteractionMode),
    OpacityChanged(f32),
    /// Cut-plane position change along axis 0..3.
    SliceChanged(usize, f32),
    /// Cut-plane enable/disable along axis 0..3; carries the slider position
    /// when enabling.
    SliceToggled(usize, Option<f32>),
    CameraChanged([f32; 3]),
    TimerTick,
    HueParamsChanged {
        hue_multiplier: Option<f32>,
        hue_constant: Option<f32>,
        value_multiplier: Option<f32>,
    },
}

/// Commands from the GUI to the engine thread.
#[derive(Clone, Debug)]
pub enum EngineCommand {
    Scene(SceneKind, InputEvent),
    SetAnimation { enabled: bool, interval_ms: u64 },
    ResetElectrodes,
    LoadDataset(PathBuf),
    ExportChart(PathBuf),
}

/// Feedback from the engine thread to the GUI.
#[derive(Clone, Debug)]
pub enum SceneMessage {
    Log(String),
    RegionOpacities([f32; REGION_COUNT]),
    /// Interpolated activity per mesh vertex, aligned with the shared mesh.
    ScalarField(Vec<f32>),
    /// Electrode positions and current values, for the field painter.
    ElectrodeMarkers(Vec<([f32; 3], f32)>),
    ElectrodeEvicted(u32),
    /// Per-electrode history points for the live chart.
    ChartSeries(Vec<(u32, Vec<[f64; 2]>)>),
    Composite { width: u32, height: u32, rgb: Vec<u8> },
    CalibrationChanged(HueCalibration),
    AnimationRunning(bool),
}
