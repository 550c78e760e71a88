// src/engine.rs
//
// Background scene engine. Owns the three scenes and the configuration;
// commands from the GUI arrive over a channel and are processed one at a
// time, so every input event finishes before the next begins.

use std::path::PathBuf;
use std::sync::mpsc::{Receiver, Sender};
use std::thread;
use std::time::{Duration, Instant};

use log::{error, info, warn};

use crate::config::AppConfig;
use crate::scenes::{
    render_history_png, BasicSceneState, ChartStyle, DsaSceneState, EegSceneState, FrameStack,
    RenderTarget, Scene, SceneEffect, SceneState, SurfaceMesh, REGION_COUNT,
};
use crate::types::{EngineCommand, InputEvent, SceneKind, SceneMessage};

pub const CONFIG_FILE: &str = "neuroviz.json";

/// Demo stack dimensions used when no dataset directory is configured.
const SYNTHETIC_STACK: (u32, u32, usize) = (160, 120, 24);

struct ChannelTarget {
    tx: Sender<SceneMessage>,
}

impl RenderTarget for ChannelTarget {
    fn set_region_opacities(&mut self, opacities: [f32; REGION_COUNT]) {
        self.tx.send(SceneMessage::RegionOpacities(opacities)).ok();
    }

    fn set_scalar_field(&mut self, values: Vec<f32>) {
        self.tx.send(SceneMessage::ScalarField(values)).ok();
    }

    fn set_electrode_markers(&mut self, markers: Vec<([f32; 3], f32)>) {
        self.tx.send(SceneMessage::ElectrodeMarkers(markers)).ok();
    }

    fn notify_evicted(&mut self, id: u32) {
        self.tx.send(SceneMessage::ElectrodeEvicted(id)).ok();
    }

    fn set_chart_series(&mut self, series: Vec<(u32, Vec<[f64; 2]>)>) {
        self.tx.send(SceneMessage::ChartSeries(series)).ok();
    }

    fn set_composite(&mut self, image: image::RgbImage) {
        let (width, height) = image.dimensions();
        self.tx
            .send(SceneMessage::Composite { width, height, rgb: image.into_raw() })
            .ok();
    }

    fn set_calibration(&mut self, calibration: crate::scenes::HueCalibration) {
        self.tx.send(SceneMessage::CalibrationChanged(calibration)).ok();
    }

    fn redraw(&mut self) {}
}

pub fn spawn_thread(tx: Sender<SceneMessage>, rx_cmd: Receiver<EngineCommand>) {
    thread::spawn(move || run(tx, rx_cmd));
}

fn run(tx: Sender<SceneMessage>, rx_cmd: Receiver<EngineCommand>) {
    let config_path = PathBuf::from(CONFIG_FILE);
    let mut config = AppConfig::load(&config_path);
    tx.send(SceneMessage::Log("Neuroviz engine ready.".to_owned())).ok();

    let mesh = SurfaceMesh::head();
    let mut basic = Scene::new(
        ChannelTarget { tx: tx.clone() },
        SceneState::Basic(BasicSceneState::new(mesh.clone(), &config.basic)),
    );
    let mut eeg = Scene::new(
        ChannelTarget { tx: tx.clone() },
        SceneState::Eeg(EegSceneState::new(mesh, &config.eeg)),
    );
    let stack = initial_stack(&config, &tx);
    let mut dsa = Scene::new(
        ChannelTarget { tx: tx.clone() },
        SceneState::Dsa(DsaSceneState::new(stack, &config.dsa)),
    );

    // Prime the GUI with the startup state of every scene.
    if let SceneState::Basic(state) = &basic.state {
        basic.render.set_region_opacities(state.controller.opacities());
    }
    if let SceneState::Dsa(state) = &dsa.state {
        dsa.render.set_calibration(state.compositor().calibration());
        dsa.render.set_composite(state.compositor().calculate_rgb_image());
    }

    let mut animation_running = false;
    let mut next_tick = Instant::now();
    let mut interval = Duration::from_millis(config.eeg.animation_interval_ms);

    loop {
        for _ in 0..10 {
            let Ok(cmd) = rx_cmd.try_recv() else { break };
            match cmd {
                EngineCommand::Scene(kind, event) => {
                    let mut dirty = persist_event(&mut config, &event);
                    let effect = match kind {
                        SceneKind::Basic => basic.handle(&event),
                        SceneKind::Eeg => eeg.handle(&event),
                        SceneKind::Dsa => {
                            let effect = dsa.handle(&event);
                            // Calibration may have changed through a pick.
                            if let SceneState::Dsa(state) = &dsa.state {
                                let calibration = state.compositor().calibration();
                                if calibration != config.dsa.calibration {
                                    config.dsa.calibration = calibration;
                                    dirty = true;
                                }
                            }
                            effect
                        }
                    };
                    if effect == SceneEffect::StartAnimation && config.eeg.animation_enabled {
                        animation_running = true;
                        next_tick = Instant::now() + interval;
                        tx.send(SceneMessage::AnimationRunning(true)).ok();
                        tx.send(SceneMessage::Log(
                            "All electrodes placed; animation started.".to_owned(),
                        ))
                        .ok();
                    }
                    if dirty {
                        save_config(&config, &config_path);
                    }
                }
                EngineCommand::SetAnimation { enabled, interval_ms } => {
                    config.eeg.animation_enabled = enabled;
                    config.eeg.animation_interval_ms = interval_ms.max(16);
                    interval = Duration::from_millis(config.eeg.animation_interval_ms);
                    save_config(&config, &config_path);
                    animation_running = enabled;
                    if enabled {
                        next_tick = Instant::now() + interval;
                    }
                    tx.send(SceneMessage::AnimationRunning(animation_running)).ok();
                }
                EngineCommand::ResetElectrodes => {
                    if let SceneState::Eeg(state) = &mut eeg.state {
                        state.reset(&mut eeg.render);
                    }
                    animation_running = false;
                    tx.send(SceneMessage::AnimationRunning(false)).ok();
                    tx.send(SceneMessage::Log("Electrodes cleared.".to_owned())).ok();
                }
                EngineCommand::LoadDataset(path) => match FrameStack::load_dir(&path) {
                    Ok(stack) => {
                        if let SceneState::Dsa(state) = &mut dsa.state {
                            state.set_stack(stack, &mut dsa.render);
                        }
                        config.dsa.dataset = Some(path.clone());
                        save_config(&config, &config_path);
                        tx.send(SceneMessage::Log(format!("Dataset loaded: {}", path.display())))
                            .ok();
                    }
                    Err(e) => {
                        warn!("dataset load failed: {e}");
                        tx.send(SceneMessage::Log(format!("Dataset load failed: {e}"))).ok();
                    }
                },
                EngineCommand::ExportChart(path) => {
                    let SceneState::Eeg(state) = &eeg.state else { continue };
                    let result =
                        render_history_png(&state.engine, ChartStyle::default()).and_then(|png| {
                            std::fs::write(&path, png)
                                .map_err(|e| crate::scenes::SceneError::Chart(e.to_string()))
                        });
                    match result {
                        Ok(()) => {
                            info!("chart exported to {}", path.display());
                            tx.send(SceneMessage::Log(format!(
                                "Chart exported: {}",
                                path.display()
                            )))
                            .ok();
                        }
                        Err(e) => {
                            error!("chart export failed: {e}");
                            tx.send(SceneMessage::Log(format!("Chart export failed: {e}"))).ok();
                        }
                    }
                }
            }
        }

        if animation_running && Instant::now() >= next_tick {
            eeg.handle(&InputEvent::TimerTick);
            next_tick += interval;
        }

        thread::sleep(Duration::from_millis(10));
    }
}

fn initial_stack(config: &AppConfig, tx: &Sender<SceneMessage>) -> FrameStack {
    if let Some(dir) = &config.dsa.dataset {
        match FrameStack::load_dir(dir) {
            Ok(stack) => return stack,
            Err(e) => {
                warn!("configured dataset {} unusable: {e}", dir.display());
                tx.send(SceneMessage::Log(format!("Dataset load failed: {e}"))).ok();
            }
        }
    }
    let (width, height, frames) = SYNTHETIC_STACK;
    FrameStack::synthetic(width, height, frames)
}

/// Mirrors the event into the persisted configuration before dispatch.
/// Returns whether anything persistent changed.
fn persist_event(config: &mut AppConfig, event: &InputEvent) -> bool {
    match *event {
        InputEvent::ModeChanged(mode) => config.basic.interaction_mode = mode,
        InputEvent::OpacityChanged(value) => config.basic.opacity = value.clamp(0.0, 1.0),
        InputEvent::SliceChanged(axis, value) => {
            if let Some(slice) = config.basic.slices.get_mut(axis) {
                slice.value = value.clamp(slice.min, slice.max);
            }
        }
        InputEvent::SliceToggled(axis, value) => {
            if let Some(slice) = config.basic.slices.get_mut(axis) {
                slice.enabled = value.is_some();
                if let Some(v) = value {
                    slice.value = v.clamp(slice.min, slice.max);
                }
            }
        }
        InputEvent::HueParamsChanged { hue_multiplier, hue_constant, value_multiplier } => {
            if let Some(m) = hue_multiplier {
                config.dsa.calibration.hue_multiplier = m;
            }
            if let Some(c) = hue_constant {
                config.dsa.calibration.hue_constant = c;
            }
            if let Some(v) = value_multiplier {
                config.dsa.calibration.value_multiplier = v;
            }
        }
        InputEvent::MiddleClick { .. } | InputEvent::CameraChanged(_) | InputEvent::TimerTick => {
            return false;
        }
    }
    true
}

fn save_config(config: &AppConfig, path: &std::path::Path) {
    if let Err(e) = config.save(path) {
        warn!("config not saved: {e:#}");
    }
}
