// src/gui.rs
use std::path::PathBuf;
use std::sync::mpsc::{channel, Receiver, Sender};
use std::time::Duration;

use eframe::egui;
use egui::{Color32, PointerButton, Sense, TextureOptions, Vec2};
use egui_plot::{Line, Plot, PlotPoints};

use crate::config::{AppConfig, SliceConfig};
use crate::engine;
use crate::scenes::{HueCalibration, InteractionMode, RegionPartition, SurfaceMesh, REGION_COUNT};
use crate::types::{EngineCommand, InputEvent, SceneKind, SceneMessage};
use crate::visualizer::{draw_mesh_viewport, field_color, region_color, ViewportState};

const SLICE_NAMES: [&str; 3] = ["Sagittal", "Coronal", "Axial"];

pub struct NeurovizApp {
    selected_tab: SceneKind,

    // Basic scene controls
    mode: InteractionMode,
    opacity: f32,
    slices: [SliceConfig; 3],
    region_opacities: [f32; REGION_COUNT],
    basic_view: ViewportState,

    // EEG scene
    eeg_view: ViewportState,
    scalar_field: Vec<f32>,
    markers: Vec<([f32; 3], f32)>,
    chart_series: Vec<(u32, Vec<[f64; 2]>)>,
    animation_running: bool,
    animation_enabled: bool,
    interval_ms: u64,
    export_path: String,

    // DSA scene
    calibration: HueCalibration,
    dataset_path: String,
    composite: Option<egui::TextureHandle>,

    mesh: SurfaceMesh,
    log_messages: Vec<String>,

    rx: Receiver<SceneMessage>,
    tx_cmd: Sender<EngineCommand>,
}

impl Default for NeurovizApp {
    fn default() -> Self {
        let (tx, rx) = channel();
        let (tx_cmd, rx_cmd) = channel();
        engine::spawn_thread(tx, rx_cmd);

        let config = AppConfig::load(std::path::Path::new(engine::CONFIG_FILE));
        let basic_view = ViewportState::default();
        let eeg_view = ViewportState::default();

        // The engine starts with a default view; align it with ours.
        tx_cmd
            .send(EngineCommand::Scene(
                SceneKind::Basic,
                InputEvent::CameraChanged(basic_view.direction()),
            ))
            .ok();
        tx_cmd
            .send(EngineCommand::Scene(
                SceneKind::Eeg,
                InputEvent::CameraChanged(eeg_view.direction()),
            ))
            .ok();

        Self {
            selected_tab: SceneKind::Basic,
            mode: config.basic.interaction_mode,
            opacity: config.basic.opacity,
            slices: config.basic.slices,
            region_opacities: [config.basic.opacity; REGION_COUNT],
            basic_view,
            eeg_view,
            scalar_field: Vec::new(),
            markers: Vec::new(),
            chart_series: Vec::new(),
            animation_running: false,
            animation_enabled: config.eeg.animation_enabled,
            interval_ms: config.eeg.animation_interval_ms,
            export_path: "electrode_chart.png".to_owned(),
            calibration: config.dsa.calibration,
            dataset_path: config
                .dsa
                .dataset
                .map(|p| p.display().to_string())
                .unwrap_or_default(),
            composite: None,
            mesh: SurfaceMesh::head(),
            log_messages: vec!["Neuroviz ready.".to_owned()],
            rx,
            tx_cmd,
        }
    }
}

impl NeurovizApp {
    fn log(&mut self, msg: &str) {
        self.log_messages.push(format!("> {msg}"));
        if self.log_messages.len() > 8 {
            self.log_messages.remove(0);
        }
    }

    fn send(&self, cmd: EngineCommand) {
        self.tx_cmd.send(cmd).ok();
    }

    fn send_event(&self, kind: SceneKind, event: InputEvent) {
        self.send(EngineCommand::Scene(kind, event));
    }

    fn drain_messages(&mut self, ctx: &egui::Context) {
        let mut count = 0;
        while let Ok(msg) = self.rx.try_recv() {
            count += 1;
            if count > 64 {
                break;
            }
            match msg {
                SceneMessage::Log(s) => self.log(&s),
                SceneMessage::RegionOpacities(o) => self.region_opacities = o,
                SceneMessage::ScalarField(f) => self.scalar_field = f,
                SceneMessage::ElectrodeMarkers(m) => self.markers = m,
                SceneMessage::ElectrodeEvicted(id) => {
                    self.log(&format!("Electrode E{id} aged out."));
                }
                SceneMessage::ChartSeries(s) => self.chart_series = s,
                SceneMessage::Composite { width, height, rgb } => {
                    let image =
                        egui::ColorImage::from_rgb([width as usize, height as usize], &rgb);
                    self.composite =
                        Some(ctx.load_texture("composite", image, TextureOptions::NEAREST));
                }
                SceneMessage::CalibrationChanged(c) => self.calibration = c,
                SceneMessage::AnimationRunning(b) => self.animation_running = b,
            }
        }
    }

    fn basic_controls(&mut self, ui: &mut egui::Ui) {
        ui.label("INTERACTION MODE");
        let prev = self.mode;
        ui.horizontal(|ui| {
            ui.selectable_value(&mut self.mode, InteractionMode::Opacity, "Opacity");
            ui.selectable_value(&mut self.mode, InteractionMode::Interactive, "Interactive");
            ui.selectable_value(&mut self.mode, InteractionMode::Automatic, "Automatic");
        });
        if self.mode != prev {
            self.send_event(SceneKind::Basic, InputEvent::ModeChanged(self.mode));
        }

        ui.add_space(10.0);
        let slider =
            ui.add(egui::Slider::new(&mut self.opacity, 0.0..=1.0).text("Global opacity"));
        if slider.changed() {
            self.send_event(SceneKind::Basic, InputEvent::OpacityChanged(self.opacity));
        }

        ui.add_space(10.0);
        ui.label("CUT PLANES");
        for axis in 0..3 {
            let slice = &mut self.slices[axis];
            let mut event = None;
            ui.horizontal(|ui| {
                if ui.checkbox(&mut slice.enabled, SLICE_NAMES[axis]).changed() {
                    event = Some(InputEvent::SliceToggled(
                        axis,
                        slice.enabled.then_some(slice.value),
                    ));
                } else if ui
                    .add_enabled(
                        slice.enabled,
                        egui::Slider::new(&mut slice.value, slice.min..=slice.max),
                    )
                    .changed()
                {
                    event = Some(InputEvent::SliceChanged(axis, slice.value));
                }
            });
            if let Some(event) = event {
                self.send_event(SceneKind::Basic, event);
            }
        }

        if self.mode == InteractionMode::Interactive {
            ui.add_space(6.0);
            ui.label(
                egui::RichText::new("Middle-click a region to toggle it.")
                    .color(Color32::YELLOW)
                    .small(),
            );
        }
    }

    fn eeg_controls(&mut self, ui: &mut egui::Ui) {
        ui.label(format!("Electrodes: {}", self.markers.len()));
        ui.label(
            egui::RichText::new("Middle-click the head to place an electrode.")
                .color(Color32::YELLOW)
                .small(),
        );
        if ui.button("RESET ELECTRODES").clicked() {
            self.send(EngineCommand::ResetElectrodes);
        }

        ui.add_space(10.0);
        ui.label("ANIMATION");
        let enabled_toggle = ui.checkbox(&mut self.animation_enabled, "Enabled").changed();
        let interval_changed = ui
            .add(
                egui::Slider::new(&mut self.interval_ms, 100..=10_000)
                    .text("Interval (ms)")
                    .logarithmic(true),
            )
            .changed();
        if enabled_toggle || interval_changed {
            self.send(EngineCommand::SetAnimation {
                enabled: self.animation_enabled,
                interval_ms: self.interval_ms,
            });
        }
        let status = if self.animation_running { "running" } else { "stopped" };
        ui.label(format!("Timer: {status}"));

        ui.add_space(10.0);
        ui.label("CHART EXPORT");
        ui.text_edit_singleline(&mut self.export_path);
        if ui.button("EXPORT PNG").clicked() {
            self.send(EngineCommand::ExportChart(PathBuf::from(&self.export_path)));
        }
    }

    fn dsa_controls(&mut self, ui: &mut egui::Ui) {
        ui.label("HUE CALIBRATION");
        let mut changed = false;
        ui.horizontal(|ui| {
            ui.label("Multiplier");
            changed |= ui
                .add(egui::DragValue::new(&mut self.calibration.hue_multiplier).speed(0.01))
                .changed();
        });
        ui.horizontal(|ui| {
            ui.label("Constant");
            changed |= ui
                .add(egui::DragValue::new(&mut self.calibration.hue_constant).speed(0.01))
                .changed();
        });
        ui.horizontal(|ui| {
            ui.label("Value gain");
            changed |= ui
                .add(egui::DragValue::new(&mut self.calibration.value_multiplier).speed(0.01))
                .changed();
        });
        if changed {
            self.send_event(
                SceneKind::Dsa,
                InputEvent::HueParamsChanged {
                    hue_multiplier: Some(self.calibration.hue_multiplier),
                    hue_constant: Some(self.calibration.hue_constant),
                    value_multiplier: Some(self.calibration.value_multiplier),
                },
            );
        }
        ui.label(
            egui::RichText::new("Middle-click earliest then latest activity to calibrate.")
                .color(Color32::YELLOW)
                .small(),
        );

        ui.add_space(10.0);
        ui.label("DATASET");
        ui.text_edit_singleline(&mut self.dataset_path);
        if ui.button("LOAD FRAMES").clicked() && !self.dataset_path.is_empty() {
            self.send(EngineCommand::LoadDataset(PathBuf::from(&self.dataset_path)));
        }
    }

    fn basic_viewport(&mut self, ui: &mut egui::Ui) {
        let mut partition = RegionPartition::new(self.mesh.bounds());
        partition.set_slices([
            self.slices[0].enabled.then_some(self.slices[0].value),
            self.slices[1].enabled.then_some(self.slices[1].value),
            self.slices[2].enabled.then_some(self.slices[2].value),
        ]);
        let opacities = self.region_opacities;
        let color = move |_: usize, v: [f32; 3]| region_color(opacities[partition.region_of(v)]);

        let out = draw_mesh_viewport(ui, &mut self.basic_view, &self.mesh, &color, &[]);
        if out.camera_moved {
            self.send_event(
                SceneKind::Basic,
                InputEvent::CameraChanged(self.basic_view.direction()),
            );
        }
        if let Some([x, y]) = out.middle_click {
            self.send_event(SceneKind::Basic, InputEvent::MiddleClick { x, y });
        }
    }

    fn eeg_viewport(&mut self, ui: &mut egui::Ui) {
        let field = std::mem::take(&mut self.scalar_field);
        let out = {
            let color = |i: usize, _: [f32; 3]| {
                field.get(i).copied().map(field_color).unwrap_or(Color32::DARK_GRAY)
            };
            draw_mesh_viewport(ui, &mut self.eeg_view, &self.mesh, &color, &self.markers)
        };
        self.scalar_field = field;

        if out.camera_moved {
            self.send_event(
                SceneKind::Eeg,
                InputEvent::CameraChanged(self.eeg_view.direction()),
            );
        }
        if let Some([x, y]) = out.middle_click {
            self.send_event(SceneKind::Eeg, InputEvent::MiddleClick { x, y });
        }

        ui.add_space(8.0);
        let colors = [
            Color32::from_rgb(0, 255, 255),
            Color32::YELLOW,
            Color32::from_rgb(255, 0, 255),
            Color32::GREEN,
            Color32::RED,
            Color32::from_rgb(100, 100, 255),
            Color32::WHITE,
            Color32::from_rgb(255, 165, 0),
        ];
        Plot::new("electrode_chart")
            .height(220.0)
            .include_y(0.0)
            .include_y(1.0)
            .show(ui, |plot_ui| {
                for (i, (id, points)) in self.chart_series.iter().enumerate() {
                    if points.is_empty() {
                        continue;
                    }
                    let col = colors.get(i % colors.len()).unwrap_or(&Color32::WHITE);
                    plot_ui.line(
                        Line::new(PlotPoints::new(points.clone()))
                            .name(format!("E{id}"))
                            .color(*col),
                    );
                }
            });
    }

    fn dsa_viewport(&mut self, ui: &mut egui::Ui) {
        let Some(texture) = &self.composite else {
            ui.label("No composite yet.");
            return;
        };
        let available = ui.available_width().clamp(240.0, 640.0);
        let tex_size = texture.size_vec2();
        let scale = available / tex_size.x.max(1.0);
        let size = Vec2::new(tex_size.x * scale, tex_size.y * scale);

        let response = ui.add(egui::Image::new((texture.id(), size)).sense(Sense::click()));
        if response.clicked_by(PointerButton::Middle) {
            if let Some(pos) = response.interact_pointer_pos() {
                let rect = response.rect;
                let x = (pos.x - rect.min.x) / rect.width();
                let y = (pos.y - rect.min.y) / rect.height();
                self.send_event(SceneKind::Dsa, InputEvent::MiddleClick { x, y });
            }
        }
    }
}

impl eframe::App for NeurovizApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.drain_messages(ctx);
        // The engine pushes asynchronously; keep polling.
        ctx.request_repaint_after(Duration::from_millis(100));

        let mut visuals = egui::Visuals::dark();
        visuals.widgets.noninteractive.bg_fill = Color32::from_rgb(10, 10, 15);
        ctx.set_visuals(visuals);

        egui::SidePanel::left("controls").min_width(300.0).show(ctx, |ui| {
            ui.add_space(10.0);
            ui.heading("Neuroviz");
            ui.label("Volumetric neuroimaging viewer");
            ui.separator();

            ui.horizontal(|ui| {
                ui.selectable_value(&mut self.selected_tab, SceneKind::Basic, "BASIC");
                ui.selectable_value(&mut self.selected_tab, SceneKind::Eeg, "EEG");
                ui.selectable_value(&mut self.selected_tab, SceneKind::Dsa, "DSA");
            });
            ui.separator();

            match self.selected_tab {
                SceneKind::Basic => self.basic_controls(ui),
                SceneKind::Eeg => self.eeg_controls(ui),
                SceneKind::Dsa => self.dsa_controls(ui),
            }

            ui.add_space(10.0);
            ui.separator();
            egui::ScrollArea::vertical().max_height(120.0).show(ui, |ui| {
                for m in &self.log_messages {
                    ui.monospace(m);
                }
            });
        });

        egui::CentralPanel::default().show(ctx, |ui| match self.selected_tab {
            SceneKind::Basic => self.basic_viewport(ui),
            SceneKind::Eeg => self.eeg_viewport(ui),
            SceneKind::Dsa => self.dsa_viewport(ui),
        });
    }
}
