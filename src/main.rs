// src/main.rs
#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]
mod config;
mod engine;
mod gui;
mod scenes;
mod types;
mod visualizer;

use eframe::egui;

fn main() -> eframe::Result<()> {
    env_logger::init();
    let viewport = egui::ViewportBuilder::default()
        .with_inner_size([1280.0, 860.0])
        .with_min_inner_size([1000.0, 700.0])
        .with_title("Neuroviz");
    let options = eframe::NativeOptions { viewport, ..Default::default() };
    eframe::run_native(
        "Neuroviz",
        options,
        Box::new(|_cc| Box::new(gui::NeurovizApp::default())),
    )
}
