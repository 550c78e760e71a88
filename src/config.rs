//! Persisted application configuration. Loaded once at startup, passed
//! explicitly to the components that need it, written back at the defined
//! mutation points. Out-of-range values are clamped, never fatal.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::warn;
use serde::{Deserialize, Serialize};

use crate::scenes::{HueCalibration, InteractionMode, PeakAggregation, ValuePolicy};

/// Isosurface smoothing parameters handed to the rendering collaborator.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmoothingConfig {
    pub radius: u32,
    pub std_dev: f32,
    pub iterations: u32,
    pub pass_band: f32,
    pub feature_angle: f32,
}

impl Default for SmoothingConfig {
    fn default() -> Self {
        Self {
            radius: 2,
            std_dev: 1.0,
            iterations: 100,
            pass_band: 0.05,
            feature_angle: 45.0,
        }
    }
}

/// Named isosurface definition (threshold in raw intensity units).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ContourConfig {
    pub name: String,
    pub threshold: f32,
    #[serde(default)]
    pub smoothing: SmoothingConfig,
}

/// One anatomical cut-plane slider group.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SliceConfig {
    pub enabled: bool,
    pub min: f32,
    pub max: f32,
    pub value: f32,
}

impl Default for SliceConfig {
    fn default() -> Self {
        Self { enabled: true, min: 0.0, max: 100.0, value: 50.0 }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BasicConfig {
    pub interaction_mode: InteractionMode,
    pub opacity: f32,
    pub contours: Vec<ContourConfig>,
    pub slices: [SliceConfig; 3],
}

impl Default for BasicConfig {
    fn default() -> Self {
        Self {
            interaction_mode: InteractionMode::Opacity,
            opacity: 0.4,
            contours: vec![
                ContourConfig {
                    name: "Head".into(),
                    threshold: 127.0,
                    smoothing: SmoothingConfig::default(),
                },
                ContourConfig {
                    name: "Brain".into(),
                    threshold: 169.0,
                    smoothing: SmoothingConfig {
                        radius: 0,
                        std_dev: 0.0,
                        iterations: 20,
                        pass_band: 0.5,
                        feature_angle: 45.0,
                    },
                },
            ],
            slices: [SliceConfig::default(); 3],
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EegConfig {
    /// Chart history length per electrode.
    pub n_samples: usize,
    pub value_policy: ValuePolicy,
    pub animation_interval_ms: u64,
    pub animation_enabled: bool,
}

impl Default for EegConfig {
    fn default() -> Self {
        Self {
            n_samples: 64,
            value_policy: ValuePolicy::default(),
            animation_interval_ms: 5000,
            animation_enabled: true,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DsaConfig {
    pub calibration: HueCalibration,
    pub aggregation: PeakAggregation,
    pub dataset: Option<PathBuf>,
}

impl Default for DsaConfig {
    fn default() -> Self {
        Self {
            calibration: HueCalibration {
                hue_multiplier: 0.85,
                hue_constant: 0.1,
                value_multiplier: 0.85,
            },
            aggregation: PeakAggregation::ArgMax,
            dataset: None,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub basic: BasicConfig,
    pub eeg: EegConfig,
    pub dsa: DsaConfig,
}

impl AppConfig {
    /// Loads the configuration, falling back to defaults when the file is
    /// missing or unreadable. A corrupted file must not kill the session.
    pub fn load(path: &Path) -> Self {
        let mut config = match std::fs::read_to_string(path) {
            Ok(text) => match serde_json::from_str::<AppConfig>(&text) {
                Ok(config) => config,
                Err(e) => {
                    warn!("config {} is malformed ({e}); using defaults", path.display());
                    AppConfig::default()
                }
            },
            Err(_) => AppConfig::default(),
        };
        config.sanitize();
        config
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let text = serde_json::to_string_pretty(self).context("serializing config")?;
        std::fs::write(path, text).with_context(|| format!("writing {}", path.display()))?;
        Ok(())
    }

    /// Clamps every value to its documented domain.
    pub fn sanitize(&mut self) {
        let opacity = self.basic.opacity;
        if !(0.0..=1.0).contains(&opacity) || !opacity.is_finite() {
            warn!("opacity {opacity} outside [0, 1]; clamping");
            self.basic.opacity = if opacity.is_finite() { opacity.clamp(0.0, 1.0) } else { 0.4 };
        }
        for slice in &mut self.basic.slices {
            if slice.max < slice.min {
                warn!("slice range [{}, {}] inverted; swapping", slice.min, slice.max);
                std::mem::swap(&mut slice.min, &mut slice.max);
            }
            if !(slice.min..=slice.max).contains(&slice.value) {
                warn!("slice value {} outside [{}, {}]; clamping", slice.value, slice.min, slice.max);
                slice.value = slice.value.clamp(slice.min, slice.max);
            }
        }

        if self.eeg.n_samples == 0 {
            warn!("n_samples must be at least 1; clamping");
            self.eeg.n_samples = 1;
        }
        if self.eeg.animation_interval_ms < 16 {
            warn!("animation interval {} ms too small; clamping to 16", self.eeg.animation_interval_ms);
            self.eeg.animation_interval_ms = 16;
        }
        match &mut self.eeg.value_policy {
            ValuePolicy::Resample { pool } => {
                for value in pool.iter_mut() {
                    if !(0.0..=1.0).contains(value) || !value.is_finite() {
                        warn!("pool value {value} outside [0, 1]; clamping");
                        *value = if value.is_finite() { value.clamp(0.0, 1.0) } else { 0.5 };
                    }
                }
            }
            ValuePolicy::RandomWalk { step } => {
                if !(0.0..=1.0).contains(step) || !step.is_finite() {
                    warn!("random walk step {step} outside [0, 1]; clamping");
                    *step = if step.is_finite() { step.clamp(0.0, 1.0) } else { 0.1 };
                }
            }
        }

        let cal = &mut self.dsa.calibration;
        for (name, value) in [
            ("hue_multiplier", &mut cal.hue_multiplier),
            ("hue_constant", &mut cal.hue_constant),
            ("value_multiplier", &mut cal.value_multiplier),
        ] {
            if !value.is_finite() {
                warn!("{name} is not finite; resetting to 1.0");
                *value = 1.0;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn out_of_range_values_are_clamped_not_fatal() {
        let mut config = AppConfig::default();
        config.basic.opacity = 3.5;
        config.basic.slices[0].value = 1000.0;
        config.eeg.n_samples = 0;
        config.eeg.animation_interval_ms = 1;
        config.dsa.calibration.hue_multiplier = f32::NAN;
        config.sanitize();
        assert_eq!(config.basic.opacity, 1.0);
        assert_eq!(config.basic.slices[0].value, config.basic.slices[0].max);
        assert_eq!(config.eeg.n_samples, 1);
        assert_eq!(config.eeg.animation_interval_ms, 16);
        assert_eq!(config.dsa.calibration.hue_multiplier, 1.0);
    }

    #[test]
    fn config_round_trips_through_json() {
        let config = AppConfig::default();
        let text = serde_json::to_string(&config).unwrap();
        let back: AppConfig = serde_json::from_str(&text).unwrap();
        assert_eq!(config, back);
    }

    #[test]
    fn missing_file_yields_defaults() {
        let config = AppConfig::load(Path::new("/nonexistent/neuroviz.json"));
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn partial_config_fills_in_defaults() {
        let config: AppConfig =
            serde_json::from_str(r#"{ "basic": { "opacity": 0.6 } }"#).unwrap();
        assert_eq!(config.basic.opacity, 0.6);
        assert_eq!(config.eeg.animation_interval_ms, 5000);
        assert_eq!(config.dsa.calibration.hue_constant, 0.1);
    }
}
