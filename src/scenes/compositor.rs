//! Merges a stack of greyscale frames into one false-color image: time of
//! peak activity becomes hue, peak signal strength becomes value.

use std::path::Path;

use image::{Rgb, RgbImage};
use log::{debug, info};
use ndarray::Array3;
use serde::{Deserialize, Serialize};

use crate::scenes::error::SceneError;

/// Ordered greyscale frames, `t x y x x`, intensities normalized to [0, 1].
/// Immutable once constructed.
#[derive(Clone, Debug)]
pub struct FrameStack {
    data: Array3<f32>,
}

impl FrameStack {
    /// Builds a stack from raw 8-bit greyscale frames of uniform size.
    pub fn from_grayscale_frames(
        frames: Vec<Vec<u8>>,
        width: u32,
        height: u32,
    ) -> Result<Self, SceneError> {
        if frames.is_empty() {
            return Err(SceneError::EmptyFrameStack);
        }
        let pixels = (width * height) as usize;
        let mut data = Array3::zeros((frames.len(), height as usize, width as usize));
        for (index, frame) in frames.iter().enumerate() {
            if frame.len() != pixels {
                return Err(SceneError::FrameSizeMismatch {
                    index,
                    width,
                    height,
                    actual_width: frame.len() as u32 % width.max(1),
                    actual_height: frame.len() as u32 / width.max(1),
                });
            }
            for y in 0..height as usize {
                for x in 0..width as usize {
                    data[[index, y, x]] = frame[y * width as usize + x] as f32 / 255.0;
                }
            }
        }
        Ok(Self { data })
    }

    /// Reads every `.png` in a directory (sorted by file name) as a greyscale
    /// frame. All frames must share the dimensions of the first.
    pub fn load_dir(dir: &Path) -> Result<Self, SceneError> {
        let mut names: Vec<_> = std::fs::read_dir(dir)
            .map_err(|e| SceneError::Dataset(format!("{}: {e}", dir.display())))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.extension().map(|ext| ext == "png").unwrap_or(false))
            .collect();
        names.sort();
        if names.is_empty() {
            return Err(SceneError::Dataset(format!(
                "no .png frames in {}",
                dir.display()
            )));
        }

        let mut frames = Vec::with_capacity(names.len());
        let mut dims = None;
        for (index, name) in names.iter().enumerate() {
            let frame = image::open(name)?.to_luma8();
            let (w, h) = frame.dimensions();
            match dims {
                None => dims = Some((w, h)),
                Some((width, height)) if (w, h) != (width, height) => {
                    return Err(SceneError::FrameSizeMismatch {
                        index,
                        width,
                        height,
                        actual_width: w,
                        actual_height: h,
                    });
                }
                Some(_) => {}
            }
            frames.push(frame.into_raw());
        }
        let (width, height) = dims.unwrap_or((0, 0));
        info!("loaded {} frames ({width}x{height}) from {}", frames.len(), dir.display());
        Self::from_grayscale_frames(frames, width, height)
    }

    /// Travelling bright band, the demo stack used when no dataset is
    /// configured.
    pub fn synthetic(width: u32, height: u32, num_frames: usize) -> Self {
        let num_frames = num_frames.max(1);
        let mut data = Array3::zeros((num_frames, height as usize, width as usize));
        for t in 0..num_frames {
            let band = height as f32 * t as f32 / num_frames as f32;
            for y in 0..height as usize {
                let fall = (-((y as f32 - band) / (height as f32 * 0.08 + 1.0)).powi(2)).exp();
                for x in 0..width as usize {
                    data[[t, y, x]] = fall;
                }
            }
        }
        Self { data }
    }

    pub fn num_frames(&self) -> usize {
        self.data.shape()[0]
    }

    pub fn height(&self) -> u32 {
        self.data.shape()[1] as u32
    }

    pub fn width(&self) -> u32 {
        self.data.shape()[2] as u32
    }

    fn intensity(&self, t: usize, x: u32, y: u32) -> f32 {
        self.data[[t, y as usize, x as usize]]
    }
}

/// Linear remap of raw peak time onto the hue range, plus the value gain.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct HueCalibration {
    pub hue_multiplier: f32,
    pub hue_constant: f32,
    pub value_multiplier: f32,
}

impl Default for HueCalibration {
    fn default() -> Self {
        Self { hue_multiplier: 1.0, hue_constant: 0.0, value_multiplier: 1.0 }
    }
}

/// Per-pixel reduction of the frame axis to a single "peak time".
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeakAggregation {
    /// Index of the brightest frame.
    ArgMax,
    /// Intensity-weighted time centroid.
    Centroid,
}

impl Default for PeakAggregation {
    fn default() -> Self {
        PeakAggregation::ArgMax
    }
}

const SATURATION: f32 = 1.0;

pub struct TemporalFlowCompositor {
    stack: FrameStack,
    calibration: HueCalibration,
    aggregation: PeakAggregation,
    /// First extremum of an in-progress two-click calibration.
    pending_low: Option<(u32, u32)>,
}

impl TemporalFlowCompositor {
    pub fn new(
        stack: FrameStack,
        calibration: HueCalibration,
        aggregation: PeakAggregation,
    ) -> Self {
        Self { stack, calibration, aggregation, pending_low: None }
    }

    pub fn stack(&self) -> &FrameStack {
        &self.stack
    }

    pub fn calibration(&self) -> HueCalibration {
        self.calibration
    }

    pub fn aggregation(&self) -> PeakAggregation {
        self.aggregation
    }

    pub fn set_aggregation(&mut self, aggregation: PeakAggregation) {
        self.aggregation = aggregation;
    }

    /// Partial parameter update; `None` keeps the prior value.
    pub fn set_parameters(
        &mut self,
        hue_multiplier: Option<f32>,
        hue_constant: Option<f32>,
        value_multiplier: Option<f32>,
    ) {
        if let Some(m) = hue_multiplier {
            self.calibration.hue_multiplier = m;
        }
        if let Some(c) = hue_constant {
            self.calibration.hue_constant = c;
        }
        if let Some(v) = value_multiplier {
            self.calibration.value_multiplier = v;
        }
    }

    /// Normalized time of peak activity at a pixel, in [0, 1].
    pub fn peak_time(&self, x: u32, y: u32) -> Result<f32, SceneError> {
        self.check_pixel(x, y)?;
        let n = self.stack.num_frames();
        if n == 1 {
            return Ok(0.0);
        }
        let time = match self.aggregation {
            PeakAggregation::ArgMax => {
                let mut best = 0usize;
                let mut best_value = f32::MIN;
                for t in 0..n {
                    let v = self.stack.intensity(t, x, y);
                    if v > best_value {
                        best_value = v;
                        best = t;
                    }
                }
                best as f32 / (n - 1) as f32
            }
            PeakAggregation::Centroid => {
                let mut weighted = 0.0f32;
                let mut total = 0.0f32;
                for t in 0..n {
                    let v = self.stack.intensity(t, x, y);
                    weighted += t as f32 * v;
                    total += v;
                }
                if total <= 0.0 {
                    0.0
                } else {
                    weighted / (total * (n - 1) as f32)
                }
            }
        };
        Ok(time)
    }

    /// Peak signal strength at a pixel, in [0, 1].
    pub fn peak_intensity(&self, x: u32, y: u32) -> Result<f32, SceneError> {
        self.check_pixel(x, y)?;
        let mut best = 0.0f32;
        for t in 0..self.stack.num_frames() {
            best = best.max(self.stack.intensity(t, x, y));
        }
        Ok(best)
    }

    /// Records one calibration extremum. The first pick is held until the
    /// second arrives; the pair then derives the hue mapping so the earlier
    /// raw hue lands on 0.0 and the later on 1.0. Degenerate pairs (equal or
    /// inverted raw hues) are rejected and the prior calibration kept.
    pub fn pick_hue(&mut self, pixel: (u32, u32)) -> Result<bool, SceneError> {
        self.check_pixel(pixel.0, pixel.1)?;
        let Some(low) = self.pending_low else {
            self.pending_low = Some(pixel);
            return Ok(false);
        };

        let h_low = self.peak_time(low.0, low.1)?;
        let h_high = self.peak_time(pixel.0, pixel.1)?;
        self.pending_low = None;
        if h_high <= h_low {
            return Err(SceneError::InvalidCalibration { low: h_low, high: h_high });
        }

        let hue_multiplier = 1.0 / (h_high - h_low);
        self.calibration.hue_multiplier = hue_multiplier;
        self.calibration.hue_constant = h_low * hue_multiplier;
        debug!(
            "pick_hue: {h_low:.3} -> 0, {h_high:.3} -> 1 (mult {:.3}, const {:.3})",
            self.calibration.hue_multiplier, self.calibration.hue_constant
        );
        Ok(true)
    }

    pub fn has_pending_pick(&self) -> bool {
        self.pending_low.is_some()
    }

    pub fn clear_pending_pick(&mut self) {
        self.pending_low = None;
    }

    /// Pure function of the frame stack and the current calibration.
    pub fn calculate_rgb_image(&self) -> RgbImage {
        let width = self.stack.width();
        let height = self.stack.height();
        let mut out = RgbImage::new(width, height);
        for y in 0..height {
            for x in 0..width {
                // Bounds were checked by construction; fall back to black on
                // the impossible path rather than unwrap.
                let raw = self.peak_time(x, y).unwrap_or(0.0);
                let strength = self.peak_intensity(x, y).unwrap_or(0.0);
                let hue = (raw * self.calibration.hue_multiplier - self.calibration.hue_constant)
                    .clamp(0.0, 1.0);
                let value = (strength * self.calibration.value_multiplier).clamp(0.0, 1.0);
                out.put_pixel(x, y, hsv_to_rgb(hue, SATURATION, value));
            }
        }
        out
    }

    fn check_pixel(&self, x: u32, y: u32) -> Result<(), SceneError> {
        if x >= self.stack.width() || y >= self.stack.height() {
            return Err(SceneError::PixelOutOfBounds {
                x,
                y,
                width: self.stack.width(),
                height: self.stack.height(),
            });
        }
        Ok(())
    }
}

/// Hue in [0, 1] over the full color circle, saturation and value in [0, 1].
pub fn hsv_to_rgb(hue: f32, saturation: f32, value: f32) -> Rgb<u8> {
    let h = (hue.clamp(0.0, 1.0) * 6.0).min(5.999_99);
    let sector = h as u32;
    let fraction = h - sector as f32;
    let p = value * (1.0 - saturation);
    let q = value * (1.0 - saturation * fraction);
    let t = value * (1.0 - saturation * (1.0 - fraction));
    let (r, g, b) = match sector {
        0 => (value, t, p),
        1 => (q, value, p),
        2 => (p, value, t),
        3 => (p, q, value),
        4 => (t, p, value),
        _ => (value, p, q),
    };
    Rgb([
        (r * 255.0).round() as u8,
        (g * 255.0).round() as u8,
        (b * 255.0).round() as u8,
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp_stack() -> FrameStack {
        // 4 frames, 2x2; pixel (x, y) peaks at frame x + 2 * y.
        let mut frames = vec![vec![0u8; 4]; 4];
        for (t, frame) in frames.iter_mut().enumerate() {
            frame[t] = 255;
        }
        FrameStack::from_grayscale_frames(frames, 2, 2).unwrap()
    }

    fn compositor(stack: FrameStack) -> TemporalFlowCompositor {
        TemporalFlowCompositor::new(stack, HueCalibration::default(), PeakAggregation::ArgMax)
    }

    #[test]
    fn calibration_round_trip_maps_picks_to_extremes() {
        // Raw hues 0.2 and 0.8 over a 6-frame stack.
        let mut frames = vec![vec![0u8; 2]; 6];
        frames[1][0] = 255; // pixel (0, 0) peaks at t = 1 -> raw 0.2
        frames[4][1] = 255; // pixel (1, 0) peaks at t = 4 -> raw 0.8
        let stack = FrameStack::from_grayscale_frames(frames, 2, 1).unwrap();
        let mut c = compositor(stack);

        assert!(!c.pick_hue((0, 0)).unwrap());
        assert!(c.pick_hue((1, 0)).unwrap());
        let cal = c.calibration();
        let map = |raw: f32| raw * cal.hue_multiplier - cal.hue_constant;
        assert!(map(0.2).abs() < 1e-5);
        assert!((map(0.8) - 1.0).abs() < 1e-5);
    }

    #[test]
    fn degenerate_picks_are_rejected_and_calibration_kept() {
        // Equal raw hues.
        let mut c = compositor(ramp_stack());
        c.set_parameters(Some(2.0), Some(0.25), None);
        let before = c.calibration();

        c.pick_hue((0, 0)).unwrap();
        let err = c.pick_hue((0, 0)).unwrap_err();
        assert!(matches!(err, SceneError::InvalidCalibration { .. }));
        assert_eq!(c.calibration(), before);
        assert!(!c.has_pending_pick());
    }

    #[test]
    fn inverted_picks_are_rejected() {
        let mut c = compositor(ramp_stack());
        let before = c.calibration();
        c.pick_hue((1, 1)).unwrap(); // raw 1.0
        let err = c.pick_hue((0, 0)).unwrap_err(); // raw 0.0
        assert!(matches!(err, SceneError::InvalidCalibration { .. }));
        assert_eq!(c.calibration(), before);
    }

    #[test]
    fn identical_frames_give_a_uniform_default_composite() {
        // 10 identical frames, default calibration.
        let frames = vec![vec![128u8; 9]; 10];
        let stack = FrameStack::from_grayscale_frames(frames, 3, 3).unwrap();
        let c = compositor(stack);
        assert_eq!(c.peak_time(1, 1).unwrap(), 0.0);
        let image = c.calculate_rgb_image();
        let first = image.get_pixel(0, 0);
        assert!(image.pixels().all(|p| p == first));
        // Hue 0 is red; value reflects the common intensity.
        let expected = hsv_to_rgb(0.0, 1.0, 128.0 / 255.0);
        assert_eq!(*first, expected);
    }

    #[test]
    fn set_parameters_updates_only_what_was_given() {
        let mut c = compositor(ramp_stack());
        c.set_parameters(Some(0.85), None, Some(0.85));
        let cal = c.calibration();
        assert_eq!(cal.hue_multiplier, 0.85);
        assert_eq!(cal.hue_constant, 0.0);
        assert_eq!(cal.value_multiplier, 0.85);
    }

    #[test]
    fn centroid_aggregation_of_flat_pixels_is_stable() {
        let frames = vec![vec![10u8; 1]; 5];
        let stack = FrameStack::from_grayscale_frames(frames, 1, 1).unwrap();
        let mut c = compositor(stack);
        c.set_aggregation(PeakAggregation::Centroid);
        // Uniform intensity centers at the middle of the sequence.
        assert!((c.peak_time(0, 0).unwrap() - 0.5).abs() < 1e-5);
    }

    #[test]
    fn dark_centroid_pixels_default_to_zero() {
        let frames = vec![vec![0u8; 1]; 5];
        let stack = FrameStack::from_grayscale_frames(frames, 1, 1).unwrap();
        let mut c = compositor(stack);
        c.set_aggregation(PeakAggregation::Centroid);
        assert_eq!(c.peak_time(0, 0).unwrap(), 0.0);
    }

    #[test]
    fn out_of_bounds_pixels_are_reported() {
        let c = compositor(ramp_stack());
        assert!(matches!(
            c.peak_time(5, 0),
            Err(SceneError::PixelOutOfBounds { .. })
        ));
    }

    #[test]
    fn empty_stack_is_rejected() {
        assert!(matches!(
            FrameStack::from_grayscale_frames(Vec::new(), 2, 2),
            Err(SceneError::EmptyFrameStack)
        ));
    }

    #[test]
    fn synthetic_stack_sweeps_peak_times_downward() {
        let stack = FrameStack::synthetic(4, 16, 8);
        let c = compositor(stack);
        let early = c.peak_time(0, 1).unwrap();
        let late = c.peak_time(0, 14).unwrap();
        assert!(late > early);
    }

    #[test]
    fn hsv_conversion_hits_the_primaries() {
        assert_eq!(hsv_to_rgb(0.0, 1.0, 1.0), Rgb([255, 0, 0]));
        assert_eq!(hsv_to_rgb(1.0 / 3.0, 1.0, 1.0), Rgb([0, 255, 0]));
        assert_eq!(hsv_to_rgb(2.0 / 3.0, 1.0, 1.0), Rgb([0, 0, 255]));
        assert_eq!(hsv_to_rgb(0.5, 0.0, 1.0), Rgb([255, 255, 255]));
    }
}
