//! PNG export of the electrode activity chart.

use std::io::Cursor;

use image::{DynamicImage, ImageBuffer, ImageFormat, Rgb};
use plotters::prelude::*;

use crate::scenes::electrodes::InterpolationEngine;
use crate::scenes::error::SceneError;

#[derive(Clone, Debug)]
pub struct ChartStyle {
    pub width: u32,
    pub height: u32,
    pub background: RGBColor,
    pub palette: Vec<RGBColor>,
}

impl Default for ChartStyle {
    fn default() -> Self {
        Self {
            width: 900,
            height: 400,
            background: RGBColor(10, 10, 15),
            palette: vec![CYAN, YELLOW, MAGENTA, GREEN, RED, BLUE, WHITE],
        }
    }
}

/// Renders every electrode's sample history as one line series per electrode.
pub fn render_history_png(
    engine: &InterpolationEngine,
    style: ChartStyle,
) -> Result<Vec<u8>, SceneError> {
    let series: Vec<(u32, Vec<(f32, f32)>)> = engine
        .histories()
        .map(|(id, history)| {
            (
                id,
                history
                    .samples()
                    .map(|(tick, value)| (tick as f32, value))
                    .collect(),
            )
        })
        .collect();
    if series.iter().all(|(_, points)| points.is_empty()) {
        return Err(SceneError::Chart("no electrode samples to plot".into()));
    }

    let t_max = series
        .iter()
        .flat_map(|(_, points)| points.iter().map(|(t, _)| *t))
        .fold(1.0f32, f32::max);

    let mut buffer = vec![0u8; (style.width * style.height * 3) as usize];
    {
        let root = BitMapBackend::with_buffer(&mut buffer, (style.width, style.height))
            .into_drawing_area();
        root.fill(&style.background)?;
        let mut chart = ChartBuilder::on(&root)
            .margin(10)
            .caption(
                "Electrode Activity",
                ("sans-serif", 20).into_font().color(&WHITE),
            )
            .set_label_area_size(LabelAreaPosition::Left, 45)
            .set_label_area_size(LabelAreaPosition::Bottom, 40)
            .build_cartesian_2d(0f32..t_max, -0.05f32..1.05f32)?;
        chart
            .configure_mesh()
            .light_line_style(&WHITE.mix(0.1))
            .draw()?;
        for (idx, (id, points)) in series.iter().enumerate() {
            let color = style.palette[idx % style.palette.len()];
            chart
                .draw_series(LineSeries::new(points.iter().copied(), &color))?
                .label(format!("E{id}"))
                .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], &color));
        }
        chart
            .configure_series_labels()
            .border_style(&WHITE.mix(0.2))
            .background_style(&style.background)
            .draw()?;
        root.present()?;
    }
    encode_png(&buffer, style.width, style.height)
}

fn encode_png(buffer: &[u8], width: u32, height: u32) -> Result<Vec<u8>, SceneError> {
    let image = ImageBuffer::<Rgb<u8>, _>::from_raw(width, height, buffer.to_vec())
        .ok_or_else(|| SceneError::Chart("failed to allocate image buffer".into()))?;
    let mut output = Vec::new();
    DynamicImage::ImageRgb8(image).write_to(&mut Cursor::new(&mut output), ImageFormat::Png)?;
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenes::electrodes::ValuePolicy;

    #[test]
    fn history_chart_renders_to_png() {
        let mut engine = InterpolationEngine::with_seed(ValuePolicy::default(), 32, 1);
        engine.add_electrode([0.0, 0.0, 10.0]);
        engine.add_electrode([5.0, 0.0, 10.0]);
        for _ in 0..10 {
            engine.tick();
        }
        let png = render_history_png(&engine, ChartStyle::default()).unwrap();
        assert!(!png.is_empty());
        // PNG signature.
        assert_eq!(&png[..4], &[0x89, b'P', b'N', b'G']);
    }

    #[test]
    fn chart_without_samples_is_an_error() {
        let engine = InterpolationEngine::with_seed(ValuePolicy::default(), 32, 1);
        assert!(matches!(
            render_history_png(&engine, ChartStyle::default()),
            Err(SceneError::Chart(_))
        ));
    }
}
