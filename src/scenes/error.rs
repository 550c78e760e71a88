use thiserror::Error;

#[derive(Debug, Error)]
pub enum SceneError {
    #[error("hue calibration extrema are degenerate: low {low}, high {high}")]
    InvalidCalibration { low: f32, high: f32 },
    #[error("frame stack contains no frames")]
    EmptyFrameStack,
    #[error("frame {index} is {actual_width}x{actual_height}, expected {width}x{height}")]
    FrameSizeMismatch {
        index: usize,
        width: u32,
        height: u32,
        actual_width: u32,
        actual_height: u32,
    },
    #[error("pixel ({x}, {y}) lies outside the {width}x{height} frame")]
    PixelOutOfBounds { x: u32, y: u32, width: u32, height: u32 },
    #[error("failed to load dataset: {0}")]
    Dataset(String),
    #[error("failed to render chart: {0}")]
    Chart(String),
}

impl<E: std::error::Error + Send + Sync + 'static> From<plotters::drawing::DrawingAreaErrorKind<E>>
    for SceneError
{
    fn from(value: plotters::drawing::DrawingAreaErrorKind<E>) -> Self {
        SceneError::Chart(format!("{value:?}"))
    }
}

impl From<image::ImageError> for SceneError {
    fn from(value: image::ImageError) -> Self {
        SceneError::Dataset(value.to_string())
    }
}
