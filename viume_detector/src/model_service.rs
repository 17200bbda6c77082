use crate::error::DetectorError;
use image::RgbImage;
use viume_annotator::Detection;

/// Object detector producing boxes in the pixel space of the given image.
///
/// Implementations are called from blocking worker threads and may be
/// shared between concurrent requests.
pub trait Detector: Send + Sync + 'static {
    fn detect(&self, image: &RgbImage) -> Result<Vec<Detection>, DetectorError>;
}
