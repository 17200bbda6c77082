use image::RgbImage;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnnotatorError {
    #[error("Failed to decode image: {0}")]
    InvalidImage(image::ImageError),
    #[error("No detections found in image")]
    NoDetections { unannotated: RgbImage },
    #[error("Failed to encode image: {0}")]
    EncodeFailed(image::ImageError),
    #[error("Failed to load font: {0}")]
    InvalidFont(#[from] ab_glyph::InvalidFont),
}
