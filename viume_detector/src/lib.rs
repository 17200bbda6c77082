mod error;
mod model_service;
mod ort_service;

pub mod config;

pub use error::DetectorError;
pub use model_service::Detector;
pub use ort_service::{decode_yolov5_output, transform_image, OrtDetector, PostProcessing};
