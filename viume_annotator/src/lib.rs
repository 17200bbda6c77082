mod annotator;
mod chart;
mod color;
mod detection;
mod error;
mod fonts;
mod image_utils;
mod registry;
mod tally;

pub use annotator::{Annotation, Annotator};
pub use chart::BarChart;
pub use color::{DrawColor, UnknownColor};
pub use detection::{BoundingBox, Detection};
pub use error::AnnotatorError;
pub use fonts::embedded_font;
pub use image_utils::{decode_image, encode_png, guess_content_type};
pub use registry::{ClassInfo, ClassRegistry, RegistryError};
pub use tally::{ClassPercentage, DetectionCounts, PercentageTable};
