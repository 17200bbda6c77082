use crate::error::AnnotatorError;
use image::{ImageFormat, ImageReader, RgbImage};
use std::io::Cursor;

/// Decodes uploaded bytes, guessing the format from the content.
pub fn decode_image(bytes: &[u8]) -> Result<RgbImage, AnnotatorError> {
    let image_reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| AnnotatorError::InvalidImage(image::ImageError::IoError(e)))?;

    let image = image_reader
        .decode()
        .map_err(AnnotatorError::InvalidImage)?;

    Ok(image.to_rgb8())
}

/// MIME type of the encoded image, sniffed from its leading bytes.
pub fn guess_content_type(bytes: &[u8]) -> Option<&'static str> {
    image::guess_format(bytes)
        .ok()
        .map(|format| format.to_mime_type())
}

pub fn encode_png(image: &RgbImage) -> Result<Vec<u8>, AnnotatorError> {
    let mut buffer = Cursor::new(Vec::new());
    image
        .write_to(&mut buffer, ImageFormat::Png)
        .map_err(AnnotatorError::EncodeFailed)?;
    Ok(buffer.into_inner())
}
