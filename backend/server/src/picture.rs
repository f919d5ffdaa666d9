//! # Image Processing
//!
//! Turns whatever the client uploaded into something the messaging network
//! accepts as a profile picture.
//!
//! - Input is a `data:` URL or bare base64
//! - Decoded with size limits so a tiny upload cannot expand into gigabytes
//! - Resized to an exact square, aspect ratio is **not** preserved
//! - Re-encoded as JPEG at a fixed quality
//!
//! Decoding and resizing are CPU bound, callers should run [`process_image`]
//! on the blocking pool.
use std::io::Cursor;

use base64::{Engine, engine::general_purpose::STANDARD};
use image::{ImageReader, Limits, codecs::jpeg::JpegEncoder, imageops::FilterType};
use thiserror::Error;

use crate::utils::strip_data_url;

const MAX_SIDE: u32 = 8192;

#[derive(Error, Debug)]
pub enum ImageError {
    #[error("Payload is not valid base64")]
    InvalidBase64,

    #[error("Could not decode image: {0}")]
    Decode(String),

    #[error("Could not encode image: {0}")]
    Encode(String),

    #[error("Image processing timed out")]
    TimedOut,
}

#[derive(Clone, Copy, Debug)]
pub struct ImageSpec {
    pub size: u32,
    pub quality: u8,
}

impl Default for ImageSpec {
    fn default() -> Self {
        Self {
            size: 640,
            quality: 90,
        }
    }
}

pub fn decode_payload(image_data: &str) -> Result<Vec<u8>, ImageError> {
    let payload = strip_data_url(image_data);

    if payload.is_empty() {
        return Err(ImageError::InvalidBase64);
    }

    STANDARD
        .decode(payload)
        .map_err(|_| ImageError::InvalidBase64)
}

pub fn process_image(bytes: &[u8], spec: ImageSpec) -> Result<Vec<u8>, ImageError> {
    let mut limits = Limits::default();
    limits.max_image_width = Some(MAX_SIDE);
    limits.max_image_height = Some(MAX_SIDE);

    let mut reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| ImageError::Decode(e.to_string()))?;
    reader.limits(limits);

    let decoded = reader
        .decode()
        .map_err(|e| ImageError::Decode(e.to_string()))?;

    let resized = decoded
        .resize_exact(spec.size, spec.size, FilterType::Lanczos3)
        .to_rgb8();

    let mut out = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut out, spec.quality);
    resized
        .write_with_encoder(encoder)
        .map_err(|e| ImageError::Encode(e.to_string()))?;

    Ok(out)
}

#[cfg(test)]
mod tests {
    use image::{ImageFormat, Rgb, RgbImage, RgbaImage};

    use super::*;

    fn sample_jpeg(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_fn(width, height, |x, y| {
            Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
        });

        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, ImageFormat::Jpeg).unwrap();
        out.into_inner()
    }

    #[test]
    fn test_resizes_to_square() {
        let output = process_image(&sample_jpeg(1200, 800), ImageSpec::default()).unwrap();

        let decoded = image::load_from_memory(&output).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (640, 640));
        assert_eq!(image::guess_format(&output).unwrap(), ImageFormat::Jpeg);
    }

    #[test]
    fn test_png_with_alpha() {
        let img = RgbaImage::from_pixel(300, 500, image::Rgba([10, 20, 30, 128]));
        let mut png = Cursor::new(Vec::new());
        img.write_to(&mut png, ImageFormat::Png).unwrap();

        let spec = ImageSpec {
            size: 128,
            quality: 75,
        };
        let output = process_image(png.get_ref(), spec).unwrap();

        let decoded = image::load_from_memory(&output).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (128, 128));
    }

    #[test]
    fn test_not_an_image() {
        let result = process_image(b"definitely not an image", ImageSpec::default());
        assert!(matches!(result, Err(ImageError::Decode(_))));
    }

    #[test]
    fn test_truncated_jpeg() {
        let jpeg = sample_jpeg(64, 64);
        let result = process_image(&jpeg[..jpeg.len() / 3], ImageSpec::default());
        assert!(result.is_err());
    }

    #[test]
    fn test_decode_payload() {
        assert_eq!(decode_payload("data:image/jpeg;base64,aGk=").unwrap(), b"hi");
        assert_eq!(decode_payload("aGk=").unwrap(), b"hi");
        assert!(matches!(decode_payload("data:image/jpeg;base64,@@@"), Err(ImageError::InvalidBase64)));
        assert!(matches!(decode_payload(""), Err(ImageError::InvalidBase64)));
    }
}
