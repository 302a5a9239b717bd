//! Brightness / contrast / grayscale adjustment of an upload before submission.
//!
//! The filter chain follows CSS `brightness() contrast() grayscale()` applied in
//! that order, each stage clamped to the displayable range. Alpha is untouched.

use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageFormat, RgbaImage};
use std::io::Cursor;

use shared::{EncodedImage, ProcessingParams};

use crate::config::{OutputFormat, ProcessingConfig};
use crate::error::{ImageError, ImageResult};

/// Decode `source`, apply `params` and re-encode with the configured format.
pub fn process(
    source: &[u8],
    params: &ProcessingParams,
    output: &ProcessingConfig,
) -> ImageResult<EncodedImage> {
    check_params(params)?;
    let image = decode(source)?;
    let adjusted = adjust(&image, params);
    encode(&adjusted, output)
}

pub fn check_params(params: &ProcessingParams) -> ImageResult<()> {
    match params.out_of_range() {
        Some(violation) => Err(ImageError::InvalidParameter {
            name: violation.name,
            value: violation.value,
            max: violation.max,
        }),
        None => Ok(()),
    }
}

pub fn decode(source: &[u8]) -> ImageResult<DynamicImage> {
    image::load_from_memory(source).map_err(ImageError::Decode)
}

/// Apply the filter chain to a decoded image. Dimensions are preserved exactly.
pub fn adjust(image: &DynamicImage, params: &ProcessingParams) -> RgbaImage {
    let mut pixels = image.to_rgba8();
    if params.is_identity() {
        return pixels;
    }

    let tone = tone_curve(params.brightness, params.contrast);
    let gray = GrayscaleMatrix::new(params.grayscale);

    for pixel in pixels.pixels_mut() {
        let [r, g, b, _] = &mut pixel.0;
        let adjusted = gray.apply([tone[*r as usize], tone[*g as usize], tone[*b as usize]]);
        *r = adjusted[0];
        *g = adjusted[1];
        *b = adjusted[2];
    }
    pixels
}

pub fn encode(pixels: &RgbaImage, output: &ProcessingConfig) -> ImageResult<EncodedImage> {
    let (width, height) = pixels.dimensions();
    let mut bytes = Vec::new();
    let mime = match output.output {
        OutputFormat::Jpeg => {
            // JPEG has no alpha channel; it is dropped like a canvas export would.
            let rgb = DynamicImage::ImageRgba8(pixels.clone()).to_rgb8();
            JpegEncoder::new_with_quality(&mut bytes, output.jpeg_quality)
                .encode_image(&rgb)
                .map_err(ImageError::Encode)?;
            "image/jpeg"
        }
        OutputFormat::Png => {
            pixels
                .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
                .map_err(ImageError::Encode)?;
            "image/png"
        }
    };
    Ok(EncodedImage {
        mime: mime.to_string(),
        width,
        height,
        bytes,
    })
}

/// Per-channel lookup table combining brightness then contrast.
fn tone_curve(brightness: u16, contrast: u16) -> [u8; 256] {
    let brightness = f32::from(brightness) / 100.0;
    let contrast = f32::from(contrast) / 100.0;
    let mut table = [0u8; 256];
    for (value, slot) in table.iter_mut().enumerate() {
        let c = (value as f32 / 255.0 * brightness).clamp(0.0, 1.0);
        let c = ((c - 0.5) * contrast + 0.5).clamp(0.0, 1.0);
        *slot = to_channel(c);
    }
    table
}

/// Filter Effects `grayscale(amount)` colour matrix.
struct GrayscaleMatrix {
    rows: [[f32; 3]; 3],
    identity: bool,
}

impl GrayscaleMatrix {
    fn new(grayscale: u16) -> Self {
        let a = 1.0 - f32::from(grayscale) / 100.0;
        Self {
            rows: [
                [0.2126 + 0.7874 * a, 0.7152 - 0.7152 * a, 0.0722 - 0.0722 * a],
                [0.2126 - 0.2126 * a, 0.7152 + 0.2848 * a, 0.0722 - 0.0722 * a],
                [0.2126 - 0.2126 * a, 0.7152 - 0.7152 * a, 0.0722 + 0.9278 * a],
            ],
            identity: grayscale == 0,
        }
    }

    fn apply(&self, rgb: [u8; 3]) -> [u8; 3] {
        if self.identity {
            return rgb;
        }
        let input = rgb.map(|c| f32::from(c) / 255.0);
        self.rows.map(|row| {
            let c = row[0] * input[0] + row[1] * input[1] + row[2] * input[2];
            to_channel(c.clamp(0.0, 1.0))
        })
    }
}

fn to_channel(c: f32) -> u8 {
    (c * 255.0).round() as u8
}
