//! Detection overlay: every bbox outlined on the original image, one hue per
//! detection, with a `Class {id} ({confidence}%)` tab on the box's top edge.

use font8x8::{UnicodeFonts, BASIC_FONTS};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut};
use imageproc::rect::Rect;
use image::{ImageFormat, Rgba, RgbaImage};
use std::io::Cursor;

use shared::{AnalysisResult, EncodedImage, FinalClass};

use crate::error::{ImageError, ImageResult};
use crate::preprocess::decode;

const LINE_WIDTH: i32 = 2;
const GLYPH: i32 = 8;
const LABEL_PADDING: i32 = 2;
const LABEL_HEIGHT: i32 = GLYPH + 2 * LABEL_PADDING;
const LABEL_TEXT: Rgba<u8> = Rgba([255, 255, 255, 255]);

pub fn annotate(source: &[u8], result: &AnalysisResult) -> ImageResult<EncodedImage> {
    let mut canvas = decode(source)?.to_rgba8();
    let (width, height) = canvas.dimensions();
    let count = result.flowers.len();

    for (index, flower) in result.flowers.iter().enumerate() {
        let bbox = &flower.bbox;
        let x_min = (bbox.x1.round() as i32).clamp(0, width as i32);
        let y_min = (bbox.y1.round() as i32).clamp(0, height as i32);
        let x_max = (bbox.x2.round() as i32).clamp(0, width as i32);
        let y_max = (bbox.y2.round() as i32).clamp(0, height as i32);
        if x_max <= x_min || y_max <= y_min {
            log::debug!("Skipping overlay for detection {index}: box outside image");
            continue;
        }
        let color = detection_color(index, count);
        for inset in 0..LINE_WIDTH {
            let w = x_max - x_min - 2 * inset;
            let h = y_max - y_min - 2 * inset;
            if w <= 0 || h <= 0 {
                break;
            }
            let rect = Rect::at(x_min + inset, y_min + inset).of_size(w as u32, h as u32);
            draw_hollow_rect_mut(&mut canvas, rect, color);
        }
        draw_label(&mut canvas, x_min, y_min, &label_text(&flower.final_class), color);
    }

    let mut bytes = Vec::new();
    canvas
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .map_err(ImageError::Encode)?;
    Ok(EncodedImage {
        mime: "image/png".to_string(),
        width,
        height,
        bytes,
    })
}

pub fn label_text(class: &FinalClass) -> String {
    format!("Class {} ({:.1}%)", class.class_id, class.confidence * 100.0)
}

/// Top-left corner of the label tab: above the box, or just inside it when
/// the box touches the top of the image.
pub fn label_origin(x_min: i32, y_min: i32) -> (i32, i32) {
    if y_min >= LABEL_HEIGHT {
        (x_min, y_min - LABEL_HEIGHT)
    } else {
        (x_min, y_min)
    }
}

fn draw_label(canvas: &mut RgbaImage, x_min: i32, y_min: i32, text: &str, color: Rgba<u8>) {
    let (x, y) = label_origin(x_min, y_min);
    let width = text.chars().count() as i32 * GLYPH + 2 * LABEL_PADDING;
    draw_filled_rect_mut(canvas, Rect::at(x, y).of_size(width as u32, LABEL_HEIGHT as u32), color);

    let (canvas_width, canvas_height) = canvas.dimensions();
    let mut cursor = x + LABEL_PADDING;
    for ch in text.chars() {
        let Some(glyph) = BASIC_FONTS.get(ch).or_else(|| BASIC_FONTS.get('?')) else {
            cursor += GLYPH;
            continue;
        };
        for (row, bits) in glyph.iter().enumerate() {
            for col in 0..GLYPH {
                if (bits >> col) & 1 == 0 {
                    continue;
                }
                let px = cursor + col;
                let py = y + LABEL_PADDING + row as i32;
                if px >= 0 && py >= 0 && (px as u32) < canvas_width && (py as u32) < canvas_height {
                    canvas.put_pixel(px as u32, py as u32, LABEL_TEXT);
                }
            }
        }
        cursor += GLYPH;
    }
}

/// `hsl(index * 360 / count, 70%, 50%)`.
pub fn detection_color(index: usize, count: usize) -> Rgba<u8> {
    let hue = if count == 0 {
        0.0
    } else {
        index as f32 * 360.0 / count as f32
    };
    let [r, g, b] = hsl_to_rgb(hue, 0.7, 0.5);
    Rgba([r, g, b, 255])
}

fn hsl_to_rgb(hue: f32, saturation: f32, lightness: f32) -> [u8; 3] {
    let chroma = (1.0 - (2.0 * lightness - 1.0).abs()) * saturation;
    let sector = (hue % 360.0) / 60.0;
    let x = chroma * (1.0 - (sector % 2.0 - 1.0).abs());
    let (r, g, b) = match sector as u32 {
        0 => (chroma, x, 0.0),
        1 => (x, chroma, 0.0),
        2 => (0.0, chroma, x),
        3 => (0.0, x, chroma),
        4 => (x, 0.0, chroma),
        _ => (chroma, 0.0, x),
    };
    let m = lightness - chroma / 2.0;
    [r, g, b].map(|c| ((c + m) * 255.0).round() as u8)
}
