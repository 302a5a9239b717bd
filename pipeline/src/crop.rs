//! Crop detection boxes out of the original (unadjusted) upload for display.

use image::{DynamicImage, GenericImageView, ImageFormat};
use std::io::Cursor;

use shared::{BoundingBox, EncodedImage, FlowerDetection};

use crate::error::{ImageError, ImageResult};
use crate::preprocess::decode;

/// Pixel rectangle after clipping a bounding box to the image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Clip `bbox` to a `width`x`height` image. Fractional edges grow outwards so
/// the whole box is covered.
pub fn clip(bbox: &BoundingBox, width: u32, height: u32) -> ImageResult<Region> {
    let left = bbox.x1.floor().max(0.0);
    let top = bbox.y1.floor().max(0.0);
    let right = bbox.x2.ceil().min(f64::from(width));
    let bottom = bbox.y2.ceil().min(f64::from(height));

    if !(right > left && bottom > top) {
        return Err(ImageError::EmptyRegion {
            x1: bbox.x1,
            y1: bbox.y1,
            x2: bbox.x2,
            y2: bbox.y2,
            width,
            height,
        });
    }

    Ok(Region {
        x: left as u32,
        y: top as u32,
        width: (right - left) as u32,
        height: (bottom - top) as u32,
    })
}

/// Crop `bbox` out of an encoded image, returning a PNG.
pub fn crop(source: &[u8], bbox: &BoundingBox) -> ImageResult<EncodedImage> {
    let image = decode(source)?;
    crop_decoded(&image, bbox)
}

pub fn crop_decoded(image: &DynamicImage, bbox: &BoundingBox) -> ImageResult<EncodedImage> {
    let (width, height) = image.dimensions();
    let region = clip(bbox, width, height)?;
    let cropped = image.crop_imm(region.x, region.y, region.width, region.height);

    let mut bytes = Vec::new();
    cropped
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .map_err(ImageError::Encode)?;
    Ok(EncodedImage {
        mime: "image/png".to_string(),
        width: region.width,
        height: region.height,
        bytes,
    })
}

/// Fill `crop_image` for every detection, decoding the original only once.
///
/// Fails on the first detection that cannot be cropped.
pub fn crop_all(source: &[u8], flowers: &mut [FlowerDetection]) -> ImageResult<()> {
    if flowers.is_empty() {
        return Ok(());
    }
    let image = decode(source)?;
    for flower in flowers.iter_mut() {
        flower.crop_image = Some(crop_decoded(&image, &flower.bbox)?);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};
    use shared::FinalClass;

    fn canvas(width: u32, height: u32) -> Vec<u8> {
        let img = RgbaImage::from_fn(width, height, |x, y| {
            if x >= 10 && y >= 10 {
                Rgba([255, 0, 0, 255])
            } else {
                Rgba([0, 0, 255, 255])
            }
        });
        let mut bytes = Vec::new();
        img.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        bytes
    }

    fn flower(bbox: BoundingBox) -> FlowerDetection {
        FlowerDetection {
            bbox,
            votes: Vec::new(),
            final_class: FinalClass {
                class_name: "daisy".into(),
                class_id: 0,
                confidence: 0.5,
                vote_count: 0,
            },
            crop_image: None,
        }
    }

    #[test]
    fn inside_box_keeps_exact_size() {
        let source = canvas(64, 48);
        for (x1, y1, x2, y2) in [(0.0, 0.0, 64.0, 48.0), (10.0, 10.0, 30.0, 25.0), (63.0, 47.0, 64.0, 48.0)] {
            let out = crop(&source, &BoundingBox::new(x1, y1, x2, y2)).unwrap();
            assert_eq!(
                (out.width, out.height),
                ((x2 - x1) as u32, (y2 - y1) as u32)
            );
            let decoded = image::load_from_memory(&out.bytes).unwrap();
            assert_eq!(decoded.dimensions(), (out.width, out.height));
        }
    }

    #[test]
    fn crop_reads_the_requested_pixels() {
        let out = crop(&canvas(40, 40), &BoundingBox::new(10.0, 10.0, 20.0, 20.0)).unwrap();
        let decoded = image::load_from_memory(&out.bytes).unwrap().to_rgba8();
        assert!(decoded.pixels().all(|p| p.0 == [255, 0, 0, 255]));
    }

    #[test]
    fn partially_outside_box_is_clipped() {
        let out = crop(&canvas(50, 40), &BoundingBox::new(-5.0, 30.0, 20.0, 70.0)).unwrap();
        assert_eq!((out.width, out.height), (20, 10));
    }

    #[test]
    fn fractional_edges_cover_the_box() {
        let region = clip(&BoundingBox::new(1.4, 2.6, 9.2, 7.0), 100, 100).unwrap();
        assert_eq!(
            region,
            Region {
                x: 1,
                y: 2,
                width: 9,
                height: 5
            }
        );
    }

    #[test]
    fn box_outside_image_is_empty() {
        let source = canvas(30, 30);
        for bbox in [
            BoundingBox::new(40.0, 40.0, 60.0, 60.0),
            BoundingBox::new(-20.0, 0.0, -1.0, 10.0),
            BoundingBox::new(0.0, 30.0, 10.0, 45.0),
        ] {
            let err = crop(&source, &bbox).unwrap_err();
            assert!(matches!(err, ImageError::EmptyRegion { width: 30, height: 30, .. }));
        }
    }

    #[test]
    fn crop_all_fills_every_detection() {
        let source = canvas(40, 40);
        let mut flowers = vec![
            flower(BoundingBox::new(0.0, 0.0, 10.0, 10.0)),
            flower(BoundingBox::new(10.0, 10.0, 40.0, 30.0)),
        ];
        crop_all(&source, &mut flowers).unwrap();
        let sizes: Vec<_> = flowers
            .iter()
            .map(|f| f.crop_image.as_ref().map(|c| (c.width, c.height)))
            .collect();
        assert_eq!(sizes, vec![Some((10, 10)), Some((30, 20))]);
    }

    #[test]
    fn crop_all_without_detections_skips_decoding() {
        crop_all(b"not an image", &mut []).unwrap();
    }
}
