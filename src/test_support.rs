//! Helpers shared by unit tests.

use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use std::io::Cursor;

/// Encode a `width`x`height` image whose pixels depend on `seed`, so
/// different seeds give different bytes.
pub fn encoded_image(width: u32, height: u32, seed: u8, format: ImageFormat) -> Vec<u8> {
    let img = RgbImage::from_fn(width, height, |x, y| {
        Rgb([seed, (x % 256) as u8, (y % 256) as u8])
    });
    let mut buf = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(img)
        .write_to(&mut buf, format)
        .expect("encode test image");
    buf.into_inner()
}

pub fn png_bytes(width: u32, height: u32, seed: u8) -> Vec<u8> {
    encoded_image(width, height, seed, ImageFormat::Png)
}
