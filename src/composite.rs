// idcard-sheets: circular photo aperture and blending onto the card

use crate::config::Anchor;
use image::{imageops, GrayImage, Luma, Rgba, RgbImage, RgbaImage};
use imageproc::drawing::draw_filled_ellipse_mut;

/// Opaque ellipse inscribed in a `size` x `size` mask, transparent elsewhere.
pub fn circular_mask(size: u32) -> GrayImage {
    let mut mask = GrayImage::new(size, size);
    let radius = (size / 2) as i32;
    draw_filled_ellipse_mut(&mut mask, (radius, radius), radius, radius, Luma([255u8]));
    mask
}

/// Use `mask` as the alpha channel of `photo`.
pub fn apply_aperture(photo: &RgbImage, mask: &GrayImage) -> RgbaImage {
    debug_assert_eq!(photo.dimensions(), mask.dimensions());
    let mut layer = RgbaImage::new(photo.width(), photo.height());
    for ((out, rgb), alpha) in layer.pixels_mut().zip(photo.pixels()).zip(mask.pixels()) {
        let [r, g, b] = rgb.0;
        *out = Rgba([r, g, b, alpha.0[0]]);
    }
    layer
}

/// Source-over blend of `layer` centered on `anchor`.
pub fn paste_centered(card: &mut RgbaImage, layer: &RgbaImage, anchor: Anchor) {
    let x = anchor.x as i64 - (layer.width() / 2) as i64;
    let y = anchor.y as i64 - (layer.height() / 2) as i64;
    imageops::overlay(card, layer, x, y);
}

/// Clip a square photo to a circle and blend it onto the card.
pub fn composite_photo(card: &mut RgbaImage, photo: &RgbImage, anchor: Anchor) {
    let mask = circular_mask(photo.width());
    let layer = apply_aperture(photo, &mask);
    paste_centered(card, &layer, anchor);
}
