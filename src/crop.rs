// idcard-sheets: region-of-interest cropping

use crate::error::CardError;
use crate::face::FaceBox;
use image::{imageops, imageops::FilterType, RgbImage};

/// Axis-aligned crop rectangle inside the source photo.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl CropRect {
    pub fn is_square(&self) -> bool {
        self.width == self.height
    }

    /// The largest centered square inside this rectangle.
    pub fn centered_square(&self) -> CropRect {
        let side = self.width.min(self.height);
        CropRect {
            x: self.x + (self.width - side) / 2,
            y: self.y + (self.height - side) / 2,
            width: side,
            height: side,
        }
    }
}

/// Centered square of side `min(width, height)`.
pub fn center_square(width: u32, height: u32) -> CropRect {
    CropRect {
        x: 0,
        y: 0,
        width,
        height,
    }
    .centered_square()
}

/// Square region around a face, padded by `padding_factor` face heights.
///
/// Only the origin is clamped to the image; the far edge is cut at the image
/// border rather than shifted, so a face near the right or bottom edge yields a
/// rectangle narrower than the requested square. Returns `None` when the face
/// leaves nothing inside the image.
pub fn face_crop(width: u32, height: u32, face: &FaceBox, padding_factor: f32) -> Option<CropRect> {
    let (w, h) = (width as i64, height as i64);
    let face_w = face.width() as i64;
    let face_h = face.height() as i64;
    if face_w <= 0 || face_h <= 0 {
        return None;
    }

    // Square side: larger face dimension plus padding, capped by the short image side
    let padding = (face_h as f64 * padding_factor as f64).round() as i64;
    let crop_size = (face_w.max(face_h) + 2 * padding).min(w.min(h));

    let center_x = (face.left as i64 + face.right as i64) / 2;
    let center_y = (face.top as i64 + face.bottom as i64) / 2;

    // Clamp the origin, cut the far edge
    let left = (center_x - crop_size / 2).clamp(0, w);
    let top = (center_y - crop_size / 2).clamp(0, h);
    let right = (left + crop_size).min(w);
    let bottom = (top + crop_size).min(h);

    if right <= left || bottom <= top {
        return None;
    }
    Some(CropRect {
        x: left as u32,
        y: top as u32,
        width: (right - left) as u32,
        height: (bottom - top) as u32,
    })
}

/// Region of interest for a photo: face-centered when a face is known,
/// otherwise the centered square.
pub fn region_of_interest(
    width: u32,
    height: u32,
    face: Option<&FaceBox>,
    padding_factor: f32,
) -> CropRect {
    match face.and_then(|f| face_crop(width, height, f, padding_factor)) {
        Some(rect) => rect,
        None => center_square(width, height),
    }
}

/// Crop the photo to its region of interest, square it, and resize to `size`.
pub fn crop_photo(
    photo: &RgbImage,
    face: Option<&FaceBox>,
    padding_factor: f32,
    size: u32,
) -> Result<RgbImage, CardError> {
    let (width, height) = photo.dimensions();
    if width == 0 || height == 0 {
        return Err(CardError::RenderError(format!(
            "photo has empty dimensions {}x{}",
            width, height
        )));
    }

    // Region of interest, squared
    let roi = region_of_interest(width, height, face, padding_factor);
    let square = roi.centered_square();
    log::debug!(
        "crop {:?} -> square {}x{} at ({}, {})",
        roi,
        square.width,
        square.height,
        square.x,
        square.y
    );
    debug_assert!(square.is_square());

    // Crop and resize
    let cropped = imageops::crop_imm(photo, square.x, square.y, square.width, square.height).to_image();
    Ok(imageops::resize(&cropped, size, size, FilterType::Lanczos3))
}
