// idcard-sheets: face location

use image::{imageops, RgbImage};
use rustface::{Detector, ImageData};
use std::path::Path;
use std::sync::Mutex;

/// Face region in source-photo pixel coordinates. `right` and `bottom` are exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FaceBox {
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
    pub left: i32,
}

impl FaceBox {
    pub fn width(&self) -> i32 {
        self.right - self.left
    }

    pub fn height(&self) -> i32 {
        self.bottom - self.top
    }

    pub fn area(&self) -> i64 {
        self.width().max(0) as i64 * self.height().max(0) as i64
    }
}

/// Finds faces in a decoded photo. An empty result is a miss, not an error.
pub trait FaceLocator {
    fn locate(&self, image: &RgbImage) -> Vec<FaceBox>;
}

/// Never finds a face, so every photo takes the center-crop path.
pub struct NoFaceLocator;

impl FaceLocator for NoFaceLocator {
    fn locate(&self, _image: &RgbImage) -> Vec<FaceBox> {
        Vec::new()
    }
}

/// Which detected face drives the crop when several are found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum FaceSelection {
    /// Whatever the detector lists first
    #[default]
    First,
    /// The largest box; ties go to the earlier detection
    Largest,
}

pub fn primary_face(faces: &[FaceBox], selection: FaceSelection) -> Option<FaceBox> {
    match selection {
        FaceSelection::First => faces.first().copied(),
        FaceSelection::Largest => faces
            .iter()
            .copied()
            .reduce(|best, face| if face.area() > best.area() { face } else { best }),
    }
}

// ============================================================================
// SeetaFace detector
// ============================================================================

/// Face locator backed by a SeetaFace frontal model.
pub struct RustfaceLocator {
    detector: Mutex<Box<dyn Detector>>,
}

impl RustfaceLocator {
    pub fn load(model_path: &Path) -> Result<Self, String> {
        let path = model_path
            .to_str()
            .ok_or_else(|| format!("non UTF-8 model path {}", model_path.display()))?;
        let mut detector = rustface::create_detector(path)
            .map_err(|e| format!("Failed to load face detector: {}", e))?;
        detector.set_min_face_size(20);
        detector.set_score_thresh(2.0);
        detector.set_pyramid_scale_factor(0.8);
        detector.set_slide_window_step(4, 4);
        Ok(Self {
            detector: Mutex::new(detector),
        })
    }
}

impl FaceLocator for RustfaceLocator {
    fn locate(&self, image: &RgbImage) -> Vec<FaceBox> {
        let (width, height) = image.dimensions();
        let gray = imageops::grayscale(image);
        let image_data = ImageData::new(gray.as_raw(), width, height);

        let Ok(mut detector) = self.detector.lock() else {
            log::warn!("face detector unavailable after an earlier panic");
            return Vec::new();
        };
        detector
            .detect(&image_data)
            .iter()
            .filter_map(|face| {
                let bbox = face.bbox();
                clamp_to_image(
                    FaceBox {
                        top: bbox.y(),
                        right: bbox.x() + bbox.width() as i32,
                        bottom: bbox.y() + bbox.height() as i32,
                        left: bbox.x(),
                    },
                    width,
                    height,
                )
            })
            .collect()
    }
}

/// Clip a detector box to the image; boxes with nothing left are dropped.
fn clamp_to_image(face: FaceBox, width: u32, height: u32) -> Option<FaceBox> {
    let clamped = FaceBox {
        top: face.top.clamp(0, height as i32),
        right: face.right.clamp(0, width as i32),
        bottom: face.bottom.clamp(0, height as i32),
        left: face.left.clamp(0, width as i32),
    };
    (clamped.width() > 0 && clamped.height() > 0).then_some(clamped)
}
