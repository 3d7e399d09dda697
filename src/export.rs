// idcard-sheets: raster and PDF output

use crate::error::AppError;
use image::{Rgb, RgbImage, Rgba, RgbaImage};
use printpdf::{
    ColorBits, ColorSpace, Image, ImageTransform, ImageXObject, Mm, PdfDocument,
    PdfDocumentReference, PdfLayerReference, Px,
};
use std::collections::HashSet;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

const MM_PER_INCH: f32 = 25.4;

/// Output flavor for sheets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// One PNG per sheet
    Png,
    /// One single-page PDF per sheet
    Pdf,
    /// One PDF with a page per sheet
    PdfDocument,
}

// ============================================================================
// File Naming
// ============================================================================

/// `ID_Cards_Sheet_<n>.<ext>` with a 1-based sheet number.
pub fn sheet_file_name(sheet_num: usize, extension: &str) -> String {
    format!("ID_Cards_Sheet_{}.{}", sheet_num + 1, extension)
}

/// `ID_Card_<name>.png` with the name reduced to filename-safe characters.
pub fn card_file_name(name: &str) -> String {
    format!("ID_Card_{}.png", card_stem(name))
}

fn card_stem(name: &str) -> String {
    let sanitized = name
        .trim()
        .replace(' ', "_")
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '_' || *c == '-')
        .collect::<String>();
    if sanitized.is_empty() {
        "unnamed".to_string()
    } else {
        sanitized
    }
}

/// Hands out card file names that are unique within one output directory.
///
/// A repeated name gets its 1-based roster row appended:
/// `ID_Card_<name>_<row>.png`.
#[derive(Debug, Default)]
pub struct CardFileNames {
    used: HashSet<String>,
}

impl CardFileNames {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn assign(&mut self, name: &str, index: usize) -> String {
        let plain = card_file_name(name);
        if self.used.insert(plain.clone()) {
            return plain;
        }

        // Name taken; qualify with the row, then a counter if even that clashes
        let stem = card_stem(name);
        let mut candidate = format!("ID_Card_{}_{}.png", stem, index + 1);
        let mut extra = 2;
        while !self.used.insert(candidate.clone()) {
            candidate = format!("ID_Card_{}_{}_{}.png", stem, index + 1, extra);
            extra += 1;
        }
        log::warn!(
            "Row {}: {} already written; saving as {}",
            index + 1,
            plain,
            candidate
        );
        candidate
    }
}

// ============================================================================
// Raster Output
// ============================================================================

/// Composite against a white background, dropping alpha.
pub fn flatten_on_white(image: &RgbaImage) -> RgbImage {
    let (width, height) = image.dimensions();
    let mut rgb_image = RgbImage::new(width, height);
    for (x, y, pixel) in image.enumerate_pixels() {
        let Rgba([r, g, b, a]) = *pixel;
        let alpha = a as f32 / 255.0;
        let bg = 255.0;
        let out_r = (r as f32 * alpha + bg * (1.0 - alpha)).round() as u8;
        let out_g = (g as f32 * alpha + bg * (1.0 - alpha)).round() as u8;
        let out_b = (b as f32 * alpha + bg * (1.0 - alpha)).round() as u8;
        rgb_image.put_pixel(x, y, Rgb([out_r, out_g, out_b]));
    }
    rgb_image
}

pub fn save_png(image: &RgbaImage, path: &Path) -> Result<(), AppError> {
    flatten_on_white(image)
        .save(path)
        .map_err(|e| AppError::ExportError(format!("{}: {}", path.display(), e)))
}

// ============================================================================
// PDF Output
// ============================================================================

fn px_to_mm(px: u32, dpi: f32) -> f32 {
    px as f32 / dpi * MM_PER_INCH
}

/// Collects sheets as full-bleed PDF pages sized from the pixel canvas at `dpi`.
pub struct PdfSheetWriter {
    title: String,
    dpi: f32,
    doc: Option<PdfDocumentReference>,
    pages: usize,
}

impl PdfSheetWriter {
    pub fn new(title: &str, dpi: f32) -> Self {
        Self {
            title: title.to_string(),
            dpi,
            doc: None,
            pages: 0,
        }
    }

    pub fn pages(&self) -> usize {
        self.pages
    }

    pub fn add_page(&mut self, canvas: &RgbaImage) {
        let (width, height) = canvas.dimensions();
        let (page_w, page_h) = (Mm(px_to_mm(width, self.dpi)), Mm(px_to_mm(height, self.dpi)));

        // First page creates the document
        let layer = match &self.doc {
            Some(doc) => {
                let (page, layer) = doc.add_page(page_w, page_h, "Layer 1");
                doc.get_page(page).get_layer(layer)
            }
            None => {
                let (doc, page, layer) = PdfDocument::new(self.title.as_str(), page_w, page_h, "Layer 1");
                let layer_ref = doc.get_page(page).get_layer(layer);
                self.doc = Some(doc);
                layer_ref
            }
        };
        embed_sheet(&layer, canvas, self.dpi);
        self.pages += 1;
    }

    /// Write the document. Nothing is written when no page was added.
    pub fn save(self, path: &Path) -> Result<(), AppError> {
        let Some(doc) = self.doc else {
            return Ok(());
        };
        // Save PDF
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        doc.save(&mut writer)
            .map_err(|e| AppError::PdfError(e.to_string()))
    }
}

fn embed_sheet(layer: &PdfLayerReference, canvas: &RgbaImage, dpi: f32) {
    // PDF images carry no alpha channel
    let rgb_image = flatten_on_white(canvas);
    let (width, height) = rgb_image.dimensions();

    // Create image XObject
    let image = Image::from(ImageXObject {
        width: Px(width as usize),
        height: Px(height as usize),
        color_space: ColorSpace::Rgb,
        bits_per_component: ColorBits::Bit8,
        interpolate: false,
        image_data: rgb_image.into_raw(),
        image_filter: None,
        clipping_bbox: None,
        smask: None,
    });

    // Full bleed from the bottom-left corner
    image.add_to_layer(
        layer.clone(),
        ImageTransform {
            translate_x: Some(Mm(0.0)),
            translate_y: Some(Mm(0.0)),
            dpi: Some(dpi),
            ..Default::default()
        },
    );
}

/// Single-page PDF for one sheet.
pub fn save_pdf(canvas: &RgbaImage, path: &Path, dpi: f32) -> Result<(), AppError> {
    let mut writer = PdfSheetWriter::new("ID Cards", dpi);
    writer.add_page(canvas);
    writer.save(path)
}
