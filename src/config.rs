// idcard-sheets: card and sheet layout configuration

use crate::error::AppError;
use crate::sheet::GridGeometry;
use image::Rgba;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;

// ============================================================================
// Constants
// ============================================================================

/// Print sheet dimensions in pixels (13 x 19 in at 300 DPI)
pub const SHEET_WIDTH_PX: u32 = 3900;
pub const SHEET_HEIGHT_PX: u32 = 5700;

/// Export resolution
pub const DEFAULT_DPI: f32 = 300.0;

/// Font sizes as a fraction of card height
const NAME_FONT_FRACTION: f32 = 0.072;
const LABEL_FONT_FRACTION: f32 = 0.032;

/// Badge padding in pixels
const BADGE_H_PAD: u32 = 30;
const BADGE_V_PAD: u32 = 20;
const WRAPPED_V_PAD: u32 = 3;

/// Multi-line badge spacing
const LINE_SPACING: f32 = 1.2;
const WRAP_MARGIN: u32 = 50;

// ============================================================================
// Colors and Anchors
// ============================================================================

/// An opaque RGB fill, written as `"#rrggbb"` in layout files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Color(pub [u8; 3]);

impl Color {
    pub const WHITE: Color = Color([255, 255, 255]);

    pub fn rgba(self) -> Rgba<u8> {
        let [r, g, b] = self.0;
        Rgba([r, g, b, 255])
    }
}

impl FromStr for Color {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex = s.trim().trim_start_matches('#');
        if hex.len() != 6 || !hex.is_ascii() {
            return Err(format!("invalid color: {}", s));
        }
        let channel = |i: usize| {
            u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| format!("invalid color: {}", s))
        };
        Ok(Color([channel(0)?, channel(2)?, channel(4)?]))
    }
}

impl TryFrom<String> for Color {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Color> for String {
    fn from(color: Color) -> Self {
        let [r, g, b] = color.0;
        format!("#{:02x}{:02x}{:02x}", r, g, b)
    }
}

/// The point a field's visual center is aligned to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Anchor {
    pub x: i32,
    pub y: i32,
}

impl Anchor {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

// ============================================================================
// Breakpoint Table
// ============================================================================

/// One tier: names up to `max_len` characters use `scale`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Breakpoint {
    pub max_len: usize,
    pub scale: f32,
}

/// Ordered name-length tiers plus a catch-all scale for longer names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreakpointTable {
    #[serde(default)]
    pub tiers: Vec<Breakpoint>,
    pub fallback: f32,
}

impl BreakpointTable {
    /// A table that never scales.
    pub fn flat() -> Self {
        Self {
            tiers: Vec::new(),
            fallback: 1.0,
        }
    }

    pub fn scale_for(&self, len: usize) -> f32 {
        self.tiers
            .iter()
            .find(|tier| len <= tier.max_len)
            .map(|tier| tier.scale)
            .unwrap_or(self.fallback)
    }

    fn validate(&self) -> Result<(), AppError> {
        if self.tiers.windows(2).any(|w| w[0].max_len >= w[1].max_len) {
            return Err(AppError::LayoutError(
                "breakpoint thresholds must be strictly increasing".to_string(),
            ));
        }
        let scales = self.tiers.iter().map(|t| t.scale).chain([self.fallback]);
        for scale in scales {
            if !(scale > 0.0) {
                return Err(AppError::LayoutError(format!(
                    "breakpoint scale must be positive, got {}",
                    scale
                )));
            }
        }
        Ok(())
    }
}

// ============================================================================
// Card Slots
// ============================================================================

/// Circular photo aperture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhotoSlot {
    pub anchor: Anchor,
    /// Side length of the square photo and its aperture mask.
    pub size: u32,
    /// Padding around a detected face, as a multiple of the face height.
    pub face_padding: f32,
    /// Run the face locator; when false every photo is center-cropped.
    #[serde(default = "default_true")]
    pub detect_faces: bool,
}

/// Display name, auto-scaled by length.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NameSlot {
    pub anchor: Anchor,
    pub font_fraction: f32,
    pub color: Color,
    pub breakpoints: BreakpointTable,
}

/// Where a badge gets its text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum LabelSource {
    /// The roster row's category field.
    Category,
    /// The same text on every card.
    Literal { text: String },
}

impl LabelSource {
    pub fn resolve<'a>(&'a self, category: &'a str) -> &'a str {
        match self {
            LabelSource::Category => category,
            LabelSource::Literal { text } => text,
        }
    }
}

/// Single-line label drawn over a rounded badge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BadgeSlot {
    pub anchor: Anchor,
    pub label: LabelSource,
    pub font_fraction: f32,
    pub text_color: Color,
    pub fill: Color,
    pub corner_radius: u32,
    pub h_pad: u32,
    pub v_pad: u32,
}

/// Word-wrapped label drawn over a rounded badge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WrappedSlot {
    pub anchor: Anchor,
    pub font_fraction: f32,
    pub text_color: Color,
    pub fill: Color,
    pub corner_radius: u32,
    /// Horizontal margin on each side of the card that text may not enter.
    pub margin: u32,
    pub h_pad: u32,
    pub v_pad: u32,
    pub line_spacing: f32,
}

fn default_true() -> bool {
    true
}

// ============================================================================
// Card and Sheet Layout
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardLayout {
    pub width: u32,
    pub height: u32,
    /// Fill used when no template bitmap is supplied.
    pub background: Color,
    pub photo: PhotoSlot,
    pub name: NameSlot,
    #[serde(default)]
    pub category: Option<BadgeSlot>,
    #[serde(default)]
    pub organization: Option<WrappedSlot>,
}

impl CardLayout {
    /// True when `anchor` lies on the card, edges included.
    pub fn contains(&self, anchor: Anchor) -> bool {
        (0..=self.width as i64).contains(&(anchor.x as i64))
            && (0..=self.height as i64).contains(&(anchor.y as i64))
    }

    /// Pixel font size for a fraction of the card height, scaled.
    pub fn font_px(&self, fraction: f32, scale: f32) -> f32 {
        (self.height as f32 * fraction * scale).round().max(1.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SheetLayout {
    pub width: u32,
    pub height: u32,
    pub rows: u32,
    pub columns: u32,
    /// Explicit gaps; when absent the leftover space is split evenly.
    #[serde(default)]
    pub h_pad: Option<u32>,
    #[serde(default)]
    pub v_pad: Option<u32>,
    pub background: Color,
    pub dpi: f32,
}

impl SheetLayout {
    /// Resolve the grid for cards of the given size.
    pub fn grid(&self, card_width: u32, card_height: u32) -> Result<GridGeometry, AppError> {
        if self.rows == 0 || self.columns == 0 {
            return Err(AppError::LayoutError(
                "sheet grid needs at least one row and column".to_string(),
            ));
        }
        let used_w = card_width as u64 * self.columns as u64;
        let used_h = card_height as u64 * self.rows as u64;
        if used_w > self.width as u64 || used_h > self.height as u64 {
            return Err(AppError::LayoutError(format!(
                "{}x{} grid of {}x{} cards does not fit a {}x{} sheet",
                self.columns, self.rows, card_width, card_height, self.width, self.height
            )));
        }
        let h_pad = self
            .h_pad
            .unwrap_or(((self.width as u64 - used_w) / (self.columns as u64 + 1)) as u32);
        let v_pad = self
            .v_pad
            .unwrap_or(((self.height as u64 - used_h) / (self.rows as u64 + 1)) as u32);

        let grid = GridGeometry {
            rows: self.rows,
            columns: self.columns,
            h_pad,
            v_pad,
            card_width,
            card_height,
        };
        let (span_w, span_h) = grid.extent();
        if span_w > self.width as u64 || span_h > self.height as u64 {
            return Err(AppError::LayoutError(format!(
                "padded grid {}x{} exceeds sheet {}x{}",
                span_w, span_h, self.width, self.height
            )));
        }
        Ok(grid)
    }
}

/// Full layout: one card variant plus the sheet it is tiled onto.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutConfig {
    pub card: CardLayout,
    pub sheet: SheetLayout,
}

/// Built-in card variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Preset {
    /// Photo, name and a category badge taken from the roster
    Classic,
    /// Photo, length-scaled name, "Volunteer" badge and wrapped organization badge
    Volunteer,
}

impl Preset {
    pub fn layout(self) -> LayoutConfig {
        match self {
            Preset::Classic => LayoutConfig::classic(),
            Preset::Volunteer => LayoutConfig::volunteer(),
        }
    }
}

impl LayoutConfig {
    pub fn classic() -> Self {
        Self {
            card: CardLayout {
                width: 630,
                height: 1080,
                background: Color([0x3B, 0x1F, 0x00]),
                photo: PhotoSlot {
                    anchor: Anchor::new(315, 575),
                    size: 435,
                    face_padding: 1.2,
                    detect_faces: false,
                },
                name: NameSlot {
                    anchor: Anchor::new(315, 850),
                    font_fraction: NAME_FONT_FRACTION,
                    color: Color::WHITE,
                    breakpoints: BreakpointTable::flat(),
                },
                category: Some(BadgeSlot {
                    anchor: Anchor::new(315, 940),
                    label: LabelSource::Category,
                    font_fraction: LABEL_FONT_FRACTION,
                    text_color: Color::WHITE,
                    fill: Color([0xA7, 0x59, 0x00]),
                    corner_radius: 20,
                    h_pad: BADGE_H_PAD,
                    v_pad: BADGE_V_PAD,
                }),
                organization: None,
            },
            sheet: default_sheet(),
        }
    }

    pub fn volunteer() -> Self {
        Self {
            card: CardLayout {
                width: 768,
                height: 1299,
                background: Color([0x3B, 0x1F, 0x00]),
                photo: PhotoSlot {
                    anchor: Anchor::new(384, 700),
                    size: 512,
                    face_padding: 1.5,
                    detect_faces: true,
                },
                name: NameSlot {
                    anchor: Anchor::new(390, 990),
                    font_fraction: NAME_FONT_FRACTION,
                    color: Color::WHITE,
                    breakpoints: BreakpointTable {
                        tiers: vec![
                            Breakpoint { max_len: 13, scale: 1.0 },
                            Breakpoint { max_len: 15, scale: 0.85 },
                            Breakpoint { max_len: 19, scale: 0.80 },
                        ],
                        fallback: 0.65,
                    },
                },
                category: Some(BadgeSlot {
                    anchor: Anchor::new(390, 1095),
                    label: LabelSource::Literal {
                        text: "Volunteer".to_string(),
                    },
                    font_fraction: LABEL_FONT_FRACTION,
                    text_color: Color::WHITE,
                    fill: Color([0x69, 0x38, 0x00]),
                    corner_radius: 15,
                    h_pad: BADGE_H_PAD,
                    v_pad: BADGE_V_PAD,
                }),
                organization: Some(WrappedSlot {
                    anchor: Anchor::new(390, 1160),
                    font_fraction: LABEL_FONT_FRACTION,
                    text_color: Color([0xE3, 0x49, 0x00]),
                    fill: Color::WHITE,
                    corner_radius: 15,
                    margin: WRAP_MARGIN,
                    h_pad: BADGE_H_PAD,
                    v_pad: WRAPPED_V_PAD,
                    line_spacing: LINE_SPACING,
                }),
            },
            sheet: default_sheet(),
        }
    }

    /// Check the layout before any card is rendered.
    pub fn validate(&self) -> Result<GridGeometry, AppError> {
        let card = &self.card;
        if card.width == 0 || card.height == 0 {
            return Err(AppError::LayoutError("card dimensions must be non-zero".to_string()));
        }
        if card.photo.size == 0 {
            return Err(AppError::LayoutError("photo size must be non-zero".to_string()));
        }
        if !(card.photo.face_padding >= 0.0) {
            return Err(AppError::LayoutError(
                "face padding multiplier must be non-negative".to_string(),
            ));
        }
        card.name.breakpoints.validate()?;

        // Anchors and paddings feed i32 text geometry; keep them on the card.
        let mut anchors = vec![("photo", card.photo.anchor), ("name", card.name.anchor)];
        if card.photo.size > card.width.min(card.height) {
            return Err(AppError::LayoutError(format!(
                "photo size {} does not fit a {}x{} card",
                card.photo.size, card.width, card.height
            )));
        }
        if let Some(badge) = &card.category {
            anchors.push(("category", badge.anchor));
            check_badge_padding("category", badge.h_pad, badge.v_pad, card)?;
        }
        if let Some(org) = &card.organization {
            anchors.push(("organization", org.anchor));
            check_badge_padding("organization", org.h_pad, org.v_pad, card)?;
        }
        for (field, anchor) in anchors {
            if !card.contains(anchor) {
                return Err(AppError::LayoutError(format!(
                    "{} anchor ({}, {}) lies outside the {}x{} card",
                    field, anchor.x, anchor.y, card.width, card.height
                )));
            }
        }

        let mut fractions = vec![card.name.font_fraction];
        fractions.extend(card.category.iter().map(|c| c.font_fraction));
        if let Some(org) = &card.organization {
            fractions.push(org.font_fraction);
            if !(org.line_spacing > 0.0) {
                return Err(AppError::LayoutError("line spacing must be positive".to_string()));
            }
            if org.margin as u64 * 2 >= card.width as u64 {
                return Err(AppError::LayoutError(
                    "organization margins leave no room for text".to_string(),
                ));
            }
        }
        if fractions.iter().any(|f| !(*f > 0.0)) {
            return Err(AppError::LayoutError("font fractions must be positive".to_string()));
        }
        if !(self.sheet.dpi > 0.0) {
            return Err(AppError::LayoutError("dpi must be positive".to_string()));
        }

        self.sheet.grid(card.width, card.height)
    }
}

fn check_badge_padding(field: &str, h_pad: u32, v_pad: u32, card: &CardLayout) -> Result<(), AppError> {
    if h_pad as u64 * 2 >= card.width as u64 || v_pad >= card.height {
        return Err(AppError::LayoutError(format!(
            "{} badge padding {}x{} does not fit a {}x{} card",
            field, h_pad, v_pad, card.width, card.height
        )));
    }
    Ok(())
}

fn default_sheet() -> SheetLayout {
    SheetLayout {
        width: SHEET_WIDTH_PX,
        height: SHEET_HEIGHT_PX,
        rows: 4,
        columns: 5,
        h_pad: None,
        v_pad: None,
        background: Color::WHITE,
        dpi: DEFAULT_DPI,
    }
}

pub fn load_layout(path: &Path) -> Result<LayoutConfig, AppError> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| AppError::LayoutError(format!("{}: {}", path.display(), e)))?;
    serde_json::from_str(&content)
        .map_err(|e| AppError::LayoutError(format!("Invalid JSON: {}", e)))
}
