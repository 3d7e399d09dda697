// idcard-sheets: text measurement, badges and word wrap

use crate::config::{Anchor, BadgeSlot, CardLayout, Color, WrappedSlot};
use crate::error::AppError;
use image::RgbaImage;
use imageproc::drawing::{draw_filled_circle_mut, draw_filled_rect_mut};
use imageproc::rect::Rect;
use rusttype::{point, Font, Scale};
use std::path::Path;

/// Built-in fallback face (DejaVu Sans).
static DEFAULT_FONT: &[u8] = include_bytes!("../assets/fonts/DejaVuSans.ttf");

// ============================================================================
// Fonts
// ============================================================================

/// Display font for the name and label font for badges, shared by every card.
pub struct FontSet {
    pub display: Font<'static>,
    pub label: Font<'static>,
}

impl FontSet {
    /// Load both fonts. A missing or unreadable file falls back to the
    /// built-in font with a single warning.
    pub fn load(display: Option<&Path>, label: Option<&Path>) -> Result<Self, AppError> {
        Ok(Self {
            display: load_font(display, "display")?,
            label: load_font(label, "label")?,
        })
    }

    pub fn builtin() -> Result<Self, AppError> {
        Self::load(None, None)
    }
}

pub fn builtin_font() -> Result<Font<'static>, AppError> {
    Font::try_from_bytes(DEFAULT_FONT)
        .ok_or_else(|| AppError::FontError("built-in font is not a valid TrueType file".to_string()))
}

fn load_font(path: Option<&Path>, role: &str) -> Result<Font<'static>, AppError> {
    let Some(path) = path else {
        return builtin_font();
    };
    let loaded = std::fs::read(path)
        .map_err(|e| e.to_string())
        .and_then(|bytes| Font::try_from_vec(bytes).ok_or_else(|| "not a font file".to_string()));
    match loaded {
        Ok(font) => {
            log::debug!("loaded {} font {}", role, path.display());
            Ok(font)
        }
        Err(e) => {
            log::warn!(
                "Font loading error for {} font {}: {}; falling back to the built-in font",
                role,
                path.display(),
                e
            );
            builtin_font()
        }
    }
}

// ============================================================================
// Measurement and Drawing
// ============================================================================

/// Ink bounds of a line of text relative to its draw origin (top-left of the
/// line box). `right` and `bottom` are exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TextBox {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl TextBox {
    pub fn width(&self) -> i32 {
        self.right - self.left
    }

    pub fn height(&self) -> i32 {
        self.bottom - self.top
    }

    fn offset(self, dx: i32, dy: i32) -> TextBox {
        TextBox {
            left: self.left + dx,
            top: self.top + dy,
            right: self.right + dx,
            bottom: self.bottom + dy,
        }
    }
}

pub fn measure(font: &Font<'static>, px: f32, text: &str) -> TextBox {
    let scale = Scale::uniform(px);
    let ascent = font.v_metrics(scale).ascent;
    font.layout(text, scale, point(0.0, ascent))
        .filter_map(|g| g.pixel_bounding_box())
        .map(|bb| TextBox {
            left: bb.min.x,
            top: bb.min.y,
            right: bb.max.x,
            bottom: bb.max.y,
        })
        .reduce(|a, b| TextBox {
            left: a.left.min(b.left),
            top: a.top.min(b.top),
            right: a.right.max(b.right),
            bottom: a.bottom.max(b.bottom),
        })
        .unwrap_or_default()
}

/// Draw `text` with its line box's top-left at (x, y), blending glyph coverage.
pub fn draw_text(canvas: &mut RgbaImage, font: &Font<'static>, px: f32, x: i32, y: i32, color: Color, text: &str) {
    let scale = Scale::uniform(px);
    let ascent = font.v_metrics(scale).ascent;
    let [r, g, b] = color.0;
    let (width, height) = canvas.dimensions();

    for glyph in font.layout(text, scale, point(x as f32, y as f32 + ascent)) {
        let Some(bb) = glyph.pixel_bounding_box() else {
            continue;
        };
        glyph.draw(|gx, gy, coverage| {
            let cx = gx as i32 + bb.min.x;
            let cy = gy as i32 + bb.min.y;
            if cx < 0 || cy < 0 || cx as u32 >= width || cy as u32 >= height {
                return;
            }
            let a = (coverage * 255.0).round() as u8;
            if a == 0 {
                return;
            }
            let sa = a as f32 / 255.0;
            let inv = 1.0 - sa;
            let dst = canvas.get_pixel_mut(cx as u32, cy as u32);
            dst.0[0] = (r as f32 * sa + dst.0[0] as f32 * inv).round() as u8;
            dst.0[1] = (g as f32 * sa + dst.0[1] as f32 * inv).round() as u8;
            dst.0[2] = (b as f32 * sa + dst.0[2] as f32 * inv).round() as u8;
            dst.0[3] = dst.0[3].max(a);
        });
    }
}

/// Draw `text` horizontally centered on `anchor.x` with its line top at
/// `anchor.y`. Returns the ink box in canvas coordinates.
pub fn draw_centered(
    canvas: &mut RgbaImage,
    font: &Font<'static>,
    px: f32,
    anchor: Anchor,
    color: Color,
    text: &str,
) -> TextBox {
    let ink = measure(font, px, text);
    let x = anchor.x - ink.width() / 2 - ink.left;
    draw_text(canvas, font, px, x, anchor.y, color, text);
    ink.offset(x, anchor.y)
}

/// Filled rectangle with circular corners. Corner radius is capped at half the
/// shorter side.
pub fn fill_rounded_rect(canvas: &mut RgbaImage, x: i32, y: i32, width: u32, height: u32, radius: u32, color: Color) {
    if width == 0 || height == 0 {
        return;
    }
    let fill = color.rgba();
    let r = radius.min(width / 2).min(height / 2);

    if width > 2 * r {
        draw_filled_rect_mut(canvas, Rect::at(x + r as i32, y).of_size(width - 2 * r, height), fill);
    }
    if height > 2 * r {
        draw_filled_rect_mut(canvas, Rect::at(x, y + r as i32).of_size(width, height - 2 * r), fill);
    }
    if r > 0 {
        let r = r as i32;
        let (x1, y1) = (x + width as i32 - 1 - r, y + height as i32 - 1 - r);
        for center in [(x + r, y + r), (x1, y + r), (x + r, y1), (x1, y1)] {
            draw_filled_circle_mut(canvas, center, r, fill);
        }
    }
}

// ============================================================================
// Word Wrap
// ============================================================================

/// Greedy word wrap. A word that would push a line past `max_width` starts a
/// new line; a single word wider than `max_width` keeps a line to itself.
pub fn wrap_words<F>(text: &str, max_width: i32, measure: F) -> Vec<String>
where
    F: Fn(&str) -> i32,
{
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        if current.is_empty() {
            current.push_str(word);
            continue;
        }
        let candidate = format!("{} {}", current, word);
        if measure(&candidate) > max_width {
            lines.push(std::mem::replace(&mut current, word.to_string()));
        } else {
            current = candidate;
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

// ============================================================================
// Card Fields
// ============================================================================

/// Placed badge rectangle (x, y, width, height) and its text.
#[derive(Debug, Clone, PartialEq)]
pub struct BadgeGeometry {
    pub rect: (i32, i32, u32, u32),
    pub text_width: i32,
    pub text_height: i32,
    pub lines: Vec<String>,
}

/// Name scaled by the breakpoint table, centered in the name color.
pub fn draw_name(canvas: &mut RgbaImage, fonts: &FontSet, layout: &CardLayout, name: &str) -> TextBox {
    let slot = &layout.name;
    let scale = slot.breakpoints.scale_for(name.chars().count());
    let px = layout.font_px(slot.font_fraction, scale);
    log::debug!("name {:?} at {}px (scale {})", name, px, scale);
    draw_centered(canvas, &fonts.display, px, slot.anchor, slot.color, name)
}

/// Single-line label over a rounded badge. Blank labels draw nothing.
pub fn draw_badge(
    canvas: &mut RgbaImage,
    fonts: &FontSet,
    layout: &CardLayout,
    slot: &BadgeSlot,
    text: &str,
) -> Option<BadgeGeometry> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    let px = layout.font_px(slot.font_fraction, 1.0);
    let ink = measure(&fonts.label, px, text);
    let (text_w, text_h) = (ink.width(), ink.height());

    let rect_w = text_w + 2 * slot.h_pad as i32;
    let rect_h = text_h + slot.v_pad as i32;
    let rect_x = slot.anchor.x - rect_w / 2;
    let rect_y = slot.anchor.y - rect_h / 4 + text_h / 2;

    fill_rounded_rect(canvas, rect_x, rect_y, rect_w as u32, rect_h as u32, slot.corner_radius, slot.fill);
    draw_centered(canvas, &fonts.label, px, slot.anchor, slot.text_color, text);

    Some(BadgeGeometry {
        rect: (rect_x, rect_y, rect_w as u32, rect_h as u32),
        text_width: text_w,
        text_height: text_h,
        lines: vec![text.to_string()],
    })
}

/// Word-wrapped label over one rounded badge sized to the widest line.
pub fn draw_wrapped(
    canvas: &mut RgbaImage,
    fonts: &FontSet,
    layout: &CardLayout,
    slot: &WrappedSlot,
    text: &str,
) -> Option<BadgeGeometry> {
    let px = layout.font_px(slot.font_fraction, 1.0);
    let max_width = layout.width as i32 - 2 * slot.margin as i32;
    let lines = wrap_words(text, max_width, |s| measure(&fonts.label, px, s).width());
    if lines.is_empty() {
        return None;
    }

    let line_height = px * slot.line_spacing;
    let widest = lines
        .iter()
        .map(|line| measure(&fonts.label, px, line).width())
        .max()
        .unwrap_or(0);
    let text_h = (line_height * lines.len() as f32).round() as i32;

    let rect_w = widest + 2 * slot.h_pad as i32;
    let rect_h = text_h + slot.v_pad as i32;
    let rect_x = slot.anchor.x - rect_w / 2;
    let rect_y = slot.anchor.y - rect_h / 4 + px as i32 / 2;

    fill_rounded_rect(canvas, rect_x, rect_y, rect_w as u32, rect_h as u32, slot.corner_radius, slot.fill);
    for (i, line) in lines.iter().enumerate() {
        let y = slot.anchor.y + (i as f32 * line_height).round() as i32;
        draw_centered(
            canvas,
            &fonts.label,
            px,
            Anchor::new(slot.anchor.x, y),
            slot.text_color,
            line,
        );
    }

    Some(BadgeGeometry {
        rect: (rect_x, rect_y, rect_w as u32, rect_h as u32),
        text_width: widest,
        text_height: text_h,
        lines,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LayoutConfig;
    use image::Rgba;

    fn char_width(s: &str) -> i32 {
        s.chars().count() as i32 * 10
    }

    fn normalized(s: &str) -> String {
        s.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    fn ink_columns(canvas: &RgbaImage, background: Rgba<u8>) -> Option<(u32, u32)> {
        let cols: Vec<u32> = (0..canvas.width())
            .filter(|&x| (0..canvas.height()).any(|y| *canvas.get_pixel(x, y) != background))
            .collect();
        Some((*cols.first()?, *cols.last()? + 1))
    }

    #[test]
    fn wrap_reconstructs_normalized_text() {
        let text = "  Ministry of   Hospitality\tand Guest\nServices ";
        let lines = wrap_words(text, 120, char_width);
        assert_eq!(lines.join(" "), normalized(text));
        assert!(lines.len() > 1);
        for line in &lines {
            assert!(char_width(line) <= 120 || !line.contains(' '), "{:?}", line);
        }
    }

    #[test]
    fn wrap_breaks_before_overflowing_word() {
        let lines = wrap_words("aaa bbb ccc ddd", 70, char_width);
        assert_eq!(lines, vec!["aaa bbb", "ccc ddd"]);
    }

    #[test]
    fn wrap_keeps_long_single_word_unsplit() {
        let lines = wrap_words("Supercalifragilistic is long", 100, char_width);
        assert_eq!(lines, vec!["Supercalifragilistic", "is long"]);
        let lines = wrap_words("hi Supercalifragilistic", 100, char_width);
        assert_eq!(lines, vec!["hi", "Supercalifragilistic"]);
    }

    #[test]
    fn wrap_of_blank_text_is_empty() {
        assert!(wrap_words("   \t ", 100, char_width).is_empty());
    }

    #[test]
    fn measure_empty_text_is_zero() {
        let font = builtin_font().expect("font");
        assert_eq!(measure(&font, 40.0, ""), TextBox::default());
        assert_eq!(measure(&font, 40.0, "   ").width(), 0);
    }

    #[test]
    fn measure_grows_with_text_and_size() {
        let font = builtin_font().expect("font");
        let short = measure(&font, 40.0, "Ann");
        let long = measure(&font, 40.0, "Annabelle");
        let big = measure(&font, 80.0, "Ann");
        assert!(long.width() > short.width());
        assert!(big.width() > short.width());
        assert!(big.height() > short.height());
    }

    /// Contiguous runs of rows holding any pixel outside `plain`, as (first, last).
    fn ink_row_runs(canvas: &RgbaImage, plain: &[Rgba<u8>]) -> Vec<(u32, u32)> {
        let mut runs: Vec<(u32, u32)> = Vec::new();
        for y in 0..canvas.height() {
            let inked = (0..canvas.width()).any(|x| !plain.contains(canvas.get_pixel(x, y)));
            if !inked {
                continue;
            }
            match runs.last_mut() {
                Some(run) if run.1 + 1 == y => run.1 = y,
                _ => runs.push((y, y)),
            }
        }
        runs
    }

    #[test]
    fn centered_text_has_equal_margins() {
        let font = builtin_font().expect("font");
        let background = Rgba([0, 0, 0, 255]);
        for name in ["Jo", "Jonathan Appleseed", "Wilhelmina Q."] {
            let mut canvas = RgbaImage::from_pixel(600, 80, background);
            let placed = draw_centered(&mut canvas, &font, 32.0, Anchor::new(300, 10), Color::WHITE, name);
            assert!(((300 - placed.left) - (placed.right - 300)).abs() <= 1, "{:?}", placed);

            let (left, right) = ink_columns(&canvas, background).expect("ink drawn");
            let left_margin = 300 - left as i32;
            let right_margin = right as i32 - 300;
            assert!((left_margin - right_margin).abs() <= 2, "{}: {} vs {}", name, left_margin, right_margin);
        }
    }

    #[test]
    fn rounded_rect_fills_center_and_rounds_corners() {
        let background = Rgba([0, 0, 0, 255]);
        let mut canvas = RgbaImage::from_pixel(100, 60, background);
        let fill = Color([10, 20, 30]);
        fill_rounded_rect(&mut canvas, 10, 10, 80, 40, 15, fill);
        assert_eq!(*canvas.get_pixel(50, 30), fill.rgba());
        assert_eq!(*canvas.get_pixel(10, 30), fill.rgba());
        assert_eq!(*canvas.get_pixel(50, 10), fill.rgba());
        assert_eq!(*canvas.get_pixel(10, 10), background);
        assert_eq!(*canvas.get_pixel(89, 49), background);
        assert_eq!(*canvas.get_pixel(90, 30), background);
    }

    #[test]
    fn name_scale_follows_breakpoints() {
        let layout = LayoutConfig::volunteer().card;
        assert_eq!(layout.font_px(layout.name.font_fraction, 1.0), 94.0);
        let scale = layout.name.breakpoints.scale_for("Maximilian Rodriguez".chars().count());
        assert_eq!(scale, 0.65);
        assert_eq!(layout.font_px(layout.name.font_fraction, scale), 61.0);
    }

    #[test]
    fn badge_encloses_text_with_padding() {
        let fonts = FontSet::builtin().expect("fonts");
        let layout = LayoutConfig::volunteer().card;
        let slot = layout.category.clone().expect("badge slot");
        let mut canvas = RgbaImage::from_pixel(layout.width, layout.height, Rgba([0, 0, 0, 255]));
        let badge = draw_badge(&mut canvas, &fonts, &layout, &slot, "Volunteer").expect("drawn");

        let (x, y, w, h) = badge.rect;
        assert!(w as i32 >= badge.text_width + 2 * slot.h_pad as i32);
        assert!(h as i32 >= badge.text_height + slot.v_pad as i32);
        assert!((x + w as i32 / 2 - slot.anchor.x).abs() <= 1);
        assert_eq!(y, slot.anchor.y - h as i32 / 4 + badge.text_height / 2);
        assert_eq!(draw_badge(&mut canvas, &fonts, &layout, &slot, "  "), None);
    }

    #[test]
    fn wrapped_badge_respects_card_margins() {
        let fonts = FontSet::builtin().expect("fonts");
        let layout = LayoutConfig::volunteer().card;
        let slot = layout.organization.clone().expect("wrapped slot");
        let px = layout.font_px(slot.font_fraction, 1.0);
        let max_width = layout.width as i32 - 2 * slot.margin as i32;
        let text = "Department of Community Outreach and Neighbourhood Hospitality Services";

        let mut canvas = RgbaImage::from_pixel(layout.width, layout.height, Rgba([0, 0, 0, 255]));
        let badge = draw_wrapped(&mut canvas, &fonts, &layout, &slot, text).expect("drawn");

        assert!(badge.lines.len() > 1);
        assert_eq!(badge.lines.join(" "), text);
        for line in &badge.lines {
            let width = measure(&fonts.label, px, line).width();
            assert!(width <= max_width || !line.contains(' '), "{:?} is {}px", line, width);
        }
        let (_, y, w, h) = badge.rect;
        assert_eq!(w as i32, badge.text_width + 2 * slot.h_pad as i32);
        let expected_h = (px * slot.line_spacing * badge.lines.len() as f32).round() as i32;
        assert_eq!(h as i32, expected_h + slot.v_pad as i32);
        assert_eq!(y, slot.anchor.y - h as i32 / 4 + px as i32 / 2);
    }

    #[test]
    fn wrapped_lines_stack_down_from_the_anchor() {
        let fonts = FontSet::builtin().expect("fonts");
        let layout = LayoutConfig::volunteer().card;
        let slot = layout.organization.clone().expect("wrapped slot");
        let px = layout.font_px(slot.font_fraction, 1.0);
        let background = Rgba([0, 0, 0, 255]);
        let text = "Department of Community Outreach and Neighbourhood Hospitality Services";

        // Extra rows below the card so no line is clipped
        let mut canvas = RgbaImage::from_pixel(layout.width, layout.height + 200, background);
        let badge = draw_wrapped(&mut canvas, &fonts, &layout, &slot, text).expect("drawn");
        assert!(badge.lines.len() > 1);

        // Badge fill and background are flat colors; everything else is glyph ink.
        let runs = ink_row_runs(&canvas, &[background, slot.fill.rgba()]);
        assert_eq!(runs.len(), badge.lines.len(), "{:?}", runs);
        for (i, (line, (first_row, _))) in badge.lines.iter().zip(&runs).enumerate() {
            let line_y = slot.anchor.y + (i as f32 * px * slot.line_spacing).round() as i32;
            let expected_top = line_y + measure(&fonts.label, px, line).top;
            let offset = *first_row as i32 - expected_top;
            assert!((0..=1).contains(&offset), "line {} ink starts at {}, expected {}", i, first_row, expected_top);
        }
    }

    #[test]
    fn badge_text_sits_on_the_anchor_line() {
        let fonts = FontSet::builtin().expect("fonts");
        let layout = LayoutConfig::classic().card;
        let slot = layout.category.clone().expect("badge slot");
        let px = layout.font_px(slot.font_fraction, 1.0);
        let background = Rgba([0, 0, 0, 255]);

        let mut canvas = RgbaImage::from_pixel(layout.width, layout.height, background);
        draw_badge(&mut canvas, &fonts, &layout, &slot, "North").expect("drawn");

        let runs = ink_row_runs(&canvas, &[background, slot.fill.rgba()]);
        assert_eq!(runs.len(), 1, "{:?}", runs);
        let expected_top = slot.anchor.y + measure(&fonts.label, px, "North").top;
        let offset = runs[0].0 as i32 - expected_top;
        assert!((0..=1).contains(&offset), "ink starts at {}, expected {}", runs[0].0, expected_top);
    }

    #[test]
    fn missing_font_file_falls_back_to_builtin() {
        let fonts = FontSet::load(Some(Path::new("no/such/DegularDisplay-Bold.otf")), None)
            .expect("fallback never fails");
        let builtin = builtin_font().expect("font");
        assert_eq!(
            measure(&fonts.display, 40.0, "Volunteer"),
            measure(&builtin, 40.0, "Volunteer")
        );
    }
}
