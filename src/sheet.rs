// idcard-sheets: grid tiling of rendered cards onto print sheets

use crate::config::{Color, SheetLayout};
use crate::error::AppError;
use image::{imageops, RgbaImage};

// ============================================================================
// Grid Geometry
// ============================================================================

/// Fixed row/column grid with uniform padding around and between cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridGeometry {
    pub rows: u32,
    pub columns: u32,
    pub h_pad: u32,
    pub v_pad: u32,
    pub card_width: u32,
    pub card_height: u32,
}

impl GridGeometry {
    pub fn capacity(&self) -> usize {
        (self.rows as u64 * self.columns as u64) as usize
    }

    /// Top-left pixel of slot `index`, filled row by row.
    pub fn slot_origin(&self, index: usize) -> Option<(u32, u32)> {
        if index >= self.capacity() {
            return None;
        }
        let row = index as u64 / self.columns as u64;
        let col = index as u64 % self.columns as u64;
        let x = self.h_pad as u64 + col * (self.card_width as u64 + self.h_pad as u64);
        let y = self.v_pad as u64 + row * (self.card_height as u64 + self.v_pad as u64);
        Some((u32::try_from(x).ok()?, u32::try_from(y).ok()?))
    }

    /// Width and height covered by the grid including the trailing padding.
    /// Wide enough that no `u32` layout values can overflow it.
    pub fn extent(&self) -> (u64, u64) {
        let span = |pad: u32, count: u32, cell: u32| pad as u64 + count as u64 * (cell as u64 + pad as u64);
        (
            span(self.h_pad, self.columns, self.card_width),
            span(self.v_pad, self.rows, self.card_height),
        )
    }
}

// ============================================================================
// Sheet
// ============================================================================

/// One print canvas and which of its slots hold a card.
pub struct Sheet {
    canvas: RgbaImage,
    occupied: Vec<bool>,
}

impl Sheet {
    pub fn new(width: u32, height: u32, background: Color, capacity: usize) -> Result<Self, AppError> {
        Ok(Self {
            canvas: allocate_canvas(width, height, background)?,
            occupied: vec![false; capacity],
        })
    }

    pub fn canvas(&self) -> &RgbaImage {
        &self.canvas
    }

    pub fn is_populated(&self, slot: usize) -> bool {
        self.occupied.get(slot).copied().unwrap_or(false)
    }

    pub fn populated(&self) -> usize {
        self.occupied.iter().filter(|o| **o).count()
    }

    pub fn blank(&self) -> usize {
        self.occupied.len() - self.populated()
    }
}

/// Allocate a filled canvas, reporting allocation failure instead of aborting.
fn allocate_canvas(width: u32, height: u32, background: Color) -> Result<RgbaImage, AppError> {
    if width == 0 || height == 0 {
        return Err(AppError::CanvasError(format!("{}x{} canvas", width, height)));
    }
    let pixels = (width as usize)
        .checked_mul(height as usize)
        .ok_or_else(|| AppError::CanvasError(format!("{}x{} canvas overflows", width, height)))?;
    let len = pixels
        .checked_mul(4)
        .ok_or_else(|| AppError::CanvasError(format!("{}x{} canvas overflows", width, height)))?;

    let mut raw = Vec::new();
    raw.try_reserve_exact(len)
        .map_err(|e| AppError::CanvasError(format!("{}x{}: {}", width, height, e)))?;
    let fill = background.rgba().0;
    raw.extend(std::iter::repeat(fill).take(pixels).flatten());

    RgbaImage::from_raw(width, height, raw)
        .ok_or_else(|| AppError::CanvasError(format!("{}x{} buffer mismatch", width, height)))
}

// ============================================================================
// Tiler
// ============================================================================

pub struct SheetTiler {
    grid: GridGeometry,
    width: u32,
    height: u32,
    background: Color,
}

impl SheetTiler {
    pub fn new(layout: &SheetLayout, grid: GridGeometry) -> Self {
        Self {
            grid,
            width: layout.width,
            height: layout.height,
            background: layout.background,
        }
    }

    pub fn capacity(&self) -> usize {
        self.grid.capacity()
    }

    /// Number of sheets needed for `cards` cards.
    pub fn sheet_count(&self, cards: usize) -> usize {
        cards.div_ceil(self.capacity())
    }

    /// Place a batch of cards in slot order. `None` entries (failed renders)
    /// leave their slot blank; entries past capacity are dropped.
    pub fn tile(&self, cards: &[Option<RgbaImage>]) -> Result<Sheet, AppError> {
        let capacity = self.capacity();
        let mut sheet = Sheet::new(self.width, self.height, self.background, capacity)?;

        if cards.len() > capacity {
            log::warn!(
                "{} cards passed to a sheet holding {}; dropping the overflow",
                cards.len(),
                capacity
            );
        }

        for (slot, card) in cards.iter().enumerate().take(capacity) {
            let (Some(card), Some((x, y))) = (card, self.grid.slot_origin(slot)) else {
                continue;
            };
            imageops::replace(&mut sheet.canvas, card, x as i64, y as i64);
            sheet.occupied[slot] = true;
        }

        Ok(sheet)
    }
}
