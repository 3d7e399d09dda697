// idcard-sheets: roster batches, per-card failure containment

use crate::card::{CardInput, CardRenderer};
use crate::error::{AppError, CardError};
use crate::roster::{PhotoSource, RosterEntry};
use crate::sheet::{Sheet, SheetTiler};
use image::RgbaImage;

/// A roster row whose card could not be rendered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardFailure {
    pub index: usize,
    pub name: String,
    pub error: CardError,
}

#[derive(Debug, Default)]
pub struct BatchSummary {
    pub rendered: usize,
    pub sheets: usize,
    pub failed: Vec<CardFailure>,
}

impl BatchSummary {
    fn record(&mut self, index: usize, entry: &RosterEntry, result: Result<RgbaImage, CardError>) -> Option<RgbaImage> {
        match result {
            Ok(card) => {
                self.rendered += 1;
                Some(card)
            }
            Err(error) => {
                log::warn!("Error creating ID card for {} (row {}): {}", entry.name, index + 1, error);
                self.failed.push(CardFailure {
                    index,
                    name: entry.name.clone(),
                    error,
                });
                None
            }
        }
    }
}

/// Fetch the photo and render one roster row.
pub fn render_entry(
    renderer: &CardRenderer,
    photos: &dyn PhotoSource,
    entry: &RosterEntry,
) -> Result<RgbaImage, CardError> {
    let photo = photos.fetch(&entry.photo)?;
    renderer.render(&CardInput {
        name: entry.name.trim(),
        category: entry.category.trim(),
        organization: entry.organization.as_deref(),
        photo: &photo,
    })
}

/// Render the roster a sheet at a time, handing each finished sheet to
/// `on_sheet` with its 0-based number. Failed cards leave blank slots.
pub fn render_sheets<F>(
    renderer: &CardRenderer,
    photos: &dyn PhotoSource,
    tiler: &SheetTiler,
    entries: &[RosterEntry],
    mut on_sheet: F,
) -> Result<BatchSummary, AppError>
where
    F: FnMut(usize, Sheet) -> Result<(), AppError>,
{
    let mut summary = BatchSummary::default();
    let total = tiler.sheet_count(entries.len());

    for (sheet_num, chunk) in entries.chunks(tiler.capacity()).enumerate() {
        log::info!("Generating sheet {}/{} ({} cards)", sheet_num + 1, total, chunk.len());
        let offset = sheet_num * tiler.capacity();
        let cards: Vec<Option<RgbaImage>> = chunk
            .iter()
            .enumerate()
            .map(|(i, entry)| {
                let result = render_entry(renderer, photos, entry);
                summary.record(offset + i, entry, result)
            })
            .collect();

        let sheet = tiler.tile(&cards)?;
        on_sheet(sheet_num, sheet)?;
        summary.sheets += 1;
    }

    Ok(summary)
}

/// Render every row as a standalone card.
pub fn render_singles<F>(
    renderer: &CardRenderer,
    photos: &dyn PhotoSource,
    entries: &[RosterEntry],
    mut on_card: F,
) -> Result<BatchSummary, AppError>
where
    F: FnMut(usize, &RosterEntry, RgbaImage) -> Result<(), AppError>,
{
    let mut summary = BatchSummary::default();
    for (index, entry) in entries.iter().enumerate() {
        let result = render_entry(renderer, photos, entry);
        if let Some(card) = summary.record(index, entry, result) {
            on_card(index, entry, card)?;
        }
    }
    Ok(summary)
}
