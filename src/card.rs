// idcard-sheets: single card rendering

use crate::composite::composite_photo;
use crate::config::CardLayout;
use crate::crop::crop_photo;
use crate::error::{AppError, CardError};
use crate::face::{primary_face, FaceLocator, FaceSelection};
use crate::text::{draw_badge, draw_name, draw_wrapped, FontSet};
use image::{imageops, imageops::FilterType, DynamicImage, RgbaImage};
use std::path::Path;

// ============================================================================
// Template
// ============================================================================

/// Card background, sized to the layout. Read-only once loaded.
pub struct Template {
    image: RgbaImage,
}

impl Template {
    /// Load a background bitmap, resizing it to the card size when needed.
    pub fn load(path: &Path, layout: &CardLayout) -> Result<Self, AppError> {
        let image = ::image::open(path)
            .map_err(|e| AppError::TemplateError(format!("{}: {}", path.display(), e)))?
            .to_rgba8();
        Ok(Self::fit(image, layout))
    }

    /// Plain background in the layout's fill color.
    pub fn solid(layout: &CardLayout) -> Self {
        Self {
            image: RgbaImage::from_pixel(layout.width, layout.height, layout.background.rgba()),
        }
    }

    pub fn fit(image: RgbaImage, layout: &CardLayout) -> Self {
        if image.dimensions() == (layout.width, layout.height) {
            return Self { image };
        }
        log::info!(
            "resizing template from {}x{} to {}x{}",
            image.width(),
            image.height(),
            layout.width,
            layout.height
        );
        Self {
            image: imageops::resize(&image, layout.width, layout.height, FilterType::Lanczos3),
        }
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }
}

// ============================================================================
// Renderer
// ============================================================================

/// Per-card inputs.
pub struct CardInput<'a> {
    pub name: &'a str,
    pub category: &'a str,
    pub organization: Option<&'a str>,
    pub photo: &'a DynamicImage,
}

/// Renders cards for one layout. Holds only read-only shared resources.
pub struct CardRenderer {
    layout: CardLayout,
    template: Template,
    fonts: FontSet,
    locator: Box<dyn FaceLocator>,
    selection: FaceSelection,
}

impl CardRenderer {
    pub fn new(
        layout: CardLayout,
        template: Template,
        fonts: FontSet,
        locator: Box<dyn FaceLocator>,
        selection: FaceSelection,
    ) -> Self {
        Self {
            layout,
            template,
            fonts,
            locator,
            selection,
        }
    }

    pub fn layout(&self) -> &CardLayout {
        &self.layout
    }

    pub fn render(&self, input: &CardInput) -> Result<RgbaImage, CardError> {
        let slot = &self.layout.photo;
        let photo = input.photo.to_rgb8();

        let faces = if slot.detect_faces {
            self.locator.locate(&photo)
        } else {
            Vec::new()
        };
        let face = primary_face(&faces, self.selection);
        match &face {
            Some(f) => log::debug!("{}: {} face(s), using {:?}", input.name, faces.len(), f),
            None => log::debug!("{}: no face found, center cropping", input.name),
        }

        let cropped = crop_photo(&photo, face.as_ref(), slot.face_padding, slot.size)?;

        let mut card = self.template.image().clone();
        composite_photo(&mut card, &cropped, slot.anchor);

        draw_name(&mut card, &self.fonts, &self.layout, input.name);
        if let Some(badge) = &self.layout.category {
            let label = badge.label.resolve(input.category);
            draw_badge(&mut card, &self.fonts, &self.layout, badge, label);
        }
        if let (Some(slot), Some(organization)) = (&self.layout.organization, input.organization) {
            draw_wrapped(&mut card, &self.fonts, &self.layout, slot, organization);
        }

        Ok(card)
    }
}
