// idcard-sheets: photo ID card compositing and print sheet layout

pub mod batch;
pub mod card;
pub mod composite;
pub mod config;
pub mod crop;
pub mod error;
pub mod export;
pub mod face;
pub mod roster;
pub mod sheet;
pub mod text;

pub use batch::{render_sheets, render_singles, BatchSummary, CardFailure};
pub use card::{CardInput, CardRenderer, Template};
pub use config::{load_layout, LayoutConfig, Preset};
pub use error::{AppError, CardError};
pub use export::OutputFormat;
pub use face::{FaceBox, FaceLocator, FaceSelection, NoFaceLocator, RustfaceLocator};
pub use roster::{load_roster, DefaultPhotoSource, PhotoSource, RosterEntry};
pub use sheet::{GridGeometry, Sheet, SheetTiler};
pub use text::FontSet;

use log::LevelFilter;

/// Initialize `env_logger`. `RUST_LOG` wins over `default_filter`.
pub fn init_logging(default_filter: LevelFilter) {
    let mut builder = env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(default_filter.as_str()),
    );
    builder.format_timestamp(None);

    if builder.try_init().is_err() {
        // Logger already initialized; nothing to do.
    }
}
