// idcard-sheets: Render photo ID cards from a roster and tile them onto print sheets

use clap::Parser;
use idcard_sheets::export::{self, sheet_file_name, CardFileNames, PdfSheetWriter};
use idcard_sheets::{
    init_logging, load_layout, load_roster, render_sheets, render_singles, AppError,
    BatchSummary, CardRenderer, DefaultPhotoSource, FaceLocator, FaceSelection, FontSet,
    LayoutConfig, NoFaceLocator, OutputFormat, Preset, RosterEntry, RustfaceLocator, SheetTiler,
    Template,
};
use log::LevelFilter;
use std::fs;
use std::path::{Path, PathBuf};

// ============================================================================
// Constants
// ============================================================================

/// File name for `--format pdf-document`
const DOCUMENT_FILE_NAME: &str = "ID_Cards.pdf";

/// Title embedded in generated PDFs
const PDF_TITLE: &str = "ID Cards";

// ============================================================================
// Data Structures
// ============================================================================

/// CLI Arguments
#[derive(Parser, Debug)]
#[command(author, version, about = "Render photo ID cards from a roster and tile them onto print sheets")]
struct Args {
    /// Roster file (JSON array of {"Name", "Zone", "Ministry", "image"} records)
    #[arg(short, long)]
    roster: PathBuf,

    /// Card background image; resized to the card size when needed
    #[arg(short, long)]
    template: Option<PathBuf>,

    /// Layout file (JSON); overrides --preset
    #[arg(short, long)]
    layout: Option<PathBuf>,

    /// Built-in card layout
    #[arg(short, long, value_enum, default_value = "volunteer")]
    preset: Preset,

    /// TrueType font for names
    #[arg(long)]
    name_font: Option<PathBuf>,

    /// TrueType font for badges
    #[arg(long)]
    label_font: Option<PathBuf>,

    /// SeetaFace model file; without it photos are center cropped
    #[arg(long)]
    face_model: Option<PathBuf>,

    /// Which face to crop around when a photo shows several
    #[arg(long, value_enum, default_value = "first")]
    face_selection: FaceSelection,

    /// Output directory (created if missing)
    #[arg(short, long, default_value = "id-cards")]
    output_dir: PathBuf,

    /// Sheet output format
    #[arg(short, long, value_enum, default_value = "pdf")]
    format: OutputFormat,

    /// Save each card as its own PNG instead of tiling sheets
    #[arg(long)]
    singles: bool,

    /// Log progress
    #[arg(short, long, conflicts_with = "quiet")]
    verbose: bool,

    /// Only log errors
    #[arg(short, long)]
    quiet: bool,
}

// ============================================================================
// Main Entry Point
// ============================================================================

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<(), AppError> {
    let args = Args::parse();

    init_logging(log_level(&args));

    // Resolve layout and sheet grid
    let layout = match &args.layout {
        Some(path) => load_layout(path)?,
        None => args.preset.layout(),
    };
    let grid = layout.validate()?;

    // Load roster
    let entries = load_roster(&args.roster)?;
    log::info!("Loaded {} roster entries from {}", entries.len(), args.roster.display());

    // Shared resources, loaded once
    let fonts = FontSet::load(args.name_font.as_deref(), args.label_font.as_deref())?;
    let template = match &args.template {
        Some(path) => Template::load(path, &layout.card)?,
        None => Template::solid(&layout.card),
    };
    let locator = face_locator(args.face_model.as_deref(), &layout);
    let renderer = CardRenderer::new(layout.card.clone(), template, fonts, locator, args.face_selection);

    let roster_dir = args
        .roster
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default();
    let photos = DefaultPhotoSource::new(roster_dir);

    fs::create_dir_all(&args.output_dir)?;

    let summary = if args.singles {
        let mut names = CardFileNames::new();
        render_singles(&renderer, &photos, &entries, |index, entry, card| {
            let path = args.output_dir.join(names.assign(&entry.name, index));
            export::save_png(&card, &path)?;
            log::info!("Saved {}", path.display());
            Ok(())
        })?
    } else {
        let tiler = SheetTiler::new(&layout.sheet, grid);
        write_sheets(&args, &layout, &renderer, &photos, &tiler, &entries)?
    };

    print_summary(&args, &summary, entries.len());

    Ok(())
}

// ============================================================================
// Helper Functions
// ============================================================================

fn log_level(args: &Args) -> LevelFilter {
    if args.quiet {
        LevelFilter::Error
    } else if args.verbose {
        LevelFilter::Info
    } else {
        LevelFilter::Warn
    }
}

/// Falls back to center cropping when no model is given or it fails to load.
fn face_locator(model: Option<&Path>, layout: &LayoutConfig) -> Box<dyn FaceLocator> {
    match model {
        Some(path) => match RustfaceLocator::load(path) {
            Ok(locator) => Box::new(locator),
            Err(e) => {
                log::warn!("{}: {}; photos will be center cropped", path.display(), e);
                Box::new(NoFaceLocator)
            }
        },
        None => {
            if layout.card.photo.detect_faces {
                log::info!("No --face-model given; photos will be center cropped");
            }
            Box::new(NoFaceLocator)
        }
    }
}

fn write_sheets(
    args: &Args,
    layout: &LayoutConfig,
    renderer: &CardRenderer,
    photos: &DefaultPhotoSource,
    tiler: &SheetTiler,
    entries: &[RosterEntry],
) -> Result<BatchSummary, AppError> {
    let dpi = layout.sheet.dpi;
    let out = &args.output_dir;

    match args.format {
        OutputFormat::Png => render_sheets(renderer, photos, tiler, entries, |n, sheet| {
            export::save_png(sheet.canvas(), &out.join(sheet_file_name(n, "png")))
        }),
        OutputFormat::Pdf => render_sheets(renderer, photos, tiler, entries, |n, sheet| {
            export::save_pdf(sheet.canvas(), &out.join(sheet_file_name(n, "pdf")), dpi)
        }),
        OutputFormat::PdfDocument => {
            let mut writer = PdfSheetWriter::new(PDF_TITLE, dpi);
            let summary = render_sheets(renderer, photos, tiler, entries, |_, sheet| {
                writer.add_page(sheet.canvas());
                Ok(())
            })?;
            writer.save(&out.join(DOCUMENT_FILE_NAME))?;
            Ok(summary)
        }
    }
}

fn print_summary(args: &Args, summary: &BatchSummary, total: usize) {
    let target = match (args.singles, args.format) {
        (true, _) => format!("{} card image(s)", summary.rendered),
        (false, OutputFormat::PdfDocument) if summary.sheets > 0 => {
            args.output_dir.join(DOCUMENT_FILE_NAME).display().to_string()
        }
        (false, _) => format!("{} sheet(s)", summary.sheets),
    };

    println!("✓ Generated: {}", target);
    println!("  Output: {}", args.output_dir.display());
    println!("  Cards: {} of {} rendered", summary.rendered, total);
    if !summary.failed.is_empty() {
        println!("  Failed: {}", summary.failed.len());
        for failure in &summary.failed {
            println!("    row {} ({}): {}", failure.index + 1, failure.name, failure.error);
        }
    }
}
