use idcard_sheets::config::{Anchor, LayoutConfig, SheetLayout};
use image::{Rgb, RgbImage};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

const PHOTO_COLOR: Rgb<u8> = Rgb([30, 60, 200]);
const WHITE: [u8; 3] = [255, 255, 255];

fn cargo_bin() -> Command {
    Command::new(env!("CARGO_BIN_EXE_idcard-sheets"))
}

/// Temporary roster directory with generated photos.
struct Fixture {
    dir: TempDir,
}

impl Fixture {
    fn new() -> Self {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        fs::create_dir_all(dir.path().join("photos")).expect("Failed to create photo dir");
        Self { dir }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    /// Write `count` roster rows, each with its own photo. Rows listed in
    /// `missing` point at a photo that does not exist.
    fn roster(&self, count: usize, missing: &[usize]) -> PathBuf {
        let mut rows = Vec::new();
        for i in 0..count {
            let photo = format!("photos/person-{}.png", i);
            if !missing.contains(&i) {
                RgbImage::from_pixel(48, 64, PHOTO_COLOR)
                    .save(self.path(&photo))
                    .expect("Failed to write photo");
            }
            let ministry = if i % 2 == 0 { "Hospitality and Welcome Team" } else { "" };
            rows.push(serde_json::json!({
                "Name": format!("Person {}", i),
                "Zone": "North",
                "Ministry": ministry,
                "image": photo,
            }));
        }
        let path = self.path("roster.json");
        fs::write(&path, serde_json::to_string_pretty(&rows).expect("serialize"))
            .expect("Failed to write roster");
        path
    }

    /// Volunteer layout shrunk to 100x160 cards on a 560x700 sheet (5 columns, 4 rows).
    fn small_layout(&self) -> PathBuf {
        let mut layout = LayoutConfig::volunteer();
        layout.card.width = 100;
        layout.card.height = 160;
        layout.card.photo.anchor = Anchor::new(50, 50);
        layout.card.photo.size = 60;
        layout.card.name.anchor = Anchor::new(50, 100);
        if let Some(badge) = layout.card.category.as_mut() {
            badge.anchor = Anchor::new(50, 125);
            badge.h_pad = 4;
            badge.v_pad = 2;
        }
        if let Some(org) = layout.card.organization.as_mut() {
            org.anchor = Anchor::new(50, 145);
            org.margin = 8;
            org.h_pad = 4;
        }
        layout.sheet = SheetLayout {
            width: 560,
            height: 700,
            rows: 4,
            columns: 5,
            ..layout.sheet
        };

        let path = self.path("layout.json");
        fs::write(&path, serde_json::to_string_pretty(&layout).expect("serialize"))
            .expect("Failed to write layout");
        path
    }

    fn out(&self) -> PathBuf {
        self.path("out")
    }

    fn run(&self, roster: &Path, extra: &[&str]) -> Output {
        let out = self.out();
        let mut cmd = cargo_bin();
        cmd.arg("--roster")
            .arg(roster)
            .arg("--output-dir")
            .arg(&out)
            .args(extra);
        cmd.output().expect("Failed to execute command")
    }
}

/// Center of the photo aperture in slot `index` of the small layout.
fn photo_center(index: u32) -> (u32, u32) {
    let (h_pad, v_pad) = (10, 12);
    let (row, col) = (index / 5, index % 5);
    (h_pad + col * (100 + h_pad) + 50, v_pad + row * (160 + v_pad) + 50)
}

#[test]
fn test_png_sheets_with_unreachable_photo() {
    let fx = Fixture::new();
    let roster = fx.roster(23, &[7]);
    let layout = fx.small_layout();

    let output = fx.run(
        &roster,
        &["--layout", layout.to_str().unwrap(), "--format", "png"],
    );
    assert!(output.status.success(), "Command failed: {:?}", output);

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("✓ Generated: 2 sheet(s)"), "stdout: {}", stdout);
    assert!(stdout.contains("22 of 23 rendered"), "stdout: {}", stdout);
    assert!(stdout.contains("Person 7"), "failure not reported: {}", stdout);

    let first = image::open(fx.out().join("ID_Cards_Sheet_1.png"))
        .expect("Sheet 1 missing")
        .to_rgb8();
    let second = image::open(fx.out().join("ID_Cards_Sheet_2.png"))
        .expect("Sheet 2 missing")
        .to_rgb8();
    assert!(!fx.out().join("ID_Cards_Sheet_3.png").exists());
    assert_eq!(first.dimensions(), (560, 700));
    assert_eq!(second.dimensions(), (560, 700));

    for slot in 0..20 {
        let (x, y) = photo_center(slot);
        let pixel = first.get_pixel(x, y).0;
        if slot == 7 {
            assert_eq!(pixel, WHITE, "failed card should leave slot 7 blank");
        } else {
            assert_ne!(pixel, WHITE, "slot {} should hold a card", slot);
        }
    }
    for slot in 0..20 {
        let (x, y) = photo_center(slot);
        let pixel = second.get_pixel(x, y).0;
        if slot < 3 {
            assert_ne!(pixel, WHITE, "slot {} should hold a card", slot);
        } else {
            assert_eq!(pixel, WHITE, "slot {} should be blank", slot);
        }
    }
}

#[test]
fn test_pdf_per_sheet() {
    let fx = Fixture::new();
    let roster = fx.roster(21, &[]);
    let layout = fx.small_layout();

    let output = fx.run(&roster, &["--layout", layout.to_str().unwrap(), "--format", "pdf"]);
    assert!(output.status.success(), "Command failed: {:?}", output);

    for name in ["ID_Cards_Sheet_1.pdf", "ID_Cards_Sheet_2.pdf"] {
        let bytes = fs::read(fx.out().join(name)).expect("PDF file was not created");
        assert!(bytes.starts_with(b"%PDF"), "{} is not a PDF", name);
        assert!(bytes.len() > 1000, "{} is too small", name);
    }
}

#[test]
fn test_pdf_document() {
    let fx = Fixture::new();
    let roster = fx.roster(25, &[]);
    let layout = fx.small_layout();

    let output = fx.run(
        &roster,
        &["--layout", layout.to_str().unwrap(), "--format", "pdf-document"],
    );
    assert!(output.status.success(), "Command failed: {:?}", output);

    let path = fx.out().join("ID_Cards.pdf");
    let metadata = fs::metadata(&path).expect("PDF file was not created");
    assert!(metadata.len() > 1000, "PDF file is too small");
    assert!(!fx.out().join("ID_Cards_Sheet_1.pdf").exists());
}

#[test]
fn test_singles() {
    let fx = Fixture::new();
    let roster = fx.roster(3, &[1]);
    let layout = fx.small_layout();

    let output = fx.run(&roster, &["--layout", layout.to_str().unwrap(), "--singles"]);
    assert!(output.status.success(), "Command failed: {:?}", output);

    let card = image::open(fx.out().join("ID_Card_Person_0.png"))
        .expect("Card 0 missing")
        .to_rgb8();
    assert_eq!(card.dimensions(), (100, 160));
    assert!(fx.out().join("ID_Card_Person_2.png").exists());
    assert!(!fx.out().join("ID_Card_Person_1.png").exists());
}

#[test]
fn test_classic_preset() {
    let fx = Fixture::new();
    let roster = fx.roster(2, &[]);

    let output = fx.run(&roster, &["--preset", "classic", "--format", "png", "--quiet"]);
    assert!(output.status.success(), "Command failed: {:?}", output);

    let sheet = image::open(fx.out().join("ID_Cards_Sheet_1.png"))
        .expect("Sheet missing")
        .to_rgb8();
    assert_eq!(sheet.dimensions(), (3900, 5700));
}

#[test]
fn test_template_is_used_as_background() {
    let fx = Fixture::new();
    let roster = fx.roster(1, &[]);
    let layout = fx.small_layout();
    let template = fx.path("template.png");
    RgbImage::from_pixel(50, 80, Rgb([0, 200, 0]))
        .save(&template)
        .expect("Failed to write template");

    let output = fx.run(
        &roster,
        &[
            "--layout",
            layout.to_str().unwrap(),
            "--template",
            template.to_str().unwrap(),
            "--singles",
        ],
    );
    assert!(output.status.success(), "Command failed: {:?}", output);

    let card = image::open(fx.out().join("ID_Card_Person_0.png"))
        .expect("Card missing")
        .to_rgb8();
    assert_eq!(card.dimensions(), (100, 160));
    let [r, g, b] = card.get_pixel(2, 2).0;
    assert!(r < 10 && g > 190 && b < 10, "corner is not template green: {:?}", (r, g, b));
}

#[test]
fn test_missing_face_model_falls_back() {
    let fx = Fixture::new();
    let roster = fx.roster(1, &[]);
    let layout = fx.small_layout();

    let output = fx.run(
        &roster,
        &[
            "--layout",
            layout.to_str().unwrap(),
            "--face-model",
            "no/such/model.bin",
            "--singles",
        ],
    );
    assert!(output.status.success(), "Command failed: {:?}", output);
    assert!(fx.out().join("ID_Card_Person_0.png").exists());
}

#[test]
fn test_invalid_roster_file() {
    let fx = Fixture::new();
    let output = fx.run(&fx.path("nonexistent.json"), &[]);

    assert!(!output.status.success(), "Command should have failed for missing roster");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Error:"), "stderr: {}", stderr);
}

#[test]
fn test_invalid_layout_file() {
    let fx = Fixture::new();
    let roster = fx.roster(1, &[]);
    let layout = fx.path("bad-layout.json");
    fs::write(&layout, "{\"card\": {\"width\": 10}}").expect("Failed to write layout");

    let output = fx.run(&roster, &["--layout", layout.to_str().unwrap()]);
    assert!(!output.status.success(), "Command should have failed for bad layout");
}

#[test]
fn test_oversized_grid_is_rejected() {
    let fx = Fixture::new();
    let roster = fx.roster(1, &[]);
    let mut layout = LayoutConfig::classic();
    layout.sheet.columns = 7;
    let path = fx.path("wide.json");
    fs::write(&path, serde_json::to_string(&layout).expect("serialize")).expect("write layout");

    let output = fx.run(&roster, &["--layout", path.to_str().unwrap()]);
    assert!(!output.status.success(), "7 classic cards cannot fit across a sheet");
    assert!(!fx.out().join("ID_Cards_Sheet_1.pdf").exists());
}

#[test]
fn test_singles_keep_every_card_when_names_repeat() {
    let fx = Fixture::new();
    let roster = fx.roster(3, &[]);
    let mut rows: Vec<serde_json::Value> =
        serde_json::from_str(&fs::read_to_string(&roster).expect("read roster")).expect("parse");
    for row in &mut rows {
        row["Name"] = serde_json::json!("Sam Park");
    }
    fs::write(&roster, serde_json::to_string(&rows).expect("serialize")).expect("write roster");
    let layout = fx.small_layout();

    let output = fx.run(&roster, &["--layout", layout.to_str().unwrap(), "--singles"]);
    assert!(output.status.success(), "Command failed: {:?}", output);

    for name in ["ID_Card_Sam_Park.png", "ID_Card_Sam_Park_2.png", "ID_Card_Sam_Park_3.png"] {
        assert!(fx.out().join(name).exists(), "{} missing", name);
    }
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("already written"), "stderr: {}", stderr);
}

#[test]
fn test_huge_padding_is_reported_not_panicked() {
    let fx = Fixture::new();
    let roster = fx.roster(1, &[]);
    let mut layout = LayoutConfig::classic();
    layout.sheet.h_pad = Some(4_000_000_000);
    let path = fx.path("padded.json");
    fs::write(&path, serde_json::to_string(&layout).expect("serialize")).expect("write layout");

    let output = fx.run(&roster, &["--layout", path.to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(1), "{:?}", output);
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Error:"), "stderr: {}", stderr);
    assert!(!stderr.contains("panicked"), "stderr: {}", stderr);
}
