// idcard-sheets: roster records and photo acquisition

use crate::error::{AppError, CardError};
use image::DynamicImage;
use serde::{de, Deserialize, Deserializer};
use serde_json::Value;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Network fetches give up after this long so one stalled photo cannot hang the run.
const FETCH_TIMEOUT_SECS: u64 = 30;

// ============================================================================
// Roster
// ============================================================================

/// One card's worth of roster data.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RosterEntry {
    #[serde(rename = "Name", alias = "name", deserialize_with = "cell_text")]
    pub name: String,
    #[serde(rename = "Zone", alias = "zone", default, deserialize_with = "cell_text")]
    pub category: String,
    #[serde(
        rename = "Ministry",
        alias = "ministry",
        default,
        deserialize_with = "optional_cell_text"
    )]
    pub organization: Option<String>,
    #[serde(rename = "image", alias = "Image", deserialize_with = "cell_text")]
    pub photo: String,
}

/// Spreadsheet exports put numbers and nulls where text is expected; take them as text.
fn cell_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Null => Ok(String::new()),
        other => Err(de::Error::custom(format!("expected a text cell, found {}", other))),
    }
}

fn optional_cell_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let text = cell_text(deserializer)?;
    Ok(Some(text).filter(|t| !t.trim().is_empty()))
}

pub fn load_roster(path: &Path) -> Result<Vec<RosterEntry>, AppError> {
    // Read file
    let content = std::fs::read_to_string(path)
        .map_err(|e| AppError::RosterError(format!("{}: {}", path.display(), e)))?;

    // Parse JSON
    serde_json::from_str(&content)
        .map_err(|e| AppError::RosterError(format!("Invalid JSON: {}", e)))
}

// ============================================================================
// Photo Acquisition
// ============================================================================

/// Resolves a roster photo reference to a decoded image.
pub trait PhotoSource {
    fn fetch(&self, location: &str) -> Result<DynamicImage, CardError>;
}

/// Local files (relative to the roster's directory) and `http(s)://` URLs.
pub struct DefaultPhotoSource {
    base_dir: PathBuf,
    agent: ureq::Agent,
}

impl DefaultPhotoSource {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            agent: ureq::AgentBuilder::new()
                .timeout(Duration::from_secs(FETCH_TIMEOUT_SECS))
                .build(),
        }
    }

    fn read_bytes(&self, location: &str) -> Result<Vec<u8>, CardError> {
        if location.starts_with("http://") || location.starts_with("https://") {
            // Load from URL
            let response = self
                .agent
                .get(location)
                .call()
                .map_err(|e| CardError::PhotoError(format!("Failed to fetch URL {}: {}", location, e)))?;

            // Read the whole body before decoding
            let mut bytes = Vec::new();
            response
                .into_reader()
                .read_to_end(&mut bytes)
                .map_err(|e| CardError::PhotoError(format!("Failed to read response: {}", e)))?;
            Ok(bytes)
        } else {
            // Load from file, relative to the roster
            let path = self.base_dir.join(location);
            std::fs::read(&path).map_err(|e| CardError::PhotoError(format!("{}: {}", path.display(), e)))
        }
    }
}

impl PhotoSource for DefaultPhotoSource {
    fn fetch(&self, location: &str) -> Result<DynamicImage, CardError> {
        let location = location.trim();
        if location.is_empty() {
            return Err(CardError::PhotoError("no photo given".to_string()));
        }
        let bytes = self.read_bytes(location)?;

        // Format is sniffed from the bytes, not the extension
        ::image::load_from_memory(&bytes)
            .map_err(|e| CardError::PhotoError(format!("Failed to decode image {}: {}", location, e)))
    }
}
