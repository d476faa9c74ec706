use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{error, info, warn};

pub mod bodyprog;
pub mod cipher;
pub mod font;
pub mod listing;
pub mod maps;
pub mod overlay;
pub mod records;
pub mod relocate;
pub mod text;
pub mod width;

use font::FontMetrics;
use listing::TranslationCursor;
use overlay::MAP_OVERLAYS;
use records::{load_json, save_json, FontRecord, InventoryRecord, MessageListRecord};

pub const FONT_RECORD_FILE: &str = "font_info.json";
pub const INVENTORY_RECORD_FILE: &str = "inventory.json";
pub const TRANSLATION_SUFFIX: &str = ".tr.txt";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocaliserSettings {
    pub disc_path: PathBuf,
    /// Directory holding the exported JSON records.
    pub dump_dir: PathBuf,
    /// Where the patched disc image is written.
    #[serde(default)]
    pub output_path: Option<PathBuf>,
    #[serde(default = "default_width_budget")]
    pub screen_width_budget: u32,
    #[serde(default)]
    pub skip_width_check: bool,
}

fn default_width_budget() -> u32 {
    width::SCREEN_WIDTH_BUDGET
}

impl LocaliserSettings {
    pub fn new(disc_path: PathBuf, dump_dir: PathBuf) -> Self {
        Self {
            disc_path,
            dump_dir,
            output_path: None,
            screen_width_budget: default_width_budget(),
            skip_width_check: false,
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        load_json(path)
    }

    fn map_record_path(&self, name: &str) -> PathBuf {
        self.dump_dir.join(format!("{name}.json"))
    }
}

#[derive(Debug, Error)]
pub enum LocaliserError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("{what} spans {start:#X}..{end:#X} but only {len:#X} bytes are available")]
    OutOfBounds {
        what: String,
        start: usize,
        end: usize,
        len: usize,
    },
    #[error("can't find the {name} blob, the binary does not match")]
    BlobNotFound { name: String },
    #[error("not enough room for the new text ({needed:#X} bytes needed, {budget:#X} available)")]
    CapacityExceeded { needed: usize, budget: usize },
    #[error("line is too long ({width} pixels, limit {budget})")]
    LineTooWide { width: u32, budget: u32 },
    #[error("character {ch:?} at column {column} cannot be encoded")]
    Encoding { ch: char, column: usize },
    #[error("no font width for {ch:?}")]
    MissingGlyph { ch: char },
    #[error("expected {expected} entries, got {got}")]
    EntryCountMismatch { expected: usize, got: usize },
    #[error("pointer slot {slot:#X} points into the text arena but has no replacement text")]
    DanglingSlot { slot: usize },
    #[error("translation file has {available} entries left, {wanted} needed")]
    TranslationsExhausted { available: usize, wanted: usize },
    #[error("entry {index}: {source}")]
    Entry {
        index: usize,
        #[source]
        source: Box<LocaliserError>,
    },
    #[error("{overlay}: {source}")]
    InOverlay {
        overlay: String,
        #[source]
        source: Box<LocaliserError>,
    },
}

impl LocaliserError {
    pub fn at_entry(self, index: usize) -> Self {
        LocaliserError::Entry {
            index,
            source: Box::new(self),
        }
    }

    pub fn in_overlay(self, overlay: &str) -> Self {
        LocaliserError::InOverlay {
            overlay: overlay.to_string(),
            source: Box::new(self),
        }
    }

    /// The error beneath any entry/overlay context.
    pub fn root_cause(&self) -> &LocaliserError {
        match self {
            LocaliserError::Entry { source, .. } | LocaliserError::InOverlay { source, .. } => {
                source.root_cause()
            }
            other => other,
        }
    }
}

pub type Result<T> = std::result::Result<T, LocaliserError>;

/// Outcome of a batch over several overlays or listings.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BatchReport {
    pub succeeded: Vec<String>,
    pub skipped: Vec<String>,
    pub failed: Vec<(String, String)>,
}

impl BatchReport {
    fn record(&mut self, name: &str, result: Result<()>) {
        match result {
            Ok(()) => self.succeeded.push(name.to_string()),
            Err(err) => {
                let err = err.in_overlay(name);
                error!("{err}");
                self.failed.push((name.to_string(), err.to_string()));
            }
        }
    }

    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Export font widths, inventory text and every map's messages.
pub fn run_dump(settings: &LocaliserSettings) -> Result<BatchReport> {
    let disc = fs::read(&settings.disc_path)?;
    fs::create_dir_all(&settings.dump_dir)?;
    let mut report = BatchReport::default();

    let result = bodyprog::dump_bodyprog(&disc).and_then(|(font, inventory)| {
        save_json(&settings.dump_dir.join(FONT_RECORD_FILE), &font.store())?;
        save_json(&settings.dump_dir.join(INVENTORY_RECORD_FILE), &inventory)
    });
    report.record(overlay::BODYPROG.name, result);

    for map in MAP_OVERLAYS {
        let result = maps::dump_map(&disc, map)
            .and_then(|record| save_json(&settings.map_record_path(map.name), &record));
        report.record(map.name, result);
    }

    info!(
        "dumped {} overlays into {}",
        report.succeeded.len(),
        settings.dump_dir.display()
    );
    Ok(report)
}

/// Apply the records in `dump_dir` to the disc image.
///
/// Each overlay is patched independently: a failure is logged and recorded,
/// that overlay stays untouched, and the batch moves on. Map overlays without
/// a record are skipped.
pub fn run_patch(settings: &LocaliserSettings) -> Result<BatchReport> {
    let output = settings
        .output_path
        .as_ref()
        .ok_or_else(|| LocaliserError::Config("no output path for the patched image".to_string()))?;

    let mut disc = fs::read(&settings.disc_path)?;
    let font_record: FontRecord = load_json(&settings.dump_dir.join(FONT_RECORD_FILE))?;
    let font = FontMetrics::load(&font_record)?;
    let mut report = BatchReport::default();

    let result = load_json::<InventoryRecord>(&settings.dump_dir.join(INVENTORY_RECORD_FILE))
        .and_then(|inventory| bodyprog::patch_bodyprog(&mut disc, &inventory, &font).map(|_| ()));
    report.record(overlay::BODYPROG.name, result);

    let width_font = (!settings.skip_width_check).then_some(&font);
    for map in MAP_OVERLAYS {
        let path = settings.map_record_path(map.name);
        if !path.exists() {
            warn!("{}: no record at {}, skipping", map.name, path.display());
            report.skipped.push(map.name.to_string());
            continue;
        }
        let result = load_json::<MessageListRecord>(&path).and_then(|record| {
            maps::patch_map(&mut disc, map, &record, width_font, settings.screen_width_budget)
                .map(|_| ())
        });
        report.record(map.name, result);
    }

    fs::write(output, &disc)?;
    info!(
        "patched {} overlays ({} failed, {} skipped) into {}",
        report.succeeded.len(),
        report.failed.len(),
        report.skipped.len(),
        output.display()
    );
    Ok(report)
}

fn translation_path(listing: &Path) -> PathBuf {
    let mut name = listing.as_os_str().to_os_string();
    name.push(TRANSLATION_SUFFIX);
    PathBuf::from(name)
}

/// Write `<listing>.tr.txt` next to each listing.
pub fn run_listing_export(listings: &[PathBuf]) -> Result<BatchReport> {
    let mut report = BatchReport::default();
    for path in listings {
        let name = path.display().to_string();
        let result = fs::read_to_string(path)
            .map_err(LocaliserError::from)
            .and_then(|src| listing::export_translations(&listing::parse_listing(&src)))
            .and_then(|text| {
                fs::write(translation_path(path), text).map_err(LocaliserError::from)
            });
        report.record(&name, result);
    }
    Ok(report)
}

/// Patch each listing's translations into the disc image at
/// `settings.disc_path`, writing the result to `settings.output_path`.
pub fn run_listing_patch(settings: &LocaliserSettings, listings: &[PathBuf]) -> Result<BatchReport> {
    let output = settings
        .output_path
        .as_ref()
        .ok_or_else(|| LocaliserError::Config("no output path for the patched image".to_string()))?;

    let mut disc = fs::read(&settings.disc_path)?;
    let font = if settings.skip_width_check {
        None
    } else {
        let record: FontRecord = load_json(&settings.dump_dir.join(FONT_RECORD_FILE))?;
        Some(FontMetrics::load(&record)?)
    };
    let mut report = BatchReport::default();

    for path in listings {
        let name = path.display().to_string();
        let result = patch_one_listing(&mut disc, path, font.as_ref(), settings.screen_width_budget);
        report.record(&name, result);
    }

    fs::write(output, &disc)?;
    Ok(report)
}

fn patch_one_listing(
    disc: &mut [u8],
    path: &Path,
    font: Option<&FontMetrics>,
    width_budget: u32,
) -> Result<()> {
    let entries = listing::parse_listing(&fs::read_to_string(path)?);
    let lines = listing::parse_translations(&fs::read_to_string(translation_path(path))?);

    let cursor = listing::patch_listing(
        disc,
        &entries,
        TranslationCursor::new(&lines),
        font,
        width_budget,
    )?;
    if cursor.remaining() > 0 {
        warn!(
            "{}: {} translated entries left over",
            path.display(),
            cursor.remaining()
        );
    }
    Ok(())
}
