//! Translation driven by disassembly listings.
//!
//! A listing names every string of a message table by address:
//!
//! ```text
//! /* 1F3A4 800D0F24 */ .asciz "\tThere_is_nothing~Nhere."
//! ```
//!
//! The original text blob (strings padded to 4 bytes) and pointer table
//! (addresses in reverse order) are rebuilt from it and searched for in the
//! disc image, so no overlay geometry is needed.

use tracing::debug;

use crate::font::FontMetrics;
use crate::overlay::find_blob;
use crate::relocate::{relocate_at, ArenaLayout, TextSlot, WidthLimit};
use crate::text::TextCodec;
use crate::{LocaliserError, Result};

/// Separator line between entries of a translation file.
pub const ENTRY_SEPARATOR: &str = "\n-------";

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct AscizEntry {
    pub address: u32,
    /// Raw string bytes with escapes resolved, without terminator.
    pub bytes: Vec<u8>,
}

fn unescape(text: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(text.len());
    let bytes = text.as_bytes();
    let mut i = 0usize;

    while i < bytes.len() {
        if bytes[i] != b'\\' || i + 1 == bytes.len() {
            out.push(bytes[i]);
            i += 1;
            continue;
        }
        i += 1;
        match bytes[i] {
            b'n' => out.push(b'\n'),
            b't' => out.push(b'\t'),
            b'r' => out.push(b'\r'),
            b'x' => {
                let digits: String = text[i + 1..]
                    .chars()
                    .take(2)
                    .take_while(|c| c.is_ascii_hexdigit())
                    .collect();
                out.push(u8::from_str_radix(&digits, 16).unwrap_or(b'x'));
                i += digits.len();
            }
            b'0'..=b'7' => {
                let digits: String = text[i..]
                    .chars()
                    .take(3)
                    .take_while(|c| ('0'..='7').contains(c))
                    .collect();
                out.push(u8::from_str_radix(&digits, 8).unwrap_or(0));
                i += digits.len() - 1;
            }
            other => out.push(other),
        }
        i += 1;
    }

    out
}

fn parse_line(line: &str) -> Option<AscizEntry> {
    let (comment, rest) = line.split_once("*/")?;
    let address = comment.split_whitespace().last()?;
    let address = u32::from_str_radix(address.trim_start_matches("0x"), 16).ok()?;
    let open = rest.find('"')? + 1;
    let close = rest.rfind('"')?;
    if close < open {
        return None;
    }
    Some(AscizEntry {
        address,
        bytes: unescape(&rest[open..close]),
    })
}

/// Collect the `.asciz` entries of a listing in file order.
pub fn parse_listing(src: &str) -> Vec<AscizEntry> {
    src.lines()
        .filter(|line| line.contains(".asciz"))
        .filter_map(|line| {
            let entry = parse_line(line);
            if entry.is_none() {
                debug!("skipping malformed listing line: {}", line.trim());
            }
            entry
        })
        .collect()
}

/// The text blob as assembled: each string null terminated and padded so
/// the next one starts on a 4-byte boundary.
pub fn original_text_blob(entries: &[AscizEntry]) -> Vec<u8> {
    let mut blob = Vec::new();
    let Some(first) = entries.first() else {
        return blob;
    };
    let mut address = first.address as usize;

    for entry in entries {
        blob.extend_from_slice(&entry.bytes);
        blob.push(0);
        address += entry.bytes.len() + 1;
        let aligned = (address + 3) & !3;
        blob.resize(blob.len() + (aligned - address), 0);
        address = aligned;
    }

    blob
}

/// The pointer table as assembled: addresses in reverse listing order.
pub fn original_pointer_blob(entries: &[AscizEntry]) -> Vec<u8> {
    entries
        .iter()
        .rev()
        .flat_map(|entry| entry.address.to_le_bytes())
        .collect()
}

/// Translator-facing text for every entry, separated by dashed lines.
pub fn export_translations(entries: &[AscizEntry]) -> Result<String> {
    let mut out = String::new();
    for (index, entry) in entries.iter().enumerate() {
        // Raw newlines in listings are source formatting, not line breaks.
        let bytes: Vec<u8> = entry.bytes.iter().copied().filter(|&b| b != b'\n').collect();
        let text = TextCodec::LISTING
            .decode(&bytes)
            .map_err(|e| e.at_entry(index))?;
        out.push_str(&text);
        out.push_str(ENTRY_SEPARATOR);
        out.push('\n');
    }
    Ok(out)
}

pub fn parse_translations(src: &str) -> Vec<String> {
    src.split(ENTRY_SEPARATOR)
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(str::to_string)
        .collect()
}

/// Position in a list of translated entries, handed from one table to the
/// next.
#[derive(Copy, Clone, Debug)]
pub struct TranslationCursor<'a> {
    entries: &'a [String],
    position: usize,
}

impl<'a> TranslationCursor<'a> {
    pub fn new(entries: &'a [String]) -> Self {
        Self {
            entries,
            position: 0,
        }
    }

    pub fn remaining(&self) -> usize {
        self.entries.len() - self.position
    }

    /// The next `count` entries and the cursor just past them.
    pub fn take(self, count: usize) -> Result<(&'a [String], Self)> {
        if count > self.remaining() {
            return Err(LocaliserError::TranslationsExhausted {
                available: self.remaining(),
                wanted: count,
            });
        }
        let end = self.position + count;
        let taken = &self.entries[self.position..end];
        Ok((
            taken,
            Self {
                entries: self.entries,
                position: end,
            },
        ))
    }
}

/// Replace the strings of one listed table inside `disc`.
///
/// The translations are laid out from the start of the original text blob,
/// which is also their budget; pointer slots keep their reverse order.
pub fn patch_listing<'a>(
    disc: &mut [u8],
    entries: &[AscizEntry],
    cursor: TranslationCursor<'a>,
    font: Option<&FontMetrics>,
    width_budget: u32,
) -> Result<TranslationCursor<'a>> {
    let first = entries
        .first()
        .ok_or_else(|| LocaliserError::Config("listing has no .asciz entries".to_string()))?;

    let ptr_offset = find_blob(disc, &original_pointer_blob(entries), "ptr")?;
    let text_blob = original_text_blob(entries);
    let text_offset = find_blob(disc, &text_blob, "txt")?;

    let virtual_base = u32::try_from(text_offset)
        .ok()
        .and_then(|offset| first.address.checked_sub(offset))
        .ok_or_else(|| {
            LocaliserError::Config(format!(
                "text blob at {text_offset:#X} cannot be loaded at {:#010X}",
                first.address
            ))
        })?;

    let (lines, cursor) = cursor.take(entries.len())?;
    let count = entries.len();
    let slots: Vec<TextSlot<'_>> = lines
        .iter()
        .enumerate()
        .map(|(index, text)| TextSlot {
            index,
            slot: ptr_offset + 4 * (count - 1 - index),
            text,
        })
        .collect();

    let layout = ArenaLayout {
        virtual_base,
        arena_start: text_offset,
        arena_budget: text_blob.len(),
    };
    let width = font.map(|font| WidthLimit {
        font,
        budget: width_budget,
    });
    relocate_at(disc, &layout, &slots, TextCodec::LISTING, width)?;

    Ok(cursor)
}
