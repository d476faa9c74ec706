use crate::overlay::BODYPROG_BASE;
use crate::records::FontRecord;
use crate::{LocaliserError, Result};

/// First code point with an entry in the width table (`'`).
pub const FIRST_GLYPH: u8 = 0x27;
pub const GLYPH_COUNT: usize = 84;

/// Location of the width table inside the deciphered bodyprog overlay.
pub const FONT_WIDTHS_OFFSET: usize = (0x8002_5D6C - BODYPROG_BASE) as usize;

/// Per-glyph pixel widths for the 16px font.
///
/// The slots for `\` and `^` hold the glyphs drawn for `!` and `&`, so the
/// exported record names them that way.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FontMetrics {
    widths: [u8; GLYPH_COUNT],
}

fn slot_for_code(code: u8) -> Option<usize> {
    let code = match code {
        b'!' => b'\\',
        b'&' => b'^',
        c => c,
    };
    let slot = code.checked_sub(FIRST_GLYPH)? as usize;
    (slot < GLYPH_COUNT).then_some(slot)
}

fn record_key(slot: usize) -> char {
    match FIRST_GLYPH + slot as u8 {
        b'\\' => '!',
        b'^' => '&',
        c => c as char,
    }
}

impl FontMetrics {
    pub fn from_widths(widths: [u8; GLYPH_COUNT]) -> Self {
        Self { widths }
    }

    pub fn extract_from(window: &[u8], offset: usize) -> Result<Self> {
        let table = window
            .get(offset..offset.saturating_add(GLYPH_COUNT))
            .ok_or_else(|| LocaliserError::OutOfBounds {
                what: "font width table".to_string(),
                start: offset,
                end: offset.saturating_add(GLYPH_COUNT),
                len: window.len(),
            })?;
        let mut widths = [0u8; GLYPH_COUNT];
        widths.copy_from_slice(table);
        Ok(Self { widths })
    }

    pub fn patch_into(&self, window: &mut [u8], offset: usize) -> Result<()> {
        let len = window.len();
        let table = window
            .get_mut(offset..offset.saturating_add(GLYPH_COUNT))
            .ok_or_else(|| LocaliserError::OutOfBounds {
                what: "font width table".to_string(),
                start: offset,
                end: offset.saturating_add(GLYPH_COUNT),
                len,
            })?;
        table.copy_from_slice(&self.widths);
        Ok(())
    }

    /// Build the table from an exported record. Every glyph must be present.
    pub fn load(record: &FontRecord) -> Result<Self> {
        let mut widths = [0u8; GLYPH_COUNT];
        let mut seen = [false; GLYPH_COUNT];

        for (key, &width) in record {
            let mut chars = key.chars();
            let ch = match (chars.next(), chars.next()) {
                (Some(ch), None) => ch,
                _ => {
                    return Err(LocaliserError::Config(format!(
                        "font record key {key:?} is not a single character"
                    )))
                }
            };
            let slot = u8::try_from(ch)
                .ok()
                .and_then(slot_for_code)
                .ok_or(LocaliserError::MissingGlyph { ch })?;
            widths[slot] = width;
            seen[slot] = true;
        }

        if let Some(slot) = seen.iter().position(|&s| !s) {
            return Err(LocaliserError::MissingGlyph {
                ch: record_key(slot),
            });
        }

        Ok(Self { widths })
    }

    pub fn store(&self) -> FontRecord {
        self.widths
            .iter()
            .enumerate()
            .map(|(slot, &w)| (record_key(slot).to_string(), w))
            .collect()
    }

    pub fn width_of(&self, code: u8) -> Result<u32> {
        slot_for_code(code)
            .map(|slot| u32::from(self.widths[slot]))
            .ok_or(LocaliserError::MissingGlyph { ch: code as char })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp() -> FontMetrics {
        let mut widths = [0u8; GLYPH_COUNT];
        for (i, w) in widths.iter_mut().enumerate() {
            *w = (i % 13) as u8 + 1;
        }
        FontMetrics::from_widths(widths)
    }

    #[test]
    fn record_uses_substitute_keys() {
        let record = ramp().store();
        assert_eq!(record.len(), GLYPH_COUNT);
        assert!(record.contains_key("!"));
        assert!(record.contains_key("&"));
        assert!(!record.contains_key("\\"));
        assert!(!record.contains_key("^"));
        assert_eq!(record["!"], ramp().widths[(b'\\' - FIRST_GLYPH) as usize]);
    }

    #[test]
    fn store_then_load_preserves_widths() {
        let metrics = ramp();
        assert_eq!(FontMetrics::load(&metrics.store()).unwrap(), metrics);
    }

    #[test]
    fn load_requires_every_glyph() {
        let mut record = ramp().store();
        record.remove("z");
        let err = FontMetrics::load(&record).unwrap_err();
        assert!(matches!(err, LocaliserError::MissingGlyph { ch: 'z' }));
    }

    #[test]
    fn load_rejects_keys_outside_run() {
        let mut record = ramp().store();
        record.insert("#".to_string(), 4);
        let err = FontMetrics::load(&record).unwrap_err();
        assert!(matches!(err, LocaliserError::MissingGlyph { ch: '#' }));
    }

    #[test]
    fn extract_and_patch_same_region() {
        let mut window = vec![0u8; 200];
        ramp().patch_into(&mut window, 50).unwrap();
        assert_eq!(window[49], 0);
        assert_eq!(window[50 + GLYPH_COUNT], 0);
        assert_eq!(FontMetrics::extract_from(&window, 50).unwrap(), ramp());
        assert!(FontMetrics::extract_from(&window, 150).is_err());
    }

    #[test]
    fn width_lookup_honours_remap() {
        let metrics = ramp();
        assert_eq!(metrics.width_of(b'!').unwrap(), metrics.width_of(b'\\').unwrap());
        assert_eq!(metrics.width_of(b'&').unwrap(), metrics.width_of(b'^').unwrap());
        assert_eq!(metrics.width_of(b'\'').unwrap(), 1);
        assert!(matches!(
            metrics.width_of(b'{'),
            Err(LocaliserError::MissingGlyph { ch: '{' })
        ));
        assert!(metrics.width_of(b'"').is_err());
    }
}
