//! The main program overlay: inventory text, font widths and a menu fix-up.
//!
//! bodyprog is the only obfuscated overlay, so everything here works on a
//! deciphered copy that is re-ciphered and written back as a whole.

use tracing::{debug, info};

use crate::cipher;
use crate::font::{FontMetrics, FONT_WIDTHS_OFFSET};
use crate::overlay::{read_c_string, BODYPROG, BODYPROG_BASE};
use crate::records::{InventoryEntry, InventoryRecord};
use crate::relocate::{relocate_slots, slot_state, ArenaLayout, SlotState, SlotSummary, SlotTables};
use crate::text::TextCodec;
use crate::{LocaliserError, Result};

const fn intra(address: u32) -> usize {
    (address - BODYPROG_BASE) as usize
}

/// Item name and description pointer arrays. The name array ends where the
/// description array begins.
pub const INVENTORY_TABLES: SlotTables = SlotTables {
    names_offset: intra(0x800A_DB60),
    descs_offset: intra(0x800A_DE6C),
    slot_count: (0x800A_DE6C - 0x800A_DB60) / 4,
};

/// Region reserved for inventory strings.
pub const INVENTORY_ARENA: ArenaLayout = ArenaLayout {
    virtual_base: BODYPROG_BASE,
    arena_start: 0x1B1C,
    arena_budget: 0x175C,
};

/// The main menu hard-codes a left double quote, whose glyph is reused
/// for a localised letter.
pub const MENU_LEFT_QUOTE: usize = intra(0x8002_54F4);
pub const MENU_QUOTE_REPLACEMENT: u8 = b']';

/// Read every occupied inventory slot from a deciphered window.
pub fn extract_inventory(window: &[u8]) -> Result<InventoryRecord> {
    let mut record = InventoryRecord::new();
    let tables = &INVENTORY_TABLES;

    for id in 0..tables.slot_count {
        let name = slot_state(window, tables.name_slot(id), BODYPROG_BASE)?;
        let desc = slot_state(window, tables.desc_slot(id), BODYPROG_BASE)?;
        if name == SlotState::Empty && desc == SlotState::Empty {
            continue;
        }

        // A half-filled slot exports its missing half as empty text.
        let decode = |state| match state {
            SlotState::Text(offset) => TextCodec::INVENTORY
                .decode(read_c_string(window, offset))
                .map_err(|e| e.at_entry(id)),
            SlotState::Empty => Ok(String::new()),
        };
        record.insert(
            id as u32,
            InventoryEntry {
                name: decode(name)?,
                desc: decode(desc)?,
            },
        );
    }

    debug!("read {} inventory entries", record.len());
    Ok(record)
}

pub fn patch_menu_quote(window: &mut [u8]) -> Result<()> {
    let len = window.len();
    let byte = window
        .get_mut(MENU_LEFT_QUOTE)
        .ok_or_else(|| LocaliserError::OutOfBounds {
            what: "menu quote".to_string(),
            start: MENU_LEFT_QUOTE,
            end: MENU_LEFT_QUOTE + 1,
            len,
        })?;
    *byte = MENU_QUOTE_REPLACEMENT;
    Ok(())
}

/// Font widths and inventory text of the bodyprog overlay in `disc`.
pub fn dump_bodyprog(disc: &[u8]) -> Result<(FontMetrics, InventoryRecord)> {
    let mut work = BODYPROG.extract(disc)?.to_vec();
    cipher::apply(&mut work);

    let font = FontMetrics::extract_from(&work, FONT_WIDTHS_OFFSET)?;
    let inventory = extract_inventory(&work)?;
    Ok((font, inventory))
}

/// Patch inventory text, font widths and the menu quote into `disc`.
///
/// The overlay is deciphered into a scratch copy; `disc` is only written
/// once every step has succeeded.
pub fn patch_bodyprog(
    disc: &mut [u8],
    inventory: &InventoryRecord,
    font: &FontMetrics,
) -> Result<SlotSummary> {
    let window = BODYPROG.extract_mut(disc)?;
    let mut work = window.to_vec();
    cipher::apply(&mut work);

    let summary = relocate_slots(
        &mut work,
        &INVENTORY_ARENA,
        &INVENTORY_TABLES,
        inventory,
        TextCodec::INVENTORY,
    )?;
    font.patch_into(&mut work, FONT_WIDTHS_OFFSET)?;
    patch_menu_quote(&mut work)?;

    cipher::apply(&mut work);
    window.copy_from_slice(&work);

    info!(
        "bodyprog: {} inventory entries patched, {} skipped",
        summary.patched, summary.skipped
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::font::GLYPH_COUNT;
    use crate::overlay::write_u32_le;

    fn plain_bodyprog() -> Vec<u8> {
        let len = BODYPROG.block_size_units as usize * crate::overlay::BLOCK_UNIT;
        let mut work = vec![0u8; len];
        let tables = &INVENTORY_TABLES;
        let mut cursor = INVENTORY_ARENA.arena_start;
        let items: [(usize, &[u8], &[u8]); 2] =
            [(0, b"Handgun", b"9mm\nAmmo"), (3, b"Knife", b"Sharp")];
        for (id, name, desc) in items {
            for (slot, text) in [(tables.name_slot(id), name), (tables.desc_slot(id), desc)] {
                write_u32_le(&mut work, slot, BODYPROG_BASE + cursor as u32);
                work[cursor..cursor + text.len()].copy_from_slice(text);
                cursor += text.len() + 1;
            }
        }
        work
    }

    #[test]
    fn tables_do_not_overlap() {
        let t = INVENTORY_TABLES;
        assert_eq!(t.names_offset + 4 * t.slot_count, t.descs_offset);
        assert_eq!(t.slot_count, 195);
    }

    #[test]
    fn extracts_only_occupied_slots() {
        let record = extract_inventory(&plain_bodyprog()).unwrap();
        assert_eq!(record.len(), 2);
        assert_eq!(record[&0].name, "Handgun");
        assert_eq!(record[&0].desc, "9mm\nAmmo");
        assert_eq!(record[&3].name, "Knife");
    }

    #[test]
    fn patch_round_trips_through_cipher() {
        let start = BODYPROG.range().unwrap().start;
        let mut work = plain_bodyprog();
        FontMetrics::from_widths([7u8; GLYPH_COUNT])
            .patch_into(&mut work, FONT_WIDTHS_OFFSET)
            .unwrap();
        cipher::apply(&mut work);
        let mut disc = vec![0u8; start];
        disc.extend_from_slice(&work);

        let (font, mut inventory) = dump_bodyprog(&disc).unwrap();
        assert_eq!(font.width_of(b'A').unwrap(), 7);

        inventory.get_mut(&3).unwrap().name = "Nóż".to_string();
        let wider = FontMetrics::from_widths([9u8; GLYPH_COUNT]);
        let summary = patch_bodyprog(&mut disc, &inventory, &wider).unwrap();
        assert_eq!(summary.patched, 2);

        let (font, inventory) = dump_bodyprog(&disc).unwrap();
        assert_eq!(font, wider);
        assert_eq!(inventory[&3].name, "Nóż");
        assert_eq!(inventory[&0].desc, "9mm\nAmmo");

        let mut plain = disc[start..].to_vec();
        cipher::apply(&mut plain);
        assert_eq!(plain[MENU_LEFT_QUOTE], b']');
    }

    #[test]
    fn failed_patch_leaves_disc_untouched() {
        let start = BODYPROG.range().unwrap().start;
        let mut work = plain_bodyprog();
        cipher::apply(&mut work);
        let mut disc = vec![0u8; start];
        disc.extend_from_slice(&work);
        let before = disc.clone();

        let mut inventory = dump_bodyprog(&disc).unwrap().1;
        inventory.get_mut(&0).unwrap().desc = "x".repeat(INVENTORY_ARENA.arena_budget);
        let font = FontMetrics::from_widths([1u8; GLYPH_COUNT]);
        let err = patch_bodyprog(&mut disc, &inventory, &font).unwrap_err();
        assert!(matches!(err, LocaliserError::CapacityExceeded { .. }));
        assert_eq!(disc, before);
    }
}
