//! Message lists of the map overlays.
//!
//! Each map overlay's header holds two absolute pointers: the start of the
//! message pointer table and the address just past it. The table is read up
//! to that address or the first null pointer, whichever comes first.

use tracing::debug;

use crate::font::FontMetrics;
use crate::overlay::{read_c_string, read_u32_le, OverlayDescriptor, MAP_BASE};
use crate::records::{Hex, MessageListRecord};
use crate::relocate::{relocate_messages, slot_state, ArenaLayout, SlotState, WidthLimit};
use crate::text::TextCodec;
use crate::{LocaliserError, Result};

/// Header word holding the address of the message pointer table.
pub const MESSAGE_TABLE_PTR: usize = 0x34;
/// Header word holding the address where the pointer table ends.
pub const MESSAGE_TABLE_END_PTR: usize = 0x28;

fn header_offset(window: &[u8], header: usize) -> Result<usize> {
    let pointer = read_u32_le(window, header)?;
    match pointer.checked_sub(MAP_BASE) {
        Some(offset) if (offset as usize) <= window.len() => Ok(offset as usize),
        _ => Err(LocaliserError::OutOfBounds {
            what: format!("header pointer {pointer:#010X} at {header:#X}"),
            start: pointer.wrapping_sub(MAP_BASE) as usize,
            end: pointer.wrapping_sub(MAP_BASE) as usize,
            len: window.len(),
        }),
    }
}

/// Export the message list of one map window.
///
/// The recorded arena spans from the lowest string to one past the
/// terminator of the highest, so re-inserting unchanged text always fits.
pub fn extract_messages(window: &[u8]) -> Result<MessageListRecord> {
    let ptr_offset = header_offset(window, MESSAGE_TABLE_PTR)?;
    let end_offset = header_offset(window, MESSAGE_TABLE_END_PTR)?;

    let mut messages = Vec::new();
    let mut arena_start = usize::MAX;
    let mut arena_end = 0usize;
    let mut slot = ptr_offset;

    while slot != end_offset && slot + 4 <= window.len() {
        if read_u32_le(window, slot)? == 0 {
            break;
        }
        let target = match slot_state(window, slot, MAP_BASE)? {
            SlotState::Text(target) => target,
            SlotState::Empty => {
                return Err(LocaliserError::OutOfBounds {
                    what: format!("message {} target", messages.len()),
                    start: slot,
                    end: slot + 4,
                    len: window.len(),
                });
            }
        };

        let index = messages.len();
        let packed = read_c_string(window, target);
        let text = TextCodec::MESSAGE
            .decode(packed)
            .map_err(|e| e.at_entry(index))?;
        messages.push(text);
        arena_start = arena_start.min(target);
        arena_end = arena_end.max(target + packed.len() + 1);
        slot += 4;
    }

    if messages.is_empty() {
        arena_start = 0;
    }

    Ok(MessageListRecord {
        txt_offset: Hex(arena_start),
        ptr_offset: Hex(ptr_offset),
        txt_size: Hex(arena_end.saturating_sub(arena_start)),
        ptr_size: Hex(messages.len()),
        messages,
    })
}

/// Relocate a translated message list into its map window.
pub fn patch_messages(
    window: &mut [u8],
    record: &MessageListRecord,
    width: Option<WidthLimit<'_>>,
) -> Result<usize> {
    let layout = ArenaLayout {
        virtual_base: MAP_BASE,
        arena_start: record.txt_offset.0,
        arena_budget: record.txt_size.0,
    };
    relocate_messages(
        window,
        &layout,
        record.ptr_offset.0,
        record.ptr_size.0,
        &record.messages,
        TextCodec::MESSAGE,
        width,
    )
}

pub fn dump_map(disc: &[u8], overlay: &OverlayDescriptor) -> Result<MessageListRecord> {
    let window = overlay.extract(disc)?;
    let record = extract_messages(window)?;
    debug!("{}: {} messages", overlay.name, record.messages.len());
    Ok(record)
}

pub fn patch_map(
    disc: &mut [u8],
    overlay: &OverlayDescriptor,
    record: &MessageListRecord,
    font: Option<&FontMetrics>,
    width_budget: u32,
) -> Result<usize> {
    let window = overlay.extract_mut(disc)?;
    let width = font.map(|font| WidthLimit {
        font,
        budget: width_budget,
    });
    patch_messages(window, record, width)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::font::GLYPH_COUNT;
    use crate::overlay::write_u32_le;

    /// A small map window whose strings are stored in reverse order, the
    /// way the shipped overlays lay them out.
    fn map_window(messages: &[&[u8]]) -> Vec<u8> {
        let mut window = vec![0u8; 0x400];
        let table = 0x40;
        write_u32_le(&mut window, MESSAGE_TABLE_PTR, MAP_BASE + table as u32);
        write_u32_le(
            &mut window,
            MESSAGE_TABLE_END_PTR,
            MAP_BASE + (table + 4 * messages.len()) as u32,
        );

        let mut cursor = 0x100;
        for (i, text) in messages.iter().enumerate().rev() {
            write_u32_le(&mut window, table + 4 * i, MAP_BASE + cursor as u32);
            window[cursor..cursor + text.len()].copy_from_slice(text);
            cursor += text.len() + 1;
        }
        window
    }

    #[test]
    fn extracts_messages_and_layout() {
        let window = map_window(&[b"Cheryl~N?", b"Door_is_locked.~E"]);
        let record = extract_messages(&window).unwrap();
        assert_eq!(record.messages, vec!["Cheryl\n?", "Door is locked.~E"]);
        assert_eq!(record.ptr_offset, Hex(0x40));
        assert_eq!(record.ptr_size, Hex(2));
        assert_eq!(record.txt_offset, Hex(0x100));
        assert_eq!(record.txt_size, Hex(18 + 10));
    }

    #[test]
    fn extraction_stops_at_null_pointer() {
        let mut window = map_window(&[b"one", b"two", b"three"]);
        write_u32_le(&mut window, 0x44, 0);
        let record = extract_messages(&window).unwrap();
        assert_eq!(record.messages, vec!["one"]);
    }

    #[test]
    fn unchanged_text_fits_its_own_arena() {
        let mut window = map_window(&[b"Harry", b"Where_am_I?"]);
        let record = extract_messages(&window).unwrap();
        let font = FontMetrics::from_widths([8u8; GLYPH_COUNT]);
        patch_messages(
            &mut window,
            &record,
            Some(WidthLimit {
                font: &font,
                budget: 320,
            }),
        )
        .unwrap();
        assert_eq!(extract_messages(&window).unwrap(), record);
    }

    #[test]
    fn longer_translation_is_rejected() {
        let mut window = map_window(&[b"Hi"]);
        let before = window.clone();
        let mut record = extract_messages(&window).unwrap();
        record.messages[0] = "Cześć".to_string();
        let err = patch_messages(&mut window, &record, None).unwrap_err();
        assert!(matches!(err, LocaliserError::CapacityExceeded { needed: 6, budget: 3 }));
        assert_eq!(window, before);
    }

    #[test]
    fn header_outside_window_is_an_error() {
        let mut window = vec![0u8; 0x80];
        write_u32_le(&mut window, MESSAGE_TABLE_PTR, 0x1234);
        assert!(matches!(
            extract_messages(&window),
            Err(LocaliserError::OutOfBounds { .. })
        ));
    }

    #[test]
    fn raw_layout_bytes_do_not_grow_the_text() {
        let mut window = map_window(&[b"Door_is\nlocked.", b"It's ~J1.5\tcold~E"]);
        let record = extract_messages(&window).unwrap();
        assert_eq!(record.messages, vec!["Door islocked.", "It's~J1.5\tcold~E"]);

        patch_messages(&mut window, &record, None).unwrap();
        let again = extract_messages(&window).unwrap();
        assert_eq!(again.messages, record.messages);

        // Once the layout bytes are gone, another pass changes nothing.
        let settled = window.clone();
        patch_messages(&mut window, &again, None).unwrap();
        assert_eq!(window, settled);
    }

    #[test]
    fn oversized_markers_are_rejected() {
        let mut window = map_window(&[b"Hi"]);
        let before = window.clone();
        let record = extract_messages(&window).unwrap();

        let mut bad = record.clone();
        bad.txt_offset = Hex(usize::MAX);
        assert!(matches!(
            patch_messages(&mut window, &bad, None),
            Err(LocaliserError::OutOfBounds { .. })
        ));

        let mut bad = record;
        bad.ptr_offset = Hex(usize::MAX - 1);
        let err = patch_messages(&mut window, &bad, None).unwrap_err();
        assert!(matches!(err.root_cause(), LocaliserError::OutOfBounds { .. }));
        assert_eq!(window, before);
    }
}
