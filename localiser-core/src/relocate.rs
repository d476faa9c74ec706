//! Rewriting pointer tables and their text arenas.
//!
//! Every relocation is staged first: all strings are encoded, measured and
//! laid out, and the aggregate size is checked against the arena budget.
//! Only then is the window touched, so a failed batch leaves it unchanged.

use std::collections::BTreeSet;

use tracing::{debug, warn};

use crate::font::FontMetrics;
use crate::overlay::{read_u32_le, write_u32_le};
use crate::records::InventoryRecord;
use crate::text::TextCodec;
use crate::width::measure;
use crate::{LocaliserError, Result};

/// Placement of a text arena inside a window.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ArenaLayout {
    /// Address the window is loaded at; pointers are `virtual_base + offset`.
    pub virtual_base: u32,
    pub arena_start: usize,
    pub arena_budget: usize,
}

#[derive(Copy, Clone, Debug)]
pub struct WidthLimit<'a> {
    pub font: &'a FontMetrics,
    pub budget: u32,
}

/// Content of a pointer slot as found in the window.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SlotState {
    Empty,
    /// Intra-window offset of the string the slot points at.
    Text(usize),
}

/// Classify the pointer stored at `slot_offset`.
///
/// A zero pointer, or one that lands outside the window, is an empty slot.
pub fn slot_state(window: &[u8], slot_offset: usize, virtual_base: u32) -> Result<SlotState> {
    let pointer = read_u32_le(window, slot_offset)?;
    if pointer == 0 {
        return Ok(SlotState::Empty);
    }
    match pointer.checked_sub(virtual_base) {
        Some(offset) if (offset as usize) < window.len() => Ok(SlotState::Text(offset as usize)),
        _ => Ok(SlotState::Empty),
    }
}

/// One string destined for one pointer slot.
#[derive(Copy, Clone, Debug)]
pub struct TextSlot<'a> {
    /// Reported in errors: position in a message list, or an inventory id.
    pub index: usize,
    pub slot: usize,
    pub text: &'a str,
}

struct Staged {
    slot: usize,
    offset: usize,
    pointer: u32,
    bytes: Vec<u8>,
}

fn out_of_bounds(what: &str, start: usize, end: usize, len: usize) -> LocaliserError {
    LocaliserError::OutOfBounds {
        what: what.to_string(),
        start,
        end,
        len,
    }
}

fn stage(
    window_len: usize,
    layout: &ArenaLayout,
    entries: &[TextSlot<'_>],
    codec: TextCodec,
    width: Option<WidthLimit<'_>>,
) -> Result<Vec<Staged>> {
    let arena_end = match layout.arena_start.checked_add(layout.arena_budget) {
        Some(end) if end <= window_len => end,
        end => {
            return Err(out_of_bounds(
                "text arena",
                layout.arena_start,
                end.unwrap_or(usize::MAX),
                window_len,
            ));
        }
    };

    let mut staged = Vec::with_capacity(entries.len());
    let mut cursor = layout.arena_start;

    for entry in entries {
        let bytes = codec
            .encode(entry.text)
            .map_err(|e| e.at_entry(entry.index))?;

        if let Some(limit) = width {
            let px = measure(&bytes, limit.font).map_err(|e| e.at_entry(entry.index))?;
            if px > limit.budget {
                return Err(LocaliserError::LineTooWide {
                    width: px,
                    budget: limit.budget,
                }
                .at_entry(entry.index));
            }
        }

        if entry.slot.checked_add(4).map_or(true, |end| end > window_len) {
            let end = entry.slot.saturating_add(4);
            return Err(out_of_bounds("pointer slot", entry.slot, end, window_len)
                .at_entry(entry.index));
        }

        let pointer = u32::try_from(cursor)
            .ok()
            .and_then(|offset| layout.virtual_base.checked_add(offset))
            .ok_or_else(|| out_of_bounds("pointer target", cursor, cursor, window_len))?;

        let offset = cursor;
        cursor += bytes.len();
        staged.push(Staged {
            slot: entry.slot,
            offset,
            pointer,
            bytes,
        });
    }

    let needed = cursor - layout.arena_start;
    if cursor > arena_end {
        return Err(LocaliserError::CapacityExceeded {
            needed,
            budget: layout.arena_budget,
        });
    }

    // A slot inside the written span would be clobbered by the text.
    if let Some(s) = staged
        .iter()
        .find(|s| s.slot < cursor && s.slot + 4 > layout.arena_start)
    {
        return Err(LocaliserError::Config(format!(
            "pointer slot {:#X} lies inside the text arena {:#X}..{:#X}",
            s.slot, layout.arena_start, cursor
        )));
    }

    Ok(staged)
}

fn commit(window: &mut [u8], staged: &[Staged]) {
    for s in staged {
        window[s.offset..s.offset + s.bytes.len()].copy_from_slice(&s.bytes);
        write_u32_le(window, s.slot, s.pointer);
    }
}

/// Lay `entries` out back to back from the arena start and point each slot
/// at its string. Returns the number of arena bytes used.
pub fn relocate_at(
    window: &mut [u8],
    layout: &ArenaLayout,
    entries: &[TextSlot<'_>],
    codec: TextCodec,
    width: Option<WidthLimit<'_>>,
) -> Result<usize> {
    let staged = stage(window.len(), layout, entries, codec, width)?;
    commit(window, &staged);

    let used: usize = staged.iter().map(|s| s.bytes.len()).sum();
    debug!(
        "relocated {} strings into {:#X} of {:#X} arena bytes",
        staged.len(),
        used,
        layout.arena_budget
    );
    Ok(used)
}

/// Sequential message list: slot `i` sits at `ptr_table_offset + 4 * i`.
///
/// The list must have exactly as many messages as the table had pointers.
pub fn relocate_messages<S: AsRef<str>>(
    window: &mut [u8],
    layout: &ArenaLayout,
    ptr_table_offset: usize,
    expected_count: usize,
    messages: &[S],
    codec: TextCodec,
    width: Option<WidthLimit<'_>>,
) -> Result<usize> {
    if messages.len() != expected_count {
        return Err(LocaliserError::EntryCountMismatch {
            expected: expected_count,
            got: messages.len(),
        });
    }

    let window_len = window.len();
    let entries = messages
        .iter()
        .enumerate()
        .map(|(index, text)| {
            let slot = index
                .checked_mul(4)
                .and_then(|rel| ptr_table_offset.checked_add(rel))
                .ok_or_else(|| {
                    out_of_bounds("pointer slot", ptr_table_offset, usize::MAX, window_len)
                        .at_entry(index)
                })?;
            Ok(TextSlot {
                index,
                slot,
                text: text.as_ref(),
            })
        })
        .collect::<Result<Vec<_>>>()?;

    relocate_at(window, layout, &entries, codec, width)
}

/// Parallel name/description pointer arrays indexed by a small id.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct SlotTables {
    pub names_offset: usize,
    pub descs_offset: usize,
    pub slot_count: usize,
}

impl SlotTables {
    pub fn name_slot(&self, id: usize) -> usize {
        self.names_offset + 4 * id
    }

    pub fn desc_slot(&self, id: usize) -> usize {
        self.descs_offset + 4 * id
    }
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct SlotSummary {
    pub patched: usize,
    pub skipped: usize,
}

/// Replace the name and description behind every occupied slot named in
/// `entries`. Ids whose slots are empty or beyond the table are skipped.
///
/// Any other slot still pointing into the arena would be left dangling once
/// the arena is rewritten, so it fails the batch with `DanglingSlot`.
pub fn relocate_slots(
    window: &mut [u8],
    layout: &ArenaLayout,
    tables: &SlotTables,
    entries: &InventoryRecord,
    codec: TextCodec,
) -> Result<SlotSummary> {
    let mut summary = SlotSummary::default();
    let mut slots = Vec::with_capacity(entries.len() * 2);

    for (&id, entry) in entries {
        let id = id as usize;
        if id >= tables.slot_count {
            warn!("inventory id {} is beyond the {} table slots, skipping", id, tables.slot_count);
            summary.skipped += 1;
            continue;
        }

        let halves = [
            (tables.name_slot(id), entry.name.as_str()),
            (tables.desc_slot(id), entry.desc.as_str()),
        ];
        let mut staged = false;
        for (slot, text) in halves {
            match slot_state(window, slot, layout.virtual_base)? {
                SlotState::Text(_) => {
                    slots.push(TextSlot {
                        index: id,
                        slot,
                        text,
                    });
                    staged = true;
                }
                SlotState::Empty if text.is_empty() => {}
                SlotState::Empty => {
                    warn!("inventory slot {} has no string at {:#X}, dropping {:?}", id, slot, text)
                }
            }
        }

        if staged {
            summary.patched += 1;
        } else {
            warn!("inventory slot {} is empty in this binary, skipping", id);
            summary.skipped += 1;
        }
    }

    let covered: BTreeSet<usize> = slots.iter().map(|s| s.slot).collect();
    let arena = layout.arena_start..layout.arena_start.saturating_add(layout.arena_budget);
    for id in 0..tables.slot_count {
        for slot in [tables.name_slot(id), tables.desc_slot(id)] {
            if covered.contains(&slot) {
                continue;
            }
            if let SlotState::Text(target) = slot_state(window, slot, layout.virtual_base)? {
                if arena.contains(&target) {
                    return Err(LocaliserError::DanglingSlot { slot }.at_entry(id));
                }
            }
        }
    }

    relocate_at(window, layout, &slots, codec, None)?;
    Ok(summary)
}
