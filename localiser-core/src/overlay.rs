use std::ops::Range;

use crate::{LocaliserError, Result};

/// Sectors of lead-in that the descriptor table counts but the image omits.
pub const SYNC_SECTORS: u32 = 0x40;
pub const SECTOR_SIZE: usize = 0x800;
pub const BLOCK_UNIT: usize = 0x100;

/// Load address of the main program overlay.
pub const BODYPROG_BASE: u32 = 0x8002_4B60;
/// Load address shared by every map overlay.
pub const MAP_BASE: u32 = 0x800C_9578;

/// Static location of one overlay inside the disc image.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct OverlayDescriptor {
    pub sector_start: u32,
    pub block_size_units: u32,
    pub name: &'static str,
}

impl OverlayDescriptor {
    pub const fn new(sector_start: u32, block_size_units: u32, name: &'static str) -> Self {
        Self {
            sector_start,
            block_size_units,
            name,
        }
    }

    /// Byte range covered by the overlay, without checking it against an image.
    pub fn range(&self) -> Result<Range<usize>> {
        let length = self.block_size_units as usize * BLOCK_UNIT;
        let sector = self.sector_start.checked_sub(SYNC_SECTORS).ok_or_else(|| {
            LocaliserError::OutOfBounds {
                what: format!("overlay {} (sector {:#x})", self.name, self.sector_start),
                start: 0,
                end: length,
                len: 0,
            }
        })?;
        let start = sector as usize * SECTOR_SIZE;
        Ok(start..start + length)
    }

    fn checked_range(&self, image_len: usize) -> Result<Range<usize>> {
        let range = self.range()?;
        if range.end > image_len {
            return Err(LocaliserError::OutOfBounds {
                what: format!("overlay {}", self.name),
                start: range.start,
                end: range.end,
                len: image_len,
            });
        }
        Ok(range)
    }

    /// Read-only window over this overlay's bytes.
    pub fn extract<'a>(&self, disc: &'a [u8]) -> Result<&'a [u8]> {
        let range = self.checked_range(disc.len())?;
        Ok(&disc[range])
    }

    /// Mutable window; writes land directly in the disc image.
    pub fn extract_mut<'a>(&self, disc: &'a mut [u8]) -> Result<&'a mut [u8]> {
        let range = self.checked_range(disc.len())?;
        Ok(&mut disc[range])
    }
}

pub const BODYPROG: OverlayDescriptor = OverlayDescriptor::new(0x000cf, 2635, "bodyprog");

/// Map overlays carrying a message table. The handful of tiny overlays
/// without one (map1_s04, map2_s03, map4_s00, map4_s06, map6_s05) are left out.
pub const MAP_OVERLAYS: &[OverlayDescriptor] = &[
    OverlayDescriptor::new(0x092af, 422, "map0_s00"),
    OverlayDescriptor::new(0x092e4, 401, "map0_s01"),
    OverlayDescriptor::new(0x09317, 160, "map0_s02"),
    OverlayDescriptor::new(0x0932b, 381, "map1_s00"),
    OverlayDescriptor::new(0x0935b, 349, "map1_s01"),
    OverlayDescriptor::new(0x09387, 454, "map1_s02"),
    OverlayDescriptor::new(0x093c0, 463, "map1_s03"),
    OverlayDescriptor::new(0x09404, 242, "map1_s05"),
    OverlayDescriptor::new(0x09423, 284, "map1_s06"),
    OverlayDescriptor::new(0x09447, 708, "map2_s00"),
    OverlayDescriptor::new(0x094a0, 131, "map2_s01"),
    OverlayDescriptor::new(0x094b1, 631, "map2_s02"),
    OverlayDescriptor::new(0x0950a, 95, "map2_s04"),
    OverlayDescriptor::new(0x09516, 201, "map3_s00"),
    OverlayDescriptor::new(0x09530, 243, "map3_s01"),
    OverlayDescriptor::new(0x0954f, 156, "map3_s02"),
    OverlayDescriptor::new(0x09563, 240, "map3_s03"),
    OverlayDescriptor::new(0x09581, 217, "map3_s04"),
    OverlayDescriptor::new(0x0959d, 320, "map3_s05"),
    OverlayDescriptor::new(0x095c5, 203, "map3_s06"),
    OverlayDescriptor::new(0x095e7, 236, "map4_s01"),
    OverlayDescriptor::new(0x09605, 639, "map4_s02"),
    OverlayDescriptor::new(0x09655, 373, "map4_s03"),
    OverlayDescriptor::new(0x09684, 218, "map4_s04"),
    OverlayDescriptor::new(0x096a0, 293, "map4_s05"),
    OverlayDescriptor::new(0x096cd, 335, "map5_s00"),
    OverlayDescriptor::new(0x096f7, 682, "map5_s01"),
    OverlayDescriptor::new(0x0974d, 277, "map5_s02"),
    OverlayDescriptor::new(0x09770, 220, "map5_s03"),
    OverlayDescriptor::new(0x0978c, 684, "map6_s00"),
    OverlayDescriptor::new(0x097e2, 193, "map6_s01"),
    OverlayDescriptor::new(0x097fb, 185, "map6_s02"),
    OverlayDescriptor::new(0x09813, 363, "map6_s03"),
    OverlayDescriptor::new(0x09841, 586, "map6_s04"),
    OverlayDescriptor::new(0x09894, 175, "map7_s00"),
    OverlayDescriptor::new(0x098aa, 415, "map7_s01"),
    OverlayDescriptor::new(0x098de, 559, "map7_s02"),
    OverlayDescriptor::new(0x09924, 698, "map7_s03"),
];

pub(crate) fn read_u32_le(buf: &[u8], offset: usize) -> Result<u32> {
    let bytes = offset
        .checked_add(4)
        .and_then(|end| buf.get(offset..end))
        .ok_or_else(|| LocaliserError::OutOfBounds {
            what: "pointer".to_string(),
            start: offset,
            end: offset.saturating_add(4),
            len: buf.len(),
        })?;
    Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

pub(crate) fn write_u32_le(buf: &mut [u8], offset: usize, value: u32) {
    buf[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}

/// Null-terminated run starting at `offset`, without the terminator.
pub(crate) fn read_c_string(buf: &[u8], offset: usize) -> &[u8] {
    let tail = buf.get(offset..).unwrap_or(&[]);
    let end = tail.iter().position(|&b| b == 0).unwrap_or(tail.len());
    &tail[..end]
}

/// First occurrence of `needle` in `haystack`.
pub(crate) fn find_blob(haystack: &[u8], needle: &[u8], name: &str) -> Result<usize> {
    if !needle.is_empty() {
        if let Some(pos) = haystack.windows(needle.len()).position(|w| w == needle) {
            return Ok(pos);
        }
    }
    Err(LocaliserError::BlobNotFound {
        name: name.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn map0_s00_window_geometry() {
        let desc = OverlayDescriptor::new(0x092af, 422, "map0_s00");
        let range = desc.range().unwrap();
        assert_eq!(range.start, (0x092af - 0x40) * 0x800);
        assert_eq!(range.len(), 422 * 0x100);
    }

    #[test]
    fn extract_rejects_short_image() {
        let desc = OverlayDescriptor::new(0x41, 9, "tiny");
        let disc = vec![0u8; 0x800 + 8 * 0x100];
        let err = desc.extract(&disc).unwrap_err();
        assert!(matches!(err, LocaliserError::OutOfBounds { .. }));
    }

    #[test]
    fn extract_rejects_sector_before_lead_in() {
        let desc = OverlayDescriptor::new(0x10, 1, "bogus");
        assert!(desc.range().is_err());
    }

    #[test]
    fn writes_through_window_reach_disc() {
        let desc = OverlayDescriptor::new(0x41, 1, "tiny");
        let mut disc = vec![0u8; 0x1000];
        desc.extract_mut(&mut disc).unwrap()[3] = 0xAB;
        assert_eq!(disc[0x803], 0xAB);
    }

    #[test]
    fn c_string_stops_at_null_or_end() {
        let buf = b"abc\0def";
        assert_eq!(read_c_string(buf, 0), b"abc");
        assert_eq!(read_c_string(buf, 4), b"def");
        assert_eq!(read_c_string(buf, 40), b"");
    }

    #[test]
    fn missing_blob_is_reported_by_name() {
        let err = find_blob(b"hello", b"xyz", "ptr").unwrap_err();
        assert!(matches!(err, LocaliserError::BlobNotFound { ref name } if name == "ptr"));
        assert_eq!(find_blob(b"hello", b"llo", "txt").unwrap(), 2);
    }
}
