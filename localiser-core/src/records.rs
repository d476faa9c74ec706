//! JSON records exchanged with translators.

use serde::de::{DeserializeOwned, Error as _};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Glyph (as a one-character string) to pixel width.
pub type FontRecord = BTreeMap<String, u8>;

/// Inventory text keyed by item id.
pub type InventoryRecord = BTreeMap<u32, InventoryEntry>;

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct InventoryEntry {
    pub name: String,
    pub desc: String,
}

/// An offset or count written as a `0x`-prefixed hex string.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Hex(pub usize);

pub(crate) fn parse_hex(s: &str) -> Option<usize> {
    let digits = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X"))?;
    usize::from_str_radix(digits, 16).ok()
}

impl Serialize for Hex {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("0x{:X}", self.0))
    }
}

impl<'de> Deserialize<'de> for Hex {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        parse_hex(&s)
            .map(Hex)
            .ok_or_else(|| D::Error::custom(format!("invalid hex marker {s:?}")))
    }
}

/// A map overlay's message list plus the layout captured at export time.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct MessageListRecord {
    /// Intra-overlay offset of the text arena.
    pub txt_offset: Hex,
    /// Intra-overlay offset of the pointer table.
    pub ptr_offset: Hex,
    /// Arena budget in bytes.
    pub txt_size: Hex,
    /// Number of pointers in the table.
    pub ptr_size: Hex,
    pub messages: Vec<String>,
}

pub fn load_json<T: DeserializeOwned>(path: &Path) -> crate::Result<T> {
    let data = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&data)?)
}

pub fn save_json<T: Serialize>(path: &Path, value: &T) -> crate::Result<()> {
    let data = serde_json::to_string_pretty(value)?;
    fs::write(path, data)?;
    Ok(())
}
