//! Conversion between translator-facing text and the packed in-game alphabet.
//!
//! Packed strings are 7-bit ASCII, null terminated. `_` is a visible space,
//! `~` introduces inline control tokens and a handful of punctuation codes
//! are repurposed as accented letters whose glyphs replaced them in the font.

use crate::width::zero_width_token_len;
use crate::{LocaliserError, Result};

/// Accented letters and the punctuation codes whose glyphs they occupy.
pub const SUBSTITUTIONS: [(char, u8); 9] = [
    ('ł', b';'),
    ('ó', b'*'),
    ('ę', b'>'),
    ('ą', b'^'),
    ('ż', b'='),
    ('ć', b'<'),
    ('ń', b'+'),
    ('ś', b'/'),
    ('ź', b'Q'),
];

pub const SPACE_CODE: u8 = b'_';
pub const LINE_BREAK_TOKEN: &[u8; 2] = b"~N";

/// How a line break is stored in the packed form.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum LineBreak {
    /// `~N`, used by map messages.
    Token,
    /// A raw `0x0A`, used by the inventory tables.
    Byte,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct TextCodec {
    pub line_break: LineBreak,
    /// Raw `0x0A` and `0x20` bytes are layout padding in this text and
    /// decode to nothing.
    pub strip_layout: bool,
}

fn substitute(ch: char) -> Option<u8> {
    SUBSTITUTIONS.iter().find(|(c, _)| *c == ch).map(|&(_, code)| code)
}

fn unsubstitute(code: u8) -> Option<char> {
    SUBSTITUTIONS.iter().find(|(_, b)| *b == code).map(|&(c, _)| c)
}

impl TextCodec {
    pub const MESSAGE: TextCodec = TextCodec {
        line_break: LineBreak::Token,
        strip_layout: true,
    };
    pub const INVENTORY: TextCodec = TextCodec {
        line_break: LineBreak::Byte,
        strip_layout: false,
    };
    /// Message text taken from an assembler listing, where raw spaces are
    /// part of the string.
    pub const LISTING: TextCodec = TextCodec {
        line_break: LineBreak::Token,
        strip_layout: false,
    };

    /// Decode a packed string up to its terminator (or the end of `packed`).
    ///
    /// `~N` is always a line break; a raw `0x0A` is one too unless the codec
    /// strips layout bytes. Tabs are dropped, except the one closing a `~J`
    /// number, which belongs to the token.
    pub fn decode(&self, packed: &[u8]) -> Result<String> {
        let mut out = String::with_capacity(packed.len());
        let mut i = 0usize;

        while i < packed.len() {
            let b = packed[i];
            match b {
                0 => break,
                b'\t' => {}
                b'\n' | b' ' if self.strip_layout => {}
                b'\n' => out.push('\n'),
                b'~' if packed.get(i + 1) == Some(&b'N') => {
                    out.push('\n');
                    i += 1;
                }
                b'~' if packed.get(i + 1) == Some(&b'J') => {
                    if let Some(len) = zero_width_token_len(packed, i) {
                        out.extend(packed[i..i + len].iter().map(|&b| char::from(b)));
                        i += len;
                        continue;
                    }
                    out.push('~');
                }
                SPACE_CODE => out.push(' '),
                _ if !b.is_ascii() => {
                    return Err(LocaliserError::Encoding {
                        ch: char::from(b),
                        column: i,
                    });
                }
                _ => out.push(unsubstitute(b).unwrap_or(char::from(b))),
            }
            i += 1;
        }

        Ok(out)
    }

    /// Encode editable text into a packed, null-terminated byte string.
    pub fn encode(&self, text: &str) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(text.len() + 1);

        for (column, ch) in text.chars().enumerate() {
            match ch {
                ' ' => out.push(SPACE_CODE),
                '\n' => match self.line_break {
                    LineBreak::Token => out.extend_from_slice(LINE_BREAK_TOKEN),
                    LineBreak::Byte => out.push(b'\n'),
                },
                '\t' => out.push(b'\t'),
                _ => {
                    if let Some(code) = substitute(ch) {
                        out.push(code);
                        continue;
                    }
                    // `_` and the substitution codes would decode to something else.
                    if !ch.is_ascii_graphic() || ch == '_' || unsubstitute(ch as u8).is_some() {
                        return Err(LocaliserError::Encoding { ch, column });
                    }
                    out.push(ch as u8);
                }
            }
        }

        out.push(0);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_handles_tokens_and_spaces() {
        let packed = b"\tThere_is~Nnothing_here.~E\0garbage";
        let text = TextCodec::MESSAGE.decode(packed).unwrap();
        assert_eq!(text, "There is\nnothing here.~E");
    }

    #[test]
    fn decode_substitutes_letters() {
        let text = TextCodec::MESSAGE.decode(b"Z*;w_g^sk*\0").unwrap();
        assert_eq!(text, "Zółw gąskó");
    }

    #[test]
    fn encode_message_uses_token_break() {
        let packed = TextCodec::MESSAGE.encode("Gęś\nidzie").unwrap();
        assert_eq!(packed, b"G>/~Nidzie\0");
    }

    #[test]
    fn encode_inventory_uses_raw_break() {
        let packed = TextCodec::INVENTORY.encode("Health drink\nRestores").unwrap();
        assert_eq!(packed, b"Health_drink\nRestores\0");
    }

    #[test]
    fn encode_rejects_unmapped_letters() {
        let err = TextCodec::MESSAGE.encode("Straße").unwrap_err();
        assert!(matches!(err, LocaliserError::Encoding { ch: 'ß', column: 4 }));
    }

    #[test]
    fn encode_rejects_reserved_codes() {
        for text in ["a_b", "Quit", "left;right", "a/b"] {
            assert!(TextCodec::MESSAGE.encode(text).is_err(), "{text}");
        }
    }

    #[test]
    fn round_trip_representable_text() {
        let samples = [
            "",
            "Harry",
            "Cheryl?\nWhere are you!",
            "Zażółć gęślą jaźń",
            "~C5Handgun~C7 ~J1.5 bullets.~E",
        ];
        for s in samples {
            let packed = TextCodec::MESSAGE.encode(s).unwrap();
            assert_eq!(TextCodec::MESSAGE.decode(&packed).unwrap(), s);
        }
    }

    #[test]
    fn message_decode_drops_layout_bytes() {
        let text = TextCodec::MESSAGE.decode(b"Door_is\nlocked. ~E\0").unwrap();
        assert_eq!(text, "Door islocked.~E");
        let text = TextCodec::LISTING.decode(b"Door is\0").unwrap();
        assert_eq!(text, "Door is");
    }

    #[test]
    fn j_token_keeps_its_tab() {
        let packed = b"\t~J1.5\tHello\0";
        let text = TextCodec::MESSAGE.decode(packed).unwrap();
        assert_eq!(text, "~J1.5\tHello");
        assert_eq!(TextCodec::MESSAGE.encode(&text).unwrap(), b"~J1.5\tHello\0");
        // Without a number the tab is padding.
        assert_eq!(TextCodec::MESSAGE.decode(b"~J\tx\0").unwrap(), "~Jx");
    }

    #[test]
    fn inventory_keeps_raw_breaks() {
        let text = TextCodec::INVENTORY.decode(b"9mm\nAmmo\0").unwrap();
        assert_eq!(text, "9mm\nAmmo");
    }

    #[test]
    fn inventory_round_trip() {
        let s = "Kanister\nz benzyną";
        let packed = TextCodec::INVENTORY.encode(s).unwrap();
        assert_eq!(TextCodec::INVENTORY.decode(&packed).unwrap(), s);
    }
}
