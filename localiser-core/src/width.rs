use crate::font::FontMetrics;
use crate::Result;

/// Horizontal budget of the message window in the observed configuration.
pub const SCREEN_WIDTH_BUDGET: u32 = 320;
/// Advance for a packed space or tab; these have no font slot.
pub const SPACE_WIDTH: u32 = 6;

/// Length of the zero-width control token starting at `packed[i]` (a `~`),
/// or `None` if the bytes there do not form one.
pub(crate) fn zero_width_token_len(packed: &[u8], i: usize) -> Option<usize> {
    let at = |k: usize| packed.get(i + k).copied().unwrap_or(0);

    match at(1) {
        b'E' | b'H' | b'D' | b'M' | b'T' => Some(2),
        b'S' | b'L' | b'C' if at(2).is_ascii_digit() => Some(3),
        b'J' => {
            let mut len = 2;
            let mut digits = 0;
            let mut dots = 0;
            loop {
                match at(len) {
                    c if c.is_ascii_digit() => digits += 1,
                    b'.' if dots == 0 => dots += 1,
                    _ => break,
                }
                len += 1;
            }
            if digits == 0 {
                return None;
            }
            if at(len) == b'\t' {
                len += 1;
            }
            Some(len)
        }
        _ => None,
    }
}

/// Widest rendered line of a packed string, in pixels.
///
/// Stops at the first null byte. Line breaks are `~N` or a raw `0x0A`.
pub fn measure(packed: &[u8], font: &FontMetrics) -> Result<u32> {
    let mut widest = 0u32;
    let mut running = 0u32;
    let mut i = 0usize;

    while i < packed.len() {
        match packed[i] {
            0 => break,
            b' ' | b'\t' => {
                running += SPACE_WIDTH;
                i += 1;
            }
            b'\n' => {
                widest = widest.max(running);
                running = 0;
                i += 1;
            }
            b'~' if packed.get(i + 1) == Some(&b'N') => {
                widest = widest.max(running);
                running = 0;
                i += 2;
            }
            b'~' => match zero_width_token_len(packed, i) {
                Some(len) => i += len,
                None => {
                    running += font.width_of(b'~')?;
                    i += 1;
                }
            },
            code => {
                running += font.width_of(code)?;
                i += 1;
            }
        }
    }

    Ok(widest.max(running))
}
