//! Word-wise XOR keystream used to obfuscate the bodyprog overlay on disc.
//!
//! The keystream depends only on the word index, so running [`apply`] twice
//! over the same buffer restores it.

const SEED_STEP: u32 = 0x0130_9125;
const SEED_MUL: u32 = 0x03A4_52F7;

/// Toggle `window` between its on-disc and working representation.
///
/// Words are little-endian and processed strictly in order. Trailing bytes
/// that do not form a whole word are left alone.
pub fn apply(window: &mut [u8]) {
    let mut seed: u32 = 0;
    for word in window.chunks_exact_mut(4) {
        seed = seed.wrapping_add(SEED_STEP);
        seed = seed.wrapping_mul(SEED_MUL);
        let value = u32::from_le_bytes([word[0], word[1], word[2], word[3]]) ^ seed;
        word.copy_from_slice(&value.to_le_bytes());
    }
}
