//! Fixed-width base-62 rendering of scrambled ids.
//!
//! The alphabet is a shuffled permutation of `[0-9A-Za-z]`, so even the
//! digit positions do not look sequential. Output is always [`CODE_WIDTH`]
//! characters, left-padded with the alphabet's zero symbol.

use super::id_shuffler::SPACE;

pub const ALPHABET: &[u8; 62] = b"w7NF2zP9xLC5uqA1k8mRho4SvY3bJ6cE0dUQfaHIjKMnBODrstTVGeWiXyplgZ";

/// Width of every generated short code.
pub const CODE_WIDTH: usize = 7;

const BASE: u64 = ALPHABET.len() as u64;

const _: () = assert!(BASE.pow(CODE_WIDTH as u32) > SPACE);

/// Encodes `n` as a fixed-width code.
///
/// Values at or above `62^7` would need an eighth digit; callers keep inputs
/// inside [`SPACE`], which the assertion above guarantees fits.
pub fn encode(mut n: u64) -> String {
    let mut digits = [ALPHABET[0]; CODE_WIDTH];

    for slot in digits.iter_mut().rev() {
        if n == 0 {
            break;
        }
        *slot = ALPHABET[(n % BASE) as usize];
        n /= BASE;
    }

    digits.iter().map(|&b| b as char).collect()
}
