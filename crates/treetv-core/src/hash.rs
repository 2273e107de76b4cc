//! MurmurHash3, x64 128-bit variant
//!
//! Used once per session to turn the serialized browser fingerprint into the
//! `mycook` cookie. The output must match the gate's own client bit for bit,
//! so this follows the canonical algorithm exactly.

const C1: u64 = 0x87c3_7b91_1142_53d5;
const C2: u64 = 0x4cf5_ad43_2745_937f;

/// Hashes `input` with `seed` and returns both 64-bit lanes `(h1, h2)`
pub fn hash128_lanes(input: &[u8], seed: u32) -> (u64, u64) {
    let mut h1 = u64::from(seed);
    let mut h2 = u64::from(seed);

    let mut blocks = input.chunks_exact(16);
    for block in &mut blocks {
        let (lo, hi) = block.split_at(8);
        let k1 = u64::from_le_bytes(lo.try_into().unwrap_or_default());
        let k2 = u64::from_le_bytes(hi.try_into().unwrap_or_default());

        h1 ^= mix_k1(k1);
        h1 = h1
            .rotate_left(27)
            .wrapping_add(h2)
            .wrapping_mul(5)
            .wrapping_add(0x52dc_e729);

        h2 ^= mix_k2(k2);
        h2 = h2
            .rotate_left(31)
            .wrapping_add(h1)
            .wrapping_mul(5)
            .wrapping_add(0x3849_5ab5);
    }

    // Tail: bytes 8..15 feed k2, bytes 0..7 feed k1, highest position first.
    let tail = blocks.remainder();
    if tail.len() > 8 {
        let mut k2 = 0u64;
        for i in (8..tail.len()).rev() {
            k2 ^= u64::from(tail[i]) << ((i - 8) * 8);
        }
        h2 ^= mix_k2(k2);
    }
    if !tail.is_empty() {
        let mut k1 = 0u64;
        for i in (0..tail.len().min(8)).rev() {
            k1 ^= u64::from(tail[i]) << (i * 8);
        }
        h1 ^= mix_k1(k1);
    }

    let len = input.len() as u64;
    h1 ^= len;
    h2 ^= len;

    h1 = h1.wrapping_add(h2);
    h2 = h2.wrapping_add(h1);

    h1 = fmix64(h1);
    h2 = fmix64(h2);

    h1 = h1.wrapping_add(h2);
    h2 = h2.wrapping_add(h1);

    (h1, h2)
}

/// Hashes `input` with `seed` into 32 lowercase hex characters
///
/// The string is h1 followed by h2, each as 16 zero-padded hex digits
/// (high 32 bits first).
///
/// # Example
/// ```
/// use treetv_core::hash::hash128;
/// assert_eq!(hash128(b"", 0), "00000000000000000000000000000000");
/// ```
pub fn hash128(input: &[u8], seed: u32) -> String {
    let (h1, h2) = hash128_lanes(input, seed);
    format!("{:016x}{:016x}", h1, h2)
}

fn mix_k1(k1: u64) -> u64 {
    k1.wrapping_mul(C1).rotate_left(31).wrapping_mul(C2)
}

fn mix_k2(k2: u64) -> u64 {
    k2.wrapping_mul(C2).rotate_left(33).wrapping_mul(C1)
}

fn fmix64(mut h: u64) -> u64 {
    h ^= h >> 33;
    h = h.wrapping_mul(0xff51_afd7_ed55_8ccd);
    h ^= h >> 33;
    h = h.wrapping_mul(0xc4ce_b9fe_1a85_ec53);
    h ^= h >> 33;
    h
}
