//! 256-bit hash value with hex codec, Hamming distance and bit algebra.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// 16 slots of 16 bits each. The 16x16 shape is what multi-index hashing
/// over 256-bit hashes wants to chunk on, so it is kept here too.
pub const HASH256_NUM_SLOTS: usize = 16;
pub const HASH256_HEX_NUM_NYBBLES: usize = 4 * HASH256_NUM_SLOTS;

/// Errors from parsing a hex-encoded 256-bit hash.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HashParseError {
    #[error("incorrect hash length: {0}")]
    BadLength(String),
    #[error("incorrect format: {0}")]
    BadFormat(String),
}

/// A 256-bit hash held as sixteen 16-bit slots. Slot 0 carries the least
/// significant 16 bits, slot 15 the most significant.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Hash256 {
    w: [u16; HASH256_NUM_SLOTS],
}

impl Hash256 {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_words(w: [u16; HASH256_NUM_SLOTS]) -> Self {
        Self { w }
    }

    pub fn words(&self) -> &[u16; HASH256_NUM_SLOTS] {
        &self.w
    }

    /// Parses 64 hex characters, most significant slot first. Case
    /// insensitive; emission is always lowercase.
    pub fn from_hex(s: &str) -> Result<Self, HashParseError> {
        if s.len() != HASH256_HEX_NUM_NYBBLES {
            return Err(HashParseError::BadLength(s.to_string()));
        }
        let mut rv = Self::default();
        for (i, group) in s.as_bytes().chunks_exact(4).enumerate() {
            let mut val: u16 = 0;
            for &b in group {
                let digit = (b as char)
                    .to_digit(16)
                    .ok_or_else(|| HashParseError::BadFormat(s.to_string()))?;
                val = (val << 4) | digit as u16;
            }
            rv.w[HASH256_NUM_SLOTS - 1 - i] = val;
        }
        Ok(rv)
    }

    pub fn to_hex(&self) -> String {
        self.to_string()
    }

    /// Sets bit `k`, counted from the least significant end.
    pub fn set_bit(&mut self, k: usize) {
        self.w[(k >> 4) & 15] |= 1 << (k & 15);
    }

    pub fn flip_bit(&mut self, k: usize) {
        self.w[(k >> 4) & 15] ^= 1 << (k & 15);
    }

    pub fn clear_all(&mut self) {
        self.w = [0; HASH256_NUM_SLOTS];
    }

    pub fn set_all(&mut self) {
        self.w = [0xFFFF; HASH256_NUM_SLOTS];
    }

    pub fn hamming_norm(&self) -> u32 {
        self.w.iter().map(|w| w.count_ones()).sum()
    }

    #[inline(always)]
    pub fn hamming_distance(&self, other: &Self) -> u32 {
        self.w.iter().zip(other.w.iter()).map(|(a, b)| (a ^ b).count_ones()).sum()
    }

    /// True when the Hamming distance to `other` is at most `d`. Bails out
    /// as soon as the running count exceeds the threshold.
    pub fn hamming_distance_le(&self, other: &Self, d: u32) -> bool {
        let mut e = 0;
        for i in 0..HASH256_NUM_SLOTS {
            e += (self.w[i] ^ other.w[i]).count_ones();
            if e > d {
                return false;
            }
        }
        true
    }

    /// One line per slot, most significant first, bits within a slot from
    /// most to least significant, space separated.
    pub fn dump_bits(&self) -> String {
        let mut lines = Vec::with_capacity(HASH256_NUM_SLOTS);
        for i in (0..HASH256_NUM_SLOTS).rev() {
            let word = self.w[i];
            let bits: Vec<&str> =
                (0..16).rev().map(|j| if word & (1 << j) != 0 { "1" } else { "0" }).collect();
            lines.push(bits.join(" "));
        }
        lines.join("\n")
    }

    /// All 256 bits on one line, same order as `dump_bits`.
    pub fn dump_bits_across(&self) -> String {
        let mut bits = Vec::with_capacity(256);
        for i in (0..HASH256_NUM_SLOTS).rev() {
            let word = self.w[i];
            for j in (0..16).rev() {
                bits.push(if word & (1 << j) != 0 { "1" } else { "0" });
            }
        }
        bits.join(" ")
    }

    /// The 16 slot values in decimal, most significant first, comma
    /// separated.
    pub fn dump_words(&self) -> String {
        let words: Vec<String> =
            (0..HASH256_NUM_SLOTS).rev().map(|i| self.w[i].to_string()).collect();
        words.join(",")
    }
}

impl fmt::Display for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for i in (0..HASH256_NUM_SLOTS).rev() {
            write!(f, "{:04x}", self.w[i])?;
        }
        Ok(())
    }
}

impl FromStr for Hash256 {
    type Err = HashParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl std::ops::BitAnd for Hash256 {
    type Output = Hash256;

    fn bitand(self, rhs: Hash256) -> Hash256 {
        let mut rv = Hash256::new();
        for i in 0..HASH256_NUM_SLOTS {
            rv.w[i] = self.w[i] & rhs.w[i];
        }
        rv
    }
}

impl std::ops::BitOr for Hash256 {
    type Output = Hash256;

    fn bitor(self, rhs: Hash256) -> Hash256 {
        let mut rv = Hash256::new();
        for i in 0..HASH256_NUM_SLOTS {
            rv.w[i] = self.w[i] | rhs.w[i];
        }
        rv
    }
}

impl std::ops::BitXor for Hash256 {
    type Output = Hash256;

    fn bitxor(self, rhs: Hash256) -> Hash256 {
        let mut rv = Hash256::new();
        for i in 0..HASH256_NUM_SLOTS {
            rv.w[i] = self.w[i] ^ rhs.w[i];
        }
        rv
    }
}

impl std::ops::Not for Hash256 {
    type Output = Hash256;

    // u16 slots keep the complement masked to 16 bits.
    fn not(self) -> Hash256 {
        let mut rv = Hash256::new();
        for i in 0..HASH256_NUM_SLOTS {
            rv.w[i] = !self.w[i];
        }
        rv
    }
}

impl Ord for Hash256 {
    /// Lexicographic from the most significant slot downward; the first
    /// differing slot decides.
    fn cmp(&self, other: &Self) -> Ordering {
        for i in (0..HASH256_NUM_SLOTS).rev() {
            match self.w[i].cmp(&other.w[i]) {
                Ordering::Equal => continue,
                ord => return ord,
            }
        }
        Ordering::Equal
    }
}

impl PartialOrd for Hash256 {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::prelude::*;

    const SAMPLE_HASH: &str = "9c151c3af838278e3ef57c180c7d031c07aefd12f2ccc1e18f2a1e1c7d0ff163";

    fn random_hash(rng: &mut impl Rng) -> Hash256 {
        let mut w = [0u16; HASH256_NUM_SLOTS];
        for slot in &mut w {
            *slot = rng.random();
        }
        Hash256::from_words(w)
    }

    #[test]
    fn test_incorrect_hex_length() {
        assert!(matches!(Hash256::from_hex("AAA"), Err(HashParseError::BadLength(_))));
        let too_long = format!("{SAMPLE_HASH}0");
        assert!(matches!(Hash256::from_hex(&too_long), Err(HashParseError::BadLength(_))));
    }

    #[test]
    fn test_incorrect_hex_format() {
        let bad = "9c151c3af838278e3ef57c180c7d031c07aefd12f2ccc1e18f2a1e1c7d0ff16!";
        assert!(matches!(Hash256::from_hex(bad), Err(HashParseError::BadFormat(_))));

        // A sign prefix is not a hex digit.
        let signed = "+c151c3af838278e3ef57c180c7d031c07aefd12f2ccc1e18f2a1e1c7d0ff163";
        assert!(matches!(Hash256::from_hex(signed), Err(HashParseError::BadFormat(_))));
    }

    #[test]
    fn test_hex_round_trip() {
        let hash = Hash256::from_hex(SAMPLE_HASH).unwrap();
        assert_eq!(SAMPLE_HASH, hash.to_hex());

        let upper = SAMPLE_HASH.to_uppercase();
        let hash = Hash256::from_hex(&upper).unwrap();
        assert_eq!(SAMPLE_HASH, hash.to_hex());

        // FromStr is the same parser.
        let hash: Hash256 = SAMPLE_HASH.parse().unwrap();
        assert_eq!(SAMPLE_HASH, hash.to_string());
    }

    #[test]
    fn test_hamming_norm() {
        let mut hash = Hash256::new();
        hash.set_all();
        assert_eq!(256, hash.hamming_norm());

        let hash = Hash256::from_hex(SAMPLE_HASH).unwrap();
        assert_eq!(128, hash.hamming_norm());
    }

    #[test]
    fn test_hamming_distance() {
        let hash1 = Hash256::from_hex(SAMPLE_HASH).unwrap();
        let hash2 = Hash256::new();
        assert_eq!(128, hash1.hamming_distance(&hash2));

        let mut hash1 = Hash256::new();
        hash1.set_all();
        let mut hash2 = Hash256::new();
        hash2.clear_all();
        assert_eq!(256, hash1.hamming_distance(&hash2));
        assert!(!hash1.hamming_distance_le(&hash2, 1));
        assert!(hash1.hamming_distance_le(&hash2, 257));
        assert!(hash1.hamming_distance_le(&hash1.clone(), 0));
    }

    #[test]
    fn test_set_and_flip_bit() {
        // Every bit position lands in its own slot/offset.
        for k in 0..256 {
            let mut hash = Hash256::new();
            hash.set_bit(k);
            assert_eq!(1, hash.hamming_norm(), "bit {k}");
            hash.flip_bit(k);
            assert_eq!(Hash256::new(), hash, "bit {k}");
        }

        let mut hash = Hash256::new();
        hash.set_bit(0);
        assert_eq!("0000000000000000000000000000000000000000000000000000000000000001", hash.to_hex());

        let mut hash = Hash256::new();
        hash.set_bit(255);
        assert_eq!("8000000000000000000000000000000000000000000000000000000000000000", hash.to_hex());
    }

    #[test]
    fn test_bitwise_laws() {
        let mut rng = rand::rng();
        let mut all_ones = Hash256::new();
        all_ones.set_all();

        for _ in 0..64 {
            let a = random_hash(&mut rng);
            assert_eq!(Hash256::new(), a & !a);
            assert_eq!(all_ones, a | !a);
            assert_eq!(all_ones, a ^ !a);
            assert_eq!(a, !!a);
            // Complement norms always cover all 256 bits.
            assert_eq!(256, a.hamming_norm() + (!a).hamming_norm());
        }
    }

    #[test]
    fn test_ordering() {
        let one = Hash256::from_hex(
            "0000000000000000000000000000000000000000000000000000000000000001",
        )
        .unwrap();
        let two = Hash256::from_hex(
            "0000000000000000000000000000000000000000000000000000000000000002",
        )
        .unwrap();
        let high = Hash256::from_hex(
            "8000000000000000000000000000000000000000000000000000000000000000",
        )
        .unwrap();
        let below_high = Hash256::from_hex(
            "7fffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffff",
        )
        .unwrap();

        assert!(one < two);
        assert!(two > one);
        assert!(high > below_high);
        assert!(one < high);
        assert_eq!(one.cmp(&one.clone()), std::cmp::Ordering::Equal);
    }

    #[test]
    fn test_triangle_inequality() {
        let mut rng = rand::rng();
        for _ in 0..100 {
            let a = random_hash(&mut rng);
            let b = random_hash(&mut rng);
            let c = random_hash(&mut rng);
            assert!(a.hamming_distance(&c) <= a.hamming_distance(&b) + b.hamming_distance(&c));
            assert_eq!(0, a.hamming_distance(&a));
        }
    }

    #[test]
    fn test_distance_le_matches_distance() {
        let mut rng = rand::rng();
        for _ in 0..100 {
            let a = random_hash(&mut rng);
            let b = random_hash(&mut rng);
            let d = a.hamming_distance(&b);
            for threshold in [0, 1, d.saturating_sub(1), d, d + 1, 256] {
                assert_eq!(d <= threshold, a.hamming_distance_le(&b, threshold));
            }
        }
    }

    #[test]
    fn test_dump_formats() {
        let mut hash = Hash256::new();
        hash.set_bit(0);

        let words = hash.dump_words();
        assert_eq!("0,0,0,0,0,0,0,0,0,0,0,0,0,0,0,1", words);

        let across = hash.dump_bits_across();
        assert_eq!(256, across.split(' ').count());
        assert!(across.starts_with("0 0"));
        assert!(across.ends_with(" 1"));

        let dump = hash.dump_bits();
        let lines: Vec<&str> = dump.lines().collect();
        assert_eq!(16, lines.len());
        assert_eq!("0 0 0 0 0 0 0 0 0 0 0 0 0 0 0 0", lines[0]);
        assert_eq!("0 0 0 0 0 0 0 0 0 0 0 0 0 0 0 1", lines[15]);

        let mut hash = Hash256::new();
        hash.set_bit(255);
        assert!(hash.dump_words().starts_with("32768,"));
        assert!(hash.dump_bits_across().starts_with("1 0"));
    }
}
