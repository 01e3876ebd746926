//! Fixed-width hash values
//!
//! Hashes are plain byte arrays. Word views are always little-endian, so the
//! same bytes produce the same words on every host; on little-endian targets
//! the conversions compile down to plain loads.

use core::fmt;
use core::str::FromStr;

macro_rules! fixed_hash {
    ($(#[$meta:meta])* $name:ident, $size:expr) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub [u8; $size]);

        impl $name {
            /// Size in bytes
            pub const SIZE: usize = $size;

            /// Number of 32-bit words
            pub const NUM_WORD32S: usize = $size / 4;

            /// Number of 64-bit words
            pub const NUM_WORD64S: usize = $size / 8;

            /// All-zero value
            pub const fn zero() -> Self {
                Self([0u8; $size])
            }

            /// Raw bytes
            #[inline(always)]
            pub fn as_bytes(&self) -> &[u8; $size] {
                &self.0
            }

            /// Little-endian 32-bit word `i`
            #[inline(always)]
            pub fn word32(&self, i: usize) -> u32 {
                let b = &self.0[i * 4..i * 4 + 4];
                u32::from_le_bytes([b[0], b[1], b[2], b[3]])
            }

            /// Little-endian 64-bit word `i`
            #[inline(always)]
            pub fn word64(&self, i: usize) -> u64 {
                let mut w = [0u8; 8];
                w.copy_from_slice(&self.0[i * 8..i * 8 + 8]);
                u64::from_le_bytes(w)
            }

            /// All words as little-endian 32-bit integers
            #[inline(always)]
            pub fn to_word32s(&self) -> [u32; $size / 4] {
                let mut words = [0u32; $size / 4];
                for (word, chunk) in words.iter_mut().zip(self.0.chunks_exact(4)) {
                    *word = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
                }
                words
            }

            /// Build from little-endian 32-bit words
            #[inline(always)]
            pub fn from_word32s(words: &[u32; $size / 4]) -> Self {
                let mut bytes = [0u8; $size];
                for (chunk, word) in bytes.chunks_exact_mut(4).zip(words.iter()) {
                    chunk.copy_from_slice(&word.to_le_bytes());
                }
                Self(bytes)
            }

            /// All words as little-endian 64-bit integers
            #[inline(always)]
            pub fn to_word64s(&self) -> [u64; $size / 8] {
                let mut words = [0u64; $size / 8];
                for (i, word) in words.iter_mut().enumerate() {
                    *word = self.word64(i);
                }
                words
            }

            /// Build from little-endian 64-bit words
            #[inline(always)]
            pub fn from_word64s(words: &[u64; $size / 8]) -> Self {
                let mut bytes = [0u8; $size];
                for (chunk, word) in bytes.chunks_exact_mut(8).zip(words.iter()) {
                    chunk.copy_from_slice(&word.to_le_bytes());
                }
                Self(bytes)
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::zero()
            }
        }

        impl From<[u8; $size]> for $name {
            fn from(bytes: [u8; $size]) -> Self {
                Self(bytes)
            }
        }

        impl AsRef<[u8]> for $name {
            fn as_ref(&self) -> &[u8] {
                &self.0
            }
        }

        impl fmt::LowerHex for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&hex::encode(self.0))
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::LowerHex::fmt(self, f)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), hex::encode(self.0))
            }
        }

        impl FromStr for $name {
            type Err = hex::FromHexError;

            /// Parse a hex string, with or without a `0x` prefix
            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let s = s.strip_prefix("0x").unwrap_or(s);
                let mut bytes = [0u8; $size];
                hex::decode_to_slice(s, &mut bytes)?;
                Ok(Self(bytes))
            }
        }
    };
}

fixed_hash!(
    /// 256-bit hash: header hashes, mix hashes, final hashes, boundaries, difficulties
    Hash256,
    32
);

fixed_hash!(
    /// 512-bit hash: light cache items and half dataset items
    Hash512,
    64
);

fixed_hash!(
    /// 1024-bit hash: Ethash full dataset items
    Hash1024,
    128
);

fixed_hash!(
    /// 2048-bit hash: ProgPoW dataset items
    Hash2048,
    256
);

impl Hash256 {
    /// Largest value (every bit set)
    pub const MAX: Self = Self([0xff; 32]);
}

impl Hash512 {
    /// Byte-wise XOR
    #[inline(always)]
    pub fn xor(&self, other: &Self) -> Self {
        let mut out = [0u8; 64];
        for ((o, a), b) in out.iter_mut().zip(self.0.iter()).zip(other.0.iter()) {
            *o = a ^ b;
        }
        Self(out)
    }
}

impl Hash1024 {
    /// Concatenate two 512-bit halves
    pub fn from_halves(lo: &Hash512, hi: &Hash512) -> Self {
        let mut bytes = [0u8; 128];
        bytes[..64].copy_from_slice(&lo.0);
        bytes[64..].copy_from_slice(&hi.0);
        Self(bytes)
    }

    /// Split into the two 512-bit halves
    pub fn halves(&self) -> (Hash512, Hash512) {
        let mut lo = [0u8; 64];
        let mut hi = [0u8; 64];
        lo.copy_from_slice(&self.0[..64]);
        hi.copy_from_slice(&self.0[64..]);
        (Hash512(lo), Hash512(hi))
    }
}

impl Hash2048 {
    /// Concatenate two 1024-bit halves
    pub fn from_halves(lo: &Hash1024, hi: &Hash1024) -> Self {
        let mut bytes = [0u8; 256];
        bytes[..128].copy_from_slice(&lo.0);
        bytes[128..].copy_from_slice(&hi.0);
        Self(bytes)
    }
}

/// Compare two 256-bit values as big-endian integers: `a <= b`
///
/// Used to check a final hash against a boundary.
#[inline]
pub fn is_less_or_equal(a: &Hash256, b: &Hash256) -> bool {
    for i in 0..Hash256::NUM_WORD64S {
        let mut aw = [0u8; 8];
        let mut bw = [0u8; 8];
        aw.copy_from_slice(&a.0[i * 8..i * 8 + 8]);
        bw.copy_from_slice(&b.0[i * 8..i * 8 + 8]);
        let (aw, bw) = (u64::from_be_bytes(aw), u64::from_be_bytes(bw));
        if aw != bw {
            return aw < bw;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn h(s: &str) -> Hash256 {
        s.parse().unwrap()
    }

    #[test]
    fn test_is_less_or_equal() {
        let a = h("0000000000000000000000000000000000000000000000000000000000000001");
        let b = h("0000000000000000000000000000000000000000000000000000000000000002");
        assert!(is_less_or_equal(&a, &b));
        assert!(!is_less_or_equal(&b, &a));
        assert!(is_less_or_equal(&a, &a));

        let c = h("ff00000000000000000000000000000000000000000000000000000000000000");
        let d = h("00ffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffff");
        assert!(is_less_or_equal(&d, &c));
        assert!(!is_less_or_equal(&c, &d));
        assert!(is_less_or_equal(&c, &Hash256::MAX));
        assert!(is_less_or_equal(&Hash256::zero(), &Hash256::zero()));
    }

    #[test]
    fn test_is_less_or_equal_matches_ord() {
        let values = [
            h("0000000000000000000000000000000000000000000000000000000000000000"),
            h("00000000000000000000000000000000000000000000000000000000000000ff"),
            h("0000000000000000000000000000000000000000000000000000000000000100"),
            h("8000000000000000000000000000000000000000000000000000000000000000"),
            h("7fffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffff"),
        ];
        for a in &values {
            for b in &values {
                assert_eq!(is_less_or_equal(a, b), a <= b, "{a} <= {b}");
            }
        }
    }

    #[test]
    fn test_word_views_are_little_endian() {
        let mut bytes = [0u8; 32];
        bytes[0] = 0x01;
        bytes[1] = 0x02;
        bytes[8] = 0xff;
        let v = Hash256(bytes);
        assert_eq!(v.word32(0), 0x0201);
        assert_eq!(v.word64(1), 0xff);
        assert_eq!(Hash256::from_word32s(&v.to_word32s()), v);
        assert_eq!(Hash256::from_word64s(&v.to_word64s()), v);
    }

    #[test]
    fn test_hex_roundtrip_and_prefix() {
        let s = "a9b0e0c9aca72c07ba06b5bbdae8b8f69e61878301508473379bb4f71807d707";
        let v: Hash256 = s.parse().unwrap();
        assert_eq!(v.to_string(), s);
        assert_eq!(format!("0x{s}").parse::<Hash256>().unwrap(), v);
        assert!("abcd".parse::<Hash256>().is_err());
        assert!("zz".repeat(32).parse::<Hash256>().is_err());
    }

    #[test]
    fn test_halves() {
        let lo = Hash512([1u8; 64]);
        let hi = Hash512([2u8; 64]);
        let item = Hash1024::from_halves(&lo, &hi);
        assert_eq!(item.halves(), (lo, hi));
        let wide = Hash2048::from_halves(&item, &Hash1024::zero());
        assert_eq!(&wide.0[..128], &item.0[..]);
        assert!(wide.0[128..].iter().all(|&b| b == 0));
    }
}
