//! A 128-bit content digest, incrementally fed and finalized into four
//! `u32` words.
//!
//! This is the facade the planner core hashes problems through. Internally
//! it is a truncated `blake3` digest: callers feed a canonical byte sequence
//! (precision width, equivalence flag bits, thread count, then the problem's
//! own bytes) and only the first 16 bytes of the 32-byte output are kept.
//! Truncating a cryptographic hash does not weaken the planner's "128 bits is
//! enough to treat as a problem identity" assumption in any way a real
//! adversary could exploit; it is simply sized to match the four-word
//! signature the cache table indexes on.

use std::convert::TryInto;

/// Four 32-bit words identifying a `(problem, flags, thread_count,
/// precision)` tuple. Two signatures are equal iff all four words match.
pub type Signature = [u32; 4];

/// Incremental digest context.
///
/// `Digest` has no public constructor beyond [`Digest::new`]; callers drive
/// it with [`Digest::feed_uint`] / [`Digest::feed_bytes`] and consume it with
/// [`Digest::finish`]. There is no way to inspect partial state: begin, feed,
/// end is the entire contract.
#[derive(Debug, Default)]
pub struct Digest {
    hasher: blake3::Hasher,
}

impl Digest {
    /// Starts a fresh digest.
    pub fn new() -> Self {
        Self {
            hasher: blake3::Hasher::new(),
        }
    }

    /// Feeds a single integer, in native-endian order reinterpreted as
    /// little-endian bytes so the digest is stable across platforms with
    /// the same word size.
    pub fn feed_uint(&mut self, value: u32) -> &mut Self {
        self.hasher.update(&value.to_le_bytes());
        self
    }

    /// Feeds an arbitrary byte sequence, used by problems to hash their own
    /// fields.
    pub fn feed_bytes(&mut self, bytes: &[u8]) -> &mut Self {
        self.hasher.update(bytes);
        self
    }

    /// Finalizes the digest into a four-word signature. Consumes `self`: a
    /// digest is single-use.
    pub fn finish(self) -> Signature {
        let out = self.hasher.finalize();
        let bytes = out.as_bytes();
        let mut sig = [0u32; 4];
        for (i, word) in sig.iter_mut().enumerate() {
            let start = i * 4;
            *word = u32::from_le_bytes(bytes[start..start + 4].try_into().unwrap());
        }
        sig
    }
}
