//! Level State Digests
//!
//! A level attempt is identified by the SHA-256 digest of everything the
//! next tick can read: tick, seed, RNG state, board, pockets, belt and
//! counters. Replays and checkpoints compare these digests. The same
//! domain-tagged hashing also derives level seeds.

use sha2::{Digest, Sha256};

/// 32-byte SHA-256 digest.
pub type StateHash = [u8; 32];

/// Domain tag for level state digests.
const LEVEL_STATE_DOMAIN: &[u8] = b"POCKET_CASCADE_STATE_V1";

/// A simulation component that contributes fields to a state digest.
///
/// Implementations must write fields in a fixed order and include every
/// value that influences later ticks.
pub trait StateDigest {
    /// Append this component's fields.
    fn digest_into(&self, hasher: &mut StateHasher);
}

/// Field-by-field SHA-256 writer. Integers are little-endian, floats by
/// exact bit pattern, lengths widened to u64.
pub struct StateHasher {
    hasher: Sha256,
}

impl StateHasher {
    fn new(domain: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(domain);
        Self { hasher }
    }

    /// Append a component.
    pub fn include<T: StateDigest + ?Sized>(&mut self, part: &T) {
        part.digest_into(self);
    }

    /// Append a u8.
    #[inline]
    pub fn update_u8(&mut self, value: u8) {
        self.hasher.update([value]);
    }

    /// Append a u32.
    #[inline]
    pub fn update_u32(&mut self, value: u32) {
        self.hasher.update(value.to_le_bytes());
    }

    /// Append a u64.
    #[inline]
    pub fn update_u64(&mut self, value: u64) {
        self.hasher.update(value.to_le_bytes());
    }

    /// Append an i32 (item ids, coordinates, seeds).
    #[inline]
    pub fn update_i32(&mut self, value: i32) {
        self.hasher.update(value.to_le_bytes());
    }

    /// Append a length or index.
    #[inline]
    pub fn update_usize(&mut self, value: usize) {
        self.update_u64(value as u64);
    }

    /// Append an f64 by bit pattern, so `0.0` and `-0.0` differ.
    #[inline]
    pub fn update_f64(&mut self, value: f64) {
        self.update_u64(value.to_bits());
    }

    fn finalize(self) -> StateHash {
        self.hasher.finalize().into()
    }
}

/// One-shot digest of `data` under `domain`.
pub fn hash_with_domain(domain: &[u8], data: &[u8]) -> StateHash {
    let mut hasher = Sha256::new();
    hasher.update(domain);
    hasher.update(data);
    hasher.finalize().into()
}

/// Digest of a level state.
///
/// Tick and seed go first, then whatever `add_state` writes.
pub fn compute_state_hash<F>(tick: u32, seed: i32, add_state: F) -> StateHash
where
    F: FnOnce(&mut StateHasher),
{
    let mut hasher = StateHasher::new(LEVEL_STATE_DOMAIN);
    hasher.update_u32(tick);
    hasher.update_i32(seed);
    add_state(&mut hasher);
    hasher.finalize()
}

// ===== TESTS =====
