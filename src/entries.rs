//! Synthetic entry generation and the per-call entry selection policy.
//!
//! All randomness flows through an explicitly passed [`StdRng`] so a fixed
//! seed reproduces the same fill and the same measured sequence.

use std::borrow::Cow;

use ahash::AHashMap;
use rand::{Rng, RngCore, SeedableRng, rngs::StdRng};

use crate::runner::Phase;

/// Seed for fill and measurement in the single-connection programs.
pub const FILL_SEED: u64 = 2025_07_08;
/// Seed for the measurement passes that follow a fill.
pub const MEASURE_SEED: u64 = !FILL_SEED;
/// Seed for the parallel program's fill and shuffle.
pub const PARALLEL_SEED: u64 = 42;
/// Length of the synthetic text hashes.
pub const HASH_LEN: usize = 44;
/// Sizes are drawn from `0..SIZE_RANGE`.
pub const SIZE_RANGE: u64 = 1000;

const HASH_CHARS: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

pub fn seeded_rng(seed: u64) -> StdRng {
    StdRng::seed_from_u64(seed)
}

/// Alphanumeric string of `len` characters.
pub fn random_hash_string(rng: &mut StdRng, len: usize) -> String {
    (0..len)
        .map(|_| HASH_CHARS[rng.gen_range(0..HASH_CHARS.len())] as char)
        .collect()
}

/// A block with a text hash, as stored by the pragma and text-index programs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockEntry {
    pub id: i64,
    pub hash: String,
    pub size: i64,
    pub blockset_id: i64,
}

impl BlockEntry {
    pub fn random(rng: &mut StdRng, id: i64, blockset_id: i64) -> Self {
        let hash = random_hash_string(rng, HASH_LEN);
        let size = rng.gen_range(0..SIZE_RANGE) as i64;
        Self {
            id,
            hash,
            size,
            blockset_id,
        }
    }
}

/// A block whose 256-bit hash is split over four integer columns.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SplitBlockEntry {
    pub id: i64,
    pub hash: [i64; 4],
    pub size: i64,
}

impl SplitBlockEntry {
    pub fn random(rng: &mut StdRng, id: i64) -> Self {
        let hash = [
            rng.next_u64() as i64,
            rng.next_u64() as i64,
            rng.next_u64() as i64,
            rng.next_u64() as i64,
        ];
        let size = rng.gen_range(0..SIZE_RANGE) as i64;
        Self { id, hash, size }
    }
}

/// A block keyed by a 256-bit binary hash plus a length, stored as blobs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlobBlockEntry {
    pub id: i64,
    pub hash: [u8; 32],
    pub length: i64,
}

impl BlobBlockEntry {
    pub fn random(rng: &mut StdRng, id: i64) -> Self {
        let mut hash = [0u8; 32];
        rng.fill_bytes(&mut hash);
        let length = rng.gen_range(0..100);
        Self { id, hash, length }
    }

    /// `hash ++ length.to_le_bytes()`, the single-blob key.
    pub fn packed_key(&self) -> [u8; 40] {
        let mut key = [0u8; 40];
        key[..32].copy_from_slice(&self.hash);
        key[32..].copy_from_slice(&self.length.to_le_bytes());
        key
    }

    /// First eight hash bytes as a little-endian integer.
    pub fn first_hash(&self) -> i64 {
        let mut prefix = [0u8; 8];
        prefix.copy_from_slice(&self.hash[..8]);
        i64::from_le_bytes(prefix)
    }

    /// The rest of the hash followed by the length, stored next to
    /// [`BlobBlockEntry::first_hash`].
    pub fn tail_key(&self) -> [u8; 32] {
        let mut key = [0u8; 32];
        key[..24].copy_from_slice(&self.hash[8..]);
        key[24..].copy_from_slice(&self.length.to_le_bytes());
        key
    }
}

/// A row of the parallel program's `Blockset(ID, Length, FullHash)` table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlocksetRecord {
    pub id: i64,
    pub length: i64,
    pub full_hash: String,
}

impl BlocksetRecord {
    pub fn random(rng: &mut StdRng, id: i64) -> Self {
        let length = rng.gen_range(0..100);
        let full_hash = random_hash_string(rng, HASH_LEN);
        Self {
            id,
            length,
            full_hash,
        }
    }
}

/// Chooses, per call, between a freshly synthesised entry and an existing one.
///
/// With probability `create_percent`% a new entry with the next unused id is
/// produced; otherwise an existing entry is reused, `entries[i % len]` during
/// warmup and a uniformly random one when measuring (or in both phases after
/// [`EntryPicker::random_reuse`]). Ids restart at
/// `first_new_id` whenever the phase changes, since warmup writes are rolled
/// back before the measured phase.
#[derive(Debug)]
pub struct EntryPicker<'a> {
    entries: &'a [BlockEntry],
    create_percent: u32,
    first_new_id: i64,
    next_id: i64,
    phase: Option<Phase>,
    random_warmup: bool,
}

impl<'a> EntryPicker<'a> {
    pub fn new(entries: &'a [BlockEntry], create_percent: u32, first_new_id: i64) -> Self {
        Self {
            entries,
            create_percent: create_percent.min(100),
            first_new_id,
            next_id: first_new_id,
            phase: None,
            random_warmup: false,
        }
    }

    /// Reuse a random entry during warmup too.
    pub fn random_reuse(mut self) -> Self {
        self.random_warmup = true;
        self
    }

    pub fn pick(&mut self, rng: &mut StdRng, phase: Phase, i: u64) -> Cow<'a, BlockEntry> {
        if self.phase != Some(phase) {
            self.phase = Some(phase);
            self.next_id = self.first_new_id;
        }
        let create = rng.gen_range(0..100u32) >= 100 - self.create_percent;
        if create || self.entries.is_empty() {
            let id = self.next_id;
            self.next_id += 1;
            Cow::Owned(BlockEntry::random(rng, id, 0))
        } else {
            let idx = match phase {
                Phase::Warmup if !self.random_warmup => (i % self.entries.len() as u64) as usize,
                _ => rng.gen_range(0..self.entries.len()),
            };
            Cow::Borrowed(&self.entries[idx])
        }
    }
}

/// Entry count per blockset; the oracle for the join benchmark.
#[derive(Clone, Debug, Default)]
pub struct BlocksetIndex {
    counts: AHashMap<i64, u64>,
    max_id: i64,
}

impl BlocksetIndex {
    pub fn build(entries: &[BlockEntry]) -> Self {
        let mut index = Self::default();
        for entry in entries {
            *index.counts.entry(entry.blockset_id).or_default() += 1;
            index.max_id = index.max_id.max(entry.blockset_id);
        }
        index
    }

    pub fn count(&self, blockset_id: i64) -> u64 {
        self.counts.get(&blockset_id).copied().unwrap_or(0)
    }

    pub fn max_id(&self) -> i64 {
        self.max_id
    }

    /// Uniform pick in `1..=max_id`.
    pub fn random_id(&self, rng: &mut StdRng) -> i64 {
        rng.gen_range(1..=self.max_id.max(1))
    }
}
