// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

mod murmurhash;

pub(crate) use self::murmurhash::MurmurHash3X86_32;
pub(crate) use self::murmurhash::murmur3_32;

use std::hash::Hash;
use std::hash::Hasher;

/// The seed 9001 used in the sketch update methods is a prime number that was chosen very early
/// on in experimental testing.
///
/// In order to perform set operations on two sketches it is critical that the same hash function
/// and seed are identical for both sketches, otherwise the assumed 1:1 relationship between the
/// original source key value and the hashed bit string would be violated. Once you have developed
/// a history of stored sketches you are stuck with it.
pub(crate) const DEFAULT_UPDATE_SEED: u32 = 9001;

/// Seed of the secondary hash in the double-hashing probe scheme.
pub(crate) const DOUBLE_HASH_SEED: u32 = 0x365c_ab4e;

/// Upper bound on the hash-function count of any filter.
pub(crate) const MAX_HASH_COUNT: usize = 8;

/// Hashes an identifier to a 32-bit word that is never zero.
///
/// Zero is reserved as the XOR identity of cell hash sums, so a cell holding a
/// single record always has a nonzero hash sum and `hash_sum == id_hash(id_sum)`
/// is a usable purity check.
pub(crate) fn id_hash(id: u64, seed: u32) -> u32 {
    let hash = murmur3_32(&id.to_le_bytes(), seed);
    if hash == 0 { 1 } else { hash }
}

/// Hashes an opaque record value to a nonzero 32-bit word.
pub(crate) fn value_hash_of<T: Hash>(value: &T, seed: u32) -> u32 {
    let mut hasher = MurmurHash3X86_32::with_seed(seed);
    value.hash(&mut hasher);
    let hash = hasher.finish32();
    if hash == 0 { 1 } else { hash }
}

/// The `k` distinct cell positions a 32-bit entity hash probes in a filter of
/// `m` cells, generated by double hashing (Kirsch-Mitzenmacher).
///
/// Positions are `(h + j * h') mod m` with `h' = murmur3_32(h, DOUBLE_HASH_SEED)`,
/// skipping duplicates. A degenerate stride can revisit the same residues, so
/// after a bounded number of probes the remaining positions are taken by linear
/// scan; `m >= k` guarantees termination.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ProbePositions {
    positions: [usize; MAX_HASH_COUNT],
    len: usize,
}

impl ProbePositions {
    pub(crate) fn new(entity_hash: u32, k: usize, m: usize) -> Self {
        debug_assert!(k <= MAX_HASH_COUNT);
        debug_assert!(m >= k);

        let h = entity_hash as u64;
        let h2 = murmur3_32(&entity_hash.to_le_bytes(), DOUBLE_HASH_SEED) as u64;
        let m = m as u64;

        let mut probes = ProbePositions {
            positions: [0; MAX_HASH_COUNT],
            len: 0,
        };

        let mut j = 0u64;
        while probes.len < k && j < (4 * MAX_HASH_COUNT) as u64 {
            let pos = (h.wrapping_add(j.wrapping_mul(h2)) % m) as usize;
            probes.push_distinct(pos);
            j += 1;
        }

        // degenerate stride: fill the remainder sequentially
        let mut pos = (h % m) as usize;
        while probes.len < k {
            pos = (pos + 1) % m as usize;
            probes.push_distinct(pos);
        }

        probes
    }

    fn push_distinct(&mut self, pos: usize) {
        if !self.positions[..self.len].contains(&pos) {
            self.positions[self.len] = pos;
            self.len += 1;
        }
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.positions[..self.len].iter().copied()
    }
}
