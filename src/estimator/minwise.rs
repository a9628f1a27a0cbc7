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

use std::hash::Hasher;

use crate::error::Error;
use crate::hash::MurmurHash3X86_32;
use crate::hash::murmur3_32;
use crate::ibf::Record;

/// b-bit minwise sketch estimating the Jaccard similarity of two record sets.
///
/// Each of `hash_count` lanes applies an independent permutation (a seeded
/// hash) to every record and keeps the minimum value seen. Two sets' lanes
/// agree with probability equal to their Jaccard similarity; retaining only
/// the low `bit_size` bits per lane shrinks the sketch at the cost of a known,
/// correctable rate of accidental agreement.
///
/// Lanes hash the identifier and the value hash together, so a modified
/// record perturbs the sketch the same way an insertion does.
#[derive(Debug, Clone)]
pub struct BitMinwiseEstimator {
    bit_size: u8,
    hash_count: u32,
    capacity: u64,
    item_count: i64,
    seed: u32,
    lane_seeds: Vec<u32>,
    minima: Vec<u32>,
}

impl BitMinwiseEstimator {
    /// Creates an estimator with `hash_count` lanes keeping `bit_size` low
    /// bits each.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` when `bit_size` is 0 or exceeds 16, or when
    /// `hash_count` is 0.
    pub fn new(seed: u32, capacity: u64, bit_size: u8, hash_count: u32) -> Result<Self, Error> {
        if bit_size < 1 {
            return Err(Error::invalid_argument("bit_size must be at least 1"));
        }
        if bit_size > 16 {
            return Err(Error::invalid_argument("bit_size must not exceed 16"));
        }
        if hash_count < 1 {
            return Err(Error::invalid_argument("hash_count must be at least 1"));
        }
        Ok(BitMinwiseEstimator {
            bit_size,
            hash_count,
            capacity,
            item_count: 0,
            seed,
            lane_seeds: make_lane_seeds(seed, hash_count),
            minima: vec![u32::MAX; hash_count as usize],
        })
    }

    /// Retained low bits per lane.
    pub fn bit_size(&self) -> u8 {
        self.bit_size
    }

    /// Number of minhash lanes.
    pub fn hash_count(&self) -> u32 {
        self.hash_count
    }

    /// The record capacity this sketch was sized for.
    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Records observed.
    pub fn item_count(&self) -> i64 {
        self.item_count
    }

    /// Folds the record into every lane minimum.
    pub fn add(&mut self, record: &Record) {
        for (minimum, lane_seed) in self.minima.iter_mut().zip(self.lane_seeds.iter()) {
            let hash = lane_hash(record, *lane_seed);
            if hash < *minimum {
                *minimum = hash;
            }
        }
        self.item_count += 1;
    }

    /// The corrected Jaccard similarity between the two sketches, in [0, 1].
    ///
    /// Lane agreement is observed on the retained low bits only, so the raw
    /// rate is debiased by the `2^-b` accidental-collision floor.
    ///
    /// # Panics
    ///
    /// Panics if the sketches have incompatible configurations.
    pub fn similarity(&self, other: &BitMinwiseEstimator) -> f64 {
        assert!(
            self.is_compatible(other),
            "Incompatible estimator configuration."
        );
        if self.item_count == 0 && other.item_count == 0 {
            return 1.0;
        }

        let mask = self.bit_mask();
        let matching = self
            .minima
            .iter()
            .zip(other.minima.iter())
            .filter(|(a, b)| (**a & mask) == (**b & mask))
            .count();
        let observed = matching as f64 / self.hash_count as f64;

        let floor = (0.5f64).powi(self.bit_size as i32);
        ((observed - floor) / (1.0 - floor)).clamp(0.0, 1.0)
    }

    /// Folds the sketch to `hash_count / factor` lanes by taking stripe-wise
    /// minima. Working on retained bits only, this approximates the fold of
    /// the underlying minhashes.
    ///
    /// # Errors
    ///
    /// `InvalidFoldFactor` when `factor` is 0, does not divide the lane
    /// count, or would consume every lane.
    pub fn fold(&self, factor: u32) -> Result<Self, Error> {
        if factor == 0 || self.hash_count % factor != 0 || factor == self.hash_count {
            return Err(Error::invalid_fold(factor as u64, self.hash_count as u64));
        }
        let new_count = (self.hash_count / factor) as usize;
        let mut minima = vec![u32::MAX; new_count];
        for (i, &minimum) in self.minima.iter().enumerate() {
            let target = i % new_count;
            if minimum < minima[target] {
                minima[target] = minimum;
            }
        }

        Ok(BitMinwiseEstimator {
            bit_size: self.bit_size,
            hash_count: new_count as u32,
            capacity: self.capacity,
            item_count: self.item_count,
            seed: self.seed,
            lane_seeds: make_lane_seeds(self.seed, new_count as u32),
            minima,
        })
    }

    /// Lane-wise minimum with another sketch.
    ///
    /// # Panics
    ///
    /// Panics if the sketches have incompatible configurations.
    pub fn intersect(&mut self, other: &BitMinwiseEstimator) {
        assert!(
            self.is_compatible(other),
            "Incompatible estimator configuration."
        );
        for (minimum, other_minimum) in self.minima.iter_mut().zip(other.minima.iter()) {
            if *other_minimum < *minimum {
                *minimum = *other_minimum;
            }
        }
        self.item_count = self.item_count.min(other.item_count);
    }

    fn is_compatible(&self, other: &BitMinwiseEstimator) -> bool {
        self.bit_size == other.bit_size
            && self.hash_count == other.hash_count
            && self.seed == other.seed
    }

    fn bit_mask(&self) -> u32 {
        (1u32 << self.bit_size) - 1
    }

    /// The serialized lane values: low `bit_size` bits per lane, packed
    /// LSB-first.
    pub(crate) fn packed_values(&self) -> Vec<u8> {
        let bits = self.hash_count as usize * self.bit_size as usize;
        let mut packed = vec![0u8; bits.div_ceil(8)];
        let mask = self.bit_mask();
        for (lane, &minimum) in self.minima.iter().enumerate() {
            let value = minimum & mask;
            let base = lane * self.bit_size as usize;
            for bit in 0..self.bit_size as usize {
                if value & (1 << bit) != 0 {
                    packed[(base + bit) / 8] |= 1 << ((base + bit) % 8);
                }
            }
        }
        packed
    }

    /// Rebuilds lane values from a packed array. The reconstructed minima are
    /// the retained low bits only; similarity queries behave identically, but
    /// the sketch should not receive further records.
    pub(crate) fn from_packed(
        seed: u32,
        capacity: u64,
        bit_size: u8,
        hash_count: u32,
        item_count: i64,
        packed: &[u8],
    ) -> Result<Self, Error> {
        let bits = hash_count as usize * bit_size as usize;
        if packed.len() != bits.div_ceil(8) {
            return Err(Error::deserial(format!(
                "packed minwise length {} does not match {} lanes of {} bits",
                packed.len(),
                hash_count,
                bit_size
            )));
        }

        let mut minima = vec![0u32; hash_count as usize];
        for (lane, minimum) in minima.iter_mut().enumerate() {
            let base = lane * bit_size as usize;
            for bit in 0..bit_size as usize {
                if packed[(base + bit) / 8] & (1 << ((base + bit) % 8)) != 0 {
                    *minimum |= 1 << bit;
                }
            }
        }

        Ok(BitMinwiseEstimator {
            bit_size,
            hash_count,
            capacity,
            item_count,
            seed,
            lane_seeds: make_lane_seeds(seed, hash_count),
            minima,
        })
    }
}

/// Equality covers the exchanged payload: configuration plus the retained
/// low bits per lane.
impl PartialEq for BitMinwiseEstimator {
    fn eq(&self, other: &Self) -> bool {
        self.bit_size == other.bit_size
            && self.hash_count == other.hash_count
            && self.capacity == other.capacity
            && self.item_count == other.item_count
            && self.seed == other.seed
            && self.packed_values() == other.packed_values()
    }
}

fn make_lane_seeds(seed: u32, hash_count: u32) -> Vec<u32> {
    let mut seeds = Vec::with_capacity(hash_count as usize);
    for lane in 0..hash_count {
        // Derive per-lane seeds deterministically from the sketch seed.
        seeds.push(murmur3_32(&lane.to_le_bytes(), seed));
    }
    seeds
}

fn lane_hash(record: &Record, lane_seed: u32) -> u32 {
    let mut hasher = MurmurHash3X86_32::with_seed(lane_seed);
    hasher.write(&record.id().to_le_bytes());
    hasher.write(&record.value_hash().to_le_bytes());
    hasher.finish32()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::hash::DEFAULT_UPDATE_SEED;

    fn record(id: u64) -> Record {
        Record::from_value(id, &id, DEFAULT_UPDATE_SEED)
    }

    fn sketch_with(ids: impl Iterator<Item = u64>) -> BitMinwiseEstimator {
        let mut sketch = BitMinwiseEstimator::new(DEFAULT_UPDATE_SEED, 1000, 2, 32).unwrap();
        for id in ids {
            sketch.add(&record(id));
        }
        sketch
    }

    #[test]
    fn test_identical_sets_fully_similar() {
        let left = sketch_with(0..500);
        let right = sketch_with(0..500);
        assert_eq!(left.similarity(&right), 1.0);
    }

    #[test]
    fn test_empty_sketches_fully_similar() {
        let left = sketch_with(0..0);
        let right = sketch_with(0..0);
        assert_eq!(left.similarity(&right), 1.0);
    }

    #[test]
    fn test_disjoint_sets_dissimilar() {
        let left = sketch_with(0..500);
        let right = sketch_with(10_000..10_500);
        assert!(left.similarity(&right) < 0.5);
    }

    #[test]
    fn test_similarity_tracks_overlap() {
        let left = sketch_with(0..400);
        let mostly_same = sketch_with(40..440);
        let mostly_different = sketch_with(300..700);
        assert!(left.similarity(&mostly_same) >= left.similarity(&mostly_different));
    }

    #[test]
    fn test_modified_value_reduces_similarity() {
        let left = sketch_with(0..64);
        let mut right = BitMinwiseEstimator::new(DEFAULT_UPDATE_SEED, 1000, 2, 32).unwrap();
        for id in 0..64u64 {
            right.add(&Record::from_value(id, &(id + 1_000_000), DEFAULT_UPDATE_SEED));
        }
        assert!(left.similarity(&right) < 1.0);
    }

    #[test]
    fn test_fold() {
        let sketch = sketch_with(0..100);
        let folded = sketch.fold(2).unwrap();
        assert_eq!(folded.hash_count(), 16);
        assert_eq!(folded.item_count(), 100);

        assert_eq!(
            sketch.fold(3).unwrap_err().kind(),
            ErrorKind::InvalidFoldFactor
        );
    }

    #[test]
    fn test_intersect_keeps_lane_minima() {
        let mut left = sketch_with(0..100);
        let right = sketch_with(100..200);
        let union = sketch_with(0..200);

        left.intersect(&right);
        assert_eq!(left.packed_values(), union.packed_values());
    }

    #[test]
    fn test_new_rejects_bad_parameters() {
        for (bit_size, hash_count) in [(0u8, 8u32), (17, 8), (2, 0)] {
            let err = BitMinwiseEstimator::new(DEFAULT_UPDATE_SEED, 100, bit_size, hash_count)
                .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        }
    }

    #[test]
    fn test_packed_round_trip() {
        let sketch = sketch_with(0..250);
        let packed = sketch.packed_values();
        let restored = BitMinwiseEstimator::from_packed(
            DEFAULT_UPDATE_SEED,
            sketch.capacity(),
            sketch.bit_size(),
            sketch.hash_count(),
            sketch.item_count(),
            &packed,
        )
        .unwrap();

        assert_eq!(sketch, restored);
        assert_eq!(sketch.similarity(&restored), 1.0);
    }
}
