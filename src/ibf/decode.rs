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

use std::collections::HashSet;

use crate::hash::ProbePositions;
use crate::ibf::Ibf;

/// The decoded symmetric difference of two record sets.
///
/// `only_in_a` holds identifiers unique to the left operand of the subtract,
/// `only_in_b` those unique to the right, and `modified` identifiers present
/// on both sides with differing values.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DiffSets {
    /// Identifiers only the left operand holds.
    pub only_in_a: HashSet<u64>,
    /// Identifiers only the right operand holds.
    pub only_in_b: HashSet<u64>,
    /// Identifiers both operands hold, with differing values.
    pub modified: HashSet<u64>,
}

impl DiffSets {
    /// Creates empty difference sets.
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of decoded differences.
    pub fn len(&self) -> usize {
        self.only_in_a.len() + self.only_in_b.len() + self.modified.len()
    }

    /// Whether no differences were decoded.
    pub fn is_empty(&self) -> bool {
        self.only_in_a.is_empty() && self.only_in_b.is_empty() && self.modified.is_empty()
    }

    /// Drops all decoded differences.
    pub fn clear(&mut self) {
        self.only_in_a.clear();
        self.only_in_b.clear();
        self.modified.clear();
    }

    /// An identifier that peeled out of both sides carries the same id with
    /// two different values, which is a modification, not two one-sided
    /// differences.
    pub(crate) fn resolve_modified(&mut self) {
        let both: Vec<u64> = self
            .only_in_a
            .intersection(&self.only_in_b)
            .copied()
            .collect();
        for id in both {
            self.only_in_a.remove(&id);
            self.only_in_b.remove(&id);
            self.modified.insert(id);
        }
        for id in self.modified.iter() {
            self.only_in_a.remove(id);
            self.only_in_b.remove(id);
        }
    }
}

/// Whether a peel extracted the complete difference.
///
/// Failure is an ordinary outcome of an undersized filter, not an error: the
/// output sets still hold every difference extracted before the stall, and
/// the caller is expected to resize and retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeOutcome {
    /// Every difference was extracted.
    Success,
    /// The peel stalled; results are valid but incomplete.
    Fail,
}

impl DecodeOutcome {
    /// Whether decoding completed.
    pub fn is_success(self) -> bool {
        matches!(self, DecodeOutcome::Success)
    }
}

impl Ibf {
    /// Peels the filter, extracting the symmetric difference into `sets`.
    ///
    /// Normally called on the result of [`subtract`](Self::subtract).
    /// Decoding consumes the cell contents; the filter is not meaningful
    /// afterwards. On a paired filter the key peel runs first, then the
    /// reverse peel, and identifiers that surfaced on both sides migrate into
    /// `modified`.
    pub fn decode(&mut self, sets: &mut DiffSets) -> DecodeOutcome {
        let mut ok = self.decode_single(sets);
        if let Some(sub) = self.sub.as_mut() {
            ok &= sub.decode_single(sets);
        }
        sets.resolve_modified();
        if ok {
            DecodeOutcome::Success
        } else {
            DecodeOutcome::Fail
        }
    }

    fn decode_single(&mut self, sets: &mut DiffSets) -> bool {
        let drained = self.peel_cells(sets);
        self.recover_modifications(sets);
        drained && self.is_fully_decoded()
    }

    fn peel_cells(&mut self, sets: &mut DiffSets) -> bool {
        let k = self.config.hash_count() as usize;
        let mut worklist: Vec<usize> = (0..self.m).filter(|&i| self.is_pure_cell(i)).collect();
        // corrupted sketches can push cells in cycles; bound the walk well
        // above what any honest peel needs
        let mut budget = 8 * self.m + 64;

        while let Some(p) = worklist.pop() {
            if budget == 0 {
                return false;
            }
            budget -= 1;
            if !self.is_pure_cell(p) {
                continue;
            }

            let id = self.id_sums[p];
            let hash = self.hash_sums[p];
            let negative = self.counts.get(p) < 0;
            let probes = ProbePositions::new(hash, k, self.m);
            let mut modified = false;

            for q in probes.iter() {
                if self.is_pure_cell(q) && self.id_sums[q] == id && self.hash_sums[q] != hash {
                    // The same identifier resolves at a second position with a
                    // different value hash: the record was modified on the
                    // other side. Cancel that occurrence with its own hash.
                    modified = true;
                    sets.modified.insert(id);
                    let other_hash = self.hash_sums[q];
                    let sign = if negative { -1 } else { 1 };
                    self.apply_cell(q, id, other_hash, sign);
                } else {
                    let was_identity = self.cell_is_identity(q);
                    let sign = if negative { 1 } else { -1 };
                    self.apply_cell(q, id, hash, sign);
                    if !was_identity && q != p && self.is_pure_cell(q) {
                        worklist.push(q);
                    }
                }
            }

            if !modified {
                if negative {
                    sets.only_in_b.insert(id);
                } else {
                    sets.only_in_a.insert(id);
                }
            }
        }

        true
    }

    /// Post-pass on reverse filters: a stalled cell whose count cancelled but
    /// whose id sum survived holds a modification the peel could not reach.
    /// The id migrates out of the one-sided sets.
    fn recover_modifications(&mut self, sets: &mut DiffSets) {
        if !self.is_reverse {
            return;
        }
        for i in 0..self.m {
            if self.counts.get(i) == 0 && self.id_sums[i] != 0 {
                let id = self.id_sums[i];
                sets.only_in_a.remove(&id);
                sets.only_in_b.remove(&id);
                sets.modified.insert(id);
                self.id_sums[i] = 0;
                self.hash_sums[i] = 0;
            }
        }
    }

    /// Success means every cell the peel left behind is either identity or a
    /// pure cell whose record was already extracted.
    fn is_fully_decoded(&self) -> bool {
        (0..self.m).all(|i| self.cell_is_identity(i) || self.is_pure_cell(i))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ibf::IbfConfig;
    use crate::ibf::Record;

    fn record(id: u64) -> Record {
        Record::from_value(id, &id.wrapping_mul(31), IbfConfig::new().seed())
    }

    fn altered(id: u64) -> Record {
        Record::from_value(id, &(id.wrapping_mul(31) + 1), IbfConfig::new().seed())
    }

    #[test]
    fn test_identical_sets_decode_empty() {
        let config = IbfConfig::new();
        let mut left = Ibf::new(config, 64).unwrap();
        let mut right = Ibf::new(config, 64).unwrap();
        for id in 0..1000u64 {
            left.add(&record(id));
            right.add(&record(id));
        }

        let mut sets = DiffSets::new();
        let outcome = left.subtract(&right).unwrap().decode(&mut sets);
        assert!(outcome.is_success());
        assert!(sets.is_empty());
    }

    #[test]
    fn test_one_sided_difference() {
        let config = IbfConfig::new();
        let mut left = Ibf::new(config, 128).unwrap();
        let mut right = Ibf::new(config, 128).unwrap();
        for id in 0..60u64 {
            left.add(&record(id));
            if id >= 5 {
                right.add(&record(id));
            }
        }
        for id in 100..103u64 {
            right.add(&record(id));
        }

        let mut sets = DiffSets::new();
        let outcome = left.subtract(&right).unwrap().decode(&mut sets);
        assert!(outcome.is_success());

        let mut in_a: Vec<u64> = sets.only_in_a.iter().copied().collect();
        in_a.sort_unstable();
        assert_eq!(in_a, vec![0, 1, 2, 3, 4]);

        let mut in_b: Vec<u64> = sets.only_in_b.iter().copied().collect();
        in_b.sort_unstable();
        assert_eq!(in_b, vec![100, 101, 102]);

        assert!(sets.modified.is_empty());
    }

    #[test]
    fn test_paired_detects_modifications() {
        let config = IbfConfig::new();
        let mut left = Ibf::paired(config, 150).unwrap();
        let mut right = Ibf::paired(config, 150).unwrap();
        for id in 0..200u64 {
            left.add(&record(id));
            if id < 10 {
                right.add(&altered(id));
            } else {
                right.add(&record(id));
            }
        }

        let mut sets = DiffSets::new();
        let ok = left.subtract_and_decode(&right, &mut sets).unwrap();
        assert!(ok);
        assert!(sets.only_in_a.is_empty());
        assert!(sets.only_in_b.is_empty());

        let mut modified: Vec<u64> = sets.modified.iter().copied().collect();
        modified.sort_unstable();
        assert_eq!(modified, (0..10u64).collect::<Vec<_>>());
    }

    #[test]
    fn test_decode_fails_when_undersized() {
        let config = IbfConfig::new();
        let mut left = Ibf::new(config, 6).unwrap();
        let right = Ibf::new(config, 6).unwrap();
        for id in 0..100u64 {
            left.add(&record(id));
        }

        let mut sets = DiffSets::new();
        let outcome = left.subtract(&right).unwrap().decode(&mut sets);
        assert_eq!(outcome, DecodeOutcome::Fail);
        // partial results may exist but never phantom modifications
        assert!(sets.len() < 100);
    }

    #[test]
    fn test_zero_id_decodes() {
        let config = IbfConfig::new();
        let mut left = Ibf::new(config, 64).unwrap();
        let right = Ibf::new(config, 64).unwrap();
        left.add(&record(0));

        let mut sets = DiffSets::new();
        let outcome = left.subtract(&right).unwrap().decode(&mut sets);
        assert!(outcome.is_success());
        assert!(sets.only_in_a.contains(&0));
        assert_eq!(sets.len(), 1);
    }

    #[test]
    fn test_negated_subtract_swaps_sides() {
        let config = IbfConfig::new();
        let mut left = Ibf::new(config, 128).unwrap();
        let mut right = Ibf::new(config, 128).unwrap();
        for id in 0..40u64 {
            left.add(&record(id));
            right.add(&record(id));
        }
        left.add(&record(77));
        right.add(&record(99));

        let mut forward = DiffSets::new();
        assert!(left.subtract(&right).unwrap().decode(&mut forward).is_success());
        let mut backward = DiffSets::new();
        assert!(right.subtract(&left).unwrap().decode(&mut backward).is_success());

        assert_eq!(forward.only_in_a, backward.only_in_b);
        assert_eq!(forward.only_in_b, backward.only_in_a);
    }

    #[test]
    fn test_removal_only_sketch_decodes_as_negative_side() {
        let config = IbfConfig::new();
        let mut left = Ibf::new(config, 256).unwrap();
        let mut right = Ibf::new(config, 256).unwrap();
        // tombstones for records never added locally
        for id in 0..30u64 {
            left.remove(&record(id));
        }
        for id in 100..130u64 {
            right.add(&record(id));
        }

        let mut sets = DiffSets::new();
        let ok = left.subtract_and_decode(&right, &mut sets).unwrap();
        assert!(ok);
        assert!(sets.only_in_a.is_empty());
        assert!(sets.modified.is_empty());

        let mut in_b: Vec<u64> = sets.only_in_b.iter().copied().collect();
        in_b.sort_unstable();
        let expected: Vec<u64> = (0..30u64).chain(100..130).collect();
        assert_eq!(in_b, expected);
    }

    #[test]
    fn test_resolve_modified() {
        let mut sets = DiffSets::new();
        sets.only_in_a.insert(1);
        sets.only_in_a.insert(2);
        sets.only_in_b.insert(2);
        sets.only_in_b.insert(3);
        sets.resolve_modified();

        assert_eq!(sets.only_in_a, HashSet::from([1]));
        assert_eq!(sets.only_in_b, HashSet::from([3]));
        assert_eq!(sets.modified, HashSet::from([2]));
    }
}
