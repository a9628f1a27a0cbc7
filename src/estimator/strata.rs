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

use crate::count::CountKind;
use crate::error::Error;
use crate::hash::id_hash;
use crate::ibf::DiffSets;
use crate::ibf::Ibf;
use crate::ibf::IbfConfig;
use crate::ibf::Record;

/// Number of stratum slots. Identifier hashes are 32 bits, so trailing-zero
/// counts range over 0..=31 (a zero hash never occurs).
pub(crate) const STRATA_SLOTS: usize = 32;

/// Cells per stratum filter. Each stratum holds a geometrically shrinking
/// share of the set, so a few dozen cells decode the per-stratum difference.
const STRATUM_CELLS: usize = 40;

/// Difference estimator built from a bank of mini-filters partitioned by the
/// trailing-zero count of the identifier hash.
///
/// Stratum `s` receives roughly a `2^-(s+1)` share of the records. Decoding
/// two estimators subtracts matching strata from the deepest down and counts
/// the recovered differences; the depth at which peeling first fails sets the
/// extrapolation factor.
#[derive(Debug, Clone)]
pub struct StrataEstimator {
    config: IbfConfig,
    strata: Vec<Option<Ibf>>,
    strata_count: u8,
    capacity: u64,
    item_count: i64,
    decode_factor: u64,
}

impl StrataEstimator {
    /// Creates an estimator with `strata_count` active strata.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` when `strata_count` is 0 or exceeds 32.
    pub fn new(config: IbfConfig, capacity: u64, strata_count: u8) -> Result<Self, Error> {
        if strata_count < 1 {
            return Err(Error::invalid_argument("strata_count must be at least 1"));
        }
        if strata_count as usize > STRATA_SLOTS {
            return Err(Error::invalid_argument(format!(
                "strata_count must not exceed {STRATA_SLOTS}"
            )));
        }
        let config = config.with_count_kind(CountKind::I16);
        Ok(StrataEstimator {
            config,
            strata: vec![None; STRATA_SLOTS],
            strata_count,
            capacity,
            item_count: 0,
            decode_factor: 1,
        })
    }

    /// Scales failure-path estimates; the factory doubles this per failed
    /// reconciliation attempt.
    pub fn with_decode_factor(mut self, decode_factor: u64) -> Self {
        self.decode_factor = decode_factor.max(1);
        self
    }

    /// Number of active strata.
    pub fn strata_count(&self) -> u8 {
        self.strata_count
    }

    /// Records accepted so far.
    pub fn item_count(&self) -> i64 {
        self.item_count
    }

    /// The failure-path scale factor.
    pub fn decode_factor(&self) -> u64 {
        self.decode_factor
    }

    /// The stratum index `record` belongs to.
    fn stratum_of(&self, record: &Record) -> usize {
        let hash = id_hash(record.id(), self.config.seed());
        (hash.trailing_zeros() as usize).min(STRATA_SLOTS - 1)
    }

    /// Routes the record into its stratum. Returns `false` when the stratum
    /// lies beyond the active range; the hybrid estimator sends such records
    /// to its minwise half instead.
    pub fn add(&mut self, record: &Record) -> bool {
        let stratum = self.stratum_of(record);
        if stratum >= self.strata_count as usize {
            return false;
        }
        self.stratum_mut(stratum).add(record);
        self.item_count += 1;
        true
    }

    /// Removes a previously added record. Returns `false` when the record
    /// never belonged to an active stratum.
    pub fn remove(&mut self, record: &Record) -> bool {
        let stratum = self.stratum_of(record);
        if stratum >= self.strata_count as usize {
            return false;
        }
        self.stratum_mut(stratum).remove(record);
        self.item_count -= 1;
        true
    }

    fn stratum_mut(&mut self, stratum: usize) -> &mut Ibf {
        let config = self.config;
        self.strata[stratum].get_or_insert_with(|| {
            Ibf::new(config, STRATUM_CELLS).expect("stratum dimensions are valid")
        })
    }

    /// Merges another estimator into this one stratum-wise.
    ///
    /// # Panics
    ///
    /// Panics if the estimators have incompatible configurations.
    pub fn add_sketch(&mut self, other: &StrataEstimator) {
        assert!(
            self.is_compatible(other),
            "Incompatible estimator configuration."
        );
        for (slot, other_slot) in self.strata.iter_mut().zip(other.strata.iter()) {
            match (slot.as_mut(), other_slot) {
                (Some(ibf), Some(other_ibf)) => {
                    ibf.add_sketch(other_ibf).expect("strata share one shape")
                }
                (None, Some(other_ibf)) => *slot = Some(other_ibf.clone()),
                _ => {}
            }
        }
        self.item_count += other.item_count;
    }

    /// Estimates `|A △ B|` against another estimator.
    ///
    /// Strata are subtracted and peeled from the deepest down. Differences
    /// decoded above the first stall extrapolate by `2^(s+1)`; when every
    /// stratum decodes the accumulated count is returned as-is; when even the
    /// deepest stratum stalls there is nothing to extrapolate from and the
    /// estimate is `None`.
    ///
    /// # Panics
    ///
    /// Panics if the estimators have incompatible configurations.
    pub fn decode(&self, other: &StrataEstimator) -> Option<u64> {
        assert!(
            self.is_compatible(other),
            "Incompatible estimator configuration."
        );

        let mut total: u64 = 0;
        let mut decoded_any = false;

        for stratum in (0..self.strata_count as usize).rev() {
            match (&self.strata[stratum], &other.strata[stratum]) {
                (None, None) => {
                    decoded_any = true;
                    continue;
                }
                (a, b) => {
                    let empty;
                    let left = match a {
                        Some(ibf) => ibf,
                        None => {
                            empty = Ibf::new(self.config, STRATUM_CELLS)
                                .expect("stratum dimensions are valid");
                            &empty
                        }
                    };
                    let empty_right;
                    let right = match b {
                        Some(ibf) => ibf,
                        None => {
                            empty_right = Ibf::new(self.config, STRATUM_CELLS)
                                .expect("stratum dimensions are valid");
                            &empty_right
                        }
                    };

                    let mut sets = DiffSets::new();
                    let mut diff = left.subtract(right).expect("strata share one shape");
                    if diff.decode(&mut sets).is_success() {
                        total += sets.len() as u64;
                        decoded_any = true;
                    } else if !decoded_any {
                        return None;
                    } else {
                        let scale = 1u64 << ((stratum as u32 + 1).min(63));
                        return Some(total * scale * self.decode_factor);
                    }
                }
            }
        }

        Some(total)
    }

    fn is_compatible(&self, other: &StrataEstimator) -> bool {
        self.config.hash_count() == other.config.hash_count()
            && self.config.seed() == other.config.seed()
            && self.strata_count == other.strata_count
    }

    pub(crate) fn strata(&self) -> &[Option<Ibf>] {
        &self.strata
    }

    pub(crate) fn from_parts(
        config: IbfConfig,
        strata: Vec<Option<Ibf>>,
        strata_count: u8,
        capacity: u64,
        item_count: i64,
    ) -> Self {
        StrataEstimator {
            config,
            strata,
            strata_count,
            capacity,
            item_count,
            decode_factor: 1,
        }
    }
}

/// Equality covers the exchanged payload; the decode factor is local retry
/// state and is deliberately excluded.
impl PartialEq for StrataEstimator {
    fn eq(&self, other: &Self) -> bool {
        self.config == other.config
            && self.strata == other.strata
            && self.strata_count == other.strata_count
            && self.capacity == other.capacity
            && self.item_count == other.item_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: u64) -> Record {
        Record::from_value(id, &id, IbfConfig::new().seed())
    }

    fn estimator_with(ids: impl Iterator<Item = u64>) -> StrataEstimator {
        let mut estimator = StrataEstimator::new(IbfConfig::new(), 10_000, 32).unwrap();
        for id in ids {
            estimator.add(&record(id));
        }
        estimator
    }

    #[test]
    fn test_decode_self_is_zero() {
        let estimator = estimator_with(0..500);
        assert_eq!(estimator.decode(&estimator), Some(0));
    }

    #[test]
    fn test_small_difference_decodes_exactly() {
        let left = estimator_with(0..500);
        let right = estimator_with(10..500);

        let estimate = left.decode(&right).expect("small diff decodes");
        assert_eq!(estimate, 10);
    }

    #[test]
    fn test_large_difference_within_bounds() {
        let left = estimator_with(0..4000);
        let right = estimator_with(2000..6000);

        let estimate = left.decode(&right).expect("strata should not stall") as f64;
        let true_diff = 4000.0;
        assert!(
            estimate >= true_diff * 0.5 && estimate <= true_diff * 2.0,
            "estimate {estimate} outside [0.5, 2.0] x {true_diff}"
        );
    }

    #[test]
    fn test_add_then_remove_restores_zero() {
        let mut left = estimator_with(0..100);
        let right = estimator_with(0..100);
        left.add(&record(555));
        left.remove(&record(555));

        assert_eq!(left.decode(&right), Some(0));
    }

    #[test]
    fn test_add_sketch_merges() {
        let mut left = estimator_with(0..50);
        let right = estimator_with(50..100);
        left.add_sketch(&right);

        let merged = estimator_with(0..100);
        assert_eq!(left.decode(&merged), Some(0));
        assert_eq!(left.item_count(), 100);
    }

    #[test]
    fn test_inactive_strata_reject() {
        let mut shallow = StrataEstimator::new(IbfConfig::new(), 100, 1).unwrap();
        let mut routed = 0;
        for id in 0..100u64 {
            if shallow.add(&record(id)) {
                routed += 1;
            }
        }
        // stratum 0 holds about half of the records
        assert!(routed > 20 && routed < 80, "routed {routed}");
    }

    #[test]
    fn test_new_rejects_bad_strata_count() {
        use crate::error::ErrorKind;

        assert_eq!(
            StrataEstimator::new(IbfConfig::new(), 100, 0).unwrap_err().kind(),
            ErrorKind::InvalidArgument
        );
        assert_eq!(
            StrataEstimator::new(IbfConfig::new(), 100, 33).unwrap_err().kind(),
            ErrorKind::InvalidArgument
        );
    }

    #[test]
    #[should_panic(expected = "Incompatible estimator configuration.")]
    fn test_decode_incompatible_panics() {
        let left = StrataEstimator::new(IbfConfig::new(), 100, 7).unwrap();
        let right = StrataEstimator::new(IbfConfig::new(), 100, 9).unwrap();
        left.decode(&right);
    }
}
