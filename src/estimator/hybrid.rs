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

use crate::error::Error;
use crate::estimator::BitMinwiseEstimator;
use crate::estimator::StrataEstimator;
use crate::ibf::IbfConfig;
use crate::ibf::Record;

/// Composite difference estimator: strata for the close range, b-bit minwise
/// for the far range.
///
/// Records whose stratum lies within the active range go to the strata bank,
/// which decodes small symmetric differences near-exactly. The remainder
/// feeds the minwise sketch, whose similarity estimate carries the bulk
/// difference (and value modifications, which cancel out of the strata
/// filters entirely).
///
/// # Examples
///
/// ```
/// # use diffsketch::estimator::HybridEstimatorFactory;
/// # use diffsketch::ibf::IbfConfig;
/// # use diffsketch::ibf::Record;
/// let config = IbfConfig::new();
/// let mut left = HybridEstimatorFactory::create(config, 1000, 0);
/// let mut right = HybridEstimatorFactory::create(config, 1000, 0);
/// for id in 0..1000u64 {
///     left.add(&Record::from_value(id, &id, config.seed()));
///     right.add(&Record::from_value(id + 20, &(id + 20), config.seed()));
/// }
///
/// let estimate = left.decode(&right).expect("estimate available");
/// assert!(estimate >= 20 && estimate <= 2000);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct HybridEstimator {
    strata: StrataEstimator,
    minwise: BitMinwiseEstimator,
    item_count: i64,
}

impl HybridEstimator {
    /// Creates an estimator sized for `capacity` records.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` when any parameter is out of range (see
    /// [`StrataEstimator::new`] and [`BitMinwiseEstimator::new`]).
    pub fn new(
        config: IbfConfig,
        capacity: u64,
        bit_size: u8,
        hash_count: u32,
        strata_count: u8,
    ) -> Result<Self, Error> {
        Ok(HybridEstimator {
            strata: StrataEstimator::new(config, capacity, strata_count)?,
            minwise: BitMinwiseEstimator::new(config.seed(), capacity, bit_size, hash_count)?,
            item_count: 0,
        })
    }

    /// Scales estimates after failed reconciliation attempts.
    pub fn with_decode_factor(mut self, decode_factor: u64) -> Self {
        self.strata = self.strata.with_decode_factor(decode_factor);
        self
    }

    /// Records observed.
    pub fn item_count(&self) -> i64 {
        self.item_count
    }

    /// The strata half of the estimator.
    pub fn strata(&self) -> &StrataEstimator {
        &self.strata
    }

    /// The minwise half of the estimator.
    pub fn minwise(&self) -> &BitMinwiseEstimator {
        &self.minwise
    }

    /// Adds a record, routing it to whichever half covers its stratum.
    pub fn add(&mut self, record: &Record) {
        if !self.strata.add(record) {
            self.minwise.add(record);
        }
        self.item_count += 1;
    }

    /// Estimates `|A △ B|` against another estimator.
    ///
    /// The strata banks decode the close-range difference; the minwise
    /// dissimilarity, scaled by capacity and the decode factor, adds the
    /// far-range contribution. `None` means even the deepest stratum stalled,
    /// leaving nothing to extrapolate from; callers fall back to
    /// [`crate::estimator::quasi_estimate`]. The result never exceeds
    /// `|A| + |B|`.
    ///
    /// # Panics
    ///
    /// Panics if the estimators have incompatible configurations.
    pub fn decode(&self, other: &HybridEstimator) -> Option<i64> {
        let strata_part = self.strata.decode(&other.strata)?;

        let similarity = self.minwise.similarity(&other.minwise);
        let capacity = self.minwise.capacity().max(other.minwise.capacity());
        let factor = self.strata.decode_factor() as f64;
        let minwise_part = 2.0 * factor * capacity as f64 * (1.0 - similarity);

        let upper = (self.item_count.max(0) + other.item_count.max(0)) as f64;
        let estimate = (strata_part as f64 + minwise_part).min(upper);
        Some(estimate.round() as i64)
    }

    pub(crate) fn from_parts(
        strata: StrataEstimator,
        minwise: BitMinwiseEstimator,
        item_count: i64,
    ) -> Self {
        HybridEstimator {
            strata,
            minwise,
            item_count,
        }
    }
}

/// Sizes hybrid estimators from the expected set size and the number of
/// reconciliation attempts that have already failed.
///
/// Bigger sets get deeper strata and more minwise lanes; every failed decode
/// forces the deepest configuration and doubles the estimate scale so the
/// next filter allocation errs larger.
pub struct HybridEstimatorFactory;

impl HybridEstimatorFactory {
    /// Stratum depth and lane count thresholds, in set-size order.
    const MID_SET_SIZE: u64 = 8_000;
    const LARGE_SET_SIZE: u64 = 16_000;

    /// Creates an estimator for a set of `set_size` records after
    /// `failed_decode_count` failed reconciliation attempts.
    pub fn create(config: IbfConfig, set_size: u64, failed_decode_count: u32) -> HybridEstimator {
        let (strata_count, hash_count) =
            if failed_decode_count > 0 || set_size > Self::LARGE_SET_SIZE {
                (13, 15)
            } else if set_size > Self::MID_SET_SIZE {
                (9, 10)
            } else {
                (7, 8)
            };

        let decode_factor = 1u64 << failed_decode_count.min(32);
        HybridEstimator::new(config, set_size, 2, hash_count, strata_count)
            .expect("factory parameters are in range")
            .with_decode_factor(decode_factor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: u64) -> Record {
        Record::from_value(id, &id, IbfConfig::new().seed())
    }

    fn estimator_with(ids: impl Iterator<Item = u64>, capacity: u64) -> HybridEstimator {
        let mut estimator = HybridEstimatorFactory::create(IbfConfig::new(), capacity, 0);
        for id in ids {
            estimator.add(&record(id));
        }
        estimator
    }

    #[test]
    fn test_decode_self_is_zero() {
        let estimator = estimator_with(0..1000, 1000);
        assert_eq!(estimator.decode(&estimator), Some(0));
    }

    #[test]
    fn test_small_difference() {
        let left = estimator_with(0..1000, 1000);
        let right = estimator_with(15..1015, 1000);

        let estimate = left.decode(&right).expect("estimate available");
        // the far-range term may round a small difference up, never below half
        assert!(
            (15..=700).contains(&estimate),
            "estimate {estimate} unusable for sizing a 30-record difference"
        );
    }

    #[test]
    fn test_estimate_bounded_by_total() {
        let left = estimator_with(0..300, 300);
        let right = estimator_with(10_000..10_300, 300);

        let estimate = left.decode(&right).expect("estimate available");
        assert!(estimate <= 600);
        assert!(estimate >= 300, "estimate {estimate} for fully disjoint sets");
    }

    #[test]
    fn test_factory_thresholds() {
        let config = IbfConfig::new();
        assert_eq!(HybridEstimatorFactory::create(config, 100, 0).strata().strata_count(), 7);
        assert_eq!(
            HybridEstimatorFactory::create(config, 10_000, 0).strata().strata_count(),
            9
        );
        assert_eq!(
            HybridEstimatorFactory::create(config, 20_000, 0).strata().strata_count(),
            13
        );
        assert_eq!(HybridEstimatorFactory::create(config, 100, 2).strata().strata_count(), 13);
        assert_eq!(
            HybridEstimatorFactory::create(config, 100, 2).strata().decode_factor(),
            4
        );
    }
}
