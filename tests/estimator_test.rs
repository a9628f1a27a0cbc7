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

mod common;

use common::altered;
use common::record;
use diffsketch::estimator::BitMinwiseEstimator;
use diffsketch::estimator::HybridEstimator;
use diffsketch::estimator::HybridEstimatorFactory;
use diffsketch::estimator::StrataEstimator;
use diffsketch::estimator::quasi_estimate;
use diffsketch::ibf::Ibf;
use diffsketch::ibf::IbfConfig;
use diffsketch::ibf::Record;
use googletest::assert_that;
use googletest::prelude::ge;
use googletest::prelude::le;
use googletest::prelude::near;

fn hybrid_with(ids: impl Iterator<Item = u64>, capacity: u64) -> HybridEstimator {
    let mut estimator = HybridEstimatorFactory::create(IbfConfig::new(), capacity, 0);
    for id in ids {
        estimator.add(&record(id));
    }
    estimator
}

#[test]
fn test_hybrid_decode_self_is_zero() {
    let estimator = hybrid_with(0..5_000, 5_000);
    assert_eq!(estimator.decode(&estimator), Some(0));
}

#[test]
fn test_hybrid_small_difference_usable_for_sizing() {
    let left = hybrid_with(0..2_000, 2_000);
    let right = hybrid_with(50..2_050, 2_000);

    let estimate = left.decode(&right).expect("estimate available");
    assert_that!(estimate, ge(50));
    assert_that!(estimate, le(4_000));
}

#[test]
fn test_hybrid_disjoint_sets_estimate_near_total() {
    let left = hybrid_with(0..1_000, 1_000);
    let right = hybrid_with(50_000..51_000, 1_000);

    let estimate = left.decode(&right).expect("estimate available") as f64;
    assert_that!(estimate, near(2_000.0, 600.0));
}

#[test]
fn test_hybrid_modifications_register() {
    let config = IbfConfig::new();
    let capacity = 1_000u64;
    let mut left = HybridEstimator::new(config, capacity, 2, 64, 7).unwrap();
    let mut right = HybridEstimator::new(config, capacity, 2, 64, 7).unwrap();
    for id in 0..1_000u64 {
        left.add(&record(id));
        if id % 4 == 0 {
            right.add(&altered(id));
        } else {
            right.add(&record(id));
        }
    }

    // 250 modified values; the estimate must not read the sets as identical
    let estimate = left.decode(&right).expect("estimate available");
    assert_that!(estimate, ge(100));
}

#[test]
fn test_strata_exact_for_small_differences() {
    let config = IbfConfig::new();
    let mut left = StrataEstimator::new(config, 1_000, 32).unwrap();
    let mut right = StrataEstimator::new(config, 1_000, 32).unwrap();
    for id in 0..1_000u64 {
        left.add(&record(id));
        if id >= 12 {
            right.add(&record(id));
        }
    }

    assert_eq!(left.decode(&right), Some(12));
}

#[test]
fn test_strata_retry_scale_doubles() {
    let config = IbfConfig::new();
    let first = HybridEstimatorFactory::create(config, 100, 0);
    let retried = HybridEstimatorFactory::create(config, 100, 3);

    assert_eq!(first.strata().decode_factor(), 1);
    assert_eq!(retried.strata().decode_factor(), 8);
    assert_eq!(retried.strata().strata_count(), 13);
}

#[test]
fn test_minwise_similarity_tracks_jaccard() {
    let seed = IbfConfig::new().seed();
    let mut left = BitMinwiseEstimator::new(seed, 4_000, 2, 128).unwrap();
    let mut right = BitMinwiseEstimator::new(seed, 4_000, 2, 128).unwrap();
    for id in 0..4_000u64 {
        left.add(&record(id));
        right.add(&record(id + 2_000));
    }

    // |A ∩ B| / |A ∪ B| = 2000 / 6000
    let similarity = left.similarity(&right);
    assert_that!(similarity, near(1.0 / 3.0, 0.2));
}

#[test]
fn test_quasi_estimate_fallback() {
    let config = IbfConfig::new();
    let mut remote = Ibf::new(config, 4_096).unwrap();
    for id in 0..1_000u64 {
        remote.add(&record(id));
    }
    let local: Vec<Record> = (500..1_500u64).map(record).collect();

    let estimate = quasi_estimate(&remote, &local) as f64;
    assert_that!(estimate, ge(500.0));
    assert_that!(estimate, le(2_000.0));
}
