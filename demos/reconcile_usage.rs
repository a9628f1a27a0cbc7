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

use diffsketch::estimator::HybridEstimatorFactory;
use diffsketch::estimator::ibf_dimensions;
use diffsketch::ibf::DiffSets;
use diffsketch::ibf::Ibf;
use diffsketch::ibf::IbfConfig;
use diffsketch::ibf::Record;

fn main() {
    let config = IbfConfig::new();

    // Two parties hold almost the same 10,000 key/value records:
    // ours is missing 40, theirs has 25 modified values.
    let ours: Vec<Record> = (40..10_000u64)
        .map(|id| Record::from_value(id, &format!("payload-{id}"), config.seed()))
        .collect();
    let theirs: Vec<Record> = (0..10_000u64)
        .map(|id| {
            let payload = if id < 25 {
                format!("payload-{id}-edited")
            } else {
                format!("payload-{id}")
            };
            Record::from_value(id, &payload, config.seed())
        })
        .collect();

    // Phase 1: exchange constant-size estimators to size the real filter.
    let mut our_estimator = HybridEstimatorFactory::create(config, ours.len() as u64, 0);
    for record in &ours {
        our_estimator.add(record);
    }
    let mut their_estimator = HybridEstimatorFactory::create(config, theirs.len() as u64, 0);
    for record in &theirs {
        their_estimator.add(record);
    }

    let estimate = our_estimator
        .decode(&their_estimator)
        .expect("estimator decoded") as u64;
    println!("Estimated difference: ~{estimate} records");

    // Phase 2: exchange filters sized for the estimate, subtract, peel.
    let dims = ibf_dimensions(estimate, 0);
    println!(
        "Allocating paired filters: {} cells, {} hashes, {:?} counters",
        dims.block_size, dims.hash_count, dims.count_kind
    );

    let mut our_filter = dims.build_paired(config);
    for record in &ours {
        our_filter.add(record);
    }
    let mut their_filter = dims.build_paired(config);
    for record in &theirs {
        their_filter.add(record);
    }

    let wire = their_filter.serialize();
    println!("Filter wire size: {} bytes", wire.len());
    let their_filter = Ibf::deserialize(&wire, config).unwrap();

    let mut sets = DiffSets::new();
    let decoded = our_filter
        .subtract_and_decode(&their_filter, &mut sets)
        .unwrap();

    println!("Decode complete: {decoded}");
    println!("Records only we hold: {}", sets.only_in_a.len());
    println!("Records only they hold: {}", sets.only_in_b.len());
    println!("Records they modified: {}", sets.modified.len());
}
