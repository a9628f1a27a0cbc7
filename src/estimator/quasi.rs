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

use crate::ibf::Ibf;
use crate::ibf::Record;

/// Last-resort difference estimate when only one side has a sketch.
///
/// Each local record is membership-tested against the other side's filter; a
/// record missing from the filter is certainly a difference, while a present
/// one may be a false positive. The non-member count is corrected for the
/// filter's false-positive rate, doubled for the differences the other side
/// holds, adjusted by the set-size imbalance, and capped at `|A| + |B|`.
pub fn quasi_estimate<'a, I>(other: &Ibf, own_records: I) -> u64
where
    I: IntoIterator<Item = &'a Record>,
{
    let mut sampled: u64 = 0;
    let mut non_members: u64 = 0;
    for record in own_records {
        sampled += 1;
        if !other.contains(record) {
            non_members += 1;
        }
    }

    let other_count = other.item_count().max(0) as u64;
    let fp_rate = membership_fp_rate(other);
    let corrected = if fp_rate < 1.0 {
        non_members as f64 / (1.0 - fp_rate)
    } else {
        sampled as f64
    };

    let imbalance = other_count.abs_diff(sampled);
    let estimate = (2.0 * corrected).round() as u64 + imbalance;
    estimate.min(sampled + other_count)
}

/// The probability that all probe cells of an absent record are occupied,
/// estimated from the filter's load.
fn membership_fp_rate(filter: &Ibf) -> f64 {
    let occupied = (0..filter.block_size())
        .filter(|&i| !filter.cell_is_identity(i))
        .count();
    let load = occupied as f64 / filter.block_size() as f64;
    load.powi(filter.hash_count() as i32)
}
