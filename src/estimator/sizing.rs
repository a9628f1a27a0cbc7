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
use crate::ibf::Ibf;
use crate::ibf::IbfConfig;
use crate::ibf::smooth_block_size;

/// Differences below this use 3 hash functions; larger ones take 4.
const SMALL_DIFF: u64 = 200;

/// Cells per expected difference record, before hash fan-out.
const CELL_HEADROOM: f64 = 1.5;

/// Filter dimensions chosen for an estimated difference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IbfDimensions {
    /// Cell count, rounded up to a smooth number so later folds exist.
    pub block_size: u64,
    /// Hash functions per record.
    pub hash_count: u32,
    /// Narrowest counter width that carries the expected occupancy.
    pub count_kind: CountKind,
}

/// Sizes the next filter for an estimated difference of `estimated_diff`
/// records, after `failed_attempts` decodes have already stalled.
///
/// The base size is `1.5 * d * k` cells, doubled per failed attempt and
/// rounded up to a smooth number.
///
/// # Examples
///
/// ```
/// # use diffsketch::estimator::ibf_dimensions;
/// let dims = ibf_dimensions(50, 0);
/// assert!(dims.block_size >= 225);
/// assert_eq!(dims.hash_count, 3);
///
/// let retry = ibf_dimensions(50, 1);
/// assert!(retry.block_size >= 2 * dims.block_size);
/// ```
pub fn ibf_dimensions(estimated_diff: u64, failed_attempts: u32) -> IbfDimensions {
    let diff = estimated_diff.max(1);
    let hash_count: u32 = if diff < SMALL_DIFF { 3 } else { 4 };

    let base = (CELL_HEADROOM * diff as f64 * hash_count as f64).ceil() as u64;
    let scaled = base.saturating_mul(1u64 << failed_attempts.min(32));
    let block_size = smooth_block_size(scaled.max(hash_count as u64));

    IbfDimensions {
        block_size,
        hash_count,
        count_kind: CountKind::for_occupancy(diff, block_size),
    }
}

impl IbfDimensions {
    /// Applies these dimensions to a configuration. The policy only emits
    /// in-range dimensions, so this cannot fail.
    pub fn configure(&self, config: IbfConfig) -> IbfConfig {
        config
            .with_hash_count(self.hash_count)
            .expect("sizing policy emits a valid hash count")
            .with_count_kind(self.count_kind)
    }

    /// Allocates a paired filter with these dimensions.
    pub fn build_paired(&self, config: IbfConfig) -> Ibf {
        Ibf::paired(self.configure(config), self.block_size as usize)
            .expect("sizing policy emits a valid block size")
            .with_record_capacity(self.block_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_count_thresholds() {
        assert_eq!(ibf_dimensions(199, 0).hash_count, 3);
        assert_eq!(ibf_dimensions(200, 0).hash_count, 4);
    }

    #[test]
    fn test_block_size_scales_with_failures() {
        let first = ibf_dimensions(1000, 0);
        let second = ibf_dimensions(1000, 1);
        let third = ibf_dimensions(1000, 2);
        assert!(second.block_size >= 2 * first.block_size);
        assert!(third.block_size >= 2 * second.block_size);
    }

    #[test]
    fn test_block_size_is_smooth() {
        for diff in [1u64, 10, 100, 1000, 50_000] {
            let dims = ibf_dimensions(diff, 0);
            assert_eq!(dims.block_size, smooth_block_size(dims.block_size));
        }
    }

    #[test]
    fn test_count_kind_supports_occupancy() {
        for diff in [1u64, 500, 100_000] {
            let dims = ibf_dimensions(diff, 0);
            assert!(dims.count_kind.supports(diff, dims.block_size));
        }
    }

    #[test]
    fn test_build_paired() {
        let dims = ibf_dimensions(40, 0);
        let filter = dims.build_paired(IbfConfig::new());
        assert_eq!(filter.block_size() as u64, dims.block_size);
        assert_eq!(filter.hash_count(), dims.hash_count);
        assert!(filter.sub().is_some());
    }
}
