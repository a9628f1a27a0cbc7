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

//! Fold-factor selection.
//!
//! A filter sized for its worst case usually carries far fewer records than
//! cells. Folding XOR-reduces stripes of cells onto a smaller block, shrinking
//! the sketch before it goes on the wire. The strategy picks the largest legal
//! divisor that still leaves headroom over the current item count.

use crate::error::Error;

/// Picks fold divisors for under-utilized filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FoldingStrategy {
    safety_factor: u64,
}

impl Default for FoldingStrategy {
    fn default() -> Self {
        FoldingStrategy { safety_factor: 2 }
    }
}

impl FoldingStrategy {
    /// Creates a strategy that keeps `safety_factor` times the item count in
    /// folded capacity.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` when `safety_factor` is 0.
    pub fn new(safety_factor: u64) -> Result<Self, Error> {
        if safety_factor < 1 {
            return Err(Error::invalid_argument("safety_factor must be at least 1"));
        }
        Ok(FoldingStrategy { safety_factor })
    }

    /// Returns the largest divisor `f > 1` of `block_size` such that
    /// `capacity / f` still exceeds the safety factor over `item_count`,
    /// or `None` when no such divisor exists.
    pub fn fold_factor(&self, block_size: u64, capacity: u64, item_count: u64) -> Option<u64> {
        if block_size < 2 {
            return None;
        }
        let needed = self.safety_factor.saturating_mul(item_count.max(1));
        if needed == 0 {
            return None;
        }
        let limit = capacity / needed;

        divisors(block_size)
            .into_iter()
            .filter(|&f| f > 1 && f <= limit)
            .max()
    }
}

/// The smallest 7-smooth number (a product of powers of 2, 3, 5 and 7) that is
/// at least `requested`. Smooth block sizes have many small divisors, so a
/// fold factor is almost always available later.
pub fn smooth_block_size(requested: u64) -> u64 {
    let mut candidate = requested.max(1);
    while !is_smooth(candidate) {
        candidate += 1;
    }
    candidate
}

fn is_smooth(mut n: u64) -> bool {
    for p in [2u64, 3, 5, 7] {
        while n % p == 0 {
            n /= p;
        }
    }
    n == 1
}

/// All divisors of `n`, unordered.
fn divisors(n: u64) -> Vec<u64> {
    let mut result = Vec::new();
    let mut d = 1;
    while d * d <= n {
        if n % d == 0 {
            result.push(d);
            if d != n / d {
                result.push(n / d);
            }
        }
        d += 1;
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fold_factor_prefers_largest_divisor() {
        let strategy = FoldingStrategy::default();
        // capacity 1024, 16 items: folded capacity must stay >= 32
        let factor = strategy.fold_factor(1024, 1024, 16).unwrap();
        assert_eq!(factor, 32);
    }

    #[test]
    fn test_fold_factor_none_when_loaded() {
        let strategy = FoldingStrategy::default();
        assert_eq!(strategy.fold_factor(1024, 1024, 600), None);
    }

    #[test]
    fn test_fold_factor_respects_divisibility() {
        let strategy = FoldingStrategy::default();
        // 35 = 5 * 7; item count allows 17x but only 5 and 7 divide
        assert_eq!(strategy.fold_factor(35, 35, 1), Some(7));
    }

    #[test]
    fn test_fold_factor_degenerate_block() {
        let strategy = FoldingStrategy::default();
        assert_eq!(strategy.fold_factor(1, 1024, 1), None);
    }

    #[test]
    fn test_new_rejects_zero_safety_factor() {
        assert_eq!(FoldingStrategy::new(3).unwrap().fold_factor(8, 64, 1), Some(8));
        assert_eq!(
            FoldingStrategy::new(0).unwrap_err().kind(),
            crate::error::ErrorKind::InvalidArgument
        );
    }

    #[test]
    fn test_smooth_block_size() {
        assert_eq!(smooth_block_size(1), 1);
        assert_eq!(smooth_block_size(11), 12);
        assert_eq!(smooth_block_size(121), 125);
        assert_eq!(smooth_block_size(2048), 2048);

        for requested in [13u64, 97, 450, 999, 7919] {
            let size = smooth_block_size(requested);
            assert!(size >= requested);
            assert!(is_smooth(size));
        }
    }

    #[test]
    fn test_smooth_sizes_fold_richly() {
        let strategy = FoldingStrategy::default();
        let size = smooth_block_size(750);
        assert!(strategy.fold_factor(size, size, 10).is_some());
    }
}
