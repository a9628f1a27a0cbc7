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

//! Saturating cell-count algebra.
//!
//! Invertible filters store one signed counter per cell. Lightly loaded
//! filters get away with a narrow counter; heavily loaded ones need room.
//! [`CountKind`] tags the width and [`CountArray`] carries the cell counters
//! with saturating arithmetic: a counter that hits its bound stays there
//! instead of wrapping, which keeps a flooded cell detectably flooded.

use crate::error::Error;

/// Margin applied to the expected per-cell occupancy when deciding whether a
/// counter width can carry a filter. Covers the hash-function fan-out plus
/// skew across cells.
const OCCUPANCY_MARGIN: u64 = 8;

/// Width of the signed per-cell counter.
///
/// Bounds are symmetric (`-max ..= max`) so negating a counter can never
/// overflow. The narrowest width whose range accommodates the expected cell
/// occupancy should be used; see [`CountKind::for_occupancy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CountKind {
    /// 8-bit counters for lightly loaded filters.
    I8,
    /// 16-bit counters.
    I16,
    /// 32-bit counters.
    I32,
}

impl CountKind {
    /// The additive identity of the count algebra.
    pub const fn identity() -> i32 {
        0
    }

    /// The count contributed by a single record.
    pub const fn unity() -> i32 {
        1
    }

    /// The saturation bound of this width.
    pub const fn max(self) -> i32 {
        match self {
            CountKind::I8 => i8::MAX as i32,
            CountKind::I16 => i16::MAX as i32,
            CountKind::I32 => i32::MAX,
        }
    }

    /// The byte width written into serialized sketches.
    pub const fn width_tag(self) -> u8 {
        match self {
            CountKind::I8 => 1,
            CountKind::I16 => 2,
            CountKind::I32 => 4,
        }
    }

    /// Resolves a serialized width tag.
    pub fn from_width_tag(tag: u8) -> Result<Self, Error> {
        match tag {
            1 => Ok(CountKind::I8),
            2 => Ok(CountKind::I16),
            4 => Ok(CountKind::I32),
            _ => Err(Error::invalid_count_width(tag)),
        }
    }

    /// Whether this width accommodates `capacity` records spread over `size`
    /// cells, with margin for hash fan-out and skew.
    pub fn supports(self, capacity: u64, size: u64) -> bool {
        let per_cell = capacity.saturating_mul(OCCUPANCY_MARGIN) / size.max(1);
        per_cell <= self.max() as u64
    }

    /// The narrowest width that supports the given occupancy.
    pub fn for_occupancy(capacity: u64, size: u64) -> CountKind {
        [CountKind::I8, CountKind::I16, CountKind::I32]
            .into_iter()
            .find(|kind| kind.supports(capacity, size))
            .unwrap_or(CountKind::I32)
    }
}

/// Cell counters of a filter: one saturating signed counter per position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountArray {
    kind: CountKind,
    values: Vec<i32>,
}

impl CountArray {
    /// Allocates `len` identity counters of the given width.
    pub fn new(kind: CountKind, len: usize) -> Self {
        CountArray {
            kind,
            values: vec![CountKind::identity(); len],
        }
    }

    pub(crate) fn from_values(kind: CountKind, values: Vec<i32>) -> Self {
        CountArray { kind, values }
    }

    /// The counter width of this array.
    pub fn kind(&self) -> CountKind {
        self.kind
    }

    /// Number of cells.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the array holds no cells.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// The counter at `index`.
    pub fn get(&self, index: usize) -> i32 {
        self.values[index]
    }

    /// Adds one record's contribution at `index`, saturating.
    pub fn increase(&mut self, index: usize) {
        self.add(index, CountKind::unity());
    }

    /// Removes one record's contribution at `index`, saturating.
    pub fn decrease(&mut self, index: usize) {
        self.add(index, -CountKind::unity());
    }

    /// Adds `delta` at `index`, clamping to the width's bounds.
    pub fn add(&mut self, index: usize, delta: i32) {
        let max = self.kind.max();
        let value = self.values[index].saturating_add(delta);
        self.values[index] = value.clamp(-max, max);
    }

    /// Subtracts `delta` at `index`, clamping to the width's bounds.
    pub fn subtract(&mut self, index: usize, delta: i32) {
        // delta is itself clamped to (-max, max], so negation cannot overflow
        self.add(index, -delta);
    }

    /// A cell is pure when it carries exactly one record's worth of count.
    pub fn is_pure(&self, index: usize) -> bool {
        self.values[index].abs() == CountKind::unity()
    }

    /// Whether any counter sits at a representation bound. Saturated counters
    /// no longer track their cell's true contribution history, so purity and
    /// cardinality estimates degrade.
    pub fn is_saturated(&self) -> bool {
        let max = self.kind.max();
        self.values.iter().any(|&v| v == max || v == -max)
    }

    /// Cardinality estimate: the absolute counts sum to `k` contributions per
    /// record.
    pub fn estimated_count(&self, k: u32) -> u64 {
        let total: u64 = self.values.iter().map(|&v| v.unsigned_abs() as u64).sum();
        total / k.max(1) as u64
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = i32> + '_ {
        self.values.iter().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_width_bounds() {
        assert_eq!(CountKind::I8.max(), 127);
        assert_eq!(CountKind::I16.max(), 32767);
        assert_eq!(CountKind::I32.max(), i32::MAX);
    }

    #[test]
    fn test_width_tag_round_trip() {
        for kind in [CountKind::I8, CountKind::I16, CountKind::I32] {
            assert_eq!(CountKind::from_width_tag(kind.width_tag()).unwrap(), kind);
        }
        assert!(CountKind::from_width_tag(3).is_err());
    }

    #[test]
    fn test_saturation_never_wraps() {
        let mut counts = CountArray::new(CountKind::I8, 1);
        for _ in 0..300 {
            counts.increase(0);
        }
        assert_eq!(counts.get(0), 127);
        assert!(counts.is_saturated());

        for _ in 0..600 {
            counts.decrease(0);
        }
        assert_eq!(counts.get(0), -127);
        assert!(counts.is_saturated());
    }

    #[test]
    fn test_purity() {
        let mut counts = CountArray::new(CountKind::I16, 3);
        counts.increase(0);
        counts.decrease(1);
        counts.increase(2);
        counts.increase(2);

        assert!(counts.is_pure(0));
        assert!(counts.is_pure(1));
        assert!(!counts.is_pure(2));
    }

    #[test]
    fn test_estimated_count() {
        let mut counts = CountArray::new(CountKind::I16, 8);
        // two records, three contributions each
        for index in [0, 1, 2, 3, 4, 5] {
            counts.increase(index);
        }
        assert_eq!(counts.estimated_count(3), 2);
    }

    #[test]
    fn test_supports() {
        assert!(CountKind::I8.supports(100, 600));
        assert!(!CountKind::I8.supports(100_000, 600));
        assert!(CountKind::I16.supports(100_000, 600));
        assert_eq!(CountKind::for_occupancy(100, 600), CountKind::I8);
        assert_eq!(CountKind::for_occupancy(100_000, 600), CountKind::I16);
    }
}
