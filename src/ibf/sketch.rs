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

use std::hash::Hash;

use crate::count::CountArray;
use crate::error::Error;
use crate::hash::ProbePositions;
use crate::hash::id_hash;
use crate::hash::value_hash_of;
use crate::ibf::DiffSets;
use crate::ibf::IbfConfig;

/// A key/value record as the filters see it: a 64-bit identifier plus the
/// 32-bit hash of its opaque value.
///
/// The value hash is never zero (zero is the XOR identity of cell sums), so
/// [`Record::new`] remaps 0 to 1, matching what the hashing helpers produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Record {
    id: u64,
    value_hash: u32,
}

impl Record {
    /// Creates a record from an identifier and a precomputed value hash.
    pub fn new(id: u64, value_hash: u32) -> Self {
        Record {
            id,
            value_hash: if value_hash == 0 { 1 } else { value_hash },
        }
    }

    /// Creates a record by hashing an opaque value with the given seed.
    ///
    /// The seed must match the configuration of every sketch the record is
    /// fed to.
    pub fn from_value<T: Hash>(id: u64, value: &T, seed: u32) -> Self {
        Record {
            id,
            value_hash: value_hash_of(value, seed),
        }
    }

    /// The record identifier.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// The 32-bit hash of the record value.
    pub fn value_hash(&self) -> u32 {
        self.value_hash
    }
}

/// An invertible Bloom filter over key/value records.
///
/// Cells carry a signed count, an XOR of record identifiers, and an XOR of a
/// 32-bit checksum. Subtracting two compatible filters cancels shared records
/// cell-wise, leaving a sketch of the symmetric difference that a peeling
/// decoder can invert back into identifiers.
///
/// Two orientations exist:
///
/// - a **key** filter probes and checksums on `id_hash(id)`, so a record's
///   value never influences its cells and purity can be validated as
///   `id_hash(id_sum) == hash_sum`;
/// - a **reverse** filter probes and checksums on the value hash, which is
///   what makes modified records (same id, different value) visible.
///
/// A paired filter (see [`Ibf::paired`]) owns a reverse sub-filter and keeps
/// both in lockstep, enabling modification detection during decode.
///
/// # Examples
///
/// ```
/// # use diffsketch::ibf::DiffSets;
/// # use diffsketch::ibf::Ibf;
/// # use diffsketch::ibf::IbfConfig;
/// # use diffsketch::ibf::Record;
/// let config = IbfConfig::new();
/// let mut left = Ibf::new(config, 60).unwrap();
/// let mut right = Ibf::new(config, 60).unwrap();
///
/// for id in 0..100u64 {
///     let record = Record::from_value(id, &"payload", config.seed());
///     left.add(&record);
///     if id >= 3 {
///         right.add(&record);
///     }
/// }
///
/// let mut sets = DiffSets::default();
/// let outcome = left.subtract(&right).unwrap().decode(&mut sets);
/// assert!(outcome.is_success());
/// assert_eq!(sets.only_in_a.len(), 3);
/// assert!(sets.only_in_b.is_empty());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Ibf {
    pub(crate) config: IbfConfig,
    pub(crate) m: usize,
    pub(crate) capacity: u64,
    pub(crate) item_count: i64,
    pub(crate) is_reverse: bool,
    pub(crate) counts: CountArray,
    pub(crate) id_sums: Vec<u64>,
    pub(crate) hash_sums: Vec<u32>,
    pub(crate) sub: Option<Box<Ibf>>,
}

impl Ibf {
    /// Allocates a key-oriented filter with `m` cells.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` when `m` is smaller than the configured
    /// hash-function count.
    pub fn new(config: IbfConfig, m: usize) -> Result<Self, Error> {
        Self::allocate(config, m, false)
    }

    /// Allocates a reverse (value-keyed) filter with `m` cells.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` when `m` is smaller than the configured
    /// hash-function count.
    pub fn new_reverse(config: IbfConfig, m: usize) -> Result<Self, Error> {
        Self::allocate(config, m, true)
    }

    /// Allocates a key filter paired with a reverse sub-filter of the same
    /// block size. The pair detects modified records during decode.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` when `m` is smaller than the configured
    /// hash-function count.
    pub fn paired(config: IbfConfig, m: usize) -> Result<Self, Error> {
        let mut filter = Self::allocate(config, m, false)?;
        filter.sub = Some(Box::new(Self::allocate(config, m, true)?));
        Ok(filter)
    }

    fn allocate(config: IbfConfig, m: usize, is_reverse: bool) -> Result<Self, Error> {
        if m < config.hash_count() as usize {
            return Err(Error::invalid_argument(format!(
                "block size {m} is smaller than the hash count {}",
                config.hash_count()
            )));
        }
        Ok(Ibf {
            config,
            m,
            capacity: m as u64,
            item_count: 0,
            is_reverse,
            counts: CountArray::new(config.count_kind(), m),
            id_sums: vec![0; m],
            hash_sums: vec![0; m],
            sub: None,
        })
    }

    /// Overrides the record capacity used by fold-factor selection.
    pub fn with_record_capacity(mut self, capacity: u64) -> Self {
        self.capacity = capacity;
        if let Some(sub) = self.sub.as_mut() {
            sub.capacity = capacity;
        }
        self
    }

    /// Number of cells.
    pub fn block_size(&self) -> usize {
        self.m
    }

    /// Number of hash functions.
    pub fn hash_count(&self) -> u32 {
        self.config.hash_count()
    }

    /// The configuration this filter was allocated with.
    pub fn config(&self) -> IbfConfig {
        self.config
    }

    /// Record capacity used by fold-factor selection.
    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Net number of records added (adds minus removes).
    pub fn item_count(&self) -> i64 {
        self.item_count
    }

    /// Whether this filter probes on the value hash.
    pub fn is_reverse(&self) -> bool {
        self.is_reverse
    }

    /// The paired reverse sub-filter, if any.
    pub fn sub(&self) -> Option<&Ibf> {
        self.sub.as_deref()
    }

    /// Whether any cell counter has hit its representation bound. Saturated
    /// cells are irrecoverable; purity checks and estimates degrade.
    pub fn is_saturated(&self) -> bool {
        self.counts.is_saturated() || self.sub.as_ref().is_some_and(|sub| sub.is_saturated())
    }

    /// Cardinality estimate from the absolute cell counts.
    pub fn estimated_count(&self) -> u64 {
        self.counts.estimated_count(self.config.hash_count())
    }

    /// Adds a record to the filter (and its sub-filter, when paired).
    pub fn add(&mut self, record: &Record) {
        self.apply_record(record, 1);
        self.item_count += 1;
        if let Some(sub) = self.sub.as_mut() {
            sub.add(record);
        }
    }

    /// Removes a record from the filter (and its sub-filter, when paired).
    pub fn remove(&mut self, record: &Record) {
        self.apply_record(record, -1);
        self.item_count -= 1;
        if let Some(sub) = self.sub.as_mut() {
            sub.remove(record);
        }
    }

    /// Removes a record by identifier alone.
    ///
    /// A key filter derives everything it stores from the identifier, so the
    /// record cancels completely. A paired reverse sub-filter cannot locate
    /// the record without its value hash and is left untouched.
    pub fn remove_key(&mut self, id: u64) {
        if self.is_reverse {
            return;
        }
        let hash = id_hash(id, self.config.seed());
        for pos in ProbePositions::new(hash, self.config.hash_count() as usize, self.m).iter() {
            self.counts.decrease(pos);
            self.id_sums[pos] ^= id;
            self.hash_sums[pos] ^= hash;
        }
        self.item_count -= 1;
    }

    /// Hashes `value` with the configured seed and adds the record.
    pub fn add_entity<T: Hash>(&mut self, id: u64, value: &T) {
        let record = Record::from_value(id, value, self.config.seed());
        self.add(&record);
    }

    /// Hashes `value` with the configured seed and removes the record.
    pub fn remove_entity<T: Hash>(&mut self, id: u64, value: &T) {
        let record = Record::from_value(id, value, self.config.seed());
        self.remove(&record);
    }

    /// Tests whether the record is possibly in the filter.
    ///
    /// A zero count at any probe cell rules membership out; otherwise the
    /// record was possibly added (or is a false positive).
    pub fn contains(&self, record: &Record) -> bool {
        let hash = self.checksum(record);
        ProbePositions::new(hash, self.config.hash_count() as usize, self.m)
            .iter()
            .all(|pos| self.counts.get(pos) != 0)
    }

    /// Hashes `value` with the configured seed and tests membership.
    pub fn contains_entity<T: Hash>(&self, id: u64, value: &T) -> bool {
        let record = Record::from_value(id, value, self.config.seed());
        self.contains(&record)
    }

    /// Cell-wise difference `self - other`, allocating a fresh result.
    ///
    /// Block sizes must be equal or related by an integer fold; the larger
    /// operand folds down to the smaller before the subtraction.
    ///
    /// # Errors
    ///
    /// `IncompatibleSketches` when hash counts, seeds, orientations or pairing
    /// differ, or when neither block size divides the other.
    pub fn subtract(&self, other: &Ibf) -> Result<Ibf, Error> {
        Self::subtract_impl(self.clone(), other, None)
    }

    /// Cell-wise difference `self - other`, reusing `self`'s arrays.
    ///
    /// The destructive counterpart of [`subtract`](Self::subtract): the left
    /// operand is consumed by move, so it cannot be observed afterwards.
    pub fn subtract_owned(self, other: &Ibf) -> Result<Ibf, Error> {
        Self::subtract_impl(self, other, None)
    }

    /// Subtracts `other` and peels the result in one step, collecting the
    /// symmetric difference into `sets`. On a paired filter this also
    /// resolves modified records. Returns whether decoding completed.
    ///
    /// # Errors
    ///
    /// `IncompatibleSketches` as for [`subtract`](Self::subtract).
    pub fn subtract_and_decode(&self, other: &Ibf, sets: &mut DiffSets) -> Result<bool, Error> {
        let mut diff = Self::subtract_impl(self.clone(), other, Some(sets))?;
        Ok(diff.decode(sets).is_success())
    }

    pub(crate) fn subtract_impl(
        mut a: Ibf,
        b: &Ibf,
        mut capture: Option<&mut DiffSets>,
    ) -> Result<Ibf, Error> {
        a.check_compatible(b)?;

        let target = common_block_size(a.m, b.m).ok_or_else(|| {
            Error::incompatible(format!(
                "no common fold between block sizes {} and {}",
                a.m, b.m
            ))
        })?;
        if a.m != target {
            a = a.fold((a.m / target) as u64)?;
        }
        let b_folded;
        let b = if b.m != target {
            b_folded = b.fold((b.m / target) as u64)?;
            &b_folded
        } else {
            b
        };

        if b.counts.kind().width_tag() > a.counts.kind().width_tag() {
            a.counts = CountArray::from_values(b.counts.kind(), a.counts.iter().collect());
        }

        let mut captures = Vec::new();
        for i in 0..target {
            if capture.is_some()
                && a.is_pure_cell(i)
                && b.is_pure_cell(i)
                && (a.id_sums[i] != b.id_sums[i] || a.hash_sums[i] != b.hash_sums[i])
            {
                captures.push(CapturedPair {
                    pos: i,
                    a_count: a.counts.get(i),
                    a_id: a.id_sums[i],
                    a_hash: a.hash_sums[i],
                    b_count: b.counts.get(i),
                    b_id: b.id_sums[i],
                    b_hash: b.hash_sums[i],
                });
            }
            a.counts.subtract(i, b.counts.get(i));
            a.id_sums[i] ^= b.id_sums[i];
            a.hash_sums[i] ^= b.hash_sums[i];
        }
        a.item_count -= b.item_count;
        a.capacity = a.capacity.min(b.capacity);

        if let Some(sets) = capture.as_deref_mut() {
            a.apply_captures(&captures, sets);
        }

        match (a.sub.take(), b.sub.as_deref()) {
            (Some(sub_a), Some(sub_b)) => {
                let sub = Self::subtract_impl(*sub_a, sub_b, capture)?;
                a.sub = Some(Box::new(sub));
            }
            (None, None) => {}
            _ => unreachable!("pairing checked by check_compatible"),
        }

        Ok(a)
    }

    /// Both-pure early capture: a cell where each operand held a different
    /// singleton cannot cancel, but both singletons are fully known, so they
    /// are peeled out immediately. Each singleton is cancelled from all of
    /// its probe cells with its own count sign and emitted on the side that
    /// sign indicates (a removed record surfaces on the opposite side, just
    /// as it would under the regular peel). A capture whose cell was already
    /// disturbed by an earlier one is skipped and left to the regular
    /// decoder.
    fn apply_captures(&mut self, captures: &[CapturedPair], sets: &mut DiffSets) {
        let k = self.config.hash_count() as usize;
        for pair in captures {
            let expected_count = pair.a_count - pair.b_count;
            let expected_id = pair.a_id ^ pair.b_id;
            let expected_hash = pair.a_hash ^ pair.b_hash;
            if self.counts.get(pair.pos) != expected_count
                || self.id_sums[pair.pos] != expected_id
                || self.hash_sums[pair.pos] != expected_hash
            {
                continue;
            }
            for pos in ProbePositions::new(pair.a_hash, k, self.m).iter() {
                self.counts.add(pos, -pair.a_count);
                self.id_sums[pos] ^= pair.a_id;
                self.hash_sums[pos] ^= pair.a_hash;
            }
            if pair.a_count > 0 {
                sets.only_in_a.insert(pair.a_id);
            } else {
                sets.only_in_b.insert(pair.a_id);
            }
            for pos in ProbePositions::new(pair.b_hash, k, self.m).iter() {
                self.counts.add(pos, pair.b_count);
                self.id_sums[pos] ^= pair.b_id;
                self.hash_sums[pos] ^= pair.b_hash;
            }
            if pair.b_count > 0 {
                sets.only_in_b.insert(pair.b_id);
            } else {
                sets.only_in_a.insert(pair.b_id);
            }
        }
    }

    /// Cell-wise sum: counts add, sums XOR, item counts sum, sub-filters
    /// recurse. Operands fold to a common block size first.
    ///
    /// # Errors
    ///
    /// `IncompatibleSketches` as for [`subtract`](Self::subtract).
    pub fn add_sketch(&mut self, other: &Ibf) -> Result<(), Error> {
        self.check_compatible(other)?;

        let target = common_block_size(self.m, other.m).ok_or_else(|| {
            Error::incompatible(format!(
                "no common fold between block sizes {} and {}",
                self.m, other.m
            ))
        })?;
        if self.m != target {
            *self = self.fold((self.m / target) as u64)?;
        }
        let other_folded;
        let other = if other.m != target {
            other_folded = other.fold((other.m / target) as u64)?;
            &other_folded
        } else {
            other
        };

        for i in 0..target {
            self.counts.add(i, other.counts.get(i));
            self.id_sums[i] ^= other.id_sums[i];
            self.hash_sums[i] ^= other.hash_sums[i];
        }
        self.item_count += other.item_count;

        match (self.sub.as_mut(), other.sub.as_deref()) {
            (Some(sub), Some(other_sub)) => sub.add_sketch(other_sub)?,
            (None, None) => {}
            _ => unreachable!("pairing checked by check_compatible"),
        }

        Ok(())
    }

    /// Folds the filter to `m / factor` cells by XOR-reducing stripes of
    /// index `i mod (m / factor)`. Membership and decoding semantics survive
    /// because probe positions are reduced the same way.
    ///
    /// # Errors
    ///
    /// `InvalidFoldFactor` when `factor` is 0, does not divide the block
    /// size, or would leave fewer cells than hash functions.
    pub fn fold(&self, factor: u64) -> Result<Ibf, Error> {
        if factor == 0 || self.m as u64 % factor != 0 {
            return Err(Error::invalid_fold(factor, self.m as u64));
        }
        let new_m = self.m / factor as usize;
        if new_m < self.config.hash_count() as usize {
            return Err(Error::invalid_fold(factor, self.m as u64)
                .with_context("hash_count", self.config.hash_count()));
        }

        let mut counts = CountArray::new(self.counts.kind(), new_m);
        let mut id_sums = vec![0u64; new_m];
        let mut hash_sums = vec![0u32; new_m];
        for i in 0..self.m {
            let target = i % new_m;
            counts.add(target, self.counts.get(i));
            id_sums[target] ^= self.id_sums[i];
            hash_sums[target] ^= self.hash_sums[i];
        }

        let sub = match self.sub.as_deref() {
            Some(sub) => Some(Box::new(sub.fold(factor)?)),
            None => None,
        };

        Ok(Ibf {
            config: self.config,
            m: new_m,
            capacity: self.capacity / factor,
            item_count: self.item_count,
            is_reverse: self.is_reverse,
            counts,
            id_sums,
            hash_sums,
            sub,
        })
    }

    /// Folds by the divisor the configured strategy picks for the current
    /// load, or returns an unchanged copy when the strategy declines.
    pub fn compress(&self) -> Result<Ibf, Error> {
        match self.config.folding().fold_factor(
            self.m as u64,
            self.capacity,
            self.item_count.unsigned_abs(),
        ) {
            Some(factor) => self.fold(factor),
            None => Ok(self.clone()),
        }
    }

    fn check_compatible(&self, other: &Ibf) -> Result<(), Error> {
        if self.config.hash_count() != other.config.hash_count() {
            return Err(Error::incompatible("hash counts differ")
                .with_context("left", self.config.hash_count())
                .with_context("right", other.config.hash_count()));
        }
        if self.config.seed() != other.config.seed() {
            return Err(Error::incompatible("hash seeds differ"));
        }
        if self.is_reverse != other.is_reverse {
            return Err(Error::incompatible("filter orientations differ"));
        }
        if self.sub.is_some() != other.sub.is_some() {
            return Err(Error::incompatible("one operand is paired, the other is not"));
        }
        Ok(())
    }

    /// The 32-bit word this filter probes and checksums on for `record`.
    pub(crate) fn checksum(&self, record: &Record) -> u32 {
        if self.is_reverse {
            record.value_hash
        } else {
            id_hash(record.id, self.config.seed())
        }
    }

    fn apply_record(&mut self, record: &Record, sign: i32) {
        let hash = self.checksum(record);
        for pos in ProbePositions::new(hash, self.config.hash_count() as usize, self.m).iter() {
            self.counts.add(pos, sign);
            self.id_sums[pos] ^= record.id;
            self.hash_sums[pos] ^= hash;
        }
    }

    pub(crate) fn apply_cell(&mut self, pos: usize, id: u64, hash: u32, sign: i32) {
        self.counts.add(pos, sign);
        self.id_sums[pos] ^= id;
        self.hash_sums[pos] ^= hash;
    }

    pub(crate) fn cell_is_identity(&self, pos: usize) -> bool {
        self.counts.get(pos) == 0 && self.id_sums[pos] == 0 && self.hash_sums[pos] == 0
    }

    /// Purity: the cell holds exactly one record. A key filter cross-checks
    /// the hash sum against the id sum; a reverse filter has no such identity
    /// and relies on the count plus a nonzero checksum.
    pub(crate) fn is_pure_cell(&self, pos: usize) -> bool {
        if !self.counts.is_pure(pos) {
            return false;
        }
        if self.is_reverse {
            self.hash_sums[pos] != 0
        } else {
            id_hash(self.id_sums[pos], self.config.seed()) == self.hash_sums[pos]
        }
    }
}

struct CapturedPair {
    pos: usize,
    a_count: i32,
    a_id: u64,
    a_hash: u32,
    b_count: i32,
    b_id: u64,
    b_hash: u32,
}

fn common_block_size(a: usize, b: usize) -> Option<usize> {
    if a == b {
        Some(a)
    } else if a > b && a % b == 0 {
        Some(b)
    } else if b > a && b % a == 0 {
        Some(a)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn record(id: u64) -> Record {
        Record::from_value(id, &id.wrapping_mul(31), IbfConfig::new().seed())
    }

    #[test]
    fn test_new_rejects_tiny_block() {
        let err = Ibf::new(IbfConfig::new(), 2).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);

        let err = Ibf::paired(IbfConfig::new(), 0).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn test_net_empty_is_zero_filter() {
        let mut filter = Ibf::new(IbfConfig::new(), 64).unwrap();
        for id in 0..200u64 {
            filter.add(&record(id));
        }
        for id in (0..200u64).rev() {
            filter.remove(&record(id));
        }

        assert_eq!(filter.item_count(), 0);
        assert!((0..filter.block_size()).all(|i| filter.cell_is_identity(i)));
    }

    #[test]
    fn test_remove_key_cancels_fully() {
        let mut filter = Ibf::new(IbfConfig::new(), 64).unwrap();
        filter.add(&record(7));
        filter.remove_key(7);

        assert!((0..filter.block_size()).all(|i| filter.cell_is_identity(i)));
    }

    #[test]
    fn test_contains() {
        let mut filter = Ibf::new(IbfConfig::new(), 512).unwrap();
        for id in 0..100u64 {
            filter.add(&record(id));
        }
        for id in 0..100u64 {
            assert!(filter.contains(&record(id)));
        }
    }

    #[test]
    fn test_fold_preserves_membership() {
        let mut filter = Ibf::new(IbfConfig::new(), 1024).unwrap();
        for id in 0..50u64 {
            filter.add(&record(id));
        }

        let folded = filter.fold(2).unwrap().fold(2).unwrap();
        assert_eq!(folded.block_size(), 256);
        assert_eq!(folded.item_count(), 50);

        // probe sequences regenerate at the folded size, so a record whose
        // positions collide modulo the new block size can drop out
        let contained = (0..50u64).filter(|&id| folded.contains(&record(id))).count();
        assert!(contained >= 47, "only {contained} of 50 retained");
    }

    #[test]
    fn test_fold_composition() {
        let mut filter = Ibf::new(IbfConfig::new(), 720).unwrap();
        for id in 0..30u64 {
            filter.add(&record(id));
        }

        let twice = filter.fold(2).unwrap().fold(3).unwrap();
        let once = filter.fold(6).unwrap();
        assert_eq!(twice, once);
    }

    #[test]
    fn test_fold_rejects_bad_factor() {
        let filter = Ibf::new(IbfConfig::new(), 64).unwrap();
        assert_eq!(
            filter.fold(0).unwrap_err().kind(),
            ErrorKind::InvalidFoldFactor
        );
        assert_eq!(
            filter.fold(3).unwrap_err().kind(),
            ErrorKind::InvalidFoldFactor
        );
    }

    #[test]
    fn test_subtract_folds_to_common_size() {
        let config = IbfConfig::new();
        let mut big = Ibf::new(config, 128).unwrap();
        for id in 0..20u64 {
            big.add(&record(id));
        }
        let small = big.fold(2).unwrap();

        let diff = big.subtract(&small).unwrap();
        assert_eq!(diff.block_size(), 64);
        assert!((0..diff.block_size()).all(|i| diff.cell_is_identity(i)));
    }

    #[test]
    fn test_subtract_incompatible() {
        let a = Ibf::new(IbfConfig::new(), 64).unwrap();
        let b = Ibf::new(IbfConfig::new().with_hash_count(4).unwrap(), 64).unwrap();
        assert_eq!(
            a.subtract(&b).unwrap_err().kind(),
            ErrorKind::IncompatibleSketches
        );

        let c = Ibf::new(IbfConfig::new(), 48).unwrap();
        assert_eq!(
            a.subtract(&c).unwrap_err().kind(),
            ErrorKind::IncompatibleSketches
        );

        let d = Ibf::new_reverse(IbfConfig::new(), 64).unwrap();
        assert_eq!(
            a.subtract(&d).unwrap_err().kind(),
            ErrorKind::IncompatibleSketches
        );
    }

    #[test]
    fn test_subtract_is_anticommutative() {
        let config = IbfConfig::new();
        let mut a = Ibf::new(config, 64).unwrap();
        let mut b = Ibf::new(config, 64).unwrap();
        for id in 0..30u64 {
            a.add(&record(id));
            b.add(&record(id + 20));
        }

        let forward = a.subtract(&b).unwrap();
        let backward = b.subtract(&a).unwrap();
        for i in 0..64 {
            assert_eq!(forward.id_sums[i], backward.id_sums[i]);
            assert_eq!(forward.hash_sums[i], backward.hash_sums[i]);
            assert_eq!(forward.counts.get(i), -backward.counts.get(i));
        }
    }

    #[test]
    fn test_add_sketch_merges_counts() {
        let config = IbfConfig::new();
        let mut left = Ibf::new(config, 64).unwrap();
        let mut right = Ibf::new(config, 64).unwrap();
        left.add(&record(1));
        right.add(&record(2));

        left.add_sketch(&right).unwrap();
        assert_eq!(left.item_count(), 2);
        assert!(left.contains(&record(1)));
        assert!(left.contains(&record(2)));
    }

    #[test]
    fn test_estimated_count() {
        let mut filter = Ibf::new(IbfConfig::new(), 512).unwrap();
        for id in 0..40u64 {
            filter.add(&record(id));
        }
        assert_eq!(filter.estimated_count(), 40);
    }

    #[test]
    fn test_compress_under_light_load() {
        let mut filter = Ibf::new(IbfConfig::new(), 1024).unwrap().with_record_capacity(64);
        for id in 0..8u64 {
            filter.add(&record(id));
        }

        let compressed = filter.compress().unwrap();
        assert_eq!(compressed.block_size(), 256);
        assert_eq!(compressed.item_count(), 8);

        let contained = (0..8u64).filter(|&id| compressed.contains(&record(id))).count();
        assert!(contained >= 6, "only {contained} of 8 retained");
    }
}
