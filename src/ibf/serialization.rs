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

use crate::codec::SketchBytes;
use crate::codec::SketchSlice;
use crate::count::CountArray;
use crate::count::CountKind;
use crate::error::Error;
use crate::hash::MAX_HASH_COUNT;
use crate::ibf::Ibf;
use crate::ibf::IbfConfig;

const MAX_BLOCK_SIZE: u64 = 1 << 30;

/// Fixed header bytes per filter: k, reverse flag, block size, capacity,
/// item count, count width tag.
const HEADER_BYTES: usize = 4 + 1 + 8 + 8 + 8 + 1;

impl Ibf {
    /// Serializes the filter (and its sub-filter, when paired).
    ///
    /// Layout, all little-endian: `k: u32`, `is_reverse: u8`, `m: u64`,
    /// `capacity: u64`, `item_count: i64`, `count_width_tag: u8`, then the
    /// three cell arrays of length `m` (counts at the tagged width, id sums
    /// as u64, hash sums as u32), then a sub-filter presence byte followed by
    /// the sub-filter when present. Arrays carry no length prefixes; `m`
    /// governs.
    ///
    /// # Examples
    ///
    /// ```
    /// # use diffsketch::ibf::Ibf;
    /// # use diffsketch::ibf::IbfConfig;
    /// # use diffsketch::ibf::Record;
    /// let config = IbfConfig::new();
    /// let mut filter = Ibf::new(config, 64).unwrap();
    /// filter.add(&Record::new(7, 0x1234));
    ///
    /// let bytes = filter.serialize();
    /// let restored = Ibf::deserialize(&bytes, config).unwrap();
    /// assert_eq!(filter, restored);
    /// ```
    pub fn serialize(&self) -> Vec<u8> {
        let mut bytes = SketchBytes::with_capacity(self.serialized_size());
        self.write_into(&mut bytes);
        bytes.into_bytes()
    }

    pub(crate) fn serialized_size(&self) -> usize {
        let cell_bytes = self.counts.kind().width_tag() as usize + 8 + 4;
        let own = HEADER_BYTES + self.m * cell_bytes + 1;
        own + self
            .sub
            .as_deref()
            .map_or(0, |sub| sub.serialized_size())
    }

    pub(crate) fn write_into(&self, bytes: &mut SketchBytes) {
        bytes.write_u32_le(self.config.hash_count());
        bytes.write_u8(self.is_reverse as u8);
        bytes.write_u64_le(self.m as u64);
        bytes.write_u64_le(self.capacity);
        bytes.write_i64_le(self.item_count);
        bytes.write_u8(self.counts.kind().width_tag());

        match self.counts.kind() {
            CountKind::I8 => {
                for value in self.counts.iter() {
                    bytes.write_i8(value as i8);
                }
            }
            CountKind::I16 => {
                for value in self.counts.iter() {
                    bytes.write_i16_le(value as i16);
                }
            }
            CountKind::I32 => {
                for value in self.counts.iter() {
                    bytes.write_i32_le(value);
                }
            }
        }
        for &id_sum in &self.id_sums {
            bytes.write_u64_le(id_sum);
        }
        for &hash_sum in &self.hash_sums {
            bytes.write_u32_le(hash_sum);
        }

        match self.sub.as_deref() {
            Some(sub) => {
                bytes.write_u8(1);
                sub.write_into(bytes);
            }
            None => bytes.write_u8(0),
        }
    }

    /// Deserializes a filter. The hash count and count width come from the
    /// wire; seed and folding strategy come from `config` and must match
    /// whatever produced the bytes.
    ///
    /// # Errors
    ///
    /// `InvalidData` when the buffer is truncated or any header field is out
    /// of range.
    pub fn deserialize(bytes: &[u8], config: IbfConfig) -> Result<Self, Error> {
        let mut cursor = SketchSlice::new(bytes);
        Self::read_from(&mut cursor, config)
    }

    pub(crate) fn read_from(cursor: &mut SketchSlice<'_>, config: IbfConfig) -> Result<Self, Error> {
        let k = cursor
            .read_u32_le()
            .map_err(|_| Error::insufficient_data("k"))?;
        if k == 0 || k as usize > MAX_HASH_COUNT {
            return Err(Error::deserial(format!("hash count {k} out of range")));
        }

        let reverse_flag = cursor
            .read_u8()
            .map_err(|_| Error::insufficient_data("is_reverse"))?;
        let is_reverse = match reverse_flag {
            0 => false,
            1 => true,
            other => {
                return Err(Error::deserial(format!("invalid reverse flag: {other}")));
            }
        };

        let m = cursor
            .read_u64_le()
            .map_err(|_| Error::insufficient_data("m"))?;
        if m < k as u64 || m > MAX_BLOCK_SIZE {
            return Err(Error::deserial(format!("block size {m} out of range")));
        }
        let m = m as usize;

        let capacity = cursor
            .read_u64_le()
            .map_err(|_| Error::insufficient_data("capacity"))?;
        let item_count = cursor
            .read_i64_le()
            .map_err(|_| Error::insufficient_data("item_count"))?;

        let tag = cursor
            .read_u8()
            .map_err(|_| Error::insufficient_data("count_width_tag"))?;
        let kind = CountKind::from_width_tag(tag)?;

        let mut values = Vec::with_capacity(m);
        for _ in 0..m {
            let value = match kind {
                CountKind::I8 => cursor
                    .read_i8()
                    .map_err(|_| Error::insufficient_data("counts"))?
                    as i32,
                CountKind::I16 => cursor
                    .read_i16_le()
                    .map_err(|_| Error::insufficient_data("counts"))?
                    as i32,
                CountKind::I32 => cursor
                    .read_i32_le()
                    .map_err(|_| Error::insufficient_data("counts"))?,
            };
            values.push(value);
        }

        let mut id_sums = vec![0u64; m];
        for id_sum in id_sums.iter_mut() {
            *id_sum = cursor
                .read_u64_le()
                .map_err(|_| Error::insufficient_data("id_sums"))?;
        }
        let mut hash_sums = vec![0u32; m];
        for hash_sum in hash_sums.iter_mut() {
            *hash_sum = cursor
                .read_u32_le()
                .map_err(|_| Error::insufficient_data("hash_sums"))?;
        }

        let present = cursor
            .read_u8()
            .map_err(|_| Error::insufficient_data("sub_present"))?;
        let sub = match present {
            0 => None,
            1 => Some(Box::new(Self::read_from(cursor, config)?)),
            other => {
                return Err(Error::deserial(format!("invalid sub marker: {other}")));
            }
        };

        let mut config = config;
        config.set_hash_count(k);
        config.set_count_kind(kind);

        Ok(Ibf {
            config,
            m,
            capacity,
            item_count,
            is_reverse,
            counts: CountArray::from_values(kind, values),
            id_sums,
            hash_sums,
            sub,
        })
    }
}
