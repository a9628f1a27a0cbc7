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
use crate::count::CountKind;
use crate::error::Error;
use crate::estimator::BitMinwiseEstimator;
use crate::estimator::HybridEstimator;
use crate::estimator::StrataEstimator;
use crate::estimator::strata::STRATA_SLOTS;
use crate::ibf::Ibf;
use crate::ibf::IbfConfig;

impl HybridEstimator {
    /// Serializes the estimator.
    ///
    /// Layout, all little-endian: `item_count: i64`, `strata_count: u8`, then
    /// all 32 stratum slots each prefixed by a presence byte (absent strata
    /// carry the marker alone), then the minwise block: `bit_size: u8`,
    /// `capacity: u64`, `hash_count: u32`, `item_count: i64` and the packed
    /// lane bits with a byte-length prefix.
    ///
    /// # Examples
    ///
    /// ```
    /// # use diffsketch::estimator::HybridEstimator;
    /// # use diffsketch::estimator::HybridEstimatorFactory;
    /// # use diffsketch::ibf::IbfConfig;
    /// # use diffsketch::ibf::Record;
    /// let config = IbfConfig::new();
    /// let mut estimator = HybridEstimatorFactory::create(config, 100, 0);
    /// estimator.add(&Record::new(1, 2));
    ///
    /// let bytes = estimator.serialize();
    /// let restored = HybridEstimator::deserialize(&bytes, config).unwrap();
    /// assert_eq!(estimator, restored);
    /// ```
    pub fn serialize(&self) -> Vec<u8> {
        let strata_bytes: usize = self
            .strata()
            .strata()
            .iter()
            .map(|slot| 1 + slot.as_ref().map_or(0, |ibf| ibf.serialized_size()))
            .sum();
        let minwise = self.minwise();
        let packed = minwise.packed_values();

        let mut bytes = SketchBytes::with_capacity(9 + strata_bytes + 21 + 8 + packed.len());
        bytes.write_i64_le(self.item_count());
        bytes.write_u8(self.strata().strata_count());

        for slot in self.strata().strata() {
            match slot {
                Some(ibf) => {
                    bytes.write_u8(1);
                    ibf.write_into(&mut bytes);
                }
                None => bytes.write_u8(0),
            }
        }

        bytes.write_u8(minwise.bit_size());
        bytes.write_u64_le(minwise.capacity());
        bytes.write_u32_le(minwise.hash_count());
        bytes.write_i64_le(minwise.item_count());
        bytes.write_u64_le(packed.len() as u64);
        bytes.write(&packed);

        bytes.into_bytes()
    }

    /// Deserializes an estimator. As with filters, the seed comes from
    /// `config` and must match whatever produced the bytes.
    ///
    /// The restored minwise lanes hold retained bits only; the estimator
    /// compares and decodes exactly, but should not receive further records.
    ///
    /// # Errors
    ///
    /// `InvalidData` when the buffer is truncated or any field is out of
    /// range.
    pub fn deserialize(bytes: &[u8], config: IbfConfig) -> Result<Self, Error> {
        let mut cursor = SketchSlice::new(bytes);

        let item_count = cursor
            .read_i64_le()
            .map_err(|_| Error::insufficient_data("item_count"))?;
        let strata_count = cursor
            .read_u8()
            .map_err(|_| Error::insufficient_data("strata_count"))?;
        if strata_count == 0 || strata_count as usize > STRATA_SLOTS {
            return Err(Error::deserial(format!(
                "strata count {strata_count} out of range"
            )));
        }

        let mut strata: Vec<Option<Ibf>> = Vec::with_capacity(STRATA_SLOTS);
        let mut strata_items: i64 = 0;
        // strata are always allocated with 16-bit counters
        let mut stratum_config = config.with_count_kind(CountKind::I16);
        for slot in 0..STRATA_SLOTS {
            let present = cursor
                .read_u8()
                .map_err(|_| Error::insufficient_data("stratum_present"))?;
            match present {
                0 => strata.push(None),
                1 => {
                    let ibf = Ibf::read_from(&mut cursor, config)?;
                    strata_items += ibf.item_count();
                    stratum_config = ibf.config();
                    strata.push(Some(ibf));
                }
                other => {
                    return Err(Error::deserial(format!(
                        "invalid stratum marker {other} at slot {slot}"
                    )));
                }
            }
        }

        let bit_size = cursor
            .read_u8()
            .map_err(|_| Error::insufficient_data("bit_size"))?;
        let capacity = cursor
            .read_u64_le()
            .map_err(|_| Error::insufficient_data("capacity"))?;
        let hash_count = cursor
            .read_u32_le()
            .map_err(|_| Error::insufficient_data("hash_count"))?;
        let minwise_items = cursor
            .read_i64_le()
            .map_err(|_| Error::insufficient_data("minwise_item_count"))?;
        if bit_size == 0 || bit_size > 16 {
            return Err(Error::deserial(format!("bit size {bit_size} out of range")));
        }
        if hash_count == 0 || hash_count > 1 << 20 {
            return Err(Error::deserial(format!(
                "minwise hash count {hash_count} out of range"
            )));
        }

        let packed_len = cursor
            .read_u64_le()
            .map_err(|_| Error::insufficient_data("packed_len"))?;
        let expected = (hash_count as usize * bit_size as usize).div_ceil(8);
        if packed_len as usize != expected {
            return Err(Error::deserial(format!(
                "packed length {packed_len}, expected {expected}"
            )));
        }
        let mut packed = vec![0u8; expected];
        cursor
            .read_exact(&mut packed)
            .map_err(|_| Error::insufficient_data("packed_bits"))?;

        let minwise = BitMinwiseEstimator::from_packed(
            config.seed(),
            capacity,
            bit_size,
            hash_count,
            minwise_items,
            &packed,
        )?;
        let strata = StrataEstimator::from_parts(
            stratum_config,
            strata,
            strata_count,
            capacity,
            strata_items,
        );

        Ok(HybridEstimator::from_parts(strata, minwise, item_count))
    }
}
