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
use crate::error::Error;
use crate::hash::DEFAULT_UPDATE_SEED;
use crate::hash::MAX_HASH_COUNT;
use crate::ibf::FoldingStrategy;

/// Configuration shared by every filter participating in a reconciliation.
///
/// Two sketches can only be combined when they were built from the same
/// configuration: the hash-function count, seed, and probe scheme determine
/// which cells a record touches, and mismatched configurations silently break
/// the cancellation algebra.
///
/// # Examples
///
/// ```
/// # use diffsketch::count::CountKind;
/// # use diffsketch::ibf::IbfConfig;
/// let config = IbfConfig::new()
///     .with_count_kind(CountKind::I8)
///     .with_seed(42)
///     .with_hash_count(4)
///     .unwrap();
/// assert_eq!(config.hash_count(), 4);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IbfConfig {
    k: u32,
    count_kind: CountKind,
    seed: u32,
    folding: FoldingStrategy,
}

impl Default for IbfConfig {
    fn default() -> Self {
        IbfConfig {
            k: 3,
            count_kind: CountKind::I16,
            seed: DEFAULT_UPDATE_SEED,
            folding: FoldingStrategy::default(),
        }
    }
}

impl IbfConfig {
    /// Creates the default configuration: 3 hash functions, 16-bit counters,
    /// the default update seed.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the number of hash functions (probe cells per record).
    ///
    /// # Errors
    ///
    /// `InvalidArgument` when `k` is 0 or exceeds the supported maximum of 8.
    pub fn with_hash_count(mut self, k: u32) -> Result<Self, Error> {
        if k < 1 {
            return Err(Error::invalid_argument("hash count must be at least 1"));
        }
        if k as usize > MAX_HASH_COUNT {
            return Err(Error::invalid_argument(format!(
                "hash count must not exceed {MAX_HASH_COUNT}"
            )));
        }
        self.k = k;
        Ok(self)
    }

    /// Sets the cell-counter width.
    pub fn with_count_kind(mut self, kind: CountKind) -> Self {
        self.count_kind = kind;
        self
    }

    /// Sets the hash seed. Sketches with different seeds cannot be combined.
    pub fn with_seed(mut self, seed: u32) -> Self {
        self.seed = seed;
        self
    }

    /// Sets the folding strategy used by `compress`.
    pub fn with_folding(mut self, folding: FoldingStrategy) -> Self {
        self.folding = folding;
        self
    }

    /// Number of hash functions.
    pub fn hash_count(&self) -> u32 {
        self.k
    }

    /// Cell-counter width.
    pub fn count_kind(&self) -> CountKind {
        self.count_kind
    }

    /// Hash seed.
    pub fn seed(&self) -> u32 {
        self.seed
    }

    /// Folding strategy.
    pub fn folding(&self) -> FoldingStrategy {
        self.folding
    }

    pub(crate) fn set_hash_count(&mut self, k: u32) {
        self.k = k;
    }

    pub(crate) fn set_count_kind(&mut self, kind: CountKind) {
        self.count_kind = kind;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_hash_count_bounds() {
        assert_eq!(IbfConfig::new().with_hash_count(8).unwrap().hash_count(), 8);
        assert_eq!(
            IbfConfig::new().with_hash_count(0).unwrap_err().kind(),
            ErrorKind::InvalidArgument
        );
        assert_eq!(
            IbfConfig::new().with_hash_count(9).unwrap_err().kind(),
            ErrorKind::InvalidArgument
        );
    }
}
