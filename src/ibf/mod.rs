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

//! Invertible Bloom filters for set reconciliation.
//!
//! An invertible Bloom filter (IBF) is a counting Bloom filter whose cells
//! additionally carry XOR sums of the records they hold. Two parties each
//! sketch their record set into a compatible IBF; subtracting the sketches
//! cancels every shared record cell-wise, and peeling the small remainder
//! recovers exactly which identifiers differ. Neither party ever ships its
//! full set.
//!
//! # Usage
//!
//! ```rust
//! use diffsketch::ibf::DiffSets;
//! use diffsketch::ibf::Ibf;
//! use diffsketch::ibf::IbfConfig;
//!
//! let config = IbfConfig::new();
//!
//! // Each side sketches its own records.
//! let mut ours = Ibf::paired(config, 120).unwrap();
//! let mut theirs = Ibf::paired(config, 120).unwrap();
//! for id in 0..1000u64 {
//!     ours.add_entity(id, &"value");
//!     let value = if id == 4 { "changed" } else { "value" };
//!     theirs.add_entity(id, &value);
//! }
//! ours.add_entity(1000, &"extra");
//!
//! // Exchange sketches, subtract, peel.
//! let mut sets = DiffSets::new();
//! let decoded = ours.subtract_and_decode(&theirs, &mut sets).unwrap();
//! assert!(decoded);
//! assert!(sets.only_in_a.contains(&1000));
//! assert!(sets.modified.contains(&4));
//! ```
//!
//! Decoding is probabilistic: an undersized filter returns
//! [`DecodeOutcome::Fail`] with partial results, and the caller resizes via
//! the estimator machinery in [`crate::estimator`] and retries.
//!
//! # References
//!
//! - Eppstein, Goodrich, Uyeda, Varghese (2011). "What's the Difference?
//!   Efficient Set Reconciliation without Prior Context"
//! - Goodrich, Mitzenmacher (2011). "Invertible Bloom Lookup Tables"

mod config;
mod decode;
mod folding;
mod serialization;
mod sketch;

pub use self::config::IbfConfig;
pub use self::decode::DecodeOutcome;
pub use self::decode::DiffSets;
pub use self::folding::FoldingStrategy;
pub use self::folding::smooth_block_size;
pub use self::sketch::Ibf;
pub use self::sketch::Record;
