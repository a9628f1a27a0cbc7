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

//! Difference-cardinality estimation.
//!
//! Before two parties exchange reconciliation filters, they need to know how
//! big a filter to allocate: too small and the peel stalls, too big and the
//! exchange wastes bandwidth. The estimators here answer that with a
//! constant-size preamble exchange:
//!
//! - [`StrataEstimator`]: a bank of mini-filters partitioned by identifier
//!   hash stratum, near-exact for small differences;
//! - [`BitMinwiseEstimator`]: a b-bit minwise similarity sketch covering the
//!   far range;
//! - [`HybridEstimator`]: the composition of both, built by
//!   [`HybridEstimatorFactory`] from the set size and retry count;
//! - [`quasi_estimate`]: a sampling fallback when only one side has a sketch;
//! - [`ibf_dimensions`]: the sizing policy turning an estimate into filter
//!   dimensions.

mod hybrid;
mod minwise;
mod quasi;
mod serialization;
mod sizing;
pub(crate) mod strata;

pub use self::hybrid::HybridEstimator;
pub use self::hybrid::HybridEstimatorFactory;
pub use self::minwise::BitMinwiseEstimator;
pub use self::quasi::quasi_estimate;
pub use self::sizing::IbfDimensions;
pub use self::sizing::ibf_dimensions;
pub use self::strata::StrataEstimator;
