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

//! # Approximate set reconciliation over key/value data
//!
//! Two parties each hold a set of `(identifier, value)` records and want to
//! know how the sets differ: records unique to either side, and records whose
//! identifier matches but whose value changed. Neither side ships its set.
//! Each party builds a small fixed-size sketch, the sketches are exchanged
//! and subtracted, and the difference is decoded locally.
//!
//! The library is divided into modules that constitute distinct groups of
//! functionality:
//!
//! - [`ibf`]: invertible Bloom filters, the reconciliation sketch itself,
//!   with subtraction, folding, a peeling decoder, and a paired reverse
//!   filter that recovers modified records;
//! - [`estimator`]: strata, b-bit minwise and hybrid difference estimators
//!   plus the sizing policy that dimensions the next filter;
//! - [`count`]: the saturating cell-count algebra the filters are built on;
//! - [`error`]: the error type shared by all fallible operations.
//!
//! Decoding is probabilistic. A filter sized below the actual difference
//! fails to decode, which is an ordinary outcome rather than an error; the
//! caller is expected to resize via [`estimator::ibf_dimensions`] and retry.
//! Sketches are not synchronized; callers operating on disjoint sketches may
//! do so from separate threads without coordination.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(missing_docs)]

mod codec;
pub mod count;
pub mod error;
pub mod estimator;
mod hash;
pub mod ibf;
