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

use diffsketch::ibf::IbfConfig;
use diffsketch::ibf::Record;

/// A record whose value is a deterministic function of its id.
#[allow(dead_code)] // false-positive
pub fn record(id: u64) -> Record {
    Record::from_value(id, &format!("value-{id}"), IbfConfig::new().seed())
}

/// The same id as [`record`] with a different value.
#[allow(dead_code)] // false-positive
pub fn altered(id: u64) -> Record {
    Record::from_value(id, &format!("value-{id}-v2"), IbfConfig::new().seed())
}
