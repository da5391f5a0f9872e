// Copyright 2018 Quint developers
//
// Licensed under the Apache License, Version 2.0 (the "License"); you may not use
// this file except in compliance with the License. You may obtain a copy of the
// License at http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software distributed
// under the License is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR
// CONDITIONS OF ANY KIND, either express or implied. See the License for the
// specific language governing permissions and limitations under the License.

//! Core model shared by every layer of the quint tuplestore: entity ids and
//! partition encoding, the closed set of logical value types, typed values,
//! attribute and view definitions, and the in-memory schema registry.

extern crate chrono;
extern crate serde;
#[macro_use]
extern crate serde_derive;
extern crate serde_json;
extern crate uuid;

mod attributes;
mod types;
mod values;

pub use attributes::{
    Attribute,
    Cardinality,
    Unique,
    ViewDefinition,
    ViewUpdate,
};
pub use types::{
    counter_of,
    entid,
    partition_of,
    Entid,
    EntidMap,
    IdentMap,
    Partition,
    PartitionMap,
    Schema,
    View,
    ViewMap,
};
pub use values::{
    TypedValue,
    ValueType,
};
