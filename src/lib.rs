// Copyright 2018 Quint developers
//
// Licensed under the Apache License, Version 2.0 (the "License"); you may not use
// this file except in compliance with the License. You may obtain a copy of the
// License at http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software distributed
// under the License is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR
// CONDITIONS OF ANY KIND, either express or implied. See the License for the
// specific language governing permissions and limitations under the License.

//! Quint: an embedded bitemporal tuplestore.
//!
//! Every fact is an immutable five-tuple `(entity, attribute, value,
//! transaction, retracted_by)`.  Schema is stored as facts about itself, and
//! declared views project facts back into ordinary SQL tables: inserts,
//! updates and deletes against a view are rewritten into assertions and
//! retractions, and any query can be evaluated as of any past transaction.
//!
//! ```
//! use quint::{Attribute, Store, ValueType, ViewDefinition};
//!
//! let mut store = Store::open_in_memory().expect("opened");
//! store.define_attribute(&Attribute::new("person/name", ValueType::Text)).expect("defined");
//! store.define_attribute(&Attribute::new("person/email", ValueType::Text)).expect("defined");
//! store.define_view(&ViewDefinition::new("persons", &["person/name", "person/email"]))
//!     .expect("view");
//!
//! store.execute("INSERT INTO persons (name, email) VALUES (?1, ?2)", &[&"Alice", &"a@x"])
//!     .expect("inserted");
//! let names = store.query("SELECT name FROM persons", &[]).expect("queried");
//! assert_eq!(1, names.len());
//! ```

#[macro_use]
extern crate error_chain;
#[macro_use]
extern crate log;
extern crate rusqlite;
extern crate serde_json;

extern crate quint_core;
extern crate quint_db;

#[cfg(test)]
extern crate env_logger;
#[cfg(test)]
extern crate tempfile;

pub mod store;

pub use quint_core::{
    Attribute,
    Cardinality,
    Entid,
    Schema,
    TypedValue,
    Unique,
    ValueType,
    View,
    ViewDefinition,
    ViewUpdate,
};
pub use quint_db::{
    new_connection,
    Error,
    ErrorKind,
    Result,
};
pub use store::{
    QueryOutput,
    Store,
    Value,
};
