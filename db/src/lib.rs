// Copyright 2018 Quint developers
//
// Licensed under the Apache License, Version 2.0 (the "License"); you may not use
// this file except in compliance with the License. You may obtain a copy of the
// License at http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software distributed
// under the License is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR
// CONDITIONS OF ANY KIND, either express or implied. See the License for the
// specific language governing permissions and limitations under the License.

//! The quint storage engine: a bitemporal tuplestore embedded in SQLite.
//!
//! Facts are immutable five-tuples `(e, a, v_raw, tx, retracted_by)` (datoms)
//! stored one physical table per attribute, each carrying a stored typed
//! projection of the raw value.  Schema (attribute and view definitions) is
//! itself datoms, seeded by `bootstrap`.  The `view` and `dml` modules compile
//! stored view definitions into plain SQL views plus `INSTEAD OF` triggers, so
//! row-level DML against a view becomes datom assertion and retraction.

extern crate chrono;
#[macro_use]
extern crate error_chain;
extern crate itertools;
#[macro_use]
extern crate lazy_static;
#[macro_use]
extern crate log;
#[macro_use]
extern crate rusqlite;
#[macro_use]
extern crate serde_json;
extern crate tabwriter;
extern crate uuid;

extern crate quint_core;

#[cfg(test)]
extern crate env_logger;

use std::path::Path;

pub mod allocator;
pub mod bootstrap;
pub mod codec;
pub mod datoms;
pub mod debug;
pub mod dml;
pub mod entids;
pub mod errors;
pub mod registry;
pub mod relation;
pub mod schema;
pub mod view;
pub mod views;
pub mod visibility;

pub use errors::{
    Error,
    ErrorKind,
    Result,
};

/// Open a SQLite connection with the pragmas the store expects.
///
/// An empty path opens a private in-memory database.
pub fn new_connection<T>(path: T) -> rusqlite::Result<rusqlite::Connection>
where T: AsRef<Path> {
    let path = path.as_ref();
    let conn = if path.as_os_str().is_empty() {
        rusqlite::Connection::open_in_memory()?
    } else {
        rusqlite::Connection::open(path)?
    };

    // WAL lets concurrent readers see a consistent snapshot while the single
    // writer appends.  In-memory databases report `memory` here; that is fine.
    let _mode: String = conn.query_row("PRAGMA journal_mode = WAL", params![], |row| row.get(0))?;
    conn.busy_timeout(::std::time::Duration::from_secs(5))?;

    Ok(conn)
}
