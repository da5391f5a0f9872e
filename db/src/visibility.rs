// Copyright 2018 Quint developers
//
// Licensed under the Apache License, Version 2.0 (the "License"); you may not use
// this file except in compliance with the License. You may obtain a copy of the
// License at http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software distributed
// under the License is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR
// CONDITIONS OF ANY KIND, either express or implied. See the License for the
// specific language governing permissions and limitations under the License.

//! Temporal visibility.
//!
//! A single connection-scoped value, the as-of transaction, decides what a
//! query sees.  It is exposed to SQL as the zero-argument function
//! `as_of_tx()`, registered on every connection and backed by an atomic cell;
//! unset reads as SQL NULL.  The function carries SQLite's deterministic flag,
//! which licenses once-per-statement evaluation: the variable is read per
//! query, not per row.  Generated views embed the predicates below.
//!
//! A datom is visible at T iff it was asserted at or before T and not
//! retracted at or before T.  With the variable unset, visible means simply
//! not retracted.

use std::sync::Arc;
use std::sync::atomic::{
    AtomicI64,
    Ordering,
};

use rusqlite;
use rusqlite::functions::FunctionFlags;

use quint_core::Entid;

use errors::Result;

/// The name of the session function generated predicates call.
pub const AS_OF_FUNCTION: &'static str = "as_of_tx";

/// The cell value meaning "unset"; transaction ids are never negative.
const UNSET: i64 = -1;

/// The connection's as-of context.  Clones share the cell.
#[derive(Clone, Debug)]
pub struct AsOf(Arc<AtomicI64>);

impl AsOf {
    pub fn new() -> AsOf {
        AsOf(Arc::new(AtomicI64::new(UNSET)))
    }

    pub fn get(&self) -> Option<Entid> {
        match self.0.load(Ordering::SeqCst) {
            UNSET => None,
            tx => Some(tx),
        }
    }

    pub fn set(&self, tx: Option<Entid>) {
        self.0.store(tx.unwrap_or(UNSET), Ordering::SeqCst);
    }
}

/// Register `as_of_tx()` on the connection, backed by the given cell.  Must
/// run before any generated view is created or queried on this connection.
pub fn register(conn: &rusqlite::Connection, as_of: &AsOf) -> Result<()> {
    let cell = as_of.0.clone();
    conn.create_scalar_function(
        AS_OF_FUNCTION,
        0,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        move |_ctx| -> rusqlite::Result<Option<i64>> {
            match cell.load(Ordering::SeqCst) {
                UNSET => Ok(None),
                tx => Ok(Some(tx)),
            }
        },
    )?;
    Ok(())
}

/// The current-state predicate for rows of the aliased relation.
pub fn current_predicate(alias: &str) -> String {
    format!("{}.retracted_by IS NULL", alias)
}

/// The as-of-aware predicate for rows of the aliased relation.
pub fn visible_predicate(alias: &str) -> String {
    format!(
        "(({f}() IS NULL AND {a}.retracted_by IS NULL) \
         OR ({f}() IS NOT NULL AND {a}.tx <= {f}() \
         AND ({a}.retracted_by IS NULL OR {a}.retracted_by > {f}())))",
        f = AS_OF_FUNCTION,
        a = alias,
    )
}
