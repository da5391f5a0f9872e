// Copyright 2018 Quint developers
//
// Licensed under the Apache License, Version 2.0 (the "License"); you may not use
// this file except in compliance with the License. You may obtain a copy of the
// License at http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software distributed
// under the License is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR
// CONDITIONS OF ANY KIND, either express or implied. See the License for the
// specific language governing permissions and limitations under the License.

//! The partition and transaction allocator.
//!
//! Entity ids are minted by bumping a partition's counter row; the row write
//! lock is the serialisation point, so no two allocators ever return the same
//! id.  Allocation participates in the caller's enclosing host transaction: an
//! aborted transaction rolls the counter back with everything else, and gaps
//! only arise from explicitly rolled-back work.

use chrono::{
    SecondsFormat,
    Utc,
};
use rusqlite;
use rusqlite::OptionalExtension;

use quint_core::{
    Entid,
    Partition,
    PartitionMap,
};

use errors::{
    ErrorKind,
    Result,
};

pub const PARTITION_DB: &'static str = "db";
pub const PARTITION_TX: &'static str = "tx";
pub const PARTITION_USER: &'static str = "user";

/// Mint a fresh entity id from the named partition.
pub fn allocate_entity(conn: &rusqlite::Connection, partition: &str) -> Result<Entid> {
    let bumped = conn.execute(
        "UPDATE partitions SET next_id = next_id + 1 WHERE ident = ?1",
        params![partition],
    )?;
    if bumped == 0 {
        bail!(ErrorKind::UnknownPartition(partition.to_string()));
    }
    let id: i64 = conn.query_row(
        "SELECT (id << 48) | next_id FROM partitions WHERE ident = ?1",
        params![partition],
        |row| row.get(0),
    )?;
    Ok(id)
}

/// The id most recently handed out by the named partition.
pub fn last_allocated(conn: &rusqlite::Connection, partition: &str) -> Result<Entid> {
    let id: Option<i64> = conn.query_row(
        "SELECT (id << 48) | next_id FROM partitions WHERE ident = ?1",
        params![partition],
        |row| row.get(0),
    ).optional()?;
    id.ok_or_else(|| ErrorKind::UnknownPartition(partition.to_string()).into())
}

/// Mint a transaction: an entity in the `tx` partition plus a wall-clock row
/// in `transactions`.
pub fn new_transaction(conn: &rusqlite::Connection) -> Result<Entid> {
    let tx = allocate_entity(conn, PARTITION_TX)?;
    let instant = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
    conn.execute(
        "INSERT INTO transactions (id, instant) VALUES (?1, ?2)",
        params![tx, instant],
    )?;
    Ok(tx)
}

/// The most recent transaction in the store, if any beyond bootstrap.
pub fn latest_transaction(conn: &rusqlite::Connection) -> Result<Option<Entid>> {
    let id: Option<i64> = conn.query_row(
        "SELECT max(id) FROM transactions",
        params![],
        |row| row.get(0),
    )?;
    Ok(id)
}

/// Read the partitions table.
pub fn partitions(conn: &rusqlite::Connection) -> Result<PartitionMap> {
    let mut stmt = conn.prepare("SELECT id, ident, next_id FROM partitions ORDER BY id")?;
    let mut map = PartitionMap::default();
    let mut rows = stmt.query(params![])?;
    while let Some(row) = rows.next()? {
        let id: i64 = row.get(0)?;
        let ident: String = row.get(1)?;
        let next_id: i64 = row.get(2)?;
        map.insert(ident.clone(), Partition::new(id as u16, ident, next_id));
    }
    Ok(map)
}
