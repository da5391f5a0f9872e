// Copyright 2018 Quint developers
//
// Licensed under the Apache License, Version 2.0 (the "License"); you may not use
// this file except in compliance with the License. You may obtain a copy of the
// License at http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software distributed
// under the License is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR
// CONDITIONS OF ANY KIND, either express or implied. See the License for the
// specific language governing permissions and limitations under the License.

//! Schema-as-data bootstrap.
//!
//! A fresh store is seeded with a fixed set of system entities so that it
//! describes itself: the attributes that define attributes (`db/ident`,
//! `db/valueType`, …), the attributes that define views, and the enum
//! entities for value types, cardinalities and uniqueness kinds.  All of it is
//! written as ordinary datoms carrying transaction 0, into the same attribute
//! relations user data will use.  From then on `attr_id` is a datom lookup.

use chrono::{
    SecondsFormat,
    Utc,
};
use rusqlite;

use quint_core::{
    Attribute,
    Entid,
    Schema,
    TypedValue,
    Unique,
    ValueType,
};

use allocator;
use datoms;
use entids;
use errors::Result;
use registry;
use relation::{
    self,
    RelationSpec,
};

/// Bumped when the persisted layout changes; gates `bootstrap` on open.
pub const CURRENT_VERSION: i64 = 1;

lazy_static! {
    /// The system attributes, keyed by their fixed entids.
    pub static ref SYSTEM_ATTRIBUTES: Vec<(Entid, Attribute)> = {
        vec![
            (entids::DB_IDENT,
             Attribute::new("db/ident", ValueType::Text)
                 .unique(Unique::Identity)
                 .doc("The unique namespaced name of an entity.")),
            (entids::DB_VALUE_TYPE,
             Attribute::new("db/valueType", ValueType::Ref)),
            (entids::DB_CARDINALITY,
             Attribute::new("db/cardinality", ValueType::Ref)),
            (entids::DB_UNIQUE,
             Attribute::new("db/unique", ValueType::Ref)),
            (entids::DB_DOC,
             Attribute::new("db/doc", ValueType::Text)),
            (entids::DB_VIEW_IDENT,
             Attribute::new("db.view/ident", ValueType::Text)
                 .unique(Unique::Identity)),
            (entids::DB_VIEW_ATTRIBUTES,
             Attribute::new("db.view/attributes", ValueType::Ref).many()),
            (entids::DB_VIEW_DOC,
             Attribute::new("db.view/doc", ValueType::Text)),
            (entids::DB_VIEW_OPTIONAL_ATTRIBUTES,
             Attribute::new("db.view/optional-attributes", ValueType::Ref).many()),
        ]
    };
}

/// The idents of the bootstrap enum entities.
fn system_idents() -> Vec<(Entid, String)> {
    let mut idents = vec![];
    for value_type in ValueType::all() {
        idents.push((entids::value_type_entid(*value_type), value_type.ident()));
    }
    idents.push((entids::DB_CARDINALITY_ONE, "db.cardinality/one".to_string()));
    idents.push((entids::DB_CARDINALITY_MANY, "db.cardinality/many".to_string()));
    idents.push((entids::DB_UNIQUE_IDENTITY, "db.unique/identity".to_string()));
    idents.push((entids::DB_UNIQUE_VALUE, "db.unique/value".to_string()));
    idents
}

/// The fixed system schema, as it stands immediately after bootstrap.
pub fn bootstrap_schema() -> Schema {
    let mut schema = Schema::default();
    for &(entid, ref attribute) in SYSTEM_ATTRIBUTES.iter() {
        schema.add_attribute(entid, attribute.clone());
    }
    for (entid, ident) in system_idents() {
        schema.add_ident(entid, ident);
    }
    schema
}

/// Bootstrap the store behind a version gate.  Safe to call on every open;
/// an already-seeded store is left untouched.
pub fn ensure_bootstrapped(conn: &rusqlite::Connection) -> Result<()> {
    let version: i64 = conn.query_row("PRAGMA user_version", params![], |row| row.get(0))?;
    if version >= CURRENT_VERSION {
        return Ok(());
    }

    let tx = conn.unchecked_transaction()?;
    bootstrap(&tx)?;
    tx.execute(&format!("PRAGMA user_version = {}", CURRENT_VERSION), params![])?;
    tx.commit()?;
    info!("bootstrapped a fresh store at version {}", CURRENT_VERSION);
    Ok(())
}

fn bootstrap(conn: &rusqlite::Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE partitions (
             id INTEGER NOT NULL PRIMARY KEY,
             ident TEXT NOT NULL UNIQUE,
             next_id INTEGER NOT NULL
         );
         CREATE TABLE transactions (
             id INTEGER NOT NULL PRIMARY KEY,
             instant TEXT NOT NULL
         );",
    )?;

    // Storage for the system attributes themselves.
    for &(entid, ref attribute) in SYSTEM_ATTRIBUTES.iter() {
        let spec = RelationSpec::for_attribute(&attribute.ident, entid, attribute.value_type);
        relation::create_relation(conn, &spec)?;
    }
    relation::regenerate_datoms_view(conn)?;

    // Transaction 0 carries every system datom.
    let instant = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
    conn.execute(
        "INSERT INTO transactions (id, instant) VALUES (?1, ?2)",
        params![entids::TX0, instant],
    )?;

    // The three partitions.  `db` has already spent its low id space on the
    // system entities above, so its counter starts past them.
    conn.execute(
        "INSERT INTO partitions (id, ident, next_id) VALUES
             (0, ?1, ?2), (1, ?3, 0), (2, ?4, 0)",
        params![
            allocator::PARTITION_DB,
            entids::DB_PARTITION_NEXT_ID,
            allocator::PARTITION_TX,
            allocator::PARTITION_USER
        ],
    )?;

    let schema = bootstrap_schema();

    for &(entid, ref attribute) in SYSTEM_ATTRIBUTES.iter() {
        datoms::assert_datom(
            conn,
            &schema,
            entid,
            entids::DB_IDENT,
            &TypedValue::text(attribute.ident.clone()),
            entids::TX0,
        )?;
        datoms::assert_datom(
            conn,
            &schema,
            entid,
            entids::DB_VALUE_TYPE,
            &TypedValue::Ref(entids::value_type_entid(attribute.value_type)),
            entids::TX0,
        )?;
        datoms::assert_datom(
            conn,
            &schema,
            entid,
            entids::DB_CARDINALITY,
            &TypedValue::Ref(entids::cardinality_entid(attribute.cardinality)),
            entids::TX0,
        )?;
        if let Some(unique) = attribute.unique {
            datoms::assert_datom(
                conn,
                &schema,
                entid,
                entids::DB_UNIQUE,
                &TypedValue::Ref(entids::unique_entid(unique)),
                entids::TX0,
            )?;
        }
        if let Some(ref doc) = attribute.doc {
            datoms::assert_datom(
                conn,
                &schema,
                entid,
                entids::DB_DOC,
                &TypedValue::text(doc.clone()),
                entids::TX0,
            )?;
        }
    }

    for (entid, ident) in system_idents() {
        datoms::assert_datom(
            conn,
            &schema,
            entid,
            entids::DB_IDENT,
            &TypedValue::text(ident),
            entids::TX0,
        )?;
    }

    registry::create_introspection_views(conn)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use new_connection;
    use schema::read_schema;

    fn fresh() -> rusqlite::Connection {
        let conn = new_connection("").expect("opened");
        ensure_bootstrapped(&conn).expect("bootstrapped");
        conn
    }

    #[test]
    fn test_fixed_entids() {
        let conn = fresh();
        let schema = read_schema(&conn).expect("schema");
        assert_eq!(Some(1), schema.entid_for_ident("db/ident"));
        assert_eq!(Some(112), schema.entid_for_ident("db.type/ref"));
        assert_eq!(Some(201), schema.entid_for_ident("db.cardinality/many"));
        assert_eq!(Some(210), schema.entid_for_ident("db.unique/identity"));
    }

    #[test]
    fn test_idempotent() {
        let conn = fresh();
        ensure_bootstrapped(&conn).expect("second call is a no-op");
        let count: i64 = conn
            .query_row("SELECT count(*) FROM transactions", params![], |row| row.get(0))
            .expect("count");
        assert_eq!(1, count);
    }

    #[test]
    fn test_all_system_datoms_carry_tx0() {
        let conn = fresh();
        let stray: i64 = conn
            .query_row("SELECT count(*) FROM datoms WHERE tx != 0", params![], |row| row.get(0))
            .expect("count");
        assert_eq!(0, stray);
    }

    #[test]
    fn test_schema_round_trips_through_datoms() {
        let conn = fresh();
        let read = read_schema(&conn).expect("schema");
        let seeded = bootstrap_schema();
        assert_eq!(seeded.ident_map, read.ident_map);
        assert_eq!(seeded.entid_map, read.entid_map);
        assert_eq!(seeded.attribute_map, read.attribute_map);
    }

    #[test]
    fn test_introspection_views_exist() {
        let conn = fresh();
        for view in &["attributes", "views", "view_attributes", "defined_attributes", "defined_views", "datoms"] {
            let count: i64 = conn
                .query_row(
                    "SELECT count(*) FROM sqlite_master WHERE type = 'view' AND name = ?1",
                    params![view],
                    |row| row.get(0),
                )
                .expect("count");
            assert_eq!(1, count, "missing view {}", view);
        }
    }
}
