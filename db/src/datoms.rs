// Copyright 2018 Quint developers
//
// Licensed under the Apache License, Version 2.0 (the "License"); you may not use
// this file except in compliance with the License. You may obtain a copy of the
// License at http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software distributed
// under the License is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR
// CONDITIONS OF ANY KIND, either express or implied. See the License for the
// specific language governing permissions and limitations under the License.

//! The write surface of the datom store.
//!
//! A datom is created by assertion and thereafter immutable save for one
//! transition: `retracted_by` may be set once, from absent to a later
//! transaction.  That discipline is enforced here by API shape: there is no
//! entry point that updates anything else, and retractions filter on
//! `retracted_by IS NULL`, which also makes them idempotent.

use rusqlite;

use quint_core::{
    Entid,
    Schema,
    TypedValue,
};

use codec;
use errors::{
    ErrorKind,
    Result,
};
use relation;

/// Look up the attribute definition for `a`, failing with `UnknownAttribute`.
fn require_attribute<'a>(schema: &'a Schema, a: Entid) -> Result<&'a ::quint_core::Attribute> {
    schema.attribute_for_entid(a).ok_or_else(|| {
        let shown = schema
            .ident_for_entid(a)
            .cloned()
            .unwrap_or_else(|| a.to_string());
        ErrorKind::UnknownAttribute(shown).into()
    })
}

/// Assert a datom: insert `(e, a, v, tx)` into the attribute's relation with
/// no `retracted_by`.
pub fn assert_datom(
    conn: &rusqlite::Connection,
    schema: &Schema,
    e: Entid,
    a: Entid,
    v: &TypedValue,
    tx: Entid,
) -> Result<()> {
    let attribute = require_attribute(schema, a)?;
    if attribute.value_type != v.value_type() {
        bail!(ErrorKind::ValueTypeMismatch(
            attribute.ident.clone(),
            attribute.value_type.ident(),
            v.value_type().ident(),
        ));
    }

    let raw = codec::encode(v);
    let table = relation::table_name(&attribute.ident);
    conn.execute(
        &format!("INSERT INTO {} (e, a, v_raw, tx) VALUES (?1, ?2, ?3, ?4)", table),
        params![e, a, raw, tx],
    )?;
    Ok(())
}

/// Retract every current datom for `(e, a)`.  Returns the number retracted;
/// already-retracted rows are left untouched.
pub fn retract_current(
    conn: &rusqlite::Connection,
    schema: &Schema,
    e: Entid,
    a: Entid,
    tx: Entid,
) -> Result<usize> {
    let attribute = require_attribute(schema, a)?;
    let table = relation::table_name(&attribute.ident);
    let retracted = conn.execute(
        &format!(
            "UPDATE {} SET retracted_by = ?1 WHERE e = ?2 AND retracted_by IS NULL",
            table
        ),
        params![tx, e],
    )?;
    Ok(retracted)
}

/// Retract the current datom for `(e, a, v)`, if any.
pub fn retract_value(
    conn: &rusqlite::Connection,
    schema: &Schema,
    e: Entid,
    a: Entid,
    v: &TypedValue,
    tx: Entid,
) -> Result<usize> {
    let attribute = require_attribute(schema, a)?;
    let table = relation::table_name(&attribute.ident);
    let raw = codec::encode(v);
    let retracted = conn.execute(
        &format!(
            "UPDATE {} SET retracted_by = ?1 \
             WHERE e = ?2 AND v_raw = ?3 AND retracted_by IS NULL",
            table
        ),
        params![tx, e, raw],
    )?;
    Ok(retracted)
}

/// The current values for `(e, a)`, decoded.  Zero or one for a
/// cardinality-one attribute.
pub fn current_values(
    conn: &rusqlite::Connection,
    schema: &Schema,
    e: Entid,
    a: Entid,
) -> Result<Vec<TypedValue>> {
    let attribute = require_attribute(schema, a)?;
    let table = relation::table_name(&attribute.ident);
    let mut stmt = conn.prepare(&format!(
        "SELECT v_raw FROM {} WHERE e = ?1 AND retracted_by IS NULL ORDER BY v_raw",
        table
    ))?;
    let mut values = vec![];
    let mut rows = stmt.query(params![e])?;
    while let Some(row) = rows.next()? {
        let raw: String = row.get(0)?;
        values.push(codec::decode(attribute.value_type, &raw)?);
    }
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;

    use allocator;
    use bootstrap;
    use entids;
    use new_connection;

    fn fresh() -> (rusqlite::Connection, Schema) {
        let conn = new_connection("").expect("opened");
        bootstrap::ensure_bootstrapped(&conn).expect("bootstrapped");
        let schema = ::schema::read_schema(&conn).expect("schema");
        (conn, schema)
    }

    #[test]
    fn test_assert_and_retract_once() {
        let (conn, schema) = fresh();
        let e = allocator::allocate_entity(&conn, allocator::PARTITION_USER).expect("e");
        let t1 = allocator::new_transaction(&conn).expect("t1");

        // `db/doc` is a convenient text attribute that exists from bootstrap.
        assert_datom(&conn, &schema, e, entids::DB_DOC, &TypedValue::text("a note"), t1)
            .expect("asserted");
        assert_eq!(
            vec![TypedValue::text("a note")],
            current_values(&conn, &schema, e, entids::DB_DOC).expect("current")
        );

        let t2 = allocator::new_transaction(&conn).expect("t2");
        assert_eq!(1, retract_current(&conn, &schema, e, entids::DB_DOC, t2).expect("retracted"));
        assert!(current_values(&conn, &schema, e, entids::DB_DOC).expect("current").is_empty());

        // Retraction is idempotent: nothing current remains to touch.
        let t3 = allocator::new_transaction(&conn).expect("t3");
        assert_eq!(0, retract_current(&conn, &schema, e, entids::DB_DOC, t3).expect("retracted"));

        // The retracted datom still exists, pinned to its retracting tx.
        let (tx, retracted_by): (i64, Option<i64>) = conn
            .query_row(
                "SELECT tx, retracted_by FROM attr_db_doc WHERE e = ?1",
                params![e],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .expect("row");
        assert_eq!(t1, tx);
        assert_eq!(Some(t2), retracted_by);
    }

    #[test]
    fn test_type_mismatch() {
        let (conn, schema) = fresh();
        let e = allocator::allocate_entity(&conn, allocator::PARTITION_USER).expect("e");
        let t = allocator::new_transaction(&conn).expect("t");
        match assert_datom(&conn, &schema, e, entids::DB_DOC, &TypedValue::Int8(7), t) {
            Err(::errors::Error(ErrorKind::ValueTypeMismatch(attribute, expected, got), _)) => {
                assert_eq!("db/doc", attribute);
                assert_eq!("db.type/text", expected);
                assert_eq!("db.type/int8", got);
            },
            x => panic!("expected ValueTypeMismatch, got {:?}", x),
        }
    }

    #[test]
    fn test_unknown_attribute() {
        let (conn, schema) = fresh();
        let t = allocator::new_transaction(&conn).expect("t");
        assert!(assert_datom(&conn, &schema, 99, 98765, &TypedValue::text("x"), t).is_err());
    }
}
