// Copyright 2018 Quint developers
//
// Licensed under the Apache License, Version 2.0 (the "License"); you may not use
// this file except in compliance with the License. You may obtain a copy of the
// License at http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software distributed
// under the License is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR
// CONDITIONS OF ANY KIND, either express or implied. See the License for the
// specific language governing permissions and limitations under the License.

//! Reconstructing the in-memory `Schema` from datoms.
//!
//! The store is self-describing: everything here is ordinary reads of the
//! system attribute relations, filtered to current visibility.  An entity is
//! an attribute iff it carries a `db/valueType` datom; it is a view iff it
//! carries a `db.view/ident` datom.

use std::collections::BTreeMap;

use rusqlite;

use quint_core::{
    Attribute,
    Entid,
    Schema,
    View,
};

use entids;
use errors::{
    ErrorKind,
    Result,
};

fn read_text_pairs(conn: &rusqlite::Connection, table: &str) -> Result<Vec<(Entid, String)>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT e, v_typed FROM {} WHERE retracted_by IS NULL ORDER BY e, v_typed",
        table
    ))?;
    let mut pairs = vec![];
    let mut rows = stmt.query(params![])?;
    while let Some(row) = rows.next()? {
        pairs.push((row.get(0)?, row.get(1)?));
    }
    Ok(pairs)
}

fn read_ref_pairs(conn: &rusqlite::Connection, table: &str) -> Result<Vec<(Entid, Entid)>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT e, v_typed FROM {} WHERE retracted_by IS NULL ORDER BY e, v_typed",
        table
    ))?;
    let mut pairs = vec![];
    let mut rows = stmt.query(params![])?;
    while let Some(row) = rows.next()? {
        pairs.push((row.get(0)?, row.get(1)?));
    }
    Ok(pairs)
}

/// Read the current schema out of the store.
pub fn read_schema(conn: &rusqlite::Connection) -> Result<Schema> {
    let mut schema = Schema::default();

    for (entid, ident) in read_text_pairs(conn, "attr_db_ident")? {
        schema.add_ident(entid, ident);
    }

    let value_types: BTreeMap<Entid, Entid> =
        read_ref_pairs(conn, "attr_db_value_type")?.into_iter().collect();
    let cardinalities: BTreeMap<Entid, Entid> =
        read_ref_pairs(conn, "attr_db_cardinality")?.into_iter().collect();
    let uniques: BTreeMap<Entid, Entid> =
        read_ref_pairs(conn, "attr_db_unique")?.into_iter().collect();
    let docs: BTreeMap<Entid, String> =
        read_text_pairs(conn, "attr_db_doc")?.into_iter().collect();

    for (entid, type_ref) in value_types {
        let ident = match schema.ident_for_entid(entid) {
            Some(ident) => ident.clone(),
            None => bail!(ErrorKind::UnknownAttribute(entid.to_string())),
        };
        let value_type = entids::value_type_from_entid(type_ref)
            .ok_or_else(|| ErrorKind::UnknownValueType(type_ref.to_string()))?;
        let cardinality = cardinalities
            .get(&entid)
            .and_then(|c| entids::cardinality_from_entid(*c))
            .ok_or_else(|| ErrorKind::UnknownCardinality(ident.clone()))?;
        let unique = match uniques.get(&entid) {
            Some(u) => Some(
                entids::unique_from_entid(*u)
                    .ok_or_else(|| ErrorKind::UnknownUnique(ident.clone()))?,
            ),
            None => None,
        };

        let mut attribute = Attribute::new(ident, value_type);
        attribute.cardinality = cardinality;
        attribute.unique = unique;
        attribute.doc = docs.get(&entid).cloned();
        schema.attribute_map.insert(entid, attribute);
    }

    let mut required: BTreeMap<Entid, Vec<Entid>> = BTreeMap::new();
    for (entid, attribute) in read_ref_pairs(conn, "attr_db_view_attributes")? {
        required.entry(entid).or_insert_with(Vec::new).push(attribute);
    }
    let mut optional: BTreeMap<Entid, Vec<Entid>> = BTreeMap::new();
    for (entid, attribute) in read_ref_pairs(conn, "attr_db_view_optional_attributes")? {
        optional.entry(entid).or_insert_with(Vec::new).push(attribute);
    }
    let view_docs: BTreeMap<Entid, String> =
        read_text_pairs(conn, "attr_db_view_doc")?.into_iter().collect();

    for (entid, name) in read_text_pairs(conn, "attr_db_view_ident")? {
        let view = View {
            id: entid,
            name: name.clone(),
            required: required.get(&entid).cloned().unwrap_or_else(Vec::new),
            optional: optional.get(&entid).cloned().unwrap_or_else(Vec::new),
            doc: view_docs.get(&entid).cloned(),
        };
        schema.view_map.insert(name, view);
    }

    Ok(schema)
}
