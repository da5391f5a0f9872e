// Copyright 2018 Quint developers
//
// Licensed under the Apache License, Version 2.0 (the "License"); you may not use
// this file except in compliance with the License. You may obtain a copy of the
// License at http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software distributed
// under the License is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR
// CONDITIONS OF ANY KIND, either express or implied. See the License for the
// specific language governing permissions and limitations under the License.

//! The attribute registry.
//!
//! Declaring an attribute writes its definition datoms and provisions its
//! typed storage relation in one step, inside the caller's host transaction.
//! The registry also owns the read-only introspection views: the store
//! describes itself, and these are just projections of the system attribute
//! relations.  (Declaration itself is a Rust entry point rather than view
//! DML: provisioning storage is DDL, which trigger bodies cannot run.)

use rusqlite;

use quint_core::{
    Attribute,
    Cardinality,
    Entid,
    Schema,
    TypedValue,
    Unique,
    ValueType,
};

use allocator;
use datoms;
use entids;
use errors::{
    ErrorKind,
    Result,
};
use relation::{
    self,
    RelationSpec,
};

/// Resolve a string-typed declaration, as arriving from an admin surface.
/// Fails before anything is written.
pub fn attribute_from_strings(
    ident: &str,
    value_type: &str,
    cardinality: &str,
    unique: Option<&str>,
    doc: Option<&str>,
) -> Result<Attribute> {
    let value_type = ValueType::from_name(value_type)
        .ok_or_else(|| ErrorKind::UnknownValueType(value_type.to_string()))?;
    let cardinality = Cardinality::from_name(cardinality)
        .ok_or_else(|| ErrorKind::UnknownCardinality(cardinality.to_string()))?;
    let unique = match unique {
        Some(name) => Some(
            Unique::from_name(name).ok_or_else(|| ErrorKind::UnknownUnique(name.to_string()))?,
        ),
        None => None,
    };

    let mut attribute = Attribute::new(ident, value_type);
    attribute.cardinality = cardinality;
    attribute.unique = unique;
    attribute.doc = doc.map(|d| d.to_string());
    Ok(attribute)
}

/// Declare an attribute: allocate its entity, assert its definition datoms,
/// and provision its storage relation plus indexes.
///
/// The caller owns the enclosing host transaction and folds the returned
/// entid into its schema after commit.
pub fn define_attribute(
    conn: &rusqlite::Connection,
    schema: &Schema,
    attribute: &Attribute,
) -> Result<Entid> {
    if schema.entid_for_ident(&attribute.ident).is_some() {
        bail!(ErrorKind::IdentAlreadyDefined(attribute.ident.clone()));
    }

    let entity = allocator::allocate_entity(conn, allocator::PARTITION_DB)?;
    let tx = allocator::new_transaction(conn)?;

    datoms::assert_datom(
        conn,
        schema,
        entity,
        entids::DB_IDENT,
        &TypedValue::text(attribute.ident.clone()),
        tx,
    )?;
    datoms::assert_datom(
        conn,
        schema,
        entity,
        entids::DB_VALUE_TYPE,
        &TypedValue::Ref(entids::value_type_entid(attribute.value_type)),
        tx,
    )?;
    datoms::assert_datom(
        conn,
        schema,
        entity,
        entids::DB_CARDINALITY,
        &TypedValue::Ref(entids::cardinality_entid(attribute.cardinality)),
        tx,
    )?;
    if let Some(unique) = attribute.unique {
        datoms::assert_datom(
            conn,
            schema,
            entity,
            entids::DB_UNIQUE,
            &TypedValue::Ref(entids::unique_entid(unique)),
            tx,
        )?;
    }
    if let Some(ref doc) = attribute.doc {
        datoms::assert_datom(
            conn,
            schema,
            entity,
            entids::DB_DOC,
            &TypedValue::text(doc.clone()),
            tx,
        )?;
    }

    let spec = RelationSpec::for_attribute(&attribute.ident, entity, attribute.value_type);
    relation::create_relation(conn, &spec)?;
    relation::regenerate_datoms_view(conn)?;

    info!("defined attribute {} as {}", attribute.ident, entity);
    Ok(entity)
}

/// Create the read-only introspection views.  Run once at bootstrap; the
/// definitions are stable because they only name the system relations.
pub fn create_introspection_views(conn: &rusqlite::Connection) -> Result<()> {
    conn.execute_batch(
        r#"
CREATE VIEW attributes AS
SELECT i.e AS id,
       i.v_typed AS ident,
       (SELECT ti.v_typed FROM attr_db_ident ti
         WHERE ti.e = vt.v_typed AND ti.retracted_by IS NULL) AS value_type,
       (SELECT ci.v_typed FROM attr_db_ident ci
         WHERE ci.e = c.v_typed AND ci.retracted_by IS NULL) AS cardinality,
       (SELECT ui.v_typed FROM attr_db_ident ui
         WHERE ui.e = u.v_typed AND ui.retracted_by IS NULL) AS "unique",
       d.v_typed AS doc
FROM attr_db_ident i
JOIN attr_db_value_type vt ON vt.e = i.e AND vt.retracted_by IS NULL
JOIN attr_db_cardinality c ON c.e = i.e AND c.retracted_by IS NULL
LEFT JOIN attr_db_unique u ON u.e = i.e AND u.retracted_by IS NULL
LEFT JOIN attr_db_doc d ON d.e = i.e AND d.retracted_by IS NULL
WHERE i.retracted_by IS NULL;

CREATE VIEW views AS
SELECT v.e AS id,
       v.v_typed AS name,
       d.v_typed AS doc
FROM attr_db_view_ident v
LEFT JOIN attr_db_view_doc d ON d.e = v.e AND d.retracted_by IS NULL
WHERE v.retracted_by IS NULL;

CREATE VIEW view_attributes AS
SELECT v.e AS view_id,
       v.v_typed AS view_name,
       a.v_typed AS attribute_id,
       i.v_typed AS attribute,
       1 AS required
FROM attr_db_view_ident v
JOIN attr_db_view_attributes a ON a.e = v.e AND a.retracted_by IS NULL
JOIN attr_db_ident i ON i.e = a.v_typed AND i.retracted_by IS NULL
WHERE v.retracted_by IS NULL
UNION ALL
SELECT v.e,
       v.v_typed,
       o.v_typed,
       i.v_typed,
       0
FROM attr_db_view_ident v
JOIN attr_db_view_optional_attributes o ON o.e = v.e AND o.retracted_by IS NULL
JOIN attr_db_ident i ON i.e = o.v_typed AND i.retracted_by IS NULL
WHERE v.retracted_by IS NULL;

CREATE VIEW defined_attributes AS
SELECT ident, value_type, cardinality, "unique", doc FROM attributes;

CREATE VIEW defined_views AS
SELECT v.name AS name,
       (SELECT json_group_array(va.attribute) FROM view_attributes va
         WHERE va.view_id = v.id AND va.required = 1) AS required_attributes,
       (SELECT json_group_array(va.attribute) FROM view_attributes va
         WHERE va.view_id = v.id AND va.required = 0) AS optional_attributes,
       v.doc AS doc
FROM views v;
"#,
    )?;
    Ok(())
}
