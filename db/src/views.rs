// Copyright 2018 Quint developers
//
// Licensed under the Apache License, Version 2.0 (the "License"); you may not use
// this file except in compliance with the License. You may obtain a copy of the
// License at http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software distributed
// under the License is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR
// CONDITIONS OF ANY KIND, either express or implied. See the License for the
// specific language governing permissions and limitations under the License.

//! The view registry: defining, updating and deleting stored views.
//!
//! A view definition is an entity carrying `db.view/*` datoms.  Every
//! mutation here follows the retraction protocol: superseded definition
//! facts are retracted, never deleted, so the schema's own history stays
//! queryable, and ends by regenerating the view's SQL objects from the
//! current definition.

use rusqlite;

use quint_core::{
    Entid,
    Schema,
    TypedValue,
    View,
    ViewDefinition,
    ViewUpdate,
};

use allocator;
use datoms;
use entids;
use errors::{
    ErrorKind,
    Result,
};
use view;

fn resolve_idents(schema: &Schema, idents: &[String]) -> Result<Vec<Entid>> {
    let mut entids = vec![];
    for ident in idents {
        let (entid, _) = schema
            .attribute_for_ident(ident)
            .ok_or_else(|| ErrorKind::UnknownAttribute(ident.clone()))?;
        entids.push(entid);
    }
    Ok(entids)
}

/// Define a view: allocate its entity, assert its definition datoms, and
/// compile its SQL objects.  Fatal if the definition has no required
/// attributes.  The caller owns the host transaction and folds the returned
/// `View` into its schema after commit.
pub fn define_view(
    conn: &rusqlite::Connection,
    schema: &Schema,
    definition: &ViewDefinition,
) -> Result<View> {
    if definition.required.is_empty() {
        bail!(ErrorKind::ViewHasNoRequiredAttributes(definition.name.clone()));
    }
    if schema.view(&definition.name).is_some() {
        bail!(ErrorKind::IdentAlreadyDefined(definition.name.clone()));
    }

    let required = resolve_idents(schema, &definition.required)?;
    let optional = resolve_idents(schema, &definition.optional)?;

    let entity = allocator::allocate_entity(conn, allocator::PARTITION_DB)?;
    let tx = allocator::new_transaction(conn)?;

    datoms::assert_datom(
        conn,
        schema,
        entity,
        entids::DB_VIEW_IDENT,
        &TypedValue::text(definition.name.clone()),
        tx,
    )?;
    for attribute in &required {
        datoms::assert_datom(
            conn,
            schema,
            entity,
            entids::DB_VIEW_ATTRIBUTES,
            &TypedValue::Ref(*attribute),
            tx,
        )?;
    }
    for attribute in &optional {
        datoms::assert_datom(
            conn,
            schema,
            entity,
            entids::DB_VIEW_OPTIONAL_ATTRIBUTES,
            &TypedValue::Ref(*attribute),
            tx,
        )?;
    }
    if let Some(ref doc) = definition.doc {
        datoms::assert_datom(
            conn,
            schema,
            entity,
            entids::DB_VIEW_DOC,
            &TypedValue::text(doc.clone()),
            tx,
        )?;
    }

    let view = View {
        id: entity,
        name: definition.name.clone(),
        required: required,
        optional: optional,
        doc: definition.doc.clone(),
    };
    view::regenerate(conn, schema, &view)?;

    info!("defined view {} as {}", view.name, entity);
    Ok(view)
}

/// Apply a partial update to a stored view, retracting superseded definition
/// datoms and regenerating the SQL objects.
pub fn update_view(
    conn: &rusqlite::Connection,
    schema: &Schema,
    name: &str,
    update: &ViewUpdate,
) -> Result<View> {
    let mut view = schema
        .view(name)
        .cloned()
        .ok_or_else(|| ErrorKind::UnknownView(name.to_string()))?;

    let tx = allocator::new_transaction(conn)?;

    if let Some(ref new_name) = update.name {
        if *new_name != view.name {
            if schema.view(new_name).is_some() {
                bail!(ErrorKind::IdentAlreadyDefined(new_name.clone()));
            }
            datoms::retract_current(conn, schema, view.id, entids::DB_VIEW_IDENT, tx)?;
            datoms::assert_datom(
                conn,
                schema,
                view.id,
                entids::DB_VIEW_IDENT,
                &TypedValue::text(new_name.clone()),
                tx,
            )?;
            // The compiled objects carry the old name; drop them now, the
            // regeneration below recreates them under the new one.
            for statement in view::drop_statements(&view.name) {
                conn.execute(&statement, params![])?;
            }
            view.name = new_name.clone();
        }
    }

    if let Some(ref required) = update.required {
        let required = resolve_idents(schema, required)?;
        datoms::retract_current(conn, schema, view.id, entids::DB_VIEW_ATTRIBUTES, tx)?;
        for attribute in &required {
            datoms::assert_datom(
                conn,
                schema,
                view.id,
                entids::DB_VIEW_ATTRIBUTES,
                &TypedValue::Ref(*attribute),
                tx,
            )?;
        }
        view.required = required;
    }

    if let Some(ref optional) = update.optional {
        let optional = resolve_idents(schema, optional)?;
        datoms::retract_current(conn, schema, view.id, entids::DB_VIEW_OPTIONAL_ATTRIBUTES, tx)?;
        for attribute in &optional {
            datoms::assert_datom(
                conn,
                schema,
                view.id,
                entids::DB_VIEW_OPTIONAL_ATTRIBUTES,
                &TypedValue::Ref(*attribute),
                tx,
            )?;
        }
        view.optional = optional;
    }

    if let Some(ref doc) = update.doc {
        datoms::retract_current(conn, schema, view.id, entids::DB_VIEW_DOC, tx)?;
        datoms::assert_datom(
            conn,
            schema,
            view.id,
            entids::DB_VIEW_DOC,
            &TypedValue::text(doc.clone()),
            tx,
        )?;
        view.doc = Some(doc.clone());
    }

    view::regenerate(conn, schema, &view)?;
    Ok(view)
}

/// Delete a view: retract its definition datoms and drop its SQL objects.
/// The definition's history remains queryable.
pub fn delete_view(conn: &rusqlite::Connection, schema: &Schema, name: &str) -> Result<Entid> {
    let view = schema
        .view(name)
        .cloned()
        .ok_or_else(|| ErrorKind::UnknownView(name.to_string()))?;

    let tx = allocator::new_transaction(conn)?;
    for attribute in &[
        entids::DB_VIEW_IDENT,
        entids::DB_VIEW_ATTRIBUTES,
        entids::DB_VIEW_OPTIONAL_ATTRIBUTES,
        entids::DB_VIEW_DOC,
    ] {
        datoms::retract_current(conn, schema, view.id, *attribute, tx)?;
    }

    for statement in view::drop_statements(&view.name) {
        conn.execute(&statement, params![])?;
    }

    info!("deleted view {}", view.name);
    Ok(view.id)
}

#[cfg(test)]
mod tests {
    use super::*;

    use quint_core::{
        Attribute,
        ValueType,
    };

    use bootstrap;
    use new_connection;
    use registry;
    use schema::read_schema;
    use visibility::{
        self,
        AsOf,
    };

    /// A bootstrapped connection with a registered as-of cell and a person
    /// schema: name (text, one), email (text, one, identity), tag (text,
    /// many), plus a `persons` view over name+email with tag optional.
    fn person_fixture() -> (rusqlite::Connection, Schema, AsOf) {
        let _ = ::env_logger::try_init();

        let conn = new_connection("").expect("opened");
        bootstrap::ensure_bootstrapped(&conn).expect("bootstrapped");
        let as_of = AsOf::new();
        visibility::register(&conn, &as_of).expect("registered");

        let mut schema = read_schema(&conn).expect("schema");
        for attribute in &[
            Attribute::new("person/name", ValueType::Text),
            Attribute::new("person/email", ValueType::Text)
                .unique(::quint_core::Unique::Identity),
            Attribute::new("person/tag", ValueType::Text).many(),
        ] {
            let entity = registry::define_attribute(&conn, &schema, attribute).expect("defined");
            schema.add_attribute(entity, attribute.clone());
        }

        let definition = ViewDefinition::new("persons", &["person/name", "person/email"])
            .optional(&["person/tag"]);
        let view = define_view(&conn, &schema, &definition).expect("view defined");
        schema.view_map.insert(view.name.clone(), view);

        (conn, schema, as_of)
    }

    fn count(conn: &rusqlite::Connection, sql: &str) -> i64 {
        conn.query_row(sql, params![], |row| row.get(0)).expect("counted")
    }

    #[test]
    fn test_compiled_objects_exist() {
        let (conn, _schema, _as_of) = person_fixture();
        for name in &["persons", "persons_current", "persons_history"] {
            assert_eq!(
                1,
                count(&conn, &format!(
                    "SELECT count(*) FROM sqlite_master WHERE type = 'view' AND name = '{}'",
                    name
                )),
                "missing view {}", name
            );
        }
        assert_eq!(
            6,
            count(&conn, "SELECT count(*) FROM sqlite_master WHERE type = 'trigger' \
                          AND name LIKE 'persons%'")
        );

        // A fresh view is empty.
        assert_eq!(0, count(&conn, "SELECT count(*) FROM persons"));
    }

    #[test]
    fn test_insert_update_delete_round_trip() {
        let (conn, _schema, as_of) = person_fixture();

        conn.execute(
            "INSERT INTO persons (name, email) VALUES (?1, ?2)",
            params!["Alice", "a@x"],
        ).expect("inserted");
        let t1 = allocator::latest_transaction(&conn).expect("latest").expect("some");
        let id: i64 = conn
            .query_row("SELECT id FROM persons WHERE email = 'a@x'", params![], |row| row.get(0))
            .expect("id");
        assert_eq!((2 << 48) | 1, id);
        assert_eq!(
            id,
            allocator::last_allocated(&conn, allocator::PARTITION_USER).expect("last")
        );

        conn.execute("UPDATE persons SET name = ?1 WHERE id = ?2", params!["Alicia", id])
            .expect("updated");
        let t2 = allocator::latest_transaction(&conn).expect("latest").expect("some");
        assert!(t2 > t1);

        let name: String = conn
            .query_row("SELECT name FROM persons WHERE id = ?1", params![id], |row| row.get(0))
            .expect("name");
        assert_eq!("Alicia", name);

        // As of t1 the old value is still visible.
        as_of.set(Some(t1));
        let name: String = conn
            .query_row("SELECT name FROM persons WHERE id = ?1", params![id], |row| row.get(0))
            .expect("name");
        assert_eq!("Alice", name);
        as_of.set(None);

        // Deleting hides the row now but not in history.
        conn.execute("DELETE FROM persons WHERE id = ?1", params![id]).expect("deleted");
        assert_eq!(0, count(&conn, "SELECT count(*) FROM persons"));
        as_of.set(Some(t2));
        assert_eq!(1, count(&conn, "SELECT count(*) FROM persons"));
        as_of.set(None);
        assert_eq!(0, count(&conn, "SELECT count(*) FROM persons"));
    }

    #[test]
    fn test_unchanged_update_writes_no_datom() {
        let (conn, _schema, _as_of) = person_fixture();
        conn.execute(
            "INSERT INTO persons (name, email) VALUES (?1, ?2)",
            params!["Alice", "a@x"],
        ).expect("inserted");

        let before = count(&conn, "SELECT count(*) FROM attr_person_name");
        conn.execute("UPDATE persons SET name = name WHERE email = 'a@x'", params![])
            .expect("updated");
        assert_eq!(before, count(&conn, "SELECT count(*) FROM attr_person_name"));
        assert_eq!(0, count(&conn, "SELECT count(*) FROM attr_person_name \
                                    WHERE retracted_by IS NOT NULL"));
    }

    #[test]
    fn test_null_optional_inserts_no_datom() {
        let (conn, _schema, _as_of) = person_fixture();
        conn.execute(
            "INSERT INTO persons (name, email, tag) VALUES (?1, ?2, NULL)",
            params!["Alice", "a@x"],
        ).expect("inserted");
        assert_eq!(0, count(&conn, "SELECT count(*) FROM attr_person_tag"));
    }

    #[test]
    fn test_cardinality_many_folds_to_array() {
        let (conn, _schema, _as_of) = person_fixture();
        conn.execute(
            "INSERT INTO persons (name, email, tag) VALUES (?1, ?2, ?3)",
            params!["Bob", "b@x", r#"["fast","green"]"#],
        ).expect("inserted");

        assert_eq!(2, count(&conn, "SELECT count(*) FROM attr_person_tag"));
        let folded: String = conn
            .query_row("SELECT tag FROM persons WHERE email = 'b@x'", params![], |row| row.get(0))
            .expect("tag");
        let mut tags: Vec<String> =
            ::serde_json::from_str(&folded).expect("a json array of tags");
        tags.sort();
        assert_eq!(vec!["fast".to_string(), "green".to_string()], tags);
    }

    #[test]
    fn test_defined_views_projection() {
        let (conn, _schema, _as_of) = person_fixture();
        let (required, optional): (String, String) = conn
            .query_row(
                "SELECT required_attributes, optional_attributes \
                 FROM defined_views WHERE name = 'persons'",
                params![],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .expect("row");
        let mut required: Vec<String> = ::serde_json::from_str(&required).expect("json");
        required.sort();
        assert_eq!(vec!["person/email".to_string(), "person/name".to_string()], required);
        let optional: Vec<String> = ::serde_json::from_str(&optional).expect("json");
        assert_eq!(vec!["person/tag".to_string()], optional);
    }

    #[test]
    fn test_bytea_through_triggers() {
        let (conn, mut schema, _as_of) = person_fixture();
        let attribute = Attribute::new("person/avatar", ValueType::Bytea);
        let entity = registry::define_attribute(&conn, &schema, &attribute).expect("defined");
        schema.add_attribute(entity, attribute);

        let definition = ViewDefinition::new("avatars", &["person/email"])
            .optional(&["person/avatar"]);
        let view = define_view(&conn, &schema, &definition).expect("defined");
        schema.view_map.insert(view.name.clone(), view);

        conn.execute(
            "INSERT INTO avatars (email, avatar) VALUES (?1, ?2)",
            params!["a@x", vec![0x00u8, 0xff, 0x10]],
        ).expect("inserted");

        // Raw is canonical lowercase hex; the typed projection is the blob.
        let (raw, typed): (String, Vec<u8>) = conn
            .query_row(
                "SELECT v_raw, v_typed FROM attr_person_avatar",
                params![],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .expect("row");
        assert_eq!("00ff10", raw);
        assert_eq!(vec![0x00u8, 0xff, 0x10], typed);

        let back: Vec<u8> = conn
            .query_row("SELECT avatar FROM avatars", params![], |row| row.get(0))
            .expect("read back");
        assert_eq!(vec![0x00u8, 0xff, 0x10], back);
    }

    #[test]
    fn test_views_curate_facets() {
        let (conn, mut schema, _as_of) = person_fixture();

        // A second view over a subset of the entity's attributes.
        let definition = ViewDefinition::new("contacts", &["person/email"]);
        let view = define_view(&conn, &schema, &definition).expect("defined");
        schema.view_map.insert(view.name.clone(), view);

        conn.execute(
            "INSERT INTO persons (name, email) VALUES (?1, ?2)",
            params!["Alice", "a@x"],
        ).expect("inserted");

        // Deleting through the narrow view retracts only its own attributes.
        conn.execute("DELETE FROM contacts WHERE email = 'a@x'", params![]).expect("deleted");
        assert_eq!(0, count(&conn, "SELECT count(*) FROM persons"));
        assert_eq!(
            1,
            count(&conn, "SELECT count(*) FROM attr_person_name WHERE retracted_by IS NULL")
        );
    }

    #[test]
    fn test_update_and_delete_view_definitions() {
        let (conn, mut schema, _as_of) = person_fixture();

        let update = ViewUpdate {
            optional: Some(vec![]),
            ..ViewUpdate::default()
        };
        let view = update_view(&conn, &schema, "persons", &update).expect("updated");
        assert!(view.optional.is_empty());
        schema.view_map.insert(view.name.clone(), view);

        // The tag column is gone from the regenerated view.
        assert!(conn
            .query_row("SELECT tag FROM persons", params![], |row| row.get::<_, Option<String>>(0))
            .is_err());

        // Renaming moves the SQL objects.
        let update = ViewUpdate {
            name: Some("people".to_string()),
            ..ViewUpdate::default()
        };
        let view = update_view(&conn, &schema, "persons", &update).expect("renamed");
        schema.view_map.remove("persons");
        schema.view_map.insert(view.name.clone(), view);
        assert_eq!(0, count(&conn, "SELECT count(*) FROM sqlite_master \
                                    WHERE type = 'view' AND name = 'persons'"));
        assert_eq!(1, count(&conn, "SELECT count(*) FROM sqlite_master \
                                    WHERE type = 'view' AND name = 'people'"));

        // Deleting drops the objects; the definition datoms stay, retracted.
        delete_view(&conn, &schema, "people").expect("deleted");
        assert_eq!(0, count(&conn, "SELECT count(*) FROM sqlite_master \
                                    WHERE type = 'view' AND name LIKE 'people%'"));
        assert_eq!(
            1,
            count(&conn, "SELECT count(*) FROM attr_db_view_ident \
                          WHERE retracted_by IS NOT NULL AND v_typed = 'people'")
        );
    }

    #[test]
    fn test_unknown_attribute_and_empty_required() {
        let (conn, schema, _as_of) = person_fixture();

        let definition = ViewDefinition::new("ghosts", &["person/ghost"]);
        match define_view(&conn, &schema, &definition) {
            Err(::errors::Error(ErrorKind::UnknownAttribute(ident), _)) => {
                assert_eq!("person/ghost", ident);
            },
            x => panic!("expected UnknownAttribute, got {:?}", x),
        }

        let definition = ViewDefinition::new("nothing", &[]);
        match define_view(&conn, &schema, &definition) {
            Err(::errors::Error(ErrorKind::ViewHasNoRequiredAttributes(name), _)) => {
                assert_eq!("nothing", name);
            },
            x => panic!("expected ViewHasNoRequiredAttributes, got {:?}", x),
        }
    }

    #[test]
    fn test_datom_invariants_hold() {
        let (conn, _schema, _as_of) = person_fixture();
        conn.execute(
            "INSERT INTO persons (name, email, tag) VALUES (?1, ?2, ?3)",
            params!["Bob", "b@x", r#"["one","two"]"#],
        ).expect("inserted");
        conn.execute("UPDATE persons SET name = 'Robert' WHERE email = 'b@x'", params![])
            .expect("updated");

        // Every datom in a child relation carries that relation's attribute.
        assert_eq!(0, count(&conn, "SELECT count(*) FROM attr_person_name WHERE a != 301"));

        // Retractions reference strictly later transactions.
        assert_eq!(
            0,
            count(&conn, "SELECT count(*) FROM datoms \
                          WHERE retracted_by IS NOT NULL AND retracted_by <= tx")
        );

        // At most one current datom per (e, a) for cardinality-one.
        assert_eq!(
            0,
            count(&conn, "SELECT count(*) FROM (SELECT e, count(*) AS n FROM attr_person_name \
                          WHERE retracted_by IS NULL GROUP BY e HAVING n > 1)")
        );
    }
}
