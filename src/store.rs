// Copyright 2018 Quint developers
//
// Licensed under the Apache License, Version 2.0 (the "License"); you may not use
// this file except in compliance with the License. You may obtain a copy of the
// License at http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software distributed
// under the License is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR
// CONDITIONS OF ANY KIND, either express or implied. See the License for the
// specific language governing permissions and limitations under the License.

//! The embedding surface: a `Store` owns one SQLite connection plus the
//! connection-scoped metadata (`Conn`): the cached schema and the as-of cell
//! behind the `as_of_tx()` SQL function.
//!
//! Opening a store bootstraps it if needed, registers the session function,
//! and reads the schema back out of the datoms.  Reads go through plain SQL
//! against the generated views; schema changes (attributes, views) are store
//! methods that run datom writes and DDL in one host transaction.

use std::path::Path;
use std::sync::Mutex;

use rusqlite;
use rusqlite::types::ToSql;
pub use rusqlite::types::Value;

use quint_core::{
    Attribute,
    Entid,
    Schema,
    ViewDefinition,
    ViewUpdate,
};
use quint_db::{
    allocator,
    bootstrap,
    debug,
    new_connection,
    registry,
    schema,
    views,
    visibility,
};
use quint_db::errors::{
    ErrorKind,
    Result,
};
use quint_db::visibility::AsOf;

/// Connection-scoped metadata: the schema cache and the as-of cell.  Owned by
/// a `Store`; never outlives its connection.
pub struct Conn {
    schema: Mutex<Schema>,
    as_of: AsOf,
}

/// A store: one open connection to a quint database.
///
/// Concurrent readers open their own `Store` against the same path; each
/// carries its own as-of context, so their visibility points never interfere.
/// The intended deployment is single-writer, many-reader.
pub struct Store {
    sqlite: rusqlite::Connection,
    conn: Conn,
}

/// Query results: column names plus rows of SQLite values.
#[derive(Clone, Debug, PartialEq)]
pub struct QueryOutput {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl QueryOutput {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// The first value of the first row, if any.
    pub fn into_scalar(self) -> Option<Value> {
        self.rows
            .into_iter()
            .next()
            .and_then(|row| row.into_iter().next())
    }

    /// The first column of every row.
    pub fn into_coll(self) -> Vec<Value> {
        self.rows
            .into_iter()
            .filter_map(|row| row.into_iter().next())
            .collect()
    }
}

impl Store {
    pub fn open<T>(path: T) -> Result<Store>
    where T: AsRef<Path> {
        Store::from_connection(new_connection(path)?)
    }

    pub fn open_in_memory() -> Result<Store> {
        Store::from_connection(new_connection("")?)
    }

    fn from_connection(sqlite: rusqlite::Connection) -> Result<Store> {
        bootstrap::ensure_bootstrapped(&sqlite)?;
        let as_of = AsOf::new();
        visibility::register(&sqlite, &as_of)?;
        let schema = schema::read_schema(&sqlite)?;
        debug!("opened store with {} attributes, {} views",
               schema.attribute_map.len(), schema.view_map.len());
        Ok(Store {
            sqlite: sqlite,
            conn: Conn {
                schema: Mutex::new(schema),
                as_of: as_of,
            },
        })
    }

    /// A snapshot of the schema cache.
    pub fn schema(&self) -> Schema {
        self.conn.schema.lock().unwrap().clone()
    }

    /// Resolve an ident to its entid; covers attributes and the bootstrap
    /// enum entities alike.
    pub fn attr_id(&self, ident: &str) -> Result<Entid> {
        let schema = self.conn.schema.lock().unwrap();
        match schema.entid_for_ident(ident) {
            Some(entid) => Ok(entid),
            None => bail!(ErrorKind::UnknownAttribute(ident.to_string())),
        }
    }

    /// Declare an attribute: definition datoms plus typed storage, in one
    /// host transaction.
    pub fn define_attribute(&mut self, attribute: &Attribute) -> Result<Entid> {
        let entity = {
            let schema = self.conn.schema.lock().unwrap();
            let tx = self.sqlite.transaction()?;
            let entity = registry::define_attribute(&tx, &schema, attribute)?;
            tx.commit()?;
            entity
        };
        self.conn.schema.lock().unwrap().add_attribute(entity, attribute.clone());
        Ok(entity)
    }

    /// Declare an attribute from string-typed fields, as an admin surface
    /// receives them.  `UnknownValueType` and friends fail the declaration
    /// before anything is written.
    pub fn define_attribute_from_strings(
        &mut self,
        ident: &str,
        value_type: &str,
        cardinality: &str,
        unique: Option<&str>,
        doc: Option<&str>,
    ) -> Result<Entid> {
        let attribute = registry::attribute_from_strings(ident, value_type, cardinality, unique, doc)?;
        self.define_attribute(&attribute)
    }

    /// Define a view and compile its SQL objects.
    pub fn define_view(&mut self, definition: &ViewDefinition) -> Result<Entid> {
        let view = {
            let schema = self.conn.schema.lock().unwrap();
            let tx = self.sqlite.transaction()?;
            let view = views::define_view(&tx, &schema, definition)?;
            tx.commit()?;
            view
        };
        let entity = view.id;
        self.conn.schema.lock().unwrap().view_map.insert(view.name.clone(), view);
        Ok(entity)
    }

    /// Apply a partial update to a stored view definition and regenerate its
    /// SQL objects.
    pub fn update_view(&mut self, name: &str, update: &ViewUpdate) -> Result<()> {
        let view = {
            let schema = self.conn.schema.lock().unwrap();
            let tx = self.sqlite.transaction()?;
            let view = views::update_view(&tx, &schema, name, update)?;
            tx.commit()?;
            view
        };
        let mut schema = self.conn.schema.lock().unwrap();
        schema.view_map.remove(name);
        schema.view_map.insert(view.name.clone(), view);
        Ok(())
    }

    /// Delete a view: its definition datoms are retracted, its SQL objects
    /// dropped.
    pub fn delete_view(&mut self, name: &str) -> Result<()> {
        {
            let schema = self.conn.schema.lock().unwrap();
            let tx = self.sqlite.transaction()?;
            views::delete_view(&tx, &schema, name)?;
            tx.commit()?;
        }
        self.conn.schema.lock().unwrap().view_map.remove(name);
        Ok(())
    }

    pub fn allocate_entity(&self, partition: &str) -> Result<Entid> {
        allocator::allocate_entity(&self.sqlite, partition)
    }

    pub fn new_transaction(&self) -> Result<Entid> {
        allocator::new_transaction(&self.sqlite)
    }

    pub fn latest_transaction(&self) -> Result<Option<Entid>> {
        allocator::latest_transaction(&self.sqlite)
    }

    /// The id most recently minted from the named partition; after a raw-SQL
    /// insert against a view, this is the new row's entity id.
    pub fn last_allocated(&self, partition: &str) -> Result<Entid> {
        allocator::last_allocated(&self.sqlite, partition)
    }

    /// Run a statement (DML against the generated views, typically).
    pub fn execute(&self, sql: &str, params: &[&dyn ToSql]) -> Result<usize> {
        Ok(self.sqlite.execute(sql, params)?)
    }

    /// Run a query against the current visibility context.
    pub fn query(&self, sql: &str, params: &[&dyn ToSql]) -> Result<QueryOutput> {
        let mut stmt = self.sqlite.prepare(sql)?;
        let columns: Vec<String> = stmt.column_names().iter().map(|s| s.to_string()).collect();
        let column_count = stmt.column_count();

        let mut out = vec![];
        let mut rows = stmt.query(params)?;
        while let Some(row) = rows.next()? {
            let mut values = Vec::with_capacity(column_count);
            for i in 0..column_count {
                values.push(row.get::<_, Value>(i)?);
            }
            out.push(values);
        }
        Ok(QueryOutput {
            columns: columns,
            rows: out,
        })
    }

    /// Run one query as of the given transaction (`None` means current),
    /// restoring the session's as-of context afterwards on every path.
    pub fn query_as_of(
        &self,
        sql: &str,
        params: &[&dyn ToSql],
        tx: Option<Entid>,
    ) -> Result<QueryOutput> {
        let previous = self.conn.as_of.get();
        self.conn.as_of.set(tx);
        let result = self.query(sql, params);
        self.conn.as_of.set(previous);
        result
    }

    /// Set the session's as-of context; `None` means current state.
    pub fn set_as_of(&self, tx: Option<Entid>) {
        self.conn.as_of.set(tx);
    }

    pub fn get_as_of(&self) -> Option<Entid> {
        self.conn.as_of.get()
    }

    /// Run `f` with the as-of context set to `tx`, restoring the previous
    /// context on both success and error paths.
    pub fn with_as_of<T, F>(&mut self, tx: Option<Entid>, f: F) -> Result<T>
    where F: FnOnce(&mut Store) -> Result<T> {
        let previous = self.conn.as_of.get();
        self.conn.as_of.set(tx);
        let result = f(&mut *self);
        self.conn.as_of.set(previous);
        result
    }

    /// Dump every datom as an aligned table.  For debugging and tests.
    pub fn dump_datoms(&self) -> Result<String> {
        let schema = self.conn.schema.lock().unwrap();
        Ok(debug::datoms(&self.sqlite)?.to_table_string(&schema))
    }

    /// Dump a query's results as an aligned table.  For debugging and tests.
    pub fn dump_sql_query(&self, sql: &str, params: &[&dyn ToSql]) -> Result<String> {
        debug::dump_sql_query(&self.sqlite, sql, params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use quint_core::{
        Unique,
        ValueType,
    };
    use quint_db::errors::Error;

    /// A store with the person schema the end-to-end scenarios share.
    fn person_store() -> Store {
        let _ = ::env_logger::try_init();

        let mut store = Store::open_in_memory().expect("opened");
        store
            .define_attribute(&Attribute::new("person/name", ValueType::Text))
            .expect("name");
        store
            .define_attribute(
                &Attribute::new("person/email", ValueType::Text).unique(Unique::Identity),
            )
            .expect("email");
        store
            .define_view(&ViewDefinition::new("persons", &["person/name", "person/email"]))
            .expect("persons");
        store
    }

    fn scalar_i64(output: QueryOutput) -> i64 {
        match output.into_scalar() {
            Some(Value::Integer(i)) => i,
            x => panic!("expected an integer scalar, got {:?}", x),
        }
    }

    fn scalar_text(output: QueryOutput) -> String {
        match output.into_scalar() {
            Some(Value::Text(s)) => s,
            x => panic!("expected a text scalar, got {:?}", x),
        }
    }

    #[test]
    fn test_bootstrap_inspection() {
        let store = Store::open_in_memory().expect("opened");
        assert_eq!(1, store.attr_id("db/ident").expect("db/ident"));
        assert_eq!(112, store.attr_id("db.type/ref").expect("db.type/ref"));
        assert_eq!(201, store.attr_id("db.cardinality/many").expect("many"));

        let partitions = store
            .query("SELECT ident FROM partitions ORDER BY id", &[])
            .expect("partitions")
            .into_coll();
        assert_eq!(
            vec![
                Value::Text("db".to_string()),
                Value::Text("tx".to_string()),
                Value::Text("user".to_string()),
            ],
            partitions
        );

        match store.attr_id("db/nonsense") {
            Err(Error(ErrorKind::UnknownAttribute(ident), _)) => assert_eq!("db/nonsense", ident),
            x => panic!("expected UnknownAttribute, got {:?}", x),
        }
    }

    #[test]
    fn test_string_typed_declarations() {
        let mut store = Store::open_in_memory().expect("opened");
        let entity = store
            .define_attribute_from_strings("person/age", "int4", "one", None, None)
            .expect("defined");
        assert_eq!(entity, store.attr_id("person/age").expect("resolves"));

        match store.define_attribute_from_strings("person/height", "varchar", "one", None, None) {
            Err(Error(ErrorKind::UnknownValueType(name), _)) => assert_eq!("varchar", name),
            x => panic!("expected UnknownValueType, got {:?}", x),
        }
        match store.define_attribute_from_strings("person/height", "text", "several", None, None) {
            Err(Error(ErrorKind::UnknownCardinality(name), _)) => assert_eq!("several", name),
            x => panic!("expected UnknownCardinality, got {:?}", x),
        }
    }

    #[test]
    fn test_define_attribute_and_view() {
        let store = person_store();

        // The view exists and is empty.
        assert!(store.query("SELECT * FROM persons", &[]).expect("empty").is_empty());

        // The generated relation exists with a typed text column.
        let column_type = scalar_text(
            store
                .query(
                    "SELECT type FROM pragma_table_info('attr_person_name') \
                     WHERE name = 'v_typed'",
                    &[],
                )
                .expect("column"),
        );
        assert_eq!("TEXT", column_type);
    }

    #[test]
    fn test_insert_update_as_of() {
        let store = person_store();

        store
            .execute("INSERT INTO persons (name, email) VALUES (?1, ?2)", &[&"Alice", &"a@x"])
            .expect("inserted");
        let t1 = store.latest_transaction().expect("t1").expect("some");
        let id = store.last_allocated("user").expect("id");

        store
            .execute("UPDATE persons SET name = ?1 WHERE id = ?2", &[&"Alicia", &id])
            .expect("updated");
        let t2 = store.latest_transaction().expect("t2").expect("some");

        let current = scalar_text(store.query("SELECT name FROM persons", &[]).expect("current"));
        assert_eq!("Alicia", current);

        let at_t1 = scalar_text(
            store
                .query_as_of("SELECT name FROM persons", &[], Some(t1))
                .expect("as of t1"),
        );
        assert_eq!("Alice", at_t1);

        let at_t2 = scalar_text(
            store
                .query_as_of("SELECT name FROM persons", &[], Some(t2))
                .expect("as of t2"),
        );
        assert_eq!("Alicia", at_t2);

        // The session context is untouched by per-query as-of.
        assert_eq!(None, store.get_as_of());
    }

    #[test]
    fn test_delete_preserves_history() {
        let store = person_store();
        store
            .execute("INSERT INTO persons (name, email) VALUES (?1, ?2)", &[&"Alice", &"a@x"])
            .expect("inserted");
        let t2 = store.latest_transaction().expect("t2").expect("some");

        store.execute("DELETE FROM persons", &[]).expect("deleted");
        assert_eq!(
            0,
            scalar_i64(store.query("SELECT COUNT(*) FROM persons", &[]).expect("now"))
        );
        assert_eq!(
            1,
            scalar_i64(
                store
                    .query_as_of("SELECT COUNT(*) FROM persons", &[], Some(t2))
                    .expect("then"),
            )
        );
    }

    #[test]
    fn test_cardinality_many_view() {
        let mut store = person_store();
        store
            .define_attribute(&Attribute::new("person/tag", ValueType::Text).many())
            .expect("tag");
        store
            .define_view(
                &ViewDefinition::new("tagged_persons", &["person/name", "person/tag"]),
            )
            .expect("tagged");

        store
            .execute(
                "INSERT INTO tagged_persons (name, tag) VALUES (?1, ?2)",
                &[&"Bob", &r#"["green","fast"]"#],
            )
            .expect("inserted");

        let folded = scalar_text(
            store
                .query("SELECT tag FROM tagged_persons WHERE name = 'Bob'", &[])
                .expect("folded"),
        );
        let mut tags: Vec<String> = ::serde_json::from_str(&folded).expect("json array");
        tags.sort();
        assert_eq!(vec!["fast".to_string(), "green".to_string()], tags);
    }

    #[test]
    fn test_independent_as_of_contexts() {
        let dir = ::tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("quint.db");

        let mut writer = Store::open(&path).expect("writer");
        writer
            .define_attribute(&Attribute::new("person/name", ValueType::Text))
            .expect("name");
        writer
            .define_attribute(&Attribute::new("person/email", ValueType::Text))
            .expect("email");
        writer
            .define_view(&ViewDefinition::new("persons", &["person/name", "person/email"]))
            .expect("persons");
        writer
            .execute("INSERT INTO persons (name, email) VALUES ('Alice', 'a@x')", &[])
            .expect("insert one");
        let t1 = writer.latest_transaction().expect("t1").expect("some");
        writer
            .execute("INSERT INTO persons (name, email) VALUES ('Bea', 'b@x')", &[])
            .expect("insert two");
        let t2 = writer.latest_transaction().expect("t2").expect("some");

        // Two stores on the same file, each with its own visibility point.
        let reader1 = Store::open(&path).expect("reader1");
        let reader2 = Store::open(&path).expect("reader2");
        let n1 = scalar_i64(
            reader1
                .query_as_of("SELECT COUNT(*) FROM persons", &[], Some(t1))
                .expect("reader1"),
        );
        let n2 = scalar_i64(
            reader2
                .query_as_of("SELECT COUNT(*) FROM persons", &[], Some(t2))
                .expect("reader2"),
        );
        assert_eq!(1, n1);
        assert_eq!(2, n2);
        assert_eq!(None, reader1.get_as_of());
        assert_eq!(None, reader2.get_as_of());
    }

    #[test]
    fn test_with_as_of_restores_on_error() {
        let mut store = person_store();
        store
            .execute("INSERT INTO persons (name, email) VALUES ('Alice', 'a@x')", &[])
            .expect("inserted");
        let t1 = store.latest_transaction().expect("t1").expect("some");

        store.set_as_of(Some(t1));
        let failed: Result<()> = store.with_as_of(None, |store| {
            store.query("SELECT * FROM no_such_view", &[])?;
            Ok(())
        });
        assert!(failed.is_err());
        assert_eq!(Some(t1), store.get_as_of());

        let count = store
            .with_as_of(None, |store| {
                Ok(scalar_i64(store.query("SELECT COUNT(*) FROM persons", &[])?))
            })
            .expect("counted");
        assert_eq!(1, count);
        assert_eq!(Some(t1), store.get_as_of());
        store.set_as_of(None);
    }

    #[test]
    fn test_session_as_of_routes_the_dispatcher() {
        let store = person_store();
        store
            .execute("INSERT INTO persons (name, email) VALUES ('Alice', 'a@x')", &[])
            .expect("inserted");
        let t1 = store.latest_transaction().expect("t1").expect("some");
        store.execute("DELETE FROM persons", &[]).expect("deleted");

        // Unset as-of: the dispatcher equals the current view.
        assert_eq!(
            store.query("SELECT COUNT(*) FROM persons", &[]).expect("v"),
            store.query("SELECT COUNT(*) FROM persons_current", &[]).expect("current")
        );

        store.set_as_of(Some(t1));
        assert_eq!(
            1,
            scalar_i64(store.query("SELECT COUNT(*) FROM persons", &[]).expect("history"))
        );
        store.set_as_of(None);
        assert_eq!(
            0,
            scalar_i64(store.query("SELECT COUNT(*) FROM persons", &[]).expect("back"))
        );
    }

    #[test]
    fn test_typed_round_trip_through_views() {
        let mut store = Store::open_in_memory().expect("opened");
        store
            .define_attribute(&Attribute::new("reading/taken-at", ValueType::Timestamptz))
            .expect("taken-at");
        store
            .define_attribute(&Attribute::new("reading/celsius", ValueType::Float8))
            .expect("celsius");
        store
            .define_attribute(&Attribute::new("reading/valid", ValueType::Bool))
            .expect("valid");
        store
            .define_view(&ViewDefinition::new(
                "readings",
                &["reading/taken-at", "reading/celsius", "reading/valid"],
            ))
            .expect("readings");

        store
            .execute(
                "INSERT INTO readings (taken_at, celsius, valid) VALUES (?1, ?2, ?3)",
                &[&"2018-04-16T20:28:32.453Z", &21.5f64, &1i64],
            )
            .expect("inserted");

        let row = store
            .query("SELECT taken_at, celsius, valid FROM readings", &[])
            .expect("row");
        assert_eq!(
            vec![vec![
                Value::Text("2018-04-16T20:28:32.453Z".to_string()),
                Value::Real(21.5),
                Value::Integer(1),
            ]],
            row.rows
        );

        // The raw encoding under the typed projection is the canonical form.
        let raw = scalar_text(
            store
                .query("SELECT v_raw FROM attr_reading_valid", &[])
                .expect("raw"),
        );
        assert_eq!("true", raw);
    }
}
