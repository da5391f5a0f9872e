// Copyright 2018 Quint developers
//
// Licensed under the Apache License, Version 2.0 (the "License"); you may not use
// this file except in compliance with the License. You may obtain a copy of the
// License at http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software distributed
// under the License is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR
// CONDITIONS OF ANY KIND, either express or implied. See the License for the
// specific language governing permissions and limitations under the License.

//! Per-attribute storage relations.
//!
//! Each attribute owns one physical table shaped like the parent `datoms`
//! relation plus a stored typed projection, pinned to its attribute id by a
//! check predicate.  The parent is the `datoms` view, a `UNION ALL` over the
//! registry of children, regenerated whenever the registry grows.  Queries
//! touching a single attribute read the child and use its typed indexes;
//! cross-attribute scans read the union.

use itertools::Itertools;
use rusqlite;

use quint_core::{
    Entid,
    ValueType,
};

use codec;
use errors::Result;

/// Normalise an ident into a host identifier: namespace and word separators
/// become underscores, camelCase humps split, everything lowercased.
pub fn normalize_ident(ident: &str) -> String {
    let mut out = String::with_capacity(ident.len() + 4);
    for c in ident.chars() {
        match c {
            '/' | '.' | '-' | ' ' => out.push('_'),
            c if c.is_ascii_uppercase() => {
                if !out.is_empty() && !out.ends_with('_') {
                    out.push('_');
                }
                out.push(c.to_ascii_lowercase());
            },
            c => out.push(c),
        }
    }
    out
}

/// The storage table name for an attribute ident: `person/name` stores in
/// `attr_person_name`.
pub fn table_name(ident: &str) -> String {
    format!("attr_{}", normalize_ident(ident))
}

/// The projected column name for an attribute ident: the part after the
/// namespace separator, normalised.  `db.view/optional-attributes` projects
/// as `optional_attributes`.
pub fn column_name(ident: &str) -> String {
    let local = ident.rsplit('/').next().unwrap_or(ident);
    normalize_ident(local)
}

/// One index on an attribute relation.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialOrd, PartialEq)]
pub struct IndexSpec {
    pub name: String,
    pub columns: Vec<&'static str>,
    pub predicate: Option<&'static str>,
}

impl IndexSpec {
    fn to_sql(&self, table: &str) -> String {
        let mut sql = format!(
            "CREATE INDEX {} ON {} ({})",
            self.name,
            table,
            self.columns.iter().join(", "),
        );
        if let Some(predicate) = self.predicate {
            sql.push_str(" WHERE ");
            sql.push_str(predicate);
        }
        sql
    }
}

/// The structural description of an attribute's storage relation; `ddl`
/// renders it for the host engine.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialOrd, PartialEq)]
pub struct RelationSpec {
    pub table: String,
    pub attribute: Entid,
    pub value_type: ValueType,
}

impl RelationSpec {
    pub fn for_attribute(ident: &str, attribute: Entid, value_type: ValueType) -> RelationSpec {
        RelationSpec {
            table: table_name(ident),
            attribute: attribute,
            value_type: value_type,
        }
    }

    /// The three standard indexes, plus reverse-value lookup for refs.
    ///
    /// Current-state lookups hit the partial indexes; history queries fall
    /// back to the `tx` index and table scans.
    pub fn indexes(&self) -> Vec<IndexSpec> {
        let current = Some("retracted_by IS NULL");
        let mut indexes = vec![
            IndexSpec {
                name: format!("idx_{}_v", self.table),
                columns: vec!["v_typed"],
                predicate: current,
            },
            IndexSpec {
                name: format!("idx_{}_e", self.table),
                columns: vec!["e"],
                predicate: current,
            },
            IndexSpec {
                name: format!("idx_{}_tx", self.table),
                columns: vec!["tx"],
                predicate: None,
            },
        ];
        if self.value_type.is_ref() {
            indexes.push(IndexSpec {
                name: format!("idx_{}_ve", self.table),
                columns: vec!["v_typed", "e"],
                predicate: current,
            });
        }
        indexes
    }

    pub fn create_table_sql(&self) -> String {
        format!(
            "CREATE TABLE {table} (\n    \
             e INTEGER NOT NULL,\n    \
             a INTEGER NOT NULL CHECK (a = {attribute}),\n    \
             v_raw TEXT NOT NULL,\n    \
             tx INTEGER NOT NULL,\n    \
             retracted_by INTEGER,\n    \
             v_typed {column_type} GENERATED ALWAYS AS ({typed_expr}) STORED,\n    \
             PRIMARY KEY (e, a, v_raw, tx)\n\
             )",
            table = self.table,
            attribute = self.attribute,
            column_type = codec::sql_column_type(self.value_type),
            typed_expr = codec::typed_from_raw_sql(self.value_type, "v_raw"),
        )
    }

    pub fn ddl(&self) -> Vec<String> {
        let mut statements = vec![self.create_table_sql()];
        statements.extend(self.indexes().iter().map(|i| i.to_sql(&self.table)));
        statements
    }
}

/// Create the relation and its indexes.  The caller regenerates the `datoms`
/// union afterwards.
pub fn create_relation(conn: &rusqlite::Connection, spec: &RelationSpec) -> Result<()> {
    for statement in spec.ddl() {
        conn.execute(&statement, params![])?;
    }
    Ok(())
}

/// The registry of union members: every attribute table, in name order.
pub fn attribute_tables(conn: &rusqlite::Connection) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT name FROM sqlite_master \
         WHERE type = 'table' AND name LIKE 'attr\\_%' ESCAPE '\\' \
         ORDER BY name",
    )?;
    let mut tables = vec![];
    let mut rows = stmt.query(params![])?;
    while let Some(row) = rows.next()? {
        tables.push(row.get(0)?);
    }
    Ok(tables)
}

/// Recreate the parent `datoms` view as the union of all attribute tables.
pub fn regenerate_datoms_view(conn: &rusqlite::Connection) -> Result<()> {
    let tables = attribute_tables(conn)?;
    conn.execute("DROP VIEW IF EXISTS datoms", params![])?;
    if tables.is_empty() {
        return Ok(());
    }
    let body = tables
        .iter()
        .map(|t| format!("SELECT e, a, v_raw, tx, retracted_by FROM {}", t))
        .join("\nUNION ALL\n");
    conn.execute(&format!("CREATE VIEW datoms AS\n{}", body), params![])?;
    Ok(())
}
