// Copyright 2018 Quint developers
//
// Licensed under the Apache License, Version 2.0 (the "License"); you may not use
// this file except in compliance with the License. You may obtain a copy of the
// License at http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software distributed
// under the License is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR
// CONDITIONS OF ANY KIND, either express or implied. See the License for the
// specific language governing permissions and limitations under the License.

/// Low-level functions for testing and debugging.

use std::io::Write;
use std::ops::Deref;

use rusqlite;
use rusqlite::types::ToSql;
use tabwriter::TabWriter;

use quint_core::{
    Entid,
    Schema,
};

use errors::Result;

/// Represents a *datom* (assertion) in the store, raw form.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialOrd, PartialEq)]
pub struct Datom {
    pub e: Entid,
    pub a: Entid,
    pub v_raw: String,
    pub tx: Entid,
    pub retracted_by: Option<Entid>,
}

/// A set of datoms, deterministically ordered by `(e, a, v_raw, tx)` for easy
/// comparison.
pub struct Datoms(pub Vec<Datom>);

impl Deref for Datoms {
    type Target = [Datom];

    fn deref(&self) -> &Self::Target {
        self.0.deref()
    }
}

impl Datoms {
    /// Render the datoms as an aligned table, attributes shown by ident when
    /// the schema knows them.
    pub fn to_table_string(&self, schema: &Schema) -> String {
        let mut tw = TabWriter::new(Vec::new()).padding(2);
        write!(&mut tw, "e\ta\tv_raw\ttx\tretracted_by\n").unwrap();
        for datom in self.iter() {
            let a = schema
                .ident_for_entid(datom.a)
                .cloned()
                .unwrap_or_else(|| datom.a.to_string());
            let retracted_by = datom
                .retracted_by
                .map(|t| t.to_string())
                .unwrap_or_default();
            write!(&mut tw, "{}\t{}\t{:?}\t{}\t{}\n",
                   datom.e, a, datom.v_raw, datom.tx, retracted_by).unwrap();
        }
        String::from_utf8(tw.into_inner().unwrap()).unwrap()
    }
}

/// Return the set of datoms in the store, ordered by `(e, a, v_raw, tx)`.
pub fn datoms(conn: &rusqlite::Connection) -> Result<Datoms> {
    datoms_after(conn, -1)
}

/// Return the set of datoms with transaction id strictly greater than `tx`,
/// ordered by `(e, a, v_raw, tx)`.
pub fn datoms_after(conn: &rusqlite::Connection, tx: Entid) -> Result<Datoms> {
    let mut stmt = conn.prepare(
        "SELECT e, a, v_raw, tx, retracted_by FROM datoms WHERE tx > ?1 \
         ORDER BY e, a, v_raw, tx",
    )?;
    let mut datoms = vec![];
    let mut rows = stmt.query(params![tx])?;
    while let Some(row) = rows.next()? {
        datoms.push(Datom {
            e: row.get(0)?,
            a: row.get(1)?,
            v_raw: row.get(2)?,
            tx: row.get(3)?,
            retracted_by: row.get(4)?,
        });
    }
    Ok(Datoms(datoms))
}

/// Execute the given `sql` query with the given `params` and format the
/// results as a tab-and-newline formatted string suitable for debug printing.
///
/// The query is printed followed by a newline, then the returned columns
/// followed by a newline, and then the data rows and columns.  All columns
/// are aligned.
pub fn dump_sql_query(
    conn: &rusqlite::Connection,
    sql: &str,
    params: &[&dyn ToSql],
) -> Result<String> {
    let mut stmt = conn.prepare(sql)?;
    let column_names: Vec<String> = stmt.column_names().iter().map(|s| s.to_string()).collect();
    let column_count = stmt.column_count();

    let mut tw = TabWriter::new(Vec::new()).padding(2);
    write!(&mut tw, "{}\n", sql).unwrap();
    for column_name in &column_names {
        write!(&mut tw, "{}\t", column_name).unwrap();
    }
    write!(&mut tw, "\n").unwrap();

    let mut rows = stmt.query(params)?;
    while let Some(row) = rows.next()? {
        for i in 0..column_count {
            let value: rusqlite::types::Value = row.get(i)?;
            write!(&mut tw, "{:?}\t", value).unwrap();
        }
        write!(&mut tw, "\n").unwrap();
    }

    let dump = String::from_utf8(tw.into_inner().unwrap()).unwrap();
    Ok(dump)
}

#[cfg(test)]
mod tests {
    use super::*;

    use bootstrap;
    use new_connection;
    use schema::read_schema;

    #[test]
    fn test_datoms_dump() {
        let conn = new_connection("").expect("opened");
        bootstrap::ensure_bootstrapped(&conn).expect("bootstrapped");

        let all = datoms(&conn).expect("datoms");
        assert!(!all.is_empty());
        // Bootstrap writes everything at transaction 0.
        assert!(datoms_after(&conn, 0).expect("after").is_empty());

        let schema = read_schema(&conn).expect("schema");
        let table = all.to_table_string(&schema);
        assert!(table.contains("db/ident"));
        assert!(table.contains("db.cardinality/one"));
    }

    #[test]
    fn test_dump_sql_query() {
        let conn = new_connection("").expect("opened");
        bootstrap::ensure_bootstrapped(&conn).expect("bootstrapped");

        let dump = dump_sql_query(&conn, "SELECT id, ident FROM partitions ORDER BY id", &[])
            .expect("dumped");
        assert!(dump.contains("ident"));
        assert!(dump.contains("\"db\""));
        assert!(dump.contains("\"user\""));
    }
}
