// Copyright 2018 Quint developers
//
// Licensed under the Apache License, Version 2.0 (the "License"); you may not use
// this file except in compliance with the License. You may obtain a copy of the
// License at http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software distributed
// under the License is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR
// CONDITIONS OF ANY KIND, either express or implied. See the License for the
// specific language governing permissions and limitations under the License.

//! The view compiler.
//!
//! A stored view definition compiles to three SQL views plus the DML triggers
//! from the `dml` module:
//!
//! * `V_current`: one row per entity possessing all required attributes,
//!   filtered to current state;
//! * `V_history`: the same shape with every visibility test replaced by the
//!   as-of-aware predicate;
//! * `V`: a dispatcher unioning the two behind mutually exclusive guards on
//!   `as_of_tx()`, so the planner prunes the inactive branch.
//!
//! Compilation is a plan (`ViewPlan`: anchor, inner joins, left joins) and a
//! renderer, kept apart so that regenerating an unchanged definition emits
//! byte-identical SQL.  Within required and within optional, attributes are
//! ordered by ident; the first sorted required attribute anchors the join
//! chain and supplies the entity id column.

use itertools::Itertools;
use rusqlite;

use quint_core::{
    Entid,
    Schema,
    ValueType,
    View,
};

use dml;
use errors::{
    ErrorKind,
    Result,
};
use relation;
use visibility;

/// Which visibility test a rendered view embeds.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Visibility {
    Current,
    AsOf,
}

fn predicate(visibility: Visibility, alias: &str) -> String {
    match visibility {
        Visibility::Current => visibility::current_predicate(alias),
        Visibility::AsOf => visibility::visible_predicate(alias),
    }
}

/// One attribute's place in a view plan.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct AttrBinding {
    pub attribute: Entid,
    pub ident: String,
    pub table: String,
    pub column: String,
    pub alias: String,
    pub value_type: ValueType,
    pub many: bool,
}

/// The join chain for one view: the anchor drives, remaining required
/// attributes join with inner semantics, optionals with left semantics.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ViewPlan {
    pub name: String,
    pub anchor: AttrBinding,
    pub inner: Vec<AttrBinding>,
    pub left: Vec<AttrBinding>,
}

fn resolve(schema: &Schema, entid: Entid) -> Result<AttrBinding> {
    let attribute = schema.attribute_for_entid(entid).ok_or_else(|| {
        let shown = schema
            .ident_for_entid(entid)
            .cloned()
            .unwrap_or_else(|| entid.to_string());
        ErrorKind::UnknownAttribute(shown)
    })?;
    Ok(AttrBinding {
        attribute: entid,
        ident: attribute.ident.clone(),
        table: relation::table_name(&attribute.ident),
        column: relation::column_name(&attribute.ident),
        alias: String::new(),
        value_type: attribute.value_type,
        many: attribute.is_many(),
    })
}

impl ViewPlan {
    /// Plan a stored view definition against the schema.
    pub fn of(schema: &Schema, view: &View) -> Result<ViewPlan> {
        if view.required.is_empty() {
            bail!(ErrorKind::ViewHasNoRequiredAttributes(view.name.clone()));
        }

        let mut required = vec![];
        for entid in &view.required {
            required.push(resolve(schema, *entid)?);
        }
        required.sort_by(|x, y| x.ident.cmp(&y.ident));

        let mut optional = vec![];
        for entid in &view.optional {
            optional.push(resolve(schema, *entid)?);
        }
        optional.sort_by(|x, y| x.ident.cmp(&y.ident));

        let mut required = required.into_iter();
        let mut anchor = required.next().expect("at least one required attribute");
        anchor.alias = "a0".to_string();

        let inner = required
            .enumerate()
            .map(|(i, mut binding)| {
                binding.alias = format!("r{}", i + 1);
                binding
            })
            .collect();
        let left = optional
            .into_iter()
            .enumerate()
            .map(|(i, mut binding)| {
                binding.alias = format!("o{}", i + 1);
                binding
            })
            .collect();

        Ok(ViewPlan {
            name: view.name.clone(),
            anchor: anchor,
            inner: inner,
            left: left,
        })
    }

    /// Every binding in emission order: anchor, inner, left.
    pub fn bindings(&self) -> Vec<&AttrBinding> {
        let mut bindings = vec![&self.anchor];
        bindings.extend(self.inner.iter());
        bindings.extend(self.left.iter());
        bindings
    }

    /// The projected column expression for one binding.  Cardinality-many
    /// attributes fold to a JSON array via a correlated aggregate; bytea
    /// folds its hex form, since JSON cannot carry blobs.
    fn column_expr(&self, binding: &AttrBinding, visibility: Visibility) -> String {
        if binding.many {
            let value = match binding.value_type {
                ValueType::Bytea => "m.v_raw",
                _ => "m.v_typed",
            };
            format!(
                "(SELECT json_group_array({value}) FROM {table} m WHERE m.e = {anchor}.e AND {pred})",
                value = value,
                table = binding.table,
                anchor = self.anchor.alias,
                pred = predicate(visibility, "m"),
            )
        } else {
            format!("{}.v_typed", binding.alias)
        }
    }

    fn select_list(&self, visibility: Visibility) -> String {
        let mut columns = vec![format!("{}.e AS id", self.anchor.alias)];
        for binding in self.bindings() {
            columns.push(format!(
                "{} AS {}",
                self.column_expr(binding, visibility),
                binding.column
            ));
        }
        columns.iter().join(",\n       ")
    }

    fn from_clause(&self, visibility: Visibility) -> String {
        let mut parts = vec![];

        if self.anchor.many {
            parts.push(format!(
                "FROM (SELECT DISTINCT d.e FROM {} d WHERE {}) {}",
                self.anchor.table,
                predicate(visibility, "d"),
                self.anchor.alias,
            ));
        } else {
            parts.push(format!("FROM {} {}", self.anchor.table, self.anchor.alias));
        }

        for binding in &self.inner {
            if binding.many {
                parts.push(format!(
                    "JOIN (SELECT DISTINCT d.e FROM {} d WHERE {}) {} ON {}.e = {}.e",
                    binding.table,
                    predicate(visibility, "d"),
                    binding.alias,
                    binding.alias,
                    self.anchor.alias,
                ));
            } else {
                parts.push(format!(
                    "JOIN {} {} ON {}.e = {}.e AND {}",
                    binding.table,
                    binding.alias,
                    binding.alias,
                    self.anchor.alias,
                    predicate(visibility, &binding.alias),
                ));
            }
        }

        for binding in &self.left {
            // Many-valued optionals need no join at all: their fold subquery
            // carries the column and an empty fold is just `[]`.
            if !binding.many {
                parts.push(format!(
                    "LEFT JOIN {} {} ON {}.e = {}.e AND {}",
                    binding.table,
                    binding.alias,
                    binding.alias,
                    self.anchor.alias,
                    predicate(visibility, &binding.alias),
                ));
            }
        }

        parts.iter().join("\n")
    }

    fn render_select(&self, visibility: Visibility) -> String {
        let mut sql = format!(
            "SELECT {}\n{}",
            self.select_list(visibility),
            self.from_clause(visibility)
        );
        if !self.anchor.many {
            sql.push_str(&format!(
                "\nWHERE {}",
                predicate(visibility, &self.anchor.alias)
            ));
        }
        sql
    }

    pub fn current_view_sql(&self) -> String {
        format!(
            "CREATE VIEW {}_current AS\n{}",
            self.name,
            self.render_select(Visibility::Current)
        )
    }

    pub fn history_view_sql(&self) -> String {
        format!(
            "CREATE VIEW {}_history AS\n{}",
            self.name,
            self.render_select(Visibility::AsOf)
        )
    }

    /// The dispatching view: the two branches carry mutually exclusive guards
    /// on the stable session function, so only one contributes rows.
    pub fn dispatch_view_sql(&self) -> String {
        let columns = {
            let mut columns = vec!["id".to_string()];
            columns.extend(self.bindings().iter().map(|b| b.column.clone()));
            columns.iter().join(", ")
        };
        format!(
            "CREATE VIEW {name} AS\n\
             SELECT {columns} FROM {name}_current WHERE {f}() IS NULL\n\
             UNION ALL\n\
             SELECT {columns} FROM {name}_history WHERE {f}() IS NOT NULL",
            name = self.name,
            columns = columns,
            f = visibility::AS_OF_FUNCTION,
        )
    }

    /// All nine statements for this view: three views, then the triggers on
    /// the dispatcher and on `_current`.
    pub fn compile(&self) -> Vec<String> {
        let mut statements = vec![
            self.current_view_sql(),
            self.history_view_sql(),
            self.dispatch_view_sql(),
        ];
        statements.extend(dml::triggers(self));
        statements
    }
}

/// Drop every object a view compiles to, triggers first.  Idempotent.
pub fn drop_statements(name: &str) -> Vec<String> {
    let mut statements = vec![];
    for target in &[name.to_string(), format!("{}_current", name)] {
        for operation in &["insert", "update", "delete"] {
            statements.push(format!("DROP TRIGGER IF EXISTS {}_{}", target, operation));
        }
    }
    statements.push(format!("DROP VIEW IF EXISTS {}", name));
    statements.push(format!("DROP VIEW IF EXISTS {}_current", name));
    statements.push(format!("DROP VIEW IF EXISTS {}_history", name));
    statements
}

/// Drop and re-emit a view's SQL objects from its stored definition.
///
/// A definition with no required attributes cannot be planned; regeneration
/// logs a notice and leaves the objects dropped.
pub fn regenerate(conn: &rusqlite::Connection, schema: &Schema, view: &View) -> Result<()> {
    for statement in drop_statements(&view.name) {
        conn.execute(&statement, params![])?;
    }
    if view.required.is_empty() {
        warn!("view {} has no required attributes; skipping regeneration", view.name);
        return Ok(());
    }
    let plan = ViewPlan::of(schema, view)?;
    for statement in plan.compile() {
        conn.execute(&statement, params![])?;
    }
    debug!("regenerated view {}", view.name);
    Ok(())
}
