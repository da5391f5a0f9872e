// Copyright 2018 Quint developers
//
// Licensed under the Apache License, Version 2.0 (the "License"); you may not use
// this file except in compliance with the License. You may obtain a copy of the
// License at http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software distributed
// under the License is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR
// CONDITIONS OF ANY KIND, either express or implied. See the License for the
// specific language governing permissions and limitations under the License.

//! The DML translator: row operations against a view become datom operations.
//!
//! For each view the compiler attaches `INSTEAD OF` triggers whose bodies are
//! static SQL emitted here.  Inserts allocate a fresh entity and transaction
//! by bumping the partition counters in place, then assert one datom per
//! non-null column; updates retract and re-assert only columns whose
//! canonical raw form actually changed (null-safe `IS NOT`); deletes retract
//! every current datom of the view's attributes.  Attributes outside the view
//! are untouched; different views curate different facets of an entity.
//!
//! The partition-counter subquery is stable across the statements of one
//! trigger body: SQLite runs the body atomically and nothing else bumps the
//! counter in between.  Cardinality-many columns travel as JSON arrays and
//! are exploded through `json_each`.

use itertools::Itertools;

use quint_core::ValueType;

use codec;
use view::{
    AttrBinding,
    ViewPlan,
};

const NOW: &'static str = "strftime('%Y-%m-%dT%H:%M:%fZ', 'now')";

fn allocated_id(partition: &str) -> String {
    format!(
        "(SELECT (id << 48) | next_id FROM partitions WHERE ident = '{}')",
        partition
    )
}

fn bump(partition: &str) -> String {
    format!(
        "UPDATE partitions SET next_id = next_id + 1 WHERE ident = '{}';",
        partition
    )
}

fn record_transaction() -> String {
    format!(
        "INSERT INTO transactions (id, instant) VALUES ({}, {});",
        allocated_id("tx"),
        NOW
    )
}

/// The canonical raw form of a row column, as a SQL expression.
fn raw(binding: &AttrBinding, row: &str) -> String {
    codec::raw_from_typed_sql(binding.value_type, &format!("{}.{}", row, binding.column))
}

/// `json_each` over a possibly-null JSON array column.
fn exploded(row: &str, column: &str) -> String {
    format!(
        "json_each(CASE WHEN {row}.{col} IS NULL THEN '[]' ELSE {row}.{col} END) j",
        row = row,
        col = column,
    )
}

/// The raw form of one exploded array element.
fn element_raw(binding: &AttrBinding) -> String {
    // json_each hands text elements back as text, numbers as numbers; the
    // same canonicalisation as scalar columns applies.
    match binding.value_type {
        // Hex text is already the raw form.
        ValueType::Bytea => "j.value".to_string(),
        _ => codec::raw_from_typed_sql(binding.value_type, "j.value"),
    }
}

fn insert_statements(plan: &ViewPlan) -> Vec<String> {
    let entity = allocated_id("user");
    let tx = allocated_id("tx");

    let mut statements = vec![bump("user"), bump("tx"), record_transaction()];
    for binding in plan.bindings() {
        if binding.many {
            statements.push(format!(
                "INSERT INTO {table} (e, a, v_raw, tx) \
                 SELECT {entity}, {attribute}, {value}, {tx} FROM {each};",
                table = binding.table,
                entity = entity,
                attribute = binding.attribute,
                value = element_raw(binding),
                tx = tx,
                each = exploded("NEW", &binding.column),
            ));
        } else {
            statements.push(format!(
                "INSERT INTO {table} (e, a, v_raw, tx) \
                 SELECT {entity}, {attribute}, {value}, {tx} \
                 WHERE NEW.{column} IS NOT NULL;",
                table = binding.table,
                entity = entity,
                attribute = binding.attribute,
                value = raw(binding, "NEW"),
                tx = tx,
                column = binding.column,
            ));
        }
    }
    statements
}

fn update_statements(plan: &ViewPlan) -> Vec<String> {
    let tx = allocated_id("tx");

    let mut statements = vec![bump("tx"), record_transaction()];
    for binding in plan.bindings() {
        if binding.many {
            // Array columns compare as canonical JSON text; a change retracts
            // the whole current set and re-asserts the new elements.
            let changed = format!("NEW.{col} IS NOT OLD.{col}", col = binding.column);
            statements.push(format!(
                "UPDATE {table} SET retracted_by = {tx} \
                 WHERE e = OLD.id AND retracted_by IS NULL AND {changed};",
                table = binding.table,
                tx = tx,
                changed = changed,
            ));
            statements.push(format!(
                "INSERT INTO {table} (e, a, v_raw, tx) \
                 SELECT OLD.id, {attribute}, {value}, {tx} FROM {each} WHERE {changed};",
                table = binding.table,
                attribute = binding.attribute,
                value = element_raw(binding),
                tx = tx,
                each = exploded("NEW", &binding.column),
                changed = changed,
            ));
        } else {
            let changed = format!("{} IS NOT {}", raw(binding, "NEW"), raw(binding, "OLD"));
            statements.push(format!(
                "UPDATE {table} SET retracted_by = {tx} \
                 WHERE e = OLD.id AND retracted_by IS NULL AND {changed};",
                table = binding.table,
                tx = tx,
                changed = changed,
            ));
            statements.push(format!(
                "INSERT INTO {table} (e, a, v_raw, tx) \
                 SELECT OLD.id, {attribute}, {value}, {tx} \
                 WHERE NEW.{column} IS NOT NULL AND {changed};",
                table = binding.table,
                attribute = binding.attribute,
                value = raw(binding, "NEW"),
                tx = tx,
                column = binding.column,
                changed = changed,
            ));
        }
    }
    statements
}

fn delete_statements(plan: &ViewPlan) -> Vec<String> {
    let tx = allocated_id("tx");

    let mut statements = vec![bump("tx"), record_transaction()];
    for binding in plan.bindings() {
        statements.push(format!(
            "UPDATE {table} SET retracted_by = {tx} \
             WHERE e = OLD.id AND retracted_by IS NULL;",
            table = binding.table,
            tx = tx,
        ));
    }
    statements
}

fn trigger(target: &str, operation: &str, statements: Vec<String>) -> String {
    format!(
        "CREATE TRIGGER {target}_{operation} INSTEAD OF {keyword} ON {target} FOR EACH ROW\n\
         BEGIN\n    {body}\nEND",
        target = target,
        operation = operation,
        keyword = operation.to_uppercase(),
        body = statements.iter().join("\n    "),
    )
}

/// The six triggers for a view: insert, update and delete, attached to both
/// the dispatching view and its `_current` projection.
pub fn triggers(plan: &ViewPlan) -> Vec<String> {
    let mut out = vec![];
    for target in &[plan.name.clone(), format!("{}_current", plan.name)] {
        out.push(trigger(target, "insert", insert_statements(plan)));
        out.push(trigger(target, "update", update_statements(plan)));
        out.push(trigger(target, "delete", delete_statements(plan)));
    }
    out
}
