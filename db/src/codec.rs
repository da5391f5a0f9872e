// Copyright 2018 Quint developers
//
// Licensed under the Apache License, Version 2.0 (the "License"); you may not use
// this file except in compliance with the License. You may obtain a copy of the
// License at http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software distributed
// under the License is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR
// CONDITIONS OF ANY KIND, either express or implied. See the License for the
// specific language governing permissions and limitations under the License.

//! The value codec.
//!
//! Every datom stores its value twice: `v_raw`, a canonical text encoding that
//! is uniform across attributes (the parent relation stays homogeneous), and
//! `v_typed`, a stored column generated from `v_raw` in the attribute's
//! logical type.  This module owns both directions of that mapping:
//!
//! * `encode`/`decode` convert between `TypedValue` and the canonical text;
//! * `sql_column_type` and `typed_from_raw_sql` emit the generated-column
//!   declaration for an attribute relation;
//! * `raw_from_typed_sql` reconstructs the canonical text from a typed SQL
//!   expression, which is how trigger bodies encode incoming row values.
//!
//! Canonical forms are chosen so the typed projection sorts naturally:
//! timestamps are fixed-width RFC 3339 UTC (chronological = lexicographic),
//! bytea is lowercase hex (byte-wise = lexicographic), uuids are lowercase
//! hyphenated.

use chrono::{
    DateTime,
    NaiveDate,
    SecondsFormat,
    Utc,
};
use serde_json;
use uuid::Uuid;

use quint_core::{
    TypedValue,
    ValueType,
};

use errors::{
    ErrorKind,
    Result,
};

/// The SQLite column type of the typed projection for a logical type.
pub fn sql_column_type(value_type: ValueType) -> &'static str {
    match value_type {
        ValueType::Text
        | ValueType::Timestamptz
        | ValueType::Date
        | ValueType::Uuid
        | ValueType::Jsonb => "TEXT",
        ValueType::Int4 | ValueType::Int8 | ValueType::Bool | ValueType::Ref => "INTEGER",
        ValueType::Float4 | ValueType::Float8 => "REAL",
        ValueType::Numeric => "NUMERIC",
        ValueType::Bytea => "BLOB",
    }
}

/// The SQL expression deriving `v_typed` from a raw-text expression.  Used as
/// the body of the stored generated column.
pub fn typed_from_raw_sql(value_type: ValueType, raw: &str) -> String {
    match value_type {
        ValueType::Text
        | ValueType::Timestamptz
        | ValueType::Date
        | ValueType::Uuid
        | ValueType::Jsonb => raw.to_string(),
        ValueType::Int4 | ValueType::Int8 | ValueType::Ref => {
            format!("CAST({} AS INTEGER)", raw)
        },
        ValueType::Float4 | ValueType::Float8 => format!("CAST({} AS REAL)", raw),
        ValueType::Numeric => format!("CAST({} AS NUMERIC)", raw),
        ValueType::Bool => format!("CASE {} WHEN 'true' THEN 1 WHEN 'false' THEN 0 END", raw),
        ValueType::Bytea => format!("unhex({})", raw),
    }
}

/// The SQL expression reconstructing the canonical raw text from a typed
/// expression (a view column such as `NEW.name`).  NULL propagates.
pub fn raw_from_typed_sql(value_type: ValueType, typed: &str) -> String {
    match value_type {
        ValueType::Text
        | ValueType::Timestamptz
        | ValueType::Date
        | ValueType::Uuid
        | ValueType::Jsonb => typed.to_string(),
        ValueType::Int4
        | ValueType::Int8
        | ValueType::Ref
        | ValueType::Float4
        | ValueType::Float8
        | ValueType::Numeric => format!("CAST({} AS TEXT)", typed),
        ValueType::Bool => {
            format!("CASE {} WHEN 1 THEN 'true' WHEN 0 THEN 'false' END", typed)
        },
        ValueType::Bytea => {
            format!("CASE WHEN {} IS NULL THEN NULL ELSE lower(hex({})) END", typed, typed)
        },
    }
}

/// Encode a typed value into its canonical raw text.  Total on `TypedValue`.
pub fn encode(value: &TypedValue) -> String {
    match *value {
        TypedValue::Text(ref s) => s.clone(),
        TypedValue::Int4(i) => i.to_string(),
        TypedValue::Int8(i) => i.to_string(),
        TypedValue::Ref(e) => e.to_string(),
        // `{:?}` keeps a decimal point on round floats, matching SQLite's
        // CAST(REAL AS TEXT).
        TypedValue::Float4(f) => format!("{:?}", f),
        TypedValue::Float8(f) => format!("{:?}", f),
        TypedValue::Numeric(ref s) => s.clone(),
        TypedValue::Bool(b) => if b { "true".to_string() } else { "false".to_string() },
        TypedValue::Timestamptz(ref t) => t.to_rfc3339_opts(SecondsFormat::Millis, true),
        TypedValue::Date(ref d) => d.format("%Y-%m-%d").to_string(),
        TypedValue::Uuid(ref u) => u.to_string(),
        TypedValue::Bytea(ref b) => to_hex(b),
        TypedValue::Jsonb(ref j) => j.to_string(),
    }
}

/// Decode canonical raw text into a typed value.  Fails with `ValueCoercion`
/// when the text is not a valid canonical form for the type.
pub fn decode(value_type: ValueType, raw: &str) -> Result<TypedValue> {
    let coercion = || ErrorKind::ValueCoercion(raw.to_string(), value_type.ident());

    let value = match value_type {
        ValueType::Text => TypedValue::Text(raw.to_string()),
        ValueType::Int4 => TypedValue::Int4(raw.parse().map_err(|_| coercion())?),
        ValueType::Int8 => TypedValue::Int8(raw.parse().map_err(|_| coercion())?),
        ValueType::Ref => TypedValue::Ref(raw.parse().map_err(|_| coercion())?),
        ValueType::Float4 => TypedValue::Float4(raw.parse().map_err(|_| coercion())?),
        ValueType::Float8 => TypedValue::Float8(raw.parse().map_err(|_| coercion())?),
        ValueType::Numeric => TypedValue::Numeric(canonical_numeric(raw).ok_or_else(coercion)?),
        ValueType::Bool => match raw {
            "true" => TypedValue::Bool(true),
            "false" => TypedValue::Bool(false),
            _ => bail!(coercion()),
        },
        ValueType::Timestamptz => {
            let parsed = DateTime::parse_from_rfc3339(raw).map_err(|_| coercion())?;
            TypedValue::Timestamptz(parsed.with_timezone(&Utc))
        },
        ValueType::Date => {
            TypedValue::Date(NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| coercion())?)
        },
        ValueType::Uuid => TypedValue::Uuid(Uuid::parse_str(raw).map_err(|_| coercion())?),
        ValueType::Bytea => TypedValue::Bytea(from_hex(raw).ok_or_else(coercion)?),
        ValueType::Jsonb => TypedValue::Jsonb(serde_json::from_str(raw).map_err(|_| coercion())?),
    };

    Ok(value)
}

/// Normalise a decimal string: optional sign, no redundant zeros, no exponent.
/// Returns `None` when the input is not a plain decimal.
fn canonical_numeric(raw: &str) -> Option<String> {
    let (negative, digits) = match raw.as_bytes().first() {
        Some(&b'-') => (true, &raw[1..]),
        Some(&b'+') => (false, &raw[1..]),
        Some(_) => (false, raw),
        None => return None,
    };

    let mut parts = digits.splitn(2, '.');
    let int_part = parts.next().unwrap_or("");
    let frac_part = parts.next();

    if int_part.is_empty() && frac_part.map_or(true, str::is_empty) {
        return None;
    }
    if !int_part.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if let Some(frac) = frac_part {
        if !frac.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
    }

    let int_trimmed = int_part.trim_start_matches('0');
    let int_canonical = if int_trimmed.is_empty() { "0" } else { int_trimmed };
    let frac_canonical = frac_part.map(|f| f.trim_end_matches('0')).unwrap_or("");

    let mut out = String::new();
    out.push_str(int_canonical);
    if !frac_canonical.is_empty() {
        out.push('.');
        out.push_str(frac_canonical);
    }
    if negative && out != "0" {
        out.insert(0, '-');
    }
    Some(out)
}

fn to_hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        out.push_str(&format!("{:02x}", b));
    }
    out
}

fn from_hex(raw: &str) -> Option<Vec<u8>> {
    if raw.len() % 2 != 0 {
        return None;
    }
    let mut out = Vec::with_capacity(raw.len() / 2);
    let bytes = raw.as_bytes();
    for pair in bytes.chunks(2) {
        let hi = (pair[0] as char).to_digit(16)?;
        let lo = (pair[1] as char).to_digit(16)?;
        out.push((hi * 16 + lo) as u8);
    }
    Some(out)
}
