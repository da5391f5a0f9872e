// Copyright 2018 Quint developers
//
// Licensed under the Apache License, Version 2.0 (the "License"); you may not use
// this file except in compliance with the License. You may obtain a copy of the
// License at http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software distributed
// under the License is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR
// CONDITIONS OF ANY KIND, either express or implied. See the License for the
// specific language governing permissions and limitations under the License.

use std::fmt;

use chrono::{
    DateTime,
    NaiveDate,
    Utc,
};
use serde_json;
use uuid::Uuid;

use types::Entid;

/// The closed set of logical value types an attribute may carry.
///
/// The set is closed and stable; everything that dispatches on a value's type
/// (the stored representation, the typed projection column, the canonical-form
/// conversions) matches on this enum.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialOrd, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    Text,
    Int4,
    Int8,
    Float4,
    Float8,
    Numeric,
    Bool,
    Timestamptz,
    Date,
    Uuid,
    Bytea,
    Jsonb,
    Ref,
}

impl ValueType {
    /// Every member, in bootstrap order.  The position of a member in this
    /// slice is stable; the bootstrap enum entities are numbered from it.
    pub fn all() -> &'static [ValueType] {
        &[ValueType::Text,
          ValueType::Int4,
          ValueType::Int8,
          ValueType::Float4,
          ValueType::Float8,
          ValueType::Numeric,
          ValueType::Bool,
          ValueType::Timestamptz,
          ValueType::Date,
          ValueType::Uuid,
          ValueType::Bytea,
          ValueType::Jsonb,
          ValueType::Ref]
    }

    /// The short name, as used in attribute declarations: `text`, `int8`, …
    pub fn short_name(&self) -> &'static str {
        match *self {
            ValueType::Text => "text",
            ValueType::Int4 => "int4",
            ValueType::Int8 => "int8",
            ValueType::Float4 => "float4",
            ValueType::Float8 => "float8",
            ValueType::Numeric => "numeric",
            ValueType::Bool => "bool",
            ValueType::Timestamptz => "timestamptz",
            ValueType::Date => "date",
            ValueType::Uuid => "uuid",
            ValueType::Bytea => "bytea",
            ValueType::Jsonb => "jsonb",
            ValueType::Ref => "ref",
        }
    }

    /// The namespaced ident of the enum entity describing this type.
    pub fn ident(&self) -> String {
        format!("db.type/{}", self.short_name())
    }

    /// Parse either a short name (`text`) or a full ident (`db.type/text`).
    pub fn from_name(name: &str) -> Option<ValueType> {
        let short = if name.starts_with("db.type/") {
            &name["db.type/".len()..]
        } else {
            name
        };
        ValueType::all().iter().cloned().find(|t| t.short_name() == short)
    }

    pub fn is_ref(&self) -> bool {
        *self == ValueType::Ref
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.ident())
    }
}

/// A value in the store, tagged with its logical type.
///
/// `Numeric` carries the canonical decimal string form rather than a binary
/// representation: arbitrary-precision decimals round-trip exactly and compare
/// in the host engine, not here.
#[derive(Clone, Debug, PartialEq)]
pub enum TypedValue {
    Text(String),
    Int4(i32),
    Int8(i64),
    Float4(f32),
    Float8(f64),
    Numeric(String),
    Bool(bool),
    Timestamptz(DateTime<Utc>),
    Date(NaiveDate),
    Uuid(Uuid),
    Bytea(Vec<u8>),
    Jsonb(serde_json::Value),
    Ref(Entid),
}

impl TypedValue {
    pub fn value_type(&self) -> ValueType {
        match *self {
            TypedValue::Text(_) => ValueType::Text,
            TypedValue::Int4(_) => ValueType::Int4,
            TypedValue::Int8(_) => ValueType::Int8,
            TypedValue::Float4(_) => ValueType::Float4,
            TypedValue::Float8(_) => ValueType::Float8,
            TypedValue::Numeric(_) => ValueType::Numeric,
            TypedValue::Bool(_) => ValueType::Bool,
            TypedValue::Timestamptz(_) => ValueType::Timestamptz,
            TypedValue::Date(_) => ValueType::Date,
            TypedValue::Uuid(_) => ValueType::Uuid,
            TypedValue::Bytea(_) => ValueType::Bytea,
            TypedValue::Jsonb(_) => ValueType::Jsonb,
            TypedValue::Ref(_) => ValueType::Ref,
        }
    }

    /// Construct a `Text` value; mirrors the common case at call sites.
    pub fn text<T>(value: T) -> TypedValue
    where T: Into<String> {
        TypedValue::Text(value.into())
    }
}

impl From<String> for TypedValue {
    fn from(value: String) -> TypedValue {
        TypedValue::Text(value)
    }
}

impl<'a> From<&'a str> for TypedValue {
    fn from(value: &'a str) -> TypedValue {
        TypedValue::Text(value.to_string())
    }
}

impl From<bool> for TypedValue {
    fn from(value: bool) -> TypedValue {
        TypedValue::Bool(value)
    }
}
