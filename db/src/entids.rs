// Copyright 2018 Quint developers
//
// Licensed under the Apache License, Version 2.0 (the "License"); you may not use
// this file except in compliance with the License. You may obtain a copy of the
// License at http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software distributed
// under the License is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR
// CONDITIONS OF ANY KIND, either express or implied. See the License for the
// specific language governing permissions and limitations under the License.

//! Fixed entids seeded at bootstrap.  These live in the `db` partition and are
//! stable for the lifetime of any store.

use quint_core::{
    Cardinality,
    Entid,
    Unique,
    ValueType,
};

/// The bootstrap transaction carrying all system datoms.
pub const TX0: Entid = 0;

pub const DB_IDENT: Entid = 1;
pub const DB_VALUE_TYPE: Entid = 2;
pub const DB_CARDINALITY: Entid = 3;
pub const DB_UNIQUE: Entid = 4;
pub const DB_DOC: Entid = 5;

pub const DB_VIEW_IDENT: Entid = 10;
pub const DB_VIEW_ATTRIBUTES: Entid = 11;
pub const DB_VIEW_DOC: Entid = 12;
pub const DB_VIEW_OPTIONAL_ATTRIBUTES: Entid = 13;

/// The first value-type enum entity; `db.type/text` is 100, `db.type/ref` 112.
pub const DB_TYPE_BASE: Entid = 100;

pub const DB_CARDINALITY_ONE: Entid = 200;
pub const DB_CARDINALITY_MANY: Entid = 201;

pub const DB_UNIQUE_IDENTITY: Entid = 210;
pub const DB_UNIQUE_VALUE: Entid = 211;

/// The `db` partition counter after bootstrap; user schema ids start above it.
pub const DB_PARTITION_NEXT_ID: i64 = 300;

pub fn value_type_entid(value_type: ValueType) -> Entid {
    let index = ValueType::all()
        .iter()
        .position(|t| *t == value_type)
        .expect("every value type is in ValueType::all()");
    DB_TYPE_BASE + index as Entid
}

pub fn value_type_from_entid(entid: Entid) -> Option<ValueType> {
    if entid < DB_TYPE_BASE {
        return None;
    }
    ValueType::all().get((entid - DB_TYPE_BASE) as usize).cloned()
}

pub fn cardinality_entid(cardinality: Cardinality) -> Entid {
    match cardinality {
        Cardinality::One => DB_CARDINALITY_ONE,
        Cardinality::Many => DB_CARDINALITY_MANY,
    }
}

pub fn cardinality_from_entid(entid: Entid) -> Option<Cardinality> {
    match entid {
        DB_CARDINALITY_ONE => Some(Cardinality::One),
        DB_CARDINALITY_MANY => Some(Cardinality::Many),
        _ => None,
    }
}

pub fn unique_entid(unique: Unique) -> Entid {
    match unique {
        Unique::Identity => DB_UNIQUE_IDENTITY,
        Unique::Value => DB_UNIQUE_VALUE,
    }
}

pub fn unique_from_entid(entid: Entid) -> Option<Unique> {
    match entid {
        DB_UNIQUE_IDENTITY => Some(Unique::Identity),
        DB_UNIQUE_VALUE => Some(Unique::Value),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_type_entids() {
        assert_eq!(100, value_type_entid(ValueType::Text));
        assert_eq!(112, value_type_entid(ValueType::Ref));
        assert_eq!(Some(ValueType::Jsonb), value_type_from_entid(111));
        assert_eq!(None, value_type_from_entid(113));
        assert_eq!(None, value_type_from_entid(99));
    }

    #[test]
    fn test_enum_entids() {
        assert_eq!(Some(Cardinality::Many), cardinality_from_entid(201));
        assert_eq!(Some(Unique::Value), unique_from_entid(211));
        assert_eq!(None, cardinality_from_entid(210));
    }
}
