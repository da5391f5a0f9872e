// Copyright 2018 Quint developers
//
// Licensed under the Apache License, Version 2.0 (the "License"); you may not use
// this file except in compliance with the License. You may obtain a copy of the
// License at http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software distributed
// under the License is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR
// CONDITIONS OF ANY KIND, either express or implied. See the License for the
// specific language governing permissions and limitations under the License.

use std::collections::BTreeMap;

use attributes::Attribute;

/// An entity id.  The high 16 bits carry the partition id, the low 48 bits the
/// per-partition counter.
pub type Entid = i64;

const COUNTER_BITS: u32 = 48;
const COUNTER_MASK: i64 = (1i64 << COUNTER_BITS) - 1;

/// Encode a partition id and a counter into an entity id.
pub fn entid(partition: u16, counter: i64) -> Entid {
    ((partition as i64) << COUNTER_BITS) | (counter & COUNTER_MASK)
}

/// The partition id carried in the high 16 bits of an entity id.
pub fn partition_of(e: Entid) -> u16 {
    (e >> COUNTER_BITS) as u16
}

/// The per-partition counter carried in the low 48 bits of an entity id.
pub fn counter_of(e: Entid) -> i64 {
    e & COUNTER_MASK
}

/// Represents one partition of the entid space.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialOrd, PartialEq, Serialize, Deserialize)]
pub struct Partition {
    /// The numeric partition id, fixed at bootstrap.
    pub id: u16,
    /// The partition's name, e.g. `user`.
    pub ident: String,
    /// The counter most recently handed out; monotonically increasing.
    pub next_id: i64,
}

impl Partition {
    pub fn new<T>(id: u16, ident: T, next_id: i64) -> Partition
    where T: Into<String> {
        Partition {
            id: id,
            ident: ident.into(),
            next_id: next_id,
        }
    }
}

/// Map partition names to `Partition` instances.
pub type PartitionMap = BTreeMap<String, Partition>;

/// Map `String` idents (`db/ident`) to positive integer entids (`1`).
pub type IdentMap = BTreeMap<String, Entid>;

/// Map positive integer entids (`1`) to `String` idents (`db/ident`).
pub type EntidMap = BTreeMap<Entid, String>;

/// A stored view definition with its attribute references resolved to entids.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialOrd, PartialEq, Serialize, Deserialize)]
pub struct View {
    /// The entity carrying the view's definition datoms.
    pub id: Entid,
    /// The table-shaped name of the view.
    pub name: String,
    /// Attributes every row must possess.  Non-empty for a usable view.
    pub required: Vec<Entid>,
    /// Attributes a row may possess.
    pub optional: Vec<Entid>,
    pub doc: Option<String>,
}

/// Map view names to resolved `View` definitions.
pub type ViewMap = BTreeMap<String, View>;

/// The in-memory registry of everything the store knows about itself.
///
/// Maintains the mapping between string idents and positive integer entids, the
/// attribute definition associated to a given entid, and the stored view
/// definitions.  The maps are reconstructed from datoms on open; the store is
/// self-describing and this is purely a cache.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Schema {
    /// Map entid->ident.
    ///
    /// Invariant: is the inverse map of `ident_map`.
    pub entid_map: EntidMap,

    /// Map ident->entid.
    ///
    /// Invariant: is the inverse map of `entid_map`.
    pub ident_map: IdentMap,

    /// Map entid->attribute definition.
    ///
    /// Invariant: key-set is a subset of the key-set of `entid_map`; entities
    /// that are idents but not attributes (the value-type and cardinality
    /// enums) appear only in the ident maps.
    pub attribute_map: BTreeMap<Entid, Attribute>,

    /// Map view name->resolved view definition.
    pub view_map: ViewMap,
}

impl Schema {
    /// Resolve an ident to its entid.  Covers every ident in the store, not
    /// just attributes; `db.type/ref` and friends resolve here too.
    pub fn entid_for_ident(&self, ident: &str) -> Option<Entid> {
        self.ident_map.get(ident).cloned()
    }

    pub fn ident_for_entid(&self, entid: Entid) -> Option<&String> {
        self.entid_map.get(&entid)
    }

    pub fn attribute_for_entid(&self, entid: Entid) -> Option<&Attribute> {
        self.attribute_map.get(&entid)
    }

    pub fn attribute_for_ident(&self, ident: &str) -> Option<(Entid, &Attribute)> {
        self.entid_for_ident(ident)
            .and_then(|e| self.attribute_map.get(&e).map(|a| (e, a)))
    }

    pub fn view(&self, name: &str) -> Option<&View> {
        self.view_map.get(name)
    }

    /// Record a fresh ident.  Keeps the inverse-map invariant.
    pub fn add_ident<T>(&mut self, entid: Entid, ident: T)
    where T: Into<String> {
        let ident = ident.into();
        self.ident_map.insert(ident.clone(), entid);
        self.entid_map.insert(entid, ident);
    }

    /// Record a fresh attribute definition under its entid.
    pub fn add_attribute(&mut self, entid: Entid, attribute: Attribute) {
        self.add_ident(entid, attribute.ident.clone());
        self.attribute_map.insert(entid, attribute);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entid_round_trip() {
        let e = entid(2, 1);
        assert_eq!(2, partition_of(e));
        assert_eq!(1, counter_of(e));
        assert_eq!((2 << 48) | 1, e);

        // The db partition occupies the low id space unshifted.
        assert_eq!(17, entid(0, 17));
    }

    #[test]
    fn test_schema_inverse_maps() {
        let mut schema = Schema::default();
        schema.add_ident(100, "db.type/text");
        assert_eq!(Some(100), schema.entid_for_ident("db.type/text"));
        assert_eq!(Some(&"db.type/text".to_string()), schema.ident_for_entid(100));
        assert_eq!(None, schema.attribute_for_entid(100));
    }
}
