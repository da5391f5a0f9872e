// Copyright 2018 Quint developers
//
// Licensed under the Apache License, Version 2.0 (the "License"); you may not use
// this file except in compliance with the License. You may obtain a copy of the
// License at http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software distributed
// under the License is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR
// CONDITIONS OF ANY KIND, either express or implied. See the License for the
// specific language governing permissions and limitations under the License.

use values::ValueType;

/// How many current values an attribute may carry per entity.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialOrd, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Cardinality {
    One,
    Many,
}

impl Cardinality {
    pub fn short_name(&self) -> &'static str {
        match *self {
            Cardinality::One => "one",
            Cardinality::Many => "many",
        }
    }

    pub fn ident(&self) -> String {
        format!("db.cardinality/{}", self.short_name())
    }

    pub fn from_name(name: &str) -> Option<Cardinality> {
        match name {
            "one" | "db.cardinality/one" => Some(Cardinality::One),
            "many" | "db.cardinality/many" => Some(Cardinality::Many),
            _ => None,
        }
    }
}

/// Declared uniqueness metadata.  Declared, not enforced: clients may lean on
/// it, the core layer does not.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialOrd, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Unique {
    Identity,
    Value,
}

impl Unique {
    pub fn short_name(&self) -> &'static str {
        match *self {
            Unique::Identity => "identity",
            Unique::Value => "value",
        }
    }

    pub fn ident(&self) -> String {
        format!("db.unique/{}", self.short_name())
    }

    pub fn from_name(name: &str) -> Option<Unique> {
        match name {
            "identity" | "db.unique/identity" => Some(Unique::Identity),
            "value" | "db.unique/value" => Some(Unique::Value),
            _ => None,
        }
    }
}

/// An attribute definition: the facts carried by an attribute entity, in
/// struct form.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialOrd, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    /// The namespaced ident, e.g. `person/name`.  Unique across the store.
    pub ident: String,
    pub value_type: ValueType,
    pub cardinality: Cardinality,
    pub unique: Option<Unique>,
    pub doc: Option<String>,
}

impl Attribute {
    pub fn new<T>(ident: T, value_type: ValueType) -> Attribute
    where T: Into<String> {
        Attribute {
            ident: ident.into(),
            value_type: value_type,
            cardinality: Cardinality::One,
            unique: None,
            doc: None,
        }
    }

    pub fn many(mut self) -> Attribute {
        self.cardinality = Cardinality::Many;
        self
    }

    pub fn unique(mut self, unique: Unique) -> Attribute {
        self.unique = Some(unique);
        self
    }

    pub fn doc<T>(mut self, doc: T) -> Attribute
    where T: Into<String> {
        self.doc = Some(doc.into());
        self
    }

    pub fn is_many(&self) -> bool {
        self.cardinality == Cardinality::Many
    }
}

/// A view definition as a client states it: attribute references by ident.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialOrd, PartialEq, Serialize, Deserialize)]
pub struct ViewDefinition {
    pub name: String,
    pub required: Vec<String>,
    pub optional: Vec<String>,
    pub doc: Option<String>,
}

impl ViewDefinition {
    pub fn new<T>(name: T, required: &[&str]) -> ViewDefinition
    where T: Into<String> {
        ViewDefinition {
            name: name.into(),
            required: required.iter().map(|s| s.to_string()).collect(),
            optional: vec![],
            doc: None,
        }
    }

    pub fn optional(mut self, optional: &[&str]) -> ViewDefinition {
        self.optional = optional.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn doc<T>(mut self, doc: T) -> ViewDefinition
    where T: Into<String> {
        self.doc = Some(doc.into());
        self
    }
}

/// A partial update to a stored view definition.  `None` fields are left
/// untouched.
#[derive(Clone, Debug, Default, Eq, Hash, Ord, PartialOrd, PartialEq, Serialize, Deserialize)]
pub struct ViewUpdate {
    pub name: Option<String>,
    pub required: Option<Vec<String>>,
    pub optional: Option<Vec<String>>,
    pub doc: Option<String>,
}
