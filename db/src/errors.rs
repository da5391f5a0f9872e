// Copyright 2018 Quint developers
//
// Licensed under the Apache License, Version 2.0 (the "License"); you may not use
// this file except in compliance with the License. You may obtain a copy of the
// License at http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software distributed
// under the License is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR
// CONDITIONS OF ANY KIND, either express or implied. See the License for the
// specific language governing permissions and limitations under the License.

//! Error handling for the storage engine.  Host engine failures pass through
//! unchanged as the `Rusqlite` foreign link; everything else is a named kind.
//! All write-path errors abort the enclosing host transaction.

error_chain! {
    types {
        Error, ErrorKind, ResultExt, Result;
    }

    foreign_links {
        Rusqlite(::rusqlite::Error);
        Json(::serde_json::Error);
    }

    errors {
        /// The allocator was given a partition that does not exist.
        UnknownPartition(ident: String) {
            description("unknown partition")
            display("unknown partition: {}", ident)
        }

        /// A view definition or lookup referenced an ident with no attribute
        /// definition behind it.
        UnknownAttribute(ident: String) {
            description("unknown attribute")
            display("unknown attribute: {}", ident)
        }

        UnknownValueType(name: String) {
            description("unknown value type")
            display("unknown value type: {}", name)
        }

        UnknownCardinality(name: String) {
            description("unknown cardinality")
            display("unknown cardinality: {}", name)
        }

        UnknownUnique(name: String) {
            description("unknown uniqueness kind")
            display("unknown uniqueness kind: {}", name)
        }

        UnknownView(name: String) {
            description("unknown view")
            display("unknown view: {}", name)
        }

        /// A row value could not be converted to the attribute's logical type.
        ValueCoercion(value: String, value_type: String) {
            description("value coercion failed")
            display("cannot coerce {:?} to {}", value, value_type)
        }

        /// The view definition would produce an empty plan.
        ViewHasNoRequiredAttributes(name: String) {
            description("view has no required attributes")
            display("view {} has no required attributes", name)
        }

        /// An ident is already taken by an existing attribute or view.
        IdentAlreadyDefined(ident: String) {
            description("ident already defined")
            display("ident already defined: {}", ident)
        }

        /// A datom's value type does not match its attribute's declaration.
        ValueTypeMismatch(attribute: String, expected: String, got: String) {
            description("value type mismatch")
            display("attribute {} holds {}, not {}", attribute, expected, got)
        }
    }
}
