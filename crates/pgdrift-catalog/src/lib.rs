//! Immutable PostgreSQL catalog snapshots.
//!
//! A [`Catalog`] is a whole-schema snapshot of everything DDL-relevant in a
//! database: schemas, relations, columns, constraints, indexes, sequences,
//! policies, functions, triggers, user-defined types, and the raw dependency
//! edges between them. Snapshots are validated on construction and never
//! mutated afterwards; diffing and SQL generation treat them as read-only
//! values.
//!
//! Two catalogs extracted from *different* databases holding the same
//! logical schema compare equal under [`Catalog::semantically_equals`],
//! because comparison runs over identity and data fields only — extraction
//! internals such as OIDs are ignored. See the [`entity`] module for the
//! field-tag discipline.

mod entity;


use std::collections::HashSet;
use std::fmt;

use indexmap::IndexMap;
use thiserror::Error;

pub use entity::{
    Column, CompositeField, Constraint, ConstraintKind, DependEdge, DependKind, FkAction,
    Function, Index, Policy, PolicyCommand, Relation, RelationKind, Schema, SemanticEq, Sequence,
    SequenceOwner, Trigger, TypeDef, TypeShape,
};

/// Cross-snapshot identifier of a catalog entity, `prefix:qualified_name`.
///
/// | Prefix | Entity |
/// |--------|--------|
/// | `s`    | schema |
/// | `t`    | table |
/// | `v`    | view |
/// | `m`    | materialized view |
/// | `i`    | index |
/// | `S`    | sequence |
/// | `c`    | constraint |
/// | `tg`   | trigger |
/// | `f`    | function |
/// | `typ`  | custom type |
/// | `p`    | RLS policy |
/// | `col`  | column |
///
/// Ids are case-sensitive and use the literal entity name, never quoted.
/// Endpoints the extractor could not resolve use the reserved `unknown:`
/// prefix and are filtered out before dependency analysis.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StableId(String);

impl StableId {
    pub fn new(id: impl Into<String>) -> Self {
        StableId(id.into())
    }

    /// Placeholder for a dependency endpoint outside the catalog.
    pub fn unknown(class: &str, oid: u32) -> Self {
        StableId(format!("unknown:{class}.{oid}"))
    }

    pub fn is_unknown(&self) -> bool {
        self.0.starts_with("unknown:")
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for StableId {
    fn from(s: &str) -> Self {
        StableId(s.to_string())
    }
}

impl std::borrow::Borrow<str> for StableId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Catalog construction failure. These are invariant violations: the engine
/// refuses to operate on a snapshot that is internally inconsistent.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("duplicate stable id in catalog: {id}")]
    DuplicateStableId { id: StableId },

    #[error("{entity} references missing {missing}")]
    DanglingReference { entity: StableId, missing: StableId },
}

/// An immutable snapshot of a schema's DDL-relevant state.
///
/// Keyed collections are indexed by [`StableId`]; keys are unique across the
/// whole catalog, not just within a collection. Construct via
/// [`Catalog::builder`], which validates the invariants.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    schemas: IndexMap<StableId, Schema>,
    relations: IndexMap<StableId, Relation>,
    columns: IndexMap<StableId, Column>,
    constraints: IndexMap<StableId, Constraint>,
    indexes: IndexMap<StableId, Index>,
    sequences: IndexMap<StableId, Sequence>,
    policies: IndexMap<StableId, Policy>,
    functions: IndexMap<StableId, Function>,
    triggers: IndexMap<StableId, Trigger>,
    types: IndexMap<StableId, TypeDef>,
    depends: Vec<DependEdge>,
}

impl Catalog {
    pub fn builder() -> CatalogBuilder {
        CatalogBuilder::default()
    }

    /// A snapshot of an empty database.
    pub fn empty() -> Catalog {
        Catalog::default()
    }

    pub fn schemas(&self) -> &IndexMap<StableId, Schema> {
        &self.schemas
    }

    pub fn relations(&self) -> &IndexMap<StableId, Relation> {
        &self.relations
    }

    pub fn columns(&self) -> &IndexMap<StableId, Column> {
        &self.columns
    }

    pub fn constraints(&self) -> &IndexMap<StableId, Constraint> {
        &self.constraints
    }

    pub fn indexes(&self) -> &IndexMap<StableId, Index> {
        &self.indexes
    }

    pub fn sequences(&self) -> &IndexMap<StableId, Sequence> {
        &self.sequences
    }

    pub fn policies(&self) -> &IndexMap<StableId, Policy> {
        &self.policies
    }

    pub fn functions(&self) -> &IndexMap<StableId, Function> {
        &self.functions
    }

    pub fn triggers(&self) -> &IndexMap<StableId, Trigger> {
        &self.triggers
    }

    pub fn types(&self) -> &IndexMap<StableId, TypeDef> {
        &self.types
    }

    pub fn depends(&self) -> &[DependEdge] {
        &self.depends
    }

    /// Columns of a relation, ordered by their extractor-provided position.
    ///
    /// The order is observable: it decides column order in generated
    /// CREATE TABLE statements.
    pub fn columns_of(&self, relation_id: &StableId) -> Vec<&Column> {
        let mut cols: Vec<&Column> = self
            .columns
            .values()
            .filter(|c| &c.relation_stable_id() == relation_id)
            .collect();
        cols.sort_by_key(|c| c.position);
        cols
    }

    /// Look up a relation by its extraction OID. Used to resolve foreign-key
    /// referenced tables, which `pg_constraint` records by OID.
    pub fn relation_by_oid(&self, oid: u32) -> Option<&Relation> {
        self.relations.values().find(|r| r.oid == oid)
    }

    /// Whole-catalog semantic equality: the same set of stable ids, and each
    /// corresponding pair of entities semantically equal. Dependency edges
    /// don't participate.
    pub fn semantically_equals(&self, other: &Catalog) -> bool {
        self.semantic_differences(other).is_empty()
    }

    /// Human-readable description of every semantic difference to `other`.
    /// Empty iff the catalogs are semantically equal.
    pub fn semantic_differences(&self, other: &Catalog) -> Vec<String> {
        fn compare<T: SemanticEq>(
            out: &mut Vec<String>,
            left: &IndexMap<StableId, T>,
            right: &IndexMap<StableId, T>,
        ) {
            let mut ids: Vec<&StableId> = left.keys().chain(right.keys()).collect();
            ids.sort();
            ids.dedup();
            for id in ids {
                match (left.get(id), right.get(id)) {
                    (Some(_), None) => out.push(format!("only in left catalog: {id}")),
                    (None, Some(_)) => out.push(format!("only in right catalog: {id}")),
                    (Some(a), Some(b)) if !a.semantic_eq(b) => {
                        out.push(format!("differs: {id}"))
                    }
                    _ => {}
                }
            }
        }

        let mut out = Vec::new();
        compare(&mut out, &self.schemas, &other.schemas);
        compare(&mut out, &self.relations, &other.relations);
        compare(&mut out, &self.columns, &other.columns);
        compare(&mut out, &self.constraints, &other.constraints);
        compare(&mut out, &self.indexes, &other.indexes);
        compare(&mut out, &self.sequences, &other.sequences);
        compare(&mut out, &self.policies, &other.policies);
        compare(&mut out, &self.functions, &other.functions);
        compare(&mut out, &self.triggers, &other.triggers);
        compare(&mut out, &self.types, &other.types);
        out
    }
}

/// Builds and validates a [`Catalog`] from entity lists.
///
/// Validation enforces the catalog invariants:
/// - no duplicate stable id anywhere in the catalog,
/// - every non-schema entity's schema qualifier resolves to a schema,
/// - every column / constraint / index / trigger / policy references a
///   relation present in the catalog,
/// - every dependency endpoint is present, unless it is an `unknown:`
///   reference (those are discarded downstream instead).
#[derive(Debug, Default)]
pub struct CatalogBuilder {
    schemas: Vec<Schema>,
    relations: Vec<Relation>,
    columns: Vec<Column>,
    constraints: Vec<Constraint>,
    indexes: Vec<Index>,
    sequences: Vec<Sequence>,
    policies: Vec<Policy>,
    functions: Vec<Function>,
    triggers: Vec<Trigger>,
    types: Vec<TypeDef>,
    depends: Vec<DependEdge>,
}

impl CatalogBuilder {
    pub fn schemas(mut self, schemas: Vec<Schema>) -> Self {
        self.schemas = schemas;
        self
    }

    pub fn relations(mut self, relations: Vec<Relation>) -> Self {
        self.relations = relations;
        self
    }

    pub fn columns(mut self, columns: Vec<Column>) -> Self {
        self.columns = columns;
        self
    }

    pub fn constraints(mut self, constraints: Vec<Constraint>) -> Self {
        self.constraints = constraints;
        self
    }

    pub fn indexes(mut self, indexes: Vec<Index>) -> Self {
        self.indexes = indexes;
        self
    }

    pub fn sequences(mut self, sequences: Vec<Sequence>) -> Self {
        self.sequences = sequences;
        self
    }

    pub fn policies(mut self, policies: Vec<Policy>) -> Self {
        self.policies = policies;
        self
    }

    pub fn functions(mut self, functions: Vec<Function>) -> Self {
        self.functions = functions;
        self
    }

    pub fn triggers(mut self, triggers: Vec<Trigger>) -> Self {
        self.triggers = triggers;
        self
    }

    pub fn types(mut self, types: Vec<TypeDef>) -> Self {
        self.types = types;
        self
    }

    pub fn depends(mut self, depends: Vec<DependEdge>) -> Self {
        self.depends = depends;
        self
    }

    pub fn build(self) -> Result<Catalog, CatalogError> {
        fn index<T>(
            items: Vec<T>,
            id_of: impl Fn(&T) -> StableId,
            seen: &mut HashSet<StableId>,
        ) -> Result<IndexMap<StableId, T>, CatalogError> {
            let mut map = IndexMap::with_capacity(items.len());
            for item in items {
                let id = id_of(&item);
                if !seen.insert(id.clone()) {
                    return Err(CatalogError::DuplicateStableId { id });
                }
                map.insert(id, item);
            }
            Ok(map)
        }

        let mut seen = HashSet::new();
        let catalog = Catalog {
            schemas: index(self.schemas, Schema::stable_id, &mut seen)?,
            relations: index(self.relations, Relation::stable_id, &mut seen)?,
            columns: index(self.columns, Column::stable_id, &mut seen)?,
            constraints: index(self.constraints, Constraint::stable_id, &mut seen)?,
            indexes: index(self.indexes, Index::stable_id, &mut seen)?,
            sequences: index(self.sequences, Sequence::stable_id, &mut seen)?,
            policies: index(self.policies, Policy::stable_id, &mut seen)?,
            functions: index(self.functions, Function::stable_id, &mut seen)?,
            triggers: index(self.triggers, Trigger::stable_id, &mut seen)?,
            types: index(self.types, TypeDef::stable_id, &mut seen)?,
            depends: self.depends,
        };

        catalog.validate(&seen)?;
        Ok(catalog)
    }
}

impl Catalog {
    fn validate(&self, all_ids: &HashSet<StableId>) -> Result<(), CatalogError> {
        let dangling = |entity: StableId, missing: StableId| CatalogError::DanglingReference {
            entity,
            missing,
        };
        let schema_id = |name: &str| StableId::new(format!("s:{name}"));

        for r in self.relations.values() {
            let sid = schema_id(&r.schema);
            if !self.schemas.contains_key(&sid) {
                return Err(dangling(r.stable_id(), sid));
            }
        }
        for s in self.sequences.values() {
            let sid = schema_id(&s.schema);
            if !self.schemas.contains_key(&sid) {
                return Err(dangling(s.stable_id(), sid));
            }
            if let Some(owner) = s.owner_table_stable_id() {
                if !self.relations.contains_key(&owner) {
                    return Err(dangling(s.stable_id(), owner));
                }
            }
        }
        for f in self.functions.values() {
            let sid = schema_id(&f.schema);
            if !self.schemas.contains_key(&sid) {
                return Err(dangling(f.stable_id(), sid));
            }
        }
        for t in self.types.values() {
            let sid = schema_id(&t.schema);
            if !self.schemas.contains_key(&sid) {
                return Err(dangling(t.stable_id(), sid));
            }
        }
        for c in self.columns.values() {
            let rid = c.relation_stable_id();
            if !self.relations.contains_key(&rid) {
                return Err(dangling(c.stable_id(), rid));
            }
        }
        for c in self.constraints.values() {
            let tid = c.table_stable_id();
            if !self.relations.contains_key(&tid) {
                return Err(dangling(c.stable_id(), tid));
            }
        }
        for i in self.indexes.values() {
            let tid = i.table_stable_id();
            if !self.relations.contains_key(&tid) {
                return Err(dangling(i.stable_id(), tid));
            }
        }
        for t in self.triggers.values() {
            let tid = t.table_stable_id();
            if !self.relations.contains_key(&tid) {
                return Err(dangling(t.stable_id(), tid));
            }
        }
        for p in self.policies.values() {
            let tid = p.table_stable_id();
            if !self.relations.contains_key(&tid) {
                return Err(dangling(p.stable_id(), tid));
            }
        }
        for edge in &self.depends {
            for endpoint in [&edge.dependent, &edge.referenced] {
                if !endpoint.is_unknown() && !all_ids.contains(endpoint) {
                    return Err(CatalogError::DanglingReference {
                        entity: edge.dependent.clone(),
                        missing: endpoint.clone(),
                    });
                }
            }
        }
        Ok(())
    }
}
