//! Catalog construction helpers for tests.
//!
//! Builds validated [`Catalog`] values from terse descriptions, including the
//! dependency edges the extractor would have recorded (relation -> schema,
//! index -> table, constraint -> table, sequence OWNED BY, ...). Used by this
//! crate's unit and integration tests; not part of the stable API.

use pgdrift_catalog::{
    Catalog, Column, CompositeField, Constraint, ConstraintKind, DependEdge, DependKind, FkAction,
    Function, Index, Policy, PolicyCommand, Relation, RelationKind, Schema, Sequence,
    SequenceOwner, StableId, Trigger, TypeDef, TypeShape,
};

/// Build a catalog from a closure over a [`CatalogFixture`].
///
/// Panics on invariant violations; fixtures are expected to be well-formed.
pub fn catalog_with(build: impl FnOnce(&mut CatalogFixture)) -> Catalog {
    let mut fixture = CatalogFixture::default();
    build(&mut fixture);
    fixture.finish()
}

#[derive(Default)]
pub struct CatalogFixture {
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
    next_oid: u32,
}

/// Collects columns for one table inside [`CatalogFixture::table_built`].
#[derive(Default)]
pub struct TableFixture {
    columns: Vec<(String, String, bool, Option<String>, Option<String>)>,
}

impl TableFixture {
    /// `(name, type, nullable)`; not-null when `nullable` is false.
    pub fn column(&mut self, name: &str, type_name: &str, nullable: bool) {
        self.columns
            .push((name.to_string(), type_name.to_string(), nullable, None, None));
    }

    pub fn column_with_default(&mut self, name: &str, type_name: &str, default: &str) {
        self.columns.push((
            name.to_string(),
            type_name.to_string(),
            true,
            Some(default.to_string()),
            None,
        ));
    }

    pub fn generated_column(&mut self, name: &str, type_name: &str, expression: &str) {
        self.columns.push((
            name.to_string(),
            type_name.to_string(),
            true,
            None,
            Some(expression.to_string()),
        ));
    }
}

impl CatalogFixture {
    fn oid(&mut self) -> u32 {
        self.next_oid += 1;
        16384 + self.next_oid
    }

    fn depend(&mut self, dependent: StableId, referenced: StableId, kind: DependKind) {
        self.depends.push(DependEdge {
            dependent,
            referenced,
            kind,
        });
    }

    /// Record an explicit normal dependency edge, e.g. a view's reference to
    /// a table (recovered from rewrite rules during real extraction).
    pub fn edge(&mut self, dependent: &str, referenced: &str) {
        self.depend(
            StableId::from(dependent),
            StableId::from(referenced),
            DependKind::Normal,
        );
    }

    pub fn schema(&mut self, name: &str) {
        let oid = self.oid();
        self.schemas.push(Schema {
            name: name.to_string(),
            oid,
        });
    }

    /// A table from `(name, type, nullable)` column triples.
    pub fn table(&mut self, schema: &str, name: &str, columns: &[(&str, &str, bool)]) {
        self.table_inner(schema, name, false, |t| {
            for (col, ty, nullable) in columns {
                t.column(col, ty, *nullable);
            }
        });
    }

    /// A table with row-level security enabled.
    pub fn rls_table(&mut self, schema: &str, name: &str, columns: &[(&str, &str, bool)]) {
        self.table_inner(schema, name, true, |t| {
            for (col, ty, nullable) in columns {
                t.column(col, ty, *nullable);
            }
        });
    }

    /// A table described through a [`TableFixture`], for defaults and
    /// generated columns.
    pub fn table_built(&mut self, schema: &str, name: &str, build: impl FnOnce(&mut TableFixture)) {
        self.table_inner(schema, name, false, build);
    }

    fn table_inner(
        &mut self,
        schema: &str,
        name: &str,
        row_security: bool,
        build: impl FnOnce(&mut TableFixture),
    ) {
        let mut t = TableFixture::default();
        build(&mut t);

        let oid = self.oid();
        let rel = Relation {
            name: name.to_string(),
            schema: schema.to_string(),
            kind: RelationKind::Table,
            definition: None,
            row_security,
            oid,
        };
        self.depend(rel.stable_id(), StableId::new(format!("s:{schema}")), DependKind::Normal);
        self.relations.push(rel);

        for (position, (col, ty, nullable, default, generated)) in t.columns.into_iter().enumerate()
        {
            self.columns.push(Column {
                schema: schema.to_string(),
                table: name.to_string(),
                name: col,
                position: position as i16 + 1,
                not_null: !nullable,
                type_name: ty,
                default,
                generated,
                relation_kind: RelationKind::Table,
                relation_oid: oid,
            });
        }
    }

    pub fn view(&mut self, schema: &str, name: &str, definition: &str) {
        self.relation_with_definition(schema, name, RelationKind::View, definition);
    }

    pub fn materialized_view(&mut self, schema: &str, name: &str, definition: &str) {
        self.relation_with_definition(schema, name, RelationKind::MaterializedView, definition);
    }

    fn relation_with_definition(
        &mut self,
        schema: &str,
        name: &str,
        kind: RelationKind,
        definition: &str,
    ) {
        let oid = self.oid();
        let rel = Relation {
            name: name.to_string(),
            schema: schema.to_string(),
            kind,
            definition: Some(definition.to_string()),
            row_security: false,
            oid,
        };
        self.depend(rel.stable_id(), StableId::new(format!("s:{schema}")), DependKind::Normal);
        self.relations.push(rel);
    }

    pub fn sequence(&mut self, schema: &str, name: &str) {
        let oid = self.oid();
        let seq = Sequence {
            name: name.to_string(),
            schema: schema.to_string(),
            data_type: "bigint".to_string(),
            increment: 1,
            min_value: Some(1),
            max_value: Some(9223372036854775807),
            start: 1,
            cache: 1,
            cycle: false,
            owned_by: None,
            oid,
        };
        self.depend(seq.stable_id(), StableId::new(format!("s:{schema}")), DependKind::Normal);
        self.sequences.push(seq);
    }

    /// A sequence `OWNED BY table.column`, with the auto dependency edge
    /// PostgreSQL records for ownership.
    pub fn owned_sequence(&mut self, schema: &str, name: &str, table: &str, column: &str) {
        self.sequence(schema, name);
        let seq = self.sequences.last_mut().expect("just pushed");
        seq.owned_by = Some(SequenceOwner {
            table: table.to_string(),
            column: column.to_string(),
        });
        let seq_id = seq.stable_id();
        self.depend(seq_id, StableId::new(format!("t:{schema}.{table}")), DependKind::Auto);
    }

    pub fn index(&mut self, schema: &str, table: &str, name: &str, definition: &str) {
        self.index_inner(schema, table, name, definition, false);
    }

    /// An index implicitly created by a constraint.
    pub fn constraint_index(&mut self, schema: &str, table: &str, name: &str) {
        self.index_inner(schema, table, name, "", true);
    }

    fn index_inner(
        &mut self,
        schema: &str,
        table: &str,
        name: &str,
        definition: &str,
        backs_constraint: bool,
    ) {
        let oid = self.oid();
        let table_oid = self.relation_oid(schema, table);
        let index = Index {
            name: name.to_string(),
            schema: schema.to_string(),
            table: table.to_string(),
            unique: false,
            primary: false,
            backs_constraint,
            definition: definition.to_string(),
            oid,
            table_oid,
            table_kind: RelationKind::Table,
        };
        self.depend(index.stable_id(), index.table_stable_id(), DependKind::Auto);
        self.indexes.push(index);
    }

    pub fn check_constraint(&mut self, schema: &str, table: &str, name: &str, expression: &str) {
        let oid = self.oid();
        let table_oid = self.relation_oid(schema, table);
        let con = Constraint {
            name: name.to_string(),
            schema: schema.to_string(),
            table: table.to_string(),
            kind: ConstraintKind::Check,
            deferrable: false,
            deferred: false,
            key_columns: vec![],
            fk_ref_columns: vec![],
            fk_update_action: FkAction::NoAction,
            fk_delete_action: FkAction::NoAction,
            expression: Some(expression.to_string()),
            predicate: None,
            exclusion_definition: None,
            oid,
            table_oid,
            fk_ref_table_oid: 0,
        };
        self.depend(con.stable_id(), con.table_stable_id(), DependKind::Auto);
        self.constraints.push(con);
    }

    #[allow(clippy::too_many_arguments)]
    pub fn foreign_key(
        &mut self,
        schema: &str,
        table: &str,
        name: &str,
        key_columns: &[i16],
        referenced_table: &str,
        referenced_columns: &[i16],
        deferrable: bool,
    ) {
        let oid = self.oid();
        let table_oid = self.relation_oid(schema, table);
        let fk_ref_table_oid = self.relation_oid(schema, referenced_table);
        let con = Constraint {
            name: name.to_string(),
            schema: schema.to_string(),
            table: table.to_string(),
            kind: ConstraintKind::ForeignKey,
            deferrable,
            deferred: deferrable,
            key_columns: key_columns.to_vec(),
            fk_ref_columns: referenced_columns.to_vec(),
            fk_update_action: FkAction::NoAction,
            fk_delete_action: FkAction::NoAction,
            expression: None,
            predicate: None,
            exclusion_definition: None,
            oid,
            table_oid,
            fk_ref_table_oid,
        };
        self.depend(con.stable_id(), con.table_stable_id(), DependKind::Auto);
        self.depend(
            con.stable_id(),
            StableId::new(format!("t:{schema}.{referenced_table}")),
            DependKind::Normal,
        );
        self.constraints.push(con);
    }

    pub fn policy(
        &mut self,
        schema: &str,
        table: &str,
        name: &str,
        command: PolicyCommand,
        using_expr: &str,
    ) {
        let oid = self.oid();
        let policy = Policy {
            name: name.to_string(),
            schema: schema.to_string(),
            table: table.to_string(),
            command,
            permissive: true,
            roles: vec!["public".to_string()],
            using_expr: Some(using_expr.to_string()),
            check_expr: None,
            oid,
        };
        self.depend(policy.stable_id(), policy.table_stable_id(), DependKind::Auto);
        self.policies.push(policy);
    }

    pub fn function(&mut self, schema: &str, name: &str, arguments: &str, definition: &str) {
        let oid = self.oid();
        let func = Function {
            name: name.to_string(),
            schema: schema.to_string(),
            arguments: arguments.to_string(),
            definition: definition.to_string(),
            oid,
        };
        self.depend(func.stable_id(), StableId::new(format!("s:{schema}")), DependKind::Normal);
        self.functions.push(func);
    }

    pub fn trigger(&mut self, schema: &str, table: &str, name: &str, definition: &str) {
        let oid = self.oid();
        let table_oid = self.relation_oid(schema, table);
        let trigger = Trigger {
            name: name.to_string(),
            schema: schema.to_string(),
            table: table.to_string(),
            definition: definition.to_string(),
            oid,
            table_oid,
            function_oid: 0,
            table_kind: RelationKind::Table,
        };
        self.depend(trigger.stable_id(), trigger.table_stable_id(), DependKind::Auto);
        self.triggers.push(trigger);
    }

    pub fn enum_type(&mut self, schema: &str, name: &str, values: &[&str]) {
        let oid = self.oid();
        let ty = TypeDef {
            name: name.to_string(),
            schema: schema.to_string(),
            shape: TypeShape::Enum {
                values: values.iter().map(|v| v.to_string()).collect(),
            },
            oid,
        };
        self.depend(ty.stable_id(), StableId::new(format!("s:{schema}")), DependKind::Normal);
        self.types.push(ty);
    }

    pub fn composite_type(&mut self, schema: &str, name: &str, fields: &[(&str, &str)]) {
        let oid = self.oid();
        let ty = TypeDef {
            name: name.to_string(),
            schema: schema.to_string(),
            shape: TypeShape::Composite {
                fields: fields
                    .iter()
                    .enumerate()
                    .map(|(i, (field, ty))| CompositeField {
                        name: field.to_string(),
                        type_name: ty.to_string(),
                        position: i as i16 + 1,
                        not_null: false,
                    })
                    .collect(),
            },
            oid,
        };
        self.depend(ty.stable_id(), StableId::new(format!("s:{schema}")), DependKind::Normal);
        self.types.push(ty);
    }

    fn relation_oid(&self, schema: &str, name: &str) -> u32 {
        self.relations
            .iter()
            .find(|r| r.schema == schema && r.name == name)
            .map(|r| r.oid)
            .unwrap_or(0)
    }

    fn finish(self) -> Catalog {
        Catalog::builder()
            .schemas(self.schemas)
            .relations(self.relations)
            .columns(self.columns)
            .constraints(self.constraints)
            .indexes(self.indexes)
            .sequences(self.sequences)
            .policies(self.policies)
            .functions(self.functions)
            .triggers(self.triggers)
            .types(self.types)
            .depends(self.depends)
            .build()
            .expect("test fixture produced an invalid catalog")
    }
}
