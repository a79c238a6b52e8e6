//! Per-entity diffing - compare two catalog snapshots and produce changes.
//!
//! [`collect_changes`] walks every keyed entity collection and applies the
//! generic element diff: keys only in the target become `Create`, keys only
//! in the source become `Drop`, keys in both that compare semantically
//! unequal become `Alter` / `Replace` where the entity supports it, and
//! `Drop` + `Create` otherwise. Table columns are diffed specially and
//! packaged into a single `AlterTable` per table.
//!
//! The result is *unordered* but reproducible: within each entity kind,
//! changes come out in lexicographic stable-id order. [`diff`] runs the
//! resolver on top and returns a valid execution order.

use pgdrift_catalog::{Catalog, Column, Relation, RelationKind, SemanticEq, StableId};

use crate::change::{Change, TableOp};
use crate::error::Error;
use crate::resolve;

/// Diff two catalogs and return changes ordered for execution.
///
/// Pure and deterministic: structurally equal inputs produce an identical
/// change list. Fails only when the constraint graph is cyclic.
pub fn diff(source: &Catalog, target: &Catalog) -> Result<Vec<Change>, Error> {
    let changes = collect_changes(source, target);
    resolve::resolve(changes, source, target)
}

/// Produce the unordered change stream transforming `source` into `target`.
pub fn collect_changes(source: &Catalog, target: &Catalog) -> Vec<Change> {
    let mut changes = Vec::new();
    diff_schemas(source, target, &mut changes);
    diff_types(source, target, &mut changes);
    diff_sequences(source, target, &mut changes);
    diff_relations(source, target, &mut changes);
    diff_functions(source, target, &mut changes);
    diff_constraints(source, target, &mut changes);
    diff_indexes(source, target, &mut changes);
    diff_policies(source, target, &mut changes);
    diff_triggers(source, target, &mut changes);
    tracing::debug!(changes = changes.len(), "collected change stream");
    changes
}

/// Sorted union of the keys of two collections.
fn sorted_ids<'a, T>(
    left: &'a indexmap::IndexMap<StableId, T>,
    right: &'a indexmap::IndexMap<StableId, T>,
) -> Vec<&'a StableId> {
    let mut ids: Vec<&StableId> = left.keys().chain(right.keys()).collect();
    ids.sort();
    ids.dedup();
    ids
}

fn diff_schemas(source: &Catalog, target: &Catalog, changes: &mut Vec<Change>) {
    for id in sorted_ids(source.schemas(), target.schemas()) {
        match (source.schemas().get(id), target.schemas().get(id)) {
            (None, Some(schema)) => {
                // public always exists; creating it would fail.
                if schema.name != "public" {
                    changes.push(Change::CreateSchema {
                        stable_id: id.clone(),
                        name: schema.name.clone(),
                    });
                }
            }
            (Some(schema), None) => changes.push(Change::DropSchema {
                stable_id: id.clone(),
                name: schema.name.clone(),
            }),
            // Schemas carry nothing but their identity.
            _ => {}
        }
    }
}

fn diff_types(source: &Catalog, target: &Catalog, changes: &mut Vec<Change>) {
    for id in sorted_ids(source.types(), target.types()) {
        match (source.types().get(id), target.types().get(id)) {
            (None, Some(ty)) => changes.push(Change::CreateType {
                stable_id: id.clone(),
                type_def: ty.clone(),
            }),
            (Some(ty), None) => changes.push(Change::DropType {
                stable_id: id.clone(),
                schema: ty.schema.clone(),
                name: ty.name.clone(),
            }),
            (Some(old), Some(new)) if !old.semantic_eq(new) => {
                // No safe in-place ALTER TYPE for these shapes.
                changes.push(Change::DropType {
                    stable_id: id.clone(),
                    schema: old.schema.clone(),
                    name: old.name.clone(),
                });
                changes.push(Change::CreateType {
                    stable_id: id.clone(),
                    type_def: new.clone(),
                });
            }
            _ => {}
        }
    }
}

fn diff_sequences(source: &Catalog, target: &Catalog, changes: &mut Vec<Change>) {
    for id in sorted_ids(source.sequences(), target.sequences()) {
        match (source.sequences().get(id), target.sequences().get(id)) {
            (None, Some(seq)) => {
                changes.push(Change::CreateSequence {
                    stable_id: id.clone(),
                    sequence: seq.clone(),
                });
                // Ownership is established separately: the owning table may
                // not exist yet at sequence creation time.
                if seq.owned_by.is_some() {
                    changes.push(Change::AlterSequenceOwner {
                        stable_id: id.clone(),
                        schema: seq.schema.clone(),
                        name: seq.name.clone(),
                        owner: seq.owned_by.clone(),
                    });
                }
            }
            (Some(seq), None) => changes.push(Change::DropSequence {
                stable_id: id.clone(),
                schema: seq.schema.clone(),
                name: seq.name.clone(),
            }),
            (Some(old), Some(new)) if !old.semantic_eq(new) => {
                changes.push(Change::AlterSequence {
                    stable_id: id.clone(),
                    old: old.clone(),
                    new: new.clone(),
                });
            }
            _ => {}
        }
    }
}

fn diff_relations(source: &Catalog, target: &Catalog, changes: &mut Vec<Change>) {
    for id in sorted_ids(source.relations(), target.relations()) {
        let source_rel = source.relations().get(id);
        let target_rel = target.relations().get(id);
        let kind = source_rel.or(target_rel).map(|r| r.kind);
        match kind {
            Some(RelationKind::Table) => {
                diff_table(source, target, id, source_rel, target_rel, changes)
            }
            Some(RelationKind::View) => diff_view(id, source_rel, target_rel, changes),
            Some(RelationKind::MaterializedView) => {
                diff_materialized_view(id, source_rel, target_rel, changes)
            }
            None => {}
        }
    }
}

fn diff_table(
    source: &Catalog,
    target: &Catalog,
    id: &StableId,
    source_rel: Option<&Relation>,
    target_rel: Option<&Relation>,
    changes: &mut Vec<Change>,
) {
    match (source_rel, target_rel) {
        (None, Some(rel)) => {
            changes.push(Change::CreateTable {
                stable_id: id.clone(),
                schema: rel.schema.clone(),
                name: rel.name.clone(),
                columns: target.columns_of(id).into_iter().cloned().collect(),
            });
            if rel.row_security {
                changes.push(Change::AlterTable {
                    stable_id: id.clone(),
                    schema: rel.schema.clone(),
                    name: rel.name.clone(),
                    ops: vec![TableOp::EnableRowSecurity],
                });
            }
        }
        (Some(rel), None) => changes.push(Change::DropTable {
            stable_id: id.clone(),
            schema: rel.schema.clone(),
            name: rel.name.clone(),
        }),
        (Some(old), Some(new)) => {
            let mut ops = Vec::new();
            if old.row_security != new.row_security {
                ops.push(if new.row_security {
                    TableOp::EnableRowSecurity
                } else {
                    TableOp::DisableRowSecurity
                });
            }
            ops.extend(diff_table_columns(source, target, id));
            if !ops.is_empty() {
                changes.push(Change::AlterTable {
                    stable_id: id.clone(),
                    schema: new.schema.clone(),
                    name: new.name.clone(),
                    ops,
                });
            }
        }
        (None, None) => {}
    }
}

/// Column-level sub-operations for a table present in both catalogs.
///
/// Columns are keyed by name within the table. Processing order follows the
/// extractor-provided positions so the produced operations are stable.
fn diff_table_columns(source: &Catalog, target: &Catalog, id: &StableId) -> Vec<TableOp> {
    let source_cols = source.columns_of(id);
    let target_cols = target.columns_of(id);

    let source_by_name: indexmap::IndexMap<&str, &Column> =
        source_cols.iter().map(|c| (c.name.as_str(), *c)).collect();
    let target_by_name: indexmap::IndexMap<&str, &Column> =
        target_cols.iter().map(|c| (c.name.as_str(), *c)).collect();

    let mut names: Vec<(&str, i16)> = source_cols.iter().map(|c| (c.name.as_str(), c.position)).collect();
    for col in &target_cols {
        if !source_by_name.contains_key(col.name.as_str()) {
            names.push((col.name.as_str(), col.position));
        }
    }
    names.sort_by_key(|&(_, position)| position);

    let mut ops = Vec::new();
    for (name, _) in names {
        match (source_by_name.get(name), target_by_name.get(name)) {
            (None, Some(col)) => ops.push(TableOp::AddColumn {
                column: (*col).clone(),
            }),
            (Some(_), None) => ops.push(TableOp::DropColumn {
                name: name.to_string(),
            }),
            (Some(&old), Some(&new)) => diff_single_column(old, new, &mut ops),
            (None, None) => {}
        }
    }
    ops
}

fn diff_single_column(old: &Column, new: &Column, ops: &mut Vec<TableOp>) {
    // A change in generated-ness or in the generation expression can't be
    // altered in place: drop then re-add, in that order.
    if old.is_generated() != new.is_generated()
        || (old.is_generated() && old.generated != new.generated)
    {
        ops.push(TableOp::DropColumn {
            name: old.name.clone(),
        });
        ops.push(TableOp::AddColumn {
            column: new.clone(),
        });
        return;
    }

    // Type changes come before default changes on the same column.
    if old.type_name != new.type_name {
        ops.push(TableOp::AlterColumnType {
            name: new.name.clone(),
            type_name: new.type_name.clone(),
            using: None,
        });
    }

    if !old.is_generated() && !new.is_generated() && old.default != new.default {
        match &new.default {
            Some(expression) => ops.push(TableOp::SetColumnDefault {
                name: new.name.clone(),
                expression: expression.clone(),
            }),
            None => ops.push(TableOp::DropColumnDefault {
                name: new.name.clone(),
            }),
        }
    }

    if old.not_null != new.not_null {
        ops.push(if new.not_null {
            TableOp::SetColumnNotNull {
                name: new.name.clone(),
            }
        } else {
            TableOp::DropColumnNotNull {
                name: new.name.clone(),
            }
        });
    }
}

fn diff_view(
    id: &StableId,
    source_rel: Option<&Relation>,
    target_rel: Option<&Relation>,
    changes: &mut Vec<Change>,
) {
    match (source_rel, target_rel) {
        (None, Some(rel)) => changes.push(Change::CreateView {
            stable_id: id.clone(),
            schema: rel.schema.clone(),
            name: rel.name.clone(),
            definition: rel.definition.clone().unwrap_or_default(),
        }),
        (Some(rel), None) => changes.push(Change::DropView {
            stable_id: id.clone(),
            schema: rel.schema.clone(),
            name: rel.name.clone(),
        }),
        (Some(old), Some(new)) => {
            let old_def = old.definition.as_deref().unwrap_or("");
            let new_def = new.definition.as_deref().unwrap_or("");
            if normalize_view_definition(old_def) != normalize_view_definition(new_def) {
                changes.push(Change::ReplaceView {
                    stable_id: id.clone(),
                    schema: new.schema.clone(),
                    name: new.name.clone(),
                    definition: new_def.to_string(),
                });
            }
        }
        (None, None) => {}
    }
}

/// Whitespace- and case-insensitive comparison key for view bodies.
/// `pg_get_viewdef` formatting differs between server versions.
fn normalize_view_definition(definition: &str) -> String {
    definition.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

fn diff_materialized_view(
    id: &StableId,
    source_rel: Option<&Relation>,
    target_rel: Option<&Relation>,
    changes: &mut Vec<Change>,
) {
    match (source_rel, target_rel) {
        (None, Some(rel)) => changes.push(Change::CreateMaterializedView {
            stable_id: id.clone(),
            schema: rel.schema.clone(),
            name: rel.name.clone(),
            definition: rel.definition.clone().unwrap_or_default(),
        }),
        (Some(rel), None) => changes.push(Change::DropMaterializedView {
            stable_id: id.clone(),
            schema: rel.schema.clone(),
            name: rel.name.clone(),
        }),
        (Some(old), Some(new)) => {
            let old_def = old.definition.as_deref().unwrap_or("").trim();
            let new_def = new.definition.as_deref().unwrap_or("").trim();
            if old_def != new_def {
                changes.push(Change::ReplaceMaterializedView {
                    stable_id: id.clone(),
                    schema: new.schema.clone(),
                    name: new.name.clone(),
                    definition: new_def.to_string(),
                });
            }
        }
        (None, None) => {}
    }
}

fn diff_functions(source: &Catalog, target: &Catalog, changes: &mut Vec<Change>) {
    for id in sorted_ids(source.functions(), target.functions()) {
        match (source.functions().get(id), target.functions().get(id)) {
            (None, Some(func)) => changes.push(Change::CreateFunction {
                stable_id: id.clone(),
                function: func.clone(),
            }),
            (Some(func), None) => changes.push(Change::DropFunction {
                stable_id: id.clone(),
                function: func.clone(),
            }),
            (Some(old), Some(new)) if !old.semantic_eq(new) => {
                changes.push(Change::ReplaceFunction {
                    stable_id: id.clone(),
                    function: new.clone(),
                });
            }
            _ => {}
        }
    }
}

fn diff_constraints(source: &Catalog, target: &Catalog, changes: &mut Vec<Change>) {
    for id in sorted_ids(source.constraints(), target.constraints()) {
        match (source.constraints().get(id), target.constraints().get(id)) {
            (None, Some(con)) => changes.push(create_constraint_change(target, id, con)),
            (Some(con), None) => changes.push(Change::DropConstraint {
                stable_id: id.clone(),
                constraint: con.clone(),
            }),
            (Some(old), Some(new)) if !old.semantic_eq(new) => {
                if new.kind == pgdrift_catalog::ConstraintKind::ForeignKey
                    && old.only_deferrability_differs(new)
                {
                    changes.push(Change::AlterConstraint {
                        stable_id: id.clone(),
                        old: old.clone(),
                        new: new.clone(),
                    });
                } else {
                    changes.push(Change::DropConstraint {
                        stable_id: id.clone(),
                        constraint: old.clone(),
                    });
                    changes.push(create_constraint_change(target, id, new));
                }
            }
            _ => {}
        }
    }
}

/// Build a `CreateConstraint` with the column payloads the emitter needs to
/// resolve key numbers into names.
fn create_constraint_change(
    catalog: &Catalog,
    id: &StableId,
    constraint: &pgdrift_catalog::Constraint,
) -> Change {
    let table_columns = catalog
        .columns_of(&constraint.table_stable_id())
        .into_iter()
        .cloned()
        .collect();

    let referenced_columns = if constraint.kind == pgdrift_catalog::ConstraintKind::ForeignKey
        && constraint.fk_ref_table_oid != 0
    {
        catalog
            .relation_by_oid(constraint.fk_ref_table_oid)
            .map(|rel| catalog.columns_of(&rel.stable_id()).into_iter().cloned().collect())
    } else {
        None
    };

    Change::CreateConstraint {
        stable_id: id.clone(),
        constraint: constraint.clone(),
        table_columns,
        referenced_columns,
    }
}

fn diff_indexes(source: &Catalog, target: &Catalog, changes: &mut Vec<Change>) {
    for id in sorted_ids(source.indexes(), target.indexes()) {
        match (source.indexes().get(id), target.indexes().get(id)) {
            // Constraint-backed indexes follow their constraint.
            (None, Some(index)) if !index.backs_constraint => {
                changes.push(Change::CreateIndex {
                    stable_id: id.clone(),
                    index: index.clone(),
                });
            }
            (Some(index), None) if !index.backs_constraint => {
                changes.push(Change::DropIndex {
                    stable_id: id.clone(),
                    index: index.clone(),
                });
            }
            (Some(old), Some(new)) if !old.semantic_eq(new) => {
                if !old.backs_constraint && !new.backs_constraint {
                    changes.push(Change::DropIndex {
                        stable_id: id.clone(),
                        index: old.clone(),
                    });
                    changes.push(Change::CreateIndex {
                        stable_id: id.clone(),
                        index: new.clone(),
                    });
                }
            }
            _ => {}
        }
    }
}

fn diff_policies(source: &Catalog, target: &Catalog, changes: &mut Vec<Change>) {
    for id in sorted_ids(source.policies(), target.policies()) {
        match (source.policies().get(id), target.policies().get(id)) {
            (None, Some(policy)) => changes.push(Change::CreatePolicy {
                stable_id: id.clone(),
                policy: policy.clone(),
            }),
            (Some(policy), None) => changes.push(Change::DropPolicy {
                stable_id: id.clone(),
                schema: policy.schema.clone(),
                table: policy.table.clone(),
                name: policy.name.clone(),
            }),
            (Some(old), Some(new)) if !old.semantic_eq(new) => {
                diff_single_policy(id, old, new, changes);
            }
            _ => {}
        }
    }
}

fn diff_single_policy(
    id: &StableId,
    old: &pgdrift_catalog::Policy,
    new: &pgdrift_catalog::Policy,
    changes: &mut Vec<Change>,
) {
    // ALTER POLICY can change roles and expressions, but not the command or
    // the permissive flag, and it can't *remove* an expression.
    let expression_removed = (old.using_expr.is_some() && new.using_expr.is_none())
        || (old.check_expr.is_some() && new.check_expr.is_none());

    if old.command != new.command || old.permissive != new.permissive || expression_removed {
        changes.push(Change::DropPolicy {
            stable_id: id.clone(),
            schema: old.schema.clone(),
            table: old.table.clone(),
            name: old.name.clone(),
        });
        changes.push(Change::CreatePolicy {
            stable_id: id.clone(),
            policy: new.clone(),
        });
        return;
    }

    let roles = (old.roles != new.roles).then(|| new.roles.clone());
    let using_expr = (old.using_expr != new.using_expr)
        .then(|| new.using_expr.clone())
        .flatten();
    let check_expr = (old.check_expr != new.check_expr)
        .then(|| new.check_expr.clone())
        .flatten();

    if roles.is_some() || using_expr.is_some() || check_expr.is_some() {
        changes.push(Change::AlterPolicy {
            stable_id: id.clone(),
            schema: new.schema.clone(),
            table: new.table.clone(),
            name: new.name.clone(),
            roles,
            using_expr,
            check_expr,
        });
    }
}

fn diff_triggers(source: &Catalog, target: &Catalog, changes: &mut Vec<Change>) {
    for id in sorted_ids(source.triggers(), target.triggers()) {
        match (source.triggers().get(id), target.triggers().get(id)) {
            (None, Some(trigger)) => changes.push(Change::CreateTrigger {
                stable_id: id.clone(),
                trigger: trigger.clone(),
            }),
            (Some(trigger), None) => changes.push(Change::DropTrigger {
                stable_id: id.clone(),
                trigger: trigger.clone(),
            }),
            (Some(old), Some(new)) if !old.semantic_eq(new) => {
                // Triggers have no ALTER: drop and recreate.
                changes.push(Change::DropTrigger {
                    stable_id: id.clone(),
                    trigger: old.clone(),
                });
                changes.push(Change::CreateTrigger {
                    stable_id: id.clone(),
                    trigger: new.clone(),
                });
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::*;
    use pgdrift_catalog::{ConstraintKind, PolicyCommand};

    #[test]
    fn diff_identical_catalogs_is_empty() {
        let catalog = catalog_with(|b| {
            b.schema("public");
            b.table("public", "users", &[("id", "bigint", false)]);
        });
        assert!(collect_changes(&catalog, &catalog).is_empty());
        assert!(diff(&catalog, &catalog).unwrap().is_empty());
    }

    #[test]
    fn diff_is_deterministic() {
        let source = catalog_with(|b| {
            b.schema("public");
        });
        let target = catalog_with(|b| {
            b.schema("public");
            b.table("public", "b_table", &[("id", "bigint", false)]);
            b.table("public", "a_table", &[("id", "bigint", false)]);
        });

        let first = collect_changes(&source, &target);
        let second = collect_changes(&source, &target);
        assert_eq!(first, second);

        // Lexicographic stable-id order within the kind.
        let ids: Vec<&str> = first.iter().map(|c| c.stable_id().as_str()).collect();
        assert_eq!(ids, vec!["t:public.a_table", "t:public.b_table"]);
    }

    #[test]
    fn create_table_carries_ordered_columns() {
        let source = catalog_with(|b| {
            b.schema("public");
        });
        let target = catalog_with(|b| {
            b.schema("public");
            b.table(
                "public",
                "users",
                &[("id", "bigint", false), ("email", "text", true)],
            );
        });

        let changes = collect_changes(&source, &target);
        assert_eq!(changes.len(), 1);
        match &changes[0] {
            Change::CreateTable { columns, .. } => {
                let names: Vec<&str> = columns.iter().map(|c| c.name.as_str()).collect();
                assert_eq!(names, vec!["id", "email"]);
            }
            other => panic!("expected CreateTable, got {other}"),
        }
    }

    #[test]
    fn add_column_becomes_single_alter_table() {
        let source = catalog_with(|b| {
            b.schema("public");
            b.table("public", "users", &[("id", "integer", false)]);
        });
        let target = catalog_with(|b| {
            b.schema("public");
            b.table(
                "public",
                "users",
                &[("id", "integer", false), ("email", "text", true)],
            );
        });

        let changes = collect_changes(&source, &target);
        assert_eq!(changes.len(), 1);
        match &changes[0] {
            Change::AlterTable { ops, .. } => {
                assert_eq!(ops.len(), 1);
                assert!(matches!(&ops[0], TableOp::AddColumn { column } if column.name == "email"));
            }
            other => panic!("expected AlterTable, got {other}"),
        }
    }

    #[test]
    fn column_type_and_nullability_deltas() {
        let source = catalog_with(|b| {
            b.schema("public");
            b.table("public", "users", &[("age", "integer", true)]);
        });
        let target = catalog_with(|b| {
            b.schema("public");
            b.table("public", "users", &[("age", "bigint", false)]);
        });

        let changes = collect_changes(&source, &target);
        assert_eq!(changes.len(), 1);
        match &changes[0] {
            Change::AlterTable { ops, .. } => {
                assert_eq!(
                    ops,
                    &[
                        TableOp::AlterColumnType {
                            name: "age".to_string(),
                            type_name: "bigint".to_string(),
                            using: None,
                        },
                        TableOp::SetColumnNotNull {
                            name: "age".to_string(),
                        },
                    ]
                );
            }
            other => panic!("expected AlterTable, got {other}"),
        }
    }

    #[test]
    fn generated_column_change_drops_and_readds() {
        let source = catalog_with(|b| {
            b.schema("public");
            b.table_built("public", "t", |t| {
                t.column("a", "integer", false);
                t.generated_column("doubled", "integer", "(a * 2)");
            });
        });
        let target = catalog_with(|b| {
            b.schema("public");
            b.table_built("public", "t", |t| {
                t.column("a", "integer", false);
                t.generated_column("doubled", "integer", "(a * 3)");
            });
        });

        let changes = collect_changes(&source, &target);
        assert_eq!(changes.len(), 1);
        match &changes[0] {
            Change::AlterTable { ops, .. } => {
                assert!(matches!(&ops[0], TableOp::DropColumn { name } if name == "doubled"));
                assert!(matches!(&ops[1], TableOp::AddColumn { column } if column.name == "doubled"));
            }
            other => panic!("expected AlterTable, got {other}"),
        }
    }

    #[test]
    fn rls_toggle_is_a_table_level_operation() {
        let source = catalog_with(|b| {
            b.schema("public");
            b.table("public", "users", &[("id", "bigint", false)]);
        });
        let target = catalog_with(|b| {
            b.schema("public");
            b.rls_table("public", "users", &[("id", "bigint", false)]);
        });

        let changes = collect_changes(&source, &target);
        assert_eq!(changes.len(), 1);
        match &changes[0] {
            Change::AlterTable { ops, .. } => {
                assert_eq!(ops, &[TableOp::EnableRowSecurity]);
            }
            other => panic!("expected AlterTable, got {other}"),
        }
    }

    #[test]
    fn new_table_with_rls_enables_it_after_create() {
        let source = Catalog::empty();
        let target = catalog_with(|b| {
            b.schema("public");
            b.rls_table("public", "users", &[("id", "bigint", false)]);
        });

        let changes = collect_changes(&source, &target);
        let ops: Vec<&str> = changes.iter().map(|c| c.operation_name()).collect();
        assert_eq!(ops, vec!["CreateTable", "AlterTable"]);
    }

    #[test]
    fn view_replacement_ignores_whitespace_and_case() {
        let source = catalog_with(|b| {
            b.schema("public");
            b.view("public", "v", "SELECT id\n   FROM public.t");
        });
        let same = catalog_with(|b| {
            b.schema("public");
            b.view("public", "v", "select id from public.t");
        });
        let different = catalog_with(|b| {
            b.schema("public");
            b.view("public", "v", "SELECT id, name FROM public.t");
        });

        assert!(collect_changes(&source, &same).is_empty());

        let changes = collect_changes(&source, &different);
        assert_eq!(changes.len(), 1);
        assert!(matches!(&changes[0], Change::ReplaceView { .. }));
    }

    #[test]
    fn materialized_view_replacement() {
        let source = catalog_with(|b| {
            b.schema("public");
            b.materialized_view("public", "mv", "SELECT 1 AS one");
        });
        let target = catalog_with(|b| {
            b.schema("public");
            b.materialized_view("public", "mv", "SELECT 2 AS two");
        });

        let changes = collect_changes(&source, &target);
        assert_eq!(changes.len(), 1);
        assert!(matches!(&changes[0], Change::ReplaceMaterializedView { .. }));
    }

    #[test]
    fn function_change_becomes_replace() {
        let source = catalog_with(|b| {
            b.schema("public");
            b.function("public", "f", "", "CREATE FUNCTION public.f() RETURNS integer AS $$ SELECT 1 $$ LANGUAGE sql");
        });
        let target = catalog_with(|b| {
            b.schema("public");
            b.function("public", "f", "", "CREATE FUNCTION public.f() RETURNS integer AS $$ SELECT 2 $$ LANGUAGE sql");
        });

        let changes = collect_changes(&source, &target);
        assert_eq!(changes.len(), 1);
        assert!(matches!(&changes[0], Change::ReplaceFunction { .. }));
    }

    #[test]
    fn fk_deferrability_delta_becomes_alter_constraint() {
        let source = catalog_with(|b| {
            b.schema("public");
            b.table("public", "users", &[("id", "bigint", false)]);
            b.table("public", "posts", &[("id", "bigint", false), ("author_id", "bigint", false)]);
            b.foreign_key("public", "posts", "posts_author_fkey", &[2], "users", &[1], false);
        });
        let target = catalog_with(|b| {
            b.schema("public");
            b.table("public", "users", &[("id", "bigint", false)]);
            b.table("public", "posts", &[("id", "bigint", false), ("author_id", "bigint", false)]);
            b.foreign_key("public", "posts", "posts_author_fkey", &[2], "users", &[1], true);
        });

        let changes = collect_changes(&source, &target);
        assert_eq!(changes.len(), 1);
        assert!(matches!(&changes[0], Change::AlterConstraint { .. }));
    }

    #[test]
    fn structural_constraint_change_drops_and_recreates() {
        let source = catalog_with(|b| {
            b.schema("public");
            b.table("public", "t", &[("a", "integer", false), ("b", "integer", false)]);
            b.check_constraint("public", "t", "t_check", "a > 0");
        });
        let target = catalog_with(|b| {
            b.schema("public");
            b.table("public", "t", &[("a", "integer", false), ("b", "integer", false)]);
            b.check_constraint("public", "t", "t_check", "a > 1");
        });

        let changes = collect_changes(&source, &target);
        let ops: Vec<&str> = changes.iter().map(|c| c.operation_name()).collect();
        assert_eq!(ops, vec!["DropConstraint", "CreateConstraint"]);
    }

    #[test]
    fn create_constraint_resolves_referenced_columns() {
        let source = catalog_with(|b| {
            b.schema("public");
            b.table("public", "users", &[("id", "bigint", false)]);
            b.table("public", "posts", &[("id", "bigint", false), ("author_id", "bigint", false)]);
        });
        let target = catalog_with(|b| {
            b.schema("public");
            b.table("public", "users", &[("id", "bigint", false)]);
            b.table("public", "posts", &[("id", "bigint", false), ("author_id", "bigint", false)]);
            b.foreign_key("public", "posts", "posts_author_fkey", &[2], "users", &[1], false);
        });

        let changes = collect_changes(&source, &target);
        assert_eq!(changes.len(), 1);
        match &changes[0] {
            Change::CreateConstraint {
                constraint,
                table_columns,
                referenced_columns,
                ..
            } => {
                assert_eq!(constraint.kind, ConstraintKind::ForeignKey);
                assert_eq!(table_columns.len(), 2);
                let referenced = referenced_columns.as_ref().expect("fk referenced columns");
                assert_eq!(referenced[0].table, "users");
            }
            other => panic!("expected CreateConstraint, got {other}"),
        }
    }

    #[test]
    fn constraint_backed_indexes_are_skipped() {
        let source = catalog_with(|b| {
            b.schema("public");
            b.table("public", "t", &[("id", "bigint", false)]);
            b.constraint_index("public", "t", "t_pkey");
        });
        let target = catalog_with(|b| {
            b.schema("public");
            b.table("public", "t", &[("id", "bigint", false)]);
        });

        assert!(collect_changes(&source, &target).is_empty());
    }

    #[test]
    fn policy_expression_change_becomes_alter() {
        let source = catalog_with(|b| {
            b.schema("public");
            b.rls_table("public", "docs", &[("owner", "text", false)]);
            b.policy("public", "docs", "docs_owner", PolicyCommand::All, "(owner = current_user)");
        });
        let target = catalog_with(|b| {
            b.schema("public");
            b.rls_table("public", "docs", &[("owner", "text", false)]);
            b.policy("public", "docs", "docs_owner", PolicyCommand::All, "(owner = session_user)");
        });

        let changes = collect_changes(&source, &target);
        assert_eq!(changes.len(), 1);
        match &changes[0] {
            Change::AlterPolicy {
                using_expr, roles, ..
            } => {
                assert_eq!(using_expr.as_deref(), Some("(owner = session_user)"));
                assert!(roles.is_none());
            }
            other => panic!("expected AlterPolicy, got {other}"),
        }
    }

    #[test]
    fn policy_command_change_drops_and_recreates() {
        let source = catalog_with(|b| {
            b.schema("public");
            b.rls_table("public", "docs", &[("owner", "text", false)]);
            b.policy("public", "docs", "docs_owner", PolicyCommand::Select, "(true)");
        });
        let target = catalog_with(|b| {
            b.schema("public");
            b.rls_table("public", "docs", &[("owner", "text", false)]);
            b.policy("public", "docs", "docs_owner", PolicyCommand::All, "(true)");
        });

        let changes = collect_changes(&source, &target);
        let ops: Vec<&str> = changes.iter().map(|c| c.operation_name()).collect();
        assert_eq!(ops, vec!["DropPolicy", "CreatePolicy"]);
    }

    #[test]
    fn type_change_drops_and_recreates() {
        let source = catalog_with(|b| {
            b.schema("public");
            b.enum_type("public", "mood", &["sad", "ok"]);
        });
        let target = catalog_with(|b| {
            b.schema("public");
            b.enum_type("public", "mood", &["sad", "ok", "happy"]);
        });

        let changes = collect_changes(&source, &target);
        let ops: Vec<&str> = changes.iter().map(|c| c.operation_name()).collect();
        assert_eq!(ops, vec!["DropType", "CreateType"]);
    }

    #[test]
    fn owned_sequence_creation_splits_ownership() {
        let source = Catalog::empty();
        let target = catalog_with(|b| {
            b.schema("app");
            b.table("app", "users", &[("id", "bigint", false)]);
            b.owned_sequence("app", "users_id_seq", "users", "id");
        });

        let changes = collect_changes(&source, &target);
        let seq_ops: Vec<&str> = changes
            .iter()
            .filter(|c| c.stable_id().as_str() == "S:app.users_id_seq")
            .map(|c| c.operation_name())
            .collect();
        assert_eq!(seq_ops, vec!["CreateSequence", "AlterSequenceOwner"]);
    }

    #[test]
    fn public_schema_is_never_created() {
        let source = Catalog::empty();
        let target = catalog_with(|b| {
            b.schema("public");
            b.schema("app");
        });

        let changes = collect_changes(&source, &target);
        let ids: Vec<&str> = changes.iter().map(|c| c.stable_id().as_str()).collect();
        assert_eq!(ids, vec!["s:app"]);
    }

    #[test]
    fn trigger_change_drops_then_creates() {
        let source = catalog_with(|b| {
            b.schema("public");
            b.table("public", "t", &[("id", "bigint", false)]);
            b.trigger("public", "t", "touch", "CREATE TRIGGER touch BEFORE INSERT ON public.t FOR EACH ROW EXECUTE FUNCTION public.touch()");
        });
        let target = catalog_with(|b| {
            b.schema("public");
            b.table("public", "t", &[("id", "bigint", false)]);
            b.trigger("public", "t", "touch", "CREATE TRIGGER touch AFTER INSERT ON public.t FOR EACH ROW EXECUTE FUNCTION public.touch()");
        });

        let changes = collect_changes(&source, &target);
        let ops: Vec<&str> = changes.iter().map(|c| c.operation_name()).collect();
        assert_eq!(ops, vec!["DropTrigger", "CreateTrigger"]);
    }
}
