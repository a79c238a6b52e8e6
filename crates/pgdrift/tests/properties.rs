//! Property tests over randomly generated catalog pairs.
//!
//! Catalogs are built from a bounded pool of table shapes so the generated
//! diffs cover creates, drops, column type / nullability changes, and index
//! churn, while staying acyclic by construction.

use proptest::prelude::*;

use pgdrift::testutil::catalog_with;
use pgdrift::{
    collect_changes, diff, emit_all, resolve, ChangeKind, DEFAULT_EXPANSION_DEPTH,
};
use pgdrift_catalog::Catalog;

const TABLE_NAMES: &[&str] = &["users", "posts", "tags", "events"];

/// One of a few fixed column layouts; differing shapes for the same table
/// name exercise ALTER TABLE paths.
fn shape_columns(shape: u8) -> Vec<(&'static str, &'static str, bool)> {
    match shape % 3 {
        0 => vec![("id", "integer", true)],
        1 => vec![("id", "integer", true), ("email", "text", true)],
        _ => vec![("id", "bigint", false), ("email", "text", false)],
    }
}

/// Per table name: presence + shape, and whether it carries an index.
type TableSpec = (Option<u8>, bool);

fn build_catalog(tables: &[TableSpec]) -> Catalog {
    catalog_with(|b| {
        b.schema("public");
        for (name, (shape, has_index)) in TABLE_NAMES.iter().zip(tables) {
            if let Some(shape) = shape {
                b.table("public", name, &shape_columns(*shape));
                if *has_index {
                    b.index(
                        "public",
                        name,
                        &format!("idx_{name}_id"),
                        &format!("CREATE INDEX idx_{name}_id ON public.{name} USING btree (id)"),
                    );
                }
            }
        }
    })
}

fn tables_strategy() -> impl Strategy<Value = Vec<TableSpec>> {
    prop::collection::vec(
        (prop::option::of(0u8..3), any::<bool>()),
        TABLE_NAMES.len(),
    )
}

proptest! {
    /// `diff(A, A)` is empty for every generated catalog.
    #[test]
    fn diff_identity(tables in tables_strategy()) {
        let catalog = build_catalog(&tables);
        prop_assert!(diff(&catalog, &catalog).unwrap().is_empty());
    }

    /// Structurally equal inputs produce identical ordered output and SQL.
    #[test]
    fn diff_determinism(source in tables_strategy(), target in tables_strategy()) {
        let first = diff(&build_catalog(&source), &build_catalog(&target)).unwrap();
        let second = diff(&build_catalog(&source), &build_catalog(&target)).unwrap();
        prop_assert_eq!(&first, &second);
        prop_assert_eq!(emit_all(&first), emit_all(&second));
    }

    /// Every BEFORE constraint derivable from the ordered output is
    /// satisfied by its positions.
    #[test]
    fn ordering_validity(source in tables_strategy(), target in tables_strategy()) {
        let source = build_catalog(&source);
        let target = build_catalog(&target);
        let ordered = diff(&source, &target).unwrap();

        let model = resolve::extract_model(&source, &target, &ordered, DEFAULT_EXPANSION_DEPTH);
        for constraint in resolve::ordering_constraints(&ordered, &model) {
            prop_assert!(
                constraint.before < constraint.after,
                "violated: {constraint}"
            );
        }
    }

    /// When one object is both dropped and (re)created, the drop runs first;
    /// created dependencies precede their dependents and dropped dependents
    /// precede their dependencies.
    #[test]
    fn drop_create_and_dependency_order(source in tables_strategy(), target in tables_strategy()) {
        let source = build_catalog(&source);
        let target = build_catalog(&target);
        let ordered = diff(&source, &target).unwrap();

        for (i, a) in ordered.iter().enumerate() {
            for b in &ordered[i + 1..] {
                if a.stable_id() == b.stable_id() {
                    prop_assert!(
                        !(a.kind() == ChangeKind::Create && b.kind() == ChangeKind::Drop),
                        "create of {} precedes its drop",
                        a.stable_id()
                    );
                }
            }
        }

        // Index changes always land on the correct side of their table.
        for (i, change) in ordered.iter().enumerate() {
            let id = change.stable_id().as_str();
            let Some(table) = id.strip_prefix("i:public.idx_").and_then(|rest| rest.strip_suffix("_id"))
            else {
                continue;
            };
            let table_id = format!("t:public.{table}");
            let table_pos = ordered
                .iter()
                .position(|c| c.stable_id().as_str() == table_id);
            if let Some(table_pos) = table_pos {
                match change.kind() {
                    ChangeKind::Create => prop_assert!(
                        table_pos < i,
                        "index created before its table"
                    ),
                    ChangeKind::Drop => {
                        if ordered[table_pos].kind() == ChangeKind::Drop {
                            prop_assert!(i < table_pos, "index dropped after its table");
                        }
                    }
                    _ => {}
                }
            }
        }
    }

    /// The unordered change stream and the resolved stream hold the same
    /// multiset of changes.
    #[test]
    fn resolution_preserves_changes(source in tables_strategy(), target in tables_strategy()) {
        let source = build_catalog(&source);
        let target = build_catalog(&target);

        let unordered = collect_changes(&source, &target);
        let ordered = diff(&source, &target).unwrap();
        prop_assert_eq!(unordered.len(), ordered.len());

        let mut left: Vec<String> = unordered.iter().map(|c| c.describe()).collect();
        let mut right: Vec<String> = ordered.iter().map(|c| c.describe()).collect();
        left.sort();
        right.sort();
        prop_assert_eq!(left, right);
    }
}
