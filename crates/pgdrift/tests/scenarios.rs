//! End-to-end scenarios over the diff -> resolve -> emit pipeline.
//!
//! Each test builds source and target snapshots the way extraction would,
//! runs the full pipeline, and checks the ordered SQL output.

use pgdrift::testutil::catalog_with;
use pgdrift::{diff, emit_all, Change, Error};
use pgdrift_catalog::Catalog;

fn sql_for(source: &Catalog, target: &Catalog) -> Vec<String> {
    emit_all(&diff(source, target).expect("diff should resolve"))
}

fn index_of(statements: &[String], needle: &str) -> usize {
    statements
        .iter()
        .position(|s| s.contains(needle))
        .unwrap_or_else(|| panic!("no statement containing {needle:?} in {statements:#?}"))
}

/// Scenario 1 - add a column.
#[test]
fn add_column() {
    let source = catalog_with(|b| {
        b.schema("public");
        b.table("public", "users", &[("id", "integer", true)]);
    });
    let target = catalog_with(|b| {
        b.schema("public");
        b.table(
            "public",
            "users",
            &[("id", "integer", true), ("email", "text", true)],
        );
    });

    let changes = diff(&source, &target).unwrap();
    assert_eq!(changes.len(), 1);
    assert!(matches!(&changes[0], Change::AlterTable { ops, .. } if ops.len() == 1));

    let statements = emit_all(&changes);
    assert_eq!(
        statements,
        vec!["ALTER TABLE \"public\".\"users\" ADD COLUMN \"email\" text;"]
    );
}

/// Scenario 2 - schema, table, and index created in dependency order.
#[test]
fn schema_table_index_creation() {
    let source = Catalog::empty();
    let target = catalog_with(|b| {
        b.schema("app");
        b.table("app", "users", &[("id", "bigint", false)]);
        b.index(
            "app",
            "users",
            "idx_users_id",
            "CREATE INDEX idx_users_id ON app.users USING btree (id)",
        );
    });

    let statements = sql_for(&source, &target);
    let schema_pos = index_of(&statements, "CREATE SCHEMA \"app\"");
    let table_pos = index_of(&statements, "CREATE TABLE \"app\".\"users\"");
    let index_pos = index_of(&statements, "CREATE INDEX idx_users_id");
    assert!(schema_pos < table_pos);
    assert!(table_pos < index_pos);
}

/// Scenario 3 - a column-owned sequence is created before its table, and
/// ownership is established after.
#[test]
fn sequence_before_table_inversion() {
    let source = Catalog::empty();
    let target = catalog_with(|b| {
        b.schema("app");
        b.table_built("app", "users", |t| {
            t.column_with_default("id", "bigint", "nextval('app.users_id_seq'::regclass)");
        });
        b.owned_sequence("app", "users_id_seq", "users", "id");
    });

    let statements = sql_for(&source, &target);
    let schema_pos = index_of(&statements, "CREATE SCHEMA \"app\"");
    let sequence_pos = index_of(&statements, "CREATE SEQUENCE \"app\".\"users_id_seq\"");
    let table_pos = index_of(&statements, "CREATE TABLE \"app\".\"users\"");
    let owned_pos = index_of(&statements, "OWNED BY \"app\".\"users\".\"id\"");
    assert!(schema_pos < sequence_pos);
    assert!(sequence_pos < table_pos);
    assert!(table_pos < owned_pos);
}

/// Scenario 4 - view replacement.
#[test]
fn view_replacement() {
    let source = catalog_with(|b| {
        b.schema("public");
        b.table("public", "t", &[("id", "integer", true), ("name", "text", true)]);
        b.view("public", "v", "SELECT id FROM public.t");
        b.edge("v:public.v", "t:public.t");
    });
    let target = catalog_with(|b| {
        b.schema("public");
        b.table("public", "t", &[("id", "integer", true), ("name", "text", true)]);
        b.view("public", "v", "SELECT id, name FROM public.t");
        b.edge("v:public.v", "t:public.t");
    });

    let changes = diff(&source, &target).unwrap();
    assert_eq!(changes.len(), 1);
    assert!(matches!(&changes[0], Change::ReplaceView { .. }));

    let statements = emit_all(&changes);
    assert!(statements[0].starts_with("CREATE OR REPLACE VIEW \"public\".\"v\" AS "));
}

/// Scenario 5 - dropping a table drops its dependent index first.
#[test]
fn drop_with_dependent_index() {
    let source = catalog_with(|b| {
        b.schema("public");
        b.table("public", "t", &[("id", "integer", true)]);
        b.index(
            "public",
            "t",
            "idx_t_id",
            "CREATE INDEX idx_t_id ON public.t USING btree (id)",
        );
    });
    let target = catalog_with(|b| {
        b.schema("public");
    });

    let statements = sql_for(&source, &target);
    let index_pos = index_of(&statements, "DROP INDEX \"public\".\"idx_t_id\"");
    let table_pos = index_of(&statements, "DROP TABLE \"public\".\"t\"");
    assert!(index_pos < table_pos);
}

/// Scenario 6 - mutually dependent view replacements have no valid order;
/// the failure names both views.
#[test]
fn cyclic_dependency_reported() {
    let source = catalog_with(|b| {
        b.schema("public");
        b.view("public", "a", "SELECT 1");
        b.view("public", "b", "SELECT 2");
    });
    let target = catalog_with(|b| {
        b.schema("public");
        b.view("public", "a", "SELECT * FROM public.b");
        b.view("public", "b", "SELECT * FROM public.a");
        b.edge("v:public.a", "v:public.b");
        b.edge("v:public.b", "v:public.a");
    });

    let err = diff(&source, &target).unwrap_err();
    let Error::CyclicDependency { cycles } = &err;
    assert!(!cycles.is_empty());
    let report = err.to_string();
    assert!(report.contains("v:public.a"));
    assert!(report.contains("v:public.b"));
    assert!(report.contains("ReplaceView"));
}

/// Dropping everything reverses creation order.
#[test]
fn teardown_reverses_buildup() {
    let full = catalog_with(|b| {
        b.schema("app");
        b.table("app", "users", &[("id", "bigint", false)]);
        b.index(
            "app",
            "users",
            "idx_users_id",
            "CREATE INDEX idx_users_id ON app.users USING btree (id)",
        );
    });
    let empty = Catalog::empty();

    let statements = sql_for(&full, &empty);
    let index_pos = index_of(&statements, "DROP INDEX");
    let table_pos = index_of(&statements, "DROP TABLE");
    let schema_pos = index_of(&statements, "DROP SCHEMA");
    assert!(index_pos < table_pos);
    assert!(table_pos < schema_pos);
}

/// A foreign key to a table created in the same run lands after both tables.
#[test]
fn foreign_key_after_both_tables() {
    let source = Catalog::empty();
    let target = catalog_with(|b| {
        b.schema("public");
        b.table("public", "users", &[("id", "bigint", false)]);
        b.table(
            "public",
            "posts",
            &[("id", "bigint", false), ("author_id", "bigint", false)],
        );
        b.foreign_key("public", "posts", "posts_author_fkey", &[2], "users", &[1], false);
    });

    let statements = sql_for(&source, &target);
    let users_pos = index_of(&statements, "CREATE TABLE \"public\".\"users\"");
    let posts_pos = index_of(&statements, "CREATE TABLE \"public\".\"posts\"");
    let fk_pos = index_of(&statements, "ADD CONSTRAINT \"posts_author_fkey\"");
    assert!(users_pos < fk_pos);
    assert!(posts_pos < fk_pos);
}

/// RLS tables come up as CREATE TABLE, then ENABLE ROW LEVEL SECURITY, then
/// their policies.
#[test]
fn rls_enabled_before_policies() {
    let source = Catalog::empty();
    let target = catalog_with(|b| {
        b.schema("public");
        b.rls_table("public", "docs", &[("owner", "text", false)]);
        b.policy(
            "public",
            "docs",
            "docs_owner",
            pgdrift_catalog::PolicyCommand::All,
            "(owner = current_user)",
        );
    });

    let statements = sql_for(&source, &target);
    let table_pos = index_of(&statements, "CREATE TABLE \"public\".\"docs\"");
    let rls_pos = index_of(&statements, "ENABLE ROW LEVEL SECURITY");
    let policy_pos = index_of(&statements, "CREATE POLICY \"docs_owner\"");
    assert!(table_pos < rls_pos);
    assert!(rls_pos < policy_pos);
}

/// Byte-identical output across invocations on structurally equal inputs.
#[test]
fn pipeline_is_deterministic() {
    let build_source = || {
        catalog_with(|b| {
            b.schema("public");
            b.table("public", "keep", &[("id", "integer", true)]);
            b.table("public", "gone", &[("id", "integer", true)]);
        })
    };
    let build_target = || {
        catalog_with(|b| {
            b.schema("public");
            b.schema("app");
            b.table("public", "keep", &[("id", "integer", true), ("extra", "text", true)]);
            b.table("app", "fresh", &[("id", "bigint", false)]);
            b.enum_type("app", "state", &["on", "off"]);
        })
    };

    let first = sql_for(&build_source(), &build_target());
    let second = sql_for(&build_source(), &build_target());
    assert_eq!(first, second);
}
