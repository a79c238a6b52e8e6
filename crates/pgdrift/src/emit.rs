//! DDL emission - turn a [`Change`] into SQL text.
//!
//! [`emit`] is a stateless dispatch over the change variants. Identifiers are
//! always double-quoted on output (never inside stable ids), and every
//! statement carries a trailing semicolon. Where PostgreSQL can pretty-print
//! a definition (indexes, functions, triggers, views), the emitter reuses the
//! text captured at extraction time and only normalizes the semicolon;
//! schemas, tables, columns, and constraints are assembled from structured
//! fields.

use pgdrift_catalog::{Column, Constraint, ConstraintKind, FkAction, Sequence, TypeShape};

use crate::change::{Change, TableOp};

/// Double-quote an identifier, doubling any embedded quotes.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// `"schema"."name"`.
pub fn qualified(schema: &str, name: &str) -> String {
    format!("{}.{}", quote_ident(schema), quote_ident(name))
}

fn with_semicolon(sql: &str) -> String {
    let trimmed = sql.trim();
    if trimmed.ends_with(';') {
        trimmed.to_string()
    } else {
        format!("{trimmed};")
    }
}

/// Strip a trailing semicolon from a captured definition body.
fn strip_semicolon(definition: &str) -> &str {
    definition.trim().trim_end_matches(';').trim_end()
}

/// Generate the SQL statement(s) for one change.
///
/// Total over the taxonomy; a change the dispatch doesn't know is a
/// compile-time error, not a runtime one.
pub fn emit(change: &Change) -> String {
    let sql = match change {
        Change::CreateSchema { name, .. } => format!("CREATE SCHEMA {};", quote_ident(name)),
        Change::DropSchema { name, .. } => format!("DROP SCHEMA {};", quote_ident(name)),

        Change::CreateTable {
            schema,
            name,
            columns,
            ..
        } => create_table_sql(schema, name, columns),
        Change::DropTable { schema, name, .. } => {
            format!("DROP TABLE {};", qualified(schema, name))
        }
        Change::AlterTable {
            schema, name, ops, ..
        } => {
            let actions: Vec<String> = ops.iter().map(table_op_sql).collect();
            format!("ALTER TABLE {} {};", qualified(schema, name), actions.join(", "))
        }

        Change::CreateView {
            schema,
            name,
            definition,
            ..
        } => format!(
            "CREATE VIEW {} AS {};",
            qualified(schema, name),
            strip_semicolon(definition)
        ),
        Change::DropView { schema, name, .. } => {
            format!("DROP VIEW {};", qualified(schema, name))
        }
        Change::ReplaceView {
            schema,
            name,
            definition,
            ..
        } => format!(
            "CREATE OR REPLACE VIEW {} AS {};",
            qualified(schema, name),
            strip_semicolon(definition)
        ),

        Change::CreateMaterializedView {
            schema,
            name,
            definition,
            ..
        } => format!(
            "CREATE MATERIALIZED VIEW {} AS {} WITH NO DATA;",
            qualified(schema, name),
            strip_semicolon(definition)
        ),
        Change::DropMaterializedView { schema, name, .. } => {
            format!("DROP MATERIALIZED VIEW {};", qualified(schema, name))
        }
        // No CREATE OR REPLACE MATERIALIZED VIEW in PostgreSQL.
        Change::ReplaceMaterializedView {
            schema,
            name,
            definition,
            ..
        } => format!(
            "DROP MATERIALIZED VIEW {};\nCREATE MATERIALIZED VIEW {} AS {} WITH NO DATA;",
            qualified(schema, name),
            qualified(schema, name),
            strip_semicolon(definition)
        ),

        Change::CreateIndex { index, .. } => with_semicolon(&index.definition),
        Change::DropIndex { index, .. } => {
            format!("DROP INDEX {};", qualified(&index.schema, &index.name))
        }

        Change::CreateSequence { sequence, .. } => create_sequence_sql(sequence),
        Change::DropSequence { schema, name, .. } => {
            format!("DROP SEQUENCE {};", qualified(schema, name))
        }
        Change::AlterSequence { old, new, .. } => alter_sequence_sql(old, new),
        Change::AlterSequenceOwner {
            schema,
            name,
            owner,
            ..
        } => match owner {
            Some(owner) => format!(
                "ALTER SEQUENCE {} OWNED BY {}.{};",
                qualified(schema, name),
                qualified(schema, &owner.table),
                quote_ident(&owner.column)
            ),
            None => format!("ALTER SEQUENCE {} OWNED BY NONE;", qualified(schema, name)),
        },

        Change::CreateConstraint {
            constraint,
            table_columns,
            referenced_columns,
            ..
        } => format!(
            "ALTER TABLE {} ADD CONSTRAINT {} {};",
            qualified(&constraint.schema, &constraint.table),
            quote_ident(&constraint.name),
            constraint_definition(constraint, table_columns, referenced_columns.as_deref())
        ),
        Change::DropConstraint { constraint, .. } => format!(
            "ALTER TABLE {} DROP CONSTRAINT {};",
            qualified(&constraint.schema, &constraint.table),
            quote_ident(&constraint.name)
        ),
        Change::AlterConstraint { old, new, .. } => alter_constraint_sql(old, new),

        Change::CreateFunction { function, .. } => with_semicolon(&function.definition),
        Change::DropFunction { function, .. } => format!(
            "DROP FUNCTION {}({});",
            qualified(&function.schema, &function.name),
            function.arguments
        ),
        Change::ReplaceFunction { function, .. } => with_semicolon(
            &function
                .definition
                .replacen("CREATE FUNCTION", "CREATE OR REPLACE FUNCTION", 1),
        ),

        Change::CreateTrigger { trigger, .. } => with_semicolon(&trigger.definition),
        Change::DropTrigger { trigger, .. } => format!(
            "DROP TRIGGER {} ON {};",
            quote_ident(&trigger.name),
            qualified(&trigger.schema, &trigger.table)
        ),

        Change::CreatePolicy { policy, .. } => create_policy_sql(policy),
        Change::DropPolicy {
            schema,
            table,
            name,
            ..
        } => format!(
            "DROP POLICY {} ON {};",
            quote_ident(name),
            qualified(schema, table)
        ),
        Change::AlterPolicy {
            schema,
            table,
            name,
            roles,
            using_expr,
            check_expr,
            ..
        } => alter_policy_sql(schema, table, name, roles.as_deref(), using_expr.as_deref(), check_expr.as_deref()),

        Change::CreateType { type_def, .. } => create_type_sql(type_def),
        Change::DropType { schema, name, .. } => {
            format!("DROP TYPE {};", qualified(schema, name))
        }
    };

    tracing::debug!(change = %change, "generated sql");
    sql
}

/// Emit the whole ordered change list, one SQL string per change.
pub fn emit_all<'a>(changes: impl IntoIterator<Item = &'a Change>) -> Vec<String> {
    changes.into_iter().map(emit).collect()
}

fn create_table_sql(schema: &str, name: &str, columns: &[Column]) -> String {
    if columns.is_empty() {
        return format!("CREATE TABLE {} ();", qualified(schema, name));
    }
    let defs: Vec<String> = columns
        .iter()
        .map(|col| format!("    {}", column_definition(col)))
        .collect();
    format!(
        "CREATE TABLE {} (\n{}\n);",
        qualified(schema, name),
        defs.join(",\n")
    )
}

fn column_definition(col: &Column) -> String {
    let mut def = format!("{} {}", quote_ident(&col.name), col.type_name);
    if let Some(expression) = &col.generated {
        def.push_str(&format!(" GENERATED ALWAYS AS ({expression}) STORED"));
    }
    if col.not_null {
        def.push_str(" NOT NULL");
    }
    if let Some(default) = &col.default {
        // Generated columns carry no defaults.
        if !col.is_generated() {
            def.push_str(&format!(" DEFAULT {default}"));
        }
    }
    def
}

fn table_op_sql(op: &TableOp) -> String {
    match op {
        TableOp::AddColumn { column } => format!("ADD COLUMN {}", column_definition(column)),
        TableOp::DropColumn { name } => format!("DROP COLUMN {}", quote_ident(name)),
        TableOp::AlterColumnType {
            name,
            type_name,
            using,
        } => {
            let mut sql = format!("ALTER COLUMN {} TYPE {}", quote_ident(name), type_name);
            if let Some(expression) = using {
                sql.push_str(&format!(" USING {expression}"));
            }
            sql
        }
        TableOp::SetColumnDefault { name, expression } => {
            format!("ALTER COLUMN {} SET DEFAULT {}", quote_ident(name), expression)
        }
        TableOp::DropColumnDefault { name } => {
            format!("ALTER COLUMN {} DROP DEFAULT", quote_ident(name))
        }
        TableOp::SetColumnNotNull { name } => {
            format!("ALTER COLUMN {} SET NOT NULL", quote_ident(name))
        }
        TableOp::DropColumnNotNull { name } => {
            format!("ALTER COLUMN {} DROP NOT NULL", quote_ident(name))
        }
        TableOp::EnableRowSecurity => "ENABLE ROW LEVEL SECURITY".to_string(),
        TableOp::DisableRowSecurity => "DISABLE ROW LEVEL SECURITY".to_string(),
    }
}

fn create_sequence_sql(seq: &Sequence) -> String {
    let mut parts = vec![format!("CREATE SEQUENCE {}", qualified(&seq.schema, &seq.name))];
    if seq.data_type != "bigint" {
        parts.push(format!("AS {}", seq.data_type));
    }
    if seq.increment != 1 {
        parts.push(format!("INCREMENT BY {}", seq.increment));
    }
    match seq.min_value {
        Some(min) => parts.push(format!("MINVALUE {min}")),
        None => parts.push("NO MINVALUE".to_string()),
    }
    match seq.max_value {
        Some(max) => parts.push(format!("MAXVALUE {max}")),
        None => parts.push("NO MAXVALUE".to_string()),
    }
    if seq.start != 1 {
        parts.push(format!("START WITH {}", seq.start));
    }
    if seq.cache != 1 {
        parts.push(format!("CACHE {}", seq.cache));
    }
    parts.push(if seq.cycle { "CYCLE" } else { "NO CYCLE" }.to_string());
    // OWNED BY is established separately, after the owning table exists.
    format!("{};", parts.join(" "))
}

fn alter_sequence_sql(old: &Sequence, new: &Sequence) -> String {
    let mut options = Vec::new();
    if old.data_type != new.data_type {
        options.push(format!("AS {}", new.data_type));
    }
    if old.increment != new.increment {
        options.push(format!("INCREMENT BY {}", new.increment));
    }
    if old.min_value != new.min_value {
        match new.min_value {
            Some(min) => options.push(format!("MINVALUE {min}")),
            None => options.push("NO MINVALUE".to_string()),
        }
    }
    if old.max_value != new.max_value {
        match new.max_value {
            Some(max) => options.push(format!("MAXVALUE {max}")),
            None => options.push("NO MAXVALUE".to_string()),
        }
    }
    if old.start != new.start {
        options.push(format!("START WITH {}", new.start));
    }
    if old.cache != new.cache {
        options.push(format!("CACHE {}", new.cache));
    }
    if old.cycle != new.cycle {
        options.push(if new.cycle { "CYCLE" } else { "NO CYCLE" }.to_string());
    }

    let mut statements = Vec::new();
    if !options.is_empty() {
        statements.push(format!(
            "ALTER SEQUENCE {} {};",
            qualified(&new.schema, &new.name),
            options.join(" ")
        ));
    }
    if old.owned_by != new.owned_by {
        statements.push(match &new.owned_by {
            Some(owner) => format!(
                "ALTER SEQUENCE {} OWNED BY {}.{};",
                qualified(&new.schema, &new.name),
                qualified(&new.schema, &owner.table),
                quote_ident(&owner.column)
            ),
            None => format!(
                "ALTER SEQUENCE {} OWNED BY NONE;",
                qualified(&new.schema, &new.name)
            ),
        });
    }
    statements.join("\n")
}

/// Resolve 1-based key column numbers into quoted column names.
fn key_column_names(keys: &[i16], columns: &[Column]) -> Vec<String> {
    keys.iter()
        .map(|key| {
            columns
                .iter()
                .find(|c| c.position == *key)
                .map(|c| quote_ident(&c.name))
                .unwrap_or_else(|| panic!("column number {key} not found in table columns"))
        })
        .collect()
}

fn constraint_definition(
    constraint: &Constraint,
    table_columns: &[Column],
    referenced_columns: Option<&[Column]>,
) -> String {
    match constraint.kind {
        ConstraintKind::PrimaryKey => format!(
            "PRIMARY KEY ({})",
            key_column_names(&constraint.key_columns, table_columns).join(", ")
        ),
        ConstraintKind::Unique => {
            let mut def = format!(
                "UNIQUE ({})",
                key_column_names(&constraint.key_columns, table_columns).join(", ")
            );
            if let Some(predicate) = &constraint.predicate {
                def.push_str(&format!(" WHERE ({predicate})"));
            }
            def
        }
        ConstraintKind::Check => {
            let expression = constraint
                .expression
                .as_deref()
                .unwrap_or_else(|| panic!("check constraint {} missing expression", constraint.name));
            format!("CHECK ({expression})")
        }
        ConstraintKind::ForeignKey => {
            let referenced = referenced_columns.unwrap_or_else(|| {
                panic!(
                    "foreign key {} missing referenced table columns",
                    constraint.name
                )
            });
            let target = referenced.first().unwrap_or_else(|| {
                panic!("foreign key {} has no referenced columns", constraint.name)
            });
            let mut def = format!(
                "FOREIGN KEY ({}) REFERENCES {} ({})",
                key_column_names(&constraint.key_columns, table_columns).join(", "),
                qualified(&target.schema, &target.table),
                key_column_names(&constraint.fk_ref_columns, referenced).join(", ")
            );
            if constraint.fk_update_action != FkAction::NoAction {
                def.push_str(&format!(" ON UPDATE {}", constraint.fk_update_action.as_sql()));
            }
            if constraint.fk_delete_action != FkAction::NoAction {
                def.push_str(&format!(" ON DELETE {}", constraint.fk_delete_action.as_sql()));
            }
            if constraint.deferrable {
                def.push_str(" DEFERRABLE");
                if constraint.deferred {
                    def.push_str(" INITIALLY DEFERRED");
                }
            }
            def
        }
        ConstraintKind::Exclusion => constraint
            .exclusion_definition
            .clone()
            .unwrap_or_else(|| panic!("exclusion constraint {} missing definition", constraint.name)),
    }
}

/// ALTER CONSTRAINT is only defined for deferrability changes on foreign
/// keys; the differ guarantees that shape.
fn alter_constraint_sql(old: &Constraint, new: &Constraint) -> String {
    let mut parts = Vec::new();
    if old.deferrable != new.deferrable {
        parts.push(if new.deferrable { "DEFERRABLE" } else { "NOT DEFERRABLE" });
    }
    if old.deferred != new.deferred {
        parts.push(if new.deferred {
            "INITIALLY DEFERRED"
        } else {
            "INITIALLY IMMEDIATE"
        });
    }
    format!(
        "ALTER TABLE {} ALTER CONSTRAINT {} {};",
        qualified(&new.schema, &new.table),
        quote_ident(&new.name),
        parts.join(" ")
    )
}

fn create_policy_sql(policy: &pgdrift_catalog::Policy) -> String {
    let mut parts = vec![format!(
        "CREATE POLICY {} ON {}",
        quote_ident(&policy.name),
        qualified(&policy.schema, &policy.table)
    )];
    parts.push(if policy.permissive { "AS PERMISSIVE" } else { "AS RESTRICTIVE" }.to_string());
    parts.push(format!("FOR {}", policy.command.as_sql()));
    if !policy.roles.is_empty() {
        parts.push(format!("TO {}", policy_roles_sql(&policy.roles)));
    }
    if let Some(using) = &policy.using_expr {
        parts.push(format!("USING ({using})"));
    }
    if let Some(check) = &policy.check_expr {
        parts.push(format!("WITH CHECK ({check})"));
    }
    format!("{};", parts.join(" "))
}

fn policy_roles_sql(roles: &[String]) -> String {
    roles
        .iter()
        .map(|role| match role.as_str() {
            // Role keywords stay bare.
            "public" | "current_role" | "current_user" | "session_user" => role.clone(),
            _ => quote_ident(role),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn alter_policy_sql(
    schema: &str,
    table: &str,
    name: &str,
    roles: Option<&[String]>,
    using_expr: Option<&str>,
    check_expr: Option<&str>,
) -> String {
    let mut parts = vec![format!(
        "ALTER POLICY {} ON {}",
        quote_ident(name),
        qualified(schema, table)
    )];
    if let Some(roles) = roles {
        parts.push(format!("TO {}", policy_roles_sql(roles)));
    }
    if let Some(using) = using_expr {
        parts.push(format!("USING ({using})"));
    }
    if let Some(check) = check_expr {
        parts.push(format!("WITH CHECK ({check})"));
    }
    format!("{};", parts.join(" "))
}

fn create_type_sql(type_def: &pgdrift_catalog::TypeDef) -> String {
    let name = qualified(&type_def.schema, &type_def.name);
    match &type_def.shape {
        TypeShape::Enum { values } => {
            let labels: Vec<String> = values
                .iter()
                .map(|value| format!("'{}'", value.replace('\'', "''")))
                .collect();
            format!("CREATE TYPE {} AS ENUM ({});", name, labels.join(", "))
        }
        TypeShape::Domain {
            base_type,
            constraints,
        } => {
            let mut sql = format!("CREATE DOMAIN {name} AS {base_type}");
            for constraint in constraints {
                sql.push(' ');
                sql.push_str(constraint.trim());
            }
            format!("{sql};")
        }
        TypeShape::Composite { fields } => {
            let defs: Vec<String> = fields
                .iter()
                .map(|field| format!("{} {}", quote_ident(&field.name), field.type_name))
                .collect();
            format!("CREATE TYPE {} AS ({});", name, defs.join(", "))
        }
        TypeShape::Range { subtype } => {
            format!("CREATE TYPE {name} AS RANGE (SUBTYPE = {subtype});")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::*;
    use pgdrift_catalog::{PolicyCommand, SequenceOwner, StableId};

    fn single_change(source: &pgdrift_catalog::Catalog, target: &pgdrift_catalog::Catalog) -> Change {
        let mut changes = crate::diff::collect_changes(source, target);
        assert_eq!(changes.len(), 1, "expected one change, got {changes:?}");
        changes.remove(0)
    }

    #[test]
    fn quoting_doubles_embedded_quotes() {
        assert_eq!(quote_ident("users"), "\"users\"");
        assert_eq!(quote_ident("we\"ird"), "\"we\"\"ird\"");
        assert_eq!(qualified("public", "users"), "\"public\".\"users\"");
    }

    #[test]
    fn add_column_statement() {
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

        let sql = emit(&single_change(&source, &target));
        assert_eq!(sql, "ALTER TABLE \"public\".\"users\" ADD COLUMN \"email\" text;");
    }

    #[test]
    fn create_table_snapshot() {
        let source = catalog_with(|b| {
            b.schema("public");
        });
        let target = catalog_with(|b| {
            b.schema("public");
            b.table_built("public", "users", |t| {
                t.column("id", "bigint", false);
                t.column("email", "text", false);
                t.column("bio", "text", true);
                t.column_with_default("created_at", "timestamp with time zone", "now()");
            });
        });

        insta::assert_snapshot!(emit(&single_change(&source, &target)), @r#"
        CREATE TABLE "public"."users" (
            "id" bigint NOT NULL,
            "email" text NOT NULL,
            "bio" text,
            "created_at" timestamp with time zone DEFAULT now()
        );
        "#);
    }

    #[test]
    fn create_table_with_generated_column() {
        let source = catalog_with(|b| {
            b.schema("public");
        });
        let target = catalog_with(|b| {
            b.schema("public");
            b.table_built("public", "m", |t| {
                t.column("a", "integer", false);
                t.generated_column("b", "integer", "(a * 2)");
            });
        });

        insta::assert_snapshot!(emit(&single_change(&source, &target)), @r#"
        CREATE TABLE "public"."m" (
            "a" integer NOT NULL,
            "b" integer GENERATED ALWAYS AS ((a * 2)) STORED
        );
        "#);
    }

    #[test]
    fn multi_op_alter_table_joins_actions() {
        let source = catalog_with(|b| {
            b.schema("public");
            b.table("public", "t", &[("a", "integer", true), ("b", "integer", true)]);
        });
        let target = catalog_with(|b| {
            b.schema("public");
            b.table("public", "t", &[("a", "bigint", true), ("c", "text", true)]);
        });

        let sql = emit(&single_change(&source, &target));
        insta::assert_snapshot!(sql, @r#"ALTER TABLE "public"."t" ALTER COLUMN "a" TYPE bigint, DROP COLUMN "b", ADD COLUMN "c" text;"#);
    }

    #[test]
    fn replace_view_uses_create_or_replace() {
        let source = catalog_with(|b| {
            b.schema("public");
            b.view("public", "v", "SELECT id FROM public.t");
        });
        let target = catalog_with(|b| {
            b.schema("public");
            b.view("public", "v", "SELECT id, name FROM public.t;");
        });

        let sql = emit(&single_change(&source, &target));
        assert_eq!(
            sql,
            "CREATE OR REPLACE VIEW \"public\".\"v\" AS SELECT id, name FROM public.t;"
        );
    }

    #[test]
    fn replace_materialized_view_drops_then_creates() {
        let source = catalog_with(|b| {
            b.schema("public");
            b.materialized_view("public", "mv", "SELECT 1 AS one");
        });
        let target = catalog_with(|b| {
            b.schema("public");
            b.materialized_view("public", "mv", "SELECT 2 AS two");
        });

        insta::assert_snapshot!(emit(&single_change(&source, &target)), @r#"
        DROP MATERIALIZED VIEW "public"."mv";
        CREATE MATERIALIZED VIEW "public"."mv" AS SELECT 2 AS two WITH NO DATA;
        "#);
    }

    #[test]
    fn create_index_reuses_captured_definition() {
        let change = Change::CreateIndex {
            stable_id: StableId::from("i:public.idx"),
            index: pgdrift_catalog::Index {
                name: "idx".to_string(),
                schema: "public".to_string(),
                table: "t".to_string(),
                unique: false,
                primary: false,
                backs_constraint: false,
                definition: "CREATE INDEX idx ON public.t USING btree (id)".to_string(),
                oid: 1,
                table_oid: 2,
                table_kind: pgdrift_catalog::RelationKind::Table,
            },
        };
        assert_eq!(emit(&change), "CREATE INDEX idx ON public.t USING btree (id);");
    }

    #[test]
    fn sequence_statements() {
        let seq = pgdrift_catalog::Sequence {
            name: "users_id_seq".to_string(),
            schema: "app".to_string(),
            data_type: "bigint".to_string(),
            increment: 1,
            min_value: Some(1),
            max_value: Some(9223372036854775807),
            start: 1,
            cache: 1,
            cycle: false,
            owned_by: None,
            oid: 1,
        };
        let create = Change::CreateSequence {
            stable_id: seq.stable_id(),
            sequence: seq.clone(),
        };
        assert_eq!(
            emit(&create),
            "CREATE SEQUENCE \"app\".\"users_id_seq\" MINVALUE 1 MAXVALUE 9223372036854775807 NO CYCLE;"
        );

        let owner = Change::AlterSequenceOwner {
            stable_id: seq.stable_id(),
            schema: "app".to_string(),
            name: "users_id_seq".to_string(),
            owner: Some(SequenceOwner {
                table: "users".to_string(),
                column: "id".to_string(),
            }),
        };
        assert_eq!(
            emit(&owner),
            "ALTER SEQUENCE \"app\".\"users_id_seq\" OWNED BY \"app\".\"users\".\"id\";"
        );

        let mut cycled = seq.clone();
        cycled.cycle = true;
        cycled.cache = 10;
        let alter = Change::AlterSequence {
            stable_id: seq.stable_id(),
            old: seq,
            new: cycled,
        };
        assert_eq!(
            emit(&alter),
            "ALTER SEQUENCE \"app\".\"users_id_seq\" CACHE 10 CYCLE;"
        );
    }

    #[test]
    fn foreign_key_constraint_definition() {
        let source = catalog_with(|b| {
            b.schema("public");
            b.table("public", "users", &[("id", "bigint", false)]);
            b.table(
                "public",
                "posts",
                &[("id", "bigint", false), ("author_id", "bigint", false)],
            );
        });
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

        let sql = emit(&single_change(&source, &target));
        assert_eq!(
            sql,
            "ALTER TABLE \"public\".\"posts\" ADD CONSTRAINT \"posts_author_fkey\" \
             FOREIGN KEY (\"author_id\") REFERENCES \"public\".\"users\" (\"id\");"
        );
    }

    #[test]
    fn check_constraint_definition() {
        let source = catalog_with(|b| {
            b.schema("public");
            b.table("public", "t", &[("a", "integer", false)]);
        });
        let target = catalog_with(|b| {
            b.schema("public");
            b.table("public", "t", &[("a", "integer", false)]);
            b.check_constraint("public", "t", "t_a_check", "a > 0");
        });

        let sql = emit(&single_change(&source, &target));
        assert_eq!(
            sql,
            "ALTER TABLE \"public\".\"t\" ADD CONSTRAINT \"t_a_check\" CHECK (a > 0);"
        );
    }

    #[test]
    fn alter_constraint_deferrability() {
        let source = catalog_with(|b| {
            b.schema("public");
            b.table("public", "users", &[("id", "bigint", false)]);
            b.table("public", "posts", &[("id", "bigint", false), ("author_id", "bigint", false)]);
            b.foreign_key("public", "posts", "fk", &[2], "users", &[1], false);
        });
        let target = catalog_with(|b| {
            b.schema("public");
            b.table("public", "users", &[("id", "bigint", false)]);
            b.table("public", "posts", &[("id", "bigint", false), ("author_id", "bigint", false)]);
            b.foreign_key("public", "posts", "fk", &[2], "users", &[1], true);
        });

        let sql = emit(&single_change(&source, &target));
        assert_eq!(
            sql,
            "ALTER TABLE \"public\".\"posts\" ALTER CONSTRAINT \"fk\" DEFERRABLE INITIALLY DEFERRED;"
        );
    }

    #[test]
    fn replace_function_substitutes_prefix() {
        let function = pgdrift_catalog::Function {
            name: "add_one".to_string(),
            schema: "public".to_string(),
            arguments: "integer".to_string(),
            definition: "CREATE FUNCTION public.add_one(integer) RETURNS integer\n LANGUAGE sql\nAS $function$ SELECT $1 + 1 $function$".to_string(),
            oid: 1,
        };
        let sql = emit(&Change::ReplaceFunction {
            stable_id: function.stable_id(),
            function,
        });
        assert!(sql.starts_with("CREATE OR REPLACE FUNCTION public.add_one"));
        assert!(sql.ends_with(';'));
    }

    #[test]
    fn drop_function_includes_arguments() {
        let function = pgdrift_catalog::Function {
            name: "add_one".to_string(),
            schema: "public".to_string(),
            arguments: "integer".to_string(),
            definition: String::new(),
            oid: 1,
        };
        let sql = emit(&Change::DropFunction {
            stable_id: function.stable_id(),
            function,
        });
        assert_eq!(sql, "DROP FUNCTION \"public\".\"add_one\"(integer);");
    }

    #[test]
    fn policy_statements() {
        let source = catalog_with(|b| {
            b.schema("public");
            b.rls_table("public", "docs", &[("owner", "text", false)]);
        });
        let target = catalog_with(|b| {
            b.schema("public");
            b.rls_table("public", "docs", &[("owner", "text", false)]);
            b.policy("public", "docs", "docs_owner", PolicyCommand::Select, "(owner = current_user)");
        });

        let sql = emit(&single_change(&source, &target));
        assert_eq!(
            sql,
            "CREATE POLICY \"docs_owner\" ON \"public\".\"docs\" AS PERMISSIVE FOR SELECT \
             TO public USING ((owner = current_user));"
        );
    }

    #[test]
    fn alter_policy_emits_only_changed_clauses() {
        let change = Change::AlterPolicy {
            stable_id: StableId::from("p:public.docs.docs_owner"),
            schema: "public".to_string(),
            table: "docs".to_string(),
            name: "docs_owner".to_string(),
            roles: None,
            using_expr: Some("(owner = session_user)".to_string()),
            check_expr: None,
        };
        assert_eq!(
            emit(&change),
            "ALTER POLICY \"docs_owner\" ON \"public\".\"docs\" USING ((owner = session_user));"
        );
    }

    #[test]
    fn type_statements() {
        let source = catalog_with(|b| {
            b.schema("public");
        });
        let enum_target = catalog_with(|b| {
            b.schema("public");
            b.enum_type("public", "mood", &["sad", "ok", "happy"]);
        });
        assert_eq!(
            emit(&single_change(&source, &enum_target)),
            "CREATE TYPE \"public\".\"mood\" AS ENUM ('sad', 'ok', 'happy');"
        );

        let composite_target = catalog_with(|b| {
            b.schema("public");
            b.composite_type("public", "point3d", &[("x", "double precision"), ("y", "double precision")]);
        });
        assert_eq!(
            emit(&single_change(&source, &composite_target)),
            "CREATE TYPE \"public\".\"point3d\" AS (\"x\" double precision, \"y\" double precision);"
        );
    }

    #[test]
    fn schema_statements() {
        let empty = pgdrift_catalog::Catalog::empty();
        let target = catalog_with(|b| {
            b.schema("app");
        });
        assert_eq!(emit(&single_change(&empty, &target)), "CREATE SCHEMA \"app\";");
        assert_eq!(emit(&single_change(&target, &empty)), "DROP SCHEMA \"app\";");
    }

    #[test]
    fn emit_all_preserves_order() {
        let source = pgdrift_catalog::Catalog::empty();
        let target = catalog_with(|b| {
            b.schema("app");
            b.table("app", "users", &[("id", "bigint", false)]);
        });
        let changes = crate::diff::diff(&source, &target).unwrap();
        let statements = emit_all(&changes);
        assert_eq!(statements.len(), changes.len());
        assert!(statements[0].starts_with("CREATE SCHEMA"));
        assert!(statements[1].starts_with("CREATE TABLE"));
    }
}
