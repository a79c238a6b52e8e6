//! Catalog extraction from a live PostgreSQL session.
//!
//! [`extract_catalog`] issues read-only queries against the system catalogs
//! (`pg_namespace`, `pg_class`, `pg_attribute`, `pg_constraint`, `pg_index`,
//! `pg_sequence`, `pg_policy`, `pg_proc`, `pg_trigger`, `pg_type`,
//! `pg_depend`), filtered to exclude system schemas, and assembles an
//! immutable [`Catalog`]. Whole-schema `pg_get_*` helpers capture the
//! definition strings the emitter later reuses verbatim.
//!
//! The session is only held for the duration of extraction; the returned
//! catalog is a plain in-memory value and never touches the database again.
//!
//! Every query runs inside a `tracing` debug span recording the row count,
//! so `RUST_LOG=pgdrift_extract=debug` shows exactly what was read.

use std::collections::HashMap;

use thiserror::Error;
use tokio_postgres::types::ToSql;
use tokio_postgres::{Client, Row};
use tracing::Instrument;

use pgdrift_catalog::{
    Catalog, CatalogError, Column, CompositeField, Constraint, ConstraintKind, DependEdge,
    DependKind, FkAction, Function, Index, Policy, PolicyCommand, Relation, RelationKind, Schema,
    Sequence, SequenceOwner, StableId, Trigger, TypeDef, TypeShape,
};

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("postgres error: {0}")]
    Postgres(#[from] tokio_postgres::Error),

    #[error("extracted catalog is invalid: {0}")]
    Catalog(#[from] CatalogError),
}

/// Schemas never extracted. Everything else in the database is considered
/// user schema.
const SCHEMA_FILTER: &str = "n.nspname NOT IN ('information_schema', 'pg_catalog', 'pg_toast') \
     AND n.nspname NOT LIKE 'pg_temp_%' AND n.nspname NOT LIKE 'pg_toast_temp_%'";

async fn query(
    client: &Client,
    label: &'static str,
    sql: &str,
    params: &[&(dyn ToSql + Sync)],
) -> Result<Vec<Row>, tokio_postgres::Error> {
    let span = tracing::debug_span!("extract.query", query = label, rows = tracing::field::Empty);
    let rows = client.query(sql, params).instrument(span.clone()).await?;
    span.record("rows", rows.len());
    Ok(rows)
}

/// Extract a whole-schema snapshot from the database the client is
/// connected to.
pub async fn extract_catalog(client: &Client) -> Result<Catalog, ExtractError> {
    // Empty search_path makes pg_get_viewdef / pg_get_expr / format_type
    // print fully qualified names, which keeps captured definitions portable.
    client.batch_execute("SET search_path = ''").await?;

    let schemas = extract_schemas(client).await?;
    let relations = extract_relations(client).await?;
    let columns = extract_columns(client).await?;
    let constraints = extract_constraints(client).await?;
    let indexes = extract_indexes(client).await?;
    let sequences = extract_sequences(client).await?;
    let policies = extract_policies(client).await?;
    let functions = extract_functions(client).await?;
    let triggers = extract_triggers(client).await?;
    let types = extract_types(client).await?;

    let mut depends = extract_depends(
        client,
        &schemas,
        &relations,
        &constraints,
        &indexes,
        &sequences,
        &policies,
        &functions,
        &triggers,
        &types,
    )
    .await?;
    depends.extend(extract_view_depends(client, &relations).await?);

    let catalog = Catalog::builder()
        .schemas(schemas)
        .relations(relations)
        .columns(columns)
        .constraints(constraints)
        .indexes(indexes)
        .sequences(sequences)
        .policies(policies)
        .functions(functions)
        .triggers(triggers)
        .types(types)
        .depends(depends)
        .build()?;
    Ok(catalog)
}

async fn extract_schemas(client: &Client) -> Result<Vec<Schema>, ExtractError> {
    let sql = format!(
        "SELECT n.oid, n.nspname FROM pg_catalog.pg_namespace n WHERE {SCHEMA_FILTER} ORDER BY n.nspname"
    );
    let rows = query(client, "schemas", &sql, &[]).await?;
    rows.into_iter()
        .map(|row| {
            Ok(Schema {
                name: row.try_get("nspname")?,
                oid: row.try_get("oid")?,
            })
        })
        .collect()
}

async fn extract_relations(client: &Client) -> Result<Vec<Relation>, ExtractError> {
    let sql = format!(
        "SELECT c.oid, c.relname, c.relkind::text AS relkind, n.nspname AS namespace, \
                CASE WHEN c.relkind IN ('v', 'm') THEN pg_catalog.pg_get_viewdef(c.oid) END AS definition, \
                c.relrowsecurity \
         FROM pg_catalog.pg_class c \
         JOIN pg_catalog.pg_namespace n ON c.relnamespace = n.oid \
         WHERE {SCHEMA_FILTER} AND c.relkind IN ('r', 'v', 'm') \
         ORDER BY n.nspname, c.relname"
    );
    let rows = query(client, "relations", &sql, &[]).await?;
    let mut relations = Vec::with_capacity(rows.len());
    for row in rows {
        let relkind: String = row.try_get("relkind")?;
        let Some(kind) = RelationKind::from_code(&relkind) else {
            continue;
        };
        let definition: Option<String> = row.try_get("definition")?;
        relations.push(Relation {
            name: row.try_get("relname")?,
            schema: row.try_get("namespace")?,
            kind,
            definition: definition.map(|d| d.trim().to_string()),
            row_security: row.try_get("relrowsecurity")?,
            oid: row.try_get("oid")?,
        });
    }
    Ok(relations)
}

async fn extract_columns(client: &Client) -> Result<Vec<Column>, ExtractError> {
    let sql = format!(
        "SELECT a.attrelid, a.attname, a.attnum, a.attnotnull, \
                n.nspname AS namespace, c.relname, c.relkind::text AS relkind, \
                pg_catalog.format_type(a.atttypid, a.atttypmod) AS type_name, \
                CASE WHEN a.attgenerated = '' THEN pg_catalog.pg_get_expr(d.adbin, d.adrelid) END AS default_expr, \
                CASE WHEN a.attgenerated = 's' THEN pg_catalog.pg_get_expr(g.adbin, g.adrelid, true) END AS generated_expr \
         FROM pg_catalog.pg_attribute a \
         JOIN pg_catalog.pg_class c ON a.attrelid = c.oid \
         JOIN pg_catalog.pg_namespace n ON c.relnamespace = n.oid \
         LEFT JOIN pg_catalog.pg_attrdef d ON a.attrelid = d.adrelid AND a.attnum = d.adnum AND a.attgenerated = '' \
         LEFT JOIN pg_catalog.pg_attrdef g ON a.attrelid = g.adrelid AND a.attnum = g.adnum AND a.attgenerated = 's' \
         WHERE {SCHEMA_FILTER} AND c.relkind IN ('r', 'v', 'm') \
           AND a.attnum > 0 AND NOT a.attisdropped \
         ORDER BY n.nspname, c.relname, a.attnum"
    );
    let rows = query(client, "columns", &sql, &[]).await?;
    let mut columns = Vec::with_capacity(rows.len());
    for row in rows {
        let relkind: String = row.try_get("relkind")?;
        let Some(relation_kind) = RelationKind::from_code(&relkind) else {
            continue;
        };
        columns.push(Column {
            schema: row.try_get("namespace")?,
            table: row.try_get("relname")?,
            name: row.try_get("attname")?,
            position: row.try_get("attnum")?,
            not_null: row.try_get("attnotnull")?,
            type_name: row.try_get("type_name")?,
            default: row.try_get("default_expr")?,
            generated: row.try_get("generated_expr")?,
            relation_kind,
            relation_oid: row.try_get("attrelid")?,
        });
    }
    Ok(columns)
}

async fn extract_constraints(client: &Client) -> Result<Vec<Constraint>, ExtractError> {
    let sql = format!(
        "SELECT c.oid, c.conname, c.contype::text AS contype, c.condeferrable, c.condeferred, \
                c.conrelid, c.confrelid, \
                c.confupdtype::text AS fk_update, c.confdeltype::text AS fk_delete, \
                c.conkey, c.confkey, \
                CASE WHEN c.contype = 'c' THEN substring(pg_get_constraintdef(c.oid) from 'CHECK \\((.*)\\)$') END AS check_expr, \
                CASE WHEN c.contype = 'x' THEN pg_get_constraintdef(c.oid) END AS exclusion_def, \
                n.nspname AS namespace, r.relname AS table_name \
         FROM pg_catalog.pg_constraint c \
         JOIN pg_catalog.pg_class r ON c.conrelid = r.oid \
         JOIN pg_catalog.pg_namespace n ON r.relnamespace = n.oid \
         WHERE {SCHEMA_FILTER} AND r.relkind = 'r' \
         ORDER BY n.nspname, r.relname, c.conname"
    );
    let rows = query(client, "constraints", &sql, &[]).await?;
    let mut constraints = Vec::with_capacity(rows.len());
    for row in rows {
        let contype: String = row.try_get("contype")?;
        let Some(kind) = ConstraintKind::from_code(&contype) else {
            // Constraint triggers and future kinds are not diffed.
            continue;
        };
        let fk_update: String = row.try_get("fk_update")?;
        let fk_delete: String = row.try_get("fk_delete")?;
        let key_columns: Option<Vec<i16>> = row.try_get("conkey")?;
        let fk_ref_columns: Option<Vec<i16>> = row.try_get("confkey")?;
        constraints.push(Constraint {
            name: row.try_get("conname")?,
            schema: row.try_get("namespace")?,
            table: row.try_get("table_name")?,
            kind,
            deferrable: row.try_get("condeferrable")?,
            deferred: row.try_get("condeferred")?,
            key_columns: key_columns.unwrap_or_default(),
            fk_ref_columns: fk_ref_columns.unwrap_or_default(),
            fk_update_action: FkAction::from_code(&fk_update),
            fk_delete_action: FkAction::from_code(&fk_delete),
            expression: row.try_get("check_expr")?,
            predicate: None,
            exclusion_definition: row.try_get("exclusion_def")?,
            oid: row.try_get("oid")?,
            table_oid: row.try_get("conrelid")?,
            fk_ref_table_oid: row.try_get("confrelid")?,
        });
    }
    Ok(constraints)
}

async fn extract_indexes(client: &Client) -> Result<Vec<Index>, ExtractError> {
    let sql = format!(
        "SELECT ci.oid, ci.relname AS index_name, n.nspname AS namespace, ct.relname AS table_name, \
                ct.relkind::text AS table_relkind, \
                i.indrelid AS table_oid, i.indisunique, i.indisprimary, \
                pg_get_indexdef(i.indexrelid) AS definition, \
                EXISTS (SELECT 1 FROM pg_catalog.pg_constraint c WHERE c.conindid = i.indexrelid) AS backs_constraint \
         FROM pg_catalog.pg_index i \
         JOIN pg_catalog.pg_class ci ON i.indexrelid = ci.oid \
         JOIN pg_catalog.pg_class ct ON i.indrelid = ct.oid \
         JOIN pg_catalog.pg_namespace n ON ci.relnamespace = n.oid \
         WHERE {SCHEMA_FILTER} \
         ORDER BY n.nspname, ci.relname"
    );
    let rows = query(client, "indexes", &sql, &[]).await?;
    let mut indexes = Vec::with_capacity(rows.len());
    for row in rows {
        let table_relkind: String = row.try_get("table_relkind")?;
        let Some(table_kind) = RelationKind::from_code(&table_relkind) else {
            continue;
        };
        indexes.push(Index {
            name: row.try_get("index_name")?,
            schema: row.try_get("namespace")?,
            table: row.try_get("table_name")?,
            unique: row.try_get("indisunique")?,
            primary: row.try_get("indisprimary")?,
            backs_constraint: row.try_get("backs_constraint")?,
            definition: row.try_get("definition")?,
            oid: row.try_get("oid")?,
            table_oid: row.try_get("table_oid")?,
            table_kind,
        });
    }
    Ok(indexes)
}

async fn extract_sequences(client: &Client) -> Result<Vec<Sequence>, ExtractError> {
    let sql = format!(
        "SELECT c.oid, c.relname AS seqname, n.nspname AS namespace, \
                s.seqtypid::regtype::text AS data_type, \
                s.seqincrement, s.seqmin, s.seqmax, s.seqstart, s.seqcache, s.seqcycle, \
                ref_c.relname AS owned_by_table, ref_a.attname AS owned_by_column \
         FROM pg_catalog.pg_sequence s \
         JOIN pg_catalog.pg_class c ON s.seqrelid = c.oid \
         JOIN pg_catalog.pg_namespace n ON c.relnamespace = n.oid \
         LEFT JOIN pg_catalog.pg_depend dep ON ( \
             dep.objid = c.oid AND dep.classid = 'pg_catalog.pg_class'::regclass \
             AND dep.objsubid = 0 AND dep.deptype = 'a') \
         LEFT JOIN pg_catalog.pg_class ref_c ON dep.refobjid = ref_c.oid \
         LEFT JOIN pg_catalog.pg_attribute ref_a ON ( \
             dep.refobjid = ref_a.attrelid AND dep.refobjsubid = ref_a.attnum) \
         WHERE {SCHEMA_FILTER} \
         ORDER BY n.nspname, c.relname"
    );
    let rows = query(client, "sequences", &sql, &[]).await?;
    rows.into_iter()
        .map(|row| {
            let owned_by_table: Option<String> = row.try_get("owned_by_table")?;
            let owned_by_column: Option<String> = row.try_get("owned_by_column")?;
            let owned_by = match (owned_by_table, owned_by_column) {
                (Some(table), Some(column)) => Some(SequenceOwner { table, column }),
                _ => None,
            };
            Ok(Sequence {
                name: row.try_get("seqname")?,
                schema: row.try_get("namespace")?,
                data_type: row.try_get("data_type")?,
                increment: row.try_get("seqincrement")?,
                min_value: Some(row.try_get("seqmin")?),
                max_value: Some(row.try_get("seqmax")?),
                start: row.try_get("seqstart")?,
                cache: row.try_get("seqcache")?,
                cycle: row.try_get("seqcycle")?,
                owned_by,
                oid: row.try_get("oid")?,
            })
        })
        .collect()
}

async fn extract_policies(client: &Client) -> Result<Vec<Policy>, ExtractError> {
    let sql = format!(
        "SELECT pol.oid, pol.polname, c.relname AS tablename, n.nspname AS namespace, \
                pol.polcmd::text AS polcmd, pol.polpermissive, \
                CASE WHEN pol.polroles = '{{0}}' THEN ARRAY['public']::text[] \
                     ELSE ARRAY(SELECT rolname FROM pg_catalog.pg_roles WHERE oid = ANY(pol.polroles) ORDER BY rolname)::text[] \
                END AS roles, \
                pg_catalog.pg_get_expr(pol.polqual, c.oid) AS using_expr, \
                pg_catalog.pg_get_expr(pol.polwithcheck, c.oid) AS check_expr \
         FROM pg_catalog.pg_policy pol \
         JOIN pg_catalog.pg_class c ON pol.polrelid = c.oid \
         JOIN pg_catalog.pg_namespace n ON c.relnamespace = n.oid \
         WHERE {SCHEMA_FILTER} \
         ORDER BY n.nspname, c.relname, pol.polname"
    );
    let rows = query(client, "policies", &sql, &[]).await?;
    let mut policies = Vec::with_capacity(rows.len());
    for row in rows {
        let polcmd: String = row.try_get("polcmd")?;
        let Some(command) = PolicyCommand::from_code(&polcmd) else {
            continue;
        };
        let roles: Option<Vec<String>> = row.try_get("roles")?;
        policies.push(Policy {
            name: row.try_get("polname")?,
            schema: row.try_get("namespace")?,
            table: row.try_get("tablename")?,
            command,
            permissive: row.try_get("polpermissive")?,
            roles: roles.unwrap_or_default(),
            using_expr: row.try_get("using_expr")?,
            check_expr: row.try_get("check_expr")?,
            oid: row.try_get("oid")?,
        });
    }
    Ok(policies)
}

async fn extract_functions(client: &Client) -> Result<Vec<Function>, ExtractError> {
    // prokind = 'f' only; auto-generated functions (e.g. type I/O) carry an
    // internal dependency and are skipped.
    let sql = format!(
        "SELECT p.oid, p.proname, n.nspname AS namespace, \
                pg_catalog.pg_get_function_identity_arguments(p.oid) AS arguments, \
                pg_catalog.pg_get_functiondef(p.oid) AS definition \
         FROM pg_catalog.pg_proc p \
         JOIN pg_catalog.pg_namespace n ON p.pronamespace = n.oid \
         WHERE {SCHEMA_FILTER} AND p.prokind = 'f' \
           AND NOT EXISTS ( \
               SELECT 1 FROM pg_catalog.pg_depend d \
               WHERE d.classid = 'pg_catalog.pg_proc'::regclass \
                 AND d.objid = p.oid AND d.deptype = 'i') \
         ORDER BY n.nspname, p.proname, p.oid"
    );
    let rows = query(client, "functions", &sql, &[]).await?;
    rows.into_iter()
        .map(|row| {
            let arguments: Option<String> = row.try_get("arguments")?;
            Ok(Function {
                name: row.try_get("proname")?,
                schema: row.try_get("namespace")?,
                arguments: arguments.unwrap_or_default(),
                definition: row.try_get("definition")?,
                oid: row.try_get("oid")?,
            })
        })
        .collect()
}

async fn extract_triggers(client: &Client) -> Result<Vec<Trigger>, ExtractError> {
    let sql = format!(
        "SELECT t.oid, t.tgname, t.tgrelid, t.tgfoid, n.nspname AS namespace, c.relname AS table_name, \
                c.relkind::text AS table_relkind, \
                pg_catalog.pg_get_triggerdef(t.oid) AS definition \
         FROM pg_catalog.pg_trigger t \
         JOIN pg_catalog.pg_class c ON t.tgrelid = c.oid \
         JOIN pg_catalog.pg_namespace n ON c.relnamespace = n.oid \
         WHERE {SCHEMA_FILTER} AND NOT t.tgisinternal \
         ORDER BY n.nspname, c.relname, t.tgname"
    );
    let rows = query(client, "triggers", &sql, &[]).await?;
    let mut triggers = Vec::with_capacity(rows.len());
    for row in rows {
        let table_relkind: String = row.try_get("table_relkind")?;
        let Some(table_kind) = RelationKind::from_code(&table_relkind) else {
            continue;
        };
        triggers.push(Trigger {
            name: row.try_get("tgname")?,
            schema: row.try_get("namespace")?,
            table: row.try_get("table_name")?,
            definition: row.try_get("definition")?,
            oid: row.try_get("oid")?,
            table_oid: row.try_get("tgrelid")?,
            function_oid: row.try_get("tgfoid")?,
            table_kind,
        });
    }
    Ok(triggers)
}

async fn extract_types(client: &Client) -> Result<Vec<TypeDef>, ExtractError> {
    // Enum, domain, composite, and range types. Row types of plain tables and
    // auto-generated types (internal dependency) are excluded.
    let sql = format!(
        "SELECT t.oid, t.typname, n.nspname AS namespace, t.typtype::text AS typtype \
         FROM pg_catalog.pg_type t \
         JOIN pg_catalog.pg_namespace n ON t.typnamespace = n.oid \
         WHERE {SCHEMA_FILTER} \
           AND t.typtype IN ('e', 'd', 'c', 'r') AND t.typisdefined \
           AND NOT (t.typtype = 'c' AND t.typrelid != 0 AND EXISTS ( \
               SELECT 1 FROM pg_catalog.pg_class c WHERE c.oid = t.typrelid AND c.relkind = 'r')) \
           AND NOT EXISTS ( \
               SELECT 1 FROM pg_catalog.pg_depend d \
               WHERE d.classid = 'pg_catalog.pg_type'::regclass \
                 AND d.objid = t.oid AND d.deptype = 'i') \
         ORDER BY n.nspname, t.typname"
    );
    let rows = query(client, "types", &sql, &[]).await?;
    let mut types = Vec::with_capacity(rows.len());
    for row in rows {
        let oid: u32 = row.try_get("oid")?;
        let typtype: String = row.try_get("typtype")?;
        let name: String = row.try_get("typname")?;
        let schema: String = row.try_get("namespace")?;
        let shape = match typtype.as_str() {
            "e" => Some(TypeShape::Enum {
                values: extract_enum_values(client, oid).await?,
            }),
            "d" => extract_domain_shape(client, oid).await?,
            "c" => extract_composite_shape(client, oid).await?,
            "r" => extract_range_shape(client, oid).await?,
            _ => None,
        };
        match shape {
            Some(shape) => types.push(TypeDef {
                name,
                schema,
                shape,
                oid,
            }),
            None => {
                tracing::warn!(type_name = %name, %schema, "skipping type with unreadable shape");
            }
        }
    }
    Ok(types)
}

async fn extract_enum_values(client: &Client, type_oid: u32) -> Result<Vec<String>, ExtractError> {
    let rows = query(
        client,
        "enum_values",
        "SELECT enumlabel FROM pg_catalog.pg_enum WHERE enumtypid = $1 ORDER BY enumsortorder",
        &[&type_oid],
    )
    .await?;
    rows.into_iter()
        .map(|row| Ok(row.try_get("enumlabel")?))
        .collect()
}

async fn extract_domain_shape(
    client: &Client,
    type_oid: u32,
) -> Result<Option<TypeShape>, ExtractError> {
    let base = query(
        client,
        "domain_base",
        "SELECT format_type(typbasetype, typtypmod) AS base_type FROM pg_catalog.pg_type WHERE oid = $1",
        &[&type_oid],
    )
    .await?;
    let Some(row) = base.first() else {
        return Ok(None);
    };
    let base_type: Option<String> = row.try_get("base_type")?;
    let Some(base_type) = base_type else {
        return Ok(None);
    };

    let rows = query(
        client,
        "domain_constraints",
        "SELECT pg_catalog.pg_get_constraintdef(oid) AS def \
         FROM pg_catalog.pg_constraint WHERE contypid = $1 ORDER BY conname",
        &[&type_oid],
    )
    .await?;
    let mut constraints = Vec::with_capacity(rows.len());
    for row in rows {
        let def: Option<String> = row.try_get("def")?;
        if let Some(def) = def {
            constraints.push(def);
        }
    }
    Ok(Some(TypeShape::Domain {
        base_type,
        constraints,
    }))
}

async fn extract_composite_shape(
    client: &Client,
    type_oid: u32,
) -> Result<Option<TypeShape>, ExtractError> {
    let rows = query(
        client,
        "composite_fields",
        "SELECT a.attname, format_type(a.atttypid, a.atttypmod) AS type_name, a.attnum, a.attnotnull \
         FROM pg_catalog.pg_attribute a \
         WHERE a.attrelid = (SELECT typrelid FROM pg_catalog.pg_type WHERE oid = $1) \
           AND a.attnum > 0 AND NOT a.attisdropped \
         ORDER BY a.attnum",
        &[&type_oid],
    )
    .await?;
    if rows.is_empty() {
        return Ok(None);
    }
    let mut fields = Vec::with_capacity(rows.len());
    for row in rows {
        fields.push(CompositeField {
            name: row.try_get("attname")?,
            type_name: row.try_get("type_name")?,
            position: row.try_get("attnum")?,
            not_null: row.try_get("attnotnull")?,
        });
    }
    Ok(Some(TypeShape::Composite { fields }))
}

async fn extract_range_shape(
    client: &Client,
    type_oid: u32,
) -> Result<Option<TypeShape>, ExtractError> {
    let rows = query(
        client,
        "range_subtype",
        "SELECT format_type(rngsubtype, 0) AS subtype FROM pg_catalog.pg_range WHERE rngtypid = $1",
        &[&type_oid],
    )
    .await?;
    let Some(row) = rows.first() else {
        return Ok(None);
    };
    let subtype: Option<String> = row.try_get("subtype")?;
    Ok(subtype.map(|subtype| TypeShape::Range { subtype }))
}

/// Map every extracted object's `(catalog table, oid)` to its stable id, so
/// raw `pg_depend` rows can be resolved. Unresolvable endpoints become
/// `unknown:` ids and are discarded downstream.
#[allow(clippy::too_many_arguments)]
fn oid_map<'a>(
    schemas: &'a [Schema],
    relations: &'a [Relation],
    constraints: &'a [Constraint],
    indexes: &'a [Index],
    sequences: &'a [Sequence],
    policies: &'a [Policy],
    functions: &'a [Function],
    triggers: &'a [Trigger],
    types: &'a [TypeDef],
) -> HashMap<(&'static str, u32), StableId> {
    let mut map = HashMap::new();
    for s in schemas {
        map.insert(("pg_namespace", s.oid), s.stable_id());
    }
    for r in relations {
        map.insert(("pg_class", r.oid), r.stable_id());
    }
    for c in constraints {
        map.insert(("pg_constraint", c.oid), c.stable_id());
    }
    // Indexes and sequences are pg_class objects too.
    for i in indexes {
        map.insert(("pg_class", i.oid), i.stable_id());
    }
    for s in sequences {
        map.insert(("pg_class", s.oid), s.stable_id());
    }
    for p in policies {
        map.insert(("pg_policy", p.oid), p.stable_id());
    }
    for f in functions {
        map.insert(("pg_proc", f.oid), f.stable_id());
    }
    for t in triggers {
        map.insert(("pg_trigger", t.oid), t.stable_id());
    }
    for t in types {
        map.insert(("pg_type", t.oid), t.stable_id());
    }
    map
}

#[allow(clippy::too_many_arguments)]
async fn extract_depends(
    client: &Client,
    schemas: &[Schema],
    relations: &[Relation],
    constraints: &[Constraint],
    indexes: &[Index],
    sequences: &[Sequence],
    policies: &[Policy],
    functions: &[Function],
    triggers: &[Trigger],
    types: &[TypeDef],
) -> Result<Vec<DependEdge>, ExtractError> {
    let class_oids: Vec<u32> = relations
        .iter()
        .map(|r| r.oid)
        .chain(sequences.iter().map(|s| s.oid))
        .collect();
    let constraint_oids: Vec<u32> = constraints.iter().map(|c| c.oid).collect();
    let policy_oids: Vec<u32> = policies.iter().map(|p| p.oid).collect();
    let function_oids: Vec<u32> = functions.iter().map(|f| f.oid).collect();
    let trigger_oids: Vec<u32> = triggers.iter().map(|t| t.oid).collect();
    let type_oids: Vec<u32> = types.iter().map(|t| t.oid).collect();

    let sql = "SELECT DISTINCT d.objid, d.refobjid, d.deptype::text AS deptype, \
                    c1.relname AS classid_name, c2.relname AS refclassid_name \
               FROM pg_catalog.pg_depend d \
               JOIN pg_catalog.pg_class c1 ON d.classid = c1.oid \
               JOIN pg_catalog.pg_class c2 ON d.refclassid = c2.oid \
               WHERE d.deptype IN ('n', 'a', 'i') \
                 AND c1.relnamespace = 'pg_catalog'::regnamespace \
                 AND c2.relnamespace = 'pg_catalog'::regnamespace \
                 AND ( \
                     (c1.relname = 'pg_class' AND d.objid = ANY($1)) \
                  OR (c2.relname = 'pg_class' AND d.refobjid = ANY($1)) \
                  OR (c1.relname = 'pg_constraint' AND d.objid = ANY($2)) \
                  OR (c2.relname = 'pg_constraint' AND d.refobjid = ANY($2)) \
                  OR (c1.relname = 'pg_policy' AND d.objid = ANY($3)) \
                  OR (c2.relname = 'pg_policy' AND d.refobjid = ANY($3)) \
                  OR (c1.relname = 'pg_proc' AND d.objid = ANY($4)) \
                  OR (c2.relname = 'pg_proc' AND d.refobjid = ANY($4)) \
                  OR (c1.relname = 'pg_trigger' AND d.objid = ANY($5)) \
                  OR (c2.relname = 'pg_trigger' AND d.refobjid = ANY($5)) \
                  OR (c1.relname = 'pg_type' AND d.objid = ANY($6)) \
                  OR (c2.relname = 'pg_type' AND d.refobjid = ANY($6)) \
                 ) \
               ORDER BY d.objid";
    let rows = query(
        client,
        "depends",
        sql,
        &[
            &class_oids,
            &constraint_oids,
            &policy_oids,
            &function_oids,
            &trigger_oids,
            &type_oids,
        ],
    )
    .await?;

    let map = oid_map(
        schemas, relations, constraints, indexes, sequences, policies, functions, triggers, types,
    );

    let mut edges = Vec::with_capacity(rows.len());
    for row in rows {
        let objid: u32 = row.try_get("objid")?;
        let refobjid: u32 = row.try_get("refobjid")?;
        let deptype: String = row.try_get("deptype")?;
        let classid_name: String = row.try_get("classid_name")?;
        let refclassid_name: String = row.try_get("refclassid_name")?;
        let Some(kind) = DependKind::from_code(&deptype) else {
            continue;
        };

        let resolve = |class: &str, oid: u32| -> StableId {
            // Interned class names keep the map keyed on 'static strs.
            let key: Option<&'static str> = match class {
                "pg_namespace" => Some("pg_namespace"),
                "pg_class" => Some("pg_class"),
                "pg_constraint" => Some("pg_constraint"),
                "pg_policy" => Some("pg_policy"),
                "pg_proc" => Some("pg_proc"),
                "pg_trigger" => Some("pg_trigger"),
                "pg_type" => Some("pg_type"),
                _ => None,
            };
            key.and_then(|k| map.get(&(k, oid)).cloned())
                .unwrap_or_else(|| StableId::unknown(class, oid))
        };

        edges.push(DependEdge {
            dependent: resolve(&classid_name, objid),
            referenced: resolve(&refclassid_name, refobjid),
            kind,
        });
    }
    Ok(edges)
}

/// View -> referenced-relation edges recovered from rewrite rules.
///
/// `pg_depend` records a view's body dependencies against the view's
/// `pg_rewrite` entry, not the view itself; this maps them back.
async fn extract_view_depends(
    client: &Client,
    relations: &[Relation],
) -> Result<Vec<DependEdge>, ExtractError> {
    let view_oids: Vec<u32> = relations
        .iter()
        .filter(|r| matches!(r.kind, RelationKind::View | RelationKind::MaterializedView))
        .map(|r| r.oid)
        .collect();
    if view_oids.is_empty() {
        return Ok(Vec::new());
    }

    let sql = "SELECT DISTINCT r.ev_class, d.refobjid \
               FROM pg_catalog.pg_depend d \
               JOIN pg_catalog.pg_class c1 ON d.classid = c1.oid \
               JOIN pg_catalog.pg_class c2 ON d.refclassid = c2.oid \
               JOIN pg_catalog.pg_rewrite r ON r.oid = d.objid \
               WHERE c1.relname = 'pg_rewrite' AND c2.relname = 'pg_class' \
                 AND d.deptype = 'n' \
                 AND c1.relnamespace = 'pg_catalog'::regnamespace \
                 AND c2.relnamespace = 'pg_catalog'::regnamespace \
                 AND r.ev_class = ANY($1) \
               ORDER BY r.ev_class, d.refobjid";
    let rows = query(client, "view_depends", sql, &[&view_oids]).await?;

    let by_oid: HashMap<u32, StableId> = relations.iter().map(|r| (r.oid, r.stable_id())).collect();

    let mut edges = Vec::new();
    for row in rows {
        let view_oid: u32 = row.try_get("ev_class")?;
        let referenced_oid: u32 = row.try_get("refobjid")?;
        if view_oid == referenced_oid {
            // The rewrite rule depends on its own view.
            continue;
        }
        if let (Some(dependent), Some(referenced)) =
            (by_oid.get(&view_oid), by_oid.get(&referenced_oid))
        {
            edges.push(DependEdge {
                dependent: dependent.clone(),
                referenced: referenced.clone(),
                kind: DependKind::Normal,
            });
        }
    }
    Ok(edges)
}
