//! Catalog entity types.
//!
//! Every entity's fields fall into three classes:
//!
//! - **identity** fields make up the [`StableId`] and decide *which* object
//!   this is. Two snapshots of the same logical object share identity fields.
//! - **data** fields are the DDL-observable state. Identity plus data is what
//!   [`SemanticEq`] compares.
//! - **internal** fields only exist to correlate objects during extraction
//!   (object identifiers, owning-relation OIDs). They differ between
//!   databases holding the same logical schema and are never compared.
//!
//! The partition is expressed per type by the private `identity()` / `data()`
//! helpers right next to each struct; internal fields are simply absent from
//! both.

use crate::StableId;

/// Equality over identity and data fields, ignoring extraction internals.
///
/// This is the predicate behind every drop/create/alter decision the differ
/// makes, and behind whole-catalog comparison.
pub trait SemanticEq {
    fn semantic_eq(&self, other: &Self) -> bool;
}

/// A namespace (`CREATE SCHEMA`). Stable id `s:{name}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    // identity
    pub name: String,
    // internal
    pub oid: u32,
}

impl Schema {
    pub fn stable_id(&self) -> StableId {
        StableId::new(format!("s:{}", self.name))
    }

    fn identity(&self) -> &str {
        &self.name
    }
}

impl SemanticEq for Schema {
    fn semantic_eq(&self, other: &Self) -> bool {
        self.identity() == other.identity()
    }
}

/// What kind of relation a [`Relation`] is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationKind {
    Table,
    View,
    MaterializedView,
}

impl RelationKind {
    /// Stable-id prefix for this relation kind.
    pub fn prefix(self) -> &'static str {
        match self {
            RelationKind::Table => "t",
            RelationKind::View => "v",
            RelationKind::MaterializedView => "m",
        }
    }

    /// Parse a `pg_class.relkind` code.
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "r" => Some(RelationKind::Table),
            "v" => Some(RelationKind::View),
            "m" => Some(RelationKind::MaterializedView),
            _ => None,
        }
    }
}

/// A table, view, or materialized view. Stable id `{t|v|m}:{schema}.{name}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relation {
    // identity
    pub name: String,
    pub schema: String,
    pub kind: RelationKind,
    // data
    /// Body from `pg_get_viewdef()` for views and materialized views.
    pub definition: Option<String>,
    /// Whether row-level security is enabled (tables only).
    pub row_security: bool,
    // internal
    pub oid: u32,
}

impl Relation {
    pub fn stable_id(&self) -> StableId {
        StableId::new(format!("{}:{}.{}", self.kind.prefix(), self.schema, self.name))
    }

    fn identity(&self) -> (&str, &str, RelationKind) {
        (&self.name, &self.schema, self.kind)
    }

    fn data(&self) -> (Option<&str>, bool) {
        (self.definition.as_deref(), self.row_security)
    }
}

impl SemanticEq for Relation {
    fn semantic_eq(&self, other: &Self) -> bool {
        self.identity() == other.identity() && self.data() == other.data()
    }
}

/// A column of a relation. Stable id `col:{schema}.{table}.{name}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    // identity
    pub schema: String,
    pub table: String,
    pub name: String,
    // data
    /// 1-based position; observable because column order affects CREATE TABLE.
    pub position: i16,
    pub not_null: bool,
    /// Formatted type from `format_type()`, e.g. `character varying(32)`.
    pub type_name: String,
    pub default: Option<String>,
    /// Generation expression for stored generated columns.
    pub generated: Option<String>,
    // internal
    pub relation_kind: RelationKind,
    pub relation_oid: u32,
}

impl Column {
    pub fn stable_id(&self) -> StableId {
        StableId::new(format!("col:{}.{}.{}", self.schema, self.table, self.name))
    }

    /// Stable id of the owning relation.
    pub fn relation_stable_id(&self) -> StableId {
        StableId::new(format!(
            "{}:{}.{}",
            self.relation_kind.prefix(),
            self.schema,
            self.table
        ))
    }

    pub fn is_generated(&self) -> bool {
        self.generated.is_some()
    }

    fn identity(&self) -> (&str, &str, &str) {
        (&self.schema, &self.table, &self.name)
    }

    fn data(&self) -> (i16, bool, &str, Option<&str>, Option<&str>) {
        (
            self.position,
            self.not_null,
            &self.type_name,
            self.default.as_deref(),
            self.generated.as_deref(),
        )
    }
}

impl SemanticEq for Column {
    fn semantic_eq(&self, other: &Self) -> bool {
        self.identity() == other.identity() && self.data() == other.data()
    }
}

/// Constraint kind from `pg_constraint.contype`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintKind {
    Check,
    ForeignKey,
    PrimaryKey,
    Unique,
    Exclusion,
}

impl ConstraintKind {
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "c" => Some(ConstraintKind::Check),
            "f" => Some(ConstraintKind::ForeignKey),
            "p" => Some(ConstraintKind::PrimaryKey),
            "u" => Some(ConstraintKind::Unique),
            "x" => Some(ConstraintKind::Exclusion),
            _ => None,
        }
    }
}

/// Referential action on a foreign key (`confupdtype` / `confdeltype`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FkAction {
    NoAction,
    Restrict,
    Cascade,
    SetNull,
    SetDefault,
}

impl FkAction {
    pub fn from_code(code: &str) -> Self {
        match code {
            "r" => FkAction::Restrict,
            "c" => FkAction::Cascade,
            "n" => FkAction::SetNull,
            "d" => FkAction::SetDefault,
            _ => FkAction::NoAction,
        }
    }

    pub fn as_sql(self) -> &'static str {
        match self {
            FkAction::NoAction => "NO ACTION",
            FkAction::Restrict => "RESTRICT",
            FkAction::Cascade => "CASCADE",
            FkAction::SetNull => "SET NULL",
            FkAction::SetDefault => "SET DEFAULT",
        }
    }
}

/// A table constraint. Stable id `c:{schema}.{table}.{name}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Constraint {
    // identity
    pub name: String,
    pub schema: String,
    pub table: String,
    // data
    pub kind: ConstraintKind,
    pub deferrable: bool,
    pub deferred: bool,
    /// Constrained column numbers (1-based, resolved against the table's columns).
    pub key_columns: Vec<i16>,
    /// Referenced column numbers for foreign keys.
    pub fk_ref_columns: Vec<i16>,
    pub fk_update_action: FkAction,
    pub fk_delete_action: FkAction,
    /// CHECK expression, without the surrounding `CHECK (...)`.
    pub expression: Option<String>,
    /// WHERE clause of a partial unique constraint.
    pub predicate: Option<String>,
    /// Full definition from `pg_get_constraintdef()` for exclusion
    /// constraints, which cannot be rebuilt from key numbers alone.
    pub exclusion_definition: Option<String>,
    // internal
    pub oid: u32,
    pub table_oid: u32,
    /// Referenced table OID for foreign keys (0 otherwise).
    pub fk_ref_table_oid: u32,
}

impl Constraint {
    pub fn stable_id(&self) -> StableId {
        StableId::new(format!("c:{}.{}.{}", self.schema, self.table, self.name))
    }

    pub fn table_stable_id(&self) -> StableId {
        StableId::new(format!("t:{}.{}", self.schema, self.table))
    }

    fn identity(&self) -> (&str, &str, &str) {
        (&self.name, &self.schema, &self.table)
    }

    #[allow(clippy::type_complexity)]
    fn data(
        &self,
    ) -> (
        ConstraintKind,
        bool,
        bool,
        &[i16],
        &[i16],
        FkAction,
        FkAction,
        Option<&str>,
        Option<&str>,
        Option<&str>,
    ) {
        (
            self.kind,
            self.deferrable,
            self.deferred,
            &self.key_columns,
            &self.fk_ref_columns,
            self.fk_update_action,
            self.fk_delete_action,
            self.expression.as_deref(),
            self.predicate.as_deref(),
            self.exclusion_definition.as_deref(),
        )
    }

    /// True when the only semantic difference to `other` is deferrability.
    /// Foreign keys with such a delta can be altered in place.
    pub fn only_deferrability_differs(&self, other: &Self) -> bool {
        self.kind == other.kind
            && self.key_columns == other.key_columns
            && self.fk_ref_columns == other.fk_ref_columns
            && self.fk_update_action == other.fk_update_action
            && self.fk_delete_action == other.fk_delete_action
            && self.expression == other.expression
            && self.predicate == other.predicate
            && self.exclusion_definition == other.exclusion_definition
            && (self.deferrable != other.deferrable || self.deferred != other.deferred)
    }
}

impl SemanticEq for Constraint {
    fn semantic_eq(&self, other: &Self) -> bool {
        self.identity() == other.identity() && self.data() == other.data()
    }
}

/// An index. Stable id `i:{schema}.{name}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Index {
    // identity
    pub name: String,
    pub schema: String,
    pub table: String,
    // data
    pub unique: bool,
    pub primary: bool,
    /// Created implicitly by a constraint; such indexes follow their
    /// constraint and are never diffed on their own.
    pub backs_constraint: bool,
    /// Complete statement from `pg_get_indexdef()`.
    pub definition: String,
    // internal
    pub oid: u32,
    pub table_oid: u32,
    /// Indexes also exist on materialized views.
    pub table_kind: RelationKind,
}

impl Index {
    pub fn stable_id(&self) -> StableId {
        StableId::new(format!("i:{}.{}", self.schema, self.name))
    }

    pub fn table_stable_id(&self) -> StableId {
        StableId::new(format!(
            "{}:{}.{}",
            self.table_kind.prefix(),
            self.schema,
            self.table
        ))
    }

    fn identity(&self) -> (&str, &str, &str) {
        (&self.name, &self.schema, &self.table)
    }

    fn data(&self) -> (bool, bool, bool, &str) {
        (self.unique, self.primary, self.backs_constraint, &self.definition)
    }
}

impl SemanticEq for Index {
    fn semantic_eq(&self, other: &Self) -> bool {
        self.identity() == other.identity() && self.data() == other.data()
    }
}

/// The table column a sequence is `OWNED BY`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceOwner {
    pub table: String,
    pub column: String,
}

/// A sequence. Stable id `S:{schema}.{name}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sequence {
    // identity
    pub name: String,
    pub schema: String,
    // data
    pub data_type: String,
    pub increment: i64,
    pub min_value: Option<i64>,
    pub max_value: Option<i64>,
    pub start: i64,
    pub cache: i64,
    pub cycle: bool,
    pub owned_by: Option<SequenceOwner>,
    // internal
    pub oid: u32,
}

impl Sequence {
    pub fn stable_id(&self) -> StableId {
        StableId::new(format!("S:{}.{}", self.schema, self.name))
    }

    /// Stable id of the owning table, if any.
    pub fn owner_table_stable_id(&self) -> Option<StableId> {
        self.owned_by
            .as_ref()
            .map(|o| StableId::new(format!("t:{}.{}", self.schema, o.table)))
    }

    fn identity(&self) -> (&str, &str) {
        (&self.name, &self.schema)
    }

    #[allow(clippy::type_complexity)]
    fn data(
        &self,
    ) -> (
        &str,
        i64,
        Option<i64>,
        Option<i64>,
        i64,
        i64,
        bool,
        Option<&SequenceOwner>,
    ) {
        (
            &self.data_type,
            self.increment,
            self.min_value,
            self.max_value,
            self.start,
            self.cache,
            self.cycle,
            self.owned_by.as_ref(),
        )
    }
}

impl SemanticEq for Sequence {
    fn semantic_eq(&self, other: &Self) -> bool {
        self.identity() == other.identity() && self.data() == other.data()
    }
}

/// Command a row-level security policy applies to (`pg_policy.polcmd`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyCommand {
    All,
    Select,
    Insert,
    Update,
    Delete,
}

impl PolicyCommand {
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "*" => Some(PolicyCommand::All),
            "r" => Some(PolicyCommand::Select),
            "a" => Some(PolicyCommand::Insert),
            "w" => Some(PolicyCommand::Update),
            "d" => Some(PolicyCommand::Delete),
            _ => None,
        }
    }

    pub fn as_sql(self) -> &'static str {
        match self {
            PolicyCommand::All => "ALL",
            PolicyCommand::Select => "SELECT",
            PolicyCommand::Insert => "INSERT",
            PolicyCommand::Update => "UPDATE",
            PolicyCommand::Delete => "DELETE",
        }
    }
}

/// A row-level security policy. Stable id `p:{schema}.{table}.{name}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Policy {
    // identity
    pub name: String,
    pub schema: String,
    pub table: String,
    // data
    pub command: PolicyCommand,
    pub permissive: bool,
    pub roles: Vec<String>,
    pub using_expr: Option<String>,
    pub check_expr: Option<String>,
    // internal
    pub oid: u32,
}

impl Policy {
    pub fn stable_id(&self) -> StableId {
        StableId::new(format!("p:{}.{}.{}", self.schema, self.table, self.name))
    }

    pub fn table_stable_id(&self) -> StableId {
        StableId::new(format!("t:{}.{}", self.schema, self.table))
    }

    fn identity(&self) -> (&str, &str, &str) {
        (&self.name, &self.schema, &self.table)
    }

    #[allow(clippy::type_complexity)]
    fn data(&self) -> (PolicyCommand, bool, &[String], Option<&str>, Option<&str>) {
        (
            self.command,
            self.permissive,
            &self.roles,
            self.using_expr.as_deref(),
            self.check_expr.as_deref(),
        )
    }
}

impl SemanticEq for Policy {
    fn semantic_eq(&self, other: &Self) -> bool {
        self.identity() == other.identity() && self.data() == other.data()
    }
}

/// A function or procedure. Stable id `f:{schema}.{name}({arguments})`.
///
/// The argument list is part of identity so overloads stay distinct.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Function {
    // identity
    pub name: String,
    pub schema: String,
    /// Identity arguments from `pg_get_function_identity_arguments()`.
    pub arguments: String,
    // data
    /// Complete DDL from `pg_get_functiondef()`.
    pub definition: String,
    // internal
    pub oid: u32,
}

impl Function {
    pub fn stable_id(&self) -> StableId {
        StableId::new(format!("f:{}.{}({})", self.schema, self.name, self.arguments))
    }

    fn identity(&self) -> (&str, &str, &str) {
        (&self.name, &self.schema, &self.arguments)
    }

    fn data(&self) -> &str {
        &self.definition
    }
}

impl SemanticEq for Function {
    fn semantic_eq(&self, other: &Self) -> bool {
        self.identity() == other.identity() && self.data() == other.data()
    }
}

/// A trigger. Stable id `tg:{schema}.{table}.{name}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trigger {
    // identity
    pub name: String,
    pub schema: String,
    pub table: String,
    // data
    /// Complete DDL from `pg_get_triggerdef()`.
    pub definition: String,
    // internal
    pub oid: u32,
    pub table_oid: u32,
    pub function_oid: u32,
    /// INSTEAD OF triggers sit on views.
    pub table_kind: RelationKind,
}

impl Trigger {
    pub fn stable_id(&self) -> StableId {
        StableId::new(format!("tg:{}.{}.{}", self.schema, self.table, self.name))
    }

    pub fn table_stable_id(&self) -> StableId {
        StableId::new(format!(
            "{}:{}.{}",
            self.table_kind.prefix(),
            self.schema,
            self.table
        ))
    }

    fn identity(&self) -> (&str, &str, &str) {
        (&self.name, &self.schema, &self.table)
    }

    fn data(&self) -> &str {
        &self.definition
    }
}

impl SemanticEq for Trigger {
    fn semantic_eq(&self, other: &Self) -> bool {
        self.identity() == other.identity() && self.data() == other.data()
    }
}

/// One attribute of a composite type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompositeField {
    pub name: String,
    pub type_name: String,
    pub position: i16,
    pub not_null: bool,
}

/// Shape of a user-defined type; carries everything CREATE TYPE needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeShape {
    Enum {
        values: Vec<String>,
    },
    Domain {
        base_type: String,
        /// Complete constraint definitions from `pg_get_constraintdef()`.
        constraints: Vec<String>,
    },
    Composite {
        fields: Vec<CompositeField>,
    },
    Range {
        subtype: String,
    },
}

/// A user-defined type. Stable id `typ:{schema}.{name}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDef {
    // identity
    pub name: String,
    pub schema: String,
    // data
    pub shape: TypeShape,
    // internal
    pub oid: u32,
}

impl TypeDef {
    pub fn stable_id(&self) -> StableId {
        StableId::new(format!("typ:{}.{}", self.schema, self.name))
    }

    fn identity(&self) -> (&str, &str) {
        (&self.name, &self.schema)
    }

    fn data(&self) -> &TypeShape {
        &self.shape
    }
}

impl SemanticEq for TypeDef {
    fn semantic_eq(&self, other: &Self) -> bool {
        self.identity() == other.identity() && self.data() == other.data()
    }
}

/// Classification a dependency edge carried in `pg_depend.deptype`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DependKind {
    /// `n` — normal dependency.
    Normal,
    /// `a` — auto dependency (e.g. sequence OWNED BY).
    Auto,
    /// `i` — internal dependency.
    Internal,
}

impl DependKind {
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "n" => Some(DependKind::Normal),
            "a" => Some(DependKind::Auto),
            "i" => Some(DependKind::Internal),
            _ => None,
        }
    }
}

/// A raw dependency edge: the dependent object references the referenced one.
///
/// Edges don't participate in semantic comparison; they exist purely to
/// order operations. Endpoints the extractor could not resolve are kept as
/// `unknown:`-prefixed ids and discarded downstream.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DependEdge {
    pub dependent: StableId,
    pub referenced: StableId,
    pub kind: DependKind,
}
