//! The change taxonomy: one tagged variant per (entity, operation) pair.
//!
//! A [`Change`] is an immutable record produced by the differ. It carries the
//! affected entity's stable id — the identity the solver orders by — plus the
//! minimal payload the emitter needs. Entities whose definition PostgreSQL
//! can pretty-print carry the captured definition; entities whose DDL is
//! reconstructed carry structured fields.

use pgdrift_catalog::{
    Column, Constraint, Function, Index, Policy, Sequence, SequenceOwner, StableId, Trigger,
    TypeDef,
};

/// Operation discriminant, used by the solver's semantic rules and the
/// same-object priority order `Drop < Create < Alter < Replace`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ChangeKind {
    Drop,
    Create,
    Alter,
    Replace,
}

/// One sub-operation inside an [`Change::AlterTable`].
///
/// Within a single ALTER TABLE, drops come before adds of the same column
/// name, and type changes before default changes on the same column; the
/// differ builds the list in that order and the emitter preserves it.
#[derive(Debug, Clone, PartialEq)]
pub enum TableOp {
    AddColumn {
        column: Column,
    },
    DropColumn {
        name: String,
    },
    AlterColumnType {
        name: String,
        type_name: String,
        using: Option<String>,
    },
    SetColumnDefault {
        name: String,
        expression: String,
    },
    DropColumnDefault {
        name: String,
    },
    SetColumnNotNull {
        name: String,
    },
    DropColumnNotNull {
        name: String,
    },
    EnableRowSecurity,
    DisableRowSecurity,
}

/// A single schema change.
#[derive(Debug, Clone, PartialEq)]
pub enum Change {
    CreateSchema {
        stable_id: StableId,
        name: String,
    },
    DropSchema {
        stable_id: StableId,
        name: String,
    },

    CreateTable {
        stable_id: StableId,
        schema: String,
        name: String,
        /// In position order; order is observable in the emitted DDL.
        columns: Vec<Column>,
    },
    DropTable {
        stable_id: StableId,
        schema: String,
        name: String,
    },
    AlterTable {
        stable_id: StableId,
        schema: String,
        name: String,
        ops: Vec<TableOp>,
    },

    CreateView {
        stable_id: StableId,
        schema: String,
        name: String,
        definition: String,
    },
    DropView {
        stable_id: StableId,
        schema: String,
        name: String,
    },
    ReplaceView {
        stable_id: StableId,
        schema: String,
        name: String,
        definition: String,
    },

    CreateMaterializedView {
        stable_id: StableId,
        schema: String,
        name: String,
        definition: String,
    },
    DropMaterializedView {
        stable_id: StableId,
        schema: String,
        name: String,
    },
    /// PostgreSQL has no CREATE OR REPLACE MATERIALIZED VIEW; this emits a
    /// DROP + CREATE pair as one change.
    ReplaceMaterializedView {
        stable_id: StableId,
        schema: String,
        name: String,
        definition: String,
    },

    CreateIndex {
        stable_id: StableId,
        index: Index,
    },
    DropIndex {
        stable_id: StableId,
        index: Index,
    },

    CreateSequence {
        stable_id: StableId,
        sequence: Sequence,
    },
    DropSequence {
        stable_id: StableId,
        schema: String,
        name: String,
    },
    AlterSequence {
        stable_id: StableId,
        old: Sequence,
        new: Sequence,
    },
    /// Establish or clear sequence ownership. Split from [`Change::CreateSequence`]
    /// because the owning table must exist first, while the sequence itself
    /// must exist *before* the table that takes defaults from it.
    AlterSequenceOwner {
        stable_id: StableId,
        schema: String,
        name: String,
        owner: Option<SequenceOwner>,
    },

    CreateConstraint {
        stable_id: StableId,
        constraint: Constraint,
        /// All columns of the constrained table, for key-number resolution.
        table_columns: Vec<Column>,
        /// Columns of the referenced table, for foreign keys.
        referenced_columns: Option<Vec<Column>>,
    },
    DropConstraint {
        stable_id: StableId,
        constraint: Constraint,
    },
    /// Foreign keys whose only semantic delta is deferrability can be
    /// altered in place; everything else is drop + create.
    AlterConstraint {
        stable_id: StableId,
        old: Constraint,
        new: Constraint,
    },

    CreateFunction {
        stable_id: StableId,
        function: Function,
    },
    DropFunction {
        stable_id: StableId,
        function: Function,
    },
    ReplaceFunction {
        stable_id: StableId,
        function: Function,
    },

    CreateTrigger {
        stable_id: StableId,
        trigger: Trigger,
    },
    DropTrigger {
        stable_id: StableId,
        trigger: Trigger,
    },

    CreatePolicy {
        stable_id: StableId,
        policy: Policy,
    },
    DropPolicy {
        stable_id: StableId,
        schema: String,
        table: String,
        name: String,
    },
    /// `None` fields are unchanged; `Some` carries the new value.
    AlterPolicy {
        stable_id: StableId,
        schema: String,
        table: String,
        name: String,
        roles: Option<Vec<String>>,
        using_expr: Option<String>,
        check_expr: Option<String>,
    },

    CreateType {
        stable_id: StableId,
        type_def: TypeDef,
    },
    DropType {
        stable_id: StableId,
        schema: String,
        name: String,
    },
}

impl Change {
    /// The affected entity's stable id — the identity the solver works with.
    pub fn stable_id(&self) -> &StableId {
        match self {
            Change::CreateSchema { stable_id, .. }
            | Change::DropSchema { stable_id, .. }
            | Change::CreateTable { stable_id, .. }
            | Change::DropTable { stable_id, .. }
            | Change::AlterTable { stable_id, .. }
            | Change::CreateView { stable_id, .. }
            | Change::DropView { stable_id, .. }
            | Change::ReplaceView { stable_id, .. }
            | Change::CreateMaterializedView { stable_id, .. }
            | Change::DropMaterializedView { stable_id, .. }
            | Change::ReplaceMaterializedView { stable_id, .. }
            | Change::CreateIndex { stable_id, .. }
            | Change::DropIndex { stable_id, .. }
            | Change::CreateSequence { stable_id, .. }
            | Change::DropSequence { stable_id, .. }
            | Change::AlterSequence { stable_id, .. }
            | Change::AlterSequenceOwner { stable_id, .. }
            | Change::CreateConstraint { stable_id, .. }
            | Change::DropConstraint { stable_id, .. }
            | Change::AlterConstraint { stable_id, .. }
            | Change::CreateFunction { stable_id, .. }
            | Change::DropFunction { stable_id, .. }
            | Change::ReplaceFunction { stable_id, .. }
            | Change::CreateTrigger { stable_id, .. }
            | Change::DropTrigger { stable_id, .. }
            | Change::CreatePolicy { stable_id, .. }
            | Change::DropPolicy { stable_id, .. }
            | Change::AlterPolicy { stable_id, .. }
            | Change::CreateType { stable_id, .. }
            | Change::DropType { stable_id, .. } => stable_id,
        }
    }

    pub fn kind(&self) -> ChangeKind {
        match self {
            Change::CreateSchema { .. }
            | Change::CreateTable { .. }
            | Change::CreateView { .. }
            | Change::CreateMaterializedView { .. }
            | Change::CreateIndex { .. }
            | Change::CreateSequence { .. }
            | Change::CreateConstraint { .. }
            | Change::CreateFunction { .. }
            | Change::CreateTrigger { .. }
            | Change::CreatePolicy { .. }
            | Change::CreateType { .. } => ChangeKind::Create,

            Change::DropSchema { .. }
            | Change::DropTable { .. }
            | Change::DropView { .. }
            | Change::DropMaterializedView { .. }
            | Change::DropIndex { .. }
            | Change::DropSequence { .. }
            | Change::DropConstraint { .. }
            | Change::DropFunction { .. }
            | Change::DropTrigger { .. }
            | Change::DropPolicy { .. }
            | Change::DropType { .. } => ChangeKind::Drop,

            Change::AlterTable { .. }
            | Change::AlterSequence { .. }
            | Change::AlterSequenceOwner { .. }
            | Change::AlterConstraint { .. }
            | Change::AlterPolicy { .. } => ChangeKind::Alter,

            Change::ReplaceView { .. }
            | Change::ReplaceMaterializedView { .. }
            | Change::ReplaceFunction { .. } => ChangeKind::Replace,
        }
    }

    /// Variant name without payload, e.g. `CreateTable`.
    pub fn operation_name(&self) -> &'static str {
        match self {
            Change::CreateSchema { .. } => "CreateSchema",
            Change::DropSchema { .. } => "DropSchema",
            Change::CreateTable { .. } => "CreateTable",
            Change::DropTable { .. } => "DropTable",
            Change::AlterTable { .. } => "AlterTable",
            Change::CreateView { .. } => "CreateView",
            Change::DropView { .. } => "DropView",
            Change::ReplaceView { .. } => "ReplaceView",
            Change::CreateMaterializedView { .. } => "CreateMaterializedView",
            Change::DropMaterializedView { .. } => "DropMaterializedView",
            Change::ReplaceMaterializedView { .. } => "ReplaceMaterializedView",
            Change::CreateIndex { .. } => "CreateIndex",
            Change::DropIndex { .. } => "DropIndex",
            Change::CreateSequence { .. } => "CreateSequence",
            Change::DropSequence { .. } => "DropSequence",
            Change::AlterSequence { .. } => "AlterSequence",
            Change::AlterSequenceOwner { .. } => "AlterSequenceOwner",
            Change::CreateConstraint { .. } => "CreateConstraint",
            Change::DropConstraint { .. } => "DropConstraint",
            Change::AlterConstraint { .. } => "AlterConstraint",
            Change::CreateFunction { .. } => "CreateFunction",
            Change::DropFunction { .. } => "DropFunction",
            Change::ReplaceFunction { .. } => "ReplaceFunction",
            Change::CreateTrigger { .. } => "CreateTrigger",
            Change::DropTrigger { .. } => "DropTrigger",
            Change::CreatePolicy { .. } => "CreatePolicy",
            Change::DropPolicy { .. } => "DropPolicy",
            Change::AlterPolicy { .. } => "AlterPolicy",
            Change::CreateType { .. } => "CreateType",
            Change::DropType { .. } => "DropType",
        }
    }

    /// Short human-readable label, used in constraint reasons and cycle
    /// reports, e.g. `ReplaceView(v:public.a)`.
    pub fn describe(&self) -> String {
        format!("{}({})", self.operation_name(), self.stable_id())
    }
}

impl std::fmt::Display for Change {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.describe())
    }
}
