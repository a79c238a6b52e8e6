//! PostgreSQL schema differ and DDL generator.
//!
//! Given two catalog snapshots — a *source* and a *target* — this crate
//! produces an ordered list of DDL statements whose application to the source
//! yields a schema semantically equal to the target:
//!
//! ```text
//! two catalogs -> differ -> unordered changes
//!              -> dependency extractor + operation semantics -> constraints
//!              -> solver -> ordered changes -> emitter -> SQL list
//! ```
//!
//! The engine is synchronous and pure: catalogs are immutable inputs, and the
//! same inputs always produce a byte-identical SQL list. Determinism is
//! enforced at three points: the differ emits per entity kind in lexicographic
//! stable-id order, the solver breaks topological ties by original emission
//! order, and the emitter is a total function.
//!
//! ```ignore
//! let changes = pgdrift::diff(&source_catalog, &target_catalog)?;
//! for statement in pgdrift::emit_all(&changes) {
//!     println!("{statement}");
//! }
//! ```
//!
//! Catalog extraction from a live database lives in `pgdrift-extract`; the
//! catalog model itself in `pgdrift-catalog`.

pub mod change;
pub mod diff;
pub mod emit;
mod error;
pub mod resolve;
pub mod testutil;

pub use change::{Change, ChangeKind, TableOp};
pub use diff::{collect_changes, diff};
pub use emit::{emit, emit_all};
pub use error::Error;
pub use resolve::{
    resolve, resolve_with_depth, DependencyModel, OrderingConstraint, Origin,
    DEFAULT_EXPANSION_DEPTH,
};

/// Result type for pgdrift operations.
pub type Result<T> = std::result::Result<T, Error>;
