use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// The constraint graph over the change set contains at least one cycle,
    /// so no valid execution order exists. Each entry is one simple cycle,
    /// rendered as `Op(stable_id) -> Op(stable_id) -> ...`.
    #[error("cyclic dependency between changes: {}", .cycles.join("; "))]
    CyclicDependency { cycles: Vec<String> },
}
