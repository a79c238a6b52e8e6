//! Constraint-based dependency resolution.
//!
//! Ordering a change stream happens in three separable steps:
//!
//! 1. **Extraction** ([`extract_model`]): build the changeset-relevant
//!    subgraph of object dependencies from both catalogs, tagging every edge
//!    with its catalog of origin. The SOURCE and TARGET edge sets are kept
//!    apart on purpose: drops look at the world as it *was*, creates at the
//!    world as it *will be*.
//! 2. **Semantics** ([`ordering_constraints`]): turn dependency edges plus
//!    operation kinds into BEFORE constraints between change indices.
//! 3. **Solving** ([`solve`]): topological sort with ties broken by original
//!    emission order; on failure, enumerate the simple cycles.

use std::collections::{BTreeSet, HashMap, HashSet};

use pgdrift_catalog::{Catalog, StableId};

use crate::change::{Change, ChangeKind};
use crate::error::Error;

/// How many hops around the changeset the dependency extractor walks.
///
/// Two hops cover every supported dependency chain in the change-local
/// neighborhood; deeper chains can be explored via [`resolve_with_depth`].
pub const DEFAULT_EXPANSION_DEPTH: usize = 2;

/// Which catalog an edge was observed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Origin {
    Source,
    Target,
}

/// The changeset-relevant dependency subgraph, with per-origin forward and
/// reverse indices.
#[derive(Debug, Default)]
pub struct DependencyModel {
    forward: HashMap<(Origin, StableId), BTreeSet<StableId>>,
    reverse: HashMap<(Origin, StableId), BTreeSet<StableId>>,
}

impl DependencyModel {
    fn add(&mut self, dependent: &StableId, referenced: &StableId, origin: Origin) {
        self.forward
            .entry((origin, dependent.clone()))
            .or_default()
            .insert(referenced.clone());
        self.reverse
            .entry((origin, referenced.clone()))
            .or_default()
            .insert(dependent.clone());
    }

    /// Does `dependent` reference `referenced` in the given origin?
    pub fn depends_on(&self, dependent: &StableId, referenced: &StableId, origin: Origin) -> bool {
        self.forward
            .get(&(origin, dependent.clone()))
            .is_some_and(|set| set.contains(referenced))
    }

    /// Objects `id` references, in the given origin.
    pub fn dependencies_of(&self, id: &StableId, origin: Origin) -> impl Iterator<Item = &StableId> {
        self.forward
            .get(&(origin, id.clone()))
            .into_iter()
            .flatten()
    }

    /// Objects referencing `id`, in the given origin.
    pub fn dependents_of(&self, id: &StableId, origin: Origin) -> impl Iterator<Item = &StableId> {
        self.reverse
            .get(&(origin, id.clone()))
            .into_iter()
            .flatten()
    }

    pub fn edge_count(&self) -> usize {
        self.forward.values().map(|set| set.len()).sum()
    }
}

/// Adjacency over one catalog's raw edge list, unknown endpoints excluded.
struct EdgeIndex<'a> {
    forward: HashMap<&'a StableId, Vec<&'a StableId>>,
    reverse: HashMap<&'a StableId, Vec<&'a StableId>>,
}

impl<'a> EdgeIndex<'a> {
    fn new(catalog: &'a Catalog) -> Self {
        let mut forward: HashMap<&StableId, Vec<&StableId>> = HashMap::new();
        let mut reverse: HashMap<&StableId, Vec<&StableId>> = HashMap::new();
        for edge in catalog.depends() {
            if edge.dependent.is_unknown() || edge.referenced.is_unknown() {
                continue;
            }
            forward.entry(&edge.dependent).or_default().push(&edge.referenced);
            reverse.entry(&edge.referenced).or_default().push(&edge.dependent);
        }
        EdgeIndex { forward, reverse }
    }

    fn neighbors(&self, id: &StableId, out: &mut BTreeSet<StableId>) {
        for set in [&self.forward, &self.reverse] {
            if let Some(ids) = set.get(id) {
                out.extend(ids.iter().map(|&i| i.clone()));
            }
        }
    }
}

/// Build the dependency model for a change stream.
///
/// Seeds the relevance set with the changes' stable ids, expands it up to
/// `depth` hops through both catalogs' edge lists (stopping early at a fixed
/// point), then keeps exactly the edges with both endpoints relevant.
pub fn extract_model(
    source: &Catalog,
    target: &Catalog,
    changes: &[Change],
    depth: usize,
) -> DependencyModel {
    let source_edges = EdgeIndex::new(source);
    let target_edges = EdgeIndex::new(target);

    let mut relevant: BTreeSet<StableId> =
        changes.iter().map(|c| c.stable_id().clone()).collect();

    for _ in 0..depth {
        let mut discovered = BTreeSet::new();
        for id in &relevant {
            source_edges.neighbors(id, &mut discovered);
            target_edges.neighbors(id, &mut discovered);
        }
        let before = relevant.len();
        relevant.extend(discovered);
        if relevant.len() == before {
            break;
        }
    }

    let mut model = DependencyModel::default();
    for (catalog, origin) in [(source, Origin::Source), (target, Origin::Target)] {
        for edge in catalog.depends() {
            if edge.dependent.is_unknown() || edge.referenced.is_unknown() {
                continue;
            }
            if relevant.contains(&edge.dependent) && relevant.contains(&edge.referenced) {
                model.add(&edge.dependent, &edge.referenced, origin);
            }
        }
    }
    tracing::debug!(
        relevant = relevant.len(),
        edges = model.edge_count(),
        "extracted dependency model"
    );
    model
}

/// An ordering requirement: the change at `before` must run before the one
/// at `after`. Indices point into the input change list; the reason is kept
/// for diagnostics only.
#[derive(Debug, Clone)]
pub struct OrderingConstraint {
    pub before: usize,
    pub after: usize,
    pub reason: String,
}

impl std::fmt::Display for OrderingConstraint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] before [{}]: {}", self.before, self.after, self.reason)
    }
}

/// Generate every BEFORE constraint for the change stream: dependency-derived
/// constraints plus same-object priority constraints.
pub fn ordering_constraints(changes: &[Change], model: &DependencyModel) -> Vec<OrderingConstraint> {
    let mut constraints = Vec::new();

    for i in 0..changes.len() {
        for j in (i + 1)..changes.len() {
            let a = &changes[i];
            let b = &changes[j];
            // A drop consults the catalog where the dependency still existed;
            // everything else consults the catalog where it will exist.
            let a_on_b = model.depends_on(a.stable_id(), b.stable_id(), origin_for(a));
            let b_on_a = model.depends_on(b.stable_id(), a.stable_id(), origin_for(b));

            // Both directions can hold at once (mutually dependent changes);
            // emitting both constraints is what surfaces the cycle.
            if a_on_b {
                constraints.extend(dependency_rule(i, a, j, b));
            }
            if b_on_a {
                constraints.extend(dependency_rule(j, b, i, a));
            }
        }
    }

    constraints.extend(same_object_constraints(changes));
    constraints
}

fn origin_for(change: &Change) -> Origin {
    if change.kind() == ChangeKind::Drop {
        Origin::Source
    } else {
        Origin::Target
    }
}

/// Semantic rule for `dep` (the dependent change) referencing `ref_`.
fn dependency_rule(
    dep_idx: usize,
    dep: &Change,
    ref_idx: usize,
    ref_: &Change,
) -> Option<OrderingConstraint> {
    let dep_kind = dep.kind();
    let ref_kind = ref_.kind();

    if dep_kind == ChangeKind::Create && ref_kind == ChangeKind::Create {
        // PostgreSQL reports column-owned sequences as *sequence depends on
        // table*, but creation runs the other way: the table's defaults call
        // nextval on the sequence.
        if matches!(dep, Change::CreateSequence { .. }) && matches!(ref_, Change::CreateTable { .. })
        {
            return Some(OrderingConstraint {
                before: dep_idx,
                after: ref_idx,
                reason: format!("create sequence {} before the table that uses it", dep.stable_id()),
            });
        }
        return Some(OrderingConstraint {
            before: ref_idx,
            after: dep_idx,
            reason: format!("create {} before its dependent {}", ref_.stable_id(), dep.stable_id()),
        });
    }

    if dep_kind == ChangeKind::Drop && ref_kind == ChangeKind::Drop {
        return Some(OrderingConstraint {
            before: dep_idx,
            after: ref_idx,
            reason: format!("drop dependent {} before {}", dep.stable_id(), ref_.stable_id()),
        });
    }

    if dep_kind != ChangeKind::Drop && ref_kind != ChangeKind::Drop {
        return Some(OrderingConstraint {
            before: ref_idx,
            after: dep_idx,
            reason: format!("{} must exist before {}", ref_.stable_id(), dep.stable_id()),
        });
    }

    if ref_kind == ChangeKind::Drop && dep_kind != ChangeKind::Drop {
        return Some(OrderingConstraint {
            before: ref_idx,
            after: dep_idx,
            reason: format!("drop {} before {} depends on the removal", ref_.stable_id(), dep.describe()),
        });
    }

    None
}

/// Within each stable id, enforce `Drop < Create < Alter < Replace`.
fn same_object_constraints(changes: &[Change]) -> Vec<OrderingConstraint> {
    let mut groups: indexmap::IndexMap<&StableId, Vec<usize>> = indexmap::IndexMap::new();
    for (i, change) in changes.iter().enumerate() {
        groups.entry(change.stable_id()).or_default().push(i);
    }

    let mut constraints = Vec::new();
    for (id, mut indices) in groups {
        if indices.len() < 2 {
            continue;
        }
        indices.sort_by_key(|&i| (priority(&changes[i]), i));
        for pair in indices.windows(2) {
            constraints.push(OrderingConstraint {
                before: pair[0],
                after: pair[1],
                reason: format!("operation order on {id}"),
            });
        }
    }
    constraints
}

fn priority(change: &Change) -> u8 {
    match change.kind() {
        ChangeKind::Drop => 0,
        ChangeKind::Create => 1,
        ChangeKind::Alter => 2,
        ChangeKind::Replace => 3,
    }
}

/// Order `changes` so every constraint holds. Ties are broken by original
/// emission order, making the output deterministic.
pub fn solve(changes: Vec<Change>, constraints: &[OrderingConstraint]) -> Result<Vec<Change>, Error> {
    let n = changes.len();
    let mut successors: Vec<BTreeSet<usize>> = vec![BTreeSet::new(); n];
    let mut indegree = vec![0usize; n];
    for constraint in constraints {
        if successors[constraint.before].insert(constraint.after) {
            indegree[constraint.after] += 1;
        }
    }

    let mut ready: std::collections::BinaryHeap<std::cmp::Reverse<usize>> = (0..n)
        .filter(|&i| indegree[i] == 0)
        .map(std::cmp::Reverse)
        .collect();

    let mut order = Vec::with_capacity(n);
    while let Some(std::cmp::Reverse(i)) = ready.pop() {
        order.push(i);
        for &j in &successors[i] {
            indegree[j] -= 1;
            if indegree[j] == 0 {
                ready.push(std::cmp::Reverse(j));
            }
        }
    }

    if order.len() < n {
        let placed: HashSet<usize> = order.iter().copied().collect();
        let remaining: BTreeSet<usize> = (0..n).filter(|i| !placed.contains(i)).collect();
        let cycles = enumerate_cycles(&successors, &remaining)
            .into_iter()
            .map(|cycle| {
                cycle
                    .iter()
                    .map(|&i| changes[i].describe())
                    .collect::<Vec<_>>()
                    .join(" -> ")
            })
            .collect();
        return Err(Error::CyclicDependency { cycles });
    }

    let mut slots: Vec<Option<Change>> = changes.into_iter().map(Some).collect();
    Ok(order
        .into_iter()
        .map(|i| slots[i].take().expect("each index placed exactly once"))
        .collect())
}

/// Simple cycles among the unplaceable nodes, normalized and deduplicated.
/// Capped: this is a diagnostic, not an exhaustive census of a pathological
/// graph.
fn enumerate_cycles(successors: &[BTreeSet<usize>], remaining: &BTreeSet<usize>) -> Vec<Vec<usize>> {
    const MAX_CYCLES: usize = 16;

    let mut cycles = Vec::new();
    let mut seen: HashSet<Vec<usize>> = HashSet::new();

    for &start in remaining {
        let mut path = vec![start];
        let mut stack: Vec<Vec<usize>> = vec![successors[start]
            .iter()
            .copied()
            .filter(|n| remaining.contains(n))
            .collect()];

        while let Some(frontier) = stack.last_mut() {
            match frontier.pop() {
                Some(next) => {
                    if let Some(pos) = path.iter().position(|&n| n == next) {
                        let mut cycle = path[pos..].to_vec();
                        let min_pos = cycle
                            .iter()
                            .enumerate()
                            .min_by_key(|(_, &n)| n)
                            .map(|(i, _)| i)
                            .expect("cycle is non-empty");
                        cycle.rotate_left(min_pos);
                        if seen.insert(cycle.clone()) {
                            cycles.push(cycle);
                            if cycles.len() >= MAX_CYCLES {
                                return cycles;
                            }
                        }
                    } else {
                        path.push(next);
                        stack.push(
                            successors[next]
                                .iter()
                                .copied()
                                .filter(|n| remaining.contains(n))
                                .collect(),
                        );
                    }
                }
                None => {
                    stack.pop();
                    path.pop();
                }
            }
        }
    }
    cycles
}

/// Resolve a change stream into execution order with the default expansion
/// depth.
pub fn resolve(changes: Vec<Change>, source: &Catalog, target: &Catalog) -> Result<Vec<Change>, Error> {
    resolve_with_depth(changes, source, target, DEFAULT_EXPANSION_DEPTH)
}

/// Resolve with an explicit dependency-extraction depth.
pub fn resolve_with_depth(
    changes: Vec<Change>,
    source: &Catalog,
    target: &Catalog,
    depth: usize,
) -> Result<Vec<Change>, Error> {
    if changes.is_empty() {
        return Ok(changes);
    }
    let model = extract_model(source, target, &changes, depth);
    let constraints = ordering_constraints(&changes, &model);
    tracing::debug!(
        changes = changes.len(),
        constraints = constraints.len(),
        "solving change order"
    );
    solve(changes, &constraints)
}
