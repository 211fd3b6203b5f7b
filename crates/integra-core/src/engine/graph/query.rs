use super::{DependencyGraph, VertexId};
use crate::core::models::ids::{ContainerId, ObjectId, ParticleId, RestraintId, ScoreStateId};
use std::collections::{BTreeSet, HashSet};

/// An object kind that [`get_dependent`] can collect.
pub trait DependentKind: Ord + Sized {
    fn from_object(object: ObjectId) -> Option<Self>;
}

impl DependentKind for ObjectId {
    fn from_object(object: ObjectId) -> Option<Self> {
        Some(object)
    }
}

impl DependentKind for ParticleId {
    fn from_object(object: ObjectId) -> Option<Self> {
        match object {
            ObjectId::Particle(id) => Some(id),
            _ => None,
        }
    }
}

impl DependentKind for ContainerId {
    fn from_object(object: ObjectId) -> Option<Self> {
        match object {
            ObjectId::Container(id) => Some(id),
            _ => None,
        }
    }
}

impl DependentKind for ScoreStateId {
    fn from_object(object: ObjectId) -> Option<Self> {
        match object {
            ObjectId::ScoreState(id) => Some(id),
            _ => None,
        }
    }
}

impl DependentKind for RestraintId {
    fn from_object(object: ObjectId) -> Option<Self> {
        match object {
            ObjectId::Restraint(id) => Some(id),
            _ => None,
        }
    }
}

/// Collects every object of kind `T` reachable downstream of `start`
/// without passing through a barrier.
///
/// Barrier vertices other than `start` itself are treated as already visited:
/// traversal stops at them and they are not collected. `start` is collected
/// when it is of kind `T`. An absent `start` yields an empty set.
///
/// Incremental movers use this to answer "if I perturb this particle, which
/// restraints can change, without leaving my working set?".
pub fn get_dependent<T: DependentKind>(
    graph: &DependencyGraph,
    start: ObjectId,
    barrier: &HashSet<ObjectId>,
) -> BTreeSet<T> {
    let Some(start_vertex) = graph.vertex(start) else {
        return BTreeSet::new();
    };

    let mut visited: HashSet<VertexId> = graph
        .vertices()
        .filter(|&v| v != start_vertex)
        .filter(|&v| graph.object(v).is_some_and(|o| barrier.contains(&o)))
        .collect();

    let mut found = BTreeSet::new();
    let mut stack = vec![start_vertex];
    visited.insert(start_vertex);
    while let Some(vertex) = stack.pop() {
        if let Some(item) = graph.object(vertex).and_then(T::from_object) {
            found.insert(item);
        }
        for &next in graph.out_neighbors(vertex) {
            if visited.insert(next) {
                stack.push(next);
            }
        }
    }
    found
}

pub fn dependent_particles(
    graph: &DependencyGraph,
    start: ParticleId,
    barrier: &HashSet<ObjectId>,
) -> BTreeSet<ParticleId> {
    get_dependent(graph, start.into(), barrier)
}

pub fn dependent_restraints(
    graph: &DependencyGraph,
    start: ParticleId,
    barrier: &HashSet<ObjectId>,
) -> BTreeSet<RestraintId> {
    get_dependent(graph, start.into(), barrier)
}

pub fn dependent_score_states(
    graph: &DependencyGraph,
    start: ParticleId,
    barrier: &HashSet<ObjectId>,
) -> BTreeSet<ScoreStateId> {
    get_dependent(graph, start.into(), barrier)
}
