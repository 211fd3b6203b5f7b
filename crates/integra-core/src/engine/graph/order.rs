use super::{DependencyGraph, VertexId, builder};
use crate::core::models::ids::{ObjectId, RestraintId, ScoreStateId};
use crate::core::models::model::Model;
use crate::engine::error::EvalError;
use std::collections::{BTreeSet, HashMap, VecDeque};
use tracing::{debug, instrument};

/// Kahn's algorithm over the graph. Vertices that are ready at the same time
/// keep their arena order, so the result is deterministic for a given graph.
///
/// # Errors
///
/// [`EvalError::CyclicDependency`] naming the objects of one cycle, in edge
/// order starting from the smallest object. Vertices that are merely
/// downstream of the cycle are not listed.
pub fn topological_order(graph: &DependencyGraph) -> Result<Vec<VertexId>, EvalError> {
    let mut in_degree: HashMap<VertexId, usize> = graph
        .vertices()
        .map(|v| (v, graph.in_neighbors(v).len()))
        .collect();
    let mut ready: VecDeque<VertexId> = graph
        .vertices()
        .filter(|v| in_degree[v] == 0)
        .collect();

    let mut order = Vec::with_capacity(graph.vertex_count());
    while let Some(vertex) = ready.pop_front() {
        order.push(vertex);
        for &next in graph.out_neighbors(vertex) {
            if let Some(degree) = in_degree.get_mut(&next) {
                *degree -= 1;
                if *degree == 0 {
                    ready.push_back(next);
                }
            }
        }
    }

    if order.len() != graph.vertex_count() {
        return Err(EvalError::CyclicDependency {
            cycle: find_cycle(graph, &in_degree),
        });
    }
    Ok(order)
}

/// Every vertex Kahn's algorithm left behind has a predecessor that was also
/// left behind, so walking predecessors must eventually revisit a vertex.
fn find_cycle(graph: &DependencyGraph, in_degree: &HashMap<VertexId, usize>) -> Vec<ObjectId> {
    let stuck = |v: &VertexId| in_degree.get(v).is_some_and(|&d| d > 0);
    let Some(mut current) = graph.vertices().filter(stuck).min_by_key(|&v| graph.object(v)) else {
        return Vec::new();
    };
    let mut path = Vec::new();
    let mut seen: HashMap<VertexId, usize> = HashMap::new();
    loop {
        if let Some(&start) = seen.get(&current) {
            let mut cycle: Vec<ObjectId> = path[start..]
                .iter()
                .rev()
                .filter_map(|&v| graph.object(v))
                .collect();
            if let Some((first, _)) = cycle.iter().enumerate().min_by_key(|&(_, o)| *o) {
                cycle.rotate_left(first);
            }
            return cycle;
        }
        seen.insert(current, path.len());
        path.push(current);
        let previous = graph
            .in_neighbors(current)
            .iter()
            .copied()
            .filter(|v| stuck(v))
            .min_by_key(|&v| graph.object(v));
        match previous {
            Some(v) => current = v,
            None => return path.iter().filter_map(|&v| graph.object(v)).collect(),
        }
    }
}

/// Score states of the graph in an order where every state runs after all of
/// the states it depends on.
pub fn order_score_states(graph: &DependencyGraph) -> Result<Vec<ScoreStateId>, EvalError> {
    Ok(topological_order(graph)?
        .into_iter()
        .filter_map(|v| match graph.object(v) {
            Some(ObjectId::ScoreState(id)) => Some(id),
            _ => None,
        })
        .collect())
}

/// For every vertex, the score states upstream of it.
fn upstream_score_states(
    graph: &DependencyGraph,
    order: &[VertexId],
) -> HashMap<VertexId, BTreeSet<ScoreStateId>> {
    let mut upstream: HashMap<VertexId, BTreeSet<ScoreStateId>> = HashMap::new();
    for &vertex in order {
        let mut required = BTreeSet::new();
        for &input in graph.in_neighbors(vertex) {
            if let Some(states) = upstream.get(&input) {
                required.extend(states.iter().copied());
            }
            if let Some(ObjectId::ScoreState(id)) = graph.object(input) {
                required.insert(id);
            }
        }
        upstream.insert(vertex, required);
    }
    upstream
}

/// The score states that must run before `restraints` can be evaluated, in
/// dependency order.
pub fn required_score_states(
    model: &Model,
    restraints: &[RestraintId],
) -> Result<Vec<ScoreStateId>, EvalError> {
    let dependencies = ModelDependencies::for_restraints(model, restraints)?;
    dependencies.score_states_for(restraints)
}

/// Cached ordering information for a model generation.
///
/// Holds the dependency order of all score states and, for every restraint,
/// the set of score states upstream of it. Callers that evaluate subsets of
/// restraints repeatedly use [`ModelDependencies::score_states_for`] instead
/// of rebuilding the graph.
#[derive(Debug, Clone)]
pub struct ModelDependencies {
    generation: u64,
    ordered: Vec<ScoreStateId>,
    required: HashMap<RestraintId, BTreeSet<ScoreStateId>>,
}

impl ModelDependencies {
    /// Computes dependencies for every registered score state and restraint.
    pub fn compute(model: &Model) -> Result<Self, EvalError> {
        let restraints: Vec<_> = model.restraint_ids().collect();
        Self::for_restraints(model, &restraints)
    }

    #[instrument(skip_all, name = "model_dependencies", fields(restraints = restraints.len()))]
    pub fn for_restraints(model: &Model, restraints: &[RestraintId]) -> Result<Self, EvalError> {
        let score_states: Vec<_> = model.score_state_ids().collect();
        let graph = builder::build(model, &score_states, restraints)?;
        let order = topological_order(&graph)?;
        let upstream = upstream_score_states(&graph, &order);

        let ordered = order
            .iter()
            .filter_map(|&v| match graph.object(v) {
                Some(ObjectId::ScoreState(id)) => Some(id),
                _ => None,
            })
            .collect();
        let required = restraints
            .iter()
            .filter_map(|&r| {
                let vertex = graph.vertex(r.into())?;
                Some((r, upstream.get(&vertex).cloned().unwrap_or_default()))
            })
            .collect();

        debug!(
            score_states = score_states.len(),
            "Score-state dependencies computed."
        );
        Ok(Self {
            generation: model.generation(),
            ordered,
            required,
        })
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// `false` once the model's dependency structure has changed since these
    /// dependencies were computed.
    pub fn is_current(&self, model: &Model) -> bool {
        self.generation == model.generation()
    }

    pub fn ordered_score_states(&self) -> &[ScoreStateId] {
        &self.ordered
    }

    pub fn required_for(&self, restraint: RestraintId) -> Option<&BTreeSet<ScoreStateId>> {
        self.required.get(&restraint)
    }

    /// Union of the score states required by `restraints`, in dependency
    /// order.
    pub fn score_states_for(
        &self,
        restraints: &[RestraintId],
    ) -> Result<Vec<ScoreStateId>, EvalError> {
        let mut needed = BTreeSet::new();
        for restraint in restraints {
            let required = self.required.get(restraint).ok_or_else(|| {
                EvalError::Usage(format!(
                    "restraint {restraint:?} is not covered by these dependencies"
                ))
            })?;
            needed.extend(required.iter().copied());
        }
        Ok(self
            .ordered
            .iter()
            .copied()
            .filter(|s| needed.contains(s))
            .collect())
    }
}
