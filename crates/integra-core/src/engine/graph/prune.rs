use super::{DependencyGraph, VertexId, builder};
use crate::core::models::model::Model;
use crate::engine::error::EvalError;
use itertools::Itertools;
use std::collections::HashMap;
use tracing::{debug, trace};

type Signature = (Vec<VertexId>, Vec<VertexId>);

fn signature(graph: &DependencyGraph, vertex: VertexId) -> Signature {
    let inputs = graph.in_neighbors(vertex).iter().copied().sorted().collect();
    let outputs = graph.out_neighbors(vertex).iter().copied().sorted().collect();
    (inputs, outputs)
}

/// Removes vertices that are structurally redundant.
///
/// Two vertices with identical in- and out-neighbour sets are interchangeable
/// for reachability, so all but the first one seen are disconnected and
/// removed. Passes repeat until one removes nothing. Which member of an
/// equivalence class survives is unspecified.
pub fn prune(graph: &DependencyGraph) -> DependencyGraph {
    let mut pruned = graph.clone();
    let mut passes = 0;
    loop {
        passes += 1;
        let mut seen: HashMap<Signature, VertexId> = HashMap::new();
        let mut removed = 0;
        let snapshot: Vec<VertexId> = pruned.vertices().collect();
        for vertex in snapshot {
            let sig = signature(&pruned, vertex);
            if seen.contains_key(&sig) {
                trace!(object = ?pruned.object(vertex), "Removing redundant vertex.");
                pruned.remove_vertex(vertex);
                removed += 1;
            } else {
                seen.insert(sig, vertex);
            }
        }
        if removed == 0 {
            break;
        }
    }
    debug!(
        before = graph.vertex_count(),
        after = pruned.vertex_count(),
        passes,
        "Dependency graph pruned."
    );
    pruned
}

/// Builds the dependency graph of the model's root restraint set, with only
/// the score states it needs, and prunes it.
pub fn pruned_dependency_graph(model: &Model) -> Result<DependencyGraph, EvalError> {
    let restraints: Vec<_> = model
        .restraints_and_weights()?
        .into_iter()
        .map(|(r, _)| r)
        .unique()
        .collect();
    let graph = builder::build_for_restraints(model, &restraints)?;
    Ok(prune(&graph))
}
