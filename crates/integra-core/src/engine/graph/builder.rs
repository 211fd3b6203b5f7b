use super::{DependencyGraph, VertexId, order};
use crate::core::models::ids::{ContainerId, ObjectId, ParticleId, RestraintId, ScoreStateId};
use crate::core::models::model::Model;
use crate::engine::error::EvalError;
use tracing::{debug, instrument, trace};

/// Builds the dependency graph for the given score states and restraints.
///
/// Score-state and restraint vertices are allocated first, then edges are
/// added in a fixed order: inputs of every score state, outputs of every
/// score state, inputs of every restraint, and finally the model's extra
/// dependency edges. All score-state inputs are wired before any output so a
/// particle that is read by one state and written by another is always seen as
/// an input first.
///
/// # Errors
///
/// - [`EvalError::Usage`] if an id is not registered or a declaration names an
///   object the model does not own.
/// - [`EvalError::CyclicDependency`] if the declarations form a cycle.
/// - [`EvalError::Internal`] on a self-loop.
#[instrument(skip_all, name = "dependency_graph_build", fields(score_states = score_states.len(), restraints = restraints.len()))]
pub fn build(
    model: &Model,
    score_states: &[ScoreStateId],
    restraints: &[RestraintId],
) -> Result<DependencyGraph, EvalError> {
    let mut graph = DependencyGraph::new();

    let mut state_vertices = Vec::with_capacity(score_states.len());
    for &id in score_states {
        check_registered(model, id.into())?;
        state_vertices.push((id, graph.add_vertex(id.into())));
    }
    let mut restraint_vertices = Vec::with_capacity(restraints.len());
    for &id in restraints {
        check_registered(model, id.into())?;
        restraint_vertices.push((id, graph.add_vertex(id.into())));
    }

    for &(id, vertex) in &state_vertices {
        let state = model.score_state(id)?;
        let inputs = declared(model, id.into(), state.input_particles(), state.input_containers())?;
        connect_inputs(&mut graph, &inputs, vertex)?;
    }
    for &(id, vertex) in &state_vertices {
        let state = model.score_state(id)?;
        let outputs =
            declared(model, id.into(), state.output_particles(), state.output_containers())?;
        for object in outputs {
            let output = graph.add_vertex(object);
            graph.add_edge(vertex, output)?;
        }
    }
    for &(id, vertex) in &restraint_vertices {
        let restraint = model.restraint(id)?;
        let inputs = declared(
            model,
            id.into(),
            restraint.input_particles(),
            restraint.input_containers(),
        )?;
        connect_inputs(&mut graph, &inputs, vertex)?;
    }

    for &(from, to) in model.extra_dependency_edges() {
        let from = graph.add_vertex(from);
        let to = graph.add_vertex(to);
        graph.add_edge(from, to)?;
    }

    order::topological_order(&graph)?;

    debug!(
        vertices = graph.vertex_count(),
        edges = graph.edge_count(),
        "Dependency graph built."
    );
    Ok(graph)
}

/// Builds the graph for `restraints` together with exactly the score states
/// they require.
pub fn build_for_restraints(
    model: &Model,
    restraints: &[RestraintId],
) -> Result<DependencyGraph, EvalError> {
    let score_states = order::required_score_states(model, restraints)?;
    build(model, &score_states, restraints)
}

fn connect_inputs(
    graph: &mut DependencyGraph,
    inputs: &[ObjectId],
    consumer: VertexId,
) -> Result<(), EvalError> {
    for &object in inputs {
        let input = graph.add_vertex(object);
        graph.add_edge(input, consumer)?;
    }
    Ok(())
}

fn check_registered(model: &Model, object: ObjectId) -> Result<(), EvalError> {
    if model.contains_object(object) {
        Ok(())
    } else {
        Err(EvalError::Usage(format!(
            "{} {:?} is not registered with the model",
            object.kind(),
            object
        )))
    }
}

/// Validates a declaration list and converts it to object ids.
pub(crate) fn declared(
    model: &Model,
    owner: ObjectId,
    particles: Vec<ParticleId>,
    containers: Vec<ContainerId>,
) -> Result<Vec<ObjectId>, EvalError> {
    let objects: Vec<ObjectId> = particles
        .into_iter()
        .map(ObjectId::from)
        .chain(containers.into_iter().map(ObjectId::from))
        .collect();
    for &object in &objects {
        if !model.contains_object(object) {
            return Err(EvalError::Usage(format!(
                "{} '{}' declares {} {:?} that is not owned by the model",
                owner.kind(),
                model.object_name(owner),
                object.kind(),
                object
            )));
        }
    }
    trace!(owner = %model.object_name(owner), count = objects.len(), "Declared objects resolved.");
    Ok(objects)
}
