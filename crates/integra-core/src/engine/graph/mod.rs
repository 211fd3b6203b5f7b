//! # Dependency Graph
//!
//! A directed graph over particles, containers, score states and restraints.
//! An edge `u -> v` means "`u` must be available before `v` runs".
//!
//! - [`builder`] - construction from declared inputs and outputs
//! - [`query`] - barrier-respecting reachability queries
//! - [`prune`] - structural reduction by merging equivalent vertices
//! - [`order`] - topological ordering and required score states

pub mod builder;
pub mod order;
pub mod prune;
pub mod query;

use super::error::EvalError;
use crate::core::models::ids::ObjectId;
use crate::core::models::model::Model;
use slotmap::{SlotMap, new_key_type};
use std::collections::HashMap;
use std::fmt::Write;

new_key_type! {
    pub struct VertexId;
}

#[derive(Debug, Clone)]
struct Vertex {
    object: ObjectId,
    inputs: Vec<VertexId>,
    outputs: Vec<VertexId>,
}

#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    vertices: SlotMap<VertexId, Vertex>,
    index: HashMap<ObjectId, VertexId>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the vertex for `object`, creating it if needed.
    pub fn add_vertex(&mut self, object: ObjectId) -> VertexId {
        if let Some(&id) = self.index.get(&object) {
            return id;
        }
        let id = self.vertices.insert(Vertex {
            object,
            inputs: Vec::new(),
            outputs: Vec::new(),
        });
        self.index.insert(object, id);
        id
    }

    /// Adds `from -> to`. Returns `false` if the edge already existed.
    ///
    /// # Errors
    ///
    /// A self-loop or a dangling vertex id is an [`EvalError::Internal`]: both
    /// indicate a bug in whatever is assembling the graph.
    pub fn add_edge(&mut self, from: VertexId, to: VertexId) -> Result<bool, EvalError> {
        if from == to {
            return Err(EvalError::Internal(format!(
                "self-loop on {:?}",
                self.vertices.get(from).map(|v| v.object)
            )));
        }
        if !self.vertices.contains_key(from) || !self.vertices.contains_key(to) {
            return Err(EvalError::Internal(format!(
                "edge {from:?} -> {to:?} references a missing vertex"
            )));
        }
        if self.vertices[from].outputs.contains(&to) {
            return Ok(false);
        }
        self.vertices[from].outputs.push(to);
        self.vertices[to].inputs.push(from);
        Ok(true)
    }

    /// Disconnects a vertex from all neighbours and removes it.
    pub fn remove_vertex(&mut self, id: VertexId) -> Option<ObjectId> {
        let vertex = self.vertices.remove(id)?;
        for input in &vertex.inputs {
            if let Some(v) = self.vertices.get_mut(*input) {
                v.outputs.retain(|&o| o != id);
            }
        }
        for output in &vertex.outputs {
            if let Some(v) = self.vertices.get_mut(*output) {
                v.inputs.retain(|&i| i != id);
            }
        }
        self.index.remove(&vertex.object);
        Some(vertex.object)
    }

    pub fn vertex(&self, object: ObjectId) -> Option<VertexId> {
        self.index.get(&object).copied()
    }

    pub fn object(&self, id: VertexId) -> Option<ObjectId> {
        self.vertices.get(id).map(|v| v.object)
    }

    pub fn contains(&self, object: ObjectId) -> bool {
        self.index.contains_key(&object)
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn edge_count(&self) -> usize {
        self.vertices.values().map(|v| v.outputs.len()).sum()
    }

    pub fn vertices(&self) -> impl Iterator<Item = VertexId> + '_ {
        self.vertices.keys()
    }

    pub fn objects(&self) -> impl Iterator<Item = ObjectId> + '_ {
        self.vertices.values().map(|v| v.object)
    }

    pub fn in_neighbors(&self, id: VertexId) -> &[VertexId] {
        self.vertices.get(id).map_or(&[], |v| v.inputs.as_slice())
    }

    pub fn out_neighbors(&self, id: VertexId) -> &[VertexId] {
        self.vertices.get(id).map_or(&[], |v| v.outputs.as_slice())
    }

    pub fn has_edge(&self, from: ObjectId, to: ObjectId) -> bool {
        match (self.vertex(from), self.vertex(to)) {
            (Some(f), Some(t)) => self.vertices[f].outputs.contains(&t),
            _ => false,
        }
    }

    /// All edges as object pairs, sorted.
    pub fn edges(&self) -> Vec<(ObjectId, ObjectId)> {
        let mut edges: Vec<_> = self
            .vertices
            .values()
            .flat_map(|v| {
                v.outputs
                    .iter()
                    .map(move |&o| (v.object, self.vertices[o].object))
            })
            .collect();
        edges.sort();
        edges
    }

    /// Renders the graph in Graphviz dot syntax, labelling vertices with
    /// model object names.
    pub fn to_dot(&self, model: &Model) -> String {
        let mut out = String::from("digraph dependencies {\n");
        let mut numbering = HashMap::new();
        for (n, (id, vertex)) in self.vertices.iter().enumerate() {
            numbering.insert(id, n);
            let shape = match vertex.object {
                ObjectId::Particle(_) => "ellipse",
                ObjectId::Container(_) => "box3d",
                ObjectId::ScoreState(_) => "box",
                ObjectId::Restraint(_) => "diamond",
            };
            let label = model.object_name(vertex.object).replace('"', "\\\"");
            let _ = writeln!(out, "  n{n} [label=\"{label}\", shape={shape}];");
        }
        for (id, vertex) in self.vertices.iter() {
            for output in &vertex.outputs {
                let _ = writeln!(out, "  n{} -> n{};", numbering[&id], numbering[output]);
            }
        }
        out.push_str("}\n");
        out
    }
}
