use super::container::Container;
use super::error::ModelError;
use super::ids::{ContainerId, ObjectId, ParticleId, RestraintId, RestraintSetId, ScoreStateId};
use super::keys::FloatKey;
use super::particle::Particle;
use super::store::ParticleStore;
use crate::core::scoring::accumulator::DerivativeTable;
use crate::core::scoring::restraint_set::{self, RestraintSet};
use crate::core::scoring::traits::{Restraint, ScoreState};
use slotmap::SlotMap;
use std::fmt;

/// Phase of the evaluation currently running on a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Stage {
    #[default]
    NotEvaluating,
    BeforeEvaluate,
    Evaluate,
    AfterEvaluate,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Stage::NotEvaluating => "not evaluating",
            Stage::BeforeEvaluate => "before evaluate",
            Stage::Evaluate => "evaluate",
            Stage::AfterEvaluate => "after evaluate",
        };
        f.write_str(label)
    }
}

pub(crate) struct RestraintEntry {
    pub(crate) restraint: Box<dyn Restraint>,
    pub(crate) weight: f64,
    pub(crate) maximum_score: f64,
    pub(crate) last_score: Option<f64>,
}

/// The entity store together with the registered score states, restraints and
/// the restraint-set tree.
///
/// Every change that can alter dependency structure advances the model's
/// generation: adding or removing score states, restraints, restraint sets or
/// extra edges, and removing particles. The first evaluation of a new
/// generation is the one the access verifier checks.
pub struct Model {
    pub(crate) particles: ParticleStore,
    pub(crate) score_states: SlotMap<ScoreStateId, Box<dyn ScoreState>>,
    pub(crate) restraints: SlotMap<RestraintId, RestraintEntry>,
    pub(crate) derivatives: DerivativeTable,
    pub(crate) stage: Stage,
    pub(crate) verified_generation: Option<u64>,
    pub(crate) validated_generation: Option<u64>,
    restraint_sets: SlotMap<RestraintSetId, RestraintSet>,
    root_set: RestraintSetId,
    extra_edges: Vec<(ObjectId, ObjectId)>,
    generation: u64,
}

impl Default for Model {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Model")
            .field("particles", &self.particles.number_of_particles())
            .field("score_states", &self.score_states.len())
            .field("restraints", &self.restraints.len())
            .field("restraint_sets", &self.restraint_sets.len())
            .field("extra_edges", &self.extra_edges.len())
            .field("generation", &self.generation)
            .field("stage", &self.stage)
            .finish()
    }
}

impl Model {
    pub fn new() -> Self {
        let mut restraint_sets = SlotMap::with_key();
        let root_set = restraint_sets.insert(RestraintSet::new("root"));
        Self {
            particles: ParticleStore::new(),
            score_states: SlotMap::with_key(),
            restraints: SlotMap::with_key(),
            derivatives: DerivativeTable::new(),
            stage: Stage::NotEvaluating,
            verified_generation: None,
            validated_generation: None,
            restraint_sets,
            root_set,
            extra_edges: Vec::new(),
            generation: 0,
        }
    }

    pub fn particles(&self) -> &ParticleStore {
        &self.particles
    }

    pub fn particles_mut(&mut self) -> &mut ParticleStore {
        &mut self.particles
    }

    pub fn add_particle(&mut self, name: &str) -> ParticleId {
        self.particles.add_particle(name)
    }

    /// Removes a particle along with its derivatives and every extra edge
    /// that mentions it.
    pub fn remove_particle(&mut self, id: ParticleId) -> Option<Particle> {
        let particle = self.particles.remove_particle(id).ok().flatten()?;
        self.derivatives.remove_particle(id);
        self.drop_extra_edges(ObjectId::Particle(id));
        self.bump_generation();
        Some(particle)
    }

    pub fn add_container(&mut self, container: Container) -> ContainerId {
        self.particles.add_container(container)
    }

    /// Removes a container and every extra edge that mentions it. Its members
    /// stay in the model.
    pub fn remove_container(&mut self, id: ContainerId) -> Option<Container> {
        let container = self.particles.remove_container(id).ok().flatten()?;
        self.drop_extra_edges(ObjectId::Container(id));
        self.bump_generation();
        Some(container)
    }

    pub fn container(&self, id: ContainerId) -> Result<&Container, ModelError> {
        self.particles.container(id)
    }

    /// Edits a container's membership. Counts as a dependency change since
    /// membership decides what a declared container grants access to.
    pub fn container_mut(&mut self, id: ContainerId) -> Result<&mut Container, ModelError> {
        self.particles.container(id)?;
        self.bump_generation();
        self.particles.container_mut(id)
    }

    pub fn add_score_state(&mut self, state: impl ScoreState + 'static) -> ScoreStateId {
        self.bump_generation();
        self.score_states.insert(Box::new(state))
    }

    pub fn remove_score_state(&mut self, id: ScoreStateId) -> Option<Box<dyn ScoreState>> {
        let state = self.score_states.remove(id)?;
        self.drop_extra_edges(ObjectId::ScoreState(id));
        self.bump_generation();
        Some(state)
    }

    pub fn score_state(&self, id: ScoreStateId) -> Result<&dyn ScoreState, ModelError> {
        self.score_states
            .get(id)
            .map(|s| &**s)
            .ok_or(ModelError::UnknownScoreState(id))
    }

    pub fn score_state_ids(&self) -> impl Iterator<Item = ScoreStateId> + '_ {
        self.score_states.keys()
    }

    pub fn number_of_score_states(&self) -> usize {
        self.score_states.len()
    }

    /// Registers a restraint and places it in the root restraint set.
    pub fn add_restraint(&mut self, restraint: impl Restraint + 'static) -> RestraintId {
        let id = self.insert_restraint(Box::new(restraint));
        self.restraint_sets[self.root_set].add_restraint(id);
        id
    }

    /// Registers a restraint and places it in `set` instead of the root set.
    pub fn add_restraint_to_set(
        &mut self,
        set: RestraintSetId,
        restraint: impl Restraint + 'static,
    ) -> Result<RestraintId, ModelError> {
        if !self.restraint_sets.contains_key(set) {
            return Err(ModelError::UnknownRestraintSet(set));
        }
        let id = self.insert_restraint(Box::new(restraint));
        self.restraint_sets[set].add_restraint(id);
        Ok(id)
    }

    /// Unregisters a restraint and detaches it from every restraint set.
    pub fn remove_restraint(&mut self, id: RestraintId) -> Option<Box<dyn Restraint>> {
        let entry = self.restraints.remove(id)?;
        for (_, set) in self.restraint_sets.iter_mut() {
            set.remove_restraint(id);
        }
        self.drop_extra_edges(ObjectId::Restraint(id));
        self.bump_generation();
        Some(entry.restraint)
    }

    pub fn restraint(&self, id: RestraintId) -> Result<&dyn Restraint, ModelError> {
        self.entry(id).map(|e| &*e.restraint)
    }

    pub fn restraint_ids(&self) -> impl Iterator<Item = RestraintId> + '_ {
        self.restraints.keys()
    }

    pub fn number_of_restraints(&self) -> usize {
        self.restraints.len()
    }

    pub fn weight(&self, id: RestraintId) -> Result<f64, ModelError> {
        self.entry(id).map(|e| e.weight)
    }

    pub fn set_weight(&mut self, id: RestraintId, weight: f64) -> Result<(), ModelError> {
        check_finite("restraint weight", weight)?;
        self.entry_mut(id)?.weight = weight;
        Ok(())
    }

    /// Maximum acceptable unweighted score of a restraint. Unbounded
    /// (`f64::MAX`) unless set.
    pub fn maximum_score(&self, id: RestraintId) -> Result<f64, ModelError> {
        self.entry(id).map(|e| e.maximum_score)
    }

    pub fn set_maximum_score(&mut self, id: RestraintId, maximum: f64) -> Result<(), ModelError> {
        if maximum.is_nan() {
            return Err(ModelError::InvalidParameter {
                what: "maximum score",
                value: maximum,
            });
        }
        self.entry_mut(id)?.maximum_score = maximum;
        Ok(())
    }

    /// Unweighted score from the most recent evaluation of the restraint.
    pub fn last_score(&self, id: RestraintId) -> Result<Option<f64>, ModelError> {
        self.entry(id).map(|e| e.last_score)
    }

    pub fn root_restraint_set(&self) -> RestraintSetId {
        self.root_set
    }

    pub fn add_restraint_set(
        &mut self,
        parent: RestraintSetId,
        name: &str,
    ) -> Result<RestraintSetId, ModelError> {
        if !self.restraint_sets.contains_key(parent) {
            return Err(ModelError::UnknownRestraintSet(parent));
        }
        let id = self.restraint_sets.insert(RestraintSet::new(name));
        self.restraint_sets[parent].add_child(id);
        self.bump_generation();
        Ok(id)
    }

    /// Detaches a set from its parents and removes it with its whole subtree.
    /// Restraints in the subtree stay registered. The root set cannot be
    /// removed.
    pub fn remove_restraint_set(&mut self, id: RestraintSetId) -> Result<(), ModelError> {
        if id == self.root_set || !self.restraint_sets.contains_key(id) {
            return Err(ModelError::UnknownRestraintSet(id));
        }
        let mut doomed = vec![id];
        let mut i = 0;
        while i < doomed.len() {
            if let Some(set) = self.restraint_sets.get(doomed[i]) {
                doomed.extend(set.children().iter().copied());
            }
            i += 1;
        }
        for set in &doomed {
            self.restraint_sets.remove(*set);
        }
        for (_, set) in self.restraint_sets.iter_mut() {
            set.remove_child(id);
        }
        self.bump_generation();
        Ok(())
    }

    pub fn restraint_set(&self, id: RestraintSetId) -> Result<&RestraintSet, ModelError> {
        self.restraint_sets
            .get(id)
            .ok_or(ModelError::UnknownRestraintSet(id))
    }

    pub fn set_restraint_set_weight(
        &mut self,
        id: RestraintSetId,
        weight: f64,
    ) -> Result<(), ModelError> {
        check_finite("restraint set weight", weight)?;
        self.restraint_sets
            .get_mut(id)
            .ok_or(ModelError::UnknownRestraintSet(id))?
            .set_weight(weight);
        Ok(())
    }

    /// Adds an already registered restraint to another set. A restraint that
    /// belongs to several sets is evaluated once per membership.
    pub fn attach_restraint(
        &mut self,
        set: RestraintSetId,
        restraint: RestraintId,
    ) -> Result<(), ModelError> {
        self.entry(restraint)?;
        let target = self
            .restraint_sets
            .get_mut(set)
            .ok_or(ModelError::UnknownRestraintSet(set))?;
        if target.add_restraint(restraint) {
            self.bump_generation();
        }
        Ok(())
    }

    pub fn detach_restraint(
        &mut self,
        set: RestraintSetId,
        restraint: RestraintId,
    ) -> Result<bool, ModelError> {
        let target = self
            .restraint_sets
            .get_mut(set)
            .ok_or(ModelError::UnknownRestraintSet(set))?;
        let removed = target.remove_restraint(restraint);
        if removed {
            self.bump_generation();
        }
        Ok(removed)
    }

    /// Moves `child` (and its subtree) under `parent`. Fails if that would
    /// make the tree cyclic.
    pub fn reparent_restraint_set(
        &mut self,
        child: RestraintSetId,
        parent: RestraintSetId,
    ) -> Result<(), ModelError> {
        if child == self.root_set || !self.restraint_sets.contains_key(child) {
            return Err(ModelError::UnknownRestraintSet(child));
        }
        if !self.restraint_sets.contains_key(parent) {
            return Err(ModelError::UnknownRestraintSet(parent));
        }
        if restraint_set::is_descendant(&self.restraint_sets, child, parent) {
            return Err(ModelError::RestraintSetCycle { child, parent });
        }
        for (_, set) in self.restraint_sets.iter_mut() {
            set.remove_child(child);
        }
        self.restraint_sets[parent].add_child(child);
        self.bump_generation();
        Ok(())
    }

    /// Flattens the root restraint set into `(restraint, effective weight)`
    /// pairs. Restraints with an effective weight of zero are omitted.
    pub fn restraints_and_weights(&self) -> Result<Vec<(RestraintId, f64)>, ModelError> {
        self.restraint_set_restraints_and_weights(self.root_set)
    }

    pub fn restraint_set_restraints_and_weights(
        &self,
        set: RestraintSetId,
    ) -> Result<Vec<(RestraintId, f64)>, ModelError> {
        restraint_set::flatten(&self.restraint_sets, set, |id| self.weight(id))
    }

    pub fn extra_dependency_edges(&self) -> &[(ObjectId, ObjectId)] {
        &self.extra_edges
    }

    /// Declares that `from` must be available before `to` runs, for
    /// dependencies that declared inputs and outputs cannot express.
    /// Adding an edge twice is a no-op.
    ///
    /// # Errors
    ///
    /// An unknown endpoint, or [`ModelError::SelfDependency`] if `from` and
    /// `to` are the same object.
    pub fn add_extra_dependency_edge(
        &mut self,
        from: impl Into<ObjectId>,
        to: impl Into<ObjectId>,
    ) -> Result<(), ModelError> {
        let (from, to) = (from.into(), to.into());
        if from == to {
            return Err(ModelError::SelfDependency(from));
        }
        self.check_object(from)?;
        self.check_object(to)?;
        if !self.extra_edges.contains(&(from, to)) {
            self.extra_edges.push((from, to));
            self.bump_generation();
        }
        Ok(())
    }

    pub fn clear_extra_dependency_edges(&mut self) {
        if !self.extra_edges.is_empty() {
            self.extra_edges.clear();
            self.bump_generation();
        }
    }

    pub fn contains_object(&self, object: ObjectId) -> bool {
        self.check_object(object).is_ok()
    }

    /// Human-readable name of any object, used by diagnostics and graph dumps.
    pub fn object_name(&self, object: ObjectId) -> String {
        let name = match object {
            ObjectId::Particle(id) => self.particles.particle_name(id).map(str::to_string),
            ObjectId::Container(id) => self.particles.container(id).ok().map(|c| c.name.clone()),
            ObjectId::ScoreState(id) => self.score_state(id).ok().map(|s| s.name().to_string()),
            ObjectId::Restraint(id) => self.restraint(id).ok().map(|r| r.name().to_string()),
        };
        name.unwrap_or_else(|| format!("<removed {}>", object.kind()))
    }

    pub fn derivative(&self, particle: ParticleId, key: FloatKey) -> f64 {
        self.derivatives.get(particle, key)
    }

    pub fn derivatives(&self) -> &DerivativeTable {
        &self.derivatives
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Counter advanced by every change to the dependency structure.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// `true` once an evaluation of the current generation has passed access
    /// verification.
    pub fn is_verified(&self) -> bool {
        self.verified_generation == Some(self.generation)
    }

    pub(crate) fn entry(&self, id: RestraintId) -> Result<&RestraintEntry, ModelError> {
        self.restraints
            .get(id)
            .ok_or(ModelError::UnknownRestraint(id))
    }

    fn entry_mut(&mut self, id: RestraintId) -> Result<&mut RestraintEntry, ModelError> {
        self.restraints
            .get_mut(id)
            .ok_or(ModelError::UnknownRestraint(id))
    }

    fn insert_restraint(&mut self, restraint: Box<dyn Restraint>) -> RestraintId {
        self.bump_generation();
        self.restraints.insert(RestraintEntry {
            restraint,
            weight: 1.0,
            maximum_score: f64::MAX,
            last_score: None,
        })
    }

    fn check_object(&self, object: ObjectId) -> Result<(), ModelError> {
        match object {
            ObjectId::Particle(id) if !self.particles.contains_particle(id) => {
                Err(ModelError::UnknownParticle(id))
            }
            ObjectId::Container(id) if !self.particles.contains_container(id) => {
                Err(ModelError::UnknownContainer(id))
            }
            ObjectId::ScoreState(id) if !self.score_states.contains_key(id) => {
                Err(ModelError::UnknownScoreState(id))
            }
            ObjectId::Restraint(id) if !self.restraints.contains_key(id) => {
                Err(ModelError::UnknownRestraint(id))
            }
            _ => Ok(()),
        }
    }

    fn drop_extra_edges(&mut self, object: ObjectId) {
        self.extra_edges
            .retain(|&(from, to)| from != object && to != object);
    }

    fn bump_generation(&mut self) {
        self.generation += 1;
    }
}

fn check_finite(what: &'static str, value: f64) -> Result<(), ModelError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ModelError::InvalidParameter { what, value })
    }
}
