use super::error::{Access, EvalError};
use crate::core::models::error::ModelError;
use crate::core::models::ids::{ContainerId, ParticleId};
use crate::core::models::store::ParticleStore;
use crate::core::scoring::error::ScoringError;
use crate::core::scoring::traits::{Restraint, ScoreState};
use std::collections::HashSet;
use std::ops::{Deref, DerefMut};
use tracing::error;

/// Particles a single call is allowed to read and write.
///
/// Declared containers contribute their backing particle and their members.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeclaredAccess {
    readable: HashSet<ParticleId>,
    writable: HashSet<ParticleId>,
}

impl DeclaredAccess {
    /// Forward pass of a score state: reads its inputs, writes its outputs
    /// and may update its inputs in place.
    pub fn forward(state: &dyn ScoreState, particles: &ParticleStore) -> Self {
        let inputs = expand(state.input_particles(), state.input_containers(), particles);
        let outputs = expand(state.output_particles(), state.output_containers(), particles);
        let writable = inputs.union(&outputs).copied().collect();
        Self {
            readable: inputs,
            writable,
        }
    }

    /// Backward pass of a score state: derivatives flow from the outputs back
    /// onto the inputs, so both sides are readable and writable.
    pub fn backward(state: &dyn ScoreState, particles: &ParticleStore) -> Self {
        let mut all = expand(state.input_particles(), state.input_containers(), particles);
        all.extend(expand(
            state.output_particles(),
            state.output_containers(),
            particles,
        ));
        Self {
            readable: all.clone(),
            writable: all,
        }
    }

    /// A restraint reads its inputs. The write set only governs derivative
    /// contributions since restraints cannot mutate attributes.
    pub fn restraint(restraint: &dyn Restraint, particles: &ParticleStore) -> Self {
        let inputs = expand(
            restraint.input_particles(),
            restraint.input_containers(),
            particles,
        );
        Self {
            readable: inputs.clone(),
            writable: inputs,
        }
    }

    pub fn readable(&self) -> &HashSet<ParticleId> {
        &self.readable
    }

    pub fn writable(&self) -> &HashSet<ParticleId> {
        &self.writable
    }

    fn names(&self, access: Access, particles: &ParticleStore) -> Vec<String> {
        let set = match access {
            Access::Read => &self.readable,
            Access::Write => &self.writable,
        };
        let mut names: Vec<String> = set
            .iter()
            .filter_map(|&p| particles.particle_name(p).map(str::to_string))
            .collect();
        names.sort();
        names
    }
}

fn expand(
    particles: Vec<ParticleId>,
    containers: Vec<ContainerId>,
    store: &ParticleStore,
) -> HashSet<ParticleId> {
    let mut set: HashSet<ParticleId> = particles.into_iter().collect();
    for id in containers {
        if let Ok(container) = store.container(id) {
            set.extend(container.backing_particle());
            set.extend(container.members().iter().copied());
        }
    }
    set
}

/// Lock marks for the duration of one verified call.
///
/// Entering a scope read-locks every particle outside the declared read set
/// and write-locks every particle outside the declared write set. Dropping the
/// scope clears all marks, including when the call fails. An inactive scope
/// sets no marks. Either way the store's structure stays frozen while the
/// scope lives.
pub struct AccessScope<'a> {
    particles: &'a mut ParticleStore,
    active: bool,
}

impl<'a> AccessScope<'a> {
    pub fn enter(particles: &'a mut ParticleStore, declared: Option<&DeclaredAccess>) -> Self {
        let active = match declared {
            Some(access) => {
                particles.lock_all_except(&access.readable, &access.writable);
                true
            }
            None => {
                particles.freeze();
                false
            }
        };
        Self { particles, active }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }
}

impl Deref for AccessScope<'_> {
    type Target = ParticleStore;

    fn deref(&self) -> &ParticleStore {
        &*self.particles
    }
}

impl DerefMut for AccessScope<'_> {
    fn deref_mut(&mut self) -> &mut ParticleStore {
        &mut *self.particles
    }
}

impl Drop for AccessScope<'_> {
    fn drop(&mut self) {
        self.particles.clear_locks();
    }
}

/// Maps a failure raised inside a score state or restraint to the engine's
/// error taxonomy. Lock failures become access violations naming the
/// offending particle and the caller's declared set.
pub(crate) fn classify(
    err: ScoringError,
    caller: &str,
    declared: Option<&DeclaredAccess>,
    particles: &ParticleStore,
) -> EvalError {
    match err {
        ScoringError::Model { source } => match source {
            ModelError::ReadLocked {
                particle,
                particle_name,
            } => violation(particle, particle_name, Access::Read, caller, declared, particles),
            ModelError::WriteLocked {
                particle,
                particle_name,
            } => violation(particle, particle_name, Access::Write, caller, declared, particles),
            ModelError::MissingAttribute { .. } => EvalError::Scoring {
                source: ScoringError::Model { source },
            },
            other => EvalError::Usage(format!("{caller}: {other}")),
        },
        ScoringError::NonFinite { value, context } => EvalError::Numeric {
            value,
            context: format!("{caller}: {context}"),
        },
        failed @ ScoringError::Failed { .. } => EvalError::Scoring { source: failed },
    }
}

fn violation(
    particle: ParticleId,
    particle_name: String,
    access: Access,
    caller: &str,
    declared: Option<&DeclaredAccess>,
    particles: &ParticleStore,
) -> EvalError {
    let declared = declared
        .map(|d| d.names(access, particles))
        .unwrap_or_default();
    error!(
        particle = %particle_name,
        %access,
        caller,
        declared = ?declared,
        "Undeclared particle access detected."
    );
    EvalError::AccessViolation {
        particle,
        particle_name,
        access,
        caller: caller.to_string(),
        declared,
    }
}
